use log::debug;
use remap_core::{Backend, DType, Error, Result, Shape, Tensor};
use remap_expr::{Expr, Reindex};

// make_grid: tile a batch of images onto one padded canvas
//
// Input [b, c, h, w], output [c, H, W] with
//
//   ncol = ceil(b / nrow)
//   H    = ncol * (p + h) + p
//   W    = nrow * (p + w) + p
//
// Canvas row y falls in tile row y / (p + h) at offset y % (p + h); offsets
// below p are padding, the rest map to image row offset - p. Columns work
// the same way, and the tile number is tile_row * nrow + tile_col. Padding
// and tiles past the end of the batch (a partial last row) are overflow
// cells written with `pad_value`.

/// Layout of a [`make_grid`] canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct MakeGridConfig {
    /// Images per canvas row.
    pub nrow: usize,
    /// Padding in pixels around and between images.
    pub padding: usize,
    /// Rescale the whole batch to [0, 1] before tiling.
    pub normalize: bool,
    pub pad_value: f64,
}

impl Default for MakeGridConfig {
    fn default() -> Self {
        Self {
            nrow: 8,
            padding: 2,
            normalize: false,
            pad_value: 0.0,
        }
    }
}

impl MakeGridConfig {
    pub fn nrow(mut self, n: usize) -> Self {
        self.nrow = n;
        self
    }

    pub fn padding(mut self, p: usize) -> Self {
        self.padding = p;
        self
    }

    pub fn normalize(mut self, n: bool) -> Self {
        self.normalize = n;
        self
    }

    pub fn pad_value(mut self, v: f64) -> Self {
        self.pad_value = v;
        self
    }
}

/// Tile a `[b, c, h, w]` batch into a `[c, H, W]` grid image.
pub fn make_grid<B: Backend>(x: &Tensor<B>, config: &MakeGridConfig) -> Result<Tensor<B>> {
    let &[b, c, h, w] = x.dims() else {
        return Err(Error::invalid_argument(
            "make_grid",
            format!("expected a [b, c, h, w] batch, got shape {}", x.shape()),
        ));
    };
    let (nrow, p) = (config.nrow, config.padding);
    if nrow == 0 {
        return Err(Error::invalid_argument("make_grid", "nrow must be > 0"));
    }
    if h == 0 || w == 0 {
        return Err(Error::invalid_argument(
            "make_grid",
            format!("images must be non-empty, got {h}x{w}"),
        ));
    }
    let ncol = b.div_ceil(nrow);
    let (cell_h, cell_w) = (p + h, p + w);
    let shape = Shape::from((c, ncol * cell_h + p, nrow * cell_w + p));

    let source = if config.normalize && x.elem_count() > 0 {
        normalized(x)?
    } else {
        x.clone()
    };

    let tile = (Expr::idx(1) / cell_h) * nrow + Expr::idx(2) / cell_w;
    let indexes = vec![
        tile.clone(),
        Expr::idx(0),
        Expr::idx(1) % cell_h - p,
        Expr::idx(2) % cell_w - p,
    ];
    let mut conditions = Vec::new();
    if p > 0 {
        conditions.push((Expr::idx(1) % cell_h).lt(p));
        conditions.push((Expr::idx(2) % cell_w).lt(p));
    }
    if ncol * nrow > b {
        conditions.push(tile.ge(b));
    }

    debug!(
        "make_grid {} -> {} (nrow {}, padding {}, normalize {})",
        x.shape(),
        shape,
        nrow,
        p,
        config.normalize
    );
    Reindex::new(shape, indexes)
        .overflow_conditions(conditions)
        .overflow_value(config.pad_value)
        .evaluate(&source)
}

/// Stack same-shaped `[c, h, w]` images and tile them with [`make_grid`].
pub fn make_grid_list<B: Backend>(
    images: &[Tensor<B>],
    config: &MakeGridConfig,
) -> Result<Tensor<B>> {
    if images.is_empty() {
        return Err(Error::invalid_argument("make_grid", "no images given"));
    }
    if let Some(bad) = images.iter().find(|t| t.rank() != 3) {
        return Err(Error::invalid_argument(
            "make_grid",
            format!("expected [c, h, w] images, got shape {}", bad.shape()),
        ));
    }
    let batch = Tensor::stack(images, 0)?;
    make_grid(&batch, config)
}

// (x - min) / (max - min) over the whole batch. A constant batch maps to 0.
// Integer batches are cast to F32 first.
fn normalized<B: Backend>(x: &Tensor<B>) -> Result<Tensor<B>> {
    let x = if x.dtype().is_float() {
        x.clone()
    } else {
        x.to_dtype(DType::F32)?
    };
    let lo = x.min_all()?;
    let hi = x.max_all()?;
    let range = hi - lo;
    if range > 0.0 {
        x.affine(1.0 / range, -lo / range)
    } else {
        x.affine(1.0, -lo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remap_cpu::{CpuDevice, CpuTensor};

    fn batch(values: &[f64], shape: (usize, usize, usize, usize)) -> CpuTensor {
        CpuTensor::from_f64_slice(values, shape, DType::F32, &CpuDevice).unwrap()
    }

    #[test]
    fn test_partial_last_row() {
        // Three 1x1 images, two per row, padding 1: the fourth cell is empty.
        let x = batch(&[10., 20., 30.], (3, 1, 1, 1));
        let cfg = MakeGridConfig::default().nrow(2).padding(1).pad_value(9.0);
        let g = make_grid(&x, &cfg).unwrap();
        assert_eq!(g.dims(), &[1, 5, 5]);
        #[rustfmt::skip]
        let expected = vec![
            9., 9.,  9., 9.,  9.,
            9., 10., 9., 20., 9.,
            9., 9.,  9., 9.,  9.,
            9., 30., 9., 9.,  9.,
            9., 9.,  9., 9.,  9.,
        ];
        assert_eq!(g.to_f64_vec().unwrap(), expected);
    }

    #[test]
    fn test_no_padding() {
        let x = batch(&[1., 2., 3., 4.], (2, 1, 1, 2));
        let cfg = MakeGridConfig::default().nrow(2).padding(0);
        let g = make_grid(&x, &cfg).unwrap();
        assert_eq!(g.dims(), &[1, 1, 4]);
        assert_eq!(g.to_f64_vec().unwrap(), vec![1., 2., 3., 4.]);
    }

    #[test]
    fn test_channels_and_default_nrow() {
        // One 2-channel 1x1 image on the default 8-wide canvas.
        let x = batch(&[5., 6.], (1, 2, 1, 1));
        let g = make_grid(&x, &MakeGridConfig::default()).unwrap();
        assert_eq!(g.dims(), &[2, 5, 8 * 3 + 2]);
        assert_eq!(g.get(&[0, 2, 2]).unwrap(), 5.0);
        assert_eq!(g.get(&[1, 2, 2]).unwrap(), 6.0);
        assert_eq!(g.get(&[0, 2, 5]).unwrap(), 0.0);
        assert_eq!(g.get(&[1, 0, 0]).unwrap(), 0.0);
    }

    #[test]
    fn test_normalize() {
        let x = batch(&[2., 4., 6., 10.], (4, 1, 1, 1));
        let cfg = MakeGridConfig::default().nrow(4).padding(0).normalize(true);
        let g = make_grid(&x, &cfg).unwrap();
        assert_eq!(g.to_f64_vec().unwrap(), vec![0., 0.25, 0.5, 1.]);

        let flat = batch(&[3., 3.], (2, 1, 1, 1));
        let g = make_grid(&flat, &cfg.clone().nrow(2)).unwrap();
        assert_eq!(g.to_f64_vec().unwrap(), vec![0., 0.]);
    }

    #[test]
    fn test_normalize_integer_batch() {
        let values = [0., 50., 100., 200.];
        let x = CpuTensor::from_f64_slice(&values, (4, 1, 1, 1), DType::U8, &CpuDevice).unwrap();
        let cfg = MakeGridConfig::default().nrow(4).padding(0).normalize(true);
        let g = make_grid(&x, &cfg).unwrap();
        assert_eq!(g.dtype(), DType::F32);
        assert_eq!(g.to_f64_vec().unwrap(), vec![0., 0.25, 0.5, 1.]);

        // without normalize the dtype is kept
        let g = make_grid(&x, &cfg.clone().normalize(false)).unwrap();
        assert_eq!(g.dtype(), DType::U8);
        assert_eq!(g.to_f64_vec().unwrap(), vec![0., 50., 100., 200.]);
    }

    #[test]
    fn test_empty_batch() {
        let x = CpuTensor::zeros((0, 1, 2, 2), DType::F32, &CpuDevice).unwrap();
        let cfg = MakeGridConfig::default().nrow(2).padding(1).pad_value(0.5);
        for normalize in [false, true] {
            let g = make_grid(&x, &cfg.clone().normalize(normalize)).unwrap();
            assert_eq!(g.dims(), &[1, 1, 7]);
            assert_eq!(g.to_f64_vec().unwrap(), vec![0.5; 7]);
        }
    }

    #[test]
    fn test_list_matches_batch() {
        let imgs: Vec<CpuTensor> = (0..3)
            .map(|k| CpuTensor::full((2, 2, 3), k as f64, DType::F32, &CpuDevice).unwrap())
            .collect();
        let cfg = MakeGridConfig::default().nrow(2);
        let from_list = make_grid_list(&imgs, &cfg).unwrap();
        let stacked = Tensor::stack(&imgs, 0).unwrap();
        let from_batch = make_grid(&stacked, &cfg).unwrap();
        assert_eq!(from_list.dims(), &[2, 2 * 4 + 2, 2 * 5 + 2]);
        assert_eq!(from_list.to_f64_vec().unwrap(), from_batch.to_f64_vec().unwrap());
    }

    #[test]
    fn test_bad_arguments() {
        let x = CpuTensor::zeros((2, 3, 4), DType::F32, &CpuDevice).unwrap();
        assert!(matches!(
            make_grid(&x, &MakeGridConfig::default()),
            Err(Error::InvalidArgument { op: "make_grid", .. })
        ));
        let x = CpuTensor::zeros((2, 1, 3, 3), DType::F32, &CpuDevice).unwrap();
        assert!(make_grid(&x, &MakeGridConfig::default().nrow(0)).is_err());
        assert!(make_grid_list::<remap_cpu::CpuBackend>(&[], &MakeGridConfig::default()).is_err());
    }
}
