use log::debug;
use remap_core::{Backend, Error, Result, Shape, Tensor};
use remap_expr::{Expr, Reindex};

/// Broadcast `x` to `shape`.
///
/// Input axes are aligned with the trailing axes of `shape`; each must either
/// match or be 1. Leading axes of `shape` beyond the input rank are new.
pub fn expand<B: Backend>(x: &Tensor<B>, shape: impl Into<Shape>) -> Result<Tensor<B>> {
    let shape = shape.into();
    if shape.rank() < x.rank() {
        return Err(Error::invalid_argument(
            "expand",
            format!("cannot expand {} to lower rank shape {}", x.shape(), shape),
        ));
    }
    let lead = shape.rank() - x.rank();
    let mut indexes = Vec::with_capacity(x.rank());
    for (d, (&from, &to)) in x.dims().iter().zip(&shape.dims()[lead..]).enumerate() {
        if from == to && from != 1 {
            indexes.push(Expr::idx(lead + d));
        } else if from == 1 {
            indexes.push(Expr::from(0));
        } else {
            return Err(Error::invalid_argument(
                "expand",
                format!(
                    "axis {d} of {} has size {from}, expected 1 or {to} to expand to {}",
                    x.shape(),
                    shape
                ),
            ));
        }
    }

    debug!("expand {} -> {}", x.shape(), shape);
    Reindex::new(shape, indexes).evaluate(x)
}

/// Broadcast `x` to the shape of `other`.
pub fn expand_as<B: Backend>(x: &Tensor<B>, other: &Tensor<B>) -> Result<Tensor<B>> {
    expand(x, other.shape().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use remap_core::DType;
    use remap_cpu::{CpuDevice, CpuTensor};

    fn arange(shape: impl Into<Shape>) -> CpuTensor {
        CpuTensor::arange(shape, DType::F64, &CpuDevice).unwrap()
    }

    #[test]
    fn test_expand_column() {
        let x = arange((3, 1));
        let y = expand(&x, (3, 4)).unwrap();
        assert_eq!(y.dims(), &[3, 4]);
        assert_eq!(
            y.to_f64_vec().unwrap(),
            vec![0., 0., 0., 0., 1., 1., 1., 1., 2., 2., 2., 2.]
        );
    }

    #[test]
    fn test_expand_new_leading_axes() {
        let x = arange(2);
        let y = expand(&x, (2, 3, 2)).unwrap();
        assert_eq!(y.dims(), &[2, 3, 2]);
        assert_eq!(y.to_f64_vec().unwrap(), [0., 1.].repeat(6));

        let s = CpuTensor::full((), 5.0, DType::F32, &CpuDevice).unwrap();
        let y = expand(&s, (2, 2)).unwrap();
        assert_eq!(y.to_f64_vec().unwrap(), vec![5.; 4]);
    }

    #[test]
    fn test_expand_mismatch() {
        let x = arange((3, 2));
        assert!(matches!(
            expand(&x, (3, 4)),
            Err(Error::InvalidArgument { op: "expand", .. })
        ));
        assert!(matches!(
            expand(&x, 6),
            Err(Error::InvalidArgument { op: "expand", .. })
        ));
        // Same sizes expand trivially.
        assert_eq!(expand(&x, (3, 2)).unwrap().to_f64_vec().unwrap(), x.to_f64_vec().unwrap());
    }

    #[test]
    fn test_expand_as() {
        let x = arange((1, 3));
        let y = arange((2, 3));
        let z = expand_as(&x, &y).unwrap();
        assert_eq!(z.dims(), y.dims());
        assert_eq!(z.to_f64_vec().unwrap(), vec![0., 1., 2., 0., 1., 2.]);
    }
}
