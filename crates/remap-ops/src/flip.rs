use log::debug;
use remap_core::{Backend, Result, Tensor};
use remap_expr::{Expr, Reindex};

/// Reverse `x` along `dim`. Negative `dim` counts from the last axis.
pub fn flip<B: Backend>(x: &Tensor<B>, dim: isize) -> Result<Tensor<B>> {
    let axis = x.shape().normalize_axis(dim)?;
    let size = x.dims()[axis] as i64;
    let mut indexes = Expr::identity(x.rank());
    indexes[axis] = Expr::from(size - 1) - Expr::idx(axis);

    debug!("flip {} along axis {}", x.shape(), axis);
    Reindex::new(x.shape().clone(), indexes).evaluate(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use remap_core::{DType, Error};
    use remap_cpu::{CpuDevice, CpuTensor};

    #[test]
    fn test_flip_rows_and_cols() {
        let x = CpuTensor::arange((2, 3), DType::I64, &CpuDevice).unwrap();
        let rows = flip(&x, 0).unwrap();
        assert_eq!(rows.to_f64_vec().unwrap(), vec![3., 4., 5., 0., 1., 2.]);
        let cols = flip(&x, -1).unwrap();
        assert_eq!(cols.to_f64_vec().unwrap(), vec![2., 1., 0., 5., 4., 3.]);
        assert_eq!(cols.dtype(), DType::I64);
    }

    #[test]
    fn test_flip_twice_is_identity() {
        let x = CpuTensor::rand((3, 4, 2), DType::F32, &CpuDevice).unwrap();
        for dim in [0, 1, 2, -1] {
            let back = flip(&flip(&x, dim).unwrap(), dim).unwrap();
            assert_eq!(back.to_f64_vec().unwrap(), x.to_f64_vec().unwrap());
        }
    }

    #[test]
    fn test_flip_bad_dim() {
        let x = CpuTensor::arange((2, 3), DType::F32, &CpuDevice).unwrap();
        assert!(matches!(flip(&x, 2), Err(Error::DimOutOfRange { .. })));
        assert!(matches!(flip(&x, -3), Err(Error::DimOutOfRange { .. })));
    }
}
