use log::debug;
use remap_core::{Backend, Error, Result, Tensor};
use remap_expr::{Expr, Reindex};

/// Copy of `x` with every slice `indices[k]` along `dim` set to `value`.
///
/// Indices may repeat; an empty list returns an unchanged copy.
pub fn index_fill<B: Backend>(
    x: &Tensor<B>,
    dim: usize,
    indices: &[usize],
    value: f64,
) -> Result<Tensor<B>> {
    if dim >= x.rank() {
        return Err(Error::DimOutOfRange {
            dim,
            rank: x.rank(),
        });
    }
    let size = x.dims()[dim];
    if let Some(&bad) = indices.iter().find(|&&i| i >= size) {
        return Err(Error::invalid_argument(
            "index_fill",
            format!("index {bad} is out of range for axis {dim} of size {size}"),
        ));
    }

    debug!(
        "index_fill {} axis {} at {:?} with {}",
        x.shape(),
        dim,
        indices,
        value
    );
    Reindex::new(x.shape().clone(), Expr::identity(x.rank()))
        .overflow_conditions(indices.iter().map(|&i| Expr::idx(dim).equals(i)))
        .overflow_value(value)
        .evaluate(x)
}
