use log::debug;
use remap_core::{Backend, Error, Result, Shape, Tensor};
use remap_expr::{Expr, Reindex};

/// Tile `x` `reps[d]` times along each axis.
///
/// Ranks are aligned from the right: extra leading reps add new leading
/// axes, missing leading reps count as 1.
///
/// ```text
/// [[1, 2]] repeat [2, 2] -> [[1, 2, 1, 2],
///                            [1, 2, 1, 2]]
/// ```
pub fn repeat<B: Backend>(x: &Tensor<B>, reps: &[usize]) -> Result<Tensor<B>> {
    let rank = x.rank().max(reps.len());
    let x_pad = rank - x.rank();
    let r_pad = rank - reps.len();

    let mut out = Vec::with_capacity(rank);
    for d in 0..rank {
        let size = if d < x_pad { 1 } else { x.dims()[d - x_pad] };
        let rep = if d < r_pad { 1 } else { reps[d - r_pad] };
        let n = size.checked_mul(rep).ok_or_else(|| {
            Error::invalid_argument(
                "repeat",
                format!("axis {d}: {size} * {rep} overflows usize"),
            )
        })?;
        out.push(n);
    }
    // A zero-size axis leaves nothing to read; keep the modulus non-zero.
    let indexes = x
        .dims()
        .iter()
        .enumerate()
        .map(|(d, &size)| Expr::idx(d + x_pad) % size.max(1))
        .collect();

    let shape = Shape::new(out);
    debug!("repeat {} by {:?} -> {}", x.shape(), reps, shape);
    Reindex::new(shape, indexes).evaluate(x)
}
