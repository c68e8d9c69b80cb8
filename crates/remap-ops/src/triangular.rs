use log::debug;
use remap_core::{Backend, Error, Result, Tensor};
use remap_expr::{Expr, Reindex};

// Upper / lower triangle over the last two axes.
//
// With row r = i(rank-2) and column c = i(rank-1), triu keeps c - r >= k and
// tril keeps c - r <= k; everything else is overflowed to 0. Leading axes
// are batch axes. c - r is bounded by the dims, so any k is accepted.

#[derive(Clone, Copy, Debug)]
enum Triangle {
    Upper,
    Lower,
}

fn triangle<B: Backend>(x: &Tensor<B>, diagonal: i64, which: Triangle) -> Result<Tensor<B>> {
    let op = match which {
        Triangle::Upper => "triu",
        Triangle::Lower => "tril",
    };
    let rank = x.rank();
    if rank < 2 {
        return Err(Error::invalid_argument(
            op,
            format!("requires rank >= 2, got {rank}"),
        ));
    }
    let row = Expr::idx(rank - 2);
    let col = Expr::idx(rank - 1);
    let offset = col - row;
    let dropped = match which {
        Triangle::Upper => offset.lt(diagonal),
        Triangle::Lower => offset.gt(diagonal),
    };

    debug!("{} {} diagonal {}", op, x.shape(), diagonal);
    Reindex::new(x.shape().clone(), Expr::identity(rank))
        .overflow_condition(dropped)
        .evaluate(x)
}

/// Zero the elements below the `diagonal`-th diagonal of the last two axes.
pub fn triu<B: Backend>(x: &Tensor<B>, diagonal: i64) -> Result<Tensor<B>> {
    triangle(x, diagonal, Triangle::Upper)
}

/// Zero the elements above the `diagonal`-th diagonal of the last two axes.
pub fn tril<B: Backend>(x: &Tensor<B>, diagonal: i64) -> Result<Tensor<B>> {
    triangle(x, diagonal, Triangle::Lower)
}
