//! # remap-expr
//!
//! Index expressions and the reindex evaluator.
//!
//! - [`Expr`]: typed expression over output-axis variables `i0, i1, …`,
//!   built with operators (`Expr::idx(0) % 3`) or parsed from text
//!   (`"i0 % 3".parse()`)
//! - [`Reindex`]: output shape + one expression per input axis + overflow
//!   policy, evaluated against any `Tensor<B: Backend>`
//! - [`ReindexConfig`]: parallelism and size limits for one evaluation

pub mod config;
pub mod expr;
mod parse;
pub mod reindex;

pub use config::ReindexConfig;
pub use expr::{BinOp, CmpOp, Expr, Fault};
pub use reindex::{evaluate, Reindex, ReindexExt};
