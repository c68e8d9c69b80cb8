use crate::shape::Shape;

/// All errors that can occur within remap.
///
/// One enum covers the evaluator's own failure modes (expression count,
/// malformed expressions, out-of-range source coordinates), precondition
/// failures of the derived operations, and the tensor-level errors of the
/// storage backend. Using a single error type keeps `?` propagation uniform
/// across the workspace.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The number of index expressions differs from the input rank.
    #[error("shape mismatch: {indexes} index expressions for an input of rank {rank}")]
    ShapeMismatch { indexes: usize, rank: usize },

    /// An index expression or overflow condition is malformed or cannot be
    /// evaluated (unknown variable, division by zero, arithmetic overflow).
    #[error("invalid expression `{expr}`: {reason}")]
    InvalidExpression { expr: String, reason: String },

    /// A computed source coordinate escapes the input bounds and no overflow
    /// condition caught it.
    #[error(
        "index out of range: source index {index} on axis {axis} (size {size}) at output coordinate {coord:?}"
    )]
    IndexOutOfRange {
        axis: usize,
        index: i64,
        size: usize,
        coord: Vec<usize>,
    },

    /// A derived operation was called with arguments it does not accept.
    #[error("{op}: {msg}")]
    InvalidArgument { op: &'static str, msg: String },

    /// Operation requires a specific rank (number of dimensions).
    #[error("rank mismatch: expected rank {expected}, got {got}")]
    RankMismatch { expected: usize, got: usize },

    /// DType mismatch between tensors.
    #[error("dtype mismatch: expected {expected:?}, got {got:?}")]
    DTypeMismatch {
        expected: crate::DType,
        got: crate::DType,
    },

    /// Dimension index out of range for the tensor's rank.
    #[error("dimension out of range: dim {dim} for tensor with {rank} dimensions")]
    DimOutOfRange { dim: usize, rank: usize },

    /// Narrow/slice operation out of bounds.
    #[error("narrow out of bounds: dim {dim}, start {start}, len {len}, dim_size {dim_size}")]
    NarrowOutOfBounds {
        dim: usize,
        start: usize,
        len: usize,
        dim_size: usize,
    },

    /// Tried to access a scalar from a non-scalar tensor.
    #[error("not a scalar: tensor has shape {shape}")]
    NotAScalar { shape: Shape },

    /// Element count mismatch when creating from a vec.
    #[error("element count mismatch: shape {shape} requires {expected} elements, got {got}")]
    ElementCountMismatch {
        shape: Shape,
        expected: usize,
        got: usize,
    },

    /// Cannot reshape because element counts differ.
    #[error(
        "cannot reshape: source has {src} elements, target shape {dst_shape} has {dst} elements"
    )]
    ReshapeElementMismatch {
        src: usize,
        dst: usize,
        dst_shape: Shape,
    },

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }

    /// Precondition failure of a derived operation.
    pub fn invalid_argument(op: &'static str, msg: impl Into<String>) -> Self {
        Error::InvalidArgument {
            op,
            msg: msg.into(),
        }
    }

    /// Failure while compiling or evaluating an expression.
    pub fn invalid_expression(expr: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidExpression {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }
}

/// Convenience Result type used throughout remap.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}
