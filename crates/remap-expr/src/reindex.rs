use log::{debug, trace};
use rayon::prelude::*;
use remap_core::{Backend, Error, Layout, Result, Shape, Source, Tensor};

use crate::config::ReindexConfig;
use crate::expr::{Expr, Fault};

// Reindex: the index-expression evaluator
//
// Given an input tensor, a target shape and one expression per input axis,
// every output coordinate c is resolved to either
//
//   fill                       if any overflow condition is true at c
//   input[e0(c), e1(c), …]     otherwise
//
// and a source coordinate outside the input is an IndexOutOfRange error.
//
// Evaluation runs in three phases, and nothing is allocated until the last:
//
//   1. compile  check the expression count against the input rank, reject
//               unknown variables, fold constants, reject constant zero
//               divisors
//   2. resolve  turn every output position into a `Source` (storage offset
//               in the input, or None for fill). Large outputs are resolved
//               in parallel over row-major chunks; chunks are combined in
//               order, so the error reported is always the one at the lowest
//               output position no matter how the work was split.
//   3. take     hand the plan to `Backend::take`, which copies typed values
//
// The input is addressed through its layout, so strided views need no copy.

/// A reindex operation: output shape, per-axis source expressions and the
/// overflow policy.
///
/// ```ignore
/// // repeat a [2, 3] tensor into [4, 3]
/// let out = Reindex::new((4, 3), vec![Expr::idx(0) % 2, Expr::idx(1)]).evaluate(&x)?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Reindex {
    shape: Shape,
    indexes: Vec<Expr>,
    overflow_conditions: Vec<Expr>,
    overflow_value: f64,
}

impl Reindex {
    pub fn new(shape: impl Into<Shape>, indexes: Vec<Expr>) -> Self {
        Reindex {
            shape: shape.into(),
            indexes,
            overflow_conditions: Vec::new(),
            overflow_value: 0.0,
        }
    }

    /// Build from textual index expressions, e.g. `&["i0 % 2", "i1"]`.
    pub fn parse(shape: impl Into<Shape>, indexes: &[&str]) -> Result<Self> {
        let indexes = indexes
            .iter()
            .map(|src| Expr::parse(src))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(shape, indexes))
    }

    pub fn overflow_condition(mut self, cond: Expr) -> Self {
        self.overflow_conditions.push(cond);
        self
    }

    pub fn overflow_conditions(mut self, conds: impl IntoIterator<Item = Expr>) -> Self {
        self.overflow_conditions.extend(conds);
        self
    }

    /// Add a textual overflow condition, e.g. `"i1 < i0"`.
    pub fn parse_overflow_condition(self, src: &str) -> Result<Self> {
        Ok(self.overflow_condition(Expr::parse(src)?))
    }

    pub fn overflow_value(mut self, value: f64) -> Self {
        self.overflow_value = value;
        self
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn indexes(&self) -> &[Expr] {
        &self.indexes
    }

    pub fn conditions(&self) -> &[Expr] {
        &self.overflow_conditions
    }

    pub fn fill(&self) -> f64 {
        self.overflow_value
    }

    /// Evaluate with the default configuration.
    pub fn evaluate<B: Backend>(&self, input: &Tensor<B>) -> Result<Tensor<B>> {
        self.evaluate_with(input, &ReindexConfig::default())
    }

    pub fn evaluate_with<B: Backend>(
        &self,
        input: &Tensor<B>,
        config: &ReindexConfig,
    ) -> Result<Tensor<B>> {
        let elems = self.shape.checked_elem_count().ok_or_else(|| {
            Error::invalid_argument("reindex", format!("output shape {} overflows usize", self.shape))
        })?;
        config.validate(elems)?;
        let compiled = self.compile(input.rank())?;
        let parallel = config.use_parallel(elems);
        debug!(
            "reindex {} -> {}: {} indexes, {} overflow conditions, {} elements ({})",
            input.shape(),
            self.shape,
            compiled.indexes.len(),
            compiled.conditions.len(),
            elems,
            if parallel { "parallel" } else { "sequential" },
        );
        let plan = if parallel {
            compiled.resolve_parallel(input.layout(), &self.shape, elems, config.chunk_size)?
        } else {
            compiled.resolve_range(input.layout(), &self.shape, 0, elems)?
        };
        input.take(self.shape.clone(), &plan, self.overflow_value)
    }

    fn compile(&self, input_rank: usize) -> Result<Compiled> {
        if self.indexes.len() != input_rank {
            return Err(Error::ShapeMismatch {
                indexes: self.indexes.len(),
                rank: input_rank,
            });
        }
        let out_rank = self.shape.rank();
        let prepare = |expr: &Expr| -> Result<Expr> {
            if let Some(n) = expr.max_idx() {
                if n >= out_rank {
                    return Err(Error::invalid_expression(
                        expr,
                        format!("unknown variable i{n}: output has rank {out_rank}"),
                    ));
                }
            }
            let simplified = expr.clone().simplify();
            if simplified.has_const_zero_divisor() {
                return Err(Error::invalid_expression(expr, "division by zero"));
            }
            Ok(simplified)
        };
        let compiled = Compiled {
            indexes: self.indexes.iter().map(prepare).collect::<Result<_>>()?,
            conditions: self
                .overflow_conditions
                .iter()
                .map(prepare)
                .collect::<Result<_>>()?,
        };
        for (axis, e) in compiled.indexes.iter().enumerate() {
            trace!("reindex index[{axis}] = {e}");
        }
        for (k, e) in compiled.conditions.iter().enumerate() {
            trace!("reindex overflow[{k}] = {e}");
        }
        Ok(compiled)
    }
}

struct Compiled {
    indexes: Vec<Expr>,
    conditions: Vec<Expr>,
}

impl Compiled {
    fn resolve_parallel(
        &self,
        layout: &Layout,
        shape: &Shape,
        elems: usize,
        chunk_size: usize,
    ) -> Result<Vec<Source>> {
        let chunks: Vec<Result<Vec<Source>>> = (0..elems.div_ceil(chunk_size))
            .into_par_iter()
            .map(|k| {
                let start = k * chunk_size;
                self.resolve_range(layout, shape, start, (start + chunk_size).min(elems))
            })
            .collect();
        let mut plan = Vec::with_capacity(elems);
        for chunk in chunks {
            plan.extend(chunk?);
        }
        Ok(plan)
    }

    /// Resolve output positions `start..end` in row-major order.
    fn resolve_range(
        &self,
        layout: &Layout,
        shape: &Shape,
        start: usize,
        end: usize,
    ) -> Result<Vec<Source>> {
        let mut plan = Vec::with_capacity(end.saturating_sub(start));
        if start >= end {
            return Ok(plan);
        }
        let dims = shape.dims();
        let mut coord = shape.unravel(start);
        let mut source = vec![0i64; self.indexes.len()];
        for pos in start..end {
            plan.push(self.resolve_one(layout, &coord, &mut source)?);
            if pos + 1 < end {
                advance(&mut coord, dims);
            }
        }
        Ok(plan)
    }

    fn resolve_one(&self, layout: &Layout, coord: &[usize], source: &mut [i64]) -> Result<Source> {
        for cond in &self.conditions {
            if cond.eval_bool(coord).map_err(|f| fault(cond, f, coord))? {
                return Ok(None);
            }
        }
        for (s, expr) in source.iter_mut().zip(&self.indexes) {
            *s = expr.eval(coord).map_err(|f| fault(expr, f, coord))?;
        }
        layout.source_offset(source, coord).map(Some)
    }
}

fn fault(expr: &Expr, fault: Fault, coord: &[usize]) -> Error {
    Error::invalid_expression(expr, format!("{fault} at output coordinate {coord:?}"))
}

// Row-major odometer step.
fn advance(coord: &mut [usize], dims: &[usize]) {
    for (c, &d) in coord.iter_mut().zip(dims).rev() {
        *c += 1;
        if *c < d {
            return;
        }
        *c = 0;
    }
}

/// Evaluate a reindex in one call.
pub fn evaluate<B: Backend>(
    input: &Tensor<B>,
    shape: impl Into<Shape>,
    indexes: Vec<Expr>,
    overflow_conditions: Vec<Expr>,
    overflow_value: f64,
) -> Result<Tensor<B>> {
    Reindex::new(shape, indexes)
        .overflow_conditions(overflow_conditions)
        .overflow_value(overflow_value)
        .evaluate(input)
}

/// `tensor.reindex(&op)` as a method on any tensor.
pub trait ReindexExt<B: Backend> {
    fn reindex(&self, op: &Reindex) -> Result<Tensor<B>>;

    fn reindex_with(&self, op: &Reindex, config: &ReindexConfig) -> Result<Tensor<B>>;
}

impl<B: Backend> ReindexExt<B> for Tensor<B> {
    fn reindex(&self, op: &Reindex) -> Result<Tensor<B>> {
        op.evaluate(self)
    }

    fn reindex_with(&self, op: &Reindex, config: &ReindexConfig) -> Result<Tensor<B>> {
        op.evaluate_with(self, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remap_core::DType;
    use remap_cpu::{CpuDevice, CpuTensor};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn i(n: usize) -> Expr {
        Expr::idx(n)
    }

    fn arange(shape: impl Into<Shape>) -> CpuTensor {
        CpuTensor::arange(shape, DType::F32, &CpuDevice).unwrap()
    }

    #[test]
    fn test_identity() {
        init_logger();
        let x = arange((2, 3));
        let y = Reindex::new((2, 3), Expr::identity(2)).evaluate(&x).unwrap();
        assert_eq!(y.dims(), &[2, 3]);
        assert_eq!(y.dtype(), DType::F32);
        assert_eq!(y.to_f64_vec().unwrap(), x.to_f64_vec().unwrap());
    }

    #[test]
    fn test_modulo_tiling() {
        let x = arange(3);
        let y = Reindex::new(7, vec![i(0) % 3]).evaluate(&x).unwrap();
        assert_eq!(y.to_f64_vec().unwrap(), vec![0., 1., 2., 0., 1., 2., 0.]);
    }

    #[test]
    fn test_parse_and_transpose_by_expression() {
        let x = arange((2, 3));
        let y = Reindex::parse((3, 2), &["i1", "i0"]).unwrap().evaluate(&x).unwrap();
        assert_eq!(y.to_f64_vec().unwrap(), vec![0., 3., 1., 4., 2., 5.]);
    }

    #[test]
    fn test_overflow_condition_fills() {
        let x = arange(4);
        let y = Reindex::new(6, vec![i(0) - 1])
            .overflow_condition(i(0).lt(1).or(i(0).ge(5)))
            .overflow_value(-1.0)
            .evaluate(&x)
            .unwrap();
        assert_eq!(y.to_f64_vec().unwrap(), vec![-1., 0., 1., 2., 3., -1.]);
    }

    #[test]
    fn test_overflow_skips_index_evaluation() {
        // Division by i0 only happens where i0 != 0.
        let x = arange(7);
        let y = Reindex::new(4, vec![Expr::from(6) / i(0)])
            .overflow_condition(i(0).equals(0))
            .evaluate(&x)
            .unwrap();
        assert_eq!(y.to_f64_vec().unwrap(), vec![0., 6., 3., 2.]);
    }

    #[test]
    fn test_shape_mismatch() {
        let x = arange((2, 3));
        let err = Reindex::new(6, vec![i(0)]).evaluate(&x).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { indexes: 1, rank: 2 }));
    }

    #[test]
    fn test_unknown_variable() {
        let x = arange(3);
        let err = Reindex::new(3, vec![i(1)]).evaluate(&x).unwrap_err();
        assert!(matches!(err, Error::InvalidExpression { .. }), "{err}");
        let err = Reindex::new(3, vec![i(0)])
            .overflow_condition(i(4).gt(0))
            .evaluate(&x)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidExpression { .. }), "{err}");
    }

    #[test]
    fn test_constant_zero_divisor_rejected_at_compile() {
        // No output position would reach it, but it is still rejected.
        let x = arange(3);
        let err = Reindex::new(0, vec![i(0) / (Expr::from(2) - 2)])
            .evaluate(&x)
            .unwrap_err();
        match err {
            Error::InvalidExpression { reason, .. } => assert_eq!(reason, "division by zero"),
            other => panic!("expected InvalidExpression, got {other:?}"),
        }
    }

    #[test]
    fn test_runtime_zero_divisor() {
        let x = arange(3);
        let err = Reindex::new(3, vec![Expr::from(2) % (i(0) - 1)])
            .evaluate(&x)
            .unwrap_err();
        match err {
            Error::InvalidExpression { expr, reason } => {
                assert_eq!(expr, "(2 % (i0 - 1))");
                assert!(reason.contains("division by zero"), "{reason}");
                assert!(reason.contains("[1]"), "{reason}");
            }
            other => panic!("expected InvalidExpression, got {other:?}"),
        }
    }

    #[test]
    fn test_index_out_of_range_reports_first_position() {
        let x = arange((2, 2));
        let err = Reindex::new((2, 3), vec![i(0), i(1)]).evaluate(&x).unwrap_err();
        match err {
            Error::IndexOutOfRange {
                axis,
                index,
                size,
                coord,
            } => {
                assert_eq!((axis, index, size), (1, 2, 2));
                assert_eq!(coord, vec![0, 2]);
            }
            other => panic!("expected IndexOutOfRange, got {other:?}"),
        }
        let err = Reindex::new(2, vec![i(0) - 1]).evaluate(&arange(2)).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { index: -1, .. }));
    }

    #[test]
    fn test_scalar_and_empty() {
        let s = CpuTensor::full((), 7.0, DType::I64, &CpuDevice).unwrap();
        let y = Reindex::new(3, vec![]).evaluate(&s).unwrap();
        assert_eq!(y.to_f64_vec().unwrap(), vec![7., 7., 7.]);

        let x = arange((2, 3));
        let y = Reindex::new((), vec![Expr::from(1), Expr::from(2)])
            .evaluate(&x)
            .unwrap();
        assert_eq!(y.to_scalar_f64().unwrap(), 5.0);

        let y = Reindex::new((0, 4), Expr::identity(2)).evaluate(&x).unwrap();
        assert_eq!(y.elem_count(), 0);

        // An empty input can only be fully overflowed.
        let e = arange((0, 2));
        let y = Reindex::new(2, vec![i(0), i(0)])
            .overflow_condition(Expr::TRUE)
            .overflow_value(4.0)
            .evaluate(&e)
            .unwrap();
        assert_eq!(y.to_f64_vec().unwrap(), vec![4., 4.]);
        assert!(Reindex::new(2, vec![i(0), i(0)]).evaluate(&e).is_err());
    }

    #[test]
    fn test_strided_input() {
        let x = arange((2, 3)).transpose(0, 1).unwrap();
        let y = Reindex::new((3, 2), Expr::identity(2)).evaluate(&x).unwrap();
        assert_eq!(y.to_f64_vec().unwrap(), vec![0., 3., 1., 4., 2., 5.]);

        let n = arange((4, 4)).narrow(1, 1, 2).unwrap();
        let y = Reindex::new(4, vec![i(0), Expr::from(1)]).evaluate(&n).unwrap();
        assert_eq!(y.to_f64_vec().unwrap(), vec![2., 6., 10., 14.]);
    }

    #[test]
    fn test_fill_cast_to_input_dtype() {
        let x = CpuTensor::zeros(2, DType::U8, &CpuDevice).unwrap();
        let y = Reindex::new(3, vec![i(0)])
            .overflow_condition(i(0).equals(2))
            .overflow_value(300.0)
            .evaluate(&x)
            .unwrap();
        assert_eq!(y.dtype(), DType::U8);
        assert_eq!(y.to_f64_vec().unwrap(), vec![0., 0., 255.]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        init_logger();
        let x = arange((5, 7));
        let op = Reindex::new((40, 35, 3), vec![i(0) % 5, (i(1) + i(2)) % 7]);
        let seq = op
            .evaluate_with(&x, &ReindexConfig::default().sequential())
            .unwrap();
        let par = op
            .evaluate_with(&x, &ReindexConfig::default().parallel_threshold(0).chunk_size(97))
            .unwrap();
        assert_eq!(seq.to_f64_vec().unwrap(), par.to_f64_vec().unwrap());
    }

    #[test]
    fn test_parallel_reports_lowest_error() {
        let x = arange(100);
        // Every position >= 50 is out of range; 50 is reported on any split.
        let op = Reindex::new(1000, vec![i(0) + 50]);
        for chunk in [1, 7, 64, 999] {
            let cfg = ReindexConfig::default().parallel_threshold(0).chunk_size(chunk);
            let err = op.evaluate_with(&x, &cfg).unwrap_err();
            match err {
                Error::IndexOutOfRange { coord, .. } => assert_eq!(coord, vec![50]),
                other => panic!("expected IndexOutOfRange, got {other:?}"),
            }
        }
        let op = Reindex::new(1000, vec![i(0) % 100]).overflow_condition(i(0).lt(0));
        assert!(op.evaluate(&x).is_ok());
    }

    #[test]
    fn test_max_output_elems() {
        let x = arange(2);
        let cfg = ReindexConfig::default().max_output_elems(10);
        let err = Reindex::new(11, vec![i(0) % 2])
            .evaluate_with(&x, &cfg)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn test_free_function_and_ext_trait() {
        let x = arange(3);
        let a = evaluate(&x, 5, vec![Expr::from(2) - i(0)], vec![i(0).gt(2)], 9.0).unwrap();
        assert_eq!(a.to_f64_vec().unwrap(), vec![2., 1., 0., 9., 9.]);
        let op = Reindex::new(2, vec![i(0) + 1]);
        let b = x.reindex(&op).unwrap();
        assert_eq!(b.to_f64_vec().unwrap(), vec![1., 2.]);
        let c = x
            .reindex_with(&op, &ReindexConfig::default().sequential())
            .unwrap();
        assert_eq!(c.to_f64_vec().unwrap(), vec![1., 2.]);
    }

    #[test]
    fn test_deterministic() {
        let x = CpuTensor::rand((6, 5), DType::F64, &CpuDevice).unwrap();
        let op = Reindex::new((5, 6), vec![i(1), Expr::from(4) - i(0)]);
        let a = op.evaluate(&x).unwrap().to_f64_vec().unwrap();
        let b = op.evaluate(&x).unwrap().to_f64_vec().unwrap();
        assert_eq!(
            a.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
            b.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
        );
    }
}
