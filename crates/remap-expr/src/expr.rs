use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Not, Rem, Sub};

// Expr: typed index expressions over output-axis variables
//
// An index expression maps an output coordinate (i0, i1, …) to one source
// coordinate of the input, or, used as an overflow condition, to a truth
// value. All values are i64; comparisons and logical connectives produce
// 0 / 1 and any non-zero value counts as true. `&&` and `||` short-circuit,
// so `i0 != 0 && 12 / i0 > 3` never divides by zero.
//
// Division and remainder truncate toward zero, like the C arithmetic the
// reindex kernels historically compiled to: -7 / 2 == -3, -7 % 2 == -1.
//
// Expressions are built either with the operator overloads below
// (`Expr::idx(0) % 3`) or parsed from text (see `parse.rs`); `Display`
// prints a fully parenthesised form the parser reads back unchanged.

/// Integer arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
        }
    }

    /// Checked application; fails on overflow or a zero divisor.
    fn apply(&self, l: i64, r: i64) -> Result<i64, Fault> {
        match self {
            BinOp::Add => l.checked_add(r).ok_or(Fault::Overflow),
            BinOp::Sub => l.checked_sub(r).ok_or(Fault::Overflow),
            BinOp::Mul => l.checked_mul(r).ok_or(Fault::Overflow),
            BinOp::Div if r == 0 => Err(Fault::DivisionByZero),
            BinOp::Div => l.checked_div(r).ok_or(Fault::Overflow),
            BinOp::Rem if r == 0 => Err(Fault::DivisionByZero),
            BinOp::Rem => l.checked_rem(r).ok_or(Fault::Overflow),
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    fn apply(&self, l: i64, r: i64) -> bool {
        match self {
            CmpOp::Eq => l == r,
            CmpOp::Ne => l != r,
            CmpOp::Lt => l < r,
            CmpOp::Le => l <= r,
            CmpOp::Gt => l > r,
            CmpOp::Ge => l >= r,
        }
    }
}

/// Why evaluating an expression failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// `Idx(n)` with no n-th coordinate component.
    UnknownVariable(usize),
    DivisionByZero,
    Overflow,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::UnknownVariable(n) => write!(f, "unknown variable i{n}"),
            Fault::DivisionByZero => write!(f, "division by zero"),
            Fault::Overflow => write!(f, "arithmetic overflow"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Const(i64),
    /// Output axis variable: `Idx(0)` is `i0`.
    Idx(usize),
    Binary(BinOp, Box<Self>, Box<Self>),
    Cmp(CmpOp, Box<Self>, Box<Self>),
    And(Box<Self>, Box<Self>),
    Or(Box<Self>, Box<Self>),
    Not(Box<Self>),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(c) => write!(f, "{c}"),
            Expr::Idx(i) => write!(f, "i{i}"),
            Expr::Binary(op, l, r) => write!(f, "({l} {} {r})", op.symbol()),
            Expr::Cmp(op, l, r) => write!(f, "({l} {} {r})", op.symbol()),
            Expr::And(l, r) => write!(f, "({l} && {r})"),
            Expr::Or(l, r) => write!(f, "({l} || {r})"),
            Expr::Not(e) => write!(f, "!{e}"),
        }
    }
}

impl Expr {
    pub const TRUE: Expr = Expr::Const(1);
    pub const FALSE: Expr = Expr::Const(0);

    /// The output-axis variable `i{axis}`.
    pub fn idx(axis: usize) -> Self {
        Expr::Idx(axis)
    }

    /// One identity expression per axis: `[i0, i1, …, i{rank-1}]`.
    pub fn identity(rank: usize) -> Vec<Self> {
        (0..rank).map(Expr::Idx).collect()
    }

    pub fn as_const(&self) -> Option<i64> {
        match self {
            Expr::Const(v) => Some(*v),
            _ => None,
        }
    }

    fn cmp_with(self, op: CmpOp, rhs: impl Into<Expr>) -> Self {
        Expr::Cmp(op, Box::new(self), Box::new(rhs.into()))
    }

    pub fn equals(self, rhs: impl Into<Expr>) -> Self {
        self.cmp_with(CmpOp::Eq, rhs)
    }

    pub fn not_equals(self, rhs: impl Into<Expr>) -> Self {
        self.cmp_with(CmpOp::Ne, rhs)
    }

    pub fn lt(self, rhs: impl Into<Expr>) -> Self {
        self.cmp_with(CmpOp::Lt, rhs)
    }

    pub fn le(self, rhs: impl Into<Expr>) -> Self {
        self.cmp_with(CmpOp::Le, rhs)
    }

    pub fn gt(self, rhs: impl Into<Expr>) -> Self {
        self.cmp_with(CmpOp::Gt, rhs)
    }

    pub fn ge(self, rhs: impl Into<Expr>) -> Self {
        self.cmp_with(CmpOp::Ge, rhs)
    }

    pub fn and(self, rhs: impl Into<Expr>) -> Self {
        Expr::And(Box::new(self), Box::new(rhs.into()))
    }

    pub fn or(self, rhs: impl Into<Expr>) -> Self {
        Expr::Or(Box::new(self), Box::new(rhs.into()))
    }

    /// Largest axis variable referenced, if any.
    pub fn max_idx(&self) -> Option<usize> {
        match self {
            Expr::Const(_) => None,
            Expr::Idx(i) => Some(*i),
            Expr::Binary(_, l, r) | Expr::Cmp(_, l, r) | Expr::And(l, r) | Expr::Or(l, r) => {
                match (l.max_idx(), r.max_idx()) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                }
            }
            Expr::Not(e) => e.max_idx(),
        }
    }

    /// Whether some `/` or `%` has the literal `0` as its divisor.
    pub fn has_const_zero_divisor(&self) -> bool {
        match self {
            Expr::Const(_) | Expr::Idx(_) => false,
            Expr::Binary(op, l, r) => {
                (matches!(op, BinOp::Div | BinOp::Rem) && r.as_const() == Some(0))
                    || l.has_const_zero_divisor()
                    || r.has_const_zero_divisor()
            }
            Expr::Cmp(_, l, r) | Expr::And(l, r) | Expr::Or(l, r) => {
                l.has_const_zero_divisor() || r.has_const_zero_divisor()
            }
            Expr::Not(e) => e.has_const_zero_divisor(),
        }
    }

    /// Evaluate with `coord[n]` substituted for `i{n}`.
    pub fn eval(&self, coord: &[usize]) -> Result<i64, Fault> {
        match self {
            Expr::Const(c) => Ok(*c),
            Expr::Idx(i) => coord
                .get(*i)
                .map(|&c| c as i64)
                .ok_or(Fault::UnknownVariable(*i)),
            Expr::Binary(op, l, r) => op.apply(l.eval(coord)?, r.eval(coord)?),
            Expr::Cmp(op, l, r) => Ok(op.apply(l.eval(coord)?, r.eval(coord)?) as i64),
            Expr::And(l, r) => Ok((l.eval(coord)? != 0 && r.eval(coord)? != 0) as i64),
            Expr::Or(l, r) => Ok((l.eval(coord)? != 0 || r.eval(coord)? != 0) as i64),
            Expr::Not(e) => Ok((e.eval(coord)? == 0) as i64),
        }
    }

    /// Evaluate as a condition.
    pub fn eval_bool(&self, coord: &[usize]) -> Result<bool, Fault> {
        Ok(self.eval(coord)? != 0)
    }

    /// Constant folding and neutral-element removal.
    ///
    /// Never removes a sub-expression that could fail at evaluation time
    /// except where short-circuiting would skip it anyway, so the simplified
    /// expression reports the same faults as the original.
    pub fn simplify(self) -> Self {
        match self {
            Expr::Binary(op, l, r) => {
                let l = l.simplify();
                let r = r.simplify();
                match (op, l, r) {
                    (op, Expr::Const(a), Expr::Const(b)) => match op.apply(a, b) {
                        Ok(v) => Expr::Const(v),
                        Err(_) => Expr::Binary(op, Box::new(Expr::Const(a)), Box::new(Expr::Const(b))),
                    },
                    (BinOp::Add, Expr::Const(0), e)
                    | (BinOp::Add, e, Expr::Const(0))
                    | (BinOp::Sub, e, Expr::Const(0))
                    | (BinOp::Mul, Expr::Const(1), e)
                    | (BinOp::Mul, e, Expr::Const(1))
                    | (BinOp::Div, e, Expr::Const(1)) => e,
                    (op, l, r) => Expr::Binary(op, Box::new(l), Box::new(r)),
                }
            }
            Expr::Cmp(op, l, r) => match (l.simplify(), r.simplify()) {
                (Expr::Const(a), Expr::Const(b)) => Expr::Const(op.apply(a, b) as i64),
                (l, r) => Expr::Cmp(op, Box::new(l), Box::new(r)),
            },
            Expr::And(l, r) => match (l.simplify(), r.simplify()) {
                (Expr::Const(0), _) => Expr::FALSE,
                (Expr::Const(a), Expr::Const(b)) => Expr::Const((a != 0 && b != 0) as i64),
                (l, r) => l.and(r),
            },
            Expr::Or(l, r) => match (l.simplify(), r.simplify()) {
                (Expr::Const(a), _) if a != 0 => Expr::TRUE,
                (Expr::Const(a), Expr::Const(b)) => Expr::Const((a != 0 || b != 0) as i64),
                (l, r) => l.or(r),
            },
            Expr::Not(e) => match e.simplify() {
                Expr::Const(c) => Expr::Const((c == 0) as i64),
                e => !e,
            },
            other => other,
        }
    }
}

macro_rules! impl_from_integer_for_expr {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Expr {
                fn from(n: $t) -> Self {
                    Expr::Const(n as i64)
                }
            }
        )*
    };
}

impl_from_integer_for_expr!(u8, u16, u32, usize, i8, i16, i32, i64, isize);

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::Const(b as i64)
    }
}

macro_rules! impl_expr_binary_op {
    ($trait:ident, $fname:ident, $op:expr) => {
        impl<T: Into<Expr>> $trait<T> for Expr {
            type Output = Expr;
            fn $fname(self, rhs: T) -> Self::Output {
                Expr::Binary($op, Box::new(self), Box::new(rhs.into()))
            }
        }
    };
}

impl_expr_binary_op!(Add, add, BinOp::Add);
impl_expr_binary_op!(Sub, sub, BinOp::Sub);
impl_expr_binary_op!(Mul, mul, BinOp::Mul);
impl_expr_binary_op!(Div, div, BinOp::Div);
impl_expr_binary_op!(Rem, rem, BinOp::Rem);

impl Neg for Expr {
    type Output = Self;

    fn neg(self) -> Self::Output {
        match self {
            Expr::Const(c) if c != i64::MIN => Expr::Const(-c),
            e => Expr::Const(0) - e,
        }
    }
}

impl Not for Expr {
    type Output = Self;

    fn not(self) -> Self::Output {
        Expr::Not(Box::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn i(n: usize) -> Expr {
        Expr::idx(n)
    }

    #[rstest]
    #[case(Expr::Const(3), "3")]
    #[case(Expr::Const(-3), "-3")]
    #[case(i(0), "i0")]
    #[case(i(0) % 4, "(i0 % 4)")]
    #[case(Expr::from(5) - i(1), "(5 - i1)")]
    #[case(i(2).lt(i(1) + 1), "(i2 < (i1 + 1))")]
    #[case(i(0).equals(2).or(i(0).equals(4)), "((i0 == 2) || (i0 == 4))")]
    #[case(!i(0).ge(3), "!(i0 >= 3)")]
    fn test_display(#[case] expr: Expr, #[case] expected: &str) {
        assert_eq!(expr.to_string(), expected);
    }

    #[rstest]
    #[case(i(0) % 3, &[7], 1)]
    #[case(Expr::from(4) - i(0), &[1], 3)]
    #[case(i(0) * 10 + i(1), &[2, 3], 23)]
    #[case(i(1) / (i(0) + 2), &[1, 8], 2)]
    #[case(Expr::from(-7) / 2, &[], -3)]
    #[case(Expr::from(-7) % 2, &[], -1)]
    #[case(i(1).lt(i(0) + 1), &[2, 2], 1)]
    #[case(i(1).lt(i(0) + 1), &[2, 3], 0)]
    #[case(i(0).not_equals(0).and(Expr::from(12) / i(0)), &[0], 0)]
    #[case(i(0).equals(0).or(Expr::from(12) / i(0)), &[0], 1)]
    #[case(!i(0), &[0], 1)]
    fn test_eval(#[case] expr: Expr, #[case] coord: &[usize], #[case] expected: i64) {
        assert_eq!(expr.eval(coord), Ok(expected));
    }

    #[rstest]
    #[case(Expr::from(1) / i(0), &[0], Fault::DivisionByZero)]
    #[case(i(0) % (i(0) - 3), &[3], Fault::DivisionByZero)]
    #[case(i(2), &[0, 0], Fault::UnknownVariable(2))]
    #[case(Expr::from(i64::MAX) + i(0), &[1], Fault::Overflow)]
    #[case(Expr::from(i64::MIN) / -1, &[], Fault::Overflow)]
    fn test_eval_faults(#[case] expr: Expr, #[case] coord: &[usize], #[case] fault: Fault) {
        assert_eq!(expr.eval(coord), Err(fault));
    }

    #[rstest]
    #[case(Expr::from(2) * 3 + i(0), Expr::Const(6) + i(0))]
    #[case(i(0) + 0, i(0))]
    #[case(Expr::from(0) + i(0), i(0))]
    #[case(i(0) * 1 - 0, i(0))]
    #[case(i(0) / 1, i(0))]
    #[case(Expr::from(3).lt(4), Expr::TRUE)]
    #[case(Expr::FALSE.and(Expr::from(1) / i(0)), Expr::FALSE)]
    #[case(Expr::TRUE.or(i(0)), Expr::TRUE)]
    #[case(!Expr::from(5), Expr::FALSE)]
    #[case(Expr::from(1) / 0, Expr::from(1) / 0)]
    fn test_simplify(#[case] expr: Expr, #[case] expected: Expr) {
        assert_eq!(expr.simplify(), expected);
    }

    #[test]
    fn test_max_idx() {
        assert_eq!(Expr::Const(1).max_idx(), None);
        assert_eq!((i(0) + i(3) * i(1)).max_idx(), Some(3));
        assert_eq!((!i(2).lt(1)).max_idx(), Some(2));
    }

    #[test]
    fn test_const_zero_divisor() {
        assert!((i(0) % 0).has_const_zero_divisor());
        assert!(i(1).lt(Expr::from(3) / 0).has_const_zero_divisor());
        assert!(!(i(0) / i(1)).has_const_zero_divisor());
    }

    #[test]
    fn test_neg() {
        assert_eq!(-Expr::from(3), Expr::Const(-3));
        assert_eq!(-i(0), Expr::Const(0) - i(0));
        assert_eq!((-i(0)).eval(&[4]), Ok(-4));
    }

    #[test]
    fn test_identity() {
        assert_eq!(Expr::identity(3), vec![i(0), i(1), i(2)]);
        assert!(Expr::identity(0).is_empty());
    }
}
