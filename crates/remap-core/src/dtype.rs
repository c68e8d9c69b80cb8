use std::fmt;

// DType: Element types a tensor can hold
//
// The evaluator never interprets element values: it copies them from the
// input to the output, or writes the overflow value. The only numeric work
// is casting that overflow value (an f64) to the input's element type, which
// goes through `WithDType::from_f64` and therefore follows Rust `as`
// semantics (saturating for integers, NaN becomes 0).
//
//   F16 / BF16: half floats (via the `half` crate)
//   F32 / F64 : IEEE floats
//   U8        : bytes, image data and boolean masks
//   U32 / I64 : indices and labels

/// Enum of all supported element data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F16,
    BF16,
    F32,
    F64,
    U8,
    U32,
    I64,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::F16 | DType::BF16 => 2,
            DType::F32 | DType::U32 => 4,
            DType::F64 | DType::I64 => 8,
            DType::U8 => 1,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DType::F16 | DType::BF16 | DType::F32 | DType::F64)
    }

    pub fn is_integer(&self) -> bool {
        !self.is_float()
    }

    /// Cast an f64 to the value this dtype would actually store.
    ///
    /// `DType::U8.round_trip(300.0) == 255.0`; useful to predict what a fill
    /// value turns into without allocating a tensor.
    pub fn round_trip(&self, v: f64) -> f64 {
        match self {
            DType::F16 => half::f16::from_f64(v).to_f64(),
            DType::BF16 => half::bf16::from_f64(v).to_f64(),
            DType::F32 => f32::from_f64(v).to_f64(),
            DType::F64 => v,
            DType::U8 => u8::from_f64(v).to_f64(),
            DType::U32 => u32::from_f64(v).to_f64(),
            DType::I64 => i64::from_f64(v).to_f64(),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::F16 => "f16",
            DType::BF16 => "bf16",
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::U8 => "u8",
            DType::U32 => "u32",
            DType::I64 => "i64",
        };
        write!(f, "{}", s)
    }
}

/// Trait implemented by Rust types that can be stored in a tensor.
///
/// Maps the concrete Rust type to its `DType` tag and provides the f64
/// conversions used for fills and for host-side inspection.
pub trait WithDType: Copy + Send + Sync + 'static + num_traits::NumCast + fmt::Debug {
    const DTYPE: DType;

    fn to_f64(self) -> f64;

    fn from_f64(v: f64) -> Self;

    fn zero() -> Self {
        Self::from_f64(0.0)
    }
}

macro_rules! with_dtype_as {
    ($t:ty, $dtype:ident) => {
        impl WithDType for $t {
            const DTYPE: DType = DType::$dtype;
            fn to_f64(self) -> f64 {
                self as f64
            }
            fn from_f64(v: f64) -> Self {
                v as $t
            }
        }
    };
}

with_dtype_as!(f32, F32);
with_dtype_as!(f64, F64);
with_dtype_as!(u8, U8);
with_dtype_as!(u32, U32);
with_dtype_as!(i64, I64);

impl WithDType for half::f16 {
    const DTYPE: DType = DType::F16;
    fn to_f64(self) -> f64 {
        self.to_f32() as f64
    }
    fn from_f64(v: f64) -> Self {
        half::f16::from_f64(v)
    }
}

impl WithDType for half::bf16 {
    const DTYPE: DType = DType::BF16;
    fn to_f64(self) -> f64 {
        self.to_f32() as f64
    }
    fn from_f64(v: f64) -> Self {
        half::bf16::from_f64(v)
    }
}
