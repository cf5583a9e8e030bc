//! Matrix element type constraints
//!
//! This module defines the trait that constrains what types can be
//! stored as values of a chunked matrix.

/// Trait for types that can be stored as matrix elements
///
/// All matrix element types must be:
/// - Copy: Can be copied without allocation
/// - PartialOrd: Can be ranked for min/max and medians
/// - Send + Sync: Can be read from parallel workers
///
/// Statistics are always accumulated in `f64`, so every element type
/// provides a lossless-enough round trip through `f64`.
pub trait MatrixElement: Copy + Clone + PartialEq + PartialOrd + Send + Sync + Sized + 'static {
    /// Get the size in bytes of this element type
    fn size_bytes() -> usize {
        core::mem::size_of::<Self>()
    }

    /// The additive identity, used to zero-fill densified output
    fn zero() -> Self;

    /// Convert from f64 for generic construction
    fn from_f64(value: f64) -> Self;

    /// Convert to f64 for generic operations
    fn to_f64(self) -> f64;

    /// Whether this value is a NaN. Always false for integers.
    fn is_nan(self) -> bool {
        false
    }
}

macro_rules! impl_float_element {
    ($($t:ty),*) => {
        $(
            impl MatrixElement for $t {
                fn zero() -> Self {
                    0.0
                }

                fn from_f64(value: f64) -> Self {
                    value as $t
                }

                fn to_f64(self) -> f64 {
                    self as f64
                }

                fn is_nan(self) -> bool {
                    <$t>::is_nan(self)
                }
            }
        )*
    };
}

macro_rules! impl_integer_element {
    ($($t:ty),*) => {
        $(
            impl MatrixElement for $t {
                fn zero() -> Self {
                    0
                }

                fn from_f64(value: f64) -> Self {
                    value as $t
                }

                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_float_element!(f32, f64);
impl_integer_element!(i32, i64, u16, u32, u64);
