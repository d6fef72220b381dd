//! Missing data sentinels.
//!
//! Observation arrays mark missing data with an in-band sentinel value, one
//! per element kind. Reductions skip sentinel entries, and numeric
//! conversions must remap the sentinel of the source kind onto the sentinel
//! of the destination kind rather than casting it.

use ndarray::ArrayD;
use time::macros::datetime;
use time::OffsetDateTime;

/// Missing sentinel for datetime data: the end of representable time.
pub const MISSING_DATETIME: OffsetDateTime = datetime!(9999-12-31 23:59:59 UTC);

/// An element kind with an in-band missing-value sentinel.
pub trait MissingValue: PartialEq + Sized {
    /// The sentinel marking a missing entry.
    fn missing() -> Self;

    /// Whether this value equals the sentinel.
    ///
    /// Exact sentinel comparison, also for floating point kinds: the
    /// sentinels are finite values, so equality is well defined.
    fn is_missing(&self) -> bool {
        *self == Self::missing()
    }
}

impl MissingValue for i32 {
    fn missing() -> Self {
        i32::MIN
    }
}

impl MissingValue for f32 {
    fn missing() -> Self {
        f32::MIN
    }
}

impl MissingValue for f64 {
    fn missing() -> Self {
        f64::MIN
    }
}

impl MissingValue for String {
    fn missing() -> Self {
        "*** MISSING ***".to_string()
    }
}

impl MissingValue for OffsetDateTime {
    fn missing() -> Self {
        MISSING_DATETIME
    }
}

/// Trait for numeric array elements.
///
/// Covers the kinds reductions and sentinel-remapping conversions are
/// defined over.
pub trait NumericElement:
    Copy + PartialOrd + MissingValue + num_traits::NumCast + num_traits::ToPrimitive + std::fmt::Debug
{
}

/// Blanket implementation of NumericElement.
impl<T> NumericElement for T where
    T: Copy
        + PartialOrd
        + MissingValue
        + num_traits::NumCast
        + num_traits::ToPrimitive
        + std::fmt::Debug
{
}

/// Convert a numeric array between element kinds, remapping the missing
/// sentinel.
///
/// Every entry equal to the source kind's sentinel becomes the destination
/// kind's sentinel; all other entries are cast. A cast that cannot be
/// represented in the destination kind saturates to the destination
/// sentinel, which keeps out-of-range values flagged rather than silently
/// wrapped.
pub fn convert_numeric<F: NumericElement, T: NumericElement>(src: &ArrayD<F>) -> ArrayD<T> {
    src.map(|value| {
        if value.is_missing() {
            T::missing()
        } else {
            num_traits::cast(*value).unwrap_or_else(T::missing)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::arr1;

    #[test]
    fn sentinel_compare_exact() {
        assert!(f32::MIN.is_missing());
        assert!(!0.0_f32.is_missing());
        assert!(i32::MIN.is_missing());
        assert!(MISSING_DATETIME.is_missing());
    }

    #[test]
    fn convert_remaps_sentinel() {
        let src = arr1(&[1.0_f32, f32::MIN, 3.5]).into_dyn();
        let out: ArrayD<i32> = convert_numeric(&src);
        assert_eq!(vec![1, i32::MIN, 3], out.iter().copied().collect::<Vec<_>>());
    }

    #[test]
    fn convert_int_to_float() {
        let src = arr1(&[7_i32, i32::MIN]).into_dyn();
        let out: ArrayD<f32> = convert_numeric(&src);
        assert_eq!(7.0, out[0]);
        assert!(out[1].is_missing());
    }

    #[test]
    fn convert_float_to_double_keeps_values() {
        let src = arr1(&[1.25_f32, f32::MIN]).into_dyn();
        let out: ArrayD<f64> = convert_numeric(&src);
        assert_eq!(1.25, out[0]);
        assert!(out[1].is_missing());
    }
}
