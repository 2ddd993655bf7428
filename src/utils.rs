//! Shared utility functions and traits

/// Extension trait for tracking minimum and maximum values in `Option<T>`.
///
/// # Example
///
/// ```
/// use keyboard_timing::utils::MinMaxExt;
///
/// let mut shortest: Option<u64> = None;
/// let mut longest: Option<u64> = None;
///
/// for hold_us in [85_000, 62_000, 140_000] {
///     shortest.update_min(hold_us);
///     longest.update_max(hold_us);
/// }
/// assert_eq!(shortest, Some(62_000));
/// assert_eq!(longest, Some(140_000));
/// ```
pub trait MinMaxExt<T: Ord + Copy> {
    /// Store `value` if it is smaller than the current minimum, or if there is none yet.
    fn update_min(&mut self, value: T);

    /// Store `value` if it is larger than the current maximum, or if there is none yet.
    fn update_max(&mut self, value: T);
}

impl<T: Ord + Copy> MinMaxExt<T> for Option<T> {
    fn update_min(&mut self, value: T) {
        *self = Some(self.map_or(value, |m| m.min(value)));
    }

    fn update_max(&mut self, value: T) {
        *self = Some(self.map_or(value, |m| m.max(value)));
    }
}

/// Convert milliseconds to whole microseconds, rounding to nearest
pub fn ms_to_us(ms: f64) -> i64 {
    (ms * 1000.0).round() as i64
}

/// Convert microseconds to milliseconds
pub fn us_to_ms(us: i64) -> f64 {
    us as f64 / 1000.0
}
