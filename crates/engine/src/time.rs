use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Timeline position or length in timebase ticks.
pub type Tick = i64;

/// Document-wide tick resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timebase {
    pub ticks_per_second: i64,
}

impl Timebase {
    /// Millisecond resolution used by editor sessions.
    pub const MILLIS: Self = Self {
        ticks_per_second: 1_000,
    };

    /// Creates a validated timebase.
    ///
    /// # Example
    /// ```
    /// use timeline_engine::Timebase;
    ///
    /// let tb = Timebase::new(48_000).expect("valid");
    /// assert_eq!(tb.ticks_per_second, 48_000);
    /// assert!(Timebase::new(0).is_err());
    /// ```
    pub fn new(ticks_per_second: i64) -> Result<Self> {
        if ticks_per_second <= 0 {
            return Err(EngineError::InvalidTimebase { ticks_per_second });
        }
        Ok(Self { ticks_per_second })
    }

    pub fn seconds_to_ticks(self, seconds: f64) -> Tick {
        seconds_to_ticks(seconds, self)
    }

    pub fn ticks_to_seconds(self, ticks: Tick) -> f64 {
        ticks_to_seconds(ticks, self)
    }
}

impl Default for Timebase {
    fn default() -> Self {
        STANDARD_TIMEBASE
    }
}

/// Standard editor timebase `1000` ticks per second.
pub const STANDARD_TIMEBASE: Timebase = Timebase::MILLIS;

/// Converts seconds to ticks with nearest rounding.
///
/// # Example
/// ```
/// use timeline_engine::{Timebase, seconds_to_ticks};
///
/// assert_eq!(seconds_to_ticks(1.2345, Timebase::MILLIS), 1_235);
/// ```
pub fn seconds_to_ticks(seconds: f64, timebase: Timebase) -> Tick {
    let scaled = (seconds * timebase.ticks_per_second as f64).round();
    if scaled.is_nan() {
        return 0;
    }
    scaled.clamp(i64::MIN as f64, i64::MAX as f64) as Tick
}

pub fn ticks_to_seconds(ticks: Tick, timebase: Timebase) -> f64 {
    ticks as f64 / timebase.ticks_per_second as f64
}

/// Rescales `ticks` from one timebase to another with nearest rounding.
///
/// # Example
/// ```
/// use timeline_engine::{Timebase, rescale};
///
/// let audio = Timebase::new(48_000).expect("valid");
/// assert_eq!(rescale(100, Timebase::MILLIS, audio), 4_800);
/// ```
pub fn rescale(ticks: Tick, from: Timebase, to: Timebase) -> Tick {
    let numerator = i128::from(ticks) * i128::from(to.ticks_per_second);
    let denominator = i128::from(from.ticks_per_second);
    let rounded = div_round_nearest(numerator, denominator);
    rounded.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as Tick
}

fn div_round_nearest(num: i128, den: i128) -> i128 {
    debug_assert!(den > 0);

    let abs_num = num.abs();
    let mut out = abs_num / den;
    let remainder = abs_num % den;
    if remainder.saturating_mul(2) >= den {
        out += 1;
    }

    if num < 0 { -out } else { out }
}
