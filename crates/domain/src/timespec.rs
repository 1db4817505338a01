use std::fmt;
use std::ops::{Add, Sub};
use std::time::Duration;

pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Signed seconds plus a nanosecond remainder kept in `[0, 1e9)`.
///
/// Every constructor and operator normalizes, so a negative value such as
/// -0.25s is stored as `{ secs: -1, nanos: 750_000_000 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timespec {
    secs: i64,
    nanos: u32,
}

impl Timespec {
    pub const ZERO: Timespec = Timespec { secs: 0, nanos: 0 };

    pub fn new(secs: i64, nanos: i64) -> Self {
        let secs = secs.saturating_add(nanos.div_euclid(NANOS_PER_SEC));
        let nanos = nanos.rem_euclid(NANOS_PER_SEC) as u32;
        Self { secs, nanos }
    }

    pub fn from_micros(secs: i64, micros: i64) -> Self {
        Self::new(
            secs.saturating_add(micros.div_euclid(1_000_000)),
            micros.rem_euclid(1_000_000) * 1_000,
        )
    }

    pub fn from_nanos(nanos: i128) -> Self {
        let secs = nanos.div_euclid(NANOS_PER_SEC as i128);
        let rem = nanos.rem_euclid(NANOS_PER_SEC as i128) as u32;
        let secs = secs.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        Self { secs, nanos: rem }
    }

    pub fn from_duration(duration: Duration) -> Self {
        Self {
            secs: i64::try_from(duration.as_secs()).unwrap_or(i64::MAX),
            nanos: duration.subsec_nanos(),
        }
    }

    pub fn secs(&self) -> i64 {
        self.secs
    }

    pub fn subsec_nanos(&self) -> u32 {
        self.nanos
    }

    pub fn as_nanos(&self) -> i128 {
        self.secs as i128 * NANOS_PER_SEC as i128 + self.nanos as i128
    }

    pub fn is_negative(&self) -> bool {
        self.secs < 0
    }

    /// Clamps negative values to zero.
    pub fn non_negative(self) -> Self {
        if self.is_negative() {
            Self::ZERO
        } else {
            self
        }
    }

    /// Converts to a `Duration`, negative values become zero.
    pub fn to_duration(self) -> Duration {
        let t = self.non_negative();
        Duration::new(t.secs as u64, t.nanos)
    }

    /// Scales the value by `factor`, rounding to the nearest nanosecond.
    pub fn scale(self, factor: f64) -> Self {
        // float to int casts saturate
        let scaled = (self.as_nanos() as f64 * factor).round();
        Self::from_nanos(scaled as i128)
    }
}

impl Add for Timespec {
    type Output = Timespec;

    fn add(self, rhs: Timespec) -> Timespec {
        Timespec::new(
            self.secs.saturating_add(rhs.secs),
            self.nanos as i64 + rhs.nanos as i64,
        )
    }
}

impl Sub for Timespec {
    type Output = Timespec;

    fn sub(self, rhs: Timespec) -> Timespec {
        Timespec::new(
            self.secs.saturating_sub(rhs.secs),
            self.nanos as i64 - rhs.nanos as i64,
        )
    }
}

impl From<Duration> for Timespec {
    fn from(duration: Duration) -> Self {
        Timespec::from_duration(duration)
    }
}

impl fmt::Display for Timespec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            let abs = Timespec::ZERO - *self;
            write!(f, "-{}.{:09}", abs.secs, abs.nanos)
        } else {
            write!(f, "{}.{:09}", self.secs, self.nanos)
        }
    }
}
