use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Timespec;

/// Pacing policy applied to captured timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum TimingMode {
    /// Deliver every packet as soon as it is read.
    Ignore,
    /// Reproduce the captured spacing.
    #[default]
    Keep,
    /// Add `nanos` to every gap.
    Increase { nanos: u64 },
    /// Subtract `nanos` from every gap, never going below zero.
    Reduce { nanos: u64 },
    /// Scale every gap by `factor`.
    Multiply { factor: f64 },
}

impl TimingMode {
    /// Maps a captured gap (already clamped to zero or more) to the replay gap.
    pub fn adjust_gap(&self, gap: Timespec) -> Timespec {
        let gap = gap.non_negative();
        match *self {
            TimingMode::Ignore | TimingMode::Keep => gap,
            TimingMode::Increase { nanos } => gap + Timespec::from_nanos(nanos as i128),
            TimingMode::Reduce { nanos } => (gap - Timespec::from_nanos(nanos as i128)).non_negative(),
            TimingMode::Multiply { factor } => gap.scale(factor).non_negative(),
        }
    }

    pub fn is_ignore(&self) -> bool {
        matches!(self, TimingMode::Ignore)
    }
}

impl fmt::Display for TimingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimingMode::Ignore => f.write_str("ignore"),
            TimingMode::Keep => f.write_str("keep"),
            TimingMode::Increase { nanos } => write!(f, "increase({nanos}ns)"),
            TimingMode::Reduce { nanos } => write!(f, "reduce({nanos}ns)"),
            TimingMode::Multiply { factor } => write!(f, "multiply({factor})"),
        }
    }
}

impl std::str::FromStr for TimingMode {
    type Err = String;

    /// Parses `ignore`, `keep`, `increase=<nanos>`, `reduce=<nanos>` or
    /// `multiply=<factor>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, arg) = match s.split_once('=') {
            Some((name, arg)) => (name.trim(), Some(arg.trim())),
            None => (s.trim(), None),
        };

        let nanos = |arg: Option<&str>| -> Result<u64, String> {
            arg.ok_or_else(|| format!("timing mode '{name}' needs a duration in nanoseconds"))?
                .parse::<u64>()
                .map_err(|e| format!("invalid duration for '{name}': {e}"))
        };

        match name.to_ascii_lowercase().as_str() {
            "ignore" => Ok(TimingMode::Ignore),
            "keep" => Ok(TimingMode::Keep),
            "increase" => Ok(TimingMode::Increase { nanos: nanos(arg)? }),
            "reduce" => Ok(TimingMode::Reduce { nanos: nanos(arg)? }),
            "multiply" => {
                let factor = arg
                    .ok_or_else(|| "timing mode 'multiply' needs a factor".to_string())?
                    .parse::<f64>()
                    .map_err(|e| format!("invalid factor for 'multiply': {e}"))?;
                Ok(TimingMode::Multiply { factor })
            }
            other => Err(format!("unknown timing mode '{other}'")),
        }
    }
}
