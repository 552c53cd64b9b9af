// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Streaming time-window averaging of table rows.

mod averager;
mod record;

pub use averager::{AveragerConfig, WindowAverager};
pub use record::{RecordSchema, WindowRecord};

use expr::EvalError;
use table_source::SourceError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AveragerError>;

#[derive(Debug, Error)]
pub enum AveragerError {
    #[error("invalid window string: {0}")]
    InvalidWindow(String),
    #[error("shift fraction must lie in (0, 1], got {0}")]
    InvalidShift(f64),
    #[error("time field {field:?} is not a column of the table")]
    MissingTimeField { field: String },
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Parse a window width in seconds: a plain number (`3600`, `0.5`) or an integer with an
/// `s`, `m`, `h` or `d` suffix (`30s`, `5m`, `1h`).
pub fn parse_window(spec: &str) -> Result<f64> {
    let spec = spec.trim();
    let invalid = || AveragerError::InvalidWindow(spec.to_string());
    let Some(unit) = spec.chars().last() else {
        return Err(invalid());
    };
    let seconds = if unit.is_ascii_alphabetic() {
        let value: u64 = spec[..spec.len() - 1].trim().parse().map_err(|_| invalid())?;
        let scale = match unit {
            's' | 'S' => 1,
            'm' | 'M' => 60,
            'h' | 'H' => 3600,
            'd' | 'D' => 86_400,
            _ => return Err(invalid()),
        };
        value.checked_mul(scale).ok_or_else(invalid)? as f64
    } else {
        spec.parse::<f64>().map_err(|_| invalid())?
    };
    if !(seconds.is_finite() && seconds > 0.0) {
        return Err(invalid());
    }
    Ok(seconds)
}

/// Check a shift fraction lies in `(0, 1]`.
pub fn check_shift(shift: f64) -> Result<f64> {
    if shift > 0.0 && shift <= 1.0 {
        Ok(shift)
    } else {
        Err(AveragerError::InvalidShift(shift))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_window_literals() {
        assert_eq!(parse_window("3600").unwrap(), 3600.0);
        assert_eq!(parse_window(" 0.5 ").unwrap(), 0.5);
        assert_eq!(parse_window("30s").unwrap(), 30.0);
        assert_eq!(parse_window("5m").unwrap(), 300.0);
        assert_eq!(parse_window("1h").unwrap(), 3600.0);
        assert_eq!(parse_window("2d").unwrap(), 172_800.0);
    }

    #[test]
    fn rejects_bad_windows() {
        for spec in ["", "h", "-5", "0", "1y", "1.5h", "nan", "inf"] {
            assert!(
                matches!(parse_window(spec), Err(AveragerError::InvalidWindow(_))),
                "{spec:?} accepted"
            );
        }
    }

    #[test]
    fn shift_must_be_a_fraction() {
        assert!(check_shift(1.0).is_ok());
        assert!(check_shift(0.25).is_ok());
        assert!(check_shift(0.0).is_err());
        assert!(check_shift(1.5).is_err());
        assert!(check_shift(f64::NAN).is_err());
    }
}
