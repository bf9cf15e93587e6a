//! Duration strings in the `"1m30s"` / `"500ms"` style used by the
//! orchestrator's plugin configuration.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,

    #[error("invalid number in duration {0:?}")]
    InvalidNumber(String),

    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),

    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },

    #[error("duration {0:?} out of range")]
    Overflow(String),
}

/// Parse a duration such as `"5s"`, `"1m30s"`, `"1.5h"` or `"250ms"`.
///
/// Valid units are `h`, `m`, `s`, `ms`, `us` (`µs`) and `ns`. A bare `"0"`
/// is the only value accepted without a unit. Signs are not accepted.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(DurationError::Empty);
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut rest = s;
    let mut total_nanos = 0f64;

    while !rest.is_empty() {
        let num_end = rest.find(|c: char| !is_number(c)).unwrap_or(rest.len());
        let (num, tail) = rest.split_at(num_end);
        if num.is_empty() || num == "." {
            return Err(DurationError::InvalidNumber(input.to_string()));
        }
        let value: f64 = num
            .parse()
            .map_err(|_| DurationError::InvalidNumber(input.to_string()))?;

        let unit_end = tail.find(is_number).unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_end);
        let nanos_per_unit = match unit {
            "" => return Err(DurationError::MissingUnit(input.to_string())),
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            other => {
                return Err(DurationError::UnknownUnit {
                    unit: other.to_string(),
                    input: input.to_string(),
                });
            }
        };

        total_nanos += value * nanos_per_unit;
        rest = next;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return Err(DurationError::Overflow(input.to_string()));
    }
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}
