//! Parsing of human-written thresholds such as `180d` or `1.5tb`.

use std::time::Duration;

use thiserror::Error;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// A threshold that could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitError {
    #[error("invalid duration '{0}'. Examples: 30d, 12h, 4w, 1y")]
    Duration(String),

    #[error("invalid size '{0}'. Examples: 500g, 1.5tb, 200gb, 750m")]
    Size(String),

    #[error("unknown size unit '{0}'. Use B, KB, MB, GB, TB, PB, or KiB, MiB, GiB, TiB, PiB")]
    SizeUnit(String),
}

/// Parse an age threshold: a number with an optional `s m h d w y` suffix.
///
/// A bare number means days and a year is 365 days. Fractions are allowed
/// and the result is truncated to whole seconds.
pub fn parse_duration(input: &str) -> Result<Duration, UnitError> {
    let invalid = || UnitError::Duration(input.to_string());
    let (amount, unit) = split_amount(input).ok_or_else(invalid)?;

    let seconds = match unit.as_str() {
        "s" => 1,
        "m" => MINUTE,
        "h" => HOUR,
        "" | "d" => DAY,
        "w" => 7 * DAY,
        "y" => 365 * DAY,
        _ => return Err(invalid()),
    };

    Ok(Duration::from_secs((amount * seconds as f64) as u64))
}

/// Parse a size threshold.
///
/// `kb`..`pb` are decimal (powers of 1000); `k`..`p` and `kib`..`pib` are
/// binary (powers of 1024). `b`, `bytes` or no unit means bytes.
pub fn parse_size(input: &str) -> Result<u64, UnitError> {
    let (amount, unit) = split_amount(input).ok_or_else(|| UnitError::Size(input.to_string()))?;

    let multiplier: u64 = match unit.as_str() {
        "" | "b" | "bytes" => 1,
        "kb" => 1000,
        "mb" => 1000u64.pow(2),
        "gb" => 1000u64.pow(3),
        "tb" => 1000u64.pow(4),
        "pb" => 1000u64.pow(5),
        "k" | "kib" => 1 << 10,
        "m" | "mib" => 1 << 20,
        "g" | "gib" => 1 << 30,
        "t" | "tib" => 1 << 40,
        "p" | "pib" => 1 << 50,
        _ => return Err(UnitError::SizeUnit(unit)),
    };

    Ok((amount * multiplier as f64) as u64)
}

/// Split `"  1.5 TB "` into `(1.5, "tb")`.
///
/// The number must be digits with at most one fractional part; a sign or a
/// leading or trailing dot is rejected. The unit is lowercased letters only.
fn split_amount(input: &str) -> Option<(f64, String)> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let mut parts = number.split('.');
    let whole = parts.next()?;
    let valid_number = match (parts.next(), parts.next()) {
        (None, _) => !whole.is_empty(),
        (Some(frac), None) => !whole.is_empty() && !frac.is_empty(),
        _ => false,
    };
    if !valid_number {
        return None;
    }

    let unit = unit.trim_start().to_ascii_lowercase();
    if !unit.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    Some((number.parse().ok()?, unit))
}
