//! Duration grammar parser.
//!
//! Grammar (whitespace permitted between components):
//! `[W w][D d][H h][M m][S s][MS ms]`, each component an optional
//! nonnegative decimal integer followed by its unit literal, in that fixed
//! order. The literal `0` alone denotes the zero duration. Output has
//! millisecond resolution.
//!
//! Units are matched in strict left-to-right order so that, e.g., `500ms`
//! binds the whole `ms` suffix rather than being misread as `500m` followed
//! by a stray `s`.

use std::time::Duration;

use crate::error::{Error, Result};

const UNITS: [(&str, u64); 6] = [
    ("w", 7 * 24 * 60 * 60 * 1000),
    ("d", 24 * 60 * 60 * 1000),
    ("h", 60 * 60 * 1000),
    ("m", 60 * 1000),
    ("s", 1000),
    ("ms", 1),
];

pub fn parse(input: &str) -> Result<Duration> {
    if input.trim() == "0" {
        return Ok(Duration::ZERO);
    }

    let mut rest = input;
    let mut total_ms: u64 = 0;
    let mut next_unit = 0usize;
    let mut matched_any = false;

    while next_unit < UNITS.len() {
        rest = skip_ws(rest);

        let Some((value, after_number)) = take_digits(rest) else {
            next_unit += 1;
            continue;
        };

        let after_number = skip_ws(after_number);
        let Some((letters, after_letters)) = take_letters(after_number) else {
            next_unit += 1;
            continue;
        };

        let Some(unit_index) = UNITS[next_unit..]
            .iter()
            .position(|(unit, _)| *unit == letters)
        else {
            return Err(Error::InvalidDuration(input.to_string()));
        };

        let (_, ms_per_unit) = UNITS[next_unit + unit_index];
        let contribution = value
            .checked_mul(ms_per_unit)
            .ok_or_else(|| Error::InvalidDuration(input.to_string()))?;
        total_ms = total_ms
            .checked_add(contribution)
            .ok_or_else(|| Error::InvalidDuration(input.to_string()))?;

        matched_any = true;
        rest = after_letters;
        next_unit += unit_index + 1;
    }

    rest = skip_ws(rest);
    if !rest.is_empty() || !matched_any {
        return Err(Error::InvalidDuration(input.to_string()));
    }

    Ok(Duration::from_millis(total_ms))
}

/// Render a duration back into the grammar, using only the units that
/// contribute a nonzero amount. Used for round-trip testing; not needed on
/// any runtime path (schedules and jitter are read once and kept as
/// `Duration`, never re-serialized).
#[allow(dead_code)]
pub fn format(d: Duration) -> String {
    if d.is_zero() {
        return "0".to_string();
    }

    let mut ms = d.as_millis() as u64;
    let mut out = String::new();
    for (unit, ms_per_unit) in UNITS {
        let count = ms / ms_per_unit;
        ms %= ms_per_unit;
        if count > 0 {
            out.push_str(&count.to_string());
            out.push_str(unit);
        }
    }
    out
}

fn skip_ws(s: &str) -> &str {
    s.trim_start_matches(' ')
}

fn take_digits(s: &str) -> Option<(u64, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    let value = s[..end].parse::<u64>().ok()?;
    Some((value, &s[end..]))
}

fn take_letters(s: &str) -> Option<(&str, &str)> {
    let end = s
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    Some((&s[..end], &s[end..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_literal() {
        assert_eq!(parse("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn whitespace_only_is_invalid() {
        assert!(parse("  ").is_err());
    }

    #[test]
    fn single_components() {
        assert_eq!(parse("1w").unwrap(), Duration::from_secs(7 * 24 * 60 * 60));
        assert_eq!(parse("1d").unwrap(), Duration::from_secs(24 * 60 * 60));
        assert_eq!(parse("1h").unwrap(), Duration::from_secs(60 * 60));
        assert_eq!(parse("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse("1s").unwrap(), Duration::from_secs(1));
        assert_eq!(parse("1ms").unwrap(), Duration::from_millis(1));
    }

    #[test]
    fn milliseconds_not_confused_with_minutes() {
        assert_eq!(parse("500ms").unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn combined_components() {
        assert_eq!(
            parse("1h30m").unwrap(),
            Duration::from_secs(60 * 60 + 30 * 60)
        );
        assert_eq!(
            parse("1d 2h 3m").unwrap(),
            Duration::from_secs(24 * 60 * 60 + 2 * 60 * 60 + 3 * 60)
        );
    }

    #[test]
    fn out_of_order_units_are_invalid() {
        assert!(parse("1s1w").is_err());
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(parse("no").is_err());
        assert!(parse("1x").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn round_trip() {
        for s in ["1w", "1d", "1h", "1m", "1s", "1ms", "1h30m", "5s"] {
            let d = parse(s).unwrap();
            let refmt = format(d);
            assert_eq!(parse(&refmt).unwrap(), d);
        }
    }

    #[test]
    fn day_and_minute_scale_examples() {
        assert_eq!(parse("1d").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse("60s").unwrap(), Duration::from_secs(60));
    }
}
