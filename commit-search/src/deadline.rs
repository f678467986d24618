//! `timeout:` parsing and the "try a longer timeout" suggestion.

use crate::error::CommitSearchError;
use crate::error::Result;
use std::time::Duration;

const NANOS_PER_SECOND: u128 = 1_000_000_000;
const NANOS_PER_MINUTE: u128 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: u128 = 60 * NANOS_PER_MINUTE;
const MAX_FRACTION_DIVISOR: u128 = 1_000_000_000_000_000_000;

/// Smallest timeout ever suggested after a timed out search.
pub const MIN_SUGGESTED_TIMEOUT: Duration = Duration::from_secs(2);

/// Parses a duration such as `2s`, `200ms`, `1m30s` or `1.5h`.
///
/// Accepted units are `h`, `m`, `s`, `ms`, `us` (or `µs`) and `ns`; every
/// number needs a unit except a bare `0`.
pub fn parse_timeout(raw: &str) -> Result<Duration> {
    parse_nanos(raw.trim())
        .and_then(|nanos| u64::try_from(nanos).ok())
        .map(Duration::from_nanos)
        .ok_or_else(|| CommitSearchError::InvalidTimeout {
            value: raw.to_string(),
        })
}

fn parse_nanos(input: &str) -> Option<u128> {
    if input == "0" {
        return Some(0);
    }
    if input.is_empty() {
        return None;
    }

    let mut rest = input;
    let mut total: u128 = 0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);

        let scale = unit_nanos(unit)?;
        total = total.checked_add(scaled(number, scale)?)?;
        rest = tail;
    }
    Some(total)
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(NANOS_PER_MINUTE),
        "h" => Some(NANOS_PER_HOUR),
        _ => None,
    }
}

/// `number` (optionally fractional) times `scale` nanoseconds.
fn scaled(number: &str, scale: u128) -> Option<u128> {
    let (whole, fraction) = match number.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (number, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }

    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().ok()?
    };
    let mut nanos = whole.checked_mul(scale)?;

    let mut divisor: u128 = 1;
    let mut fraction_value: u128 = 0;
    for digit in fraction.chars() {
        let digit = digit.to_digit(10)?;
        // Eighteen fractional digits are already below nanosecond precision.
        if divisor >= MAX_FRACTION_DIVISOR {
            break;
        }
        fraction_value = fraction_value * 10 + u128::from(digit);
        divisor *= 10;
    }
    nanos = nanos.checked_add(fraction_value * scale / divisor)?;
    Some(nanos)
}

/// `factor × elapsed`, rounded up to the next whole hour, minute or second
/// depending on its magnitude, and never below [`MIN_SUGGESTED_TIMEOUT`].
pub fn longer(factor: u32, elapsed: Duration) -> Duration {
    let scaled = elapsed.as_nanos() * u128::from(factor);
    let rounded = if scaled >= NANOS_PER_HOUR {
        round_up(scaled, NANOS_PER_HOUR)
    } else if scaled >= NANOS_PER_MINUTE {
        round_up(scaled, NANOS_PER_MINUTE)
    } else if scaled >= NANOS_PER_SECOND {
        round_up(scaled, NANOS_PER_SECOND)
    } else {
        0
    };
    let seconds = u64::try_from(rounded / NANOS_PER_SECOND).unwrap_or(u64::MAX);
    Duration::from_secs(seconds).max(MIN_SUGGESTED_TIMEOUT)
}

fn round_up(value: u128, unit: u128) -> u128 {
    value.div_ceil(unit) * unit
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_common_forms() {
        assert_eq!(parse_timeout("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_timeout("200ms").unwrap(), Duration::from_millis(200));
        assert_eq!(parse_timeout("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_timeout("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_timeout(".5s").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_timeout("250us").unwrap(), Duration::from_micros(250));
        assert_eq!(parse_timeout("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn rejects_malformed_values() {
        for raw in ["", "2", "s", "2x", "-2s", "1..5s", "two seconds"] {
            let err = parse_timeout(raw).unwrap_err();
            assert!(
                matches!(err, CommitSearchError::InvalidTimeout { ref value } if value == raw),
                "{raw:?} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn invalid_timeout_message_names_the_field() {
        let err = parse_timeout("soon").unwrap_err();
        assert!(err.to_string().starts_with(r#"invalid "timeout:" value"#));
    }

    #[test]
    fn longer_rounds_up_per_unit() {
        assert_eq!(longer(2, Duration::from_millis(300)), Duration::from_secs(2));
        assert_eq!(longer(2, Duration::from_millis(1_600)), Duration::from_secs(4));
        assert_eq!(longer(2, Duration::from_secs(20)), Duration::from_secs(40));
        assert_eq!(longer(2, Duration::from_secs(40)), Duration::from_secs(120));
        assert_eq!(longer(2, Duration::from_secs(31 * 60)), Duration::from_secs(2 * 3600));
    }
}
