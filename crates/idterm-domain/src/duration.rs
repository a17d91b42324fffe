use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};

use crate::error::DomainError;

/// Nanoseconds per unit suffix.
const UNITS: &[(&str, u128)] = &[
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("μs", 1_000),
    ("ms", 1_000_000),
    ("s", 1_000_000_000),
    ("m", 60_000_000_000),
    ("h", 3_600_000_000_000),
];

/// Fraction digits beyond this are dropped; they are below nanosecond precision.
const MAX_FRACTION_DIGITS: usize = 18;

/// Parse a duration such as `"24h"`, `"1h30m"`, `"1.5h"` or `"300ms"`.
///
/// Grammar: an optional sign followed by one or more `<number>[.<fraction>]<unit>`
/// groups, units `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`. A bare `"0"` is accepted.
/// Negative values are rejected since nothing in this workspace can use them.
pub fn parse_duration(input: &str) -> Result<Duration, DomainError> {
    let invalid = |reason: String| DomainError::InvalidDuration {
        input: input.to_string(),
        reason,
    };

    let (negative, mut rest) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };

    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid("empty duration".into()));
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let (whole, tail) = split_digits(rest);
        let (fraction, tail) = match tail.strip_prefix('.') {
            Some(after_dot) => split_digits(after_dot),
            None => ("", tail),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid(format!("expected a number at {:?}", rest)));
        }

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        if unit.is_empty() {
            return Err(invalid("missing unit".into()));
        }
        let scale = UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, scale)| *scale)
            .ok_or_else(|| invalid(format!("unknown unit {:?}", unit)))?;

        let out_of_range = || invalid("value out of range".into());
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| out_of_range())?
        };
        let mut nanos = whole.checked_mul(scale).ok_or_else(out_of_range)?;
        if !fraction.is_empty() {
            let digits = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
            let numerator: u128 = digits.parse().map_err(|_| out_of_range())?;
            let denominator = 10u128.pow(digits.len() as u32);
            nanos = nanos
                .checked_add(numerator * scale / denominator)
                .ok_or_else(out_of_range)?;
        }
        total = total.checked_add(nanos).ok_or_else(out_of_range)?;
        rest = tail;
    }

    let total = u64::try_from(total).map_err(|_| invalid("value out of range".into()))?;
    if negative && total != 0 {
        return Err(DomainError::NonPositiveDuration(input.to_string()));
    }
    Ok(Duration::from_nanos(total))
}

fn split_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

/// Validity window of a password credential: `[start, end)`.
///
/// Both ends sit on whole milliseconds, the resolution the directory stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Parse `duration` and anchor it at `now`, truncated to the millisecond.
///
/// The result always satisfies `end > start`.
pub fn credential_window(now: DateTime<Utc>, duration: &str) -> Result<CredentialWindow, DomainError> {
    let span = parse_duration(duration)?;
    if span.is_zero() {
        return Err(DomainError::NonPositiveDuration(duration.to_string()));
    }
    let span = chrono::Duration::from_std(span)
        .map_err(|_| DomainError::DurationOutOfRange(duration.to_string()))?;
    let start = now.trunc_subsecs(3);
    let end = start
        .checked_add_signed(span)
        .ok_or_else(|| DomainError::DurationOutOfRange(duration.to_string()))?
        .trunc_subsecs(3);
    if end <= start {
        return Err(DomainError::DurationTooShort(duration.to_string()));
    }
    Ok(CredentialWindow { start, end })
}
