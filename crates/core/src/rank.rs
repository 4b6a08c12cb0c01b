//! Fractional rank strings for manual ordering (album posts).
//!
//! A rank is a base-62 fraction `0.d1d2d3...` written as its digits, with no
//! trailing `0`. Byte order of the strings equals numeric order of the
//! fractions, so a rank can be used directly as an index sort key. Between
//! any two ranks there is always another one; repeated insertion at the same
//! spot makes ranks longer, and [`needs_rebalance`] reports when to respace.

use thiserror::Error;

const DIGITS: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const BASE: usize = 62;

/// Ranks longer than this trigger a rebalance of their album.
pub const REBALANCE_THRESHOLD: usize = 12;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RankError {
    #[error("invalid rank {0:?}")]
    Invalid(String),
    #[error("rank {before:?} is not below {after:?}")]
    OutOfOrder { before: String, after: String },
}

fn digit_value(c: u8) -> Option<usize> {
    DIGITS.iter().position(|d| *d == c)
}

fn validate(rank: &str) -> Result<Vec<usize>, RankError> {
    let invalid = || RankError::Invalid(rank.to_string());
    if rank.is_empty() || rank.ends_with('0') {
        return Err(invalid());
    }
    rank.bytes()
        .map(|c| digit_value(c).ok_or_else(invalid))
        .collect()
}

fn encode(digits: &[usize]) -> String {
    digits.iter().map(|d| DIGITS[*d] as char).collect()
}

/// A rank strictly between `before` and `after`.
///
/// `None` stands for the start (`before`) or the end (`after`) of the list.
pub fn rank_between(before: Option<&str>, after: Option<&str>) -> Result<String, RankError> {
    let low = before.map(validate).transpose()?.unwrap_or_default();
    let high = after.map(validate).transpose()?;

    if let (Some(before), Some(after)) = (before, after) {
        if before >= after {
            return Err(RankError::OutOfOrder {
                before: before.to_string(),
                after: after.to_string(),
            });
        }
    }

    Ok(encode(&midpoint(&low, high.as_deref())))
}

/// Digits of a fraction strictly between `low` and `high` (`None` is 1.0).
fn midpoint(low: &[usize], high: Option<&[usize]>) -> Vec<usize> {
    if let Some(high) = high {
        // Shared prefix, padding `low` with zeros.
        let shared = high
            .iter()
            .enumerate()
            .take_while(|(i, d)| low.get(*i).copied().unwrap_or(0) == **d)
            .count();
        if shared > 0 {
            let mut digits = high[..shared].to_vec();
            let low_rest: &[usize] = if shared < low.len() { &low[shared..] } else { &[] };
            digits.extend(midpoint(low_rest, Some(&high[shared..])));
            return digits;
        }
    }

    let low_digit = low.first().copied().unwrap_or(0);
    let high_digit = high.and_then(|h| h.first().copied()).unwrap_or(BASE);

    if high_digit > low_digit + 1 {
        return vec![(low_digit + high_digit).div_ceil(2)];
    }

    match high {
        Some(high) if high.len() > 1 => vec![high[0]],
        _ => {
            let mut digits = vec![low_digit];
            let low_rest: &[usize] = if low.len() > 1 { &low[1..] } else { &[] };
            digits.extend(midpoint(low_rest, None));
            digits
        }
    }
}

/// `count` ranks spread evenly over the whole range, in ascending order.
pub fn evenly_spaced(count: usize) -> Vec<String> {
    if count == 0 {
        return Vec::new();
    }

    let slots = (count as u128 + 1) * 2;
    let mut width = 1u32;
    while (BASE as u128).pow(width) < slots && width < 20 {
        width += 1;
    }
    let span = (BASE as u128).pow(width);
    let step = span / (count as u128 + 1);

    (1..=count as u128)
        .map(|i| {
            let mut value = i * step;
            let mut digits = vec![0usize; width as usize];
            for slot in digits.iter_mut().rev() {
                *slot = (value % BASE as u128) as usize;
                value /= BASE as u128;
            }
            while digits.last() == Some(&0) {
                digits.pop();
            }
            encode(&digits)
        })
        .collect()
}

/// Whether a rank has grown long enough that its list should be respaced.
pub fn needs_rebalance(rank: &str) -> bool {
    rank.len() > REBALANCE_THRESHOLD
}
