//! SHA256 + base36 ID generation.
//!
//! IDs have the shape `<prefix><hash>` where the hash is lowercase base36
//! with a length that adapts to the current store population, and
//! `<parent>.<suffix>` for children.

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use sha2::{Digest, Sha256};

/// Base36 alphabet (0-9, a-z).
const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Default adaptive ID configuration constants.
pub mod adaptive_defaults {
    /// Default collision probability threshold (25%).
    pub const MAX_COLLISION_PROB: f64 = 0.25;
    /// Default minimum hash length.
    pub const MIN_LENGTH: usize = 3;
    /// Default maximum hash length.
    pub const MAX_LENGTH: usize = 8;
    /// Nonce values tried per length before escalating.
    pub const NONCE_ATTEMPTS: i32 = 10;
}

/// Encodes `num` as exactly `length` base36 digits, zero-padded on the left.
fn encode_base36(mut num: BigUint, length: usize) -> String {
    let base = BigUint::from(36u32);
    let zero = BigUint::zero();

    // Build the string in reverse.
    let mut chars: Vec<u8> = Vec::with_capacity(length);
    while num > zero {
        let rem = (&num % &base).to_u32().unwrap_or(0) as usize;
        num /= &base;
        chars.push(BASE36_ALPHABET[rem]);
    }
    chars.reverse();

    let mut s = String::from_utf8(chars).unwrap_or_default();
    if s.len() < length {
        s = "0".repeat(length - s.len()) + &s;
    }
    s
}

/// Creates a hash-based ID for an issue.
///
/// The canonical content string is `title|description|creator|unix_nanos|nonce`
/// (pipe-separated, no escaping). Its SHA-256 digest is truncated to
/// `ceil(length * 5 / 8)` bytes, interpreted big-endian, reduced modulo
/// `36^length`, and base36-encoded to exactly `length` characters.
///
/// Deterministic: identical inputs always produce the same id.
pub fn hash_id(
    prefix: &str,
    title: &str,
    description: &str,
    creator: &str,
    timestamp: DateTime<Utc>,
    nonce: i32,
    length: usize,
) -> String {
    let content = format!(
        "{}|{}|{}|{}|{}",
        title,
        description,
        creator,
        timestamp.timestamp_nanos_opt().unwrap_or(0),
        nonce
    );

    let digest = Sha256::digest(content.as_bytes());
    let num_bytes = (length * 5).div_ceil(8).min(digest.len());

    let mut num = BigUint::from_bytes_be(&digest[..num_bytes]);
    num %= BigUint::from(36u32).pow(length as u32);

    format!("{}{}", prefix, encode_base36(num, length))
}

/// Computes the collision probability using the birthday paradox
/// approximation: `P ~ 1 - e^(-n^2 / 2N)` for `n` items in a space of `N`.
fn collision_probability(num_issues: usize, id_length: usize) -> f64 {
    let total: f64 = 36.0_f64.powi(id_length as i32);
    let exponent = -(num_issues as f64).powi(2) / (2.0 * total);
    1.0 - exponent.exp()
}

/// Determines the ID length for the current store population.
///
/// Returns the first length in `min_length..=max_length` whose collision
/// probability falls below `max_collision_prob`; `max_length` if none does.
pub fn compute_adaptive_length(
    num_issues: usize,
    min_length: usize,
    max_length: usize,
    max_collision_prob: f64,
) -> usize {
    for length in min_length..=max_length {
        if collision_probability(num_issues, length) < max_collision_prob {
            return length;
        }
    }
    max_length
}

// ---------------------------------------------------------------------------
// Child IDs (dot notation)
// ---------------------------------------------------------------------------

/// Formats a child id: `<parent>.<suffix>`.
pub fn child_id(parent_id: &str, suffix: &str) -> String {
    format!("{parent_id}.{suffix}")
}

/// Returns the shortest base36 suffix not present in `existing`, counting up
/// from 1.
pub fn next_child_suffix<'a, I>(existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: std::collections::HashSet<&str> = existing.into_iter().collect();
    let mut n: u64 = 1;
    loop {
        let candidate = base36_u64(n);
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        n += 1;
    }
}

fn base36_u64(mut num: u64) -> String {
    if num == 0 {
        return "0".to_string();
    }
    let mut chars = Vec::new();
    while num > 0 {
        chars.push(BASE36_ALPHABET[(num % 36) as usize]);
        num /= 36;
    }
    chars.reverse();
    String::from_utf8(chars).unwrap_or_default()
}

/// Splits an id into `(parent, suffix)` when it is a child id.
pub fn split_child_id(id: &str) -> Option<(&str, &str)> {
    let dot = id.rfind('.')?;
    Some((&id[..dot], &id[dot + 1..]))
}
