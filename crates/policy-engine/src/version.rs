//! Dotted version ordering.
//!
//! Segments are compared as integers when both are all-digit, otherwise
//! case-insensitively as text. A numeric segment sorts before a textual one
//! so the ordering stays total. When one version is a prefix of the other,
//! the shorter one is smaller (`1.0 < 1.0.0`). Malformed input never fails.

use std::cmp::Ordering;

pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.trim().split('.');
    let mut right = b.trim().split('.');

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => match compare_segment(l, r) {
                Ordering::Equal => continue,
                other => return other,
            },
        }
    }
}

/// True when `current` satisfies `minimum`. An unknown current version and
/// an unset minimum never block.
pub fn is_at_least(current: Option<&str>, minimum: &str) -> bool {
    let current = match current.map(str::trim) {
        Some(c) if !c.is_empty() => c,
        _ => return true,
    };
    if minimum.trim().is_empty() {
        return true;
    }

    compare_versions(current, minimum) != Ordering::Less
}

fn compare_segment(a: &str, b: &str) -> Ordering {
    match (is_numeric(a), is_numeric(b)) {
        (true, true) => compare_digits(a, b),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.to_lowercase().cmp(&b.to_lowercase()),
    }
}

fn is_numeric(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

// Digit strings of any length, no integer overflow.
fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_segments() {
        assert_eq!(compare_versions("1.10.0", "1.9.0"), Ordering::Greater);
        assert_eq!(compare_versions("2.0.0", "10.0.0"), Ordering::Less);
        assert_eq!(compare_versions("1.02.0", "1.2.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.2.3", "1.2.3"), Ordering::Equal);
    }

    #[test]
    fn test_prefix_is_smaller() {
        assert_eq!(compare_versions("1.0", "1.0.0"), Ordering::Less);
        assert_eq!(compare_versions("1.0.0.1", "1.0.0"), Ordering::Greater);
    }

    #[test]
    fn test_textual_segments_fall_back_to_case_insensitive_order() {
        assert_eq!(compare_versions("1.0.0-BETA", "1.0.0-beta"), Ordering::Equal);
        assert_eq!(compare_versions("1.0.alpha", "1.0.beta"), Ordering::Less);
        assert_eq!(compare_versions("1.0.5", "1.0.rc"), Ordering::Less);
    }

    #[test]
    fn test_huge_segments_do_not_overflow() {
        assert_eq!(
            compare_versions("1.99999999999999999999999", "1.100000000000000000000000"),
            Ordering::Less
        );
    }

    #[test]
    fn test_is_at_least_is_permissive_for_unknowns() {
        assert!(is_at_least(None, "2.0.0"));
        assert!(is_at_least(Some(""), "2.0.0"));
        assert!(is_at_least(Some("0.1.0"), ""));
        assert!(is_at_least(Some("2.0.0"), "2.0.0"));
        assert!(is_at_least(Some("2.1.0"), "2.0.0"));
        assert!(!is_at_least(Some("1.9.9"), "2.0.0"));
    }

    #[test]
    fn test_garbage_never_panics() {
        let inputs = ["", ".", "..", "a..b", "1.-2", "🙂.1", "  1.0  "];
        for a in inputs {
            for b in inputs {
                let forward = compare_versions(a, b);
                assert_eq!(forward.reverse(), compare_versions(b, a));
            }
        }
    }
}
