//! Deterministic ordering of version and build names.
//!
//! Versions are split on `-`, `.` and `_` into fragments. Fragments made of
//! digits compare numerically and sort before textual fragments, everything
//! else compares lexicographically. Missing trailing fragments read as `"0"`.

use std::cmp::Ordering;

use crate::types::FileDetails;

const SEPARATORS: &[char] = &['-', '.', '_'];

/// Compares two version strings.
///
/// Distinct inputs never compare equal, so sorting with this function is
/// stable across runs regardless of the input order.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left: Vec<&str> = a.split(SEPARATORS).collect();
    let right: Vec<&str> = b.split(SEPARATORS).collect();

    for idx in 0..left.len().max(right.len()) {
        let l = left.get(idx).copied().unwrap_or("0");
        let r = right.get(idx).copied().unwrap_or("0");

        let ordering = compare_fragments(l, r);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    left.len().cmp(&right.len()).then_with(|| a.cmp(b))
}

/// Directories first, then files, each group in version order.
#[must_use]
pub fn compare_files(a: &FileDetails, b: &FileDetails) -> Ordering {
    match (a.is_directory(), b.is_directory()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => compare_versions(a.name(), b.name()),
    }
}

/// Sorts versions in ascending order.
pub fn sort_versions<S: AsRef<str>>(versions: &mut [S]) {
    versions.sort_by(|a, b| compare_versions(a.as_ref(), b.as_ref()));
}

fn compare_fragments(a: &str, b: &str) -> Ordering {
    match (is_numeric(a), is_numeric(b)) {
        (true, true) => compare_numeric(a, b),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.cmp(b),
    }
}

fn is_numeric(fragment: &str) -> bool {
    !fragment.is_empty() && fragment.bytes().all(|b| b.is_ascii_digit())
}

fn compare_numeric(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(l), Ok(r)) => l.cmp(&r),
        // Too large for u64: compare as unbounded integers.
        _ => {
            let l = a.trim_start_matches('0');
            let r = b.trim_start_matches('0');
            l.len().cmp(&r.len()).then_with(|| l.cmp(r))
        }
    }
}
