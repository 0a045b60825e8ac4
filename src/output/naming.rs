//! Rotation file naming.
//!
//! Output files are named `tweets-<N>.jsonl.gz`, where `N` is a decimal
//! rotation index with no padding. The index to resume at is recovered from
//! the names already present in the destination folder.

use std::sync::LazyLock;

use regex::Regex;

/// Prefix shared by every rotated output file.
pub const FILE_PREFIX: &str = "tweets";

/// Extension shared by every rotated output file.
pub const FILE_EXTENSION: &str = "jsonl.gz";

/// Matches a complete rotated filename and captures its index.
#[allow(clippy::expect_used)]
static ROTATED_FILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^tweets-(\d+)\.jsonl\.gz$").expect("rotation regex is valid") // Static pattern, safe to panic
});

/// Extracts the rotation index from a filename.
///
/// Returns `None` unless the whole name matches `tweets-<digits>.jsonl.gz`.
///
/// # Examples
///
/// ```
/// use collector_core::output::index_from_filename;
///
/// assert_eq!(index_from_filename("tweets-2.jsonl.gz"), Some(2));
/// assert_eq!(index_from_filename("tweets-a.jsonl.gz"), None);
/// ```
#[must_use]
pub fn index_from_filename(name: &str) -> Option<u64> {
    let captures = ROTATED_FILE_PATTERN.captures(name)?;
    // Digit runs too long for u64 are not a usable index.
    captures.get(1)?.as_str().parse().ok()
}

/// Returns the index to continue writing at, given the names in a folder.
///
/// Names that are not rotated files are ignored. With no rotated files the
/// index is 0.
#[must_use]
pub fn latest_index<I, S>(names: I) -> u64
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter_map(|name| index_from_filename(name.as_ref()))
        .max()
        .unwrap_or(0)
}

/// Formats the filename for a rotation index.
#[must_use]
pub fn filename_for_index(index: u64) -> String {
    format!("{FILE_PREFIX}-{index}.{FILE_EXTENSION}")
}
