//! Output image naming convention.
//!
//! Generated images are stored flat in one directory as
//! `{prefix}-api_{NNN}.png`, numbered per preset prefix.

/// Marker between the preset prefix and the sequence number.
const API_MARKER: &str = "-api_";

/// Format an output filename.
///
/// # Examples
///
/// ```
/// use qedit_core::naming::output_filename;
///
/// assert_eq!(output_filename("qwen04", 1), "qwen04-api_001.png");
/// assert_eq!(output_filename("qwen40", 1234), "qwen40-api_1234.png");
/// ```
pub fn output_filename(prefix: &str, number: u32) -> String {
    format!("{prefix}{API_MARKER}{number:03}.png")
}

/// Extract the sequence number from a filename produced by
/// [`output_filename`] with the same `prefix`.
pub fn parse_sequence(prefix: &str, filename: &str) -> Option<u32> {
    filename
        .strip_prefix(prefix)?
        .strip_prefix(API_MARKER)?
        .strip_suffix(".png")?
        .parse()
        .ok()
}

/// Next free sequence number given the filenames already present.
///
/// One more than the highest existing number for `prefix`, or 1.
pub fn next_sequence<'a>(prefix: &str, existing: impl IntoIterator<Item = &'a str>) -> u32 {
    existing
        .into_iter()
        .filter_map(|name| parse_sequence(prefix, name))
        .max()
        .map_or(1, |n| n.saturating_add(1))
}
