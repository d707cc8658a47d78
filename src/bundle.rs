//! Bundle files: plaintext lists of package names, one per line, processed
//! as a batch install. Blank lines and lines starting with `#` are ignored.

use crate::Result;
use std::fs;
use std::path::Path;

/// Parse a bundle file into an ordered list of package names.
pub fn parse_bundle<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)?;
    Ok(parse_bundle_str(&contents))
}

pub fn parse_bundle_str(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
