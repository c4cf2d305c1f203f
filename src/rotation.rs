use std::path::Path;

use crate::error::Result;

/// Reads the map rotation from the given text file, one map per line.
/// Blank lines are dropped. The rotation is assumed to be duplicate-free.
pub fn get_rotation_from_filepath(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
