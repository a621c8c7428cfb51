// src/core/account/shells.rs

use crate::core::errors::AccountError;
use std::fs;
use std::path::Path;

/// Reads the list of valid login shells, with `current` first.
///
/// Blank lines and `#` comments are skipped, and `current` is not repeated if
/// the file lists it as well.
pub fn available_shells(path: &Path, current: &str) -> Result<Vec<String>, AccountError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| AccountError::StoreRead(format!("{}: {e}", path.display())))?;

    let mut shells = vec![current.to_string()];
    shells.extend(
        contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#') && *line != current)
            .map(str::to_string),
    );
    Ok(shells)
}
