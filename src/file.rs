//! Opening append-only log files.

use crate::error::OpenError;
use std::fs::{self, File, OpenOptions};
use std::path::Path;

/// Parse an octal permission spec: `"644"`, `"0644"` or `"0o644"`.
pub fn parse_permissions(spec: &str) -> Result<u32, OpenError> {
    let trimmed = spec.trim();
    let digits = trimmed
        .strip_prefix("0o")
        .or_else(|| trimmed.strip_prefix("0O"))
        .unwrap_or(trimmed);
    match u32::from_str_radix(digits, 8) {
        Ok(mode) if digits.bytes().all(|b| b.is_ascii_digit()) && mode <= 0o7777 => Ok(mode),
        _ => Err(OpenError::InvalidPermissions(spec.to_string())),
    }
}

/// Directory mode for a file mode: every class that may read also gets
/// search permission.
fn dir_mode(mode: u32) -> u32 {
    mode | ((mode & 0o444) >> 2)
}

/// Open `dir/file_name` for appending, creating the folder and the file
/// when missing.
pub fn open_append(dir: &Path, file_name: &str, permissions: &str) -> Result<File, OpenError> {
    let mode = parse_permissions(permissions)?;

    if !dir.is_dir() {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(dir_mode(mode));
        }
        builder.create(dir).map_err(|source| OpenError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let path = dir.join(file_name);
    let mut options = OpenOptions::new();
    options.append(true).create(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    options
        .open(&path)
        .map_err(|source| OpenError::Open { path, source })
}
