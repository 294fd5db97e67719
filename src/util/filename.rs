//! Value-log file naming conventions.

use std::path::{Path, PathBuf};

/// Name of the manifest file.
pub const MANIFEST_FILE_NAME: &str = "MANIFEST";

/// Generate a value file path: `level_<L>_number_<N>[.<ext>]`.
pub fn value_file_path(
    dir: &Path,
    level: u32,
    file_number: u32,
    extension: Option<&str>,
) -> PathBuf {
    match extension {
        Some(ext) => dir.join(format!("level_{}_number_{}.{}", level, file_number, ext)),
        None => dir.join(format!("level_{}_number_{}", level, file_number)),
    }
}

/// Generate the manifest file path.
pub fn manifest_file_path(dir: &Path) -> PathBuf {
    dir.join(MANIFEST_FILE_NAME)
}

/// Generate the temp path used while rewriting the manifest.
pub fn manifest_temp_path(dir: &Path) -> PathBuf {
    dir.join("MANIFEST.tmp")
}

/// Generate the lock file path.
pub fn lock_file_path(dir: &Path) -> PathBuf {
    dir.join("LOCK")
}

/// Parse a value file name into its `(level, file_number)` pair.
///
/// Returns `None` if the name doesn't match the value file pattern.
pub fn parse_value_file_name(name: &str) -> Option<(u32, u32)> {
    let rest = name.strip_prefix("level_")?;

    // Drop any extension before splitting out the numbers.
    let rest = match rest.split_once('.') {
        Some((stem, _ext)) => stem,
        None => rest,
    };

    let (level_str, number_str) = rest.split_once("_number_")?;
    let level = level_str.parse::<u32>().ok()?;
    let number = number_str.parse::<u32>().ok()?;
    Some((level, number))
}

/// List all value files in a directory as `(level, file_number)` pairs.
pub fn list_value_files(dir: &Path) -> std::io::Result<Vec<(u32, u32)>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(pair) = parse_value_file_name(&name.to_string_lossy()) {
            files.push(pair);
        }
    }

    files.sort();
    Ok(files)
}

/// Delete a file, ignoring "not found" errors.
pub fn delete_file(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Create directory if it doesn't exist.
pub fn create_dir_if_missing(path: &Path) -> std::io::Result<()> {
    match std::fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

/// Sync a directory to ensure file operations are durable.
pub fn sync_dir(path: &Path) -> std::io::Result<()> {
    let dir = std::fs::File::open(path)?;
    dir.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_value_file_paths() {
        let dir = Path::new("/data/values");

        assert_eq!(
            value_file_path(dir, 0, 0, None),
            Path::new("/data/values/level_0_number_0")
        );
        assert_eq!(
            value_file_path(dir, 3, 17, None),
            Path::new("/data/values/level_3_number_17")
        );
        assert_eq!(
            value_file_path(dir, 1, 2, Some("vlog")),
            Path::new("/data/values/level_1_number_2.vlog")
        );
        assert_eq!(manifest_file_path(dir), Path::new("/data/values/MANIFEST"));
        assert_eq!(lock_file_path(dir), Path::new("/data/values/LOCK"));
    }

    #[test]
    fn test_parse_value_file_name() {
        assert_eq!(parse_value_file_name("level_0_number_0"), Some((0, 0)));
        assert_eq!(parse_value_file_name("level_12_number_345"), Some((12, 345)));
        assert_eq!(parse_value_file_name("level_1_number_2.vlog"), Some((1, 2)));

        assert_eq!(parse_value_file_name("MANIFEST"), None);
        assert_eq!(parse_value_file_name("level_x_number_2"), None);
        assert_eq!(parse_value_file_name("level_1_2"), None);
    }

    #[test]
    fn test_list_value_files() {
        let dir = tempdir().unwrap();

        std::fs::write(value_file_path(dir.path(), 0, 2, None), "").unwrap();
        std::fs::write(value_file_path(dir.path(), 0, 1, None), "").unwrap();
        std::fs::write(value_file_path(dir.path(), 1, 0, None), "").unwrap();
        std::fs::write(manifest_file_path(dir.path()), "").unwrap();

        let files = list_value_files(dir.path()).unwrap();
        assert_eq!(files, vec![(0, 1), (0, 2), (1, 0)]);
    }

    #[test]
    fn test_delete_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone");

        // Deleting a missing file is not an error.
        assert!(delete_file(&path).is_ok());

        std::fs::write(&path, "x").unwrap();
        delete_file(&path).unwrap();
        assert!(!path.exists());
    }
}
