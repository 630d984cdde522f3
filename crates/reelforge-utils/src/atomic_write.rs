//! Atomic file writes for the artifact output boundary.
//!
//! Readers must never observe a half-written blob: content goes to a
//! temporary file in the destination directory first, then lands via rename.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

/// Write `contents` to `path` atomically.
///
/// The parent directory is created if missing. The temporary file is placed
/// in the same directory as the destination so the final rename stays on one
/// filesystem.
///
/// # Errors
///
/// Returns an `io::Error` if the directory cannot be created, the temporary
/// file cannot be written, or the rename fails.
pub fn write_file_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/structure.html");

        write_file_atomic(&path, b"<html>v1</html>").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<html>v1</html>");

        write_file_atomic(&path, b"<html>v2</html>").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<html>v2</html>");
    }

    #[test]
    fn leaves_no_temp_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_file_atomic(&path, b"{}").unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
    }
}
