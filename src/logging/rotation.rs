use camino::Utf8Path;
use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use std::fs;
use std::io;

/// Size-rotated log file: `<path>`, `<path>.1` .. `<path>.<backup_count>`.
pub type RotatingFile = FileRotate<AppendCount>;

/// Open a size-rotated log file, creating parent directories on demand.
///
/// Rotation happens once the active file has grown past `max_bytes`, so a
/// record is never split across files. `max_bytes == 0` disables rotation.
pub fn rotating_file(
    path: impl AsRef<Utf8Path>,
    max_bytes: u64,
    backup_count: usize,
) -> io::Result<RotatingFile> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let limit = match usize::try_from(max_bytes) {
        Ok(0) => ContentLimit::None,
        Ok(bytes) => ContentLimit::BytesSurpassed(bytes),
        Err(_) => ContentLimit::None,
    };
    Ok(FileRotate::new(
        path.as_std_path(),
        AppendCount::new(backup_count),
        limit,
        Compression::None,
        #[cfg(unix)]
        None,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use std::io::Write;
    use tempfile::TempDir;

    fn log_path(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(dir.path().join("logs").join("app.log")).unwrap()
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = log_path(&dir);
        let mut writer = rotating_file(&path, 100, 2).unwrap();
        writer.write_all(b"hello\n").unwrap();
        writer.flush().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello\n");
    }

    #[test]
    fn test_rotates_when_limit_exceeded() {
        let dir = TempDir::new().unwrap();
        let path = log_path(&dir);
        let mut writer = rotating_file(&path, 10, 2).unwrap();

        writer.write_all(b"first-line\n").unwrap();
        writer.write_all(b"second-line\n").unwrap();
        writer.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second-line\n");
        assert_eq!(
            fs::read_to_string(format!("{}.1", path)).unwrap(),
            "first-line\n"
        );
    }

    #[test]
    fn test_zero_limit_never_rotates() {
        let dir = TempDir::new().unwrap();
        let path = log_path(&dir);
        let mut writer = rotating_file(&path, 0, 2).unwrap();

        for _ in 0..50 {
            writer.write_all(b"0123456789\n").unwrap();
        }
        writer.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 50);
        assert!(!Utf8PathBuf::from(format!("{}.1", path)).exists());
    }
}
