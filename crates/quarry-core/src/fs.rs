use std::path::Path;
use std::time::UNIX_EPOCH;

/// Last modification time of `path` in milliseconds since the epoch, or
/// `None` if the file does not exist or its metadata is unreadable.
///
/// Callers compare these values for equality only; monotonicity is not
/// assumed.
pub fn last_modification_time(path: &str) -> Option<i64> {
    let metadata = std::fs::metadata(Path::new(path)).ok()?;
    let modified = metadata.modified().ok()?;
    let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
    Some(since_epoch.as_millis() as i64)
}

/// Read a file's contents as UTF-8, lossily. `None` if the file cannot be
/// read.
pub fn read_content(path: &str) -> Option<String> {
    let bytes = std::fs::read(Path::new(path)).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_has_no_mtime() {
        assert_eq!(last_modification_time("/nonexistent/quarry/file.cc"), None);
    }

    #[test]
    fn mtime_and_content_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.cc");
        std::fs::write(&path, "int main() {}\n").unwrap();
        let path = path.to_str().unwrap();

        assert!(last_modification_time(path).is_some());
        assert_eq!(read_content(path).as_deref(), Some("int main() {}\n"));
    }
}
