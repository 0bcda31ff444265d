use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::CacheError;

/// Write `bytes` to `path` by staging a temp file and renaming it into
/// place, so readers never observe a partial cache entry.
pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    // Stage next to the destination; a rename across filesystems is not
    // atomic. The temp file removes itself if anything below fails.
    let mut staged = NamedTempFile::new_in(parent)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    staged
        .persist(path)
        .map_err(|persist| CacheError::from(persist.error))?;
    Ok(())
}

/// Map a source path to a flat cache file name. Separators collapse to
/// `@`, so `/p/foo.cc` and `/p@foo.cc` could in principle collide; the
/// original shipped the same scheme for years without incident.
pub(crate) fn escape_file_name(path: &str) -> String {
    path.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '@',
            other => other,
        })
        .collect()
}
