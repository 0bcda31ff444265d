use std::collections::HashMap;
use std::sync::Mutex;

use quarry_core::{normalized_path, Position};

/// An editor-open file: the live buffer, the contents that were last
/// indexed, and a monotonic version. Lifetime matches the editor's
/// open/close events.
#[derive(Debug, Clone)]
pub struct WorkingFile {
    pub path: String,
    pub version: i64,
    pub buffer_content: String,
    /// Snapshot of the source the query database currently reflects;
    /// query handlers diff against this to fix up stale ranges.
    pub index_content: String,
    buffer_lines: Vec<String>,
}

impl WorkingFile {
    fn new(path: String, contents: String, version: i64) -> Self {
        let mut file = Self {
            path,
            version,
            index_content: contents.clone(),
            buffer_content: String::new(),
            buffer_lines: Vec::new(),
        };
        file.set_buffer_content(contents);
        file
    }

    fn set_buffer_content(&mut self, contents: String) {
        self.buffer_lines = contents.split('\n').map(str::to_string).collect();
        self.buffer_content = contents;
    }

    pub fn set_index_content(&mut self, contents: String) {
        self.index_content = contents;
    }

    /// Rewind `position` to the start of the identifier under the cursor.
    ///
    /// Completion results stay valid while the user keeps typing the same
    /// identifier, so the rewound position is what the completion caches
    /// key on. Also reports whether the completion is *global* (the
    /// identifier is not reached through `.`, `->`, or `::`) and the
    /// prefix already typed. Lines and columns are 1-based.
    pub fn find_stable_completion_source(&self, position: Position) -> (Position, bool, String) {
        let line_index = position.line.max(1) as usize - 1;
        let Some(line) = self.buffer_lines.get(line_index) else {
            return (position, true, String::new());
        };

        let chars: Vec<char> = line.chars().collect();
        let cursor = (position.column.max(1) as usize - 1).min(chars.len());
        let mut start = cursor;
        while start > 0 {
            let c = chars[start - 1];
            if c.is_alphanumeric() || c == '_' {
                start -= 1;
            } else {
                break;
            }
        }

        let existing_completion: String = chars[start..cursor].iter().collect();

        let mut is_global = true;
        if start >= 1 && chars[start - 1] == '.' {
            is_global = false;
        } else if start >= 2 {
            let preceding = [chars[start - 2], chars[start - 1]];
            if preceding == ['-', '>'] || preceding == [':', ':'] {
                is_global = false;
            }
        }

        (
            Position::new(position.line, start as i32 + 1),
            is_global,
            existing_completion,
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WorkingFileEventKind {
    Open,
    Change,
    Close,
}

#[derive(Clone, Debug)]
pub struct WorkingFileEvent {
    pub path: String,
    pub kind: WorkingFileEventKind,
    pub contents: Option<String>,
    pub version: Option<i64>,
}

/// Registry of editor-open files, keyed by normalized path. Accessed from
/// the querydb worker (apply stage) and query handlers.
#[derive(Default)]
pub struct WorkingFiles {
    files: Mutex<HashMap<String, WorkingFile>>,
}

impl WorkingFiles {
    pub fn on_event(&self, event: WorkingFileEvent) {
        match event.kind {
            WorkingFileEventKind::Open => self.on_open(
                &event.path,
                event.contents.unwrap_or_default(),
                event.version.unwrap_or(0),
            ),
            WorkingFileEventKind::Change => self.on_change(
                &event.path,
                event.contents.unwrap_or_default(),
                event.version.unwrap_or(0),
            ),
            WorkingFileEventKind::Close => self.on_close(&event.path),
        }
    }

    pub fn on_open(&self, path: &str, contents: String, version: i64) {
        self.files
            .lock()
            .expect("working files mutex poisoned")
            .insert(
                normalized_path(path),
                WorkingFile::new(path.to_string(), contents, version),
            );
    }

    pub fn on_change(&self, path: &str, contents: String, version: i64) {
        let mut files = self.files.lock().expect("working files mutex poisoned");
        let Some(file) = files.get_mut(&normalized_path(path)) else {
            tracing::warn!(path, "change event for a file that is not open");
            return;
        };
        file.set_buffer_content(contents);
        file.version = version;
    }

    pub fn on_close(&self, path: &str) {
        self.files
            .lock()
            .expect("working files mutex poisoned")
            .remove(&normalized_path(path));
    }

    pub fn is_open(&self, path: &str) -> bool {
        self.files
            .lock()
            .expect("working files mutex poisoned")
            .contains_key(&normalized_path(path))
    }

    pub fn set_index_content(&self, path: &str, contents: String) {
        if let Some(file) = self
            .files
            .lock()
            .expect("working files mutex poisoned")
            .get_mut(&normalized_path(path))
        {
            file.set_index_content(contents);
        }
    }

    pub fn with_file<R>(&self, path: &str, f: impl FnOnce(&WorkingFile) -> R) -> Option<R> {
        self.files
            .lock()
            .expect("working files mutex poisoned")
            .get(&normalized_path(path))
            .map(f)
    }
}
