use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use quarry_core::Range;

use crate::model::{IndexFile, IndexFunc, IndexFuncDef, LocalFuncId, SymbolKind};

/// A (path, source text) pair handed to the parser. The primary buffer's
/// contents ride along with every request so what is indexed matches what
/// the editor shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileContents {
    pub path: String,
    pub content: String,
}

impl FileContents {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// The parser capability: turn (path, compiler args, file contents) into
/// per-translation-unit index files. The concrete clang-backed variant
/// lives with the embedding binary; an empty result means the parse failed.
pub trait Indexer: Send + Sync {
    fn index(&self, path: &str, args: &[String], contents: &[FileContents]) -> Vec<IndexFile>;
}

/// Scripted entry for [`TestIndexer`]: indexing `path` yields one index
/// file containing `num_symbols` functions. `num_symbols == 0` models a
/// parse failure (empty result set).
#[derive(Clone, Debug)]
pub struct TestEntry {
    pub path: String,
    pub num_symbols: usize,
}

impl TestEntry {
    pub fn new(path: impl Into<String>, num_symbols: usize) -> Self {
        Self {
            path: path.into(),
            num_symbols,
        }
    }
}

/// An `Indexer` that replays scripted outputs instead of parsing.
///
/// Each path holds a queue of outputs; `index` pops the front entry and
/// keeps replaying the last one, so a test can script "first parse sees X,
/// every later parse sees Y".
#[derive(Default)]
pub struct TestIndexer {
    scripted: Mutex<HashMap<String, VecDeque<Vec<IndexFile>>>>,
}

impl TestIndexer {
    pub fn new(entries: impl IntoIterator<Item = TestEntry>) -> Self {
        let indexer = Self::default();
        for entry in entries {
            let files = if entry.num_symbols == 0 {
                Vec::new()
            } else {
                vec![make_scripted_file(&entry.path, entry.num_symbols)]
            };
            indexer.script(&entry.path, files);
        }
        indexer
    }

    /// Append a scripted output for `path`.
    pub fn script(&self, path: &str, files: Vec<IndexFile>) {
        self.scripted
            .lock()
            .expect("test indexer mutex poisoned")
            .entry(path.to_string())
            .or_default()
            .push_back(files);
    }
}

impl Indexer for TestIndexer {
    fn index(&self, path: &str, _args: &[String], contents: &[FileContents]) -> Vec<IndexFile> {
        let mut scripted = self.scripted.lock().expect("test indexer mutex poisoned");
        let Some(outputs) = scripted.get_mut(path) else {
            return Vec::new();
        };

        let mut files = if outputs.len() > 1 {
            outputs.pop_front().unwrap_or_default()
        } else {
            outputs.front().cloned().unwrap_or_default()
        };

        for file in &mut files {
            if file.last_modification_time == 0 {
                file.last_modification_time =
                    quarry_core::last_modification_time(&file.path).unwrap_or(0);
            }
            if file.file_contents.is_empty() {
                if let Some(primary) = contents.iter().find(|c| c.path == file.path) {
                    file.file_contents = primary.content.clone();
                }
            }
        }
        files
    }
}

fn make_scripted_file(path: &str, num_symbols: usize) -> IndexFile {
    let mut file = IndexFile::new(path);
    file.funcs = (0..num_symbols)
        .map(|i| IndexFunc {
            id: LocalFuncId::new(i as u32),
            usr: format!("usr_{path}_{i}"),
            def: Some(IndexFuncDef {
                short_name: format!("fn_{i}"),
                detailed_name: format!("void fn_{i}()"),
                kind: SymbolKind::Function,
                definition_spelling: Some(Range::point(i as i32 + 1, 1)),
                definition_extent: Some(Range::point(i as i32 + 1, 1)),
                ..IndexFuncDef::default()
            }),
            ..IndexFunc::default()
        })
        .collect();
    file.rebuild_id_cache();
    file
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unscripted_path_yields_empty() {
        let indexer = TestIndexer::new([TestEntry::new("foo.cc", 3)]);
        assert!(indexer.index("bar.cc", &[], &[]).is_empty());
    }

    #[test]
    fn entry_produces_one_file_with_n_symbols() {
        let indexer = TestIndexer::new([TestEntry::new("foo.cc", 5)]);
        let files = indexer.index("foo.cc", &[], &[]);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].funcs.len(), 5);
        assert_eq!(files[0].path, "foo.cc");
    }

    #[test]
    fn zero_symbols_models_parse_failure() {
        let indexer = TestIndexer::new([TestEntry::new("foo.cc", 0)]);
        assert!(indexer.index("foo.cc", &[], &[]).is_empty());
    }

    #[test]
    fn scripted_sequence_replays_then_repeats_last() {
        let indexer = TestIndexer::default();
        indexer.script("foo.cc", vec![IndexFile::new("foo.cc")]);
        let mut second = IndexFile::new("foo.cc");
        second.args = vec!["-DSECOND".into()];
        indexer.script("foo.cc", vec![second]);

        assert!(indexer.index("foo.cc", &[], &[])[0].args.is_empty());
        assert_eq!(indexer.index("foo.cc", &[], &[])[0].args, ["-DSECOND"]);
        assert_eq!(indexer.index("foo.cc", &[], &[])[0].args, ["-DSECOND"]);
    }

    #[test]
    fn primary_contents_are_captured() {
        let indexer = TestIndexer::new([TestEntry::new("foo.cc", 1)]);
        let files = indexer.index(
            "foo.cc",
            &[],
            &[FileContents::new("foo.cc", "void fn_0();")],
        );
        assert_eq!(files[0].file_contents, "void fn_0();");
    }
}
