use std::collections::HashSet;
use std::sync::Mutex;

/// Enforces at-most-once semantics at two pipeline stages.
///
/// The dependency set lives for the whole session: once some translation
/// unit has claimed a dependency, other units skip re-importing it. The
/// querydb set is transient: a path is held from the start of its id-map
/// stage until its update has been applied.
#[derive(Default)]
pub struct ImportManager {
    dependency_imported: Mutex<HashSet<String>>,
    querydb_processing: Mutex<HashSet<String>>,
}

impl ImportManager {
    /// Claim `path` as a dependency. Returns false if another translation
    /// unit already imported it this session.
    pub fn try_mark_dependency_imported(&self, path: &str) -> bool {
        self.dependency_imported
            .lock()
            .expect("import manager mutex poisoned")
            .insert(path.to_string())
    }

    /// Returns false if a querydb import for `path` is already in flight.
    pub fn start_querydb_import(&self, path: &str) -> bool {
        self.querydb_processing
            .lock()
            .expect("import manager mutex poisoned")
            .insert(path.to_string())
    }

    pub fn done_querydb_import(&self, path: &str) {
        self.querydb_processing
            .lock()
            .expect("import manager mutex poisoned")
            .remove(path);
    }
}
