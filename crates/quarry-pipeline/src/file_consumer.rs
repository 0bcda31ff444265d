use std::collections::HashSet;
use std::sync::Mutex;

/// Process-wide set of paths currently owned by some in-flight parse.
/// Guarantees at most one concurrent parse per path and lets cache reloads
/// skip dependencies that a parse already covers.
#[derive(Default)]
pub struct FileConsumerSharedState {
    used_files: Mutex<HashSet<String>>,
}

impl FileConsumerSharedState {
    /// Claim `path`. Returns false if it is already owned.
    pub fn mark(&self, path: &str) -> bool {
        self.used_files
            .lock()
            .expect("file consumer mutex poisoned")
            .insert(path.to_string())
    }

    /// Release `path` so the next parse that covers it owns it again.
    pub fn reset(&self, path: &str) {
        self.used_files
            .lock()
            .expect("file consumer mutex poisoned")
            .remove(path);
    }

    pub fn is_used(&self, path: &str) -> bool {
        self.used_files
            .lock()
            .expect("file consumer mutex poisoned")
            .contains(path)
    }

    pub fn is_empty(&self) -> bool {
        self.used_files
            .lock()
            .expect("file consumer mutex poisoned")
            .is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_reset_mark() {
        let state = FileConsumerSharedState::default();
        assert!(state.mark("/p/foo.h"));
        assert!(!state.mark("/p/foo.h"));
        assert!(state.is_used("/p/foo.h"));
        state.reset("/p/foo.h");
        assert!(state.mark("/p/foo.h"));
    }
}
