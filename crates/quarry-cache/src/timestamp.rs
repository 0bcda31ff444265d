use std::collections::HashMap;
use std::sync::Mutex;

use crate::manager::CacheManager;

/// Last modification time we recorded for each path when its index was
/// written back. Falls back to the cached index itself for paths indexed
/// in an earlier session. Values are compared for equality only.
#[derive(Default)]
pub struct TimestampManager {
    timestamps: Mutex<HashMap<String, i64>>,
}

impl TimestampManager {
    pub fn get_last_cached_modification_time(
        &self,
        cache: &dyn CacheManager,
        path: &str,
    ) -> Option<i64> {
        if let Some(time) = self
            .timestamps
            .lock()
            .expect("timestamp mutex poisoned")
            .get(path)
        {
            return Some(*time);
        }

        let time = cache.try_load(path)?.last_modification_time;
        self.timestamps
            .lock()
            .expect("timestamp mutex poisoned")
            .insert(path.to_string(), time);
        Some(time)
    }

    pub fn update_cached_modification_time(&self, path: &str, time: i64) {
        self.timestamps
            .lock()
            .expect("timestamp mutex poisoned")
            .insert(path.to_string(), time);
    }
}
