//! Configuration surface consumed by the indexing core.
//!
//! Keys are camelCase on the wire. Unknown options are ignored so newer
//! clients can talk to older servers.

use std::path::PathBuf;

use quarry_core::SerializeFormat;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Directory holding cached per-file indexes.
    pub cache_directory: PathBuf,

    /// Minimum interval between progress reports in milliseconds.
    /// Negative disables reporting entirely; 0 reports on every event.
    pub progress_report_frequency_ms: i64,

    pub serialize_format: SerializeFormat,

    pub completion: CompletionConfig,
    pub index: IndexConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompletionConfig {
    /// Pre-filter and sort completion responses before they reach the
    /// client. Large unfiltered lists overwhelm some editors.
    pub filter_and_sort: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IndexConfig {
    /// Size of the indexer worker pool.
    pub threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_directory: PathBuf::from(".quarry/cache"),
            progress_report_frequency_ms: 500,
            serialize_format: SerializeFormat::default(),
            completion: CompletionConfig::default(),
            index: IndexConfig::default(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            filter_and_sort: true,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            threads: available.saturating_sub(1).max(1),
        }
    }
}
