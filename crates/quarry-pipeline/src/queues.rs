use std::sync::Arc;

use quarry_index::IndexFile;
use quarry_querydb::{IdMap, IndexUpdate};
use quarry_queue::{MultiQueueWaiter, ThreadedQueue};

use crate::messages::OutboundMessage;

/// An editor- or project-originated request to (re)index one file.
#[derive(Clone, Debug)]
pub struct IndexRequest {
    pub path: String,
    pub args: Vec<String>,
    pub is_interactive: bool,
    /// The editor buffer's contents, so what is indexed matches what the
    /// editor shows even when the on-disk file lags behind.
    pub contents: String,
}

impl IndexRequest {
    pub fn new(
        path: impl Into<String>,
        args: Vec<String>,
        is_interactive: bool,
        contents: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            args,
            is_interactive,
            contents: contents.into(),
        }
    }
}

/// A parsed (or cache-loaded) index waiting for its id maps.
#[derive(Debug)]
pub struct DoIdMap {
    pub current: IndexFile,
    pub previous: Option<IndexFile>,
    pub is_interactive: bool,
    pub write_to_disk: bool,
    /// Set once the request has been routed through the
    /// `load_previous_index` detour, so it is not routed twice.
    pub load_previous: bool,
}

impl DoIdMap {
    pub fn new(current: IndexFile, is_interactive: bool, write_to_disk: bool) -> Self {
        Self {
            current,
            previous: None,
            is_interactive,
            write_to_disk,
            load_previous: false,
        }
    }
}

/// An index file together with its translation into global ids.
pub struct MappedIndex {
    pub file: IndexFile,
    pub ids: IdMap,
}

/// Output of the id-map stage, input to the delta stage.
pub struct OnIdMapped {
    pub previous: Option<MappedIndex>,
    pub current: MappedIndex,
    pub is_interactive: bool,
    pub write_to_disk: bool,
}

/// A delta ready to apply to the query database.
#[derive(Debug)]
pub struct OnIndexed {
    pub update: IndexUpdate,
}

/// The pipeline's queues, passed explicitly to every worker. Replaces the
/// process-global queue singleton of older designs so fixtures construct
/// an isolated bundle per test.
pub struct QueueBundle {
    pub index_request: ThreadedQueue<IndexRequest>,
    pub do_id_map: ThreadedQueue<DoIdMap>,
    pub load_previous_index: ThreadedQueue<DoIdMap>,
    pub on_id_mapped: ThreadedQueue<OnIdMapped>,
    pub on_indexed: ThreadedQueue<OnIndexed>,
    pub stdout: ThreadedQueue<OutboundMessage>,
}

impl QueueBundle {
    pub fn new(
        querydb_waiter: Arc<MultiQueueWaiter>,
        indexer_waiter: Arc<MultiQueueWaiter>,
        stdout_waiter: Arc<MultiQueueWaiter>,
    ) -> Arc<Self> {
        Arc::new(Self {
            index_request: ThreadedQueue::new(indexer_waiter.clone()),
            do_id_map: ThreadedQueue::new(querydb_waiter.clone()),
            load_previous_index: ThreadedQueue::new(indexer_waiter.clone()),
            on_id_mapped: ThreadedQueue::new(indexer_waiter.clone()),
            // Drained by both the querydb worker (apply) and idle indexer
            // workers (merge), so both waiters hear about it.
            on_indexed: ThreadedQueue::with_waiters(vec![querydb_waiter, indexer_waiter]),
            stdout: ThreadedQueue::new(stdout_waiter),
        })
    }
}
