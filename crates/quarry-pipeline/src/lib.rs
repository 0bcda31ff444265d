//! The import pipeline: turns a stream of index requests and editor events
//! into a live query database, with partial results visible while workers
//! are still draining.
//!
//! Three worker roles run for the life of the process: N indexer workers
//! (parse, delta, previous-index load, on-indexed merge), one querydb
//! worker (id-map and apply), and one stdout worker. They communicate only
//! through the [`QueueBundle`], which is passed explicitly to every worker
//! instead of living in process-global state.

mod completion;
mod file_consumer;
mod import_manager;
mod messages;
mod pipeline;
mod progress;
mod queues;
mod working_files;

pub use completion::{
    filter_and_sort_completion_items, CodeCompleteCache, CodeCompleteCacheState, CompletionCallback,
    CompletionEngine, CompletionItem, CompletionProvider, CompletionSink, IncludeCompletionState,
};
pub use file_consumer::FileConsumerSharedState;
pub use import_manager::ImportManager;
pub use messages::{
    stdout_worker, OutboundMessage, ProgressReport, PublishDiagnosticsParams, RequestId,
    SetInactiveRegionsParams,
};
pub use pipeline::{
    index_build_delta, index_do_parse, index_from_completion, index_load_previous,
    index_merge_on_indexed, indexer_main, querydb_import_main, querydb_main, PipelineContext,
};
pub use progress::{ActiveThread, ImportPipelineStatus};
pub use queues::{DoIdMap, IndexRequest, MappedIndex, OnIdMapped, OnIndexed, QueueBundle};
pub use working_files::{WorkingFile, WorkingFileEvent, WorkingFileEventKind, WorkingFiles};
