use std::sync::Arc;

use quarry_cache::{CacheManager, TimestampManager};
use quarry_config::Config;
use quarry_core::normalized_path;
use quarry_index::{FileContents, IndexFile, Indexer};
use quarry_querydb::{IdMap, IndexUpdate, QueryDatabase};
use quarry_queue::MultiQueueWaiter;

use crate::file_consumer::FileConsumerSharedState;
use crate::import_manager::ImportManager;
use crate::messages::{OutboundMessage, PublishDiagnosticsParams, SetInactiveRegionsParams};
use crate::progress::{ActiveThread, ImportPipelineStatus};
use crate::queues::{DoIdMap, MappedIndex, OnIdMapped, OnIndexed, QueueBundle};
use crate::working_files::WorkingFiles;

/// Everything a pipeline worker needs, bundled for explicit injection.
/// One instance is shared by all workers of a process (and by a test
/// fixture, which is the point of not using globals).
pub struct PipelineContext {
    pub config: Config,
    pub queues: Arc<QueueBundle>,
    pub cache: Arc<dyn CacheManager>,
    pub timestamps: Arc<TimestampManager>,
    pub import_manager: Arc<ImportManager>,
    pub file_consumer_shared: Arc<FileConsumerSharedState>,
    pub working_files: Arc<WorkingFiles>,
    pub status: Arc<ImportPipelineStatus>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FileParseQuery {
    NeedsParse,
    DoesNotNeedParse,
    NoSuchFile,
}

/// Decide whether `path` must be reparsed, updating shared state as a side
/// effect: a changed file is released in `file_consumer_shared` so the new
/// parse can claim it. Calling this twice for the same changed path
/// returns `NeedsParse` the first time only, because the timestamp map is
/// consulted against disk each call but dependency claims stick.
fn file_needs_parse(
    ctx: &PipelineContext,
    is_interactive: bool,
    path: &str,
    is_dependency: bool,
) -> FileParseQuery {
    // A dependency someone else already imported is not worth reparsing.
    if !is_interactive
        && is_dependency
        && !ctx.import_manager.try_mark_dependency_imported(path)
    {
        return FileParseQuery::DoesNotNeedParse;
    }

    let Some(modification_timestamp) = quarry_core::last_modification_time(path) else {
        return FileParseQuery::NoSuchFile;
    };

    let last_cached = ctx
        .timestamps
        .get_last_cached_modification_time(ctx.cache.as_ref(), path);

    if last_cached != Some(modification_timestamp) {
        ctx.file_consumer_shared.reset(path);
        return FileParseQuery::NeedsParse;
    }

    FileParseQuery::DoesNotNeedParse
}

fn emit_diagnostics(ctx: &PipelineContext, index: &IndexFile) {
    ctx.queues.stdout.enqueue(OutboundMessage::notification(
        "textDocument/publishDiagnostics",
        &PublishDiagnosticsParams {
            uri: index.path.clone(),
            diagnostics: index.diagnostics.clone(),
        },
    ));
}

fn do_parse_file(
    ctx: &PipelineContext,
    indexer: &dyn Indexer,
    is_interactive: bool,
    path: &str,
    args: &[String],
    contents: &FileContents,
) -> Vec<DoIdMap> {
    let mut result = Vec::new();

    // Always run this block, even when interactive, so dependency
    // timestamps are checked and changed files are released in
    // `file_consumer_shared`.
    if let Some(previous_index) = ctx.cache.try_load(path) {
        let path_state = file_needs_parse(ctx, is_interactive, path, false);

        // Target file no longer exists on disk; emit nothing.
        if path_state == FileParseQuery::NoSuchFile {
            tracing::warn!(path, "skipping index, file disappeared");
            return result;
        }

        let mut needs_reparse = is_interactive || path_state == FileParseQuery::NeedsParse;

        for dependency in &previous_index.dependencies {
            // `!=` rather than `== NeedsParse`: a vanished dependency also
            // forces the translation unit through a fresh parse.
            if file_needs_parse(ctx, is_interactive, dependency, true)
                != FileParseQuery::DoesNotNeedParse
            {
                tracing::info!(%dependency, via = %previous_index.path, "timestamp has changed");
                needs_reparse = true;
                // Do not break: the release side effect inside
                // `file_needs_parse` must run for every changed dependency.
            }
        }

        // No timestamps changed; serve straight from the cache.
        if !needs_reparse {
            tracing::info!(path, "skipping parse, no timestamp change");

            if let Some(current) = ctx.cache.try_take_or_load(path) {
                result.push(DoIdMap::new(current, is_interactive, false));
            }
            for dependency in &previous_index.dependencies {
                // Only load a dependency no other file has claimed; large
                // projects share headers between many translation units.
                if !ctx.file_consumer_shared.mark(dependency) {
                    continue;
                }

                // Absent when there is no cache for the dependency but
                // another file already started importing it.
                let Some(dependency_index) = ctx.cache.try_take_or_load(dependency) else {
                    continue;
                };

                tracing::info!(%dependency, via = %previous_index.path, "emitting index result");
                result.push(DoIdMap::new(dependency_index, is_interactive, false));
            }
            return result;
        }
    }

    tracing::info!(path, "parsing");

    // Capture contents for every loaded cache up front to shrink the race
    // between indexing a file and reading it from disk; the primary buffer
    // arrived with the request.
    let mut file_contents = vec![contents.clone()];
    ctx.cache.iterate_loaded_caches(&mut |index| {
        if file_contents.iter().any(|c| c.path == index.path) {
            return;
        }
        match quarry_core::read_content(&index.path) {
            Some(content) => file_contents.push(FileContents::new(index.path.clone(), content)),
            None => tracing::error!(path = %index.path, "failed to load index content"),
        }
    });
    if contents.path != path && !file_contents.iter().any(|c| c.path == path) {
        match quarry_core::read_content(path) {
            Some(content) => file_contents.push(FileContents::new(path, content)),
            None => {
                tracing::error!(path, "skipping index, file cannot be read");
                return result;
            }
        }
    }

    let indexes = indexer.index(path, args, &file_contents);
    if indexes.is_empty() {
        tracing::warn!(path, "parse produced no indexes");
    }

    for new_index in indexes {
        // Diagnostics only for non-interactive parses; interactive
        // diagnostics are owned by code completion.
        if !is_interactive {
            emit_diagnostics(ctx, &new_index);
        }

        // The querydb worker requests the previous index itself if the id
        // map turns out to need one.
        tracing::info!(path = %new_index.path, "emitting index result");
        result.push(DoIdMap::new(new_index, is_interactive, true));
    }

    result
}

fn parse_file(
    ctx: &PipelineContext,
    indexer: &dyn Indexer,
    is_interactive: bool,
    path: &str,
    args: &[String],
    contents: String,
) -> Vec<DoIdMap> {
    let file_contents = FileContents::new(path, contents);

    // Re-root through the cached index's `import_file` so a request
    // against a header parses the translation unit that owns it.
    let tu_path = ctx
        .cache
        .try_load(path)
        .map(|cached| cached.import_file.clone())
        .filter(|import_file| !import_file.is_empty())
        .unwrap_or_else(|| path.to_string());

    do_parse_file(ctx, indexer, is_interactive, &tu_path, args, &file_contents)
}

/// Stage 1: drain one index request, parse or cache-load, and feed the
/// id-map queue.
pub fn index_do_parse(ctx: &PipelineContext, indexer: &dyn Indexer) -> bool {
    let Some(request) = ctx.queues.index_request.try_dequeue() else {
        return false;
    };

    let responses = parse_file(
        ctx,
        indexer,
        request.is_interactive,
        &request.path,
        &request.args,
        request.contents,
    );

    // No responses means no id-map work; skip the enqueue (and its lock).
    if responses.is_empty() {
        return false;
    }

    ctx.queues.do_id_map.enqueue_all(responses);
    true
}

/// Stage 3: drain one id-mapped pair, build the delta, and write the
/// current index back if requested.
pub fn index_build_delta(ctx: &PipelineContext) -> bool {
    let Some(response) = ctx.queues.on_id_mapped.try_dequeue() else {
        return false;
    };

    let OnIdMapped {
        previous,
        current,
        write_to_disk,
        ..
    } = response;

    let update = IndexUpdate::create_delta(
        previous.as_ref().map(|m| (&m.ids, &m.file)),
        (&current.ids, &current.file),
    );
    tracing::info!(
        path = %current.file.path,
        is_delta = previous.is_some(),
        "built index update"
    );

    if write_to_disk {
        tracing::info!(path = %current.file.path, "writing cached index to disk");
        let path = current.file.path.clone();
        let last_modification_time = current.file.last_modification_time;
        ctx.cache.write_to_cache(current.file);
        ctx.timestamps
            .update_cached_modification_time(&path, last_modification_time);
    }

    ctx.queues.on_indexed.enqueue(OnIndexed { update });
    true
}

/// The `load_previous_index` detour: fetch the prior index from cache and
/// send the request back through id-map.
pub fn index_load_previous(ctx: &PipelineContext) -> bool {
    let Some(mut response) = ctx.queues.load_previous_index.try_dequeue() else {
        return false;
    };

    response.previous = ctx.cache.try_take_or_load(&response.current.path);
    if response.previous.is_none() {
        tracing::error!(
            path = %response.current.path,
            "unable to load previous index for already imported index"
        );
    }

    ctx.queues.do_id_map.enqueue(response);
    true
}

/// Idle work: fold queued on-indexed updates together so the querydb
/// worker applies one merged update instead of many small ones.
pub fn index_merge_on_indexed(ctx: &PipelineContext) -> bool {
    let Some(mut root) = ctx.queues.on_indexed.try_dequeue() else {
        return false;
    };

    let mut did_merge = false;
    while let Some(to_join) = ctx.queues.on_indexed.try_dequeue() {
        did_merge = true;
        root.update.merge(to_join.update);
    }

    ctx.queues.on_indexed.enqueue(root);
    did_merge
}

/// Indexer worker loop. Each iteration runs one parse, one delta build,
/// one previous-index load, and (when otherwise idle) one merge, then
/// blocks on the four queues it reads. Runs for the life of the process.
pub fn indexer_main(ctx: &PipelineContext, indexer: &dyn Indexer, waiter: &MultiQueueWaiter) {
    loop {
        let mut did_work = false;

        {
            let _active = ActiveThread::new(&ctx.config, &ctx.status, &ctx.queues);

            // Run every stage each iteration so the querydb worker is
            // never starved and users can query the partially built index.
            did_work = index_do_parse(ctx, indexer) || did_work;
            did_work = index_build_delta(ctx) || did_work;
            did_work = index_load_previous(ctx) || did_work;

            if !did_work {
                did_work = index_merge_on_indexed(ctx);
            }
        }

        if !did_work {
            waiter.wait(&[
                &ctx.queues.on_indexed,
                &ctx.queues.index_request,
                &ctx.queues.on_id_mapped,
                &ctx.queues.load_previous_index,
            ]);
        }
    }
}

/// Stages 2 and 4, on the querydb thread: drain `do_id_map` building id
/// maps, then drain `on_indexed` mutating the database. Returns whether
/// anything was processed.
pub fn querydb_import_main(ctx: &PipelineContext, db: &mut QueryDatabase) -> bool {
    let _active = ActiveThread::new(&ctx.config, &ctx.status, &ctx.queues);
    let mut did_work = false;

    while let Some(mut request) = ctx.queues.do_id_map.try_dequeue() {
        did_work = true;

        let already_imported = db
            .usr_to_file
            .contains_key(&normalized_path(&request.current.path));

        if !request.load_previous && request.previous.is_none() && already_imported {
            // A pure cache reload of a file the database already holds is
            // a no-op: the file was unchanged on disk, so the database is
            // already current. Drop it before taking an import slot.
            if !request.write_to_disk {
                tracing::info!(path = %request.current.path, "dropping no-op reimport");
                continue;
            }

            // A fresh parse of an already-imported file needs its prior
            // index for delta computation; detour through the indexer-side
            // loader and come back.
            request.load_previous = true;
            ctx.queues.load_previous_index.enqueue(request);
            continue;
        }

        // Do this *after* the previous-index check, or the id map for an
        // in-flight path would never be generated.
        if !ctx.import_manager.start_querydb_import(&request.current.path) {
            tracing::info!(
                path = %request.current.path,
                "dropping index, already being imported"
            );
            continue;
        }

        let current_ids = IdMap::new(db, &request.current);
        let previous = request.previous.take().map(|file| {
            let ids = IdMap::new(db, &file);
            MappedIndex { file, ids }
        });

        ctx.queues.on_id_mapped.enqueue(OnIdMapped {
            previous,
            current: MappedIndex {
                file: request.current,
                ids: current_ids,
            },
            is_interactive: request.is_interactive,
            write_to_disk: request.write_to_disk,
        });
    }

    while let Some(mut response) = ctx.queues.on_indexed.try_dequeue() {
        did_work = true;

        // Fold whatever else is queued into this update first; applying
        // one merged update amortizes the bookkeeping below.
        while let Some(to_join) = ctx.queues.on_indexed.try_dequeue() {
            response.update.merge(to_join.update);
        }

        // Refresh open files before the update lands so handlers comparing
        // buffer and index contents see a consistent pair.
        for file_def in &response.update.files_def_update {
            if !ctx.working_files.is_open(&file_def.path) {
                continue;
            }

            match ctx.cache.load_cached_file_contents(&file_def.path) {
                Some(contents) => ctx.working_files.set_index_content(&file_def.path, contents),
                None => {
                    if let Some(buffer) = ctx
                        .working_files
                        .with_file(&file_def.path, |f| f.buffer_content.clone())
                    {
                        ctx.working_files.set_index_content(&file_def.path, buffer);
                    }
                }
            }

            ctx.queues.stdout.enqueue(OutboundMessage::notification(
                "$quarry/setInactiveRegions",
                &SetInactiveRegionsParams {
                    uri: file_def.path.clone(),
                    inactive_regions: file_def.inactive_regions.clone(),
                },
            ));
        }

        let touched: Vec<String> = response
            .update
            .touched_files()
            .map(str::to_string)
            .collect();

        db.apply_index_update(response.update);

        // Release import slots only after the update is visible.
        for path in &touched {
            ctx.import_manager.done_querydb_import(path);
        }
    }

    did_work
}

/// Querydb worker loop; the embedding server interleaves query handling
/// between iterations. Runs for the life of the process.
pub fn querydb_main(ctx: &PipelineContext, db: &mut QueryDatabase, waiter: &MultiQueueWaiter) {
    loop {
        if !querydb_import_main(ctx, db) {
            waiter.wait(&[&ctx.queues.do_id_map, &ctx.queues.on_indexed]);
        }
    }
}

/// Feed indexes produced by the completion parser straight into the
/// pipeline, skipping the parse stage. Most of indexing time is spent
/// parsing, so reusing completion's translation unit indexes a save in
/// near real time.
pub fn index_from_completion(ctx: &PipelineContext, path: &str, indexes: Vec<IndexFile>) {
    ctx.file_consumer_shared.reset(path);

    if indexes.len() > 1 {
        tracing::warn!(path, "completion index update generated more than one index");
    }

    let items: Vec<DoIdMap> = indexes
        .into_iter()
        .map(|index| {
            tracing::info!(path = %index.path, "emitting index result");
            DoIdMap::new(index, true, true)
        })
        .collect();
    if items.is_empty() {
        return;
    }
    ctx.queues.do_id_map.enqueue_all(items);
}
