use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use quarry_core::Position;
use serde::Serialize;

/// One candidate in a completion response. `priority` is the parser's
/// relevance score (lower is better); `sort_text` is assigned during
/// post-processing so clients display our ordering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Default)]
pub struct CompletionItem {
    pub label: String,
    pub detail: Option<String>,
    pub priority: i32,
    #[serde(rename = "sortText")]
    pub sort_text: String,

    #[serde(skip)]
    found: bool,
    #[serde(skip)]
    skip: i32,
}

impl CompletionItem {
    pub fn new(label: impl Into<String>, priority: i32) -> Self {
        Self {
            label: label.into(),
            priority,
            ..Self::default()
        }
    }
}

/// Fuzzy subsequence match: does every character of `search` appear in
/// `content` in order? Also counts the characters skipped along the way,
/// which ranks tighter matches first.
fn subsequence_count_skip(search: &str, content: &str) -> (bool, i32) {
    let mut skip = 0;
    let mut content_chars = content.chars();
    for needle in search.chars() {
        loop {
            match content_chars.next() {
                Some(c) if c.eq_ignore_ascii_case(&needle) => break,
                Some(_) => skip += 1,
                None => return (false, skip),
            }
        }
    }
    (true, skip)
}

/// Fixed-width base64 rendering used for `sort_text`: same digit alphabet
/// and width for every item, so lexicographic order equals numeric order.
fn to_fixed_base64(mut input: u32) -> String {
    const DIGITS: &[u8] = b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    const WIDTH: usize = (32 - 1) / 6 + 1;
    let mut out = [0u8; WIDTH];
    for slot in out.iter_mut().rev() {
        *slot = DIGITS[(input % 64) as usize];
        input /= 64;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Pre-filter and order completion candidates before they reach the
/// client. Pure: depends only on the prefix typed at the cursor, and is
/// applied identically to fresh and cached results so clients observe a
/// consistent ordering.
pub fn filter_and_sort_completion_items(
    items: &mut Vec<CompletionItem>,
    complete_text: &str,
    enable: bool,
) {
    if !enable {
        for item in items.iter_mut() {
            item.sort_text = to_fixed_base64(item.priority as u32);
        }
        return;
    }

    // Hide reserved-looking candidates unless the user asked for them.
    if !complete_text.is_empty() && !complete_text.starts_with('_') {
        items.retain(|item| !item.label.starts_with('_'));
    }

    for item in items.iter_mut() {
        let (found, skip) = subsequence_count_skip(complete_text, &item.label);
        item.found = found;
        item.skip = skip;
    }

    items.sort_by(|a, b| {
        b.found
            .cmp(&a.found)
            .then(a.skip.cmp(&b.skip))
            .then(a.priority.cmp(&b.priority))
            .then(a.label.len().cmp(&b.label.len()))
            .then(a.label.cmp(&b.label))
    });

    for (i, item) in items.iter_mut().enumerate() {
        item.sort_text = to_fixed_base64(i as u32);
    }

    const MAX_RESULT_SIZE: usize = 100;
    if items.len() > MAX_RESULT_SIZE && complete_text.is_empty() {
        items.truncate(MAX_RESULT_SIZE);
    }
}

/// Mutable state behind a completion cache's lock.
#[derive(Default)]
pub struct CodeCompleteCacheState {
    pub cached_path: Option<String>,
    pub cached_completion_position: Option<Position>,
    pub cached_results: Vec<CompletionItem>,
}

/// The last successfully computed completion list and the context it was
/// valid for. Two instances exist: the *global* cache is valid for any
/// position in its path, the *non-global* cache only for the exact
/// recorded position.
#[derive(Default)]
pub struct CodeCompleteCache {
    state: Mutex<CodeCompleteCacheState>,
}

impl CodeCompleteCache {
    /// All access goes through the lock; the cache never calls out while
    /// holding it.
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut CodeCompleteCacheState) -> R) -> R {
        let mut state = self.state.lock().expect("completion cache mutex poisoned");
        f(&mut state)
    }

    pub fn is_cache_valid(&self, path: &str, position: Position) -> bool {
        self.with_lock(|state| {
            state.cached_path.as_deref() == Some(path)
                && state.cached_completion_position == Some(position)
        })
    }
}

/// Invoked exactly once with the parser's raw completion results.
pub type CompletionSink = Box<dyn FnOnce(Vec<CompletionItem>) + Send>;

/// Invoked exactly once with post-processed results; the flag says whether
/// they came from a cache.
pub type CompletionCallback = Box<dyn FnOnce(Vec<CompletionItem>, bool) + Send>;

/// The completion parser, an external collaborator. Implementations may
/// run the sink on any thread, as long as it runs exactly once.
pub trait CompletionProvider: Send + Sync {
    fn code_complete(&self, path: &str, position: Position, done: CompletionSink);
}

/// Serves completion requests through the two caches, refreshing behind
/// cached responses.
pub struct CompletionEngine {
    provider: Arc<dyn CompletionProvider>,
    pub global_cache: Arc<CodeCompleteCache>,
    pub non_global_cache: Arc<CodeCompleteCache>,
    filter_and_sort: bool,
}

impl CompletionEngine {
    pub fn new(provider: Arc<dyn CompletionProvider>, filter_and_sort: bool) -> Self {
        Self {
            provider,
            global_cache: Arc::new(CodeCompleteCache::default()),
            non_global_cache: Arc::new(CodeCompleteCache::default()),
            filter_and_sort,
        }
    }

    /// Serve a completion at a stable position (see
    /// `WorkingFile::find_stable_completion_source`, which also supplies
    /// `is_global` and `existing_text`).
    ///
    /// A global-cache hit answers immediately from the cache and schedules
    /// a fresh completion whose raw results replace the cached vector. A
    /// non-global hit answers from the cache alone. Everything else goes
    /// to the provider, which also populates the appropriate cache.
    pub fn complete(
        &self,
        path: &str,
        position: Position,
        is_global: bool,
        existing_text: &str,
        on_result: CompletionCallback,
    ) {
        let filter = self.filter_and_sort;
        let existing = existing_text.to_string();

        let global_hit = is_global
            && self.global_cache.with_lock(|state| {
                state.cached_path.as_deref() == Some(path) && !state.cached_results.is_empty()
            });
        if global_hit {
            let mut results = self.global_cache.with_lock(|s| s.cached_results.clone());
            filter_and_sort_completion_items(&mut results, &existing, filter);
            on_result(results, true);

            // Freshen behind the response; the path stays as-is, only the
            // vector is replaced.
            let cache = Arc::clone(&self.global_cache);
            self.provider.code_complete(
                path,
                position,
                Box::new(move |results| {
                    cache.with_lock(|state| state.cached_results = results);
                }),
            );
            return;
        }

        if self.non_global_cache.is_cache_valid(path, position) {
            let mut results = self.non_global_cache.with_lock(|s| s.cached_results.clone());
            filter_and_sort_completion_items(&mut results, &existing, filter);
            on_result(results, true);
            return;
        }

        let cache = if is_global {
            Arc::clone(&self.global_cache)
        } else {
            Arc::clone(&self.non_global_cache)
        };
        let cached_path = path.to_string();
        self.provider.code_complete(
            path,
            position,
            Box::new(move |results| {
                let mut filtered = results.clone();
                filter_and_sort_completion_items(&mut filtered, &existing, filter);
                on_result(filtered, false);

                // Cache the raw results after responding, so a cached
                // replay can re-run post-processing for its own prefix.
                cache.with_lock(|state| {
                    state.cached_path = Some(cached_path);
                    state.cached_completion_position = (!is_global).then_some(position);
                    state.cached_results = results;
                });
            }),
        );
    }
}

/// Candidate `#include` completions, shared between the project scanner
/// and completion requests. The scanner flags `is_scanning` while it is
/// still appending; readers that observe the flag cleared see a final,
/// immutable list.
#[derive(Default)]
pub struct IncludeCompletionState {
    is_scanning: AtomicBool,
    items: Mutex<Vec<CompletionItem>>,
}

impl IncludeCompletionState {
    pub fn begin_scan(&self) {
        self.is_scanning.store(true, Ordering::SeqCst);
    }

    pub fn add_item(&self, item: CompletionItem) {
        self.items
            .lock()
            .expect("include completion mutex poisoned")
            .push(item);
    }

    pub fn finish_scan(&self) {
        self.is_scanning.store(false, Ordering::SeqCst);
    }

    pub fn is_scanning(&self) -> bool {
        self.is_scanning.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Vec<CompletionItem> {
        self.items
            .lock()
            .expect("include completion mutex poisoned")
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[CompletionItem]) -> Vec<&str> {
        items.iter().map(|i| i.label.as_str()).collect()
    }

    #[test]
    fn subsequence_matching() {
        assert_eq!(subsequence_count_skip("fb", "foo_bar"), (true, 3));
        assert_eq!(subsequence_count_skip("", "anything"), (true, 0));
        assert!(!subsequence_count_skip("xyz", "foo").0);
    }

    #[test]
    fn fixed_base64_preserves_order() {
        assert!(to_fixed_base64(1) < to_fixed_base64(2));
        assert!(to_fixed_base64(63) < to_fixed_base64(64));
        assert_eq!(to_fixed_base64(0).len(), to_fixed_base64(u32::MAX).len());
    }

    #[test]
    fn filter_hides_underscore_candidates_for_plain_prefixes() {
        let mut items = vec![
            CompletionItem::new("__builtin_frob", 0),
            CompletionItem::new("frobnicate", 0),
        ];
        filter_and_sort_completion_items(&mut items, "fr", true);
        assert_eq!(labels(&items), ["frobnicate"]);

        let mut items = vec![
            CompletionItem::new("__builtin_frob", 0),
            CompletionItem::new("frobnicate", 0),
        ];
        filter_and_sort_completion_items(&mut items, "_", true);
        assert_eq!(labels(&items), ["__builtin_frob", "frobnicate"]);
    }

    #[test]
    fn tighter_matches_sort_first() {
        let mut items = vec![
            CompletionItem::new("setTimeoutHandler", 5),
            CompletionItem::new("seth", 5),
            CompletionItem::new("unrelated", 1),
        ];
        filter_and_sort_completion_items(&mut items, "seth", true);
        assert_eq!(labels(&items), ["seth", "setTimeoutHandler", "unrelated"]);
        assert!(items[0].sort_text < items[1].sort_text);
    }

    #[test]
    fn disabled_filtering_only_assigns_sort_text() {
        let mut items = vec![
            CompletionItem::new("zeta", 9),
            CompletionItem::new("alpha", 3),
        ];
        filter_and_sort_completion_items(&mut items, "z", false);
        assert_eq!(labels(&items), ["zeta", "alpha"]);
        assert!(items[1].sort_text < items[0].sort_text);
    }

    #[test]
    fn empty_prefix_truncates_oversized_lists() {
        let mut items: Vec<CompletionItem> = (0..150)
            .map(|i| CompletionItem::new(format!("item{i:03}"), i))
            .collect();
        filter_and_sort_completion_items(&mut items, "", true);
        assert_eq!(items.len(), 100);

        let mut items: Vec<CompletionItem> = (0..150)
            .map(|i| CompletionItem::new(format!("item{i:03}"), i))
            .collect();
        filter_and_sort_completion_items(&mut items, "item", true);
        assert_eq!(items.len(), 150);
    }
}
