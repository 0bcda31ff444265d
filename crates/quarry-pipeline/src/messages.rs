use std::io::Write;

use quarry_core::{Diagnostic, Range};
use quarry_queue::MultiQueueWaiter;
use serde::Serialize;

use crate::queues::QueueBundle;

/// A request id echoed back in a response envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RequestId {
    Int(i64),
    String(String),
}

/// A fully serialized payload bound for the client. Framing is applied by
/// the embedding transport; the core only guarantees whole-message writes
/// in queue order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub method: String,
    pub body: String,
}

impl OutboundMessage {
    pub fn notification(method: &str, params: &impl Serialize) -> Self {
        let params = serde_json::to_value(params).unwrap_or_else(|err| {
            tracing::error!(method, error = %err, "failed to serialize notification params");
            serde_json::Value::Null
        });
        let body = serde_json::json!({ "method": method, "params": params }).to_string();
        Self {
            method: method.to_string(),
            body,
        }
    }

    pub fn response(id: &RequestId, result: &impl Serialize) -> Self {
        let result = serde_json::to_value(result).unwrap_or_else(|err| {
            tracing::error!(error = %err, "failed to serialize response result");
            serde_json::Value::Null
        });
        let body = serde_json::json!({ "id": id, "result": result }).to_string();
        Self {
            method: String::new(),
            body,
        }
    }
}

/// Queue depths and worker activity, emitted as `$quarry/progress`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub index_request_count: usize,
    pub do_id_map_count: usize,
    pub load_previous_index_count: usize,
    pub on_id_mapped_count: usize,
    pub on_indexed_count: usize,
    pub active_threads: i64,
}

impl ProgressReport {
    pub fn is_all_zero(&self) -> bool {
        self.index_request_count == 0
            && self.do_id_map_count == 0
            && self.load_previous_index_count == 0
            && self.on_id_mapped_count == 0
            && self.on_indexed_count == 0
            && self.active_threads == 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PublishDiagnosticsParams {
    pub uri: String,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetInactiveRegionsParams {
    pub uri: String,
    pub inactive_regions: Vec<Range>,
}

/// The stdout worker: the only writer to the client. Drains the stdout
/// queue, writing one payload per line.
pub fn stdout_worker(queues: &QueueBundle, waiter: &MultiQueueWaiter, sink: &mut dyn Write) {
    loop {
        drain_stdout(queues, sink);
        waiter.wait(&[&queues.stdout]);
    }
}

/// One non-blocking drain pass, split out so tests can pump without a
/// dedicated thread.
pub(crate) fn drain_stdout(queues: &QueueBundle, sink: &mut dyn Write) {
    while let Some(message) = queues.stdout.try_dequeue() {
        if let Err(err) = writeln!(sink, "{}", message.body) {
            tracing::error!(method = %message.method, error = %err, "failed to write to client");
        }
    }
    let _ = sink.flush();
}
