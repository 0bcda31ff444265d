//! Shared primitives for the quarry indexing core.

mod diagnostic;
mod format;
mod fs;
mod paths;
mod position;

pub mod id;

pub use diagnostic::{Diagnostic, DiagnosticSeverity};
pub use format::SerializeFormat;
pub use fs::{last_modification_time, read_content};
pub use paths::normalized_path;
pub use position::{Position, Range};
