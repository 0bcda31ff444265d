use serde::{Deserialize, Serialize};

/// A point in a document. Lines and columns are 1-based, matching the
/// positions the parser reports.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Position {
    pub line: i32,
    pub column: i32,
}

impl Position {
    pub const fn new(line: i32, column: i32) -> Self {
        Self { line, column }
    }
}

/// A half-open `[start, end)` span within a single document.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// A zero-width range, used for symbols whose extent the parser did not
    /// report.
    pub const fn point(line: i32, column: i32) -> Self {
        let p = Position::new(line, column);
        Self { start: p, end: p }
    }

    /// Canonicalize so that `start <= end`. Parsers occasionally emit
    /// reversed extents for macro expansions.
    pub fn canonicalized(self) -> Self {
        if self.end < self.start {
            Self {
                start: self.end,
                end: self.start,
            }
        } else {
            self
        }
    }

    pub fn contains(&self, position: Position) -> bool {
        position >= self.start && position < self.end
    }
}
