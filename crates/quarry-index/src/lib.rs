//! Per-translation-unit index files: the parser's output, the unit of
//! caching, and the input to the query-database import pipeline.

mod indexer;
mod model;
mod serialize;

pub use indexer::{FileContents, Indexer, TestEntry, TestIndexer};
pub use model::{
    IdCache, IndexFile, IndexFunc, IndexFuncDef, IndexFuncRef, IndexInclude, IndexType,
    IndexTypeDef, IndexVar, IndexVarDef, LanguageId, LocalFuncId, LocalTypeId, LocalVarId,
    SymbolKind, Usr,
};
pub use serialize::{deserialize, serialize, SerializeError, INDEX_FILE_VERSION};
