//! The in-memory symbol graph: the union of every imported index file,
//! keyed by USR, queryable by relation.
//!
//! Entries live in dense arenas addressed by global ids, so back-edges
//! (including cycles: a type using a function that derives from it) are
//! plain indices, never owning references. Entries are created on first
//! USR sighting and never renumbered; a definition disappearing tombstones
//! the `def`, not the entry.

mod db;
mod id_map;
mod update;

pub use db::{
    QueryDatabase, QueryFile, QueryFileDef, QueryFileId, QueryFunc, QueryFuncDef, QueryFuncId,
    QueryFuncRef, QueryLocation, QueryType, QueryTypeDef, QueryTypeId, QueryVar, QueryVarDef,
    QueryVarId, SymbolId, SymbolOccurrence,
};
pub use id_map::IdMap;
pub use update::{DefRemoval, DefUpdate, IndexUpdate, MergeableUpdate};
