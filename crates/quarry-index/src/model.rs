use std::collections::HashMap;

use quarry_core::{define_id, Diagnostic, Range};
use serde::{Deserialize, Serialize};

define_id!(LocalTypeId);
define_id!(LocalFuncId);
define_id!(LocalVarId);

/// Unique Symbol Reference: a parser-issued string that stably identifies a
/// declared entity across translation units.
pub type Usr = String;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LanguageId {
    C,
    #[default]
    Cpp,
    ObjC,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    #[default]
    Unknown,
    Namespace,
    Class,
    Struct,
    Enum,
    Union,
    TypeAlias,
    Function,
    Method,
    Constructor,
    Destructor,
    Variable,
    Field,
    Parameter,
    Macro,
}

/// An `#include` observed while parsing, with the path it resolved to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IndexInclude {
    pub line: i32,
    pub resolved_path: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IndexTypeDef {
    pub short_name: String,
    pub detailed_name: String,
    pub kind: SymbolKind,
    #[serde(default)]
    pub hover: String,
    #[serde(default)]
    pub comments: String,
    pub definition_spelling: Option<Range>,
    pub definition_extent: Option<Range>,
    pub alias_of: Option<LocalTypeId>,
    pub parents: Vec<LocalTypeId>,
    /// Structural children, by local id.
    pub types: Vec<LocalTypeId>,
    pub funcs: Vec<LocalFuncId>,
    pub vars: Vec<LocalVarId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IndexType {
    pub id: LocalTypeId,
    pub usr: Usr,
    pub def: Option<IndexTypeDef>,
    pub derived: Vec<LocalTypeId>,
    pub instances: Vec<LocalVarId>,
    pub uses: Vec<Range>,
}

/// A call edge endpoint. `id` is absent for calls made from outside any
/// indexed function (static initializers, global scope).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct IndexFuncRef {
    pub id: Option<LocalFuncId>,
    pub range: Range,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IndexFuncDef {
    pub short_name: String,
    pub detailed_name: String,
    pub kind: SymbolKind,
    #[serde(default)]
    pub hover: String,
    #[serde(default)]
    pub comments: String,
    pub definition_spelling: Option<Range>,
    pub definition_extent: Option<Range>,
    pub declaring_type: Option<LocalTypeId>,
    pub base: Option<LocalFuncId>,
    pub callees: Vec<IndexFuncRef>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IndexFunc {
    pub id: LocalFuncId,
    pub usr: Usr,
    pub def: Option<IndexFuncDef>,
    pub declarations: Vec<Range>,
    pub derived: Vec<LocalFuncId>,
    pub callers: Vec<IndexFuncRef>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IndexVarDef {
    pub short_name: String,
    pub detailed_name: String,
    pub kind: SymbolKind,
    #[serde(default)]
    pub hover: String,
    #[serde(default)]
    pub comments: String,
    pub declaration: Option<Range>,
    pub definition_spelling: Option<Range>,
    pub definition_extent: Option<Range>,
    pub variable_type: Option<LocalTypeId>,
    pub declaring_type: Option<LocalTypeId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IndexVar {
    pub id: LocalVarId,
    pub usr: Usr,
    pub def: Option<IndexVarDef>,
    pub uses: Vec<Range>,
}

/// Reverse lookup from USR to file-local id, rebuilt after deserialization.
/// Not persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdCache {
    pub primary_file: String,
    pub usr_to_type_id: HashMap<Usr, LocalTypeId>,
    pub usr_to_func_id: HashMap<Usr, LocalFuncId>,
    pub usr_to_var_id: HashMap<Usr, LocalVarId>,
}

/// The parser's output for one translation unit: dense arrays of symbols
/// keyed by local id, plus everything needed to decide whether a future
/// request can skip parsing.
///
/// Invariant: every local id stored in any field points at an entry in the
/// corresponding array.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IndexFile {
    #[serde(skip)]
    pub path: String,
    pub version: i32,
    pub last_modification_time: i64,
    pub language: LanguageId,
    /// The translation unit whose parse produced this file. For a header
    /// this is the `.cc` that included it; requests against the header are
    /// re-rooted here.
    pub import_file: String,
    pub args: Vec<String>,
    pub includes: Vec<IndexInclude>,
    pub dependencies: Vec<String>,
    pub skipped_by_preprocessor: Vec<Range>,
    pub types: Vec<IndexType>,
    pub funcs: Vec<IndexFunc>,
    pub vars: Vec<IndexVar>,

    #[serde(skip)]
    pub id_cache: IdCache,
    /// The source text this index was built from; cached alongside the
    /// index so editors can diff against what was actually indexed.
    #[serde(skip)]
    pub file_contents: String,
    #[serde(skip)]
    pub diagnostics: Vec<Diagnostic>,
}

impl IndexFile {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            version: crate::INDEX_FILE_VERSION,
            import_file: path.clone(),
            id_cache: IdCache {
                primary_file: path.clone(),
                ..IdCache::default()
            },
            path,
            ..Self::default()
        }
    }

    pub fn resolve_type(&self, id: LocalTypeId) -> &IndexType {
        &self.types[id.index()]
    }

    pub fn resolve_func(&self, id: LocalFuncId) -> &IndexFunc {
        &self.funcs[id.index()]
    }

    pub fn resolve_var(&self, id: LocalVarId) -> &IndexVar {
        &self.vars[id.index()]
    }

    /// Restore the USR lookup state that is not serialized.
    pub fn rebuild_id_cache(&mut self) {
        self.id_cache.primary_file = self.path.clone();
        self.id_cache.usr_to_type_id = self
            .types
            .iter()
            .map(|t| (t.usr.clone(), t.id))
            .collect();
        self.id_cache.usr_to_func_id = self
            .funcs
            .iter()
            .map(|f| (f.usr.clone(), f.id))
            .collect();
        self.id_cache.usr_to_var_id = self.vars.iter().map(|v| (v.usr.clone(), v.id)).collect();
    }
}
