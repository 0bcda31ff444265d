use std::collections::HashMap;

use quarry_core::{define_id, normalized_path, Range};
use quarry_index::{SymbolKind, Usr};

use crate::update::IndexUpdate;

define_id!(QueryFileId);
define_id!(QueryTypeId);
define_id!(QueryFuncId);
define_id!(QueryVarId);

/// A (file, range) pair in query space.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueryLocation {
    pub file: QueryFileId,
    pub range: Range,
}

/// A call edge endpoint: where the call happens, and the calling function
/// if the call site sits inside one.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueryFuncRef {
    pub func: Option<QueryFuncId>,
    pub loc: QueryLocation,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SymbolId {
    Type(QueryTypeId),
    Func(QueryFuncId),
    Var(QueryVarId),
}

/// A symbol mentioned somewhere in a file; the file's def aggregates these
/// for document-symbol and highlighting queries.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SymbolOccurrence {
    pub symbol: SymbolId,
    pub range: Range,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct QueryFileDef {
    pub path: String,
    pub dependencies: Vec<String>,
    pub inactive_regions: Vec<Range>,
    pub all_symbols: Vec<SymbolOccurrence>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryFile {
    pub path: String,
    pub def: Option<QueryFileDef>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryTypeDef {
    /// The file whose import produced this def; a re-index of that file is
    /// the only event allowed to take the def away.
    pub file: QueryFileId,
    pub short_name: String,
    pub detailed_name: String,
    pub kind: SymbolKind,
    pub hover: String,
    pub comments: String,
    pub definition_spelling: Option<QueryLocation>,
    pub definition_extent: Option<QueryLocation>,
    pub alias_of: Option<QueryTypeId>,
    pub parents: Vec<QueryTypeId>,
    pub types: Vec<QueryTypeId>,
    pub funcs: Vec<QueryFuncId>,
    pub vars: Vec<QueryVarId>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryType {
    pub usr: Usr,
    pub def: Option<QueryTypeDef>,
    pub derived: Vec<QueryTypeId>,
    pub instances: Vec<QueryVarId>,
    pub uses: Vec<QueryLocation>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryFuncDef {
    pub file: QueryFileId,
    pub short_name: String,
    pub detailed_name: String,
    pub kind: SymbolKind,
    pub hover: String,
    pub comments: String,
    pub definition_spelling: Option<QueryLocation>,
    pub definition_extent: Option<QueryLocation>,
    pub declaring_type: Option<QueryTypeId>,
    pub base: Option<QueryFuncId>,
    pub callees: Vec<QueryFuncRef>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryFunc {
    pub usr: Usr,
    pub def: Option<QueryFuncDef>,
    pub declarations: Vec<QueryLocation>,
    pub derived: Vec<QueryFuncId>,
    pub callers: Vec<QueryFuncRef>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryVarDef {
    pub file: QueryFileId,
    pub short_name: String,
    pub detailed_name: String,
    pub kind: SymbolKind,
    pub hover: String,
    pub comments: String,
    pub declaration: Option<QueryLocation>,
    pub definition_spelling: Option<QueryLocation>,
    pub definition_extent: Option<QueryLocation>,
    pub variable_type: Option<QueryTypeId>,
    pub declaring_type: Option<QueryTypeId>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryVar {
    pub usr: Usr,
    pub def: Option<QueryVarDef>,
    pub uses: Vec<QueryLocation>,
}

/// The whole-project symbol graph. Mutated only by delta application on
/// the querydb thread; query handlers read it from the same thread, so no
/// runtime lock guards the graph itself.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct QueryDatabase {
    pub files: Vec<QueryFile>,
    pub types: Vec<QueryType>,
    pub funcs: Vec<QueryFunc>,
    pub vars: Vec<QueryVar>,

    pub usr_to_file: HashMap<String, QueryFileId>,
    pub usr_to_type: HashMap<Usr, QueryTypeId>,
    pub usr_to_func: HashMap<Usr, QueryFuncId>,
    pub usr_to_var: HashMap<Usr, QueryVarId>,
}

impl QueryDatabase {
    pub fn file_id(&self, path: &str) -> Option<QueryFileId> {
        self.usr_to_file.get(&normalized_path(path)).copied()
    }

    pub fn get_or_add_file(&mut self, path: &str) -> QueryFileId {
        let key = normalized_path(path);
        if let Some(id) = self.usr_to_file.get(&key) {
            return *id;
        }
        let id = QueryFileId::new(self.files.len() as u32);
        self.files.push(QueryFile {
            path: path.to_string(),
            def: None,
        });
        self.usr_to_file.insert(key, id);
        id
    }

    pub fn get_or_add_type(&mut self, usr: &str) -> QueryTypeId {
        if let Some(id) = self.usr_to_type.get(usr) {
            return *id;
        }
        let id = QueryTypeId::new(self.types.len() as u32);
        self.types.push(QueryType {
            usr: usr.to_string(),
            ..QueryType::default()
        });
        self.usr_to_type.insert(usr.to_string(), id);
        id
    }

    pub fn get_or_add_func(&mut self, usr: &str) -> QueryFuncId {
        if let Some(id) = self.usr_to_func.get(usr) {
            return *id;
        }
        let id = QueryFuncId::new(self.funcs.len() as u32);
        self.funcs.push(QueryFunc {
            usr: usr.to_string(),
            ..QueryFunc::default()
        });
        self.usr_to_func.insert(usr.to_string(), id);
        id
    }

    pub fn get_or_add_var(&mut self, usr: &str) -> QueryVarId {
        if let Some(id) = self.usr_to_var.get(usr) {
            return *id;
        }
        let id = QueryVarId::new(self.vars.len() as u32);
        self.vars.push(QueryVar {
            usr: usr.to_string(),
            ..QueryVar::default()
        });
        self.usr_to_var.insert(usr.to_string(), id);
        id
    }

    pub fn find_file(&self, path: &str) -> Option<&QueryFile> {
        self.file_id(path).map(|id| &self.files[id.index()])
    }

    pub fn find_type(&self, usr: &str) -> Option<&QueryType> {
        self.usr_to_type.get(usr).map(|id| &self.types[id.index()])
    }

    pub fn find_func(&self, usr: &str) -> Option<&QueryFunc> {
        self.usr_to_func.get(usr).map(|id| &self.funcs[id.index()])
    }

    pub fn find_var(&self, usr: &str) -> Option<&QueryVar> {
        self.usr_to_var.get(usr).map(|id| &self.vars[id.index()])
    }

    /// Where `usr` is defined, if any import currently supplies a
    /// definition.
    pub fn definition_of(&self, usr: &str) -> Option<QueryLocation> {
        if let Some(func) = self.find_func(usr) {
            return func.def.as_ref().and_then(|d| d.definition_spelling);
        }
        if let Some(ty) = self.find_type(usr) {
            return ty.def.as_ref().and_then(|d| d.definition_spelling);
        }
        if let Some(var) = self.find_var(usr) {
            return var.def.as_ref().and_then(|d| d.definition_spelling);
        }
        None
    }

    /// Every location referencing `usr`: uses for types and variables,
    /// call sites for functions.
    pub fn uses_of_symbol(&self, usr: &str) -> Vec<QueryLocation> {
        if let Some(func) = self.find_func(usr) {
            return func.callers.iter().map(|r| r.loc).collect();
        }
        if let Some(ty) = self.find_type(usr) {
            return ty.uses.clone();
        }
        if let Some(var) = self.find_var(usr) {
            return var.uses.clone();
        }
        Vec::new()
    }

    pub fn derived_of_type(&self, usr: &str) -> impl Iterator<Item = &QueryType> + '_ {
        self.find_type(usr)
            .map(|t| t.derived.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(|id| &self.types[id.index()])
    }

    pub fn callers_of_func(&self, usr: &str) -> impl Iterator<Item = &QueryFuncRef> + '_ {
        self.find_func(usr)
            .map(|f| f.callers.as_slice())
            .unwrap_or(&[])
            .iter()
    }

    pub fn symbols_in_file(&self, path: &str) -> &[SymbolOccurrence] {
        self.find_file(path)
            .and_then(|f| f.def.as_ref())
            .map(|d| d.all_symbols.as_slice())
            .unwrap_or(&[])
    }

    pub fn apply_index_update(&mut self, update: IndexUpdate) {
        update.apply_to(self);
    }
}
