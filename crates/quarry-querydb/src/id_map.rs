use quarry_core::Range;
use quarry_index::{IndexFile, IndexFuncRef, LocalFuncId, LocalTypeId, LocalVarId};

use crate::db::{QueryDatabase, QueryFileId, QueryFuncId, QueryFuncRef, QueryLocation,
    QueryTypeId, QueryVarId,
};

/// Translation from one index file's local id space into the database's
/// global ids. Built in O(n) by looking every USR up in the database,
/// inserting entries for USRs seen for the first time.
///
/// Total on the file's local id space, and stable for the lifetime of the
/// index file it was built for.
pub struct IdMap {
    primary_file: QueryFileId,
    types: Vec<QueryTypeId>,
    funcs: Vec<QueryFuncId>,
    vars: Vec<QueryVarId>,
}

impl IdMap {
    pub fn new(db: &mut QueryDatabase, file: &IndexFile) -> Self {
        debug_assert!(file.types.iter().enumerate().all(|(i, t)| t.id.index() == i));
        debug_assert!(file.funcs.iter().enumerate().all(|(i, f)| f.id.index() == i));
        debug_assert!(file.vars.iter().enumerate().all(|(i, v)| v.id.index() == i));

        Self {
            primary_file: db.get_or_add_file(&file.path),
            types: file.types.iter().map(|t| db.get_or_add_type(&t.usr)).collect(),
            funcs: file.funcs.iter().map(|f| db.get_or_add_func(&f.usr)).collect(),
            vars: file.vars.iter().map(|v| db.get_or_add_var(&v.usr)).collect(),
        }
    }

    pub fn file(&self) -> QueryFileId {
        self.primary_file
    }

    pub fn type_id(&self, local: LocalTypeId) -> QueryTypeId {
        self.types[local.index()]
    }

    pub fn func_id(&self, local: LocalFuncId) -> QueryFuncId {
        self.funcs[local.index()]
    }

    pub fn var_id(&self, local: LocalVarId) -> QueryVarId {
        self.vars[local.index()]
    }

    /// Lift a file-local range into query space. Ranges are canonicalized
    /// to half-open `[start, end)` spans here, so set comparisons during
    /// delta computation see one spelling per span.
    pub fn location(&self, range: Range) -> QueryLocation {
        QueryLocation {
            file: self.primary_file,
            range: range.canonicalized(),
        }
    }

    pub fn func_ref(&self, r: &IndexFuncRef) -> QueryFuncRef {
        QueryFuncRef {
            func: r.id.map(|id| self.func_id(id)),
            loc: self.location(r.range),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_index::{IndexFunc, IndexType, IndexVar};

    fn file_with_symbols(path: &str, usr_suffix: &str) -> IndexFile {
        let mut file = IndexFile::new(path);
        file.types = vec![IndexType {
            id: LocalTypeId::new(0),
            usr: format!("type{usr_suffix}"),
            ..IndexType::default()
        }];
        file.funcs = vec![IndexFunc {
            id: LocalFuncId::new(0),
            usr: format!("func{usr_suffix}"),
            ..IndexFunc::default()
        }];
        file.vars = vec![IndexVar {
            id: LocalVarId::new(0),
            usr: format!("var{usr_suffix}"),
            ..IndexVar::default()
        }];
        file.rebuild_id_cache();
        file
    }

    #[test]
    fn shared_usrs_map_to_one_global_entry() {
        let mut db = QueryDatabase::default();
        let a = file_with_symbols("/p/a.cc", "_shared");
        let b = file_with_symbols("/p/b.cc", "_shared");

        let map_a = IdMap::new(&mut db, &a);
        let map_b = IdMap::new(&mut db, &b);

        assert_ne!(map_a.file(), map_b.file());
        assert_eq!(
            map_a.type_id(LocalTypeId::new(0)),
            map_b.type_id(LocalTypeId::new(0))
        );
        assert_eq!(
            map_a.func_id(LocalFuncId::new(0)),
            map_b.func_id(LocalFuncId::new(0))
        );
        assert_eq!(db.types.len(), 1);
        assert_eq!(db.funcs.len(), 1);
        assert_eq!(db.vars.len(), 1);
    }

    #[test]
    fn locations_carry_the_primary_file() {
        let mut db = QueryDatabase::default();
        let file = file_with_symbols("/p/a.cc", "0");
        let map = IdMap::new(&mut db, &file);
        let loc = map.location(Range::point(3, 1));
        assert_eq!(loc.file, map.file());
    }
}
