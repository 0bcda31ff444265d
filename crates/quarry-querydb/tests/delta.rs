//! Delta construction, merge, and application against the query database.

use pretty_assertions::assert_eq;
use quarry_core::Range;
use quarry_index::{
    IndexFile, IndexFunc, IndexFuncDef, IndexFuncRef, IndexType, IndexTypeDef, LocalFuncId,
    LocalTypeId, SymbolKind,
};
use quarry_querydb::{IdMap, IndexUpdate, QueryDatabase};

const FUNC_USR: &str = "c:@F@f#";
const TYPE_USR: &str = "c:@S@Widget";

/// An index of `path` holding one function; `define` controls whether the
/// file carries the definition, `call_sites` how many times it calls it.
fn func_file(path: &str, define: bool, call_sites: usize) -> IndexFile {
    let mut file = IndexFile::new(path);
    file.funcs = vec![IndexFunc {
        id: LocalFuncId::new(0),
        usr: FUNC_USR.to_string(),
        def: define.then(|| IndexFuncDef {
            short_name: "f".into(),
            detailed_name: "void f()".into(),
            kind: SymbolKind::Function,
            definition_spelling: Some(Range::point(1, 6)),
            definition_extent: Some(Range::point(1, 1)),
            ..IndexFuncDef::default()
        }),
        callers: (0..call_sites)
            .map(|i| IndexFuncRef {
                id: None,
                range: Range::point(10 + i as i32, 3),
            })
            .collect(),
        ..IndexFunc::default()
    }];
    file.rebuild_id_cache();
    file
}

fn type_file(path: &str, uses: usize) -> IndexFile {
    let mut file = IndexFile::new(path);
    file.types = vec![IndexType {
        id: LocalTypeId::new(0),
        usr: TYPE_USR.to_string(),
        def: Some(IndexTypeDef {
            short_name: "Widget".into(),
            detailed_name: "struct Widget".into(),
            kind: SymbolKind::Struct,
            definition_spelling: Some(Range::point(1, 8)),
            ..IndexTypeDef::default()
        }),
        uses: (0..uses).map(|i| Range::point(20 + i as i32, 1)).collect(),
        ..IndexType::default()
    }];
    file.rebuild_id_cache();
    file
}

fn import(db: &mut QueryDatabase, previous: Option<&IndexFile>, current: &IndexFile) {
    let prev_map = previous.map(|file| IdMap::new(db, file));
    let cur_map = IdMap::new(db, current);
    let update = IndexUpdate::create_delta(
        prev_map.as_ref().map(|map| (map, previous.unwrap())),
        (&cur_map, current),
    );
    db.apply_index_update(update);
}

#[test]
fn first_import_is_pure_additions() {
    let mut db = QueryDatabase::default();
    let file = func_file("/p/a.cc", true, 2);
    import(&mut db, None, &file);

    let func = db.find_func(FUNC_USR).unwrap();
    assert!(func.def.is_some());
    assert_eq!(func.callers.len(), 2);
    assert!(db.find_file("/p/a.cc").unwrap().def.is_some());
}

#[test]
fn use_added_shows_up_after_reimport() {
    let mut db = QueryDatabase::default();
    let v1 = type_file("/p/foo.cc", 0);
    let v2 = type_file("/p/foo.cc", 1);

    import(&mut db, None, &v1);
    assert_eq!(db.uses_of_symbol(TYPE_USR).len(), 0);

    import(&mut db, Some(&v1), &v2);
    assert_eq!(db.uses_of_symbol(TYPE_USR).len(), 1);
}

#[test]
fn use_removed_disappears_after_reimport() {
    let mut db = QueryDatabase::default();
    let v1 = type_file("/p/foo.cc", 3);
    let v2 = type_file("/p/foo.cc", 1);

    import(&mut db, None, &v1);
    assert_eq!(db.uses_of_symbol(TYPE_USR).len(), 3);

    import(&mut db, Some(&v1), &v2);
    assert_eq!(db.uses_of_symbol(TYPE_USR).len(), 1);
}

#[test]
fn def_is_last_writer_wins_and_reverts_with_its_owner() {
    let mut db = QueryDatabase::default();
    let a_defines = func_file("/p/a.cc", true, 0);
    let b_defines = func_file("/p/b.cc", true, 0);

    import(&mut db, None, &a_defines);
    import(&mut db, None, &b_defines);

    let b_id = db.file_id("/p/b.cc").unwrap();
    let owner = db.find_func(FUNC_USR).unwrap().def.as_ref().unwrap().file;
    assert_eq!(owner, b_id, "later import owns the def");

    // a.cc drops its definition: the live def belongs to b.cc and stays.
    let a_plain = func_file("/p/a.cc", false, 0);
    import(&mut db, Some(&a_defines), &a_plain);
    let owner = db.find_func(FUNC_USR).unwrap().def.as_ref().unwrap().file;
    assert_eq!(owner, b_id);

    // b.cc drops it too: now nobody defines the symbol.
    let b_plain = func_file("/p/b.cc", false, 0);
    import(&mut db, Some(&b_defines), &b_plain);
    assert!(db.find_func(FUNC_USR).unwrap().def.is_none());

    // The entry itself is tombstoned, never destroyed.
    assert_eq!(db.funcs.len(), 1);
}

#[test]
fn symbol_vanishing_from_a_file_drops_its_contributions() {
    let mut db = QueryDatabase::default();
    let v1 = func_file("/p/a.cc", true, 2);
    import(&mut db, None, &v1);

    // The new version of the file no longer mentions the function at all.
    let mut v2 = IndexFile::new("/p/a.cc");
    v2.rebuild_id_cache();
    import(&mut db, Some(&v1), &v2);

    let func = db.find_func(FUNC_USR).unwrap();
    assert!(func.def.is_none());
    assert!(func.callers.is_empty());
}

#[test]
fn merge_then_apply_equals_sequential_apply() {
    let mut db = QueryDatabase::default();
    let v1 = type_file("/p/foo.cc", 2);
    let v2 = type_file("/p/foo.cc", 0);
    let other = func_file("/p/b.cc", true, 1);

    // Assign global ids once, then replay the updates against clones.
    let map_v1 = IdMap::new(&mut db, &v1);
    let map_v2 = IdMap::new(&mut db, &v2);
    let map_other = IdMap::new(&mut db, &other);

    let u1 = IndexUpdate::create_delta(None, (&map_v1, &v1));
    let u2 = IndexUpdate::create_delta(Some((&map_v1, &v1)), (&map_v2, &v2));
    let u3 = IndexUpdate::create_delta(None, (&map_other, &other));

    let mut sequential = db.clone();
    sequential.apply_index_update(u1.clone());
    sequential.apply_index_update(u2.clone());
    sequential.apply_index_update(u3.clone());

    let mut merged_db = db.clone();
    let mut merged = u1;
    merged.merge(u2);
    merged.merge(u3);
    merged_db.apply_index_update(merged);

    assert_eq!(sequential, merged_db);
    assert_eq!(merged_db.uses_of_symbol(TYPE_USR).len(), 0);
    assert_eq!(merged_db.uses_of_symbol(FUNC_USR).len(), 1);
}

#[test]
fn merged_remove_cancels_pending_add() {
    let mut db = QueryDatabase::default();
    let v1 = type_file("/p/foo.cc", 1);
    let v2 = type_file("/p/foo.cc", 0);

    let map_v1 = IdMap::new(&mut db, &v1);
    let map_v2 = IdMap::new(&mut db, &v2);

    let mut merged = IndexUpdate::create_delta(None, (&map_v1, &v1));
    merged.merge(IndexUpdate::create_delta(
        Some((&map_v1, &v1)),
        (&map_v2, &v2),
    ));

    // The use introduced by v1 was retracted by v2 before application.
    assert!(merged.types_uses.iter().all(|m| m.to_add.is_empty()));

    db.apply_index_update(merged);
    assert_eq!(db.uses_of_symbol(TYPE_USR).len(), 0);
}

#[test]
fn one_entry_per_usr_across_files() {
    let mut db = QueryDatabase::default();
    let a = func_file("/p/a.cc", true, 1);
    let b = func_file("/p/b.cc", false, 4);

    import(&mut db, None, &a);
    import(&mut db, None, &b);

    assert_eq!(db.funcs.len(), 1);
    assert_eq!(db.uses_of_symbol(FUNC_USR).len(), 5);
    assert_eq!(db.files.len(), 2);
}
