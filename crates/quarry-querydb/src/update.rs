use std::collections::{HashMap, HashSet};

use quarry_index::{IndexFile, IndexFunc, IndexFuncDef, IndexType, IndexTypeDef, IndexVar,
    IndexVarDef,
};

use crate::db::{
    QueryDatabase, QueryFileDef, QueryFileId, QueryFuncDef, QueryFuncId, QueryFuncRef,
    QueryLocation, QueryTypeDef, QueryTypeId, QueryVarDef, QueryVarId, SymbolId, SymbolOccurrence,
};
use crate::id_map::IdMap;

/// A symbol gained (or replaced) its definition.
#[derive(Clone, Debug, PartialEq)]
pub struct DefUpdate<Id, Def> {
    pub id: Id,
    pub def: Def,
}

/// A symbol's definition disappeared from the file that owned it. Applied
/// only while that file still owns the live def, so a later writer is
/// never reverted by a stale loser.
#[derive(Clone, Debug, PartialEq)]
pub struct DefRemoval<Id> {
    pub id: Id,
    pub prev_owner: QueryFileId,
}

/// Additions and removals for one symbol's back-reference set.
#[derive(Clone, Debug, PartialEq)]
pub struct MergeableUpdate<Id, V> {
    pub id: Id,
    pub to_add: Vec<V>,
    pub to_remove: Vec<V>,
}

/// The difference between two index files for the same path, expressed in
/// global ids, ready to apply to the database. With no previous file the
/// delta is pure additions; with no current file it would be pure
/// subtractions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndexUpdate {
    pub files_def_update: Vec<QueryFileDef>,

    pub types_removed: Vec<DefRemoval<QueryTypeId>>,
    pub types_def_update: Vec<DefUpdate<QueryTypeId, QueryTypeDef>>,
    pub types_derived: Vec<MergeableUpdate<QueryTypeId, QueryTypeId>>,
    pub types_instances: Vec<MergeableUpdate<QueryTypeId, QueryVarId>>,
    pub types_uses: Vec<MergeableUpdate<QueryTypeId, QueryLocation>>,

    pub funcs_removed: Vec<DefRemoval<QueryFuncId>>,
    pub funcs_def_update: Vec<DefUpdate<QueryFuncId, QueryFuncDef>>,
    pub funcs_declarations: Vec<MergeableUpdate<QueryFuncId, QueryLocation>>,
    pub funcs_derived: Vec<MergeableUpdate<QueryFuncId, QueryFuncId>>,
    pub funcs_callers: Vec<MergeableUpdate<QueryFuncId, QueryFuncRef>>,

    pub vars_removed: Vec<DefRemoval<QueryVarId>>,
    pub vars_def_update: Vec<DefUpdate<QueryVarId, QueryVarDef>>,
    pub vars_uses: Vec<MergeableUpdate<QueryVarId, QueryLocation>>,
}

impl IndexUpdate {
    pub fn create_delta(
        previous: Option<(&IdMap, &IndexFile)>,
        current: (&IdMap, &IndexFile),
    ) -> IndexUpdate {
        let (cur_map, cur_file) = current;
        let mut update = IndexUpdate {
            files_def_update: vec![build_file_def(cur_map, cur_file)],
            ..IndexUpdate::default()
        };

        match previous {
            None => {
                for t in &cur_file.types {
                    update.add_current_type(cur_map, t);
                }
                for f in &cur_file.funcs {
                    update.add_current_func(cur_map, f);
                }
                for v in &cur_file.vars {
                    update.add_current_var(cur_map, v);
                }
            }
            Some((prev_map, prev_file)) => {
                update.diff_types(prev_map, prev_file, cur_map, cur_file);
                update.diff_funcs(prev_map, prev_file, cur_map, cur_file);
                update.diff_vars(prev_map, prev_file, cur_map, cur_file);
            }
        }

        update
    }

    /// Fold `other` into `self` so applying the merged update is
    /// equivalent to applying `self` then `other`. A removal cancels a
    /// pending addition on the same key (same owner, for defs); the last
    /// def update per symbol wins, preserving import order.
    pub fn merge(&mut self, other: IndexUpdate) {
        for def in other.files_def_update {
            self.files_def_update.retain(|d| d.path != def.path);
            self.files_def_update.push(def);
        }

        merge_defs(
            &mut self.types_def_update,
            &mut self.types_removed,
            other.types_def_update,
            other.types_removed,
            |def| def.file,
        );
        merge_refs(&mut self.types_derived, other.types_derived);
        merge_refs(&mut self.types_instances, other.types_instances);
        merge_refs(&mut self.types_uses, other.types_uses);

        merge_defs(
            &mut self.funcs_def_update,
            &mut self.funcs_removed,
            other.funcs_def_update,
            other.funcs_removed,
            |def| def.file,
        );
        merge_refs(&mut self.funcs_declarations, other.funcs_declarations);
        merge_refs(&mut self.funcs_derived, other.funcs_derived);
        merge_refs(&mut self.funcs_callers, other.funcs_callers);

        merge_defs(
            &mut self.vars_def_update,
            &mut self.vars_removed,
            other.vars_def_update,
            other.vars_removed,
            |def| def.file,
        );
        merge_refs(&mut self.vars_uses, other.vars_uses);
    }

    /// Paths whose file def this update rewrites; the apply stage releases
    /// import slots and refreshes working files for exactly these.
    pub fn touched_files(&self) -> impl Iterator<Item = &str> {
        self.files_def_update.iter().map(|d| d.path.as_str())
    }

    pub(crate) fn apply_to(self, db: &mut QueryDatabase) {
        for def in self.files_def_update {
            let id = db.get_or_add_file(&def.path);
            db.files[id.index()].def = Some(def);
        }

        // Removals run before additions within every field; merge
        // canonicalization relies on this order.
        for removal in self.types_removed {
            let entry = &mut db.types[removal.id.index()];
            if entry.def.as_ref().map(|d| d.file) == Some(removal.prev_owner) {
                entry.def = None;
            }
        }
        for d in self.types_def_update {
            db.types[d.id.index()].def = Some(d.def);
        }
        for m in self.types_derived {
            apply_refs(&mut db.types[m.id.index()].derived, m.to_add, m.to_remove);
        }
        for m in self.types_instances {
            apply_refs(&mut db.types[m.id.index()].instances, m.to_add, m.to_remove);
        }
        for m in self.types_uses {
            apply_refs(&mut db.types[m.id.index()].uses, m.to_add, m.to_remove);
        }

        for removal in self.funcs_removed {
            let entry = &mut db.funcs[removal.id.index()];
            if entry.def.as_ref().map(|d| d.file) == Some(removal.prev_owner) {
                entry.def = None;
            }
        }
        for d in self.funcs_def_update {
            db.funcs[d.id.index()].def = Some(d.def);
        }
        for m in self.funcs_declarations {
            apply_refs(
                &mut db.funcs[m.id.index()].declarations,
                m.to_add,
                m.to_remove,
            );
        }
        for m in self.funcs_derived {
            apply_refs(&mut db.funcs[m.id.index()].derived, m.to_add, m.to_remove);
        }
        for m in self.funcs_callers {
            apply_refs(&mut db.funcs[m.id.index()].callers, m.to_add, m.to_remove);
        }

        for removal in self.vars_removed {
            let entry = &mut db.vars[removal.id.index()];
            if entry.def.as_ref().map(|d| d.file) == Some(removal.prev_owner) {
                entry.def = None;
            }
        }
        for d in self.vars_def_update {
            db.vars[d.id.index()].def = Some(d.def);
        }
        for m in self.vars_uses {
            apply_refs(&mut db.vars[m.id.index()].uses, m.to_add, m.to_remove);
        }
    }

    fn add_current_type(&mut self, map: &IdMap, t: &IndexType) {
        let id = map.type_id(t.id);
        if let Some(def) = &t.def {
            self.types_def_update.push(DefUpdate {
                id,
                def: map_type_def(map, def),
            });
        }
        push_adds(&mut self.types_derived, id, type_derived(map, t));
        push_adds(&mut self.types_instances, id, type_instances(map, t));
        push_adds(&mut self.types_uses, id, type_uses(map, t));
    }

    fn add_current_func(&mut self, map: &IdMap, f: &IndexFunc) {
        let id = map.func_id(f.id);
        if let Some(def) = &f.def {
            self.funcs_def_update.push(DefUpdate {
                id,
                def: map_func_def(map, def),
            });
        }
        push_adds(&mut self.funcs_declarations, id, func_declarations(map, f));
        push_adds(&mut self.funcs_derived, id, func_derived(map, f));
        push_adds(&mut self.funcs_callers, id, func_callers(map, f));
    }

    fn add_current_var(&mut self, map: &IdMap, v: &IndexVar) {
        let id = map.var_id(v.id);
        if let Some(def) = &v.def {
            self.vars_def_update.push(DefUpdate {
                id,
                def: map_var_def(map, def),
            });
        }
        push_adds(&mut self.vars_uses, id, var_uses(map, v));
    }

    fn diff_types(
        &mut self,
        prev_map: &IdMap,
        prev_file: &IndexFile,
        cur_map: &IdMap,
        cur_file: &IndexFile,
    ) {
        let prev_by_gid: HashMap<QueryTypeId, &IndexType> = prev_file
            .types
            .iter()
            .map(|t| (prev_map.type_id(t.id), t))
            .collect();
        let mut seen = HashSet::new();

        for t in &cur_file.types {
            let id = cur_map.type_id(t.id);
            seen.insert(id);
            let Some(&pt) = prev_by_gid.get(&id) else {
                self.add_current_type(cur_map, t);
                continue;
            };

            let prev_def = pt.def.as_ref().map(|d| map_type_def(prev_map, d));
            let cur_def = t.def.as_ref().map(|d| map_type_def(cur_map, d));
            match (prev_def, cur_def) {
                (prev_def, Some(cur_def)) if prev_def.as_ref() != Some(&cur_def) => {
                    self.types_def_update.push(DefUpdate { id, def: cur_def });
                }
                (Some(_), None) => self.types_removed.push(DefRemoval {
                    id,
                    prev_owner: prev_map.file(),
                }),
                _ => {}
            }

            push_diff(
                &mut self.types_derived,
                id,
                type_derived(prev_map, pt),
                type_derived(cur_map, t),
            );
            push_diff(
                &mut self.types_instances,
                id,
                type_instances(prev_map, pt),
                type_instances(cur_map, t),
            );
            push_diff(
                &mut self.types_uses,
                id,
                type_uses(prev_map, pt),
                type_uses(cur_map, t),
            );
        }

        for (id, pt) in prev_by_gid {
            if seen.contains(&id) {
                continue;
            }
            if pt.def.is_some() {
                self.types_removed.push(DefRemoval {
                    id,
                    prev_owner: prev_map.file(),
                });
            }
            push_removes(&mut self.types_derived, id, type_derived(prev_map, pt));
            push_removes(&mut self.types_instances, id, type_instances(prev_map, pt));
            push_removes(&mut self.types_uses, id, type_uses(prev_map, pt));
        }
    }

    fn diff_funcs(
        &mut self,
        prev_map: &IdMap,
        prev_file: &IndexFile,
        cur_map: &IdMap,
        cur_file: &IndexFile,
    ) {
        let prev_by_gid: HashMap<QueryFuncId, &IndexFunc> = prev_file
            .funcs
            .iter()
            .map(|f| (prev_map.func_id(f.id), f))
            .collect();
        let mut seen = HashSet::new();

        for f in &cur_file.funcs {
            let id = cur_map.func_id(f.id);
            seen.insert(id);
            let Some(&pf) = prev_by_gid.get(&id) else {
                self.add_current_func(cur_map, f);
                continue;
            };

            let prev_def = pf.def.as_ref().map(|d| map_func_def(prev_map, d));
            let cur_def = f.def.as_ref().map(|d| map_func_def(cur_map, d));
            match (prev_def, cur_def) {
                (prev_def, Some(cur_def)) if prev_def.as_ref() != Some(&cur_def) => {
                    self.funcs_def_update.push(DefUpdate { id, def: cur_def });
                }
                (Some(_), None) => self.funcs_removed.push(DefRemoval {
                    id,
                    prev_owner: prev_map.file(),
                }),
                _ => {}
            }

            push_diff(
                &mut self.funcs_declarations,
                id,
                func_declarations(prev_map, pf),
                func_declarations(cur_map, f),
            );
            push_diff(
                &mut self.funcs_derived,
                id,
                func_derived(prev_map, pf),
                func_derived(cur_map, f),
            );
            push_diff(
                &mut self.funcs_callers,
                id,
                func_callers(prev_map, pf),
                func_callers(cur_map, f),
            );
        }

        for (id, pf) in prev_by_gid {
            if seen.contains(&id) {
                continue;
            }
            if pf.def.is_some() {
                self.funcs_removed.push(DefRemoval {
                    id,
                    prev_owner: prev_map.file(),
                });
            }
            push_removes(
                &mut self.funcs_declarations,
                id,
                func_declarations(prev_map, pf),
            );
            push_removes(&mut self.funcs_derived, id, func_derived(prev_map, pf));
            push_removes(&mut self.funcs_callers, id, func_callers(prev_map, pf));
        }
    }

    fn diff_vars(
        &mut self,
        prev_map: &IdMap,
        prev_file: &IndexFile,
        cur_map: &IdMap,
        cur_file: &IndexFile,
    ) {
        let prev_by_gid: HashMap<QueryVarId, &IndexVar> = prev_file
            .vars
            .iter()
            .map(|v| (prev_map.var_id(v.id), v))
            .collect();
        let mut seen = HashSet::new();

        for v in &cur_file.vars {
            let id = cur_map.var_id(v.id);
            seen.insert(id);
            let Some(&pv) = prev_by_gid.get(&id) else {
                self.add_current_var(cur_map, v);
                continue;
            };

            let prev_def = pv.def.as_ref().map(|d| map_var_def(prev_map, d));
            let cur_def = v.def.as_ref().map(|d| map_var_def(cur_map, d));
            match (prev_def, cur_def) {
                (prev_def, Some(cur_def)) if prev_def.as_ref() != Some(&cur_def) => {
                    self.vars_def_update.push(DefUpdate { id, def: cur_def });
                }
                (Some(_), None) => self.vars_removed.push(DefRemoval {
                    id,
                    prev_owner: prev_map.file(),
                }),
                _ => {}
            }

            push_diff(
                &mut self.vars_uses,
                id,
                var_uses(prev_map, pv),
                var_uses(cur_map, v),
            );
        }

        for (id, pv) in prev_by_gid {
            if seen.contains(&id) {
                continue;
            }
            if pv.def.is_some() {
                self.vars_removed.push(DefRemoval {
                    id,
                    prev_owner: prev_map.file(),
                });
            }
            push_removes(&mut self.vars_uses, id, var_uses(prev_map, pv));
        }
    }
}

fn push_adds<Id, V>(out: &mut Vec<MergeableUpdate<Id, V>>, id: Id, to_add: Vec<V>) {
    if !to_add.is_empty() {
        out.push(MergeableUpdate {
            id,
            to_add,
            to_remove: Vec::new(),
        });
    }
}

fn push_removes<Id, V>(out: &mut Vec<MergeableUpdate<Id, V>>, id: Id, to_remove: Vec<V>) {
    if !to_remove.is_empty() {
        out.push(MergeableUpdate {
            id,
            to_add: Vec::new(),
            to_remove,
        });
    }
}

fn push_diff<Id, V: PartialEq + Clone>(
    out: &mut Vec<MergeableUpdate<Id, V>>,
    id: Id,
    prev: Vec<V>,
    cur: Vec<V>,
) {
    let to_add: Vec<V> = cur.iter().filter(|v| !prev.contains(v)).cloned().collect();
    let to_remove: Vec<V> = prev.iter().filter(|v| !cur.contains(v)).cloned().collect();
    if !to_add.is_empty() || !to_remove.is_empty() {
        out.push(MergeableUpdate { id, to_add, to_remove });
    }
}

fn merge_defs<Id: Copy + PartialEq, Def>(
    adds: &mut Vec<DefUpdate<Id, Def>>,
    removes: &mut Vec<DefRemoval<Id>>,
    other_adds: Vec<DefUpdate<Id, Def>>,
    other_removes: Vec<DefRemoval<Id>>,
    owner: impl Fn(&Def) -> QueryFileId,
) {
    for removal in other_removes {
        adds.retain(|a| !(a.id == removal.id && owner(&a.def) == removal.prev_owner));
        removes.push(removal);
    }
    for add in other_adds {
        adds.retain(|a| a.id != add.id);
        adds.push(add);
    }
}

fn merge_refs<Id: Copy + PartialEq, V: PartialEq>(
    ours: &mut Vec<MergeableUpdate<Id, V>>,
    theirs: Vec<MergeableUpdate<Id, V>>,
) {
    for theirs_entry in theirs {
        let Some(entry) = ours.iter_mut().find(|e| e.id == theirs_entry.id) else {
            ours.push(theirs_entry);
            continue;
        };
        for removed in theirs_entry.to_remove {
            entry.to_add.retain(|a| a != &removed);
            entry.to_remove.push(removed);
        }
        entry.to_add.extend(theirs_entry.to_add);
    }
}

fn apply_refs<V: PartialEq>(target: &mut Vec<V>, to_add: Vec<V>, to_remove: Vec<V>) {
    for removed in &to_remove {
        target.retain(|x| x != removed);
    }
    for added in to_add {
        if !target.contains(&added) {
            target.push(added);
        }
    }
}

fn map_type_def(map: &IdMap, def: &IndexTypeDef) -> QueryTypeDef {
    QueryTypeDef {
        file: map.file(),
        short_name: def.short_name.clone(),
        detailed_name: def.detailed_name.clone(),
        kind: def.kind,
        hover: def.hover.clone(),
        comments: def.comments.clone(),
        definition_spelling: def.definition_spelling.map(|r| map.location(r)),
        definition_extent: def.definition_extent.map(|r| map.location(r)),
        alias_of: def.alias_of.map(|id| map.type_id(id)),
        parents: def.parents.iter().map(|&id| map.type_id(id)).collect(),
        types: def.types.iter().map(|&id| map.type_id(id)).collect(),
        funcs: def.funcs.iter().map(|&id| map.func_id(id)).collect(),
        vars: def.vars.iter().map(|&id| map.var_id(id)).collect(),
    }
}

fn map_func_def(map: &IdMap, def: &IndexFuncDef) -> QueryFuncDef {
    QueryFuncDef {
        file: map.file(),
        short_name: def.short_name.clone(),
        detailed_name: def.detailed_name.clone(),
        kind: def.kind,
        hover: def.hover.clone(),
        comments: def.comments.clone(),
        definition_spelling: def.definition_spelling.map(|r| map.location(r)),
        definition_extent: def.definition_extent.map(|r| map.location(r)),
        declaring_type: def.declaring_type.map(|id| map.type_id(id)),
        base: def.base.map(|id| map.func_id(id)),
        callees: def.callees.iter().map(|r| map.func_ref(r)).collect(),
    }
}

fn map_var_def(map: &IdMap, def: &IndexVarDef) -> QueryVarDef {
    QueryVarDef {
        file: map.file(),
        short_name: def.short_name.clone(),
        detailed_name: def.detailed_name.clone(),
        kind: def.kind,
        hover: def.hover.clone(),
        comments: def.comments.clone(),
        declaration: def.declaration.map(|r| map.location(r)),
        definition_spelling: def.definition_spelling.map(|r| map.location(r)),
        definition_extent: def.definition_extent.map(|r| map.location(r)),
        variable_type: def.variable_type.map(|id| map.type_id(id)),
        declaring_type: def.declaring_type.map(|id| map.type_id(id)),
    }
}

fn type_derived(map: &IdMap, t: &IndexType) -> Vec<QueryTypeId> {
    t.derived.iter().map(|&id| map.type_id(id)).collect()
}

fn type_instances(map: &IdMap, t: &IndexType) -> Vec<QueryVarId> {
    t.instances.iter().map(|&id| map.var_id(id)).collect()
}

fn type_uses(map: &IdMap, t: &IndexType) -> Vec<QueryLocation> {
    t.uses.iter().map(|&r| map.location(r)).collect()
}

fn func_declarations(map: &IdMap, f: &IndexFunc) -> Vec<QueryLocation> {
    f.declarations.iter().map(|&r| map.location(r)).collect()
}

fn func_derived(map: &IdMap, f: &IndexFunc) -> Vec<QueryFuncId> {
    f.derived.iter().map(|&id| map.func_id(id)).collect()
}

fn func_callers(map: &IdMap, f: &IndexFunc) -> Vec<QueryFuncRef> {
    f.callers.iter().map(|r| map.func_ref(r)).collect()
}

fn var_uses(map: &IdMap, v: &IndexVar) -> Vec<QueryLocation> {
    v.uses.iter().map(|&r| map.location(r)).collect()
}

fn build_file_def(map: &IdMap, file: &IndexFile) -> QueryFileDef {
    let mut all_symbols = Vec::new();

    for t in &file.types {
        let symbol = SymbolId::Type(map.type_id(t.id));
        if let Some(range) = t.def.as_ref().and_then(|d| d.definition_spelling) {
            all_symbols.push(SymbolOccurrence {
                symbol,
                range: range.canonicalized(),
            });
        }
        for &range in &t.uses {
            all_symbols.push(SymbolOccurrence {
                symbol,
                range: range.canonicalized(),
            });
        }
    }
    for f in &file.funcs {
        let symbol = SymbolId::Func(map.func_id(f.id));
        if let Some(range) = f.def.as_ref().and_then(|d| d.definition_spelling) {
            all_symbols.push(SymbolOccurrence {
                symbol,
                range: range.canonicalized(),
            });
        }
        for &range in &f.declarations {
            all_symbols.push(SymbolOccurrence {
                symbol,
                range: range.canonicalized(),
            });
        }
        for caller in &f.callers {
            all_symbols.push(SymbolOccurrence {
                symbol,
                range: caller.range.canonicalized(),
            });
        }
    }
    for v in &file.vars {
        let symbol = SymbolId::Var(map.var_id(v.id));
        if let Some(range) = v.def.as_ref().and_then(|d| d.definition_spelling) {
            all_symbols.push(SymbolOccurrence {
                symbol,
                range: range.canonicalized(),
            });
        }
        for &range in &v.uses {
            all_symbols.push(SymbolOccurrence {
                symbol,
                range: range.canonicalized(),
            });
        }
    }

    all_symbols.sort_by_key(|occurrence| occurrence.range);

    QueryFileDef {
        path: file.path.clone(),
        dependencies: file.dependencies.clone(),
        inactive_regions: file
            .skipped_by_preprocessor
            .iter()
            .map(|r| r.canonicalized())
            .collect(),
        all_symbols,
    }
}
