// Copyright (C) 2026 the etamoo authors. This program is free software: you
// can redistribute it and/or modify it under the terms of the GNU General
// Public License as published by the Free Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! One task's transactional view of the object store, and the permission
//! checks MOO applies to every operation on it.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use tracing::debug;
use uuid::Uuid;

use crate::compiler::Program;
use crate::db::object::{ObjectRecord, PropValue};
use crate::db::{VersionedRecord, WorldStateDb};
use crate::model::props::{PropAttrs, PropDef, PropFlag, PropPerms};
use crate::model::r#match::{PrepSpec, VerbArgsSpec};
use crate::model::{
    CommitResult, ObjFlag, Perms, VerbAttrs, VerbDef, VerbFlag, WorldState, WorldStateError,
};
use crate::util::BitEnum;
use crate::var::{Objid, Symbol, Var, NOTHING};

/// The buffered working state of one transaction.
pub struct DbTransaction {
    db: WorldStateDb,
    /// Local copies of every object touched; `None` = deleted here.
    local: RefCell<HashMap<i64, Option<ObjectRecord>>>,
    /// Version observed at first touch; 0 = did not exist then.
    read_versions: RefCell<HashMap<i64, u64>>,
    dirty: RefCell<HashSet<i64>>,
    max_object: Cell<i64>,
    max_object_dirty: Cell<bool>,
}

impl DbTransaction {
    pub fn new(db: WorldStateDb) -> Self {
        let max_object = db.store.lock().unwrap().max_object;
        Self {
            db,
            local: RefCell::new(HashMap::new()),
            read_versions: RefCell::new(HashMap::new()),
            dirty: RefCell::new(HashSet::new()),
            max_object: Cell::new(max_object),
            max_object_dirty: Cell::new(false),
        }
    }

    /// Pull an object into the working set on first touch.
    fn ensure_cached(&self, obj: Objid) {
        if self.local.borrow().contains_key(&obj.0) {
            return;
        }
        let store = self.db.store.lock().unwrap();
        let (version, record) = match store.objects.get(&obj.0) {
            Some(vr) => (vr.version, vr.record.clone()),
            None => (0, None),
        };
        self.read_versions.borrow_mut().insert(obj.0, version);
        self.local.borrow_mut().insert(obj.0, record);
    }

    fn with_obj<R>(
        &self,
        obj: Objid,
        f: impl FnOnce(&ObjectRecord) -> R,
    ) -> Result<R, WorldStateError> {
        if !obj.is_positive() {
            return Err(WorldStateError::ObjectNotFound(obj));
        }
        self.ensure_cached(obj);
        let local = self.local.borrow();
        match local.get(&obj.0).and_then(|r| r.as_ref()) {
            Some(record) => Ok(f(record)),
            None => Err(WorldStateError::ObjectNotFound(obj)),
        }
    }

    fn with_obj_mut<R>(
        &self,
        obj: Objid,
        f: impl FnOnce(&mut ObjectRecord) -> R,
    ) -> Result<R, WorldStateError> {
        if !obj.is_positive() {
            return Err(WorldStateError::ObjectNotFound(obj));
        }
        self.ensure_cached(obj);
        let mut local = self.local.borrow_mut();
        match local.get_mut(&obj.0).and_then(|r| r.as_mut()) {
            Some(record) => {
                self.dirty.borrow_mut().insert(obj.0);
                Ok(f(record))
            }
            None => Err(WorldStateError::ObjectNotFound(obj)),
        }
    }

    fn perms(&self, who: Objid) -> Perms {
        let flags = self.flags_of(who).unwrap_or_default();
        Perms::new(who, flags)
    }

    /// The parent chain starting at (and including) `obj`.
    fn ancestry(&self, obj: Objid) -> Result<Vec<Objid>, WorldStateError> {
        let mut chain = vec![];
        let mut cursor = obj;
        while cursor.is_positive() {
            chain.push(cursor);
            cursor = self.with_obj(cursor, |o| o.parent)?;
            if chain.len() > 4096 {
                // A cycle here is a broken invariant, not user error.
                panic!("parent chain cycle at {}", obj);
            }
        }
        Ok(chain)
    }

    /// All descendants of `obj`, not including `obj`.
    fn descendants(&self, obj: Objid) -> Result<Vec<Objid>, WorldStateError> {
        let mut result = vec![];
        let mut queue = self.with_obj(obj, |o| o.children.clone())?;
        while let Some(c) = queue.pop() {
            result.push(c);
            queue.extend(self.with_obj(c, |o| o.children.clone())?);
        }
        Ok(result)
    }

    /// Read permission on a whole object: wizard, owner, or the `r` flag.
    fn check_obj_readable(&self, perms: Objid, obj: Objid) -> Result<(), WorldStateError> {
        let p = self.perms(perms);
        let (owner, flags) = self.with_obj(obj, |o| (o.owner, o.flags))?;
        if p.is_wizard() || p.who == owner || flags.contains(ObjFlag::Read) {
            Ok(())
        } else {
            Err(WorldStateError::ObjectPermissionDenied)
        }
    }

    fn check_obj_writable(&self, perms: Objid, obj: Objid) -> Result<(), WorldStateError> {
        let p = self.perms(perms);
        let (owner, flags) = self.with_obj(obj, |o| (o.owner, o.flags))?;
        if p.is_wizard() || p.who == owner || flags.contains(ObjFlag::Write) {
            Ok(())
        } else {
            Err(WorldStateError::ObjectPermissionDenied)
        }
    }

    /// Find the nearest property slot and the defining ancestor for a
    /// property, walking the chain from `obj` upward.
    fn resolve_property(
        &self,
        obj: Objid,
        pname: &Symbol,
    ) -> Result<(Objid, PropDef, PropValue, Option<(Objid, PropValue)>), WorldStateError> {
        let mut nearest: Option<(Objid, PropValue)> = None;
        for o in self.ancestry(obj)? {
            let (entry, def) = self.with_obj(o, |rec| {
                (
                    rec.propvalues.get(pname).cloned(),
                    rec.propdefs.iter().find(|pd| &pd.name == pname).cloned(),
                )
            })?;
            if let Some(entry) = entry {
                if nearest.is_none() {
                    nearest = Some((o, entry));
                }
            }
            if let Some(def) = def {
                let definer_entry = self
                    .with_obj(o, |rec| rec.propvalues.get(pname).cloned())?
                    .expect("definer without property slot");
                return Ok((o, def, definer_entry, nearest));
            }
        }
        Err(WorldStateError::PropertyNotFound(obj, pname.to_string()))
    }

    fn check_prop_readable(&self, perms: Objid, prop: &PropPerms) -> Result<(), WorldStateError> {
        let p = self.perms(perms);
        if p.is_wizard() || p.who == prop.owner || prop.flags.contains(PropFlag::Read) {
            Ok(())
        } else {
            Err(WorldStateError::PropertyPermissionDenied)
        }
    }

    fn check_prop_writable(&self, perms: Objid, prop: &PropPerms) -> Result<(), WorldStateError> {
        let p = self.perms(perms);
        if p.is_wizard() || p.who == prop.owner || prop.flags.contains(PropFlag::Write) {
            Ok(())
        } else {
            Err(WorldStateError::PropertyPermissionDenied)
        }
    }

    fn check_verb_readable(&self, perms: Objid, vd: &VerbDef) -> Result<(), WorldStateError> {
        let p = self.perms(perms);
        if p.is_wizard() || p.who == vd.owner || vd.flags.contains(VerbFlag::Read) {
            Ok(())
        } else {
            Err(WorldStateError::VerbPermissionDenied)
        }
    }

    fn check_verb_writable(&self, perms: Objid, vd: &VerbDef) -> Result<(), WorldStateError> {
        let p = self.perms(perms);
        if p.is_wizard() || p.who == vd.owner || vd.flags.contains(VerbFlag::Write) {
            Ok(())
        } else {
            Err(WorldStateError::VerbPermissionDenied)
        }
    }

    /// Builtin object attribute properties, intercepted before the ordinary
    /// property tables.
    fn builtin_property(&self, obj: Objid, pname: &str) -> Option<Result<Var, WorldStateError>> {
        use crate::var::{v_bool, v_list, v_obj, v_string};
        let read = |f: &dyn Fn(&ObjectRecord) -> Var| self.with_obj(obj, f);
        match pname.to_lowercase().as_str() {
            "name" => Some(read(&|o| v_string(o.name.clone()))),
            "owner" => Some(read(&|o| v_obj(o.owner))),
            "location" => Some(read(&|o| v_obj(o.location))),
            "contents" => Some(read(&|o| {
                v_list(&o.contents.iter().map(|c| v_obj(*c)).collect::<Vec<_>>())
            })),
            "programmer" => Some(read(&|o| v_bool(o.flags.contains(ObjFlag::Programmer)))),
            "wizard" => Some(read(&|o| v_bool(o.flags.contains(ObjFlag::Wizard)))),
            "player" => Some(read(&|o| v_bool(o.flags.contains(ObjFlag::User)))),
            "r" => Some(read(&|o| v_bool(o.flags.contains(ObjFlag::Read)))),
            "w" => Some(read(&|o| v_bool(o.flags.contains(ObjFlag::Write)))),
            "f" => Some(read(&|o| v_bool(o.flags.contains(ObjFlag::Fertile)))),
            _ => None,
        }
    }

    fn update_builtin_property(
        &self,
        perms: Objid,
        obj: Objid,
        pname: &str,
        value: &Var,
    ) -> Option<Result<(), WorldStateError>> {
        let p = self.perms(perms);
        let set_flag = |flag: ObjFlag, on: bool| {
            self.with_obj_mut(obj, |o| o.flags.set_to(flag, on))
        };
        match pname.to_lowercase().as_str() {
            "name" => Some((|| {
                let Var::Str(name) = value else {
                    return Err(WorldStateError::InvalidArgument(
                        "name must be a string".into(),
                    ));
                };
                let owner = self.with_obj(obj, |o| o.owner)?;
                p.check_owns(owner)?;
                self.with_obj_mut(obj, |o| o.name = name.as_str().to_string())
            })()),
            "owner" => Some((|| {
                let Var::Obj(new_owner) = value else {
                    return Err(WorldStateError::InvalidArgument(
                        "owner must be an object".into(),
                    ));
                };
                p.check_wizard()?;
                self.with_obj_mut(obj, |o| o.owner = *new_owner)
            })()),
            "programmer" => Some((|| {
                p.check_wizard()?;
                set_flag(ObjFlag::Programmer, value.is_true())
            })()),
            "wizard" => Some((|| {
                p.check_wizard()?;
                set_flag(ObjFlag::Wizard, value.is_true())
            })()),
            "r" | "w" | "f" => {
                let flag = match pname.to_lowercase().as_str() {
                    "r" => ObjFlag::Read,
                    "w" => ObjFlag::Write,
                    _ => ObjFlag::Fertile,
                };
                Some((|| {
                    let owner = self.with_obj(obj, |o| o.owner)?;
                    p.check_owns(owner)?;
                    set_flag(flag, value.is_true())
                })())
            }
            // Settable only through move()/set_player_flag().
            "location" | "contents" | "player" => {
                Some(Err(WorldStateError::ObjectPermissionDenied))
            }
            _ => None,
        }
    }

    /// Property names defined strictly above `obj` in its chain.
    fn inherited_prop_names(&self, obj: Objid) -> Result<Vec<Symbol>, WorldStateError> {
        let mut names = vec![];
        for o in self.ancestry(obj)?.into_iter().skip(1) {
            names.extend(self.with_obj(o, |rec| {
                rec.propdefs.iter().map(|pd| pd.name.clone()).collect::<Vec<_>>()
            })?);
        }
        Ok(names)
    }
}

impl WorldState for DbTransaction {
    fn valid(&self, obj: Objid) -> Result<bool, WorldStateError> {
        if !obj.is_positive() {
            return Ok(false);
        }
        self.ensure_cached(obj);
        Ok(self
            .local
            .borrow()
            .get(&obj.0)
            .is_some_and(|r| r.is_some()))
    }

    fn players(&self) -> Result<Vec<Objid>, WorldStateError> {
        // The players list is a derived set; reading it does not
        // participate in conflict detection.
        let store = self.db.store.lock().unwrap();
        let mut players: Vec<Objid> = store
            .objects
            .iter()
            .filter_map(|(id, vr)| {
                vr.record
                    .as_ref()
                    .filter(|r| r.flags.contains(ObjFlag::User))
                    .map(|_| Objid(*id))
            })
            .collect();
        players.sort();
        Ok(players)
    }

    fn owner_of(&self, obj: Objid) -> Result<Objid, WorldStateError> {
        self.with_obj(obj, |o| o.owner)
    }

    fn flags_of(&self, obj: Objid) -> Result<BitEnum<ObjFlag>, WorldStateError> {
        self.with_obj(obj, |o| o.flags)
    }

    fn set_flags_of(
        &mut self,
        perms: Objid,
        obj: Objid,
        flags: BitEnum<ObjFlag>,
    ) -> Result<(), WorldStateError> {
        let owner = self.with_obj(obj, |o| o.owner)?;
        self.perms(perms).check_owns(owner)?;
        self.with_obj_mut(obj, |o| o.flags = flags)
    }

    fn controls(&self, who: Objid, what: Objid) -> Result<bool, WorldStateError> {
        let p = self.perms(who);
        if p.is_wizard() {
            return Ok(true);
        }
        Ok(self.with_obj(what, |o| o.owner)? == who)
    }

    fn names_of(&self, _perms: Objid, obj: Objid) -> Result<String, WorldStateError> {
        self.with_obj(obj, |o| o.name.clone())
    }

    fn set_name_of(
        &mut self,
        perms: Objid,
        obj: Objid,
        name: String,
    ) -> Result<(), WorldStateError> {
        let owner = self.with_obj(obj, |o| o.owner)?;
        self.perms(perms).check_owns(owner)?;
        self.with_obj_mut(obj, |o| o.name = name)
    }

    fn set_owner_of(
        &mut self,
        perms: Objid,
        obj: Objid,
        owner: Objid,
    ) -> Result<(), WorldStateError> {
        self.perms(perms).check_wizard()?;
        self.with_obj_mut(obj, |o| o.owner = owner)
    }

    fn location_of(&self, _perms: Objid, obj: Objid) -> Result<Objid, WorldStateError> {
        self.with_obj(obj, |o| o.location)
    }

    fn contents_of(&self, _perms: Objid, obj: Objid) -> Result<Vec<Objid>, WorldStateError> {
        self.with_obj(obj, |o| o.contents.clone())
    }

    fn parent_of(&self, _perms: Objid, obj: Objid) -> Result<Objid, WorldStateError> {
        self.with_obj(obj, |o| o.parent)
    }

    fn children_of(&self, _perms: Objid, obj: Objid) -> Result<Vec<Objid>, WorldStateError> {
        self.with_obj(obj, |o| o.children.clone())
    }

    fn create_object(
        &mut self,
        perms: Objid,
        parent: Objid,
        owner: Objid,
    ) -> Result<Objid, WorldStateError> {
        let p = self.perms(perms);
        if parent.is_positive() {
            let (p_owner, p_flags) = self.with_obj(parent, |o| (o.owner, o.flags))?;
            if !p.is_wizard() && p.who != p_owner && !p_flags.contains(ObjFlag::Fertile) {
                return Err(WorldStateError::ObjectPermissionDenied);
            }
        } else if parent != NOTHING {
            return Err(WorldStateError::ObjectNotFound(parent));
        }
        if owner != NOTHING && owner != p.who {
            p.check_wizard()?;
        }

        let id = Objid(self.max_object.get() + 1);
        self.max_object.set(id.0);
        self.max_object_dirty.set(true);
        let owner = if owner == NOTHING { id } else { owner };

        // Register the fresh object in the working set.
        self.read_versions.borrow_mut().entry(id.0).or_insert(0);
        self.local.borrow_mut().insert(
            id.0,
            Some(ObjectRecord::new(parent, owner, "", BitEnum::new())),
        );
        self.dirty.borrow_mut().insert(id.0);

        if parent.is_positive() {
            self.with_obj_mut(parent, |o| o.children.push(id))?;
        }
        Ok(id)
    }

    fn recycle_object(&mut self, perms: Objid, obj: Objid) -> Result<(), WorldStateError> {
        let owner = self.with_obj(obj, |o| o.owner)?;
        self.perms(perms).check_owns(owner)?;

        let (parent, children, location, contents, prop_names) = self.with_obj(obj, |o| {
            (
                o.parent,
                o.children.clone(),
                o.location,
                o.contents.clone(),
                o.propdefs.iter().map(|pd| pd.name.clone()).collect::<Vec<_>>(),
            )
        })?;

        // Contents are dumped into the void; the caller's exitfunc protocol
        // has already run.
        for c in contents {
            self.with_obj_mut(c, |o| o.location = NOTHING)?;
        }
        if location.is_positive() {
            self.with_obj_mut(location, |o| o.contents.retain(|c| *c != obj))?;
        }

        // Children are reparented upward, losing the recycled object's
        // property contributions.
        for child in children {
            for d in std::iter::once(child).chain(self.descendants(child)?) {
                self.with_obj_mut(d, |o| {
                    for name in &prop_names {
                        o.propvalues.remove(name);
                    }
                })?;
            }
            self.with_obj_mut(child, |o| o.parent = parent)?;
            if parent.is_positive() {
                self.with_obj_mut(parent, |o| o.children.push(child))?;
            }
        }
        if parent.is_positive() {
            self.with_obj_mut(parent, |o| o.children.retain(|c| *c != obj))?;
        }

        self.local.borrow_mut().insert(obj.0, None);
        self.dirty.borrow_mut().insert(obj.0);
        Ok(())
    }

    fn move_object(
        &mut self,
        _perms: Objid,
        obj: Objid,
        new_loc: Objid,
    ) -> Result<(), WorldStateError> {
        // Recursion check: an object cannot contain itself, transitively.
        let mut cursor = new_loc;
        while cursor.is_positive() {
            if cursor == obj {
                return Err(WorldStateError::RecursiveMove(obj, new_loc));
            }
            cursor = self.with_obj(cursor, |o| o.location)?;
        }
        let old_loc = self.with_obj(obj, |o| o.location)?;
        if old_loc == new_loc {
            return Ok(());
        }
        if old_loc.is_positive() {
            self.with_obj_mut(old_loc, |o| o.contents.retain(|c| *c != obj))?;
        }
        self.with_obj_mut(obj, |o| o.location = new_loc)?;
        if new_loc.is_positive() {
            self.with_obj_mut(new_loc, |o| o.contents.push(obj))?;
        }
        Ok(())
    }

    fn change_parent(
        &mut self,
        perms: Objid,
        obj: Objid,
        new_parent: Objid,
    ) -> Result<(), WorldStateError> {
        let p = self.perms(perms);
        let owner = self.with_obj(obj, |o| o.owner)?;
        p.check_owns(owner)?;
        if new_parent.is_positive() {
            let (np_owner, np_flags) = self.with_obj(new_parent, |o| (o.owner, o.flags))?;
            if !p.is_wizard() && p.who != np_owner && !np_flags.contains(ObjFlag::Fertile) {
                return Err(WorldStateError::ObjectPermissionDenied);
            }
        }

        // No cycles: the new parent must not be obj or a descendant of it.
        if new_parent == obj {
            return Err(WorldStateError::RecursiveMove(obj, new_parent));
        }
        let mut cursor = new_parent;
        while cursor.is_positive() {
            if cursor == obj {
                return Err(WorldStateError::RecursiveMove(obj, new_parent));
            }
            cursor = self.with_obj(cursor, |o| o.parent)?;
        }

        // Property definitions of obj and its descendants may not collide
        // with definitions in the new ancestry.
        let mut new_chain_props: HashSet<Symbol> = HashSet::new();
        if new_parent.is_positive() {
            for o in self.ancestry(new_parent)? {
                for n in self.with_obj(o, |rec| {
                    rec.propdefs.iter().map(|pd| pd.name.clone()).collect::<Vec<_>>()
                })? {
                    new_chain_props.insert(n);
                }
            }
        }
        for o in std::iter::once(obj).chain(self.descendants(obj)?) {
            for n in self.with_obj(o, |rec| {
                rec.propdefs.iter().map(|pd| pd.name.clone()).collect::<Vec<_>>()
            })? {
                if new_chain_props.contains(&n) {
                    return Err(WorldStateError::DuplicatePropertyDefinition(
                        o,
                        n.to_string(),
                    ));
                }
            }
        }

        // Values for properties inherited from the old ancestry are lost.
        let old_props = self.inherited_prop_names(obj)?;
        for o in std::iter::once(obj).chain(self.descendants(obj)?) {
            self.with_obj_mut(o, |rec| {
                for name in &old_props {
                    rec.propvalues.remove(name);
                }
            })?;
        }

        let old_parent = self.with_obj(obj, |o| o.parent)?;
        if old_parent.is_positive() {
            self.with_obj_mut(old_parent, |o| o.children.retain(|c| *c != obj))?;
        }
        self.with_obj_mut(obj, |o| o.parent = new_parent)?;
        if new_parent.is_positive() {
            self.with_obj_mut(new_parent, |o| o.children.push(obj))?;
        }
        Ok(())
    }

    fn max_object(&self) -> Result<Objid, WorldStateError> {
        Ok(Objid(self.max_object.get()))
    }

    fn reset_max_object(&mut self, perms: Objid) -> Result<(), WorldStateError> {
        self.perms(perms).check_wizard()?;
        let store = self.db.store.lock().unwrap();
        let mut highest = -1;
        for (id, vr) in store.objects.iter() {
            let live_in_local = match self.local.borrow().get(id) {
                Some(r) => r.is_some(),
                None => vr.record.is_some(),
            };
            if live_in_local && *id > highest {
                highest = *id;
            }
        }
        for (id, r) in self.local.borrow().iter() {
            if r.is_some() && *id > highest {
                highest = *id;
            }
        }
        self.max_object.set(highest);
        self.max_object_dirty.set(true);
        Ok(())
    }

    fn renumber_object(&mut self, perms: Objid, obj: Objid) -> Result<Objid, WorldStateError> {
        self.perms(perms).check_wizard()?;
        let record = self
            .with_obj(obj, |o| o.clone())?;

        // Find the lowest free number below obj.
        let mut candidate = None;
        for n in 0..obj.0 {
            if !self.valid(Objid(n))? {
                candidate = Some(Objid(n));
                break;
            }
        }
        let Some(new_id) = candidate else {
            return Ok(obj);
        };

        // Rewire every relationship link that names the old number.
        if record.parent.is_positive() {
            self.with_obj_mut(record.parent, |o| {
                for c in o.children.iter_mut() {
                    if *c == obj {
                        *c = new_id;
                    }
                }
            })?;
        }
        for c in &record.children {
            self.with_obj_mut(*c, |o| o.parent = new_id)?;
        }
        if record.location.is_positive() {
            self.with_obj_mut(record.location, |o| {
                for c in o.contents.iter_mut() {
                    if *c == obj {
                        *c = new_id;
                    }
                }
            })?;
        }
        for c in &record.contents {
            self.with_obj_mut(*c, |o| o.location = new_id)?;
        }

        let mut record = record;
        for vd in record.verbdefs.iter_mut() {
            vd.location = new_id;
        }
        for pd in record.propdefs.iter_mut() {
            pd.definer = new_id;
        }

        self.read_versions.borrow_mut().entry(new_id.0).or_insert(0);
        self.local.borrow_mut().insert(new_id.0, Some(record));
        self.local.borrow_mut().insert(obj.0, None);
        self.dirty.borrow_mut().insert(new_id.0);
        self.dirty.borrow_mut().insert(obj.0);

        // Ownership references anywhere in the store follow the renumber:
        // object owners, verb owners, and per-object property owners.
        let mut ids: Vec<i64> = {
            let store = self.db.store.lock().unwrap();
            store.objects.keys().copied().collect()
        };
        {
            let local = self.local.borrow();
            for id in local.keys() {
                if !ids.contains(id) {
                    ids.push(*id);
                }
            }
        }
        ids.sort_unstable();
        for id in ids {
            let id = Objid(id);
            if !self.valid(id)? {
                continue;
            }
            let references_old = self.with_obj(id, |o| {
                o.owner == obj
                    || o.verbdefs.iter().any(|vd| vd.owner == obj)
                    || o.propvalues.values().any(|pv| pv.perms.owner == obj)
            })?;
            if !references_old {
                continue;
            }
            self.with_obj_mut(id, |o| {
                if o.owner == obj {
                    o.owner = new_id;
                }
                for vd in o.verbdefs.iter_mut() {
                    if vd.owner == obj {
                        vd.owner = new_id;
                    }
                }
                for pv in o.propvalues.values_mut() {
                    if pv.perms.owner == obj {
                        pv.perms.owner = new_id;
                    }
                }
            })?;
        }
        Ok(new_id)
    }

    fn properties(&self, perms: Objid, obj: Objid) -> Result<Vec<PropDef>, WorldStateError> {
        self.check_obj_readable(perms, obj)?;
        self.with_obj(obj, |o| o.propdefs.clone())
    }

    fn retrieve_property(
        &self,
        perms: Objid,
        obj: Objid,
        pname: Symbol,
    ) -> Result<Var, WorldStateError> {
        if !self.valid(obj)? {
            return Err(WorldStateError::ObjectNotFound(obj));
        }
        if let Some(result) = self.builtin_property(obj, pname.as_str()) {
            return result;
        }
        let (_definer, _def, definer_entry, nearest) = self.resolve_property(obj, &pname)?;
        let (perms_entry, value) = match nearest {
            Some((_, entry)) if entry.value.is_some() => {
                (entry.perms.clone(), entry.value.unwrap())
            }
            _ => (
                definer_entry.perms.clone(),
                definer_entry.value.unwrap_or(Var::None),
            ),
        };
        self.check_prop_readable(perms, &perms_entry)?;
        Ok(value)
    }

    fn get_property_info(
        &self,
        perms: Objid,
        obj: Objid,
        pname: Symbol,
    ) -> Result<(PropDef, PropPerms), WorldStateError> {
        if self.builtin_property(obj, pname.as_str()).is_some() {
            // Built-in attributes have no property records to describe.
            return Err(WorldStateError::PropertyNotFound(obj, pname.to_string()));
        }
        let (_definer, def, definer_entry, nearest) = self.resolve_property(obj, &pname)?;
        let prop_perms = match nearest {
            Some((_, entry)) => entry.perms,
            None => definer_entry.perms,
        };
        self.check_prop_readable(perms, &prop_perms)?;
        Ok((def, prop_perms))
    }

    fn set_property_info(
        &mut self,
        perms: Objid,
        obj: Objid,
        pname: Symbol,
        attrs: PropAttrs,
    ) -> Result<(), WorldStateError> {
        let (definer, def, definer_entry, nearest) = self.resolve_property(obj, &pname)?;
        let current = match &nearest {
            Some((_, entry)) => entry.perms.clone(),
            None => definer_entry.perms.clone(),
        };
        let p = self.perms(perms);
        p.check_owns(current.owner)?;
        if let Some(new_owner) = attrs.owner {
            if new_owner != p.who {
                p.check_wizard()?;
            }
        }

        // Renaming operates on the definition, and so ripples across the
        // whole subtree below the definer.
        if let Some(new_name) = &attrs.new_name {
            if definer != obj {
                return Err(WorldStateError::InvalidArgument(
                    "rename must be done on the definer".to_string(),
                ));
            }
            for o in std::iter::once(definer).chain(self.descendants(definer)?) {
                self.with_obj_mut(o, |rec| {
                    if let Some(pv) = rec.propvalues.remove(&pname) {
                        rec.propvalues.insert(new_name.clone(), pv);
                    }
                    for pd in rec.propdefs.iter_mut() {
                        if pd.name == pname {
                            pd.name = new_name.clone();
                        }
                    }
                })?;
            }
        }
        let name_now = attrs.new_name.clone().unwrap_or(def.name);

        // Flag/owner updates land on the nearest slot for this object.
        let slot_holder = match nearest {
            Some((holder, _)) => holder,
            None => definer,
        };
        self.with_obj_mut(slot_holder, |rec| {
            if let Some(pv) = rec.propvalues.get_mut(&name_now) {
                if let Some(owner) = attrs.owner {
                    pv.perms.owner = owner;
                }
                if let Some(flags) = attrs.flags {
                    pv.perms.flags = flags;
                }
            }
        })?;
        Ok(())
    }

    fn update_property(
        &mut self,
        perms: Objid,
        obj: Objid,
        pname: Symbol,
        value: &Var,
    ) -> Result<(), WorldStateError> {
        if !self.valid(obj)? {
            return Err(WorldStateError::ObjectNotFound(obj));
        }
        if let Some(result) = self.update_builtin_property(perms, obj, pname.as_str(), value) {
            return result;
        }
        let (_definer, _def, definer_entry, nearest) = self.resolve_property(obj, &pname)?;
        let current = match &nearest {
            Some((_, entry)) => entry.perms.clone(),
            None => definer_entry.perms.clone(),
        };
        self.check_prop_writable(perms, &current)?;

        let has_local = matches!(&nearest, Some((holder, _)) if *holder == obj);
        let perms_for_slot = if has_local {
            current
        } else {
            // A fresh override: the `c' bit hands ownership to the
            // overriding object's owner.
            let owner = if current.flags.contains(PropFlag::Chown) {
                self.with_obj(obj, |o| o.owner)?
            } else {
                current.owner
            };
            PropPerms::new(owner, current.flags)
        };
        self.with_obj_mut(obj, |rec| {
            rec.propvalues.insert(
                pname,
                PropValue {
                    value: Some(value.clone()),
                    perms: perms_for_slot,
                },
            );
        })
    }

    fn is_property_clear(
        &self,
        perms: Objid,
        obj: Objid,
        pname: Symbol,
    ) -> Result<bool, WorldStateError> {
        let (definer, _def, definer_entry, nearest) = self.resolve_property(obj, &pname)?;
        let current = match &nearest {
            Some((_, entry)) => entry.perms.clone(),
            None => definer_entry.perms.clone(),
        };
        self.check_prop_readable(perms, &current)?;
        if definer == obj {
            return Ok(false);
        }
        Ok(!matches!(&nearest, Some((holder, entry)) if *holder == obj && entry.value.is_some()))
    }

    fn clear_property(
        &mut self,
        perms: Objid,
        obj: Objid,
        pname: Symbol,
    ) -> Result<(), WorldStateError> {
        let (definer, _def, definer_entry, nearest) = self.resolve_property(obj, &pname)?;
        if definer == obj {
            return Err(WorldStateError::InvalidArgument(
                "cannot clear a property on its definer".to_string(),
            ));
        }
        let current = match &nearest {
            Some((_, entry)) => entry.perms.clone(),
            None => definer_entry.perms.clone(),
        };
        self.check_prop_writable(perms, &current)?;
        self.with_obj_mut(obj, |rec| {
            rec.propvalues.remove(&pname);
        })
    }

    fn define_property(
        &mut self,
        perms: Objid,
        location: Objid,
        pname: Symbol,
        owner: Objid,
        prop_flags: BitEnum<PropFlag>,
        initial_value: Option<Var>,
    ) -> Result<(), WorldStateError> {
        let p = self.perms(perms);
        self.check_obj_writable(perms, location)?;
        if owner != p.who {
            p.check_wizard()?;
        }
        if self.builtin_property(location, pname.as_str()).is_some() {
            return Err(WorldStateError::InvalidArgument(
                "clashes with a built-in property".to_string(),
            ));
        }
        // Not already defined anywhere in the ancestry or below.
        for o in self.ancestry(location)? {
            if self.with_obj(o, |rec| rec.has_propdef(&pname))? {
                return Err(WorldStateError::DuplicatePropertyDefinition(
                    o,
                    pname.to_string(),
                ));
            }
        }
        for o in self.descendants(location)? {
            if self.with_obj(o, |rec| rec.has_propdef(&pname))? {
                return Err(WorldStateError::DuplicatePropertyDefinition(
                    o,
                    pname.to_string(),
                ));
            }
        }
        self.with_obj_mut(location, |rec| {
            rec.propdefs.push(PropDef {
                definer: location,
                name: pname.clone(),
            });
            rec.propvalues.insert(
                pname,
                PropValue {
                    value: initial_value,
                    perms: PropPerms::new(owner, prop_flags),
                },
            );
        })
    }

    fn delete_property(
        &mut self,
        perms: Objid,
        obj: Objid,
        pname: Symbol,
    ) -> Result<(), WorldStateError> {
        let defined_here = self.with_obj(obj, |rec| rec.has_propdef(&pname))?;
        if !defined_here {
            return Err(WorldStateError::PropertyNotFound(obj, pname.to_string()));
        }
        self.check_obj_writable(perms, obj)?;
        for o in std::iter::once(obj).chain(self.descendants(obj)?) {
            self.with_obj_mut(o, |rec| {
                rec.propvalues.remove(&pname);
            })?;
        }
        self.with_obj_mut(obj, |rec| {
            rec.propdefs.retain(|pd| pd.name != pname);
        })
    }

    fn verbs(&self, perms: Objid, obj: Objid) -> Result<Vec<VerbDef>, WorldStateError> {
        self.check_obj_readable(perms, obj)?;
        self.with_obj(obj, |o| o.verbdefs.clone())
    }

    fn add_verb(
        &mut self,
        perms: Objid,
        obj: Objid,
        names: Vec<Symbol>,
        owner: Objid,
        flags: BitEnum<VerbFlag>,
        args: VerbArgsSpec,
        source: String,
        program: Program,
    ) -> Result<(), WorldStateError> {
        let p = self.perms(perms);
        p.check_programmer()?;
        self.check_obj_writable(perms, obj)?;
        if owner != p.who {
            p.check_wizard()?;
        }
        let uuid = Uuid::new_v4();
        self.with_obj_mut(obj, |rec| {
            rec.verbdefs.push(VerbDef {
                uuid,
                location: obj,
                owner,
                names,
                flags,
                args,
            });
            rec.verb_programs.insert(uuid, (source, program));
        })
    }

    fn remove_verb(&mut self, perms: Objid, obj: Objid, uuid: Uuid) -> Result<(), WorldStateError> {
        let vd = self
            .with_obj(obj, |rec| {
                rec.verbdefs.iter().find(|vd| vd.uuid == uuid).cloned()
            })?
            .ok_or_else(|| WorldStateError::VerbNotFound(obj, uuid.to_string()))?;
        self.check_verb_writable(perms, &vd)?;
        self.with_obj_mut(obj, |rec| {
            rec.verbdefs.retain(|vd| vd.uuid != uuid);
            rec.verb_programs.remove(&uuid);
        })
    }

    fn update_verb(
        &mut self,
        perms: Objid,
        obj: Objid,
        uuid: Uuid,
        attrs: VerbAttrs,
        program: Option<Program>,
    ) -> Result<(), WorldStateError> {
        let vd = self
            .with_obj(obj, |rec| {
                rec.verbdefs.iter().find(|vd| vd.uuid == uuid).cloned()
            })?
            .ok_or_else(|| WorldStateError::VerbNotFound(obj, uuid.to_string()))?;
        self.check_verb_writable(perms, &vd)?;
        let p = self.perms(perms);
        if let Some(new_owner) = attrs.owner {
            if new_owner != vd.owner {
                p.check_wizard()?;
            }
        }
        self.with_obj_mut(obj, |rec| {
            let vd = rec
                .verbdefs
                .iter_mut()
                .find(|vd| vd.uuid == uuid)
                .expect("verb vanished mid-update");
            if let Some(owner) = attrs.owner {
                vd.owner = owner;
            }
            if let Some(names) = attrs.names {
                vd.names = names;
            }
            if let Some(flags) = attrs.flags {
                vd.flags = flags;
            }
            if let Some(args) = attrs.args {
                vd.args = args;
            }
            if let (Some(source), Some(program)) = (attrs.source, program) {
                rec.verb_programs.insert(uuid, (source, program));
            }
        })
    }

    fn get_verb(
        &self,
        perms: Objid,
        obj: Objid,
        vname: Symbol,
    ) -> Result<VerbDef, WorldStateError> {
        let vd = self
            .with_obj(obj, |rec| {
                rec.verbdefs
                    .iter()
                    .find(|vd| vd.matches_name(vname.as_str()))
                    .cloned()
            })?
            .ok_or_else(|| WorldStateError::VerbNotFound(obj, vname.to_string()))?;
        self.check_verb_readable(perms, &vd)?;
        Ok(vd)
    }

    fn get_verb_at_index(
        &self,
        perms: Objid,
        obj: Objid,
        index: usize,
    ) -> Result<VerbDef, WorldStateError> {
        let vd = self
            .with_obj(obj, |rec| rec.verbdefs.get(index.wrapping_sub(1)).cloned())?
            .ok_or_else(|| WorldStateError::VerbNotFound(obj, format!("#{index}")))?;
        self.check_verb_readable(perms, &vd)?;
        Ok(vd)
    }

    fn retrieve_verb_program(
        &self,
        perms: Objid,
        obj: Objid,
        uuid: Uuid,
    ) -> Result<(String, Program), WorldStateError> {
        let vd = self
            .with_obj(obj, |rec| {
                rec.verbdefs.iter().find(|vd| vd.uuid == uuid).cloned()
            })?
            .ok_or_else(|| WorldStateError::VerbNotFound(obj, uuid.to_string()))?;
        self.check_verb_readable(perms, &vd)?;
        self.with_obj(obj, |rec| rec.verb_programs.get(&uuid).cloned())?
            .ok_or_else(|| WorldStateError::VerbNotFound(obj, uuid.to_string()))
    }

    fn find_method_verb_on(
        &self,
        _perms: Objid,
        obj: Objid,
        vname: Symbol,
    ) -> Result<(VerbDef, Program), WorldStateError> {
        for o in self.ancestry(obj)? {
            let found = self.with_obj(o, |rec| {
                rec.verbdefs
                    .iter()
                    .find(|vd| {
                        vd.matches_name(vname.as_str()) && vd.flags.contains(VerbFlag::Exec)
                    })
                    .map(|vd| {
                        (
                            vd.clone(),
                            rec.verb_programs
                                .get(&vd.uuid)
                                .map(|(_, p)| p.clone())
                                .unwrap_or_default(),
                        )
                    })
            })?;
            if let Some((vd, program)) = found {
                return Ok((vd, program));
            }
        }
        Err(WorldStateError::VerbNotFound(obj, vname.to_string()))
    }

    fn find_command_verb_on(
        &self,
        _perms: Objid,
        obj: Objid,
        command_verb: &str,
        dobj: Objid,
        prep: &PrepSpec,
        iobj: Objid,
    ) -> Result<Option<(VerbDef, Program)>, WorldStateError> {
        if !self.valid(obj)? {
            return Ok(None);
        }
        for o in self.ancestry(obj)? {
            let found = self.with_obj(o, |rec| {
                rec.verbdefs
                    .iter()
                    .find(|vd| {
                        vd.matches_name(command_verb)
                            && vd.args.matches(obj, dobj, prep, iobj)
                    })
                    .map(|vd| {
                        (
                            vd.clone(),
                            rec.verb_programs
                                .get(&vd.uuid)
                                .map(|(_, p)| p.clone())
                                .unwrap_or_default(),
                        )
                    })
            })?;
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    fn db_usage(&self) -> Result<usize, WorldStateError> {
        let store = self.db.store.lock().unwrap();
        Ok(store
            .objects
            .values()
            .filter_map(|vr| vr.record.as_ref())
            .map(|r| r.bytes())
            .sum())
    }

    fn object_bytes(&self, _perms: Objid, obj: Objid) -> Result<usize, WorldStateError> {
        self.with_obj(obj, |o| o.bytes())
    }

    fn commit(self: Box<Self>) -> Result<CommitResult, WorldStateError> {
        let mut store = self.db.store.lock().unwrap();

        // Validate: everything we observed must still be at the version we
        // observed it at.
        for (oid, observed) in self.read_versions.borrow().iter() {
            let current = store.objects.get(oid).map(|vr| vr.version).unwrap_or(0);
            if current != *observed {
                debug!(oid, observed, current, "commit conflict");
                return Ok(CommitResult::ConflictRetry);
            }
        }

        // Apply the working set.
        for oid in self.dirty.borrow().iter() {
            let record = self
                .local
                .borrow()
                .get(oid)
                .cloned()
                .expect("dirty object missing from working set");
            let version = store.bump_version();
            store
                .objects
                .insert(*oid, VersionedRecord { version, record });
        }
        if self.max_object_dirty.get() {
            store.max_object = self.max_object.get();
        } else if self.max_object.get() > store.max_object {
            store.max_object = self.max_object.get();
        }
        Ok(CommitResult::Success)
    }

    fn rollback(self: Box<Self>) -> Result<(), WorldStateError> {
        // Nothing was shared; dropping the working set is the rollback.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::WorldStateDb;
    use crate::model::WorldStateSource;
    use crate::var::{v_int, v_str};

    const WIZ: Objid = Objid(1);

    fn world() -> (WorldStateDb, Box<dyn WorldState>) {
        let db = WorldStateDb::with_minimal_core();
        let ws = db.new_world_state().unwrap();
        (db, ws)
    }

    #[test]
    fn test_create_links_children() {
        let (_db, mut ws) = world();
        let o = ws.create_object(WIZ, Objid(2), WIZ).unwrap();
        assert_eq!(ws.parent_of(WIZ, o).unwrap(), Objid(2));
        assert!(ws.children_of(WIZ, Objid(2)).unwrap().contains(&o));
        assert_eq!(ws.max_object().unwrap(), o);
    }

    #[test]
    fn test_chparent_maintains_child_sets() {
        let (_db, mut ws) = world();
        let p = ws.create_object(WIZ, Objid(2), WIZ).unwrap();
        let q = ws.create_object(WIZ, Objid(2), WIZ).unwrap();
        let o = ws.create_object(WIZ, p, WIZ).unwrap();

        ws.change_parent(WIZ, o, q).unwrap();
        assert_eq!(ws.parent_of(WIZ, o).unwrap(), q);
        assert!(!ws.children_of(WIZ, p).unwrap().contains(&o));
        assert!(ws.children_of(WIZ, q).unwrap().contains(&o));
    }

    #[test]
    fn test_chparent_refuses_cycles() {
        let (_db, mut ws) = world();
        let a = ws.create_object(WIZ, Objid(2), WIZ).unwrap();
        let b = ws.create_object(WIZ, a, WIZ).unwrap();

        assert!(matches!(
            ws.change_parent(WIZ, a, a),
            Err(WorldStateError::RecursiveMove(_, _))
        ));
        assert!(matches!(
            ws.change_parent(WIZ, a, b),
            Err(WorldStateError::RecursiveMove(_, _))
        ));
        // Unchanged on failure.
        assert_eq!(ws.parent_of(WIZ, a).unwrap(), Objid(2));
    }

    #[test]
    fn test_property_inheritance_and_clear() {
        let (_db, mut ws) = world();
        let parent = ws.create_object(WIZ, Objid(2), WIZ).unwrap();
        let child = ws.create_object(WIZ, parent, WIZ).unwrap();
        let pname = Symbol::mk("color");

        ws.define_property(
            WIZ,
            parent,
            pname.clone(),
            WIZ,
            BitEnum::new_with(PropFlag::Read) | PropFlag::Write,
            Some(v_str("blue")),
        )
        .unwrap();

        // The child inherits until it overrides, and clearing restores the
        // inherited view.
        assert_eq!(ws.retrieve_property(WIZ, child, pname.clone()).unwrap(), v_str("blue"));
        assert!(ws.is_property_clear(WIZ, child, pname.clone()).unwrap());

        ws.update_property(WIZ, child, pname.clone(), &v_str("red")).unwrap();
        assert_eq!(ws.retrieve_property(WIZ, child, pname.clone()).unwrap(), v_str("red"));
        assert_eq!(ws.retrieve_property(WIZ, parent, pname.clone()).unwrap(), v_str("blue"));
        assert!(!ws.is_property_clear(WIZ, child, pname.clone()).unwrap());

        ws.clear_property(WIZ, child, pname.clone()).unwrap();
        assert_eq!(ws.retrieve_property(WIZ, child, pname.clone()).unwrap(), v_str("blue"));

        // Clearing on the definer is refused.
        assert!(ws.clear_property(WIZ, parent, pname.clone()).is_err());
    }

    #[test]
    fn test_duplicate_property_definition_refused() {
        let (_db, mut ws) = world();
        let parent = ws.create_object(WIZ, Objid(2), WIZ).unwrap();
        let child = ws.create_object(WIZ, parent, WIZ).unwrap();
        let pname = Symbol::mk("size");

        ws.define_property(WIZ, parent, pname.clone(), WIZ, BitEnum::new(), Some(v_int(1)))
            .unwrap();
        assert!(matches!(
            ws.define_property(WIZ, child, pname.clone(), WIZ, BitEnum::new(), Some(v_int(2))),
            Err(WorldStateError::DuplicatePropertyDefinition(_, _))
        ));
    }

    #[test]
    fn test_builtin_properties() {
        let (_db, mut ws) = world();
        assert_eq!(
            ws.retrieve_property(WIZ, WIZ, Symbol::mk("name")).unwrap(),
            v_str("Wizard")
        );
        assert_eq!(
            ws.retrieve_property(WIZ, WIZ, Symbol::mk("wizard")).unwrap(),
            v_int(1)
        );
        assert_eq!(
            ws.retrieve_property(WIZ, WIZ, Symbol::mk("location")).unwrap(),
            Var::Obj(Objid(2))
        );
        ws.update_property(WIZ, WIZ, Symbol::mk("name"), &v_str("Merlin"))
            .unwrap();
        assert_eq!(ws.names_of(WIZ, WIZ).unwrap(), "Merlin");
        // The player flag is not settable as a property.
        assert!(ws
            .update_property(WIZ, WIZ, Symbol::mk("player"), &v_int(0))
            .is_err());
    }

    #[test]
    fn test_move_maintains_contents() {
        let (_db, mut ws) = world();
        let box_ = ws.create_object(WIZ, Objid(2), WIZ).unwrap();
        let thing = ws.create_object(WIZ, Objid(2), WIZ).unwrap();

        ws.move_object(WIZ, thing, box_).unwrap();
        assert_eq!(ws.location_of(WIZ, thing).unwrap(), box_);
        assert!(ws.contents_of(WIZ, box_).unwrap().contains(&thing));

        ws.move_object(WIZ, thing, NOTHING).unwrap();
        assert_eq!(ws.location_of(WIZ, thing).unwrap(), NOTHING);
        assert!(!ws.contents_of(WIZ, box_).unwrap().contains(&thing));
    }

    #[test]
    fn test_move_refuses_recursion() {
        let (_db, mut ws) = world();
        let outer = ws.create_object(WIZ, Objid(2), WIZ).unwrap();
        let inner = ws.create_object(WIZ, Objid(2), WIZ).unwrap();
        ws.move_object(WIZ, inner, outer).unwrap();
        assert!(matches!(
            ws.move_object(WIZ, outer, inner),
            Err(WorldStateError::RecursiveMove(_, _))
        ));
        assert!(matches!(
            ws.move_object(WIZ, outer, outer),
            Err(WorldStateError::RecursiveMove(_, _))
        ));
    }

    #[test]
    fn test_verb_resolution_walks_ancestry() {
        let (_db, mut ws) = world();
        let parent = ws.create_object(WIZ, Objid(2), WIZ).unwrap();
        let child = ws.create_object(WIZ, parent, WIZ).unwrap();
        let program = crate::compiler::compile("return 1;").unwrap();
        ws.add_verb(
            WIZ,
            parent,
            vec![Symbol::mk("frob*nicate")],
            WIZ,
            VerbFlag::rxd(),
            VerbArgsSpec::this_none_this(),
            "return 1;".to_string(),
            program,
        )
        .unwrap();

        // Resolution from the child, through the wildcard.
        assert!(ws.find_method_verb_on(WIZ, child, Symbol::mk("frob")).is_ok());
        assert!(ws.find_method_verb_on(WIZ, child, Symbol::mk("frobnicate")).is_ok());
        assert!(matches!(
            ws.find_method_verb_on(WIZ, child, Symbol::mk("fro")),
            Err(WorldStateError::VerbNotFound(_, _))
        ));
    }

    #[test]
    fn test_recycle_reparents_children() {
        let (_db, mut ws) = world();
        let grandparent = ws.create_object(WIZ, Objid(2), WIZ).unwrap();
        let parent = ws.create_object(WIZ, grandparent, WIZ).unwrap();
        let child = ws.create_object(WIZ, parent, WIZ).unwrap();

        ws.recycle_object(WIZ, parent).unwrap();
        assert!(!ws.valid(parent).unwrap());
        assert_eq!(ws.parent_of(WIZ, child).unwrap(), grandparent);
        assert!(ws.children_of(WIZ, grandparent).unwrap().contains(&child));
    }

    #[test]
    fn test_renumber_compacts() {
        let (_db, mut ws) = world();
        let a = ws.create_object(WIZ, Objid(2), WIZ).unwrap();
        let b = ws.create_object(WIZ, Objid(2), WIZ).unwrap();
        ws.recycle_object(WIZ, a).unwrap();

        // b takes the lowest free number, which is a's.
        let renumbered = ws.renumber_object(WIZ, b).unwrap();
        assert_eq!(renumbered, a);
        assert!(ws.valid(renumbered).unwrap());
        assert!(!ws.valid(b).unwrap());
        assert!(ws.children_of(WIZ, Objid(2)).unwrap().contains(&renumbered));
    }

    #[test]
    fn test_renumber_rewrites_ownership() {
        let (_db, mut ws) = world();
        let hole = ws.create_object(WIZ, Objid(2), WIZ).unwrap();
        // b owns itself; target (and a verb and a property on it) are owned
        // by b.
        let b = ws.create_object(WIZ, Objid(2), NOTHING).unwrap();
        let target = ws.create_object(WIZ, Objid(2), b).unwrap();
        let program = crate::compiler::compile("return 0;").unwrap();
        ws.add_verb(
            WIZ,
            target,
            vec![Symbol::mk("poke")],
            b,
            VerbFlag::rxd(),
            VerbArgsSpec::this_none_this(),
            "return 0;".to_string(),
            program,
        )
        .unwrap();
        ws.define_property(
            WIZ,
            target,
            Symbol::mk("held"),
            b,
            BitEnum::new_with(PropFlag::Read),
            Some(v_int(1)),
        )
        .unwrap();
        ws.recycle_object(WIZ, hole).unwrap();

        let new_id = ws.renumber_object(WIZ, b).unwrap();
        assert_eq!(new_id, hole);

        // Every ownership reference follows the renumbered object.
        assert_eq!(ws.owner_of(new_id).unwrap(), new_id);
        assert_eq!(ws.owner_of(target).unwrap(), new_id);
        assert_eq!(ws.get_verb(WIZ, target, Symbol::mk("poke")).unwrap().owner, new_id);
        let (_, perms) = ws
            .get_property_info(WIZ, target, Symbol::mk("held"))
            .unwrap();
        assert_eq!(perms.owner, new_id);
    }

    #[test]
    fn test_nonowner_permission_checks() {
        let (_db, mut ws) = world();
        // A plain object owned by the wizard; an unprivileged player.
        let pleb = ws.create_object(WIZ, Objid(2), WIZ).unwrap();
        let target = ws.create_object(WIZ, Objid(2), WIZ).unwrap();
        ws.define_property(
            WIZ,
            target,
            Symbol::mk("secret"),
            WIZ,
            BitEnum::new(),
            Some(v_int(42)),
        )
        .unwrap();

        assert!(matches!(
            ws.retrieve_property(pleb, target, Symbol::mk("secret")),
            Err(WorldStateError::PropertyPermissionDenied)
        ));
        assert!(matches!(
            ws.set_name_of(pleb, target, "mine now".to_string()),
            Err(WorldStateError::ObjectPermissionDenied)
        ));
        assert!(matches!(
            ws.recycle_object(pleb, target),
            Err(WorldStateError::ObjectPermissionDenied)
        ));
    }
}
