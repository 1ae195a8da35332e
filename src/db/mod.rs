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

//! The shared world: a versioned in-memory object store handing out
//! transactionally isolated [`crate::model::WorldState`] views.
//!
//! Versioning is per whole object. A transaction records the version of
//! every object it touches and buffers its writes; commit re-validates
//! those versions under the store lock and either applies the working set
//! or reports `ConflictRetry`, in which case the task re-runs its current
//! segment. MOO code never observes a half-applied transaction.

mod object;
mod world_state;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::info;

pub use object::{ObjectRecord, PropValue};
pub use world_state::DbTransaction;

use crate::compiler::compile;
use crate::model::props::{PropDef, PropPerms};
use crate::model::r#match::VerbArgsSpec;
use crate::model::{
    LoaderInterface, ObjAttrs, ObjFlag, PropFlag, VerbDef, VerbFlag, WorldState, WorldStateError,
    WorldStateSource,
};
use crate::util::BitEnum;
use crate::var::{Objid, Symbol, Var, NOTHING};

pub(crate) struct VersionedRecord {
    pub version: u64,
    /// `None` is a tombstone for a recycled object.
    pub record: Option<ObjectRecord>,
}

pub(crate) struct Store {
    pub objects: HashMap<i64, VersionedRecord>,
    pub max_object: i64,
    pub next_version: u64,
}

impl Store {
    fn new() -> Self {
        Self {
            objects: HashMap::new(),
            max_object: -1,
            next_version: 1,
        }
    }

    pub fn bump_version(&mut self) -> u64 {
        let v = self.next_version;
        self.next_version += 1;
        v
    }
}

/// Handle on the shared world; cheap to clone.
#[derive(Clone)]
pub struct WorldStateDb {
    pub(crate) store: Arc<Mutex<Store>>,
}

impl WorldStateDb {
    pub fn new() -> Self {
        Self {
            store: Arc::new(Mutex::new(Store::new())),
        }
    }

    /// A loader handle for bulk construction, bypassing permission checks.
    pub fn loader(&self) -> Box<dyn LoaderInterface> {
        Box::new(DbLoader { db: self.clone() })
    }

    /// A minimal bootstrap world: `#0` the system object, `#1` a wizard
    /// player, `#2` a room the wizard stands in. Used for first boot and by
    /// the test suites.
    pub fn with_minimal_core() -> Self {
        let db = Self::new();
        let mut loader = db.loader();
        let system = loader
            .create_object(
                Some(Objid(0)),
                ObjAttrs {
                    owner: Some(Objid(1)),
                    name: Some("System Object".to_string()),
                    parent: Some(NOTHING),
                    location: Some(NOTHING),
                    flags: Some(BitEnum::new()),
                },
            )
            .expect("create #0");
        let wizard = loader
            .create_object(
                Some(Objid(1)),
                ObjAttrs {
                    owner: Some(Objid(1)),
                    name: Some("Wizard".to_string()),
                    parent: Some(system),
                    location: Some(NOTHING),
                    flags: Some(
                        BitEnum::new_with(ObjFlag::User)
                            | ObjFlag::Programmer
                            | ObjFlag::Wizard,
                    ),
                },
            )
            .expect("create #1");
        let room = loader
            .create_object(
                Some(Objid(2)),
                ObjAttrs {
                    owner: Some(wizard),
                    name: Some("The First Room".to_string()),
                    parent: Some(system),
                    location: Some(NOTHING),
                    flags: Some(BitEnum::new_with(ObjFlag::Read)),
                },
            )
            .expect("create #2");
        loader
            .set_object_location(wizard, room)
            .expect("place wizard");
        loader.commit().expect("commit bootstrap");
        info!("bootstrapped minimal core: {}, {}, {}", system, wizard, room);
        db
    }
}

impl Default for WorldStateDb {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldStateSource for WorldStateDb {
    fn new_world_state(&self) -> Result<Box<dyn WorldState>, WorldStateError> {
        Ok(Box::new(DbTransaction::new(self.clone())))
    }

    fn checkpoint(&self) -> Result<(), WorldStateError> {
        // Durability is the external dumper's concern; there is nothing to
        // flush here.
        Ok(())
    }
}

struct DbLoader {
    db: WorldStateDb,
}

impl LoaderInterface for DbLoader {
    fn create_object(
        &mut self,
        objid: Option<Objid>,
        attrs: ObjAttrs,
    ) -> Result<Objid, WorldStateError> {
        let mut store = self.db.store.lock().unwrap();
        let id = match objid {
            Some(id) => id,
            None => Objid(store.max_object + 1),
        };
        if store.objects.get(&id.0).is_some_and(|vr| vr.record.is_some()) {
            return Err(WorldStateError::InvalidArgument(format!(
                "object {} already exists",
                id
            )));
        }
        let parent = attrs.parent.unwrap_or(NOTHING);
        let record = ObjectRecord::new(
            parent,
            attrs.owner.unwrap_or(id),
            attrs.name.as_deref().unwrap_or(""),
            attrs.flags.unwrap_or_default(),
        );
        let version = store.bump_version();
        store.objects.insert(
            id.0,
            VersionedRecord {
                version,
                record: Some(record),
            },
        );
        if parent != NOTHING {
            if let Some(Some(p)) = store.objects.get_mut(&parent.0).map(|vr| vr.record.as_mut()) {
                p.children.push(id);
            }
        }
        if id.0 > store.max_object {
            store.max_object = id.0;
        }
        Ok(id)
    }

    fn set_object_parent(&mut self, obj: Objid, parent: Objid) -> Result<(), WorldStateError> {
        let mut store = self.db.store.lock().unwrap();
        let old_parent = {
            let rec = loader_obj(&mut store, obj)?;
            std::mem::replace(&mut rec.parent, parent)
        };
        if old_parent != NOTHING {
            if let Ok(p) = loader_obj(&mut store, old_parent) {
                p.children.retain(|c| *c != obj);
            }
        }
        if parent != NOTHING {
            loader_obj(&mut store, parent)?.children.push(obj);
        }
        Ok(())
    }

    fn set_object_location(&mut self, obj: Objid, location: Objid) -> Result<(), WorldStateError> {
        let mut store = self.db.store.lock().unwrap();
        let old_location = {
            let rec = loader_obj(&mut store, obj)?;
            std::mem::replace(&mut rec.location, location)
        };
        if old_location != NOTHING {
            if let Ok(l) = loader_obj(&mut store, old_location) {
                l.contents.retain(|c| *c != obj);
            }
        }
        if location != NOTHING {
            loader_obj(&mut store, location)?.contents.push(obj);
        }
        Ok(())
    }

    fn define_property(
        &mut self,
        definer: Objid,
        pname: Symbol,
        owner: Objid,
        flags: BitEnum<PropFlag>,
        value: Option<Var>,
    ) -> Result<(), WorldStateError> {
        let mut store = self.db.store.lock().unwrap();
        let rec = loader_obj(&mut store, definer)?;
        if rec.has_propdef(&pname) {
            return Err(WorldStateError::DuplicatePropertyDefinition(
                definer,
                pname.to_string(),
            ));
        }
        rec.propdefs.push(PropDef {
            definer,
            name: pname.clone(),
        });
        rec.propvalues.insert(
            pname,
            PropValue {
                value,
                perms: PropPerms::new(owner, flags),
            },
        );
        Ok(())
    }

    fn add_verb(
        &mut self,
        obj: Objid,
        names: Vec<Symbol>,
        owner: Objid,
        flags: BitEnum<VerbFlag>,
        args: VerbArgsSpec,
        source: String,
    ) -> Result<(), WorldStateError> {
        let program = compile(&source)
            .map_err(|e| WorldStateError::InvalidArgument(format!("verb does not compile: {e}")))?;
        let mut store = self.db.store.lock().unwrap();
        let rec = loader_obj(&mut store, obj)?;
        let uuid = uuid::Uuid::new_v4();
        rec.verbdefs.push(VerbDef {
            uuid,
            location: obj,
            owner,
            names,
            flags,
            args,
        });
        rec.verb_programs.insert(uuid, (source, program));
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), WorldStateError> {
        Ok(())
    }
}

fn loader_obj(store: &mut Store, obj: Objid) -> Result<&mut ObjectRecord, WorldStateError> {
    store
        .objects
        .get_mut(&obj.0)
        .and_then(|vr| vr.record.as_mut())
        .ok_or(WorldStateError::ObjectNotFound(obj))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CommitResult;
    use crate::var::v_int;

    #[test]
    fn test_bootstrap_world() {
        let db = WorldStateDb::with_minimal_core();
        let ws = db.new_world_state().unwrap();
        assert!(ws.valid(Objid(0)).unwrap());
        assert!(ws.valid(Objid(1)).unwrap());
        assert_eq!(ws.location_of(Objid(1), Objid(1)).unwrap(), Objid(2));
        assert_eq!(ws.players().unwrap(), vec![Objid(1)]);
        assert_eq!(ws.max_object().unwrap(), Objid(2));
    }

    #[test]
    fn test_transaction_isolation() {
        let db = WorldStateDb::with_minimal_core();
        let wizard = Objid(1);

        let mut tx1 = db.new_world_state().unwrap();
        tx1.set_name_of(wizard, wizard, "Gandalf".to_string())
            .unwrap();

        // A reader opened before tx1 commits sees the old name.
        let tx2 = db.new_world_state().unwrap();
        assert_eq!(tx2.names_of(wizard, wizard).unwrap(), "Wizard");

        assert_eq!(tx1.commit().unwrap(), CommitResult::Success);

        let tx3 = db.new_world_state().unwrap();
        assert_eq!(tx3.names_of(wizard, wizard).unwrap(), "Gandalf");
    }

    #[test]
    fn test_conflicting_writers_retry() {
        let db = WorldStateDb::with_minimal_core();
        let wizard = Objid(1);

        let mut tx1 = db.new_world_state().unwrap();
        let mut tx2 = db.new_world_state().unwrap();
        tx1.set_name_of(wizard, wizard, "One".to_string()).unwrap();
        tx2.set_name_of(wizard, wizard, "Two".to_string()).unwrap();

        assert_eq!(tx1.commit().unwrap(), CommitResult::Success);
        // The second writer observed a stale version and must retry.
        assert_eq!(tx2.commit().unwrap(), CommitResult::ConflictRetry);

        let tx3 = db.new_world_state().unwrap();
        assert_eq!(tx3.names_of(wizard, wizard).unwrap(), "One");
    }

    #[test]
    fn test_rollback_discards() {
        let db = WorldStateDb::with_minimal_core();
        let wizard = Objid(1);
        let mut tx = db.new_world_state().unwrap();
        tx.update_property(
            wizard,
            Objid(0),
            Symbol::mk("name"),
            &v_int(0), // never applied
        )
        .err();
        tx.set_name_of(wizard, wizard, "Nobody".to_string()).unwrap();
        tx.rollback().unwrap();

        let ws = db.new_world_state().unwrap();
        assert_eq!(ws.names_of(wizard, wizard).unwrap(), "Wizard");
    }
}
