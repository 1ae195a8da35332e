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

use thiserror::Error as ThisError;
use uuid::Uuid;

use crate::compiler::Program;
use crate::model::objects::{ObjAttrs, ObjFlag};
use crate::model::props::{PropAttrs, PropDef, PropFlag, PropPerms};
use crate::model::r#match::{PrepSpec, VerbArgsSpec};
use crate::model::verbs::{VerbAttrs, VerbDef, VerbFlag};
use crate::util::BitEnum;
use crate::var::{Error, Objid, Symbol, Var};

/// Errors from world state operations. Translated to MOO error codes at the
/// VM boundary.
#[derive(ThisError, Debug, Clone, Eq, PartialEq)]
pub enum WorldStateError {
    #[error("Object not found: {0}")]
    ObjectNotFound(Objid),
    #[error("Recursive move: {0} -> {1}")]
    RecursiveMove(Objid, Objid),
    #[error("Object permission denied")]
    ObjectPermissionDenied,

    #[error("Property not found: {0}.{1}")]
    PropertyNotFound(Objid, String),
    #[error("Property permission denied")]
    PropertyPermissionDenied,
    #[error("Duplicate property definition: {0}.{1}")]
    DuplicatePropertyDefinition(Objid, String),

    #[error("Verb not found: {0}:{1}")]
    VerbNotFound(Objid, String),
    #[error("Verb permission denied")]
    VerbPermissionDenied,
    #[error("Verb already exists: {0}:{1}")]
    DuplicateVerb(Objid, String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Rollback requested, retry operation")]
    RollbackRetry,
}

impl WorldStateError {
    pub fn to_error_code(&self) -> Error {
        match self {
            Self::ObjectNotFound(_) => Error::E_INVIND,
            Self::RecursiveMove(_, _) => Error::E_RECMOVE,
            Self::ObjectPermissionDenied => Error::E_PERM,
            Self::PropertyNotFound(_, _) => Error::E_PROPNF,
            Self::PropertyPermissionDenied => Error::E_PERM,
            Self::DuplicatePropertyDefinition(_, _) => Error::E_INVARG,
            Self::VerbNotFound(_, _) => Error::E_VERBNF,
            Self::VerbPermissionDenied => Error::E_PERM,
            Self::DuplicateVerb(_, _) => Error::E_INVARG,
            Self::InvalidArgument(_) => Error::E_INVARG,
            Self::RollbackRetry => Error::E_QUOTA,
        }
    }
}

impl From<WorldStateError> for Error {
    fn from(e: WorldStateError) -> Self {
        e.to_error_code()
    }
}

/// Outcome of a transaction commit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CommitResult {
    Success,
    /// Another transaction committed conflicting changes first; re-run the
    /// work from the last suspension point.
    ConflictRetry,
}

/// A transactionally isolated view of the shared world. One instance exists
/// per task execution segment (from start or resume to the next suspension
/// or completion); at the end it is committed or rolled back.
///
/// Permission arguments name the object on whose behalf the operation runs;
/// wizardliness is read from that object's flags in this same snapshot.
pub trait WorldState {
    // Objects.
    fn valid(&self, obj: Objid) -> Result<bool, WorldStateError>;
    fn players(&self) -> Result<Vec<Objid>, WorldStateError>;
    fn owner_of(&self, obj: Objid) -> Result<Objid, WorldStateError>;
    fn flags_of(&self, obj: Objid) -> Result<BitEnum<ObjFlag>, WorldStateError>;
    fn set_flags_of(
        &mut self,
        perms: Objid,
        obj: Objid,
        flags: BitEnum<ObjFlag>,
    ) -> Result<(), WorldStateError>;
    /// Whether `who` is a wizard or owns `what`.
    fn controls(&self, who: Objid, what: Objid) -> Result<bool, WorldStateError>;
    fn names_of(&self, perms: Objid, obj: Objid) -> Result<String, WorldStateError>;
    fn set_name_of(&mut self, perms: Objid, obj: Objid, name: String)
        -> Result<(), WorldStateError>;
    fn set_owner_of(&mut self, perms: Objid, obj: Objid, owner: Objid)
        -> Result<(), WorldStateError>;
    fn location_of(&self, perms: Objid, obj: Objid) -> Result<Objid, WorldStateError>;
    fn contents_of(&self, perms: Objid, obj: Objid) -> Result<Vec<Objid>, WorldStateError>;
    fn parent_of(&self, perms: Objid, obj: Objid) -> Result<Objid, WorldStateError>;
    fn children_of(&self, perms: Objid, obj: Objid) -> Result<Vec<Objid>, WorldStateError>;

    fn create_object(
        &mut self,
        perms: Objid,
        parent: Objid,
        owner: Objid,
    ) -> Result<Objid, WorldStateError>;
    fn recycle_object(&mut self, perms: Objid, obj: Objid) -> Result<(), WorldStateError>;
    /// Raw location change; `accept`/`enterfunc`/`exitfunc` protocol is the
    /// caller's (bf_move's) responsibility.
    fn move_object(
        &mut self,
        perms: Objid,
        obj: Objid,
        new_loc: Objid,
    ) -> Result<(), WorldStateError>;
    fn change_parent(
        &mut self,
        perms: Objid,
        obj: Objid,
        new_parent: Objid,
    ) -> Result<(), WorldStateError>;
    fn max_object(&self) -> Result<Objid, WorldStateError>;
    fn reset_max_object(&mut self, perms: Objid) -> Result<(), WorldStateError>;
    /// Move `obj` to the lowest unused object number, rewriting references.
    /// Returns the new number.
    fn renumber_object(&mut self, perms: Objid, obj: Objid) -> Result<Objid, WorldStateError>;

    // Properties.
    /// Property definitions made directly on `obj`.
    fn properties(&self, perms: Objid, obj: Objid) -> Result<Vec<PropDef>, WorldStateError>;
    fn retrieve_property(
        &self,
        perms: Objid,
        obj: Objid,
        pname: Symbol,
    ) -> Result<Var, WorldStateError>;
    fn get_property_info(
        &self,
        perms: Objid,
        obj: Objid,
        pname: Symbol,
    ) -> Result<(PropDef, PropPerms), WorldStateError>;
    fn set_property_info(
        &mut self,
        perms: Objid,
        obj: Objid,
        pname: Symbol,
        attrs: PropAttrs,
    ) -> Result<(), WorldStateError>;
    fn update_property(
        &mut self,
        perms: Objid,
        obj: Objid,
        pname: Symbol,
        value: &Var,
    ) -> Result<(), WorldStateError>;
    fn is_property_clear(
        &self,
        perms: Objid,
        obj: Objid,
        pname: Symbol,
    ) -> Result<bool, WorldStateError>;
    fn clear_property(
        &mut self,
        perms: Objid,
        obj: Objid,
        pname: Symbol,
    ) -> Result<(), WorldStateError>;
    fn define_property(
        &mut self,
        perms: Objid,
        location: Objid,
        pname: Symbol,
        owner: Objid,
        prop_flags: BitEnum<PropFlag>,
        initial_value: Option<Var>,
    ) -> Result<(), WorldStateError>;
    fn delete_property(
        &mut self,
        perms: Objid,
        obj: Objid,
        pname: Symbol,
    ) -> Result<(), WorldStateError>;

    // Verbs.
    /// Verb definitions directly on `obj`, in definition order.
    fn verbs(&self, perms: Objid, obj: Objid) -> Result<Vec<VerbDef>, WorldStateError>;
    #[allow(clippy::too_many_arguments)]
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
    ) -> Result<(), WorldStateError>;
    fn remove_verb(&mut self, perms: Objid, obj: Objid, uuid: Uuid) -> Result<(), WorldStateError>;
    fn update_verb(
        &mut self,
        perms: Objid,
        obj: Objid,
        uuid: Uuid,
        attrs: VerbAttrs,
        program: Option<Program>,
    ) -> Result<(), WorldStateError>;
    /// A verb defined directly on `obj`, by name, without inheritance.
    fn get_verb(&self, perms: Objid, obj: Objid, vname: Symbol)
        -> Result<VerbDef, WorldStateError>;
    /// A verb defined directly on `obj`, by 1-based index.
    fn get_verb_at_index(
        &self,
        perms: Objid,
        obj: Objid,
        index: usize,
    ) -> Result<VerbDef, WorldStateError>;
    fn retrieve_verb_program(
        &self,
        perms: Objid,
        obj: Objid,
        uuid: Uuid,
    ) -> Result<(String, Program), WorldStateError>;
    /// Resolve a "method" verb on `obj` or its ancestors.
    fn find_method_verb_on(
        &self,
        perms: Objid,
        obj: Objid,
        vname: Symbol,
    ) -> Result<(VerbDef, Program), WorldStateError>;
    /// Resolve a command verb on `obj` or its ancestors, matching both the
    /// verb word and the parsed argument specification.
    fn find_command_verb_on(
        &self,
        perms: Objid,
        obj: Objid,
        command_verb: &str,
        dobj: Objid,
        prep: &PrepSpec,
        iobj: Objid,
    ) -> Result<Option<(VerbDef, Program)>, WorldStateError>;

    /// Approximate bytes used by the whole database.
    fn db_usage(&self) -> Result<usize, WorldStateError>;
    /// Approximate bytes used by one object.
    fn object_bytes(&self, perms: Objid, obj: Objid) -> Result<usize, WorldStateError>;

    fn commit(self: Box<Self>) -> Result<CommitResult, WorldStateError>;
    fn rollback(self: Box<Self>) -> Result<(), WorldStateError>;
}

/// Hands out transactions over the shared world.
pub trait WorldStateSource: Send + Sync {
    fn new_world_state(&self) -> Result<Box<dyn WorldState>, WorldStateError>;
    /// Flush durable state; invoked by `dump_database` / checkpointing.
    fn checkpoint(&self) -> Result<(), WorldStateError>;
}

/// The seam for the external database loader: bulk construction without
/// permission checks, then a single commit. The textdump reader/writer that
/// drives this lives outside the core.
pub trait LoaderInterface {
    fn create_object(
        &mut self,
        objid: Option<Objid>,
        attrs: ObjAttrs,
    ) -> Result<Objid, WorldStateError>;
    fn set_object_parent(&mut self, obj: Objid, parent: Objid) -> Result<(), WorldStateError>;
    fn set_object_location(&mut self, obj: Objid, location: Objid)
        -> Result<(), WorldStateError>;
    fn define_property(
        &mut self,
        definer: Objid,
        pname: Symbol,
        owner: Objid,
        flags: BitEnum<PropFlag>,
        value: Option<Var>,
    ) -> Result<(), WorldStateError>;
    #[allow(clippy::too_many_arguments)]
    fn add_verb(
        &mut self,
        obj: Objid,
        names: Vec<Symbol>,
        owner: Objid,
        flags: BitEnum<VerbFlag>,
        args: VerbArgsSpec,
        source: String,
    ) -> Result<(), WorldStateError>;
    fn commit(self: Box<Self>) -> Result<(), WorldStateError>;
}
