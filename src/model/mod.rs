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

//! Metadata model for the object database: flags, attribute records,
//! argument specifications, permissions, and the `WorldState` trait through
//! which all verb code sees the shared world.

pub mod r#match;
pub mod objects;
pub mod permissions;
pub mod props;
pub mod verbs;
pub mod world_state;

pub use objects::{ObjAttrs, ObjFlag};
pub use permissions::Perms;
pub use props::{PropAttrs, PropDef, PropFlag, PropPerms};
pub use r#match::{ArgSpec, PrepSpec, VerbArgsSpec};
pub use verbs::{VerbAttrs, VerbDef, VerbFlag};
pub use world_state::{
    CommitResult, LoaderInterface, WorldState, WorldStateError, WorldStateSource,
};
