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

use std::collections::HashMap;

use uuid::Uuid;

use crate::compiler::Program;
use crate::model::props::{PropDef, PropPerms};
use crate::model::{ObjFlag, VerbDef};
use crate::util::BitEnum;
use crate::var::{Objid, Symbol, Var, NOTHING};

/// A property's slot on one object: the local value (`None` = clear,
/// inheriting from up the chain) and its per-object ownership bits.
#[derive(Clone, Debug)]
pub struct PropValue {
    pub value: Option<Var>,
    pub perms: PropPerms,
}

/// One object: attributes, relationship links, property definitions and
/// values, verbs with their compiled programs.
#[derive(Clone, Debug)]
pub struct ObjectRecord {
    pub parent: Objid,
    pub children: Vec<Objid>,
    pub owner: Objid,
    pub name: String,
    pub flags: BitEnum<ObjFlag>,
    pub location: Objid,
    pub contents: Vec<Objid>,
    /// Properties defined on this object.
    pub propdefs: Vec<PropDef>,
    /// Local property values, for defined and overridden properties alike.
    pub propvalues: HashMap<Symbol, PropValue>,
    pub verbdefs: Vec<VerbDef>,
    /// Source and compiled program per verb uuid.
    pub verb_programs: HashMap<Uuid, (String, Program)>,
}

impl ObjectRecord {
    pub fn new(parent: Objid, owner: Objid, name: &str, flags: BitEnum<ObjFlag>) -> Self {
        Self {
            parent,
            children: vec![],
            owner,
            name: name.to_string(),
            flags,
            location: NOTHING,
            contents: vec![],
            propdefs: vec![],
            propvalues: HashMap::new(),
            verbdefs: vec![],
            verb_programs: HashMap::new(),
        }
    }

    pub fn has_propdef(&self, name: &Symbol) -> bool {
        self.propdefs.iter().any(|pd| &pd.name == name)
    }

    /// Rough byte accounting for `object_bytes` and `db_usage`.
    pub fn bytes(&self) -> usize {
        let mut total = std::mem::size_of::<Self>();
        total += self.name.len();
        total += (self.children.len() + self.contents.len()) * std::mem::size_of::<Objid>();
        for pv in self.propvalues.values() {
            total += pv.value.as_ref().map_or(0, |v| v.value_bytes());
        }
        for (source, _) in self.verb_programs.values() {
            total += source.len() * 2;
        }
        total
    }
}
