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

use crate::bit_flag;
use crate::util::BitEnum;
use crate::var::{Objid, Symbol, Var};

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PropFlag {
    Read = 0,
    Write = 1,
    Chown = 2,
}
bit_flag!(PropFlag);

/// A property definition: lives on the object that defined the property,
/// visible on every descendant.
#[derive(Clone, Debug, PartialEq)]
pub struct PropDef {
    /// The object the property was defined on.
    pub definer: Objid,
    pub name: Symbol,
}

/// The ownership and permission bits of a property value on one object.
#[derive(Clone, Debug, PartialEq)]
pub struct PropPerms {
    pub owner: Objid,
    pub flags: BitEnum<PropFlag>,
}

impl PropPerms {
    pub fn new(owner: Objid, flags: BitEnum<PropFlag>) -> Self {
        Self { owner, flags }
    }

    /// Render as the "rwc" string used by `property_info`.
    pub fn perms_string(&self) -> String {
        let mut s = String::new();
        if self.flags.contains(PropFlag::Read) {
            s.push('r');
        }
        if self.flags.contains(PropFlag::Write) {
            s.push('w');
        }
        if self.flags.contains(PropFlag::Chown) {
            s.push('c');
        }
        s
    }

    /// Parse an "rwc" string, rejecting unknown characters.
    pub fn parse_perms_string(s: &str) -> Option<BitEnum<PropFlag>> {
        let mut flags = BitEnum::new();
        for c in s.chars() {
            match c.to_ascii_lowercase() {
                'r' => flags.set(PropFlag::Read),
                'w' => flags.set(PropFlag::Write),
                'c' => flags.set(PropFlag::Chown),
                _ => return None,
            }
        }
        Some(flags)
    }
}

/// Attribute updates for `set_property_info`.
#[derive(Clone, Debug, Default)]
pub struct PropAttrs {
    pub owner: Option<Objid>,
    pub flags: Option<BitEnum<PropFlag>>,
    pub new_name: Option<Symbol>,
    pub value: Option<Var>,
}
