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

use uuid::Uuid;

use crate::bit_flag;
use crate::model::r#match::VerbArgsSpec;
use crate::util::BitEnum;
use crate::util::verbname_cmp;
use crate::var::{Objid, Symbol};

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VerbFlag {
    Read = 0,
    Write = 1,
    Exec = 2,
    Debug = 3,
}
bit_flag!(VerbFlag);

impl VerbFlag {
    pub fn rwxd() -> BitEnum<VerbFlag> {
        BitEnum::new_with(Self::Read) | Self::Write | Self::Exec | Self::Debug
    }

    pub fn rxd() -> BitEnum<VerbFlag> {
        BitEnum::new_with(Self::Read) | Self::Exec | Self::Debug
    }
}

/// The definition of one verb on one object: names, ownership, permission
/// bits, and the command-argument specification. The program itself is kept
/// separately, keyed by the verb's uuid.
#[derive(Clone, Debug)]
pub struct VerbDef {
    pub uuid: Uuid,
    /// Where the verb is defined (not necessarily `this` at call time).
    pub location: Objid,
    pub owner: Objid,
    /// Space-separated alias names, `*` wildcards allowed.
    pub names: Vec<Symbol>,
    pub flags: BitEnum<VerbFlag>,
    pub args: VerbArgsSpec,
}

impl VerbDef {
    /// Does any of this verb's names match the given word, under the
    /// wildcard rule?
    pub fn matches_name(&self, name: &str) -> bool {
        self.names
            .iter()
            .any(|n| verbname_cmp(n.as_str(), name))
    }

    pub fn names_string(&self) -> String {
        self.names
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Render as the "rwxd" string used by `verb_info`.
    pub fn perms_string(&self) -> String {
        let mut s = String::new();
        if self.flags.contains(VerbFlag::Read) {
            s.push('r');
        }
        if self.flags.contains(VerbFlag::Write) {
            s.push('w');
        }
        if self.flags.contains(VerbFlag::Exec) {
            s.push('x');
        }
        if self.flags.contains(VerbFlag::Debug) {
            s.push('d');
        }
        s
    }

    pub fn parse_perms_string(s: &str) -> Option<BitEnum<VerbFlag>> {
        let mut flags = BitEnum::new();
        for c in s.chars() {
            match c.to_ascii_lowercase() {
                'r' => flags.set(VerbFlag::Read),
                'w' => flags.set(VerbFlag::Write),
                'x' => flags.set(VerbFlag::Exec),
                'd' => flags.set(VerbFlag::Debug),
                _ => return None,
            }
        }
        Some(flags)
    }
}

/// Attribute updates for `set_verb_info` / `set_verb_args` / `set_verb_code`.
#[derive(Clone, Debug, Default)]
pub struct VerbAttrs {
    pub owner: Option<Objid>,
    pub names: Option<Vec<Symbol>>,
    pub flags: Option<BitEnum<VerbFlag>>,
    pub args: Option<VerbArgsSpec>,
    /// New program source, to be compiled by the caller.
    pub source: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vd(names: &[&str]) -> VerbDef {
        VerbDef {
            uuid: Uuid::new_v4(),
            location: Objid(1),
            owner: Objid(1),
            names: names.iter().map(|n| Symbol::mk(n)).collect(),
            flags: VerbFlag::rxd(),
            args: VerbArgsSpec::this_none_this(),
        }
    }

    #[test]
    fn test_matches_name_aliases() {
        let v = vd(&["get", "take"]);
        assert!(v.matches_name("get"));
        assert!(v.matches_name("TAKE"));
        assert!(!v.matches_name("drop"));
    }

    #[test]
    fn test_matches_name_wildcard() {
        let v = vd(&["desc*ription"]);
        assert!(v.matches_name("desc"));
        assert!(v.matches_name("descr"));
        assert!(v.matches_name("description"));
        assert!(!v.matches_name("des"));
    }

    #[test]
    fn test_perms_string_round_trip() {
        let v = vd(&["x"]);
        assert_eq!(v.perms_string(), "rxd");
        assert_eq!(VerbDef::parse_perms_string("rxd"), Some(v.flags));
        assert_eq!(VerbDef::parse_perms_string("rq"), None);
    }
}
