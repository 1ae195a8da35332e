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

use crate::matching::Preposition;
use crate::var::{Objid, NOTHING};

/// The direct/indirect object slot of a verb's argument specification.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArgSpec {
    None,
    Any,
    This,
}

impl ArgSpec {
    pub fn to_string(&self) -> &'static str {
        match self {
            ArgSpec::None => "none",
            ArgSpec::Any => "any",
            ArgSpec::This => "this",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(ArgSpec::None),
            "any" => Some(ArgSpec::Any),
            "this" => Some(ArgSpec::This),
            _ => None,
        }
    }

    /// Whether a resolved command object satisfies this slot.
    pub fn matches(&self, this: Objid, candidate: Objid) -> bool {
        match self {
            ArgSpec::None => candidate == NOTHING,
            ArgSpec::Any => true,
            ArgSpec::This => candidate == this,
        }
    }
}

/// The preposition slot of a verb's argument specification.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PrepSpec {
    Any,
    None,
    Other(Preposition),
}

impl PrepSpec {
    pub fn matches(&self, parsed: &PrepSpec) -> bool {
        match self {
            PrepSpec::Any => true,
            spec => spec == parsed,
        }
    }

    pub fn to_string(&self) -> String {
        match self {
            PrepSpec::Any => "any".to_string(),
            PrepSpec::None => "none".to_string(),
            PrepSpec::Other(p) => p.to_string_full().to_string(),
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "any" => Some(PrepSpec::Any),
            "none" => Some(PrepSpec::None),
            s => Preposition::parse(s).map(PrepSpec::Other),
        }
    }
}

/// The full (dobj, prep, iobj) argument specification of a verb.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VerbArgsSpec {
    pub dobj: ArgSpec,
    pub prep: PrepSpec,
    pub iobj: ArgSpec,
}

impl VerbArgsSpec {
    /// The specification of a non-command "method" verb: this none this.
    pub fn this_none_this() -> Self {
        VerbArgsSpec {
            dobj: ArgSpec::This,
            prep: PrepSpec::None,
            iobj: ArgSpec::This,
        }
    }

    /// The wide-open specification used by `add_verb` defaults.
    pub fn any_any_any() -> Self {
        VerbArgsSpec {
            dobj: ArgSpec::Any,
            prep: PrepSpec::Any,
            iobj: ArgSpec::Any,
        }
    }

    pub fn matches(&self, this: Objid, dobj: Objid, prep: &PrepSpec, iobj: Objid) -> bool {
        self.dobj.matches(this, dobj) && self.prep.matches(prep) && self.iobj.matches(this, iobj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argspec_matching() {
        let this = Objid(5);
        assert!(ArgSpec::This.matches(this, this));
        assert!(!ArgSpec::This.matches(this, Objid(6)));
        assert!(ArgSpec::None.matches(this, NOTHING));
        assert!(ArgSpec::Any.matches(this, Objid(42)));
    }

    #[test]
    fn test_spec_round_trip() {
        assert_eq!(ArgSpec::from_string("This"), Some(ArgSpec::This));
        assert_eq!(PrepSpec::from_string("none"), Some(PrepSpec::None));
        let with = PrepSpec::from_string("with").unwrap();
        assert!(matches!(with, PrepSpec::Other(_)));
        assert!(PrepSpec::Any.matches(&with));
        assert!(!PrepSpec::None.matches(&with));
    }
}
