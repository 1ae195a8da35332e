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

use std::fmt::{Display, Formatter};

/// An object number. Negative numbers are special sentinels; real objects are
/// numbered from 0.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Objid(pub i64);

/// The "nothing" object, `#-1`.
pub const NOTHING: Objid = Objid(-1);
/// Returned by object matching when more than one object matched, `#-2`.
pub const AMBIGUOUS: Objid = Objid(-2);
/// Returned by object matching when nothing matched, `#-3`.
pub const FAILED_MATCH: Objid = Objid(-3);
/// The system object, `#0`, the root of `$name` references.
pub const SYSTEM_OBJECT: Objid = Objid(0);

impl Objid {
    pub fn is_nothing(&self) -> bool {
        *self == NOTHING
    }

    /// Whether this number could name a real object at all.
    pub fn is_positive(&self) -> bool {
        self.0 >= 0
    }
}

impl Display for Objid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
