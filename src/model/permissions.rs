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

use crate::model::objects::ObjFlag;
use crate::model::world_state::WorldStateError;
use crate::util::BitEnum;
use crate::var::Objid;

/// A permissions context: the object on whose behalf an operation runs,
/// along with its flags at snapshot time.
#[derive(Clone, Debug)]
pub struct Perms {
    pub who: Objid,
    pub flags: BitEnum<ObjFlag>,
}

impl Perms {
    pub fn new(who: Objid, flags: BitEnum<ObjFlag>) -> Self {
        Self { who, flags }
    }

    pub fn is_wizard(&self) -> bool {
        self.flags.contains(ObjFlag::Wizard)
    }

    /// A wizard's programmer bit is implied.
    pub fn is_programmer(&self) -> bool {
        self.flags.contains(ObjFlag::Programmer) || self.is_wizard()
    }

    pub fn check_wizard(&self) -> Result<(), WorldStateError> {
        if self.is_wizard() {
            Ok(())
        } else {
            Err(WorldStateError::ObjectPermissionDenied)
        }
    }

    pub fn check_programmer(&self) -> Result<(), WorldStateError> {
        if self.is_programmer() {
            Ok(())
        } else {
            Err(WorldStateError::ObjectPermissionDenied)
        }
    }

    /// Wizards control everything; otherwise one controls what one owns.
    pub fn check_owns(&self, owner: Objid) -> Result<(), WorldStateError> {
        if self.is_wizard() || self.who == owner {
            Ok(())
        } else {
            Err(WorldStateError::ObjectPermissionDenied)
        }
    }
}
