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

/// A Label is a unique identifier for a jump position in a compiled program.
/// At runtime it resolves to a program offset through the program's jump
/// table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(pub u16);

impl From<usize> for Label {
    fn from(value: usize) -> Self {
        Label(value as u16)
    }
}

/// A program offset: an absolute position in an opcode vector, or an index
/// into the fork-vector table, or a saved stack position. Context decides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Offset(pub u16);

impl From<usize> for Offset {
    fn from(value: usize) -> Self {
        Offset(value as u16)
    }
}

/// A jump label's committed position in the opcode vector, with the optional
/// loop name it carries for labelled break/continue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JumpLabel {
    pub id: Label,
    pub name: Option<super::names::Name>,
    pub position: Offset,
}
