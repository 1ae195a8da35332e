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

use strum::{Display, EnumCount, EnumIter, IntoEnumIterator};

use crate::var::Symbol;

/// The variables every verb program has bound on entry, at fixed offsets.
/// The type-code names are ordinary (shadowable) variables preloaded with
/// their `typeof` codes, as in LambdaMOO.
#[repr(usize)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, EnumCount, Display)]
#[allow(non_camel_case_types)]
pub enum GlobalName {
    NUM,
    OBJ,
    STR,
    LIST,
    ERR,
    INT,
    FLOAT,
    player,
    this,
    caller,
    verb,
    args,
    argstr,
    dobj,
    dobjstr,
    prepstr,
    iobj,
    iobjstr,
}

/// A Name is a variable's slot in the program's environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(pub u16);

/// The variable-name table of a compiled program. Global names occupy the
/// first slots of every table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Names {
    pub names: Vec<Symbol>,
}

impl Names {
    pub fn new() -> Self {
        let mut names = Self { names: vec![] };
        for global in GlobalName::iter() {
            names.find_or_add_name(&global.to_string());
        }
        names
    }

    pub fn find_or_add_name(&mut self, name: &str) -> Name {
        let sym = Symbol::mk(name);
        match self.names.iter().position(|n| *n == sym) {
            None => {
                let pos = self.names.len();
                self.names.push(sym);
                Name(pos as u16)
            }
            Some(n) => Name(n as u16),
        }
    }

    pub fn find_name(&self, name: &str) -> Option<Name> {
        let sym = Symbol::mk(name);
        self.names.iter().position(|n| *n == sym).map(|p| Name(p as u16))
    }

    pub fn width(&self) -> usize {
        self.names.len()
    }

    pub fn name_of(&self, name: &Name) -> Option<Symbol> {
        self.names.get(name.0 as usize).cloned()
    }
}

impl Default for Names {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_globals_preloaded() {
        let names = Names::new();
        assert!(names.find_name("player").is_some());
        assert!(names.find_name("ARGS").is_some());
        assert!(names.find_name("INT").is_some());
        assert_eq!(names.width(), GlobalName::COUNT);
    }

    #[test]
    fn test_find_or_add_case_insensitive() {
        let mut names = Names::new();
        let a = names.find_or_add_name("Foo");
        let b = names.find_or_add_name("foo");
        assert_eq!(a, b);
        assert_eq!(names.name_of(&a).unwrap().to_string(), "Foo");
    }

    #[test]
    fn test_global_name_offsets_stable() {
        // GlobalName discriminants are the fixed environment offsets.
        assert_eq!(GlobalName::player as usize, 7);
        let names = Names::new();
        assert_eq!(
            names.find_name("this").unwrap().0 as usize,
            GlobalName::this as usize
        );
    }
}
