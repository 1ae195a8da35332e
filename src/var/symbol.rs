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
use std::hash::{Hash, Hasher};

use arcstr::ArcStr;

/// An identifier: verb names, property names, builtin names, variable names.
/// Compared and hashed case-insensitively, but the original casing is kept
/// for display.
#[derive(Clone, Debug)]
pub struct Symbol(ArcStr);

impl Symbol {
    pub fn mk(s: &str) -> Self {
        Symbol(ArcStr::from(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
            || self.0.to_lowercase() == other.0.to_lowercase()
    }
}

impl Eq for Symbol {}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .chars()
            .flat_map(char::to_lowercase)
            .cmp(other.0.chars().flat_map(char::to_lowercase))
    }
}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for c in self.0.chars().flat_map(char::to_lowercase) {
            c.hash(state);
        }
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol::mk(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Symbol(ArcStr::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_case_insensitive_eq() {
        assert_eq!(Symbol::mk("Frobnicate"), Symbol::mk("frobnicate"));
        assert_eq!(Symbol::mk("TELL"), Symbol::mk("tell"));
        assert_ne!(Symbol::mk("tell"), Symbol::mk("tells"));
    }

    #[test]
    fn test_casing_preserved() {
        assert_eq!(Symbol::mk("LookAt").to_string(), "LookAt");
    }

    #[test]
    fn test_hash_folds_case() {
        let mut m = HashMap::new();
        m.insert(Symbol::mk("Description"), 1);
        assert_eq!(m.get(&Symbol::mk("description")), Some(&1));
    }
}
