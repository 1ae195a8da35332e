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

use crate::model::{WorldState, WorldStateError};
use crate::var::{Objid, Symbol, Var, AMBIGUOUS, FAILED_MATCH, NOTHING};

/// Resolves an object-name word from a command against some environment.
pub trait ObjectNameMatcher {
    /// `NOTHING` for an empty string, `FAILED_MATCH`/`AMBIGUOUS` sentinels
    /// for failed or plural matches.
    fn match_object(&self, name: &str) -> Result<Objid, WorldStateError>;
}

/// The standard environment: the player, the player's location, and the
/// contents of both, by name or alias; `me`, `here`, and `#N` literals.
pub struct WsMatchEnv<'a> {
    pub ws: &'a dyn WorldState,
    pub perms: Objid,
    pub player: Objid,
}

impl WsMatchEnv<'_> {
    fn names_of(&self, obj: Objid) -> Result<Vec<String>, WorldStateError> {
        let mut names = vec![self.ws.names_of(self.perms, obj)?];
        // The conventional `aliases' property, when it holds a list.
        if let Ok(Var::List(aliases)) =
            self.ws.retrieve_property(self.perms, obj, Symbol::mk("aliases"))
        {
            for alias in aliases.iter() {
                if let Var::Str(s) = alias {
                    names.push(s.as_str().to_string());
                }
            }
        }
        Ok(names)
    }
}

impl ObjectNameMatcher for WsMatchEnv<'_> {
    fn match_object(&self, name: &str) -> Result<Objid, WorldStateError> {
        if name.is_empty() {
            return Ok(NOTHING);
        }
        if let Some(rest) = name.strip_prefix('#') {
            if let Ok(n) = rest.parse::<i64>() {
                let oid = Objid(n);
                if self.ws.valid(oid)? {
                    return Ok(oid);
                }
                return Ok(FAILED_MATCH);
            }
        }
        let lowered = name.to_lowercase();
        if lowered == "me" {
            return Ok(self.player);
        }
        let location = self.ws.location_of(self.perms, self.player).unwrap_or(NOTHING);
        if lowered == "here" {
            return Ok(location);
        }

        let mut candidates = vec![];
        if location != NOTHING {
            candidates.extend(self.ws.contents_of(self.perms, location)?);
        }
        candidates.extend(self.ws.contents_of(self.perms, self.player)?);

        let mut exact = NOTHING;
        let mut partial = NOTHING;
        let mut partial_count = 0;
        for candidate in candidates {
            for cname in self.names_of(candidate)? {
                let cname = cname.to_lowercase();
                if cname == lowered {
                    exact = candidate;
                } else if cname.starts_with(&lowered) {
                    partial = candidate;
                    partial_count += 1;
                }
            }
        }
        if exact != NOTHING {
            return Ok(exact);
        }
        match partial_count {
            0 => Ok(FAILED_MATCH),
            1 => Ok(partial),
            _ => Ok(AMBIGUOUS),
        }
    }
}
