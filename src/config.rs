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

use crate::model::WorldState;
use crate::var::{Symbol, Var, SYSTEM_OBJECT};

pub const DEFAULT_FG_TICKS: usize = 60_000;
pub const DEFAULT_BG_TICKS: usize = 30_000;
pub const DEFAULT_FG_SECONDS: u64 = 5;
pub const DEFAULT_BG_SECONDS: u64 = 3;
pub const DEFAULT_MAX_STACK_DEPTH: usize = 50;

/// Server limits and options. The scheduler reads a stable snapshot of this
/// between `load_server_options` calls; `$server_options` properties
/// override the defaults.
#[derive(Clone, Debug)]
pub struct Config {
    pub fg_ticks: usize,
    pub bg_ticks: usize,
    pub fg_seconds: u64,
    pub bg_seconds: u64,
    pub max_stack_depth: usize,
    pub port: u16,
    pub checkpoint_interval_seconds: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fg_ticks: DEFAULT_FG_TICKS,
            bg_ticks: DEFAULT_BG_TICKS,
            fg_seconds: DEFAULT_FG_SECONDS,
            bg_seconds: DEFAULT_BG_SECONDS,
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            port: 7777,
            checkpoint_interval_seconds: None,
        }
    }
}

impl Config {
    /// Refresh limit options from `$server_options`, leaving defaults in
    /// place for anything unset. This is the `load_server_options` builtin's
    /// worker; reads run under the caller's (wizardly) permissions.
    pub fn load_server_options(&mut self, ws: &dyn WorldState, perms: crate::var::Objid) {
        let Ok(Var::Obj(opts)) =
            ws.retrieve_property(perms, SYSTEM_OBJECT, Symbol::mk("server_options"))
        else {
            return;
        };
        let read_int = |name: &str| -> Option<i64> {
            match ws.retrieve_property(perms, opts, Symbol::mk(name)) {
                Ok(Var::Int(i)) if i > 0 => Some(i),
                _ => None,
            }
        };
        if let Some(v) = read_int("fg_ticks") {
            self.fg_ticks = v as usize;
        }
        if let Some(v) = read_int("bg_ticks") {
            self.bg_ticks = v as usize;
        }
        if let Some(v) = read_int("fg_seconds") {
            self.fg_seconds = v as u64;
        }
        if let Some(v) = read_int("bg_seconds") {
            self.bg_seconds = v as u64;
        }
        if let Some(v) = read_int("max_stack_depth") {
            self.max_stack_depth = v as usize;
        }
    }
}
