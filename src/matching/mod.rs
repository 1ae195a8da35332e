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

//! Command-line parsing and object name matching.

mod command_parse;
mod match_env;
mod prepositions;

pub use command_parse::{parse_command, ParseCommandError, ParsedCommand};
pub use match_env::{ObjectNameMatcher, WsMatchEnv};
pub use prepositions::{find_preposition, Preposition};
