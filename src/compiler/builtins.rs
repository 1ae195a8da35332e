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

//! Global registry of built-in function descriptors: name, arity, and
//! per-position argument types. Codegen resolves call sites against this
//! table; the dispatcher validates arguments against it before invoking the
//! implementation.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::var::{Symbol, VarType};
use ArgCount::{Q, U};
use ArgType::{Any, AnyNum, Typed};
use VarType::{TYPE_INT, TYPE_LIST, TYPE_OBJ, TYPE_STR};

lazy_static! {
    pub static ref BUILTINS: Builtins = Builtins::new();
}

pub enum ArgCount {
    /// Exactly this many.
    Q(usize),
    /// Unbounded.
    U,
}

pub enum ArgType {
    Typed(VarType),
    Any,
    AnyNum,
}

impl ArgType {
    pub fn accepts(&self, t: VarType) -> bool {
        match self {
            Typed(expected) => *expected == t,
            Any => true,
            AnyNum => t == VarType::TYPE_INT || t == VarType::TYPE_FLOAT,
        }
    }
}

pub struct Builtin {
    pub name: Symbol,
    pub min_args: ArgCount,
    pub max_args: ArgCount,
    pub types: Vec<ArgType>,
}

/// Index of a builtin in the descriptor table; burned into compiled
/// programs by codegen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BuiltinId(pub u16);

fn b(name: &str, min_args: ArgCount, max_args: ArgCount, types: Vec<ArgType>) -> Builtin {
    Builtin {
        name: Symbol::mk(name),
        min_args,
        max_args,
        types,
    }
}

fn mk_builtin_table() -> Vec<Builtin> {
    vec![
        // General.
        b("typeof", Q(1), Q(1), vec![Any]),
        b("tostr", Q(0), U, vec![]),
        b("toliteral", Q(1), Q(1), vec![Any]),
        b("toint", Q(1), Q(1), vec![Any]),
        b("tonum", Q(1), Q(1), vec![Any]),
        b("toobj", Q(1), Q(1), vec![Any]),
        b("tofloat", Q(1), Q(1), vec![Any]),
        b("equal", Q(2), Q(2), vec![Any, Any]),
        b("value_bytes", Q(1), Q(1), vec![Any]),
        b("value_hash", Q(1), Q(1), vec![Any]),
        b("raise", Q(1), Q(3), vec![Any, Typed(TYPE_STR), Any]),
        b("eval", Q(1), Q(1), vec![Typed(TYPE_STR)]),
        b("function_info", Q(0), Q(1), vec![Typed(TYPE_STR)]),
        // Numbers.
        b("random", Q(0), Q(1), vec![Typed(TYPE_INT)]),
        b("min", Q(1), U, vec![AnyNum]),
        b("max", Q(1), U, vec![AnyNum]),
        b("abs", Q(1), Q(1), vec![AnyNum]),
        b("floatstr", Q(2), Q(3), vec![Typed(VarType::TYPE_FLOAT), Typed(TYPE_INT), Any]),
        b("sqrt", Q(1), Q(1), vec![AnyNum]),
        b("sin", Q(1), Q(1), vec![AnyNum]),
        b("cos", Q(1), Q(1), vec![AnyNum]),
        b("tan", Q(1), Q(1), vec![AnyNum]),
        b("asin", Q(1), Q(1), vec![AnyNum]),
        b("acos", Q(1), Q(1), vec![AnyNum]),
        b("atan", Q(1), Q(2), vec![AnyNum, AnyNum]),
        b("sinh", Q(1), Q(1), vec![AnyNum]),
        b("cosh", Q(1), Q(1), vec![AnyNum]),
        b("tanh", Q(1), Q(1), vec![AnyNum]),
        b("exp", Q(1), Q(1), vec![AnyNum]),
        b("log", Q(1), Q(1), vec![AnyNum]),
        b("log10", Q(1), Q(1), vec![AnyNum]),
        b("ceil", Q(1), Q(1), vec![AnyNum]),
        b("floor", Q(1), Q(1), vec![AnyNum]),
        b("trunc", Q(1), Q(1), vec![AnyNum]),
        // Strings.
        b("length", Q(1), Q(1), vec![Any]),
        b("strsub", Q(3), Q(4), vec![Typed(TYPE_STR), Typed(TYPE_STR), Typed(TYPE_STR), Any]),
        b("index", Q(2), Q(3), vec![Typed(TYPE_STR), Typed(TYPE_STR), Any]),
        b("rindex", Q(2), Q(3), vec![Typed(TYPE_STR), Typed(TYPE_STR), Any]),
        b("strcmp", Q(2), Q(2), vec![Typed(TYPE_STR), Typed(TYPE_STR)]),
        b("decode_binary", Q(1), Q(2), vec![Typed(TYPE_STR), Any]),
        b("encode_binary", Q(0), U, vec![]),
        b("match", Q(2), Q(3), vec![Typed(TYPE_STR), Typed(TYPE_STR), Any]),
        b("rmatch", Q(2), Q(3), vec![Typed(TYPE_STR), Typed(TYPE_STR), Any]),
        b("substitute", Q(2), Q(2), vec![Typed(TYPE_STR), Typed(TYPE_LIST)]),
        b("crypt", Q(1), Q(2), vec![Typed(TYPE_STR), Typed(TYPE_STR)]),
        b("string_hash", Q(1), Q(1), vec![Typed(TYPE_STR)]),
        b("binary_hash", Q(1), Q(1), vec![Typed(TYPE_STR)]),
        // Lists.
        b("is_member", Q(2), Q(2), vec![Any, Typed(TYPE_LIST)]),
        b("listinsert", Q(2), Q(3), vec![Typed(TYPE_LIST), Any, Typed(TYPE_INT)]),
        b("listappend", Q(2), Q(3), vec![Typed(TYPE_LIST), Any, Typed(TYPE_INT)]),
        b("listdelete", Q(2), Q(2), vec![Typed(TYPE_LIST), Typed(TYPE_INT)]),
        b("listset", Q(3), Q(3), vec![Typed(TYPE_LIST), Any, Typed(TYPE_INT)]),
        b("setadd", Q(2), Q(2), vec![Typed(TYPE_LIST), Any]),
        b("setremove", Q(2), Q(2), vec![Typed(TYPE_LIST), Any]),
        // Objects.
        b("create", Q(1), Q(2), vec![Typed(TYPE_OBJ), Typed(TYPE_OBJ)]),
        b("recycle", Q(1), Q(1), vec![Typed(TYPE_OBJ)]),
        b("valid", Q(1), Q(1), vec![Typed(TYPE_OBJ)]),
        b("parent", Q(1), Q(1), vec![Typed(TYPE_OBJ)]),
        b("children", Q(1), Q(1), vec![Typed(TYPE_OBJ)]),
        b("chparent", Q(2), Q(2), vec![Typed(TYPE_OBJ), Typed(TYPE_OBJ)]),
        b("max_object", Q(0), Q(0), vec![]),
        b("players", Q(0), Q(0), vec![]),
        b("is_player", Q(1), Q(1), vec![Typed(TYPE_OBJ)]),
        b("set_player_flag", Q(2), Q(2), vec![Typed(TYPE_OBJ), Any]),
        b("move", Q(2), Q(2), vec![Typed(TYPE_OBJ), Typed(TYPE_OBJ)]),
        b("properties", Q(1), Q(1), vec![Typed(TYPE_OBJ)]),
        b("property_info", Q(2), Q(2), vec![Typed(TYPE_OBJ), Typed(TYPE_STR)]),
        b("set_property_info", Q(3), Q(3), vec![Typed(TYPE_OBJ), Typed(TYPE_STR), Typed(TYPE_LIST)]),
        b("add_property", Q(4), Q(4), vec![Typed(TYPE_OBJ), Typed(TYPE_STR), Any, Typed(TYPE_LIST)]),
        b("delete_property", Q(2), Q(2), vec![Typed(TYPE_OBJ), Typed(TYPE_STR)]),
        b("clear_property", Q(2), Q(2), vec![Typed(TYPE_OBJ), Typed(TYPE_STR)]),
        b("is_clear_property", Q(2), Q(2), vec![Typed(TYPE_OBJ), Typed(TYPE_STR)]),
        b("verbs", Q(1), Q(1), vec![Typed(TYPE_OBJ)]),
        b("verb_info", Q(2), Q(2), vec![Typed(TYPE_OBJ), Any]),
        b("set_verb_info", Q(3), Q(3), vec![Typed(TYPE_OBJ), Any, Typed(TYPE_LIST)]),
        b("verb_args", Q(2), Q(2), vec![Typed(TYPE_OBJ), Any]),
        b("set_verb_args", Q(3), Q(3), vec![Typed(TYPE_OBJ), Any, Typed(TYPE_LIST)]),
        b("verb_code", Q(2), Q(4), vec![Typed(TYPE_OBJ), Any, Any, Any]),
        b("set_verb_code", Q(3), Q(3), vec![Typed(TYPE_OBJ), Any, Typed(TYPE_LIST)]),
        b("add_verb", Q(3), Q(3), vec![Typed(TYPE_OBJ), Typed(TYPE_LIST), Typed(TYPE_LIST)]),
        b("delete_verb", Q(2), Q(2), vec![Typed(TYPE_OBJ), Any]),
        b("disassemble", Q(2), Q(2), vec![Typed(TYPE_OBJ), Any]),
        // Tasks.
        b("task_id", Q(0), Q(0), vec![]),
        b("queued_tasks", Q(0), Q(0), vec![]),
        b("queue_info", Q(0), Q(1), vec![Typed(TYPE_OBJ)]),
        b("kill_task", Q(1), Q(1), vec![Typed(TYPE_INT)]),
        b("resume", Q(1), Q(2), vec![Typed(TYPE_INT), Any]),
        b("suspend", Q(0), Q(1), vec![AnyNum]),
        b("read", Q(0), Q(1), vec![Typed(TYPE_OBJ)]),
        b("seconds_left", Q(0), Q(0), vec![]),
        b("ticks_left", Q(0), Q(0), vec![]),
        b("caller_perms", Q(0), Q(0), vec![]),
        b("set_task_perms", Q(1), Q(1), vec![Typed(TYPE_OBJ)]),
        b("callers", Q(0), Q(0), vec![]),
        // Network.
        b("notify", Q(2), Q(3), vec![Typed(TYPE_OBJ), Typed(TYPE_STR), Any]),
        b("connected_players", Q(0), Q(0), vec![]),
        b("connected_seconds", Q(1), Q(1), vec![Typed(TYPE_OBJ)]),
        b("idle_seconds", Q(1), Q(1), vec![Typed(TYPE_OBJ)]),
        b("boot_player", Q(1), Q(1), vec![Typed(TYPE_OBJ)]),
        b("connection_name", Q(1), Q(1), vec![Typed(TYPE_OBJ)]),
        b("connection_option", Q(2), Q(2), vec![Typed(TYPE_OBJ), Typed(TYPE_STR)]),
        b("set_connection_option", Q(3), Q(3), vec![Typed(TYPE_OBJ), Typed(TYPE_STR), Any]),
        b("listen", Q(2), Q(3), vec![Typed(TYPE_OBJ), Any, Any]),
        b("unlisten", Q(1), Q(1), vec![Any]),
        b("listeners", Q(0), Q(0), vec![]),
        b("open_network_connection", Q(0), U, vec![]),
        // Administration.
        b("time", Q(0), Q(0), vec![]),
        b("ctime", Q(0), Q(1), vec![Typed(TYPE_INT)]),
        b("dump_database", Q(0), Q(0), vec![]),
        b("shutdown", Q(0), Q(1), vec![Typed(TYPE_STR)]),
        b("load_server_options", Q(0), Q(0), vec![]),
        b("server_log", Q(1), Q(2), vec![Typed(TYPE_STR), Any]),
        b("renumber", Q(1), Q(1), vec![Typed(TYPE_OBJ)]),
        b("reset_max_object", Q(0), Q(0), vec![]),
        b("server_version", Q(0), Q(0), vec![]),
        b("memory_usage", Q(0), Q(0), vec![]),
        b("db_disk_size", Q(0), Q(0), vec![]),
        b("verb_cache_stats", Q(0), Q(0), vec![]),
        b("log_cache_stats", Q(0), Q(0), vec![]),
    ]
}

pub struct Builtins {
    pub descriptors: Vec<Builtin>,
    names_to_ids: HashMap<Symbol, BuiltinId>,
}

impl Builtins {
    fn new() -> Self {
        let descriptors = mk_builtin_table();
        let names_to_ids = descriptors
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.clone(), BuiltinId(i as u16)))
            .collect();
        Self {
            descriptors,
            names_to_ids,
        }
    }

    pub fn find_builtin(&self, name: &Symbol) -> Option<BuiltinId> {
        self.names_to_ids.get(name).copied()
    }

    pub fn description_for(&self, id: BuiltinId) -> Option<&Builtin> {
        self.descriptors.get(id.0 as usize)
    }

    pub fn number_of(&self) -> usize {
        self.descriptors.len()
    }
}

/// The table offset for a named builtin; panics on unknown names, which is a
/// bug in the registration code, not a user error.
pub fn offset_for_builtin(name: &str) -> usize {
    BUILTINS
        .find_builtin(&Symbol::mk(name))
        .unwrap_or_else(|| panic!("unknown builtin: {}", name))
        .0 as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_case_folded() {
        assert!(BUILTINS.find_builtin(&Symbol::mk("TOSTR")).is_some());
        assert_eq!(
            BUILTINS.find_builtin(&Symbol::mk("tostr")),
            BUILTINS.find_builtin(&Symbol::mk("ToStr"))
        );
        assert!(BUILTINS.find_builtin(&Symbol::mk("no_such_bf")).is_none());
    }

    #[test]
    fn test_descriptor_round_trip() {
        let id = BUILTINS.find_builtin(&Symbol::mk("suspend")).unwrap();
        let desc = BUILTINS.description_for(id).unwrap();
        assert_eq!(desc.name, Symbol::mk("suspend"));
        assert!(matches!(desc.min_args, Q(0)));
        assert!(matches!(desc.max_args, Q(1)));
    }

    #[test]
    fn test_arg_type_accepts() {
        assert!(AnyNum.accepts(VarType::TYPE_INT));
        assert!(AnyNum.accepts(VarType::TYPE_FLOAT));
        assert!(!AnyNum.accepts(VarType::TYPE_STR));
        assert!(Any.accepts(VarType::TYPE_LIST));
        assert!(Typed(TYPE_OBJ).accepts(VarType::TYPE_OBJ));
        assert!(!Typed(TYPE_OBJ).accepts(VarType::TYPE_INT));
    }
}
