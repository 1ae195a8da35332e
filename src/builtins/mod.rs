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

//! The built-in function surface: one `bf_*` module per group, registered
//! into a table indexed by descriptor offset.

mod bf_list_sets;
mod bf_num;
mod bf_objects;
mod bf_properties;
mod bf_server;
mod bf_strings;
mod bf_values;
mod bf_verbs;

use std::sync::Arc;

use crate::compiler::builtins::ArgCount;
use crate::compiler::{BuiltinId, BUILTINS};
use crate::config::Config;
use crate::model::{Perms, WorldState, WorldStateError};
use crate::tasks::scheduler_client::TaskSchedulerClient;
use crate::tasks::sessions::Session;
use crate::var::{Error, Objid, Symbol, Var};
use crate::vm::{ExecutionResult, VMExecState};

/// Everything a built-in function gets to see: its arguments, the VM state
/// (for stack inspection and trampolines), the current transaction, the
/// session, and a handle to the scheduler.
pub struct BfCallState<'a> {
    pub name: Symbol,
    pub args: Vec<Var>,
    pub exec_state: &'a mut VMExecState,
    pub world_state: &'a mut dyn WorldState,
    pub session: Arc<dyn Session>,
    pub task_scheduler_client: TaskSchedulerClient,
    pub config: Arc<std::sync::RwLock<Config>>,
}

impl BfCallState<'_> {
    pub fn caller_perms(&self) -> Objid {
        self.exec_state.caller_perms()
    }

    /// This builtin call's own frame, for trampoline bookkeeping.
    pub fn bf_frame(&self) -> &crate::vm::activation::BfFrame {
        match &self.exec_state.top().frame {
            crate::vm::activation::Frame::Bf(frame) => frame,
            _ => panic!("builtin running without a builtin frame"),
        }
    }

    pub fn bf_frame_mut(&mut self) -> &mut crate::vm::activation::BfFrame {
        match &mut self.exec_state.top_mut().frame {
            crate::vm::activation::Frame::Bf(frame) => frame,
            _ => panic!("builtin running without a builtin frame"),
        }
    }

    pub fn task_perms_who(&self) -> Objid {
        self.exec_state.task_perms()
    }

    pub fn task_perms(&self) -> Result<Perms, WorldStateError> {
        let who = self.task_perms_who();
        let flags = self.world_state.flags_of(who).unwrap_or_default();
        Ok(Perms::new(who, flags))
    }
}

/// Successful return from a builtin.
pub enum BfRet {
    /// A value, pushed as the call's result.
    Ret(Var),
    /// Control instruction back to the VM: suspend, fork, verb dispatch...
    VmInstr(ExecutionResult),
}

/// Failure from a builtin.
#[derive(Debug)]
pub enum BfErr {
    Code(Error),
    /// `raise()`-style, with message and value.
    Raise(Error, Option<String>, Option<Var>),
    /// The transaction hit a conflict mid-operation.
    Rollback,
}

pub fn world_state_bf_err(err: WorldStateError) -> BfErr {
    match err {
        WorldStateError::RollbackRetry => BfErr::Rollback,
        e => BfErr::Code(e.to_error_code()),
    }
}

pub trait BuiltinFunction: Sync + Send {
    fn name(&self) -> &str;
    fn call(&self, bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr>;
}

/// Declare a struct wrapper for a builtin function implementation.
#[macro_export]
macro_rules! bf_declare {
    ( $name:ident, $action:expr ) => {
        paste::paste! {
            pub struct [<Bf $name:camel >] {}
            impl $crate::builtins::BuiltinFunction for [<Bf $name:camel >] {
                fn name(&self) -> &str {
                    stringify!($name)
                }
                fn call(
                    &self,
                    bf_args: &mut $crate::builtins::BfCallState<'_>
                ) -> Result<$crate::builtins::BfRet, $crate::builtins::BfErr> {
                    $action(bf_args)
                }
            }
        }
    };
}

struct BfNoop {}

impl BuiltinFunction for BfNoop {
    fn name(&self) -> &str {
        "noop"
    }
    fn call(&self, bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
        tracing::error!("builtin {} is not implemented", bf_args.name);
        Err(BfErr::Raise(
            Error::E_INVARG,
            Some(format!("Builtin {} is not implemented", bf_args.name)),
            Some(Var::Str(crate::var::Str::mk_str(bf_args.name.as_str()))),
        ))
    }
}

/// All builtin implementations, indexed by their descriptor offsets.
pub struct BuiltinRegistry {
    builtins: Vec<Arc<dyn BuiltinFunction>>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        let mut builtins: Vec<Arc<dyn BuiltinFunction>> = Vec::new();
        for _ in 0..BUILTINS.number_of() {
            builtins.push(Arc::new(BfNoop {}));
        }
        bf_values::register_bf_values(&mut builtins);
        bf_num::register_bf_num(&mut builtins);
        bf_strings::register_bf_strings(&mut builtins);
        bf_list_sets::register_bf_list_sets(&mut builtins);
        bf_objects::register_bf_objects(&mut builtins);
        bf_properties::register_bf_properties(&mut builtins);
        bf_verbs::register_bf_verbs(&mut builtins);
        bf_server::register_bf_server(&mut builtins);
        Self { builtins }
    }

    pub fn builtin_for(&self, id: &BuiltinId) -> Arc<dyn BuiltinFunction> {
        self.builtins[id.0 as usize].clone()
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Pre-call validation against the descriptor table: argument count, then
/// per-position types.
pub fn validate_bf_args(id: BuiltinId, args: &[Var]) -> Result<(), Error> {
    let Some(desc) = BUILTINS.description_for(id) else {
        return Err(Error::E_INVARG);
    };
    if let ArgCount::Q(min) = desc.min_args {
        if args.len() < min {
            return Err(Error::E_ARGS);
        }
    }
    if let ArgCount::Q(max) = desc.max_args {
        if args.len() > max {
            return Err(Error::E_ARGS);
        }
    }
    for (arg, expected) in args.iter().zip(desc.types.iter()) {
        if !expected.accepts(arg.type_code()) {
            return Err(Error::E_TYPE);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::offset_for_builtin;
    use crate::var::{v_int, v_str};

    #[test]
    fn test_registry_covers_table() {
        let registry = BuiltinRegistry::new();
        assert_eq!(registry.builtins.len(), BUILTINS.number_of());
        // Spot-check that real implementations got registered.
        let id = BuiltinId(offset_for_builtin("tostr") as u16);
        assert_eq!(registry.builtin_for(&id).name(), "tostr");
    }

    #[test]
    fn test_validate_args_count() {
        let id = BuiltinId(offset_for_builtin("typeof") as u16);
        assert_eq!(validate_bf_args(id, &[]), Err(Error::E_ARGS));
        assert_eq!(validate_bf_args(id, &[v_int(1)]), Ok(()));
        assert_eq!(validate_bf_args(id, &[v_int(1), v_int(2)]), Err(Error::E_ARGS));
    }

    #[test]
    fn test_validate_args_types() {
        let id = BuiltinId(offset_for_builtin("strsub") as u16);
        assert_eq!(
            validate_bf_args(id, &[v_str("a"), v_str("b"), v_str("c")]),
            Ok(())
        );
        assert_eq!(
            validate_bf_args(id, &[v_str("a"), v_int(2), v_str("c")]),
            Err(Error::E_TYPE)
        );
    }
}
