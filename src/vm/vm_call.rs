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

use std::sync::Arc;

use crate::builtins::{validate_bf_args, BfCallState, BfErr, BfRet, BuiltinRegistry};
use crate::compiler::BuiltinId;
use crate::config::Config;
use crate::model::{WorldState, WorldStateError};
use crate::tasks::scheduler_client::TaskSchedulerClient;
use crate::tasks::sessions::Session;
use crate::var::Error::{E_INVIND, E_PERM, E_VERBNF};
use crate::var::{List, Objid, Symbol, Var};
use crate::vm::activation::{Activation, Frame};
use crate::vm::vm_unwind::FinallyReason;
use crate::vm::{ExecutionResult, Fork, VMExecState};

/// The parameters of a verb invocation, resolved or about to be.
#[derive(Debug, Clone)]
pub struct VerbCall {
    pub verb_name: Symbol,
    pub location: Objid,
    pub this: Objid,
    pub player: Objid,
    pub args: List,
    pub argstr: String,
    pub caller: Objid,
}

/// Ambient parameters for a task's VM execution.
pub struct VmExecParams {
    pub builtin_registry: Arc<BuiltinRegistry>,
    pub task_scheduler_client: TaskSchedulerClient,
    pub config: Arc<std::sync::RwLock<Config>>,
    pub max_stack_depth: usize,
}

impl VMExecState {
    /// `obj:verb(args)` from the CallVerb opcode: resolve and request the
    /// dispatch.
    pub(crate) fn prepare_call_verb(
        &mut self,
        world_state: &mut dyn WorldState,
        this: Objid,
        verb_name: Symbol,
        args: List,
    ) -> ExecutionResult {
        let call = VerbCall {
            verb_name: verb_name.clone(),
            location: this,
            this,
            player: self.top_player(),
            args,
            argstr: "".to_string(),
            caller: self.caller(),
        };

        match world_state.valid(this) {
            Ok(true) => {}
            Ok(false) => return self.push_error(E_INVIND),
            Err(WorldStateError::RollbackRetry) => return ExecutionResult::RollbackRestart,
            Err(e) => return self.push_error(e.to_error_code()),
        }

        let (resolved_verb, program) =
            match world_state.find_method_verb_on(self.top().permissions, this, verb_name.clone())
            {
                Ok(vp) => vp,
                Err(WorldStateError::ObjectPermissionDenied)
                | Err(WorldStateError::VerbPermissionDenied) => {
                    return self.push_error(E_PERM);
                }
                Err(WorldStateError::VerbNotFound(_, _)) => {
                    return self
                        .push_error_msg(E_VERBNF, format!("Verb \"{}\" not found", verb_name));
                }
                Err(WorldStateError::RollbackRetry) => {
                    return ExecutionResult::RollbackRestart;
                }
                Err(e) => {
                    return self.push_error(e.to_error_code());
                }
            };

        let permissions = resolved_verb.owner;
        ExecutionResult::ContinueVerb {
            permissions,
            resolved_verb,
            program,
            call,
            command: self.top().command.clone(),
        }
    }

    /// `pass(args)`: the same-named verb on the parent of the current verb's
    /// definer, with `this` left alone.
    pub(crate) fn prepare_pass_verb(
        &mut self,
        world_state: &mut dyn WorldState,
        args: &List,
    ) -> ExecutionResult {
        let definer = self.top().verb_definer();
        let permissions = self.top().permissions;

        let parent = match world_state.parent_of(permissions, definer) {
            Ok(parent) => parent,
            Err(WorldStateError::RollbackRetry) => return ExecutionResult::RollbackRestart,
            Err(e) => return self.raise_error(e.to_error_code()),
        };
        let verb = self.top().verb_name.clone();

        match world_state.valid(parent) {
            Ok(true) => {}
            _ => return self.push_error(E_INVIND),
        }

        let (resolved_verb, program) =
            match world_state.find_method_verb_on(permissions, parent, verb.clone()) {
                Ok(vp) => vp,
                Err(WorldStateError::RollbackRetry) => return ExecutionResult::RollbackRestart,
                Err(e) => return self.raise_error(e.to_error_code()),
            };

        let call = VerbCall {
            verb_name: verb,
            location: parent,
            this: self.top().this,
            player: self.top_player(),
            args: args.clone(),
            argstr: "".to_string(),
            caller: self.caller(),
        };

        ExecutionResult::ContinueVerb {
            permissions,
            resolved_verb,
            program,
            call,
            command: self.top().command.clone(),
        }
    }

    /// Push the activation for a resolved verb call.
    pub fn exec_call_request(
        &mut self,
        permissions: Objid,
        resolved_verb: crate::model::VerbDef,
        program: crate::compiler::Program,
        call: &VerbCall,
        command: Option<crate::matching::ParsedCommand>,
    ) {
        let a = Activation::for_call(permissions, resolved_verb, program, call, command);
        self.stack.push(a);
    }

    pub fn exec_eval_request(&mut self, permissions: Objid, player: Objid, program: crate::compiler::Program) {
        let a = Activation::for_eval(permissions, player, program);
        self.stack.push(a);
    }

    /// Set this (fresh) VM state up to run a forked task: the forking
    /// activation's environment with the fork vector as the program.
    pub fn exec_fork_vector(&mut self, fork_request: Fork) {
        let mut a = fork_request.activation;
        let Frame::Moo(ref mut frame) = a.frame else {
            panic!("fork from a non-MOO frame");
        };
        frame.program.main_vector = Arc::new(
            frame.program.fork_vectors[fork_request.fork_vector_offset.0 as usize].clone(),
        );
        frame.pc = 0;
        frame.valstack.clear();
        frame.scope_stack.clear();
        if let Some(task_id_name) = fork_request.task_id {
            frame.set_variable(&task_id_name, crate::var::v_int(self.task_id as i64));
        }
        self.stack = vec![a];
    }

    /// Call into a builtin function: validate arguments, push a builtin
    /// activation, and invoke.
    pub(crate) fn call_builtin_function(
        &mut self,
        bf_id: BuiltinId,
        args: Vec<Var>,
        exec_params: &VmExecParams,
        world_state: &mut dyn WorldState,
        session: Arc<dyn Session>,
    ) -> ExecutionResult {
        let bf = exec_params.builtin_registry.builtin_for(&bf_id);
        let bf_desc = crate::compiler::BUILTINS
            .description_for(bf_id)
            .expect("builtin not found");
        let bf_name = bf_desc.name.clone();

        if let Err(code) = validate_bf_args(bf_id, &args) {
            return self.push_error(code);
        }

        // The builtin frame inherits the calling verb's flags so the debug
        // bit carries through error handling.
        let flags = self.top().verbdef.flags;
        let player = self.top_player();
        self.stack.push(Activation::for_bf_call(
            bf_id,
            bf_name.clone(),
            List::from_iter(args.iter().cloned()),
            flags,
            player,
        ));
        let mut bf_args = BfCallState {
            name: bf_name,
            args,
            exec_state: self,
            world_state,
            session,
            task_scheduler_client: exec_params.task_scheduler_client.clone(),
            config: exec_params.config.clone(),
        };
        let result = bf.call(&mut bf_args);
        match result {
            Ok(BfRet::Ret(result)) => self.unwind_stack(FinallyReason::Return(result)),
            Ok(BfRet::VmInstr(vmi)) => vmi,
            Err(BfErr::Code(e)) => self.push_bf_error(e, None, None),
            Err(BfErr::Raise(e, msg, value)) => self.push_bf_error(e, msg, value),
            Err(BfErr::Rollback) => ExecutionResult::RollbackRestart,
        }
    }

    /// Return into a suspended builtin frame at the top of the stack, after
    /// a suspend/read resumption or a trampolined verb call completed.
    pub(crate) fn reenter_builtin_function(
        &mut self,
        exec_params: &VmExecParams,
        world_state: &mut dyn WorldState,
        session: Arc<dyn Session>,
    ) -> ExecutionResult {
        let Frame::Bf(bf_frame) = &self.top().frame else {
            panic!("expected a builtin frame at the top of the stack");
        };

        // No trampoline means the builtin is done; its return register
        // holds the value.
        if bf_frame.bf_trampoline.is_none() {
            let return_value = bf_frame
                .return_value
                .clone()
                .expect("no return value from suspended builtin");
            return self.unwind_stack(FinallyReason::Return(return_value));
        }

        let bf_id = bf_frame.bf_id;
        let bf = exec_params.builtin_registry.builtin_for(&bf_id);
        let name = self.top().verb_name.clone();
        let args: Vec<Var> = self.top().args.iter().cloned().collect();
        let mut bf_args = BfCallState {
            name,
            args,
            exec_state: self,
            world_state,
            session,
            task_scheduler_client: exec_params.task_scheduler_client.clone(),
            config: exec_params.config.clone(),
        };
        let result = bf.call(&mut bf_args);
        match result {
            Ok(BfRet::Ret(result)) => self.unwind_stack(FinallyReason::Return(result)),
            Ok(BfRet::VmInstr(vmi)) => vmi,
            Err(BfErr::Code(e)) => self.push_bf_error(e, None, None),
            Err(BfErr::Raise(e, msg, value)) => self.push_bf_error(e, msg, value),
            Err(BfErr::Rollback) => ExecutionResult::RollbackRestart,
        }
    }
}
