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
use std::time::{Duration, SystemTime};

use tracing::trace;

use crate::compiler::{Name, Program};
use crate::matching::ParsedCommand;
use crate::model::{VerbDef, WorldState};
use crate::tasks::sessions::Session;
use crate::tasks::{AbortLimitReason, TaskId};
use crate::var::Error::E_MAXREC;
use crate::var::{v_none, Objid, Var};
use crate::vm::activation::Frame;
use crate::vm::moo_execute::moo_frame_execute;
use crate::vm::vm_call::{VerbCall, VmExecParams};
use crate::vm::vm_unwind::{FinallyReason, UncaughtException};
use crate::vm::{ExecutionResult, Fork, VMExecState};

/// How many opcodes to run per interpreter invocation before yielding to
/// check clocks and kill requests.
const TICK_SLICE: usize = 4096;

/// Outcome of one slice of hosted execution, for the task driver.
#[derive(Debug)]
pub enum VMHostResponse {
    /// Keep feeding me.
    ContinueOk,
    DispatchFork(Fork),
    Suspend(Option<Duration>),
    SuspendNeedInput,
    AbortLimit(AbortLimitReason),
    CompleteSuccess(Var),
    CompleteAbort,
    CompleteException(UncaughtException),
    RollbackRetry,
}

/// Wraps a [`VMExecState`] with budget accounting and the start/resume
/// entry points. The exec state inside is pure data; snapshot/restore are
/// used by the transactional retry protocol.
pub struct VmHost {
    vm_exec_state: VMExecState,
    max_stack_depth: usize,
    max_ticks: usize,
    max_time: Duration,
    running: bool,
}

impl VmHost {
    pub fn new(task_id: TaskId, max_stack_depth: usize, max_ticks: usize, max_time: Duration) -> Self {
        Self {
            vm_exec_state: VMExecState::new(task_id, max_ticks),
            max_stack_depth,
            max_ticks,
            max_time,
            running: false,
        }
    }

    /// Begin execution of a command verb.
    pub fn start_call_command_verb(
        &mut self,
        task_id: TaskId,
        permissions: Objid,
        resolved_verb: VerbDef,
        program: Program,
        call: &VerbCall,
        command: ParsedCommand,
    ) {
        self.start_time_accounting(task_id);
        self.vm_exec_state
            .exec_call_request(permissions, resolved_verb, program, call, Some(command));
        self.running = true;
    }

    /// Begin execution of a server-initiated verb call.
    pub fn start_call_method_verb(
        &mut self,
        task_id: TaskId,
        permissions: Objid,
        resolved_verb: VerbDef,
        program: Program,
        call: &VerbCall,
    ) {
        self.start_time_accounting(task_id);
        self.vm_exec_state
            .exec_call_request(permissions, resolved_verb, program, call, None);
        self.running = true;
    }

    pub fn start_fork(&mut self, task_id: TaskId, fork_request: Fork, suspended: bool) {
        self.start_time_accounting(task_id);
        self.vm_exec_state.exec_fork_vector(fork_request);
        self.running = !suspended;
    }

    pub fn start_eval(&mut self, task_id: TaskId, permissions: Objid, player: Objid, program: Program) {
        self.start_time_accounting(task_id);
        self.vm_exec_state
            .exec_eval_request(permissions, player, program);
        self.running = true;
    }

    fn start_time_accounting(&mut self, task_id: TaskId) {
        self.vm_exec_state.task_id = task_id;
        self.vm_exec_state.start_time = Some(SystemTime::now());
        self.vm_exec_state.maximum_time = Some(self.max_time);
        self.vm_exec_state.tick_count = 0;
        self.vm_exec_state.max_ticks = self.max_ticks;
    }

    /// Run one slice of the interpreter and translate the result for the
    /// task driver.
    pub fn exec_interpreter(
        &mut self,
        task_id: TaskId,
        world_state: &mut dyn WorldState,
        exec_params: &VmExecParams,
        session: Arc<dyn Session>,
    ) -> VMHostResponse {
        self.vm_exec_state.task_id = task_id;

        if self.vm_exec_state.tick_count >= self.max_ticks {
            return VMHostResponse::AbortLimit(AbortLimitReason::Ticks(
                self.vm_exec_state.tick_count,
            ));
        }
        if let Some(start_time) = self.vm_exec_state.start_time {
            let elapsed = start_time.elapsed().unwrap_or_default();
            if elapsed > self.max_time {
                return VMHostResponse::AbortLimit(AbortLimitReason::Time(elapsed));
            }
        }

        self.vm_exec_state.tick_slice = TICK_SLICE.min(self.max_ticks - self.vm_exec_state.tick_count);

        let mut result = self.run_interpreter(exec_params, world_state, session.clone());
        while self.is_running() {
            match result {
                ExecutionResult::More => return VMHostResponse::ContinueOk,
                ExecutionResult::ContinueVerb {
                    permissions,
                    resolved_verb,
                    program,
                    call,
                    command,
                } => {
                    trace!(task_id, verb = %call.verb_name, "continue into verb");
                    if self.vm_exec_state.stack.len() >= self.max_stack_depth {
                        result = self.vm_exec_state.push_error(E_MAXREC);
                        continue;
                    }
                    self.vm_exec_state.exec_call_request(
                        permissions,
                        resolved_verb,
                        program,
                        &call,
                        command,
                    );
                    return VMHostResponse::ContinueOk;
                }
                ExecutionResult::DispatchFork(fork_request) => {
                    return VMHostResponse::DispatchFork(fork_request);
                }
                ExecutionResult::Suspend(delay) => {
                    return VMHostResponse::Suspend(delay);
                }
                ExecutionResult::NeedInput => {
                    return VMHostResponse::SuspendNeedInput;
                }
                ExecutionResult::Complete(value) => {
                    trace!(task_id, "task completed");
                    return VMHostResponse::CompleteSuccess(value);
                }
                ExecutionResult::Exception(fr) => {
                    trace!(task_id, ?fr, "task exception");
                    return match fr {
                        FinallyReason::Uncaught(exception) => {
                            VMHostResponse::CompleteException(exception)
                        }
                        _ => {
                            unreachable!("invalid FinallyReason for task exception: {:?}", fr)
                        }
                    };
                }
                ExecutionResult::RollbackRestart => {
                    return VMHostResponse::RollbackRetry;
                }
            }
        }
        VMHostResponse::CompleteAbort
    }

    fn run_interpreter(
        &mut self,
        exec_params: &VmExecParams,
        world_state: &mut dyn WorldState,
        session: Arc<dyn Session>,
    ) -> ExecutionResult {
        if self.vm_exec_state.stack.is_empty() {
            return ExecutionResult::Complete(v_none());
        }
        match &self.vm_exec_state.top().frame {
            Frame::Moo(_) => {
                moo_frame_execute(exec_params, &mut self.vm_exec_state, world_state, session)
            }
            Frame::Bf(_) => {
                self.vm_exec_state
                    .reenter_builtin_function(exec_params, world_state, session)
            }
        }
    }

    /// Wake from suspension: fresh clocks and the resumption value fed to
    /// whatever was waiting.
    pub fn resume_execution(&mut self, value: Var, max_ticks: usize, max_time: Duration) {
        self.max_ticks = max_ticks;
        self.max_time = max_time;
        self.vm_exec_state.start_time = Some(SystemTime::now());
        self.vm_exec_state.maximum_time = Some(max_time);
        self.vm_exec_state.tick_count = 0;
        self.vm_exec_state.max_ticks = max_ticks;
        self.running = true;
        if !self.vm_exec_state.stack.is_empty() {
            self.vm_exec_state.set_return_value(value);
        }
    }

    /// Snapshot/restore of the execution state, for transactional retry of
    /// a whole segment.
    pub fn snapshot(&self) -> VMExecState {
        self.vm_exec_state.clone()
    }

    pub fn restore(&mut self, snapshot: VMExecState) {
        self.vm_exec_state = snapshot;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn set_variable(&mut self, name: &Name, value: Var) {
        self.vm_exec_state.top_mut().frame.set_variable(name, value);
    }

    pub fn permissions(&self) -> Objid {
        self.vm_exec_state.task_perms()
    }

    pub fn verb_name(&self) -> crate::var::Symbol {
        self.vm_exec_state.top().verb_name.clone()
    }

    pub fn verb_definer(&self) -> Objid {
        self.vm_exec_state.top().verb_definer()
    }

    pub fn this(&self) -> Objid {
        self.vm_exec_state.top().this
    }

    pub fn line_number(&self) -> usize {
        self.vm_exec_state.top().line_number()
    }

    pub fn exec_state(&self) -> &VMExecState {
        &self.vm_exec_state
    }

    pub fn exec_state_mut(&mut self) -> &mut VMExecState {
        &mut self.vm_exec_state
    }
}
