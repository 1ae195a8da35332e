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

//! The MOO virtual machine: a stack-based opcode interpreter whose entire
//! execution state is plain data, so that a task can be paused at any
//! suspension point and picked up again later.

pub mod activation;
pub mod exec_state;
pub mod frame;
pub mod moo_execute;
pub mod vm_call;
pub mod vm_unwind;

use std::time::Duration;

use crate::compiler::{Name, Offset, Program};
use crate::matching::ParsedCommand;
use crate::model::VerbDef;
use crate::var::{Objid, Symbol, Var};
use crate::vm::activation::Activation;

pub use exec_state::VMExecState;
pub use vm_call::{VerbCall, VmExecParams};
pub use vm_unwind::{FinallyReason, UncaughtException};

/// Outcome of one VM execution slice, telling the host what to do next.
#[derive(Debug)]
pub enum ExecutionResult {
    /// Keep executing.
    More,
    /// The task is done; the top-level verb returned this value.
    Complete(Var),
    /// Push a new activation for a resolved verb call and continue.
    ContinueVerb {
        permissions: Objid,
        resolved_verb: VerbDef,
        program: Program,
        call: VerbCall,
        command: Option<ParsedCommand>,
    },
    /// Ask the scheduler to create a forked task.
    DispatchFork(Fork),
    /// Suspend the task; `None` means indefinitely.
    Suspend(Option<Duration>),
    /// Suspend until a line of input arrives for the player's connection.
    NeedInput,
    /// An uncaught exception unwound the whole task.
    Exception(FinallyReason),
    /// The world-state transaction conflicted; roll back and re-run the
    /// current segment.
    RollbackRestart,
}

/// A request to start a new task from a `fork` statement.
#[derive(Debug, Clone)]
pub struct Fork {
    pub player: Objid,
    /// Permissions of the forking program.
    pub progr: Objid,
    pub parent_task_id: usize,
    pub delay: Option<Duration>,
    /// Snapshot of the forking activation; the new task starts from its
    /// fork vector with this environment.
    pub activation: Activation,
    pub fork_vector_offset: Offset,
    /// Variable to receive the child task id, in both parent and child.
    pub task_id: Option<Name>,
}

/// Globals every frame carries, used by `callers()` and tracebacks.
#[derive(Clone, Debug)]
pub struct Caller {
    pub this: Objid,
    pub verb_name: Symbol,
    pub programmer: Objid,
    pub definer: Objid,
    pub player: Objid,
    pub line_number: usize,
}
