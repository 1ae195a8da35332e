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

use std::time::{Duration, SystemTime};

use crate::var::{Objid, Var, NOTHING};
use crate::vm::activation::{Activation, Frame};
use crate::vm::Caller;

/// The resumable execution state of one task: the activation stack and the
/// tick/time accounting. Cloneable, so a segment can be snapshotted before
/// running and restored if its transaction has to retry.
#[derive(Debug, Clone)]
pub struct VMExecState {
    pub task_id: usize,
    pub stack: Vec<Activation>,
    /// Ticks left to this run of the interpreter loop before it must yield
    /// back to the host.
    pub tick_slice: usize,
    /// Total ticks consumed by the task since start/resume.
    pub tick_count: usize,
    pub max_ticks: usize,
    pub start_time: Option<SystemTime>,
    pub maximum_time: Option<Duration>,
}

impl VMExecState {
    pub fn new(task_id: usize, max_ticks: usize) -> Self {
        Self {
            task_id,
            stack: vec![],
            tick_slice: 0,
            tick_count: 0,
            max_ticks,
            start_time: None,
            maximum_time: None,
        }
    }

    #[inline]
    pub fn top(&self) -> &Activation {
        self.stack.last().expect("activation stack underflow")
    }

    #[inline]
    pub fn top_mut(&mut self) -> &mut Activation {
        self.stack.last_mut().expect("activation stack underflow")
    }

    pub fn parent_activation_mut(&mut self) -> &mut Activation {
        let len = self.stack.len();
        self.stack
            .get_mut(len - 2)
            .expect("activation stack underflow")
    }

    /// The object of the nearest non-builtin frame: what `caller` becomes
    /// for a verb called from here.
    pub fn caller(&self) -> Objid {
        for a in self.stack.iter().rev() {
            if !a.is_builtin_frame() {
                return a.this;
            }
        }
        NOTHING
    }

    /// Permissions of the frame below the current verb frame.
    pub fn caller_perms(&self) -> Objid {
        let mut frames = self.stack.iter().rev().filter(|a| !a.is_builtin_frame());
        frames.next();
        frames.next().map(|a| a.permissions).unwrap_or(NOTHING)
    }

    /// The permissions the task currently runs under.
    pub fn task_perms(&self) -> Objid {
        self.stack
            .iter()
            .rev()
            .find(|a| !a.is_builtin_frame())
            .map(|a| a.permissions)
            .unwrap_or(NOTHING)
    }

    pub fn set_task_perms(&mut self, perms: Objid) {
        for a in self.stack.iter_mut().rev() {
            if !a.is_builtin_frame() {
                a.permissions = perms;
                return;
            }
        }
    }

    pub fn top_player(&self) -> Objid {
        self.stack.last().map(|a| a.player).unwrap_or(NOTHING)
    }

    /// The stack as `callers()` reports it: every non-builtin frame below
    /// the current one.
    pub fn callers(&self) -> Vec<Caller> {
        let mut frames = self.stack.iter().rev();
        frames.next();
        let mut callers = vec![];
        for a in frames {
            if a.is_builtin_frame() {
                continue;
            }
            callers.push(Caller {
                this: a.this,
                verb_name: a.verb_name.clone(),
                programmer: a.permissions,
                definer: a.verb_definer(),
                player: a.player,
                line_number: a.line_number(),
            });
        }
        callers
    }

    #[inline]
    pub fn push(&mut self, v: Var) {
        match &mut self.top_mut().frame {
            Frame::Moo(f) => f.push(v),
            Frame::Bf(bf) => bf.return_value = Some(v),
        }
    }

    /// Feed a value to whatever is waiting for one: the return register of
    /// a suspended builtin, or the top frame's value stack.
    pub fn set_return_value(&mut self, value: Var) {
        self.top_mut().frame.set_return_value(value);
    }

    pub fn ticks_left(&self) -> usize {
        self.max_ticks.saturating_sub(self.tick_count)
    }

    pub fn time_left(&self) -> Option<Duration> {
        let max_time = self.maximum_time?;
        let elapsed = self
            .start_time
            .and_then(|s| s.elapsed().ok())
            .unwrap_or_default();
        Some(max_time.saturating_sub(elapsed))
    }
}
