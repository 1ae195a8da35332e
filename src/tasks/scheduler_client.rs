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

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::model::Perms;
use crate::tasks::{TaskDescription, TaskId};
use crate::var::{v_err, v_int, Error, Var};

/// Task-table state shared between the scheduler and running builtins, plus
/// the mutations builtins request. The scheduler applies pending operations
/// at the next segment boundary, which is also the transactional boundary.
#[derive(Default)]
pub struct SchedulerShared {
    pub descriptions: HashMap<TaskId, TaskDescription>,
    pub pending: Vec<SchedulerOp>,
    pub shutdown_requested: Option<Option<String>>,
    pub checkpoint_requested: bool,
}

#[derive(Debug, Clone)]
pub enum SchedulerOp {
    KillTask(TaskId),
    ResumeTask(TaskId, Var),
}

/// The handle a running task uses to talk to its scheduler.
#[derive(Clone)]
pub struct TaskSchedulerClient {
    pub(crate) shared: Arc<Mutex<SchedulerShared>>,
}

impl TaskSchedulerClient {
    pub fn new(shared: Arc<Mutex<SchedulerShared>>) -> Self {
        Self { shared }
    }

    /// Descriptions of all queued and suspended tasks.
    pub fn request_queued_tasks(&self) -> Vec<TaskDescription> {
        let shared = self.shared.lock().unwrap();
        let mut tasks: Vec<_> = shared.descriptions.values().cloned().collect();
        tasks.sort_by_key(|t| t.task_id);
        tasks
    }

    /// Request the death of another task. The caller must own the victim or
    /// be a wizard. Returns 0 or an error value.
    pub fn kill_task(&self, victim: TaskId, perms: &Perms) -> Var {
        let mut shared = self.shared.lock().unwrap();
        let Some(desc) = shared.descriptions.get(&victim) else {
            return v_err(Error::E_INVARG);
        };
        if !perms.is_wizard() && desc.permissions != perms.who {
            return v_err(Error::E_PERM);
        }
        // Gone from the queue immediately; the scheduler reaps the task
        // itself at the next boundary.
        shared.descriptions.remove(&victim);
        shared.pending.push(SchedulerOp::KillTask(victim));
        v_int(0)
    }

    /// Wake a suspended task early, handing it `value` as the result of its
    /// `suspend()` call.
    pub fn resume_task(&self, victim: TaskId, perms: &Perms, value: Var) -> Var {
        let mut shared = self.shared.lock().unwrap();
        let Some(desc) = shared.descriptions.get(&victim) else {
            return v_err(Error::E_INVARG);
        };
        if !perms.is_wizard() && desc.permissions != perms.who {
            return v_err(Error::E_PERM);
        }
        shared
            .pending
            .push(SchedulerOp::ResumeTask(victim, value));
        v_int(0)
    }

    pub fn shutdown(&self, msg: Option<String>) {
        self.shared.lock().unwrap().shutdown_requested = Some(msg);
    }

    pub fn checkpoint(&self) {
        self.shared.lock().unwrap().checkpoint_requested = true;
    }
}
