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

//! The task scheduler: owns the task table and wake queue, and executes
//! exactly one task's MOO code at a time. Each execution segment (from
//! start or resume to the next suspension point) runs inside its own world
//! state transaction; on commit conflict the segment is re-run from its
//! snapshot against a fresh transaction.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, SystemTime};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, info, warn};

use crate::builtins::BuiltinRegistry;
use crate::compiler::compile;
use crate::config::Config;
use crate::model::{CommitResult, WorldStateSource};
use crate::tasks::scheduler_client::{SchedulerOp, SchedulerShared, TaskSchedulerClient};
use crate::tasks::sessions::Session;
use crate::tasks::task::{eval_source_for, Task};
use crate::tasks::vm_host::{VMHostResponse, VmHost};
use crate::tasks::{AbortLimitReason, TaskDescription, TaskId, TaskStart};
use crate::var::{v_none, v_str, List, Objid, Symbol, Var};
use crate::vm::vm_call::VmExecParams;
use crate::vm::Fork;

/// Submissions from hosts (connections, the console, the CLI).
pub enum SchedulerClientMsg {
    SubmitCommand {
        player: Objid,
        command: String,
        session: Arc<dyn Session>,
    },
    SubmitVerb {
        player: Objid,
        vloc: Objid,
        verb: Symbol,
        args: List,
        argstr: String,
        session: Arc<dyn Session>,
    },
    SubmitEval {
        player: Objid,
        code: String,
        session: Arc<dyn Session>,
    },
    /// A line of input for a task blocked in `read()`.
    SubmitInput { player: Objid, line: String },
    Shutdown(Option<String>),
}

/// Cheap cloneable handle for submitting work to a running scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: Sender<SchedulerClientMsg>,
}

impl SchedulerHandle {
    pub fn submit_command(&self, player: Objid, command: &str, session: Arc<dyn Session>) {
        let _ = self.sender.send(SchedulerClientMsg::SubmitCommand {
            player,
            command: command.to_string(),
            session,
        });
    }

    pub fn submit_eval(&self, player: Objid, code: &str, session: Arc<dyn Session>) {
        let _ = self.sender.send(SchedulerClientMsg::SubmitEval {
            player,
            code: code.to_string(),
            session,
        });
    }

    pub fn submit_input(&self, player: Objid, line: &str) {
        let _ = self.sender.send(SchedulerClientMsg::SubmitInput {
            player,
            line: line.to_string(),
        });
    }

    pub fn shutdown(&self, msg: Option<String>) {
        let _ = self.sender.send(SchedulerClientMsg::Shutdown(msg));
    }
}

enum WakeCondition {
    Time(SystemTime),
    Never,
    Input(Objid),
}

struct SuspendedTask {
    task: Task,
    wake: WakeCondition,
}

pub struct Scheduler {
    db: Arc<dyn WorldStateSource>,
    config: Arc<RwLock<Config>>,
    builtins: Arc<BuiltinRegistry>,
    shared: Arc<Mutex<SchedulerShared>>,
    runnable: VecDeque<(Task, Option<Var>)>,
    suspended: HashMap<TaskId, SuspendedTask>,
    next_task_id: TaskId,
    receiver: Receiver<SchedulerClientMsg>,
    sender: Sender<SchedulerClientMsg>,
    running: bool,
}

impl Scheduler {
    pub fn new(db: Arc<dyn WorldStateSource>, config: Config) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            db,
            config: Arc::new(RwLock::new(config)),
            builtins: Arc::new(BuiltinRegistry::new()),
            shared: Arc::new(Mutex::new(SchedulerShared::default())),
            runnable: VecDeque::new(),
            suspended: HashMap::new(),
            next_task_id: 1,
            receiver,
            sender,
            running: true,
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            sender: self.sender.clone(),
        }
    }

    pub fn client(&self) -> TaskSchedulerClient {
        TaskSchedulerClient::new(self.shared.clone())
    }

    pub fn config(&self) -> Arc<RwLock<Config>> {
        self.config.clone()
    }

    /// The scheduler's main loop: service submissions and run tasks until
    /// shut down.
    pub fn run(&mut self) {
        info!("scheduler started");
        while self.running || !self.runnable.is_empty() {
            self.service_messages(Duration::from_millis(50));
            self.wake_due_tasks();
            self.run_one();
            self.apply_pending_ops();
            self.service_control_flags();
        }
        info!("scheduler stopped");
    }

    /// Drive everything that can make progress without waiting on outside
    /// input: all queued submissions, all runnable tasks, and all timed
    /// suspensions. Used by tests and the console loop.
    pub fn run_until_quiescent(&mut self) {
        loop {
            self.service_messages(Duration::from_millis(0));
            self.wake_due_tasks();
            if self.runnable.is_empty() {
                // Sleep forward to the next timed wake, if any.
                let next = self
                    .suspended
                    .values()
                    .filter_map(|st| match st.wake {
                        WakeCondition::Time(t) => Some(t),
                        _ => None,
                    })
                    .min();
                match next {
                    Some(when) => {
                        if let Ok(delay) = when.duration_since(SystemTime::now()) {
                            std::thread::sleep(delay);
                        }
                        self.wake_due_tasks();
                    }
                    None => break,
                }
            }
            self.run_one();
            self.apply_pending_ops();
            self.service_control_flags();
        }
    }

    fn service_messages(&mut self, wait: Duration) {
        let deadline = std::time::Instant::now() + wait;
        loop {
            let msg = if wait.is_zero() {
                self.receiver.try_recv().ok()
            } else {
                self.receiver
                    .recv_deadline(deadline)
                    .ok()
            };
            let Some(msg) = msg else {
                break;
            };
            match msg {
                SchedulerClientMsg::SubmitCommand {
                    player,
                    command,
                    session,
                } => {
                    self.submit_command_task(player, &command, session);
                }
                SchedulerClientMsg::SubmitVerb {
                    player,
                    vloc,
                    verb,
                    args,
                    argstr,
                    session,
                } => {
                    self.submit_verb_task(player, vloc, verb, args, argstr, session);
                }
                SchedulerClientMsg::SubmitEval {
                    player,
                    code,
                    session,
                } => {
                    self.submit_eval_task(player, &code, session);
                }
                SchedulerClientMsg::SubmitInput { player, line } => {
                    self.deliver_input(player, &line);
                }
                SchedulerClientMsg::Shutdown(msg) => {
                    info!(?msg, "shutdown requested");
                    self.running = false;
                }
            }
            if wait.is_zero() && self.receiver.is_empty() {
                break;
            }
        }
    }

    /// A command line from a player: input for a reading task if one is
    /// waiting, a fresh command task otherwise.
    pub fn submit_command_task(
        &mut self,
        player: Objid,
        command: &str,
        session: Arc<dyn Session>,
    ) -> Option<TaskId> {
        if self.reading_task_for(player).is_some() {
            self.deliver_input(player, command);
            return None;
        }
        // The `;expr` shorthand goes straight to an eval task.
        if let Some(code) = command.trim_start().strip_prefix(';') {
            return self.submit_eval_task(player, code, session);
        }
        let task_id = self.new_task(
            TaskStart::StartCommandVerb {
                player,
                command: command.to_string(),
            },
            player,
            player,
            session,
            false,
            None,
        );
        Some(task_id)
    }

    pub fn submit_verb_task(
        &mut self,
        player: Objid,
        vloc: Objid,
        verb: Symbol,
        args: List,
        argstr: String,
        session: Arc<dyn Session>,
    ) -> TaskId {
        self.new_task(
            TaskStart::StartVerb {
                player,
                vloc,
                verb,
                args,
                argstr,
            },
            player,
            player,
            session,
            false,
            None,
        )
    }

    pub fn submit_eval_task(
        &mut self,
        player: Objid,
        code: &str,
        session: Arc<dyn Session>,
    ) -> Option<TaskId> {
        let source = eval_source_for(code);
        let program = match compile(&source) {
            Ok(program) => program,
            Err(e) => {
                session.send_text(player, &format!("{}", e));
                return None;
            }
        };
        Some(self.new_task(
            TaskStart::StartEval { player, program },
            player,
            player,
            session,
            false,
            None,
        ))
    }

    fn new_task(
        &mut self,
        task_start: TaskStart,
        player: Objid,
        perms: Objid,
        session: Arc<dyn Session>,
        is_background: bool,
        delay: Option<Duration>,
    ) -> TaskId {
        let task_id = self.next_task_id;
        self.next_task_id += 1;

        let (max_ticks, max_seconds, max_stack_depth) = {
            let config = self.config.read().unwrap();
            if is_background {
                (config.bg_ticks, config.bg_seconds, config.max_stack_depth)
            } else {
                (config.fg_ticks, config.fg_seconds, config.max_stack_depth)
            }
        };
        let vm_host = VmHost::new(
            task_id,
            max_stack_depth,
            max_ticks,
            Duration::from_secs(max_seconds),
        );
        let task = Task {
            task_id,
            player,
            perms,
            task_start,
            vm_host,
            session,
            is_background,
        };
        self.describe(&task, delay.map(|d| SystemTime::now() + d));

        match delay {
            Some(d) => {
                self.suspended.insert(
                    task_id,
                    SuspendedTask {
                        task,
                        wake: WakeCondition::Time(SystemTime::now() + d),
                    },
                );
            }
            None => self.runnable.push_back((task, None)),
        }
        task_id
    }

    fn describe(&self, task: &Task, start_time: Option<SystemTime>) {
        let desc = TaskDescription {
            task_id: task.task_id,
            start_time,
            permissions: task.perms,
            verb_name: match &task.task_start {
                TaskStart::StartCommandVerb { command, .. } => {
                    Symbol::mk(command.split_whitespace().next().unwrap_or(""))
                }
                TaskStart::StartVerb { verb, .. } => verb.clone(),
                TaskStart::StartFork { fork, .. } => fork.activation.verb_name.clone(),
                TaskStart::StartEval { .. } => Symbol::mk("eval"),
            },
            verb_definer: task.vm_host.exec_state().stack.last().map_or(
                crate::var::NOTHING,
                |_| task.vm_host.verb_definer(),
            ),
            line_number: task
                .vm_host
                .exec_state()
                .stack
                .last()
                .map_or(0, |_| task.vm_host.line_number()),
            this: task
                .vm_host
                .exec_state()
                .stack
                .last()
                .map_or(crate::var::NOTHING, |_| task.vm_host.this()),
        };
        self.shared
            .lock()
            .unwrap()
            .descriptions
            .insert(task.task_id, desc);
    }

    fn remove_description(&self, task_id: TaskId) {
        self.shared.lock().unwrap().descriptions.remove(&task_id);
    }

    fn reading_task_for(&self, player: Objid) -> Option<TaskId> {
        self.suspended
            .iter()
            .filter(|(_, st)| matches!(st.wake, WakeCondition::Input(p) if p == player))
            .map(|(id, _)| *id)
            .min()
    }

    /// Hand a line of input to the (lowest-numbered) task reading for this
    /// player.
    pub fn deliver_input(&mut self, player: Objid, line: &str) {
        let Some(task_id) = self.reading_task_for(player) else {
            warn!(?player, "input with no reading task");
            return;
        };
        let st = self.suspended.remove(&task_id).unwrap();
        self.runnable.push_back((st.task, Some(v_str(line))));
    }

    /// Move timed suspensions whose deadline has passed onto the run queue,
    /// in wake-time order with task id as tiebreak.
    fn wake_due_tasks(&mut self) {
        let now = SystemTime::now();
        let mut due: Vec<(SystemTime, TaskId)> = self
            .suspended
            .iter()
            .filter_map(|(id, st)| match st.wake {
                WakeCondition::Time(t) if t <= now => Some((t, *id)),
                _ => None,
            })
            .collect();
        due.sort();
        for (_, task_id) in due {
            let st = self.suspended.remove(&task_id).unwrap();
            self.runnable.push_back((st.task, Some(v_none())));
        }
    }

    fn apply_pending_ops(&mut self) {
        let pending: Vec<SchedulerOp> =
            std::mem::take(&mut self.shared.lock().unwrap().pending);
        for op in pending {
            match op {
                SchedulerOp::KillTask(task_id) => {
                    if self.suspended.remove(&task_id).is_some() {
                        self.remove_description(task_id);
                        debug!(task_id, "killed suspended task");
                        continue;
                    }
                    let before = self.runnable.len();
                    self.runnable.retain(|(t, _)| t.task_id != task_id);
                    if self.runnable.len() != before {
                        self.remove_description(task_id);
                        debug!(task_id, "killed queued task");
                    }
                }
                SchedulerOp::ResumeTask(task_id, value) => {
                    if let Some(st) = self.suspended.remove(&task_id) {
                        match st.wake {
                            WakeCondition::Time(_) | WakeCondition::Never => {
                                self.runnable.push_back((st.task, Some(value)));
                            }
                            WakeCondition::Input(_) => {
                                // Reading tasks resume only via input.
                                self.suspended.insert(task_id, st);
                            }
                        }
                    }
                }
            }
        }
    }

    fn service_control_flags(&mut self) {
        let (shutdown, checkpoint) = {
            let mut shared = self.shared.lock().unwrap();
            (
                shared.shutdown_requested.take(),
                std::mem::replace(&mut shared.checkpoint_requested, false),
            )
        };
        if checkpoint {
            if let Err(e) = self.db.checkpoint() {
                error!(?e, "checkpoint failed");
            }
        }
        if let Some(msg) = shutdown {
            info!(?msg, "shutdown via builtin");
            self.running = false;
        }
    }

    fn run_one(&mut self) {
        let Some((task, resume_value)) = self.runnable.pop_front() else {
            return;
        };
        // The running task is not "queued"; it reappears in the table if it
        // suspends again.
        self.remove_description(task.task_id);
        self.execute_task_segment(task, resume_value);
    }

    /// Run one task until it completes or suspends, inside a transaction;
    /// conflicts re-run the segment from its snapshot.
    fn execute_task_segment(&mut self, mut task: Task, resume_value: Option<Var>) {
        let task_id = task.task_id;
        let initial_snapshot = task.vm_host.snapshot();
        let exec_params = VmExecParams {
            builtin_registry: self.builtins.clone(),
            task_scheduler_client: TaskSchedulerClient::new(self.shared.clone()),
            config: self.config.clone(),
            max_stack_depth: self.config.read().unwrap().max_stack_depth,
        };

        'retry: loop {
            let mut world_state = match self.db.new_world_state() {
                Ok(ws) => ws,
                Err(e) => {
                    error!(?e, task_id, "could not start transaction");
                    self.remove_description(task_id);
                    return;
                }
            };

            if task.vm_host.exec_state().stack.is_empty() {
                if let Err(e) = task.setup(world_state.as_mut()) {
                    task.report_command_error(&e);
                    let _ = world_state.rollback();
                    self.remove_description(task_id);
                    return;
                }
            } else if let Some(v) = resume_value.clone() {
                let (ticks, seconds) = {
                    let config = self.config.read().unwrap();
                    (config.bg_ticks, config.bg_seconds)
                };
                task.vm_host
                    .resume_execution(v, ticks, Duration::from_secs(seconds));
            }

            // Forks requested this attempt; scheduled only if the segment
            // commits.
            let mut pending_forks: Vec<(TaskId, Fork)> = vec![];

            let outcome = loop {
                let response = task.vm_host.exec_interpreter(
                    task_id,
                    world_state.as_mut(),
                    &exec_params,
                    task.session.clone(),
                );
                match response {
                    VMHostResponse::ContinueOk => continue,
                    VMHostResponse::DispatchFork(fork) => {
                        let child_id = self.next_task_id;
                        self.next_task_id += 1;
                        if let Some(name) = &fork.task_id {
                            task.vm_host
                                .set_variable(name, crate::var::v_int(child_id as i64));
                        }
                        // Visible in queued_tasks() right away, though the
                        // task itself materializes only if this segment
                        // commits.
                        let desc = TaskDescription {
                            task_id: child_id,
                            start_time: fork.delay.map(|d| SystemTime::now() + d),
                            permissions: fork.progr,
                            verb_name: fork.activation.verb_name.clone(),
                            verb_definer: fork.activation.verb_definer(),
                            line_number: 0,
                            this: fork.activation.this,
                        };
                        self.shared
                            .lock()
                            .unwrap()
                            .descriptions
                            .insert(child_id, desc);
                        pending_forks.push((child_id, fork));
                        continue;
                    }
                    other => break other,
                }
            };

            match outcome {
                VMHostResponse::Suspend(delay) => {
                    match world_state.commit() {
                        Ok(CommitResult::Success) => {
                            self.schedule_forks(pending_forks, &task);
                            task.is_background = true;
                            let wake = match delay {
                                Some(d) => WakeCondition::Time(SystemTime::now() + d),
                                None => WakeCondition::Never,
                            };
                            let start_time = match &wake {
                                WakeCondition::Time(t) => Some(*t),
                                _ => None,
                            };
                            self.describe(&task, start_time);
                            self.suspended
                                .insert(task_id, SuspendedTask { task, wake });
                            return;
                        }
                        Ok(CommitResult::ConflictRetry) => {
                            debug!(task_id, "commit conflict at suspend; retrying segment");
                            self.discard_forks(&pending_forks);
                            task.vm_host.restore(initial_snapshot.clone());
                            continue 'retry;
                        }
                        Err(e) => {
                            error!(?e, task_id, "commit failure at suspend");
                            self.remove_description(task_id);
                            return;
                        }
                    }
                }
                VMHostResponse::SuspendNeedInput => {
                    match world_state.commit() {
                        Ok(CommitResult::Success) => {
                            self.schedule_forks(pending_forks, &task);
                            task.is_background = true;
                            let player = task.player;
                            self.describe(&task, None);
                            self.suspended.insert(
                                task_id,
                                SuspendedTask {
                                    task,
                                    wake: WakeCondition::Input(player),
                                },
                            );
                            return;
                        }
                        Ok(CommitResult::ConflictRetry) => {
                            self.discard_forks(&pending_forks);
                            task.vm_host.restore(initial_snapshot.clone());
                            continue 'retry;
                        }
                        Err(e) => {
                            error!(?e, task_id, "commit failure at read");
                            self.remove_description(task_id);
                            return;
                        }
                    }
                }
                VMHostResponse::CompleteSuccess(value) => {
                    match world_state.commit() {
                        Ok(CommitResult::Success) => {
                            self.schedule_forks(pending_forks, &task);
                            if matches!(task.task_start, TaskStart::StartEval { .. }) {
                                task.session
                                    .send_text(task.player, &format!("=> {}", value.to_literal()));
                            }
                            self.remove_description(task_id);
                            return;
                        }
                        Ok(CommitResult::ConflictRetry) => {
                            debug!(task_id, "commit conflict at completion; retrying segment");
                            self.discard_forks(&pending_forks);
                            task.vm_host.restore(initial_snapshot.clone());
                            continue 'retry;
                        }
                        Err(e) => {
                            error!(?e, task_id, "commit failure at completion");
                            self.remove_description(task_id);
                            return;
                        }
                    }
                }
                VMHostResponse::CompleteException(exception) => {
                    let _ = world_state.rollback();
                    self.discard_forks(&pending_forks);
                    for line in &exception.backtrace {
                        task.session.send_text(task.player, line);
                    }
                    info!(
                        task_id,
                        code = exception.code.name(),
                        msg = exception.msg,
                        "task aborted with uncaught exception"
                    );
                    self.remove_description(task_id);
                    return;
                }
                VMHostResponse::AbortLimit(reason) => {
                    let _ = world_state.rollback();
                    self.discard_forks(&pending_forks);
                    let msg = match reason {
                        AbortLimitReason::Ticks(_) => "Task ran out of ticks",
                        AbortLimitReason::Time(_) => "Task ran out of seconds",
                    };
                    task.session.send_text(task.player, msg);
                    warn!(task_id, msg, "task aborted at resource limit");
                    self.remove_description(task_id);
                    return;
                }
                VMHostResponse::CompleteAbort => {
                    let _ = world_state.rollback();
                    self.discard_forks(&pending_forks);
                    self.remove_description(task_id);
                    return;
                }
                VMHostResponse::RollbackRetry => {
                    let _ = world_state.rollback();
                    self.discard_forks(&pending_forks);
                    task.vm_host.restore(initial_snapshot.clone());
                    continue 'retry;
                }
                VMHostResponse::ContinueOk | VMHostResponse::DispatchFork(_) => {
                    unreachable!("handled in the inner loop")
                }
            }
        }
    }

    /// Drop the provisional queue entries for forks whose parent segment
    /// did not commit.
    fn discard_forks(&self, forks: &[(TaskId, Fork)]) {
        for (id, _) in forks {
            self.remove_description(*id);
        }
    }

    /// Turn committed fork requests into scheduled tasks. The forked VM is
    /// not set up until the task actually runs, so a delayed fork's clocks
    /// start at wake time.
    fn schedule_forks(&mut self, forks: Vec<(TaskId, Fork)>, parent: &Task) {
        for (child_id, fork) in forks {
            let (max_ticks, max_seconds, max_stack_depth) = {
                let config = self.config.read().unwrap();
                (config.bg_ticks, config.bg_seconds, config.max_stack_depth)
            };
            let vm_host = VmHost::new(
                child_id,
                max_stack_depth,
                max_ticks,
                Duration::from_secs(max_seconds),
            );
            let delay = fork.delay;
            let player = fork.player;
            let progr = fork.progr;
            let task = Task {
                task_id: child_id,
                player,
                perms: progr,
                task_start: TaskStart::StartFork {
                    fork,
                    suspended: false,
                },
                vm_host,
                session: parent.session.clone(),
                is_background: true,
            };
            let wake_time = delay.map(|d| SystemTime::now() + d);
            self.describe(&task, wake_time);
            match wake_time {
                Some(t) => {
                    self.suspended.insert(
                        child_id,
                        SuspendedTask {
                            task,
                            wake: WakeCondition::Time(t),
                        },
                    );
                }
                None => self.runnable.push_back((task, None)),
            }
        }
    }
}
