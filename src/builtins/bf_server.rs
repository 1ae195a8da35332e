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

//! Server, task, and connection builtins.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local};
use tracing::{error, info};

use crate::bf_declare;
use crate::builtins::BfRet::{Ret, VmInstr};
use crate::builtins::{world_state_bf_err, BfCallState, BfErr, BfRet, BuiltinFunction};
use crate::compiler::offset_for_builtin;
use crate::tasks::sessions::SessionError;
use crate::tasks::TaskId;
use crate::var::Error::{E_ARGS, E_INVARG, E_PERM, E_TYPE};
use crate::var::{v_int, v_list, v_none, v_obj, v_str, v_string, Objid, Var};
use crate::vm::ExecutionResult;

fn session_err(e: SessionError) -> BfErr {
    match e {
        SessionError::NoConnection(_) => BfErr::Code(E_INVARG),
        SessionError::NotSupported => BfErr::Code(E_INVARG),
    }
}

fn obj_arg(v: &Var) -> Result<Objid, BfErr> {
    match v {
        Var::Obj(o) => Ok(*o),
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

fn bf_notify(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let player = obj_arg(&bf_args.args[0])?;
    let Var::Str(msg) = &bf_args.args[1] else {
        return Err(BfErr::Code(E_TYPE));
    };
    // Sending to someone else's connection needs wizardly permissions.
    let perms = bf_args.task_perms().map_err(world_state_bf_err)?;
    if !perms.is_wizard() && perms.who != player {
        return Err(BfErr::Code(E_PERM));
    }
    bf_args.session.send_text(player, msg.as_str());
    Ok(Ret(v_int(1)))
}
bf_declare!(notify, bf_notify);

fn bf_connected_players(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let players: Vec<Var> = bf_args
        .session
        .connected_players()
        .iter()
        .map(|p| v_obj(*p))
        .collect();
    Ok(Ret(v_list(&players)))
}
bf_declare!(connected_players, bf_connected_players);

fn bf_connected_seconds(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let player = obj_arg(&bf_args.args[0])?;
    let seconds = bf_args
        .session
        .connected_seconds(player)
        .map_err(session_err)?;
    Ok(Ret(v_int(seconds)))
}
bf_declare!(connected_seconds, bf_connected_seconds);

fn bf_idle_seconds(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let player = obj_arg(&bf_args.args[0])?;
    let seconds = bf_args.session.idle_seconds(player).map_err(session_err)?;
    Ok(Ret(v_int(seconds)))
}
bf_declare!(idle_seconds, bf_idle_seconds);

fn bf_boot_player(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let player = obj_arg(&bf_args.args[0])?;
    let perms = bf_args.task_perms().map_err(world_state_bf_err)?;
    if !perms.is_wizard() && perms.who != player {
        return Err(BfErr::Code(E_PERM));
    }
    bf_args.session.boot_player(player).map_err(session_err)?;
    Ok(Ret(v_none()))
}
bf_declare!(boot_player, bf_boot_player);

fn bf_connection_name(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let player = obj_arg(&bf_args.args[0])?;
    let perms = bf_args.task_perms().map_err(world_state_bf_err)?;
    if !perms.is_wizard() && perms.who != player {
        return Err(BfErr::Code(E_PERM));
    }
    let name = bf_args
        .session
        .connection_name(player)
        .map_err(session_err)?;
    Ok(Ret(v_string(name)))
}
bf_declare!(connection_name, bf_connection_name);

fn bf_connection_option(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let player = obj_arg(&bf_args.args[0])?;
    let Var::Str(option) = &bf_args.args[1] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let value = bf_args
        .session
        .connection_option(player, option.as_str())
        .map_err(session_err)?;
    Ok(Ret(value))
}
bf_declare!(connection_option, bf_connection_option);

fn bf_set_connection_option(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let player = obj_arg(&bf_args.args[0])?;
    let Var::Str(option) = &bf_args.args[1] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let value = bf_args.args[2].clone();
    bf_args
        .session
        .set_connection_option(player, option.as_str(), &value)
        .map_err(session_err)?;
    Ok(Ret(v_none()))
}
bf_declare!(set_connection_option, bf_set_connection_option);

fn bf_listen(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let perms = bf_args.task_perms().map_err(world_state_bf_err)?;
    if !perms.is_wizard() {
        return Err(BfErr::Code(E_PERM));
    }
    let object = obj_arg(&bf_args.args[0])?;
    let Var::Int(point) = &bf_args.args[1] else {
        return Err(BfErr::Code(E_TYPE));
    };
    if *point < 0 || *point > u16::MAX as i64 {
        return Err(BfErr::Code(E_INVARG));
    }
    let print_messages = bf_args.args.len() == 3 && bf_args.args[2].is_true();
    bf_args
        .session
        .listen(object, *point as u16, print_messages)
        .map_err(session_err)?;
    Ok(Ret(v_int(*point)))
}
bf_declare!(listen, bf_listen);

fn bf_unlisten(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let perms = bf_args.task_perms().map_err(world_state_bf_err)?;
    if !perms.is_wizard() {
        return Err(BfErr::Code(E_PERM));
    }
    let Var::Int(point) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    if *point < 0 || *point > u16::MAX as i64 {
        return Err(BfErr::Code(E_INVARG));
    }
    bf_args.session.unlisten(*point as u16).map_err(session_err)?;
    Ok(Ret(v_none()))
}
bf_declare!(unlisten, bf_unlisten);

fn bf_listeners(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let listeners: Vec<Var> = bf_args
        .session
        .listeners()
        .iter()
        .map(|(obj, point, print)| {
            v_list(&[v_obj(*obj), v_int(*point as i64), v_int(*print as i64)])
        })
        .collect();
    Ok(Ret(v_list(&listeners)))
}
bf_declare!(listeners, bf_listeners);

fn bf_open_network_connection(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let perms = bf_args.task_perms().map_err(world_state_bf_err)?;
    if !perms.is_wizard() {
        return Err(BfErr::Code(E_PERM));
    }
    if bf_args.args.len() != 2 {
        return Err(BfErr::Code(E_ARGS));
    }
    let Var::Str(host) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Var::Int(port) = &bf_args.args[1] else {
        return Err(BfErr::Code(E_TYPE));
    };
    if *port < 0 || *port > u16::MAX as i64 {
        return Err(BfErr::Code(E_INVARG));
    }
    let connection = bf_args
        .session
        .open_network_connection(host.as_str(), *port as u16)
        .map_err(session_err)?;
    Ok(Ret(v_obj(connection)))
}
bf_declare!(open_network_connection, bf_open_network_connection);

fn bf_time(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let _ = bf_args;
    Ok(Ret(v_int(
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0),
    )))
}
bf_declare!(time, bf_time);

fn bf_ctime(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let time = if bf_args.args.is_empty() {
        SystemTime::now()
    } else {
        let Var::Int(time) = &bf_args.args[0] else {
            return Err(BfErr::Code(E_TYPE));
        };
        if *time < 0 {
            SystemTime::UNIX_EPOCH - Duration::from_secs(time.unsigned_abs())
        } else {
            SystemTime::UNIX_EPOCH + Duration::from_secs(time.unsigned_abs())
        }
    };
    // Local time honors TZ, as the contract requires.
    let date_time: DateTime<Local> = DateTime::from(time);
    Ok(Ret(v_string(
        date_time.format("%a %b %e %H:%M:%S %Y %Z").to_string(),
    )))
}
bf_declare!(ctime, bf_ctime);

fn bf_task_id(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_int(bf_args.exec_state.task_id as i64)))
}
bf_declare!(task_id, bf_task_id);

fn bf_queued_tasks(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let tasks = bf_args.task_scheduler_client.request_queued_tasks();
    // {task-id, start-time, clock-id, clock-ticks, programmer, verb-loc,
    //  verb-name, line, this}
    let tasks: Vec<Var> = tasks
        .iter()
        .map(|task| {
            let start_time = match task.start_time {
                None => v_none(),
                Some(start_time) => v_int(
                    start_time
                        .duration_since(SystemTime::UNIX_EPOCH)
                        .map(|d| d.as_secs() as i64)
                        .unwrap_or(0),
                ),
            };
            v_list(&[
                v_int(task.task_id as i64),
                start_time,
                v_int(0),
                v_int(0),
                v_obj(task.permissions),
                v_obj(task.verb_definer),
                v_str(task.verb_name.as_str()),
                v_int(task.line_number as i64),
                v_obj(task.this),
            ])
        })
        .collect();
    Ok(Ret(v_list(&tasks)))
}
bf_declare!(queued_tasks, bf_queued_tasks);

fn bf_queue_info(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let tasks = bf_args.task_scheduler_client.request_queued_tasks();
    if bf_args.args.is_empty() {
        let mut owners: Vec<Objid> = tasks.iter().map(|t| t.permissions).collect();
        owners.sort();
        owners.dedup();
        let result: Vec<Var> = owners.iter().map(|o| v_obj(*o)).collect();
        return Ok(Ret(v_list(&result)));
    }
    let player = obj_arg(&bf_args.args[0])?;
    let count = tasks.iter().filter(|t| t.permissions == player).count();
    Ok(Ret(v_int(count as i64)))
}
bf_declare!(queue_info, bf_queue_info);

fn bf_kill_task(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let Var::Int(victim) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let victim = *victim as TaskId;
    // Killing the current task is just finishing it, abruptly.
    if victim == bf_args.exec_state.task_id {
        return Ok(VmInstr(ExecutionResult::Complete(v_none())));
    }
    let perms = bf_args.task_perms().map_err(world_state_bf_err)?;
    let result = bf_args.task_scheduler_client.kill_task(victim, &perms);
    if let Var::Err(e) = result {
        return Err(BfErr::Code(e));
    }
    Ok(Ret(result))
}
bf_declare!(kill_task, bf_kill_task);

fn bf_resume(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let Var::Int(victim) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let victim = *victim as TaskId;
    let value = if bf_args.args.len() == 2 {
        bf_args.args[1].clone()
    } else {
        v_none()
    };
    // A task cannot resume itself; it is not suspended.
    if victim == bf_args.exec_state.task_id {
        return Err(BfErr::Code(E_INVARG));
    }
    let perms = bf_args.task_perms().map_err(world_state_bf_err)?;
    let result = bf_args
        .task_scheduler_client
        .resume_task(victim, &perms, value);
    if let Var::Err(e) = result {
        return Err(BfErr::Code(e));
    }
    Ok(Ret(result))
}
bf_declare!(resume, bf_resume);

fn bf_suspend(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let seconds = if bf_args.args.is_empty() {
        None
    } else {
        let seconds = match &bf_args.args[0] {
            Var::Int(s) => *s as f64,
            Var::Float(s) => *s,
            _ => return Err(BfErr::Code(E_TYPE)),
        };
        if seconds < 0.0 {
            return Err(BfErr::Code(E_INVARG));
        }
        Some(Duration::from_secs_f64(seconds))
    };
    Ok(VmInstr(ExecutionResult::Suspend(seconds)))
}
bf_declare!(suspend, bf_suspend);

fn bf_read(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    // Reading another player's connection is not a thing we support.
    if bf_args.args.len() == 1 {
        let requested = obj_arg(&bf_args.args[0])?;
        if requested != bf_args.exec_state.top_player() {
            return Err(BfErr::Code(E_INVARG));
        }
    }
    Ok(VmInstr(ExecutionResult::NeedInput))
}
bf_declare!(read, bf_read);

fn bf_seconds_left(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    match bf_args.exec_state.time_left() {
        None => Ok(Ret(v_none())),
        Some(d) => Ok(Ret(v_int(d.as_secs() as i64))),
    }
}
bf_declare!(seconds_left, bf_seconds_left);

fn bf_ticks_left(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_int(bf_args.exec_state.ticks_left() as i64)))
}
bf_declare!(ticks_left, bf_ticks_left);

fn bf_caller_perms(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_obj(bf_args.caller_perms())))
}
bf_declare!(caller_perms, bf_caller_perms);

fn bf_set_task_perms(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let perms_for = obj_arg(&bf_args.args[0])?;
    // Non-wizards may only drop to themselves.
    let perms = bf_args.task_perms().map_err(world_state_bf_err)?;
    if !perms.is_wizard() && perms_for != perms.who {
        return Err(BfErr::Code(E_PERM));
    }
    bf_args.exec_state.set_task_perms(perms_for);
    Ok(Ret(v_none()))
}
bf_declare!(set_task_perms, bf_set_task_perms);

fn bf_callers(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let callers = bf_args.exec_state.callers();
    Ok(Ret(v_list(
        &callers
            .iter()
            .map(|c| {
                v_list(&[
                    v_obj(c.this),
                    v_string(c.verb_name.to_string()),
                    v_obj(c.programmer),
                    v_obj(c.definer),
                    v_obj(c.player),
                    v_int(c.line_number as i64),
                ])
            })
            .collect::<Vec<Var>>(),
    )))
}
bf_declare!(callers, bf_callers);

fn bf_dump_database(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let perms = bf_args.task_perms().map_err(world_state_bf_err)?;
    if !perms.is_wizard() {
        return Err(BfErr::Code(E_PERM));
    }
    bf_args.task_scheduler_client.checkpoint();
    Ok(Ret(v_none()))
}
bf_declare!(dump_database, bf_dump_database);

fn bf_shutdown(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let msg = if bf_args.args.is_empty() {
        None
    } else {
        let Var::Str(msg) = &bf_args.args[0] else {
            return Err(BfErr::Code(E_TYPE));
        };
        Some(msg.as_str().to_string())
    };
    let perms = bf_args.task_perms().map_err(world_state_bf_err)?;
    if !perms.is_wizard() {
        return Err(BfErr::Code(E_PERM));
    }
    bf_args.task_scheduler_client.shutdown(msg);
    Ok(Ret(v_none()))
}
bf_declare!(shutdown, bf_shutdown);

fn bf_load_server_options(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let perms = bf_args.task_perms().map_err(world_state_bf_err)?;
    if !perms.is_wizard() {
        return Err(BfErr::Code(E_PERM));
    }
    let mut config = bf_args.config.write().unwrap();
    config.load_server_options(bf_args.world_state, perms.who);
    info!("server options reloaded");
    Ok(Ret(v_none()))
}
bf_declare!(load_server_options, bf_load_server_options);

fn bf_server_log(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let Var::Str(msg) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let perms = bf_args.task_perms().map_err(world_state_bf_err)?;
    if !perms.is_wizard() {
        return Err(BfErr::Code(E_PERM));
    }
    let is_error = bf_args.args.len() == 2 && bf_args.args[1].is_true();
    if is_error {
        error!("server_log: {}", msg);
    } else {
        info!("server_log: {}", msg);
    }
    Ok(Ret(v_none()))
}
bf_declare!(server_log, bf_server_log);

fn bf_server_version(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let _ = bf_args;
    Ok(Ret(v_str(env!("CARGO_PKG_VERSION"))))
}
bf_declare!(server_version, bf_server_version);

fn bf_memory_usage(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let _ = bf_args;
    // Allocator block statistics are not available; an empty list is the
    // documented fallback.
    Ok(Ret(v_list(&[])))
}
bf_declare!(memory_usage, bf_memory_usage);

fn bf_db_disk_size(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let usage = bf_args
        .world_state
        .db_usage()
        .map_err(world_state_bf_err)?;
    Ok(Ret(v_int(usage as i64)))
}
bf_declare!(db_disk_size, bf_db_disk_size);

fn bf_verb_cache_stats(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let perms = bf_args.task_perms().map_err(world_state_bf_err)?;
    if !perms.is_wizard() {
        return Err(BfErr::Code(E_PERM));
    }
    // No verb cache in this implementation; the shape is preserved.
    Ok(Ret(v_list(&[
        v_int(0),
        v_int(0),
        v_int(0),
        v_int(0),
        v_list(&[]),
    ])))
}
bf_declare!(verb_cache_stats, bf_verb_cache_stats);

fn bf_log_cache_stats(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let perms = bf_args.task_perms().map_err(world_state_bf_err)?;
    if !perms.is_wizard() {
        return Err(BfErr::Code(E_PERM));
    }
    info!("verb cache stats: no cache");
    Ok(Ret(v_none()))
}
bf_declare!(log_cache_stats, bf_log_cache_stats);

pub(crate) fn register_bf_server(builtins: &mut [Arc<dyn BuiltinFunction>]) {
    builtins[offset_for_builtin("notify")] = Arc::new(BfNotify {});
    builtins[offset_for_builtin("connected_players")] = Arc::new(BfConnectedPlayers {});
    builtins[offset_for_builtin("connected_seconds")] = Arc::new(BfConnectedSeconds {});
    builtins[offset_for_builtin("idle_seconds")] = Arc::new(BfIdleSeconds {});
    builtins[offset_for_builtin("boot_player")] = Arc::new(BfBootPlayer {});
    builtins[offset_for_builtin("connection_name")] = Arc::new(BfConnectionName {});
    builtins[offset_for_builtin("connection_option")] = Arc::new(BfConnectionOption {});
    builtins[offset_for_builtin("set_connection_option")] = Arc::new(BfSetConnectionOption {});
    builtins[offset_for_builtin("listen")] = Arc::new(BfListen {});
    builtins[offset_for_builtin("unlisten")] = Arc::new(BfUnlisten {});
    builtins[offset_for_builtin("listeners")] = Arc::new(BfListeners {});
    builtins[offset_for_builtin("open_network_connection")] =
        Arc::new(BfOpenNetworkConnection {});
    builtins[offset_for_builtin("time")] = Arc::new(BfTime {});
    builtins[offset_for_builtin("ctime")] = Arc::new(BfCtime {});
    builtins[offset_for_builtin("task_id")] = Arc::new(BfTaskId {});
    builtins[offset_for_builtin("queued_tasks")] = Arc::new(BfQueuedTasks {});
    builtins[offset_for_builtin("queue_info")] = Arc::new(BfQueueInfo {});
    builtins[offset_for_builtin("kill_task")] = Arc::new(BfKillTask {});
    builtins[offset_for_builtin("resume")] = Arc::new(BfResume {});
    builtins[offset_for_builtin("suspend")] = Arc::new(BfSuspend {});
    builtins[offset_for_builtin("read")] = Arc::new(BfRead {});
    builtins[offset_for_builtin("seconds_left")] = Arc::new(BfSecondsLeft {});
    builtins[offset_for_builtin("ticks_left")] = Arc::new(BfTicksLeft {});
    builtins[offset_for_builtin("caller_perms")] = Arc::new(BfCallerPerms {});
    builtins[offset_for_builtin("set_task_perms")] = Arc::new(BfSetTaskPerms {});
    builtins[offset_for_builtin("callers")] = Arc::new(BfCallers {});
    builtins[offset_for_builtin("dump_database")] = Arc::new(BfDumpDatabase {});
    builtins[offset_for_builtin("shutdown")] = Arc::new(BfShutdown {});
    builtins[offset_for_builtin("load_server_options")] = Arc::new(BfLoadServerOptions {});
    builtins[offset_for_builtin("server_log")] = Arc::new(BfServerLog {});
    builtins[offset_for_builtin("server_version")] = Arc::new(BfServerVersion {});
    builtins[offset_for_builtin("memory_usage")] = Arc::new(BfMemoryUsage {});
    builtins[offset_for_builtin("db_disk_size")] = Arc::new(BfDbDiskSize {});
    builtins[offset_for_builtin("verb_cache_stats")] = Arc::new(BfVerbCacheStats {});
    builtins[offset_for_builtin("log_cache_stats")] = Arc::new(BfLogCacheStats {});
}
