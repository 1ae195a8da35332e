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

//! Object-manipulation builtins. `create`, `recycle`, and `move` have to
//! call back into MOO code (`initialize`, `recycle`, the `accept`/
//! `exitfunc`/`enterfunc` protocol), so they are written as trampolines:
//! each re-entry continues at the phase recorded in the builtin frame.

use std::sync::Arc;

use crate::bf_declare;
use crate::builtins::BfRet::{Ret, VmInstr};
use crate::builtins::{world_state_bf_err, BfCallState, BfErr, BfRet, BuiltinFunction};
use crate::compiler::offset_for_builtin;
use crate::model::{ObjFlag, WorldStateError};
use crate::var::Error::{E_INVARG, E_NACC, E_PERM, E_TYPE};
use crate::var::{v_bool, v_list, v_none, v_obj, List, Objid, Symbol, Var, NOTHING};
use crate::vm::vm_call::VerbCall;
use crate::vm::ExecutionResult;

/// Resolve `this:verb` and build the dispatch, or `None` if no such verb
/// exists anywhere on the chain.
fn dispatch_verb_if_exists(
    bf_args: &mut BfCallState<'_>,
    this: Objid,
    verb: &str,
    args: Vec<Var>,
) -> Result<Option<ExecutionResult>, BfErr> {
    let verb_name = Symbol::mk(verb);
    let perms = bf_args.task_perms_who();
    match bf_args
        .world_state
        .find_method_verb_on(perms, this, verb_name.clone())
    {
        Ok((resolved_verb, program)) => {
            let call = VerbCall {
                verb_name,
                location: this,
                this,
                player: bf_args.exec_state.top_player(),
                args: List::from_iter(args),
                argstr: "".to_string(),
                caller: bf_args.exec_state.caller(),
            };
            let permissions = resolved_verb.owner;
            Ok(Some(ExecutionResult::ContinueVerb {
                permissions,
                resolved_verb,
                program,
                call,
                command: None,
            }))
        }
        Err(WorldStateError::VerbNotFound(_, _)) => Ok(None),
        Err(e) => Err(world_state_bf_err(e)),
    }
}

fn bf_valid(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let Var::Obj(obj) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let valid = bf_args
        .world_state
        .valid(*obj)
        .map_err(world_state_bf_err)?;
    Ok(Ret(v_bool(valid)))
}
bf_declare!(valid, bf_valid);

fn bf_parent(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let Var::Obj(obj) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let parent = bf_args
        .world_state
        .parent_of(bf_args.task_perms_who(), *obj)
        .map_err(world_state_bf_err)?;
    Ok(Ret(v_obj(parent)))
}
bf_declare!(parent, bf_parent);

fn bf_children(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let Var::Obj(obj) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let children = bf_args
        .world_state
        .children_of(bf_args.task_perms_who(), *obj)
        .map_err(world_state_bf_err)?;
    let children: Vec<Var> = children.iter().map(|c| v_obj(*c)).collect();
    Ok(Ret(v_list(&children)))
}
bf_declare!(children, bf_children);

fn bf_chparent(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let (Var::Obj(obj), Var::Obj(new_parent)) = (&bf_args.args[0], &bf_args.args[1]) else {
        return Err(BfErr::Code(E_TYPE));
    };
    let perms = bf_args.task_perms_who();
    bf_args
        .world_state
        .change_parent(perms, *obj, *new_parent)
        .map_err(world_state_bf_err)?;
    Ok(Ret(v_none()))
}
bf_declare!(chparent, bf_chparent);

fn bf_max_object(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let max = bf_args
        .world_state
        .max_object()
        .map_err(world_state_bf_err)?;
    Ok(Ret(v_obj(max)))
}
bf_declare!(max_object, bf_max_object);

fn bf_players(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let players = bf_args.world_state.players().map_err(world_state_bf_err)?;
    let players: Vec<Var> = players.iter().map(|p| v_obj(*p)).collect();
    Ok(Ret(v_list(&players)))
}
bf_declare!(players, bf_players);

fn bf_is_player(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let Var::Obj(obj) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let flags = bf_args
        .world_state
        .flags_of(*obj)
        .map_err(world_state_bf_err)?;
    Ok(Ret(v_bool(flags.contains(ObjFlag::User))))
}
bf_declare!(is_player, bf_is_player);

fn bf_set_player_flag(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let Var::Obj(obj) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let value = bf_args.args[1].is_true();
    let perms = bf_args.task_perms().map_err(world_state_bf_err)?;
    if !perms.is_wizard() {
        return Err(BfErr::Code(E_PERM));
    }
    let mut flags = bf_args
        .world_state
        .flags_of(*obj)
        .map_err(world_state_bf_err)?;
    flags.set_to(ObjFlag::User, value);
    bf_args
        .world_state
        .set_flags_of(perms.who, *obj, flags)
        .map_err(world_state_bf_err)?;
    Ok(Ret(v_none()))
}
bf_declare!(set_player_flag, bf_set_player_flag);

const CREATE_TRAMPOLINE_DONE: usize = 1;

fn bf_create(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    match bf_args.bf_frame().bf_trampoline {
        None => {
            let Var::Obj(parent) = &bf_args.args[0] else {
                return Err(BfErr::Code(E_TYPE));
            };
            let parent = *parent;
            let owner = if bf_args.args.len() == 2 {
                let Var::Obj(owner) = &bf_args.args[1] else {
                    return Err(BfErr::Code(E_TYPE));
                };
                *owner
            } else {
                bf_args.task_perms_who()
            };
            let perms = bf_args.task_perms_who();
            let new_obj = bf_args
                .world_state
                .create_object(perms, parent, owner)
                .map_err(world_state_bf_err)?;

            // New objects get their initialize verb run before create
            // returns.
            match dispatch_verb_if_exists(bf_args, new_obj, "initialize", vec![])? {
                Some(dispatch) => {
                    let frame = bf_args.bf_frame_mut();
                    frame.bf_trampoline = Some(CREATE_TRAMPOLINE_DONE);
                    frame.bf_trampoline_arg = Some(v_obj(new_obj));
                    Ok(VmInstr(dispatch))
                }
                None => Ok(Ret(v_obj(new_obj))),
            }
        }
        Some(CREATE_TRAMPOLINE_DONE) => {
            let created = bf_args
                .bf_frame()
                .bf_trampoline_arg
                .clone()
                .expect("create trampoline without created object");
            Ok(Ret(created))
        }
        Some(_) => Err(BfErr::Code(E_INVARG)),
    }
}
bf_declare!(create, bf_create);

const RECYCLE_TRAMPOLINE_DESTROY: usize = 1;

fn bf_recycle(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let Var::Obj(obj) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let obj = *obj;
    match bf_args.bf_frame().bf_trampoline {
        None => {
            if !bf_args
                .world_state
                .valid(obj)
                .map_err(world_state_bf_err)?
            {
                return Err(BfErr::Code(E_INVARG));
            }
            let perms = bf_args.task_perms().map_err(world_state_bf_err)?;
            let owner = bf_args
                .world_state
                .owner_of(obj)
                .map_err(world_state_bf_err)?;
            if !perms.is_wizard() && perms.who != owner {
                return Err(BfErr::Code(E_PERM));
            }
            // The object gets a last word before destruction.
            match dispatch_verb_if_exists(bf_args, obj, "recycle", vec![])? {
                Some(dispatch) => {
                    bf_args.bf_frame_mut().bf_trampoline = Some(RECYCLE_TRAMPOLINE_DESTROY);
                    Ok(VmInstr(dispatch))
                }
                None => {
                    let perms = bf_args.task_perms_who();
                    bf_args
                        .world_state
                        .recycle_object(perms, obj)
                        .map_err(world_state_bf_err)?;
                    Ok(Ret(v_none()))
                }
            }
        }
        Some(RECYCLE_TRAMPOLINE_DESTROY) => {
            let perms = bf_args.task_perms_who();
            bf_args
                .world_state
                .recycle_object(perms, obj)
                .map_err(world_state_bf_err)?;
            Ok(Ret(v_none()))
        }
        Some(_) => Err(BfErr::Code(E_INVARG)),
    }
}
bf_declare!(recycle, bf_recycle);

// The phases of the move protocol.
const MOVE_TRAMPOLINE_ACCEPTED: usize = 1;
const MOVE_TRAMPOLINE_MOVED_EXITED: usize = 2;
const MOVE_TRAMPOLINE_ENTERED: usize = 3;

fn bf_move(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let (Var::Obj(what), Var::Obj(whereto)) = (&bf_args.args[0], &bf_args.args[1]) else {
        return Err(BfErr::Code(E_TYPE));
    };
    let (what, whereto) = (*what, *whereto);

    let mut tramp = bf_args.bf_frame().bf_trampoline.unwrap_or(0);
    loop {
        match tramp {
            0 => {
                let perms = bf_args.task_perms().map_err(world_state_bf_err)?;
                if !bf_args
                    .world_state
                    .valid(what)
                    .map_err(world_state_bf_err)?
                {
                    return Err(BfErr::Code(E_INVARG));
                }
                let owner = bf_args
                    .world_state
                    .owner_of(what)
                    .map_err(world_state_bf_err)?;
                if !perms.is_wizard() && perms.who != owner {
                    return Err(BfErr::Code(E_PERM));
                }
                if whereto == NOTHING {
                    tramp = MOVE_TRAMPOLINE_ACCEPTED;
                    continue;
                }
                if !bf_args
                    .world_state
                    .valid(whereto)
                    .map_err(world_state_bf_err)?
                {
                    return Err(BfErr::Code(E_INVARG));
                }
                match dispatch_verb_if_exists(bf_args, whereto, "accept", vec![v_obj(what)])? {
                    Some(dispatch) => {
                        bf_args.bf_frame_mut().bf_trampoline = Some(MOVE_TRAMPOLINE_ACCEPTED);
                        return Ok(VmInstr(dispatch));
                    }
                    None => {
                        // No accept verb refuses non-wizards outright.
                        if !perms.is_wizard() {
                            return Err(BfErr::Code(E_NACC));
                        }
                        tramp = MOVE_TRAMPOLINE_ACCEPTED;
                        continue;
                    }
                }
            }
            MOVE_TRAMPOLINE_ACCEPTED => {
                // Back from `accept` (or it was skipped). A false return
                // refuses the move unless a wizard is asking.
                if whereto != NOTHING {
                    let accepted = bf_args
                        .bf_frame()
                        .return_value
                        .clone()
                        .map_or(true, |v| v.is_true());
                    if !accepted {
                        let perms = bf_args.task_perms().map_err(world_state_bf_err)?;
                        if !perms.is_wizard() {
                            return Err(BfErr::Code(E_NACC));
                        }
                    }
                }
                let old_location = bf_args
                    .world_state
                    .location_of(bf_args.task_perms_who(), what)
                    .map_err(world_state_bf_err)?;
                if old_location == whereto {
                    return Ok(Ret(v_none()));
                }
                let perms = bf_args.task_perms_who();
                bf_args
                    .world_state
                    .move_object(perms, what, whereto)
                    .map_err(world_state_bf_err)?;

                let frame = bf_args.bf_frame_mut();
                frame.bf_trampoline_arg = Some(v_obj(old_location));
                if old_location.is_positive() {
                    match dispatch_verb_if_exists(
                        bf_args,
                        old_location,
                        "exitfunc",
                        vec![v_obj(what)],
                    )? {
                        Some(dispatch) => {
                            bf_args.bf_frame_mut().bf_trampoline =
                                Some(MOVE_TRAMPOLINE_MOVED_EXITED);
                            return Ok(VmInstr(dispatch));
                        }
                        None => {
                            tramp = MOVE_TRAMPOLINE_MOVED_EXITED;
                            continue;
                        }
                    }
                }
                tramp = MOVE_TRAMPOLINE_MOVED_EXITED;
            }
            MOVE_TRAMPOLINE_MOVED_EXITED => {
                if whereto.is_positive() {
                    match dispatch_verb_if_exists(bf_args, whereto, "enterfunc", vec![v_obj(what)])?
                    {
                        Some(dispatch) => {
                            bf_args.bf_frame_mut().bf_trampoline = Some(MOVE_TRAMPOLINE_ENTERED);
                            return Ok(VmInstr(dispatch));
                        }
                        None => {
                            tramp = MOVE_TRAMPOLINE_ENTERED;
                            continue;
                        }
                    }
                }
                tramp = MOVE_TRAMPOLINE_ENTERED;
            }
            MOVE_TRAMPOLINE_ENTERED => {
                return Ok(Ret(v_none()));
            }
            _ => return Err(BfErr::Code(E_INVARG)),
        }
    }
}

// `move` is a Rust keyword, so the declaration macro cannot name it.
pub struct BfMove {}
impl BuiltinFunction for BfMove {
    fn name(&self) -> &str {
        "move"
    }
    fn call(&self, bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
        bf_move(bf_args)
    }
}

fn bf_renumber(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let Var::Obj(obj) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let perms = bf_args.task_perms_who();
    let new_id = bf_args
        .world_state
        .renumber_object(perms, *obj)
        .map_err(world_state_bf_err)?;
    Ok(Ret(v_obj(new_id)))
}
bf_declare!(renumber, bf_renumber);

fn bf_reset_max_object(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let perms = bf_args.task_perms_who();
    bf_args
        .world_state
        .reset_max_object(perms)
        .map_err(world_state_bf_err)?;
    Ok(Ret(v_none()))
}
bf_declare!(reset_max_object, bf_reset_max_object);

pub(crate) fn register_bf_objects(builtins: &mut [Arc<dyn BuiltinFunction>]) {
    builtins[offset_for_builtin("valid")] = Arc::new(BfValid {});
    builtins[offset_for_builtin("parent")] = Arc::new(BfParent {});
    builtins[offset_for_builtin("children")] = Arc::new(BfChildren {});
    builtins[offset_for_builtin("chparent")] = Arc::new(BfChparent {});
    builtins[offset_for_builtin("max_object")] = Arc::new(BfMaxObject {});
    builtins[offset_for_builtin("players")] = Arc::new(BfPlayers {});
    builtins[offset_for_builtin("is_player")] = Arc::new(BfIsPlayer {});
    builtins[offset_for_builtin("set_player_flag")] = Arc::new(BfSetPlayerFlag {});
    builtins[offset_for_builtin("create")] = Arc::new(BfCreate {});
    builtins[offset_for_builtin("recycle")] = Arc::new(BfRecycle {});
    builtins[offset_for_builtin("move")] = Arc::new(BfMove {});
    builtins[offset_for_builtin("renumber")] = Arc::new(BfRenumber {});
    builtins[offset_for_builtin("reset_max_object")] = Arc::new(BfResetMaxObject {});
}
