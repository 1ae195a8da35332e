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

//! The opcode fetch/execute loop. One opcode is one tick.

use std::sync::Arc;
use std::time::Duration;

use crate::compiler::Op;
use crate::model::WorldStateError;
use crate::model::WorldState;
use crate::tasks::sessions::Session;
use crate::var::Error::{E_ARGS, E_INVARG, E_TYPE, E_VARNF};
use crate::var::{v_bool, v_err, v_int, v_list, v_none, List, Objid, Symbol, Var};
use crate::vm::activation::Frame;
use crate::vm::frame::{CatchType, ScopeType};
use crate::vm::vm_call::VmExecParams;
use crate::vm::vm_unwind::FinallyReason;
use crate::vm::{ExecutionResult, Fork, VMExecState};

macro_rules! binary_var_op {
    ( $f:ident, $state:ident, $op:ident ) => {{
        let rhs = $f.pop();
        let lhs = $f.peek_top();
        match lhs.$op(&rhs) {
            Ok(result) => $f.poke(0, result),
            Err(err_code) => {
                $f.pop();
                return $state.push_error(err_code);
            }
        }
    }};
}

macro_rules! binary_cmp_op {
    ( $f:ident, $state:ident, $($ord:pat_param)|+ ) => {{
        let rhs = $f.pop();
        let lhs = $f.peek_top();
        match lhs.cmp_order(&rhs) {
            Ok(ordering) => {
                let result = matches!(ordering, $($ord)|+);
                $f.poke(0, v_bool(result))
            }
            Err(err_code) => {
                $f.pop();
                return $state.push_error(err_code);
            }
        }
    }};
}

/// Execute opcodes from the top MOO frame until the tick slice is spent or
/// something interesting happens.
pub fn moo_frame_execute(
    exec_params: &VmExecParams,
    state: &mut VMExecState,
    world_state: &mut dyn WorldState,
    session: Arc<dyn Session>,
) -> ExecutionResult {
    let opcodes = {
        let a = state.top_mut();
        let Frame::Moo(ref f) = a.frame else {
            panic!("non-MOO frame in moo_frame_execute");
        };
        f.program.main_vector.clone()
    };

    if opcodes.is_empty() {
        return state.unwind_stack(FinallyReason::Return(v_none()));
    }

    // The slice bounds how long we run before yielding back to the host so
    // it can check budgets and kill requests.
    let mut tick_slice_count = 0;
    while tick_slice_count < state.tick_slice {
        tick_slice_count += 1;
        state.tick_count += 1;

        let a = state.top_mut();
        let permissions = a.permissions;
        let player = a.player;
        let task_id = state.task_id;
        let a = state.top_mut();
        let Frame::Moo(ref mut f) = a.frame else {
            panic!("non-MOO frame in moo_frame_execute");
        };

        let op = &opcodes[f.pc];
        f.pc += 1;

        match op {
            Op::If(label) | Op::Eif(label) | Op::While(label) | Op::IfQues(label) => {
                let cond = f.pop();
                if !cond.is_true() {
                    f.jump(label);
                }
            }
            Op::WhileId { id, end_label } => {
                let v = f.pop();
                let is_true = v.is_true();
                f.set_variable(id, v);
                if !is_true {
                    f.jump(end_label);
                }
            }
            Op::Jump { label } => {
                f.jump(label);
            }
            Op::ForList { id, end_label } => {
                let (count, list) = f.peek2();
                let Var::Int(count) = count else {
                    f.pop();
                    f.pop();
                    // Jump out before raising, so a non-d verb does not keep
                    // looping against a ruined stack.
                    f.jump(end_label);
                    return state.raise_error(E_TYPE);
                };
                let count = *count as usize;
                let Var::List(l) = list else {
                    f.pop();
                    f.pop();
                    f.jump(end_label);
                    return state.raise_error(E_TYPE);
                };

                if count >= l.len() {
                    f.pop();
                    f.pop();
                    f.jump(end_label);
                    continue;
                }

                let element = l.get(count).unwrap().clone();
                f.set_variable(id, element);
                f.poke(0, v_int((count + 1) as i64));
            }
            Op::ForRange { id, end_label } => {
                let (from, next_val) = {
                    let (to, from) = f.peek2();
                    let next_val = match (to, from) {
                        (Var::Int(to_i), Var::Int(from_i)) => {
                            if from_i > to_i {
                                f.pop();
                                f.pop();
                                f.jump(end_label);
                                continue;
                            }
                            v_int(from_i + 1)
                        }
                        (Var::Obj(to_o), Var::Obj(from_o)) => {
                            if from_o > to_o {
                                f.pop();
                                f.pop();
                                f.jump(end_label);
                                continue;
                            }
                            Var::Obj(Objid(from_o.0 + 1))
                        }
                        (_, _) => {
                            f.pop();
                            f.pop();
                            f.jump(end_label);
                            return state.raise_error(E_TYPE);
                        }
                    };
                    (from.clone(), next_val)
                };
                f.poke(1, next_val);
                f.set_variable(id, from);
            }
            Op::Pop => {
                f.pop();
            }
            Op::ImmNone => f.push(v_none()),
            Op::ImmInt(v) => f.push(v_int(*v)),
            Op::ImmFloat(v) => f.push(Var::Float(*v)),
            Op::ImmObjid(v) => f.push(Var::Obj(*v)),
            Op::ImmErr(v) => f.push(v_err(*v)),
            Op::ImmEmptyList => f.push(Var::List(List::empty())),
            Op::Imm(slot) => {
                // Avoid the stack churn for literals that are immediately
                // discarded (bare string "comments").
                match opcodes.get(f.pc) {
                    Some(Op::Pop) => {
                        f.pc += 1;
                        continue;
                    }
                    _ => {
                        let value = f.program.literals[slot.0 as usize].clone();
                        f.push(value);
                    }
                }
            }
            Op::MakeSingletonList => {
                let v = f.peek_top().clone();
                f.poke(0, v_list(&[v]));
            }
            Op::ListAddTail => {
                let tail = f.pop();
                let Var::List(list) = f.peek_top() else {
                    f.pop();
                    return state.push_error(E_TYPE);
                };
                let result = list.push(tail);
                f.poke(0, Var::List(result));
            }
            Op::ListAppend => {
                let tail = f.pop();
                let Var::List(tail) = tail else {
                    f.pop();
                    return state.push_error(E_TYPE);
                };
                let Var::List(list) = f.peek_top() else {
                    f.pop();
                    return state.push_error(E_TYPE);
                };
                let result = list.append(&tail);
                f.poke(0, Var::List(result));
            }
            Op::CheckListForSplice => {
                if !matches!(f.peek_top(), Var::List(_)) {
                    f.pop();
                    return state.push_error(E_TYPE);
                }
            }
            Op::IndexSet => {
                let rhs = f.pop();
                let index = f.pop();
                let lhs = f.peek_top();
                match lhs.index_set(&index, &rhs) {
                    Ok(v) => f.poke(0, v),
                    Err(e) => {
                        f.pop();
                        return state.push_error(e);
                    }
                }
            }
            Op::RangeSet => {
                let value = f.pop();
                let to = f.pop();
                let from = f.pop();
                let base = f.peek_top();
                match base.range_set(&from, &to, &value) {
                    Ok(v) => f.poke(0, v),
                    Err(e) => {
                        f.pop();
                        return state.push_error(e);
                    }
                }
            }
            Op::PutTemp => {
                f.temp = f.peek_top().clone();
            }
            Op::PushTemp => {
                let tmp = std::mem::replace(&mut f.temp, v_none());
                f.push(tmp);
            }
            Op::Eq => {
                let rhs = f.pop();
                let lhs = f.peek_top();
                let result = *lhs == rhs;
                f.poke(0, v_bool(result));
            }
            Op::Ne => {
                let rhs = f.pop();
                let lhs = f.peek_top();
                let result = *lhs != rhs;
                f.poke(0, v_bool(result));
            }
            Op::Gt => binary_cmp_op!(f, state, std::cmp::Ordering::Greater),
            Op::Lt => binary_cmp_op!(f, state, std::cmp::Ordering::Less),
            Op::Ge => {
                binary_cmp_op!(
                    f,
                    state,
                    std::cmp::Ordering::Greater | std::cmp::Ordering::Equal
                )
            }
            Op::Le => {
                binary_cmp_op!(
                    f,
                    state,
                    std::cmp::Ordering::Less | std::cmp::Ordering::Equal
                )
            }
            Op::In => {
                let lhs = f.pop();
                let rhs = f.peek_top();
                match lhs.index_in(rhs) {
                    Ok(v) => f.poke(0, v),
                    Err(e) => {
                        f.pop();
                        return state.push_error(e);
                    }
                }
            }
            Op::Mul => binary_var_op!(f, state, mul),
            Op::Sub => binary_var_op!(f, state, sub),
            Op::Div => binary_var_op!(f, state, div),
            Op::Mod => binary_var_op!(f, state, modulus),
            Op::Add => binary_var_op!(f, state, add),
            Op::Exp => binary_var_op!(f, state, pow),
            Op::And(label) => {
                let v = f.peek_top().is_true();
                if !v {
                    f.jump(label)
                } else {
                    f.pop();
                }
            }
            Op::Or(label) => {
                let v = f.peek_top().is_true();
                if v {
                    f.jump(label);
                } else {
                    f.pop();
                }
            }
            Op::Not => {
                let v = !f.peek_top().is_true();
                f.poke(0, v_bool(v));
            }
            Op::UnaryMinus => {
                let v = f.peek_top();
                match v.negative() {
                    Ok(v) => f.poke(0, v),
                    Err(e) => {
                        f.pop();
                        return state.push_error(e);
                    }
                }
            }
            Op::Push(ident) => {
                let Some(v) = f.get_env(ident) else {
                    return state.push_error(E_VARNF);
                };
                let v = v.clone();
                f.push(v);
            }
            Op::Put(ident) => {
                let v = f.peek_top().clone();
                f.set_variable(ident, v);
            }
            Op::PushRef => {
                let (index, value) = f.peek2();
                match value.index(index) {
                    Ok(v) => f.push(v),
                    Err(e) => {
                        f.pop();
                        return state.push_error(e);
                    }
                }
            }
            Op::Ref => {
                let index = f.pop();
                let value = f.peek_top();
                match value.index(&index) {
                    Ok(v) => f.poke(0, v),
                    Err(e) => {
                        f.pop();
                        return state.push_error(e);
                    }
                }
            }
            Op::RangeRef => {
                let to = f.pop();
                let from = f.pop();
                let base = f.peek_top();
                match base.range(&from, &to) {
                    Ok(v) => f.poke(0, v),
                    Err(e) => {
                        f.pop();
                        return state.push_error(e);
                    }
                }
            }
            Op::Length(offset) => {
                let v = f.peek_abs(offset.0 as usize);
                match v.len() {
                    Ok(l) => f.push(v_int(l)),
                    Err(e) => return state.push_error(e),
                }
            }
            Op::GetProp | Op::PushGetProp => {
                let push_form = matches!(op, Op::PushGetProp);
                let (propname, obj) = if push_form {
                    let (propname, obj) = f.peek2();
                    (propname.clone(), obj.clone())
                } else {
                    let propname = f.pop();
                    (propname, f.peek_top().clone())
                };
                let Var::Str(propname) = propname else {
                    return state.push_error(E_TYPE);
                };
                let Var::Obj(obj) = obj else {
                    return state.push_error(crate::var::Error::E_INVIND);
                };
                let result =
                    world_state.retrieve_property(permissions, obj, Symbol::mk(propname.as_str()));
                match result {
                    Ok(v) => {
                        if push_form {
                            f.push(v);
                        } else {
                            f.poke(0, v);
                        }
                    }
                    Err(WorldStateError::RollbackRetry) => {
                        return ExecutionResult::RollbackRestart
                    }
                    Err(e) => {
                        return state.push_error(e.to_error_code());
                    }
                }
            }
            Op::PutProp => {
                let rhs = f.pop();
                let propname = f.pop();
                let obj = f.peek_top().clone();
                let (Var::Str(propname), Var::Obj(obj)) = (propname, obj) else {
                    return state.push_error(E_TYPE);
                };
                let update_result = world_state.update_property(
                    permissions,
                    obj,
                    Symbol::mk(propname.as_str()),
                    &rhs,
                );
                match update_result {
                    Ok(()) => {
                        f.poke(0, rhs);
                    }
                    Err(WorldStateError::RollbackRetry) => {
                        return ExecutionResult::RollbackRestart
                    }
                    Err(e) => {
                        return state.push_error(e.to_error_code());
                    }
                }
            }
            Op::Fork { id, fv_offset } => {
                let time = f.pop();
                let time = match time {
                    Var::Int(time) => time as f64,
                    Var::Float(time) => time,
                    _ => {
                        return state.push_error(E_TYPE);
                    }
                };
                if time < 0.0 {
                    return state.push_error(E_INVARG);
                }
                let delay = (time != 0.0).then(|| Duration::from_secs_f64(time));
                let id = *id;
                let fv_offset = *fv_offset;
                let new_activation = state.top_mut().clone();
                let fork = Fork {
                    player,
                    progr: permissions,
                    parent_task_id: task_id,
                    delay,
                    activation: new_activation,
                    fork_vector_offset: fv_offset,
                    task_id: id,
                };
                return ExecutionResult::DispatchFork(fork);
            }
            Op::Pass => {
                let args = f.pop();
                let Var::List(args) = args else {
                    return state.push_error(E_TYPE);
                };
                return state.prepare_pass_verb(world_state, &args);
            }
            Op::CallVerb => {
                let args = f.pop();
                let verb = f.pop();
                let obj = f.pop();
                let (Var::List(args), Var::Str(verb)) = (args, verb) else {
                    return state.push_error(E_TYPE);
                };
                let Var::Obj(obj) = obj else {
                    return state.push_error(crate::var::Error::E_INVIND);
                };
                let verb = Symbol::mk(verb.as_str());
                return state.prepare_call_verb(world_state, obj, verb, args);
            }
            Op::Return => {
                let ret_val = f.pop();
                return state.unwind_stack(FinallyReason::Return(ret_val));
            }
            Op::Return0 => {
                return state.unwind_stack(FinallyReason::Return(v_int(0)));
            }
            Op::Done => {
                return state.unwind_stack(FinallyReason::Return(v_none()));
            }
            Op::FuncCall { id } => {
                let args = f.pop();
                let Var::List(args) = args else {
                    return state.push_error(E_ARGS);
                };
                let id = *id;
                let args: Vec<Var> = args.iter().cloned().collect();
                return state.call_builtin_function(
                    id,
                    args,
                    exec_params,
                    world_state,
                    session.clone(),
                );
            }
            Op::PushCatchLabel(label) => {
                let error_codes = f.pop();
                match error_codes {
                    Var::List(codes) => {
                        let mut errors = Vec::with_capacity(codes.len());
                        for v in codes.iter() {
                            let Var::Err(e) = v else {
                                return state.push_error(E_INVARG);
                            };
                            errors.push(*e);
                        }
                        f.catch_stack.push((CatchType::Errors(errors), *label));
                    }
                    Var::Int(0) => {
                        f.catch_stack.push((CatchType::Any, *label));
                    }
                    _ => {
                        return state.push_error(E_INVARG);
                    }
                }
            }
            Op::TryExcept {
                num_excepts,
                end_label,
            } => {
                let split = f.catch_stack.len() - num_excepts;
                let catches = f.catch_stack.split_off(split);
                f.push_scope(ScopeType::TryCatch(catches), end_label);
            }
            Op::TryCatch {
                handler_label: _,
                end_label,
            } => {
                let catch = f.catch_stack.pop().expect("missing catch for TryCatch");
                f.push_scope(ScopeType::TryCatch(vec![catch]), end_label);
            }
            Op::EndCatch(label) | Op::EndExcept(label) => {
                let is_catch = matches!(op, Op::EndCatch(_));
                let v = if is_catch { f.pop() } else { v_none() };
                let handler = f.pop_scope().expect("missing handler for try/catch");
                let ScopeType::TryCatch(..) = handler.scope_type else {
                    panic!("handler is not a catch handler");
                };
                if is_catch {
                    f.push(v);
                }
                f.jump(label);
            }
            Op::TryFinally(label) => {
                f.push_scope(ScopeType::TryFinally(*label), label);
            }
            Op::EndFinally => {
                let Some(scope) = f.pop_scope() else {
                    panic!("missing finally scope");
                };
                let ScopeType::TryFinally(_) = scope.scope_type else {
                    panic!("scope is not a finally scope");
                };
                f.finally_stack.push(FinallyReason::Fallthrough);
            }
            Op::FinallyContinue => {
                let why = f.finally_stack.pop().expect("missing finally reason");
                match why {
                    FinallyReason::Fallthrough => continue,
                    FinallyReason::Raise { .. }
                    | FinallyReason::Uncaught(_)
                    | FinallyReason::Return(_)
                    | FinallyReason::Exit { .. } => {
                        return state.unwind_stack(why);
                    }
                }
            }
            Op::Exit { stack, label } => {
                return state.unwind_stack(FinallyReason::Exit {
                    stack: *stack,
                    label: *label,
                });
            }
            Op::Scatter(sa) => {
                let (nargs, rest, nreq) = {
                    let mut nargs = 0;
                    let mut rest = 0;
                    let mut nreq = 0;
                    for label in sa.labels.iter() {
                        match label {
                            crate::compiler::ScatterLabel::Rest(_) => rest += 1,
                            crate::compiler::ScatterLabel::Required(_) => nreq += 1,
                            crate::compiler::ScatterLabel::Optional(_, _) => {}
                        }
                        nargs += 1;
                    }
                    (nargs, rest, nreq)
                };
                let have_rest = rest > 0;
                let rhs_values = {
                    let Var::List(rhs_values) = f.peek_top() else {
                        f.pop();
                        return state.push_error(E_TYPE);
                    };
                    rhs_values.clone()
                };

                let len = rhs_values.len();
                if len < nreq || (!have_rest && len > nargs) {
                    f.pop();
                    return state.push_error(E_ARGS);
                }
                let mut nopt_avail = len - nreq;
                let nrest = if have_rest && len >= nargs {
                    len - nargs + 1
                } else {
                    0
                };
                let mut jump_where = None;
                let mut args_iter = rhs_values.iter();

                for label in sa.labels.iter() {
                    match label {
                        crate::compiler::ScatterLabel::Rest(id) => {
                            let mut v = vec![];
                            for _ in 0..nrest {
                                let Some(rest) = args_iter.next() else {
                                    break;
                                };
                                v.push(rest.clone());
                            }
                            f.set_variable(id, v_list(&v));
                        }
                        crate::compiler::ScatterLabel::Required(id) => {
                            let Some(arg) = args_iter.next() else {
                                return state.push_error(E_ARGS);
                            };
                            let arg = arg.clone();
                            f.set_variable(id, arg);
                        }
                        crate::compiler::ScatterLabel::Optional(id, jump_to) => {
                            if nopt_avail > 0 {
                                nopt_avail -= 1;
                                let Some(arg) = args_iter.next() else {
                                    return state.push_error(E_ARGS);
                                };
                                let arg = arg.clone();
                                f.set_variable(id, arg);
                            } else if jump_where.is_none() && jump_to.is_some() {
                                jump_where = *jump_to;
                            }
                        }
                    }
                }
                match &jump_where {
                    None => f.jump(&sa.done),
                    Some(jump_where) => f.jump(jump_where),
                }
            }
        }
    }
    ExecutionResult::More
}
