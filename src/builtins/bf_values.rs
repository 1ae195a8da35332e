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

use md5::Digest;

use crate::bf_declare;
use crate::builtins::BfRet::{Ret, VmInstr};
use crate::builtins::{BfCallState, BfErr, BfRet, BuiltinFunction};
use crate::compiler::{compile, offset_for_builtin, ArgCount, BUILTINS};
use crate::var::Error::{E_INVARG, E_PERM, E_TYPE};
use crate::var::{v_err, v_int, v_list, v_str, v_string, Var};
use crate::vm::activation::Frame;
use crate::vm::ExecutionResult;

fn bf_typeof(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let arg = &bf_args.args[0];
    Ok(Ret(v_int(arg.type_code() as i64)))
}

// `typeof` is a reserved word in Rust, so the declaration macro cannot
// name it.
pub struct BfTypeof {}
impl BuiltinFunction for BfTypeof {
    fn name(&self) -> &str {
        "typeof"
    }
    fn call(&self, bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
        bf_typeof(bf_args)
    }
}

fn bf_tostr(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let mut result = String::new();
    for arg in &bf_args.args {
        result.push_str(&arg.to_display());
    }
    Ok(Ret(v_string(result)))
}
bf_declare!(tostr, bf_tostr);

fn bf_toliteral(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_string(bf_args.args[0].to_literal())))
}
bf_declare!(toliteral, bf_toliteral);

fn bf_toint(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    bf_args.args[0].to_int().map(Ret).map_err(BfErr::Code)
}
bf_declare!(toint, bf_toint);
bf_declare!(tonum, bf_toint);

fn bf_toobj(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    bf_args.args[0].to_obj().map(Ret).map_err(BfErr::Code)
}
bf_declare!(toobj, bf_toobj);

fn bf_tofloat(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    bf_args.args[0].to_float().map(Ret).map_err(BfErr::Code)
}
bf_declare!(tofloat, bf_tofloat);

fn bf_equal(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let (a, b) = (&bf_args.args[0], &bf_args.args[1]);
    Ok(Ret(crate::var::v_bool(a.eq_case_sensitive(b))))
}
bf_declare!(equal, bf_equal);

fn bf_value_bytes(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_int(bf_args.args[0].value_bytes() as i64)))
}
bf_declare!(value_bytes, bf_value_bytes);

/// MD5 over a string, rendered in the uppercase hex LambdaMOO uses.
pub(crate) fn md5_hex(bytes: &[u8]) -> String {
    let digest = md5::Md5::digest(bytes);
    digest
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<String>()
}

fn bf_value_hash(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let literal = bf_args.args[0].to_literal();
    Ok(Ret(v_string(md5_hex(literal.as_bytes()))))
}
bf_declare!(value_hash, bf_value_hash);

fn bf_length(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    bf_args.args[0]
        .len()
        .map(|l| Ret(v_int(l)))
        .map_err(BfErr::Code)
}
bf_declare!(length, bf_length);

fn bf_raise(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    // raise(code [, msg [, value]]): the code is conventionally an error,
    // but any value can be thrown; non-error codes abort to the coded value.
    let Var::Err(code) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let msg = if bf_args.args.len() > 1 {
        let Var::Str(msg) = &bf_args.args[1] else {
            return Err(BfErr::Code(E_TYPE));
        };
        Some(msg.as_str().to_string())
    } else {
        None
    };
    let value = if bf_args.args.len() > 2 {
        Some(bf_args.args[2].clone())
    } else {
        None
    };
    Err(BfErr::Raise(*code, msg, value))
}
bf_declare!(raise, bf_raise);

const BF_EVAL_TRAMPOLINE_DONE: usize = 0;

fn bf_eval(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let trampoline = {
        let Frame::Bf(frame) = &bf_args.exec_state.top().frame else {
            panic!("eval without a builtin frame");
        };
        frame.bf_trampoline
    };

    match trampoline {
        None => {
            // First entry: check permissions, compile, and dispatch the
            // program as a nested activation.
            let perms = bf_args.task_perms().map_err(|e| BfErr::Code(e.into()))?;
            if !perms.is_programmer() {
                return Err(BfErr::Code(E_PERM));
            }
            let Var::Str(code) = &bf_args.args[0] else {
                return Err(BfErr::Code(E_TYPE));
            };
            let program = match compile(code.as_str()) {
                Ok(program) => program,
                Err(e) => {
                    return Ok(Ret(v_list(&[v_int(0), v_list(&[v_string(e.to_string())])])));
                }
            };
            let player = bf_args.exec_state.top_player();
            let permissions = perms.who;
            {
                let Frame::Bf(frame) = &mut bf_args.exec_state.top_mut().frame else {
                    panic!("eval without a builtin frame");
                };
                frame.bf_trampoline = Some(BF_EVAL_TRAMPOLINE_DONE);
            }
            bf_args
                .exec_state
                .exec_eval_request(permissions, player, program);
            Ok(VmInstr(ExecutionResult::More))
        }
        Some(BF_EVAL_TRAMPOLINE_DONE) => {
            // The evaluated program returned into our frame.
            let Frame::Bf(frame) = &bf_args.exec_state.top().frame else {
                panic!("eval without a builtin frame");
            };
            let value = frame.return_value.clone().unwrap_or(v_err(E_INVARG));
            Ok(Ret(v_list(&[v_int(1), value])))
        }
        Some(_) => Err(BfErr::Code(E_INVARG)),
    }
}
bf_declare!(eval, bf_eval);

fn bf_function_info(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let describe = |desc: &crate::compiler::Builtin| {
        let min = match desc.min_args {
            ArgCount::Q(n) => v_int(n as i64),
            ArgCount::U => v_int(-1),
        };
        let max = match desc.max_args {
            ArgCount::Q(n) => v_int(n as i64),
            ArgCount::U => v_int(-1),
        };
        let types: Vec<Var> = desc
            .types
            .iter()
            .map(|t| match t {
                crate::compiler::builtins::ArgType::Typed(vt) => v_int(*vt as i64),
                crate::compiler::builtins::ArgType::Any => v_int(crate::var::TYPE_ANY),
                crate::compiler::builtins::ArgType::AnyNum => v_int(crate::var::TYPE_NUMERIC),
            })
            .collect();
        v_list(&[
            v_str(desc.name.as_str()),
            min,
            max,
            v_list(&types),
        ])
    };

    if bf_args.args.len() == 1 {
        let Var::Str(name) = &bf_args.args[0] else {
            return Err(BfErr::Code(E_TYPE));
        };
        let Some(id) = BUILTINS.find_builtin(&crate::var::Symbol::mk(name.as_str())) else {
            return Err(BfErr::Code(E_INVARG));
        };
        let desc = BUILTINS.description_for(id).ok_or(BfErr::Code(E_INVARG))?;
        return Ok(Ret(describe(desc)));
    }
    let all: Vec<Var> = BUILTINS.descriptors.iter().map(describe).collect();
    Ok(Ret(v_list(&all)))
}
bf_declare!(function_info, bf_function_info);

pub(crate) fn register_bf_values(builtins: &mut [Arc<dyn BuiltinFunction>]) {
    builtins[offset_for_builtin("typeof")] = Arc::new(BfTypeof {});
    builtins[offset_for_builtin("tostr")] = Arc::new(BfTostr {});
    builtins[offset_for_builtin("toliteral")] = Arc::new(BfToliteral {});
    builtins[offset_for_builtin("toint")] = Arc::new(BfToint {});
    builtins[offset_for_builtin("tonum")] = Arc::new(BfTonum {});
    builtins[offset_for_builtin("toobj")] = Arc::new(BfToobj {});
    builtins[offset_for_builtin("tofloat")] = Arc::new(BfTofloat {});
    builtins[offset_for_builtin("equal")] = Arc::new(BfEqual {});
    builtins[offset_for_builtin("value_bytes")] = Arc::new(BfValueBytes {});
    builtins[offset_for_builtin("value_hash")] = Arc::new(BfValueHash {});
    builtins[offset_for_builtin("length")] = Arc::new(BfLength {});
    builtins[offset_for_builtin("raise")] = Arc::new(BfRaise {});
    builtins[offset_for_builtin("eval")] = Arc::new(BfEval {});
    builtins[offset_for_builtin("function_info")] = Arc::new(BfFunctionInfo {});
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_hex_matches_known_vector() {
        // The canonical md5("") test vector.
        assert_eq!(md5_hex(b""), "D41D8CD98F00B204E9800998ECF8427E");
        assert_eq!(md5_hex(b"abc"), "900150983CD24FB0D6963F7D28E17F72");
    }
}
