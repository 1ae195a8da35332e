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

use crate::bf_declare;
use crate::builtins::BfRet::Ret;
use crate::builtins::{world_state_bf_err, BfCallState, BfErr, BfRet, BuiltinFunction};
use crate::compiler::{compile, offset_for_builtin};
use crate::matching::find_preposition;
use crate::model::r#match::{ArgSpec, PrepSpec, VerbArgsSpec};
use crate::model::{VerbAttrs, VerbDef};
use crate::var::Error::{E_INVARG, E_TYPE};
use crate::var::{v_list, v_none, v_obj, v_str, v_string, Objid, Symbol, Var};

/// Verbs are named either by name string or by 1-based index.
fn resolve_verbdef(
    bf_args: &mut BfCallState<'_>,
    obj: Objid,
    selector: &Var,
) -> Result<VerbDef, BfErr> {
    let perms = bf_args.task_perms_who();
    match selector {
        Var::Str(name) => bf_args
            .world_state
            .get_verb(perms, obj, Symbol::mk(name.as_str()))
            .map_err(world_state_bf_err),
        Var::Int(index) if *index >= 1 => bf_args
            .world_state
            .get_verb_at_index(perms, obj, *index as usize)
            .map_err(world_state_bf_err),
        Var::Int(_) => Err(BfErr::Code(E_INVARG)),
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

fn verb_info_from(info: &Var) -> Result<VerbAttrs, BfErr> {
    let Var::List(info) = info else {
        return Err(BfErr::Code(E_TYPE));
    };
    if info.len() != 3 {
        return Err(BfErr::Code(E_INVARG));
    }
    let Var::Obj(owner) = info.index(1).map_err(BfErr::Code)? else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Var::Str(perms) = info.index(2).map_err(BfErr::Code)? else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Var::Str(names) = info.index(3).map_err(BfErr::Code)? else {
        return Err(BfErr::Code(E_TYPE));
    };
    let flags = VerbDef::parse_perms_string(perms.as_str()).ok_or(BfErr::Code(E_INVARG))?;
    let names: Vec<Symbol> = names
        .as_str()
        .split_whitespace()
        .map(Symbol::mk)
        .collect();
    if names.is_empty() {
        return Err(BfErr::Code(E_INVARG));
    }
    Ok(VerbAttrs {
        owner: Some(owner),
        names: Some(names),
        flags: Some(flags),
        args: None,
        source: None,
    })
}

fn verb_args_from(args: &Var) -> Result<VerbArgsSpec, BfErr> {
    let Var::List(args) = args else {
        return Err(BfErr::Code(E_TYPE));
    };
    if args.len() != 3 {
        return Err(BfErr::Code(E_INVARG));
    }
    let Var::Str(dobj) = args.index(1).map_err(BfErr::Code)? else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Var::Str(prep) = args.index(2).map_err(BfErr::Code)? else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Var::Str(iobj) = args.index(3).map_err(BfErr::Code)? else {
        return Err(BfErr::Code(E_TYPE));
    };
    let dobj = ArgSpec::from_string(dobj.as_str()).ok_or(BfErr::Code(E_INVARG))?;
    let prep = match prep.as_str().to_lowercase().as_str() {
        "any" => PrepSpec::Any,
        "none" => PrepSpec::None,
        s => PrepSpec::Other(find_preposition(s).ok_or(BfErr::Code(E_INVARG))?),
    };
    let iobj = ArgSpec::from_string(iobj.as_str()).ok_or(BfErr::Code(E_INVARG))?;
    Ok(VerbArgsSpec { dobj, prep, iobj })
}

fn obj_arg(bf_args: &BfCallState<'_>) -> Result<Objid, BfErr> {
    let Var::Obj(obj) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    Ok(*obj)
}

fn bf_verbs(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args)?;
    let verbs = bf_args
        .world_state
        .verbs(bf_args.task_perms_who(), obj)
        .map_err(world_state_bf_err)?;
    let names: Vec<Var> = verbs.iter().map(|vd| v_string(vd.names_string())).collect();
    Ok(Ret(v_list(&names)))
}
bf_declare!(verbs, bf_verbs);

fn bf_verb_info(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args)?;
    let selector = bf_args.args[1].clone();
    let vd = resolve_verbdef(bf_args, obj, &selector)?;
    Ok(Ret(v_list(&[
        v_obj(vd.owner),
        v_str(&vd.perms_string()),
        v_string(vd.names_string()),
    ])))
}
bf_declare!(verb_info, bf_verb_info);

fn bf_set_verb_info(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args)?;
    let selector = bf_args.args[1].clone();
    let attrs = verb_info_from(&bf_args.args[2])?;
    let vd = resolve_verbdef(bf_args, obj, &selector)?;
    bf_args
        .world_state
        .update_verb(bf_args.task_perms_who(), obj, vd.uuid, attrs, None)
        .map_err(world_state_bf_err)?;
    Ok(Ret(v_none()))
}
bf_declare!(set_verb_info, bf_set_verb_info);

fn bf_verb_args(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args)?;
    let selector = bf_args.args[1].clone();
    let vd = resolve_verbdef(bf_args, obj, &selector)?;
    Ok(Ret(v_list(&[
        v_str(vd.args.dobj.to_string()),
        v_string(vd.args.prep.to_string()),
        v_str(vd.args.iobj.to_string()),
    ])))
}
bf_declare!(verb_args, bf_verb_args);

fn bf_set_verb_args(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args)?;
    let selector = bf_args.args[1].clone();
    let args = verb_args_from(&bf_args.args[2])?;
    let vd = resolve_verbdef(bf_args, obj, &selector)?;
    let attrs = VerbAttrs {
        args: Some(args),
        ..Default::default()
    };
    bf_args
        .world_state
        .update_verb(bf_args.task_perms_who(), obj, vd.uuid, attrs, None)
        .map_err(world_state_bf_err)?;
    Ok(Ret(v_none()))
}
bf_declare!(set_verb_args, bf_set_verb_args);

fn bf_verb_code(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args)?;
    let selector = bf_args.args[1].clone();
    let vd = resolve_verbdef(bf_args, obj, &selector)?;
    let (source, _) = bf_args
        .world_state
        .retrieve_verb_program(bf_args.task_perms_who(), obj, vd.uuid)
        .map_err(world_state_bf_err)?;
    let lines: Vec<Var> = source.lines().map(v_str).collect();
    Ok(Ret(v_list(&lines)))
}
bf_declare!(verb_code, bf_verb_code);

fn bf_set_verb_code(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args)?;
    let selector = bf_args.args[1].clone();
    let Var::List(lines) = &bf_args.args[2] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let mut source = String::new();
    for line in lines.iter() {
        let Var::Str(line) = line else {
            return Err(BfErr::Code(E_TYPE));
        };
        source.push_str(line.as_str());
        source.push('\n');
    }
    let vd = resolve_verbdef(bf_args, obj, &selector)?;

    // Compilation failure reports the diagnostics as the return value
    // rather than raising.
    let program = match compile(&source) {
        Ok(program) => program,
        Err(e) => {
            return Ok(Ret(v_list(&[v_string(e.to_string())])));
        }
    };
    let attrs = VerbAttrs {
        source: Some(source),
        ..Default::default()
    };
    bf_args
        .world_state
        .update_verb(
            bf_args.task_perms_who(),
            obj,
            vd.uuid,
            attrs,
            Some(program),
        )
        .map_err(world_state_bf_err)?;
    Ok(Ret(v_list(&[])))
}
bf_declare!(set_verb_code, bf_set_verb_code);

fn bf_add_verb(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args)?;
    let info = verb_info_from(&bf_args.args[1])?;
    let args = verb_args_from(&bf_args.args[2])?;
    let program = compile("").expect("empty program must compile");
    bf_args
        .world_state
        .add_verb(
            bf_args.task_perms_who(),
            obj,
            info.names.unwrap(),
            info.owner.unwrap(),
            info.flags.unwrap(),
            args,
            String::new(),
            program,
        )
        .map_err(world_state_bf_err)?;
    Ok(Ret(v_none()))
}
bf_declare!(add_verb, bf_add_verb);

fn bf_delete_verb(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args)?;
    let selector = bf_args.args[1].clone();
    let vd = resolve_verbdef(bf_args, obj, &selector)?;
    bf_args
        .world_state
        .remove_verb(bf_args.task_perms_who(), obj, vd.uuid)
        .map_err(world_state_bf_err)?;
    Ok(Ret(v_none()))
}
bf_declare!(delete_verb, bf_delete_verb);

fn bf_disassemble(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args)?;
    let selector = bf_args.args[1].clone();
    let vd = resolve_verbdef(bf_args, obj, &selector)?;
    let (_, program) = bf_args
        .world_state
        .retrieve_verb_program(bf_args.task_perms_who(), obj, vd.uuid)
        .map_err(world_state_bf_err)?;
    let listing = format!("{}", program);
    let lines: Vec<Var> = listing.lines().map(v_str).collect();
    Ok(Ret(v_list(&lines)))
}
bf_declare!(disassemble, bf_disassemble);

pub(crate) fn register_bf_verbs(builtins: &mut [Arc<dyn BuiltinFunction>]) {
    builtins[offset_for_builtin("verbs")] = Arc::new(BfVerbs {});
    builtins[offset_for_builtin("verb_info")] = Arc::new(BfVerbInfo {});
    builtins[offset_for_builtin("set_verb_info")] = Arc::new(BfSetVerbInfo {});
    builtins[offset_for_builtin("verb_args")] = Arc::new(BfVerbArgs {});
    builtins[offset_for_builtin("set_verb_args")] = Arc::new(BfSetVerbArgs {});
    builtins[offset_for_builtin("verb_code")] = Arc::new(BfVerbCode {});
    builtins[offset_for_builtin("set_verb_code")] = Arc::new(BfSetVerbCode {});
    builtins[offset_for_builtin("add_verb")] = Arc::new(BfAddVerb {});
    builtins[offset_for_builtin("delete_verb")] = Arc::new(BfDeleteVerb {});
    builtins[offset_for_builtin("disassemble")] = Arc::new(BfDisassemble {});
}
