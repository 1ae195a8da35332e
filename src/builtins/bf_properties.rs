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
use crate::compiler::offset_for_builtin;
use crate::model::props::{PropAttrs, PropPerms};
use crate::var::Error::{E_INVARG, E_TYPE};
use crate::var::{v_bool, v_list, v_none, v_obj, v_str, Objid, Symbol, Var};

/// Parse the `{owner, perms [, new-name]}` info list shared by
/// `set_property_info` and `add_property`.
fn prop_info_from(info: &Var) -> Result<(Objid, crate::util::BitEnum<crate::model::PropFlag>, Option<Symbol>), BfErr> {
    let Var::List(info) = info else {
        return Err(BfErr::Code(E_TYPE));
    };
    if info.len() < 2 || info.len() > 3 {
        return Err(BfErr::Code(E_INVARG));
    }
    let Var::Obj(owner) = info.index(1).map_err(BfErr::Code)? else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Var::Str(perms) = info.index(2).map_err(BfErr::Code)? else {
        return Err(BfErr::Code(E_TYPE));
    };
    let flags = PropPerms::parse_perms_string(perms.as_str()).ok_or(BfErr::Code(E_INVARG))?;
    let new_name = if info.len() == 3 {
        let Var::Str(name) = info.index(3).map_err(BfErr::Code)? else {
            return Err(BfErr::Code(E_TYPE));
        };
        Some(Symbol::mk(name.as_str()))
    } else {
        None
    };
    Ok((owner, flags, new_name))
}

fn obj_and_prop(bf_args: &BfCallState<'_>) -> Result<(Objid, Symbol), BfErr> {
    let Var::Obj(obj) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Var::Str(name) = &bf_args.args[1] else {
        return Err(BfErr::Code(E_TYPE));
    };
    Ok((*obj, Symbol::mk(name.as_str())))
}

fn bf_properties(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let Var::Obj(obj) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let props = bf_args
        .world_state
        .properties(bf_args.task_perms_who(), *obj)
        .map_err(world_state_bf_err)?;
    let names: Vec<Var> = props.iter().map(|pd| v_str(pd.name.as_str())).collect();
    Ok(Ret(v_list(&names)))
}
bf_declare!(properties, bf_properties);

fn bf_property_info(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let (obj, pname) = obj_and_prop(bf_args)?;
    let (_def, perms) = bf_args
        .world_state
        .get_property_info(bf_args.task_perms_who(), obj, pname)
        .map_err(world_state_bf_err)?;
    Ok(Ret(v_list(&[
        v_obj(perms.owner),
        v_str(&perms.perms_string()),
    ])))
}
bf_declare!(property_info, bf_property_info);

fn bf_set_property_info(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let (obj, pname) = obj_and_prop(bf_args)?;
    let (owner, flags, new_name) = prop_info_from(&bf_args.args[2])?;
    let attrs = PropAttrs {
        owner: Some(owner),
        flags: Some(flags),
        new_name,
        value: None,
    };
    bf_args
        .world_state
        .set_property_info(bf_args.task_perms_who(), obj, pname, attrs)
        .map_err(world_state_bf_err)?;
    Ok(Ret(v_none()))
}
bf_declare!(set_property_info, bf_set_property_info);

fn bf_add_property(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let (obj, pname) = obj_and_prop(bf_args)?;
    let value = bf_args.args[2].clone();
    let (owner, flags, new_name) = prop_info_from(&bf_args.args[3])?;
    if new_name.is_some() {
        return Err(BfErr::Code(E_INVARG));
    }
    bf_args
        .world_state
        .define_property(
            bf_args.task_perms_who(),
            obj,
            pname,
            owner,
            flags,
            Some(value),
        )
        .map_err(world_state_bf_err)?;
    Ok(Ret(v_none()))
}
bf_declare!(add_property, bf_add_property);

fn bf_delete_property(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let (obj, pname) = obj_and_prop(bf_args)?;
    bf_args
        .world_state
        .delete_property(bf_args.task_perms_who(), obj, pname)
        .map_err(world_state_bf_err)?;
    Ok(Ret(v_none()))
}
bf_declare!(delete_property, bf_delete_property);

fn bf_clear_property(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let (obj, pname) = obj_and_prop(bf_args)?;
    bf_args
        .world_state
        .clear_property(bf_args.task_perms_who(), obj, pname)
        .map_err(world_state_bf_err)?;
    Ok(Ret(v_none()))
}
bf_declare!(clear_property, bf_clear_property);

fn bf_is_clear_property(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let (obj, pname) = obj_and_prop(bf_args)?;
    let clear = bf_args
        .world_state
        .is_property_clear(bf_args.task_perms_who(), obj, pname)
        .map_err(world_state_bf_err)?;
    Ok(Ret(v_bool(clear)))
}
bf_declare!(is_clear_property, bf_is_clear_property);

pub(crate) fn register_bf_properties(builtins: &mut [Arc<dyn BuiltinFunction>]) {
    builtins[offset_for_builtin("properties")] = Arc::new(BfProperties {});
    builtins[offset_for_builtin("property_info")] = Arc::new(BfPropertyInfo {});
    builtins[offset_for_builtin("set_property_info")] = Arc::new(BfSetPropertyInfo {});
    builtins[offset_for_builtin("add_property")] = Arc::new(BfAddProperty {});
    builtins[offset_for_builtin("delete_property")] = Arc::new(BfDeleteProperty {});
    builtins[offset_for_builtin("clear_property")] = Arc::new(BfClearProperty {});
    builtins[offset_for_builtin("is_clear_property")] = Arc::new(BfIsClearProperty {});
}
