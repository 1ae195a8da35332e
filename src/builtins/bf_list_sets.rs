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
use crate::builtins::{BfCallState, BfErr, BfRet, BuiltinFunction};
use crate::compiler::offset_for_builtin;
use crate::var::Error::E_TYPE;
use crate::var::{v_int, Var};

fn bf_is_member(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let value = &bf_args.args[0];
    let Var::List(list) = &bf_args.args[1] else {
        return Err(BfErr::Code(E_TYPE));
    };
    Ok(Ret(v_int(list.index_in(value))))
}
bf_declare!(is_member, bf_is_member);

fn bf_listinsert(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let Var::List(list) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let value = bf_args.args[1].clone();
    if bf_args.args.len() == 2 {
        // Without an index, insertion is at the front.
        return Ok(Ret(Var::List(list.insert(1, value))));
    }
    let Var::Int(index) = &bf_args.args[2] else {
        return Err(BfErr::Code(E_TYPE));
    };
    Ok(Ret(Var::List(list.insert(*index, value))))
}
bf_declare!(listinsert, bf_listinsert);

fn bf_listappend(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let Var::List(list) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let value = bf_args.args[1].clone();
    if bf_args.args.len() == 2 {
        return Ok(Ret(Var::List(list.push(value))));
    }
    // With an index, appending goes after that element.
    let Var::Int(index) = &bf_args.args[2] else {
        return Err(BfErr::Code(E_TYPE));
    };
    Ok(Ret(Var::List(list.insert(index + 1, value))))
}
bf_declare!(listappend, bf_listappend);

fn bf_listdelete(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let Var::List(list) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Var::Int(index) = &bf_args.args[1] else {
        return Err(BfErr::Code(E_TYPE));
    };
    list.remove_at(*index).map(Ret).map_err(BfErr::Code)
}
bf_declare!(listdelete, bf_listdelete);

fn bf_listset(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let Var::List(list) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let value = bf_args.args[1].clone();
    let Var::Int(index) = &bf_args.args[2] else {
        return Err(BfErr::Code(E_TYPE));
    };
    list.set(*index, value).map(Ret).map_err(BfErr::Code)
}
bf_declare!(listset, bf_listset);

fn bf_setadd(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let Var::List(list) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    Ok(Ret(Var::List(list.set_add(&bf_args.args[1]))))
}
bf_declare!(setadd, bf_setadd);

fn bf_setremove(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let Var::List(list) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    Ok(Ret(Var::List(list.set_remove(&bf_args.args[1]))))
}
bf_declare!(setremove, bf_setremove);

pub(crate) fn register_bf_list_sets(builtins: &mut [Arc<dyn BuiltinFunction>]) {
    builtins[offset_for_builtin("is_member")] = Arc::new(BfIsMember {});
    builtins[offset_for_builtin("listinsert")] = Arc::new(BfListinsert {});
    builtins[offset_for_builtin("listappend")] = Arc::new(BfListappend {});
    builtins[offset_for_builtin("listdelete")] = Arc::new(BfListdelete {});
    builtins[offset_for_builtin("listset")] = Arc::new(BfListset {});
    builtins[offset_for_builtin("setadd")] = Arc::new(BfSetadd {});
    builtins[offset_for_builtin("setremove")] = Arc::new(BfSetremove {});
}
