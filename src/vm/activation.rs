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

use uuid::Uuid;

use crate::compiler::{BuiltinId, GlobalName, Program};
use crate::matching::ParsedCommand;
use crate::model::r#match::VerbArgsSpec;
use crate::model::{VerbDef, VerbFlag};
use crate::var::{
    v_empty_list, v_int, v_list, v_obj, v_str, v_string, List, Objid, Symbol, Var, NOTHING,
};
use crate::vm::frame::MooStackFrame;
use crate::vm::vm_call::VerbCall;

/// One frame of the call stack: the interpreter state for a verb (or the
/// bookkeeping for an in-flight builtin call), plus the verb-call context
/// MOO exposes through `this`, `caller`, `callers()` and permissions.
#[derive(Debug, Clone)]
pub struct Activation {
    pub frame: Frame,
    pub this: Objid,
    pub player: Objid,
    pub args: List,
    pub verb_name: Symbol,
    pub verbdef: VerbDef,
    /// Whose permissions the frame runs under; initially the verb owner,
    /// adjustable by `set_task_perms`.
    pub permissions: Objid,
    pub command: Option<ParsedCommand>,
}

#[derive(Debug, Clone)]
pub enum Frame {
    Moo(MooStackFrame),
    Bf(BfFrame),
}

/// Builtin-call frame. The trampoline number lets a builtin that has to
/// call back into MOO code (`move`'s accept/enterfunc protocol, say) record
/// where to pick up when the VM returns to it.
#[derive(Debug, Clone)]
pub struct BfFrame {
    pub bf_id: BuiltinId,
    pub bf_trampoline: Option<usize>,
    pub bf_trampoline_arg: Option<Var>,
    pub return_value: Option<Var>,
}

impl Activation {
    pub fn is_builtin_frame(&self) -> bool {
        matches!(self.frame, Frame::Bf(_))
    }

    /// Whether errors raised in this frame unwind (the verb `d' bit).
    pub fn debug_bit(&self) -> bool {
        self.verbdef.flags.contains(VerbFlag::Debug)
    }

    pub fn verb_definer(&self) -> Objid {
        match self.frame {
            Frame::Bf(_) => NOTHING,
            _ => self.verbdef.location,
        }
    }

    pub fn verb_owner(&self) -> Objid {
        self.verbdef.owner
    }

    /// Build the activation for a verb call, populating the frame globals.
    pub fn for_call(
        permissions: Objid,
        resolved_verb: VerbDef,
        program: Program,
        call: &VerbCall,
        command: Option<ParsedCommand>,
    ) -> Self {
        let mut frame = MooStackFrame::new(program);
        frame.set_gvar(GlobalName::this, v_obj(call.this));
        frame.set_gvar(GlobalName::player, v_obj(call.player));
        frame.set_gvar(GlobalName::caller, v_obj(call.caller));
        frame.set_gvar(GlobalName::verb, v_string(call.verb_name.to_string()));
        frame.set_gvar(GlobalName::args, Var::List(call.args.clone()));
        frame.set_gvar(GlobalName::argstr, v_string(call.argstr.clone()));
        set_constant_gvars(&mut frame);

        match &command {
            Some(cmd) => {
                frame.set_gvar(GlobalName::dobj, v_obj(cmd.dobj));
                frame.set_gvar(GlobalName::dobjstr, v_str(&cmd.dobjstr));
                frame.set_gvar(GlobalName::prepstr, v_str(&cmd.prepstr));
                frame.set_gvar(GlobalName::iobj, v_obj(cmd.iobj));
                frame.set_gvar(GlobalName::iobjstr, v_str(&cmd.iobjstr));
            }
            None => {
                frame.set_gvar(GlobalName::dobj, v_obj(NOTHING));
                frame.set_gvar(GlobalName::dobjstr, v_str(""));
                frame.set_gvar(GlobalName::prepstr, v_str(""));
                frame.set_gvar(GlobalName::iobj, v_obj(NOTHING));
                frame.set_gvar(GlobalName::iobjstr, v_str(""));
            }
        }

        Self {
            frame: Frame::Moo(frame),
            this: call.this,
            player: call.player,
            args: call.args.clone(),
            verb_name: call.verb_name.clone(),
            verbdef: resolved_verb,
            permissions,
            command,
        }
    }

    /// Activation for an `eval` task: a synthetic debug-bit verb owned by
    /// the programmer.
    pub fn for_eval(permissions: Objid, player: Objid, program: Program) -> Self {
        let verbdef = VerbDef {
            uuid: Uuid::new_v4(),
            location: NOTHING,
            owner: permissions,
            names: vec![Symbol::mk("eval")],
            flags: VerbFlag::rxd(),
            args: VerbArgsSpec::this_none_this(),
        };
        let mut frame = MooStackFrame::new(program);
        frame.set_gvar(GlobalName::this, v_obj(NOTHING));
        frame.set_gvar(GlobalName::player, v_obj(player));
        frame.set_gvar(GlobalName::caller, v_obj(player));
        frame.set_gvar(GlobalName::verb, v_str(""));
        frame.set_gvar(GlobalName::args, v_empty_list());
        frame.set_gvar(GlobalName::argstr, v_str(""));
        frame.set_gvar(GlobalName::dobj, v_obj(NOTHING));
        frame.set_gvar(GlobalName::dobjstr, v_str(""));
        frame.set_gvar(GlobalName::prepstr, v_str(""));
        frame.set_gvar(GlobalName::iobj, v_obj(NOTHING));
        frame.set_gvar(GlobalName::iobjstr, v_str(""));
        set_constant_gvars(&mut frame);

        Self {
            frame: Frame::Moo(frame),
            this: NOTHING,
            player,
            args: List::empty(),
            verb_name: Symbol::mk("eval"),
            verbdef,
            permissions,
            command: None,
        }
    }

    /// Activation wrapping a builtin-function call. The verb flags are
    /// copied from the calling verb so the `d' bit governs error behavior.
    pub fn for_bf_call(
        bf_id: BuiltinId,
        bf_name: Symbol,
        args: List,
        verb_flags: crate::util::BitEnum<VerbFlag>,
        player: Objid,
    ) -> Self {
        let verbdef = VerbDef {
            uuid: Uuid::new_v4(),
            location: NOTHING,
            owner: NOTHING,
            names: vec![bf_name.clone()],
            flags: verb_flags,
            args: VerbArgsSpec::this_none_this(),
        };
        Self {
            frame: Frame::Bf(BfFrame {
                bf_id,
                bf_trampoline: None,
                bf_trampoline_arg: None,
                return_value: None,
            }),
            this: NOTHING,
            player,
            args,
            verb_name: bf_name,
            verbdef,
            permissions: NOTHING,
            command: None,
        }
    }

    pub fn frame_moo_mut(&mut self) -> &mut MooStackFrame {
        match &mut self.frame {
            Frame::Moo(f) => f,
            Frame::Bf(_) => panic!("expected MOO frame"),
        }
    }

    pub fn line_number(&self) -> usize {
        match &self.frame {
            Frame::Moo(f) => f.find_line_no(f.pc),
            Frame::Bf(_) => 0,
        }
    }
}

/// The INT/NUM/FLOAT/OBJ/STR/ERR/LIST type-code constants every program
/// starts with.
fn set_constant_gvars(frame: &mut MooStackFrame) {
    frame.set_gvar(GlobalName::INT, v_int(0));
    frame.set_gvar(GlobalName::NUM, v_int(0));
    frame.set_gvar(GlobalName::OBJ, v_int(1));
    frame.set_gvar(GlobalName::STR, v_int(2));
    frame.set_gvar(GlobalName::ERR, v_int(3));
    frame.set_gvar(GlobalName::LIST, v_int(4));
    frame.set_gvar(GlobalName::FLOAT, v_int(9));
}

/// The value a finished frame hands back to its caller.
impl Frame {
    pub fn set_return_value(&mut self, value: Var) {
        match self {
            Frame::Moo(frame) => frame.push(value),
            Frame::Bf(bf) => bf.return_value = Some(value),
        }
    }

    pub fn set_variable(&mut self, name: &crate::compiler::Name, value: Var) {
        match self {
            Frame::Moo(frame) => frame.set_variable(name, value),
            Frame::Bf(_) => panic!("set_variable on a builtin frame"),
        }
    }
}

// Convenience used by traceback rendering.
pub fn traceback_entry(a: &Activation, line: usize) -> Var {
    v_list(&[
        v_obj(a.this),
        v_string(a.verb_name.to_string()),
        v_obj(a.verb_owner()),
        v_obj(a.verb_definer()),
        v_obj(a.player),
        v_int(line as i64),
    ])
}
