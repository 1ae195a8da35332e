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

use rand::Rng;

use crate::bf_declare;
use crate::builtins::BfRet::Ret;
use crate::builtins::{BfCallState, BfErr, BfRet, BuiltinFunction};
use crate::compiler::offset_for_builtin;
use crate::var::Error::{E_FLOAT, E_INVARG, E_TYPE};
use crate::var::{v_float, v_int, v_string, Var};

/// Float results surface infinities as E_FLOAT and NaN as E_INVARG.
fn checked(x: f64) -> Result<BfRet, BfErr> {
    if x.is_infinite() {
        return Err(BfErr::Code(E_FLOAT));
    }
    if x.is_nan() {
        return Err(BfErr::Code(E_INVARG));
    }
    Ok(Ret(v_float(x)))
}

fn numeric_arg(arg: &Var) -> Result<f64, BfErr> {
    match arg {
        Var::Int(i) => Ok(*i as f64),
        Var::Float(f) => Ok(*f),
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

fn bf_abs(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    match &bf_args.args[0] {
        Var::Int(i) => Ok(Ret(v_int(i.wrapping_abs()))),
        Var::Float(f) => Ok(Ret(v_float(f.abs()))),
        _ => Err(BfErr::Code(E_TYPE)),
    }
}
bf_declare!(abs, bf_abs);

/// min/max take one or more arguments, all of the same numeric kind.
fn min_max(bf_args: &mut BfCallState<'_>, want_max: bool) -> Result<BfRet, BfErr> {
    let mut best = bf_args.args[0].clone();
    for v in &bf_args.args[1..] {
        match (&best, v) {
            (Var::Int(b), Var::Int(c)) => {
                if (want_max && c > b) || (!want_max && c < b) {
                    best = v.clone();
                }
            }
            (Var::Float(b), Var::Float(c)) => {
                if (want_max && c > b) || (!want_max && c < b) {
                    best = v.clone();
                }
            }
            _ => return Err(BfErr::Code(E_TYPE)),
        }
    }
    Ok(Ret(best))
}

fn bf_min(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    min_max(bf_args, false)
}
bf_declare!(min, bf_min);

fn bf_max(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    min_max(bf_args, true)
}
bf_declare!(max, bf_max);

fn bf_random(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let mut rng = rand::thread_rng();
    if bf_args.args.is_empty() {
        return Ok(Ret(v_int(rng.gen_range(1..=i64::MAX))));
    }
    match &bf_args.args[0] {
        Var::Int(i) if *i > 0 => Ok(Ret(v_int(rng.gen_range(1..=*i)))),
        Var::Int(_) => Err(BfErr::Code(E_INVARG)),
        _ => Err(BfErr::Code(E_TYPE)),
    }
}
bf_declare!(random, bf_random);

fn bf_floatstr(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let Var::Float(x) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let precision = match &bf_args.args[1] {
        Var::Int(i) if *i >= 0 => (*i as usize).min(19),
        _ => return Err(BfErr::Code(E_INVARG)),
    };
    let scientific = bf_args.args.len() == 3 && bf_args.args[2].is_true();
    let s = if scientific {
        format!("{:.*e}", precision, x)
    } else {
        format!("{:.*}", precision, x)
    };
    Ok(Ret(v_string(s)))
}
bf_declare!(floatstr, bf_floatstr);

macro_rules! simple_float_fn {
    ( $name:ident, $method:ident ) => {
        paste::paste! {
            fn [<bf_ $name>](bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
                let x = numeric_arg(&bf_args.args[0])?;
                checked(x.$method())
            }
            bf_declare!($name, [<bf_ $name>]);
        }
    };
}

simple_float_fn!(sqrt, sqrt);
simple_float_fn!(sin, sin);
simple_float_fn!(cos, cos);
simple_float_fn!(tan, tan);
simple_float_fn!(asin, asin);
simple_float_fn!(acos, acos);
simple_float_fn!(sinh, sinh);
simple_float_fn!(cosh, cosh);
simple_float_fn!(tanh, tanh);
simple_float_fn!(exp, exp);
simple_float_fn!(log, ln);
simple_float_fn!(log10, log10);
simple_float_fn!(ceil, ceil);
simple_float_fn!(floor, floor);
simple_float_fn!(trunc, trunc);

fn bf_atan(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let y = numeric_arg(&bf_args.args[0])?;
    if bf_args.args.len() == 2 {
        let x = numeric_arg(&bf_args.args[1])?;
        checked(y.atan2(x))
    } else {
        checked(y.atan())
    }
}
bf_declare!(atan, bf_atan);

pub(crate) fn register_bf_num(builtins: &mut [Arc<dyn BuiltinFunction>]) {
    builtins[offset_for_builtin("abs")] = Arc::new(BfAbs {});
    builtins[offset_for_builtin("min")] = Arc::new(BfMin {});
    builtins[offset_for_builtin("max")] = Arc::new(BfMax {});
    builtins[offset_for_builtin("random")] = Arc::new(BfRandom {});
    builtins[offset_for_builtin("floatstr")] = Arc::new(BfFloatstr {});
    builtins[offset_for_builtin("sqrt")] = Arc::new(BfSqrt {});
    builtins[offset_for_builtin("sin")] = Arc::new(BfSin {});
    builtins[offset_for_builtin("cos")] = Arc::new(BfCos {});
    builtins[offset_for_builtin("tan")] = Arc::new(BfTan {});
    builtins[offset_for_builtin("asin")] = Arc::new(BfAsin {});
    builtins[offset_for_builtin("acos")] = Arc::new(BfAcos {});
    builtins[offset_for_builtin("atan")] = Arc::new(BfAtan {});
    builtins[offset_for_builtin("sinh")] = Arc::new(BfSinh {});
    builtins[offset_for_builtin("cosh")] = Arc::new(BfCosh {});
    builtins[offset_for_builtin("tanh")] = Arc::new(BfTanh {});
    builtins[offset_for_builtin("exp")] = Arc::new(BfExp {});
    builtins[offset_for_builtin("log")] = Arc::new(BfLog {});
    builtins[offset_for_builtin("log10")] = Arc::new(BfLog10 {});
    builtins[offset_for_builtin("ceil")] = Arc::new(BfCeil {});
    builtins[offset_for_builtin("floor")] = Arc::new(BfFloor {});
    builtins[offset_for_builtin("trunc")] = Arc::new(BfTrunc {});
}
