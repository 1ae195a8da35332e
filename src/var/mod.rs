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

pub mod error;
pub mod list;
pub mod objid;
pub mod string;
pub mod symbol;

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

pub use error::{Error, ErrorPack};
pub use list::List;
pub use objid::{Objid, AMBIGUOUS, FAILED_MATCH, NOTHING, SYSTEM_OBJECT};
pub use string::Str;
pub use symbol::Symbol;

use crate::var::error::Error::{E_DIV, E_FLOAT, E_INVARG, E_RANGE, E_TYPE};

/// The MOO type codes, as surfaced by `typeof()`.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[allow(non_camel_case_types)]
pub enum VarType {
    TYPE_INT = 0,
    TYPE_OBJ = 1,
    TYPE_STR = 2,
    TYPE_ERR = 3,
    TYPE_LIST = 4,
    TYPE_NONE = 6,
    TYPE_FLOAT = 9,
}

/// Meta type code accepted by builtin signatures: any number.
pub const TYPE_NUMERIC: i64 = -2;
/// Meta type code accepted by builtin signatures: anything.
pub const TYPE_ANY: i64 = -1;

/// A MOO value. The six user-visible variants, plus `None` for uninitialized
/// variables and clear property slots.
#[derive(Clone, Debug)]
pub enum Var {
    None,
    Int(i64),
    Float(f64),
    Str(Str),
    Obj(Objid),
    Err(Error),
    List(List),
}

pub fn v_none() -> Var {
    Var::None
}

pub fn v_int(i: i64) -> Var {
    Var::Int(i)
}

pub fn v_bool(b: bool) -> Var {
    Var::Int(if b { 1 } else { 0 })
}

pub fn v_float(f: f64) -> Var {
    Var::Float(f)
}

pub fn v_str(s: &str) -> Var {
    Var::Str(Str::mk_str(s))
}

pub fn v_string(s: String) -> Var {
    Var::Str(Str::mk_string(s))
}

pub fn v_obj(o: Objid) -> Var {
    Var::Obj(o)
}

pub fn v_objid(i: i64) -> Var {
    Var::Obj(Objid(i))
}

pub fn v_err(e: Error) -> Var {
    Var::Err(e)
}

pub fn v_list(vals: &[Var]) -> Var {
    Var::List(List::mk_list(vals))
}

pub fn v_listv(vals: Vec<Var>) -> Var {
    Var::List(List::from_iter(vals))
}

pub fn v_empty_list() -> Var {
    Var::List(List::empty())
}

/// Check a float result for the MOO error conditions: infinity is E_FLOAT,
/// NaN is E_INVARG.
fn checked_float(f: f64) -> Result<Var, Error> {
    if f.is_infinite() {
        return Err(E_FLOAT);
    }
    if f.is_nan() {
        return Err(E_INVARG);
    }
    Ok(Var::Float(f))
}

macro_rules! binary_numeric_op {
    ( $name:ident, $int_op:ident, $flt_op:tt ) => {
        pub fn $name(&self, v: &Var) -> Result<Var, Error> {
            match (self, v) {
                (Var::Int(l), Var::Int(r)) => {
                    Ok(Var::Int(l.$int_op(*r)))
                }
                (Var::Float(l), Var::Float(r)) => checked_float(l $flt_op r),
                (_, _) => Err(E_TYPE),
            }
        }
    };
}

impl Var {
    pub fn type_code(&self) -> VarType {
        match self {
            Var::None => VarType::TYPE_NONE,
            Var::Int(_) => VarType::TYPE_INT,
            Var::Float(_) => VarType::TYPE_FLOAT,
            Var::Str(_) => VarType::TYPE_STR,
            Var::Obj(_) => VarType::TYPE_OBJ,
            Var::Err(_) => VarType::TYPE_ERR,
            Var::List(_) => VarType::TYPE_LIST,
        }
    }

    pub fn is_true(&self) -> bool {
        match self {
            Var::Int(i) => *i != 0,
            Var::Float(f) => *f != 0.0,
            Var::Str(s) => !s.is_empty(),
            Var::List(l) => !l.is_empty(),
            _ => false,
        }
    }

    /// The "indistinguishable" comparison used by `equal()`, `is_member`, and
    /// literal de-duplication: like `==` but case-sensitive for strings.
    pub fn eq_case_sensitive(&self, other: &Var) -> bool {
        match (self, other) {
            (Var::Str(l), Var::Str(r)) => l.eq_case_sensitive(r),
            (Var::List(l), Var::List(r)) => l.eq_case_sensitive(r),
            (l, r) => l == r,
        }
    }

    binary_numeric_op!(mul, wrapping_mul, *);
    binary_numeric_op!(sub, wrapping_sub, -);

    pub fn add(&self, v: &Var) -> Result<Var, Error> {
        match (self, v) {
            (Var::Int(l), Var::Int(r)) => Ok(Var::Int(l.wrapping_add(*r))),
            (Var::Float(l), Var::Float(r)) => checked_float(l + r),
            (Var::Str(l), Var::Str(r)) => Ok(Var::Str(l.str_append(r))),
            (_, _) => Err(E_TYPE),
        }
    }

    pub fn div(&self, v: &Var) -> Result<Var, Error> {
        match (self, v) {
            (Var::Int(_), Var::Int(0)) => Err(E_DIV),
            // MIN / -1 would trap in Rust; LambdaMOO wraps.
            (Var::Int(l), Var::Int(r)) => Ok(Var::Int(l.wrapping_div(*r))),
            (Var::Float(_), Var::Float(r)) if *r == 0.0 => Err(E_DIV),
            (Var::Float(l), Var::Float(r)) => checked_float(l / r),
            (_, _) => Err(E_TYPE),
        }
    }

    pub fn modulus(&self, v: &Var) -> Result<Var, Error> {
        match (self, v) {
            (Var::Int(_), Var::Int(0)) => Err(E_DIV),
            (Var::Int(l), Var::Int(r)) => Ok(Var::Int(l.wrapping_rem(*r))),
            (Var::Float(_), Var::Float(r)) if *r == 0.0 => Err(E_DIV),
            (Var::Float(l), Var::Float(r)) => checked_float(l % r),
            (_, _) => Err(E_TYPE),
        }
    }

    pub fn pow(&self, v: &Var) -> Result<Var, Error> {
        match (self, v) {
            (Var::Int(l), Var::Int(r)) => {
                if *r < 0 {
                    // Integer raised to a negative power.
                    return match *l {
                        0 => Err(E_DIV),
                        1 => Ok(Var::Int(1)),
                        -1 => Ok(Var::Int(if r % 2 == 0 { 1 } else { -1 })),
                        _ => Ok(Var::Int(0)),
                    };
                }
                let exp = u32::try_from(*r).unwrap_or(u32::MAX);
                Ok(Var::Int(l.wrapping_pow(exp)))
            }
            (Var::Float(l), Var::Float(r)) => checked_float(l.powf(*r)),
            (Var::Float(l), Var::Int(r)) => {
                let exp = i32::try_from(*r).unwrap_or(if *r > 0 { i32::MAX } else { i32::MIN });
                checked_float(l.powi(exp))
            }
            (_, _) => Err(E_TYPE),
        }
    }

    pub fn negative(&self) -> Result<Var, Error> {
        match self {
            Var::Int(l) => Ok(Var::Int(l.wrapping_neg())),
            Var::Float(f) => Ok(Var::Float(-*f)),
            _ => Err(E_TYPE),
        }
    }

    /// Ordered comparison for `<`, `<=`, `>`, `>=`. Only like scalar kinds
    /// compare; lists and mismatched types raise E_TYPE.
    pub fn cmp_order(&self, other: &Var) -> Result<Ordering, Error> {
        match (self, other) {
            (Var::Int(l), Var::Int(r)) => Ok(l.cmp(r)),
            (Var::Float(l), Var::Float(r)) => Ok(l.total_cmp(r)),
            (Var::Str(l), Var::Str(r)) => Ok(l.cmp(r)),
            (Var::Obj(l), Var::Obj(r)) => Ok(l.cmp(r)),
            (Var::Err(l), Var::Err(r)) => Ok(l.cmp(r)),
            (_, _) => Err(E_TYPE),
        }
    }

    /// The `in` operator: 1-based position of self in the list, 0 if absent.
    /// Comparison is the default (case-folding) equality.
    pub fn index_in(&self, list: &Var) -> Result<Var, Error> {
        let Var::List(l) = list else {
            return Err(E_TYPE);
        };
        match l.iter().position(|v| v == self) {
            Some(pos) => Ok(Var::Int((pos + 1) as i64)),
            None => Ok(Var::Int(0)),
        }
    }

    /// 1-based indexing, strings and lists only.
    pub fn index(&self, idx: &Var) -> Result<Var, Error> {
        let Var::Int(idx) = idx else {
            return Err(E_TYPE);
        };
        match self {
            Var::List(l) => l.index(*idx),
            Var::Str(s) => s.index(*idx),
            _ => Err(E_TYPE),
        }
    }

    /// 1-based inclusive slicing, strings and lists only.
    pub fn range(&self, from: &Var, to: &Var) -> Result<Var, Error> {
        let (Var::Int(from), Var::Int(to)) = (from, to) else {
            return Err(E_TYPE);
        };
        match self {
            Var::List(l) => l.range(*from, *to),
            Var::Str(s) => s.range(*from, *to),
            _ => Err(E_TYPE),
        }
    }

    pub fn index_set(&self, idx: &Var, value: &Var) -> Result<Var, Error> {
        let Var::Int(idx) = idx else {
            return Err(E_TYPE);
        };
        match (self, value) {
            (Var::List(l), _) => l.set(*idx, value.clone()),
            (Var::Str(s), Var::Str(r)) => s.index_set(*idx, r),
            (Var::Str(_), _) => Err(E_INVARG),
            _ => Err(E_TYPE),
        }
    }

    pub fn range_set(&self, from: &Var, to: &Var, value: &Var) -> Result<Var, Error> {
        let (Var::Int(from), Var::Int(to)) = (from, to) else {
            return Err(E_TYPE);
        };
        match (self, value) {
            (Var::List(l), Var::List(r)) => l.range_set(*from, *to, r),
            (Var::Str(s), Var::Str(r)) => s.range_set(*from, *to, r),
            _ => Err(E_TYPE),
        }
    }

    pub fn len(&self) -> Result<i64, Error> {
        match self {
            Var::List(l) => Ok(l.len() as i64),
            Var::Str(s) => Ok(s.len() as i64),
            _ => Err(E_TYPE),
        }
    }

    /// `toint()`. Floats truncate toward zero; strings parse a leading
    /// number, yielding 0 on garbage.
    pub fn to_int(&self) -> Result<Var, Error> {
        match self {
            Var::Int(i) => Ok(Var::Int(*i)),
            Var::Float(f) => {
                let t = f.trunc();
                if !t.is_finite() || t < i64::MIN as f64 || t >= -(i64::MIN as f64) {
                    return Err(E_FLOAT);
                }
                Ok(Var::Int(t as i64))
            }
            Var::Obj(o) => Ok(Var::Int(o.0)),
            Var::Err(e) => Ok(Var::Int(*e as i64)),
            Var::Str(s) => Ok(Var::Int(parse_leading_number(s.as_str()).map_or(
                0,
                |f| {
                    let t = f.trunc();
                    if t < i64::MIN as f64 || t >= -(i64::MIN as f64) {
                        0
                    } else {
                        t as i64
                    }
                },
            ))),
            _ => Err(E_TYPE),
        }
    }

    pub fn to_float(&self) -> Result<Var, Error> {
        match self {
            Var::Int(i) => Ok(Var::Float(*i as f64)),
            Var::Float(f) => Ok(Var::Float(*f)),
            Var::Err(e) => Ok(Var::Float(*e as u8 as f64)),
            Var::Str(s) => Ok(Var::Float(parse_leading_number(s.as_str()).unwrap_or(0.0))),
            _ => Err(E_TYPE),
        }
    }

    pub fn to_obj(&self) -> Result<Var, Error> {
        match self {
            Var::Int(i) => Ok(Var::Obj(Objid(*i))),
            Var::Obj(o) => Ok(Var::Obj(*o)),
            Var::Float(f) => Ok(Var::Obj(Objid(f.trunc() as i64))),
            Var::Str(s) => {
                let t = s.as_str().trim();
                let t = t.strip_prefix('#').unwrap_or(t);
                Ok(Var::Obj(Objid(
                    parse_leading_number(t).map_or(0, |f| f.trunc() as i64),
                )))
            }
            _ => Err(E_TYPE),
        }
    }

    /// The literal rendering, re-parseable as a program literal.
    pub fn to_literal(&self) -> String {
        match self {
            Var::None => "0".to_string(),
            Var::Int(i) => i.to_string(),
            Var::Float(f) => format_float(*f),
            Var::Str(s) => s.quote(),
            Var::Obj(o) => format!("{}", o),
            Var::Err(e) => e.name().to_string(),
            Var::List(l) => {
                let elems: Vec<String> = l.iter().map(|v| v.to_literal()).collect();
                format!("{{{}}}", elems.join(", "))
            }
        }
    }

    /// The `tostr()` rendering: strings bare, errors by message, lists
    /// opaque.
    pub fn to_display(&self) -> String {
        match self {
            Var::Str(s) => s.as_str().to_string(),
            Var::Err(e) => e.message().to_string(),
            Var::List(_) => "{list}".to_string(),
            v => v.to_literal(),
        }
    }

    /// A rough accounting of the space this value occupies, for
    /// `value_bytes()` and quota checks.
    pub fn value_bytes(&self) -> usize {
        let base = std::mem::size_of::<Var>();
        match self {
            Var::Str(s) => base + s.as_str().len(),
            Var::List(l) => base + l.iter().map(|v| v.value_bytes()).sum::<usize>(),
            _ => base,
        }
    }
}

/// Parse the longest leading decimal number (integer or float) of a string.
fn parse_leading_number(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let mut end = 0;
    let bytes = s.as_bytes();
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let mut seen_digit = false;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        seen_digit = true;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        let mut frac = end + 1;
        while frac < bytes.len() && bytes[frac].is_ascii_digit() {
            frac += 1;
            seen_digit = true;
        }
        if frac > end + 1 {
            end = frac;
        }
    }
    if seen_digit && end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp = end + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        let digits_start = exp;
        while exp < bytes.len() && bytes[exp].is_ascii_digit() {
            exp += 1;
        }
        if exp > digits_start {
            end = exp;
        }
    }
    if !seen_digit {
        return None;
    }
    s[..end].parse::<f64>().ok()
}

/// Format a float the way MOO prints them: always distinguishable from an
/// integer literal.
pub fn format_float(f: f64) -> String {
    let s = format!("{}", f);
    if s.contains('.') || s.contains('e') || s.contains("inf") || s.contains("NaN") {
        s
    } else {
        format!("{}.0", s)
    }
}

impl PartialEq for Var {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Var::None, Var::None) => true,
            (Var::Int(l), Var::Int(r)) => l == r,
            (Var::Float(l), Var::Float(r)) => l.total_cmp(r) == Ordering::Equal,
            (Var::Str(l), Var::Str(r)) => l == r,
            (Var::Obj(l), Var::Obj(r)) => l == r,
            (Var::Err(l), Var::Err(r)) => l == r,
            (Var::List(l), Var::List(r)) => l == r,
            (_, _) => false,
        }
    }
}

impl Eq for Var {}

impl PartialOrd for Var {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Var {
    /// Total ordering across all variants, for internal use (literal tables,
    /// sorted sets). MOO-level comparison goes through `cmp_order`.
    fn cmp(&self, other: &Self) -> Ordering {
        fn rank(v: &Var) -> u8 {
            match v {
                Var::None => 0,
                Var::Int(_) => 1,
                Var::Float(_) => 2,
                Var::Str(_) => 3,
                Var::Obj(_) => 4,
                Var::Err(_) => 5,
                Var::List(_) => 6,
            }
        }
        match (self, other) {
            (Var::Int(l), Var::Int(r)) => l.cmp(r),
            (Var::Float(l), Var::Float(r)) => l.total_cmp(r),
            (Var::Str(l), Var::Str(r)) => l.cmp(r),
            (Var::Obj(l), Var::Obj(r)) => l.cmp(r),
            (Var::Err(l), Var::Err(r)) => l.cmp(r),
            (Var::List(l), Var::List(r)) => l.cmp(r),
            (l, r) => rank(l).cmp(&rank(r)),
        }
    }
}

impl Hash for Var {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.type_code() as u8).hash(state);
        match self {
            Var::None => {}
            Var::Int(i) => i.hash(state),
            Var::Float(f) => f.to_bits().hash(state),
            Var::Str(s) => s.hash(state),
            Var::Obj(o) => o.hash(state),
            Var::Err(e) => e.hash(state),
            Var::List(l) => {
                for v in l.iter() {
                    v.hash(state);
                }
            }
        }
    }
}

impl Display for Var {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_literal())
    }
}

impl From<i64> for Var {
    fn from(i: i64) -> Self {
        Var::Int(i)
    }
}

impl From<f64> for Var {
    fn from(f: f64) -> Self {
        Var::Float(f)
    }
}

impl From<&str> for Var {
    fn from(s: &str) -> Self {
        v_str(s)
    }
}

impl From<String> for Var {
    fn from(s: String) -> Self {
        v_string(s)
    }
}

impl From<Objid> for Var {
    fn from(o: Objid) -> Self {
        Var::Obj(o)
    }
}

impl From<Error> for Var {
    fn from(e: Error) -> Self {
        Var::Err(e)
    }
}

impl From<List> for Var {
    fn from(l: List) -> Self {
        Var::List(l)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::var::error::Error::{E_DIV, E_FLOAT, E_INVARG, E_TYPE};

    #[test]
    fn test_add() {
        assert_eq!(v_int(1).add(&v_int(2)), Ok(v_int(3)));
        assert_eq!(v_float(1.0).add(&v_float(2.0)), Ok(v_float(3.0)));
        assert_eq!(v_str("a").add(&v_str("b")), Ok(v_str("ab")));
        // Mixing numeric kinds is a type error.
        assert_eq!(v_int(1).add(&v_float(2.0)), Err(E_TYPE));
        assert_eq!(v_str("a").add(&v_int(1)), Err(E_TYPE));
    }

    #[test]
    fn test_div_by_zero() {
        assert_eq!(v_int(1).div(&v_int(0)), Err(E_DIV));
        assert_eq!(v_float(1.0).div(&v_float(0.0)), Err(E_DIV));
        assert_eq!(v_int(7).div(&v_int(2)), Ok(v_int(3)));
        assert_eq!(v_int(1).modulus(&v_int(0)), Err(E_DIV));
    }

    #[test]
    fn test_float_overflow_and_nan() {
        assert_eq!(v_float(1e308).mul(&v_float(1e10)), Err(E_FLOAT));
        // 0.0 % 0.0 is NaN, but the zero divisor check fires first.
        assert_eq!(v_float(0.0).modulus(&v_float(0.0)), Err(E_DIV));
        assert_eq!(v_float(-1.0).pow(&v_float(0.5)), Err(E_INVARG));
    }

    #[test]
    fn test_pow_negative_exponent() {
        assert_eq!(v_int(0).pow(&v_int(-2)), Err(E_DIV));
        assert_eq!(v_int(1).pow(&v_int(-5)), Ok(v_int(1)));
        assert_eq!(v_int(-1).pow(&v_int(-3)), Ok(v_int(-1)));
        assert_eq!(v_int(-1).pow(&v_int(-4)), Ok(v_int(1)));
        assert_eq!(v_int(5).pow(&v_int(-2)), Ok(v_int(0)));
        assert_eq!(v_int(2).pow(&v_int(10)), Ok(v_int(1024)));
    }

    #[test]
    fn test_truthiness() {
        assert!(v_int(1).is_true());
        assert!(!v_int(0).is_true());
        assert!(v_float(0.5).is_true());
        assert!(!v_float(0.0).is_true());
        assert!(v_str("x").is_true());
        assert!(!v_str("").is_true());
        assert!(v_list(&[v_int(1)]).is_true());
        assert!(!v_empty_list().is_true());
        assert!(!v_objid(1).is_true());
        assert!(!v_err(E_TYPE).is_true());
    }

    #[test]
    fn test_comparison_rules() {
        assert!(v_int(1).cmp_order(&v_int(2)).unwrap().is_lt());
        assert!(v_str("a").cmp_order(&v_str("B")).unwrap().is_lt());
        assert_eq!(v_int(1).cmp_order(&v_float(2.0)), Err(E_TYPE));
        assert_eq!(
            v_list(&[v_int(1)]).cmp_order(&v_list(&[v_int(2)])),
            Err(E_TYPE)
        );
    }

    #[test]
    fn test_equality_folds_string_case() {
        assert_eq!(v_str("Foo"), v_str("foo"));
        assert!(!v_str("Foo").eq_case_sensitive(&v_str("foo")));
        assert_eq!(v_list(&[v_str("A")]), v_list(&[v_str("a")]));
        assert_ne!(v_int(1), v_float(1.0));
    }

    #[test]
    fn test_to_literal() {
        assert_eq!(v_int(5).to_literal(), "5");
        assert_eq!(v_float(2.0).to_literal(), "2.0");
        assert_eq!(v_float(2.5).to_literal(), "2.5");
        assert_eq!(v_str("hi \"there\"").to_literal(), r#""hi \"there\"""#);
        assert_eq!(v_objid(17).to_literal(), "#17");
        assert_eq!(v_err(E_TYPE).to_literal(), "E_TYPE");
        assert_eq!(
            v_list(&[v_int(1), v_str("two")]).to_literal(),
            r#"{1, "two"}"#
        );
    }

    #[test]
    fn test_to_display() {
        assert_eq!(v_str("hi").to_display(), "hi");
        assert_eq!(v_err(E_TYPE).to_display(), "Type mismatch");
        assert_eq!(v_list(&[v_int(1)]).to_display(), "{list}");
        assert_eq!(v_int(3).to_display(), "3");
    }

    #[test]
    fn test_to_int() {
        assert_eq!(v_float(3.7).to_int(), Ok(v_int(3)));
        assert_eq!(v_float(-3.7).to_int(), Ok(v_int(-3)));
        assert_eq!(v_float(1e300).to_int(), Err(E_FLOAT));
        assert_eq!(v_str("42abc").to_int(), Ok(v_int(42)));
        assert_eq!(v_str("abc").to_int(), Ok(v_int(0)));
        assert_eq!(v_str("-12.9").to_int(), Ok(v_int(-12)));
        assert_eq!(v_objid(9).to_int(), Ok(v_int(9)));
        assert_eq!(v_err(E_DIV).to_int(), Ok(v_int(2)));
        assert_eq!(v_empty_list().to_int(), Err(E_TYPE));
    }

    #[test]
    fn test_to_obj() {
        assert_eq!(v_str("#42").to_obj(), Ok(v_objid(42)));
        assert_eq!(v_str("42").to_obj(), Ok(v_objid(42)));
        assert_eq!(v_int(-1).to_obj(), Ok(v_obj(NOTHING)));
    }

    #[test]
    fn test_in_operator() {
        let l = v_list(&[v_str("a"), v_str("B")]);
        assert_eq!(v_str("b").index_in(&l), Ok(v_int(2)));
        assert_eq!(v_str("c").index_in(&l), Ok(v_int(0)));
        assert_eq!(v_int(1).index_in(&v_int(2)), Err(E_TYPE));
    }
}
