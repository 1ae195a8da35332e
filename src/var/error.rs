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

use std::fmt::{Display, Formatter};

use strum::FromRepr;

use crate::var::Var;

/// The sixteen MOO error codes. Each is both a first-class value and a
/// catchable exception code.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, FromRepr)]
#[allow(non_camel_case_types)]
pub enum Error {
    E_NONE = 0,
    E_TYPE = 1,
    E_DIV = 2,
    E_PERM = 3,
    E_PROPNF = 4,
    E_VERBNF = 5,
    E_VARNF = 6,
    E_INVIND = 7,
    E_RECMOVE = 8,
    E_MAXREC = 9,
    E_RANGE = 10,
    E_ARGS = 11,
    E_NACC = 12,
    E_INVARG = 13,
    E_QUOTA = 14,
    E_FLOAT = 15,
}

impl Error {
    pub fn message(&self) -> &'static str {
        match self {
            Error::E_NONE => "No error",
            Error::E_TYPE => "Type mismatch",
            Error::E_DIV => "Division by zero",
            Error::E_PERM => "Permission denied",
            Error::E_PROPNF => "Property not found",
            Error::E_VERBNF => "Verb not found",
            Error::E_VARNF => "Variable not found",
            Error::E_INVIND => "Invalid indirection",
            Error::E_RECMOVE => "Recursive move",
            Error::E_MAXREC => "Too many verb calls",
            Error::E_RANGE => "Range error",
            Error::E_ARGS => "Incorrect number of arguments",
            Error::E_NACC => "Move refused by destination",
            Error::E_INVARG => "Invalid argument",
            Error::E_QUOTA => "Resource limit exceeded",
            Error::E_FLOAT => "Floating-point arithmetic error",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Error::E_NONE => "E_NONE",
            Error::E_TYPE => "E_TYPE",
            Error::E_DIV => "E_DIV",
            Error::E_PERM => "E_PERM",
            Error::E_PROPNF => "E_PROPNF",
            Error::E_VERBNF => "E_VERBNF",
            Error::E_VARNF => "E_VARNF",
            Error::E_INVIND => "E_INVIND",
            Error::E_RECMOVE => "E_RECMOVE",
            Error::E_MAXREC => "E_MAXREC",
            Error::E_RANGE => "E_RANGE",
            Error::E_ARGS => "E_ARGS",
            Error::E_NACC => "E_NACC",
            Error::E_INVARG => "E_INVARG",
            Error::E_QUOTA => "E_QUOTA",
            Error::E_FLOAT => "E_FLOAT",
        }
    }

    /// Parse an error name (case-insensitive), e.g. for literals in source.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "e_none" => Some(Error::E_NONE),
            "e_type" => Some(Error::E_TYPE),
            "e_div" => Some(Error::E_DIV),
            "e_perm" => Some(Error::E_PERM),
            "e_propnf" => Some(Error::E_PROPNF),
            "e_verbnf" => Some(Error::E_VERBNF),
            "e_varnf" => Some(Error::E_VARNF),
            "e_invind" => Some(Error::E_INVIND),
            "e_recmove" => Some(Error::E_RECMOVE),
            "e_maxrec" => Some(Error::E_MAXREC),
            "e_range" => Some(Error::E_RANGE),
            "e_args" => Some(Error::E_ARGS),
            "e_nacc" => Some(Error::E_NACC),
            "e_invarg" => Some(Error::E_INVARG),
            "e_quota" => Some(Error::E_QUOTA),
            "e_float" => Some(Error::E_FLOAT),
            _ => None,
        }
    }

    pub fn make_error_pack(&self) -> ErrorPack {
        ErrorPack {
            code: *self,
            msg: self.message().to_string(),
            value: Var::None,
        }
    }

    pub fn make_raise_pack(&self, msg: String, value: Var) -> ErrorPack {
        ErrorPack {
            code: *self,
            msg,
            value,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.message())
    }
}

/// The full payload of a raised error: code, message, and the optional
/// programmer-supplied value from `raise()`.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorPack {
    pub code: Error,
    pub msg: String,
    pub value: Var,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for code in 0..16u8 {
            let e = Error::from_repr(code).unwrap();
            assert_eq!(Error::parse(e.name()), Some(e));
            assert_eq!(Error::parse(&e.name().to_lowercase()), Some(e));
        }
        assert_eq!(Error::parse("e_bogus"), None);
    }

    #[test]
    fn test_ordering_matches_code_order() {
        assert!(Error::E_TYPE < Error::E_RANGE);
        assert!(Error::E_NONE < Error::E_FLOAT);
    }
}
