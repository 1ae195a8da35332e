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

//! Source text to compiled [`Program`]: pest parse, AST, opcode generation.

pub mod ast;
pub mod builtins;
pub mod codegen;
pub mod labels;
pub mod names;
pub mod opcode;
pub mod parse;
pub mod program;

use thiserror::Error as ThisError;

pub use builtins::{offset_for_builtin, ArgCount, ArgType, Builtin, BuiltinId, Builtins, BUILTINS};
pub use codegen::compile;
pub use labels::{JumpLabel, Label, Offset};
pub use names::{GlobalName, Name, Names};
pub use opcode::{Op, ScatterArgs, ScatterLabel};
pub use program::Program;

/// Compilation failure: a line/column annotated diagnostic. No partial AST
/// or program is ever produced.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("parse error at line {line}, column {column}: {message}")]
    ParseError {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("unknown built-in function: {0}")]
    UnknownBuiltinFunction(String),
    #[error("unknown loop label in break/continue: {0}")]
    UnknownLoopLabel(String),
    #[error("no enclosing loop for break/continue")]
    NoLoopForExit,
    #[error("invalid assignment target")]
    BadAssignmentTarget,
    #[error("`$' used outside of an index expression")]
    LengthOutsideIndex,
}
