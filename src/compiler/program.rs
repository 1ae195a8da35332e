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
use std::sync::Arc;

use crate::compiler::labels::{JumpLabel, Label, Offset};
use crate::compiler::names::Names;
use crate::compiler::opcode::Op;
use crate::var::Var;

/// The result of compilation: opcode vectors, fork vectors, literals, jump
/// labels, the variable-name table, and line-number spans for tracebacks.
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub literals: Vec<Var>,
    pub jump_labels: Vec<JumpLabel>,
    pub var_names: Names,
    pub main_vector: Arc<Vec<Op>>,
    pub fork_vectors: Vec<Vec<Op>>,
    /// (opcode offset, source line) pairs, in offset order.
    pub line_number_spans: Vec<(usize, usize)>,
}

impl Program {
    pub fn new() -> Self {
        Program {
            literals: Vec::new(),
            jump_labels: Vec::new(),
            var_names: Names::new(),
            main_vector: Arc::new(Vec::new()),
            fork_vectors: Vec::new(),
            line_number_spans: Vec::new(),
        }
    }

    pub fn jump_label(&self, label: Label) -> &JumpLabel {
        &self.jump_labels[label.0 as usize]
    }

    pub fn literal(&self, label: Label) -> &Var {
        &self.literals[label.0 as usize]
    }

    pub fn fork_vector(&self, offset: Offset) -> &Vec<Op> {
        &self.fork_vectors[offset.0 as usize]
    }

    /// The source line for a given opcode offset in the main vector.
    pub fn line_num_for_position(&self, position: usize) -> usize {
        let mut line = 1;
        for (offset, line_no) in &self.line_number_spans {
            if *offset > position {
                break;
            }
            line = *line_no;
        }
        line
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, l) in self.literals.iter().enumerate() {
            writeln!(f, "L{}: {}", i, l.to_literal())?;
        }
        for (i, l) in self.jump_labels.iter().enumerate() {
            write!(f, "J{}: {}", i, l.position.0)?;
            if let Some(name) = &l.name {
                if let Some(sym) = self.var_names.name_of(name) {
                    write!(f, " ({})", sym)?;
                }
            }
            writeln!(f)?;
        }
        for (i, v) in self.var_names.names.iter().enumerate() {
            writeln!(f, "V{}: {}", i, v)?;
        }
        for (i, op) in self.main_vector.iter().enumerate() {
            writeln!(f, "{}: {:?}", i, op)?;
        }
        for (fv, ops) in self.fork_vectors.iter().enumerate() {
            writeln!(f, "fork vector {}:", fv)?;
            for (i, op) in ops.iter().enumerate() {
                writeln!(f, "{}: {:?}", i, op)?;
            }
        }
        Ok(())
    }
}
