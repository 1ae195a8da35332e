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

//! Stack unwinding: error raises, returns, break/continue exits, and the
//! try/except/finally protocol.

use std::fmt::Display;

use tracing::trace;

use crate::compiler::{Label, Offset};
use crate::var::{v_err, v_list, v_none, v_str, v_string, Error, ErrorPack, Var};
use crate::vm::activation::{traceback_entry, Frame};
use crate::vm::frame::{CatchType, ScopeType};
use crate::vm::{ExecutionResult, VMExecState};

/// An exception that reached the top of the task.
#[derive(Clone, Debug)]
pub struct UncaughtException {
    pub code: Error,
    pub msg: String,
    pub value: Var,
    /// `callers()`-shaped frames at the point of the raise.
    pub stack: Vec<Var>,
    /// Printable traceback lines for the player/server log.
    pub backtrace: Vec<String>,
}

impl Display for UncaughtException {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "uncaught exception: {} ({})", self.msg, self.code.name())
    }
}

/// Why the stack is unwinding.
#[derive(Clone, Debug)]
pub enum FinallyReason {
    /// The try body completed; fall through the finally handler.
    Fallthrough,
    /// An error is looking for a handler.
    Raise {
        code: Error,
        msg: String,
        value: Var,
        stack: Vec<Var>,
    },
    Uncaught(UncaughtException),
    Return(Var),
    /// break/continue crossing scopes within a frame.
    Exit { stack: Offset, label: Label },
}

impl VMExecState {
    /// The exception tuple `{code, msg, value, traceback}` bound by except
    /// arms and produced by catch expressions.
    fn exception_tuple(code: Error, msg: &str, value: &Var, stack: &[Var]) -> Var {
        v_list(&[
            v_err(code),
            v_string(msg.to_string()),
            value.clone(),
            v_list(stack),
        ])
    }

    /// `callers()`-shaped traceback frames, topmost first.
    pub(crate) fn make_stack_list(&self) -> Vec<Var> {
        self.stack
            .iter()
            .rev()
            .filter(|a| !a.is_builtin_frame())
            .map(|a| traceback_entry(a, a.line_number()))
            .collect()
    }

    /// Printable traceback, LambdaMOO style.
    pub(crate) fn error_backtrace_list(&self, raise_msg: &str) -> Vec<String> {
        let mut backtrace_list = vec![];
        for (i, a) in self.stack.iter().rev().enumerate() {
            let mut pieces = vec![];
            if i != 0 {
                pieces.push("... called from ".to_string());
            }
            if a.is_builtin_frame() {
                pieces.push(format!("builtin {}()", a.verb_name));
            } else {
                pieces.push(format!("{}:{}", a.verb_definer(), a.verb_name));
            }
            if !a.is_builtin_frame() && a.verb_definer() != a.this {
                pieces.push(format!(" (this == {})", a.this));
            }
            if !a.is_builtin_frame() {
                pieces.push(format!(", line {}", a.line_number()));
            }
            if i == 0 {
                pieces.push(format!(":  {}", raise_msg));
            }
            backtrace_list.push(pieces.join(""))
        }
        backtrace_list.push("(End of traceback)".to_string());
        backtrace_list
    }

    /// Is any catch handler in the whole stack armed for this code?
    fn find_handler_active(&self, code: Error) -> bool {
        self.stack.iter().any(|a| match &a.frame {
            Frame::Moo(f) => f.scope_stack.iter().any(|s| match &s.scope_type {
                ScopeType::TryCatch(catches) => catches.iter().any(|(ct, _)| match ct {
                    CatchType::Any => true,
                    CatchType::Errors(codes) => codes.contains(&code),
                }),
                ScopeType::TryFinally(_) => false,
            }),
            Frame::Bf(_) => false,
        })
    }

    /// Raise an error with full metadata, unwinding to a handler or out of
    /// the task. If no handler anywhere is armed for the code, the printable
    /// backtrace is captured now, while the frames are still live.
    pub(crate) fn raise_error_pack(&mut self, p: ErrorPack) -> ExecutionResult {
        trace!(code = ?p.code, msg = p.msg, "raising error");
        let why = if self.find_handler_active(p.code) {
            FinallyReason::Raise {
                code: p.code,
                msg: p.msg,
                value: p.value,
                stack: self.make_stack_list(),
            }
        } else {
            FinallyReason::Uncaught(self.uncaught_for(p.code, p.msg, p.value))
        };
        self.unwind_stack(why)
    }

    /// An expression failed: if the verb has its debug bit set, raise;
    /// otherwise the error value becomes the expression's result and
    /// execution just continues.
    pub(crate) fn push_error(&mut self, code: Error) -> ExecutionResult {
        self.push(v_err(code));
        if self.top().debug_bit() {
            // The pushed value is unwound away by the raise.
            return self.raise_error_pack(code.make_error_pack());
        }
        ExecutionResult::More
    }

    pub(crate) fn push_error_msg(&mut self, code: Error, msg: String) -> ExecutionResult {
        self.push(v_err(code));
        if self.top().debug_bit() {
            return self.raise_error_pack(code.make_raise_pack(msg, v_none()));
        }
        ExecutionResult::More
    }

    /// Raise without offering the error as an expression value; for failures
    /// where the stack has already been repaired (loop guards). With the
    /// debug bit off this is a no-op and execution just continues.
    pub(crate) fn raise_error(&mut self, code: Error) -> ExecutionResult {
        if self.top().debug_bit() {
            return self.raise_error_pack(code.make_error_pack());
        }
        ExecutionResult::More
    }

    /// Error return from a builtin function. The builtin's activation is
    /// popped; the error lands in (or unwinds from) the calling frame.
    pub(crate) fn push_bf_error(
        &mut self,
        code: Error,
        msg: Option<String>,
        value: Option<Var>,
    ) -> ExecutionResult {
        let debug = self.top().debug_bit();
        self.stack.pop().expect("missing builtin frame");
        self.push(v_err(code));
        if debug {
            let msg = msg.unwrap_or_else(|| code.message().to_string());
            return self.raise_error_pack(code.make_raise_pack(msg, value.unwrap_or(v_none())));
        }
        ExecutionResult::More
    }

    /// Unwind the activation stack for `why`, honoring catch and finally
    /// scopes on the way.
    pub(crate) fn unwind_stack(&mut self, mut why: FinallyReason) -> ExecutionResult {
        loop {
            let a = self.top_mut();
            if let Frame::Moo(frame) = &mut a.frame {
                // break/continue: run finally handlers of scopes the jump
                // crosses, then land. Exits never leave the frame.
                if let FinallyReason::Exit { stack, label } = &why {
                    let (stack, label) = (*stack, *label);
                    let target_pc = frame.position_of(&label);
                    while let Some(scope) = frame.scope_stack.last() {
                        if scope.end_pos > target_pc {
                            break;
                        }
                        let scope = frame.scope_stack.pop().unwrap();
                        if let ScopeType::TryFinally(handler) = scope.scope_type {
                            frame.valstack.truncate(scope.valstack_pos);
                            frame.jump(&handler);
                            frame.finally_stack.push(why);
                            return ExecutionResult::More;
                        }
                    }
                    frame.valstack.truncate(stack.0 as usize);
                    frame.jump(&label);
                    return ExecutionResult::More;
                }

                while let Some(scope) = frame.scope_stack.pop() {
                    match &scope.scope_type {
                        ScopeType::TryCatch(catches) => {
                            let FinallyReason::Raise {
                                code,
                                msg,
                                value,
                                stack,
                            } = &why
                            else {
                                continue;
                            };
                            let matching = catches.iter().find(|(ct, _)| match ct {
                                CatchType::Any => true,
                                CatchType::Errors(codes) => codes.contains(code),
                            });
                            let Some((_, label)) = matching else {
                                continue;
                            };
                            let label = *label;
                            let tuple = Self::exception_tuple(*code, msg, value, stack);
                            frame.valstack.truncate(scope.valstack_pos);
                            frame.jump(&label);
                            frame.push(tuple);
                            return ExecutionResult::More;
                        }
                        ScopeType::TryFinally(handler) => {
                            let handler = *handler;
                            frame.valstack.truncate(scope.valstack_pos);
                            frame.jump(&handler);
                            frame.finally_stack.push(why);
                            return ExecutionResult::More;
                        }
                    }
                }
            }

            // Nothing in this frame handles it; pop the activation and keep
            // going in the caller.
            self.stack.pop().expect("activation stack underflow");

            why = match why {
                FinallyReason::Return(value) => {
                    if self.stack.is_empty() {
                        return ExecutionResult::Complete(value);
                    }
                    self.set_return_value(value);
                    return ExecutionResult::More;
                }
                FinallyReason::Raise {
                    code,
                    msg,
                    value,
                    stack,
                } => {
                    if self.stack.is_empty() {
                        // A handler vanished mid-unwind; degenerate
                        // backtrace, the stack list has the detail.
                        let backtrace = vec![msg.clone(), "(End of traceback)".to_string()];
                        return ExecutionResult::Exception(FinallyReason::Uncaught(
                            UncaughtException {
                                code,
                                msg,
                                value,
                                stack,
                                backtrace,
                            },
                        ));
                    }
                    FinallyReason::Raise {
                        code,
                        msg,
                        value,
                        stack,
                    }
                }
                FinallyReason::Uncaught(e) => {
                    return ExecutionResult::Exception(FinallyReason::Uncaught(e));
                }
                FinallyReason::Fallthrough | FinallyReason::Exit { .. } => {
                    unreachable!("unwound out of a frame with a local-only reason");
                }
            };

            if self.stack.is_empty() {
                return ExecutionResult::Complete(v_none());
            }
        }
    }

    /// Raise from the very start, building the whole backtrace; used when an
    /// uncaught error leaves the task.
    pub(crate) fn uncaught_for(&self, code: Error, msg: String, value: Var) -> UncaughtException {
        UncaughtException {
            code,
            msg: msg.clone(),
            value,
            stack: self.make_stack_list(),
            backtrace: self.error_backtrace_list(&msg),
        }
    }
}

/// Helper used by tests and the scheduler to render a traceback for the
/// player.
pub fn format_traceback(exception: &UncaughtException) -> Vec<Var> {
    exception.backtrace.iter().map(|s| v_str(s)).collect()
}
