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

//! Kicks off the pest parser and converts the parse tree into our AST.

use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;

use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser as PestParser;

use crate::compiler::ast::{
    Arg, BinaryOp, CatchCodes, CondArm, ExceptArm, Expr, ScatterItem, ScatterKind, Stmt, StmtNode,
    UnaryOp,
};
use crate::compiler::names::{Name, Names};
use crate::compiler::CompileError;
use crate::util::unquote_str;
use crate::var::{v_err, v_float, v_int, v_objid, v_str, Error, Symbol, Var};

pub mod moo {
    use pest_derive::Parser;

    #[derive(Parser)]
    #[grammar = "src/compiler/moo.pest"]
    pub struct MooParser;
}

use moo::{MooParser, Rule};

/// The output of a successful parse: the statement list and the variable
/// name table it references.
#[derive(Debug)]
pub struct Parse {
    pub stmts: Vec<Stmt>,
    pub names: Names,
}

struct TreeTransformer {
    // RefCell because the PrattParser closures make split borrows awkward
    // otherwise; see pest-parser/pest#1030.
    names: RefCell<Names>,
}

impl TreeTransformer {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            names: RefCell::new(Names::new()),
        })
    }

    fn find_id(&self, name: &str) -> Name {
        self.names.borrow_mut().find_or_add_name(name)
    }

    fn parse_atom(self: Rc<Self>, pair: Pair<Rule>) -> Result<Expr, CompileError> {
        match pair.as_rule() {
            Rule::ident => Ok(Expr::Id(self.find_id(pair.as_str().trim()))),
            Rule::object => {
                let ostr = &pair.as_str()[1..];
                match i64::from_str(ostr) {
                    Ok(oid) => Ok(Expr::Value(v_objid(oid))),
                    Err(_) => Ok(Expr::Value(v_err(Error::E_INVARG))),
                }
            }
            Rule::integer => match pair.as_str().parse::<i64>() {
                Ok(int) => Ok(Expr::Value(v_int(int))),
                Err(_) => Ok(Expr::Value(v_err(Error::E_INVARG))),
            },
            Rule::float => {
                let float = pair.as_str().parse::<f64>().map_err(|e| parse_err(&pair, &e.to_string()))?;
                Ok(Expr::Value(v_float(float)))
            }
            Rule::string => {
                let parsed = unquote_str(pair.as_str())
                    .ok_or_else(|| parse_err(&pair, "malformed string literal"))?;
                Ok(Expr::Value(v_str(&parsed)))
            }
            Rule::err => {
                let e = Error::parse(pair.as_str())
                    .ok_or_else(|| parse_err(&pair, "unknown error constant"))?;
                Ok(Expr::Value(v_err(e)))
            }
            _ => Err(parse_err(&pair, "unexpected atom")),
        }
    }

    fn parse_exprlist(self: Rc<Self>, pairs: Pairs<Rule>) -> Result<Vec<Arg>, CompileError> {
        let mut args = vec![];
        for pair in pairs {
            match pair.as_rule() {
                Rule::argument => {
                    let inner = pair.into_inner().next().expect("empty argument");
                    match inner.as_rule() {
                        Rule::splice => {
                            let expr_pair = inner.into_inner().next().expect("empty splice");
                            args.push(Arg::Splice(
                                self.clone().parse_expr(expr_pair.into_inner())?,
                            ));
                        }
                        Rule::expr => {
                            args.push(Arg::Normal(self.clone().parse_expr(inner.into_inner())?));
                        }
                        _ => unreachable!("unexpected argument form"),
                    }
                }
                _ => unreachable!("unexpected exprlist member"),
            }
        }
        Ok(args)
    }

    fn parse_arglist(self: Rc<Self>, pairs: Pairs<Rule>) -> Result<Vec<Arg>, CompileError> {
        match pairs.peek() {
            None => Ok(vec![]),
            Some(first) if first.as_rule() == Rule::exprlist => {
                self.parse_exprlist(first.into_inner())
            }
            Some(other) => Err(parse_err(&other, "malformed argument list")),
        }
    }

    fn parse_codes(self: Rc<Self>, pair: Pair<Rule>) -> Result<CatchCodes, CompileError> {
        let inner = pair.into_inner().next().expect("empty codes");
        match inner.as_rule() {
            Rule::anycode => Ok(CatchCodes::Any),
            Rule::exprlist => Ok(CatchCodes::Codes(self.parse_exprlist(inner.into_inner())?)),
            _ => unreachable!("unexpected codes form"),
        }
    }

    fn parse_scatter_items(
        self: Rc<Self>,
        pairs: Pairs<Rule>,
    ) -> Result<Vec<ScatterItem>, CompileError> {
        let mut items = vec![];
        for pair in pairs {
            let item = pair.into_inner().next().expect("empty scatter item");
            match item.as_rule() {
                Rule::scatter_target => {
                    let id = self.find_id(item.into_inner().next().unwrap().as_str());
                    items.push(ScatterItem {
                        kind: ScatterKind::Required,
                        id,
                        expr: None,
                    });
                }
                Rule::scatter_rest => {
                    let id = self.find_id(item.into_inner().next().unwrap().as_str());
                    items.push(ScatterItem {
                        kind: ScatterKind::Rest,
                        id,
                        expr: None,
                    });
                }
                Rule::scatter_optional => {
                    let mut inner = item.into_inner();
                    let id = self.find_id(inner.next().unwrap().as_str());
                    let expr = match inner.next() {
                        Some(e) => Some(self.clone().parse_expr(e.into_inner())?),
                        None => None,
                    };
                    items.push(ScatterItem {
                        kind: ScatterKind::Optional,
                        id,
                        expr,
                    });
                }
                _ => unreachable!("unexpected scatter item"),
            }
        }
        Ok(items)
    }

    fn parse_primary(self: Rc<Self>, pair: Pair<Rule>) -> Result<Expr, CompileError> {
        let inner = pair.into_inner().next().expect("empty primary");
        match inner.as_rule() {
            Rule::pass_expr => {
                let arglist = inner.into_inner().next().expect("pass without arglist");
                Ok(Expr::Pass {
                    args: self.parse_arglist(arglist.into_inner())?,
                })
            }
            Rule::builtin_call => {
                let mut parts = inner.into_inner();
                let name = Symbol::mk(parts.next().unwrap().as_str());
                let arglist = parts.next().expect("call without arglist");
                Ok(Expr::Call {
                    function: name,
                    args: self.parse_arglist(arglist.into_inner())?,
                })
            }
            Rule::paren_expr => {
                let expr = inner.into_inner().next().expect("empty parens");
                self.parse_expr(expr.into_inner())
            }
            Rule::catch_expr => {
                let mut parts = inner.into_inner();
                let trye = self
                    .clone()
                    .parse_expr(parts.next().unwrap().into_inner())?;
                let codes = self.clone().parse_codes(parts.next().unwrap())?;
                let except = match parts.next() {
                    Some(e) => Some(Box::new(self.clone().parse_expr(e.into_inner())?)),
                    None => None,
                };
                Ok(Expr::TryCatch {
                    trye: Box::new(trye),
                    codes,
                    except,
                })
            }
            Rule::sysprop => {
                // `$name' is shorthand for `#0.name'.
                let name = inner.into_inner().next().unwrap().as_str();
                Ok(Expr::Prop {
                    location: Box::new(Expr::Value(v_objid(0))),
                    property: Box::new(Expr::Value(v_str(name))),
                })
            }
            Rule::range_end => Ok(Expr::Length),
            Rule::list => {
                let args = match inner.into_inner().next() {
                    Some(exprlist) => self.parse_exprlist(exprlist.into_inner())?,
                    None => vec![],
                };
                Ok(Expr::List(args))
            }
            Rule::atom => {
                let atom = inner.into_inner().next().expect("empty atom");
                self.parse_atom(atom)
            }
            _ => Err(parse_err(&inner, "unexpected expression")),
        }
    }

    fn parse_expr(self: Rc<Self>, pairs: Pairs<Rule>) -> Result<Expr, CompileError> {
        let pratt: PrattParser<Rule> = PrattParser::new()
            // Lowest precedence: assignment and scatter-assignment.
            .op(Op::postfix(Rule::assign) | Op::prefix(Rule::scatter_assign))
            // Ternary conditional.
            .op(Op::postfix(Rule::cond_expr))
            .op(Op::infix(Rule::lor, Assoc::Left))
            .op(Op::infix(Rule::land, Assoc::Left))
            .op(Op::infix(Rule::eq, Assoc::Left)
                | Op::infix(Rule::neq, Assoc::Left)
                | Op::infix(Rule::lt, Assoc::Left)
                | Op::infix(Rule::gt, Assoc::Left)
                | Op::infix(Rule::lte, Assoc::Left)
                | Op::infix(Rule::gte, Assoc::Left)
                | Op::infix(Rule::in_op, Assoc::Left))
            .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
            .op(Op::infix(Rule::mul, Assoc::Left)
                | Op::infix(Rule::div, Assoc::Left)
                | Op::infix(Rule::modulus, Assoc::Left))
            .op(Op::infix(Rule::pow, Assoc::Right))
            .op(Op::prefix(Rule::neg) | Op::prefix(Rule::not))
            // Highest precedence: indexing, property and verb references.
            .op(Op::postfix(Rule::index_range)
                | Op::postfix(Rule::index_single)
                | Op::postfix(Rule::verb_call)
                | Op::postfix(Rule::verb_expr_call)
                | Op::postfix(Rule::prop)
                | Op::postfix(Rule::prop_expr));

        let this = self.clone();
        let result = pratt
            .map_primary(|primary| this.clone().parse_primary(primary))
            .map_prefix(|op, rhs| match op.as_rule() {
                Rule::neg => Ok(Expr::Unary(UnaryOp::Neg, Box::new(rhs?))),
                Rule::not => Ok(Expr::Unary(UnaryOp::Not, Box::new(rhs?))),
                Rule::scatter_assign => {
                    let scatter = op.into_inner().next().expect("empty scatter");
                    let items = this.clone().parse_scatter_items(scatter.into_inner())?;
                    Ok(Expr::Scatter(items, Box::new(rhs?)))
                }
                _ => unreachable!("unexpected prefix operator"),
            })
            .map_infix(|lhs, op, rhs| {
                let (lhs, rhs) = (Box::new(lhs?), Box::new(rhs?));
                Ok(match op.as_rule() {
                    Rule::add => Expr::Binary(BinaryOp::Add, lhs, rhs),
                    Rule::sub => Expr::Binary(BinaryOp::Sub, lhs, rhs),
                    Rule::mul => Expr::Binary(BinaryOp::Mul, lhs, rhs),
                    Rule::div => Expr::Binary(BinaryOp::Div, lhs, rhs),
                    Rule::modulus => Expr::Binary(BinaryOp::Mod, lhs, rhs),
                    Rule::pow => Expr::Binary(BinaryOp::Exp, lhs, rhs),
                    Rule::eq => Expr::Binary(BinaryOp::Eq, lhs, rhs),
                    Rule::neq => Expr::Binary(BinaryOp::NEq, lhs, rhs),
                    Rule::lt => Expr::Binary(BinaryOp::Lt, lhs, rhs),
                    Rule::gt => Expr::Binary(BinaryOp::Gt, lhs, rhs),
                    Rule::lte => Expr::Binary(BinaryOp::LtE, lhs, rhs),
                    Rule::gte => Expr::Binary(BinaryOp::GtE, lhs, rhs),
                    Rule::in_op => Expr::Binary(BinaryOp::In, lhs, rhs),
                    Rule::land => Expr::And(lhs, rhs),
                    Rule::lor => Expr::Or(lhs, rhs),
                    _ => unreachable!("unexpected infix operator"),
                })
            })
            .map_postfix(|lhs, op| match op.as_rule() {
                Rule::index_single => {
                    let index = op.into_inner().next().expect("empty index");
                    Ok(Expr::Index(
                        Box::new(lhs?),
                        Box::new(this.clone().parse_expr(index.into_inner())?),
                    ))
                }
                Rule::index_range => {
                    let mut parts = op.into_inner();
                    let from = this.clone().parse_expr(parts.next().unwrap().into_inner())?;
                    let to = this.clone().parse_expr(parts.next().unwrap().into_inner())?;
                    Ok(Expr::Range {
                        base: Box::new(lhs?),
                        from: Box::new(from),
                        to: Box::new(to),
                    })
                }
                Rule::verb_call => {
                    let mut parts = op.into_inner();
                    let name = parts.next().unwrap().as_str();
                    let arglist = parts.next().expect("verb call without arglist");
                    Ok(Expr::Verb {
                        location: Box::new(lhs?),
                        verb: Box::new(Expr::Value(v_str(name))),
                        args: this.clone().parse_arglist(arglist.into_inner())?,
                    })
                }
                Rule::verb_expr_call => {
                    let mut parts = op.into_inner();
                    let verb = this.clone().parse_expr(parts.next().unwrap().into_inner())?;
                    let arglist = parts.next().expect("verb call without arglist");
                    Ok(Expr::Verb {
                        location: Box::new(lhs?),
                        verb: Box::new(verb),
                        args: this.clone().parse_arglist(arglist.into_inner())?,
                    })
                }
                Rule::prop => {
                    let name = op.into_inner().next().unwrap().as_str();
                    Ok(Expr::Prop {
                        location: Box::new(lhs?),
                        property: Box::new(Expr::Value(v_str(name))),
                    })
                }
                Rule::prop_expr => {
                    let prop = this.clone().parse_expr(op.into_inner().next().unwrap().into_inner())?;
                    Ok(Expr::Prop {
                        location: Box::new(lhs?),
                        property: Box::new(prop),
                    })
                }
                Rule::assign => {
                    let rhs = this.clone().parse_expr(op.into_inner().next().unwrap().into_inner())?;
                    Ok(Expr::Assign {
                        left: Box::new(lhs?),
                        right: Box::new(rhs),
                    })
                }
                Rule::cond_expr => {
                    let mut parts = op.into_inner();
                    let consequence = this.clone().parse_expr(parts.next().unwrap().into_inner())?;
                    let alternative = this.clone().parse_expr(parts.next().unwrap().into_inner())?;
                    Ok(Expr::Cond {
                        condition: Box::new(lhs?),
                        consequence: Box::new(consequence),
                        alternative: Box::new(alternative),
                    })
                }
                _ => unreachable!("unexpected postfix operator"),
            })
            .parse(pairs);
        result
    }

    fn parse_statements(self: Rc<Self>, pairs: Pairs<Rule>) -> Result<Vec<Stmt>, CompileError> {
        let mut stmts = vec![];
        for pair in pairs {
            if pair.as_rule() != Rule::statement {
                continue;
            }
            if let Some(stmt) = self.clone().parse_statement(pair)? {
                stmts.push(stmt);
            }
        }
        Ok(stmts)
    }

    fn parse_statement(self: Rc<Self>, pair: Pair<Rule>) -> Result<Option<Stmt>, CompileError> {
        let line = pair.line_col().0;
        let inner = pair.into_inner().next().expect("empty statement");
        match inner.as_rule() {
            Rule::empty_statement => Ok(None),
            Rule::expr_statement => {
                let expr = self.parse_expr(inner.into_inner().next().unwrap().into_inner())?;
                Ok(Some(Stmt::new(StmtNode::Expr(expr), line)))
            }
            Rule::return_statement => {
                let expr = match inner.into_inner().next() {
                    Some(e) => Some(self.parse_expr(e.into_inner())?),
                    None => None,
                };
                Ok(Some(Stmt::new(StmtNode::Return(expr), line)))
            }
            Rule::break_statement => {
                let exit = inner
                    .into_inner()
                    .next()
                    .map(|id| self.find_id(id.as_str()));
                Ok(Some(Stmt::new(StmtNode::Break { exit }, line)))
            }
            Rule::continue_statement => {
                let exit = inner
                    .into_inner()
                    .next()
                    .map(|id| self.find_id(id.as_str()));
                Ok(Some(Stmt::new(StmtNode::Continue { exit }, line)))
            }
            Rule::if_statement => {
                let mut parts = inner.into_inner();
                let condition = self
                    .clone()
                    .parse_expr(parts.next().unwrap().into_inner())?;
                let statements = self
                    .clone()
                    .parse_statements(parts.next().unwrap().into_inner())?;
                let mut arms = vec![CondArm {
                    condition,
                    statements,
                }];
                let mut otherwise = vec![];
                for part in parts {
                    match part.as_rule() {
                        Rule::elseif_clause => {
                            let mut clause = part.into_inner();
                            let condition = self
                                .clone()
                                .parse_expr(clause.next().unwrap().into_inner())?;
                            let statements = self
                                .clone()
                                .parse_statements(clause.next().unwrap().into_inner())?;
                            arms.push(CondArm {
                                condition,
                                statements,
                            });
                        }
                        Rule::else_clause => {
                            otherwise = self
                                .clone()
                                .parse_statements(part.into_inner().next().unwrap().into_inner())?;
                        }
                        _ => unreachable!("unexpected if clause"),
                    }
                }
                Ok(Some(Stmt::new(StmtNode::Cond { arms, otherwise }, line)))
            }
            Rule::while_statement => {
                let mut parts = inner.into_inner().peekable();
                let id = if parts.peek().map(|p| p.as_rule()) == Some(Rule::ident) {
                    Some(self.find_id(parts.next().unwrap().as_str()))
                } else {
                    None
                };
                let condition = self
                    .clone()
                    .parse_expr(parts.next().unwrap().into_inner())?;
                let body = self
                    .clone()
                    .parse_statements(parts.next().unwrap().into_inner())?;
                Ok(Some(Stmt::new(
                    StmtNode::While {
                        id,
                        condition,
                        body,
                    },
                    line,
                )))
            }
            Rule::for_in_statement => {
                let mut parts = inner.into_inner();
                let id = self.find_id(parts.next().unwrap().as_str());
                let expr = self
                    .clone()
                    .parse_expr(parts.next().unwrap().into_inner())?;
                let body = self
                    .clone()
                    .parse_statements(parts.next().unwrap().into_inner())?;
                Ok(Some(Stmt::new(StmtNode::ForList { id, expr, body }, line)))
            }
            Rule::for_range_statement => {
                let mut parts = inner.into_inner();
                let id = self.find_id(parts.next().unwrap().as_str());
                let from = self
                    .clone()
                    .parse_expr(parts.next().unwrap().into_inner())?;
                let to = self
                    .clone()
                    .parse_expr(parts.next().unwrap().into_inner())?;
                let body = self
                    .clone()
                    .parse_statements(parts.next().unwrap().into_inner())?;
                Ok(Some(Stmt::new(
                    StmtNode::ForRange { id, from, to, body },
                    line,
                )))
            }
            Rule::fork_statement => {
                let mut parts = inner.into_inner().peekable();
                let id = if parts.peek().map(|p| p.as_rule()) == Some(Rule::ident) {
                    Some(self.find_id(parts.next().unwrap().as_str()))
                } else {
                    None
                };
                let time = self
                    .clone()
                    .parse_expr(parts.next().unwrap().into_inner())?;
                let body = self
                    .clone()
                    .parse_statements(parts.next().unwrap().into_inner())?;
                Ok(Some(Stmt::new(StmtNode::Fork { id, time, body }, line)))
            }
            Rule::try_except_statement => {
                let mut parts = inner.into_inner();
                let body = self
                    .clone()
                    .parse_statements(parts.next().unwrap().into_inner())?;
                let mut excepts = vec![];
                for except in parts {
                    let mut clause = except.into_inner().peekable();
                    let id = if clause.peek().map(|p| p.as_rule()) == Some(Rule::ident) {
                        Some(self.find_id(clause.next().unwrap().as_str()))
                    } else {
                        None
                    };
                    let codes = self.clone().parse_codes(clause.next().unwrap())?;
                    let statements = self
                        .clone()
                        .parse_statements(clause.next().unwrap().into_inner())?;
                    excepts.push(ExceptArm {
                        id,
                        codes,
                        statements,
                    });
                }
                Ok(Some(Stmt::new(StmtNode::TryExcept { body, excepts }, line)))
            }
            Rule::try_finally_statement => {
                let mut parts = inner.into_inner();
                let body = self
                    .clone()
                    .parse_statements(parts.next().unwrap().into_inner())?;
                let handler = self
                    .clone()
                    .parse_statements(parts.next().unwrap().into_inner())?;
                Ok(Some(Stmt::new(StmtNode::TryFinally { body, handler }, line)))
            }
            _ => Err(parse_err(&inner, "unexpected statement")),
        }
    }
}

fn parse_err(pair: &Pair<Rule>, message: &str) -> CompileError {
    let (line, column) = pair.line_col();
    CompileError::ParseError {
        line,
        column,
        message: message.to_string(),
    }
}

/// Parse a verb program to its AST and variable-name table.
pub fn parse_program(program_text: &str) -> Result<Parse, CompileError> {
    let pairs = MooParser::parse(Rule::program, program_text).map_err(|e| {
        let (line, column) = match e.line_col {
            pest::error::LineColLocation::Pos((l, c)) => (l, c),
            pest::error::LineColLocation::Span((l, c), _) => (l, c),
        };
        CompileError::ParseError {
            line,
            column,
            message: e.variant.message().to_string(),
        }
    })?;

    let transformer = TreeTransformer::new();
    let mut stmts = vec![];
    for pair in pairs {
        if pair.as_rule() != Rule::program {
            continue;
        }
        for part in pair.into_inner() {
            if part.as_rule() == Rule::statements {
                stmts = transformer.clone().parse_statements(part.into_inner())?;
            }
        }
    }
    let names = transformer.names.borrow().clone();
    Ok(Parse { stmts, names })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ast::StmtNode;

    #[test]
    fn test_parse_simple_expr_statement() {
        let parse = parse_program("1 + 2;").unwrap();
        assert_eq!(parse.stmts.len(), 1);
        let StmtNode::Expr(Expr::Binary(BinaryOp::Add, l, r)) = &parse.stmts[0].node else {
            panic!("bad parse: {:?}", parse.stmts);
        };
        assert_eq!(**l, Expr::Value(v_int(1)));
        assert_eq!(**r, Expr::Value(v_int(2)));
    }

    #[test]
    fn test_parse_precedence() {
        let parse = parse_program("1 + 2 * 3;").unwrap();
        let StmtNode::Expr(Expr::Binary(BinaryOp::Add, _, r)) = &parse.stmts[0].node else {
            panic!("bad parse: {:?}", parse.stmts);
        };
        assert!(matches!(**r, Expr::Binary(BinaryOp::Mul, _, _)));
    }

    #[test]
    fn test_parse_if_elseif_else() {
        let parse =
            parse_program("if (1) return 1; elseif (2) return 2; else return 3; endif").unwrap();
        let StmtNode::Cond { arms, otherwise } = &parse.stmts[0].node else {
            panic!("bad parse: {:?}", parse.stmts);
        };
        assert_eq!(arms.len(), 2);
        assert_eq!(otherwise.len(), 1);
    }

    #[test]
    fn test_parse_while_labelled() {
        let parse = parse_program("while outer (1) break outer; endwhile").unwrap();
        let StmtNode::While { id, .. } = &parse.stmts[0].node else {
            panic!("bad parse: {:?}", parse.stmts);
        };
        assert!(id.is_some());
    }

    #[test]
    fn test_parse_for_loops() {
        let parse = parse_program("for x in ({1, 2}) endfor for y in [1..5] endfor").unwrap();
        assert!(matches!(parse.stmts[0].node, StmtNode::ForList { .. }));
        assert!(matches!(parse.stmts[1].node, StmtNode::ForRange { .. }));
    }

    #[test]
    fn test_parse_fork() {
        let parse = parse_program("fork tid (5) player:tell(tid); endfork").unwrap();
        let StmtNode::Fork { id, .. } = &parse.stmts[0].node else {
            panic!("bad parse: {:?}", parse.stmts);
        };
        assert!(id.is_some());
    }

    #[test]
    fn test_parse_try_except() {
        let parse = parse_program(
            "try x = 1; except e (E_TYPE, E_DIV) return e; except (ANY) return 0; endtry",
        )
        .unwrap();
        let StmtNode::TryExcept { excepts, .. } = &parse.stmts[0].node else {
            panic!("bad parse: {:?}", parse.stmts);
        };
        assert_eq!(excepts.len(), 2);
        assert!(excepts[0].id.is_some());
        assert!(matches!(excepts[0].codes, CatchCodes::Codes(_)));
        assert!(matches!(excepts[1].codes, CatchCodes::Any));
    }

    #[test]
    fn test_parse_try_finally() {
        let parse = parse_program("try x = 1; finally x = 2; endtry").unwrap();
        assert!(matches!(parse.stmts[0].node, StmtNode::TryFinally { .. }));
    }

    #[test]
    fn test_parse_catch_expr() {
        let parse = parse_program("`1/0 ! E_DIV => \"nope\"';").unwrap();
        let StmtNode::Expr(Expr::TryCatch { except, .. }) = &parse.stmts[0].node else {
            panic!("bad parse: {:?}", parse.stmts);
        };
        assert!(except.is_some());
    }

    #[test]
    fn test_parse_scatter_assign() {
        let parse = parse_program("{a, ?b = 5, @rest} = args;").unwrap();
        let StmtNode::Expr(Expr::Scatter(items, _)) = &parse.stmts[0].node else {
            panic!("bad parse: {:?}", parse.stmts);
        };
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].kind, ScatterKind::Required);
        assert_eq!(items[1].kind, ScatterKind::Optional);
        assert_eq!(items[2].kind, ScatterKind::Rest);
    }

    #[test]
    fn test_parse_sysprop_and_dollar() {
        let parse = parse_program("$login:welcome(x[$]);").unwrap();
        let StmtNode::Expr(Expr::Verb { location, .. }) = &parse.stmts[0].node else {
            panic!("bad parse: {:?}", parse.stmts);
        };
        assert!(matches!(**location, Expr::Prop { .. }));
    }

    #[test]
    fn test_parse_verb_and_prop_expr_forms() {
        let parse = parse_program("x:(\"fo\" + \"o\")(1); x.(\"bar\");").unwrap();
        assert!(matches!(
            parse.stmts[0].node,
            StmtNode::Expr(Expr::Verb { .. })
        ));
        assert!(matches!(
            parse.stmts[1].node,
            StmtNode::Expr(Expr::Prop { .. })
        ));
    }

    #[test]
    fn test_parse_cond_expr() {
        let parse = parse_program("x = 1 ? 2 | 3;").unwrap();
        let StmtNode::Expr(Expr::Assign { right, .. }) = &parse.stmts[0].node else {
            panic!("bad parse: {:?}", parse.stmts);
        };
        assert!(matches!(**right, Expr::Cond { .. }));
    }

    #[test]
    fn test_parse_error_is_annotated() {
        let err = parse_program("if (1)\nreturn;\n").unwrap_err();
        let CompileError::ParseError { line, .. } = err else {
            panic!("expected parse error, got {:?}", err);
        };
        assert!(line >= 2);
    }

    #[test]
    fn test_keyword_prefix_identifiers() {
        // Identifiers that merely begin with keywords are fine.
        let parse = parse_program("iffy = 1; formal = iffy + 1;").unwrap();
        assert_eq!(parse.stmts.len(), 2);
    }

    #[test]
    fn test_comments_ignored() {
        let parse = parse_program("x = 1; /* set x */ y = 2;").unwrap();
        assert_eq!(parse.stmts.len(), 2);
    }
}
