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

use thiserror::Error as ThisError;
use tracing::debug;

use crate::matching::{parse_command, ParseCommandError, ParsedCommand, WsMatchEnv};
use crate::model::{WorldState, WorldStateError};
use crate::tasks::sessions::Session;
use crate::tasks::vm_host::VmHost;
use crate::tasks::{TaskId, TaskStart};
use crate::var::{List, Objid, Symbol, NOTHING};
use crate::vm::vm_call::VerbCall;

/// A task: one scheduled run of verb code, with its own VM host and its own
/// transaction per execution segment.
pub struct Task {
    pub task_id: TaskId,
    pub player: Objid,
    /// The permissions the task was started with (the owner, for
    /// `queued_tasks` and kill checks).
    pub perms: Objid,
    pub task_start: TaskStart,
    pub vm_host: VmHost,
    pub session: Arc<dyn Session>,
    /// Suspended at least once, or started in the background; budgets come
    /// from the bg pool.
    pub is_background: bool,
}

#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("I couldn't understand that.")]
    CouldNotParseCommand,
    #[error("I don't see that here.")]
    NoObjectMatch,
    #[error("I couldn't understand that.")]
    NoCommandMatch,
    #[error("database error: {0}")]
    WorldState(WorldStateError),
}

impl Task {
    /// Resolve the task start into initial activation frames. A `Err` here
    /// means the task never gets to run (e.g. command dispatch failure);
    /// the scheduler reports it to the player.
    pub fn setup(&mut self, world_state: &mut dyn WorldState) -> Result<(), CommandError> {
        match self.task_start.clone() {
            TaskStart::StartCommandVerb { player, command } => {
                self.setup_command(world_state, player, &command)
            }
            TaskStart::StartVerb {
                player,
                vloc,
                verb,
                args,
                argstr,
            } => {
                let (resolved_verb, program) = world_state
                    .find_method_verb_on(self.perms, vloc, verb.clone())
                    .map_err(CommandError::WorldState)?;
                let call = VerbCall {
                    verb_name: verb,
                    location: vloc,
                    this: vloc,
                    player,
                    args,
                    argstr,
                    caller: NOTHING,
                };
                self.vm_host.start_call_method_verb(
                    self.task_id,
                    self.perms,
                    resolved_verb,
                    program,
                    &call,
                );
                Ok(())
            }
            TaskStart::StartFork { fork, suspended } => {
                self.vm_host.start_fork(self.task_id, fork, suspended);
                Ok(())
            }
            TaskStart::StartEval { player, program } => {
                self.vm_host
                    .start_eval(self.task_id, self.perms, player, program);
                Ok(())
            }
        }
    }

    /// LambdaMOO command dispatch: parse the line, then search
    /// player → player's location → dobj → iobj for a verb whose name and
    /// argument spec match, falling back to the location's `huh`.
    fn setup_command(
        &mut self,
        world_state: &mut dyn WorldState,
        player: Objid,
        command: &str,
    ) -> Result<(), CommandError> {
        debug!(task_id = self.task_id, ?player, command, "dispatching command");
        let matcher = WsMatchEnv {
            ws: &*world_state,
            perms: self.perms,
            player,
        };
        let parsed = parse_command(command, &matcher).map_err(|e| match e {
            ParseCommandError::EmptyCommand => CommandError::CouldNotParseCommand,
            ParseCommandError::ErrorDuringMatch(ws) => CommandError::WorldState(ws),
        })?;

        let location = world_state.location_of(self.perms, player).unwrap_or(NOTHING);
        let targets = [player, location, parsed.dobj, parsed.iobj];
        for this in targets {
            if !this.is_positive() {
                continue;
            }
            let found = world_state
                .find_command_verb_on(
                    self.perms,
                    this,
                    &parsed.verb,
                    parsed.dobj,
                    &parsed.prep,
                    parsed.iobj,
                )
                .map_err(CommandError::WorldState)?;
            if let Some((resolved_verb, program)) = found {
                self.start_parsed_command(player, this, resolved_verb, program, &parsed);
                return Ok(());
            }
        }

        // Nothing matched; hand it to `huh` on the location if one exists.
        if location.is_positive() {
            let found = world_state
                .find_command_verb_on(
                    self.perms,
                    location,
                    "huh",
                    parsed.dobj,
                    &parsed.prep,
                    parsed.iobj,
                )
                .map_err(CommandError::WorldState)?;
            if let Some((resolved_verb, program)) = found {
                self.start_parsed_command(player, location, resolved_verb, program, &parsed);
                return Ok(());
            }
        }

        Err(CommandError::NoCommandMatch)
    }

    fn start_parsed_command(
        &mut self,
        player: Objid,
        this: Objid,
        resolved_verb: crate::model::VerbDef,
        program: crate::compiler::Program,
        parsed: &ParsedCommand,
    ) {
        let call = VerbCall {
            verb_name: Symbol::mk(&parsed.verb),
            location: this,
            this,
            player,
            args: List::from_iter(parsed.args.iter().cloned()),
            argstr: parsed.argstr.clone(),
            caller: player,
        };
        let permissions = resolved_verb.owner;
        self.vm_host.start_call_command_verb(
            self.task_id,
            permissions,
            resolved_verb,
            program,
            &call,
            parsed.clone(),
        );
    }

    /// The message the player sees when dispatch failed outright.
    pub fn report_command_error(&self, err: &CommandError) {
        match err {
            CommandError::WorldState(ws) => {
                self.session
                    .send_text(self.player, &format!("Internal error: {}", ws));
            }
            e => {
                self.session.send_text(self.player, &e.to_string());
            }
        }
    }
}

/// `eval` program text for a `;expression` command line: wrap into a
/// return so the expression's value is the task's result.
pub fn eval_source_for(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.ends_with(';') || trimmed.ends_with("endwhile") || trimmed.ends_with("endfor")
        || trimmed.ends_with("endif") || trimmed.ends_with("endtry") || trimmed.ends_with("endfork")
    {
        trimmed.to_string()
    } else {
        format!("return {};", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_source_wrapping() {
        assert_eq!(eval_source_for("1 + 2"), "return 1 + 2;");
        assert_eq!(eval_source_for("x = 5; return x;"), "x = 5; return x;");
        assert_eq!(
            eval_source_for("while (1) endwhile"),
            "while (1) endwhile"
        );
    }

    #[test]
    fn test_command_error_messages() {
        assert_eq!(
            CommandError::NoCommandMatch.to_string(),
            "I couldn't understand that."
        );
    }

}
