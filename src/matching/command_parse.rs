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

use thiserror::Error as ThisError;

use crate::matching::match_env::ObjectNameMatcher;
use crate::matching::prepositions::Preposition;
use crate::model::r#match::PrepSpec;
use crate::model::WorldStateError;
use crate::util::parse_into_words;
use crate::var::{v_str, Objid, Var, NOTHING};

/// The LambdaMOO 1.8-style decomposition of an input line.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedCommand {
    pub verb: String,
    pub argstr: String,
    pub args: Vec<Var>,
    pub dobjstr: String,
    pub dobj: Objid,
    pub prepstr: String,
    pub prep: PrepSpec,
    pub iobjstr: String,
    pub iobj: Objid,
}

#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum ParseCommandError {
    #[error("empty command")]
    EmptyCommand,
    #[error("error during object match: {0}")]
    ErrorDuringMatch(WorldStateError),
}

/// Parse one command line: split off the verb word, find the preposition,
/// and resolve the direct/indirect object strings against the player's
/// surroundings.
pub fn parse_command<M: ObjectNameMatcher>(
    input: &str,
    env: &M,
) -> Result<ParsedCommand, ParseCommandError> {
    // The say/emote/eval shorthand prefixes.
    let mut command = input.trim_start().to_string();
    match command.chars().next().unwrap_or(' ') {
        '"' => command.replace_range(..1, "say "),
        ':' => command.replace_range(..1, "emote "),
        ';' => command.replace_range(..1, "eval "),
        _ => {}
    };

    let words = parse_into_words(&command);
    if words.is_empty() {
        return Err(ParseCommandError::EmptyCommand);
    }

    let mut parts = command.splitn(2, ' ');
    let verb = parts.next().unwrap_or_default().to_string();
    let argstr = parts.next().unwrap_or_default().to_string();

    let words = parse_into_words(&argstr);

    let (prep_match, prep) = seek_preposition(&words);

    let dobjstr = match &prep_match {
        Some((start, _, _)) => words[0..*start].join(" "),
        None => words.join(" "),
    };
    let dobj = if dobjstr.is_empty() {
        NOTHING
    } else {
        env.match_object(&dobjstr)
            .map_err(ParseCommandError::ErrorDuringMatch)?
    };

    let (prepstr, iobjstr) = match &prep_match {
        Some((start, len, _)) => (
            words[*start..*start + *len].join(" "),
            words[*start + *len..].join(" "),
        ),
        None => (String::new(), String::new()),
    };
    let iobj = if iobjstr.is_empty() {
        NOTHING
    } else {
        env.match_object(&iobjstr)
            .map_err(ParseCommandError::ErrorDuringMatch)?
    };

    let args: Vec<Var> = words.iter().map(|w| v_str(w)).collect();

    Ok(ParsedCommand {
        verb,
        argstr,
        args,
        dobjstr,
        dobj,
        prepstr,
        prep,
        iobjstr,
        iobj,
    })
}

/// Find the first preposition in the argument words, preferring longer
/// multi-word forms ("in front of") over shorter ones ("in").
fn seek_preposition(words: &[String]) -> (Option<(usize, usize, Preposition)>, PrepSpec) {
    for j in 0..words.len() {
        for len in (1..=3.min(words.len() - j)).rev() {
            let candidate = words[j..j + len].join(" ");
            if let Some(p) = Preposition::parse(&candidate.to_lowercase()) {
                return (Some((j, len, p)), PrepSpec::Other(p));
            }
        }
    }
    (None, PrepSpec::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::var::Objid;

    struct SimpleMatcher {}
    impl ObjectNameMatcher for SimpleMatcher {
        fn match_object(&self, name: &str) -> Result<Objid, WorldStateError> {
            Ok(match name {
                "obj" => Objid(1),
                "player" => Objid(2),
                _ => crate::var::FAILED_MATCH,
            })
        }
    }

    #[test]
    fn test_parse_single_arg_command() {
        let parsed = parse_command("look obj", &SimpleMatcher {}).unwrap();
        assert_eq!(parsed.verb, "look");
        assert_eq!(parsed.dobjstr, "obj");
        assert_eq!(parsed.dobj, Objid(1));
        assert_eq!(parsed.prep, PrepSpec::None);
        assert_eq!(parsed.iobjstr, "");
        assert_eq!(parsed.iobj, NOTHING);
        assert_eq!(parsed.args, vec![v_str("obj")]);
        assert_eq!(parsed.argstr, "obj");
    }

    #[test]
    fn test_parse_dobj_prep_iobj() {
        let parsed = parse_command("give obj to player", &SimpleMatcher {}).unwrap();
        assert_eq!(parsed.verb, "give");
        assert_eq!(parsed.dobj, Objid(1));
        assert_eq!(parsed.prepstr, "to");
        assert_eq!(parsed.prep, PrepSpec::Other(Preposition::AtTo));
        assert_eq!(parsed.iobjstr, "player");
        assert_eq!(parsed.iobj, Objid(2));
    }

    #[test]
    fn test_parse_multiword_preposition() {
        let parsed = parse_command("put obj in front of player", &SimpleMatcher {}).unwrap();
        assert_eq!(parsed.prepstr, "in front of");
        assert_eq!(parsed.prep, PrepSpec::Other(Preposition::InFrontOf));
        assert_eq!(parsed.iobjstr, "player");
    }

    #[test]
    fn test_parse_say_abbreviation() {
        let parsed = parse_command("\"hello, world!", &SimpleMatcher {}).unwrap();
        assert_eq!(parsed.verb, "say");
        assert_eq!(parsed.argstr, "hello, world!");
        assert_eq!(parsed.args, vec![v_str("hello,"), v_str("world!")]);
    }

    #[test]
    fn test_parse_emote_abbreviation() {
        let parsed = parse_command(":waves happily.", &SimpleMatcher {}).unwrap();
        assert_eq!(parsed.verb, "emote");
        assert_eq!(parsed.argstr, "waves happily.");
    }

    #[test]
    fn test_parse_eval_abbreviation() {
        let parsed = parse_command(";1 + 1", &SimpleMatcher {}).unwrap();
        assert_eq!(parsed.verb, "eval");
        assert_eq!(parsed.argstr, "1 + 1");
    }

    #[test]
    fn test_parse_quoted_arg() {
        let parsed = parse_command("blork \"hello, world!\"", &SimpleMatcher {}).unwrap();
        assert_eq!(parsed.args, vec![v_str("hello, world!")]);
        assert_eq!(parsed.argstr, "\"hello, world!\"");
    }

    #[test]
    fn test_empty_command() {
        assert_eq!(
            parse_command("   ", &SimpleMatcher {}),
            Err(ParseCommandError::EmptyCommand)
        );
    }
}
