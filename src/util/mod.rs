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

mod bitenum;

pub use bitenum::{BitEnum, BitFlag};

/// Split a command line into words, honoring double-quoted runs and
/// backslash escapes, LambdaMOO style.
pub fn parse_into_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = input.chars();
    let mut pending = false;

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                pending = true;
            }
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                    pending = true;
                }
            }
            c if c.is_whitespace() && !in_quotes => {
                if pending || !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }
    if pending || !current.is_empty() {
        words.push(current);
    }
    words
}

/// Match a candidate word against a verb-name pattern with the `*` wildcard
/// rule: everything before the star is required, the candidate may then be
/// any prefix of the remainder. A bare `*` matches anything.
pub fn verbname_cmp(pattern: &str, candidate: &str) -> bool {
    let pattern = pattern.to_lowercase();
    let candidate = candidate.to_lowercase();
    match pattern.split_once('*') {
        None => pattern == candidate,
        Some(("", "")) => true,
        Some((prefix, rest)) => {
            if candidate.len() < prefix.len() {
                return false;
            }
            let full: String = format!("{}{}", prefix, rest);
            candidate.starts_with(prefix) && full.starts_with(&candidate)
        }
    }
}

/// Strip the surrounding quotes of a string literal and process its
/// backslash escapes.
pub fn unquote_str(s: &str) -> Option<String> {
    let mut output = String::with_capacity(s.len());
    let mut chars = s.chars();
    let Some('"') = chars.next() else {
        return None;
    };
    loop {
        match chars.next()? {
            '"' => {
                // Closing quote must end the literal.
                return if chars.next().is_none() {
                    Some(output)
                } else {
                    None
                };
            }
            '\\' => output.push(chars.next()?),
            c => output.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_into_words_simple() {
        assert_eq!(parse_into_words("hello world"), vec!["hello", "world"]);
    }

    #[test]
    fn test_parse_into_words_quotes() {
        assert_eq!(
            parse_into_words("hello \"big world\""),
            vec!["hello", "big world"]
        );
        assert_eq!(
            parse_into_words(r"hello\ world frankly"),
            vec!["hello world", "frankly"]
        );
    }

    #[test]
    fn test_parse_into_words_empty_quotes() {
        assert_eq!(parse_into_words("say \"\""), vec!["say", ""]);
    }

    #[test]
    fn test_verbname_cmp_exact() {
        assert!(verbname_cmp("look", "look"));
        assert!(verbname_cmp("look", "LOOK"));
        assert!(!verbname_cmp("look", "loo"));
    }

    #[test]
    fn test_verbname_cmp_wildcard() {
        assert!(verbname_cmp("foo*bar", "foo"));
        assert!(verbname_cmp("foo*bar", "foob"));
        assert!(verbname_cmp("foo*bar", "foobar"));
        assert!(!verbname_cmp("foo*bar", "fo"));
        assert!(!verbname_cmp("foo*bar", "foobarbaz"));
        assert!(!verbname_cmp("foo*bar", "foobaz"));
        assert!(verbname_cmp("*", "anything"));
    }

    #[test]
    fn test_unquote_str() {
        assert_eq!(unquote_str(r#""hi""#), Some("hi".to_string()));
        assert_eq!(unquote_str(r#""a \"b\"""#), Some("a \"b\"".to_string()));
        assert_eq!(unquote_str(r#""unterminated"#), None);
    }
}
