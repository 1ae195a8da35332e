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

use strum::FromRepr;

/// The fixed LambdaMOO preposition table. Multi-word forms are matched
/// greedily against command words before single words.
#[repr(u16)]
#[derive(Copy, Clone, Debug, FromRepr, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Preposition {
    WithUsing = 0,
    AtTo = 1,
    InFrontOf = 2,
    IntoIn = 3,
    OnTopOfOn = 4,
    OutOf = 5,
    Over = 6,
    Through = 7,
    Under = 8,
    Behind = 9,
    Beside = 10,
    ForAbout = 11,
    Is = 12,
    As = 13,
    OffOf = 14,
}

impl Preposition {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "with/using" | "with" | "using" => Some(Self::WithUsing),
            "at/to" | "at" | "to" => Some(Self::AtTo),
            "in front of" | "in-front-of" => Some(Self::InFrontOf),
            "in/inside/into" | "in" | "inside" | "into" => Some(Self::IntoIn),
            "on top of/on/onto/upon" | "on top of" | "on" | "onto" | "upon" => {
                Some(Self::OnTopOfOn)
            }
            "out of/from inside/from" | "out of" | "from inside" | "from" => Some(Self::OutOf),
            "over" => Some(Self::Over),
            "through" => Some(Self::Through),
            "under/underneath/beneath" | "under" | "underneath" | "beneath" => Some(Self::Under),
            "behind" => Some(Self::Behind),
            "beside" => Some(Self::Beside),
            "for/about" | "for" | "about" => Some(Self::ForAbout),
            "is" => Some(Self::Is),
            "as" => Some(Self::As),
            "off/off of" | "off" | "off of" => Some(Self::OffOf),
            _ => None,
        }
    }

    /// The full alias form, as shown by `verb_args`.
    pub fn to_string_full(&self) -> &'static str {
        match self {
            Self::WithUsing => "with/using",
            Self::AtTo => "at/to",
            Self::InFrontOf => "in front of",
            Self::IntoIn => "in/inside/into",
            Self::OnTopOfOn => "on top of/on/onto/upon",
            Self::OutOf => "out of/from inside/from",
            Self::Over => "over",
            Self::Through => "through",
            Self::Under => "under/underneath/beneath",
            Self::Behind => "behind",
            Self::Beside => "beside",
            Self::ForAbout => "for/about",
            Self::Is => "is",
            Self::As => "as",
            Self::OffOf => "off/off of",
        }
    }
}

/// Parse a preposition given either a word or a numeric table index, as
/// `set_verb_args` accepts.
pub fn find_preposition(prep: &str) -> Option<Preposition> {
    if let Ok(id) = prep.parse::<u16>() {
        return Preposition::from_repr(id);
    }
    Preposition::parse(prep)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(Preposition::parse("with"), Some(Preposition::WithUsing));
        assert_eq!(Preposition::parse("using"), Some(Preposition::WithUsing));
        assert_eq!(Preposition::parse("onto"), Some(Preposition::OnTopOfOn));
        assert_eq!(Preposition::parse("xyz"), None);
    }

    #[test]
    fn test_find_by_number() {
        assert_eq!(find_preposition("1"), Some(Preposition::AtTo));
        assert_eq!(find_preposition("99"), None);
    }
}
