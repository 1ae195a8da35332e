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

use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;
use onig::{Regex, RegexOptions, Region, SearchOptions};
use rand::Rng;

use crate::bf_declare;
use crate::builtins::bf_values::md5_hex;
use crate::builtins::BfRet::Ret;
use crate::builtins::{BfCallState, BfErr, BfRet, BuiltinFunction};
use crate::compiler::offset_for_builtin;
use crate::var::Error::{E_INVARG, E_TYPE};
use crate::var::{v_empty_list, v_int, v_list, v_str, v_string, Str, Var};

lazy_static! {
    // The regex engine is not reentrant; every use goes through this lock.
    static ref REGEX_LOCK: Mutex<()> = Mutex::new(());
}

fn bf_strsub(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let (Var::Str(subject), Var::Str(what), Var::Str(with)) =
        (&bf_args.args[0], &bf_args.args[1], &bf_args.args[2])
    else {
        return Err(BfErr::Code(E_TYPE));
    };
    let case_matters = bf_args.args.len() == 4 && bf_args.args[3].is_true();
    if what.is_empty() {
        return Err(BfErr::Code(E_INVARG));
    }

    let subject = subject.as_str();
    let what = what.as_str();
    let mut result = String::with_capacity(subject.len());
    let mut rest = subject;
    loop {
        let found = if case_matters {
            rest.find(what)
        } else {
            rest.to_lowercase().find(&what.to_lowercase())
        };
        match found {
            Some(pos) if rest.is_char_boundary(pos) && rest.is_char_boundary(pos + what.len()) => {
                result.push_str(&rest[..pos]);
                result.push_str(with.as_str());
                rest = &rest[pos + what.len()..];
            }
            _ => {
                result.push_str(rest);
                break;
            }
        }
    }
    Ok(Ret(v_string(result)))
}
bf_declare!(strsub, bf_strsub);

fn bf_index(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let (Var::Str(subject), Var::Str(what)) = (&bf_args.args[0], &bf_args.args[1]) else {
        return Err(BfErr::Code(E_TYPE));
    };
    let case_matters = bf_args.args.len() == 3 && bf_args.args[2].is_true();
    Ok(Ret(v_int(subject.index_of(what, case_matters))))
}
bf_declare!(index, bf_index);

fn bf_rindex(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let (Var::Str(subject), Var::Str(what)) = (&bf_args.args[0], &bf_args.args[1]) else {
        return Err(BfErr::Code(E_TYPE));
    };
    let case_matters = bf_args.args.len() == 3 && bf_args.args[2].is_true();
    Ok(Ret(v_int(subject.rindex_of(what, case_matters))))
}
bf_declare!(rindex, bf_rindex);

fn bf_strcmp(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let (Var::Str(a), Var::Str(b)) = (&bf_args.args[0], &bf_args.args[1]) else {
        return Err(BfErr::Code(E_TYPE));
    };
    Ok(Ret(v_int(match a.as_str().cmp(b.as_str()) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    })))
}
bf_declare!(strcmp, bf_strcmp);

/// Whether a byte may appear bare in a binary string.
fn binary_graphic(b: u8) -> bool {
    (b' '..=b'~').contains(&b) && b != b'~'
}

/// `encode_binary`: ints (byte values), strings, and nested lists of the
/// same, flattened into a `~HH`-escaped binary string.
fn encode_binary_value(v: &Var, out: &mut String) -> Result<(), BfErr> {
    match v {
        Var::Int(i) => {
            if !(0..=255).contains(i) {
                return Err(BfErr::Code(E_INVARG));
            }
            let b = *i as u8;
            if binary_graphic(b) {
                out.push(b as char);
            } else {
                out.push_str(&format!("~{:02X}", b));
            }
            Ok(())
        }
        Var::Str(s) => {
            for b in s.as_str().bytes() {
                if binary_graphic(b) {
                    out.push(b as char);
                } else {
                    out.push_str(&format!("~{:02X}", b));
                }
            }
            Ok(())
        }
        Var::List(l) => {
            for v in l.iter() {
                encode_binary_value(v, out)?;
            }
            Ok(())
        }
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

fn bf_encode_binary(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let mut out = String::new();
    for v in &bf_args.args {
        encode_binary_value(v, &mut out)?;
    }
    Ok(Ret(v_string(out)))
}
bf_declare!(encode_binary, bf_encode_binary);

/// Decode a `~HH` binary string to bytes. A trailing lone `~` or a bad hex
/// digit is an error.
pub(crate) fn decode_binary_bytes(s: &str) -> Result<Vec<u8>, BfErr> {
    let mut bytes = vec![];
    let mut chars = s.bytes();
    while let Some(b) = chars.next() {
        if b != b'~' {
            bytes.push(b);
            continue;
        }
        let (Some(hi), Some(lo)) = (chars.next(), chars.next()) else {
            return Err(BfErr::Code(E_INVARG));
        };
        let hex = [hi, lo];
        let hex = std::str::from_utf8(&hex).map_err(|_| BfErr::Code(E_INVARG))?;
        let byte = u8::from_str_radix(hex, 16).map_err(|_| BfErr::Code(E_INVARG))?;
        bytes.push(byte);
    }
    Ok(bytes)
}

fn bf_decode_binary(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let Var::Str(s) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let fully = bf_args.args.len() == 2 && bf_args.args[1].is_true();
    let bytes = decode_binary_bytes(s.as_str())?;

    if fully {
        let ints: Vec<Var> = bytes.iter().map(|b| v_int(*b as i64)).collect();
        return Ok(Ret(v_list(&ints)));
    }

    // Printable runs group into strings; everything else is an int.
    let mut result: Vec<Var> = vec![];
    let mut run = String::new();
    for b in bytes {
        if (b' '..=b'~').contains(&b) {
            run.push(b as char);
        } else {
            if !run.is_empty() {
                result.push(v_string(std::mem::take(&mut run)));
            }
            result.push(v_int(b as i64));
        }
    }
    if !run.is_empty() {
        result.push(v_string(run));
    }
    Ok(Ret(v_list(&result)))
}
bf_declare!(decode_binary, bf_decode_binary);

/// Run a regex match, returning the LambdaMOO result shape:
/// `{start, end, {nine {start, end} pairs}, subject}` or `{}`.
fn perform_regex_match(
    pattern: &Str,
    subject: &Str,
    case_matters: bool,
    reverse: bool,
) -> Result<Option<Var>, BfErr> {
    let _guard = REGEX_LOCK.lock().unwrap();
    let options = if case_matters {
        RegexOptions::REGEX_OPTION_NONE
    } else {
        RegexOptions::REGEX_OPTION_IGNORECASE
    };
    let regex = Regex::with_options(pattern.as_str(), options, onig::Syntax::perl_ng())
        .map_err(|_| BfErr::Code(E_INVARG))?;

    let subject_str = subject.as_str();
    let found = if reverse {
        // Walk forward to the last match.
        let mut last: Option<(usize, Region)> = None;
        let mut at = 0;
        while at <= subject_str.len() {
            let mut r = Region::new();
            match regex.search_with_options(
                subject_str,
                at,
                subject_str.len(),
                SearchOptions::SEARCH_OPTION_NONE,
                Some(&mut r),
            ) {
                Some(pos) => {
                    let end = r.pos(0).map(|(_, e)| e).unwrap_or(pos + 1);
                    last = Some((pos, r));
                    at = if end > pos { end } else { pos + 1 };
                }
                None => break,
            }
        }
        last.map(|(_, r)| r)
    } else {
        let mut r = Region::new();
        regex
            .search_with_options(
                subject_str,
                0,
                subject_str.len(),
                SearchOptions::SEARCH_OPTION_NONE,
                Some(&mut r),
            )
            .map(|_| r)
    };

    let Some(region) = found else {
        return Ok(None);
    };
    let Some((start, end)) = region.pos(0) else {
        return Ok(None);
    };
    // Byte offsets to 1-based character positions.
    let char_pos = |byte: usize| subject_str[..byte].chars().count() as i64;

    let mut subs = Vec::with_capacity(9);
    for i in 1..=9 {
        match region.pos(i) {
            Some((s, e)) => {
                subs.push(v_list(&[v_int(char_pos(s) + 1), v_int(char_pos(e))]));
            }
            None => subs.push(v_list(&[v_int(0), v_int(-1)])),
        }
    }
    Ok(Some(v_list(&[
        v_int(char_pos(start) + 1),
        v_int(char_pos(end)),
        v_list(&subs),
        Var::Str(subject.clone()),
    ])))
}

fn match_common(bf_args: &mut BfCallState<'_>, reverse: bool) -> Result<BfRet, BfErr> {
    let (Var::Str(subject), Var::Str(pattern)) = (&bf_args.args[0], &bf_args.args[1]) else {
        return Err(BfErr::Code(E_TYPE));
    };
    let case_matters = bf_args.args.len() == 3 && bf_args.args[2].is_true();
    match perform_regex_match(pattern, subject, case_matters, reverse)? {
        Some(result) => Ok(Ret(result)),
        None => Ok(Ret(v_empty_list())),
    }
}

fn bf_match(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    match_common(bf_args, false)
}

// `match` is a Rust keyword, so the declaration macro cannot name it.
pub struct BfMatch {}
impl BuiltinFunction for BfMatch {
    fn name(&self) -> &str {
        "match"
    }
    fn call(&self, bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
        bf_match(bf_args)
    }
}

fn bf_rmatch(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    match_common(bf_args, true)
}
bf_declare!(rmatch, bf_rmatch);

/// `substitute(template, subs)` where subs is a `match()` result.
fn bf_substitute(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let (Var::Str(template), Var::List(subs)) = (&bf_args.args[0], &bf_args.args[1]) else {
        return Err(BfErr::Code(E_TYPE));
    };
    if subs.len() != 4 {
        return Err(BfErr::Code(E_INVARG));
    }
    let fields = (
        subs.index(1).map_err(BfErr::Code)?,
        subs.index(2).map_err(BfErr::Code)?,
        subs.index(3).map_err(BfErr::Code)?,
        subs.index(4).map_err(BfErr::Code)?,
    );
    let (Var::Int(start), Var::Int(end), Var::List(groups), Var::Str(subject)) = fields else {
        return Err(BfErr::Code(E_INVARG));
    };

    let subject_chars: Vec<char> = subject.as_str().chars().collect();
    let extract = |s: i64, e: i64| -> Result<String, BfErr> {
        if e < s {
            return Ok(String::new());
        }
        if s < 1 || e as usize > subject_chars.len() {
            return Err(BfErr::Code(E_INVARG));
        }
        Ok(subject_chars[(s - 1) as usize..e as usize].iter().collect())
    };

    let mut result = String::new();
    let mut chars = template.as_str().chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => result.push('%'),
            Some('0') => result.push_str(&extract(start, end)?),
            Some(d @ '1'..='9') => {
                let idx = d.to_digit(10).unwrap() as i64;
                let Var::List(pair) = groups.index(idx).map_err(BfErr::Code)? else {
                    return Err(BfErr::Code(E_INVARG));
                };
                let (Var::Int(s), Var::Int(e)) = (
                    pair.index(1).map_err(BfErr::Code)?,
                    pair.index(2).map_err(BfErr::Code)?,
                ) else {
                    return Err(BfErr::Code(E_INVARG));
                };
                result.push_str(&extract(s, e)?);
            }
            _ => return Err(BfErr::Code(E_INVARG)),
        }
    }
    Ok(Ret(v_string(result)))
}
bf_declare!(substitute, bf_substitute);

const SALT_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789./";

fn bf_crypt(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let Var::Str(text) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let salt = if bf_args.args.len() == 2 {
        let Var::Str(salt) = &bf_args.args[1] else {
            return Err(BfErr::Code(E_TYPE));
        };
        salt.as_str().to_string()
    } else {
        let mut rng = rand::thread_rng();
        let mut salt = String::with_capacity(2);
        salt.push(SALT_CHARS[rng.gen_range(0..SALT_CHARS.len())] as char);
        salt.push(SALT_CHARS[rng.gen_range(0..SALT_CHARS.len())] as char);
        salt
    };
    // The legacy DES crypt(3); kept for compatibility, not strength.
    match pwhash::unix::crypt(text.as_str(), &salt) {
        Ok(crypted) => Ok(Ret(v_string(crypted))),
        Err(_) => Err(BfErr::Code(E_INVARG)),
    }
}
bf_declare!(crypt, bf_crypt);

fn bf_string_hash(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let Var::Str(s) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    Ok(Ret(v_string(md5_hex(s.as_str().as_bytes()))))
}
bf_declare!(string_hash, bf_string_hash);

fn bf_binary_hash(bf_args: &mut BfCallState<'_>) -> Result<BfRet, BfErr> {
    let Var::Str(s) = &bf_args.args[0] else {
        return Err(BfErr::Code(E_TYPE));
    };
    let bytes = decode_binary_bytes(s.as_str())?;
    Ok(Ret(v_string(md5_hex(&bytes))))
}
bf_declare!(binary_hash, bf_binary_hash);

pub(crate) fn register_bf_strings(builtins: &mut [Arc<dyn BuiltinFunction>]) {
    builtins[offset_for_builtin("strsub")] = Arc::new(BfStrsub {});
    builtins[offset_for_builtin("index")] = Arc::new(BfIndex {});
    builtins[offset_for_builtin("rindex")] = Arc::new(BfRindex {});
    builtins[offset_for_builtin("strcmp")] = Arc::new(BfStrcmp {});
    builtins[offset_for_builtin("encode_binary")] = Arc::new(BfEncodeBinary {});
    builtins[offset_for_builtin("decode_binary")] = Arc::new(BfDecodeBinary {});
    builtins[offset_for_builtin("match")] = Arc::new(BfMatch {});
    builtins[offset_for_builtin("rmatch")] = Arc::new(BfRmatch {});
    builtins[offset_for_builtin("substitute")] = Arc::new(BfSubstitute {});
    builtins[offset_for_builtin("crypt")] = Arc::new(BfCrypt {});
    builtins[offset_for_builtin("string_hash")] = Arc::new(BfStringHash {});
    builtins[offset_for_builtin("binary_hash")] = Arc::new(BfBinaryHash {});
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_binary_bytes() {
        assert_eq!(decode_binary_bytes("foo~0Abar").unwrap(), b"foo\nbar");
        assert_eq!(decode_binary_bytes("~7e").unwrap(), b"~");
        // A trailing lone tilde or bad hex digits are strict errors.
        assert!(decode_binary_bytes("oops~").is_err());
        assert!(decode_binary_bytes("oops~1").is_err());
        assert!(decode_binary_bytes("oops~zz").is_err());
    }

    #[test]
    fn test_encode_binary_escaping() {
        let mut out = String::new();
        encode_binary_value(&v_str("a b"), &mut out).unwrap();
        encode_binary_value(&v_int(10), &mut out).unwrap();
        encode_binary_value(&v_int(126), &mut out).unwrap();
        assert_eq!(out, "a b~0A~7E");
        let mut out = String::new();
        assert!(encode_binary_value(&v_int(256), &mut out).is_err());
    }
}
