//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Crymap.
//
// Crymap is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Crymap is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Crymap. If not, see <http://www.gnu.org/licenses/>.

//! Low-level lexical helpers shared by the MIME field parsers.
//!
//! Header values are handled as raw byte slices which run up to and including
//! the line ending of the last physical line of the header. The end of the
//! slice plays the role of the end of the header: a line break which is not
//! followed by a space or tab also terminates the value.

use memchr::memchr;
use nom::{error::ErrorKind, IResult};

/// The MIME "tspecials" (RFC 2045 section 5.1).
pub const TSPECIALS: &[u8] = b"()<>@,;:\\\"/[]?=";

pub fn is_tspecial(b: u8) -> bool {
    TSPECIALS.contains(&b)
}

/// Whitespace as understood by the C locale's `isspace`.
pub fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0B | 0x0C)
}

fn is_wsp(b: Option<&u8>) -> bool {
    matches!(b, Some(b' ') | Some(b'\t'))
}

/// Advance past whitespace, folding, and (possibly nested) comments.
///
/// Returns the remainder of the value starting at the first significant
/// byte, or `None` if nothing significant remains. An unterminated comment,
/// or a line break that is not a fold, also yields `None`.
pub fn skip_rfc822_space(s: &[u8]) -> Option<&[u8]> {
    let mut i = 0;
    while i < s.len() && (is_space(s[i]) || b'(' == s[i]) {
        match s[i] {
            b'\n' => {
                i += 1;
                if !is_wsp(s.get(i)) {
                    return None;
                }
            }

            b'(' => {
                let rest = skip_comment(&s[i..])?;
                i = s.len() - rest.len();
            }

            _ => i += 1,
        }
    }

    if i >= s.len() {
        None
    } else {
        Some(&s[i..])
    }
}

/// Skip the comment at the start of `s`, which must begin with `(`.
///
/// Comments nest and `\` escapes the byte after it. Returns the input after
/// the final `)`, or `None` if the comment is unterminated or contains a line
/// break that is not a fold.
pub fn skip_comment(s: &[u8]) -> Option<&[u8]> {
    if Some(&b'(') != s.first() {
        return None;
    }

    let mut i = 1;
    let mut level = 1usize;
    while level > 0 {
        match s.get(i) {
            None => return None,
            Some(b'\n') => {
                i += 1;
                if !is_wsp(s.get(i)) {
                    return None;
                }
            }
            Some(b'\\') => i += 1,
            Some(b'(') => level += 1,
            Some(b')') => level -= 1,
            Some(_) => (),
        }
        i += 1;
    }

    s.get(i..)
}

/// `skip_comment` as a `nom` parser, for use in the RFC 2822 grammars.
///
/// Nesting is tracked with a counter, so arbitrarily deep comments cannot
/// exhaust the stack.
pub fn comment(i: &[u8]) -> IResult<&[u8], ()> {
    match skip_comment(i) {
        Some(rest) => Ok((rest, ())),
        None => Err(nom::Err::Error((i, ErrorKind::Char))),
    }
}

/// Scan a MIME token at the start of `s`.
///
/// The token ends at whitespace, the end of `s`, or any byte for which `stop`
/// returns true. Returns `None` if a control character, 8-bit byte, or
/// tspecial (other than a stop byte) is found first. The token may be empty.
pub fn token(s: &[u8], stop: impl Fn(u8) -> bool) -> Option<(&[u8], &[u8])> {
    for (ix, &b) in s.iter().enumerate() {
        if is_space(b) || stop(b) {
            return Some((&s[..ix], &s[ix..]));
        }

        if b < b' ' || b >= 0x80 || is_tspecial(b) {
            return None;
        }
    }

    Some((s, &[]))
}

/// Like `token`, but rejects empty tokens.
pub fn nonempty_token(
    s: &[u8],
    stop: impl Fn(u8) -> bool,
) -> Option<(&[u8], &[u8])> {
    token(s, stop).filter(|&(t, _)| !t.is_empty())
}

/// Extract the next line from `s`.
///
/// The line runs up to and including the next `\n`, but is cut off after
/// `max - 1` bytes. Returns `None` if `s` is empty or `max` is 0.
pub fn read_line(s: &[u8], max: usize) -> Option<&[u8]> {
    if s.is_empty() || 0 == max {
        return None;
    }

    let limit = s.len().min(max - 1);
    let len = memchr(b'\n', &s[..limit]).map_or(limit, |ix| ix + 1);
    if 0 == len {
        None
    } else {
        Some(&s[..len])
    }
}

/// Return the length of the line ending at the end of `s`: 2 for CRLF, 1 for
/// a bare LF, 0 otherwise.
pub fn line_ending_len(s: &[u8]) -> usize {
    if s.ends_with(b"\r\n") {
        2
    } else if s.ends_with(b"\n") {
        1
    } else {
        0
    }
}

pub fn to_upper(s: &[u8]) -> String {
    String::from_utf8_lossy(s).to_ascii_uppercase()
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_skip_rfc822_space() {
        assert_eq!(Some(&b"foo"[..]), skip_rfc822_space(b"foo"));
        assert_eq!(Some(&b"foo "[..]), skip_rfc822_space(b" \t foo "));
        assert_eq!(Some(&b"foo"[..]), skip_rfc822_space(b"(bar) foo"));
        assert_eq!(
            Some(&b"foo"[..]),
            skip_rfc822_space(b"(bar (baz) \\) quux) foo")
        );
        assert_eq!(Some(&b"foo"[..]), skip_rfc822_space(b"\r\n foo"));
        assert_eq!(Some(&b"foo"[..]), skip_rfc822_space(b"(a\r\n b)foo"));

        assert_eq!(None, skip_rfc822_space(b""));
        assert_eq!(None, skip_rfc822_space(b"   "));
        assert_eq!(None, skip_rfc822_space(b" \r\n"));
        assert_eq!(None, skip_rfc822_space(b"\r\nfoo"));
        assert_eq!(None, skip_rfc822_space(b"(unterminated foo"));
        assert_eq!(None, skip_rfc822_space(b"(a\r\nb) foo"));
        assert_eq!(None, skip_rfc822_space(b"(escaped end\\"));
    }

    #[test]
    fn test_skip_comment() {
        assert_eq!(Some(&b" x"[..]), skip_comment(b"(a (b) \\( c) x"));
        assert_eq!(Some(&b""[..]), skip_comment(b"()"));
        assert_eq!(None, skip_comment(b"x()"));
        assert_eq!(None, skip_comment(b"((a)"));

        let mut deep = vec![b'('; 100_000];
        assert_eq!(None, skip_comment(&deep));
        deep.extend(vec![b')'; 100_000]);
        deep.push(b'x');
        assert_eq!(Some(&b"x"[..]), skip_comment(&deep));
        assert!(comment(&deep).is_ok());
    }

    #[test]
    fn test_token() {
        let stop = |b| b';' == b;
        assert_eq!(Some((&b"foo"[..], &b";x"[..])), token(b"foo;x", stop));
        assert_eq!(Some((&b"foo"[..], &b" x"[..])), token(b"foo x", stop));
        assert_eq!(Some((&b"foo"[..], &b""[..])), token(b"foo", stop));
        assert_eq!(Some((&b""[..], &b";"[..])), token(b";", stop));
        assert_eq!(None, token(b"fo/o", stop));
        assert_eq!(None, token(b"fo\x01o", stop));
        assert_eq!(None, token(b"f\xc3\xb6o", stop));
        assert_eq!(None, nonempty_token(b";", stop));
    }

    #[test]
    fn test_read_line() {
        assert_eq!(Some(&b"foo\r\n"[..]), read_line(b"foo\r\nbar", 100));
        assert_eq!(Some(&b"bar"[..]), read_line(b"bar", 100));
        assert_eq!(Some(&b"fo"[..]), read_line(b"foo\r\n", 3));
        assert_eq!(None, read_line(b"", 100));
        assert_eq!(None, read_line(b"foo", 0));
        assert_eq!(None, read_line(b"foo", 1));
    }

    proptest! {
        #[test]
        fn skip_rfc822_space_never_panics(
            s in prop::collection::vec(prop::num::u8::ANY, 0..40)
        ) {
            skip_rfc822_space(&s);
        }
    }
}
