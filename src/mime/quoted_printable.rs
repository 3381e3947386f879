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

use std::borrow::Cow;

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

/// Decodes quoted-printable encoding, as described by RFC 2045.
///
/// Encoded bytes and soft line endings are both handled, the latter by
/// discarding. A soft line ending may have whitespace between the `=` and the
/// line ending, and may use UNIX or DOS line endings. An `=` followed only by
/// whitespace at the very end of the input is also a soft line ending.
///
/// This never fails. Invalid and incomplete escapes are passed through
/// untransformed, as are 8-bit characters.
pub fn qp_decode(s: &[u8]) -> Cow<[u8]> {
    if !s.contains(&b'=') {
        return Cow::Borrowed(s);
    }

    let mut out = Vec::with_capacity(s.len());
    let mut ix = 0;
    while ix < s.len() {
        if b'=' != s[ix] {
            out.push(s[ix]);
            ix += 1;
            continue;
        }

        let after_ws = ix
            + 1
            + s[ix + 1..]
                .iter()
                .take_while(|&&b| b' ' == b || b'\t' == b)
                .count();
        match s.get(after_ws) {
            None => break,
            Some(b'\n') => {
                ix = after_ws + 1;
                continue;
            }
            Some(b'\r') if Some(&b'\n') == s.get(after_ws + 1) => {
                ix = after_ws + 2;
                continue;
            }
            _ => (),
        }

        let decoded = s.get(ix + 1..ix + 3).and_then(|e| {
            Some(hex_value(e[0])? << 4 | hex_value(e[1])?)
        });
        match decoded {
            Some(b) => {
                out.push(b);
                ix += 3;
            }
            None => {
                out.push(b'=');
                ix += 1;
            }
        }
    }

    Cow::Owned(out)
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn assert_qp(expected: &[u8], input: &[u8]) {
        assert_eq!(expected, &qp_decode(input)[..]);
    }

    #[test]
    fn test_qp_decode() {
        assert_qp(b"hello world", b"hello world");
        assert_qp(b"\xabfoo", b"=ABfoo");
        assert_qp(b"fo\xabo", b"fo=abo");
        assert_qp(b"foo\xab\xcd", b"foo=AB=CD");

        assert_qp(b"foobar", b"foo=\nbar");
        assert_qp(b"foobar", b"foo=\r\nbar");
        assert_qp(b"foobar", b"foo= \t\r\nbar");
        assert_qp(b"foo", b"foo=");
        assert_qp(b"foo", b"foo=  ");

        assert_qp(b"foo=()bar", b"foo=()bar");
        assert_qp(b"foo=\xabbar", b"foo==ABbar");
        assert_qp(b"foo=A", b"foo=A");
        assert_qp(b"foo=\rbar", b"foo=\rbar");
        assert_qp("foo=ゑbar".as_bytes(), "foo=ゑbar".as_bytes());
    }

    proptest! {
        #[test]
        fn qp_decode_never_panics(
            s in prop::collection::vec(prop::num::u8::ANY, 0..20)
        ) {
            qp_decode(&s);
        }
    }
}
