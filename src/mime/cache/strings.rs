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

use byteorder::{BigEndian, WriteBytesExt};

use crate::mime::model::Param;

/// Strings at least this long are always written as literals.
const MAX_QUOTED: usize = 1024;

/// Accumulates one item of a cache record, using the IMAP conventions for
/// strings and lists.
#[derive(Clone, Debug, Default)]
pub struct ItemWriter {
    out: Vec<u8>,
}

impl ItemWriter {
    pub fn new() -> Self {
        ItemWriter::default()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.out
    }

    pub fn verbatim(&mut self, s: &[u8]) {
        self.out.extend_from_slice(s);
    }

    pub fn byte(&mut self, b: u8) {
        self.out.push(b);
    }

    pub fn nil(&mut self) {
        self.verbatim(b"NIL");
    }

    pub fn number(&mut self, n: u32) {
        self.verbatim(n.to_string().as_bytes());
    }

    pub fn bit32(&mut self, n: u32) {
        // Writing to a Vec cannot fail
        let _ = self.out.write_u32::<BigEndian>(n);
    }

    /// Write `s` as `NIL` if absent or empty, as a quoted string if it is
    /// safe to quote, or as a literal otherwise.
    ///
    /// The bytes of `s` are written unchanged in every case.
    pub fn nstring<S: AsRef<[u8]> + ?Sized>(&mut self, s: Option<&S>) {
        let s: Option<&[u8]> = s.map(AsRef::as_ref);
        let s = match s {
            None => return self.nil(),
            Some(s) if s.is_empty() => return self.nil(),
            Some(s) => s,
        };

        if needs_literal(s) {
            self.verbatim(format!("{{{}}}\r\n", s.len()).as_bytes());
            self.verbatim(s);
        } else {
            self.byte(b'"');
            self.verbatim(s);
            self.byte(b'"');
        }
    }

    /// Write a parenthesised `attribute value` list, or `NIL` if `params` is
    /// empty.
    pub fn params(&mut self, params: &[Param]) {
        if params.is_empty() {
            self.nil();
            return;
        }

        self.byte(b'(');
        for (ix, param) in params.iter().enumerate() {
            if ix > 0 {
                self.byte(b' ');
            }
            self.nstring(Some(&param.attribute));
            self.byte(b' ');
            self.nstring(Some(&param.value));
        }
        self.byte(b')');
    }

    /// Write a parenthesised list of strings, or `NIL` if `items` is empty.
    pub fn string_list(&mut self, items: &[String]) {
        if items.is_empty() {
            self.nil();
            return;
        }

        self.byte(b'(');
        for (ix, item) in items.iter().enumerate() {
            if ix > 0 {
                self.byte(b' ');
            }
            self.nstring(Some(item));
        }
        self.byte(b')');
    }
}

fn needs_literal(s: &[u8]) -> bool {
    s.len() >= MAX_QUOTED
        || s.iter().any(|&b| {
            b >= 0x80
                || b'\r' == b
                || b'\n' == b
                || b'"' == b
                || b'%' == b
                || b'\\' == b
        })
}

#[cfg(test)]
mod test {
    use super::*;

    fn nstring(s: Option<&str>) -> Vec<u8> {
        let mut w = ItemWriter::new();
        w.nstring(s);
        w.into_inner()
    }

    #[test]
    fn test_nstring() {
        assert_eq!(b"NIL", &nstring(None)[..]);
        assert_eq!(b"NIL", &nstring(Some(""))[..]);
        assert_eq!(b"\"hello world\"", &nstring(Some("hello world"))[..]);
        assert_eq!(b"{5}\r\na\"b\"c", &nstring(Some("a\"b\"c"))[..]);
        assert_eq!(b"{4}\r\n100%", &nstring(Some("100%"))[..]);
        assert_eq!(b"{2}\r\n\xc3\xa9", &nstring(Some("\u{e9}"))[..]);

        let mut w = ItemWriter::new();
        w.nstring(Some(&b"caf\xe9"[..]));
        assert_eq!(b"{4}\r\ncaf\xe9", &w.into_inner()[..]);

        let long = "x".repeat(1024);
        assert!(nstring(Some(&long)).starts_with(b"{1024}\r\n"));
        let not_so_long = "x".repeat(1023);
        assert_eq!(b'"', nstring(Some(&not_so_long))[0]);
    }

    #[test]
    fn test_lists() {
        let mut w = ItemWriter::new();
        w.params(&[]);
        w.byte(b' ');
        w.params(&[Param::new("CHARSET", "utf-8"), Param::new("A", "b")]);
        w.byte(b' ');
        w.string_list(&["EN".to_owned(), "FR".to_owned()]);
        w.byte(b' ');
        w.bit32(0x01020304);
        assert_eq!(
            &b"NIL (\"CHARSET\" \"utf-8\" \"A\" \"b\") (\"EN\" \"FR\") \
               \x01\x02\x03\x04"[..],
            &w.into_inner()[..]
        );
    }
}
