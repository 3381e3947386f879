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

//! The section table, which locates the bytes of any part of a message by
//! its IMAP section number without parsing the message again.
//!
//! A section is a count `n` followed by `n` five-word entries and then `n - 1`
//! nested sections, one for each entry after the first. Entry 0 describes the
//! part as a whole (the header and text of a message); entry `i` describes
//! part `i`. A leaf is the single word 0. Every word is a big-endian `u32`.
//!
//! An entry is `header_offset header_size content_offset content_size
//! charset_encoding`, where the last word is `(charset << 16) | encoding`.

use std::convert::TryFrom;

use byteorder::{BigEndian, ReadBytesExt};

use super::strings::ItemWriter;
use crate::mime::charset::{resolve, Charsets, ENCODING_NONE};
use crate::mime::model::Body;

/// The charset/encoding word of entries which have no charset.
pub const NO_CHARSET: u32 = 0xFFFF_0000 | ENCODING_NONE as u32;

/// The size recorded for sections which cannot be fetched.
const UNFETCHABLE: u32 = 0xFFFF_FFFF;

/// Write the section table for the message whose root part is `root`.
///
/// The message itself is treated as the content of a `message/rfc822` part,
/// so that section 0 is the whole message and section 1 its body.
pub fn write_section_table(
    w: &mut ItemWriter,
    root: &Body,
    charsets: &dyn Charsets,
) {
    write_message_section(w, root, charsets);
}

fn write_message_section(
    w: &mut ItemWriter,
    sub: &Body,
    charsets: &dyn Charsets,
) {
    if !sub.parts.is_empty() {
        w.bit32(sub.parts.len() as u32 + 1);
        write_whole_entry(w, sub);
        for part in &sub.parts {
            w.bit32(part.header_offset);
            w.bit32(part.header_size);
            w.bit32(part.content_offset);
            w.bit32(if part.is_zero_part_multipart() {
                0
            } else {
                part.content_size
            });
            write_charset(w, part, charsets);
        }
        for part in &sub.parts {
            write_section(w, part, charsets);
        }
    } else {
        w.bit32(2);
        write_whole_entry(w, sub);
        w.bit32(sub.header_offset);
        w.bit32(sub.header_size);
        w.bit32(sub.content_offset);
        if sub.is_multipart() {
            w.bit32(0);
            w.bit32(NO_CHARSET);
        } else {
            w.bit32(sub.content_size);
            write_charset(w, sub, charsets);
        }
        write_section(w, sub, charsets);
    }
}

fn write_section(w: &mut ItemWriter, body: &Body, charsets: &dyn Charsets) {
    if body.is_message_rfc822() {
        match body.subpart {
            Some(ref sub) => write_message_section(w, sub, charsets),
            None => w.bit32(0),
        }
    } else if !body.parts.is_empty() {
        // Part 0 of a multipart cannot be fetched
        w.bit32(body.parts.len() as u32 + 1);
        w.bit32(0);
        w.bit32(UNFETCHABLE);
        w.bit32(0);
        w.bit32(UNFETCHABLE);
        w.bit32(NO_CHARSET);
        for part in &body.parts {
            w.bit32(part.header_offset);
            w.bit32(part.header_size);
            w.bit32(part.content_offset);
            if part.is_zero_part_multipart() {
                w.bit32(0);
                w.bit32(NO_CHARSET);
            } else {
                w.bit32(part.content_size);
                write_charset(w, part, charsets);
            }
        }
        for part in &body.parts {
            write_section(w, part, charsets);
        }
    } else {
        w.bit32(0);
    }
}

fn write_whole_entry(w: &mut ItemWriter, sub: &Body) {
    w.bit32(sub.header_offset);
    w.bit32(sub.header_size);
    w.bit32(sub.content_offset);
    w.bit32(sub.content_size);
    w.bit32(NO_CHARSET);
}

fn write_charset(w: &mut ItemWriter, body: &Body, charsets: &dyn Charsets) {
    let (encoding, charset) = resolve(body, charsets);
    w.bit32(((charset << 16) | encoding) as u32);
}

/// One decoded entry of the section table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectionEntry {
    pub header_offset: u32,
    pub header_size: u32,
    pub content_offset: u32,
    /// `u32::MAX` if the section cannot be fetched.
    pub content_size: u32,
    /// The charset id, or negative if there is none.
    pub charset: i32,
    pub encoding: i32,
}

impl SectionEntry {
    fn unpack(words: [u32; 5]) -> Self {
        let charset_encoding = words[4] as i32;
        SectionEntry {
            header_offset: words[0],
            header_size: words[1],
            content_offset: words[2],
            content_size: words[3],
            charset: charset_encoding >> 16,
            encoding: charset_encoding & 0xFFFF,
        }
    }
}

/// A decoded section table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SectionTable {
    pub entries: Vec<SectionEntry>,
    /// The tables of parts `1..entries.len()`.
    pub subsections: Vec<SectionTable>,
}

impl SectionTable {
    /// Decode a section table.
    ///
    /// Returns `None` if `data` is truncated.
    pub fn parse(mut data: &[u8]) -> Option<Self> {
        Self::read(&mut data)
    }

    fn read(data: &mut &[u8]) -> Option<Self> {
        let count = data.read_u32::<BigEndian>().ok()?;
        // Each entry is 20 bytes, which also bounds the allocation
        let count = usize::try_from(count).ok()?;
        if count > data.len() / 20 {
            return None;
        }

        let mut table = SectionTable::default();
        for _ in 0..count {
            let mut words = [0u32; 5];
            for word in &mut words {
                *word = data.read_u32::<BigEndian>().ok()?;
            }
            table.entries.push(SectionEntry::unpack(words));
        }

        for _ in 1..count {
            table.subsections.push(Self::read(data)?);
        }

        Some(table)
    }

    /// Find the entry for the section at `path`.
    ///
    /// Each element of `path` is a 1-based part number, except that a final
    /// 0 selects the whole of the section reached so far. The empty path
    /// and `[0]` both select the whole message.
    pub fn find(&self, path: &[u32]) -> Option<SectionEntry> {
        match path {
            [] | [0] => self.entries.first().copied(),
            [part] => self.entries.get(*part as usize).copied(),
            [0, ..] => None,
            [part, rest @ ..] => self
                .subsections
                .get((*part as usize).checked_sub(1)?)?
                .find(rest),
        }
    }
}

#[cfg(test)]
mod test {
    use std::borrow::Cow;

    use proptest::prelude::*;

    use super::*;
    use crate::mime::charset::{
        StandardCharsets, CHARSET_ASCII, ENCODING_BASE64, ENCODING_QP,
    };
    use crate::mime::grovel::grovel;
    use crate::support::system_config::ParseConfig;

    fn table_for(msg: &[u8]) -> (Body, SectionTable) {
        let (body, _) = grovel(
            Cow::Borrowed(msg),
            false,
            &ParseConfig::default(),
            &StandardCharsets,
        );
        let mut w = ItemWriter::new();
        write_section_table(&mut w, &body, &StandardCharsets);
        let table = SectionTable::parse(&w.into_inner()).unwrap();
        (body, table)
    }

    #[test]
    fn leaf_message() {
        let msg = b"Subject: foo\r\n\
                    Content-Transfer-Encoding: quoted-printable\r\n\
                    \r\n\
                    caf=C3=A9\r\n";
        let (body, table) = table_for(msg);

        let whole = table.find(&[0]).unwrap();
        assert_eq!(body.header_offset, whole.header_offset);
        assert_eq!(body.header_size, whole.header_size);
        assert_eq!(body.content_offset, whole.content_offset);
        assert_eq!(body.content_size, whole.content_size);
        assert_eq!(-1, whole.charset);
        assert_eq!(ENCODING_NONE, whole.encoding);

        assert_eq!(
            SectionEntry {
                header_offset: body.header_offset,
                header_size: body.header_size,
                content_offset: body.content_offset,
                content_size: body.content_size,
                charset: CHARSET_ASCII,
                encoding: ENCODING_QP,
            },
            table.find(&[1]).unwrap()
        );

        assert!(table.find(&[2]).is_none());
        assert!(table.find(&[1, 1]).is_none());
    }

    #[test]
    fn multipart_message() {
        let msg = b"Content-Type: multipart/mixed; boundary=XYZ\r\n\
                    \r\n\
                    --XYZ\r\n\
                    \r\n\
                    hello\r\n\
                    --XYZ\r\n\
                    Content-Type: application/octet-stream\r\n\
                    Content-Transfer-Encoding: base64\r\n\
                    \r\n\
                    AAAA\r\n\
                    --XYZ--\r\n";
        let (body, table) = table_for(msg);

        assert_eq!(3, table.entries.len());
        assert_eq!(2, table.subsections.len());

        let first = table.find(&[1]).unwrap();
        assert_eq!(body.parts[0].content_offset, first.content_offset);
        assert_eq!(5, first.content_size);
        assert_eq!(CHARSET_ASCII, first.charset);

        let second = table.find(&[2]).unwrap();
        assert_eq!(body.parts[1].header_offset, second.header_offset);
        assert_eq!(4, second.content_size);
        assert_eq!(-1, second.charset);
        assert_eq!(ENCODING_BASE64, second.encoding);

        // Leaves have no nested sections
        assert!(table.subsections[0].entries.is_empty());
        assert!(table.find(&[1, 1]).is_none());
    }

    #[test]
    fn nested_multipart_part_zero_is_unfetchable() {
        let msg = b"Content-Type: multipart/mixed; boundary=outer\r\n\
                    \r\n\
                    --outer\r\n\
                    Content-Type: multipart/alternative; boundary=inner\r\n\
                    \r\n\
                    --inner\r\n\
                    \r\n\
                    plain\r\n\
                    --inner--\r\n\
                    --outer--\r\n";
        let (_, table) = table_for(msg);

        let inner_whole = table.find(&[1, 0]).unwrap();
        assert_eq!(u32::MAX, inner_whole.content_size);
        assert_eq!(u32::MAX, inner_whole.header_size);
        assert_eq!(-1, inner_whole.charset);

        let plain = table.find(&[1, 1]).unwrap();
        assert_eq!(5, plain.content_size);
        assert_eq!(CHARSET_ASCII, plain.charset);
    }

    #[test]
    fn zero_part_multipart_has_no_size() {
        let msg = b"Content-Type: multipart/mixed\r\n\r\nwhatever\r\n";
        let (_, table) = table_for(msg);
        let part = table.find(&[1]).unwrap();
        assert_eq!(0, part.content_size);
        assert_eq!(-1, part.charset);
    }

    #[test]
    fn truncated_table() {
        assert!(SectionTable::parse(&[]).is_none());
        assert!(SectionTable::parse(&[0, 0, 0, 2, 0, 0]).is_none());
        assert!(SectionTable::parse(&[0xFF; 4]).is_none());
    }

    proptest! {
        #[test]
        fn parse_never_panics(
            data in prop::collection::vec(prop::num::u8::ANY, 0..200)
        ) {
            if let Some(table) = SectionTable::parse(&data) {
                let _ = table.find(&[1, 2, 0]);
            }
        }
    }
}
