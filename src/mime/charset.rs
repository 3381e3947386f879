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

//! Character set and transfer encoding services.
//!
//! Charsets and transfer encodings are identified by small integers since
//! they are stored in the section table of the cache. The charset ids are
//! only meaningful to the `Charsets` implementation that produced them.

use std::borrow::Cow;
use std::convert::TryFrom;

use encoding_rs::*;
use lazy_static::lazy_static;

use super::encoded_word::decode_unstructured;
use super::model::Body;
use super::quoted_printable::qp_decode;

pub const ENCODING_NONE: i32 = 0;
pub const ENCODING_QP: i32 = 1;
pub const ENCODING_BASE64: i32 = 2;
pub const ENCODING_UNKNOWN: i32 = 255;

/// The charset id of US-ASCII, which is also the default for text parts.
pub const CHARSET_ASCII: i32 = 0;
/// The charset id of parts which are not text at all, or whose charset is
/// not recognised.
pub const CHARSET_UNKNOWN: i32 = -1;

/// The number of base64 characters on each line produced by
/// `encode_mime_body`.
pub const BASE64_LINE_LENGTH: usize = 72;

/// Converts between character sets and transfer encodings.
pub trait Charsets {
    /// Return the numeric id of the charset called `name`, or
    /// `CHARSET_UNKNOWN` if it is not supported.
    fn lookup_name(&self, name: &str) -> i32;

    /// Undo the transfer encoding `encoding` on `data`, then convert it from
    /// the charset with id `charset` to UTF-8.
    ///
    /// Returns `None` if either is unknown.
    fn to_utf8(&self, data: &[u8], charset: i32, encoding: i32)
        -> Option<String>;

    /// Decode the RFC 2047 encoded words in an unstructured header value.
    ///
    /// Raw text outside encoded words is taken to be UTF-8.
    fn decode_mime_header(&self, s: &[u8]) -> String;

    /// Base64-encode a body part into CRLF-terminated lines. Returns the
    /// encoded data and the number of lines in it.
    fn encode_mime_body(&self, data: &[u8]) -> (Vec<u8>, u32);
}

/// The `Charsets` implementation backed by `encoding_rs`.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardCharsets;

static ASCII_NAMES: &[&str] = &[
    "us-ascii",
    "ascii",
    "us",
    "ansi_x3.4-1968",
    "iso646-us",
    "iso-ir-6",
    "cp367",
    "ibm367",
    "csascii",
];

lazy_static! {
    // Ids are 1 + the index in this table. New entries must only ever be
    // added at the end, since the ids are persisted in the cache.
    static ref ENCODINGS: Vec<&'static Encoding> = vec![
        UTF_8,
        IBM866,
        ISO_8859_2,
        ISO_8859_3,
        ISO_8859_4,
        ISO_8859_5,
        ISO_8859_6,
        ISO_8859_7,
        ISO_8859_8,
        ISO_8859_8_I,
        ISO_8859_10,
        ISO_8859_13,
        ISO_8859_14,
        ISO_8859_15,
        ISO_8859_16,
        KOI8_R,
        KOI8_U,
        MACINTOSH,
        WINDOWS_874,
        WINDOWS_1250,
        WINDOWS_1251,
        WINDOWS_1252,
        WINDOWS_1253,
        WINDOWS_1254,
        WINDOWS_1255,
        WINDOWS_1256,
        WINDOWS_1257,
        WINDOWS_1258,
        X_MAC_CYRILLIC,
        GBK,
        GB18030,
        BIG5,
        EUC_JP,
        ISO_2022_JP,
        SHIFT_JIS,
        EUC_KR,
        UTF_16BE,
        UTF_16LE,
    ];
}

impl Charsets for StandardCharsets {
    fn lookup_name(&self, name: &str) -> i32 {
        let name = name.trim();
        if ASCII_NAMES.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            return CHARSET_ASCII;
        }

        Encoding::for_label_no_replacement(name.as_bytes())
            .and_then(|enc| ENCODINGS.iter().position(|&e| e == enc))
            .map_or(CHARSET_UNKNOWN, |ix| ix as i32 + 1)
    }

    fn to_utf8(
        &self,
        data: &[u8],
        charset: i32,
        encoding: i32,
    ) -> Option<String> {
        let data: Cow<[u8]> = match encoding {
            ENCODING_NONE => Cow::Borrowed(data),
            ENCODING_QP => qp_decode(data),
            ENCODING_BASE64 => Cow::Owned(lenient_base64_decode(data)?),
            _ => return None,
        };

        if CHARSET_ASCII == charset {
            return Some(String::from_utf8_lossy(&data).into_owned());
        }

        let encoding = ENCODINGS.get(usize::try_from(charset - 1).ok()?)?;
        Some(encoding.decode_with_bom_removal(&data).0.into_owned())
    }

    fn decode_mime_header(&self, s: &[u8]) -> String {
        decode_unstructured(&String::from_utf8_lossy(s))
    }

    fn encode_mime_body(&self, data: &[u8]) -> (Vec<u8>, u32) {
        let encoded = base64::encode_config(data, base64::STANDARD);
        let mut out = Vec::with_capacity(
            encoded.len() + encoded.len() / BASE64_LINE_LENGTH * 2 + 2,
        );
        let mut lines = 0;
        for line in encoded.as_bytes().chunks(BASE64_LINE_LENGTH) {
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
            lines += 1;
        }

        (out, lines)
    }
}

/// Decode base64, ignoring anything outside the base64 alphabet (such as
/// line breaks) and tolerating missing or excess padding.
fn lenient_base64_decode(data: &[u8]) -> Option<Vec<u8>> {
    let mut clean = data
        .iter()
        .copied()
        .filter(|&b| b.is_ascii_alphanumeric() || b'+' == b || b'/' == b)
        .collect::<Vec<u8>>();

    match clean.len() % 4 {
        1 => {
            clean.pop();
        }
        2 => clean.extend_from_slice(b"=="),
        3 => clean.push(b'='),
        _ => (),
    }

    base64::decode_config(&clean, base64::STANDARD).ok()
}

/// Determine the numeric transfer encoding and charset of `body`, as stored
/// in the section table.
///
/// Only text parts have a charset. `message/*` parts are never considered
/// transfer-encoded, and `message/rfc822` has no charset.
pub fn resolve(body: &Body, charsets: &dyn Charsets) -> (i32, i32) {
    let mut encoding = match body.encoding.as_deref() {
        None | Some("7BIT") | Some("8BIT") | Some("BINARY") => ENCODING_NONE,
        Some("BASE64") => ENCODING_BASE64,
        Some("QUOTED-PRINTABLE") => ENCODING_QP,
        Some(_) => ENCODING_UNKNOWN,
    };

    let charset = if body.is_text() {
        body.param("CHARSET").map_or(CHARSET_ASCII, |name| {
            std::str::from_utf8(name)
                .map_or(CHARSET_UNKNOWN, |name| charsets.lookup_name(name))
        })
    } else if "MESSAGE" == body.typ {
        encoding = ENCODING_NONE;
        if body.is_message_rfc822() {
            CHARSET_UNKNOWN
        } else {
            CHARSET_ASCII
        }
    } else {
        CHARSET_UNKNOWN
    };

    (encoding, charset)
}
