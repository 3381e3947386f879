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

use encoding_rs::*;
use lazy_static::lazy_static;
use regex::Regex;

use super::quoted_printable::qp_decode;

lazy_static! {
    static ref ENCODED_WORD: Regex =
        Regex::new(r"^=\?([!->@-~]*)\?([!->@-~]*)\?([!->@-~]*)\?=$").unwrap();
}

/// Test if `word` (in its entirety) is an RFC 2047 "encoded word".
///
/// If it is, decode it and return its decoded value.
///
/// Returns `None` if it is not an encoded word or if it could not be decoded.
/// The distinction matters because whitespace is deleted between adjacent
/// encoded words but left alone everywhere else.
///
/// Encoded words longer than the 75 characters RFC 2047 allows are accepted,
/// since some agents produce them and other readers interpret them.
pub fn ew_decode(word: &str) -> Option<String> {
    let captures = ENCODED_WORD.captures(word)?;

    let charset = captures.get(1)?.as_str();
    // RFC 2231 section 5 allows a language suffix on the charset
    let charset = charset.split('*').next().unwrap_or(charset);
    let transfer_encoding = captures.get(2)?.as_str();

    // _ in the content (before transfer decoding) stands for ASCII space
    // regardless of charset
    let content = captures.get(3)?.as_str().replace('_', " ");

    let content = match transfer_encoding {
        "q" | "Q" => qp_decode(content.as_bytes()).into_owned(),
        "b" | "B" => base64::decode(&content).ok()?,
        _ => return None,
    };

    decode_charset(charset, &content).map(Cow::into_owned)
}

fn decode_charset<'a>(
    charset: &str,
    content: &'a [u8],
) -> Option<Cow<'a, str>> {
    Some(
        Encoding::for_label_no_replacement(charset.as_bytes())?
            .decode_with_bom_removal(content)
            .0,
    )
}

/// Decode all the encoded words in an unstructured header value, such as a
/// `Subject` or display name.
///
/// Whitespace between two adjacent encoded words is removed; all other text
/// is left as-is.
pub fn decode_unstructured(text: &str) -> String {
    if !text.contains("=?") {
        return text.to_owned();
    }

    let mut out = String::with_capacity(text.len());
    let mut pending_space = "";
    let mut prev_encoded = false;
    let mut rest = text;

    while !rest.is_empty() {
        let ws_len = rest
            .find(|c: char| !c.is_ascii_whitespace())
            .unwrap_or_else(|| rest.len());
        if ws_len > 0 {
            pending_space = &rest[..ws_len];
            rest = &rest[ws_len..];
            continue;
        }

        let word_len = rest
            .find(|c: char| c.is_ascii_whitespace())
            .unwrap_or_else(|| rest.len());
        let word = &rest[..word_len];
        rest = &rest[word_len..];

        match ew_decode(word) {
            Some(decoded) => {
                if !prev_encoded {
                    out.push_str(pending_space);
                }
                out.push_str(&decoded);
                prev_encoded = true;
            }
            None => {
                out.push_str(pending_space);
                out.push_str(word);
                prev_encoded = false;
            }
        }
        pending_space = "";
    }

    out.push_str(pending_space);
    out
}
