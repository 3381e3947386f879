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

use serde::{Deserialize, Serialize};

use super::error::Error;

/// Options controlling how messages are validated and parsed.
///
/// This is typically stored in a TOML file; every field has a default, so an
/// empty file is a valid configuration.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ParseConfig {
    /// The maximum number of header lines in one part which are dispatched to
    /// the structured field parsers and the cached header blob.
    ///
    /// Lines beyond this are still counted towards the header size, so that
    /// offsets remain correct, but are otherwise ignored. 0 means no limit.
    pub max_header_lines: u32,

    /// Whether to match multipart boundaries the way RFC 2046 section 5.1.1
    /// reads.
    ///
    /// When true, any line starting with `--` followed by an active boundary
    /// is a delimiter, even if more text follows the boundary. This treats
    /// boundaries which contain other boundaries as identical, which breaks
    /// messages from some agents (e.g. Eudora 5.1 and earlier).
    ///
    /// When false (the default), the boundary must be followed by whitespace
    /// or the end of the line.
    pub rfc2046_strict: bool,

    /// What to do with 8-bit characters in the header block when copying a
    /// message in strictly.
    pub eight_bit_headers: EightBitPolicy,

    /// How to derive the internal date of a new message when the caller does
    /// not supply one.
    pub internaldate_heuristic: InternalDateHeuristic,

    /// The maximum depth of nested multipart and message/rfc822 parts which
    /// are parsed recursively. Anything deeper is treated as opaque content.
    pub max_nesting_depth: u32,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            max_header_lines: 1000,
            rfc2046_strict: false,
            eight_bit_headers: EightBitPolicy::default(),
            internaldate_heuristic: InternalDateHeuristic::default(),
            max_nesting_depth: 64,
        }
    }
}

impl ParseConfig {
    /// Load the configuration from the raw content of a TOML file.
    pub fn from_toml(data: &[u8]) -> Result<Self, Error> {
        Ok(toml::from_slice(data)?)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EightBitPolicy {
    /// Refuse the message.
    Reject,
    /// Replace each 8-bit header byte with `X`.
    Munge,
    /// Pass 8-bit header bytes through unchanged.
    Allow,
}

impl Default for EightBitPolicy {
    fn default() -> Self {
        EightBitPolicy::Munge
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InternalDateHeuristic {
    /// Leave the internal date to the caller (usually the delivery time).
    Standard,
    /// Use the date of the first `Received` header, or of an explicit
    /// `X-Deliveredinternaldate` header.
    ReceivedHeader,
}

impl Default for InternalDateHeuristic {
    fn default() -> Self {
        InternalDateHeuristic::Standard
    }
}
