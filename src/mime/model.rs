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

use bitflags::bitflags;

/// One `attribute=value` pair from a `Content-Type` or `Content-Disposition`
/// parameter list.
///
/// The attribute is always upper-cased. The value has any quoting removed but
/// is otherwise the raw bytes of the header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Param {
    pub attribute: String,
    pub value: Vec<u8>,
}

impl Param {
    pub fn new(
        attribute: impl Into<String>,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Param {
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

/// One element of an address list, in the same shape IMAP uses for envelope
/// addresses.
///
/// A group is represented by two markers surrounding its members: the start
/// has the group name in `mailbox` and no domain; the end has neither.
///
/// Each field holds the raw bytes of the header, so 8-bit text is preserved
/// whether or not it is valid UTF-8.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Address {
    pub name: Option<Vec<u8>>,
    pub route: Option<Vec<u8>>,
    pub mailbox: Option<Vec<u8>>,
    pub domain: Option<Vec<u8>>,
}

impl Address {
    pub fn is_group_start(&self) -> bool {
        self.domain.is_none() && self.mailbox.is_some()
    }

    pub fn is_group_end(&self) -> bool {
        self.domain.is_none() && self.mailbox.is_none()
    }
}

bitflags! {
    /// Facts about a message discovered while parsing it.
    #[derive(Default)]
    pub struct MessageFlags: u32 {
        const HAS_ATTACHMENT = 1 << 0;
        const HAS_TRUE_DOMAIN = 1 << 1;
    }
}

/// One node of the parsed MIME tree.
///
/// All offsets are byte offsets into the message as it stands after parsing
/// (which differs from the input only when binary parts were re-encoded).
///
/// A node is a leaf if `parts` is empty and `subpart` is `None`. A
/// `multipart/*` node with no `parts` is a "zero-part multipart", which is
/// treated as an empty text part wherever IMAP structures are produced.
#[derive(Clone, Debug, Default)]
pub struct Body {
    /// Upper-cased media type. Empty only while headers are being scanned.
    pub typ: String,
    /// Upper-cased media subtype.
    pub subtype: String,
    pub params: Vec<Param>,
    pub id: Option<Vec<u8>>,
    pub description: Option<Vec<u8>>,
    /// Upper-cased `Content-Transfer-Encoding` token.
    pub encoding: Option<String>,
    pub md5: Option<Vec<u8>>,
    /// Upper-cased `Content-Disposition` token.
    pub disposition: Option<String>,
    pub disposition_params: Vec<Param>,
    pub language: Vec<String>,
    pub location: Option<Vec<u8>>,

    // Unstructured headers, unfolded but otherwise byte-for-byte as they
    // appear in the message.
    pub date: Option<Vec<u8>>,
    pub subject: Option<Vec<u8>>,
    pub in_reply_to: Option<Vec<u8>>,
    pub message_id: Option<Vec<u8>>,
    pub references: Option<Vec<u8>>,
    pub received_date: Option<Vec<u8>>,

    pub from: Vec<Address>,
    pub sender: Vec<Address>,
    pub reply_to: Vec<Address>,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,

    pub header_offset: u32,
    pub header_size: u32,
    pub header_lines: u32,
    pub content_offset: u32,
    pub content_size: u32,
    pub content_lines: u32,
    /// Size of the delimiter consumed at the end of this part, including the
    /// line ending before it. This belongs to the enclosing multipart, and is
    /// moved up to the nearest ancestor which did not consume it.
    pub boundary_size: u32,
    pub boundary_lines: u32,

    /// Children of a multipart.
    pub parts: Vec<Body>,
    /// The encapsulated message of a `message/rfc822` part.
    pub subpart: Option<Box<Body>>,

    /// Verbatim copies of the headers the structured parsers do not handle.
    /// Only the root of the tree collects these.
    pub cache_headers: Option<Vec<u8>>,
    /// SHA-1 of the whole message. Only set on the root.
    pub guid: Option<[u8; 20]>,
    pub flags: MessageFlags,
    /// The content transfer- and charset-decoded to UTF-8, computed on first
    /// request.
    pub decoded_body: Option<String>,
}

impl Body {
    pub fn is_multipart(&self) -> bool {
        "MULTIPART" == self.typ
    }

    pub fn is_message_rfc822(&self) -> bool {
        "MESSAGE" == self.typ && "RFC822" == self.subtype
    }

    pub fn is_text(&self) -> bool {
        "TEXT" == self.typ
    }

    pub fn is_zero_part_multipart(&self) -> bool {
        self.is_multipart() && self.parts.is_empty()
    }

    /// Return the value of the content-type parameter called `attribute`,
    /// which must be upper-case.
    pub fn param(&self, attribute: &str) -> Option<&[u8]> {
        self.params
            .iter()
            .find(|p| attribute == p.attribute)
            .map(|p| &p.value[..])
    }
}
