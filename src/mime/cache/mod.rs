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

//! The cache record: a summary of a parsed message which is enough to answer
//! most `FETCH` and `SEARCH` requests without looking at the message again.
//!
//! ## Layout
//!
//! The record is the concatenation of ten items, in the order of
//! `CacheField`. Each item is a big-endian `u32` holding its length, then the
//! item itself, then zero bytes up to the next multiple of four. The length
//! does not include the padding.
//!
//! The whole record is covered by a CRC-32.

pub mod addressing;
pub mod bodystructure;
pub mod envelope;
pub mod section;
pub mod strings;

use std::convert::TryFrom;

use byteorder::{BigEndian, WriteBytesExt};
use flate2::Crc;

use self::strings::ItemWriter;
use crate::mime::charset::Charsets;
use crate::mime::model::Body;

/// The version of the record layout produced by `write_cache`.
pub const CACHE_VERSION: u32 = 2;

/// The number of items in a cache record.
pub const CACHE_ITEMS: usize = 10;

/// The items of a cache record, in the order they are stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum CacheField {
    /// The IMAP `ENVELOPE` of the message.
    Envelope = 0,
    /// The IMAP `BODYSTRUCTURE`.
    BodyStructure,
    /// The header lines not otherwise parsed, verbatim.
    Headers,
    /// The IMAP `BODY` (non-extended body structure).
    Body,
    /// The section table (see `section`).
    Section,
    From,
    To,
    Cc,
    Bcc,
    /// The decoded subject, as an nstring.
    Subject,
}

/// The position of one item within the record data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheItem {
    /// Offset of the first byte of the item, after its length word.
    pub offset: u32,
    pub len: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheRecord {
    pub data: Vec<u8>,
    pub items: [CacheItem; CACHE_ITEMS],
    pub crc: u32,
    pub version: u32,
}

impl CacheRecord {
    /// Return the content of the given item.
    ///
    /// Returns an empty slice if the item table does not agree with the data.
    pub fn item(&self, field: CacheField) -> &[u8] {
        let item = self.items[field as usize];
        let start = item.offset as usize;
        start
            .checked_add(item.len as usize)
            .and_then(|end| self.data.get(start..end))
            .unwrap_or(&[])
    }

    /// Whether the CRC matches the data.
    pub fn is_intact(&self) -> bool {
        self.crc == crc32(&self.data)
    }
}

/// Build the cache record for the message rooted at `body`.
pub fn write_cache(body: &Body, charsets: &dyn Charsets) -> CacheRecord {
    let mut items: [ItemWriter; CACHE_ITEMS] = Default::default();

    envelope::write_envelope(
        &mut items[CacheField::Envelope as usize],
        body,
    );
    bodystructure::write_body(
        &mut items[CacheField::BodyStructure as usize],
        body,
        true,
    );
    if let Some(ref headers) = body.cache_headers {
        items[CacheField::Headers as usize].verbatim(headers);
    }
    bodystructure::write_body(
        &mut items[CacheField::Body as usize],
        body,
        false,
    );
    section::write_section_table(
        &mut items[CacheField::Section as usize],
        body,
        charsets,
    );
    for &(field, addrs) in &[
        (CacheField::From, &body.from),
        (CacheField::To, &body.to),
        (CacheField::Cc, &body.cc),
        (CacheField::Bcc, &body.bcc),
    ] {
        addressing::write_search_addresses(
            &mut items[field as usize],
            addrs,
            charsets,
        );
    }
    let subject = body
        .subject
        .as_deref()
        .map(|s| charsets.decode_mime_header(s));
    items[CacheField::Subject as usize].nstring(subject.as_deref());

    let mut record = CacheRecord {
        version: CACHE_VERSION,
        ..CacheRecord::default()
    };

    for (ix, item) in items.iter_mut().enumerate() {
        let content = std::mem::take(item).into_inner();
        // Items are bounded by the message size, which is under 4GB
        let len = u32::try_from(content.len()).unwrap_or(u32::MAX);

        // Writing to a Vec cannot fail
        let _ = record.data.write_u32::<BigEndian>(len);
        record.items[ix] = CacheItem {
            offset: record.data.len() as u32,
            len,
        };
        record.data.extend_from_slice(&content);
        let padded = (content.len() + 3) & !3;
        record.data.resize(record.data.len() + padded - content.len(), 0);
    }

    record.crc = crc32(&record.data);
    record
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}
