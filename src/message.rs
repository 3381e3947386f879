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

//! Entry points for parsing whole messages and turning them into index
//! records.

use std::borrow::Cow;
use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::Deref;
use std::path::Path;

use chrono::prelude::*;
use log::{error, warn};
use openssl::hash::{hash, MessageDigest};

use crate::mime::cache::{write_cache, CacheRecord};
use crate::mime::charset::{resolve, Charsets};
use crate::mime::date::{day_from_rfc822, time_from_rfc822};
use crate::mime::grovel::grovel;
use crate::mime::model::{Body, MessageFlags};
use crate::support::error::Error;
use crate::support::system_config::{InternalDateHeuristic, ParseConfig};

/// The conversation id meaning "not in any conversation".
pub const NULL_CONVERSATION: u64 = 0;

/// The per-message fields of a mailbox index which are derived from parsing
/// the message.
#[derive(Clone, Debug, Default)]
pub struct IndexRecord {
    /// When the message was delivered. Callers normally set this before
    /// building the record; it is only derived from the message if unset.
    pub internaldate: Option<DateTime<Utc>>,
    /// The calendar day given in the `Date` header, ignoring its zone.
    pub sentdate: Option<NaiveDate>,
    /// The instant given in the `Date` header.
    pub gmtime: Option<DateTime<Utc>>,
    pub size: u32,
    pub header_size: u32,
    pub content_lines: u32,
    pub guid: [u8; 20],
    pub system_flags: MessageFlags,
    /// The conversation the message belongs to, or `NULL_CONVERSATION`.
    pub cid: u64,
    pub cache: CacheRecord,
}

/// Compute the GUID (SHA-1) of a whole message.
pub fn message_guid(data: &[u8]) -> Result<[u8; 20], Error> {
    let digest = hash(MessageDigest::sha1(), data)?;
    let mut guid = [0u8; 20];
    guid.copy_from_slice(&digest);
    Ok(guid)
}

/// Whether a message whose root part is `body` has an attachment.
///
/// A multipart does if it has more than two parts or any non-text part; any
/// other message does unless it is text.
fn has_attachment(body: &Body) -> bool {
    if body.is_multipart() {
        body.parts.len() > 2 || body.parts.iter().any(|p| !p.is_text())
    } else {
        !body.is_text()
    }
}

fn check_size(len: usize) -> Result<(), Error> {
    if len > u32::MAX as usize {
        error!("Message of {} bytes is too large to index", len);
        Err(Error::MessageTooLarge)
    } else {
        Ok(())
    }
}

/// Fill in the whole-message facts on the root of a freshly parsed tree.
fn finish_root(body: &mut Body, data: &[u8]) -> Result<(), Error> {
    body.guid = Some(message_guid(data)?);
    if has_attachment(body) {
        body.flags |= MessageFlags::HAS_ATTACHMENT;
    }
    Ok(())
}

/// Parse the message in `data` without modifying it.
pub fn parse_mapped(
    data: &[u8],
    config: &ParseConfig,
    charsets: &dyn Charsets,
) -> Result<Body, Error> {
    check_size(data.len())?;
    let (mut body, _) = grovel(Cow::Borrowed(data), false, config, charsets);
    finish_root(&mut body, data)?;
    Ok(body)
}

/// A message file mapped into memory.
#[derive(Debug)]
pub struct MappedMessage {
    map: memmap2::Mmap,
}

impl Deref for MappedMessage {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.map
    }
}

/// Map the message at `path` into memory and parse it.
///
/// The mapping is returned so that the caller can go on to read parts of the
/// message via the offsets in the tree.
pub fn parse_file(
    path: impl AsRef<Path>,
    config: &ParseConfig,
    charsets: &dyn Charsets,
) -> Result<(MappedMessage, Body), Error> {
    let file = fs::File::open(path)?;
    if 0 == file.metadata()?.len() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "zero-length message file",
        )));
    }

    // The file may be changed underneath us by another process, but message
    // files are never modified in place once delivered.
    let map = unsafe { memmap2::Mmap::map(&file)? };
    let body = parse_mapped(&map, config, charsets)?;
    Ok((MappedMessage { map }, body))
}

/// Parse the message in `file`, re-encoding any binary parts as base64, and
/// rewrite the file with the result.
///
/// This reads the whole file into memory since the message grows as parts
/// are re-encoded.
pub fn parse_binary_file(
    file: &mut fs::File,
    config: &ParseConfig,
    charsets: &dyn Charsets,
) -> Result<Body, Error> {
    let mut data = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut data)?;
    check_size(data.len())?;

    let (mut body, data) = grovel(Cow::Owned(data), true, config, charsets);
    check_size(data.len())?;
    finish_root(&mut body, &data)?;

    let rewrite = file
        .seek(SeekFrom::Start(0))
        .and_then(|_| file.write_all(&data))
        .and_then(|_| file.set_len(data.len() as u64))
        .and_then(|_| file.sync_all());
    if let Err(e) = rewrite {
        error!("Failed to rewrite re-encoded message: {}", e);
        return Err(e.into());
    }

    Ok(body)
}

/// Parse the message at `path` and fill `record` from it.
pub fn parse2(
    path: impl AsRef<Path>,
    record: &mut IndexRecord,
    config: &ParseConfig,
    charsets: &dyn Charsets,
) -> Result<Body, Error> {
    let (_, body) = parse_file(path, config, charsets)?;
    create_record(record, &body, config, charsets);
    Ok(body)
}

/// Fill in `record` from the tree of a freshly parsed message, including its
/// cache record.
pub fn create_record(
    record: &mut IndexRecord,
    body: &Body,
    config: &ParseConfig,
    charsets: &dyn Charsets,
) {
    if record.internaldate.is_none()
        && InternalDateHeuristic::ReceivedHeader
            == config.internaldate_heuristic
    {
        record.internaldate =
            body.received_date.as_deref().and_then(time_from_rfc822);
    }

    record.sentdate = body.date.as_deref().and_then(day_from_rfc822);
    record.gmtime = body.date.as_deref().and_then(time_from_rfc822);

    record.size = body.header_size.saturating_add(body.content_size);
    record.header_size = body.header_size;
    record.content_lines = body.content_lines;
    if let Some(guid) = body.guid {
        record.guid = guid;
    }
    record.system_flags |= body.flags;

    record.cache = write_cache(body, charsets);
}

/// A part found by `fetch_part`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BodyPart {
    /// The IMAP section number of the part, e.g. `1.2`.
    pub section: String,
    pub decoded_body: String,
}

/// Find every part of the message whose content type matches one of
/// `content_types`, returning each with its content decoded to UTF-8.
///
/// A content type is either `TYPE` or `TYPE/SUBTYPE`, case-insensitive; the
/// empty string matches anything. The search does not descend into matching
/// parts. Decoded content is cached on the tree.
pub fn fetch_part(
    data: &[u8],
    body: &mut Body,
    content_types: &[&str],
    charsets: &dyn Charsets,
) -> Result<Vec<BodyPart>, Error> {
    let mut found = Vec::new();
    find_part(data, body, "1", content_types, charsets, &mut found)?;
    Ok(found)
}

fn find_part(
    data: &[u8],
    body: &mut Body,
    section: &str,
    content_types: &[&str],
    charsets: &dyn Charsets,
    found: &mut Vec<BodyPart>,
) -> Result<(), Error> {
    if content_types.iter().any(|ct| type_matches(body, ct)) {
        let start = body.content_offset as usize;
        let end = start + body.content_size as usize;
        if end > data.len() {
            error!(
                "Part {} ends at {}, beyond the message size of {}",
                section,
                end,
                data.len()
            );
            return Err(Error::PartOutOfRange);
        }

        if body.decoded_body.is_none() {
            let (encoding, charset) = resolve(body, charsets);
            // Unknown charsets are tried as ASCII
            let charset = charset.max(0);
            let decoded = charsets
                .to_utf8(&data[start..end], charset, encoding)
                .unwrap_or_else(|| {
                    warn!("Unable to decode part {}", section);
                    String::new()
                });
            body.decoded_body = Some(decoded);
        }

        found.push(BodyPart {
            section: section.to_owned(),
            decoded_body: body.decoded_body.clone().unwrap_or_default(),
        });
    } else if body.is_multipart() {
        for (ix, part) in body.parts.iter_mut().enumerate() {
            find_part(
                data,
                part,
                &format!("{}.{}", section, ix + 1),
                content_types,
                charsets,
                found,
            )?;
        }
    } else if body.is_message_rfc822() {
        if let Some(ref mut sub) = body.subpart {
            find_part(
                data,
                sub,
                &format!("{}.1", section),
                content_types,
                charsets,
                found,
            )?;
        }
    }

    Ok(())
}

fn type_matches(body: &Body, content_type: &str) -> bool {
    let (typ, subtype) = match content_type.find('/') {
        Some(slash) => (&content_type[..slash], &content_type[slash + 1..]),
        None => (content_type, ""),
    };

    (content_type.is_empty() || typ.eq_ignore_ascii_case(&body.typ))
        && (subtype.is_empty() || subtype.eq_ignore_ascii_case(&body.subtype))
}
