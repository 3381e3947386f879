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

//! Threading messages into conversations by their `Message-Id`,
//! `In-Reply-To`, and `References` headers.

use std::collections::HashMap;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use log::info;

use crate::message::{parse_file, IndexRecord, NULL_CONVERSATION};
use crate::mime::charset::Charsets;
use crate::mime::model::Body;
use crate::support::error::Error;
use crate::support::system_config::ParseConfig;

/// Persistent mapping from message-ids to conversation ids.
///
/// Implementations are expected to provide their own transactions around a
/// call to `update_conversations`.
pub trait ConversationStore {
    /// Look up the conversation of `msgid`, returning `NULL_CONVERSATION` if
    /// there is none.
    fn get_msgid(&mut self, msgid: &str) -> Result<u64, Error>;
    fn set_msgid(&mut self, msgid: &str, cid: u64) -> Result<(), Error>;
    /// Move everything in conversation `from` into conversation `to`.
    fn rename_cid(&mut self, from: u64, to: u64) -> Result<(), Error>;
}

/// A `ConversationStore` which lives only in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryConversationStore {
    pub msgids: HashMap<String, u64>,
}

impl ConversationStore for MemoryConversationStore {
    fn get_msgid(&mut self, msgid: &str) -> Result<u64, Error> {
        Ok(self
            .msgids
            .get(msgid)
            .copied()
            .unwrap_or(NULL_CONVERSATION))
    }

    fn set_msgid(&mut self, msgid: &str, cid: u64) -> Result<(), Error> {
        self.msgids.insert(msgid.to_owned(), cid);
        Ok(())
    }

    fn rename_cid(&mut self, from: u64, to: u64) -> Result<(), Error> {
        for cid in self.msgids.values_mut() {
            if from == *cid {
                *cid = to;
            }
        }
        Ok(())
    }
}

/// Derive a new conversation id from the GUID of a message: its first eight
/// bytes, taken as a big-endian integer.
fn generate_conversation_id(body: &Body) -> u64 {
    let guid = body.guid.unwrap_or_default();
    match BigEndian::read_u64(&guid[..8]) {
        NULL_CONVERSATION => 1,
        cid => cid,
    }
}

/// Extract every `<...>` token from `header`, lower-cased.
fn msgids(header: &[u8]) -> impl Iterator<Item = String> + '_ {
    let mut rest = header;
    std::iter::from_fn(move || {
        let start = memchr::memchr(b'<', rest)?;
        let end = start + memchr::memchr(b'>', &rest[start..])? + 1;
        let msgid = String::from_utf8_lossy(&rest[start..end])
            .to_ascii_lowercase();
        rest = &rest[end..];
        Some(msgid)
    })
}

/// Assign the message described by `record` and `body` to a conversation,
/// updating `store` to match.
///
/// The message joins the newest conversation of any message it mentions
/// (oldest `References` first, then `In-Reply-To`, then its own
/// `Message-Id`), or of `record.cid` if that is newer. If none exists, a new
/// one is derived from the GUID. Any other conversation mentioned is merged
/// into it.
pub fn update_conversations(
    store: &mut dyn ConversationStore,
    record: &mut IndexRecord,
    body: &Body,
) -> Result<(), Error> {
    let mut found: Vec<(String, u64)> = Vec::new();
    for header in &[&body.references, &body.in_reply_to, &body.message_id] {
        for msgid in header.iter().flat_map(|h| msgids(h)) {
            if !found.iter().any(|&(ref m, _)| *m == msgid) {
                found.push((msgid, NULL_CONVERSATION));
            }
        }
    }

    let mut new_cid = record.cid;
    for (msgid, cid) in found.iter_mut() {
        *cid = store.get_msgid(msgid)?;
        new_cid = new_cid.max(*cid);
    }

    if NULL_CONVERSATION == new_cid {
        new_cid = generate_conversation_id(body);
    }

    for (msgid, cid) in &found {
        if new_cid == *cid {
            continue;
        }

        if NULL_CONVERSATION != *cid {
            info!(
                "Merging conversation {:016x} into {:016x} via {}",
                cid, new_cid, msgid
            );
            store.rename_cid(*cid, new_cid)?;
        }

        store.set_msgid(msgid, new_cid)?;
    }

    record.cid = new_cid;
    Ok(())
}

/// Parse the message at `path` and assign it to a conversation.
pub fn update_conversations_file(
    store: &mut dyn ConversationStore,
    record: &mut IndexRecord,
    path: impl AsRef<Path>,
    config: &ParseConfig,
    charsets: &dyn Charsets,
) -> Result<(), Error> {
    let (_, body) = parse_file(path, config, charsets)?;
    update_conversations(store, record, &body)
}
