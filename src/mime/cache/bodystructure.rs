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

//! The IMAP `BODY` and `BODYSTRUCTURE` structures.
//!
//! The format depends on the content type of each part and on whether the
//! extended (`BODYSTRUCTURE`) form is wanted. § marks where the extended
//! fields begin.
//!
//! - `multipart/*`: (child)(child)(...) content-subtype §
//!   (content-type-parms) (content-disposition content-disposition-parms)
//!   content-language content-location
//! - `message/rfc822`: content-type content-subtype (content-type-parms)
//!   content-id content-description content-transfer-encoding size-octets
//!   (envelope) (bodystructure) size-lines §
//!   md5 (content-disposition content-disposition-parms) content-language
//!   content-location
//! - `text/*`: content-type content-subtype (content-type-parms) content-id
//!   content-description content-transfer-encoding size-octets size-lines §
//!   md5 (content-disposition content-disposition-parms) content-language
//!   content-location
//! - `*/*`: as `text/*` without size-lines.

use super::envelope::write_envelope;
use super::strings::ItemWriter;
use crate::mime::grovel::default_body;
use crate::mime::model::Body;

/// Write the structure of `body`, in extended form if `extended` is true.
///
/// A zero-part multipart is written as an empty part of the default content
/// type.
pub fn write_body(w: &mut ItemWriter, body: &Body, extended: bool) {
    if body.is_multipart() {
        if body.parts.is_empty() {
            write_body(w, &default_body(), extended);
            return;
        }

        w.byte(b'(');
        for part in &body.parts {
            write_body(w, part, extended);
        }
        w.byte(b' ');
        w.nstring(Some(&body.subtype));

        if extended {
            w.byte(b' ');
            w.params(&body.params);
            w.byte(b' ');
            write_extension_tail(w, body);
        }

        w.byte(b')');
        return;
    }

    w.byte(b'(');
    w.nstring(Some(&body.typ));
    w.byte(b' ');
    w.nstring(Some(&body.subtype));
    w.byte(b' ');
    w.params(&body.params);
    w.byte(b' ');
    w.nstring(body.id.as_deref());
    w.byte(b' ');
    w.nstring(body.description.as_deref());
    w.byte(b' ');
    w.nstring(Some(body.encoding.as_deref().unwrap_or("7BIT")));
    w.byte(b' ');
    w.number(body.content_size);

    if body.is_text() {
        w.byte(b' ');
        w.number(body.content_lines);
    } else if body.is_message_rfc822() {
        let default_sub;
        let sub = match body.subpart {
            Some(ref sub) => &**sub,
            None => {
                default_sub = default_body();
                &default_sub
            }
        };

        w.byte(b' ');
        write_envelope(w, sub);
        w.byte(b' ');
        write_body(w, sub, extended);
        w.byte(b' ');
        w.number(body.content_lines);
    }

    if extended {
        w.byte(b' ');
        w.nstring(body.md5.as_deref());
        w.byte(b' ');
        write_extension_tail(w, body);
    }

    w.byte(b')');
}

/// Write the disposition, language, and location fields shared by all
/// extended structures.
fn write_extension_tail(w: &mut ItemWriter, body: &Body) {
    match body.disposition {
        Some(ref disposition) => {
            w.byte(b'(');
            w.nstring(Some(disposition));
            w.byte(b' ');
            w.params(&body.disposition_params);
            w.byte(b')');
        }
        None => w.nil(),
    }
    w.byte(b' ');
    w.string_list(&body.language);
    w.byte(b' ');
    w.nstring(body.location.as_deref());
}
