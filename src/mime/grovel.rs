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
use std::mem;

use log::{error, warn};
use memchr::memchr;

use super::address::parse_address_list;
use super::boundary::{Boundaries, BoundaryMatch};
use super::charset::Charsets;
use super::header::{
    parse_received_date, split_header, trim_line_ending, unfold, HeaderIter,
    HeaderName,
};
use super::lex::{line_ending_len, read_line};
use super::model::*;
use super::params::*;
use crate::support::system_config::ParseConfig;

/// The content type of parts which don't declare one.
pub const DEFAULT_CONTENT_TYPE: &[u8] = b"TEXT/PLAIN; CHARSET=us-ascii";
/// The content type of parts of a `multipart/digest` which don't declare one.
pub const DIGEST_CONTENT_TYPE: &[u8] = b"MESSAGE/RFC822";

/// Parse the message in `msg` into a `Body` tree.
///
/// If `encode` is true, every leaf with `Content-Transfer-Encoding: binary`
/// is rewritten to base64 within the buffer, which is why the (possibly
/// modified) buffer is returned alongside the tree. All offsets in the tree
/// refer to the returned buffer.
///
/// This does not compute the GUID or the has-attachment flag.
pub fn grovel<'a>(
    msg: Cow<'a, [u8]>,
    encode: bool,
    config: &ParseConfig,
    charsets: &dyn Charsets,
) -> (Body, Cow<'a, [u8]>) {
    let mut groveller = Groveller {
        msg,
        offset: 0,
        encode,
        config,
        charsets,
        boundaries: Boundaries::new(config.rfc2046_strict),
        nesting: 0,
        header_scratch: Vec::new(),
    };

    let mut body = Body {
        cache_headers: Some(Vec::new()),
        ..Body::default()
    };
    groveller.parse_body(&mut body, DEFAULT_CONTENT_TYPE);
    (body, groveller.msg)
}

/// A recursive-descent parser which descends through a MIME message.
///
/// It is designed to be robust moreso than strictly correct. That is, it will
/// accept wildly malformed data but will still do its best to carry on, even
/// in the face of things that are invalid per the standard. Nothing here ever
/// fails; the worst outcome is a tree that describes the message poorly.
struct Groveller<'a, 'c> {
    msg: Cow<'a, [u8]>,
    offset: usize,
    /// Whether binary leaves are being re-encoded to base64.
    encode: bool,
    config: &'c ParseConfig,
    charsets: &'c dyn Charsets,
    /// The boundaries of every multipart we are currently inside.
    boundaries: Boundaries,
    /// How many multipart or message/rfc822 levels we are inside.
    nesting: u32,
    /// Holds a copy of the header block being dispatched, reused across
    /// parts.
    header_scratch: Vec<u8>,
}

impl Groveller<'_, '_> {
    fn parse_body(&mut self, body: &mut Body, default_content_type: &[u8]) {
        let saw_boundary = self.parse_headers(body, default_content_type);
        let too_deep = self.nesting >= self.config.max_nesting_depth;

        if body.is_multipart() {
            if saw_boundary {
                return;
            }

            if too_deep {
                warn!(
                    "Multipart nested more than {} levels deep at offset {}, \
                     treating as opaque",
                    self.config.max_nesting_depth, self.offset
                );
                self.parse_content(body);
            } else {
                self.nesting += 1;
                self.parse_multipart(body);
                self.nesting -= 1;
            }
        } else if body.is_message_rfc822() {
            let mut child = Body::default();

            if saw_boundary {
                apply_content_type(&mut child, DEFAULT_CONTENT_TYPE);
            } else if too_deep {
                warn!(
                    "Message nested more than {} levels deep at offset {}, \
                     treating as opaque",
                    self.config.max_nesting_depth, self.offset
                );
                apply_content_type(&mut child, DEFAULT_CONTENT_TYPE);
                self.parse_content(body);
            } else {
                self.nesting += 1;
                self.parse_body(&mut child, DEFAULT_CONTENT_TYPE);
                self.nesting -= 1;

                body.content_size = child.header_size + child.content_size;
                body.content_lines = child.header_lines + child.content_lines;
                body.boundary_size = mem::take(&mut child.boundary_size);
                body.boundary_lines = mem::take(&mut child.boundary_lines);
            }

            body.subpart = Some(Box::new(child));
        } else if !saw_boundary {
            self.parse_content(body);
        }
    }

    /// Read the header block of the part starting at the current offset and
    /// populate `body` from it.
    ///
    /// Returns whether the header block was cut short by a boundary line, in
    /// which case that line has been consumed and accounted to `body`.
    fn parse_headers(
        &mut self,
        body: &mut Body,
        default_content_type: &[u8],
    ) -> bool {
        let start = self.offset;
        let mut end = start;
        let mut saw_boundary = false;

        body.header_offset = start as u32;

        while let Some(line) = read_line(&self.msg[self.offset..], usize::MAX)
        {
            let len = line.len();

            if b"\r\n" == line || b"\n" == line {
                self.offset += len;
                end = self.offset;
                break;
            }

            if line.starts_with(b"--")
                && BoundaryMatch::No != self.boundaries.check(line)
            {
                body.boundary_size = len as u32;
                body.boundary_lines = u32::from(line.ends_with(b"\n"));
                let ending = line_ending_len(&self.msg[start..self.offset]);
                if ending > 0 {
                    end -= ending;
                    body.boundary_size += ending as u32;
                    body.boundary_lines += 1;
                }

                self.offset += len;
                saw_boundary = true;
                break;
            }

            self.offset += len;
            end = self.offset;
        }

        body.content_offset = self.offset as u32;
        body.header_size = (end - start) as u32;

        let mut block = mem::take(&mut self.header_scratch);
        block.clear();
        block.extend_from_slice(&self.msg[start..end]);
        body.header_lines = memchr::memchr_iter(b'\n', &block).count() as u32;
        self.dispatch_headers(body, &block, start);
        self.header_scratch = block;

        if body.typ.is_empty() {
            apply_content_type(body, default_content_type);
        }

        saw_boundary
    }

    /// Feed every header in `block`, which starts at `block_offset` within
    /// the message, to the appropriate field parser.
    fn dispatch_headers(
        &mut self,
        body: &mut Body,
        block: &[u8],
        block_offset: usize,
    ) {
        let max_lines = self.config.max_header_lines as usize;
        let mut received_seen = false;

        for raw in HeaderIter::new(block) {
            if max_lines > 0 && raw.line >= max_lines {
                error!(
                    "Message has more than {} header lines, \
                     not caching any more",
                    max_lines
                );
                break;
            }

            let (name, value, value_offset) = match split_header(raw.text) {
                Some(split) => split,
                None => continue,
            };
            if name.is_empty() || b' ' == name[0] || b'\t' == name[0] {
                continue;
            }

            let name = trim_trailing_space(name);
            let header = match HeaderName::lookup(name) {
                Some(header) => header,
                None => {
                    if let Some(ref mut cache) = body.cache_headers {
                        cache.extend_from_slice(trim_line_ending(raw.text));
                        cache.extend_from_slice(b"\r\n");
                    }
                    continue;
                }
            };

            match header {
                HeaderName::Bcc => parse_address_list(value, &mut body.bcc),
                HeaderName::Cc => parse_address_list(value, &mut body.cc),
                HeaderName::From => parse_address_list(value, &mut body.from),
                HeaderName::ReplyTo => {
                    parse_address_list(value, &mut body.reply_to)
                }
                HeaderName::Sender => {
                    parse_address_list(value, &mut body.sender)
                }
                HeaderName::To => parse_address_list(value, &mut body.to),

                HeaderName::ContentDescription => {
                    set_text(&mut body.description, value)
                }
                HeaderName::ContentId => set_text(&mut body.id, value),
                HeaderName::ContentLocation => {
                    set_text(&mut body.location, value)
                }
                HeaderName::ContentMd5 => set_text(&mut body.md5, value),
                HeaderName::Date => set_text(&mut body.date, value),
                HeaderName::InReplyTo => {
                    set_text(&mut body.in_reply_to, value)
                }
                HeaderName::MessageId => {
                    set_text(&mut body.message_id, value)
                }
                HeaderName::References => {
                    set_text(&mut body.references, value)
                }
                HeaderName::Subject => set_text(&mut body.subject, value),

                HeaderName::ContentDisposition => {
                    if body.disposition.is_none() {
                        if let Some((disposition, params)) =
                            parse_disposition(value)
                        {
                            body.disposition = Some(disposition);
                            body.disposition_params = params;
                        }
                    }
                }

                HeaderName::ContentLanguage => {
                    if body.language.is_empty() {
                        body.language = parse_language(value);
                    }
                }

                HeaderName::ContentTransferEncoding => {
                    if body.encoding.is_none() {
                        body.encoding = parse_encoding(value);
                        if self.encode
                            && Some("BINARY") == body.encoding.as_deref()
                        {
                            self.rewrite_binary_token(
                                block_offset + raw.offset + value_offset,
                                value,
                            );
                        }
                    }
                }

                HeaderName::ContentType => {
                    if body.typ.is_empty() {
                        if let Some(ct) = parse_content_type(value) {
                            body.typ = ct.typ;
                            body.subtype = ct.subtype;
                            body.params = ct.params;
                        }
                    }
                }

                HeaderName::Received => {
                    if !received_seen && body.received_date.is_none() {
                        body.received_date = parse_received_date(value);
                    }
                    received_seen = true;
                }

                HeaderName::XDeliveredInternalDate => {
                    body.received_date = Some(unfold(value));
                }

                HeaderName::XTrueDomain => {
                    if 0 == self.boundaries.depth()
                        && memchr::memmem::find(value, b"True").is_some()
                    {
                        body.flags |= MessageFlags::HAS_TRUE_DOMAIN;
                    }
                }
            }
        }
    }

    /// Overwrite the word "binary" in the `Content-Transfer-Encoding` value
    /// found at `value_offset` with "base64".
    fn rewrite_binary_token(&mut self, value_offset: usize, value: &[u8]) {
        let pos = value
            .windows(6)
            .position(|w| w.eq_ignore_ascii_case(b"binary"));
        if let Some(pos) = pos {
            let at = value_offset + pos;
            self.msg.to_mut()[at..at + 6].copy_from_slice(b"base64");
        }
    }

    fn parse_multipart(&mut self, body: &mut Body) {
        let default_content_type = if "DIGEST" == body.subtype {
            DIGEST_CONTENT_TYPE
        } else {
            DEFAULT_CONTENT_TYPE
        };

        let boundary = match body.param("BOUNDARY").filter(|b| !b.is_empty())
        {
            Some(boundary) => boundary.to_vec(),
            None => {
                // Invalid MIME; treat as a zero-part multipart
                self.parse_content(body);
                return;
            }
        };

        self.boundaries.push(boundary);
        let depth = self.boundaries.depth();

        let mut preamble = Body::default();
        let mut epilogue = Body::default();
        self.parse_content(&mut preamble);

        while depth == self.boundaries.depth() {
            let mut part = Body::default();
            self.parse_body(&mut part, default_content_type);
            let exhausted =
                self.offset >= self.msg.len() && 0 == part.boundary_size;
            body.parts.push(part);

            if exhausted {
                // End of the message ends every multipart still open
                self.boundaries.clear();
            }
        }

        if depth - 1 == self.boundaries.depth() {
            self.parse_content(&mut epilogue);
        } else if let Some(last) = body.parts.last_mut() {
            // We hit the boundary of an enclosing multipart while parsing a
            // part; it belongs to our level
            body.boundary_size = mem::take(&mut last.boundary_size);
            body.boundary_lines = mem::take(&mut last.boundary_lines);
        } else {
            body.boundary_size = mem::take(&mut preamble.boundary_size);
            body.boundary_lines = mem::take(&mut preamble.boundary_lines);
        }

        body.content_size = preamble.content_size + preamble.boundary_size;
        body.content_lines = preamble.content_lines + preamble.boundary_lines;
        for part in &body.parts {
            body.content_size +=
                part.header_size + part.content_size + part.boundary_size;
            body.content_lines +=
                part.header_lines + part.content_lines + part.boundary_lines;
        }
        body.content_size += epilogue.content_size;
        body.content_lines += epilogue.content_lines;

        body.boundary_size += epilogue.boundary_size;
        body.boundary_lines += epilogue.boundary_lines;
    }

    /// Scan the content of a leaf up to the next boundary or the end of the
    /// message.
    fn parse_content(&mut self, body: &mut Body) {
        let start = self.offset;
        let encode =
            self.encode && Some("BINARY") == body.encoding.as_deref();

        while self.offset < self.msg.len() {
            let rest = &self.msg[self.offset..];
            let len = memchr(b'\n', rest).map_or(rest.len(), |ix| ix + 1);
            let line = &rest[..len];
            let line_start = self.offset;
            self.offset += len;

            if line.starts_with(b"--")
                && BoundaryMatch::No != self.boundaries.check(line)
            {
                body.boundary_size = len as u32;
                // An unterminated delimiter at the end of the message is not
                // a line
                body.boundary_lines += u32::from(line.ends_with(b"\n"));

                // The line ending before the delimiter is part of the
                // delimiter
                let ending =
                    line_ending_len(&self.msg[start..line_start]) as u32;
                if ending > 0 {
                    body.content_size -= ending;
                    body.boundary_size += ending;
                    if body.content_lines > 0 {
                        body.content_lines -= 1;
                        body.boundary_lines += 1;
                    }
                }
                break;
            }

            body.content_size += len as u32;
            // When encoding, only blank lines count, since the rest will
            // become base64 lines
            if line.ends_with(b"\n") && (!encode || b'\r' == line[0]) {
                body.content_lines += 1;
            }
        }

        if encode {
            self.encode_content(body, start);
        }
    }

    /// Replace the binary content of `body`, which starts at `start`, with
    /// its base64 encoding.
    fn encode_content(&mut self, body: &mut Body, start: usize) {
        let end = start + body.content_size as usize;
        let (encoded, lines) =
            self.charsets.encode_mime_body(&self.msg[start..end]);
        let delta = encoded.len() - (end - start);

        body.content_size = encoded.len() as u32;
        body.content_lines += lines;
        body.encoding = Some("BASE64".to_owned());

        self.msg.to_mut().splice(start..end, encoded);
        self.offset += delta;
    }
}

/// An empty part of the default content type.
///
/// This stands in for zero-part multiparts, which IMAP cannot represent.
pub fn default_body() -> Body {
    let mut body = Body::default();
    apply_content_type(&mut body, DEFAULT_CONTENT_TYPE);
    body
}

fn apply_content_type(body: &mut Body, content_type: &[u8]) {
    if let Some(ct) = parse_content_type(content_type) {
        body.typ = ct.typ;
        body.subtype = ct.subtype;
        body.params = ct.params;
    }
}

fn set_text(dst: &mut Option<Vec<u8>>, value: &[u8]) {
    if dst.is_none() {
        *dst = Some(unfold(value));
    }
}

fn trim_trailing_space(name: &[u8]) -> &[u8] {
    let len = name
        .iter()
        .rposition(|&b| b' ' != b && b'\t' != b)
        .map_or(0, |ix| ix + 1);
    &name[..len]
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;
    use crate::mime::charset::StandardCharsets;

    fn parse_with(config: &ParseConfig, msg: &[u8]) -> Body {
        grovel(Cow::Borrowed(msg), false, config, &StandardCharsets).0
    }

    fn parse(msg: &[u8]) -> Body {
        parse_with(&ParseConfig::default(), msg)
    }

    fn newlines(msg: &[u8], offset: u32, len: u32) -> u32 {
        memchr::memchr_iter(b'\n', &msg[offset as usize..][..len as usize])
            .count() as u32
    }

    /// Check that the sizes and line counts of every part agree exactly with
    /// the text of `msg` they cover.
    fn check_sums(msg: &[u8], body: &Body) {
        let header_end = body.header_offset + body.header_size;
        let content_end = body.content_offset + body.content_size;
        assert_eq!(
            newlines(msg, body.header_offset, body.header_size),
            body.header_lines
        );
        assert_eq!(
            newlines(msg, body.content_offset, body.content_size),
            body.content_lines
        );

        // A delimiter that cut the header block short sits between the
        // headers and the empty content
        let boundary_offset = if body.boundary_size > 0
            && header_end + body.boundary_size == body.content_offset
        {
            header_end
        } else {
            content_end
        };
        assert_eq!(
            newlines(msg, boundary_offset, body.boundary_size),
            body.boundary_lines
        );

        if body.is_multipart() && !body.parts.is_empty() {
            let first = body.parts[0].header_offset;
            assert!(first >= body.content_offset);

            let mut parts_size = 0;
            let mut parts_lines = 0;
            for part in &body.parts {
                assert_eq!(first + parts_size, part.header_offset);
                parts_size +=
                    part.header_size + part.content_size + part.boundary_size;
                parts_lines += part.header_lines
                    + part.content_lines
                    + part.boundary_lines;
                check_sums(msg, part);
            }

            let offset = first + parts_size;
            assert!(offset <= content_end);
            let preamble_size = first - body.content_offset;
            let epilogue_size = content_end - offset;
            assert_eq!(
                body.content_size,
                preamble_size + parts_size + epilogue_size
            );
            assert_eq!(
                body.content_lines,
                newlines(msg, body.content_offset, preamble_size)
                    + parts_lines
                    + newlines(msg, offset, epilogue_size)
            );
        }

        if let Some(ref sub) = body.subpart {
            // Delimited or over-nested messages get an empty placeholder
            if sub.header_size + sub.content_size > 0 {
                assert_eq!(body.content_offset, sub.header_offset);
                assert_eq!(
                    body.content_size,
                    sub.header_size + sub.content_size
                );
                assert_eq!(
                    body.content_lines,
                    sub.header_lines + sub.content_lines
                );
            }
            check_sums(msg, sub);
        }
    }

    #[test]
    fn simple_message() {
        let msg = b"From: Alice <alice@example.com>\r\n\
                    To: bob@example.com, carol@example.com\r\n\
                    Subject: Hello\r\n\
                    \tworld\r\n\
                    X-Mailer: Frobnicator\r\n\
                    Date: Tue, 1 Sep 2020 12:00:00 +0000\r\n\
                    \r\n\
                    Line one\r\n\
                    Line two\r\n";
        let body = parse(msg);

        assert_eq!("TEXT", body.typ);
        assert_eq!("PLAIN", body.subtype);
        assert_eq!(Some(&b"us-ascii"[..]), body.param("CHARSET"));
        assert_eq!(Some(b"Hello\tworld".to_vec()), body.subject);
        assert_eq!(1, body.from.len());
        assert_eq!(Some(b"Alice".to_vec()), body.from[0].name);
        assert_eq!(2, body.to.len());
        assert_eq!(
            Some(b"Tue, 1 Sep 2020 12:00:00 +0000".to_vec()),
            body.date
        );

        assert_eq!(0, body.header_offset);
        assert_eq!(7, body.header_lines);
        assert_eq!(body.header_size, body.content_offset);
        assert_eq!(msg.len() as u32, body.header_size + body.content_size);
        assert_eq!(2, body.content_lines);
        assert_eq!(
            Some(&b"X-Mailer: Frobnicator\r\n"[..]),
            body.cache_headers.as_deref()
        );
        check_sums(msg, &body);
    }

    #[test]
    fn eight_bit_headers_are_kept() {
        let msg = b"Subject: caf\xe9\r\n\
                    From: J\xfcrgen <j@example.com>\r\n\
                    \r\n";
        let body = parse(msg);
        assert_eq!(Some(vec![99, 97, 102, 233]), body.subject);
        assert_eq!(Some(b"J\xfcrgen".to_vec()), body.from[0].name);
    }

    #[test]
    fn first_header_wins() {
        let body = parse(
            b"Subject: first\r\n\
              Subject: second\r\n\
              Content-Type: text/html\r\n\
              Content-Type: image/png\r\n\
              To: a@b.c\r\n\
              To: d@e.f\r\n\
              \r\n",
        );
        assert_eq!(Some(b"first".to_vec()), body.subject);
        assert_eq!("HTML", body.subtype);
        // Address headers accumulate
        assert_eq!(2, body.to.len());
    }

    #[test]
    fn received_and_delivered_date() {
        let body = parse(
            b"Received: from a by b; Tue, 1 Sep 2020 12:00:00 +0000\r\n\
              Received: from c by d; Mon, 31 Aug 2020 12:00:00 +0000\r\n\
              \r\n",
        );
        assert_eq!(
            Some(b"Tue, 1 Sep 2020 12:00:00 +0000".to_vec()),
            body.received_date
        );

        let body = parse(
            b"Received: from a by b; Tue, 1 Sep 2020 12:00:00 +0000\r\n\
              X-DeliveredInternalDate: Wed, 2 Sep 2020 00:00:00 +0000\r\n\
              \r\n",
        );
        assert_eq!(
            Some(b"Wed, 2 Sep 2020 00:00:00 +0000".to_vec()),
            body.received_date
        );
    }

    #[test]
    fn true_domain_flag() {
        let body = parse(b"X-TrueDomain: True\r\n\r\n");
        assert!(body.flags.contains(MessageFlags::HAS_TRUE_DOMAIN));
        let body = parse(b"X-TrueDomain: False\r\n\r\n");
        assert!(!body.flags.contains(MessageFlags::HAS_TRUE_DOMAIN));
    }

    #[test]
    fn header_ceiling() {
        let config = ParseConfig {
            max_header_lines: 2,
            ..ParseConfig::default()
        };
        let msg = b"Subject: a\r\nX-Foo: b\r\nTo: c@d.e\r\n\r\nbody\r\n";
        let body = parse_with(&config, msg);
        assert_eq!(Some(b"a".to_vec()), body.subject);
        assert!(body.to.is_empty());
        // Size accounting is unaffected
        assert_eq!(4, body.header_lines);
        assert_eq!(msg.len() as u32, body.header_size + body.content_size);
    }

    #[test]
    fn multipart_two_parts() {
        let msg = b"Content-Type: multipart/mixed; boundary=XYZ\r\n\
                    \r\n\
                    preamble\r\n\
                    --XYZ\r\n\
                    Content-Type: text/plain\r\n\
                    \r\n\
                    part one\r\n\
                    --XYZ\r\n\
                    \r\n\
                    part two\r\n\
                    --XYZ--\r\n\
                    epilogue\r\n";
        let body = parse(msg);

        assert_eq!("MULTIPART", body.typ);
        assert_eq!(2, body.parts.len());
        assert_eq!(msg.len() as u32, body.header_size + body.content_size);
        assert_eq!(0, body.boundary_size);

        let one = &body.parts[0];
        assert_eq!("TEXT", one.typ);
        assert_eq!(
            b"part one",
            &msg[one.content_offset as usize..][..one.content_size as usize]
        );
        assert_eq!(0, one.content_lines);

        let two = &body.parts[1];
        assert_eq!(2, two.header_size);
        assert_eq!(
            b"part two",
            &msg[two.content_offset as usize..][..two.content_size as usize]
        );
        // "\r\n--XYZ--\r\n"
        assert_eq!(11, two.boundary_size);
        assert_eq!(2, two.boundary_lines);

        check_sums(msg, &body);
    }

    #[test]
    fn truncated_multipart_is_closed() {
        let msg = b"Content-Type: multipart/mixed; boundary=XYZ\r\n\
                    \r\n\
                    --XYZ\r\n\
                    \r\n\
                    part one\r\n\
                    --XYZ\r\n\
                    \r\n\
                    part two\r\n";
        let body = parse(msg);
        assert_eq!(2, body.parts.len());
        assert_eq!(msg.len() as u32, body.header_size + body.content_size);
        check_sums(msg, &body);
    }

    #[test]
    fn unterminated_final_delimiter() {
        let msg = b"Content-Type: multipart/mixed; boundary=XYZ\r\n\
                    \r\n\
                    --XYZ\r\n\
                    \r\n\
                    only part\r\n\
                    --XYZ--";
        let body = parse(msg);
        assert_eq!(1, body.parts.len());
        let part = &body.parts[0];
        assert_eq!(b"\r\n--XYZ--".len() as u32, part.boundary_size);
        assert_eq!(1, part.boundary_lines);
        assert_eq!(
            msg.iter().filter(|&&b| b'\n' == b).count() as u32,
            body.header_lines + body.content_lines
        );
        check_sums(msg, &body);
    }

    #[test]
    fn missing_boundary_is_zero_part_multipart() {
        let msg = b"Content-Type: multipart/mixed\r\n\r\nstuff\r\n";
        let body = parse(msg);
        assert!(body.is_zero_part_multipart());
        assert_eq!(7, body.content_size);
    }

    #[test]
    fn nested_multipart_hits_outer_boundary() {
        let msg = b"Content-Type: multipart/mixed; boundary=outer\r\n\
                    \r\n\
                    --outer\r\n\
                    Content-Type: multipart/alternative; boundary=inner\r\n\
                    \r\n\
                    --inner\r\n\
                    \r\n\
                    alt\r\n\
                    --outer--\r\n";
        let body = parse(msg);
        assert_eq!(1, body.parts.len());
        let inner = &body.parts[0];
        assert_eq!("ALTERNATIVE", inner.subtype);
        assert_eq!(1, inner.parts.len());
        // The outer delimiter was promoted from the inner part
        assert_eq!(0, inner.parts[0].boundary_size);
        assert_eq!(b"\r\n--outer--\r\n".len() as u32, inner.boundary_size);
        assert_eq!(0, body.boundary_size);
        assert_eq!(msg.len() as u32, body.header_size + body.content_size);
        check_sums(msg, &body);
    }

    #[test]
    fn message_rfc822() {
        let msg = b"Content-Type: message/rfc822\r\n\
                    \r\n\
                    Subject: inner\r\n\
                    \r\n\
                    inner body\r\n";
        let body = parse(msg);
        let sub = body.subpart.as_ref().unwrap();
        assert_eq!(Some(b"inner".to_vec()), sub.subject);
        assert_eq!("TEXT", sub.typ);
        assert_eq!(sub.header_size + sub.content_size, body.content_size);
        assert_eq!(sub.header_offset, body.content_offset);
        // Only the root collects cached headers
        assert!(sub.cache_headers.is_none());
        check_sums(msg, &body);
    }

    #[test]
    fn digest_default_type() {
        let msg = b"Content-Type: multipart/digest; boundary=D\r\n\
                    \r\n\
                    --D\r\n\
                    \r\n\
                    Subject: digested\r\n\
                    \r\n\
                    text\r\n\
                    --D--\r\n";
        let body = parse(msg);
        assert_eq!(1, body.parts.len());
        assert!(body.parts[0].is_message_rfc822());
        assert_eq!(
            Some(b"digested".to_vec()),
            body.parts[0].subpart.as_ref().unwrap().subject
        );
        check_sums(msg, &body);
    }

    #[test]
    fn boundary_in_headers() {
        let msg = b"Content-Type: multipart/mixed; boundary=B\r\n\
                    \r\n\
                    --B\r\n\
                    Subject: cut short\r\n\
                    --B--\r\n";
        let body = parse(msg);
        assert_eq!(1, body.parts.len());
        let part = &body.parts[0];
        assert_eq!(Some(b"cut short".to_vec()), part.subject);
        assert_eq!(b"Subject: cut short".len() as u32, part.header_size);
        assert_eq!(0, part.content_size);
        assert_eq!(b"\r\n--B--\r\n".len() as u32, part.boundary_size);
        assert_eq!(msg.len() as u32, body.header_size + body.content_size);
        check_sums(msg, &body);
    }

    #[test]
    fn nesting_depth_limit() {
        let config = ParseConfig {
            max_nesting_depth: 1,
            ..ParseConfig::default()
        };
        let msg = b"Content-Type: message/rfc822\r\n\
                    \r\n\
                    Content-Type: message/rfc822\r\n\
                    \r\n\
                    Subject: too deep\r\n\
                    \r\n";
        let body = parse_with(&config, msg);
        let sub = body.subpart.as_ref().unwrap();
        assert!(sub.is_message_rfc822());
        let subsub = sub.subpart.as_ref().unwrap();
        assert_eq!("TEXT", subsub.typ);
        assert_eq!(None, subsub.subject);
        check_sums(msg, &body);
    }

    #[test]
    fn binary_reencoding() {
        let msg = b"Content-Type: application/octet-stream\r\n\
                    Content-Transfer-Encoding: binary\r\n\
                    \r\n\
                    \x00\x01\x02\xff";
        let (body, out) = grovel(
            Cow::Borrowed(&msg[..]),
            true,
            &ParseConfig::default(),
            &StandardCharsets,
        );

        assert_eq!(Some("BASE64".to_owned()), body.encoding);
        assert_eq!(b"AAEC/w==\r\n".len() as u32, body.content_size);
        assert_eq!(1, body.content_lines);
        assert_eq!(
            &b"AAEC/w==\r\n"[..],
            &out[body.content_offset as usize..]
        );
        let headers = &out[..body.header_size as usize];
        assert!(headers
            .windows(33)
            .any(|w| w == b"Content-Transfer-Encoding: base64"));
    }

    #[test]
    fn binary_reencoding_in_multipart() {
        let msg = b"Content-Type: multipart/mixed; boundary=B\r\n\
                    \r\n\
                    --B\r\n\
                    Content-Transfer-Encoding: BINARY\r\n\
                    \r\n\
                    abc\r\n\
                    --B\r\n\
                    \r\n\
                    text\r\n\
                    --B--\r\n";
        let (body, out) = grovel(
            Cow::Borrowed(&msg[..]),
            true,
            &ParseConfig::default(),
            &StandardCharsets,
        );

        let bin = &body.parts[0];
        assert_eq!(
            &b"YWJj\r\n"[..],
            &out[bin.content_offset as usize..]
                [..bin.content_size as usize]
        );
        let text = &body.parts[1];
        assert_eq!(
            &b"text"[..],
            &out[text.content_offset as usize..]
                [..text.content_size as usize]
        );
        assert_eq!(out.len() as u32, body.header_size + body.content_size);
    }

    proptest! {
        #[test]
        fn grovel_never_panics(
            data in prop::collection::vec(
                prop::sample::select(
                    &b"-\r\n:; =\"aBx\x80"[..]), 0..200)
        ) {
            let mut msg = b"Content-Type: multipart/mixed; boundary=a\r\n\
                            \r\n".to_vec();
            msg.extend_from_slice(&data);
            let (body, out) = grovel(
                Cow::Borrowed(&msg[..]),
                true,
                &ParseConfig::default(),
                &StandardCharsets,
            );
            prop_assert_eq!(
                out.len() as u32, body.header_size + body.content_size);
            prop_assert_eq!(
                out.iter().filter(|&&b| b'\n' == b).count() as u32,
                body.header_lines + body.content_lines);
            check_sums(&out, &body);
        }
    }
}
