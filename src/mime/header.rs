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

//! Utilities for working with individual RFC 2822 headers.

use memchr::memchr;

/// The headers which are parsed into structured fields of a `Body`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderName {
    Bcc,
    Cc,
    ContentDescription,
    ContentDisposition,
    ContentId,
    ContentLanguage,
    ContentLocation,
    ContentMd5,
    ContentTransferEncoding,
    ContentType,
    Date,
    From,
    InReplyTo,
    MessageId,
    ReplyTo,
    Received,
    References,
    Subject,
    Sender,
    To,
    XDeliveredInternalDate,
    XTrueDomain,
}

static HEADER_NAMES: &[(&str, HeaderName)] = &[
    ("bcc", HeaderName::Bcc),
    ("cc", HeaderName::Cc),
    ("content-description", HeaderName::ContentDescription),
    ("content-disposition", HeaderName::ContentDisposition),
    ("content-id", HeaderName::ContentId),
    ("content-language", HeaderName::ContentLanguage),
    ("content-location", HeaderName::ContentLocation),
    ("content-md5", HeaderName::ContentMd5),
    ("content-transfer-encoding", HeaderName::ContentTransferEncoding),
    ("content-type", HeaderName::ContentType),
    ("date", HeaderName::Date),
    ("from", HeaderName::From),
    ("in-reply-to", HeaderName::InReplyTo),
    ("message-id", HeaderName::MessageId),
    ("reply-to", HeaderName::ReplyTo),
    ("received", HeaderName::Received),
    ("references", HeaderName::References),
    ("subject", HeaderName::Subject),
    ("sender", HeaderName::Sender),
    ("to", HeaderName::To),
    ("x-deliveredinternaldate", HeaderName::XDeliveredInternalDate),
    ("x-truedomain", HeaderName::XTrueDomain),
];

impl HeaderName {
    /// Look `name` up case-insensitively.
    pub fn lookup(name: &[u8]) -> Option<Self> {
        HEADER_NAMES
            .iter()
            .find(|&&(n, _)| n.as_bytes().eq_ignore_ascii_case(name))
            .map(|&(_, h)| h)
    }
}

/// One logical header within a header block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawHeader<'a> {
    /// Byte offset of the header within the block.
    pub offset: usize,
    /// Index of the physical line on which the header starts.
    pub line: usize,
    /// The full text of the header, including continuation lines and the
    /// final line ending.
    pub text: &'a [u8],
}

/// Iterate over the logical headers in a raw header block.
///
/// Lines starting with a space or tab are continuations and belong to the
/// header before them. A continuation at the very start of the block is
/// yielded by itself, since there is nothing to attach it to.
pub struct HeaderIter<'a> {
    block: &'a [u8],
    offset: usize,
    line: usize,
}

impl<'a> HeaderIter<'a> {
    pub fn new(block: &'a [u8]) -> Self {
        HeaderIter {
            block,
            offset: 0,
            line: 0,
        }
    }
}

impl<'a> Iterator for HeaderIter<'a> {
    type Item = RawHeader<'a>;

    fn next(&mut self) -> Option<RawHeader<'a>> {
        if self.offset >= self.block.len() {
            return None;
        }

        let start = self.offset;
        let start_line = self.line;
        let mut end = start;
        loop {
            match memchr(b'\n', &self.block[end..]) {
                None => {
                    end = self.block.len();
                    break;
                }
                Some(ix) => {
                    end += ix + 1;
                    self.line += 1;
                    match self.block.get(end) {
                        Some(b' ') | Some(b'\t') => continue,
                        _ => break,
                    }
                }
            }
        }

        self.offset = end;
        Some(RawHeader {
            offset: start,
            line: start_line,
            text: &self.block[start..end],
        })
    }
}

/// Split a raw header into its name and value.
///
/// The name runs up to the first colon, which must come before the end of
/// the first line. Also returns the offset of the value within `raw`.
pub fn split_header(raw: &[u8]) -> Option<(&[u8], &[u8], usize)> {
    let colon = raw
        .iter()
        .position(|&b| b':' == b || b'\r' == b || b'\n' == b)?;
    if b':' != raw[colon] {
        return None;
    }

    Some((&raw[..colon], &raw[colon + 1..], colon + 1))
}

/// Strip the final line ending from `raw`.
pub fn trim_line_ending(raw: &[u8]) -> &[u8] {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    raw.strip_suffix(b"\r").unwrap_or(raw)
}

/// Return the unfolded text of an unstructured header value.
///
/// Leading spaces and tabs are skipped and every line ending is removed,
/// leaving the whitespace that followed it. Other bytes are kept as-is.
pub fn unfold(value: &[u8]) -> Vec<u8> {
    let start = value
        .iter()
        .position(|&b| b' ' != b && b'\t' != b)
        .unwrap_or(value.len());
    let value = trim_line_ending(&value[start..]);

    let mut out = Vec::with_capacity(value.len());
    for &b in value {
        if b'\n' != b {
            out.push(b);
        } else if Some(&b'\r') == out.last() {
            out.pop();
        }
    }

    out
}

/// Extract the date-time from a `Received` header, which is everything after
/// the last semicolon.
///
/// Returns `None` if there is no semicolon after the start of the value.
pub fn parse_received_date(value: &[u8]) -> Option<Vec<u8>> {
    let unfolded = unfold(value);
    let semi = unfolded.iter().rposition(|&b| b';' == b).filter(|&ix| ix > 0)?;
    Some(unfold(&unfolded[semi + 1..]))
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(Some(HeaderName::To), HeaderName::lookup(b"TO"));
        assert_eq!(
            Some(HeaderName::ContentTransferEncoding),
            HeaderName::lookup(b"Content-Transfer-Encoding")
        );
        assert_eq!(
            Some(HeaderName::XTrueDomain),
            HeaderName::lookup(b"X-TrueDomain")
        );
        assert_eq!(None, HeaderName::lookup(b"X-Mailer"));
        assert_eq!(None, HeaderName::lookup(b"To "));
    }

    #[test]
    fn test_header_iter() {
        let block = b"Subject: foo\r\n\tbar\r\nTo: x\r\n\r\n";
        let headers = HeaderIter::new(block).collect::<Vec<_>>();
        assert_eq!(
            vec![
                RawHeader {
                    offset: 0,
                    line: 0,
                    text: &b"Subject: foo\r\n\tbar\r\n"[..],
                },
                RawHeader {
                    offset: 20,
                    line: 2,
                    text: &b"To: x\r\n"[..],
                },
                RawHeader {
                    offset: 27,
                    line: 3,
                    text: &b"\r\n"[..],
                },
            ],
            headers
        );
    }

    #[test]
    fn test_split_header() {
        assert_eq!(
            Some((&b"Subject"[..], &b" foo\r\n"[..], 8)),
            split_header(b"Subject: foo\r\n")
        );
        assert_eq!(None, split_header(b"Subject foo\r\n"));
        assert_eq!(None, split_header(b"Subject\r\n: foo\r\n"));
    }

    #[test]
    fn test_unfold() {
        assert_eq!(b"foo", &unfold(b" foo\r\n")[..]);
        assert_eq!(b"foo bar", &unfold(b"\tfoo\r\n bar\r\n")[..]);
        assert_eq!(b"foo\tbar", &unfold(b"foo\n\tbar\n")[..]);
        assert_eq!(b"", &unfold(b" \r\n")[..]);
        assert_eq!(b"a\rb", &unfold(b"a\rb")[..]);
        assert_eq!(b"caf\xe9 \xff", &unfold(b" caf\xe9\r\n \xff\r\n")[..]);
    }

    #[test]
    fn test_parse_received_date() {
        assert_eq!(
            Some(b"Tue, 1 Sep 2020 12:00:00 +0000".to_vec()),
            parse_received_date(
                b" from a by b; id 42;\r\n Tue, 1 Sep 2020 12:00:00 +0000\r\n"
            )
        );
        assert_eq!(None, parse_received_date(b" from a by b\r\n"));
        assert_eq!(None, parse_received_date(b" ; 1 Sep 2020\r\n"));
    }

    proptest! {
        #[test]
        fn header_iter_covers_block(s in "[a-z: \t\r\n]{0,40}") {
            let total: usize = HeaderIter::new(s.as_bytes())
                .map(|h| h.text.len())
                .sum();
            prop_assert_eq!(s.len(), total);
        }
    }
}
