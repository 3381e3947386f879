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

use super::strings::ItemWriter;
use crate::mime::charset::Charsets;
use crate::mime::model::Address;

/// Write `addrs` as plain text suitable for substring searches.
///
/// Addresses are rendered as `Name <route:mailbox@domain>` and joined with
/// commas. Groups become `name:` and `;`, with no comma after the colon.
/// Display names are MIME-decoded; the address itself is written as raw
/// bytes, ASCII-lower-cased.
pub fn write_search_addresses(
    w: &mut ItemWriter,
    addrs: &[Address],
    charsets: &dyn Charsets,
) {
    let mut prev = false;

    for addr in addrs {
        if addr.domain.is_none() {
            if let Some(ref group) = addr.mailbox {
                if prev {
                    w.byte(b',');
                }
                w.verbatim(charsets.decode_mime_header(group).as_bytes());
                w.byte(b':');
                prev = false;
            } else {
                w.byte(b';');
                prev = true;
            }
            continue;
        }

        if prev {
            w.byte(b',');
        }

        if let Some(ref name) = addr.name {
            w.verbatim(charsets.decode_mime_header(name).as_bytes());
            w.byte(b' ');
        }

        w.byte(b'<');
        if let Some(ref route) = addr.route {
            w.verbatim(&route.to_ascii_lowercase());
            w.byte(b':');
        }
        if let Some(ref mailbox) = addr.mailbox {
            w.verbatim(&mailbox.to_ascii_lowercase());
        }
        w.byte(b'@');
        if let Some(ref domain) = addr.domain {
            w.verbatim(&domain.to_ascii_lowercase());
        }
        w.byte(b'>');
        prev = true;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mime::address::parse_address_list;
    use crate::mime::charset::StandardCharsets;

    fn search_bytes(header: &[u8]) -> Vec<u8> {
        let mut addrs = Vec::new();
        parse_address_list(header, &mut addrs);
        let mut w = ItemWriter::new();
        write_search_addresses(&mut w, &addrs, &StandardCharsets);
        w.into_inner()
    }

    fn search(header: &[u8]) -> String {
        String::from_utf8(search_bytes(header)).unwrap()
    }

    #[test]
    fn plain_addresses() {
        assert_eq!("<alice@example.com>", search(b"Alice@Example.COM"));
        assert_eq!(
            "Alice <alice@example.com>,Bob <bob@example.org>",
            search(b"Alice <alice@example.com>, Bob <BOB@example.org>")
        );
    }

    #[test]
    fn encoded_names() {
        assert_eq!(
            "Caf\u{e9} <cafe@example.com>",
            search(b"=?utf-8?q?Caf=C3=A9?= <cafe@example.com>")
        );
    }

    #[test]
    fn eight_bit_address() {
        assert_eq!(
            &b"<caf\xe9@example.com>"[..],
            &search_bytes(b"CAF\xe9@Example.com")[..]
        );
    }

    #[test]
    fn groups() {
        assert_eq!(
            "friends:<a@example.com>,<b@example.com>;,<c@example.com>",
            search(
                b"friends: a@example.com, b@example.com;, c@example.com"
            )
        );
    }

    #[test]
    fn empty() {
        assert_eq!("", search(b""));
    }
}
