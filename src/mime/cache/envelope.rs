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

//! The IMAP `ENVELOPE` structure, as stored in the cache.

use super::strings::ItemWriter;
use crate::mime::model::{Address, Body};

/// The number of fields in an envelope.
pub const ENVELOPE_FIELDS: usize = 10;

/// Write the envelope of `body`.
///
/// `Sender` and `Reply-To` default to `From` when absent.
pub fn write_envelope(w: &mut ItemWriter, body: &Body) {
    w.byte(b'(');
    w.nstring(body.date.as_deref());
    w.byte(b' ');
    w.nstring(body.subject.as_deref());
    w.byte(b' ');
    write_addresses(w, &body.from);
    w.byte(b' ');
    write_addresses(w, or_from(&body.sender, &body.from));
    w.byte(b' ');
    write_addresses(w, or_from(&body.reply_to, &body.from));
    w.byte(b' ');
    write_addresses(w, &body.to);
    w.byte(b' ');
    write_addresses(w, &body.cc);
    w.byte(b' ');
    write_addresses(w, &body.bcc);
    w.byte(b' ');
    w.nstring(body.in_reply_to.as_deref());
    w.byte(b' ');
    w.nstring(body.message_id.as_deref());
    w.byte(b')');
}

fn or_from<'a>(addrs: &'a [Address], from: &'a [Address]) -> &'a [Address] {
    if addrs.is_empty() {
        from
    } else {
        addrs
    }
}

fn write_addresses(w: &mut ItemWriter, addrs: &[Address]) {
    if addrs.is_empty() {
        w.nil();
        return;
    }

    w.byte(b'(');
    for addr in addrs {
        w.byte(b'(');
        w.nstring(addr.name.as_deref());
        w.byte(b' ');
        w.nstring(addr.route.as_deref());
        w.byte(b' ');
        w.nstring(addr.mailbox.as_deref());
        w.byte(b' ');
        w.nstring(addr.domain.as_deref());
        w.byte(b')');
    }
    w.byte(b')');
}

/// Split a cached envelope into its top-level tokens.
///
/// Each token is `None` for `NIL`, the content of a quoted string or literal,
/// or, for an address list, everything between the outer parentheses. The
/// outer parentheses of the envelope itself are optional. At most
/// `ENVELOPE_FIELDS` tokens are returned.
///
/// Junk between tokens is skipped. A truncated envelope yields whatever
/// tokens could be found.
pub fn parse_cached_envelope(env: &[u8]) -> Vec<Option<Vec<u8>>> {
    let env = env
        .strip_prefix(b"(")
        .map(|e| e.strip_suffix(b")").unwrap_or(e))
        .unwrap_or(env);

    let mut tokens = Vec::new();
    let mut s = env;
    while !s.is_empty() && tokens.len() < ENVELOPE_FIELDS {
        match s[0] {
            b'(' => {
                let (inner, rest) = split_list(s);
                tokens.push(Some(inner.to_vec()));
                s = rest;
            }
            b'"' | b'{' | b'N' | b'n' => match read_nstring(s) {
                Some((value, rest)) => {
                    tokens.push(value.map(<[u8]>::to_vec));
                    s = rest;
                }
                None => break,
            },
            _ => s = &s[1..],
        }
    }

    tokens
}

/// Split a parenthesised list off the front of `s`, returning its content
/// and whatever follows the closing parenthesis.
fn split_list(s: &[u8]) -> (&[u8], &[u8]) {
    let mut depth = 0;
    let mut ix = 0;
    while ix < s.len() {
        match s[ix] {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if 0 == depth {
                    return (&s[1..ix], &s[ix + 1..]);
                }
            }
            b'"' | b'{' => match read_nstring(&s[ix..]) {
                Some((_, rest)) => {
                    ix = s.len() - rest.len();
                    continue;
                }
                None => break,
            },
            _ => (),
        }
        ix += 1;
    }

    (&s[1.min(s.len())..], &s[s.len()..])
}

/// Read a `NIL`, quoted string, or literal from the front of `s`.
///
/// Quoted strings are returned raw; the cache never contains backslash
/// escapes.
fn read_nstring(s: &[u8]) -> Option<(Option<&[u8]>, &[u8])> {
    match *s.first()? {
        b'N' | b'n' => {
            if s.len() >= 3 && s[..3].eq_ignore_ascii_case(b"NIL") {
                Some((None, &s[3..]))
            } else {
                None
            }
        }
        b'"' => {
            let mut ix = 1;
            while ix < s.len() && b'"' != s[ix] {
                if b'\\' == s[ix] {
                    ix += 1;
                }
                ix += 1;
            }
            let end = ix.min(s.len());
            Some((Some(&s[1..end]), &s[(end + 1).min(s.len())..]))
        }
        b'{' => {
            let close = s.iter().position(|&b| b'}' == b)?;
            let len = std::str::from_utf8(&s[1..close])
                .ok()?
                .parse::<usize>()
                .ok()?;
            let start = close + 3;
            let end = start.checked_add(len)?;
            if end > s.len() {
                return None;
            }
            Some((Some(&s[start..end]), &s[end..]))
        }
        _ => None,
    }
}

/// Parse one cached address, `(name route mailbox domain)`, from the front of
/// `s`, returning it and the remaining input.
pub fn parse_env_address(s: &[u8]) -> Option<(Address, &[u8])> {
    let s = s.strip_prefix(b"(")?;
    let (name, s) = read_nstring(s)?;
    let (route, s) = read_nstring(s.strip_prefix(b" ")?)?;
    let (mailbox, s) = read_nstring(s.strip_prefix(b" ")?)?;
    let (domain, s) = read_nstring(s.strip_prefix(b" ")?)?;
    let s = s.strip_prefix(b")")?;

    Some((
        Address {
            name: name.map(<[u8]>::to_vec),
            route: route.map(<[u8]>::to_vec),
            mailbox: mailbox.map(<[u8]>::to_vec),
            domain: domain.map(<[u8]>::to_vec),
        },
        s,
    ))
}

/// Parse all the addresses in the content of a cached address list, as
/// returned by `parse_cached_envelope`.
pub fn parse_env_addresses(mut s: &[u8]) -> Vec<Address> {
    let mut addresses = Vec::new();
    while let Some((address, rest)) = parse_env_address(s) {
        addresses.push(address);
        s = rest;
    }
    addresses
}
