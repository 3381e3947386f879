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

//! The RFC 2822 address-list grammar, used for `From`, `Sender`,
//! `Reply-To`, `To`, `Cc`, and `Bcc`.
//!
//! Parsing runs over the unfolded header value, so line endings never need to
//! be considered here.

use std::borrow::Cow;

use nom::*;

use super::header::unfold;
use super::lex::comment;
use super::model::Address;

/// The domain given to addresses which consist of only a local part.
pub const UNSPECIFIED_DOMAIN: &str = "unspecified-domain";

type Words<'a> = Vec<Cow<'a, [u8]>>;

// RFC 2822 3.2.2 "quoted-pair", including the 8-bit clean "obsolete" syntax
named!(quoted_pair, preceded!(char!('\\'), take!(1)));

// RFC 2822 3.2.3 "Folding white space". The value is already unfolded, so
// this is just plain whitespace.
named!(fws<()>, map!(is_a!(" \t\r\n"), |_| ()));

// RFC 2822 3.2.3 "Comment or folding white space".
// Unlike the RFC, this never matches the empty string; use `opt!(cfws)`.
// `comment` is not written with combinators since comments nest.
named!(cfws<()>, map!(many1_count!(alt!(fws | comment)), |_| ()));

// RFC 2822 3.2.4 "Atom text"
// Amended by RFC 6532 to include all non-ASCII characters
fn is_atext(ch: u8) -> bool {
    ch.is_ascii_alphanumeric()
        || b"!#$%&'*+-/=?^_`{|}~".contains(&ch)
        || ch >= 0x80
}

named!(atext, take_while1!(is_atext));

// RFC 2822 3.2.4 "Atom"
named!(atom, delimited!(opt!(cfws), atext, opt!(cfws)));

// RFC 2822 3.2.5 "Quoted string"
named!(
    quoted_string<Cow<[u8]>>,
    delimited!(
        pair!(opt!(cfws), char!('"')),
        fold_many0!(
            |i: &[u8]| alt!(i, is_not!("\\\"") | quoted_pair),
            Cow::Borrowed(&[] as &[u8]),
            |mut acc: Cow<[u8]>, item: &[u8]| {
                if acc.is_empty() {
                    acc = Cow::Borrowed(item);
                } else {
                    acc.to_mut().extend_from_slice(item);
                }
                acc
            }
        ),
        pair!(char!('"'), opt!(cfws))
    )
);

// RFC 2822 3.2.6 "word"
named!(
    word<Cow<[u8]>>,
    alt!(map!(atom, Cow::Borrowed) | quoted_string)
);

// Part of the `obs-phrase` grammar: the '.' that many agents put unquoted
// into display names.
named!(
    obs_dot<Cow<[u8]>>,
    terminated!(
        map!(char!('.'), |_| Cow::Borrowed(b"." as &[u8])),
        opt!(cfws)
    )
);

// RFC 2822 3.2.6 "phrase", plus the "obsolete phrase" syntax
named!(
    phrase<Words>,
    map!(pair!(word, many0!(alt!(word | obs_dot))), |(
        head,
        mut tail,
    )| {
        tail.insert(0, head);
        tail
    })
);

// RFC 2822 3.4.1 local part of address, in the `obs-local-part` form which
// encompasses the others.
named!(local_part<Words>, separated_nonempty_list!(char!('.'), word));

// RFC 2822 4.4 obsolete domain format
named!(
    obs_domain<Words>,
    separated_nonempty_list!(char!('.'), map!(atom, Cow::Borrowed))
);

// RFC 2822 3.4.1 domain literal
named!(
    domain_literal<Vec<u8>>,
    map!(
        delimited!(
            pair!(opt!(cfws), char!('[')),
            fold_many0!(
                |i: &[u8]| alt!(i, is_not!("[]\\") | quoted_pair),
                vec![b'['],
                |mut acc: Vec<u8>, item: &[u8]| {
                    acc.extend_from_slice(item);
                    acc
                }
            ),
            pair!(char!(']'), opt!(cfws))
        ),
        |mut res: Vec<u8>| {
            res.push(b']');
            res
        }
    )
);

// RFC 2822 3.4.1 domain
named!(
    domain<Words>,
    alt!(obs_domain | map!(domain_literal, |v| vec![Cow::Owned(v)]))
);

struct AddrSpec<'a> {
    local: Words<'a>,
    domain: Option<Words<'a>>,
}

// RFC 2822 3.4.1 address specification. The domain is optional here so that
// bare local parts can be accepted.
named!(
    addr_spec<AddrSpec>,
    map!(
        pair!(local_part, opt!(preceded!(char!('@'), domain))),
        |(local, domain)| AddrSpec { local, domain }
    )
);

// RFC 2822 4.4 obsolete routing information
named!(
    obs_route<Vec<Words>>,
    terminated!(
        separated_nonempty_list!(
            many1_count!(tuple!(opt!(cfws), char!(','), opt!(cfws))),
            preceded!(pair!(opt!(cfws), char!('@')), domain)
        ),
        char!(':')
    )
);

struct MailboxSpec<'a> {
    name: Words<'a>,
    route: Option<Vec<Words<'a>>>,
    addr: AddrSpec<'a>,
}

// RFC 2822 3.4 angle-delimited address, including the 4.4 obsolete routing
// information.
named!(
    angle_addr<(Option<Vec<Words>>, AddrSpec)>,
    delimited!(
        pair!(opt!(cfws), char!('<')),
        pair!(opt!(obs_route), addr_spec),
        pair!(char!('>'), opt!(cfws))
    )
);

// RFC 2822 3.4 mailbox
named!(
    mailbox<MailboxSpec>,
    alt!(
        map!(pair!(opt!(phrase), angle_addr), |(name, (route, addr))| {
            MailboxSpec {
                name: name.unwrap_or_default(),
                route,
                addr,
            }
        }) | map!(addr_spec, |addr| MailboxSpec {
            name: vec![],
            route: None,
            addr,
        })
    )
);

// Used in obsolete list syntax
named!(
    obs_list_delim<()>,
    map!(
        many1_count!(tuple!(opt!(cfws), char!(','), opt!(cfws))),
        |_| ()
    )
);

// RFC 2822 3.4 mailbox list, including 4.4 obsolete syntax
named!(
    mailbox_list<Vec<MailboxSpec>>,
    delimited!(
        opt!(obs_list_delim),
        separated_nonempty_list!(obs_list_delim, mailbox),
        opt!(obs_list_delim)
    )
);

enum AddressSpec<'a> {
    Mailbox(MailboxSpec<'a>),
    Group(Words<'a>, Vec<MailboxSpec<'a>>),
}

// RFC 2822 3.4 group. The terminating ';' is frequently missing, so it is
// optional here.
named!(
    group<AddressSpec>,
    map!(
        tuple!(
            terminated!(phrase, char!(':')),
            opt!(cfws),
            opt!(mailbox_list),
            opt!(cfws),
            opt!(char!(';')),
            opt!(cfws)
        ),
        |(name, _, boxes, _, _, _)| {
            AddressSpec::Group(name, boxes.unwrap_or_default())
        }
    )
);

// RFC 2822 3.4 address
named!(
    address<AddressSpec>,
    alt!(group | map!(mailbox, AddressSpec::Mailbox))
);

// RFC 2822 3.4 address list, including 4.4 obsolete syntax
named!(
    address_list<Vec<AddressSpec>>,
    delimited!(
        opt!(obs_list_delim),
        separated_nonempty_list!(obs_list_delim, address),
        opt!(obs_list_delim)
    )
);

fn join(parts: &[Cow<[u8]>], delim: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for (ix, part) in parts.iter().enumerate() {
        if ix > 0 {
            out.extend_from_slice(delim);
        }
        out.extend_from_slice(part);
    }
    out
}

/// Assemble the words of a phrase into a display name.
///
/// Words are separated by single spaces, except that a `.` is attached to the
/// word before it.
fn display_name(words: &[Cow<[u8]>]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    for word in words {
        if !out.is_empty() && b"." != &**word {
            out.push(b' ');
        }
        out.extend_from_slice(word);
    }

    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn to_address(mailbox: MailboxSpec) -> Address {
    Address {
        name: display_name(&mailbox.name),
        route: mailbox.route.map(|route| {
            let mut out = Vec::new();
            for (ix, domain) in route.iter().enumerate() {
                if ix > 0 {
                    out.push(b',');
                }
                out.push(b'@');
                out.extend_from_slice(&join(domain, b"."));
            }
            out
        }),
        mailbox: Some(join(&mailbox.addr.local, b".")),
        domain: Some(
            mailbox
                .addr
                .domain
                .map(|d| join(&d, b"."))
                .unwrap_or_else(|| UNSPECIFIED_DOMAIN.as_bytes().to_vec()),
        ),
    }
}

/// Parse the raw value of an address header, appending what was found to
/// `dst`.
///
/// Groups are flattened into a start marker, the members, and an end marker.
/// Anything after the first syntax error is discarded.
pub fn parse_address_list(value: &[u8], dst: &mut Vec<Address>) {
    let unfolded = unfold(value);
    let addresses = match address_list(&unfolded) {
        Ok((_, addresses)) => addresses,
        Err(_) => return,
    };

    for address in addresses {
        match address {
            AddressSpec::Mailbox(mailbox) => dst.push(to_address(mailbox)),
            AddressSpec::Group(name, members) => {
                dst.push(Address {
                    mailbox: Some(join(&name, b" ")),
                    ..Address::default()
                });
                dst.extend(members.into_iter().map(to_address));
                dst.push(Address::default());
            }
        }
    }
}
