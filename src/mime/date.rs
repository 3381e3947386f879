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

//! RFC 2822 3.3 date/time syntax, including obsolete forms.
//!
//! In general, the obsolete forms allow CFWS between all terms, so we just
//! write that in the whole date/time definitions instead of the rather
//! arbitrary distribution the RFC uses.

use std::str;

use chrono::prelude::*;
use nom::*;

use super::lex::comment;

fn ascii_digit(b: u8) -> bool {
    b.is_ascii_digit()
}

fn ascii_alpha(b: u8) -> bool {
    b.is_ascii_alphabetic()
}

fn parse_u32(s: &[u8]) -> Option<u32> {
    str::from_utf8(s).ok()?.parse().ok()
}

named!(fws<()>, map!(is_a!(" \t\r\n"), |_| ()));
named!(cfws<()>, map!(many1_count!(alt!(fws | comment)), |_| ()));

named!(
    day<u32>,
    map_opt!(take_while_m_n!(1, 2, ascii_digit), parse_u32)
);

named!(
    two_digit<u32>,
    map_opt!(take_while_m_n!(2, 2, ascii_digit), parse_u32)
);

named!(
    year<i32>,
    map_opt!(take_while_m_n!(2, 4, ascii_digit), |s: &[u8]| {
        let mut y = parse_u32(s)? as i32;
        // Y2K compliance workarounds described by RFC 2822 4.3
        if s.len() == 2 && y < 50 {
            y += 2000;
        } else if s.len() < 4 {
            y += 1900;
        }
        Some(y)
    })
);

named!(
    month<u32>,
    alt!(
        map!(tag_no_case!("jan"), |_| 1)
            | map!(tag_no_case!("feb"), |_| 2)
            | map!(tag_no_case!("mar"), |_| 3)
            | map!(tag_no_case!("apr"), |_| 4)
            | map!(tag_no_case!("may"), |_| 5)
            | map!(tag_no_case!("jun"), |_| 6)
            | map!(tag_no_case!("jul"), |_| 7)
            | map!(tag_no_case!("aug"), |_| 8)
            | map!(tag_no_case!("sep"), |_| 9)
            | map!(tag_no_case!("oct"), |_| 10)
            | map!(tag_no_case!("nov"), |_| 11)
            | map!(tag_no_case!("dec"), |_| 12)
    )
);

// (year, month, day)
named!(
    date<(i32, u32, u32)>,
    map!(
        tuple!(
            terminated!(day, opt!(cfws)),
            terminated!(month, opt!(cfws)),
            terminated!(year, opt!(cfws))
        ),
        |(d, m, y)| (y, m, d)
    )
);

// Seconds are optional
named!(
    time_of_day<(u32, u32, u32)>,
    map!(
        tuple!(
            terminated!(
                two_digit,
                tuple!(opt!(cfws), char!(':'), opt!(cfws))
            ),
            two_digit,
            opt!(preceded!(
                tuple!(opt!(cfws), char!(':'), opt!(cfws)),
                two_digit
            ))
        ),
        |(h, m, s)| (h, m, s.unwrap_or(0))
    )
);

// Offset east of UTC, in seconds
named!(
    numeric_zone<i32>,
    map_opt!(
        pair!(
            alt!(char!('+') | char!('-')),
            take_while_m_n!(4, 4, ascii_digit)
        ),
        |(sign, s)| {
            let n = parse_u32(s)?;
            let secs = (n / 100 * 3600 + n % 100 * 60) as i32;
            Some(if '-' == sign { -secs } else { secs })
        }
    )
);

const HOUR: i32 = 3600;

named!(
    zone<i32>,
    alt!(
        numeric_zone |
        // UTC
        map!(
            alt!(
                tag_no_case!("utc") | tag_no_case!("ut") | tag_no_case!("gmt")
            ),
            |_| 0
        ) |
        // US time zones
        map!(tag_no_case!("edt"), |_| -4 * HOUR) |
        map!(alt!(tag_no_case!("est") | tag_no_case!("cdt")), |_| -5 * HOUR) |
        map!(alt!(tag_no_case!("cst") | tag_no_case!("mdt")), |_| -6 * HOUR) |
        map!(alt!(tag_no_case!("mst") | tag_no_case!("pdt")), |_| -7 * HOUR) |
        map!(tag_no_case!("pst"), |_| -8 * HOUR) |
        // Military and unrecognised zones. RFC 2822 indicates that the
        // military zones were so poorly defined that they must be treated as
        // 0 unless additional information is available.
        map!(take_while1!(ascii_alpha), |_| 0)
    )
);

// The day of week is ignored; it is redundant with the date.
named!(
    day_of_week<()>,
    map!(
        tuple!(take_while1!(ascii_alpha), opt!(cfws), char!(',')),
        |_| ()
    )
);

named!(
    date_time<Option<DateTime<FixedOffset>>>,
    map!(
        tuple!(
            opt!(cfws),
            opt!(terminated!(day_of_week, opt!(cfws))),
            date,
            terminated!(time_of_day, opt!(cfws)),
            opt!(zone)
        ),
        |(_, _, (year, month, day), (hour, minute, second), zone)| {
            // Leap seconds can't be represented here
            let second = second.min(59);
            let naive = NaiveDate::from_ymd_opt(year, month, day)?
                .and_hms_opt(hour, minute, second)?;
            FixedOffset::east_opt(zone.unwrap_or(0))?
                .from_local_datetime(&naive)
                .single()
        }
    )
);

/// Parse an RFC 2822 date-time, keeping the zone it was written in.
pub fn parse_datetime(s: &[u8]) -> Option<DateTime<FixedOffset>> {
    date_time(s).ok().and_then(|(_, dt)| dt)
}

/// Parse an RFC 2822 date-time as an absolute time.
pub fn time_from_rfc822(s: &[u8]) -> Option<DateTime<Utc>> {
    parse_datetime(s).map(|dt| dt.with_timezone(&Utc))
}

/// Parse an RFC 2822 date-time and return the calendar day as written,
/// without regard to the zone.
pub fn day_from_rfc822(s: &[u8]) -> Option<NaiveDate> {
    parse_datetime(s).map(|dt| dt.naive_local().date())
}
