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

//! Parsers for the MIME structured fields: `Content-Type`,
//! `Content-Disposition`, `Content-Transfer-Encoding`, and
//! `Content-Language`, including RFC 2231 parameter continuations.
//!
//! None of these report errors. A value which cannot be understood is simply
//! ignored so that the caller's default applies.

use std::io::Write as _;

use super::lex::*;
use super::model::Param;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentType {
    pub typ: String,
    pub subtype: String,
    pub params: Vec<Param>,
}

/// Parse the value of a `Content-Type` header.
pub fn parse_content_type(value: &[u8]) -> Option<ContentType> {
    let s = skip_rfc822_space(value)?;
    let (typ, s) = nonempty_token(s, |b| b'/' == b || b'(' == b)?;

    let s = skip_rfc822_space(s)?;
    if b'/' != s[0] {
        return None;
    }

    let s = skip_rfc822_space(&s[1..])?;
    let (subtype, s) = nonempty_token(s, |b| b';' == b || b'(' == b)?;

    let params = params_after(s)?;

    Some(ContentType {
        typ: to_upper(typ),
        subtype: to_upper(subtype),
        params,
    })
}

/// Parse the value of a `Content-Disposition` header, returning the
/// upper-cased disposition and its parameters.
pub fn parse_disposition(value: &[u8]) -> Option<(String, Vec<Param>)> {
    let s = skip_rfc822_space(value)?;
    let (disposition, s) = nonempty_token(s, |b| b';' == b || b'(' == b)?;
    let params = params_after(s)?;
    Some((to_upper(disposition), params))
}

/// Handle whatever follows the main token(s) of a `Content-Type` or
/// `Content-Disposition`: either nothing, or `;` and a parameter list.
fn params_after(s: &[u8]) -> Option<Vec<Param>> {
    match skip_rfc822_space(s) {
        None => Some(Vec::new()),
        Some(rest) if b';' == rest[0] => {
            let mut params = parse_params(&rest[1..]);
            fold_params(&mut params);
            Some(params)
        }
        Some(_) => None,
    }
}

/// Parse the value of a `Content-Transfer-Encoding` header.
///
/// The value must be a single token.
pub fn parse_encoding(value: &[u8]) -> Option<String> {
    let s = skip_rfc822_space(value)?;
    let (encoding, rest) = nonempty_token(s, |b| b'(' == b)?;
    if skip_rfc822_space(rest).is_some() {
        return None;
    }

    Some(to_upper(encoding))
}

/// Parse a `;`-separated list of `attribute=value` pairs.
///
/// Parsing stops at the first syntax error, but everything parsed before
/// that point is kept. Attributes are upper-cased.
pub fn parse_params(value: &[u8]) -> Vec<Param> {
    let mut params = Vec::new();
    let mut s = value;

    loop {
        let rest = match skip_rfc822_space(s) {
            Some(rest) => rest,
            None => break,
        };

        let (attribute, rest) =
            match nonempty_token(rest, |b| b'=' == b || b'(' == b) {
                Some(t) => t,
                None => break,
            };

        let rest = match skip_rfc822_space(rest) {
            Some(rest) if b'=' == rest[0] => &rest[1..],
            _ => break,
        };
        let rest = match skip_rfc822_space(rest) {
            Some(rest) => rest,
            None => break,
        };

        let (value, rest) = if b'"' == rest[0] {
            match quoted_value(&rest[1..]) {
                Some(v) => v,
                None => break,
            }
        } else {
            match token(rest, |b| b';' == b || b'(' == b) {
                Some((v, rest)) => (v.to_vec(), rest),
                None => break,
            }
        };

        let next = match skip_rfc822_space(rest) {
            None => None,
            Some(rest) if b';' == rest[0] => Some(&rest[1..]),
            Some(_) => break,
        };

        params.push(Param::new(to_upper(attribute), value));

        match next {
            Some(next) => s = next,
            None => break,
        }
    }

    params
}

/// Decode the body of a quoted parameter value, starting just after the
/// opening quote. Returns the unquoted value and the input after the closing
/// quote.
fn quoted_value(s: &[u8]) -> Option<(Vec<u8>, &[u8])> {
    let mut value = Vec::new();
    let mut i = 0;

    loop {
        match *s.get(i)? {
            b'"' => return Some((value, &s[i + 1..])),
            b'\\' => {
                value.push(*s.get(i + 1)?);
                i += 2;
            }
            b'\r' => {
                // Only a fold is permitted
                if Some(&b'\n') != s.get(i + 1)
                    || !matches!(s.get(i + 2), Some(b' ') | Some(b'\t'))
                {
                    return None;
                }
                i += 2;
            }
            b => {
                value.push(b);
                i += 1;
            }
        }
    }
}

/// The highest RFC 2231 section number that will be folded.
const MAX_CONTINUATIONS: u32 = 99;

/// Fold RFC 2231 parameter continuations (`name*0`, `name*1*`, ...) into
/// single parameters.
///
/// The folded parameter takes the place of its `*0` section and is named
/// `name`, or `name*` if its value is in the extended (percent-encoded)
/// form. If some sections are simple and others extended, the simple ones
/// are percent-encoded so that the whole value is extended.
pub fn fold_params(params: &mut Vec<Param>) {
    let mut ix = 0;
    while ix < params.len() {
        let (base, mut extended) = {
            let attribute = &params[ix].attribute;
            match attribute.find('*') {
                Some(star) if "*0" == &attribute[star..] => {
                    (attribute[..star].to_owned(), false)
                }
                Some(star) if "*0*" == &attribute[star..] => {
                    (attribute[..star].to_owned(), true)
                }
                _ => {
                    ix += 1;
                    continue;
                }
            }
        };

        let mut value = std::mem::take(&mut params[ix].value);

        for section in 1..=MAX_CONTINUATIONS {
            let simple_name = format!("{}*{}", base, section);
            let extended_name = format!("{}*{}*", base, section);

            let found = params.iter().position(|p| {
                p.attribute.eq_ignore_ascii_case(&simple_name)
                    || p.attribute.eq_ignore_ascii_case(&extended_name)
            });
            let cix = match found {
                Some(cix) => cix,
                None => break,
            };

            let continuation = params.remove(cix);
            if cix < ix {
                ix -= 1;
            }

            let continuation_extended = continuation.attribute.ends_with('*');
            match (extended, continuation_extended) {
                (false, false) | (true, true) => {
                    value.extend_from_slice(&continuation.value)
                }
                (true, false) => {
                    percent_encode_into(&mut value, &continuation.value)
                }
                (false, true) => {
                    // The value so far has no charset or language; give it
                    // empty ones so the whole thing can be extended.
                    let mut ext = b"''".to_vec();
                    percent_encode_into(&mut ext, &value);
                    ext.extend_from_slice(&continuation.value);
                    value = ext;
                    extended = true;
                }
            }
        }

        let param = &mut params[ix];
        param.value = value;
        param.attribute = if extended { format!("{}*", base) } else { base };
        ix += 1;
    }
}

fn percent_encode_into(dst: &mut Vec<u8>, src: &[u8]) {
    for &b in src {
        if b <= b' ' || b >= 0x7F || b'*' == b || b'\'' == b || b'%' == b
            || is_tspecial(b)
        {
            // Writing to a Vec cannot fail
            let _ = write!(dst, "%{:02X}", b);
        } else {
            dst.push(b);
        }
    }
}

/// Parse the value of a `Content-Language` header into a list of upper-cased
/// language tags.
///
/// Parsing stops at the first invalid item, keeping the ones before it.
pub fn parse_language(value: &[u8]) -> Vec<String> {
    let mut languages = Vec::new();
    let mut s = value;

    loop {
        let rest = match skip_rfc822_space(s) {
            Some(rest) => rest,
            None => break,
        };

        let end = rest
            .iter()
            .position(|&b| is_space(b) || b',' == b || b'(' == b)
            .unwrap_or(rest.len());
        let tag = &rest[..end];
        if tag.is_empty()
            || !tag.iter().all(|&b| b'-' == b || b.is_ascii_alphabetic())
        {
            break;
        }

        let next = match skip_rfc822_space(&rest[end..]) {
            None => None,
            Some(rest) if b',' == rest[0] => Some(&rest[1..]),
            Some(_) => break,
        };

        languages.push(to_upper(tag));

        match next {
            Some(next) => s = next,
            None => break,
        }
    }

    languages
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn p(attribute: &str, value: &str) -> Param {
        Param::new(attribute, value)
    }

    #[test]
    fn test_parse_content_type() {
        assert_eq!(
            Some(ContentType {
                typ: "TEXT".to_owned(),
                subtype: "PLAIN".to_owned(),
                params: vec![],
            }),
            parse_content_type(b"text/plain\r\n")
        );

        assert_eq!(
            Some(ContentType {
                typ: "MULTIPART".to_owned(),
                subtype: "MIXED".to_owned(),
                params: vec![p("BOUNDARY", "foo bar"), p("X", "y")],
            }),
            parse_content_type(
                b" (comment) Multipart / Mixed;\r\n\
                  \tboundary=\"foo bar\"; x=y\r\n"
            )
        );

        assert_eq!(None, parse_content_type(b"text\r\n"));
        assert_eq!(None, parse_content_type(b"text/\r\n"));
        assert_eq!(None, parse_content_type(b"/plain\r\n"));
        assert_eq!(None, parse_content_type(b"te@xt/plain\r\n"));
        assert_eq!(None, parse_content_type(b"text/plain garbage\r\n"));
        assert_eq!(None, parse_content_type(b"\r\n"));
    }

    #[test]
    fn test_parse_disposition() {
        assert_eq!(
            Some((
                "ATTACHMENT".to_owned(),
                vec![p("FILENAME", "foo.txt")]
            )),
            parse_disposition(b"attachment; filename=\"foo.txt\"\r\n")
        );
        assert_eq!(
            Some(("INLINE".to_owned(), vec![])),
            parse_disposition(b"inline\r\n")
        );
        assert_eq!(None, parse_disposition(b"inline x\r\n"));
    }

    #[test]
    fn test_parse_encoding() {
        assert_eq!(Some("BASE64".to_owned()), parse_encoding(b" base64\r\n"));
        assert_eq!(
            Some("7BIT".to_owned()),
            parse_encoding(b"7bit (plain)\r\n")
        );
        assert_eq!(None, parse_encoding(b"7bit 8bit\r\n"));
        assert_eq!(None, parse_encoding(b"\r\n"));
        assert_eq!(None, parse_encoding(b"x;y\r\n"));
    }

    #[test]
    fn test_parse_params() {
        assert_eq!(
            vec![p("A", "b"), p("C", "d e"), p("F", "")],
            parse_params(b"a=b; c = \"d e\" ;f=;\r\n")
        );
        assert_eq!(
            vec![p("A", "q\"uote")],
            parse_params(b"a=\"q\\\"uote\"\r\n")
        );
        assert_eq!(
            vec![p("A", "fold ed")],
            parse_params(b"a=\"fold\r\n ed\"\r\n")
        );
        // Errors keep what came before
        assert_eq!(vec![p("A", "b")], parse_params(b"a=b; c\r\n"));
        assert_eq!(vec![p("A", "b")], parse_params(b"a=b; c=\"d\r\n"));
        assert_eq!(vec![p("A", "b")], parse_params(b"a=b; c=d e\r\n"));
        assert_eq!(Vec::<Param>::new(), parse_params(b"=b\r\n"));
    }

    #[test]
    fn fold_simple_continuations() {
        let mut params = parse_params(b"foo*0=A; foo*1=B; foo*2=C\r\n");
        fold_params(&mut params);
        assert_eq!(vec![p("FOO", "ABC")], params);
    }

    #[test]
    fn fold_out_of_order_continuations() {
        let mut params =
            parse_params(b"foo*1=B; x=y; foo*0=A; bar=baz; foo*2=C\r\n");
        fold_params(&mut params);
        assert_eq!(
            vec![p("X", "y"), p("FOO", "ABC"), p("BAR", "baz")],
            params
        );
    }

    #[test]
    fn fold_extended_continuations() {
        let mut params = parse_params(b"foo*0*=''en; foo*1*=abc\r\n");
        fold_params(&mut params);
        assert_eq!(vec![p("FOO*", "''enabc")], params);

        // Extended sections are joined as they stand, without undoing their
        // percent-encoding.
        let mut params = parse_params(b"foo*0*=%27%27en; foo*1*=abc\r\n");
        fold_params(&mut params);
        assert_eq!(vec![p("FOO*", "%27%27enabc")], params);
    }

    #[test]
    fn fold_mixed_continuations() {
        let mut params =
            parse_params(b"foo*0*=utf-8''a%20b; foo*1=\"c d\"\r\n");
        fold_params(&mut params);
        assert_eq!(vec![p("FOO*", "utf-8''a%20bc%20d")], params);

        let mut params = parse_params(b"foo*0=\"a b\"; foo*1*=%41\r\n");
        fold_params(&mut params);
        assert_eq!(vec![p("FOO*", "''a%20b%41")], params);

        let mut params =
            parse_params(b"foo*0=\"caf\xe9\"; foo*1*=%41\r\n");
        fold_params(&mut params);
        assert_eq!(vec![p("FOO*", "''caf%E9%41")], params);
    }

    #[test]
    fn eight_bit_values_are_kept() {
        assert_eq!(
            vec![Param::new("NAME", &b"caf\xe9.txt"[..])],
            parse_params(b"name=\"caf\xe9.txt\"\r\n")
        );
    }

    #[test]
    fn fold_stops_at_gap() {
        let mut params = parse_params(b"foo*0=A; foo*2=C\r\n");
        fold_params(&mut params);
        assert_eq!(vec![p("FOO", "A"), p("FOO*2", "C")], params);
    }

    #[test]
    fn unsectioned_params_are_untouched() {
        let mut params = parse_params(b"foo*=x; bar*1=y\r\n");
        fold_params(&mut params);
        assert_eq!(vec![p("FOO*", "x"), p("BAR*1", "y")], params);
    }

    #[test]
    fn test_parse_language() {
        assert_eq!(
            vec!["EN-US".to_owned(), "DE".to_owned()],
            parse_language(b"en-US, de\r\n")
        );
        assert_eq!(vec!["EN".to_owned()], parse_language(b"en, d3\r\n"));
        assert_eq!(Vec::<String>::new(), parse_language(b"\r\n"));
        assert_eq!(Vec::<String>::new(), parse_language(b", en\r\n"));
    }

    proptest! {
        #[test]
        fn params_never_panic(s in "[a-z*0-9=;\"\\\\ \r\n()%']{0,40}") {
            let mut params = parse_params(s.as_bytes());
            fold_params(&mut params);
            parse_content_type(s.as_bytes());
            parse_language(s.as_bytes());
        }
    }
}
