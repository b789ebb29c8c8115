//! Strict query-string parsing for endpoint extras.

use std::collections::BTreeMap;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::Error;

/// Free-form backend parameters: key to ordered values.
pub type Extras = BTreeMap<String, Vec<String>>;

/// Characters escaped when rendering query keys and values.
const QUERY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Parse a raw query string (without the leading `?`).
///
/// Pairs are separated by `&` and empty pairs are skipped. A key without `=`
/// gets the empty value. `+` decodes to a space and `%XX` to a byte.
/// Semicolons, malformed escapes and non UTF-8 results are rejected.
pub fn parse_query(raw: &str) -> Result<Extras, Error> {
    let mut extras = Extras::new();

    for pair in raw.split('&') {
        if pair.is_empty() {
            continue;
        }
        if pair.contains(';') {
            return Err(Error::Config {
                message: format!("invalid semicolon separator in query pair {:?}", pair),
            });
        }

        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = unescape(key)?;
        let value = unescape(value)?;

        extras.entry(key).or_default().push(value);
    }

    Ok(extras)
}

/// Render extras as a query string. Keys come out sorted.
pub fn encode_query(extras: &Extras) -> String {
    let mut out = String::new();
    for (key, values) in extras {
        for value in values {
            if !out.is_empty() {
                out.push('&');
            }
            out.extend(utf8_percent_encode(key, QUERY));
            out.push('=');
            out.extend(utf8_percent_encode(value, QUERY));
        }
    }
    out
}

fn unescape(component: &str) -> Result<String, Error> {
    let bytes = component.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return Err(Error::Config {
                    message: format!("invalid URL escape in {:?}", component),
                });
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    let spaced = component.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| Error::Config {
            message: format!("invalid UTF-8 in {:?}: {}", component, e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_pairs_in_order() {
        let extras = parse_query("a=1&b=2&a=3").unwrap();
        assert_eq!(extras.len(), 2);
        assert_eq!(extras["a"], values(&["1", "3"]));
        assert_eq!(extras["b"], values(&["2"]));
    }

    #[test]
    fn decodes_escapes_and_plus() {
        let extras = parse_query("name=hello+world&path=%2Ftmp%2Fx").unwrap();
        assert_eq!(extras["name"], values(&["hello world"]));
        assert_eq!(extras["path"], values(&["/tmp/x"]));
    }

    #[test]
    fn key_without_value_and_empty_pairs() {
        let extras = parse_query("&flag&&x=").unwrap();
        assert_eq!(extras["flag"], values(&[""]));
        assert_eq!(extras["x"], values(&[""]));
        assert_eq!(extras.len(), 2);
    }

    #[test]
    fn rejects_bad_escape() {
        assert!(matches!(parse_query("a=%zz"), Err(Error::Config { .. })));
        assert!(matches!(parse_query("a=%4"), Err(Error::Config { .. })));
        assert!(matches!(parse_query("%=1"), Err(Error::Config { .. })));
    }

    #[test]
    fn rejects_semicolon() {
        assert!(matches!(parse_query("a=1;b=2"), Err(Error::Config { .. })));
    }

    #[test]
    fn rejects_invalid_utf8() {
        assert!(matches!(parse_query("a=%ff"), Err(Error::Config { .. })));
    }

    #[test]
    fn encode_escapes_reserved() {
        let extras = parse_query("b=x y&a=1%262").unwrap();
        assert_eq!(encode_query(&extras), "a=1%262&b=x%20y");
    }
}
