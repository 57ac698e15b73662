//! `Cookie` header parsing.

use std::collections::HashMap;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "sessionId";

/// Splits a `Cookie` header into name/value pairs.
///
/// The header is split on `;`, each segment on `=`. A segment that does not
/// split into exactly two parts is dropped. Surrounding whitespace is
/// trimmed from names and values. A later duplicate name wins.
#[must_use]
pub fn parse_cookies(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|segment| {
            let mut parts = segment.split('=');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(name), Some(value), None) => {
                    Some((name.trim().to_owned(), value.trim().to_owned()))
                }
                _ => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_cookie() {
        let cookies = parse_cookies("sessionId=4242");
        assert_eq!(cookies.get(SESSION_COOKIE).map(String::as_str), Some("4242"));
    }

    #[test]
    fn each_segment_is_split_on_its_own() {
        let cookies = parse_cookies("theme=dark; sessionId=17;lang=en");
        assert_eq!(cookies.len(), 3);
        assert_eq!(cookies.get("theme").map(String::as_str), Some("dark"));
        assert_eq!(cookies.get(SESSION_COOKIE).map(String::as_str), Some("17"));
        assert_eq!(cookies.get("lang").map(String::as_str), Some("en"));
    }

    #[test]
    fn malformed_segments_are_dropped() {
        let cookies = parse_cookies("flag; token=a=b; sessionId=5");
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies.get(SESSION_COOKIE).map(String::as_str), Some("5"));
    }

    #[test]
    fn empty_header_yields_nothing() {
        assert!(parse_cookies("").is_empty());
    }
}
