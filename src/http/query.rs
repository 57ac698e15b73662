//! Query-string argument parsing.

use std::collections::HashMap;

use percent_encoding::percent_decode_str;

use crate::engine::event::HEADER_COPY_LIMIT;

/// Parses `key=value` fragments separated by `&`.
///
/// Each fragment is split on `=` as it appears on the wire; fragments that
/// do not split into exactly two parts are dropped. Key and value are then
/// decoded separately (`+` as space, then `%XX` escapes), so an escaped `=`
/// stays part of the value. Parsing stops at the first fragment that cannot be read: an
/// empty fragment or one longer than [`HEADER_COPY_LIMIT`] bytes.
#[must_use]
pub fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    let mut args = HashMap::new();
    let Some(query) = query else {
        return args;
    };

    for fragment in query.split('&') {
        if fragment.is_empty() || fragment.len() > HEADER_COPY_LIMIT {
            break;
        }
        let mut parts = fragment.split('=');
        if let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) {
            args.insert(decode(key), decode(value));
        }
    }
    args
}

fn decode(raw: &str) -> String {
    let plus_decoded = raw.replace('+', " ");
    percent_decode_str(&plus_decoded).decode_utf8_lossy().into_owned()
}
