//! Response header rendering.
//!
//! The header is produced from a fixed template with `{{name}}`
//! placeholders. Every exchange is closed after its response, and the
//! header says so.

use super::request::HttpResponse;
use crate::domain::SessionId;

/// Template for the response header of a served request.
pub const HEADER_TEMPLATE: &str = "HTTP/1.1 200 OK
content-type: {{content-type}}
accept-ranges: bytes
content-length: {{content-length}}
cache-control: no-store
connection: close
set-cookie: sessionId={{session-id}}";

/// Substitutes `{{name}}` placeholders with the matching value.
///
/// Unknown names render as the empty string. An unterminated `{{` is
/// copied verbatim.
#[must_use]
pub fn render(template: &str, values: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let (literal, tail) = rest.split_at(start);
        out.push_str(literal);
        let Some(tag) = tail.get(2..) else {
            break;
        };
        let Some(end) = tag.find("}}") else {
            out.push_str(tail);
            return out;
        };
        let (name, after) = tag.split_at(end);
        let name = name.trim();
        if let Some((_, value)) = values.iter().find(|(key, _)| *key == name) {
            out.push_str(value);
        }
        rest = after.get(2..).unwrap_or_default();
    }
    out.push_str(rest);
    out
}

/// Renders the header for `response`, binding the connection to `session`.
///
/// `content-length` counts the newline appended to the body on the wire.
/// The result ends with the blank line that terminates the header block.
#[must_use]
pub fn create_http_header(response: &HttpResponse, session: SessionId) -> String {
    let content_length = response.content().len() + 1;
    let mut header = render(
        HEADER_TEMPLATE,
        &[
            ("content-type", response.content_type().to_owned()),
            ("content-length", content_length.to_string()),
            ("session-id", session.to_string()),
        ],
    );
    header.push_str("\n\n");
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_known_names() {
        let out = render(
            "a={{a}}, b={{ b }}",
            &[("a", "1".to_string()), ("b", "2".to_string())],
        );
        assert_eq!(out, "a=1, b=2");
    }

    #[test]
    fn render_blanks_unknown_names() {
        assert_eq!(render("x{{missing}}y", &[]), "xy");
    }

    #[test]
    fn render_keeps_unterminated_tag() {
        assert_eq!(render("x{{open", &[]), "x{{open");
    }

    #[test]
    fn header_matches_wire_format() {
        let response = HttpResponse::new("text/html", "<p>hi</p>");
        let header = create_http_header(&response, SessionId::from_raw(4242));
        assert_eq!(
            header,
            "HTTP/1.1 200 OK\n\
             content-type: text/html\n\
             accept-ranges: bytes\n\
             content-length: 10\n\
             cache-control: no-store\n\
             connection: close\n\
             set-cookie: sessionId=4242\n\n"
        );
    }
}
