//! Request and response values exchanged with the HTTP request delegate.

use std::collections::HashMap;

/// A parsed HTTP request as seen by the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    get_data: HashMap<String, String>,
    page: String,
}

impl HttpRequest {
    /// Creates a request from its query arguments and path.
    #[must_use]
    pub fn new(get_data: HashMap<String, String>, page: impl Into<String>) -> Self {
        Self {
            get_data,
            page: page.into(),
        }
    }

    /// Query-string arguments.
    #[must_use]
    pub fn get_data(&self) -> &HashMap<String, String> {
        &self.get_data
    }

    /// Value of one query argument.
    #[must_use]
    pub fn arg(&self, key: &str) -> Option<&str> {
        self.get_data.get(key).map(String::as_str)
    }

    /// Requested path.
    #[must_use]
    pub fn page(&self) -> &str {
        &self.page
    }
}

/// Content produced by the application for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    content_type: String,
    content: String,
}

impl HttpResponse {
    /// Creates a response.
    #[must_use]
    pub fn new(content_type: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            content: content.into(),
        }
    }

    /// MIME type sent as `content-type`.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Response body, without the trailing newline added on the wire.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_exposes_args_and_page() {
        let args = HashMap::from([("x".to_string(), "1".to_string())]);
        let request = HttpRequest::new(args, "/page");
        assert_eq!(request.page(), "/page");
        assert_eq!(request.arg("x"), Some("1"));
        assert!(request.arg("y").is_none());
        assert_eq!(request.get_data().len(), 1);
    }

    #[test]
    fn response_keeps_type_and_content() {
        let response = HttpResponse::new("text/plain", "hi");
        assert_eq!(response.content_type(), "text/plain");
        assert_eq!(response.content(), "hi");
    }
}
