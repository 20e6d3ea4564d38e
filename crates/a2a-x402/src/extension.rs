//! Extension declaration and HTTP activation handshake.
//!
//! Agents advertise x402 support in their agent card; clients opt in per
//! request through the `X-A2A-Extensions` header, and servers echo the same
//! header back when activation took effect.

use http::header::{HeaderMap, HeaderValue};

use crate::a2a::AgentExtension;

/// Canonical URI of the x402 payment extension.
pub const X402_EXTENSION_URI: &str = "https://github.com/google-a2a/a2a-x402/v0.1";

/// Header carrying the comma-separated list of requested extension URIs.
pub const EXTENSIONS_HEADER: &str = "X-A2A-Extensions";

/// Build the capability entry for an agent card.
pub fn get_extension_declaration(description: &str, required: bool) -> AgentExtension {
    AgentExtension {
        uri: X402_EXTENSION_URI.to_string(),
        description: Some(description.to_string()),
        required,
    }
}

/// Whether the request headers activate the x402 extension.
///
/// The header value is a comma-separated list of URIs; matching is on whole
/// tokens, not substrings.
pub fn check_extension_activation(headers: &HeaderMap) -> bool {
    headers.get_all(EXTENSIONS_HEADER).iter().any(|value| {
        value
            .to_str()
            .map(|value| value.split(',').any(|token| token.trim() == X402_EXTENSION_URI))
            .unwrap_or(false)
    })
}

/// Echo the extension URI on a response to confirm activation.
pub fn add_extension_activation_header(headers: &mut HeaderMap) {
    headers.insert(
        EXTENSIONS_HEADER,
        HeaderValue::from_static(X402_EXTENSION_URI),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaration_carries_uri_and_flags() {
        let declaration = get_extension_declaration("Supports x402 payments", true);
        assert_eq!(declaration.uri, X402_EXTENSION_URI);
        assert_eq!(
            declaration.description.as_deref(),
            Some("Supports x402 payments")
        );
        assert!(declaration.required);
    }

    #[test]
    fn activation_matches_csv_tokens() {
        let mut headers = HeaderMap::new();
        headers.insert(
            EXTENSIONS_HEADER,
            HeaderValue::from_str(&format!("https://example.com/other/v1, {X402_EXTENSION_URI}"))
                .unwrap(),
        );
        assert!(check_extension_activation(&headers));
    }

    #[test]
    fn activation_requires_whole_token_match() {
        let mut headers = HeaderMap::new();
        headers.insert(
            EXTENSIONS_HEADER,
            HeaderValue::from_str(&format!("{X402_EXTENSION_URI}.1")).unwrap(),
        );
        assert!(!check_extension_activation(&headers));
        assert!(!check_extension_activation(&HeaderMap::new()));
    }

    #[test]
    fn response_header_echoes_uri() {
        let mut headers = HeaderMap::new();
        add_extension_activation_header(&mut headers);
        assert_eq!(
            headers.get(EXTENSIONS_HEADER).unwrap().to_str().unwrap(),
            X402_EXTENSION_URI
        );
    }
}
