//! Response body rewriting.
//!
//! Only `text/*` bodies are buffered and rewritten. Everything else is
//! handed back as the original streaming body.

use axum::body::Body;
use axum::http::header::{self, HeaderMap};
use thiserror::Error;

use crate::rewrite::token::{HostToken, TokenPattern};

/// Failure to read or decode a textual body.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("failed to read response body: {0}")]
    Read(#[source] axum::Error),

    #[error("textual response body is not valid UTF-8: {0}")]
    Decode(#[from] std::str::Utf8Error),
}

/// Result of body transformation.
pub enum TransformedBody {
    /// Textual body after substitution.
    Rewritten(String),
    /// Untouched body, still streaming.
    Passthrough(Body),
}

impl std::fmt::Debug for TransformedBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformedBody::Rewritten(text) => f.debug_tuple("Rewritten").field(&text.len()).finish(),
            TransformedBody::Passthrough(_) => f.write_str("Passthrough"),
        }
    }
}

impl TransformedBody {
    pub fn is_rewritten(&self) -> bool {
        matches!(self, TransformedBody::Rewritten(_))
    }

    pub fn into_body(self) -> Body {
        match self {
            TransformedBody::Rewritten(text) => Body::from(text),
            TransformedBody::Passthrough(body) => body,
        }
    }
}

/// Whether the response declares a `text/*` media type.
pub fn is_textual(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
                .starts_with("text/")
        })
        .unwrap_or(false)
}

fn is_encoded(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::CONTENT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|coding| !coding.trim().eq_ignore_ascii_case("identity"))
}

/// Rewrite a response body from the backend token to the origin token.
///
/// `limit` bounds how much of a textual body is buffered.
pub async fn rewrite_body(
    headers: &HeaderMap,
    body: Body,
    proxy: &TokenPattern,
    origin: &HostToken,
    limit: usize,
) -> Result<TransformedBody, BodyError> {
    if !is_textual(headers) {
        return Ok(TransformedBody::Passthrough(body));
    }
    if is_encoded(headers) {
        tracing::debug!("Textual body carries a content-encoding, forwarding unmodified");
        return Ok(TransformedBody::Passthrough(body));
    }

    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(BodyError::Read)?;
    let text = std::str::from_utf8(&bytes)?;

    Ok(TransformedBody::Rewritten(
        proxy.replace_all(text, origin).into_owned(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(content_type: &'static str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        h
    }

    fn proxy() -> TokenPattern {
        TokenPattern::new(&HostToken::new("backend.example", 443)).unwrap()
    }

    fn origin() -> HostToken {
        HostToken::new("public.example", 443)
    }

    #[test]
    fn textual_detection() {
        assert!(is_textual(&headers("text/html; charset=utf-8")));
        assert!(is_textual(&headers("Text/CSS")));
        assert!(!is_textual(&headers("image/png")));
        assert!(!is_textual(&headers("application/json")));
        assert!(!is_textual(&HeaderMap::new()));
    }

    #[tokio::test]
    async fn rewrites_html() {
        let out = rewrite_body(
            &headers("text/html"),
            Body::from("Link: backend.example:443/x"),
            &proxy(),
            &origin(),
            1024,
        )
        .await
        .unwrap();

        match out {
            TransformedBody::Rewritten(text) => assert_eq!(text, "Link: public.example:443/x"),
            other => panic!("expected rewrite, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn binary_passes_through_byte_for_byte() {
        let mut payload = b"\x89PNG\r\n".to_vec();
        payload.extend_from_slice(b"backend.example:443");
        payload.extend_from_slice(&[0, 255, 1]);
        let out = rewrite_body(
            &headers("image/png"),
            Body::from(payload.clone()),
            &proxy(),
            &origin(),
            1024,
        )
        .await
        .unwrap();

        assert!(!out.is_rewritten());
        let bytes = axum::body::to_bytes(out.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.as_ref(), payload.as_slice());
    }

    #[tokio::test]
    async fn invalid_utf8_is_an_error() {
        let result = rewrite_body(
            &headers("text/plain"),
            Body::from(vec![0xff, 0xfe, 0x00]),
            &proxy(),
            &origin(),
            1024,
        )
        .await;
        assert!(matches!(result, Err(BodyError::Decode(_))));
    }

    #[tokio::test]
    async fn oversized_text_is_an_error() {
        let result = rewrite_body(
            &headers("text/plain"),
            Body::from("x".repeat(64)),
            &proxy(),
            &origin(),
            16,
        )
        .await;
        assert!(matches!(result, Err(BodyError::Read(_))));
    }

    #[tokio::test]
    async fn compressed_text_is_not_touched() {
        let mut h = headers("text/html");
        h.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        let out = rewrite_body(&h, Body::from("backend.example:443"), &proxy(), &origin(), 1024)
            .await
            .unwrap();
        assert!(!out.is_rewritten());
    }
}
