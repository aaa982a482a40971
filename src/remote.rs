//! Remote resource retrieval seam.
//!
//! Network access is an external collaborator. The kernel only needs to know
//! whether a URI serves RDF, and to get its bytes or parsed quads.

use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex_lite::Regex;

use crate::canonical::canonicalize;
use crate::types::Quad;

/// Content types treated as RDF.
pub const ACCEPTED_RDF_CONTENT_TYPES: &[&str] = &[
    "application/trig",
    "application/n-quads",
    "text/turtle",
    "application/n-triples",
    "text/n3",
    "application/ld+json",
    "application/rdf+xml",
];

/// Content type assumed when a server sends none.
pub const DEFAULT_CONTENT_TYPE: &str = "text/turtle";

/// Error type for resource retrieval.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Nothing is served at the URI.
    #[error("Resource not found: {0}")]
    NotFound(String),
    /// The resource is not RDF and cannot be parsed into quads.
    #[error("Cannot load non-RDF resource {0} as RDF")]
    NotRdf(String),
    /// Transport or parsing failure.
    #[error("Retrieval of {uri} failed: {reason}")]
    Unreachable {
        /// Requested URI.
        uri: String,
        /// Failure description.
        reason: String,
    },
}

/// Trait for remote resource retrieval.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// The `Content-Type` header of a HEAD request, if any.
    async fn head_content_type(&self, uri: &str) -> Result<Option<String>, FetchError>;

    /// Raw response body.
    async fn fetch_bytes(&self, uri: &str) -> Result<Vec<u8>, FetchError>;

    /// Parsed RDF content.
    async fn fetch_quads(&self, uri: &str) -> Result<Vec<Quad>, FetchError>;
}

fn charset_separator() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r";\s*charset=").expect("static regex is valid"))
}

/// Media type of a `Content-Type` header value, without its charset.
pub fn media_type(header: &str) -> &str {
    charset_separator()
        .split(header)
        .next()
        .unwrap_or(header)
        .trim()
}

/// Whether `uri` serves one of the accepted RDF content types.
pub async fn is_rdf_resource(fetcher: &dyn ResourceFetcher, uri: &str) -> Result<bool, FetchError> {
    let header = fetcher
        .head_content_type(uri)
        .await?
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
    Ok(ACCEPTED_RDF_CONTENT_TYPES.contains(&media_type(&header)))
}

/// The resource part of a term value: fragment and query removed.
pub fn target_resource_uri(value: &str) -> &str {
    let without_fragment = value.split('#').next().unwrap_or(value);
    without_fragment.split('?').next().unwrap_or(without_fragment)
}

/// Content served by a [`StaticFetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaticResource {
    /// An RDF document.
    Rdf {
        /// Advertised content type.
        content_type: String,
        /// Parsed document.
        quads: Vec<Quad>,
    },
    /// An opaque resource.
    Bytes {
        /// Advertised content type.
        content_type: String,
        /// Body.
        bytes: Vec<u8>,
    },
}

/// In-memory fetcher for offline use and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    resources: BTreeMap<String, StaticResource>,
    latency: Option<Duration>,
}

impl StaticFetcher {
    /// Create an empty fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve an RDF document (as `text/turtle`) at `uri`.
    pub fn with_rdf(mut self, uri: impl Into<String>, quads: Vec<Quad>) -> Self {
        self.resources.insert(
            uri.into(),
            StaticResource::Rdf {
                content_type: DEFAULT_CONTENT_TYPE.to_string(),
                quads,
            },
        );
        self
    }

    /// Serve opaque bytes at `uri`.
    pub fn with_bytes(
        mut self,
        uri: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.resources.insert(
            uri.into(),
            StaticResource::Bytes {
                content_type: content_type.into(),
                bytes,
            },
        );
        self
    }

    /// Delay every response, to simulate slow origins.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    async fn lookup(&self, uri: &str) -> Result<&StaticResource, FetchError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.resources
            .get(uri)
            .ok_or_else(|| FetchError::NotFound(uri.to_string()))
    }
}

#[async_trait]
impl ResourceFetcher for StaticFetcher {
    async fn head_content_type(&self, uri: &str) -> Result<Option<String>, FetchError> {
        Ok(match self.lookup(uri).await? {
            StaticResource::Rdf { content_type, .. } => Some(content_type.clone()),
            StaticResource::Bytes { content_type, .. } => Some(content_type.clone()),
        })
    }

    async fn fetch_bytes(&self, uri: &str) -> Result<Vec<u8>, FetchError> {
        Ok(match self.lookup(uri).await? {
            StaticResource::Rdf { quads, .. } => canonicalize(quads),
            StaticResource::Bytes { bytes, .. } => bytes.clone(),
        })
    }

    async fn fetch_quads(&self, uri: &str) -> Result<Vec<Quad>, FetchError> {
        match self.lookup(uri).await? {
            StaticResource::Rdf { quads, .. } => Ok(quads.clone()),
            StaticResource::Bytes { .. } => Err(FetchError::NotRdf(uri.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Term;

    #[test]
    fn test_media_type_strips_charset() {
        assert_eq!(media_type("text/turtle; charset=utf-8"), "text/turtle");
        assert_eq!(media_type("application/trig"), "application/trig");
    }

    #[test]
    fn test_target_resource_uri() {
        assert_eq!(
            target_resource_uri("https://pod.example.org/profile/card#me"),
            "https://pod.example.org/profile/card"
        );
        assert_eq!(
            target_resource_uri("https://example.org/img.png?size=2#x"),
            "https://example.org/img.png"
        );
    }

    #[tokio::test]
    async fn test_rdf_detection() {
        let fetcher = StaticFetcher::new()
            .with_rdf(
                "https://example.org/card",
                vec![Quad::triple(Term::named("https://a"), Term::named("https://p"), Term::literal("x"))],
            )
            .with_bytes("https://example.org/img.png", "image/png", vec![1, 2, 3]);

        assert!(is_rdf_resource(&fetcher, "https://example.org/card").await.unwrap());
        assert!(!is_rdf_resource(&fetcher, "https://example.org/img.png").await.unwrap());
        assert!(matches!(
            fetcher.fetch_quads("https://example.org/img.png").await,
            Err(FetchError::NotRdf(_))
        ));
        assert!(matches!(
            is_rdf_resource(&fetcher, "https://example.org/missing").await,
            Err(FetchError::NotFound(_))
        ));
    }
}
