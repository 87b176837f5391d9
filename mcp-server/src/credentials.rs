//! Per-request credential resolution.
//!
//! Credentials come from one of an ordered list of sources. Each source is
//! atomic: it either supplies both the client id and the secret or it is
//! skipped. The first source that supplies a complete pair wins.

use reddit_mcp_core::{CoreError, Credentials};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

pub const CLIENT_ID_PARAM: &str = "client_id";
pub const CLIENT_SECRET_PARAM: &str = "client_secret";
pub const CLIENT_ID_HEADER: &str = "x-reddit-client-id";
pub const CLIENT_SECRET_HEADER: &str = "x-reddit-client-secret";

/// A possibly incomplete id/secret pair taken from one place in a request.
#[derive(Debug, Default)]
pub struct CredentialPair {
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
}

impl CredentialPair {
    pub fn new(client_id: Option<String>, client_secret: Option<String>) -> Self {
        Self {
            client_id,
            client_secret: client_secret.map(SecretString::from),
        }
    }

    fn to_credentials(&self) -> Option<Credentials> {
        Credentials::from_parts(
            self.client_id.as_deref(),
            self.client_secret.as_ref().map(|s| s.expose_secret()),
        )
    }
}

/// Credential hints carried by a single inbound request.
#[derive(Debug, Default)]
pub struct CredentialHints {
    pub query: CredentialPair,
    pub headers: CredentialPair,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    QueryParameters,
    Headers,
    Environment,
}

impl CredentialSource {
    pub const DEFAULT_ORDER: [CredentialSource; 3] = [
        CredentialSource::QueryParameters,
        CredentialSource::Headers,
        CredentialSource::Environment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::QueryParameters => "query parameters",
            CredentialSource::Headers => "headers",
            CredentialSource::Environment => "environment",
        }
    }

    fn lookup(
        &self,
        hints: &CredentialHints,
        defaults: Option<&Credentials>,
    ) -> Option<Credentials> {
        match self {
            CredentialSource::QueryParameters => hints.query.to_credentials(),
            CredentialSource::Headers => hints.headers.to_credentials(),
            CredentialSource::Environment => defaults.map(Credentials::duplicate),
        }
    }
}

#[derive(Debug)]
pub struct ResolvedCredentials {
    pub credentials: Credentials,
    pub source: CredentialSource,
}

#[derive(Debug)]
pub struct CredentialResolver {
    sources: Vec<CredentialSource>,
    defaults: Option<Credentials>,
}

impl CredentialResolver {
    /// Resolver with the standard order: query, headers, environment.
    pub fn new(defaults: Option<Credentials>) -> Self {
        Self::with_sources(CredentialSource::DEFAULT_ORDER.to_vec(), defaults)
    }

    pub fn with_sources(sources: Vec<CredentialSource>, defaults: Option<Credentials>) -> Self {
        Self { sources, defaults }
    }

    pub fn sources(&self) -> &[CredentialSource] {
        &self.sources
    }

    pub fn resolve(&self, hints: &CredentialHints) -> Result<ResolvedCredentials, CoreError> {
        self.sources
            .iter()
            .find_map(|source| {
                source
                    .lookup(hints, self.defaults.as_ref())
                    .map(|credentials| ResolvedCredentials {
                        credentials,
                        source: *source,
                    })
            })
            .inspect(|resolved| {
                debug!(
                    "Using Reddit client {} from {}",
                    resolved.credentials.client_id(),
                    resolved.source.as_str()
                );
            })
            .ok_or(CoreError::MissingCredentials)
    }
}
