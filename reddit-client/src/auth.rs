//! Application-only OAuth2 for the Reddit API.
//!
//! Reddit's "client credentials" grant exchanges a client id and secret for a
//! short-lived bearer token without any user interaction. Every request that
//! reaches this module performs its own exchange; tokens are never shared.

use oauth2::basic::{BasicClient, BasicErrorResponse};
use oauth2::{
    AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RequestTokenError, Scope,
    TokenResponse, TokenUrl,
};
use crate::api::retry_after_secs;
use reddit_mcp_core::{CoreError, Credentials, RedditApiError, RedditSettings};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, warn};

pub const REDDIT_AUTHORIZE_URL: &str = "https://www.reddit.com/api/v1/authorize";

/// Lifetime assumed when Reddit omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug)]
pub struct RedditOAuth2Config {
    pub client_id: String,
    pub client_secret: SecretString,
    pub token_url: String,
    pub user_agent: String,
}

impl RedditOAuth2Config {
    pub fn new(credentials: &Credentials, settings: &RedditSettings) -> Self {
        Self {
            client_id: credentials.client_id().to_string(),
            client_secret: SecretString::from(
                credentials.client_secret().expose_secret().to_string(),
            ),
            token_url: settings.token_url.clone(),
            user_agent: settings.user_agent.clone(),
        }
    }
}

#[derive(Debug)]
pub struct RedditToken {
    pub access_token: SecretString,
    pub expires_at: SystemTime,
}

impl RedditToken {
    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }
}

/// Exchanges the configured client credentials for an application token.
pub async fn request_app_token(
    http_client: &reqwest::Client,
    config: &RedditOAuth2Config,
) -> Result<RedditToken, CoreError> {
    let auth_url = AuthUrl::new(REDDIT_AUTHORIZE_URL.to_string()).map_err(|e| {
        CoreError::Internal {
            message: format!("invalid authorize URL: {}", e),
        }
    })?;
    let token_url = TokenUrl::new(config.token_url.clone()).map_err(|e| CoreError::Internal {
        message: format!("invalid token URL {}: {}", config.token_url, e),
    })?;

    let oauth_client = BasicClient::new(
        ClientId::new(config.client_id.clone()),
        Some(ClientSecret::new(
            config.client_secret.expose_secret().to_string(),
        )),
        auth_url,
        Some(token_url),
    );

    debug!("Requesting application token for client {}", config.client_id);
    let response = oauth_client
        .exchange_client_credentials()
        .add_scope(Scope::new("read".to_string()))
        .request_async(|request| send_token_request(http_client, request))
        .await
        .map_err(map_token_error)?;

    let expires_at = SystemTime::now() + response.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);

    info!("Obtained Reddit application token for client {}", config.client_id);
    Ok(RedditToken {
        access_token: SecretString::from(response.access_token().secret().to_string()),
        expires_at,
    })
}

/// Sends an oauth2 token request through the shared reqwest client so the
/// configured user agent and timeout apply to the token endpoint too.
///
/// Throttling and server failures are reported here; only 2xx and 4xx bodies
/// are handed to oauth2 for parsing.
async fn send_token_request(
    http_client: &reqwest::Client,
    request: HttpRequest,
) -> Result<HttpResponse, CoreError> {
    let response = http_client
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                CoreError::RedditApi(RedditApiError::RequestTimeout)
            } else {
                CoreError::Network(e)
            }
        })?;

    let status_code = response.status();
    if status_code == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = retry_after_secs(response.headers());
        warn!("Token endpoint rate limited, retry after {} seconds", retry_after);
        return Err(CoreError::RedditApi(RedditApiError::RateLimitExceeded {
            retry_after,
        }));
    }
    if status_code.is_server_error() {
        return Err(CoreError::RedditApi(RedditApiError::ServerError {
            status_code: status_code.as_u16(),
        }));
    }

    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}

fn map_token_error(err: RequestTokenError<CoreError, BasicErrorResponse>) -> CoreError {
    let core_error = match err {
        RequestTokenError::ServerResponse(response) => {
            CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                reason: response.to_string(),
            })
        }
        RequestTokenError::Request(e) => e,
        RequestTokenError::Parse(_, body) => {
            let body = String::from_utf8_lossy(&body);
            CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                reason: format!("unexpected token response: {}", body.trim()),
            })
        }
        RequestTokenError::Other(message) => {
            CoreError::RedditApi(RedditApiError::AuthenticationFailed { reason: message })
        }
    };
    error!("Reddit token exchange failed: {}", core_error);
    core_error
}
