//! HTTP client for the Argo CD project token API.

use std::time::Duration;

use argocd_tokens::{
    project::RemoteProject,
    remote::{RemoteCredentialClient, RemoteError},
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url, header::COOKIE};
use thiserror::Error;
use tracing::debug;

use crate::session::SessionToken;

use super::models::{AppProject, PostRequest, TokenResponse};

const PROJECTS_PATH: [&str; 3] = ["api", "v1", "projects"];

/// Configuration for connecting to Argo CD.
#[derive(Debug, Clone)]
pub struct ArgoCdClientConfig {
    /// Session credential sent with every request.
    pub session: SessionToken,

    /// Accept invalid TLS certificates.
    pub insecure_skip_tls_verify: bool,

    /// Per-request timeout.
    pub request_timeout: Duration,
}

/// [`RemoteCredentialClient`] backed by the Argo CD REST API.
#[derive(Debug, Clone)]
pub struct ArgoCdClient {
    session: SessionToken,
    http: Client,
}

impl ArgoCdClient {
    /// Create a new client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is empty or the HTTP client cannot be
    /// built.
    pub fn new(config: ArgoCdClientConfig) -> Result<Self, ArgoCdClientError> {
        if config.session.is_empty() {
            return Err(ArgoCdClientError::EmptySession);
        }

        let http = Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.insecure_skip_tls_verify)
            .build()?;

        Ok(Self {
            session: config.session,
            http,
        })
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        request
            .header(COOKIE, self.session.cookie())
            .send()
            .await
            .map_err(|error| RemoteError::Unreachable(Box::new(error)))
    }
}

#[async_trait]
impl RemoteCredentialClient for ArgoCdClient {
    async fn fetch_project(
        &self,
        endpoint: &str,
        project: &str,
    ) -> Result<RemoteProject, RemoteError> {
        let url = api_url(endpoint, &[project])?;

        debug!(%url, "fetching project");

        let response = self.send(self.http.get(url)).await?;
        let response = ensure_success(
            response,
            "project",
            RemoteError::NotFound(format!("project `{project}`")),
        )
        .await?;

        let parsed: AppProject = response.json().await.map_err(|error| {
            RemoteError::UnexpectedResponse(format!("project body could not be decoded: {error}"))
        })?;

        Ok(parsed.into())
    }

    async fn issue_credential(
        &self,
        endpoint: &str,
        project: &str,
        role: &str,
        lifetime_seconds: i64,
    ) -> Result<String, RemoteError> {
        let url = api_url(endpoint, &[project, "roles", role, "token"])?;

        debug!(%url, lifetime_seconds, "issuing token");

        let body = PostRequest {
            expires_in: lifetime_seconds,
            project,
            role,
        };

        let response = self.send(self.http.post(url).json(&body)).await?;
        let response = ensure_success(
            response,
            "token issuance",
            RemoteError::RoleNotFound {
                project: project.to_string(),
                role: role.to_string(),
            },
        )
        .await?;

        let parsed: TokenResponse = response.json().await.map_err(|error| {
            RemoteError::UnexpectedResponse(format!("token body could not be decoded: {error}"))
        })?;

        if parsed.token.is_empty() {
            return Err(RemoteError::UnexpectedResponse(
                "token issuance returned an empty token".to_string(),
            ));
        }

        Ok(parsed.token)
    }

    async fn revoke_credential(
        &self,
        endpoint: &str,
        project: &str,
        role: &str,
        issued_at: i64,
    ) -> Result<(), RemoteError> {
        let issued_at_segment = issued_at.to_string();
        let url = api_url(
            endpoint,
            &[project, "roles", role, "token", issued_at_segment.as_str()],
        )?;

        debug!(%url, "revoking token");

        let response = self.send(self.http.delete(url)).await?;

        ensure_success(
            response,
            "token revocation",
            RemoteError::NotFound(format!("token issued at {issued_at}")),
        )
        .await?;

        Ok(())
    }
}

/// Build `{endpoint}/api/v1/projects/{segments..}` with each segment
/// percent-encoded.
fn api_url(endpoint: &str, segments: &[&str]) -> Result<Url, RemoteError> {
    let invalid = |reason: &str| RemoteError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };

    let mut url = Url::parse(endpoint).map_err(|error| invalid(&error.to_string()))?;

    {
        let mut path = url
            .path_segments_mut()
            .map_err(|()| invalid("not a base URL"))?;

        path.pop_if_empty().extend(PROJECTS_PATH).extend(segments);
    }

    Ok(url)
}

async fn ensure_success(
    response: Response,
    action: &str,
    not_found: RemoteError,
) -> Result<Response, RemoteError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RemoteError::Unauthorized),
        StatusCode::NOT_FOUND => Err(not_found),
        _ => {
            let text = response.text().await.unwrap_or_default();

            Err(RemoteError::UnexpectedResponse(format!(
                "{action} request failed with status {status}: {text}"
            )))
        }
    }
}

/// Errors raised while building an [`ArgoCdClient`].
#[derive(Debug, Error)]
pub enum ArgoCdClientError {
    /// No session credential was supplied.
    #[error("argo cd session token is empty")]
    EmptySession,

    /// The HTTP client could not be built.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
