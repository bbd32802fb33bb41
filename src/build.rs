//! Build service client
//!
//! The build service compiles a k6 binary for a platform and a set of
//! constraints, and answers with an [`Artifact`] describing where the result
//! can be downloaded. [`BuildService`] is the seam the provider talks to;
//! [`HttpBuildService`] speaks the k6build JSON protocol over HTTP.

use crate::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// An extension to build into the binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDependency {
    pub name: String,
    pub constraints: String,
}

/// Request body sent to the build service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    /// Target platform as `os/arch`
    pub platform: String,
    /// Constraint for the k6 module itself
    #[serde(rename = "k6")]
    pub k6_constraint: String,
    #[serde(default)]
    pub dependencies: Vec<BuildDependency>,
}

/// Description of a build result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Unique build identifier, used as the local cache key
    pub id: String,
    /// Where the binary can be downloaded from
    pub url: String,
    /// Resolved versions, name → version
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub checksum: String,
}

/// Response envelope returned by the build service
#[derive(Debug, Deserialize)]
struct BuildResponse {
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    artifact: Option<Artifact>,
}

/// Errors raised while talking to the build service
#[derive(Error, Debug)]
pub enum BuildServiceError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("build service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed build service response: {0}")]
    Decode(String),

    #[error("build service reported an error: {0}")]
    Service(String),

    #[error("build service response has no artifact")]
    MissingArtifact,

    #[error("{0}")]
    Other(String),
}

/// Remote service that builds k6 binaries
#[async_trait]
pub trait BuildService: Send + Sync {
    /// Build a binary for `platform` with the given k6 constraint and extensions
    async fn build(
        &self,
        platform: &str,
        k6_constraint: &str,
        dependencies: &[BuildDependency],
    ) -> Result<Artifact, BuildServiceError>;
}

/// k6build client over HTTP
#[derive(Debug, Clone)]
pub struct HttpBuildService {
    client: reqwest::Client,
    build_url: Url,
}

impl HttpBuildService {
    /// Create a client for the build service rooted at `base_url`
    pub fn new(base_url: &str, client: reqwest::Client) -> ProviderResult<Self> {
        let build_url = build_endpoint(base_url)?;
        Ok(Self { client, build_url })
    }

    /// The endpoint build requests are posted to
    pub fn build_url(&self) -> &Url {
        &self.build_url
    }
}

/// Resolve `<base>/build`, keeping any path prefix of the base URL.
fn build_endpoint(base_url: &str) -> ProviderResult<Url> {
    let base_url = base_url.trim();
    if base_url.is_empty() {
        return Err(ProviderError::Config(
            "build service URL is required".to_string(),
        ));
    }

    let mut base = Url::parse(base_url)
        .map_err(|e| ProviderError::config_source(format!("build service URL {base_url}"), e))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(ProviderError::Config(format!(
            "build service URL {base_url} must use http or https"
        )));
    }

    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    base.join("build")
        .map_err(|e| ProviderError::config_source(format!("build service URL {base_url}"), e))
}

#[async_trait]
impl BuildService for HttpBuildService {
    async fn build(
        &self,
        platform: &str,
        k6_constraint: &str,
        dependencies: &[BuildDependency],
    ) -> Result<Artifact, BuildServiceError> {
        let request = BuildRequest {
            platform: platform.to_string(),
            k6_constraint: k6_constraint.to_string(),
            dependencies: dependencies.to_vec(),
        };

        debug!(
            "Requesting build for {} (k6 {}, {} extensions) from {}",
            platform,
            k6_constraint,
            dependencies.len(),
            self.build_url
        );

        let response = self
            .client
            .post(self.build_url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| BuildServiceError::Transport {
                url: self.build_url.to_string(),
                source: e,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BuildServiceError::Transport {
                url: self.build_url.to_string(),
                source: e,
            })?;

        // The service reports build failures in the envelope, sometimes with
        // a non-success status, so decode before looking at the status.
        let decoded = serde_json::from_str::<BuildResponse>(&body);

        if let Ok(BuildResponse {
            error: Some(error), ..
        }) = &decoded
        {
            if !error.is_null() {
                return Err(BuildServiceError::Service(describe_error(error)));
            }
        }

        if !status.is_success() {
            return Err(BuildServiceError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        let artifact = decoded
            .map_err(|e| BuildServiceError::Decode(e.to_string()))?
            .artifact
            .ok_or(BuildServiceError::MissingArtifact)?;

        if artifact.id.is_empty() || artifact.url.is_empty() {
            return Err(BuildServiceError::Decode(
                "artifact is missing its id or url".to_string(),
            ));
        }

        debug!("Build service returned artifact {}", artifact.id);
        Ok(artifact)
    }
}

/// Render the service's error object, which is either a string or an
/// `{"error": ..., "reason": ...}` chain.
fn describe_error(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => {
            let mut parts = Vec::new();
            if let Some(err) = map.get("error") {
                parts.push(describe_error(err));
            }
            if let Some(reason) = map.get("reason").filter(|r| !r.is_null()) {
                parts.push(describe_error(reason));
            }
            if parts.is_empty() {
                value.to_string()
            } else {
                parts.join(": ")
            }
        }
        other => other.to_string(),
    }
}
