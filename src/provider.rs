//! Custom k6 binary provider
//!
//! [`Provider::get_binary`] turns a dependency set into a build request,
//! asks the build service for a matching artifact and makes sure the binary
//! is present in the local cache, downloading it on a miss.

use crate::build::{Artifact, BuildService, HttpBuildService};
use crate::cache::{BinaryCache, Lookup};
use crate::config::ProviderConfig;
use crate::deps::{translate, Dependencies};
use crate::download::{http_client, Downloader};
use crate::error::{ProviderError, ProviderResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// A k6 binary available on local disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct K6Binary {
    /// Path to the executable
    pub path: PathBuf,
    /// Resolved versions, e.g. `{"k6": "v0.50.0", "k6/x/kubernetes": "v0.9.0"}`
    pub dependencies: BTreeMap<String, String>,
    /// Checksum reported by the build service
    pub checksum: String,
}

impl K6Binary {
    /// Dependencies as `name:"version";` pairs, in name order
    pub fn format_dependencies(&self) -> String {
        self.dependencies
            .iter()
            .map(|(name, version)| format!("{}:{:?};", name, version))
            .collect()
    }
}

/// Builder for [`Provider`]
pub struct ProviderBuilder {
    config: ProviderConfig,
    download_client: Option<reqwest::Client>,
    build_client: Option<reqwest::Client>,
    build_service: Option<Arc<dyn BuildService>>,
}

impl ProviderBuilder {
    /// Use this HTTP client for downloads instead of one built from the config.
    ///
    /// The configured download proxy only applies to the default client.
    pub fn download_client(mut self, client: reqwest::Client) -> Self {
        self.download_client = Some(client);
        self
    }

    /// Use this HTTP client for build requests instead of a default one
    pub fn build_client(mut self, client: reqwest::Client) -> Self {
        self.build_client = Some(client);
        self
    }

    /// Use this build service instead of the HTTP client for the configured URL
    pub fn build_service(mut self, service: Arc<dyn BuildService>) -> Self {
        self.build_service = Some(service);
        self
    }

    /// Validate the configuration and create the provider
    pub fn build(self) -> ProviderResult<Provider> {
        let config = self.config;

        if config.platform.trim().is_empty() {
            return Err(ProviderError::Config("platform is empty".to_string()));
        }

        let download_client = match self.download_client {
            Some(client) => client,
            None => http_client(
                config.download_proxy_url.as_deref(),
                config.request_timeout,
            )?,
        };

        // The download proxy is not used to reach the build service
        let build_service: Arc<dyn BuildService> = match self.build_service {
            Some(service) => service,
            None => {
                let client = match self.build_client {
                    Some(client) => client,
                    None => http_client(None, config.request_timeout)?,
                };
                Arc::new(HttpBuildService::new(&config.build_service_url, client)?)
            }
        };

        debug!(
            "Provider for {} caching in {}",
            config.platform,
            config.bin_dir.display()
        );

        Ok(Provider {
            build_service,
            downloader: Downloader::new(download_client),
            cache: BinaryCache::new(config.bin_dir),
            platform: config.platform,
            verify_checksum: config.verify_checksum,
        })
    }
}

/// Provides custom k6 binaries from a build service
pub struct Provider {
    build_service: Arc<dyn BuildService>,
    downloader: Downloader,
    cache: BinaryCache,
    platform: String,
    verify_checksum: bool,
}

impl Provider {
    /// Start building a provider from resolved settings
    pub fn builder(config: ProviderConfig) -> ProviderBuilder {
        ProviderBuilder {
            config,
            download_client: None,
            build_client: None,
            build_service: None,
        }
    }

    /// Create a provider with the default HTTP client and build service
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        Self::builder(config).build()
    }

    /// Target platform
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// The local binary cache
    pub fn cache(&self) -> &BinaryCache {
        &self.cache
    }

    /// Return a k6 binary satisfying `deps`, building and downloading it if needed.
    ///
    /// Build failures leave the filesystem untouched. Cancelling the returned
    /// future still removes a partially populated cache entry.
    pub async fn get_binary(&self, deps: &Dependencies) -> ProviderResult<K6Binary> {
        let (k6_constraint, build_deps) = translate(deps);

        let artifact = self
            .build_service
            .build(&self.platform, &k6_constraint, &build_deps)
            .await
            .map_err(ProviderError::Build)?;

        let path = self.materialize(&artifact).await?;

        Ok(K6Binary {
            path,
            dependencies: artifact.dependencies,
            checksum: artifact.checksum,
        })
    }

    /// Ensure the binary for `artifact` exists locally and return its path
    pub async fn materialize(&self, artifact: &Artifact) -> ProviderResult<PathBuf> {
        if let Lookup::Hit(path) = self.cache.lookup(&artifact.id).await? {
            debug!("Cache hit for {}", artifact.id);
            return Ok(path);
        }

        let _guard = self.cache.lock(&artifact.id).await;

        // Another task may have installed it while we waited
        if let Lookup::Hit(path) = self.cache.lookup(&artifact.id).await? {
            debug!("Cache hit for {} after waiting", artifact.id);
            return Ok(path);
        }

        if self.verify_checksum && artifact.checksum.trim().is_empty() {
            return Err(ProviderError::MissingChecksum {
                url: artifact.url.clone(),
            });
        }

        info!("Downloading k6 binary {}", artifact.id);

        let rollback = self.cache.create_artifact_dir(&artifact.id).await?;
        let path = self.install(artifact, rollback.path()).await?;
        rollback.commit();

        info!("Installed k6 binary at {}", path.display());
        Ok(path)
    }

    async fn install(&self, artifact: &Artifact, dir: &Path) -> ProviderResult<PathBuf> {
        let (partial, mut file) = self.cache.create_partial(dir).await?;

        let expected = self.verify_checksum.then_some(artifact.checksum.as_str());

        self.downloader
            .download(&artifact.url, &mut file, expected)
            .await?;

        file.sync_all()
            .await
            .map_err(|e| ProviderError::binary(format!("syncing {}", partial.display()), e))?;
        file.shutdown()
            .await
            .map_err(|e| ProviderError::binary(format!("closing {}", partial.display()), e))?;
        drop(file);

        self.cache.finalize(&partial, &artifact.id).await
    }
}
