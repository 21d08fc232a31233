//! Deploy configuration (`tdship.toml`).
//!
//! ```toml
//! tag = "202601151258"
//!
//! [aws]
//! region = "eu-west-1"
//!
//! [[services]]
//! name = "parrot-dev-backend"
//! cluster = "parrot-dev"
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ImageTag, ServiceTarget};
use crate::impls::AwsCliSettings;
use crate::ports::Clock;

/// Config file picked up from the working directory when none is given.
pub const DEFAULT_CONFIG_PATH: &str = "tdship.toml";

/// ConfigError is reported when the deploy config cannot produce any targets.
///
/// # Kinds
/// - Read / Parse: the file is unreadable or not a valid config (an empty `tag` is a Parse error)
/// - NoServices: nothing to deploy after command line overrides
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("no services to deploy")]
    NoServices,
}

/// Contents of `tdship.toml`. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    /// Tag for every service without its own `tag`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<ImageTag>,

    #[serde(default)]
    pub aws: AwsCliSettings,

    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

/// One `[[services]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub name: String,

    /// Defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,

    /// Task definition family. Defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<ImageTag>,
}

impl ServiceConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cluster: None,
            family: None,
            tag: None,
        }
    }
}

impl DeployConfig {
    /// Read and parse a config file; errors name the path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Replace the configured services with plain service names.
    pub fn with_services<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.services = names.into_iter().map(ServiceConfig::named).collect();
        self
    }

    /// Resolve the services into deploy targets, in file order.
    ///
    /// Tag precedence: `tag_override` > service `tag` > top-level `tag` >
    /// timestamp from `clock`. The clock is read once, so every service
    /// without an explicit tag gets the same one.
    pub fn targets(
        &self,
        tag_override: Option<&ImageTag>,
        clock: &dyn Clock,
    ) -> Result<Vec<ServiceTarget>, ConfigError> {
        if self.services.is_empty() {
            return Err(ConfigError::NoServices);
        }

        let fallback = self
            .tag
            .clone()
            .unwrap_or_else(|| ImageTag::from_timestamp(clock.now()));

        let targets = self
            .services
            .iter()
            .map(|service| {
                let tag = tag_override
                    .or(service.tag.as_ref())
                    .unwrap_or(&fallback)
                    .clone();
                let mut target = ServiceTarget::new(&service.name, tag);
                if let Some(cluster) = &service.cluster {
                    target = target.with_cluster(cluster);
                }
                if let Some(family) = &service.family {
                    target = target.with_family(family);
                }
                target
            })
            .collect();
        Ok(targets)
    }
}
