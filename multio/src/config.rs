//! Typed configuration options and the native configuration handle built from them.

use std::mem::ManuallyDrop;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::error::{Error, Result};

/// Every option recognised when building a native configuration.
///
/// ```
/// use multio::Config;
/// use serde_json::json;
///
/// let config = Config::from_value(&json!({
///     "config_path": "/etc/multio",
///     "allow_world_default_comm": true,
/// })).unwrap();
/// assert_eq!(config.parent_comm, None);
/// ```
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Plan file to build the configuration from instead of the defaults.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    /// Directory relative paths in the configuration are resolved against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_world_default_comm: Option<bool>,
    /// Fortran handle of the parent MPI communicator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_comm: Option<i32>,
}

impl Config {
    pub fn new() -> Config {
        Config::default()
    }

    pub fn with_config_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_allow_world_default_comm(mut self, allow: bool) -> Self {
        self.allow_world_default_comm = Some(allow);
        self
    }

    pub fn with_parent_comm(mut self, parent_comm: i32) -> Self {
        self.parent_comm = Some(parent_comm);
        self
    }

    /// Decodes and validates an options mapping.
    pub fn from_value(value: &Value) -> Result<Config> {
        if !value.is_object() {
            return Err(Error::InvalidConfig(format!(
                "expected a mapping of options, got '{}'",
                value
            )));
        }
        let config =
            Config::deserialize(value).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(s: &str) -> Result<Config> {
        let value: Value =
            serde_json::from_str(s).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        Config::from_value(&value)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(file) = &self.config_file {
            check_path("config_file", file)?;
            if !file.is_file() {
                return Err(Error::InvalidConfig(format!(
                    "config_file '{}' does not exist",
                    file.display()
                )));
            }
        }
        if let Some(path) = &self.config_path {
            check_path("config_path", path)?;
        }
        Ok(())
    }
}

fn check_path(key: &str, path: &Path) -> Result<()> {
    match path.to_str() {
        Some("") => Err(Error::InvalidConfig(format!("{} is empty", key))),
        Some(s) if s.contains('\0') => Err(Error::InvalidConfig(format!(
            "{} contains a NUL byte",
            key
        ))),
        Some(_) => Ok(()),
        None => Err(Error::InvalidConfig(format!(
            "{} '{}' is not valid UTF-8",
            key,
            path.display()
        ))),
    }
}

/// An owned native configuration object.
pub struct Configuration<B: Backend> {
    backend: Rc<B>,
    raw: ManuallyDrop<B::Config>,
    conf_path: Option<PathBuf>,
    server_started: bool,
}

impl<B: Backend> Configuration<B> {
    /// Allocates the native configuration and applies every option set in `config`.
    pub fn create(backend: Rc<B>, config: &Config) -> Result<Self> {
        config.validate()?;

        let raw = backend
            .new_configuration(config.config_file.as_deref())
            .map_err(Error::ConfigCreate)?;
        let mut configuration = Configuration {
            backend,
            raw: ManuallyDrop::new(raw),
            conf_path: None,
            server_started: false,
        };

        if let Some(path) = &config.config_path {
            configuration.set_conf_path(path)?;
        }
        if let Some(allow) = config.allow_world_default_comm {
            configuration
                .backend
                .mpi_allow_world_default_comm(&configuration.raw, allow)
                .map_err(Error::ConfigCreate)?;
        }
        if let Some(parent_comm) = config.parent_comm {
            configuration
                .backend
                .mpi_parent_comm(&configuration.raw, parent_comm)
                .map_err(Error::ConfigCreate)?;
        }

        debug!(
            "created configuration (file: {:?}, path: {:?})",
            config.config_file, config.config_path
        );
        Ok(configuration)
    }

    pub fn set_conf_path<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        check_path("config_path", path)?;
        self.backend
            .config_set_path(&self.raw, path)
            .map_err(Error::ConfigCreate)?;
        self.conf_path = Some(path.to_path_buf());
        Ok(())
    }

    pub fn start_server(&mut self) -> Result<()> {
        self.backend
            .start_server(&self.raw)
            .map_err(Error::ServerStart)?;
        self.server_started = true;
        debug!("server started");
        Ok(())
    }

    pub fn conf_path(&self) -> Option<&Path> {
        self.conf_path.as_deref()
    }

    pub fn server_started(&self) -> bool {
        self.server_started
    }

    pub(crate) fn backend(&self) -> &Rc<B> {
        &self.backend
    }

    pub(crate) fn raw(&self) -> &B::Config {
        &self.raw
    }
}

impl<B: Backend> Drop for Configuration<B> {
    fn drop(&mut self) {
        // SAFETY: `raw` is not touched again after this.
        let raw = unsafe { ManuallyDrop::take(&mut self.raw) };
        if let Err(e) = self.backend.delete_configuration(raw) {
            warn!("failed to release configuration: {}", e);
        }
    }
}
