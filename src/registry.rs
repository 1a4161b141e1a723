//! Engine registry and selection.
//!
//! Holds every engine descriptor from the configuration file, in file
//! order, and turns the user's selection (`-d`/`--engine`, `--all`, or
//! nothing) into the list of engines to run against.

use std::fmt;
use std::path::Path;
use tracing::{info, warn};

use crate::config_file::EngineConfigFile;
use crate::error::{Result, VdbError};

/// Connection details for one engine. Immutable once loaded.
#[derive(Clone, PartialEq, Eq)]
pub struct EngineDescriptor {
    /// Identifier used on the command line
    pub hostname: String,
    /// Host name or IP address of the engine
    pub address: String,
    pub username: String,
    pub password: Option<String>,
    /// Marked `"default": "true"` in the configuration
    pub is_default: bool,
    pub use_https: bool,
    pub port: Option<u16>,
}

impl EngineDescriptor {
    /// Root of the engine's JSON API, e.g. `http://10.0.1.10/resources/json/delphix`
    pub fn base_url(&self) -> String {
        let scheme = if self.use_https { "https" } else { "http" };
        match self.port {
            Some(port) => format!("{}://{}:{}/resources/json/delphix", scheme, self.address, port),
            None => format!("{}://{}/resources/json/delphix", scheme, self.address),
        }
    }
}

impl fmt::Debug for EngineDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineDescriptor")
            .field("hostname", &self.hostname)
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .field("is_default", &self.is_default)
            .field("use_https", &self.use_https)
            .field("port", &self.port)
            .finish()
    }
}

/// Which engines an invocation targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineSelector {
    /// A single engine by hostname
    Named(String),
    /// Every engine in the configuration
    All,
    /// The engine marked default
    Default,
}

impl fmt::Display for EngineSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "engine \"{}\"", name),
            Self::All => write!(f, "all engines"),
            Self::Default => write!(f, "the default engine"),
        }
    }
}

/// Known engines, in configuration-file order
#[derive(Debug, Clone, Default)]
pub struct EngineRegistry {
    engines: Vec<EngineDescriptor>,
}

impl EngineRegistry {
    /// Build a registry, rejecting duplicate hostnames
    pub fn new(engines: Vec<EngineDescriptor>) -> Result<Self> {
        for (index, engine) in engines.iter().enumerate() {
            if engines[..index].iter().any(|e| e.hostname == engine.hostname) {
                return Err(VdbError::config(format!(
                    "engine \"{}\" is defined more than once",
                    engine.hostname
                )));
            }
        }
        Ok(Self { engines })
    }

    /// Load the registry from a `dxtools.conf` file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = EngineConfigFile::load_from_file(&path)
            .map_err(|e| VdbError::config(format!("{:#}", e)))?;
        let registry = Self::new(config.into_descriptors())?;
        info!(
            "Loaded {} engine(s) from {}",
            registry.len(),
            path.as_ref().display()
        );
        Ok(registry)
    }

    pub fn get(&self, hostname: &str) -> Option<&EngineDescriptor> {
        self.engines.iter().find(|e| e.hostname == hostname)
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// Resolve a selector to the engines to run against.
    ///
    /// When several engines are marked default the first one in file order
    /// wins and the others are reported in a warning.
    pub fn select(&self, selector: &EngineSelector) -> Result<Vec<EngineDescriptor>> {
        match selector {
            EngineSelector::Named(name) => self
                .get(name)
                .cloned()
                .map(|engine| vec![engine])
                .ok_or_else(|| VdbError::EngineNotFound {
                    identifier: name.clone(),
                }),
            EngineSelector::All => {
                if self.engines.is_empty() {
                    return Err(VdbError::config("no engines are defined in the configuration"));
                }
                Ok(self.engines.clone())
            }
            EngineSelector::Default => {
                let mut defaults = self.engines.iter().filter(|e| e.is_default);
                let chosen = defaults.next().ok_or(VdbError::NoDefaultEngine)?;
                let ignored: Vec<&str> = defaults.map(|e| e.hostname.as_str()).collect();
                if !ignored.is_empty() {
                    warn!(
                        "Several engines are marked default; using {} and ignoring {}",
                        chosen.hostname,
                        ignored.join(", ")
                    );
                }
                Ok(vec![chosen.clone()])
            }
        }
    }
}
