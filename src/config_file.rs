//! Engine configuration file (`dxtools.conf`) loading.
//!
//! The file is a JSON object with a `data` array, one entry per engine.
//! Boolean-ish fields are written as either JSON booleans or the strings
//! `"true"`/`"false"` in the wild, so both are accepted.

use anyhow::{Context, Result};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::registry::EngineDescriptor;

/// Parsed engine configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfigFile {
    pub data: Vec<EngineEntry>,
}

/// One engine as written in the configuration file
#[derive(Clone, Serialize, Deserialize)]
pub struct EngineEntry {
    pub hostname: String,
    pub ip_address: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub default: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub use_https: bool,
    #[serde(default, deserialize_with = "lenient_port")]
    pub port: Option<u16>,
}

impl std::fmt::Debug for EngineEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineEntry")
            .field("hostname", &self.hostname)
            .field("ip_address", &self.ip_address)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .field("default", &self.default)
            .field("use_https", &self.use_https)
            .field("port", &self.port)
            .finish()
    }
}

impl EngineConfigFile {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).with_context(|| {
            format!(
                "Was unable to open {:?}. Please check the path and permissions, then try again",
                path.as_ref()
            )
        })?;

        Self::from_json(&content)
            .with_context(|| format!("Was unable to read {:?} as JSON", path.as_ref()))
    }

    /// Parse configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(content).context("Failed to parse engine configuration JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for (index, entry) in self.data.iter().enumerate() {
            if entry.hostname.trim().is_empty() {
                anyhow::bail!("Engine entry {} has an empty hostname", index);
            }
            if entry.ip_address.trim().is_empty() {
                anyhow::bail!("Engine \"{}\" has an empty ip_address", entry.hostname);
            }
            if entry.username.trim().is_empty() {
                anyhow::bail!("Engine \"{}\" has an empty username", entry.hostname);
            }
        }
        Ok(())
    }

    /// Convert entries into registry descriptors, preserving file order
    pub fn into_descriptors(self) -> Vec<EngineDescriptor> {
        self.data
            .into_iter()
            .map(|entry| EngineDescriptor {
                hostname: entry.hostname.trim().to_string(),
                address: entry.ip_address.trim().to_string(),
                username: entry.username,
                password: entry.password.filter(|p| !p.is_empty()),
                is_default: entry.default,
                use_https: entry.use_https,
                port: entry.port,
            })
            .collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolOrText {
    Bool(bool),
    Text(String),
}

fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<BoolOrText>::deserialize(deserializer)? {
        None => Ok(false),
        Some(BoolOrText::Bool(value)) => Ok(value),
        Some(BoolOrText::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" | "" => Ok(false),
            other => Err(de::Error::custom(format!(
                "expected true or false, found \"{}\"",
                other
            ))),
        },
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(u16),
    Text(String),
}

fn lenient_port<'de, D>(deserializer: D) -> std::result::Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(port)) => Ok(Some(port)),
        Some(NumberOrText::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(NumberOrText::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("invalid port \"{}\"", text))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "data": [
            {
                "hostname": "landshark",
                "ip_address": "10.0.1.10",
                "username": "delphix_admin",
                "password": "delphix",
                "default": "true",
                "port": "80",
                "use_https": "false",
                "comment": "ignored"
            },
            {
                "hostname": "mako",
                "ip_address": "mako.example.com",
                "username": "admin",
                "default": false,
                "use_https": true
            }
        ]
    }"#;

    #[test]
    fn test_parse_sample() {
        let config = EngineConfigFile::from_json(SAMPLE).unwrap();
        assert_eq!(config.data.len(), 2);
        assert!(config.data[0].default);
        assert_eq!(config.data[0].port, Some(80));
        assert!(!config.data[0].use_https);
        assert!(!config.data[1].default);
        assert!(config.data[1].use_https);
        assert_eq!(config.data[1].password, None);
    }

    #[test]
    fn test_descriptors_keep_file_order() {
        let descriptors = EngineConfigFile::from_json(SAMPLE).unwrap().into_descriptors();
        let names: Vec<_> = descriptors.iter().map(|d| d.hostname.as_str()).collect();
        assert_eq!(names, ["landshark", "mako"]);
        assert!(descriptors[0].is_default);
    }

    #[test]
    fn test_missing_data_key_is_rejected() {
        assert!(EngineConfigFile::from_json(r#"{"engines": []}"#).is_err());
    }

    #[test]
    fn test_bad_bool_is_rejected() {
        let json = r#"{"data":[{"hostname":"a","ip_address":"1.2.3.4","username":"u","default":"maybe"}]}"#;
        assert!(EngineConfigFile::from_json(json).is_err());
    }

    #[test]
    fn test_empty_hostname_is_rejected() {
        let json = r#"{"data":[{"hostname":" ","ip_address":"1.2.3.4","username":"u"}]}"#;
        let err = EngineConfigFile::from_json(json).unwrap_err();
        assert!(err.to_string().contains("empty hostname"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = EngineConfigFile::from_json(SAMPLE).unwrap();
        let debug = format!("{:?}", config.data[0]);
        assert!(!debug.contains("\"delphix\""));
        assert!(debug.contains("********"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfigFile::load_from_file("/nonexistent/dxtools.conf").unwrap_err();
        assert!(format!("{:#}", err).contains("Was unable to open"));
    }
}
