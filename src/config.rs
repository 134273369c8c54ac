//! Profile-keyed YAML configuration.
//!
//! ```yaml
//! cloudflare:
//!   email: me@example.com
//!   method: token
//!   key: abc
//!   zone_id: Z1
//!   record_name: home.example.com
//!   time_to_live: "120"
//!   proxy: false
//! ```
//!
//! Every top-level key names a profile. Only one profile is reconciled per
//! run (`cloudflare` unless `--profile` says otherwise); the rest are parsed
//! and ignored.
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::args::Args;
use crate::clients::cloudflare::CLOUDFLARE_API_BASE;
use crate::error::{Error, Result};
use crate::ip::DEFAULT_IP_SERVICE;

/// Profile acted upon when none is named on the command line.
pub const DEFAULT_PROFILE: &str = "cloudflare";

/// How requests to Cloudflare authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum AuthMethod {
    /// Account email plus global API key.
    Global,
    /// Scoped API token sent as a bearer credential.
    #[default]
    Token,
}

impl From<String> for AuthMethod {
    fn from(method: String) -> Self {
        if method == "global" {
            AuthMethod::Global
        } else {
            AuthMethod::Token
        }
    }
}

/// Settings for one DNS provider account and the record it keeps current.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub email: String,
    pub method: AuthMethod,
    pub key: String,
    pub zone_id: String,
    pub record_name: String,
    /// Sent to the provider exactly as written in the file.
    #[serde(rename = "time_to_live", deserialize_with = "text_or_number")]
    pub ttl: String,
    pub proxy: bool,
    /// Channel name to arbitrary settings. Parsed but never delivered to.
    pub notifications: Option<HashMap<String, HashMap<String, serde_yaml::Value>>>,
}

// The key never reaches logs.
impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("email", &self.email)
            .field("method", &self.method)
            .field("key", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("record_name", &self.record_name)
            .field("ttl", &self.ttl)
            .field("proxy", &self.proxy)
            .field("notifications", &self.notifications)
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Number(serde_yaml::Number),
}

/// Accepts `time_to_live: "120"` and `time_to_live: 120` alike.
fn text_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match TextOrNumber::deserialize(deserializer)? {
        TextOrNumber::Text(text) => text,
        TextOrNumber::Number(number) => number.to_string(),
    })
}

/// All profiles found in a configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Config {
    pub profiles: BTreeMap<String, Profile>,
}

impl Config {
    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// `Error::Config` if the file cannot be read or is not a mapping of
    /// profile names to profiles.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "unable to load configuration file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("unable to parse configuration: {}", e)))
    }

    /// Look up a profile by name.
    pub fn profile(&self, name: &str) -> Result<&Profile> {
        self.profiles.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
            Error::Config(format!(
                "no '{}' profile in configuration (found: {})",
                name,
                if known.is_empty() { "none".to_string() } else { known.join(", ") }
            ))
        })
    }
}

/// Everything one run needs: the selected profile plus command-line overrides.
#[derive(Debug, Clone)]
pub struct Settings {
    pub profile: Profile,
    /// Address given on the command line; skips the IP service when set.
    pub ip: Option<String>,
    pub web: String,
    pub server: String,
    pub timeout: Option<u64>,
    pub test: bool,
}

impl Settings {
    /// Combine a parsed file with CLI arguments. CLI values win; anything the
    /// CLI leaves unset falls back to the built-in endpoints.
    pub fn merge(config: Config, args: &Args) -> Result<Self> {
        let profile = config.profile(&args.profile)?.clone();

        Ok(Settings {
            profile,
            ip: args.ip.clone(),
            web: args
                .web
                .clone()
                .unwrap_or_else(|| DEFAULT_IP_SERVICE.to_string()),
            server: args
                .server
                .clone()
                .unwrap_or_else(|| CLOUDFLARE_API_BASE.to_string()),
            timeout: args.timeout,
            test: args.test,
        })
    }

    /// Load the file named by `args.config` and merge it with `args`.
    pub fn load(args: &Args) -> Result<Self> {
        let config = Config::from_file(&args.config)?;
        log::debug!(
            "loaded {} profile(s) from {}",
            config.profiles.len(),
            args.config.display()
        );
        Self::merge(config, args)
    }
}
