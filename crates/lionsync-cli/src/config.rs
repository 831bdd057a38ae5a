//! CLI configuration.

use anyhow::{bail, Context, Result};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Encoding of a message file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    /// One JSON message per line
    #[default]
    Json,
    /// A CBOR array of messages
    Cbor,
}

impl WireFormat {
    /// Tell the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" | "jsonl" | "ndjson" => Some(Self::Json),
            "cbor" => Some(Self::Cbor),
            _ => None,
        }
    }
}

impl FromStr for WireFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "cbor" => Ok(Self::Cbor),
            other => bail!("unknown wire format '{other}', expected 'json' or 'cbor'"),
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Cbor => "cbor",
        })
    }
}

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Participation replayed commands are attributed to; random if unset
    pub participation_id: Option<String>,

    /// Format of files whose extension says nothing
    pub format: WireFormat,

    /// Drop duplicate events and stop at sequence gaps during replay
    pub enforce_sequence: bool,

    /// Language definition files (JSON) used by replay
    pub languages: Vec<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            participation_id: None,
            format: WireFormat::Json,
            enforce_sequence: true,
            languages: Vec::new(),
        }
    }
}

impl CliConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LIONSYNC_PARTICIPATION_ID`: participation for replayed commands
    /// - `LIONSYNC_FORMAT`: "json" or "cbor"
    /// - `LIONSYNC_ENFORCE_SEQUENCE`: "true" or "false"
    /// - `LIONSYNC_LANGUAGES`: language files, separated like `PATH`
    ///
    /// # Errors
    ///
    /// Returns error if a variable holds an unparseable value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(id) = lookup("LIONSYNC_PARTICIPATION_ID") {
            config.participation_id = Some(id);
        }

        if let Some(format) = lookup("LIONSYNC_FORMAT") {
            config.format = format.parse().context("Invalid LIONSYNC_FORMAT")?;
        }

        if let Some(flag) = lookup("LIONSYNC_ENFORCE_SEQUENCE") {
            config.enforce_sequence =
                parse_flag(&flag).context("Invalid LIONSYNC_ENFORCE_SEQUENCE")?;
        }

        if let Some(paths) = lookup("LIONSYNC_LANGUAGES") {
            config.languages = env::split_paths(&paths)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }

        Ok(config)
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got '{other}'"),
    }
}
