//! Provider field table.
//!
//! Maps every provider profile to the ordered list of source columns accepted
//! for each logical record field. The table is loaded once at startup (the
//! embedded default, or `PROVIDERS_FILE`) and validated before the service
//! accepts traffic.

use crate::models::Origin;
use config::{Config, File, FileFormat};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

const DEFAULT_PROVIDERS: &str = include_str!("../../providers.toml");

/// Profile used for the provider/merchant side when the caller names none.
pub const MERCHANT_PROFILE: &str = "merchant";
/// Profile used for the platform side when the caller names none.
pub const PLATFORM_PROFILE: &str = "platform";

#[derive(Debug, Error)]
pub enum FieldTableError {
    #[error("failed to load field table: {0}")]
    Load(#[from] config::ConfigError),

    #[error("profile '{profile}': {reason}")]
    Invalid { profile: String, reason: String },

    #[error("required profile '{0}' is missing")]
    MissingProfile(String),
}

/// One provider's column layout.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderProfile {
    #[serde(skip)]
    pub name: String,
    pub side: Origin,
    pub delimiter: String,
    pub id: Vec<String>,
    #[serde(default)]
    pub status: Vec<String>,
    pub amount: Vec<String>,
    #[serde(default)]
    pub timestamp: Vec<String>,
    #[serde(default)]
    pub payment_method: Vec<String>,
    #[serde(default)]
    pub company: Vec<String>,
    #[serde(default)]
    pub currency: Vec<String>,
    #[serde(default)]
    pub id_keywords: Vec<String>,
    #[serde(default)]
    pub detect_keywords: Vec<String>,
}

impl ProviderProfile {
    /// The delimiter as the single byte the decoder expects.
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes().first().copied().unwrap_or(b',')
    }

    fn validate(&self) -> Result<(), FieldTableError> {
        let invalid = |reason: &str| FieldTableError::Invalid {
            profile: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.delimiter.len() != 1 || !self.delimiter.is_ascii() {
            return Err(invalid("delimiter must be a single ASCII character"));
        }
        if self.id.is_empty() {
            return Err(invalid("at least one id column is required"));
        }
        if self.amount.is_empty() {
            return Err(invalid("at least one amount column is required"));
        }
        if self.id.iter().chain(&self.amount).any(|c| c.trim().is_empty()) {
            return Err(invalid("column names must not be blank"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldTable {
    profiles: BTreeMap<String, ProviderProfile>,
}

impl FieldTable {
    /// Load the embedded default table.
    pub fn embedded() -> Result<Self, FieldTableError> {
        Self::from_source(File::from_str(DEFAULT_PROVIDERS, FileFormat::Toml))
    }

    /// Load a table from a TOML file on disk.
    pub fn from_file(path: &Path) -> Result<Self, FieldTableError> {
        Self::from_source(File::from(path).format(FileFormat::Toml))
    }

    /// Parse a table from a TOML string.
    pub fn from_toml(source: &str) -> Result<Self, FieldTableError> {
        Self::from_source(File::from_str(source, FileFormat::Toml))
    }

    fn from_source<S>(source: S) -> Result<Self, FieldTableError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let mut table: FieldTable = Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;

        for (name, profile) in table.profiles.iter_mut() {
            profile.name = name.clone();
        }
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<(), FieldTableError> {
        for required in [MERCHANT_PROFILE, PLATFORM_PROFILE] {
            if !self.profiles.contains_key(required) {
                return Err(FieldTableError::MissingProfile(required.to_string()));
            }
        }
        self.profiles.values().try_for_each(ProviderProfile::validate)
    }

    pub fn get(&self, name: &str) -> Option<&ProviderProfile> {
        self.profiles.get(&name.to_lowercase())
    }

    /// The default profile for a side of the reconciliation.
    pub fn default_for(&self, side: Origin) -> &ProviderProfile {
        let name = match side {
            Origin::Merchant => MERCHANT_PROFILE,
            Origin::Platform => PLATFORM_PROFILE,
        };
        // Presence of both defaults is checked in `validate`.
        &self.profiles[name]
    }

    pub fn profiles(&self) -> impl Iterator<Item = &ProviderProfile> {
        self.profiles.values()
    }
}
