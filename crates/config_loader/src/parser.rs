//! Config parsing module
//!
//! YAML (primary), JSON and TOML are supported.

use contracts::ContractError;

use crate::document::RawDocument;

/// Config file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML (recommended)
    Yaml,
    /// JSON
    Json,
    /// TOML
    Toml,
}

impl ConfigFormat {
    /// Infer format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }
}

/// Parse YAML. `~` or a comment-only file count as empty.
pub fn parse_yaml(content: &str) -> Result<RawDocument, ContractError> {
    let document: Option<RawDocument> = serde_yaml::from_str(content)
        .map_err(|e| ContractError::config_invalid_with(format!("YAML parse error: {e}"), e))?;
    document.ok_or_else(|| ContractError::config_invalid("config file is empty"))
}

/// Parse JSON
pub fn parse_json(content: &str) -> Result<RawDocument, ContractError> {
    serde_json::from_str(content)
        .map_err(|e| ContractError::config_invalid_with(format!("JSON parse error: {e}"), e))
}

/// Parse TOML
pub fn parse_toml(content: &str) -> Result<RawDocument, ContractError> {
    toml::from_str(content)
        .map_err(|e| ContractError::config_invalid_with(format!("TOML parse error: {e}"), e))
}

/// Parse according to format. Blank input is rejected for every format.
pub fn parse(content: &str, format: ConfigFormat) -> Result<RawDocument, ContractError> {
    if content.trim().is_empty() {
        return Err(ContractError::config_invalid("config file is empty"));
    }

    match format {
        ConfigFormat::Yaml => parse_yaml(content),
        ConfigFormat::Json => parse_json(content),
        ConfigFormat::Toml => parse_toml(content),
    }
}

/// Serialize a document back to text
pub fn serialize(document: &RawDocument, format: ConfigFormat) -> Result<String, ContractError> {
    match format {
        ConfigFormat::Yaml => serde_yaml::to_string(document)
            .map_err(|e| ContractError::config_invalid(format!("YAML serialize error: {e}"))),
        ConfigFormat::Json => serde_json::to_string_pretty(document)
            .map_err(|e| ContractError::config_invalid(format!("JSON serialize error: {e}"))),
        ConfigFormat::Toml => toml::to_string_pretty(document)
            .map_err(|e| ContractError::config_invalid(format!("TOML serialize error: {e}"))),
    }
}
