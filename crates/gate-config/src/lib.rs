//! Configuration module for the allowance gate.
//!
//! This module provides structures and utilities for managing gate configuration.
//! It supports loading configuration from TOML files and provides validation to ensure
//! all required configuration values are properly set.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files for better organization:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

#[cfg(any(test, feature = "testing"))]
pub mod builders;
mod loader;

pub use loader::ConfigLoader;

use gate_types::{Address, MessageLayout, NonceScope};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		let message = err.message().to_string();
		ConfigError::Parse(message)
	}
}

/// Main configuration structure for the allowance gate.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity and verification settings of the gate instance.
	pub gate: GateConfig,
	/// Configuration for the nonce ledger backend.
	pub ledger: LedgerConfig,
	/// Configuration for the issuance sink.
	pub issuance: IssuanceConfig,
	/// Authorizer key, used by the signing tool only.
	pub account: Option<AccountConfig>,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Identity and verification settings of the gate instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GateConfig {
	/// Unique identifier for this gate instance, used in logs.
	pub id: String,
	/// Verifying context bound into every signed message.
	pub context: Address,
	/// Address whose signatures are accepted at startup.
	pub trusted_signer: Address,
	/// Tier tiered identifiers must carry at startup.
	#[serde(default)]
	pub initial_tier: u64,
	/// How consumed identifiers are keyed.
	#[serde(default)]
	pub nonce_scope: NonceScope,
	/// Byte layout of the signed message.
	#[serde(default)]
	pub message_layout: MessageLayout,
}

/// Configuration for the nonce ledger backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of ledger implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the issuance sink.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IssuanceConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of issuance implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the authorizer account.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of account implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Maximum request size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	/// Mounts the signer rotation and tier routes.
	///
	/// These routes carry no authentication of their own.
	#[serde(default)]
	pub admin_enabled: bool,
}

/// Returns the default API host.
fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

/// Returns the default API port.
fn default_api_port() -> u16 {
	3000
}

/// Returns the default API timeout in seconds.
fn default_api_timeout() -> u64 {
	30
}

/// Returns the default maximum request size in bytes.
fn default_max_request_size() -> usize {
	1024 * 1024 // 1MB
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024; // 1MB
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let var_name = var_name.as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => {
				if let Some(default) = default_value {
					default.to_string()
				} else {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)));
				}
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

/// Resolves environment variables in every string value of `value`.
///
/// Keys and comments are never resolved; comments are already gone once the
/// document has been parsed.
fn resolve_env_vars_in_value(value: &mut toml::Value) -> Result<(), ConfigError> {
	match value {
		toml::Value::String(s) => {
			if s.contains("${") {
				*s = resolve_env_vars(s)?;
			}
		},
		toml::Value::Array(items) => {
			for item in items.iter_mut() {
				resolve_env_vars_in_value(item)?;
			}
		},
		toml::Value::Table(table) => {
			for (_, item) in table.iter_mut() {
				resolve_env_vars_in_value(item)?;
			}
		},
		_ => {},
	}
	Ok(())
}

/// Checks that `primary` names one of `implementations`.
fn validate_primary(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if implementations.is_empty() {
		return Err(ConfigError::Validation(format!(
			"At least one {} implementation must be configured",
			section
		)));
	}
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} '{}' not found in implementations",
			section, primary
		)));
	}
	Ok(())
}

impl Config {
	/// Loads configuration from a file with async environment variable resolution.
	///
	/// This method supports modular configuration through include directives:
	/// - `include = ["file1.toml", "file2.toml"]` - Include specific files
	///
	/// Each top-level section must be unique across all configuration files.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Builds a configuration from a parsed document.
	///
	/// Resolves environment variables in string values, then deserializes and
	/// validates.
	pub(crate) fn from_value(mut value: toml::Value) -> Result<Self, ConfigError> {
		resolve_env_vars_in_value(&mut value)?;
		let config: Config = value.try_into()?;
		config.validate()?;
		Ok(config)
	}

	/// Validates the configuration to ensure all required fields are properly set.
	///
	/// Per-implementation tables are checked against their own schemas when the
	/// gate is built.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.gate.id.is_empty() {
			return Err(ConfigError::Validation("Gate ID cannot be empty".into()));
		}
		if self.gate.context.is_zero() {
			return Err(ConfigError::Validation(
				"Gate context cannot be the zero address".into(),
			));
		}
		if self.gate.trusted_signer.is_zero() {
			return Err(ConfigError::Validation(
				"Trusted signer cannot be the zero address".into(),
			));
		}

		validate_primary("ledger", &self.ledger.primary, &self.ledger.implementations)?;
		validate_primary(
			"issuance",
			&self.issuance.primary,
			&self.issuance.implementations,
		)?;
		if let Some(ref account) = self.account {
			validate_primary("account", &account.primary, &account.implementations)?;
		}

		if let Some(ref api) = self.api {
			if api.enabled {
				if api.port == 0 {
					return Err(ConfigError::Validation("API port cannot be 0".into()));
				}
				if api.timeout_seconds == 0 {
					return Err(ConfigError::Validation(
						"API timeout_seconds must be greater than 0".into(),
					));
				}
			}
		}

		Ok(())
	}
}

/// Implementation of FromStr trait for Config to enable parsing from string.
///
/// Environment variables are resolved in string values and the configuration
/// is validated after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let table: toml::Table = toml::from_str(s)?;
		Config::from_value(toml::Value::Table(table))
	}
}
