//! Multi-file configuration loading.
//!
//! A file may name other files through a top-level `include` key holding a
//! string or an array of strings. Includes are resolved relative to the
//! including file, may themselves include further files, and are merged into
//! one table. A top-level section may appear in only one file, and a file may
//! not be reached twice along one include chain.

use crate::{Config, ConfigError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Loads a configuration file together with everything it includes.
pub struct ConfigLoader {
	/// Directory relative paths passed to `load_config` are resolved against.
	base_path: PathBuf,
	/// Files currently being expanded, outermost first.
	include_stack: Vec<PathBuf>,
	/// File each merged top-level section came from.
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	/// Creates a loader resolving relative paths against `base_path`.
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			include_stack: Vec::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads, merges and validates the configuration rooted at `config_path`.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		self.include_stack.clear();
		self.section_sources.clear();

		let root = resolve_existing(&self.base_path, config_path.as_ref())?;
		let mut merged = toml::map::Map::new();
		self.expand(root, &mut merged).await?;

		Config::from_value(toml::Value::Table(merged))
	}

	/// Merges `path` and, depth first, the files it includes into `merged`.
	async fn expand(
		&mut self,
		path: PathBuf,
		merged: &mut toml::map::Map<String, toml::Value>,
	) -> Result<(), ConfigError> {
		let canonical = path.canonicalize().map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;
		if self.include_stack.contains(&canonical) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical.display()
			)));
		}

		let content = tokio::fs::read_to_string(&canonical).await?;
		let mut table: toml::map::Map<String, toml::Value> = toml::from_str(&content)?;
		let includes = match table.remove("include") {
			Some(value) => include_paths(&value)?,
			None => Vec::new(),
		};

		for (section, value) in table {
			if let Some(existing) = self.section_sources.get(&section) {
				return Err(ConfigError::Validation(format!(
					"Duplicate section '{}' found in {} and {}. \
					Each top-level section must be unique across all configuration files.",
					section,
					existing.display(),
					canonical.display()
				)));
			}
			self.section_sources.insert(section.clone(), canonical.clone());
			merged.insert(section, value);
		}

		let parent = canonical
			.parent()
			.map(Path::to_path_buf)
			.unwrap_or_else(|| self.base_path.clone());
		self.include_stack.push(canonical);
		for include in includes {
			let resolved = resolve_existing(&parent, &include)?;
			Box::pin(self.expand(resolved, merged)).await?;
		}
		self.include_stack.pop();

		Ok(())
	}
}

/// Reads the `include` value as a list of paths.
fn include_paths(value: &toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
	match value {
		toml::Value::String(path) => Ok(vec![PathBuf::from(path)]),
		toml::Value::Array(items) => items
			.iter()
			.map(|item| {
				item.as_str().map(PathBuf::from).ok_or_else(|| {
					ConfigError::Validation("Include array must contain only strings".into())
				})
			})
			.collect(),
		_ => Err(ConfigError::Validation(
			"Include must be a string or array of strings".into(),
		)),
	}
}

/// Joins a relative `path` onto `base` and checks that the file exists.
fn resolve_existing(base: &Path, path: &Path) -> Result<PathBuf, ConfigError> {
	let resolved = if path.is_absolute() {
		path.to_path_buf()
	} else {
		base.join(path)
	};

	if !resolved.exists() {
		return Err(ConfigError::Io(std::io::Error::new(
			std::io::ErrorKind::NotFound,
			format!("Configuration file not found: {}", resolved.display()),
		)));
	}

	Ok(resolved)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	const GATE: &str = r#"
[gate]
id = "test-gate"
context = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
trusted_signer = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
initial_tier = 1
"#;

	const BACKENDS: &str = r#"
[ledger]
primary = "memory"
[ledger.implementations.memory]

[issuance]
primary = "memory"
[issuance.implementations.memory]
"#;

	#[tokio::test]
	async fn test_single_file_config() {
		let temp_dir = TempDir::new().unwrap();
		let config_path = temp_dir.path().join("config.toml");
		fs::write(&config_path, format!("{}{}", GATE, BACKENDS)).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config(&config_path).await.unwrap();

		assert_eq!(config.gate.id, "test-gate");
		assert_eq!(config.gate.initial_tier, 1);
	}

	#[tokio::test]
	async fn test_config_with_includes() {
		let temp_dir = TempDir::new().unwrap();

		let main_config = format!("include = [\"backends.toml\"]\n{}", GATE);
		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("backends.toml"), BACKENDS).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("main.toml").await.unwrap();

		assert_eq!(config.gate.id, "test-gate");
		assert_eq!(config.ledger.primary, "memory");
	}

	#[tokio::test]
	async fn test_duplicate_section_error() {
		let temp_dir = TempDir::new().unwrap();

		let main_config = format!("include = [\"duplicate.toml\"]\n{}", GATE);
		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("duplicate.toml"), GATE).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let result = loader.load_config("main.toml").await;

		let error_msg = result.unwrap_err().to_string();
		assert!(error_msg.contains("Duplicate section 'gate'"));
	}

	#[tokio::test]
	async fn test_self_include_detection() {
		let temp_dir = TempDir::new().unwrap();

		let config = format!("include = [\"self.toml\"]\n{}", GATE);
		fs::write(temp_dir.path().join("self.toml"), config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let result = loader.load_config("self.toml").await;

		let error_msg = result.unwrap_err().to_string();
		assert!(error_msg.contains("already loaded"));
	}

	#[tokio::test]
	async fn test_nested_includes_resolve_relative_to_includer() {
		let temp_dir = TempDir::new().unwrap();
		fs::create_dir(temp_dir.path().join("conf")).unwrap();

		let main_config = format!("include = \"conf/backends.toml\"\n{}", GATE);
		let backends = "include = [\"api.toml\"]\n".to_string() + BACKENDS;
		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("conf/backends.toml"), backends).unwrap();
		fs::write(
			temp_dir.path().join("conf/api.toml"),
			"[api]\nenabled = true\nport = 8080\n",
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("main.toml").await.unwrap();

		assert_eq!(config.api.unwrap().port, 8080);
	}

	#[tokio::test]
	async fn test_include_cycle_detected() {
		let temp_dir = TempDir::new().unwrap();

		fs::write(
			temp_dir.path().join("a.toml"),
			format!("include = \"b.toml\"\n{}", GATE),
		)
		.unwrap();
		fs::write(
			temp_dir.path().join("b.toml"),
			"include = \"a.toml\"\n".to_string() + BACKENDS,
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let error_msg = loader.load_config("a.toml").await.unwrap_err().to_string();
		assert!(error_msg.contains("Circular include"));
	}

	#[tokio::test]
	async fn test_env_vars_resolved_in_included_values_only() {
		let temp_dir = TempDir::new().unwrap();
		std::env::set_var("GATE_LOADER_TEST_ID", "from-env");

		let main_config = format!(
			"# Override the id with ${{GATE_LOADER_UNSET}} if needed.\ninclude = \"backends.toml\"\n{}",
			GATE.replace("\"test-gate\"", "\"${GATE_LOADER_TEST_ID}\"")
		);
		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("backends.toml"), BACKENDS).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("main.toml").await.unwrap();
		std::env::remove_var("GATE_LOADER_TEST_ID");

		assert_eq!(config.gate.id, "from-env");
	}

	#[tokio::test]
	async fn test_missing_include_reported() {
		let temp_dir = TempDir::new().unwrap();

		let config = format!("include = \"absent.toml\"\n{}", GATE);
		fs::write(temp_dir.path().join("main.toml"), config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let result = loader.load_config("main.toml").await;

		assert!(matches!(result, Err(ConfigError::Io(_))));
	}
}
