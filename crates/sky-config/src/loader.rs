//! Loader for configurations split across several files.
//!
//! A file may name other files in a top-level `include` entry (a string or
//! an array of strings). Includes are resolved relative to the loader's base
//! directory and may themselves include further files. Every top-level
//! section must come from exactly one file.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Configuration loader that handles multi-file configurations with includes.
pub struct ConfigLoader {
	/// Base path for resolving relative includes.
	base_path: PathBuf,
	/// Canonical paths already read, for circular include detection.
	loaded_files: HashSet<PathBuf>,
	/// Which file each top-level section came from.
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads a configuration file and everything it includes.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let config_path = self.resolve_path(config_path)?;

		let mut combined = toml::Table::new();
		self.merge_file(&config_path, &mut combined).await?;

		let config_str = toml::to_string(&combined).map_err(|e| {
			ConfigError::Parse(format!("Failed to serialize combined config: {}", e))
		})?;
		config_str.parse()
	}

	/// Reads one file, merges its sections into `combined` and recurses into
	/// its includes.
	async fn merge_file(
		&mut self,
		path: &Path,
		combined: &mut toml::Table,
	) -> Result<(), ConfigError> {
		let content = self.load_file(path).await?;
		let mut table: toml::Table = toml::from_str(&content)?;
		let includes = Self::extract_includes(&mut table)?;

		for (key, value) in table {
			if let Some(existing_source) = self.section_sources.get(&key) {
				return Err(ConfigError::Validation(format!(
					"Duplicate section '{}' found in {} and {}. \
					Each top-level section must be unique across all configuration files.",
					key,
					existing_source.display(),
					path.display()
				)));
			}
			self.section_sources.insert(key.clone(), path.to_path_buf());
			combined.insert(key, value);
		}

		for include in includes {
			let resolved = self.resolve_path(&include)?;
			Box::pin(self.merge_file(&resolved, combined)).await?;
		}

		Ok(())
	}

	/// Reads a file once and resolves environment variables in it.
	async fn load_file(&mut self, path: &Path) -> Result<String, ConfigError> {
		let canonical_path = tokio::fs::canonicalize(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;

		if !self.loaded_files.insert(canonical_path.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical_path.display()
			)));
		}

		let content = tokio::fs::read_to_string(path).await?;
		resolve_env_vars(&content)
	}

	/// Removes and returns the include directive of a parsed file.
	fn extract_includes(table: &mut toml::Table) -> Result<Vec<PathBuf>, ConfigError> {
		match table.remove("include") {
			None => Ok(Vec::new()),
			Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
			Some(toml::Value::Array(items)) => items
				.into_iter()
				.map(|item| match item {
					toml::Value::String(path) => Ok(PathBuf::from(path)),
					_ => Err(ConfigError::Validation(
						"Include array must contain only strings".into(),
					)),
				})
				.collect(),
			Some(_) => Err(ConfigError::Validation(
				"Include must be a string or array of strings".into(),
			)),
		}
	}

	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();
		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}

		Ok(resolved)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	const BACKENDS: &str = r#"
[storage]
primary = "memory"
[storage.implementations.memory]

[cache]
primary = "memory"
[cache.implementations.memory]

[catalog]
primary = "memory"
[catalog.implementations.memory]

[payment]
primary = "mock"
[payment.implementations.mock]
"#;

	#[tokio::test]
	async fn test_single_file_config() {
		let temp_dir = TempDir::new().unwrap();
		let config_path = temp_dir.path().join("config.toml");
		fs::write(
			&config_path,
			format!("[shop]\nid = \"single\"\n{}", BACKENDS),
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config(&config_path).await.unwrap();

		assert_eq!(config.shop.id, "single");
	}

	#[tokio::test]
	async fn test_config_with_includes() {
		let temp_dir = TempDir::new().unwrap();

		let main_config = r#"
include = ["backends.toml"]

[shop]
id = "split"
"#;
		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("backends.toml"), BACKENDS).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("main.toml").await.unwrap();

		assert_eq!(config.shop.id, "split");
		assert_eq!(config.cache.primary, "memory");
	}

	#[tokio::test]
	async fn test_nested_includes() {
		let temp_dir = TempDir::new().unwrap();

		fs::write(
			temp_dir.path().join("main.toml"),
			"include = \"shop.toml\"\n[reconciler]\nhour = 3\n",
		)
		.unwrap();
		fs::write(
			temp_dir.path().join("shop.toml"),
			"include = [\"backends.toml\"]\n[shop]\nid = \"nested\"\n",
		)
		.unwrap();
		fs::write(temp_dir.path().join("backends.toml"), BACKENDS).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("main.toml").await.unwrap();

		assert_eq!(config.shop.id, "nested");
		assert_eq!(config.reconciler.hour, 3);
		assert_eq!(config.payment.primary, "mock");
	}

	#[tokio::test]
	async fn test_duplicate_section_error() {
		let temp_dir = TempDir::new().unwrap();

		fs::write(
			temp_dir.path().join("main.toml"),
			"include = [\"duplicate.toml\"]\n[shop]\nid = \"one\"\n",
		)
		.unwrap();
		fs::write(
			temp_dir.path().join("duplicate.toml"),
			"[shop]\nid = \"two\"\n",
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let error_msg = loader
			.load_config("main.toml")
			.await
			.unwrap_err()
			.to_string();

		assert!(error_msg.contains("Duplicate section 'shop'"));
	}

	#[tokio::test]
	async fn test_self_include_detection() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(
			temp_dir.path().join("self.toml"),
			"include = [\"self.toml\"]\n[shop]\nid = \"loop\"\n",
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let error_msg = loader
			.load_config("self.toml")
			.await
			.unwrap_err()
			.to_string();

		assert!(error_msg.contains("already loaded"));
	}

	#[tokio::test]
	async fn test_missing_include() {
		let temp_dir = TempDir::new().unwrap();
		fs::write(
			temp_dir.path().join("main.toml"),
			"include = [\"absent.toml\"]\n[shop]\nid = \"x\"\n",
		)
		.unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let err = loader.load_config("main.toml").await.unwrap_err();
		assert!(err.to_string().contains("not found"));
	}
}
