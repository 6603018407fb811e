//! Configuration parser for loading provider configuration files.
//!
//! This module handles loading configuration from YAML files and environment
//! variables, with proper precedence and error handling. Built-in resource
//! schemas are merged in for every kind the file does not define itself.

use crate::catalog;
use crate::error::{ConfigError, FabricError, Result};
use std::path::Path;
use tracing::{debug, info};

use super::spec::ProviderConfig;

/// Environment variable overriding `logging.level`.
pub const ENV_LOG_LEVEL: &str = "FABRIC_LOG_LEVEL";
/// Environment variable overriding `logging.json`.
pub const ENV_LOG_JSON: &str = "FABRIC_LOG_JSON";
/// Environment variable overriding `provider.schema_version`.
pub const ENV_SCHEMA_VERSION: &str = "FABRIC_SCHEMA_VERSION";

/// Configuration parser for loading provider configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<std::path::PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ProviderConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(FabricError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path)?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<ProviderConfig> {
        debug!("Parsing YAML configuration");

        let mut config: ProviderConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            FabricError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        merge_builtin(&mut config);

        debug!(
            "Parsed configuration for provider {} ({} resource kinds)",
            config.provider.name,
            config.resources.len()
        );
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// Recognized variables: `FABRIC_LOG_LEVEL`, `FABRIC_LOG_JSON` and
    /// `FABRIC_SCHEMA_VERSION`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if an
    /// override holds an invalid value.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<ProviderConfig> {
        let mut config = self.load_file(path)?;

        apply_overrides(&mut config, |name| std::env::var(name).ok())?;

        Ok(config)
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| std::path::PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                FabricError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Applies overrides read through `lookup` to the configuration.
fn apply_overrides(
    config: &mut ProviderConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(level) = lookup(ENV_LOG_LEVEL) {
        debug!("Overriding logging.level from environment");
        config.logging.level = level;
    }

    if let Some(json) = lookup(ENV_LOG_JSON) {
        debug!("Overriding logging.json from environment");
        config.logging.json = match json.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => return Err(invalid(ENV_LOG_JSON, &json)),
        };
    }

    if let Some(version) = lookup(ENV_SCHEMA_VERSION) {
        debug!("Overriding provider.schema_version from environment");
        let pinned = version
            .trim()
            .parse()
            .map_err(|_| invalid(ENV_SCHEMA_VERSION, &version))?;
        config.provider.schema_version = Some(pinned);
    }

    Ok(())
}

fn invalid(name: &str, value: &str) -> FabricError {
    FabricError::Config(ConfigError::InvalidEnvVar {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Appends every built-in schema whose kind the file does not define.
fn merge_builtin(config: &mut ProviderConfig) {
    for schema in catalog::builtin() {
        if config.resources.iter().all(|r| r.kind != schema.kind) {
            debug!("Using built-in schema for {}", schema.kind);
            config.resources.push(schema);
        }
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["fabric.provider.yaml", "fabric.provider.yml"];

/// Finds the configuration file in the current directory or parent directories.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<std::path::PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(FabricError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FieldKind;
    use std::collections::HashMap;

    const MINIMAL: &str = r"
provider:
  name: fabric
";

    #[test]
    fn test_parse_minimal_config() {
        let config = ConfigParser::new().parse_yaml(MINIMAL, None).unwrap();

        assert_eq!(config.provider.name, "fabric");
        assert_eq!(config.provider.schema_version, None);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.kinds(), vec![catalog::IPSEC_CONNECTOR, catalog::EDGE_CONNECTOR]);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
provider:
  name: fabric
  schema_version: 3
logging:
  level: "fabric_provider=debug"
  json: true
resources:
  - kind: connector_edge
    version: 3
    fields:
      - name: name
        kind: string
        required: true
    collections:
      - name: segment_options
        remote: segmentOptions
        shape: set
        set_since: 3
        key_field: zone_name
        fields:
          - name: zone_name
            remote: zoneName
            kind: string
          - name: customer_asn
            remote: customerAsn
            kind: int
            remote_kind: string
          - name: groups
            kind:
              set: string
"#;
        let config = ConfigParser::new().parse_yaml(yaml, None).unwrap();

        assert!(config.logging.json);
        let edge = config.resource(catalog::EDGE_CONNECTOR).unwrap();
        assert_eq!(edge.fields.len(), 1);
        let options = edge.collection("segment_options").unwrap();
        assert_eq!(options.set_since, Some(3));
        assert_eq!(options.fields[1].remote_shape(), &FieldKind::String);
        assert_eq!(options.fields[2].kind, FieldKind::Set(Box::new(FieldKind::String)));
        // The built-in IPsec schema is still merged in.
        assert!(config.resource(catalog::IPSEC_CONNECTOR).is_ok());
    }

    #[test]
    fn test_parse_error_has_location() {
        let err = ConfigParser::new()
            .parse_yaml("provider: [", Some(Path::new("fabric.provider.yaml")))
            .unwrap_err();

        match err {
            FabricError::Config(ConfigError::ParseError { location, .. }) => {
                assert_eq!(location.as_deref(), Some("fabric.provider.yaml"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fabric.provider.yaml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = ConfigParser::new().load_file(&path).unwrap();
        assert_eq!(config.provider.name, "fabric");

        let missing = ConfigParser::new().load_file(dir.path().join("absent.yaml"));
        assert!(matches!(
            missing,
            Err(FabricError::Config(ConfigError::FileNotFound { .. }))
        ));

        // A directory exists but cannot be read as a file.
        let unreadable = ConfigParser::new().load_file(dir.path());
        assert!(matches!(unreadable, Err(FabricError::Io(_))));
    }

    #[test]
    fn test_find_config_file_in_parent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("fabric.provider.yml"), MINIMAL).unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, dir.path().join("fabric.provider.yml"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ConfigParser::new().parse_yaml(MINIMAL, None).unwrap();
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_LOG_LEVEL, "debug"),
            (ENV_LOG_JSON, "yes"),
            (ENV_SCHEMA_VERSION, "4"),
        ]);

        apply_overrides(&mut config, |name| vars.get(name).map(ToString::to_string)).unwrap();

        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert_eq!(config.provider.schema_version, Some(4));
    }

    #[test]
    fn test_invalid_env_override() {
        let mut config = ConfigParser::new().parse_yaml(MINIMAL, None).unwrap();

        let err = apply_overrides(&mut config, |name| {
            (name == ENV_SCHEMA_VERSION).then(|| String::from("two"))
        })
        .unwrap_err();

        assert!(matches!(
            err,
            FabricError::Config(ConfigError::InvalidEnvVar { ref name, .. }) if name == ENV_SCHEMA_VERSION
        ));
    }

    #[test]
    fn test_load_dotenv_without_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ConfigParser::new().with_base_path(dir.path()).load_dotenv().is_ok());
    }
}
