//! # Config Loader
//!
//! 读取推流配置 (TOML 为主，JSON 亦可)，校验后得到 `StreamBlueprint`。
//! 命令行覆盖项应用之后需再次调用 [`ConfigLoader::validate`]。
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("streamer.toml")).unwrap();
//! println!("video on '{}', telemetry on '{}'", blueprint.video.topic, blueprint.telemetry.topic);
//! ```

mod parser;
mod validator;

pub use contracts::StreamBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Read, parse and validate a config file
    ///
    /// `.json` selects JSON; `.toml` or no extension selects TOML.
    ///
    /// # Errors
    /// `ConfigParse` for unreadable files, unknown extensions and syntax errors;
    /// `ConfigValidation` for out-of-range values
    pub fn load_from_path(path: &Path) -> Result<StreamBlueprint, ContractError> {
        let format = match path.extension().and_then(|e| e.to_str()) {
            None => ConfigFormat::Toml,
            Some(ext) => ConfigFormat::from_extension(ext).ok_or_else(|| {
                ContractError::config_parse(format!("unsupported config format: .{ext}"))
            })?,
        };
        let content = std::fs::read_to_string(path).map_err(|e| ContractError::ConfigParse {
            message: format!("cannot read {}: {e}", path.display()),
            source: Some(Box::new(e)),
        })?;
        Self::load_from_str(&content, format)
    }

    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<StreamBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    pub fn validate(blueprint: &StreamBlueprint) -> Result<(), ContractError> {
        validator::validate(blueprint)
    }

    /// Effective configuration as TOML (printed by `info --toml`)
    pub fn to_toml(blueprint: &StreamBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL_TOML: &str = r#"
[transport]
host = "65.0.71.42"
port = 1883

[video]
topic = "test"

[video.source]
kind = "image_sequence"
path = "frames"
fps = 25.0

[telemetry]
topic = "drone/gps"
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.transport.host, "65.0.71.42");
        assert_eq!(bp.video.source.kind_name(), "image_sequence");
    }

    #[test]
    fn test_round_trip_toml() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.transport.host, bp2.transport.host);
        assert_eq!(bp.video.source, bp2.video.source);
        assert_eq!(bp.rate, bp2.rate);
    }

    #[test]
    fn test_json_file_with_same_content() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(serde_json::to_string(&bp).unwrap().as_bytes())
            .unwrap();

        let bp2 = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(bp.telemetry, bp2.telemetry);
        assert_eq!(bp.video.source, bp2.video.source);
    }

    #[test]
    fn test_extensionless_file_is_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streamer");
        std::fs::write(&path, MINIMAL_TOML).unwrap();
        assert_eq!(
            ConfigLoader::load_from_path(&path).unwrap().transport.host,
            "65.0.71.42"
        );
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = ConfigLoader::load_from_path(Path::new("/nonexistent/streamer.toml"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("/nonexistent/streamer.toml"), "got: {err}");
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = r#"
[video]
topic = "shared"

[telemetry]
topic = "shared"
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("must differ"));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(MINIMAL_TOML.as_bytes()).unwrap();

        let bp = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(bp.video.topic, "test");
    }

    #[test]
    fn test_load_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = ConfigLoader::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }
}
