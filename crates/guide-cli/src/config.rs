//! Engine configuration: defaults, then `guided.toml`, then `GUIDED_*` variables.

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use guide_spec::EngineConfig;

const DEFAULT_CONFIG_FILE: &str = "guided.toml";

/// Loads the engine configuration.
///
/// An explicit `path` must exist; the default `guided.toml` is optional.
/// Nested keys use `__` in environment variables, e.g.
/// `GUIDED_TEMPLATES__STRICT=true`.
pub fn load(path: Option<&Path>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));
    match path {
        Some(path) if !path.is_file() => {
            return Err(format!("config file {} does not exist", path.display()).into());
        }
        Some(path) => figment = figment.merge(Toml::file(path)),
        None => figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE)),
    }
    let config = figment
        .merge(Env::prefixed("GUIDED_").split("__"))
        .extract()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn reads_toml_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("engine.toml");
        fs::write(
            &path,
            "[templates]\nstrict = true\n\n[build]\nallow_forward_references = true\n",
        )
        .expect("write");
        let config = load(Some(&path)).expect("config");
        assert!(config.templates.strict);
        assert!(config.build.allow_forward_references);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = TempDir::new().expect("tempdir");
        assert!(load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
