use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSection {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            title: "Plinth".into(),
            width: 540,
            height: 540,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    pub path: PathBuf,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("assets/model.glb"),
        }
    }
}

/// Initial values for the three scale inputs, kept as text because the
/// inputs themselves are free-form text.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleSection {
    pub x: String,
    pub y: String,
    pub z: String,
}

impl Default for ScaleSection {
    fn default() -> Self {
        Self {
            x: "0.1".into(),
            y: "0.1".into(),
            z: "0.1".into(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window: WindowSection,
    pub model: ModelSection,
    pub scale: ScaleSection,
}

/// Reads `plinth.toml` next to the binary if present, otherwise falls back
/// to the built-in defaults. A malformed file is reported and ignored.
pub fn load_or_default(path: impl AsRef<Path>) -> ViewerConfig {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(text) => match toml::from_str(&text) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("ignoring malformed config {}: {err}", path.display());
                ViewerConfig::default()
            }
        },
        Err(_) => ViewerConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() {
        let config = ViewerConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: ViewerConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.window.title, "Plinth");
        assert_eq!(back.window.width, 540);
        assert_eq!(back.model.path, PathBuf::from("assets/model.glb"));
        assert_eq!(back.scale.x, "0.1");
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let config: ViewerConfig = toml::from_str(
            r#"
[model]
path = "assets/lantern.glb"
"#,
        )
        .unwrap();
        assert_eq!(config.model.path, PathBuf::from("assets/lantern.glb"));
        assert_eq!(config.window.height, 540);
        assert_eq!(config.scale.z, "0.1");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_or_default("does/not/exist.toml");
        assert_eq!(config.window.title, "Plinth");
    }
}
