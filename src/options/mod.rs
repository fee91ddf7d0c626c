//! Centralized rendering options with TOML preset support.
//!
//! Lighting, geometry sizing and output target settings are consolidated
//! here. Options serialize to/from TOML so a viewer can persist presets.

mod geometry;
mod lighting;
mod output;

use std::path::Path;

pub use geometry::{GeometryOptions, DEFAULT_SPHERE_RADIUS};
pub use lighting::LightingOptions;
pub use output::{ColorFormat, OutputOptions};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::AnnotationError;

/// Top-level options container. All sub-structs use `#[serde(default)]` so
/// partial TOML files (e.g. only overriding `[lighting]`) work correctly.
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema,
)]
#[serde(default)]
pub struct Options {
    /// Shading parameters.
    pub lighting: LightingOptions,
    /// Radii, billboard sizing and selection highlight.
    pub geometry: GeometryOptions,
    /// Render target formats.
    #[schemars(skip)]
    pub output: OutputOptions,
}

impl Options {
    /// Generate JSON Schema describing the UI-exposed options.
    #[must_use]
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Options)
    }

    /// Load options from a TOML file. Missing fields use defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AnnotationError::Io`] if the file cannot be read and
    /// [`AnnotationError::OptionsParse`] if it is not valid TOML.
    pub fn load(path: &Path) -> Result<Self, AnnotationError> {
        let content = std::fs::read_to_string(path)?;
        let options = toml::from_str(&content)
            .map_err(|e| AnnotationError::OptionsParse(e.to_string()))?;
        log::info!("loaded annotation options from {}", path.display());
        Ok(options)
    }

    /// Save options to a TOML file (pretty-printed).
    ///
    /// # Errors
    ///
    /// Returns [`AnnotationError::OptionsParse`] on serialization failure
    /// and [`AnnotationError::Io`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), AnnotationError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AnnotationError::OptionsParse(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips_through_toml() {
        let opts = Options::default();
        let toml_str = toml::to_string_pretty(&opts).unwrap();
        let parsed: Options = toml::from_str(&toml_str).unwrap();
        assert_eq!(opts, parsed);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
[lighting]
shininess = 80.0

[output]
color_format = "bgra8_unorm"
"#;
        let opts: Options = toml::from_str(toml_str).unwrap();
        assert_eq!(opts.lighting.shininess, 80.0);
        assert_eq!(opts.output.color_format, ColorFormat::Bgra8Unorm);
        // Everything else should be default
        assert!(opts.lighting.enabled);
        assert_eq!(opts.geometry.default_sphere_radius, DEFAULT_SPHERE_RADIUS);
        assert_eq!(opts.geometry.box_correction, 1.5);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = std::env::temp_dir().join("quadric-annotations-options");
        let path = dir.join("broken.toml");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(&path, "[lighting\nenabled = ").unwrap();
        let err = Options::load(&path).unwrap_err();
        assert!(matches!(err, AnnotationError::OptionsParse(_)));
    }

    #[test]
    fn save_then_load_preserves_changes() {
        let dir = std::env::temp_dir().join("quadric-annotations-options");
        let path = dir.join("preset.toml");
        let mut opts = Options::default();
        opts.geometry.radius_scale = 2.5;
        opts.lighting.enabled = false;
        opts.save(&path).unwrap();
        assert_eq!(Options::load(&path).unwrap(), opts);
    }

    #[test]
    fn schema_has_expected_properties() {
        let schema_value =
            serde_json::to_value(Options::json_schema()).unwrap();
        let props = schema_value["properties"].as_object().unwrap();

        assert!(props.contains_key("lighting"));
        assert!(props.contains_key("geometry"));
        assert!(!props.contains_key("output"));

        let lighting = &props["lighting"]["properties"];
        assert!(lighting.get("shininess").is_some());
        assert!(lighting.get("scene_ambient").is_none());

        let geometry = &props["geometry"]["properties"];
        assert!(geometry.get("highlight_mix").is_some());
        assert!(geometry.get("box_correction").is_none());
    }
}
