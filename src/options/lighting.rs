use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Shading switches and the material shared by every annotation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Lighting", inline)]
#[serde(default)]
pub struct LightingOptions {
    /// Use the five-light rig; when off, 3D shapes show their flat colour.
    #[schemars(title = "Lighting")]
    pub enabled: bool,
    /// Global ambient term multiplied into the material ambient.
    #[schemars(skip)]
    pub scene_ambient: [f32; 4],
    /// Material ambient reflectance.
    #[schemars(skip)]
    pub material_ambient: [f32; 4],
    /// Material specular reflectance.
    #[schemars(skip)]
    pub material_specular: [f32; 4],
    /// Phong exponent.
    #[schemars(
        title = "Shininess",
        range(min = 1.0, max = 200.0),
        extend("step" = 1.0)
    )]
    pub shininess: f32,
    /// Global opacity applied on top of per-instance alpha.
    #[schemars(
        title = "Opacity",
        range(min = 0.0, max = 1.0),
        extend("step" = 0.01)
    )]
    pub opacity: f32,
}

impl Default for LightingOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            scene_ambient: [0.2, 0.2, 0.2, 1.0],
            material_ambient: [0.1, 0.1, 0.1, 1.0],
            material_specular: [1.0, 1.0, 1.0, 1.0],
            shininess: 100.0,
            opacity: 1.0,
        }
    }
}
