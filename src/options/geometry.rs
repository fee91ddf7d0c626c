use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Radius used when a sphere carries no radius of its own.
pub const DEFAULT_SPHERE_RADIUS: f32 = 0.3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Geometry", inline)]
#[serde(default)]
/// Sizing and highlight options for annotation impostors.
pub struct GeometryOptions {
    /// Sphere radius when no per-instance radius is bound.
    #[schemars(
        title = "Default Radius",
        range(min = 0.01, max = 10.0),
        extend("step" = 0.01)
    )]
    pub default_sphere_radius: f32,
    /// Global multiplier on every sphere and cone radius.
    #[schemars(
        title = "Radius Scale",
        range(min = 0.1, max = 5.0),
        extend("step" = 0.05)
    )]
    pub radius_scale: f32,
    /// Sphere billboard half-size as a multiple of the radius. Must stay
    /// above 1 so the silhouette is never clipped by the quad.
    #[schemars(skip)]
    pub box_correction: f32,
    /// Colour used when a shape carries no colour of its own.
    #[schemars(skip)]
    pub default_color: [f32; 4],
    /// How far the selected instance is pushed toward white.
    #[schemars(
        title = "Selection Highlight",
        range(min = 0.0, max = 1.0),
        extend("step" = 0.05)
    )]
    pub highlight_mix: f32,
}

impl Default for GeometryOptions {
    fn default() -> Self {
        Self {
            default_sphere_radius: DEFAULT_SPHERE_RADIUS,
            radius_scale: 1.0,
            box_correction: 1.5,
            default_color: [1.0, 1.0, 0.0, 1.0],
            highlight_mix: 0.75,
        }
    }
}
