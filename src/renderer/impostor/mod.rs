//! Ray-cast impostors for annotation primitives.
//!
//! Every shape follows the same pattern: four template vertices whose
//! corner flags select a corner of a screen-space quad computed per
//! instance in the vertex stage, then a per-pixel ray/quadric intersection
//! in the fragment stage that recovers depth, normal and colour or
//! discards. The shape modules hold the WGSL for both stages plus CPU
//! versions of the same math used for hit testing and tests.

pub mod cone;
pub mod ellipsoid;
pub mod sphere;

use glam::{Mat4, Vec2, Vec3};

use crate::{
    annotation::ShapeKind,
    shader::{MainPhase, ShaderBuilder, ShaderConfigError, VertexSlot, WgslType},
};

/// Corner flags of the billboard template, two hex digits each:
/// `{left,right} x {down,up}`.
pub const CORNER_FLAGS: [u32; 4] = [0, 32, 2, 34];

/// Two triangles over the four template vertices.
pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 1, 3];

/// Signs `(-1 | 1, -1 | 1)` encoded by a corner flag.
#[must_use]
pub fn corner_signs(flag: u32) -> Vec2 {
    Vec2::new(((flag >> 4) % 16) as f32, (flag % 16) as f32) - Vec2::ONE
}

/// Attribute type of a position with `rank` components.
#[must_use]
pub fn position_type(rank: u32) -> WgslType {
    match rank {
        1 => WgslType::F32,
        2 => WgslType::Vec2,
        _ => WgslType::Vec3,
    }
}

/// WGSL expression widening attribute `name` to `vec3<f32>`.
fn widen(name: &str, rank: u32) -> String {
    match rank {
        1 => format!("vec3<f32>(a_{name}, 0.0, 0.0)"),
        2 => format!("vec3<f32>(a_{name}, 0.0)"),
        _ => format!("a_{name}"),
    }
}

const COMMON: &str = r"fn corner_signs(flag: u32) -> vec2<f32> {
    return vec2<f32>(f32((flag >> 4u) % 16u), f32(flag % 16u)) - vec2<f32>(1.0);
}

// All four corners land on one point outside the clip volume.
fn collapse_quad() {
    clip_position = vec4<f32>(2.0, 2.0, 2.0, 1.0);
}

fn ray_origin(point: vec3<f32>) -> vec3<f32> {
    return mix(vec3<f32>(0.0), point, vec3<f32>(u.ortho));
}

fn ray_direction(point: vec3<f32>) -> vec3<f32> {
    return mix(normalize(point), vec3<f32>(0.0, 0.0, -1.0), vec3<f32>(u.ortho));
}

fn resolve_depth(point: vec3<f32>) -> f32 {
    let clip = u.projection * vec4<f32>(point, 1.0);
    let depth = clip.z / clip.w;
    if depth <= 0.0 || depth >= 1.0 {
        discard;
    }
    return depth;
}
";

const SHADE_LIT: &str = r"fn shade(normal: vec3<f32>, point: vec3<f32>, color: vec4<f32>) -> vec4<f32> {
    return lighting::apply_lighting(
        u.material_shininess,
        u.material_ambient,
        u.material_specular,
        normal,
        point,
        color,
        u.opacity,
    );
}
";

const SHADE_HEAD_LIGHT: &str = r"fn shade(normal: vec3<f32>, point: vec3<f32>, color: vec4<f32>) -> vec4<f32> {
    return lighting::apply_head_light(
        u.material_shininess,
        u.material_ambient,
        u.material_specular,
        normal,
        point,
        color,
        u.opacity,
    );
}
";

const SHADE_FLAT: &str = r"fn shade(normal: vec3<f32>, point: vec3<f32>, color: vec4<f32>) -> vec4<f32> {
    let coverage = color.a * u.opacity;
    return vec4<f32>(color.rgb * coverage, coverage);
}
";

/// Corner attribute and helpers shared by every shape.
///
/// # Errors
///
/// A helper name collides with an earlier contribution.
pub fn declare_common(
    builder: &mut ShaderBuilder,
) -> Result<(), ShaderConfigError> {
    builder.add_attribute("corner", WgslType::U32, VertexSlot::Corner)?;
    builder.add_code("impostor", COMMON)
}

/// Attributes, varyings and vertex emitter of `shape`.
///
/// # Errors
///
/// A declaration collides with an earlier contribution.
pub fn declare_geometry(
    builder: &mut ShaderBuilder,
    shape: ShapeKind,
    rank: u32,
) -> Result<(), ShaderConfigError> {
    match shape {
        ShapeKind::Sphere => sphere::declare_geometry(builder, rank),
        ShapeKind::Ellipsoid => ellipsoid::declare_geometry(builder, rank),
        ShapeKind::Cone => cone::declare_geometry(builder, rank),
    }
}

/// Shading function and fragment resolver of `shape`. Flat shading when
/// `volumetric` is false.
///
/// # Errors
///
/// A declaration collides with an earlier contribution.
pub fn declare_resolver(
    builder: &mut ShaderBuilder,
    shape: ShapeKind,
    volumetric: bool,
) -> Result<(), ShaderConfigError> {
    let shade = match (volumetric, shape) {
        (false, _) => SHADE_FLAT,
        (true, ShapeKind::Sphere) => SHADE_HEAD_LIGHT,
        (true, ShapeKind::Ellipsoid | ShapeKind::Cone) => SHADE_LIT,
    };
    builder.add_code("shade", shade)?;
    let (name, source) = match shape {
        ShapeKind::Sphere => ("resolve_sphere", sphere::RESOLVER),
        ShapeKind::Ellipsoid => ("resolve_ellipsoid", ellipsoid::RESOLVER),
        ShapeKind::Cone => ("resolve_cone", cone::RESOLVER),
    };
    builder.add_code(name, source)?;
    builder.add_main(name, MainPhase::Resolve, &format!("{name}();"))
}

/// A ray in whatever space the caller's geometry lives in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Start point.
    pub origin: Vec3,
    /// Unit direction.
    pub direction: Vec3,
}

impl Ray {
    /// Ray from `origin` along `direction` (normalized here).
    #[must_use]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Eye-space ray through a billboard point: from the eye for
    /// perspective views, straight down -z for orthographic ones.
    #[must_use]
    pub fn through_point(point: Vec3, ortho: bool) -> Self {
        if ortho {
            Self {
                origin: point,
                direction: Vec3::NEG_Z,
            }
        } else {
            Self {
                origin: Vec3::ZERO,
                direction: point.normalize(),
            }
        }
    }

    /// Point at parameter `t`.
    #[must_use]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + t * self.direction
    }
}

/// Nearest intersection of a ray with a quadric surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    /// Ray parameter.
    pub t: f32,
    /// Intersection point.
    pub point: Vec3,
    /// Unit outward normal.
    pub normal: Vec3,
}

/// Axis-aligned rectangle in normalized device coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    /// Lower-left corner.
    pub min: Vec2,
    /// Upper-right corner.
    pub max: Vec2,
}

impl ScreenRect {
    /// Whether `point` lies inside, allowing `tolerance` slack.
    #[must_use]
    pub fn contains(&self, point: Vec2, tolerance: f32) -> bool {
        point.cmpge(self.min - tolerance).all()
            && point.cmple(self.max + tolerance).all()
    }
}

/// Depth of an eye-space point as the fragment stage computes it.
#[must_use]
pub fn clip_depth(projection: &Mat4, point: Vec3) -> f32 {
    let clip = *projection * point.extend(1.0);
    clip.z / clip.w
}

/// Whether a fragment at `depth` survives the near/far discard.
#[must_use]
pub fn depth_visible(depth: f32) -> bool {
    depth > 0.0 && depth < 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corner_flags_cover_all_four_corners() {
        let signs: Vec<Vec2> =
            CORNER_FLAGS.iter().map(|&f| corner_signs(f)).collect();
        assert_eq!(
            signs,
            vec![
                Vec2::new(-1.0, -1.0),
                Vec2::new(1.0, -1.0),
                Vec2::new(-1.0, 1.0),
                Vec2::new(1.0, 1.0),
            ]
        );
    }

    #[test]
    fn near_and_far_planes_are_discarded() {
        let projection =
            Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 100.0);
        assert!(!depth_visible(clip_depth(&projection, Vec3::new(0.0, 0.0, -0.05))));
        assert!(!depth_visible(clip_depth(&projection, Vec3::new(0.0, 0.0, -150.0))));
        assert!(depth_visible(clip_depth(&projection, Vec3::new(0.0, 0.0, -10.0))));
    }

    #[test]
    fn orthographic_rays_run_down_the_view_axis() {
        let ray = Ray::through_point(Vec3::new(0.3, -0.2, -1.0), true);
        assert_eq!(ray.direction, Vec3::NEG_Z);
        assert_eq!(ray.origin, Vec3::new(0.3, -0.2, -1.0));
        let ray = Ray::through_point(Vec3::new(0.0, 0.0, -4.0), false);
        assert_eq!(ray.origin, Vec3::ZERO);
        assert!((ray.direction - Vec3::NEG_Z).length() < 1e-6);
    }
}
