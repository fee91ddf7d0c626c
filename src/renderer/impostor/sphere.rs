//! Sphere impostor: a camera-facing square at the sphere's eye-space depth,
//! ray-cast per pixel.

use glam::Vec3;

use super::{position_type, widen, Ray, SurfaceHit};
use crate::{
    annotation::PropertyId,
    shader::{
        hooks::PropertyHook, MainPhase, ShaderBuilder, ShaderConfigError,
        VertexSlot, WgslType,
    },
};

/// Per-instance overrides.
pub const HOOKS: &[PropertyHook] = &[
    PropertyHook {
        property: PropertyId::SphereColor,
        setter: "set_sphere_color",
        body: "v_color = value;",
    },
    PropertyHook {
        property: PropertyId::SphereRadius,
        setter: "set_sphere_radius",
        body: "sphere_radius = value;",
    },
];

/// Colour varyings the selection highlight applies to.
pub const COLOR_VARYINGS: &[&str] = &["color"];

const EMITTER: &str = r"fn emit_sphere(center: vec3<f32>, radius: f32) {
    let eye_center = (u.view * u.model * vec4<f32>(center, 1.0)).xyz;
    let half_size = radius * u.box_correction;
    let corner = eye_center
        + vec3<f32>(corner_signs(a_corner) * half_size, 0.0);
    v_sphere_center = eye_center;
    v_radius2 = radius * radius;
    v_point = corner;
    clip_position = u.projection * vec4<f32>(corner, 1.0);
}
";

pub(super) const RESOLVER: &str = r"fn resolve_sphere() {
    let origin = ray_origin(v_point);
    let direction = ray_direction(v_point);
    let offset = origin - v_sphere_center;
    let b = dot(offset, direction);
    let c = dot(offset, offset) - v_radius2;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        discard;
    }
    let t = -b - sqrt(discriminant);
    let point = origin + t * direction;
    frag_depth = resolve_depth(point);
    let normal = normalize(point - v_sphere_center);
    frag_color = shade(normal, point, v_color);
}
";

pub(super) fn declare_geometry(
    builder: &mut ShaderBuilder,
    rank: u32,
) -> Result<(), ShaderConfigError> {
    builder.add_attribute("center", position_type(rank), VertexSlot::Geometry)?;
    builder.add_uniform("box_correction", WgslType::F32)?;
    builder.add_uniform("default_radius", WgslType::F32)?;
    builder.add_varying("sphere_center", WgslType::Vec3)?;
    builder.add_varying("point", WgslType::Vec3)?;
    builder.add_varying("radius2", WgslType::F32)?;
    builder.add_varying("color", WgslType::Vec4)?;
    builder.add_private("sphere_radius", WgslType::F32)?;
    builder.add_code("emit_sphere", EMITTER)?;
    builder.add_main(
        "sphere_defaults",
        MainPhase::Setup,
        "sphere_radius = u.default_radius;\nv_color = u.default_color;",
    )?;
    builder.add_main(
        "emit_sphere",
        MainPhase::Emit,
        &format!(
            "emit_sphere({}, sphere_radius * u.radius_scale);",
            widen("center", rank)
        ),
    )
}

/// Near and far ray parameters where `ray`'s line crosses the sphere.
fn roots(ray: &Ray, center: Vec3, radius: f32) -> Option<(f32, f32)> {
    let offset = ray.origin - center;
    let b = offset.dot(ray.direction);
    let c = offset.length_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    Some((-b - root, -b + root))
}

fn hit_at(ray: &Ray, center: Vec3, t: f32) -> SurfaceHit {
    let point = ray.at(t);
    SurfaceHit {
        t,
        point,
        normal: (point - center).normalize(),
    }
}

/// Nearest hit of `ray` on the sphere, as `resolve_sphere` computes it.
#[must_use]
pub fn intersect(ray: &Ray, center: Vec3, radius: f32) -> Option<SurfaceHit> {
    roots(ray, center, radius).map(|(near, _)| hit_at(ray, center, near))
}

/// First hit at or ahead of the ray origin. From inside the sphere this is
/// the far wall.
#[must_use]
pub fn intersect_forward(
    ray: &Ray,
    center: Vec3,
    radius: f32,
) -> Option<SurfaceHit> {
    let (near, far) = roots(ray, center, radius)?;
    let t = if near >= 0.0 { near } else { far };
    (t >= 0.0).then(|| hit_at(ray, center, t))
}

/// Eye-space half size of the billboard for a sphere of `radius`.
#[must_use]
pub fn billboard_half_size(radius: f32, box_correction: f32) -> f32 {
    radius * box_correction
}
