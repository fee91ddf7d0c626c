//! Ellipsoid impostor.
//!
//! An instance is the unit sphere under the affine map `T = [x y z | c]`.
//! The vertex stage finds the tight screen rectangle from the dual quadric
//! `(PVT) D (PVT)^T` with `D = diag(1, 1, 1, -1)`; the fragment stage maps
//! the view ray into the sphere's local frame and solves there.

use glam::{Mat3, Mat4, Vec3, Vec4};

use super::{position_type, widen, Ray, ScreenRect, SurfaceHit};
use crate::{
    annotation::PropertyId,
    shader::{
        hooks::PropertyHook, MainPhase, ShaderBuilder, ShaderConfigError,
        VertexSlot, WgslType,
    },
};

/// Axes spanning less volume than this collapse the quad.
pub const DEGENERATE_VOLUME: f32 = 1e-12;

/// Per-instance overrides.
pub const HOOKS: &[PropertyHook] = &[PropertyHook {
    property: PropertyId::EllipsoidColor,
    setter: "set_ellipsoid_color",
    body: "v_color = value;",
}];

/// Colour varyings the selection highlight applies to.
pub const COLOR_VARYINGS: &[&str] = &["color"];

const EMITTER: &str = r"fn quadric_dot(a: vec4<f32>, b: vec4<f32>) -> f32 {
    return dot(a * vec4<f32>(1.0, 1.0, 1.0, -1.0), b);
}

// Inverse of a matrix whose last row is (0, 0, 0, 1).
fn affine_inverse(m: mat4x4<f32>) -> mat4x4<f32> {
    let a = m[0].xyz;
    let b = m[1].xyz;
    let c = m[2].xyz;
    let inv_det = 1.0 / dot(cross(a, b), c);
    let inverse = transpose(mat3x3<f32>(cross(b, c), cross(c, a), cross(a, b)))
        * inv_det;
    let translation = -(inverse * m[3].xyz);
    return mat4x4<f32>(
        vec4<f32>(inverse[0], 0.0),
        vec4<f32>(inverse[1], 0.0),
        vec4<f32>(inverse[2], 0.0),
        vec4<f32>(translation, 1.0),
    );
}

fn emit_ellipsoid(
    center: vec3<f32>,
    axis_x: vec3<f32>,
    axis_y: vec3<f32>,
    axis_z: vec3<f32>,
) {
    if abs(determinant(mat3x3<f32>(axis_x, axis_y, axis_z))) < 1e-12 {
        collapse_quad();
        return;
    }
    let transform = u.model * mat4x4<f32>(
        vec4<f32>(axis_x, 0.0),
        vec4<f32>(axis_y, 0.0),
        vec4<f32>(axis_z, 0.0),
        vec4<f32>(center, 1.0),
    );
    // Columns of the transpose are rows of PVT.
    let rows = transpose(u.projection * u.view * transform);
    let a = quadric_dot(rows[3], rows[3]);
    let bx = quadric_dot(rows[0], rows[3]);
    let cx = quadric_dot(rows[0], rows[0]);
    let by = quadric_dot(rows[1], rows[3]);
    let cy = quadric_dot(rows[1], rows[1]);
    let disc_x = bx * bx - a * cx;
    let disc_y = by * by - a * cy;
    if abs(a) < 1e-12 || disc_x < 0.0 || disc_y < 0.0 {
        collapse_quad();
        return;
    }

    let signs = corner_signs(a_corner);
    let x = (bx + signs.x * sqrt(disc_x)) / a;
    let y = (by + signs.y * sqrt(disc_y)) / a;
    v_matrix_inverse = affine_inverse(u.view * transform);
    let near = u.projection_inverse * vec4<f32>(x, y, 0.0, 1.0);
    v_point = near.xyz / near.w;
    clip_position = vec4<f32>(x, y, 0.5, 1.0);
}
";

pub(super) const RESOLVER: &str = r"fn resolve_ellipsoid() {
    let origin = ray_origin(v_point);
    let direction = ray_direction(v_point);
    let local_origin = v_matrix_inverse * vec4<f32>(origin, 1.0);
    let local_direction = v_matrix_inverse * vec4<f32>(direction, 0.0);
    let a = quadric_dot(local_direction, local_direction);
    let b = 2.0 * quadric_dot(local_origin, local_direction);
    let c = quadric_dot(local_origin, local_origin);
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        discard;
    }
    let t = (-b - sqrt(discriminant)) / (2.0 * a);
    let point = origin + t * direction;
    frag_depth = resolve_depth(point);
    let local_point = local_origin + t * local_direction;
    let gradient = transpose(v_matrix_inverse) * vec4<f32>(local_point.xyz, 0.0);
    frag_color = shade(normalize(gradient.xyz), point, v_color);
}
";

pub(super) fn declare_geometry(
    builder: &mut ShaderBuilder,
    rank: u32,
) -> Result<(), ShaderConfigError> {
    // Axes keep all three components at every rank so the local frame
    // stays invertible.
    builder.add_attribute("center", position_type(rank), VertexSlot::Geometry)?;
    builder.add_attribute("axis_x", WgslType::Vec3, VertexSlot::Geometry)?;
    builder.add_attribute("axis_y", WgslType::Vec3, VertexSlot::Geometry)?;
    builder.add_attribute("axis_z", WgslType::Vec3, VertexSlot::Geometry)?;
    builder.add_varying("matrix_inverse", WgslType::Mat4)?;
    builder.add_varying("point", WgslType::Vec3)?;
    builder.add_varying("color", WgslType::Vec4)?;
    builder.add_code("emit_ellipsoid", EMITTER)?;
    builder.add_main(
        "ellipsoid_defaults",
        MainPhase::Setup,
        "v_color = u.default_color;",
    )?;
    builder.add_main(
        "emit_ellipsoid",
        MainPhase::Emit,
        &format!(
            "emit_ellipsoid({}, a_axis_x, a_axis_y, a_axis_z);",
            widen("center", rank)
        ),
    )
}

fn quadric_dot(a: Vec4, b: Vec4) -> f32 {
    (a * Vec4::new(1.0, 1.0, 1.0, -1.0)).dot(b)
}

/// Affine map taking the unit sphere onto the ellipsoid.
#[must_use]
pub fn transform(center: Vec3, axes: [Vec3; 3]) -> Mat4 {
    Mat4::from_cols(
        axes[0].extend(0.0),
        axes[1].extend(0.0),
        axes[2].extend(0.0),
        center.extend(1.0),
    )
}

fn is_degenerate(axes: [Vec3; 3]) -> bool {
    Mat3::from_cols(axes[0], axes[1], axes[2]).determinant().abs()
        < DEGENERATE_VOLUME
}

/// NDC rectangle the vertex stage emits, or `None` where it collapses
/// the quad (degenerate axes, or the eye on or inside the surface).
///
/// `projection_view` maps the ellipsoid's space to clip space.
#[must_use]
pub fn screen_bounds(
    projection_view: &Mat4,
    center: Vec3,
    axes: [Vec3; 3],
) -> Option<ScreenRect> {
    if is_degenerate(axes) {
        return None;
    }
    let pvt = *projection_view * transform(center, axes);
    let (r0, r1, r3) = (pvt.row(0), pvt.row(1), pvt.row(3));
    let a = quadric_dot(r3, r3);
    let (bx, cx) = (quadric_dot(r0, r3), quadric_dot(r0, r0));
    let (by, cy) = (quadric_dot(r1, r3), quadric_dot(r1, r1));
    let disc_x = bx * bx - a * cx;
    let disc_y = by * by - a * cy;
    if a.abs() < DEGENERATE_VOLUME || disc_x < 0.0 || disc_y < 0.0 {
        return None;
    }
    let (sx, sy) = (disc_x.sqrt(), disc_y.sqrt());
    let (x0, x1) = ((bx - sx) / a, (bx + sx) / a);
    let (y0, y1) = ((by - sy) / a, (by + sy) / a);
    Some(ScreenRect {
        min: glam::Vec2::new(x0.min(x1), y0.min(y1)),
        max: glam::Vec2::new(x0.max(x1), y0.max(y1)),
    })
}

/// A ray mapped into the unit-sphere space of an ellipsoid.
struct LocalRay {
    inverse: Mat4,
    origin: Vec4,
    direction: Vec4,
}

impl LocalRay {
    fn hit_at(&self, ray: &Ray, t: f32) -> SurfaceHit {
        let local_point = self.origin + t * self.direction;
        let gradient =
            self.inverse.transpose() * local_point.truncate().extend(0.0);
        SurfaceHit {
            t,
            point: ray.at(t),
            normal: gradient.truncate().normalize(),
        }
    }
}

/// Near and far roots of `ray` against the ellipsoid.
fn roots(
    ray: &Ray,
    center: Vec3,
    axes: [Vec3; 3],
) -> Option<(LocalRay, f32, f32)> {
    if is_degenerate(axes) {
        return None;
    }
    let inverse = transform(center, axes).inverse();
    let local = LocalRay {
        inverse,
        origin: inverse * ray.origin.extend(1.0),
        direction: inverse * ray.direction.extend(0.0),
    };
    let a = quadric_dot(local.direction, local.direction);
    let b = 2.0 * quadric_dot(local.origin, local.direction);
    let c = quadric_dot(local.origin, local.origin);
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    Some((local, (-b - root) / (2.0 * a), (-b + root) / (2.0 * a)))
}

/// Nearest hit of `ray` on the ellipsoid, as `resolve_ellipsoid` computes
/// it. The ray and ellipsoid share one space.
#[must_use]
pub fn intersect(
    ray: &Ray,
    center: Vec3,
    axes: [Vec3; 3],
) -> Option<SurfaceHit> {
    let (local, near, _) = roots(ray, center, axes)?;
    Some(local.hit_at(ray, near))
}

/// First hit at or ahead of the ray origin; the far wall from inside.
#[must_use]
pub fn intersect_forward(
    ray: &Ray,
    center: Vec3,
    axes: [Vec3; 3],
) -> Option<SurfaceHit> {
    let (local, near, far) = roots(ray, center, axes)?;
    let t = if near >= 0.0 { near } else { far };
    (t >= 0.0).then(|| local.hit_at(ray, t))
}

#[cfg(test)]
mod tests {
    use glam::{EulerRot, Quat, Vec2};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;
    use crate::renderer::impostor::sphere;

    fn projection() -> Mat4 {
        Mat4::perspective_rh(60f32.to_radians(), 1.5, 0.1, 100.0)
    }

    fn project(pv: &Mat4, point: Vec3) -> Vec2 {
        let clip = *pv * point.extend(1.0);
        clip.truncate().truncate() / clip.w
    }

    #[test]
    fn round_ellipsoid_matches_sphere() {
        let center = Vec3::new(0.5, -0.3, -7.0);
        let axes = [Vec3::X * 1.5, Vec3::Y * 1.5, Vec3::Z * 1.5];
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.55, -0.25, -7.0));
        let hit = intersect(&ray, center, axes).unwrap();
        let expected = sphere::intersect(&ray, center, 1.5).unwrap();
        assert!((hit.t - expected.t).abs() < 1e-4);
        assert!((hit.normal - expected.normal).length() < 1e-4);
    }

    #[test]
    fn hit_lies_on_surface_with_gradient_normal() {
        let center = Vec3::new(0.0, 0.0, -10.0);
        let axes = [Vec3::X * 2.0, Vec3::Y, Vec3::Z];
        let ray = Ray::through_point(Vec3::new(1.2, 0.3, 0.0), true);
        let hit = intersect(&ray, center, axes).unwrap();
        let p = hit.point - center;
        let level = (p.x / 2.0).powi(2) + p.y * p.y + p.z * p.z;
        assert!((level - 1.0).abs() < 1e-4);
        let gradient = Vec3::new(p.x / 4.0, p.y, p.z).normalize();
        assert!((hit.normal - gradient).length() < 1e-4);
        assert!(hit.normal.z > 0.0);
    }

    #[test]
    fn ray_beside_ellipsoid_misses() {
        let center = Vec3::new(0.0, 0.0, -10.0);
        let axes = [Vec3::X * 2.0, Vec3::Y, Vec3::Z];
        let ray = Ray::through_point(Vec3::new(0.0, 1.1, 0.0), true);
        assert!(intersect(&ray, center, axes).is_none());
    }

    #[test]
    fn flat_axes_collapse() {
        let axes = [Vec3::X, Vec3::Y, Vec3::ZERO];
        let center = Vec3::new(0.0, 0.0, -5.0);
        assert!(screen_bounds(&projection(), center, axes).is_none());
        let ray = Ray::through_point(Vec3::ZERO, true);
        assert!(intersect(&ray, center, axes).is_none());
    }

    #[test]
    fn eye_inside_collapses() {
        let axes = [Vec3::X * 3.0, Vec3::Y * 3.0, Vec3::Z * 3.0];
        assert!(screen_bounds(&projection(), Vec3::new(0.0, 0.0, -1.0), axes)
            .is_none());
    }

    #[test]
    fn bounds_enclose_projected_surface() {
        let pv = projection();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let center = Vec3::new(
                rng.random_range(-3.0..3.0),
                rng.random_range(-3.0..3.0),
                rng.random_range(-20.0..-8.0),
            );
            let rotation = Quat::from_euler(
                EulerRot::XYZ,
                rng.random_range(0.0..std::f32::consts::TAU),
                rng.random_range(0.0..std::f32::consts::TAU),
                rng.random_range(0.0..std::f32::consts::TAU),
            );
            let axes = [
                rotation * Vec3::X * rng.random_range(0.2..2.0),
                rotation * Vec3::Y * rng.random_range(0.2..2.0),
                rotation * Vec3::Z * rng.random_range(0.2..2.0),
            ];
            let rect = screen_bounds(&pv, center, axes).unwrap();

            for _ in 0..16 {
                let direction = Vec3::new(
                    rng.random_range(-1.0..1.0),
                    rng.random_range(-1.0..1.0),
                    rng.random_range(-1.0..1.0),
                );
                if direction.length_squared() < 1e-4 {
                    continue;
                }
                let s = direction.normalize();
                let surface =
                    center + axes[0] * s.x + axes[1] * s.y + axes[2] * s.z;
                assert!(
                    rect.contains(project(&pv, surface), 1e-3),
                    "{surface} outside {rect:?}"
                );
            }
        }
    }

    #[test]
    fn bounds_are_tight_for_a_centred_sphere() {
        let pv = projection();
        let rect =
            screen_bounds(&pv, Vec3::new(0.0, 0.0, -10.0), [Vec3::X, Vec3::Y, Vec3::Z])
                .unwrap();
        // Tangent half-angle is asin(1 / 10).
        let f = 1.0 / 30f32.to_radians().tan();
        let half = f * (1.0 / 99f32.sqrt());
        assert!((rect.max.y - half).abs() < 1e-4);
        assert!((rect.min.y + half).abs() < 1e-4);
        assert!((rect.max.x - half / 1.5).abs() < 1e-4);
    }

    #[test]
    fn forward_hit_from_centre_reaches_the_long_axis() {
        let center = Vec3::new(0.0, 0.0, -4.0);
        let axes = [Vec3::X * 3.0, Vec3::Y, Vec3::Z * 0.5];
        let along_x = intersect_forward(&Ray::new(center, Vec3::X), center, axes)
            .unwrap();
        assert!((along_x.t - 3.0).abs() < 1e-5);
        assert!((along_x.normal - Vec3::X).length() < 1e-5);
        let along_z =
            intersect_forward(&Ray::new(center, Vec3::NEG_Z), center, axes)
                .unwrap();
        assert!((along_z.t - 0.5).abs() < 1e-5);
    }
}
