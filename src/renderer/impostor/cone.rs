//! Truncated cone impostor with flat caps.
//!
//! The vertex stage projects the 8 corners of the squares circumscribing
//! both end disks and emits their screen-space bounding box. The fragment
//! stage intersects the lateral quadric (a plain cylinder when the radii
//! match, otherwise a cone about a virtual apex) and both cap disks, then
//! keeps the nearest hit that lies on the finite solid.

use glam::{Vec3, Vec4};

use super::{position_type, widen, Ray};
use crate::{
    annotation::PropertyId,
    shader::{
        hooks::PropertyHook, MainPhase, ShaderBuilder, ShaderConfigError,
        VertexSlot, WgslType,
    },
};

/// Radius difference below which the lateral surface is a cylinder.
pub const CYLINDER_TOLERANCE: f32 = 0.001;

/// Axes shorter than this collapse the quad.
pub const MIN_HEIGHT: f32 = 1e-6;

/// Depth forced onto quads straddling the near plane.
pub const NEAR_STRADDLE_DEPTH: f32 = 1e-4;

const PARALLEL_EPSILON: f32 = 1e-9;

/// Per-instance overrides. `set_cone_color` runs first so the per-end
/// colours win when both are present.
pub const HOOKS: &[PropertyHook] = &[
    PropertyHook {
        property: PropertyId::ConeColor,
        setter: "set_cone_color",
        body: "v_base_color = value;\n    v_top_color = value;",
    },
    PropertyHook {
        property: PropertyId::ConeBaseColor,
        setter: "set_cone_base_color",
        body: "v_base_color = value;",
    },
    PropertyHook {
        property: PropertyId::ConeTopColor,
        setter: "set_cone_top_color",
        body: "v_top_color = value;",
    },
];

/// Colour varyings the selection highlight applies to.
pub const COLOR_VARYINGS: &[&str] = &["base_color", "top_color"];

const EMITTER: &str = r"fn perpendicular(axis: vec3<f32>) -> vec3<f32> {
    var side = cross(axis, vec3<f32>(1.0, 0.0, 0.0));
    if dot(side, side) < 0.001 {
        side = cross(axis, vec3<f32>(0.0, 1.0, 0.0));
    }
    return normalize(side);
}

fn project_corner(point: vec3<f32>) -> vec3<f32> {
    let clip = u.projection * vec4<f32>(point, 1.0);
    return clip.xyz / clip.w;
}

fn emit_cone(
    base_model: vec3<f32>,
    base_radius: f32,
    axis_model: vec3<f32>,
    top_radius: f32,
) {
    let model_view = u.view * u.model;
    let base = (model_view * vec4<f32>(base_model, 1.0)).xyz;
    let top = (model_view * vec4<f32>(base_model + axis_model, 1.0)).xyz;
    let height = length(top - base);
    if height < 1e-6 {
        collapse_quad();
        return;
    }
    let axis = (top - base) / height;
    let frame_u = perpendicular(axis);
    let frame_v = cross(frame_u, axis);

    let bu = frame_u * base_radius;
    let bv = frame_v * base_radius;
    let tu = frame_u * top_radius;
    let tv = frame_v * top_radius;
    let c0 = project_corner(base - bu - bv);
    let c1 = project_corner(base + bu - bv);
    let c2 = project_corner(base - bu + bv);
    let c3 = project_corner(base + bu + bv);
    let c4 = project_corner(top - tu - tv);
    let c5 = project_corner(top + tu - tv);
    let c6 = project_corner(top - tu + tv);
    let c7 = project_corner(top + tu + tv);
    let lo = min(min(min(c0, c1), min(c2, c3)), min(min(c4, c5), min(c6, c7)));
    let hi = max(max(max(c0, c1), max(c2, c3)), max(max(c4, c5), max(c6, c7)));

    let xy = mix(lo.xy, hi.xy, corner_signs(a_corner) * 0.5 + vec2<f32>(0.5));
    var depth = lo.z;
    if lo.z < 0.0 && hi.z > 0.0 {
        depth = 1e-4;
    }
    clip_position = vec4<f32>(xy, depth, 1.0);
    let near = u.projection_inverse * vec4<f32>(xy, 0.0, 1.0);
    v_point = near.xyz / near.w;
    v_axis = axis;
    v_base = base;
    v_top = top;
    v_frame_u = frame_u;
    v_frame_v = frame_v;
    v_cone_shape = vec4<f32>(base_radius, top_radius, height, 1.0 / (height * height));
}
";

pub(super) const RESOLVER: &str = r"const CYLINDER_TOLERANCE: f32 = 0.001;
const NO_HIT: f32 = 3.0e38;

fn cap_t(
    origin: vec3<f32>,
    direction: vec3<f32>,
    center: vec3<f32>,
    radius: f32,
) -> f32 {
    let denominator = dot(direction, v_axis);
    if abs(denominator) < 1e-9 {
        return NO_HIT;
    }
    let t = dot(center - origin, v_axis) / denominator;
    let offset = origin + t * direction - center;
    if t < 0.0 || dot(offset, offset) > radius * radius {
        return NO_HIT;
    }
    return t;
}

fn lateral_t(origin: vec3<f32>, direction: vec3<f32>, t: f32) -> f32 {
    let along = dot(origin + t * direction - v_base, v_axis);
    if t < 0.0 || along < 0.0 || along > v_cone_shape.z {
        return NO_HIT;
    }
    return t;
}

fn resolve_cone() {
    let origin = ray_origin(v_point);
    let direction = ray_direction(v_point);
    let base_radius = v_cone_shape.x;
    let top_radius = v_cone_shape.y;
    let height = v_cone_shape.z;
    let taper = top_radius - base_radius;
    let basis = mat3x3<f32>(v_frame_u, v_frame_v, v_axis);
    let d = direction * basis;

    var a0: f32;
    var a1: f32;
    var a2: f32;
    if abs(taper) < CYLINDER_TOLERANCE {
        let p = (origin - v_base) * basis;
        a0 = p.x * p.x + p.y * p.y - base_radius * base_radius;
        a1 = p.x * d.x + p.y * d.y;
        a2 = d.x * d.x + d.y * d.y;
    } else {
        let apex = v_base - v_axis * (base_radius * height / taper);
        let p = (origin - apex) * basis;
        let factor = vec3<f32>(1.0, 1.0, -taper * taper * v_cone_shape.w);
        a0 = dot(p * p, factor);
        a1 = dot(p * d, factor);
        a2 = dot(d * d, factor);
    }

    var t = NO_HIT;
    let discriminant = a1 * a1 - a0 * a2;
    if discriminant >= 0.0 && abs(a2) >= 1e-9 {
        let root = sqrt(discriminant);
        t = min(
            lateral_t(origin, direction, (-a1 - root) / a2),
            lateral_t(origin, direction, (-a1 + root) / a2),
        );
    }
    let top_t = cap_t(origin, direction, v_top, top_radius);
    let base_t = cap_t(origin, direction, v_base, base_radius);
    let nearest = min(t, min(top_t, base_t));
    if nearest >= NO_HIT {
        discard;
    }

    let point = origin + nearest * direction;
    var normal: vec3<f32>;
    var color: vec4<f32>;
    if nearest == t {
        let along = point - v_base;
        let radial = along - v_axis * dot(along, v_axis);
        normal = normalize(normalize(radial) * height - v_axis * taper);
        let ratio = clamp(dot(along, v_axis) / height, 0.0, 1.0);
        color = mix(v_base_color, v_top_color, ratio);
    } else if nearest == top_t {
        normal = v_axis;
        color = v_top_color;
        pick_part = 2u;
    } else {
        normal = -v_axis;
        color = v_base_color;
        pick_part = 1u;
    }
    frag_depth = resolve_depth(point);
    frag_color = shade(normal, point, color);
}
";

pub(super) fn declare_geometry(
    builder: &mut ShaderBuilder,
    rank: u32,
) -> Result<(), ShaderConfigError> {
    let position = position_type(rank);
    builder.add_attribute("base", position, VertexSlot::Geometry)?;
    builder.add_attribute("base_radius", WgslType::F32, VertexSlot::Geometry)?;
    builder.add_attribute("axis", position, VertexSlot::Geometry)?;
    builder.add_attribute("top_radius", WgslType::F32, VertexSlot::Geometry)?;
    builder.add_varying("point", WgslType::Vec3)?;
    builder.add_varying("axis", WgslType::Vec3)?;
    builder.add_varying("base", WgslType::Vec3)?;
    builder.add_varying("top", WgslType::Vec3)?;
    builder.add_varying("frame_u", WgslType::Vec3)?;
    builder.add_varying("frame_v", WgslType::Vec3)?;
    builder.add_varying("cone_shape", WgslType::Vec4)?;
    builder.add_varying("base_color", WgslType::Vec4)?;
    builder.add_varying("top_color", WgslType::Vec4)?;
    builder.add_code("emit_cone", EMITTER)?;
    builder.add_main(
        "cone_defaults",
        MainPhase::Setup,
        "v_base_color = u.default_color;\nv_top_color = u.default_color;",
    )?;
    builder.add_main(
        "emit_cone",
        MainPhase::Emit,
        &format!(
            "emit_cone({}, a_base_radius * u.radius_scale, {}, \
             a_top_radius * u.radius_scale);",
            widen("base", rank),
            widen("axis", rank)
        ),
    )
}

/// Which lateral quadric the resolver solves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    /// Radii within [`CYLINDER_TOLERANCE`].
    Cylinder,
    /// Virtual-apex cone.
    Cone,
}

/// Regime for the given end radii.
#[must_use]
pub fn regime(base_radius: f32, top_radius: f32) -> Regime {
    if (top_radius - base_radius).abs() < CYLINDER_TOLERANCE {
        Regime::Cylinder
    } else {
        Regime::Cone
    }
}

/// Surface a cone hit landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConeSurface {
    /// Side wall.
    Lateral,
    /// Disk at the top end.
    TopCap,
    /// Disk at the base end.
    BaseCap,
}

impl ConeSurface {
    /// Pick-ID offset within the instance's block.
    #[must_use]
    pub fn pick_part(self) -> u32 {
        match self {
            Self::Lateral => 0,
            Self::BaseCap => 1,
            Self::TopCap => 2,
        }
    }
}

/// Eye-space cone as the fragment stage sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConeGeometry {
    /// Base centre.
    pub base: Vec3,
    /// Top centre.
    pub top: Vec3,
    /// Radius at `base`.
    pub base_radius: f32,
    /// Radius at `top`.
    pub top_radius: f32,
}

/// Unit axis, orthonormal cross-section frame and height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConeFrame {
    /// Unit vector from base to top.
    pub axis: Vec3,
    /// First cross-section direction.
    pub u: Vec3,
    /// Second cross-section direction.
    pub v: Vec3,
    /// Distance from base to top.
    pub height: f32,
}

impl ConeGeometry {
    /// Frame of this cone, `None` when the axis is degenerate.
    #[must_use]
    pub fn frame(&self) -> Option<ConeFrame> {
        let along = self.top - self.base;
        let height = along.length();
        if height < MIN_HEIGHT {
            return None;
        }
        let axis = along / height;
        let mut side = axis.cross(Vec3::X);
        if side.length_squared() < 0.001 {
            side = axis.cross(Vec3::Y);
        }
        let u = side.normalize();
        Some(ConeFrame {
            axis,
            u,
            v: u.cross(axis),
            height,
        })
    }

    /// Corners of the squares circumscribing both end disks.
    #[must_use]
    pub fn box_corners(&self) -> Option<[Vec3; 8]> {
        let frame = self.frame()?;
        let (bu, bv) = (frame.u * self.base_radius, frame.v * self.base_radius);
        let (tu, tv) = (frame.u * self.top_radius, frame.v * self.top_radius);
        Some([
            self.base - bu - bv,
            self.base + bu - bv,
            self.base - bu + bv,
            self.base + bu + bv,
            self.top - tu - tv,
            self.top + tu - tv,
            self.top - tu + tv,
            self.top + tu + tv,
        ])
    }
}

/// Screen-space box the vertex stage emits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConeQuad {
    /// Componentwise minimum of the projected corners.
    pub min: Vec3,
    /// Componentwise maximum of the projected corners.
    pub max: Vec3,
    /// Depth written to the quad's clip position.
    pub depth: f32,
}

/// Quad for an eye-space cone, `None` where the emitter collapses it.
#[must_use]
pub fn screen_bounds(
    projection: &glam::Mat4,
    cone: &ConeGeometry,
) -> Option<ConeQuad> {
    let corners = cone.box_corners()?;
    let projected = corners.map(|corner| {
        let clip = *projection * corner.extend(1.0);
        clip.truncate() / clip.w
    });
    let min = projected.iter().copied().fold(Vec3::MAX, Vec3::min);
    let max = projected.iter().copied().fold(Vec3::MIN, Vec3::max);
    let depth = if min.z < 0.0 && max.z > 0.0 {
        NEAR_STRADDLE_DEPTH
    } else {
        min.z
    };
    Some(ConeQuad { min, max, depth })
}

/// Nearest visible hit on a cone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConeHit {
    /// Ray parameter.
    pub t: f32,
    /// Intersection point.
    pub point: Vec3,
    /// Unit outward normal.
    pub normal: Vec3,
    /// Surface that was hit.
    pub surface: ConeSurface,
    /// Interpolated or cap colour before shading.
    pub color: Vec4,
}

/// Nearest hit of `ray` on the finite cone, as `resolve_cone` computes it.
#[must_use]
pub fn intersect(
    ray: &Ray,
    cone: &ConeGeometry,
    base_color: Vec4,
    top_color: Vec4,
) -> Option<ConeHit> {
    let ConeFrame { axis, u, v, height } = cone.frame()?;
    let to_local = |w: Vec3| Vec3::new(w.dot(u), w.dot(v), w.dot(axis));
    let d = to_local(ray.direction);
    let (br, tr) = (cone.base_radius, cone.top_radius);
    let taper = tr - br;

    let (a0, a1, a2) = match regime(br, tr) {
        Regime::Cylinder => {
            let p = to_local(ray.origin - cone.base);
            (
                p.x * p.x + p.y * p.y - br * br,
                p.x * d.x + p.y * d.y,
                d.x * d.x + d.y * d.y,
            )
        }
        Regime::Cone => {
            let apex = cone.base - axis * (br * height / taper);
            let p = to_local(ray.origin - apex);
            let factor = Vec3::new(1.0, 1.0, -taper * taper / (height * height));
            ((p * p).dot(factor), (p * d).dot(factor), (d * d).dot(factor))
        }
    };

    let on_lateral = |t: f32| {
        let along = (ray.at(t) - cone.base).dot(axis);
        (t >= 0.0 && (0.0..=height).contains(&along)).then_some(t)
    };
    let on_cap = |center: Vec3, radius: f32| {
        let denominator = ray.direction.dot(axis);
        if denominator.abs() < PARALLEL_EPSILON {
            return None;
        }
        let t = (center - ray.origin).dot(axis) / denominator;
        let inside =
            (ray.at(t) - center).length_squared() <= radius * radius;
        (t >= 0.0 && inside).then_some(t)
    };

    let discriminant = a1 * a1 - a0 * a2;
    let lateral = if discriminant >= 0.0 && a2.abs() >= PARALLEL_EPSILON {
        let root = discriminant.sqrt();
        [(-a1 - root) / a2, (-a1 + root) / a2]
            .into_iter()
            .filter_map(on_lateral)
            .reduce(f32::min)
    } else {
        None
    };

    let (t, surface) = [
        (lateral, ConeSurface::Lateral),
        (on_cap(cone.top, tr), ConeSurface::TopCap),
        (on_cap(cone.base, br), ConeSurface::BaseCap),
    ]
    .into_iter()
    .filter_map(|(t, surface)| t.map(|t| (t, surface)))
    .min_by(|a, b| a.0.total_cmp(&b.0))?;

    let point = ray.at(t);
    let (normal, color) = match surface {
        ConeSurface::Lateral => {
            let along = point - cone.base;
            let radial = along - axis * along.dot(axis);
            let normal =
                (radial.normalize() * height - axis * taper).normalize();
            let ratio = (along.dot(axis) / height).clamp(0.0, 1.0);
            (normal, base_color.lerp(top_color, ratio))
        }
        ConeSurface::TopCap => (axis, top_color),
        ConeSurface::BaseCap => (-axis, base_color),
    };
    Some(ConeHit {
        t,
        point,
        normal,
        surface,
        color,
    })
}
