use glam::{Vec3, Vec4};

use super::{PropertyId, ShapeKind};
use crate::renderer::impostor::{
    cone::{self, ConeGeometry},
    ellipsoid, sphere, Ray,
};

/// Sphere annotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    /// Centre.
    pub center: Vec3,
    /// Radius; the configured default when absent.
    pub radius: Option<f32>,
    /// Colour; the configured default when absent.
    pub color: Option<Vec4>,
}

/// Ellipsoid annotation: the unit sphere mapped by `axes` about `center`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    /// Centre.
    pub center: Vec3,
    /// Semi-axis vectors.
    pub axes: [Vec3; 3],
    /// Colour; the configured default when absent.
    pub color: Option<Vec4>,
}

/// Truncated cone annotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cone {
    /// Base centre.
    pub base: Vec3,
    /// Top centre minus base centre.
    pub axis: Vec3,
    /// Radius at the base.
    pub base_radius: f32,
    /// Radius at the top.
    pub top_radius: f32,
    /// Colour of both ends unless overridden per end.
    pub color: Option<Vec4>,
    /// Colour at the base.
    pub base_color: Option<Vec4>,
    /// Colour at the top.
    pub top_color: Option<Vec4>,
}

impl Cone {
    /// Top centre.
    #[must_use]
    pub fn top(&self) -> Vec3 {
        self.base + self.axis
    }
}

/// One annotation instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Annotation {
    /// See [`Sphere`].
    Sphere(Sphere),
    /// See [`Ellipsoid`].
    Ellipsoid(Ellipsoid),
    /// See [`Cone`].
    Cone(Cone),
}

/// Result of a CPU hit test against an annotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnotationHit {
    /// Ray parameter of the visible surface.
    pub t: f32,
    /// Pick-ID offset within the instance's block.
    pub part: u32,
}

fn push_position(out: &mut Vec<f32>, position: Vec3, rank: u32) {
    out.extend_from_slice(&position.to_array()[..rank as usize]);
}

impl Annotation {
    /// Kind of this instance.
    #[must_use]
    pub fn shape(&self) -> ShapeKind {
        match self {
            Self::Sphere(_) => ShapeKind::Sphere,
            Self::Ellipsoid(_) => ShapeKind::Ellipsoid,
            Self::Cone(_) => ShapeKind::Cone,
        }
    }

    /// Append this instance's positional data, truncating positions to
    /// `rank` components. Layout matches the geometry attributes the
    /// shape declares.
    pub fn pack_geometry(&self, rank: u32, out: &mut Vec<f32>) {
        match self {
            Self::Sphere(s) => push_position(out, s.center, rank),
            Self::Ellipsoid(e) => {
                push_position(out, e.center, rank);
                for axis in e.axes {
                    out.extend_from_slice(&axis.to_array());
                }
            }
            Self::Cone(c) => {
                push_position(out, c.base, rank);
                out.push(c.base_radius);
                push_position(out, c.axis, rank);
                out.push(c.top_radius);
            }
        }
    }

    /// Value for an active property, falling back to the defaults when the
    /// instance leaves it unset. `None` when the property belongs to
    /// another shape.
    #[must_use]
    pub fn property_value(
        &self,
        property: PropertyId,
        default_color: Vec4,
        default_radius: f32,
    ) -> Option<Vec4> {
        let value = match (self, property) {
            (Self::Sphere(s), PropertyId::SphereColor) => {
                s.color.unwrap_or(default_color)
            }
            (Self::Sphere(s), PropertyId::SphereRadius) => {
                Vec4::splat(s.radius.unwrap_or(default_radius))
            }
            (Self::Ellipsoid(e), PropertyId::EllipsoidColor) => {
                e.color.unwrap_or(default_color)
            }
            (Self::Cone(c), PropertyId::ConeColor) => {
                c.color.unwrap_or(default_color)
            }
            (Self::Cone(c), PropertyId::ConeBaseColor) => {
                c.base_color.or(c.color).unwrap_or(default_color)
            }
            (Self::Cone(c), PropertyId::ConeTopColor) => {
                c.top_color.or(c.color).unwrap_or(default_color)
            }
            _ => return None,
        };
        Some(value)
    }

    /// Where a dragged point attached to `part` should land.
    ///
    /// Spheres and ellipsoids snap to their centre. Cones snap part 1 to the
    /// base, part 2 to the top and anything else to the nearest point of the
    /// axis segment.
    #[must_use]
    pub fn snap_position(&self, position: Vec3, part: u32) -> Vec3 {
        match self {
            Self::Sphere(s) => s.center,
            Self::Ellipsoid(e) => e.center,
            Self::Cone(c) => match part {
                1 => c.base,
                2 => c.top(),
                _ => {
                    let length2 = c.axis.length_squared();
                    if length2 == 0.0 {
                        return c.base;
                    }
                    let s = ((position - c.base).dot(c.axis) / length2)
                        .clamp(0.0, 1.0);
                    c.base + c.axis * s
                }
            },
        }
    }

    /// Point that stands for the whole instance when moving it.
    #[must_use]
    pub fn representative_point(&self) -> Vec3 {
        match self {
            Self::Sphere(s) => s.center,
            Self::Ellipsoid(e) => e.center,
            Self::Cone(c) => c.base,
        }
    }

    /// Translate the instance so its representative point lands on `point`.
    /// Size, orientation and colours are unchanged.
    pub fn update_via_representative_point(&mut self, point: Vec3) {
        match self {
            Self::Sphere(s) => s.center = point,
            Self::Ellipsoid(e) => e.center = point,
            Self::Cone(c) => c.base = point,
        }
    }

    /// Nearest surface at or ahead of the ray origin, in the annotation's
    /// own space. A ray starting inside the solid hits its far wall.
    #[must_use]
    pub fn intersect_ray(
        &self,
        ray: &Ray,
        default_radius: f32,
    ) -> Option<AnnotationHit> {
        match self {
            Self::Sphere(s) => {
                sphere::intersect_forward(
                    ray,
                    s.center,
                    s.radius.unwrap_or(default_radius),
                )
                .map(|hit| AnnotationHit { t: hit.t, part: 0 })
            }
            Self::Ellipsoid(e) => {
                ellipsoid::intersect_forward(ray, e.center, e.axes)
                    .map(|hit| AnnotationHit { t: hit.t, part: 0 })
            }
            Self::Cone(c) => {
                let geometry = ConeGeometry {
                    base: c.base,
                    top: c.top(),
                    base_radius: c.base_radius,
                    top_radius: c.top_radius,
                };
                cone::intersect(ray, &geometry, Vec4::ZERO, Vec4::ZERO).map(
                    |hit| AnnotationHit {
                        t: hit.t,
                        part: hit.surface.pick_part(),
                    },
                )
            }
        }
    }
}

impl From<Sphere> for Annotation {
    fn from(sphere: Sphere) -> Self {
        Self::Sphere(sphere)
    }
}

impl From<Ellipsoid> for Annotation {
    fn from(ellipsoid: Ellipsoid) -> Self {
        Self::Ellipsoid(ellipsoid)
    }
}

impl From<Cone> for Annotation {
    fn from(cone: Cone) -> Self {
        Self::Cone(cone)
    }
}
