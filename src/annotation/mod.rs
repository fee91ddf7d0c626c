//! Annotation primitives and their per-shape registration contract.
//!
//! [`ShapeKind`] is the closed set of primitive kinds. Everything the
//! renderer needs to know about a kind (optional properties, pick-ID
//! stride, which varyings carry colour) dispatches from here to the
//! shape's impostor module.

mod batch;
mod shape;

use std::fmt;

pub use batch::InstanceBatch;
pub use shape::{Annotation, AnnotationHit, Cone, Ellipsoid, Sphere};

use crate::{
    renderer::{
        helper::RenderHelper,
        impostor::{cone, ellipsoid, sphere},
        RenderTarget,
    },
    shader::{hooks::PropertyHook, WgslType},
};

/// Primitive kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeKind {
    /// Camera-facing ray-cast sphere.
    Sphere,
    /// Affine image of the unit sphere.
    Ellipsoid,
    /// Truncated cone with flat caps (cylinder when radii match).
    Cone,
}

impl ShapeKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 3] = [Self::Sphere, Self::Ellipsoid, Self::Cone];

    /// Lower-case name used in program keys.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sphere => "sphere",
            Self::Ellipsoid => "ellipsoid",
            Self::Cone => "cone",
        }
    }

    /// Consecutive pick IDs each instance owns. Cones expose their two
    /// endpoints as parts 1 (base) and 2 (top).
    #[must_use]
    pub fn pick_ids_per_instance(self) -> u32 {
        match self {
            Self::Sphere | Self::Ellipsoid => 1,
            Self::Cone => 3,
        }
    }

    /// Optional per-instance properties the shape understands.
    #[must_use]
    pub fn properties(self) -> &'static [PropertyId] {
        match self {
            Self::Sphere => {
                &[PropertyId::SphereColor, PropertyId::SphereRadius]
            }
            Self::Ellipsoid => &[PropertyId::EllipsoidColor],
            Self::Cone => &[
                PropertyId::ConeColor,
                PropertyId::ConeBaseColor,
                PropertyId::ConeTopColor,
            ],
        }
    }

    /// Setter hooks for [`ShapeKind::properties`].
    #[must_use]
    pub fn hooks(self) -> &'static [PropertyHook] {
        match self {
            Self::Sphere => sphere::HOOKS,
            Self::Ellipsoid => ellipsoid::HOOKS,
            Self::Cone => cone::HOOKS,
        }
    }

    /// Colour varyings the selection highlight mixes.
    #[must_use]
    pub fn color_varyings(self) -> &'static [&'static str] {
        match self {
            Self::Sphere => sphere::COLOR_VARYINGS,
            Self::Ellipsoid => ellipsoid::COLOR_VARYINGS,
            Self::Cone => cone::COLOR_VARYINGS,
        }
    }

    /// Floats of positional data per instance at `rank`.
    #[must_use]
    pub fn geometry_floats(self, rank: u32) -> usize {
        let position = rank as usize;
        match self {
            Self::Sphere => position,
            Self::Ellipsoid => position + 9,
            Self::Cone => 2 * position + 2,
        }
    }

    /// Helper drawing this shape for one kind of view.
    #[must_use]
    pub fn render_helper(self, target: RenderTarget) -> RenderHelper {
        RenderHelper::new(self, target)
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Optional per-instance style property.
///
/// Ordering is significant: property attributes are declared, packed and
/// invoked in this order, so a shape-wide colour precedes per-end colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyId {
    /// Sphere colour.
    SphereColor,
    /// Sphere radius.
    SphereRadius,
    /// Ellipsoid colour.
    EllipsoidColor,
    /// Colour of both cone ends.
    ConeColor,
    /// Colour at the cone base.
    ConeBaseColor,
    /// Colour at the cone top.
    ConeTopColor,
}

impl PropertyId {
    /// Every property, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::SphereColor,
        Self::SphereRadius,
        Self::EllipsoidColor,
        Self::ConeColor,
        Self::ConeBaseColor,
        Self::ConeTopColor,
    ];

    /// Attribute name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::SphereColor => "sphere_color",
            Self::SphereRadius => "sphere_radius",
            Self::EllipsoidColor => "ellipsoid_color",
            Self::ConeColor => "cone_color",
            Self::ConeBaseColor => "cone_base_color",
            Self::ConeTopColor => "cone_top_color",
        }
    }

    /// Attribute type.
    #[must_use]
    pub fn ty(self) -> WgslType {
        match self {
            Self::SphereRadius => WgslType::F32,
            _ => WgslType::Vec4,
        }
    }

    /// Floats one value occupies in the property stream.
    #[must_use]
    pub fn floats(self) -> usize {
        (self.ty().size() / 4) as usize
    }

    /// Shape owning the property.
    #[must_use]
    pub fn shape(self) -> ShapeKind {
        match self {
            Self::SphereColor | Self::SphereRadius => ShapeKind::Sphere,
            Self::EllipsoidColor => ShapeKind::Ellipsoid,
            Self::ConeColor | Self::ConeBaseColor | Self::ConeTopColor => {
                ShapeKind::Cone
            }
        }
    }

    /// Parse an attribute name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}
