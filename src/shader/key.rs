use std::{collections::BTreeSet, fmt};

use crate::{
    annotation::{PropertyId, ShapeKind},
    error::AnnotationError,
};

/// Exact configuration a program is composed for.
///
/// Equal keys always compose byte-identical WGSL, so the key is all the
/// program cache needs to memoize on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositionKey {
    /// Primitive kind.
    pub shape: ShapeKind,
    /// Display dimensions carried by instance positions (1..=3).
    pub rank: u32,
    /// Per-instance properties with real setters.
    pub properties: BTreeSet<PropertyId>,
}

impl CompositionKey {
    /// Key for `shape` at `rank`, keeping only the referenced properties
    /// the shape actually supports.
    ///
    /// # Errors
    ///
    /// [`AnnotationError::UnsupportedRank`] outside `1..=3`.
    pub fn new(
        shape: ShapeKind,
        rank: u32,
        referenced: &BTreeSet<PropertyId>,
    ) -> Result<Self, AnnotationError> {
        if !(1..=3).contains(&rank) {
            return Err(AnnotationError::UnsupportedRank(rank));
        }
        let properties = referenced
            .iter()
            .copied()
            .filter(|p| p.shape() == shape)
            .collect();
        Ok(Self {
            shape,
            rank,
            properties,
        })
    }

    /// Whether lit 3D shading applies.
    #[must_use]
    pub fn is_volumetric(&self) -> bool {
        self.rank == 3
    }

    /// Pseudo file path naga_oil reports diagnostics against.
    #[must_use]
    pub fn file_path(&self) -> String {
        let mut path = format!("annotation/{}_{}d", self.shape, self.rank);
        for property in &self.properties {
            path.push('_');
            path.push_str(property.name());
        }
        path.push_str(".wgsl");
        path
    }
}

impl fmt::Display for CompositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "annotation/{}:{}d[", self.shape, self.rank)?;
        for (i, property) in self.properties.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(property.name())?;
        }
        f.write_str("]")
    }
}
