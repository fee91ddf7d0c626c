use std::collections::BTreeSet;

use glam::Vec4;

use super::{Annotation, PropertyId, ShapeKind};
use crate::{
    error::AnnotationError, options::GeometryOptions, shader::CompositionKey,
};

/// Instances of one shape packed for a single instanced draw.
///
/// Geometry and property values are kept in two flat `f32` streams whose
/// per-instance strides match the program composed for [`Self::key`].
#[derive(Debug, Clone)]
pub struct InstanceBatch {
    shape: ShapeKind,
    key: CompositionKey,
    default_color: Vec4,
    default_radius: f32,
    geometry: Vec<f32>,
    properties: Vec<f32>,
    count: usize,
}

impl InstanceBatch {
    /// Empty batch for `shape` at `rank`. Properties in `referenced` that
    /// the shape supports get a real per-instance stream; unset values fall
    /// back to the options' defaults.
    ///
    /// # Errors
    ///
    /// [`AnnotationError::UnsupportedRank`] outside `1..=3`.
    pub fn new(
        shape: ShapeKind,
        rank: u32,
        referenced: &BTreeSet<PropertyId>,
        geometry: &GeometryOptions,
    ) -> Result<Self, AnnotationError> {
        Ok(Self {
            shape,
            key: CompositionKey::new(shape, rank, referenced)?,
            default_color: Vec4::from_array(geometry.default_color),
            default_radius: geometry.default_sphere_radius,
            geometry: Vec::new(),
            properties: Vec::new(),
            count: 0,
        })
    }

    /// Batch holding `annotations`.
    ///
    /// # Errors
    ///
    /// See [`InstanceBatch::new`] and [`InstanceBatch::push`].
    pub fn from_annotations<'a>(
        shape: ShapeKind,
        rank: u32,
        referenced: &BTreeSet<PropertyId>,
        geometry: &GeometryOptions,
        annotations: impl IntoIterator<Item = &'a Annotation>,
    ) -> Result<Self, AnnotationError> {
        let mut batch = Self::new(shape, rank, referenced, geometry)?;
        for annotation in annotations {
            batch.push(annotation)?;
        }
        Ok(batch)
    }

    /// Append one instance.
    ///
    /// # Errors
    ///
    /// [`AnnotationError::BatchLayout`] when `annotation` is another shape.
    pub fn push(&mut self, annotation: &Annotation) -> Result<(), AnnotationError> {
        if annotation.shape() != self.shape {
            return Err(AnnotationError::BatchLayout {
                expected: self.shape,
                found: annotation.shape(),
            });
        }
        annotation.pack_geometry(self.key.rank, &mut self.geometry);
        for &property in &self.key.properties {
            let value = annotation
                .property_value(property, self.default_color, self.default_radius)
                .unwrap_or(self.default_color);
            let floats = property.floats();
            self.properties
                .extend_from_slice(&value.to_array()[..floats]);
        }
        self.count += 1;
        Ok(())
    }

    /// Drop every instance, keeping the allocation.
    pub fn clear(&mut self) {
        self.geometry.clear();
        self.properties.clear();
        self.count = 0;
    }

    /// Shape of every instance.
    #[must_use]
    pub fn shape(&self) -> ShapeKind {
        self.shape
    }

    /// Program key the streams are laid out for.
    #[must_use]
    pub fn key(&self) -> &CompositionKey {
        &self.key
    }

    /// Display rank of the positions.
    #[must_use]
    pub fn rank(&self) -> u32 {
        self.key.rank
    }

    /// Packed positional data.
    #[must_use]
    pub fn geometry(&self) -> &[f32] {
        &self.geometry
    }

    /// Packed values of the active properties, in [`PropertyId`] order.
    #[must_use]
    pub fn properties(&self) -> &[f32] {
        &self.properties
    }

    /// Floats of property data per instance.
    #[must_use]
    pub fn property_floats(&self) -> usize {
        self.key.properties.iter().map(|p| p.floats()).sum()
    }

    /// Number of instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the batch holds no instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
