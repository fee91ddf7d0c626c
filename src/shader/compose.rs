//! Fixed composition order for annotation programs.

use super::{
    builder::{ShaderBuilder, ShaderConfigError, WgslType},
    hooks::declare_hooks,
    key::CompositionKey,
    pick::declare_pick,
};
use crate::renderer::impostor;

/// Import path of the shared lighting module.
pub const LIGHTING_MODULE: &str = "annotation::lighting";

/// Uniforms every annotation program declares, whatever its shape.
pub const FRAME_UNIFORMS: &[(&str, WgslType)] = &[
    ("model", WgslType::Mat4),
    ("view", WgslType::Mat4),
    ("projection", WgslType::Mat4),
    ("projection_inverse", WgslType::Mat4),
    ("ortho", WgslType::F32),
    ("radius_scale", WgslType::F32),
    ("default_color", WgslType::Vec4),
];

fn declare_lighting(
    builder: &mut ShaderBuilder,
) -> Result<(), ShaderConfigError> {
    builder.add_import(LIGHTING_MODULE);
    builder.add_uniform("material_ambient", WgslType::Vec4)?;
    builder.add_uniform("material_specular", WgslType::Vec4)?;
    builder.add_uniform("material_shininess", WgslType::F32)?;
    builder.add_uniform("opacity", WgslType::F32)
}

/// Compose the program for `key`:
/// 1. lighting import and material uniforms
/// 2. frame uniforms, shared impostor helpers and the shape's emitter
/// 3. property setters and their invocations
/// 4. pick-ID assignment
/// 5. the shape's fragment resolver
///
/// # Errors
///
/// Two contributions declare the same symbol with different types.
pub fn compose_annotation_program(
    builder: &mut ShaderBuilder,
    key: &CompositionKey,
) -> Result<(), ShaderConfigError> {
    declare_lighting(builder)?;

    for &(name, ty) in FRAME_UNIFORMS {
        builder.add_uniform(name, ty)?;
    }
    impostor::declare_common(builder)?;
    impostor::declare_geometry(builder, key.shape, key.rank)?;

    declare_hooks(builder, key.shape.hooks(), &key.properties)?;
    declare_pick(
        builder,
        key.shape.pick_ids_per_instance(),
        key.shape.color_varyings(),
    )?;

    impostor::declare_resolver(builder, key.shape, key.is_volumetric())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use naga::valid::{Capabilities, ValidationFlags, Validator};

    use super::*;
    use crate::{
        annotation::{PropertyId, ShapeKind},
        shader::ProgramCache,
    };

    fn subsets(properties: &[PropertyId]) -> Vec<BTreeSet<PropertyId>> {
        (0..1u32 << properties.len())
            .map(|mask| {
                properties
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| mask & (1 << i) != 0)
                    .map(|(_, p)| *p)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn every_shape_rank_and_property_subset_validates() {
        let mut cache = ProgramCache::new().unwrap();
        let mut validator =
            Validator::new(ValidationFlags::all(), Capabilities::default());
        for shape in ShapeKind::ALL {
            for rank in 1..=3 {
                for properties in subsets(shape.properties()) {
                    let key =
                        CompositionKey::new(shape, rank, &properties).unwrap();
                    let program = cache
                        .get_or_compose(&key)
                        .unwrap_or_else(|e| panic!("{key}: {e}"));
                    let _ = validator
                        .validate(program.module())
                        .unwrap_or_else(|e| panic!("{key}: {e:?}"));
                }
            }
        }
    }

    #[test]
    fn lighting_is_declared_before_geometry_and_resolver_last() {
        let key =
            CompositionKey::new(ShapeKind::Sphere, 3, &BTreeSet::new()).unwrap();
        let mut builder = ShaderBuilder::new();
        compose_annotation_program(&mut builder, &key).unwrap();
        let source = builder.finish(&key.to_string()).source;

        let import = source.find("#import annotation::lighting").unwrap();
        let emitter = source.find("fn emit_sphere").unwrap();
        let setter = source.find("fn set_sphere_color").unwrap();
        let pick = source.find("fn assign_pick_id").unwrap();
        let resolver = source.find("fn resolve_sphere").unwrap();
        assert!(import < emitter);
        assert!(emitter < setter);
        assert!(setter < pick);
        assert!(pick < resolver);
    }

    #[test]
    fn flat_ranks_skip_lighting_calls() {
        let flat =
            CompositionKey::new(ShapeKind::Cone, 2, &BTreeSet::new()).unwrap();
        let lit =
            CompositionKey::new(ShapeKind::Cone, 3, &BTreeSet::new()).unwrap();
        let mut cache = ProgramCache::new().unwrap();
        assert!(!cache
            .get_or_compose(&flat)
            .unwrap()
            .source()
            .contains("lighting::apply_lighting("));
        assert!(cache
            .get_or_compose(&lit)
            .unwrap()
            .source()
            .contains("lighting::apply_lighting("));
    }

    #[test]
    fn property_stride_matches_active_properties() {
        let key = CompositionKey::new(
            ShapeKind::Sphere,
            3,
            &BTreeSet::from([PropertyId::SphereColor, PropertyId::SphereRadius]),
        )
        .unwrap();
        let mut cache = ProgramCache::new().unwrap();
        let layout = cache.get_or_compose(&key).unwrap().layout().clone();
        assert_eq!(layout.stride(crate::shader::VertexSlot::Properties), 20);
        assert_eq!(layout.attribute("sphere_color").offset, 0);
        assert_eq!(layout.attribute("sphere_radius").offset, 16);
    }
}
