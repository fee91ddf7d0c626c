//! Append-only cache of composed annotation programs.

use std::{cell::OnceCell, collections::hash_map::Entry};

use rustc_hash::FxHashMap;

use super::{
    builder::{ShaderBuilder, ShaderConfigError, VertexSlot},
    compose::compose_annotation_program,
    key::CompositionKey,
    layout::{AttributeBinding, ShaderLayout, UniformBinding, UniformWriter},
};
use crate::{
    error::AnnotationError,
    gpu::{
        render_context::RenderContext,
        shader_composer::{create_shader_module, ShaderComposer},
    },
    renderer::{pipeline_util, RenderResources},
};

/// A composed program: WGSL source, validated naga IR, symbol tables and
/// the render pipeline linked from them on first use.
pub struct CompiledProgram {
    key: CompositionKey,
    source: String,
    module: naga::Module,
    layout: ShaderLayout,
    pipeline: OnceCell<wgpu::RenderPipeline>,
}

impl CompiledProgram {
    /// Key this program was composed for.
    #[must_use]
    pub fn key(&self) -> &CompositionKey {
        &self.key
    }

    /// Generated WGSL.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// naga IR after import resolution.
    #[must_use]
    pub fn module(&self) -> &naga::Module {
        &self.module
    }

    /// Symbol tables.
    #[must_use]
    pub fn layout(&self) -> &ShaderLayout {
        &self.layout
    }

    /// Attribute named `name`.
    ///
    /// # Panics
    ///
    /// If the program declares no such attribute.
    #[must_use]
    #[track_caller]
    pub fn attribute(&self, name: &str) -> &AttributeBinding {
        self.layout.attribute(name)
    }

    /// Uniform named `name`.
    ///
    /// # Panics
    ///
    /// If the program declares no such uniform.
    #[must_use]
    #[track_caller]
    pub fn uniform(&self, name: &str) -> &UniformBinding {
        self.layout.uniform(name)
    }

    /// Staging writer for this program's uniform struct.
    #[must_use]
    pub fn uniform_writer(&self) -> UniformWriter<'_> {
        self.layout.uniform_writer()
    }

    /// The linked pipeline, created on first call.
    ///
    /// Colour target 0 uses the context's colour format.
    pub fn pipeline(
        &self,
        context: &RenderContext,
        resources: &RenderResources,
    ) -> &wgpu::RenderPipeline {
        self.pipeline
            .get_or_init(|| self.link(context, resources))
    }

    fn link(
        &self,
        context: &RenderContext,
        resources: &RenderResources,
    ) -> wgpu::RenderPipeline {
        let device = &context.device;
        let label = self.key.to_string();
        log::debug!("linking pipeline for {label}");
        let shader = create_shader_module(device, &label, &self.module);

        let pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{label} Pipeline Layout")),
                bind_group_layouts: &[
                    &resources.uniform_layout,
                    &resources.lighting.layout,
                ],
                push_constant_ranges: &[],
            });

        // Only slots with attributes get a buffer; properties are absent
        // when no style property is active.
        let attributes: Vec<(VertexSlot, Vec<wgpu::VertexAttribute>)> =
            VertexSlot::ALL
                .iter()
                .map(|&slot| (slot, self.layout.vertex_attributes(slot)))
                .filter(|(_, attributes)| !attributes.is_empty())
                .collect();
        let buffers: Vec<wgpu::VertexBufferLayout<'_>> = attributes
            .iter()
            .map(|(slot, attributes)| wgpu::VertexBufferLayout {
                array_stride: self.layout.stride(*slot),
                step_mode: slot.step_mode(),
                attributes,
            })
            .collect();

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{label} Pipeline")),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &pipeline_util::annotation_fragment_targets(
                    context.color_format,
                ),
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(pipeline_util::depth_stencil_state()),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }
}

/// Memoizes programs by [`CompositionKey`] for the lifetime of a context.
///
/// Entries are never evicted; programs are dropped with the cache.
pub struct ProgramCache {
    composer: ShaderComposer,
    programs: FxHashMap<CompositionKey, CompiledProgram>,
}

impl ProgramCache {
    /// Empty cache with the shared WGSL modules registered.
    ///
    /// # Errors
    ///
    /// A shared module fails to parse.
    pub fn new() -> Result<Self, AnnotationError> {
        Ok(Self {
            composer: ShaderComposer::new()?,
            programs: FxHashMap::default(),
        })
    }

    /// Program for `key`, running `build` only on the first request.
    ///
    /// # Errors
    ///
    /// `build` reports a configuration error, or naga_oil rejects the
    /// generated source. Nothing is cached on failure.
    pub fn get_or_build<F>(
        &mut self,
        key: &CompositionKey,
        build: F,
    ) -> Result<&CompiledProgram, AnnotationError>
    where
        F: FnOnce(&mut ShaderBuilder) -> Result<(), ShaderConfigError>,
    {
        match self.programs.entry(key.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let mut builder = ShaderBuilder::new();
                build(&mut builder)?;
                let composed = builder.finish(&key.to_string());
                let module = self
                    .composer
                    .compose_naga(&composed.source, &key.file_path())?;
                log::debug!(
                    "composed {key}: {} attributes, {} uniform bytes",
                    composed.layout.attributes.len(),
                    composed.layout.uniform_size
                );
                Ok(entry.insert(CompiledProgram {
                    key: key.clone(),
                    source: composed.source,
                    module,
                    layout: composed.layout,
                    pipeline: OnceCell::new(),
                }))
            }
        }
    }

    /// Program for `key` composed with the standard annotation rules.
    ///
    /// # Errors
    ///
    /// See [`ProgramCache::get_or_build`].
    pub fn get_or_compose(
        &mut self,
        key: &CompositionKey,
    ) -> Result<&CompiledProgram, AnnotationError> {
        self.get_or_build(key, |builder| {
            compose_annotation_program(builder, key)
        })
    }

    /// Already composed program, if any.
    #[must_use]
    pub fn get(&self, key: &CompositionKey) -> Option<&CompiledProgram> {
        self.programs.get(key)
    }

    /// Number of cached programs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// Whether nothing has been composed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}
