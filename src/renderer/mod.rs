//! Drawing annotation batches.
//!
//! [`RenderResources`] holds what every program shares (uniform layout,
//! light table, corner template). A [`helper::RenderHelper`] per shape and
//! view kind turns an [`InstanceBatch`](crate::annotation::InstanceBatch)
//! into one instanced draw.

pub mod helper;
pub mod impostor;
pub mod pipeline_util;

use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use crate::{
    lighting::LightingResources, options::Options, shader::pick::NO_SELECTION,
};

/// Kind of view a helper draws for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    /// 2D slice through the volume, orthographic rays.
    SliceView,
    /// 3D view, perspective rays from the eye.
    PerspectiveView,
}

impl RenderTarget {
    /// Value of the `ortho` uniform.
    #[must_use]
    pub fn ortho(self) -> f32 {
        match self {
            Self::SliceView => 1.0,
            Self::PerspectiveView => 0.0,
        }
    }
}

/// Per-frame camera and selection state, supplied by the host viewer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    /// World to eye.
    pub view: Mat4,
    /// Eye to clip, wgpu depth range.
    pub projection: Mat4,
    /// Display transform applied to annotation coordinates.
    pub model: Mat4,
    /// Voxel anisotropy, applied after `model`'s own scale.
    pub voxel_scale: Vec3,
    /// Multiplier on every radius.
    pub radius_scale: f32,
    /// First pick ID of this batch; 0 is reserved for the background.
    pub pick_base: u32,
    /// Absolute pick ID of any part of the selected instance, or
    /// [`NO_SELECTION`]. Every part of that instance is highlighted.
    pub selected_index: u32,
}

impl FrameContext {
    /// Context with identity model, no anisotropy and nothing selected.
    #[must_use]
    pub fn new(view: Mat4, projection: Mat4) -> Self {
        Self {
            view,
            projection,
            model: Mat4::IDENTITY,
            voxel_scale: Vec3::ONE,
            radius_scale: 1.0,
            pick_base: 1,
            selected_index: NO_SELECTION,
        }
    }

    /// `model` with the voxel scale folded in.
    #[must_use]
    pub fn scaled_model(&self) -> Mat4 {
        self.model * Mat4::from_scale(self.voxel_scale)
    }
}

/// GPU objects shared by every annotation program of one context.
pub struct RenderResources {
    /// Layout of group 0, the per-program uniform struct.
    pub uniform_layout: wgpu::BindGroupLayout,
    /// Light table at group 1.
    pub lighting: LightingResources,
    /// The four billboard corner flags, one per template vertex.
    pub corner_flags: wgpu::Buffer,
    /// Six `u16` indices over the template.
    pub quad_indices: wgpu::Buffer,
    options: Options,
}

impl RenderResources {
    /// Upload the shared buffers.
    pub fn new(device: &wgpu::Device, options: &Options) -> Self {
        let uniform_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Annotation Uniform Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX
                        | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let corner_flags =
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Annotation Corner Flags"),
                contents: bytemuck::cast_slice(&impostor::CORNER_FLAGS),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let quad_indices =
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Annotation Quad Indices"),
                contents: bytemuck::cast_slice(&impostor::QUAD_INDICES),
                usage: wgpu::BufferUsages::INDEX,
            });

        Self {
            uniform_layout,
            lighting: LightingResources::new(device, &options.lighting),
            corner_flags,
            quad_indices,
            options: options.clone(),
        }
    }

    /// Options the resources were built with.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Swap in new options. Output options are kept: the colour format
    /// belongs to the [`RenderContext`](crate::gpu::render_context::RenderContext)
    /// and pipelines are already linked against it.
    pub fn set_options(&mut self, queue: &wgpu::Queue, options: &Options) {
        if options.output != self.options.output {
            log::warn!("output options change ignored until the context is rebuilt");
        }
        self.lighting.update(queue, &options.lighting);
        self.options = Options {
            output: self.options.output.clone(),
            ..options.clone()
        };
    }
}
