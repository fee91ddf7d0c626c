//! One instanced draw per annotation batch.
//!
//! A helper owns the per-batch GPU buffers (geometry stream, property
//! stream, uniform struct) and nothing else; programs come from the shared
//! [`ProgramCache`] and are looked up by the batch's key on every draw.

use glam::Vec4;

use super::{FrameContext, RenderResources, RenderTarget};
use crate::{
    annotation::{InstanceBatch, ShapeKind},
    error::AnnotationError,
    gpu::{
        dynamic_buffer::{DynamicBuffer, TypedBuffer},
        render_context::RenderContext,
    },
    shader::{CompiledProgram, ProgramCache, VertexSlot},
};

struct HelperBuffers {
    geometry: TypedBuffer<f32>,
    properties: TypedBuffer<f32>,
    uniforms: DynamicBuffer,
    bind_group: wgpu::BindGroup,
}

impl HelperBuffers {
    fn new(
        device: &wgpu::Device,
        resources: &RenderResources,
        label: &str,
        uniform_size: usize,
    ) -> Self {
        let uniforms = DynamicBuffer::new(
            device,
            &format!("{label} Uniforms"),
            uniform_size,
            wgpu::BufferUsages::UNIFORM,
        );
        let bind_group = Self::bind_group(device, resources, &uniforms, label);
        Self {
            geometry: TypedBuffer::with_capacity(
                device,
                &format!("{label} Geometry"),
                256,
                wgpu::BufferUsages::VERTEX,
            ),
            properties: TypedBuffer::with_capacity(
                device,
                &format!("{label} Properties"),
                256,
                wgpu::BufferUsages::VERTEX,
            ),
            uniforms,
            bind_group,
        }
    }

    fn bind_group(
        device: &wgpu::Device,
        resources: &RenderResources,
        uniforms: &DynamicBuffer,
        label: &str,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &resources.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.buffer().as_entire_binding(),
            }],
            label: Some(&format!("{label} Bind Group")),
        })
    }
}

/// Draws batches of one shape for one kind of view.
pub struct RenderHelper {
    shape: ShapeKind,
    target: RenderTarget,
    buffers: Option<HelperBuffers>,
}

impl RenderHelper {
    /// Helper with no GPU buffers yet; they are created on first draw.
    #[must_use]
    pub fn new(shape: ShapeKind, target: RenderTarget) -> Self {
        Self {
            shape,
            target,
            buffers: None,
        }
    }

    /// Shape this helper draws.
    #[must_use]
    pub fn shape(&self) -> ShapeKind {
        self.shape
    }

    /// View kind this helper draws for.
    #[must_use]
    pub fn target(&self) -> RenderTarget {
        self.target
    }

    fn label(&self) -> String {
        format!("{} {:?}", self.shape, self.target)
    }

    /// Record the draw of `batch` into `pass`.
    ///
    /// Composes and links the program on first use, uploads instance data
    /// and uniforms, then issues `draw_indexed(0..6, 0, 0..count)`. An empty
    /// batch records nothing. Uniforms live in one buffer per helper, so a
    /// helper draws at most one batch per submission.
    ///
    /// # Errors
    ///
    /// [`AnnotationError::BatchLayout`] for a batch of another shape,
    /// [`AnnotationError::BatchStride`] when a packed stream does not match
    /// the program layout, and composition errors from the cache.
    pub fn draw(
        &mut self,
        context: &RenderContext,
        resources: &RenderResources,
        cache: &mut ProgramCache,
        frame: &FrameContext,
        batch: &InstanceBatch,
        pass: &mut wgpu::RenderPass<'_>,
    ) -> Result<(), AnnotationError> {
        if batch.shape() != self.shape {
            return Err(AnnotationError::BatchLayout {
                expected: self.shape,
                found: batch.shape(),
            });
        }
        if batch.is_empty() {
            return Ok(());
        }

        let program = cache.get_or_compose(batch.key())?;
        check_stride(program, VertexSlot::Geometry, batch.geometry(), batch.len())?;
        check_stride(
            program,
            VertexSlot::Properties,
            batch.properties(),
            batch.len(),
        )?;

        let uniforms = self.uniform_bytes(program, resources, frame);
        let label = self.label();
        let device = &context.device;
        let buffers = self.buffers.get_or_insert_with(|| {
            HelperBuffers::new(device, resources, &label, uniforms.len())
        });
        // Vertex streams are rebound below, so growing them needs no
        // bookkeeping; the uniform buffer sits in a bind group.
        buffers
            .geometry
            .write(device, &context.queue, batch.geometry());
        buffers
            .properties
            .write(device, &context.queue, batch.properties());
        if buffers
            .uniforms
            .write_bytes(device, &context.queue, &uniforms)
        {
            buffers.bind_group = HelperBuffers::bind_group(
                device,
                resources,
                &buffers.uniforms,
                &label,
            );
        }

        pass.set_pipeline(program.pipeline(context, resources));
        pass.set_bind_group(0, &buffers.bind_group, &[]);
        pass.set_bind_group(1, &resources.lighting.bind_group, &[]);

        // Buffer indices follow the slots that carry attributes.
        let layout = program.layout();
        let mut index = 0;
        for slot in VertexSlot::ALL {
            if layout.stride(slot) == 0 {
                continue;
            }
            let buffer = match slot {
                VertexSlot::Corner => &resources.corner_flags,
                VertexSlot::Geometry => buffers.geometry.buffer(),
                VertexSlot::Properties => buffers.properties.buffer(),
            };
            pass.set_vertex_buffer(index, buffer.slice(..));
            index += 1;
        }
        pass.set_index_buffer(
            resources.quad_indices.slice(..),
            wgpu::IndexFormat::Uint16,
        );
        pass.draw_indexed(0..6, 0, 0..batch.len() as u32);
        Ok(())
    }

    fn uniform_bytes(
        &self,
        program: &CompiledProgram,
        resources: &RenderResources,
        frame: &FrameContext,
    ) -> Vec<u8> {
        let options = resources.options();
        let lighting = &options.lighting;
        let geometry = &options.geometry;

        let mut writer = program.uniform_writer();
        writer.set_mat4("model", &frame.scaled_model());
        writer.set_mat4("view", &frame.view);
        writer.set_mat4("projection", &frame.projection);
        writer.set_mat4("projection_inverse", &frame.projection.inverse());
        writer.set_f32("ortho", self.target.ortho());
        writer.set_f32(
            "radius_scale",
            frame.radius_scale * geometry.radius_scale,
        );
        writer.set_vec4("default_color", Vec4::from_array(geometry.default_color));
        writer.set_vec4(
            "material_ambient",
            Vec4::from_array(lighting.material_ambient),
        );
        writer.set_vec4(
            "material_specular",
            Vec4::from_array(lighting.material_specular),
        );
        writer.set_f32("material_shininess", lighting.shininess);
        writer.set_f32("opacity", lighting.opacity);
        writer.set_u32("pick_base", frame.pick_base);
        writer.set_u32("selected_index", frame.selected_index);
        writer.set_f32("highlight_mix", geometry.highlight_mix);
        if self.shape == ShapeKind::Sphere {
            writer.set_f32("box_correction", geometry.box_correction);
            writer.set_f32("default_radius", geometry.default_sphere_radius);
        }
        writer.bytes().to_vec()
    }
}

fn check_stride(
    program: &CompiledProgram,
    slot: VertexSlot,
    data: &[f32],
    count: usize,
) -> Result<(), AnnotationError> {
    let stride = (program.layout().stride(slot) / 4) as usize;
    if data.len() == stride * count {
        Ok(())
    } else {
        Err(AnnotationError::BatchStride {
            stride,
            len: data.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3};

    use super::*;
    use crate::{
        annotation::{Annotation, Cone, Ellipsoid, PropertyId, Sphere},
        options::Options,
        renderer::pipeline_util::{DEPTH_FORMAT, PICK_FORMAT},
    };

    const SIZE: u32 = 64;
    const SENTINEL: wgpu::Color = wgpu::Color {
        r: 0.0,
        g: 1.0,
        b: 0.0,
        a: 1.0,
    };

    fn target(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
    ) -> wgpu::Texture {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Test Target"),
            size: wgpu::Extent3d {
                width: SIZE,
                height: SIZE,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }

    fn read_back(context: &RenderContext, texture: &wgpu::Texture) -> Vec<u8> {
        // 64 texels of 4 bytes: already 256-byte aligned rows.
        let bytes_per_row = SIZE * 4;
        let buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback"),
            size: u64::from(bytes_per_row * SIZE),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = context.create_encoder();
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(SIZE),
                },
            },
            wgpu::Extent3d {
                width: SIZE,
                height: SIZE,
                depth_or_array_layers: 1,
            },
        );
        context.submit(encoder);

        let slice = buffer.slice(..);
        slice.map_async(wgpu::MapMode::Read, |_| {});
        let _ = context.device.poll(wgpu::PollType::Wait);
        let bytes = slice.get_mapped_range().to_vec();
        buffer.unmap();
        bytes
    }

    struct Frame {
        color: Vec<u8>,
        pick: Vec<u8>,
    }

    impl Frame {
        fn color(&self, x: u32, y: u32) -> [u8; 4] {
            let i = ((y * SIZE + x) * 4) as usize;
            [
                self.color[i],
                self.color[i + 1],
                self.color[i + 2],
                self.color[i + 3],
            ]
        }

        fn pick(&self, x: u32, y: u32) -> u32 {
            let i = ((y * SIZE + x) * 4) as usize;
            u32::from_le_bytes([
                self.pick[i],
                self.pick[i + 1],
                self.pick[i + 2],
                self.pick[i + 3],
            ])
        }
    }

    /// Headless context with shared resources and fixed-size targets.
    struct Harness {
        context: RenderContext,
        resources: RenderResources,
        cache: ProgramCache,
        color: wgpu::Texture,
        pick: wgpu::Texture,
        depth: wgpu::Texture,
    }

    impl Harness {
        /// `None` when no adapter is available.
        fn new(options: &Options) -> Option<Self> {
            let context = pollster::block_on(RenderContext::headless(
                options.output.color_format.to_wgpu(),
            ))
            .ok()?;
            let resources = RenderResources::new(&context.device, options);
            Some(Self {
                color: target(&context.device, context.color_format),
                pick: target(&context.device, PICK_FORMAT),
                depth: target(&context.device, DEPTH_FORMAT),
                resources,
                cache: ProgramCache::new().unwrap(),
                context,
            })
        }

        /// Clear, draw `batch` through `helper` and read both targets back.
        fn draw(
            &mut self,
            helper: &mut RenderHelper,
            frame: &FrameContext,
            batch: &InstanceBatch,
        ) -> Frame {
            let color_view = self.color.create_view(&Default::default());
            let pick_view = self.pick.create_view(&Default::default());
            let depth_view = self.depth.create_view(&Default::default());

            let mut encoder = self.context.create_encoder();
            {
                let mut pass =
                    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("Annotation Test Pass"),
                        color_attachments: &[
                            Some(wgpu::RenderPassColorAttachment {
                                view: &color_view,
                                depth_slice: None,
                                resolve_target: None,
                                ops: wgpu::Operations {
                                    load: wgpu::LoadOp::Clear(SENTINEL),
                                    store: wgpu::StoreOp::Store,
                                },
                            }),
                            Some(wgpu::RenderPassColorAttachment {
                                view: &pick_view,
                                depth_slice: None,
                                resolve_target: None,
                                ops: wgpu::Operations {
                                    load: wgpu::LoadOp::Clear(
                                        wgpu::Color::TRANSPARENT,
                                    ),
                                    store: wgpu::StoreOp::Store,
                                },
                            }),
                        ],
                        depth_stencil_attachment: Some(
                            wgpu::RenderPassDepthStencilAttachment {
                                view: &depth_view,
                                depth_ops: Some(wgpu::Operations {
                                    load: wgpu::LoadOp::Clear(1.0),
                                    store: wgpu::StoreOp::Store,
                                }),
                                stencil_ops: None,
                            },
                        ),
                        timestamp_writes: None,
                        occlusion_query_set: None,
                    });
                helper
                    .draw(
                        &self.context,
                        &self.resources,
                        &mut self.cache,
                        frame,
                        batch,
                        &mut pass,
                    )
                    .unwrap();
            }
            self.context.submit(encoder);

            Frame {
                color: read_back(&self.context, &self.color),
                pick: read_back(&self.context, &self.pick),
            }
        }
    }

    const SENTINEL_RGBA: [u8; 4] = [0, 255, 0, 255];
    const MID: u32 = SIZE / 2;

    fn perspective(far: f32) -> Mat4 {
        Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, far)
    }

    fn batch(
        shape: ShapeKind,
        referenced: &[PropertyId],
        options: &Options,
        annotations: &[Annotation],
    ) -> InstanceBatch {
        InstanceBatch::from_annotations(
            shape,
            3,
            &referenced.iter().copied().collect(),
            &options.geometry,
            annotations,
        )
        .unwrap()
    }

    fn sphere(center: Vec3, radius: f32) -> Annotation {
        Annotation::Sphere(Sphere {
            center,
            radius: Some(radius),
            color: None,
        })
    }

    /// One draw of `annotations`, or `None` when no adapter is available.
    fn render(
        shape: ShapeKind,
        target: RenderTarget,
        frame: &FrameContext,
        options: &Options,
        annotations: &[Annotation],
    ) -> Option<Frame> {
        let mut harness = Harness::new(options)?;
        let referenced: &[PropertyId] = if shape == ShapeKind::Sphere {
            &[PropertyId::SphereRadius]
        } else {
            &[]
        };
        let batch = batch(shape, referenced, options, annotations);
        let mut helper = shape.render_helper(target);
        Some(harness.draw(&mut helper, frame, &batch))
    }

    fn render_sphere(center: Vec3, far: f32) -> Option<Frame> {
        render(
            ShapeKind::Sphere,
            RenderTarget::PerspectiveView,
            &FrameContext::new(Mat4::IDENTITY, perspective(far)),
            &Options::default(),
            &[sphere(center, 1.0)],
        )
    }

    #[test]
    fn sphere_covers_centre_and_discards_billboard_corners() {
        let Some(frame) = render_sphere(Vec3::new(0.0, 0.0, -5.0), 100.0) else {
            return;
        };
        let centre = frame.color(MID, MID);
        assert_ne!(centre, SENTINEL_RGBA);
        assert!(centre[0] > 0);
        assert_eq!(frame.pick(MID, MID), 1);

        // Inside the 1.5x billboard but outside the silhouette.
        assert_eq!(frame.color(MID + 14, MID), SENTINEL_RGBA);
        assert_eq!(frame.pick(MID + 14, MID), 0);
        assert_eq!(frame.color(2, 2), SENTINEL_RGBA);
    }

    #[test]
    fn sphere_beyond_far_plane_writes_nothing() {
        let Some(frame) = render_sphere(Vec3::new(0.0, 0.0, -5.0), 3.0) else {
            return;
        };
        for (x, y) in [(MID, MID), (MID + 5, MID - 5)] {
            assert_eq!(frame.color(x, y), SENTINEL_RGBA);
            assert_eq!(frame.pick(x, y), 0);
        }
    }

    #[test]
    fn ellipsoid_silhouette_follows_its_axes() {
        let Some(frame) = render(
            ShapeKind::Ellipsoid,
            RenderTarget::PerspectiveView,
            &FrameContext::new(Mat4::IDENTITY, perspective(100.0)),
            &Options::default(),
            &[Annotation::Ellipsoid(Ellipsoid {
                center: Vec3::new(0.0, 0.0, -5.0),
                axes: [Vec3::X, Vec3::Y * 0.5, Vec3::Z * 0.5],
                color: None,
            })],
        ) else {
            return;
        };
        assert_ne!(frame.color(MID, MID), SENTINEL_RGBA);
        assert_eq!(frame.pick(MID, MID), 1);
        // About 11 pixels of half-width along x, under 6 along y.
        assert_ne!(frame.color(MID + 8, MID), SENTINEL_RGBA);
        assert_eq!(frame.pick(MID + 8, MID), 1);
        assert_eq!(frame.color(MID, MID + 10), SENTINEL_RGBA);
        assert_eq!(frame.pick(MID, MID + 10), 0);
    }

    #[test]
    fn slice_view_casts_parallel_rays() {
        let frame = FrameContext::new(
            Mat4::IDENTITY,
            Mat4::orthographic_rh(-2.0, 2.0, -2.0, 2.0, 0.1, 100.0),
        );
        let Some(frame) = render(
            ShapeKind::Sphere,
            RenderTarget::SliceView,
            &frame,
            &Options::default(),
            &[sphere(Vec3::new(0.0, 0.0, -5.0), 1.0)],
        ) else {
            return;
        };
        // 16 pixels per unit: the radius reaches x = 48, the billboard 56.
        assert_ne!(frame.color(MID, MID), SENTINEL_RGBA);
        assert_ne!(frame.color(MID + 14, MID), SENTINEL_RGBA);
        assert_eq!(frame.pick(MID + 14, MID), 1);
        assert_eq!(frame.color(MID + 20, MID), SENTINEL_RGBA);
        assert_eq!(frame.pick(MID + 20, MID), 0);
    }

    /// Left cone shows its top cap, right cone its base cap.
    fn facing_cones() -> [Annotation; 2] {
        let cone = |base: Vec3, axis: Vec3| {
            Annotation::Cone(Cone {
                base,
                axis,
                base_radius: 1.0,
                top_radius: 0.5,
                color: None,
                base_color: None,
                top_color: None,
            })
        };
        [
            cone(Vec3::new(-1.5, 0.0, -8.0), Vec3::new(0.0, 0.0, 3.0)),
            cone(Vec3::new(1.5, 0.0, -5.0), Vec3::new(0.0, 0.0, -3.0)),
        ]
    }

    const LEFT_CONE_X: u32 = 15;
    const RIGHT_CONE_X: u32 = 48;

    #[test]
    fn cone_caps_write_their_pick_parts() {
        let Some(frame) = render(
            ShapeKind::Cone,
            RenderTarget::PerspectiveView,
            &FrameContext::new(Mat4::IDENTITY, perspective(100.0)),
            &Options::default(),
            &facing_cones(),
        ) else {
            return;
        };
        // Cone 0 owns IDs 1..=3, cone 1 owns 4..=6.
        assert_eq!(frame.pick(LEFT_CONE_X, MID), 1 + 2);
        assert_eq!(frame.pick(RIGHT_CONE_X, MID), 4 + 1);
        assert_ne!(frame.color(LEFT_CONE_X, MID), SENTINEL_RGBA);
        assert_eq!(frame.pick(MID, MID), 0);
        assert_eq!(frame.color(MID, MID), SENTINEL_RGBA);
    }

    #[test]
    fn selecting_a_cap_highlights_only_its_cone() {
        let options = Options::default();
        let Some(mut harness) = Harness::new(&options) else {
            return;
        };
        let cones = batch(ShapeKind::Cone, &[], &options, &facing_cones());
        let mut helper =
            ShapeKind::Cone.render_helper(RenderTarget::PerspectiveView);
        let mut frame = FrameContext::new(Mat4::IDENTITY, perspective(100.0));

        let plain = harness.draw(&mut helper, &frame, &cones);
        // Base cap of the right cone.
        frame.selected_index = 5;
        let selected = harness.draw(&mut helper, &frame, &cones);

        let blue = |frame: &Frame, x: u32| frame.color(x, MID)[2];
        assert!(blue(&selected, RIGHT_CONE_X) > blue(&plain, RIGHT_CONE_X) + 10);
        assert_eq!(blue(&selected, LEFT_CONE_X), blue(&plain, LEFT_CONE_X));
        assert_eq!(selected.pick(RIGHT_CONE_X, MID), 5);
    }

    #[test]
    fn selected_index_is_offset_by_pick_base() {
        let options = Options::default();
        let Some(mut harness) = Harness::new(&options) else {
            return;
        };
        let spheres = batch(
            ShapeKind::Sphere,
            &[PropertyId::SphereRadius],
            &options,
            &[sphere(Vec3::new(0.0, 0.0, -5.0), 1.0)],
        );
        let mut helper =
            ShapeKind::Sphere.render_helper(RenderTarget::PerspectiveView);
        let mut frame = FrameContext::new(Mat4::IDENTITY, perspective(100.0));
        frame.pick_base = 20;

        // Batch-relative index 0 is not this sphere's ID.
        frame.selected_index = 0;
        let plain = harness.draw(&mut helper, &frame, &spheres);
        frame.selected_index = 20;
        let selected = harness.draw(&mut helper, &frame, &spheres);

        assert_eq!(plain.pick(MID, MID), 20);
        assert!(selected.color(MID, MID)[2] > plain.color(MID, MID)[2] + 10);
    }

    #[test]
    fn helper_keeps_drawing_after_streams_grow() {
        let options = Options::default();
        let Some(mut harness) = Harness::new(&options) else {
            return;
        };
        let mut helper =
            ShapeKind::Sphere.render_helper(RenderTarget::PerspectiveView);
        let frame = FrameContext::new(Mat4::IDENTITY, perspective(100.0));
        let centre = sphere(Vec3::new(0.0, 0.0, -5.0), 1.0);

        let small = batch(
            ShapeKind::Sphere,
            &[PropertyId::SphereRadius],
            &options,
            std::slice::from_ref(&centre),
        );
        assert_eq!(harness.draw(&mut helper, &frame, &small).pick(MID, MID), 1);

        // 300 off-screen spheres ahead of the visible one overflow the
        // initial vertex buffers.
        let mut many: Vec<Annotation> = (0..300)
            .map(|i| sphere(Vec3::new(100.0 + i as f32, 0.0, -5.0), 0.1))
            .collect();
        many.push(centre);
        let large =
            batch(ShapeKind::Sphere, &[PropertyId::SphereRadius], &options, &many);
        let grown = harness.draw(&mut helper, &frame, &large);
        assert_eq!(grown.pick(MID, MID), 301);
        assert_ne!(grown.color(MID, MID), SENTINEL_RGBA);
    }

    #[test]
    fn unlit_sphere_blends_premultiplied() {
        let mut options = Options::default();
        options.lighting.enabled = false;
        options.lighting.opacity = 0.5;
        let Some(frame) = render(
            ShapeKind::Sphere,
            RenderTarget::PerspectiveView,
            &FrameContext::new(Mat4::IDENTITY, perspective(100.0)),
            &options,
            &[sphere(Vec3::new(0.0, 0.0, -5.0), 1.0)],
        ) else {
            return;
        };
        // Half-covered yellow over the green clear colour.
        let [r, g, b, _] = frame.color(MID, MID);
        assert!((126..=129).contains(&r), "red {r}");
        assert_eq!(g, 255);
        assert_eq!(b, 0);
    }

    #[test]
    fn helper_reports_shape_and_view() {
        let helper = ShapeKind::Cone.render_helper(RenderTarget::SliceView);
        assert_eq!(helper.shape(), ShapeKind::Cone);
        assert_eq!(helper.target().ortho(), 1.0);
        assert_eq!(helper.label(), "cone SliceView");
    }
}
