//! Resolved symbol tables of a composed program and bind-time access to
//! them.
//!
//! Lookups by name are programmer errors when they miss: the program was
//! composed by this crate, so an unknown uniform means the caller and the
//! composition rules disagree. Those lookups panic instead of returning
//! `Option`.

use glam::{Mat4, Vec4};

use super::builder::{VertexSlot, WgslType};

/// Where an attribute is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeBinding {
    /// Declared name (the shader reads it as `a_<name>`).
    pub name: String,
    /// Declared type.
    pub ty: WgslType,
    /// Vertex buffer the attribute lives in.
    pub slot: VertexSlot,
    /// Shader location.
    pub location: u32,
    /// Byte offset inside one element of its buffer.
    pub offset: u64,
}

/// Byte offset of a uniform struct member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBinding {
    /// Member name.
    pub name: String,
    /// Member type.
    pub ty: WgslType,
    /// Byte offset inside `Uniforms`.
    pub offset: u64,
}

/// First inter-stage location of a varying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaryingBinding {
    /// Declared name (`v_<name>` in both stages).
    pub name: String,
    /// Declared type.
    pub ty: WgslType,
    /// First location; `mat4x4` varyings use four.
    pub location: u32,
}

/// Attribute, uniform and varying tables of one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderLayout {
    /// Attributes in location order.
    pub attributes: Vec<AttributeBinding>,
    /// Uniform struct members in declaration order.
    pub uniforms: Vec<UniformBinding>,
    /// Size of the uniform struct, rounded to 16 bytes.
    pub uniform_size: u64,
    /// Varyings in declaration order.
    pub varyings: Vec<VaryingBinding>,
    /// Element stride of each vertex buffer, indexed by
    /// [`VertexSlot::index`].
    pub strides: [u64; 3],
}

impl ShaderLayout {
    /// Attribute named `name`.
    ///
    /// # Panics
    ///
    /// If the program declares no such attribute.
    #[must_use]
    #[track_caller]
    #[allow(clippy::panic)]
    pub fn attribute(&self, name: &str) -> &AttributeBinding {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .unwrap_or_else(|| panic!("program has no attribute `{name}`"))
    }

    /// Uniform named `name`.
    ///
    /// # Panics
    ///
    /// If the program declares no such uniform.
    #[must_use]
    #[track_caller]
    #[allow(clippy::panic)]
    pub fn uniform(&self, name: &str) -> &UniformBinding {
        self.uniforms
            .iter()
            .find(|u| u.name == name)
            .unwrap_or_else(|| panic!("program has no uniform `{name}`"))
    }

    /// Element stride in bytes of the buffer bound at `slot`.
    #[must_use]
    pub fn stride(&self, slot: VertexSlot) -> u64 {
        self.strides[slot.index()]
    }

    /// wgpu attribute descriptors for one vertex buffer.
    #[must_use]
    pub fn vertex_attributes(
        &self,
        slot: VertexSlot,
    ) -> Vec<wgpu::VertexAttribute> {
        self.attributes
            .iter()
            .filter(|a| a.slot == slot)
            .filter_map(|a| {
                a.ty.vertex_format().map(|format| wgpu::VertexAttribute {
                    format,
                    offset: a.offset,
                    shader_location: a.location,
                })
            })
            .collect()
    }

    /// Zeroed staging bytes for the uniform struct.
    #[must_use]
    pub fn uniform_writer(&self) -> UniformWriter<'_> {
        UniformWriter {
            layout: self,
            bytes: vec![0; self.uniform_size as usize],
        }
    }
}

/// Writes uniform values by name into a staging copy of `Uniforms`.
pub struct UniformWriter<'a> {
    layout: &'a ShaderLayout,
    bytes: Vec<u8>,
}

impl UniformWriter<'_> {
    #[track_caller]
    #[allow(clippy::panic)]
    fn put(&mut self, name: &str, ty: WgslType, data: &[u8]) {
        let binding = self.layout.uniform(name);
        if binding.ty != ty {
            panic!(
                "uniform `{name}` is {}, written as {ty}",
                binding.ty
            );
        }
        let start = binding.offset as usize;
        self.bytes[start..start + data.len()].copy_from_slice(data);
    }

    /// Write an `f32` member.
    #[track_caller]
    pub fn set_f32(&mut self, name: &str, value: f32) {
        self.put(name, WgslType::F32, bytemuck::bytes_of(&value));
    }

    /// Write a `u32` member.
    #[track_caller]
    pub fn set_u32(&mut self, name: &str, value: u32) {
        self.put(name, WgslType::U32, bytemuck::bytes_of(&value));
    }

    /// Write a `vec4<f32>` member.
    #[track_caller]
    pub fn set_vec4(&mut self, name: &str, value: Vec4) {
        let array = value.to_array();
        self.put(name, WgslType::Vec4, bytemuck::cast_slice(&array));
    }

    /// Write a `mat4x4<f32>` member (column-major).
    #[track_caller]
    pub fn set_mat4(&mut self, name: &str, value: &Mat4) {
        let columns = value.to_cols_array();
        self.put(name, WgslType::Mat4, bytemuck::cast_slice(&columns));
    }

    /// Staged bytes, ready for `queue.write_buffer`.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::ShaderBuilder;

    fn fixture_layout() -> ShaderLayout {
        let mut builder = ShaderBuilder::new();
        builder.add_uniform("radius_scale", WgslType::F32).unwrap();
        builder.add_uniform("view", WgslType::Mat4).unwrap();
        builder.add_uniform("pick_base", WgslType::U32).unwrap();
        builder.finish("fixture").layout
    }

    #[test]
    fn writer_places_values_at_their_offsets() {
        let layout = fixture_layout();
        let mut writer = layout.uniform_writer();
        writer.set_f32("radius_scale", 2.0);
        writer.set_mat4("view", &Mat4::from_translation(glam::Vec3::X));
        writer.set_u32("pick_base", 7);
        let bytes = writer.bytes();
        assert_eq!(bytes.len(), 96);
        assert_eq!(&bytes[0..4], &2.0f32.to_le_bytes());
        // Column 3 of the view matrix starts at 16 + 48.
        assert_eq!(&bytes[64..68], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[80..84], &7u32.to_le_bytes());
    }

    #[test]
    #[should_panic(expected = "no uniform `missing`")]
    fn unknown_uniform_panics() {
        let layout = fixture_layout();
        layout.uniform_writer().set_f32("missing", 1.0);
    }

    #[test]
    #[should_panic(expected = "written as")]
    fn mistyped_uniform_panics() {
        let layout = fixture_layout();
        layout.uniform_writer().set_u32("radius_scale", 1);
    }
}
