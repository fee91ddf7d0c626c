//! Accumulates declarations and code blocks, then emits one WGSL program.
//!
//! Contributors (lighting, shape emitters, property hooks, pick-ID code)
//! each call into the same [`ShaderBuilder`]. Declarations are idempotent so
//! several contributors may ask for the same uniform; asking for an existing
//! name with a different type is a [`ShaderConfigError`].
//!
//! Emitted programs follow one convention regardless of shape:
//! - uniforms live in `struct Uniforms` at `@group(0) @binding(0)` as `u`
//! - attribute `x` is readable as the private `a_x` in vertex code
//! - varying `x` is the private `v_x`, copied across stages by the entry
//!   points (`mat4x4` varyings travel as four `vec4` locations)
//! - vertex code writes `clip_position`; fragment code writes `frag_color`,
//!   `frag_depth` and `frag_pick_id`

use std::fmt::{self, Write as _};

use super::layout::{
    AttributeBinding, ShaderLayout, UniformBinding, VaryingBinding,
};

/// WGSL types the builder can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WgslType {
    /// `f32`
    F32,
    /// `u32`
    U32,
    /// `vec2<f32>`
    Vec2,
    /// `vec3<f32>`
    Vec3,
    /// `vec4<f32>`
    Vec4,
    /// `mat4x4<f32>`
    Mat4,
}

impl WgslType {
    /// WGSL spelling.
    #[must_use]
    pub fn wgsl(self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::U32 => "u32",
            Self::Vec2 => "vec2<f32>",
            Self::Vec3 => "vec3<f32>",
            Self::Vec4 => "vec4<f32>",
            Self::Mat4 => "mat4x4<f32>",
        }
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(self) -> u64 {
        match self {
            Self::F32 | Self::U32 => 4,
            Self::Vec2 => 8,
            Self::Vec3 => 12,
            Self::Vec4 => 16,
            Self::Mat4 => 64,
        }
    }

    /// Alignment inside a uniform struct.
    #[must_use]
    pub fn uniform_align(self) -> u64 {
        match self {
            Self::F32 | Self::U32 => 4,
            Self::Vec2 => 8,
            Self::Vec3 | Self::Vec4 | Self::Mat4 => 16,
        }
    }

    /// Vertex format when used as an attribute.
    #[must_use]
    pub fn vertex_format(self) -> Option<wgpu::VertexFormat> {
        match self {
            Self::F32 => Some(wgpu::VertexFormat::Float32),
            Self::U32 => Some(wgpu::VertexFormat::Uint32),
            Self::Vec2 => Some(wgpu::VertexFormat::Float32x2),
            Self::Vec3 => Some(wgpu::VertexFormat::Float32x3),
            Self::Vec4 => Some(wgpu::VertexFormat::Float32x4),
            Self::Mat4 => None,
        }
    }

    /// Inter-stage locations consumed as a varying.
    #[must_use]
    pub fn locations(self) -> u32 {
        if self == Self::Mat4 {
            4
        } else {
            1
        }
    }
}

impl fmt::Display for WgslType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wgsl())
    }
}

/// Vertex buffer slot an attribute is fed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexSlot {
    /// Shared per-vertex billboard corner flags.
    Corner,
    /// Per-instance positional data.
    Geometry,
    /// Per-instance values of active style properties.
    Properties,
}

impl VertexSlot {
    /// All slots in binding order.
    pub const ALL: [Self; 3] = [Self::Corner, Self::Geometry, Self::Properties];

    /// Vertex buffer index.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Corner => 0,
            Self::Geometry => 1,
            Self::Properties => 2,
        }
    }

    /// Corner flags advance per vertex, everything else per instance.
    #[must_use]
    pub fn step_mode(self) -> wgpu::VertexStepMode {
        match self {
            Self::Corner => wgpu::VertexStepMode::Vertex,
            Self::Geometry | Self::Properties => {
                wgpu::VertexStepMode::Instance
            }
        }
    }
}

/// Where a block of entry-point code runs.
///
/// Vertex phases run in declaration order of this enum regardless of the
/// order contributors added them, so property overrides always precede
/// emission and pick-ID assignment always sees the final colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MainPhase {
    /// Vertex: defaults for private state.
    Setup,
    /// Vertex: property setter invocations.
    Overrides,
    /// Vertex: billboard emission.
    Emit,
    /// Vertex: pick-ID assignment and selection highlight.
    Pick,
    /// Fragment: surface resolution.
    Resolve,
    /// Fragment: final output bookkeeping.
    Output,
}

impl MainPhase {
    fn is_vertex(self) -> bool {
        self <= Self::Pick
    }
}

/// Which declaration table a name lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    /// Vertex attribute.
    Attribute,
    /// Uniform struct member.
    Uniform,
    /// Inter-stage varying.
    Varying,
    /// Module-scope private variable.
    Private,
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Attribute => "attribute",
            Self::Uniform => "uniform",
            Self::Varying => "varying",
            Self::Private => "private",
        })
    }
}

/// Invalid program configuration, detected while composing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderConfigError {
    /// A name was declared twice with different types.
    ConflictingDeclaration {
        /// Table the name lives in.
        kind: DeclarationKind,
        /// Declared name.
        name: String,
        /// Type of the first declaration.
        existing: WgslType,
        /// Type of the rejected declaration.
        requested: WgslType,
    },
    /// An attribute was declared on two different vertex buffers.
    ConflictingSlot {
        /// Attribute name.
        name: String,
    },
    /// A named code block was contributed twice with different bodies.
    ConflictingCode {
        /// Block name.
        name: String,
    },
    /// The type cannot be fed from a vertex buffer.
    UnsupportedAttribute {
        /// Attribute name.
        name: String,
        /// Offending type.
        ty: WgslType,
    },
}

impl fmt::Display for ShaderConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConflictingDeclaration {
                kind,
                name,
                existing,
                requested,
            } => write!(
                f,
                "{kind} `{name}` already declared as {existing}, \
                 requested {requested}"
            ),
            Self::ConflictingSlot { name } => {
                write!(f, "attribute `{name}` declared on two vertex buffers")
            }
            Self::ConflictingCode { name } => {
                write!(f, "code block `{name}` contributed with two bodies")
            }
            Self::UnsupportedAttribute { name, ty } => {
                write!(f, "attribute `{name}` cannot have type {ty}")
            }
        }
    }
}

impl std::error::Error for ShaderConfigError {}

#[derive(Debug, Clone)]
struct Declaration {
    name: String,
    ty: WgslType,
}

#[derive(Debug, Clone)]
struct AttributeDecl {
    name: String,
    ty: WgslType,
    slot: VertexSlot,
}

#[derive(Debug, Clone)]
struct CodeBlock {
    name: String,
    source: String,
}

#[derive(Debug, Clone)]
struct MainBlock {
    name: String,
    phase: MainPhase,
    source: String,
}

fn declare(
    table: &mut Vec<Declaration>,
    kind: DeclarationKind,
    name: &str,
    ty: WgslType,
) -> Result<(), ShaderConfigError> {
    match table.iter().find(|d| d.name == name) {
        Some(d) if d.ty == ty => Ok(()),
        Some(d) => Err(ShaderConfigError::ConflictingDeclaration {
            kind,
            name: name.to_owned(),
            existing: d.ty,
            requested: ty,
        }),
        None => {
            table.push(Declaration {
                name: name.to_owned(),
                ty,
            });
            Ok(())
        }
    }
}

fn align_to(offset: u64, align: u64) -> u64 {
    offset.div_ceil(align) * align
}

/// Output of [`ShaderBuilder::finish`].
#[derive(Debug, Clone)]
pub struct ComposedShader {
    /// Complete WGSL with `#import` directives still unresolved.
    pub source: String,
    /// Resolved attribute/uniform/varying tables.
    pub layout: ShaderLayout,
}

/// Collects declarations and ordered code for one annotation program.
#[derive(Debug, Clone, Default)]
pub struct ShaderBuilder {
    imports: Vec<String>,
    attributes: Vec<AttributeDecl>,
    uniforms: Vec<Declaration>,
    varyings: Vec<Declaration>,
    privates: Vec<Declaration>,
    code: Vec<CodeBlock>,
    main: Vec<MainBlock>,
}

impl ShaderBuilder {
    /// Empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pull in a composable module (`#import path`).
    pub fn add_import(&mut self, path: &str) {
        if !self.imports.iter().any(|i| i == path) {
            self.imports.push(path.to_owned());
        }
    }

    /// Declare a vertex attribute fed from `slot`.
    ///
    /// # Errors
    ///
    /// Conflicting type or slot, or a type with no vertex format.
    pub fn add_attribute(
        &mut self,
        name: &str,
        ty: WgslType,
        slot: VertexSlot,
    ) -> Result<(), ShaderConfigError> {
        if ty.vertex_format().is_none() {
            return Err(ShaderConfigError::UnsupportedAttribute {
                name: name.to_owned(),
                ty,
            });
        }
        match self.attributes.iter().find(|a| a.name == name) {
            Some(a) if a.ty != ty => {
                Err(ShaderConfigError::ConflictingDeclaration {
                    kind: DeclarationKind::Attribute,
                    name: name.to_owned(),
                    existing: a.ty,
                    requested: ty,
                })
            }
            Some(a) if a.slot != slot => {
                Err(ShaderConfigError::ConflictingSlot {
                    name: name.to_owned(),
                })
            }
            Some(_) => Ok(()),
            None => {
                self.attributes.push(AttributeDecl {
                    name: name.to_owned(),
                    ty,
                    slot,
                });
                Ok(())
            }
        }
    }

    /// Declare a member of the uniform struct.
    ///
    /// # Errors
    ///
    /// The name is already a uniform of another type.
    pub fn add_uniform(
        &mut self,
        name: &str,
        ty: WgslType,
    ) -> Result<(), ShaderConfigError> {
        declare(&mut self.uniforms, DeclarationKind::Uniform, name, ty)
    }

    /// Declare a varying carried from vertex to fragment stage.
    ///
    /// # Errors
    ///
    /// The name is already a varying of another type.
    pub fn add_varying(
        &mut self,
        name: &str,
        ty: WgslType,
    ) -> Result<(), ShaderConfigError> {
        declare(&mut self.varyings, DeclarationKind::Varying, name, ty)
    }

    /// Declare module-scope private state.
    ///
    /// # Errors
    ///
    /// The name is already private state of another type.
    pub fn add_private(
        &mut self,
        name: &str,
        ty: WgslType,
    ) -> Result<(), ShaderConfigError> {
        declare(&mut self.privates, DeclarationKind::Private, name, ty)
    }

    /// Add a named block of module-scope WGSL (functions, constants).
    ///
    /// # Errors
    ///
    /// A block with this name already exists with a different body.
    pub fn add_code(
        &mut self,
        name: &str,
        source: &str,
    ) -> Result<(), ShaderConfigError> {
        match self.code.iter().find(|c| c.name == name) {
            Some(c) if c.source == source => Ok(()),
            Some(_) => Err(ShaderConfigError::ConflictingCode {
                name: name.to_owned(),
            }),
            None => {
                self.code.push(CodeBlock {
                    name: name.to_owned(),
                    source: source.to_owned(),
                });
                Ok(())
            }
        }
    }

    /// Add a named statement block to an entry point.
    ///
    /// # Errors
    ///
    /// A block with this name already exists with a different body or
    /// phase.
    pub fn add_main(
        &mut self,
        name: &str,
        phase: MainPhase,
        source: &str,
    ) -> Result<(), ShaderConfigError> {
        match self.main.iter().find(|m| m.name == name) {
            Some(m) if m.source == source && m.phase == phase => Ok(()),
            Some(_) => Err(ShaderConfigError::ConflictingCode {
                name: name.to_owned(),
            }),
            None => {
                self.main.push(MainBlock {
                    name: name.to_owned(),
                    phase,
                    source: source.to_owned(),
                });
                Ok(())
            }
        }
    }

    /// Body of a module-scope block.
    #[must_use]
    pub fn code_block(&self, name: &str) -> Option<&str> {
        self.code
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.source.as_str())
    }

    /// Body of an entry-point block.
    #[must_use]
    pub fn main_block(&self, name: &str) -> Option<&str> {
        self.main
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.source.as_str())
    }

    /// Whether an attribute of this name was declared.
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }

    /// Resolve the tables and emit WGSL headed by `header`.
    #[must_use]
    pub fn finish(&self, header: &str) -> ComposedShader {
        let layout = self.layout();
        let source = self.emit(header, &layout);
        ComposedShader { source, layout }
    }

    fn layout(&self) -> ShaderLayout {
        let mut attributes = Vec::with_capacity(self.attributes.len());
        let mut strides = [0u64; 3];
        for (location, a) in (0u32..).zip(&self.attributes) {
            let stride = &mut strides[a.slot.index()];
            attributes.push(AttributeBinding {
                name: a.name.clone(),
                ty: a.ty,
                slot: a.slot,
                location,
                offset: *stride,
            });
            *stride += a.ty.size();
        }

        let mut uniforms = Vec::with_capacity(self.uniforms.len());
        let mut cursor = 0;
        for u in &self.uniforms {
            let offset = align_to(cursor, u.ty.uniform_align());
            uniforms.push(UniformBinding {
                name: u.name.clone(),
                ty: u.ty,
                offset,
            });
            cursor = offset + u.ty.size();
        }

        let mut varyings = Vec::with_capacity(self.varyings.len());
        let mut location = 0;
        for v in &self.varyings {
            varyings.push(VaryingBinding {
                name: v.name.clone(),
                ty: v.ty,
                location,
            });
            location += v.ty.locations();
        }

        ShaderLayout {
            attributes,
            uniforms,
            uniform_size: align_to(cursor.max(16), 16),
            varyings,
            strides,
        }
    }

    fn emit(&self, header: &str, layout: &ShaderLayout) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "// {header}");
        for import in &self.imports {
            let _ = writeln!(out, "#import {import}");
        }

        out.push_str("\nstruct Uniforms {\n");
        if layout.uniforms.is_empty() {
            out.push_str("    unused: f32,\n");
        }
        for u in &layout.uniforms {
            let _ = writeln!(out, "    {}: {},", u.name, u.ty);
        }
        out.push_str(
            "}\n\n@group(0) @binding(0) var<uniform> u: Uniforms;\n\n",
        );

        out.push_str(
            "struct VertexInput {\n    \
             @builtin(instance_index) instance_index: u32,\n",
        );
        for a in &layout.attributes {
            let _ = writeln!(
                out,
                "    @location({}) a_{}: {},",
                a.location, a.name, a.ty
            );
        }
        out.push_str("}\n\n");

        out.push_str(
            "struct VertexOutput {\n    \
             @builtin(position) clip_position: vec4<f32>,\n",
        );
        for v in &layout.varyings {
            match v.ty {
                WgslType::Mat4 => {
                    for column in 0..4 {
                        let _ = writeln!(
                            out,
                            "    @location({}) v_{}_c{column}: vec4<f32>,",
                            v.location + column,
                            v.name
                        );
                    }
                }
                WgslType::U32 => {
                    let _ = writeln!(
                        out,
                        "    @location({}) @interpolate(flat) v_{}: u32,",
                        v.location, v.name
                    );
                }
                ty => {
                    let _ = writeln!(
                        out,
                        "    @location({}) v_{}: {ty},",
                        v.location, v.name
                    );
                }
            }
        }
        out.push_str("}\n\n");

        out.push_str(
            "struct FragmentOutput {\n    \
             @location(0) color: vec4<f32>,\n    \
             @location(1) pick_id: u32,\n    \
             @builtin(frag_depth) depth: f32,\n}\n\n",
        );

        out.push_str(
            "var<private> instance_index: u32;\n\
             var<private> clip_position: vec4<f32>;\n\
             var<private> frag_color: vec4<f32>;\n\
             var<private> frag_depth: f32;\n\
             var<private> frag_pick_id: u32;\n",
        );
        for a in &self.attributes {
            let _ = writeln!(out, "var<private> a_{}: {};", a.name, a.ty);
        }
        for v in &self.varyings {
            let _ = writeln!(out, "var<private> v_{}: {};", v.name, v.ty);
        }
        for p in &self.privates {
            let _ = writeln!(out, "var<private> {}: {};", p.name, p.ty);
        }

        for block in &self.code {
            let _ = write!(out, "\n// {}\n{}", block.name, block.source);
            if !block.source.ends_with('\n') {
                out.push('\n');
            }
        }

        self.emit_vertex_main(&mut out);
        self.emit_fragment_main(&mut out);
        out
    }

    fn main_blocks(&self, vertex: bool) -> Vec<&MainBlock> {
        let mut blocks: Vec<&MainBlock> = self
            .main
            .iter()
            .filter(|m| m.phase.is_vertex() == vertex)
            .collect();
        // Stable: keeps contribution order within a phase.
        blocks.sort_by_key(|m| m.phase);
        blocks
    }

    fn emit_vertex_main(&self, out: &mut String) {
        out.push_str(
            "\n@vertex\nfn vs_main(input: VertexInput) -> VertexOutput {\n    \
             instance_index = input.instance_index;\n",
        );
        for a in &self.attributes {
            let _ = writeln!(out, "    a_{0} = input.a_{0};", a.name);
        }
        for block in self.main_blocks(true) {
            push_indented(out, &block.source);
        }
        out.push_str(
            "    var output: VertexOutput;\n    \
             output.clip_position = clip_position;\n",
        );
        for v in &self.varyings {
            if v.ty == WgslType::Mat4 {
                for column in 0..4 {
                    let _ = writeln!(
                        out,
                        "    output.v_{0}_c{column} = v_{0}[{column}];",
                        v.name
                    );
                }
            } else {
                let _ = writeln!(out, "    output.v_{0} = v_{0};", v.name);
            }
        }
        out.push_str("    return output;\n}\n");
    }

    fn emit_fragment_main(&self, out: &mut String) {
        out.push_str(
            "\n@fragment\nfn fs_main(input: VertexOutput) -> FragmentOutput \
             {\n",
        );
        for v in &self.varyings {
            if v.ty == WgslType::Mat4 {
                let _ = writeln!(
                    out,
                    "    v_{0} = mat4x4<f32>(input.v_{0}_c0, input.v_{0}_c1, \
                     input.v_{0}_c2, input.v_{0}_c3);",
                    v.name
                );
            } else {
                let _ = writeln!(out, "    v_{0} = input.v_{0};", v.name);
            }
        }
        for block in self.main_blocks(false) {
            push_indented(out, &block.source);
        }
        out.push_str(
            "    var output: FragmentOutput;\n    \
             output.color = frag_color;\n    \
             output.pick_id = frag_pick_id;\n    \
             output.depth = frag_depth;\n    \
             return output;\n}\n",
        );
    }
}

fn push_indented(out: &mut String, source: &str) {
    for line in source.lines() {
        if line.trim().is_empty() {
            out.push('\n');
        } else {
            let _ = writeln!(out, "    {line}");
        }
    }
}
