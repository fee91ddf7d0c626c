//! Composition and caching of annotation GPU programs.
//!
//! A program is assembled by [`compose_annotation_program`] from
//! independently contributed pieces (lighting, geometry emission, property
//! hooks, pick-ID assignment, surface resolver) into a [`ShaderBuilder`],
//! turned into WGSL, resolved through naga_oil and memoized in a
//! [`ProgramCache`] under its [`CompositionKey`].

mod builder;
mod cache;
mod compose;
/// Per-instance property setter hooks.
pub mod hooks;
mod key;
mod layout;
/// Pick-ID assignment code.
pub mod pick;

pub use builder::{
    ComposedShader, DeclarationKind, MainPhase, ShaderBuilder,
    ShaderConfigError, VertexSlot, WgslType,
};
pub use cache::{CompiledProgram, ProgramCache};
pub use compose::{compose_annotation_program, FRAME_UNIFORMS, LIGHTING_MODULE};
pub use key::CompositionKey;
pub use layout::{
    AttributeBinding, ShaderLayout, UniformBinding, UniformWriter,
    VaryingBinding,
};
