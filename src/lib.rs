// -- Lint policy ---------------------------------------------------------
// Workspace lints in Cargo.toml are the source of truth; these restate the
// ones that guard library code.

// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Clone / pass-by-value hygiene
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::implicit_clone)]
// Tests unwrap freely
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! Volumetric annotation rendering on wgpu.
//!
//! Spheres, ellipsoids and truncated cones are drawn as camera-facing
//! billboards whose fragments ray-cast the exact quadric, write true depth
//! and a pick ID, and shade with a fixed five-light rig.
//!
//! # Key entry points
//!
//! - [`annotation::Annotation`] - one primitive instance
//! - [`annotation::InstanceBatch`] - instances of one shape packed for a
//!   single draw
//! - [`shader::ProgramCache`] - composed programs keyed by
//!   [`shader::CompositionKey`]
//! - [`renderer::helper::RenderHelper`] - records the instanced draw
//! - [`options::Options`] - lighting and sizing, loadable from TOML
//!
//! # Architecture
//!
//! A program is never written by hand. [`shader::compose_annotation_program`]
//! asks each contributor (lighting, frame uniforms, the shape's geometry
//! emitter, property hooks, pick-ID assignment, the shape's surface
//! resolver) to declare its attributes, uniforms, varyings and code into a
//! [`shader::ShaderBuilder`], which emits one WGSL module. naga_oil links
//! the shared lighting module in and the result is cached per key.
//!
//! Every shader-side intersection has a CPU mirror in
//! [`renderer::impostor`], used for hit testing and by the tests.

pub mod annotation;
pub mod error;
pub mod gpu;
pub mod lighting;
pub mod options;
pub mod renderer;
pub mod shader;

pub use annotation::{Annotation, InstanceBatch, ShapeKind};
pub use error::AnnotationError;
pub use options::Options;
pub use renderer::{helper::RenderHelper, FrameContext, RenderResources, RenderTarget};
pub use shader::{CompositionKey, ProgramCache};
