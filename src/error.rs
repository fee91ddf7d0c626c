//! Crate-level error types.

use std::fmt;

use crate::{
    annotation::ShapeKind, gpu::render_context::RenderContextError,
    shader::ShaderConfigError,
};

/// Errors produced by the annotation renderer.
#[derive(Debug)]
pub enum AnnotationError {
    /// GPU context initialization failure.
    Gpu(RenderContextError),
    /// Conflicting or unsupported shader declarations.
    ShaderConfig(ShaderConfigError),
    /// naga_oil failed to compose or validate a generated program.
    ShaderCompose(String),
    /// Instance data does not match the layout of the composed program.
    BatchLayout {
        /// Shape the program was composed for.
        expected: ShapeKind,
        /// Shape of the offending instance.
        found: ShapeKind,
    },
    /// Packed instance stream length is not a whole number of instances.
    BatchStride {
        /// Floats per instance the program expects.
        stride: usize,
        /// Length of the packed stream.
        len: usize,
    },
    /// Display rank outside `1..=3`.
    UnsupportedRank(u32),
    /// Generic I/O failure.
    Io(std::io::Error),
    /// TOML options parsing/serialization failure.
    OptionsParse(String),
}

impl fmt::Display for AnnotationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpu(e) => write!(f, "GPU error: {e}"),
            Self::ShaderConfig(e) => {
                write!(f, "shader configuration error: {e}")
            }
            Self::ShaderCompose(msg) => {
                write!(f, "shader composition failed: {msg}")
            }
            Self::BatchLayout { expected, found } => write!(
                f,
                "batch for {expected} programs received a {found} instance"
            ),
            Self::BatchStride { stride, len } => write!(
                f,
                "instance stream of {len} floats is not a multiple of the \
                 {stride}-float stride"
            ),
            Self::UnsupportedRank(rank) => {
                write!(f, "unsupported display rank {rank} (expected 1..=3)")
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::OptionsParse(msg) => {
                write!(f, "options parse error: {msg}")
            }
        }
    }
}

impl std::error::Error for AnnotationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Gpu(e) => Some(e),
            Self::ShaderConfig(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RenderContextError> for AnnotationError {
    fn from(e: RenderContextError) -> Self {
        Self::Gpu(e)
    }
}

impl From<ShaderConfigError> for AnnotationError {
    fn from(e: ShaderConfigError) -> Self {
        Self::ShaderConfig(e)
    }
}

impl From<std::io::Error> for AnnotationError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
