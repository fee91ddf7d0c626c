use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Colour target formats annotations can be drawn into.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ColorFormat {
    /// 8-bit linear RGBA.
    Rgba8Unorm,
    /// 8-bit BGRA, the common swapchain format.
    Bgra8Unorm,
    /// Half-float HDR.
    Rgba16Float,
}

impl ColorFormat {
    /// Matching wgpu format.
    #[must_use]
    pub fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            Self::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            Self::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            Self::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        }
    }
}

/// Render target configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Output", inline)]
#[serde(default)]
pub struct OutputOptions {
    /// Format of colour target 0.
    #[schemars(skip)]
    pub color_format: ColorFormat,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            color_format: ColorFormat::Rgba8Unorm,
        }
    }
}
