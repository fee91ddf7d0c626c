use std::borrow::Cow;

use naga_oil::compose::{
    ComposableModuleDescriptor, Composer, ComposerError, NagaModuleDescriptor,
    ShaderLanguage, ShaderType,
};

use crate::error::AnnotationError;

/// Wraps `naga_oil::compose::Composer` to provide shader composition with
/// `#import` support.
///
/// Pre-loads the shared WGSL modules at construction time. Generated
/// annotation programs use `#import annotation::lighting` to pull in shared
/// code. The composer produces validated `naga::Module` IR directly, so
/// pipelines never re-parse WGSL.
pub struct ShaderComposer {
    composer: Composer,
}

/// Shared module definition.
struct ModuleDef {
    source: &'static str,
    file_path: &'static str,
}

/// Shared modules in dependency order.
const MODULES: &[ModuleDef] = &[ModuleDef {
    source: include_str!("../../assets/shaders/modules/lighting.wgsl"),
    file_path: "modules/lighting.wgsl",
}];

fn compose_error(file_path: &str, e: &ComposerError) -> AnnotationError {
    AnnotationError::ShaderCompose(format!("{file_path}: {e}"))
}

impl ShaderComposer {
    /// Composer with every shared module registered.
    ///
    /// # Errors
    ///
    /// Returns [`AnnotationError::ShaderCompose`] if a shared module fails
    /// to parse.
    pub fn new() -> Result<Self, AnnotationError> {
        let mut composer = Composer::default();

        for m in MODULES {
            let _ = composer
                .add_composable_module(ComposableModuleDescriptor {
                    source: m.source,
                    file_path: m.file_path,
                    language: ShaderLanguage::Wgsl,
                    ..Default::default()
                })
                .map_err(|e| compose_error(m.file_path, &e))?;
        }

        Ok(Self { composer })
    }

    /// Compose a shader source (which may contain `#import` directives) into
    /// a validated `naga::Module`.
    ///
    /// # Errors
    ///
    /// Returns [`AnnotationError::ShaderCompose`] carrying naga_oil's
    /// rendered diagnostic.
    pub fn compose_naga(
        &mut self,
        source: &str,
        file_path: &str,
    ) -> Result<naga::Module, AnnotationError> {
        self.composer
            .make_naga_module(NagaModuleDescriptor {
                source,
                file_path,
                shader_type: ShaderType::Wgsl,
                ..Default::default()
            })
            .map_err(|e| compose_error(file_path, &e))
    }
}

/// Hand an already composed module to wgpu.
pub fn create_shader_module(
    device: &wgpu::Device,
    label: &str,
    module: &naga::Module,
) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Naga(Cow::Owned(module.clone())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_modules_register() {
        assert!(ShaderComposer::new().is_ok());
    }

    #[test]
    fn lighting_import_resolves() {
        let mut composer = ShaderComposer::new().unwrap();
        let source = r"
#import annotation::lighting

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return lighting::apply_head_light(
        100.0,
        vec4<f32>(0.1),
        vec4<f32>(1.0),
        vec3<f32>(0.0, 0.0, 1.0),
        vec3<f32>(0.0, 0.0, -5.0),
        vec4<f32>(1.0, 0.0, 0.0, 1.0),
        1.0,
    );
}
";
        let module = composer.compose_naga(source, "lighting_import.wgsl").unwrap();
        assert!(module.entry_points.iter().any(|ep| ep.name == "fs_main"));
    }

    #[test]
    fn malformed_source_is_an_error() {
        let mut composer = ShaderComposer::new().unwrap();
        let err = composer
            .compose_naga("fn broken( {", "broken.wgsl")
            .unwrap_err();
        assert!(matches!(err, AnnotationError::ShaderCompose(_)));
    }
}
