//! Fixed five-light Phong rig and its GPU uniform.
//!
//! The WGSL side lives in `assets/shaders/modules/lighting.wgsl`
//! (`annotation::lighting`); the functions here compute the same colour on
//! the CPU and are what the shader is checked against.

use glam::{Vec3, Vec4};
use wgpu::util::DeviceExt;

use crate::options::LightingOptions;

/// Number of lights in [`LIGHT_SOURCES`].
pub const LIGHT_COUNT: usize = 5;

/// One light of the rig.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSource {
    /// Eye-space position; `w == 0` marks a directional light.
    pub position: Vec4,
    /// Ambient colour, applied unconditionally.
    pub ambient: Vec4,
    /// Diffuse colour, applied when the surface faces the light.
    pub diffuse: Vec4,
    /// Specular colour, applied when the surface faces the light.
    pub specular: Vec4,
    /// Constant, linear and quadratic distance attenuation.
    pub attenuation: Vec3,
    /// Spot cone half-angle in degrees; anything above 90 is not a spot.
    pub spot_cutoff: f32,
    /// Spot falloff exponent.
    pub spot_exponent: f32,
    /// Spot axis.
    pub spot_direction: Vec3,
}

const fn grey(value: f32) -> Vec4 {
    Vec4::new(value, value, value, 1.0)
}

const fn directional(
    direction: Vec3,
    ambient: f32,
    diffuse: f32,
    specular: f32,
) -> LightSource {
    LightSource {
        position: Vec4::new(direction.x, direction.y, direction.z, 0.0),
        ambient: grey(ambient),
        diffuse: grey(diffuse),
        specular: grey(specular),
        attenuation: Vec3::new(1.0, 0.0, 0.0),
        spot_cutoff: 180.0,
        spot_exponent: 1.0,
        spot_direction: Vec3::new(-direction.x, -direction.y, -direction.z),
    }
}

/// Key, head, fill and two back lights.
pub const LIGHT_SOURCES: [LightSource; LIGHT_COUNT] = [
    directional(Vec3::new(0.1116, 0.7660, 0.6330), 0.1, 0.75, 0.85),
    directional(Vec3::new(0.0, 0.0, 1.0), 0.1 * 0.333, 0.75 * 0.333, 0.0),
    directional(
        Vec3::new(-0.0449, -0.9659, 0.2549),
        0.1 * 0.333,
        0.75 * 0.333,
        0.85 * 0.333,
    ),
    directional(
        Vec3::new(0.9397, 0.0, -0.3420),
        0.1 * 0.27,
        0.75 * 0.27,
        0.85 * 0.27,
    ),
    directional(
        Vec3::new(-0.9397, 0.0, -0.3420),
        0.1 * 0.27,
        0.75 * 0.27,
        0.85 * 0.27,
    ),
];

/// Surface material shared by every instance of a draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Ambient reflectance.
    pub ambient: Vec4,
    /// Specular reflectance.
    pub specular: Vec4,
    /// Phong exponent.
    pub shininess: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: grey(0.1),
            specular: Vec4::ONE,
            shininess: 100.0,
        }
    }
}

impl From<&LightingOptions> for Material {
    fn from(options: &LightingOptions) -> Self {
        Self {
            ambient: Vec4::from_array(options.material_ambient),
            specular: Vec4::from_array(options.material_specular),
            shininess: options.shininess,
        }
    }
}

fn reflect(incident: Vec3, normal: Vec3) -> Vec3 {
    incident - 2.0 * normal.dot(incident) * normal
}

fn light_contribution(
    light: &LightSource,
    material: &Material,
    normal: Vec3,
    position: Vec3,
    color: Vec4,
) -> Vec4 {
    let (direction, attenuation) = if light.position.w == 0.0 {
        (light.position.truncate().normalize(), 1.0)
    } else {
        let to_light = light.position.truncate() - position;
        let distance = to_light.length();
        let direction = to_light.normalize();
        let mut attenuation = 1.0
            / (light.attenuation.x
                + light.attenuation.y * distance
                + light.attenuation.z * distance * distance);
        if light.spot_cutoff <= 90.0 {
            let cosine =
                (-direction).dot(light.spot_direction.normalize()).max(0.0);
            attenuation = if cosine < light.spot_cutoff.to_radians().cos() {
                0.0
            } else {
                attenuation * cosine.powf(light.spot_exponent)
            };
        }
        (direction, attenuation)
    };

    let mut result = light.ambient * material.ambient;
    let n_dot_l = normal.dot(direction);
    if n_dot_l > 0.0 {
        result += attenuation * light.diffuse * n_dot_l * color;
        let to_camera = (-position).normalize();
        let highlight = reflect(-direction, normal).dot(to_camera).max(0.0);
        result += attenuation
            * light.specular
            * material.specular
            * highlight.powf(material.shininess);
    }
    result
}

fn premultiply(total: Vec4, color: Vec4, alpha: f32) -> Vec4 {
    let coverage = color.w * alpha;
    (total.truncate() * coverage).extend(coverage)
}

/// Shade a surface point with the five-light rig.
///
/// The result is premultiplied by `color.a * alpha`. With `enabled` false
/// the input colour is premultiplied without any lighting.
#[must_use]
pub fn apply_lighting(
    enabled: bool,
    scene_ambient: Vec4,
    material: &Material,
    normal: Vec3,
    position: Vec3,
    color: Vec4,
    alpha: f32,
) -> Vec4 {
    if !enabled {
        return premultiply(color, color, alpha);
    }
    let total = LIGHT_SOURCES.iter().fold(
        scene_ambient * material.ambient,
        |total, light| {
            total + light_contribution(light, material, normal, position, color)
        },
    );
    premultiply(total, color, alpha)
}

/// Single directional light along `(1, 1, 1)`, obeying the same switch as
/// [`apply_lighting`].
#[must_use]
pub fn apply_head_light(
    enabled: bool,
    material: &Material,
    normal: Vec3,
    position: Vec3,
    color: Vec4,
    alpha: f32,
) -> Vec4 {
    if !enabled {
        return premultiply(color, color, alpha);
    }
    let direction = Vec3::ONE.normalize();
    let mut total = Vec4::splat(0.5) * material.ambient + material.ambient;
    let n_dot_l = normal.dot(direction);
    if n_dot_l > 0.0 {
        total += Vec4::splat(0.5) * n_dot_l * color;
        let to_camera = (-position).normalize();
        let highlight = reflect(-direction, normal).dot(to_camera).max(0.0);
        total += Vec4::new(0.3, 0.3, 0.3, 0.5)
            * material.specular
            * highlight.powf(material.shininess);
    }
    premultiply(total, color, alpha)
}

/// One light as laid out in the WGSL `LightSource` struct (96 bytes).
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightSourceUniform {
    position: [f32; 4],
    ambient: [f32; 4],
    diffuse: [f32; 4],
    specular: [f32; 4],
    attenuation: [f32; 4],
    spot: [f32; 4],
}

impl From<&LightSource> for LightSourceUniform {
    fn from(light: &LightSource) -> Self {
        Self {
            position: light.position.to_array(),
            ambient: light.ambient.to_array(),
            diffuse: light.diffuse.to_array(),
            specular: light.specular.to_array(),
            attenuation: light.attenuation.extend(light.spot_exponent).into(),
            spot: light.spot_direction.extend(light.spot_cutoff).into(),
        }
    }
}

/// Light table uniform.
/// NOTE: Must match the WGSL `LightTable` layout exactly (512 bytes)
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightTableUniform {
    lights: [LightSourceUniform; LIGHT_COUNT],
    scene_ambient: [f32; 4],
    enabled: u32,
    _pad: [u32; 3],
}

impl LightTableUniform {
    /// Table for the fixed rig with the given switches.
    #[must_use]
    pub fn new(options: &LightingOptions) -> Self {
        Self {
            lights: LIGHT_SOURCES.map(|light| LightSourceUniform::from(&light)),
            scene_ambient: options.scene_ambient,
            enabled: u32::from(options.enabled),
            _pad: [0; 3],
        }
    }
}

/// GPU copy of the light table bound at group 1.
pub struct LightingResources {
    /// Uniform buffer holding a [`LightTableUniform`].
    pub buffer: wgpu::Buffer,
    /// Fragment-visible layout for group 1.
    pub layout: wgpu::BindGroupLayout,
    /// Bind group for group 1.
    pub bind_group: wgpu::BindGroup,
}

impl LightingResources {
    /// Upload the table once.
    pub fn new(device: &wgpu::Device, options: &LightingOptions) -> Self {
        let uniform = LightTableUniform::new(options);
        let buffer =
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Light Table Buffer"),
                contents: bytemuck::bytes_of(&uniform),
                usage: wgpu::BufferUsages::UNIFORM
                    | wgpu::BufferUsages::COPY_DST,
            });

        let layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Light Table Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("Light Table Bind Group"),
        });

        Self {
            buffer,
            layout,
            bind_group,
        }
    }

    /// Rewrite the switches; the rig itself never changes.
    pub fn update(&self, queue: &wgpu::Queue, options: &LightingOptions) {
        queue.write_buffer(
            &self.buffer,
            0,
            bytemuck::bytes_of(&LightTableUniform::new(options)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene_ambient() -> Vec4 {
        Vec4::new(0.2, 0.2, 0.2, 1.0)
    }

    #[test]
    fn uniform_matches_wgsl_layout() {
        assert_eq!(size_of::<LightSourceUniform>(), 96);
        assert_eq!(size_of::<LightTableUniform>(), 512);
    }

    #[test]
    fn head_light_has_no_specular() {
        assert_eq!(LIGHT_SOURCES[1].specular.truncate(), Vec3::ZERO);
        assert!(LIGHT_SOURCES.iter().all(|l| l.position.w == 0.0));
    }

    #[test]
    fn disabled_lighting_only_premultiplies() {
        let color = Vec4::new(1.0, 0.0, 0.0, 0.5);
        let lit = apply_lighting(
            false,
            scene_ambient(),
            &Material::default(),
            Vec3::Z,
            Vec3::new(0.0, 0.0, -5.0),
            color,
            0.5,
        );
        assert!((lit - Vec4::new(0.25, 0.0, 0.0, 0.25)).length() < 1e-6);
    }

    #[test]
    fn disabled_head_light_matches_disabled_rig() {
        let color = Vec4::new(0.3, 0.6, 0.9, 0.8);
        let material = Material::default();
        let normal = Vec3::ONE.normalize();
        let position = Vec3::new(0.0, 0.0, -5.0);
        let head =
            apply_head_light(false, &material, normal, position, color, 0.5);
        let rig = apply_lighting(
            false,
            scene_ambient(),
            &material,
            normal,
            position,
            color,
            0.5,
        );
        assert_eq!(head, rig);
        assert!((head.w - 0.4).abs() < 1e-6);
        let lit =
            apply_head_light(true, &material, normal, position, color, 0.5);
        assert_ne!(head, lit);
    }

    #[test]
    fn output_is_premultiplied() {
        let lit = apply_lighting(
            true,
            scene_ambient(),
            &Material::default(),
            Vec3::Z,
            Vec3::new(0.0, 0.0, -5.0),
            Vec4::new(1.0, 1.0, 1.0, 0.5),
            0.5,
        );
        assert!((lit.w - 0.25).abs() < 1e-6);
        let opaque = apply_lighting(
            true,
            scene_ambient(),
            &Material::default(),
            Vec3::Z,
            Vec3::new(0.0, 0.0, -5.0),
            Vec4::ONE,
            1.0,
        );
        assert!((lit.x - opaque.x * 0.25).abs() < 1e-5);
    }

    #[test]
    fn back_facing_surface_gets_only_ambient() {
        let material = Material::default();
        let lit = apply_head_light(
            true,
            &material,
            Vec3::new(-1.0, -1.0, -1.0).normalize(),
            Vec3::new(0.0, 0.0, -5.0),
            Vec4::ONE,
            1.0,
        );
        let expected = 1.5 * material.ambient.x;
        assert!((lit.x - expected).abs() < 1e-6);
    }

    #[test]
    fn facing_the_key_light_is_brighter_than_facing_away() {
        let material = Material::default();
        let position = Vec3::new(0.0, 0.0, -5.0);
        let toward = LIGHT_SOURCES[0].position.truncate().normalize();
        let bright = apply_lighting(
            true,
            scene_ambient(),
            &material,
            toward,
            position,
            Vec4::ONE,
            1.0,
        );
        let dim = apply_lighting(
            true,
            scene_ambient(),
            &material,
            -toward,
            position,
            Vec4::ONE,
            1.0,
        );
        assert!(bright.x > dim.x);
    }

    /// Pure diffuse white light so only attenuation and `n . l` remain.
    fn positional(position: Vec3, spot_cutoff: f32) -> LightSource {
        LightSource {
            position: position.extend(1.0),
            ambient: Vec4::ZERO,
            diffuse: Vec4::ONE,
            specular: Vec4::ZERO,
            attenuation: Vec3::new(1.0, 0.5, 0.25),
            spot_cutoff,
            spot_exponent: 2.0,
            spot_direction: Vec3::NEG_Z,
        }
    }

    fn matte() -> Material {
        Material {
            ambient: Vec4::ZERO,
            specular: Vec4::ZERO,
            shininess: 1.0,
        }
    }

    #[test]
    fn point_light_falls_off_with_distance() {
        let light = positional(Vec3::ZERO, 180.0);
        let color = Vec4::new(0.6, 0.3, 0.9, 1.0);
        // Two units away: 1 / (1 + 0.5 * 2 + 0.25 * 4) = 1 / 3.
        let lit = light_contribution(
            &light,
            &matte(),
            Vec3::Z,
            Vec3::new(0.0, 0.0, -2.0),
            color,
        );
        assert!((lit - color / 3.0).length() < 1e-6);
    }

    #[test]
    fn spot_light_on_axis_uses_full_cone() {
        let light = positional(Vec3::ZERO, 30.0);
        let lit = light_contribution(
            &light,
            &matte(),
            Vec3::Z,
            Vec3::new(0.0, 0.0, -2.0),
            Vec4::ONE,
        );
        assert!((lit.x - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn spot_light_inside_cutoff_applies_exponent() {
        let light = positional(Vec3::ZERO, 30.0);
        let position = Vec3::new(0.5, 0.0, -2.0);
        let normal = (-position).normalize();
        let lit =
            light_contribution(&light, &matte(), normal, position, Vec4::ONE);
        // cos = 2 / sqrt(4.25), raised to the exponent 2.
        let dist = 4.25f32.sqrt();
        let spot = 4.0 / 4.25;
        let expected = spot / (1.0 + 0.5 * dist + 0.25 * 4.25);
        assert!((lit.x - expected).abs() < 1e-5);
    }

    #[test]
    fn spot_light_outside_cutoff_leaves_only_ambient() {
        let mut light = positional(Vec3::ZERO, 30.0);
        light.ambient = Vec4::ONE;
        let material = Material {
            ambient: Vec4::splat(0.1),
            ..matte()
        };
        let position = Vec3::new(2.0, 0.0, -2.0);
        let normal = (-position).normalize();
        let lit =
            light_contribution(&light, &material, normal, position, Vec4::ONE);
        assert!((lit - Vec4::splat(0.1)).length() < 1e-6);
    }
}
