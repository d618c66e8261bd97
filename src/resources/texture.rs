//! Material bind groups and the textures behind them.

use log::{debug, warn};

use crate::{
    data_structures::{material::Material, texture::Texture},
    video::VideoFeed,
};

/// Per-material shading parameters as the scene shader reads them.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    /// Linear colour and opacity.
    pub color: [f32; 4],
    /// Basic: `has_map`. Reflector: mix strength, metalness, mix blur, roughness.
    pub params: [f32; 4],
}

impl MaterialUniform {
    pub fn from_material(material: &Material) -> Self {
        match material {
            Material::Basic(basic) => {
                let [r, g, b] = basic.color.to_linear();
                Self {
                    color: [r, g, b, 1.0],
                    params: [basic.map.is_some() as u32 as f32, 0.0, 0.0, 0.0],
                }
            }
            Material::Phong(phong) => {
                let [r, g, b] = phong.color.to_linear();
                let opacity = if phong.transparent { phong.opacity } else { 1.0 };
                Self {
                    color: [r, g, b, opacity],
                    params: [0.0; 4],
                }
            }
            Material::Reflector(reflector) => {
                let s = &reflector.settings;
                let [r, g, b] = s.color.to_linear();
                if !(0.0..=1.0).contains(&s.metalness) {
                    debug!("Reflector metalness {} is clamped to [0, 1].", s.metalness);
                }
                Self {
                    color: [r, g, b, 1.0],
                    params: [
                        s.mix_strength,
                        s.metalness.clamp(0.0, 1.0),
                        s.mix_blur,
                        s.roughness,
                    ],
                }
            }
        }
    }
}

/// Uniform, map, blurred map, sampler.
pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            texture(1),
            texture(2),
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("material_bind_group_layout"),
    })
}

pub fn material_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniform: &wgpu::Buffer,
    map: &wgpu::TextureView,
    blurred: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(map),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(blurred),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
        label: Some(label),
    })
}

/// A GPU texture kept in step with a [`VideoFeed`].
///
/// Starts as a 1x1 black texture and is re-created when the first frame (or
/// a frame of a different size) arrives.
#[derive(Debug)]
pub struct VideoTexture {
    feed: VideoFeed,
    texture: Texture,
    generation: u64,
}

impl VideoTexture {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, feed: VideoFeed) -> Self {
        Self {
            feed,
            texture: Texture::solid(device, queue, [0, 0, 0, 255], "blank video"),
            generation: 0,
        }
    }

    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn feed(&self) -> &VideoFeed {
        &self.feed
    }

    /// Uploads the latest frame if there is a new one. Returns `true` when the
    /// texture was re-created and bind groups using it must be rebuilt.
    pub fn update(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> bool {
        let generation = self.feed.generation();
        if generation == self.generation {
            return false;
        }
        self.generation = generation;
        let Some(frame) = self.feed.latest() else {
            return false;
        };

        let (width, height) = frame.dimensions();
        let recreated = self.texture.size() != [width, height];
        if recreated {
            debug!("Video texture resized to {}x{}.", width, height);
            self.texture = Texture::create_video_texture(device, width, height, "video frame");
        }
        if let Err(e) = self.texture.write_rgba(queue, &frame) {
            warn!("Dropping video frame: {e}");
        }
        recreated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data_structures::material::{BasicMaterial, Color, PhongMaterial, ReflectorMaterial, Side},
        settings::{FLOOR_REFLECTOR, STADIUM_REFLECTOR},
    };

    #[test]
    fn basic_material_flags_its_map() {
        let with_map = MaterialUniform::from_material(&Material::Basic(BasicMaterial {
            color: Color::WHITE,
            map: Some(VideoFeed::new()),
            side: Side::Double,
        }));
        let without = MaterialUniform::from_material(&Material::Basic(BasicMaterial {
            color: Color::WHITE,
            map: None,
            side: Side::Double,
        }));

        assert_eq!(with_map.params[0], 1.0);
        assert_eq!(without.params[0], 0.0);
    }

    #[test]
    fn opaque_phong_ignores_opacity() {
        let phong = |transparent| {
            MaterialUniform::from_material(&Material::Phong(PhongMaterial {
                color: Color::BLACK,
                opacity: 0.995,
                transparent,
                side: Side::Front,
            }))
        };

        assert_eq!(phong(true).color[3], 0.995);
        assert_eq!(phong(false).color[3], 1.0);
    }

    #[test]
    fn reflector_metalness_is_clamped() {
        let uniform = |settings| {
            MaterialUniform::from_material(&Material::Reflector(ReflectorMaterial {
                settings,
                side: Side::Front,
            }))
        };

        assert_eq!(uniform(FLOOR_REFLECTOR).params, [300.0, 0.8, 1.0, 1.0]);
        assert_eq!(uniform(STADIUM_REFLECTOR).params[1], 1.0);
    }
}
