//! Render pipelines, created lazily and cached by what makes them differ.

use std::collections::HashMap;

use log::debug;

use crate::{
    data_structures::material::{Material, Side},
    pipelines::{
        basic::mk_scene_pipeline,
        post::FullscreenPipelines,
        stars::{mk_stars_pipeline, stars_layout},
    },
    resources::texture::material_layout,
};

pub mod basic;
pub mod post;
pub mod reflection;
pub mod stars;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shading {
    Basic,
    Phong,
    Reflector,
}

impl From<&Material> for Shading {
    fn from(material: &Material) -> Self {
        match material {
            Material::Basic(_) => Shading::Basic,
            Material::Phong(_) => Shading::Phong,
            Material::Reflector(_) => Shading::Reflector,
        }
    }
}

/// Everything that forces a separate mesh pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub shading: Shading,
    pub side: Side,
    pub transparent: bool,
    /// Drawn into the reflection target instead of the frame.
    pub mirrored: bool,
    pub sample_count: u32,
}

impl PipelineKey {
    pub fn for_material(material: &Material, mirrored: bool, sample_count: u32) -> Self {
        Self {
            shading: material.into(),
            side: material.side(),
            transparent: material.is_transparent(),
            mirrored,
            sample_count,
        }
    }
}

#[derive(Debug)]
pub struct Pipelines {
    scene_shader: wgpu::ShaderModule,
    stars_shader: wgpu::ShaderModule,
    scene_layout: wgpu::PipelineLayout,
    stars_pipeline_layout: wgpu::PipelineLayout,
    pub material_layout: wgpu::BindGroupLayout,
    pub stars_layout: wgpu::BindGroupLayout,
    scene: HashMap<PipelineKey, wgpu::RenderPipeline>,
    stars: HashMap<(bool, u32), wgpu::RenderPipeline>,
    pub post: FullscreenPipelines,
}

impl Pipelines {
    pub fn new(
        device: &wgpu::Device,
        camera_layout: &wgpu::BindGroupLayout,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let scene_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("scene.wgsl").into()),
        });
        let stars_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Stars Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("stars.wgsl").into()),
        });

        let material_layout = material_layout(device);
        let stars_layout = stars_layout(device);

        let scene_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[camera_layout, &material_layout],
            push_constant_ranges: &[],
        });
        let stars_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Stars Pipeline Layout"),
            bind_group_layouts: &[camera_layout, &stars_layout],
            push_constant_ranges: &[],
        });

        Self {
            scene_shader,
            stars_shader,
            scene_layout,
            stars_pipeline_layout,
            material_layout,
            stars_layout,
            scene: HashMap::new(),
            stars: HashMap::new(),
            post: FullscreenPipelines::new(device, surface_format),
        }
    }

    /// Builds the pipeline for `key` unless it is cached already.
    pub fn prepare(&mut self, device: &wgpu::Device, key: PipelineKey) {
        if !self.scene.contains_key(&key) {
            debug!("Creating pipeline {:?}", key);
            let pipeline = mk_scene_pipeline(device, &self.scene_layout, &self.scene_shader, key);
            self.scene.insert(key, pipeline);
        }
    }

    pub fn get(&self, key: &PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.scene.get(key)
    }

    pub fn prepare_stars(&mut self, device: &wgpu::Device, mirrored: bool, sample_count: u32) {
        let key = (mirrored, sample_count);
        if !self.stars.contains_key(&key) {
            debug!("Creating stars pipeline {:?}", key);
            let pipeline = mk_stars_pipeline(
                device,
                &self.stars_pipeline_layout,
                &self.stars_shader,
                mirrored,
                sample_count,
            );
            self.stars.insert(key, pipeline);
        }
    }

    pub fn stars(&self, mirrored: bool, sample_count: u32) -> Option<&wgpu::RenderPipeline> {
        self.stars.get(&(mirrored, sample_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data_structures::material::{Color, PhongMaterial, ReflectorMaterial},
        settings::FLOOR_REFLECTOR,
    };

    #[test]
    fn keys_follow_the_material() {
        let cap = Material::Phong(PhongMaterial {
            color: Color::BLACK,
            opacity: 0.995,
            transparent: true,
            side: Side::Front,
        });
        let floor = Material::Reflector(ReflectorMaterial {
            settings: FLOOR_REFLECTOR,
            side: Side::Front,
        });

        let key = PipelineKey::for_material(&cap, false, 4);
        assert_eq!(key.shading, Shading::Phong);
        assert!(key.transparent);
        assert_eq!(key.sample_count, 4);

        let key = PipelineKey::for_material(&floor, false, 1);
        assert_eq!(key.shading, Shading::Reflector);
        assert!(!key.transparent);
        assert_ne!(key, PipelineKey::for_material(&floor, true, 1));
    }
}
