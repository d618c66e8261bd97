//! Planar reflection about the floor plane and the blurred copies reflectors
//! mix in.

use log::debug;
use wgpu::util::DeviceExt;

use crate::{
    data_structures::texture::Texture,
    pipelines::post::{FullscreenPipelines, PostParams, Stage, fullscreen_pass},
};

/// Offsets of the successive kawase passes.
pub const BLUR_KERNEL: [f32; 5] = [0.0, 1.0, 2.0, 2.0, 3.0];

/// Ping-pong targets sized to a reflector's blur, plus one uniform per pass.
/// The last pass always lands in `ping`.
#[derive(Debug)]
struct BlurChain {
    ping: Texture,
    pong: Texture,
    uniforms: Vec<wgpu::Buffer>,
}

impl BlurChain {
    fn new(device: &wgpu::Device, blur: [f32; 2]) -> Self {
        let size = [blur[0].max(1.0) as u32, blur[1].max(1.0) as u32];
        let target = |label| Texture::create_render_target(device, size, Texture::HDR_FORMAT, 1, label);
        let uniforms = BLUR_KERNEL
            .iter()
            .map(|&offset| {
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Reflection Blur Params"),
                    contents: bytemuck::cast_slice(&[PostParams::kawase(size, offset)]),
                    usage: wgpu::BufferUsages::UNIFORM,
                })
            })
            .collect();
        Self {
            ping: target("reflection_blur_ping"),
            pong: target("reflection_blur_pong"),
            uniforms,
        }
    }

    fn encode(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        pipelines: &FullscreenPipelines,
        source: &Texture,
    ) {
        let pipeline = pipelines.pipeline(Stage::Kawase);
        let mut input = &source.view;
        for (pass, uniform) in self.uniforms.iter().enumerate() {
            // Five passes: mirror -> ping -> pong -> ping -> pong -> ping.
            let target = if pass % 2 == 0 { &self.ping } else { &self.pong };
            let bind_group = pipelines.bind_group(device, input, input, uniform);
            fullscreen_pass(encoder, "Reflection Blur Pass", pipeline, &bind_group, &target.view);
            input = &target.view;
        }
    }
}

/// The scene seen in the floor, shared by every reflector.
#[derive(Debug)]
pub struct ReflectionPass {
    mirror: Texture,
    depth: Texture,
    chains: Vec<BlurChain>,
}

impl ReflectionPass {
    pub fn new(device: &wgpu::Device, resolution: u32) -> Self {
        let size = [resolution, resolution];
        Self {
            mirror: Texture::create_render_target(
                device,
                size,
                Texture::HDR_FORMAT,
                1,
                "reflection_target",
            ),
            depth: Texture::create_depth_texture(device, size, 1, "reflection_depth"),
            chains: Vec::new(),
        }
    }

    /// Adds a blurred copy for one reflector and returns its index.
    pub fn add_chain(&mut self, device: &wgpu::Device, blur: [f32; 2]) -> usize {
        debug!("Reflection blur chain at {}x{}", blur[0], blur[1]);
        self.chains.push(BlurChain::new(device, blur));
        self.chains.len() - 1
    }

    pub fn mirror(&self) -> &Texture {
        &self.mirror
    }

    pub fn blurred(&self, chain: usize) -> Option<&Texture> {
        self.chains.get(chain).map(|chain| &chain.ping)
    }

    pub fn color_attachment(&self, clear: wgpu::Color) -> wgpu::RenderPassColorAttachment<'_> {
        wgpu::RenderPassColorAttachment {
            view: &self.mirror.view,
            resolve_target: None,
            depth_slice: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(clear),
                store: wgpu::StoreOp::Store,
            },
        }
    }

    pub fn depth_attachment(&self) -> wgpu::RenderPassDepthStencilAttachment<'_> {
        wgpu::RenderPassDepthStencilAttachment {
            view: &self.depth.view,
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(1.0),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }
    }

    /// Runs every blur chain over the finished mirror image.
    pub fn encode_blur(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        pipelines: &FullscreenPipelines,
    ) {
        for chain in &self.chains {
            chain.encode(device, encoder, pipelines, &self.mirror);
        }
    }
}
