//! Full-screen post-processing: god rays from the light mask, then bloom.
//!
//! The main pass writes the lit scene and a light mask (only light-source
//! geometry is non-black) into [`FrameTargets`]. [`plan`] turns an
//! [`EffectComposer`] into an ordered list of [`PostPass`]es over named
//! [`Slot`]s, and [`PostChain`] owns the intermediate textures and runs them.

use wgpu::util::DeviceExt;

use crate::{
    data_structures::texture::{Texture, create_clamped_sampler},
    pipelines::basic::{RenderPipelineParams, mk_render_pipeline},
    scene::post_processing::{Effect, EffectComposer},
};

/// Two vec4s of per-pass parameters, see `post.wgsl` for their meaning.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PostParams {
    pub a: [f32; 4],
    pub b: [f32; 4],
}

impl PostParams {
    pub fn god_rays(settings: &crate::settings::GodRaysSettings, light_uv: [f32; 2]) -> Self {
        Self {
            a: [light_uv[0], light_uv[1], settings.density, settings.weight],
            b: [
                settings.decay,
                settings.exposure,
                settings.clamp_max,
                settings.samples as f32,
            ],
        }
    }

    pub fn kawase(size: [u32; 2], offset: f32) -> Self {
        let [x, y] = texel(size);
        Self {
            a: [x, y, offset, 0.0],
            ..Default::default()
        }
    }

    pub fn blend(intensity: f32) -> Self {
        Self {
            a: [intensity, 0.0, 0.0, 0.0],
            ..Default::default()
        }
    }

    pub fn luminance(threshold: f32, smoothing: f32) -> Self {
        Self {
            a: [threshold, smoothing, 0.0, 0.0],
            ..Default::default()
        }
    }

    pub fn downsample(source: [u32; 2]) -> Self {
        let [x, y] = texel(source);
        Self {
            a: [x, y, 0.0, 0.0],
            ..Default::default()
        }
    }

    pub fn upsample(lower: [u32; 2], radius: f32) -> Self {
        let [x, y] = texel(lower);
        Self {
            a: [x, y, radius, 0.0],
            ..Default::default()
        }
    }
}

fn texel(size: [u32; 2]) -> [f32; 2] {
    [1.0 / size[0].max(1) as f32, 1.0 / size[1].max(1) as f32]
}

/// Largest sample count not above `requested` that the adapter supports for
/// every attachment. Always at least 1.
pub fn clamp_sample_count(requested: u32, supported: &[u32]) -> u32 {
    supported
        .iter()
        .copied()
        .filter(|&count| count <= requested)
        .max()
        .unwrap_or(1)
        .max(1)
}

/// Sizes of the bloom mip chain below `size`: each level halves the previous
/// one, up to `levels` levels and only while both sides are above one pixel.
pub fn mip_sizes(size: [u32; 2], levels: u32) -> Vec<[u32; 2]> {
    let mut sizes = Vec::new();
    let mut current = size;
    while sizes.len() < levels as usize && current[0] > 1 && current[1] > 1 {
        current = [(current[0] / 2).max(1), (current[1] / 2).max(1)];
        sizes.push(current);
    }
    sizes
}

fn scaled(size: [u32; 2], scale: f32) -> [u32; 2] {
    [
        ((size[0] as f32 * scale) as u32).max(1),
        ((size[1] as f32 * scale) as u32).max(1),
    ]
}

/// A texture a pass reads from or renders into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    Scene,
    Mask,
    Rays,
    RaysPing,
    WithRays,
    Bright,
    Down(usize),
    Up(usize),
    Output,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    GodRays,
    Kawase,
    ScreenBlend,
    Luminance,
    Downsample,
    Upsample,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PostPass {
    pub stage: Stage,
    pub a: Slot,
    pub b: Slot,
    pub target: Slot,
    pub params: PostParams,
}

impl PostPass {
    fn new(stage: Stage, a: Slot, target: Slot, params: PostParams) -> Self {
        Self {
            stage,
            a,
            b: a,
            target,
            params,
        }
    }

    fn with_b(mut self, b: Slot) -> Self {
        self.b = b;
        self
    }
}

/// Every pass the composer needs for one frame of `size`, in execution
/// order. The last pass always renders into [`Slot::Output`].
pub fn plan(composer: &EffectComposer, size: [u32; 2], light_uv: [f32; 2]) -> Vec<PostPass> {
    let mut passes = Vec::new();
    // The stage order is fixed: each effect reads what the previous one wrote.
    let mut input = Slot::Scene;
    for effect in composer.stages() {
        match effect {
            Effect::GodRays(rays) => {
                let settings = &rays.settings;
                let rays_size = scaled(size, settings.resolution_scale);
                passes.push(PostPass::new(
                    Stage::GodRays,
                    Slot::Mask,
                    Slot::Rays,
                    PostParams::god_rays(settings, light_uv),
                ));
                if settings.blur {
                    passes.push(PostPass::new(
                        Stage::Kawase,
                        Slot::Rays,
                        Slot::RaysPing,
                        PostParams::kawase(rays_size, 0.0),
                    ));
                    passes.push(PostPass::new(
                        Stage::Kawase,
                        Slot::RaysPing,
                        Slot::Rays,
                        PostParams::kawase(rays_size, 1.0),
                    ));
                }
                passes.push(
                    PostPass::new(Stage::ScreenBlend, input, Slot::WithRays, PostParams::blend(1.0))
                        .with_b(Slot::Rays),
                );
                input = Slot::WithRays;
            }
            Effect::Bloom(bloom) => {
                let settings = &bloom.settings;
                passes.push(PostPass::new(
                    Stage::Luminance,
                    input,
                    Slot::Bright,
                    PostParams::luminance(settings.luminance_threshold, settings.luminance_smoothing),
                ));

                let sizes = mip_sizes(size, settings.levels);
                let mut glow = Slot::Bright;
                if settings.mipmap_blur && !sizes.is_empty() {
                    let mut source = (Slot::Bright, size);
                    for (level, &level_size) in sizes.iter().enumerate() {
                        passes.push(PostPass::new(
                            Stage::Downsample,
                            source.0,
                            Slot::Down(level),
                            PostParams::downsample(source.1),
                        ));
                        source = (Slot::Down(level), level_size);
                    }
                    let mut lower = source;
                    for level in (0..sizes.len() - 1).rev() {
                        passes.push(
                            PostPass::new(
                                Stage::Upsample,
                                lower.0,
                                Slot::Up(level),
                                PostParams::upsample(lower.1, settings.radius),
                            )
                            .with_b(Slot::Down(level)),
                        );
                        lower = (Slot::Up(level), sizes[level]);
                    }
                    glow = lower.0;
                }

                passes.push(
                    PostPass::new(
                        Stage::ScreenBlend,
                        input,
                        Slot::Output,
                        PostParams::blend(settings.intensity),
                    )
                    .with_b(glow),
                );
                input = Slot::Output;
            }
        }
    }
    passes
}

/// Bind group layout, sampler and one pipeline per full-screen stage.
#[derive(Debug)]
pub struct FullscreenPipelines {
    pub layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    blank: wgpu::Buffer,
    god_rays: wgpu::RenderPipeline,
    kawase: wgpu::RenderPipeline,
    screen_blend: wgpu::RenderPipeline,
    luminance: wgpu::RenderPipeline,
    downsample: wgpu::RenderPipeline,
    upsample: wgpu::RenderPipeline,
    blit: wgpu::RenderPipeline,
}

impl FullscreenPipelines {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
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
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                texture(0),
                texture(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
            label: Some("post_bind_group_layout"),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Post Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Post Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("post.wgsl").into()),
        });

        let mk = |label: &str, fs_entry: &str, format: wgpu::TextureFormat| {
            mk_render_pipeline(
                device,
                &pipeline_layout,
                &shader,
                RenderPipelineParams {
                    label,
                    vs_entry: "vs_fullscreen",
                    fs_entry,
                    vertex_layouts: &[],
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    depth: None,
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    front_face: wgpu::FrontFace::Ccw,
                    sample_count: 1,
                },
            )
        };
        let hdr = Texture::HDR_FORMAT;

        Self {
            god_rays: mk("God Rays Pipeline", "fs_god_rays", hdr),
            kawase: mk("Kawase Blur Pipeline", "fs_kawase", hdr),
            screen_blend: mk("Screen Blend Pipeline", "fs_screen_blend", hdr),
            luminance: mk("Luminance Pipeline", "fs_luminance", hdr),
            downsample: mk("Bloom Downsample Pipeline", "fs_downsample", hdr),
            upsample: mk("Bloom Upsample Pipeline", "fs_upsample", hdr),
            blit: mk("Blit Pipeline", "fs_blit", surface_format),
            sampler: create_clamped_sampler(device),
            blank: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Blank Post Params"),
                contents: bytemuck::cast_slice(&[PostParams::default()]),
                usage: wgpu::BufferUsages::UNIFORM,
            }),
            layout,
        }
    }

    pub fn pipeline(&self, stage: Stage) -> &wgpu::RenderPipeline {
        match stage {
            Stage::GodRays => &self.god_rays,
            Stage::Kawase => &self.kawase,
            Stage::ScreenBlend => &self.screen_blend,
            Stage::Luminance => &self.luminance,
            Stage::Downsample => &self.downsample,
            Stage::Upsample => &self.upsample,
        }
    }

    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        a: &wgpu::TextureView,
        b: &wgpu::TextureView,
        params: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(a),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(b),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: params.as_entire_binding(),
                },
            ],
            label: Some("post_bind_group"),
        })
    }

    /// Copies an HDR texture to the surface, clamped to displayable range.
    pub fn blit(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::TextureView,
        target: &wgpu::TextureView,
    ) {
        let bind_group = self.bind_group(device, source, source, &self.blank);
        fullscreen_pass(encoder, "Blit Pass", &self.blit, &bind_group, target);
    }
}

pub fn fullscreen_pass(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
    target: &wgpu::TextureView,
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            depth_slice: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.draw(0..3, 0..1);
}

/// The main pass attachments: scene colour, light mask and depth. With
/// multisampling the colour attachments resolve into `scene` and `mask`.
#[derive(Debug)]
pub struct FrameTargets {
    pub size: [u32; 2],
    pub sample_count: u32,
    pub scene: Texture,
    pub mask: Texture,
    msaa: Option<(Texture, Texture)>,
    pub depth: Texture,
}

impl FrameTargets {
    pub fn new(device: &wgpu::Device, size: [u32; 2], sample_count: u32) -> Self {
        let hdr = Texture::HDR_FORMAT;
        let msaa = (sample_count > 1).then(|| {
            (
                Texture::create_render_target(device, size, hdr, sample_count, "msaa_scene"),
                Texture::create_render_target(device, size, hdr, sample_count, "msaa_mask"),
            )
        });
        Self {
            size,
            sample_count,
            scene: Texture::create_render_target(device, size, hdr, 1, "scene_target"),
            mask: Texture::create_render_target(device, size, hdr, 1, "light_mask_target"),
            msaa,
            depth: Texture::create_depth_texture(device, size, sample_count, "depth_texture"),
        }
    }

    pub fn color_attachments(
        &self,
        clear: wgpu::Color,
    ) -> [Option<wgpu::RenderPassColorAttachment<'_>>; 2] {
        let attachment = |view, resolve_target, clear| {
            Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear),
                    store: wgpu::StoreOp::Store,
                },
            })
        };
        let transparent = wgpu::Color::TRANSPARENT;
        match &self.msaa {
            Some((scene, mask)) => [
                attachment(&scene.view, Some(&self.scene.view), clear),
                attachment(&mask.view, Some(&self.mask.view), transparent),
            ],
            None => [
                attachment(&self.scene.view, None, clear),
                attachment(&self.mask.view, None, transparent),
            ],
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
}

/// Intermediate textures and uniforms for [`plan`]ned passes at one size.
#[derive(Debug)]
pub struct PostChain {
    size: [u32; 2],
    rays: Texture,
    rays_ping: Texture,
    with_rays: Texture,
    bright: Texture,
    downs: Vec<Texture>,
    ups: Vec<Texture>,
    output: Texture,
    uniforms: Vec<wgpu::Buffer>,
    passes: Vec<PostPass>,
}

impl PostChain {
    pub fn new(device: &wgpu::Device, size: [u32; 2], composer: &EffectComposer) -> Self {
        let hdr = Texture::HDR_FORMAT;
        let target = |size, label| Texture::create_render_target(device, size, hdr, 1, label);
        let rays_size = scaled(size, composer.god_rays().settings.resolution_scale);
        let sizes = mip_sizes(size, composer.bloom().settings.levels);

        Self {
            size,
            rays: target(rays_size, "god_rays"),
            rays_ping: target(rays_size, "god_rays_ping"),
            with_rays: target(size, "with_god_rays"),
            bright: target(size, "bloom_luminance"),
            downs: sizes
                .iter()
                .map(|&s| target(s, "bloom_down"))
                .collect(),
            ups: sizes
                .iter()
                .take(sizes.len().saturating_sub(1))
                .map(|&s| target(s, "bloom_up"))
                .collect(),
            output: target(size, "post_output"),
            uniforms: Vec::new(),
            passes: Vec::new(),
        }
    }

    pub fn size(&self) -> [u32; 2] {
        self.size
    }

    /// Plans this frame's passes and uploads their parameters.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        composer: &EffectComposer,
        light_uv: [f32; 2],
    ) {
        self.passes = plan(composer, self.size, light_uv);
        while self.uniforms.len() < self.passes.len() {
            self.uniforms.push(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Post Params"),
                size: std::mem::size_of::<PostParams>() as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }
        for (pass, uniform) in self.passes.iter().zip(&self.uniforms) {
            queue.write_buffer(uniform, 0, bytemuck::cast_slice(&[pass.params]));
        }
    }

    pub fn encode(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        pipelines: &FullscreenPipelines,
        frame: &FrameTargets,
    ) {
        for (pass, uniform) in self.passes.iter().zip(&self.uniforms) {
            let bind_group = pipelines.bind_group(
                device,
                self.view(pass.a, frame),
                self.view(pass.b, frame),
                uniform,
            );
            fullscreen_pass(
                encoder,
                "Post Pass",
                pipelines.pipeline(pass.stage),
                &bind_group,
                self.view(pass.target, frame),
            );
        }
    }

    pub fn output(&self) -> &Texture {
        &self.output
    }

    fn view<'a>(&'a self, slot: Slot, frame: &'a FrameTargets) -> &'a wgpu::TextureView {
        match slot {
            Slot::Scene => &frame.scene.view,
            Slot::Mask => &frame.mask.view,
            Slot::Rays => &self.rays.view,
            Slot::RaysPing => &self.rays_ping.view,
            Slot::WithRays => &self.with_rays.view,
            Slot::Bright => &self.bright.view,
            Slot::Down(level) => &self.downs[level].view,
            Slot::Up(level) => &self.ups[level].view,
            Slot::Output => &self.output.view,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        data_structures::{
            material::{BasicMaterial, Color, Material, MaterialHandle, Side},
            scene_graph::NodeId,
        },
        settings::{BLOOM, COMPOSER, GOD_RAYS},
    };

    fn composer() -> EffectComposer {
        let material = Arc::new(Material::Basic(BasicMaterial {
            color: Color::WHITE,
            map: None,
            side: Side::Double,
        }));
        EffectComposer::new(MaterialHandle::new(NodeId::new(2), material))
    }

    #[test]
    fn sample_count_falls_back_to_what_the_adapter_has() {
        assert_eq!(clamp_sample_count(8, &[1, 2, 4, 8]), 8);
        assert_eq!(clamp_sample_count(8, &[1, 4]), 4);
        assert_eq!(clamp_sample_count(1, &[1, 4]), 1);
        assert_eq!(clamp_sample_count(8, &[]), 1);
    }

    #[test]
    fn mip_chain_stops_at_one_pixel() {
        assert_eq!(mip_sizes([4, 4], 8), vec![[2, 2], [1, 1]]);
        assert_eq!(mip_sizes([800, 600], 8).len(), 8);
        assert_eq!(mip_sizes([800, 600], 8)[7], [3, 2]);
        assert!(mip_sizes([1, 1], 8).is_empty());
    }

    #[test]
    fn god_rays_run_before_bloom() {
        let passes = plan(&composer(), [800, 600], [0.5, 0.25]);

        let first = passes[0];
        assert_eq!(first.stage, Stage::GodRays);
        assert_eq!(first.a, Slot::Mask);
        assert_eq!(first.params.a[..2], [0.5, 0.25]);
        assert_eq!(first.params.b[3], GOD_RAYS.samples as f32);

        let luminance = passes
            .iter()
            .position(|p| p.stage == Stage::Luminance)
            .unwrap();
        let last_ray_pass = passes
            .iter()
            .rposition(|p| p.target == Slot::WithRays)
            .unwrap();
        assert!(last_ray_pass < luminance);
        assert_eq!(passes[luminance].a, Slot::WithRays);
    }

    #[test]
    fn bloom_blends_the_upsampled_chain_last() {
        let passes = plan(&composer(), [800, 600], [0.5, 0.5]);
        let last = passes.last().unwrap();

        assert_eq!(last.stage, Stage::ScreenBlend);
        assert_eq!(last.target, Slot::Output);
        assert_eq!(last.a, Slot::WithRays);
        assert_eq!(last.b, Slot::Up(0));
        assert_eq!(last.params.a[0], BLOOM.intensity);

        let downs = passes.iter().filter(|p| p.stage == Stage::Downsample).count();
        let ups = passes.iter().filter(|p| p.stage == Stage::Upsample).count();
        assert_eq!(downs, BLOOM.levels as usize);
        assert_eq!(ups, downs - 1);
        assert!(passes.iter().filter(|p| p.stage == Stage::Upsample).all(|p| p.params.a[2] == BLOOM.radius));
    }

    #[test]
    fn unblurred_rays_skip_kawase() {
        let material = Arc::new(Material::Basic(BasicMaterial {
            color: Color::WHITE,
            map: None,
            side: Side::Double,
        }));
        let mut rays = GOD_RAYS;
        rays.blur = false;
        let mut bloom = BLOOM;
        bloom.mipmap_blur = false;
        let composer = EffectComposer::with_settings(
            MaterialHandle::new(NodeId::new(2), material),
            COMPOSER,
            rays,
            bloom,
        );

        let stages: Vec<_> = plan(&composer, [64, 64], [0.5, 0.5])
            .iter()
            .map(|p| p.stage)
            .collect();
        assert_eq!(
            stages,
            vec![
                Stage::GodRays,
                Stage::ScreenBlend,
                Stage::Luminance,
                Stage::ScreenBlend
            ]
        );
    }
}
