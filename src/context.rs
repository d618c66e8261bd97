use std::sync::Arc;

use anyhow::Context as _;
use log::{debug, info, warn};
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    camera::{Camera, CameraResources, CameraUniform, OrbitController, Projection},
    data_structures::texture::Texture,
    pipelines::{
        Pipelines,
        post::{FrameTargets, PostChain, clamp_sample_count},
    },
    resources::gpu_scene::GpuScene,
    scene::{post_processing::EffectComposer, root::SceneTree},
    settings,
};

/// GPU device, surface and every resource that outlives a frame.
#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pub projection: Projection,
    pub clear_colour: wgpu::Color,
    /// Sample counts usable for every main-pass attachment.
    pub(crate) sample_counts: Vec<u32>,
    pub(crate) frame: FrameTargets,
    pub(crate) post: Option<PostChain>,
    pub(crate) pipelines: Pipelines,
    pub(crate) scene: GpuScene,
}

impl Context {
    pub async fn new(window: Arc<Window>, tree: &SceneTree) -> anyhow::Result<Self> {
        let size = window.inner_size();

        info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("cannot create a surface for the window")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no compatible GPU adapter")?;
        info!("Using adapter {:?}", adapter.get_info().name);

        // Sample counts above 4 are adapter specific.
        let required_features =
            adapter.features() & wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features,
                required_limits: wgpu::Limits::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("cannot open the GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The blit writes linear colour, the surface has to encode it.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("the surface supports no formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let sample_counts = supported_sample_counts(&adapter, required_features);
        debug!("Supported sample counts: {:?}", sample_counts);

        let projection = Projection::from_settings(config.width, config.height, &tree.camera);
        let camera = create_camera_resources(&device, tree, &projection, [config.width, config.height]);
        let pipelines = Pipelines::new(&device, &camera.bind_group_layout, config.format);
        let frame = FrameTargets::new(&device, [config.width, config.height], 1);
        let scene = GpuScene::new(&device, &queue);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            camera,
            projection,
            clear_colour: tree.background.to_wgpu(),
            sample_counts,
            frame,
            post: None,
            pipelines,
            scene,
        })
    }

    /// Makes the frame targets match the surface and the mounted composer.
    /// Returns the sample count of the main pass.
    pub(crate) fn prepare_targets(&mut self, composer: Option<&EffectComposer>) -> u32 {
        let size = [self.config.width, self.config.height];
        // Without a composer the scene renders single-sampled.
        let requested = composer.map_or(1, |composer| composer.multisampling.max(1));
        let sample_count = clamp_sample_count(requested, &self.sample_counts);

        if self.frame.size != size || self.frame.sample_count != sample_count {
            if sample_count < requested {
                warn!(
                    "{}x multisampling is not supported here, using {}x",
                    requested, sample_count
                );
            }
            debug!("Frame targets {}x{} at {}x MSAA", size[0], size[1], sample_count);
            self.frame = FrameTargets::new(&self.device, size, sample_count);
        }

        match composer {
            Some(composer) => {
                if self.post.as_ref().is_none_or(|post| post.size() != size) {
                    self.post = Some(PostChain::new(&self.device, size, composer));
                }
            }
            None => self.post = None,
        }
        sample_count
    }
}

fn supported_sample_counts(adapter: &wgpu::Adapter, features: wgpu::Features) -> Vec<u32> {
    let adapter_specific = features.contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES);
    [1, 2, 4, 8, 16]
        .into_iter()
        .filter(|&count| {
            if !adapter_specific {
                // Guaranteed by WebGPU for renderable formats.
                return count == 1 || count == 4;
            }
            [Texture::HDR_FORMAT, Texture::DEPTH_FORMAT].iter().all(|&format| {
                adapter
                    .get_texture_format_features(format)
                    .flags
                    .sample_count_supported(count)
            })
        })
        .collect()
}

fn create_camera_resources(
    device: &wgpu::Device,
    tree: &SceneTree,
    projection: &Projection,
    size: [u32; 2],
) -> CameraResources {
    let camera = Camera::from_settings(&tree.camera);
    let mut controller = OrbitController::new(settings::ORBIT);
    controller.set_viewport(size[1], projection.fovy());

    let mut uniform = CameraUniform::new(&tree.ambient);
    uniform.update_view_proj(&camera, projection);
    uniform.update_viewport(size[0], size[1], 0.0);
    let mut mirror_uniform = CameraUniform::new(&tree.ambient);
    mirror_uniform.update_mirrored(&camera, projection, settings::FLOOR_POSITION[1]);
    mirror_uniform.update_viewport(size[0], size[1], 0.0);

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("camera_bind_group_layout"),
    });

    let buffer_with_group = |label: &str, uniform: CameraUniform| {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });
        (buffer, bind_group)
    };
    let (buffer, bind_group) = buffer_with_group("Camera Buffer", uniform);
    let (mirror_buffer, mirror_bind_group) = buffer_with_group("Mirror Camera Buffer", mirror_uniform);

    CameraResources {
        camera,
        controller,
        uniform,
        buffer,
        bind_group,
        mirror_uniform,
        mirror_buffer,
        mirror_bind_group,
        bind_group_layout,
    }
}
