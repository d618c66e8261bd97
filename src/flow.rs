//! Flow control and application event loop.
//!
//! A "flow" owns the scene: it describes each frame as a [`SceneTree`] and is
//! told when a frame has been presented, which is when its parts get mounted.
//! The engine owns the window, the GPU [`Context`] and the frame loop.
//!
//! # Lifecycle Flow
//!
//! The event loop follows this pattern each frame:
//! 1. Route window and device input to the orbit controller and the flow
//! 2. Ease the camera and upload camera uniforms
//! 3. Upload new video frames
//! 4. Draw the reflection, the scene and, if mounted, the post-processing chain
//! 5. Present the frame
//! 6. Call `on_commit`; if the flow changed, compose it again and sync the GPU scene

use std::{fmt::Debug, iter, sync::Arc};

use instant::Instant;
#[cfg(feature = "integration-tests")]
use instant::Duration;
#[cfg(feature = "integration-tests")]
use tokio::runtime::Runtime;
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::{
    camera::project_to_uv,
    context::Context,
    render::Batches,
    resources::gpu_scene::world_position,
    scene::root::SceneTree,
    settings,
};

#[cfg(feature = "integration-tests")]
pub enum ImageTestResult {
    Passed,
    Waiting,
    Failed,
}

/// Trait for a scene the engine can drive.
///
/// # Lifecycle
///
/// 1. `on_render()` is called once before the GPU context exists, and again
///    whenever `on_commit()` reports a change
/// 2. `on_init()` is called once the context exists
/// 3. `on_window_events()` is called for each winit window event
/// 4. `on_commit()` is called after every presented frame
pub trait GraphicsFlow {
    /// Configure the context, e.g. the clear colour or camera position.
    fn on_init(&mut self, _ctx: &mut Context) {}

    /// Describe the scene as it currently is. Must not have side effects.
    fn on_render(&self) -> SceneTree;

    /// A frame with the last composed tree was presented. Returns `true`
    /// when `on_render` would now describe a different tree.
    fn on_commit(&mut self) -> bool;

    /// Handle window events (keyboard, mouse, window resizing, etc.).
    fn on_window_events(&mut self, _ctx: &Context, _event: &WindowEvent) {}

    /// Inspect the rendered frame. Flows without checks pass on the first
    /// frame.
    #[cfg(feature = "integration-tests")]
    fn render_to_texture(
        &mut self,
        _ctx: &Context,
        _texture: &mut image::ImageBuffer<image::Rgba<u8>, wgpu::BufferView>,
    ) -> Result<ImageTestResult, anyhow::Error> {
        Ok(ImageTestResult::Passed)
    }
}

impl Debug for dyn GraphicsFlow + 'static {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GraphicsFlow")
    }
}

/// Application state bundle: GPU context, the composed tree and surface status.
#[derive(Debug)]
pub struct AppState {
    pub(crate) ctx: Context,
    tree: SceneTree,
    is_surface_configured: bool,
    started: Instant,
}

impl AppState {
    async fn new(window: Arc<Window>, tree: SceneTree) -> anyhow::Result<Self> {
        let mut ctx = Context::new(window, &tree).await?;
        let Context {
            device,
            queue,
            pipelines,
            scene,
            ..
        } = &mut ctx;
        scene.sync(device, queue, pipelines, &tree);
        Ok(Self {
            ctx,
            tree,
            is_surface_configured: false,
            started: Instant::now(),
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.ctx.config.width = width;
            self.ctx.config.height = height;
            self.is_surface_configured = true;
            self.ctx.projection.resize(width, height);
            self.ctx
                .camera
                .controller
                .set_viewport(height, self.ctx.projection.fovy());
            self.ctx
                .surface
                .configure(&self.ctx.device, &self.ctx.config);
        }
    }

    /// Replaces the composed tree and brings the GPU scene in line with it.
    fn recompose(&mut self, tree: SceneTree) {
        let Context {
            device,
            queue,
            pipelines,
            scene,
            ..
        } = &mut self.ctx;
        scene.sync(device, queue, pipelines, &tree);
        self.tree = tree;
    }

    fn update_camera(&mut self) {
        let ctx = &mut self.ctx;
        ctx.camera.controller.update(&mut ctx.camera.camera);
        let elapsed = self.started.elapsed().as_secs_f32();
        let (width, height) = (ctx.config.width, ctx.config.height);

        let camera = &mut ctx.camera;
        camera.uniform.update_view_proj(&camera.camera, &ctx.projection);
        camera.uniform.update_viewport(width, height, elapsed);
        camera
            .mirror_uniform
            .update_mirrored(&camera.camera, &ctx.projection, settings::FLOOR_POSITION[1]);
        camera.mirror_uniform.update_viewport(width, height, elapsed);
        camera.write(&ctx.queue);
    }

    #[cfg(feature = "integration-tests")]
    fn get_test_texture(&self, extent3d: wgpu::Extent3d) -> wgpu::Texture {
        self.ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Golden Image Test Output Texture"),
            size: extent3d,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.ctx.config.format,
            usage: wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
    }

    #[cfg(feature = "integration-tests")]
    fn get_with_height(&self) -> (u32, u32) {
        // Buffer rows have to be 256 byte aligned.
        let width = self.ctx.config.width.div_ceil(256) * 256;
        let height = self.ctx.config.height.div_ceil(256) * 256;
        (width, height)
    }

    #[cfg(feature = "integration-tests")]
    fn get_test_3d_extent(&self) -> wgpu::Extent3d {
        let (width, height) = self.get_with_height();
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        }
    }

    fn render(
        &mut self,
        #[cfg(feature = "integration-tests")] flow: &mut dyn GraphicsFlow,
        #[cfg(feature = "integration-tests")] async_runtime: &Runtime,
        #[cfg(feature = "integration-tests")] event_loop: &winit::event_loop::EventLoopProxy<
            FlowEvent,
        >,
    ) -> Result<(), wgpu::SurfaceError> {
        // invoke main render loop
        self.ctx.window.request_redraw();

        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        self.update_camera();
        {
            let Context {
                device,
                queue,
                pipelines,
                scene,
                ..
            } = &mut self.ctx;
            scene.update_videos(device, queue, pipelines);
        }
        let composer = self.tree.post_processing.as_ref();
        let sample_count = self.ctx.prepare_targets(composer);

        let output = self.ctx.surface.get_current_texture()?;
        #[cfg(not(feature = "integration-tests"))]
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        #[cfg(feature = "integration-tests")]
        let tex = self.get_test_texture(self.get_test_3d_extent());
        #[cfg(feature = "integration-tests")]
        let view = tex.create_view(&wgpu::TextureViewDescriptor::default());

        let ctx = &mut self.ctx;
        let batches = Batches::new(ctx.scene.renders(), ctx.camera.camera.eye);
        let reflection = ctx.scene.reflection();
        batches.prepare(
            &ctx.device,
            &mut ctx.pipelines,
            sample_count,
            reflection.is_some(),
        );

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        if let Some(reflection) = reflection {
            {
                let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Reflection Pass"),
                    color_attachments: &[Some(reflection.color_attachment(ctx.clear_colour))],
                    depth_stencil_attachment: Some(reflection.depth_attachment()),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });
                batches.draw_mirrored(&mut render_pass, &ctx.pipelines, &ctx.camera.mirror_bind_group);
            }
            reflection.encode_blur(&ctx.device, &mut encoder, &ctx.pipelines.post);
        }

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &ctx.frame.color_attachments(ctx.clear_colour),
                depth_stencil_attachment: Some(ctx.frame.depth_attachment()),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            batches.draw_main(
                &mut render_pass,
                &ctx.pipelines,
                &ctx.camera.bind_group,
                sample_count,
            );
        }

        let source = match (composer, ctx.post.as_mut()) {
            (Some(composer), Some(post)) => {
                let view_proj = ctx.camera.uniform.view_proj();
                let light_uv = world_position(&self.tree, composer.sun().node())
                    .map_or([0.5, 0.5], |sun| project_to_uv(view_proj, sun));
                post.prepare(&ctx.device, &ctx.queue, composer, light_uv);
                post.encode(&ctx.device, &mut encoder, &ctx.pipelines.post, &ctx.frame);
                &post.output().view
            }
            _ => &ctx.frame.scene.view,
        };
        ctx.pipelines.post.blit(&ctx.device, &mut encoder, source, &view);

        #[cfg(feature = "integration-tests")]
        let output_buffer = {
            let u32_size = std::mem::size_of::<u32>() as u32;
            let (width, height) = self.get_with_height();
            let output_buffer_size = (u32_size * width * height) as wgpu::BufferAddress;
            let output_buffer = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
                size: output_buffer_size,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                label: None,
                mapped_at_creation: false,
            });
            encoder.copy_texture_to_buffer(
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture: &tex,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                },
                wgpu::TexelCopyBufferInfo {
                    buffer: &output_buffer,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(u32_size * width),
                        rows_per_image: Some(height),
                    },
                },
                self.get_test_3d_extent(),
            );
            output_buffer
        };

        self.ctx.queue.submit(iter::once(encoder.finish()));

        #[cfg(feature = "integration-tests")]
        let fut_img = async {
            let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
            let buffer_slice = output_buffer.slice(..);
            buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
                tx.send(result).unwrap();
            });
            self.ctx
                .device
                .poll(wgpu::PollType::Wait {
                    submission_index: None,
                    timeout: Some(Duration::from_secs(3)),
                })
                .unwrap();
            rx.receive().await.unwrap().unwrap();
            let data = buffer_slice.get_mapped_range();
            let (width, height) = self.get_with_height();
            image::ImageBuffer::<image::Rgba<u8>, _>::from_raw(width, height, data).unwrap()
        };
        #[cfg(feature = "integration-tests")]
        {
            let mut img: image::ImageBuffer<image::Rgba<u8>, wgpu::BufferView> =
                async_runtime.block_on(fut_img);
            let passed = match flow.render_to_texture(&self.ctx, &mut img) {
                Err(e) => panic!("{}", e),
                Ok(ImageTestResult::Passed) => true,
                Ok(ImageTestResult::Failed) => panic!("Assertion failed"),
                Ok(ImageTestResult::Waiting) => false,
            };
            if passed {
                event_loop
                    .send_event(FlowEvent::Exit)
                    .expect("All assertions passed but the winit event-loop could not safely exit")
            }
        }

        output.present();
        Ok(())
    }
}

pub struct App {
    async_runtime: tokio::runtime::Runtime,
    #[cfg(feature = "integration-tests")]
    proxy: winit::event_loop::EventLoopProxy<FlowEvent>,
    state: Option<AppState>,
    flow: Box<dyn GraphicsFlow>,
    frames: u64,
}

impl App {
    #[cfg_attr(not(feature = "integration-tests"), allow(unused_variables))]
    fn new(event_loop: &EventLoop<FlowEvent>, flow: Box<dyn GraphicsFlow>) -> anyhow::Result<Self> {
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            async_runtime,
            #[cfg(feature = "integration-tests")]
            proxy: event_loop.create_proxy(),
            state: None,
            flow,
            frames: 0,
        })
    }

    /// Runs after every presented frame.
    fn commit(&mut self) {
        self.frames += 1;
        if self.flow.on_commit() {
            if let Some(state) = &mut self.state {
                log::info!("Scene changed after frame {}, composing again", self.frames);
                state.recompose(self.flow.on_render());
            }
        }
    }
}

#[derive(Debug)]
pub enum FlowEvent {
    Exit,
}

impl ApplicationHandler<FlowEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let window_attributes = Window::default_attributes().with_title("godray stage");
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Cannot create a window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let tree = self.flow.on_render();
        match self.async_runtime.block_on(AppState::new(window, tree)) {
            Ok(mut app_state) => {
                self.flow.on_init(&mut app_state.ctx);
                let size = app_state.ctx.window.inner_size();
                app_state.resize(size.width, size.height);
                app_state.ctx.window.request_redraw();
                self.state = Some(app_state);
            }
            Err(e) => {
                log::error!("App initialization failed. Cannot create the main context: {:#}", e);
                event_loop.exit();
            }
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: FlowEvent) {
        match event {
            FlowEvent::Exit => event_loop.exit(),
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            state.ctx.camera.controller.handle_mouse(dx, dy);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        state.ctx.camera.controller.handle_window_events(&event);
        self.flow.on_window_events(&state.ctx, &event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                match state.render(
                    #[cfg(feature = "integration-tests")]
                    self.flow.as_mut(),
                    #[cfg(feature = "integration-tests")]
                    &self.async_runtime,
                    #[cfg(feature = "integration-tests")]
                    &self.proxy,
                ) {
                    Ok(_) => {
                        if state.is_surface_configured {
                            self.commit();
                        }
                    }
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Opens a window and drives `flow` until the window is closed.
pub fn run(flow: Box<dyn GraphicsFlow>) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    #[cfg(all(feature = "integration-tests", target_os = "linux"))]
    let event_loop: EventLoop<FlowEvent> = {
        use winit::platform::wayland::EventLoopBuilderExtWayland;

        winit::event_loop::EventLoop::with_user_event()
            .with_any_thread(true)
            .build()?
    };

    #[cfg(all(feature = "integration-tests", target_os = "windows"))]
    let event_loop: EventLoop<FlowEvent> = {
        use winit::platform::windows::EventLoopBuilderExtWindows;

        winit::event_loop::EventLoop::with_user_event()
            .with_any_thread(true)
            .build()?
    };

    #[cfg(not(feature = "integration-tests"))]
    let event_loop: EventLoop<FlowEvent> = EventLoop::with_user_event().build()?;

    let mut app = App::new(&event_loop, flow)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}
