use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use godray_stage::video::{FrameSource, VideoError, VideoFeed, VideoResult};
#[cfg(feature = "integration-tests")]
use godray_stage::{
    context::Context,
    flow::{GraphicsFlow, ImageTestResult},
    scene::SceneTree,
};

/// Plays instantly and pushes a single grey frame.
pub(crate) struct FakeSource {
    feed: VideoFeed,
    plays: Arc<AtomicUsize>,
}

impl FakeSource {
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let plays = Arc::new(AtomicUsize::new(0));
        let source = Self {
            feed: VideoFeed::new(),
            plays: plays.clone(),
        };
        (source, plays)
    }
}

impl FrameSource for FakeSource {
    fn play(&mut self) -> VideoResult<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        self.feed
            .push(image::RgbaImage::from_pixel(2, 2, image::Rgba([128, 128, 128, 255])));
        Ok(())
    }

    fn feed(&self) -> VideoFeed {
        self.feed.clone()
    }
}

/// A video that never decodes.
pub(crate) struct FailingSource {
    feed: VideoFeed,
}

impl FailingSource {
    pub fn new() -> Self {
        Self {
            feed: VideoFeed::new(),
        }
    }
}

impl FrameSource for FailingSource {
    fn play(&mut self) -> VideoResult<()> {
        Err(VideoError::NoVideoStream)
    }

    fn feed(&self) -> VideoFeed {
        self.feed.clone()
    }
}

pub(crate) struct FrameCounter(pub(crate) u32);

impl FrameCounter {
    pub(crate) fn frame(&self) -> u32 {
        self.0
    }

    pub(crate) fn progress(&mut self) {
        self.0 += 1;
    }
}

#[cfg(feature = "integration-tests")]
type Validate = dyn Fn(
    &Context,
    &mut FrameCounter,
    &mut image::ImageBuffer<image::Rgba<u8>, wgpu::BufferView>,
) -> Result<ImageTestResult, anyhow::Error>;

/// Renders a fixed tree and hands every read-back frame to `validate`.
#[cfg(feature = "integration-tests")]
pub(crate) struct TestRender {
    pub(crate) tree: SceneTree,
    pub(crate) setup: Box<dyn Fn(&mut Context)>,
    pub(crate) validate: Box<Validate>,
    pub(crate) frames: FrameCounter,
}

#[cfg(feature = "integration-tests")]
impl TestRender {
    pub fn new(
        tree: SceneTree,
        setup: impl Fn(&mut Context) + 'static,
        validate: impl Fn(
            &Context,
            &mut FrameCounter,
            &mut image::ImageBuffer<image::Rgba<u8>, wgpu::BufferView>,
        ) -> Result<ImageTestResult, anyhow::Error>
        + 'static,
    ) -> Self {
        Self {
            tree,
            setup: Box::new(setup),
            validate: Box::new(validate),
            frames: FrameCounter(0),
        }
    }
}

#[cfg(feature = "integration-tests")]
impl GraphicsFlow for TestRender {
    fn on_init(&mut self, ctx: &mut Context) {
        (self.setup)(ctx);
    }

    fn on_render(&self) -> SceneTree {
        self.tree.clone()
    }

    fn on_commit(&mut self) -> bool {
        false
    }

    fn render_to_texture(
        &mut self,
        ctx: &Context,
        texture: &mut image::ImageBuffer<image::Rgba<u8>, wgpu::BufferView>,
    ) -> Result<ImageTestResult, anyhow::Error> {
        let result = (self.validate)(ctx, &mut self.frames, texture);
        self.frames.progress();
        result
    }
}

#[macro_export]
macro_rules! golden_image_test {
    ($graphics_elem:expr) => {{
        use godray_stage::flow::GraphicsFlow;
        let g_flow: Box<dyn GraphicsFlow> = Box::new($graphics_elem);
        godray_stage::flow::run(g_flow).expect("Failed to run flow for integration test.");
    }};
}
