//! The scene root: camera, lighting, background and every top-level piece.

use crate::{
    data_structures::{
        material::Color,
        scene_graph::{NodeId, NodeIds, SceneNode},
    },
    flow::GraphicsFlow,
    scene::{post_processing::EffectComposer, screen::Screen, static_geometry},
    settings::{self, AmbientLight, CameraSettings},
    video::{FfmpegVideo, FrameSource},
};

/// Everything needed to draw one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneTree {
    pub camera: CameraSettings,
    pub ambient: AmbientLight,
    pub background: Color,
    pub antialias: bool,
    pub root: SceneNode,
    pub post_processing: Option<EffectComposer>,
}

#[derive(Debug)]
pub struct SceneRoot {
    id: NodeId,
    screen: Screen,
    floor: SceneNode,
    stars: SceneNode,
    stadium: SceneNode,
}

impl SceneRoot {
    pub fn new(video: Box<dyn FrameSource>) -> Self {
        let mut ids = NodeIds::new();
        let id = ids.next();
        let screen = Screen::new(&mut ids, video);
        let floor = static_geometry::floor(&mut ids);
        let stars = static_geometry::stars(&mut ids, &settings::STARS);
        let stadium = static_geometry::stadium(&mut ids);
        Self {
            id,
            screen,
            floor,
            stars,
            stadium,
        }
    }

    /// The scene with the bundled `10.mp4` decoded by ffmpeg.
    pub fn with_default_video() -> Self {
        Self::new(Box::new(FfmpegVideo::new(settings::EMITTER_VIDEO)))
    }

    /// Called after a frame has been presented. Returns `true` when the tree
    /// changed shape and should be composed again.
    pub fn commit(&mut self) -> bool {
        self.screen.on_mounted()
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    /// Builds the frame description. Pure: composing twice without a commit
    /// in between yields equal trees.
    pub fn compose(&self) -> SceneTree {
        let screen = self.screen.compose();
        let mut root = SceneNode::group(self.id, "scene")
            .with_child(screen.node)
            .with_child(self.floor.clone())
            .with_child(self.stars.clone())
            .with_child(self.stadium.clone());
        root.update_world_transform_all();

        SceneTree {
            camera: settings::CAMERA,
            ambient: settings::AMBIENT,
            background: settings::BACKGROUND,
            antialias: settings::ANTIALIAS,
            root,
            post_processing: screen.post_processing,
        }
    }
}

impl GraphicsFlow for SceneRoot {
    fn on_render(&self) -> SceneTree {
        self.compose()
    }

    fn on_commit(&mut self) -> bool {
        self.commit()
    }
}
