//! The emitter's parent, which gates post-processing on the emitter's report.

use log::info;

use crate::{
    data_structures::{
        material::MaterialHandle,
        scene_graph::{NodeId, NodeIds, SceneNode},
    },
    scene::{emitter::Emitter, post_processing::EffectComposer},
    signal::{Availability, Subscription, report_channel},
    video::FrameSource,
};

/// What the screen contributes to a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ScreenView {
    pub node: SceneNode,
    pub post_processing: Option<EffectComposer>,
}

#[derive(Debug)]
pub struct Screen {
    id: NodeId,
    emitter: Emitter,
    material: Subscription<MaterialHandle>,
}

impl Screen {
    pub fn new(ids: &mut NodeIds, video: Box<dyn FrameSource>) -> Self {
        let id = ids.next();
        let (reporter, material) = report_channel();
        let emitter = Emitter::new(ids, video, reporter);
        Self {
            id,
            emitter,
            material,
        }
    }

    /// Mounts the emitter and picks up its report. Returns `true` on the
    /// commit that gated post-processing in.
    pub fn on_mounted(&mut self) -> bool {
        self.emitter.on_mounted();
        let ready = self.material.poll();
        if ready {
            info!("Emitter material received, post-processing enabled.");
        }
        ready
    }

    pub fn material(&self) -> &Availability<MaterialHandle> {
        self.material.availability()
    }

    pub fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    pub fn compose(&self) -> ScreenView {
        let node = SceneNode::group(self.id, "screen").with_child(self.emitter.node().clone());
        let post_processing = match self.material.availability() {
            Availability::Unready => None,
            Availability::Ready(handle) => Some(EffectComposer::new(handle.clone())),
        };
        ScreenView {
            node,
            post_processing,
        }
    }
}
