//! The video screen that acts as the god-ray light source.

use std::{fmt::Debug, sync::Arc};

use log::{info, warn};

use crate::{
    data_structures::{
        geometry::Geometry,
        material::{BasicMaterial, Color, Material, MaterialHandle, PhongMaterial, Side},
        scene_graph::{NodeId, NodeIds, NodeKind, SceneNode},
        transform::Transform,
    },
    settings::{self, CapSettings},
    signal::Reporter,
    video::FrameSource,
};

/// A double-sided, video-textured open cylinder with two dark caps.
///
/// The emitter owns its video for its whole lifetime. On the first mount it
/// starts playback and reports its surface material to whoever constructed it.
pub struct Emitter {
    node: SceneNode,
    surface: MaterialHandle,
    video: Box<dyn FrameSource>,
    reporter: Option<Reporter<MaterialHandle>>,
}

impl Emitter {
    pub fn new(
        ids: &mut NodeIds,
        video: Box<dyn FrameSource>,
        reporter: Reporter<MaterialHandle>,
    ) -> Self {
        let root_id = ids.next();
        let surface_id = ids.next();
        let material = Arc::new(Material::Basic(BasicMaterial {
            color: Color::WHITE,
            map: Some(video.feed()),
            side: Side::Double,
        }));
        let surface = MaterialHandle::new(surface_id, material.clone());
        let surface_node = SceneNode::new(
            surface_id,
            "emitter surface",
            NodeKind::Mesh {
                geometry: Geometry::Cylinder(settings::EMITTER_SURFACE),
                material,
            },
        );

        let caps = SceneNode::group(ids.next(), "emitter caps")
            .with_transform(Transform::new().rotated(settings::EMITTER_CAPS_ROTATION_X, 0.0, 0.0))
            .with_child(cap(ids, "front cap", &settings::FRONT_CAP, Side::Front))
            .with_child(cap(ids, "back cap", &settings::BACK_CAP, Side::Back));

        let [x, y, z] = settings::EMITTER_POSITION;
        let node = SceneNode::group(root_id, "emitter")
            .with_transform(Transform::at(x, y, z))
            .with_child(surface_node)
            .with_child(caps);

        Self {
            node,
            surface,
            video,
            reporter: Some(reporter),
        }
    }

    /// Starts playback and reports the surface material. Only the first call
    /// has any effect.
    pub fn on_mounted(&mut self) {
        let Some(reporter) = self.reporter.take() else {
            return;
        };
        if let Err(e) = self.video.play() {
            warn!("Emitter video could not start, the screen stays blank: {e}");
        }
        reporter.publish(self.surface.clone());
        info!("Emitter mounted.");
    }

    pub fn node(&self) -> &SceneNode {
        &self.node
    }

    pub fn surface(&self) -> NodeId {
        self.surface.node()
    }

    pub fn is_mounted(&self) -> bool {
        self.reporter.is_none()
    }
}

impl Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("node", &self.node.id())
            .field("surface", &self.surface.node())
            .field("mounted", &self.is_mounted())
            .finish()
    }
}

fn cap(ids: &mut NodeIds, label: &'static str, settings: &CapSettings, side: Side) -> SceneNode {
    SceneNode::mesh(
        ids.next(),
        label,
        Geometry::Circle(settings.geometry),
        Material::Phong(PhongMaterial {
            color: settings.color,
            opacity: settings.opacity,
            transparent: true,
            side,
        }),
    )
    .with_transform(Transform::at(0.0, 0.0, settings.z))
}

#[cfg(test)]
mod tests {
    use cgmath::{InnerSpace, Vector3};

    use super::*;
    use crate::{
        signal::report_channel,
        video::{VideoFeed, VideoResult},
    };

    struct Still(VideoFeed);

    impl FrameSource for Still {
        fn play(&mut self) -> VideoResult<()> {
            Ok(())
        }

        fn feed(&self) -> VideoFeed {
            self.0.clone()
        }
    }

    fn emitter(feed: &VideoFeed) -> Emitter {
        let (reporter, _subscription) = report_channel();
        Emitter::new(&mut NodeIds::new(), Box::new(Still(feed.clone())), reporter)
    }

    fn phong(node: &SceneNode) -> &PhongMaterial {
        match node.material().map(|m| &**m) {
            Some(Material::Phong(phong)) => phong,
            other => panic!("expected a phong cap, got {other:?}"),
        }
    }

    #[test]
    fn surface_shows_the_video_on_both_sides() {
        let feed = VideoFeed::new();
        let emitter = emitter(&feed);

        let root = emitter.node();
        assert_eq!(root.get_local_transform().position, Vector3::new(0.0, 1.5, 0.0));

        let surface = &root.get_children()[0];
        assert_eq!(surface.id(), emitter.surface());
        match surface.material().map(|m| &**m) {
            Some(Material::Basic(basic)) => {
                assert_eq!(basic.side, Side::Double);
                assert_eq!(basic.map.as_ref(), Some(&feed));
            }
            other => panic!("expected a basic surface, got {other:?}"),
        }
    }

    #[test]
    fn caps_close_the_cylinder() {
        let emitter = emitter(&VideoFeed::new());
        let caps = &emitter.node().get_children()[1];

        // Rotated -π/2 about X, so the caps' +z points down the world y axis.
        let axis = caps.get_local_transform().rotation * Vector3::unit_z();
        assert!((axis - Vector3::unit_y()).magnitude() < 1e-5);

        let [front, back] = &caps.get_children()[..] else {
            panic!("expected two caps");
        };
        assert_eq!(front.get_local_transform().position.z, 1.0);
        assert_eq!(back.get_local_transform().position.z, -1.0);

        let (front, back) = (phong(front), phong(back));
        assert_eq!(front.side, Side::Front);
        assert_eq!(back.side, Side::Back);
        assert_eq!(front.opacity, 0.995);
        assert!(front.transparent && back.transparent);
    }
}
