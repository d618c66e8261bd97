//! Floor, stadium wall and starfield. Built once, never change.

use std::sync::Arc;

use crate::{
    data_structures::{
        geometry::Geometry,
        material::{Material, ReflectorMaterial, Side},
        scene_graph::{NodeIds, NodeKind, SceneNode},
        stars::StarField,
        transform::Transform,
    },
    settings::{self, StarsSettings},
};

pub fn floor(ids: &mut NodeIds) -> SceneNode {
    let [x, y, z] = settings::FLOOR_POSITION;
    SceneNode::mesh(
        ids.next(),
        "floor",
        Geometry::Circle(settings::FLOOR_GEOMETRY),
        Material::Reflector(ReflectorMaterial {
            settings: settings::FLOOR_REFLECTOR,
            side: Side::Front,
        }),
    )
    .with_transform(Transform::at(x, y, z).rotated(settings::FLOOR_ROTATION_X, 0.0, 0.0))
}

pub fn stadium(ids: &mut NodeIds) -> SceneNode {
    let [x, y, z] = settings::STADIUM_POSITION;
    SceneNode::mesh(
        ids.next(),
        "stadium",
        Geometry::Cylinder(settings::STADIUM_GEOMETRY),
        Material::Reflector(ReflectorMaterial {
            settings: settings::STADIUM_REFLECTOR,
            side: Side::Back,
        }),
    )
    .with_transform(Transform::at(x, y, z))
}

pub fn stars(ids: &mut NodeIds, settings: &StarsSettings) -> SceneNode {
    SceneNode::new(
        ids.next(),
        "stars",
        NodeKind::Stars(Arc::new(StarField::generate(settings))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::InnerSpace;

    #[test]
    fn floor_lies_flat_below_the_origin() {
        let mut floor = floor(&mut NodeIds::new());
        floor.update_world_transform_all();

        let world = floor.get_world_transform();
        let up = world.rotation * cgmath::Vector3::unit_z();

        assert_eq!(world.position.y, -1.0);
        assert!((up - cgmath::Vector3::unit_y()).magnitude() < 1e-5);
    }

    #[test]
    fn reflectors_use_their_own_settings() {
        let mut ids = NodeIds::new();
        let (floor, stadium) = (floor(&mut ids), stadium(&mut ids));

        let reflector = |node: &SceneNode| match node.material().map(|m| &**m) {
            Some(Material::Reflector(r)) => r.clone(),
            other => panic!("expected a reflector, got {other:?}"),
        };

        assert_eq!(reflector(&floor).settings.blur, [300.0, 50.0]);
        assert_eq!(reflector(&stadium).settings.blur, [300.0, 500.0]);
        assert_eq!(reflector(&stadium).side, Side::Back);
        assert_ne!(floor.id(), stadium.id());
    }
}
