//! Scene graph and hierarchical scene organization.
//!
//! A scene is a tree of [`SceneNode`]s. Each node has a local transform relative
//! to its parent and a cached world transform, and is either an empty group, a
//! mesh (geometry + material) or a starfield. Trees are plain data: they are
//! built once, composed into a frame description, and uploaded to the GPU by
//! [`crate::resources::gpu_scene`].

use std::{collections::HashSet, sync::Arc};

use log::warn;

use crate::data_structures::{
    geometry::Geometry,
    material::{Material, MaterialHandle},
    stars::StarField,
    transform::Transform,
};

/// Stable identity of a node inside one scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

/// Hands out unique [`NodeId`]s while a scene is being built.
#[derive(Debug, Default)]
pub struct NodeIds {
    next: u32,
}

impl NodeIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Group,
    Mesh {
        geometry: Geometry,
        material: Arc<Material>,
    },
    Stars(Arc<StarField>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneNode {
    id: NodeId,
    label: &'static str,
    kind: NodeKind,
    local: Transform,
    world: Transform,
    children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(id: NodeId, label: &'static str, kind: NodeKind) -> Self {
        Self {
            id,
            label,
            kind,
            local: Transform::default(),
            world: Transform::default(),
            children: Vec::new(),
        }
    }

    pub fn group(id: NodeId, label: &'static str) -> Self {
        Self::new(id, label, NodeKind::Group)
    }

    pub fn mesh(id: NodeId, label: &'static str, geometry: Geometry, material: Material) -> Self {
        Self::new(
            id,
            label,
            NodeKind::Mesh {
                geometry,
                material: Arc::new(material),
            },
        )
    }

    pub fn with_transform(mut self, local: Transform) -> Self {
        self.local = local;
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.add_child(child);
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// The material of a mesh node.
    pub fn material(&self) -> Option<&Arc<Material>> {
        match &self.kind {
            NodeKind::Mesh { material, .. } => Some(material),
            _ => None,
        }
    }

    /// A handle to this node's material, or `None` for groups and starfields.
    pub fn material_handle(&self) -> Option<MaterialHandle> {
        self.material()
            .map(|material| MaterialHandle::new(self.id, material.clone()))
    }

    pub fn add_child(&mut self, child: SceneNode) {
        self.children.push(child);
    }

    pub fn get_children(&self) -> &Vec<SceneNode> {
        &self.children
    }

    pub fn get_local_transform(&self) -> &Transform {
        &self.local
    }

    pub fn get_world_transform(&self) -> &Transform {
        &self.world
    }

    /// Recomputes world transforms of this node and all descendants from the
    /// parent's world transform.
    pub fn update_world_transforms(&mut self, parents_world_transform: &Transform) {
        self.world = parents_world_transform * &self.local;
        let world = self.world.clone();
        for child in self.children.iter_mut() {
            child.update_world_transforms(&world);
        }
    }

    /// Treats this node as a root.
    pub fn update_world_transform_all(&mut self) {
        self.update_world_transforms(&Transform::default());
    }

    /// Depth-first, parent before children.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a SceneNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    pub fn find(&self, id: NodeId) -> Option<&SceneNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Ids of `id` and everything below it. Empty, with a warning, when `id`
    /// is not part of this tree.
    pub fn subtree_ids(&self, id: NodeId) -> HashSet<NodeId> {
        let mut ids = HashSet::new();
        match self.find(id) {
            Some(node) => node.walk(&mut |n| {
                ids.insert(n.id);
            }),
            None => warn!(
                "Node {:?} is not part of the tree rooted at {:?} ({}).",
                id, self.id, self.label
            ),
        }
        ids
    }

    pub fn len(&self) -> usize {
        1 + self.children.iter().map(SceneNode::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::{
        geometry::CircleGeometry,
        material::{Color, PhongMaterial, Side},
    };

    fn disc(ids: &mut NodeIds) -> SceneNode {
        SceneNode::mesh(
            ids.next(),
            "disc",
            Geometry::Circle(CircleGeometry {
                radius: 1.0,
                segments: 8,
            }),
            Material::Phong(PhongMaterial {
                color: Color::BLACK,
                opacity: 1.0,
                transparent: false,
                side: Side::Front,
            }),
        )
    }

    #[test]
    fn world_transforms_accumulate_down_the_tree() {
        let mut ids = NodeIds::new();
        let leaf = disc(&mut ids).with_transform(Transform::at(0.0, 0.0, 1.0));
        let leaf_id = leaf.id();
        let mut root = SceneNode::group(ids.next(), "root")
            .with_transform(Transform::at(0.0, 1.5, 0.0))
            .with_child(SceneNode::group(ids.next(), "mid").with_child(leaf));

        root.update_world_transform_all();

        let world = root.find(leaf_id).unwrap().get_world_transform();
        assert_eq!(world.position, cgmath::Vector3::new(0.0, 1.5, 1.0));
    }

    #[test]
    fn subtree_ids_cover_descendants_only() {
        let mut ids = NodeIds::new();
        let inner = SceneNode::group(ids.next(), "inner").with_child(disc(&mut ids));
        let inner_id = inner.id();
        let root = SceneNode::group(ids.next(), "root")
            .with_child(inner)
            .with_child(disc(&mut ids));

        let subtree = root.subtree_ids(inner_id);

        assert_eq!(subtree.len(), 2);
        assert!(subtree.contains(&inner_id));
        assert_eq!(root.len(), 4);
        assert!(root.subtree_ids(NodeId::new(99)).is_empty());
    }

    #[test]
    fn material_handle_shares_the_node_material() {
        let mut ids = NodeIds::new();
        let node = disc(&mut ids);

        let handle = node.material_handle().unwrap();

        assert_eq!(handle.node(), node.id());
        assert!(handle.refers_to(node.material().unwrap()));
        assert!(SceneNode::group(ids.next(), "g").material_handle().is_none());
    }
}
