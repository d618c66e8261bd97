//! GPU mirror of a composed [`SceneTree`].
//!
//! Nodes are keyed by [`NodeId`] so that composing the same tree again only
//! refreshes transforms; meshes, uniforms and bind groups are created once per
//! node and material.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use cgmath::{EuclideanSpace, Point3, Vector3};
use log::{debug, info};
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        geometry::Geometry,
        material::Material,
        model::Mesh,
        scene_graph::{NodeId, NodeKind, SceneNode},
        stars::StarField,
        texture::Texture,
        transform::Transform,
    },
    pipelines::{Pipelines, reflection::ReflectionPass, stars::StarUniform},
    render::{Draw, Render, StarDraw},
    resources::texture::{MaterialUniform, VideoTexture, material_bind_group},
    scene::root::SceneTree,
    video::VideoFeed,
};

/// What a material samples besides its uniform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Source {
    Blank,
    Video(usize),
    Reflection(usize),
}

#[derive(Debug)]
struct GpuNode {
    geometry: Geometry,
    material: Arc<Material>,
    mesh: Mesh,
    uniform: wgpu::Buffer,
    transform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    source: Source,
    position: Point3<f32>,
}

#[derive(Debug)]
struct GpuStars {
    field: Arc<StarField>,
    instances: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

#[derive(Debug)]
pub struct GpuScene {
    /// Node ids in tree order.
    order: Vec<NodeId>,
    nodes: HashMap<NodeId, GpuNode>,
    stars: HashMap<NodeId, GpuStars>,
    videos: Vec<VideoTexture>,
    reflection: Option<ReflectionPass>,
    blank: Texture,
    sampler: wgpu::Sampler,
    sun: Option<NodeId>,
}

impl GpuScene {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self {
            order: Vec::new(),
            nodes: HashMap::new(),
            stars: HashMap::new(),
            videos: Vec::new(),
            reflection: None,
            blank: Texture::solid(device, queue, [0, 0, 0, 255], "blank map"),
            sampler: crate::data_structures::texture::create_default_sampler(device),
            sun: None,
        }
    }

    /// Brings GPU resources in line with `tree`. Nodes that kept their id,
    /// geometry and material allocation are reused; transforms and the light
    /// mask are always rewritten.
    pub fn sync(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipelines: &Pipelines,
        tree: &SceneTree,
    ) {
        let sun = tree.post_processing.as_ref().map(|composer| composer.sun().node());
        if sun != self.sun {
            info!("Light source changed to {:?}", sun);
            self.sun = sun;
        }
        let lit: HashSet<NodeId> = match sun {
            Some(sun) => tree.root.subtree_ids(sun),
            None => HashSet::new(),
        };

        let mut old_nodes = std::mem::take(&mut self.nodes);
        let mut old_stars = std::mem::take(&mut self.stars);
        let mut order = Vec::new();

        let mut visit = |node: &SceneNode| {
            let id = node.id();
            let light_mask = if lit.contains(&id) { 1.0 } else { 0.0 };
            match node.kind() {
                NodeKind::Group => {}
                NodeKind::Mesh { geometry, material } => {
                    let gpu = match old_nodes.remove(&id) {
                        Some(gpu) if gpu.geometry == *geometry && Arc::ptr_eq(&gpu.material, material) => gpu,
                        _ => self.upload_node(device, queue, pipelines, node, *geometry, material.clone()),
                    };
                    write_transform(queue, &gpu.transform, node.get_world_transform(), light_mask);
                    let position = Point3::from_vec(node.get_world_transform().position);
                    self.nodes.insert(id, GpuNode { position, ..gpu });
                    order.push(id);
                }
                NodeKind::Stars(field) => {
                    let gpu = match old_stars.remove(&id) {
                        Some(gpu) if Arc::ptr_eq(&gpu.field, field) => gpu,
                        _ => upload_stars(device, pipelines, field.clone()),
                    };
                    self.stars.insert(id, gpu);
                    order.push(id);
                }
            }
        };
        tree.root.walk(&mut visit);

        for id in old_nodes.keys().chain(old_stars.keys()) {
            debug!("Dropping GPU resources of {:?}", id);
        }
        self.order = order;
    }

    fn upload_node(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipelines: &Pipelines,
        node: &SceneNode,
        geometry: Geometry,
        material: Arc<Material>,
    ) -> GpuNode {
        debug!("Uploading {} ({:?})", node.label(), node.id());
        let mesh = Mesh::from_data(device, node.label(), &geometry.build());
        let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Material", node.label())),
            contents: bytemuck::cast_slice(&[MaterialUniform::from_material(&material)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let transform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Transform", node.label())),
            contents: bytemuck::cast_slice(&[node.get_world_transform().to_raw(0.0)]),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        let source = match material.as_ref() {
            Material::Basic(basic) => match &basic.map {
                Some(feed) => Source::Video(self.video_index(device, queue, feed)),
                None => Source::Blank,
            },
            Material::Phong(_) => Source::Blank,
            Material::Reflector(reflector) => {
                let settings = &reflector.settings;
                let reflection = self
                    .reflection
                    .get_or_insert_with(|| ReflectionPass::new(device, settings.resolution));
                Source::Reflection(reflection.add_chain(device, settings.blur))
            }
        };
        let bind_group = self.bind_group(device, pipelines, &uniform, source, node.label());

        GpuNode {
            geometry,
            material,
            mesh,
            uniform,
            transform,
            bind_group,
            source,
            position: Point3::origin(),
        }
    }

    fn video_index(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, feed: &VideoFeed) -> usize {
        if let Some(index) = self.videos.iter().position(|video| video.feed() == feed) {
            return index;
        }
        self.videos.push(VideoTexture::new(device, queue, feed.clone()));
        self.videos.len() - 1
    }

    fn bind_group(
        &self,
        device: &wgpu::Device,
        pipelines: &Pipelines,
        uniform: &wgpu::Buffer,
        source: Source,
        label: &str,
    ) -> wgpu::BindGroup {
        let blank = &self.blank.view;
        let (map, blurred) = match source {
            Source::Blank => (blank, blank),
            Source::Video(index) => (&self.videos[index].texture().view, blank),
            Source::Reflection(chain) => match &self.reflection {
                Some(reflection) => (
                    &reflection.mirror().view,
                    reflection.blurred(chain).map_or(blank, |t| &t.view),
                ),
                None => (blank, blank),
            },
        };
        material_bind_group(
            device,
            &pipelines.material_layout,
            uniform,
            map,
            blurred,
            &self.sampler,
            label,
        )
    }

    /// Uploads new video frames. Bind groups of nodes showing a video whose
    /// texture had to be re-created are rebuilt.
    pub fn update_videos(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, pipelines: &Pipelines) {
        let recreated: Vec<usize> = self
            .videos
            .iter_mut()
            .enumerate()
            .filter_map(|(index, video)| video.update(device, queue).then_some(index))
            .collect();
        if recreated.is_empty() {
            return;
        }

        let ids: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, node)| matches!(node.source, Source::Video(i) if recreated.contains(&i)))
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            let bind_group = self.bind_group(device, pipelines, &node.uniform, node.source, &node.mesh.name);
            if let Some(node) = self.nodes.get_mut(&id) {
                node.bind_group = bind_group;
            }
        }
    }

    pub fn reflection(&self) -> Option<&ReflectionPass> {
        self.reflection.as_ref()
    }

    /// Everything to draw, in tree order.
    pub fn renders(&self) -> Render<'_> {
        let renders = self
            .order
            .iter()
            .map(|id| {
                if let Some(node) = self.nodes.get(id) {
                    let draw = Draw {
                        mesh: &node.mesh,
                        transform: &node.transform,
                        bind_group: &node.bind_group,
                        material: &node.material,
                        position: node.position,
                    };
                    match node.material.as_ref() {
                        Material::Reflector(_) => Render::Reflective(draw),
                        m if m.is_transparent() => Render::Transparent(draw),
                        _ => Render::Opaque(draw),
                    }
                } else if let Some(stars) = self.stars.get(id) {
                    Render::Stars(StarDraw {
                        instances: &stars.instances,
                        count: stars.field.stars.len() as u32,
                        bind_group: &stars.bind_group,
                    })
                } else {
                    Render::None
                }
            })
            .collect();
        Render::Composed(renders)
    }
}

/// World position of `id` in `tree`, if it is part of it.
pub fn world_position(tree: &SceneTree, id: NodeId) -> Option<Vector3<f32>> {
    tree.root.find(id).map(|node| node.get_world_transform().position)
}

fn write_transform(queue: &wgpu::Queue, buffer: &wgpu::Buffer, world: &Transform, light_mask: f32) {
    queue.write_buffer(buffer, 0, bytemuck::cast_slice(&[world.to_raw(light_mask)]));
}

fn upload_stars(device: &wgpu::Device, pipelines: &Pipelines, field: Arc<StarField>) -> GpuStars {
    debug!("Uploading {} stars", field.stars.len());
    let instances = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Star Instances"),
        contents: bytemuck::cast_slice(&field.stars),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Star Params"),
        contents: bytemuck::cast_slice(&[StarUniform::new(field.speed, field.fade)]),
        usage: wgpu::BufferUsages::UNIFORM,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: &pipelines.stars_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform.as_entire_binding(),
        }],
        label: Some("stars_bind_group"),
    });
    GpuStars {
        field,
        instances,
        bind_group,
    }
}
