//! Render composition and pipeline batching.
//!
//! The GPU scene describes what it wants drawn as a [`Render`] tree. The frame
//! loop flattens that into [`Batches`], one list per pipeline family, makes
//! sure every pipeline a batch needs exists, and then records the main and the
//! mirrored pass from them.
//!
//! # Key types
//!
//! - [`Render<'a>`] is the enum describing render operations
//! - [`Draw<'a>`] is one mesh with its material bind group and transform
//! - [`StarDraw<'a>`] is one instanced starfield

use cgmath::{MetricSpace, Point3};
use wgpu::RenderPass;

use crate::{
    data_structures::{
        material::Material,
        model::{DrawMesh, Mesh},
    },
    pipelines::{PipelineKey, Pipelines},
};

/// A mesh, its world transform buffer and its material bind group.
pub struct Draw<'a> {
    pub mesh: &'a Mesh,
    pub transform: &'a wgpu::Buffer,
    pub bind_group: &'a wgpu::BindGroup,
    pub material: &'a Material,
    /// World position, used to sort transparent draws.
    pub position: Point3<f32>,
}

impl Draw<'_> {
    fn key(&self, mirrored: bool, sample_count: u32) -> PipelineKey {
        PipelineKey::for_material(self.material, mirrored, sample_count)
    }
}

pub struct StarDraw<'a> {
    pub instances: &'a wgpu::Buffer,
    pub count: u32,
    pub bind_group: &'a wgpu::BindGroup,
}

/// Specifies how a scene object should be rendered.
///
/// # Variants
///
/// - `None` renders nothing
/// - `Opaque(Draw)` renders a depth-writing mesh
/// - `Transparent(Draw)` renders an alpha-blended mesh after everything else
/// - `Reflective(Draw)` renders a reflector; it is left out of the mirror pass
/// - `Stars(StarDraw)` renders an additive starfield
/// - `Composed(Vec<Render>)` recursively renders composition of multiple renders
pub enum Render<'a> {
    None,
    Opaque(Draw<'a>),
    Transparent(Draw<'a>),
    Reflective(Draw<'a>),
    Stars(StarDraw<'a>),
    Composed(Vec<Render<'a>>),
}

impl<'a> Render<'a> {
    pub(crate) fn set_pipelines(self, batches: &mut Batches<'a>) {
        match self {
            Render::None => (),
            Render::Opaque(draw) => batches.opaque.push(draw),
            Render::Transparent(draw) => batches.transparent.push(draw),
            Render::Reflective(draw) => batches.reflective.push(draw),
            Render::Stars(stars) => batches.stars.push(stars),
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.set_pipelines(batches)),
        }
    }
}

#[derive(Default)]
pub struct Batches<'a> {
    pub opaque: Vec<Draw<'a>>,
    pub transparent: Vec<Draw<'a>>,
    pub reflective: Vec<Draw<'a>>,
    pub stars: Vec<StarDraw<'a>>,
}

impl<'a> Batches<'a> {
    pub fn new(render: Render<'a>, eye: Point3<f32>) -> Self {
        let mut batches = Self::default();
        render.set_pipelines(&mut batches);
        batches.sort_transparent(eye);
        batches
    }

    /// Farthest first, so nearer surfaces blend over farther ones.
    pub fn sort_transparent(&mut self, eye: Point3<f32>) {
        self.transparent.sort_by(|a, b| {
            let da = eye.distance2(a.position);
            let db = eye.distance2(b.position);
            db.total_cmp(&da)
        });
    }

    /// Creates every pipeline the main pass and, with `mirror`, the reflection
    /// pass will ask for.
    pub fn prepare(
        &self,
        device: &wgpu::Device,
        pipelines: &mut Pipelines,
        sample_count: u32,
        mirror: bool,
    ) {
        let main = self.opaque.iter().chain(&self.reflective).chain(&self.transparent);
        for draw in main {
            pipelines.prepare(device, draw.key(false, sample_count));
        }
        if !self.stars.is_empty() {
            pipelines.prepare_stars(device, false, sample_count);
        }
        if mirror {
            for draw in self.opaque.iter().chain(&self.transparent) {
                pipelines.prepare(device, draw.key(true, 1));
            }
            if !self.stars.is_empty() {
                pipelines.prepare_stars(device, true, 1);
            }
        }
    }

    /// Opaque meshes, reflectors, stars, then transparent meshes.
    pub fn draw_main(
        &self,
        render_pass: &mut RenderPass<'_>,
        pipelines: &Pipelines,
        camera: &wgpu::BindGroup,
        sample_count: u32,
    ) {
        render_pass.set_bind_group(0, camera, &[]);
        for draw in self.opaque.iter().chain(&self.reflective) {
            draw_mesh(render_pass, pipelines, draw, false, sample_count);
        }
        if let Some(pipeline) = pipelines.stars(false, sample_count) {
            render_pass.set_pipeline(pipeline);
            self.draw_stars(render_pass);
        }
        for draw in &self.transparent {
            draw_mesh(render_pass, pipelines, draw, false, sample_count);
        }
    }

    /// Everything except reflectors, seen from below the floor.
    pub fn draw_mirrored(
        &self,
        render_pass: &mut RenderPass<'_>,
        pipelines: &Pipelines,
        mirror_camera: &wgpu::BindGroup,
    ) {
        render_pass.set_bind_group(0, mirror_camera, &[]);
        for draw in &self.opaque {
            draw_mesh(render_pass, pipelines, draw, true, 1);
        }
        if let Some(pipeline) = pipelines.stars(true, 1) {
            render_pass.set_pipeline(pipeline);
            self.draw_stars(render_pass);
        }
        for draw in &self.transparent {
            draw_mesh(render_pass, pipelines, draw, true, 1);
        }
    }

    fn draw_stars(&self, render_pass: &mut RenderPass<'_>) {
        for stars in &self.stars {
            render_pass.set_bind_group(1, stars.bind_group, &[]);
            render_pass.set_vertex_buffer(0, stars.instances.slice(..));
            render_pass.draw(0..4, 0..stars.count);
        }
    }
}

fn draw_mesh(
    render_pass: &mut RenderPass<'_>,
    pipelines: &Pipelines,
    draw: &Draw<'_>,
    mirrored: bool,
    sample_count: u32,
) {
    let key = draw.key(mirrored, sample_count);
    let Some(pipeline) = pipelines.get(&key) else {
        log::warn!("No pipeline prepared for {:?}, skipping {}", key, draw.mesh.name);
        return;
    };
    render_pass.set_pipeline(pipeline);
    render_pass.set_bind_group(1, draw.bind_group, &[]);
    render_pass.draw_mesh(draw.mesh, draw.transform);
}
