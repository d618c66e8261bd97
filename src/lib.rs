//! godray-stage
//!
//! A small native renderer for one decorative scene: a video-textured
//! cylinder floating above a reflective floor, surrounded by a stadium wall
//! and a starfield. Once the video surface is mounted it becomes the light
//! source of a god-ray and bloom post-processing chain.
//!
//! High-level modules
//! - `camera`: camera, projection, orbit controls and camera uniforms
//! - `context`: central GPU and window context that owns device/queue/pipelines
//! - `data_structures`: scene graph, geometry, materials, textures, transforms
//! - `flow`: the event loop and the trait a scene implements to be driven by it
//! - `pipelines`: scene, star, reflection and post-processing pipelines
//! - `render`: batching of draws per pipeline
//! - `resources`: asset lookup and the GPU mirror of a composed scene
//! - `scene`: the declarative scene components
//! - `settings`: compiled-in tunables
//! - `signal`: one-shot child-to-parent reporting
//! - `video`: decoding the emitter's video into frames
//!

pub mod camera;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;
pub mod settings;
pub mod signal;
pub mod video;

// Re-exports commonly used types for convenience in downstream code.
pub use scene::{SceneRoot, SceneTree};
pub use winit::event::WindowEvent;
