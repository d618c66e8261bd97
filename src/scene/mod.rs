//! Declarative scene composition.
//!
//! The scene is built top-down by [`SceneRoot`]. After the first commit the
//! [`Emitter`] reports its surface material to the [`Screen`], which from then
//! on mounts the post-processing chain with that material as the light source.

pub mod emitter;
pub mod post_processing;
pub mod root;
pub mod screen;
pub mod static_geometry;

pub use emitter::Emitter;
pub use post_processing::{Bloom, Effect, EffectComposer, GodRays};
pub use root::{SceneRoot, SceneTree};
pub use screen::{Screen, ScreenView};
