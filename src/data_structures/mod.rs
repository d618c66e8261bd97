//! Engine data structures: geometry, materials, textures and the scene graph.
//!
//! This module contains the core data types for scene representation:
//!
//! - `geometry` generates circle and cylinder meshes on the CPU
//! - `material` holds surface descriptions and the material handle
//! - `model` contains vertex formats and uploaded GPU meshes
//! - `scene_graph` enables hierarchical scene organization
//! - `stars` generates the starfield points
//! - `texture` contains GPU texture wrapper and creation utilities
//! - `transform` holds per-node transformation data

pub mod geometry;
pub mod material;
pub mod model;
pub mod scene_graph;
pub mod stars;
pub mod texture;
pub mod transform;
