//! Surface materials and the handle used to reference one from outside the
//! node that owns it.

use std::sync::Arc;

use crate::{data_structures::scene_graph::NodeId, settings::ReflectorSettings, video::VideoFeed};

/// An sRGB colour with 8 bits per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::hex(0x000000);
    pub const WHITE: Color = Color::hex(0xffffff);

    /// `Color::hex(0x050505)` is the colour written `#050505`.
    pub const fn hex(rgb: u32) -> Self {
        Self {
            r: ((rgb >> 16) & 0xff) as u8,
            g: ((rgb >> 8) & 0xff) as u8,
            b: (rgb & 0xff) as u8,
        }
    }

    /// Linear-light channels in `0.0..=1.0`.
    pub fn to_linear(self) -> [f32; 3] {
        let decode = |c: u8| {
            let c = c as f32 / 255.0;
            if c <= 0.04045 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        };
        [decode(self.r), decode(self.g), decode(self.b)]
    }

    pub fn to_wgpu(self) -> wgpu::Color {
        let [r, g, b] = self.to_linear();
        wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: 1.0,
        }
    }
}

/// Which faces of a surface are rasterised.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Front,
    Back,
    Double,
}

impl Side {
    pub fn cull_mode(self) -> Option<wgpu::Face> {
        match self {
            Side::Front => Some(wgpu::Face::Back),
            Side::Back => Some(wgpu::Face::Front),
            Side::Double => None,
        }
    }
}

/// Unlit surface, optionally textured by a live video feed.
#[derive(Clone, Debug, PartialEq)]
pub struct BasicMaterial {
    pub color: Color,
    pub map: Option<VideoFeed>,
    pub side: Side,
}

/// Ambient-lit surface with optional alpha blending.
#[derive(Clone, Debug, PartialEq)]
pub struct PhongMaterial {
    pub color: Color,
    pub opacity: f32,
    pub transparent: bool,
    pub side: Side,
}

/// Blurred planar reflection mixed into a standard surface.
#[derive(Clone, Debug, PartialEq)]
pub struct ReflectorMaterial {
    pub settings: ReflectorSettings,
    pub side: Side,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Material {
    Basic(BasicMaterial),
    Phong(PhongMaterial),
    Reflector(ReflectorMaterial),
}

impl Material {
    pub fn side(&self) -> Side {
        match self {
            Material::Basic(m) => m.side,
            Material::Phong(m) => m.side,
            Material::Reflector(m) => m.side,
        }
    }

    pub fn is_transparent(&self) -> bool {
        matches!(self, Material::Phong(PhongMaterial { transparent: true, .. }))
    }
}

/// A read-only reference to a node's material.
///
/// Two handles are equal only when they point at the same node and the same
/// material allocation; a structurally equal copy is a different material.
#[derive(Clone, Debug)]
pub struct MaterialHandle {
    node: NodeId,
    material: Arc<Material>,
}

impl MaterialHandle {
    pub(crate) fn new(node: NodeId, material: Arc<Material>) -> Self {
        Self { node, material }
    }

    /// The node whose subtree is lit by this material.
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    /// Whether `material` is the very allocation this handle refers to.
    pub fn refers_to(&self, material: &Arc<Material>) -> bool {
        Arc::ptr_eq(&self.material, material)
    }
}

impl PartialEq for MaterialHandle {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && Arc::ptr_eq(&self.material, &other.material)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_splits_channels() {
        assert_eq!(
            Color::hex(0x202122),
            Color {
                r: 0x20,
                g: 0x21,
                b: 0x22
            }
        );
    }

    #[test]
    fn background_is_nearly_black_in_linear_light() {
        let [r, g, b] = Color::hex(0x050505).to_linear();
        assert!(r > 0.0 && r < 0.002);
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert!(Color::WHITE.to_linear().iter().all(|c| (c - 1.0).abs() < 1e-5));
    }

    #[test]
    fn handles_compare_by_identity() {
        let material = Arc::new(Material::Phong(PhongMaterial {
            color: Color::BLACK,
            opacity: 1.0,
            transparent: false,
            side: Side::Front,
        }));
        let copy = Arc::new((*material).clone());
        let node = NodeId::new(3);

        assert_eq!(
            MaterialHandle::new(node, material.clone()),
            MaterialHandle::new(node, material.clone())
        );
        assert_ne!(
            MaterialHandle::new(node, material.clone()),
            MaterialHandle::new(node, copy)
        );
    }
}
