//! Compiled-in scene tunables.
//!
//! Everything the scene needs to know about look and feel lives here as typed
//! constants; there is no runtime configuration surface.

use std::f32::consts::FRAC_PI_2;

use crate::data_structures::{
    geometry::{CircleGeometry, CylinderGeometry},
    material::Color,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraSettings {
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
}

pub const CAMERA: CameraSettings = CameraSettings {
    position: [0.0, 7.0, 10.0],
    target: [0.0, 0.0, 0.0],
    fov_deg: 35.0,
    near: 1.0,
    far: 120.0,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AmbientLight {
    pub color: Color,
    pub intensity: f32,
}

pub const AMBIENT: AmbientLight = AmbientLight {
    color: Color::WHITE,
    intensity: 1.0,
};

pub const BACKGROUND: Color = Color::hex(0x050505);

/// Whether the window surface itself is anti-aliased. Post-processing brings
/// its own multisampling.
pub const ANTIALIAS: bool = false;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReflectorSettings {
    /// Horizontal and vertical blur extent in reflection-texture pixels.
    pub blur: [f32; 2],
    pub resolution: u32,
    pub mix_blur: f32,
    pub mix_strength: f32,
    pub roughness: f32,
    pub depth_scale: f32,
    pub min_depth_threshold: f32,
    pub max_depth_threshold: f32,
    pub color: Color,
    pub metalness: f32,
}

pub const FLOOR_REFLECTOR: ReflectorSettings = ReflectorSettings {
    blur: [300.0, 50.0],
    resolution: 1024,
    mix_blur: 1.0,
    mix_strength: 300.0,
    roughness: 1.0,
    depth_scale: 1.2,
    min_depth_threshold: 0.4,
    max_depth_threshold: 1.4,
    color: Color::hex(0x202020),
    metalness: 0.8,
};

pub const STADIUM_REFLECTOR: ReflectorSettings = ReflectorSettings {
    blur: [300.0, 500.0],
    mix_blur: 133.0,
    mix_strength: 100.0,
    metalness: 3.0,
    ..FLOOR_REFLECTOR
};

pub const FLOOR_GEOMETRY: CircleGeometry = CircleGeometry {
    radius: 6.0,
    segments: 50,
};
pub const FLOOR_POSITION: [f32; 3] = [0.0, -1.0, 0.0];
pub const FLOOR_ROTATION_X: f32 = -FRAC_PI_2;

pub const STADIUM_GEOMETRY: CylinderGeometry = CylinderGeometry {
    radius_top: 10.0,
    radius_bottom: 6.0,
    height: 3.0,
    radial_segments: 16,
    height_segments: 1,
    open_ended: true,
};
pub const STADIUM_POSITION: [f32; 3] = [0.0, 0.5, 0.0];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StarsSettings {
    pub radius: f32,
    pub depth: f32,
    pub count: u32,
    pub factor: f32,
    pub saturation: f32,
    pub fade: bool,
    pub speed: f32,
    pub seed: u64,
}

pub const STARS: StarsSettings = StarsSettings {
    radius: 100.0,
    depth: 50.0,
    count: 5000,
    factor: 4.0,
    saturation: 0.0,
    fade: false,
    speed: 1.0,
    seed: 0x5741_5253,
};

pub const EMITTER_POSITION: [f32; 3] = [0.0, 1.5, 0.0];

pub const EMITTER_SURFACE: CylinderGeometry = CylinderGeometry {
    radius_top: 3.0,
    radius_bottom: 1.5,
    height: 2.0,
    radial_segments: 16,
    height_segments: 1,
    open_ended: true,
};

pub const EMITTER_CAPS_ROTATION_X: f32 = -FRAC_PI_2;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CapSettings {
    pub geometry: CircleGeometry,
    pub z: f32,
    pub color: Color,
    pub opacity: f32,
}

pub const FRONT_CAP: CapSettings = CapSettings {
    geometry: CircleGeometry {
        radius: 3.0,
        segments: 16,
    },
    z: 1.0,
    color: Color::BLACK,
    opacity: 0.995,
};

pub const BACK_CAP: CapSettings = CapSettings {
    geometry: CircleGeometry {
        radius: 1.5,
        segments: 16,
    },
    z: -1.0,
    ..FRONT_CAP
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoSettings {
    /// Logical name, resolved under `assets/`.
    pub source: &'static str,
    pub looping: bool,
    pub muted: bool,
}

pub const EMITTER_VIDEO: VideoSettings = VideoSettings {
    source: "10.mp4",
    looping: true,
    muted: true,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GodRaysSettings {
    pub samples: u32,
    pub density: f32,
    pub decay: f32,
    pub weight: f32,
    pub exposure: f32,
    pub clamp_max: f32,
    pub blur: bool,
    /// Fraction of the frame resolution the shafts are computed at.
    pub resolution_scale: f32,
}

pub const GOD_RAYS: GodRaysSettings = GodRaysSettings {
    samples: 60,
    density: 0.96,
    decay: 0.8,
    weight: 0.4,
    exposure: 0.34,
    clamp_max: 1.0,
    blur: true,
    resolution_scale: 0.5,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BloomSettings {
    pub luminance_threshold: f32,
    pub luminance_smoothing: f32,
    pub intensity: f32,
    pub mipmap_blur: bool,
    pub radius: f32,
    pub levels: u32,
}

pub const BLOOM: BloomSettings = BloomSettings {
    luminance_threshold: 0.0,
    luminance_smoothing: 0.0,
    intensity: 1.0,
    mipmap_blur: true,
    radius: 0.85,
    levels: 8,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ComposerSettings {
    pub multisampling: u32,
    pub disable_normal_pass: bool,
}

pub const COMPOSER: ComposerSettings = ComposerSettings {
    multisampling: 8,
    disable_normal_pass: true,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitSettings {
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub pan_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Keeps the polar angle this far away from both poles.
    pub polar_epsilon: f32,
}

pub const ORBIT: OrbitSettings = OrbitSettings {
    damping_factor: 0.05,
    rotate_speed: 1.0,
    pan_speed: 1.0,
    zoom_speed: 1.0,
    min_distance: 0.5,
    max_distance: f32::INFINITY,
    polar_epsilon: 1e-6,
};
