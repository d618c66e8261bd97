//! Starfield point data.

use std::f32::consts::TAU;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::settings::StarsSettings;

/// Points scattered through a spherical shell around the origin.
#[derive(Clone, Debug, PartialEq)]
pub struct StarField {
    pub stars: Vec<Star>,
    pub speed: f32,
    pub fade: bool,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Star {
    pub position: [f32; 3],
    pub size: f32,
    pub color: [f32; 3],
    _padding: f32,
}

impl StarField {
    /// Generates the field. The same settings (seed included) always produce
    /// the same stars.
    pub fn generate(settings: &StarsSettings) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(settings.seed);
        let mut radius = settings.radius + settings.depth;
        let increment = settings.depth / settings.count.max(1) as f32;

        let stars = (0..settings.count)
            .map(|i| {
                radius -= increment * rng.r#gen::<f32>();
                let polar = (1.0 - rng.r#gen::<f32>() * 2.0).acos();
                let azimuth = rng.r#gen::<f32>() * TAU;
                let (sin_polar, cos_polar) = polar.sin_cos();
                let (sin_az, cos_az) = azimuth.sin_cos();
                let hue = i as f32 / settings.count as f32;
                Star {
                    position: [
                        radius * sin_polar * sin_az,
                        radius * cos_polar,
                        radius * sin_polar * cos_az,
                    ],
                    size: (0.5 + 0.5 * rng.r#gen::<f32>()) * settings.factor,
                    color: hsl_to_rgb(hue, settings.saturation, 0.9),
                    _padding: 0.0,
                }
            })
            .collect();

        Self {
            stars,
            speed: settings.speed,
            fade: settings.fade,
        }
    }
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> [f32; 3] {
    if s <= 0.0 {
        return [l, l, l];
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let channel = |t: f32| {
        let t = t.rem_euclid(1.0);
        if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * 6.0 * (2.0 / 3.0 - t)
        } else {
            p
        }
    };
    [channel(h + 1.0 / 3.0), channel(h), channel(h - 1.0 / 3.0)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> StarsSettings {
        StarsSettings {
            count: 200,
            ..crate::settings::STARS
        }
    }

    #[test]
    fn stars_stay_inside_the_shell() {
        let field = StarField::generate(&settings());
        let s = settings();

        assert_eq!(field.stars.len(), 200);
        for star in &field.stars {
            let [x, y, z] = star.position;
            let r = (x * x + y * y + z * z).sqrt();
            assert!(r <= s.radius + s.depth + 1e-3);
            assert!(r >= s.radius - 1e-3);
            assert!(star.size >= 0.5 * s.factor && star.size <= s.factor);
        }
    }

    #[test]
    fn generation_is_deterministic() {
        assert_eq!(StarField::generate(&settings()), StarField::generate(&settings()));
    }

    #[test]
    fn zero_saturation_is_grey() {
        assert_eq!(hsl_to_rgb(0.42, 0.0, 0.9), [0.9, 0.9, 0.9]);
        let red = hsl_to_rgb(0.0, 1.0, 0.5);
        assert!((red[0] - 1.0).abs() < 1e-6 && red[1].abs() < 1e-6 && red[2].abs() < 1e-6);
    }
}
