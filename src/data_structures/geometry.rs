//! Procedural primitive geometry.
//!
//! Circles and (optionally open-ended) cylinders are generated on the CPU in a
//! Y-up, counter-clockwise-front convention. Cylinders are centred on the
//! origin along Y; circles lie in the XY plane facing +Z.

use std::f32::consts::TAU;

use cgmath::InnerSpace;

use crate::data_structures::model::ModelVertex;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CircleGeometry {
    pub radius: f32,
    pub segments: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CylinderGeometry {
    pub radius_top: f32,
    pub radius_bottom: f32,
    pub height: f32,
    pub radial_segments: u32,
    pub height_segments: u32,
    pub open_ended: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Geometry {
    Circle(CircleGeometry),
    Cylinder(CylinderGeometry),
}

/// CPU-side vertices and triangle-list indices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
}

impl Geometry {
    pub fn build(&self) -> MeshData {
        match self {
            Geometry::Circle(circle) => circle.build(),
            Geometry::Cylinder(cylinder) => cylinder.build(),
        }
    }
}

impl CircleGeometry {
    pub fn build(&self) -> MeshData {
        let segments = self.segments.max(3);
        let mut data = MeshData::default();

        data.vertices.push(ModelVertex {
            position: [0.0, 0.0, 0.0],
            tex_coords: [0.5, 0.5],
            normal: [0.0, 0.0, 1.0],
        });
        for s in 0..=segments {
            let angle = s as f32 / segments as f32 * TAU;
            let (sin, cos) = angle.sin_cos();
            let x = self.radius * cos;
            let y = self.radius * sin;
            data.vertices.push(ModelVertex {
                position: [x, y, 0.0],
                tex_coords: [(cos + 1.0) / 2.0, (sin + 1.0) / 2.0],
                normal: [0.0, 0.0, 1.0],
            });
        }
        for i in 1..=segments {
            data.indices.extend_from_slice(&[i, i + 1, 0]);
        }
        data
    }
}

impl CylinderGeometry {
    pub fn build(&self) -> MeshData {
        let radial = self.radial_segments.max(3);
        let rows = self.height_segments.max(1);
        let half_height = self.height / 2.0;
        let slope = (self.radius_bottom - self.radius_top) / self.height;
        let mut data = MeshData::default();

        // torso
        let mut grid = Vec::with_capacity(rows as usize + 1);
        for y in 0..=rows {
            let v = y as f32 / rows as f32;
            let radius = v * (self.radius_bottom - self.radius_top) + self.radius_top;
            let mut row = Vec::with_capacity(radial as usize + 1);
            for x in 0..=radial {
                let u = x as f32 / radial as f32;
                let (sin, cos) = (u * TAU).sin_cos();
                let normal = cgmath::Vector3::new(sin, slope, cos).normalize();
                row.push(data.vertices.len() as u32);
                data.vertices.push(ModelVertex {
                    position: [radius * sin, -v * self.height + half_height, radius * cos],
                    tex_coords: [u, 1.0 - v],
                    normal: normal.into(),
                });
            }
            grid.push(row);
        }
        for x in 0..radial as usize {
            for y in 0..rows as usize {
                let a = grid[y][x];
                let b = grid[y + 1][x];
                let c = grid[y + 1][x + 1];
                let d = grid[y][x + 1];
                data.indices.extend_from_slice(&[a, b, d, b, c, d]);
            }
        }

        if !self.open_ended {
            if self.radius_top > 0.0 {
                self.build_cap(&mut data, true, radial, half_height);
            }
            if self.radius_bottom > 0.0 {
                self.build_cap(&mut data, false, radial, half_height);
            }
        }
        data
    }

    fn build_cap(&self, data: &mut MeshData, top: bool, radial: u32, half_height: f32) {
        let radius = if top { self.radius_top } else { self.radius_bottom };
        let sign = if top { 1.0 } else { -1.0 };
        let y = half_height * sign;

        // One centre vertex per segment keeps the uv seams of every wedge apart.
        let centre_start = data.vertices.len() as u32;
        for _ in 1..=radial {
            data.vertices.push(ModelVertex {
                position: [0.0, y, 0.0],
                tex_coords: [0.5, 0.5],
                normal: [0.0, sign, 0.0],
            });
        }
        let ring_start = data.vertices.len() as u32;
        for x in 0..=radial {
            let u = x as f32 / radial as f32;
            let (sin, cos) = (u * TAU).sin_cos();
            data.vertices.push(ModelVertex {
                position: [radius * sin, y, radius * cos],
                tex_coords: [cos * 0.5 + 0.5, sin * 0.5 * sign + 0.5],
                normal: [0.0, sign, 0.0],
            });
        }
        for x in 0..radial {
            let c = centre_start + x;
            let i = ring_start + x;
            if top {
                data.indices.extend_from_slice(&[i, i + 1, c]);
            } else {
                data.indices.extend_from_slice(&[i + 1, i, c]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_normal(data: &MeshData, tri: usize) -> cgmath::Vector3<f32> {
        let idx = &data.indices[tri * 3..tri * 3 + 3];
        let p = |i: u32| cgmath::Vector3::from(data.vertices[i as usize].position);
        (p(idx[1]) - p(idx[0])).cross(p(idx[2]) - p(idx[0]))
    }

    #[test]
    fn circle_fans_around_its_centre() {
        let data = CircleGeometry {
            radius: 3.0,
            segments: 16,
        }
        .build();

        assert_eq!(data.vertices.len(), 18);
        assert_eq!(data.indices.len(), 16 * 3);
        // Counter-clockwise when viewed from +Z.
        assert!(triangle_normal(&data, 0).z > 0.0);
    }

    #[test]
    fn open_cylinder_has_no_caps() {
        let data = CylinderGeometry {
            radius_top: 3.0,
            radius_bottom: 1.5,
            height: 2.0,
            radial_segments: 16,
            height_segments: 1,
            open_ended: true,
        }
        .build();

        assert_eq!(data.vertices.len(), 17 * 2);
        assert_eq!(data.indices.len(), 16 * 6);
        let top = data.vertices[0].position;
        assert!((top[1] - 1.0).abs() < 1e-6);
        assert!((top[2] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn closed_cylinder_adds_two_caps() {
        let data = CylinderGeometry {
            radius_top: 1.0,
            radius_bottom: 1.0,
            height: 1.0,
            radial_segments: 8,
            height_segments: 2,
            open_ended: false,
        }
        .build();

        let torso = 9 * 3;
        let cap = 8 + 9;
        assert_eq!(data.vertices.len(), torso + 2 * cap);
        assert_eq!(data.indices.len(), 8 * 2 * 6 + 2 * 8 * 3);
    }

    #[test]
    fn cylinder_walls_face_outwards() {
        let data = CylinderGeometry {
            radius_top: 10.0,
            radius_bottom: 6.0,
            height: 3.0,
            radial_segments: 16,
            height_segments: 1,
            open_ended: true,
        }
        .build();

        for tri in 0..data.indices.len() / 3 {
            let normal = triangle_normal(&data, tri);
            let first = cgmath::Vector3::from(data.vertices[data.indices[tri * 3] as usize].position);
            let radial = cgmath::Vector3::new(first.x, 0.0, first.z);
            assert!(normal.dot(radial) > 0.0, "triangle {tri} faces inwards");
        }
    }
}
