//! Camera, projection and orbit controls.
//!
//! The camera looks at a target point and is moved only by the
//! [`OrbitController`]: it orbits the target in spherical coordinates, pans the
//! target along the view plane and dollies towards it. Motion is damped, so the
//! controller keeps easing for a few frames after input stops.

use std::f32::consts::{PI, TAU};

use cgmath::{InnerSpace, Matrix, Matrix4, Point3, Rad, SquareMatrix, Vector3, perspective};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

use crate::settings::{AmbientLight, CameraSettings, OrbitSettings};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub eye: Point3<f32>,
    pub target: Point3<f32>,
}

impl Camera {
    pub fn new<E: Into<Point3<f32>>, T: Into<Point3<f32>>>(eye: E, target: T) -> Self {
        Self {
            eye: eye.into(),
            target: target.into(),
        }
    }

    pub fn from_settings(settings: &CameraSettings) -> Self {
        Self::new(settings.position, settings.target)
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.eye, self.target, Vector3::unit_y())
    }

    pub fn distance(&self) -> f32 {
        (self.eye - self.target).magnitude()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn from_settings(width: u32, height: u32, settings: &CameraSettings) -> Self {
        Self::new(
            width,
            height,
            cgmath::Deg(settings.fov_deg),
            settings.near,
            settings.far,
        )
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn fovy(&self) -> Rad<f32> {
        self.fovy
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// Mirrors world space about the horizontal plane `y = height`.
pub fn reflection_matrix(height: f32) -> Matrix4<f32> {
    Matrix4::from_translation(Vector3::new(0.0, height, 0.0))
        * Matrix4::from_nonuniform_scale(1.0, -1.0, 1.0)
        * Matrix4::from_translation(Vector3::new(0.0, -height, 0.0))
}

/// Projects a world position to texture coordinates of the rendered frame
/// (origin top left).
pub fn project_to_uv(view_proj: Matrix4<f32>, world: Vector3<f32>) -> [f32; 2] {
    let clip = view_proj * world.extend(1.0);
    let w = if clip.w.abs() < f32::EPSILON { f32::EPSILON } else { clip.w };
    [clip.x / w * 0.5 + 0.5, 0.5 - clip.y / w * 0.5]
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
    /// Ambient colour premultiplied by intensity.
    ambient: [f32; 4],
    /// Width, height, elapsed seconds.
    viewport: [f32; 4],
    /// Fragments with `dot(world, clip_plane) < 0` are discarded.
    clip_plane: [f32; 4],
}

impl CameraUniform {
    pub fn new(ambient: &AmbientLight) -> Self {
        let [r, g, b] = ambient.color.to_linear();
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
            ambient: [
                r * ambient.intensity,
                g * ambient.intensity,
                b * ambient.intensity,
                1.0,
            ],
            viewport: [1.0, 1.0, 0.0, 0.0],
            clip_plane: [0.0, 0.0, 0.0, 1.0],
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.eye.to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
        self.clip_plane = [0.0, 0.0, 0.0, 1.0];
    }

    /// The same camera looking at the scene mirrored about `y = height`.
    /// Everything below the plane is clipped.
    pub fn update_mirrored(&mut self, camera: &Camera, projection: &Projection, height: f32) {
        let reflect = reflection_matrix(height);
        let eye = reflect * camera.eye.to_homogeneous();
        self.view_position = eye.into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix() * reflect).into();
        self.clip_plane = [0.0, 1.0, 0.0, -height];
    }

    pub fn update_viewport(&mut self, width: u32, height: u32, elapsed: f32) {
        self.viewport = [width as f32, height as f32, elapsed, 0.0];
    }

    pub fn view_proj(&self) -> Matrix4<f32> {
        self.view_proj.into()
    }
}

/// GPU side of the camera: the main view and its mirror image for reflections.
#[derive(Debug)]
pub struct CameraResources {
    pub camera: Camera,
    pub controller: OrbitController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub mirror_uniform: CameraUniform,
    pub mirror_buffer: wgpu::Buffer,
    pub mirror_bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    pub fn write(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
        queue.write_buffer(
            &self.mirror_buffer,
            0,
            bytemuck::cast_slice(&[self.mirror_uniform]),
        );
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Drag {
    None,
    Rotate,
    Pan,
}

/// Orbit controls around a fixed target: left drag rotates, right drag pans,
/// the wheel dollies.
#[derive(Debug)]
pub struct OrbitController {
    settings: OrbitSettings,
    drag: Drag,
    theta_delta: f32,
    phi_delta: f32,
    scale: f32,
    pan_delta: Vector3<f32>,
    /// Pixel deltas accumulated since the last update.
    pending_pan: (f32, f32),
    viewport_height: f32,
    fovy: Rad<f32>,
}

impl OrbitController {
    pub fn new(settings: OrbitSettings) -> Self {
        Self {
            settings,
            drag: Drag::None,
            theta_delta: 0.0,
            phi_delta: 0.0,
            scale: 1.0,
            pan_delta: Vector3::new(0.0, 0.0, 0.0),
            pending_pan: (0.0, 0.0),
            viewport_height: 1.0,
            fovy: Rad(PI / 4.0),
        }
    }

    pub fn set_viewport(&mut self, height: u32, fovy: Rad<f32>) {
        self.viewport_height = height.max(1) as f32;
        self.fovy = fovy;
    }

    pub fn handle_window_events(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                self.drag = match (button, state) {
                    (MouseButton::Left, ElementState::Pressed) => Drag::Rotate,
                    (MouseButton::Right, ElementState::Pressed) => Drag::Pan,
                    (_, ElementState::Released) => Drag::None,
                    _ => self.drag,
                };
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
                };
                self.handle_scroll(steps);
            }
            _ => (),
        }
    }

    /// Raw pointer motion in pixels; only acts while a button is held.
    pub fn handle_mouse(&mut self, dx: f64, dy: f64) {
        let (dx, dy) = (dx as f32, dy as f32);
        match self.drag {
            Drag::Rotate => {
                self.theta_delta -= TAU * dx / self.viewport_height * self.settings.rotate_speed;
                self.phi_delta -= TAU * dy / self.viewport_height * self.settings.rotate_speed;
            }
            Drag::Pan => {
                self.pending_pan.0 += dx * self.settings.pan_speed;
                self.pending_pan.1 += dy * self.settings.pan_speed;
            }
            Drag::None => (),
        }
    }

    /// Positive steps move towards the target.
    pub fn handle_scroll(&mut self, steps: f32) {
        if steps == 0.0 {
            return;
        }
        let zoom = 0.95f32.powf(self.settings.zoom_speed * steps.abs());
        if steps > 0.0 {
            self.scale *= zoom;
        } else {
            self.scale /= zoom;
        }
    }

    /// Applies pending input to `camera`. Returns whether the camera moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        let before = *camera;
        let mut offset = camera.eye - camera.target;
        let radius = offset.magnitude();

        if self.pending_pan != (0.0, 0.0) {
            // Pixels to world units at the target's depth.
            let per_pixel = 2.0 * radius * (self.fovy.0 / 2.0).tan() / self.viewport_height;
            let view = camera.calc_matrix();
            let left = view.row(0).truncate();
            let up = view.row(1).truncate();
            self.pan_delta += -left * self.pending_pan.0 * per_pixel + up * self.pending_pan.1 * per_pixel;
            self.pending_pan = (0.0, 0.0);
        }

        let mut theta = offset.x.atan2(offset.z);
        let mut phi = if radius > 0.0 {
            (offset.y / radius).clamp(-1.0, 1.0).acos()
        } else {
            0.0
        };

        let damping = self.settings.damping_factor;
        theta += self.theta_delta * damping;
        phi += self.phi_delta * damping;
        let eps = self.settings.polar_epsilon;
        phi = phi.clamp(eps, PI - eps);

        let radius = (radius * self.scale).clamp(self.settings.min_distance, self.settings.max_distance);
        camera.target += self.pan_delta * damping;

        offset = Vector3::new(
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
            radius * phi.sin() * theta.cos(),
        );
        camera.eye = camera.target + offset;

        self.theta_delta *= 1.0 - damping;
        self.phi_delta *= 1.0 - damping;
        self.pan_delta *= 1.0 - damping;
        self.scale = 1.0;

        (camera.eye - before.eye).magnitude2() > 1e-8
            || (camera.target - before.target).magnitude2() > 1e-8
    }
}

impl Default for OrbitController {
    fn default() -> Self {
        Self::new(crate::settings::ORBIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{CAMERA, ORBIT};
    use cgmath::Vector4;

    fn press(controller: &mut OrbitController, button: MouseButton) {
        controller.handle_window_events(&WindowEvent::MouseInput {
            device_id: winit::event::DeviceId::dummy(),
            state: ElementState::Pressed,
            button,
        });
    }

    fn settle(controller: &mut OrbitController, camera: &mut Camera) {
        for _ in 0..400 {
            controller.update(camera);
        }
    }

    #[test]
    fn idle_controller_keeps_the_camera() {
        let mut camera = Camera::from_settings(&CAMERA);
        let mut controller = OrbitController::new(ORBIT);

        assert!(!controller.update(&mut camera));
        assert!((camera.eye - Point3::new(0.0, 7.0, 10.0)).magnitude() < 1e-4);
    }

    #[test]
    fn rotating_preserves_distance() {
        let mut camera = Camera::from_settings(&CAMERA);
        let distance = camera.distance();
        let mut controller = OrbitController::new(ORBIT);
        controller.set_viewport(600, Rad(0.6));

        press(&mut controller, MouseButton::Left);
        controller.handle_mouse(120.0, 0.0);
        settle(&mut controller, &mut camera);

        assert!((camera.distance() - distance).abs() < 1e-3);
        assert!(camera.eye.x.abs() > 1.0);
    }

    #[test]
    fn polar_angle_never_reaches_the_pole() {
        let mut camera = Camera::from_settings(&CAMERA);
        let mut controller = OrbitController::new(ORBIT);
        controller.set_viewport(100, Rad(0.6));

        press(&mut controller, MouseButton::Left);
        controller.handle_mouse(0.0, 10_000.0);
        settle(&mut controller, &mut camera);

        let offset = camera.eye - camera.target;
        assert!(offset.x.abs() + offset.z.abs() > 0.0);
        assert!(offset.y <= camera.distance());
    }

    #[test]
    fn scrolling_up_dollies_in() {
        let mut camera = Camera::from_settings(&CAMERA);
        let distance = camera.distance();
        let mut controller = OrbitController::new(ORBIT);

        controller.handle_scroll(1.0);
        controller.update(&mut camera);

        assert!((camera.distance() - distance * 0.95).abs() < 1e-3);
    }

    #[test]
    fn dollying_in_stops_short_of_the_target() {
        let mut camera = Camera::from_settings(&CAMERA);
        let mut controller = OrbitController::new(ORBIT);

        for _ in 0..3000 {
            controller.handle_scroll(1.0);
            controller.update(&mut camera);
        }

        assert!((camera.distance() - ORBIT.min_distance).abs() < 1e-4);
        let view: [[f32; 4]; 4] = camera.calc_matrix().into();
        assert!(view.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn panning_moves_the_target() {
        let mut camera = Camera::from_settings(&CAMERA);
        let mut controller = OrbitController::new(ORBIT);
        controller.set_viewport(600, Rad(0.6));

        press(&mut controller, MouseButton::Right);
        controller.handle_mouse(50.0, 0.0);
        settle(&mut controller, &mut camera);

        assert!(camera.target.x < -0.1);
        assert!(camera.target.y.abs() < 1e-3);
    }

    #[test]
    fn reflection_fixes_points_on_the_plane() {
        let m = reflection_matrix(-1.0);
        let on_plane = m * Vector4::new(3.0, -1.0, 2.0, 1.0);
        let above = m * Vector4::new(0.0, 1.0, 0.0, 1.0);

        assert_eq!(on_plane, Vector4::new(3.0, -1.0, 2.0, 1.0));
        assert_eq!(above, Vector4::new(0.0, -3.0, 0.0, 1.0));
    }

    #[test]
    fn target_projects_to_the_frame_centre() {
        let camera = Camera::from_settings(&CAMERA);
        let projection = Projection::from_settings(800, 600, &CAMERA);
        let view_proj = projection.calc_matrix() * camera.calc_matrix();

        let [u, v] = project_to_uv(view_proj, Vector3::new(0.0, 0.0, 0.0));

        assert!((u - 0.5).abs() < 1e-5 && (v - 0.5).abs() < 1e-5);
    }
}
