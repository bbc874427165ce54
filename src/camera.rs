// First-person fly camera.
//
// Yaw/pitch Euler angles with a right-handed look-to view. Driven once per
// frame by a `CameraInput` snapshot and the elapsed seconds from the timer.

use glam::{Mat4, Vec3};
use std::f32::consts::{FRAC_PI_2, PI};

use crate::input::CameraInput;

const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.1;

#[derive(Debug, Clone)]
pub struct FirstPersonCamera {
    initial_position: Vec3,
    position: Vec3,
    yaw: f32,
    pitch: f32,
    look_direction: Vec3,
    up_direction: Vec3,
    move_speed: f32,
    turn_speed: f32,
}

impl FirstPersonCamera {
    pub fn new(position: Vec3) -> Self {
        Self {
            initial_position: position,
            position,
            yaw: PI,
            pitch: 0.0,
            look_direction: Vec3::new(0.0, 0.0, -1.0),
            up_direction: Vec3::Y,
            move_speed: 20.0,
            turn_speed: FRAC_PI_2,
        }
    }

    /// Movement speed in units per second.
    pub fn set_move_speed(&mut self, units_per_second: f32) {
        self.move_speed = units_per_second;
    }

    /// Turn speed in radians per second.
    pub fn set_turn_speed(&mut self, radians_per_second: f32) {
        self.turn_speed = radians_per_second;
    }

    pub fn reset(&mut self) {
        self.position = self.initial_position;
        self.yaw = PI;
        self.pitch = 0.0;
        self.look_direction = Vec3::new(0.0, 0.0, -1.0);
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn look_direction(&self) -> Vec3 {
        self.look_direction
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn update(&mut self, elapsed_seconds: f32, input: &CameraInput) {
        let mut translate = input.translate;

        // Scale down the diagonal when all three axes are active.
        if translate.x.abs() > 0.1 && translate.y.abs() > 0.1 && translate.z.abs() > 0.1 {
            translate = translate.normalize();
        }

        let move_interval = self.move_speed * elapsed_seconds;
        let rotate_interval = self.turn_speed * elapsed_seconds;

        self.yaw += input.look.x * rotate_interval;
        self.pitch += input.look.y * rotate_interval;
        self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);

        // Rotate the camera-space move vector into world space (yaw only).
        let x = translate.x * -self.yaw.cos() - translate.z * self.yaw.sin();
        let z = translate.x * self.yaw.sin() - translate.z * self.yaw.cos();
        self.position.x += x * move_interval;
        self.position.z += z * move_interval;
        self.position.y += translate.y * move_interval;

        let r = self.pitch.cos();
        self.look_direction = Vec3::new(
            r * self.yaw.sin(),
            self.pitch.sin(),
            r * self.yaw.cos(),
        );
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.look_direction, self.up_direction)
    }

    pub fn projection_matrix(&self, fov_y: f32, aspect_ratio: f32, near: f32, far: f32) -> Mat4 {
        Mat4::perspective_rh(fov_y, aspect_ratio, near, far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec2;

    fn forward_input() -> CameraInput {
        CameraInput {
            translate: Vec3::new(0.0, 0.0, -1.0),
            look: Vec2::ZERO,
        }
    }

    #[test]
    fn starts_looking_down_negative_z() {
        let camera = FirstPersonCamera::new(Vec3::ZERO);
        assert_relative_eq!(camera.look_direction().x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(camera.look_direction().z, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn forward_moves_along_look_direction() {
        let mut camera = FirstPersonCamera::new(Vec3::ZERO);
        camera.set_move_speed(1.0);
        camera.update(1.0, &forward_input());
        assert_relative_eq!(camera.position().z, -1.0, epsilon = 1e-5);
        assert_relative_eq!(camera.position().x, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = FirstPersonCamera::new(Vec3::ZERO);
        let look_up = CameraInput {
            translate: Vec3::ZERO,
            look: Vec2::new(0.0, 1.0),
        };
        // Ten seconds of full-rate pitching would wildly overshoot the limit.
        for _ in 0..600 {
            camera.update(1.0 / 60.0, &look_up);
        }
        assert_relative_eq!(camera.pitch(), PITCH_LIMIT, epsilon = 1e-4);
        assert!(camera.look_direction().y < 1.0);
    }

    #[test]
    fn yaw_turns_look_direction() {
        let mut camera = FirstPersonCamera::new(Vec3::ZERO);
        camera.set_turn_speed(FRAC_PI_2);
        let turn_left = CameraInput {
            translate: Vec3::ZERO,
            look: Vec2::new(1.0, 0.0),
        };
        // One second at pi/2 rad/s: yaw PI -> 3PI/2, look swings to -x.
        camera.update(1.0, &turn_left);
        assert_relative_eq!(camera.look_direction().x, -1.0, epsilon = 1e-5);
        assert_relative_eq!(camera.look_direction().z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn reset_restores_initial_state() {
        let start = Vec3::new(1.0, 2.0, 3.0);
        let mut camera = FirstPersonCamera::new(start);
        camera.update(1.0, &forward_input());
        assert!(camera.position() != start);

        camera.reset();
        assert_eq!(camera.position(), start);
        assert_relative_eq!(camera.yaw(), PI);
        assert_eq!(camera.pitch(), 0.0);
    }

    #[test]
    fn full_diagonal_is_normalized() {
        let mut camera = FirstPersonCamera::new(Vec3::ZERO);
        camera.set_move_speed(1.0);
        let diagonal = CameraInput {
            translate: Vec3::new(1.0, 1.0, 1.0),
            look: Vec2::ZERO,
        };
        camera.update(1.0, &diagonal);
        assert_relative_eq!(camera.position().length(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn view_matrix_transforms_look_target_to_forward() {
        let mut camera = FirstPersonCamera::new(Vec3::new(0.0, 0.0, 5.0));
        camera.update(0.0, &CameraInput::default());
        let view = camera.view_matrix();
        // A point one unit along the look direction lands on the -z view axis.
        let target = camera.position() + camera.look_direction();
        let in_view = view.transform_point3(target);
        assert_relative_eq!(in_view.z, -1.0, epsilon = 1e-5);
        assert_relative_eq!(in_view.x, 0.0, epsilon = 1e-5);
    }
}
