// Keyboard and analog input state for camera control.
//
// Keyboard state is fed from winit window events. Analog sticks use the
// XInput-style deadzone normalization; any poller can push raw stick values
// through `set_sticks_raw`, the crate does not bind an OS gamepad backend.

use glam::{Vec2, Vec3};
use winit::event::WindowEvent;
use winit::keyboard::{KeyCode, PhysicalKey};

pub const LEFT_THUMB_DEADZONE: i16 = 7849;
pub const RIGHT_THUMB_DEADZONE: i16 = 8689;
pub const TRIGGER_THRESHOLD: u8 = 30;

/// Normalize a raw stick axis to [-1, 1], zeroing values inside the deadzone.
pub fn normalize_axis(raw: i16, deadzone: i16) -> f32 {
    let max = i16::MAX as f32;
    let normalized = (raw as f32 / max).clamp(-1.0, 1.0);
    if normalized.abs() < deadzone as f32 / max {
        0.0
    } else {
        normalized
    }
}

/// Normalize a raw trigger value to [0, 1], zeroing values below the threshold.
pub fn normalize_trigger(raw: u8, threshold: u8) -> f32 {
    let max = u8::MAX as f32;
    let normalized = raw as f32 / max;
    if normalized < threshold as f32 / max {
        0.0
    } else {
        normalized
    }
}

/// Per-frame movement snapshot consumed by the camera.
///
/// `translate` is in camera space: +x strafes right, +y rises, +z moves
/// backwards. `look` turns: +x yaws left, +y pitches up.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraInput {
    pub translate: Vec3,
    pub look: Vec2,
}

#[derive(Debug, Clone, Copy, Default)]
struct KeyStates {
    w: bool,
    a: bool,
    s: bool,
    d: bool,
    q: bool,
    e: bool,
    up: bool,
    down: bool,
    left: bool,
    right: bool,
}

#[derive(Debug, Default)]
pub struct InputState {
    keys: KeyStates,
    left_stick: Vec2,
    right_stick: Vec2,
    left_trigger: f32,
    right_trigger: f32,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a window event. Returns true if the event updated input state.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        let WindowEvent::KeyboardInput { event, .. } = event else {
            return false;
        };
        let PhysicalKey::Code(code) = event.physical_key else {
            return false;
        };
        let pressed = event.state.is_pressed();

        let slot = match code {
            KeyCode::KeyW => &mut self.keys.w,
            KeyCode::KeyA => &mut self.keys.a,
            KeyCode::KeyS => &mut self.keys.s,
            KeyCode::KeyD => &mut self.keys.d,
            KeyCode::KeyQ => &mut self.keys.q,
            KeyCode::KeyE => &mut self.keys.e,
            KeyCode::ArrowUp => &mut self.keys.up,
            KeyCode::ArrowDown => &mut self.keys.down,
            KeyCode::ArrowLeft => &mut self.keys.left,
            KeyCode::ArrowRight => &mut self.keys.right,
            _ => return false,
        };
        *slot = pressed;
        true
    }

    /// Push raw analog stick values (XInput axis range), applying deadzones.
    pub fn set_sticks_raw(&mut self, lx: i16, ly: i16, rx: i16, ry: i16) {
        self.left_stick = Vec2::new(
            normalize_axis(lx, LEFT_THUMB_DEADZONE),
            normalize_axis(ly, LEFT_THUMB_DEADZONE),
        );
        self.right_stick = Vec2::new(
            normalize_axis(rx, RIGHT_THUMB_DEADZONE),
            normalize_axis(ry, RIGHT_THUMB_DEADZONE),
        );
    }

    /// Push raw analog trigger values, applying the activation threshold.
    pub fn set_triggers_raw(&mut self, left: u8, right: u8) {
        self.left_trigger = normalize_trigger(left, TRIGGER_THRESHOLD);
        self.right_trigger = normalize_trigger(right, TRIGGER_THRESHOLD);
    }

    pub fn left_stick(&self) -> Vec2 {
        self.left_stick
    }

    pub fn right_stick(&self) -> Vec2 {
        self.right_stick
    }

    pub fn left_trigger(&self) -> f32 {
        self.left_trigger
    }

    pub fn right_trigger(&self) -> f32 {
        self.right_trigger
    }

    /// Merge keyboard and stick state into a camera movement snapshot.
    pub fn camera_input(&self) -> CameraInput {
        fn axis(positive: bool, negative: bool) -> f32 {
            (positive as i32 - negative as i32) as f32
        }

        let translate = Vec3::new(
            (axis(self.keys.d, self.keys.a) + self.left_stick.x).clamp(-1.0, 1.0),
            axis(self.keys.q, self.keys.e),
            (axis(self.keys.s, self.keys.w) - self.left_stick.y).clamp(-1.0, 1.0),
        );
        let look = Vec2::new(
            (axis(self.keys.left, self.keys.right) - self.right_stick.x).clamp(-1.0, 1.0),
            (axis(self.keys.up, self.keys.down) + self.right_stick.y).clamp(-1.0, 1.0),
        );

        CameraInput { translate, look }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_inside_deadzone_reads_zero() {
        assert_eq!(normalize_axis(LEFT_THUMB_DEADZONE - 1, LEFT_THUMB_DEADZONE), 0.0);
        assert_eq!(normalize_axis(-(LEFT_THUMB_DEADZONE - 1), LEFT_THUMB_DEADZONE), 0.0);
    }

    #[test]
    fn axis_outside_deadzone_is_normalized() {
        let v = normalize_axis(i16::MAX, LEFT_THUMB_DEADZONE);
        assert!((v - 1.0).abs() < 1e-4);

        // i16::MIN / i16::MAX slightly exceeds -1; the clamp catches it.
        let v = normalize_axis(i16::MIN, LEFT_THUMB_DEADZONE);
        assert_eq!(v, -1.0);

        let half = normalize_axis(i16::MAX / 2, LEFT_THUMB_DEADZONE);
        assert!((half - 0.5).abs() < 1e-3);
    }

    #[test]
    fn trigger_below_threshold_reads_zero() {
        assert_eq!(normalize_trigger(TRIGGER_THRESHOLD - 1, TRIGGER_THRESHOLD), 0.0);
        assert!(normalize_trigger(255, TRIGGER_THRESHOLD) == 1.0);
    }

    #[test]
    fn sticks_merge_into_camera_input() {
        let mut input = InputState::new();
        input.set_sticks_raw(i16::MAX, 0, 0, i16::MAX);
        let snapshot = input.camera_input();
        assert!((snapshot.translate.x - 1.0).abs() < 1e-4);
        assert_eq!(snapshot.translate.z, 0.0);
        assert!((snapshot.look.y - 1.0).abs() < 1e-4);
        // Stick right turns right: negative look.x.
        input.set_sticks_raw(0, 0, i16::MAX, 0);
        assert!(input.camera_input().look.x < 0.0);
    }

    #[test]
    fn forward_key_moves_negative_z() {
        let mut input = InputState::new();
        input.keys.w = true;
        assert_eq!(input.camera_input().translate.z, -1.0);
        input.keys.w = false;
        input.keys.s = true;
        assert_eq!(input.camera_input().translate.z, 1.0);
    }

    #[test]
    fn stick_and_key_sum_is_clamped() {
        let mut input = InputState::new();
        input.keys.d = true;
        input.set_sticks_raw(i16::MAX, 0, 0, 0);
        assert_eq!(input.camera_input().translate.x, 1.0);
    }
}
