// src/engine_lib/controller.rs

use glam::Vec3;
use winit::{
    event::{DeviceEvent, ElementState, MouseButton, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window},
};

use crate::engine_lib::player::PlayerBody;
use crate::engine_lib::world::World;

const KEYBOARD_TURN_SPEED: f32 = 1.5;

/// Keyboard and mouse input for the demo player.
pub struct PlayerController {
    move_input: Vec3,
    yaw_input_keyboard: f32,
    pitch_input_keyboard: f32,
    jump_held: bool,
    spawn_requested: bool,

    mouse_dx_accum: f32,
    mouse_dy_accum: f32,

    pub mouse_sensitivity: f32,
    pub cursor_grabbed: bool,
}

impl PlayerController {
    pub fn new(initial_grab: bool, sensitivity: f32) -> Self {
        Self {
            move_input: Vec3::ZERO,
            yaw_input_keyboard: 0.0,
            pitch_input_keyboard: 0.0,
            jump_held: false,
            spawn_requested: false,
            mouse_dx_accum: 0.0,
            mouse_dy_accum: 0.0,
            mouse_sensitivity: sensitivity,
            cursor_grabbed: initial_grab,
        }
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent, window: &Window) -> bool {
        match event {
            WindowEvent::KeyboardInput { event: key_event, .. } => {
                let pressed = key_event.state == ElementState::Pressed;
                let axis = if pressed { 1.0 } else { 0.0 };
                match key_event.physical_key {
                    PhysicalKey::Code(KeyCode::Escape) => {
                        if pressed {
                            self.toggle_cursor_grab(window);
                        }
                        true
                    }
                    PhysicalKey::Code(KeyCode::KeyE) => {
                        if pressed && !key_event.repeat {
                            self.spawn_requested = true;
                        }
                        true
                    }
                    PhysicalKey::Code(KeyCode::KeyW) => { self.move_input.z = -axis; true }
                    PhysicalKey::Code(KeyCode::KeyS) => { self.move_input.z = axis; true }
                    PhysicalKey::Code(KeyCode::KeyA) => { self.move_input.x = -axis; true }
                    PhysicalKey::Code(KeyCode::KeyD) => { self.move_input.x = axis; true }
                    PhysicalKey::Code(KeyCode::Space) => { self.jump_held = pressed; true }
                    PhysicalKey::Code(KeyCode::ArrowLeft) => { self.yaw_input_keyboard = axis; true }
                    PhysicalKey::Code(KeyCode::ArrowRight) => { self.yaw_input_keyboard = -axis; true }
                    PhysicalKey::Code(KeyCode::ArrowUp) => { self.pitch_input_keyboard = axis; true }
                    PhysicalKey::Code(KeyCode::ArrowDown) => { self.pitch_input_keyboard = -axis; true }
                    _ => false,
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if !self.cursor_grabbed && *state == ElementState::Pressed && *button == MouseButton::Left {
                    self.grab_cursor(window, true);
                    return true;
                }
                false
            }
            WindowEvent::Focused(focused) => {
                if !*focused && self.cursor_grabbed {
                    self.grab_cursor(window, false);
                }
                false
            }
            _ => false,
        }
    }

    pub fn handle_device_event(&mut self, event: &DeviceEvent) {
        if !self.cursor_grabbed {
            self.mouse_dx_accum = 0.0;
            self.mouse_dy_accum = 0.0;
            return;
        }
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            self.mouse_dx_accum += *dx as f32;
            self.mouse_dy_accum += *dy as f32;
        }
    }

    pub fn toggle_cursor_grab(&mut self, window: &Window) {
        self.grab_cursor(window, !self.cursor_grabbed);
    }

    fn grab_cursor(&mut self, window: &Window, grab: bool) {
        if grab == self.cursor_grabbed {
            return;
        }
        let result = if grab {
            window
                .set_cursor_grab(CursorGrabMode::Confined)
                .or_else(|_e| window.set_cursor_grab(CursorGrabMode::Locked))
        } else {
            window.set_cursor_grab(CursorGrabMode::None)
        };
        match result {
            Ok(()) => {
                window.set_cursor_visible(!grab);
                self.cursor_grabbed = grab;
                self.mouse_dx_accum = 0.0;
                self.mouse_dy_accum = 0.0;
            }
            Err(e) => log::warn!("[Controller] Could not change cursor grab: {}", e),
        }
    }

    /// One-shot: true once per press of the spawn key.
    pub fn take_spawn_request(&mut self) -> bool {
        std::mem::take(&mut self.spawn_requested)
    }

    /// Stage 1 of the frame: look, then move the body through `world`.
    pub fn apply_to_player(&mut self, player: &mut PlayerBody, dt: f32, world: &World) {
        let turn = KEYBOARD_TURN_SPEED * dt;
        let yaw_delta = self.yaw_input_keyboard * turn - self.mouse_dx_accum * self.mouse_sensitivity;
        let pitch_delta = self.pitch_input_keyboard * turn - self.mouse_dy_accum * self.mouse_sensitivity;
        self.mouse_dx_accum = 0.0;
        self.mouse_dy_accum = 0.0;

        player.look(yaw_delta, pitch_delta);
        player.step(self.move_input.normalize_or_zero(), self.jump_held, dt, world);
    }
}
