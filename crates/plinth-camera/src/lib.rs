use glam::{Mat4, Vec3};
use std::f32::consts::PI;
use wgpu::{Buffer, Queue};

/// Last frame of the scripted intro; past this the orbit controller owns the
/// camera.
pub const INTRO_FRAME_CEILING: u32 = 100;

/// Denominator used to normalize the frame for easing. It is larger than the
/// ceiling on purpose: the sweep hands off before the curve settles at 1, so
/// the camera is still drifting slightly when the user takes over.
pub const INTRO_EASE_WINDOW: f32 = 120.0;

/// Full revolutions the sweep covers at ease = 1.
const SWEEP_TURNS: f32 = 10.0;

/// Camera height is pinned for the whole sweep.
const SWEEP_HEIGHT: f32 = 10.0;

pub const FRUSTUM_HALF_EXTENT: f32 = 0.02;
pub const FRUSTUM_NEAR: f32 = 0.01;
pub const FRUSTUM_FAR: f32 = 50000.0;

pub fn ease_out_circ(x: f32) -> f32 {
    (1.0 - (x - 1.0).powi(4)).sqrt()
}

pub struct OrbitCamera {
    pub eye: Vec3,
    pub target: Vec3,
}

impl OrbitCamera {
    pub fn new(eye: Vec3, target: Vec3) -> Self {
        Self { eye, target }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, Vec3::Y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraPhase {
    Scripted,
    Interactive,
}

/// Frame counter driving the scripted/interactive switch. The counter is the
/// only state; the phase is derived from it, never stored separately, so the
/// two cannot fall out of sync.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntroTimer {
    frame: u32,
}

impl IntroTimer {
    pub fn new() -> Self {
        Self { frame: 0 }
    }

    /// Advances by one frame, coming to rest one past the ceiling.
    pub fn tick(&mut self) {
        if self.frame <= INTRO_FRAME_CEILING {
            self.frame += 1;
        }
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn phase(&self) -> CameraPhase {
        if self.frame <= INTRO_FRAME_CEILING {
            CameraPhase::Scripted
        } else {
            CameraPhase::Interactive
        }
    }
}

/// Scripted camera path: the eye spins around the target's vertical axis in
/// the XZ plane, decelerating on the ease-out curve, height pinned.
pub struct IntroSweep {
    initial_eye: Vec3,
    target: Vec3,
}

impl IntroSweep {
    pub fn new(initial_eye: Vec3, target: Vec3) -> Self {
        Self {
            initial_eye,
            target,
        }
    }

    pub fn eye_at(&self, frame: u32) -> Vec3 {
        let angle = -ease_out_circ(frame as f32 / INTRO_EASE_WINDOW) * PI * 2.0 * SWEEP_TURNS;
        let p = self.initial_eye;
        Vec3::new(
            p.x * angle.cos() + p.z * angle.sin(),
            SWEEP_HEIGHT,
            p.z * angle.cos() - p.x * angle.sin(),
        )
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }
}

/// Interactive orbit control: drag to rotate, scroll to zoom, velocity
/// damping for inertia and a gentle auto-rotate while idle.
pub struct OrbitController {
    yaw_velocity: f32,
    pitch_velocity: f32,
    zoom_velocity: f32,
    rotate_speed: f32,
    zoom_speed: f32,
    damping: f32,
    auto_rotate_speed: f32,
    min_radius: f32,
    max_radius: f32,
}

impl OrbitController {
    pub fn new() -> Self {
        Self {
            yaw_velocity: 0.0,
            pitch_velocity: 0.0,
            zoom_velocity: 0.0,
            rotate_speed: 0.005,
            zoom_speed: 0.001,
            damping: 8.0,
            auto_rotate_speed: 0.3,
            min_radius: 0.1,
            max_radius: 2000.0,
        }
    }

    /// Feed a pointer drag delta in pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw_velocity += dx * self.rotate_speed;
        self.pitch_velocity += dy * self.rotate_speed;
    }

    /// Feed a scroll delta; positive scroll zooms in.
    pub fn zoom(&mut self, scroll: f32) {
        self.zoom_velocity -= scroll * self.zoom_speed;
    }

    pub fn update(&mut self, cam: &mut OrbitCamera, dt: f32) {
        let offset = cam.eye - cam.target;
        let radius = offset.length().max(1e-4);

        let mut yaw = offset.x.atan2(offset.z);
        let mut pitch = (offset.y / radius).clamp(-1.0, 1.0).asin();

        yaw += self.yaw_velocity + self.auto_rotate_speed * dt;
        let max_pitch = std::f32::consts::FRAC_PI_2 - 0.01;
        pitch = (pitch + self.pitch_velocity).clamp(-max_pitch, max_pitch);
        let radius = (radius * (1.0 + self.zoom_velocity)).clamp(self.min_radius, self.max_radius);

        let decay = (-self.damping * dt).exp();
        self.yaw_velocity *= decay;
        self.pitch_velocity *= decay;
        self.zoom_velocity *= decay;

        let cp = pitch.cos();
        cam.eye = cam.target
            + Vec3::new(
                radius * cp * yaw.sin(),
                radius * pitch.sin(),
                radius * cp * yaw.cos(),
            );
    }
}

impl Default for OrbitController {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed symmetric orthographic frustum. The window is tiny and the far
/// plane huge; the model is normalized at load time to frame inside it.
pub fn projection() -> Mat4 {
    Mat4::orthographic_rh(
        -FRUSTUM_HALF_EXTENT,
        FRUSTUM_HALF_EXTENT,
        -FRUSTUM_HALF_EXTENT,
        FRUSTUM_HALF_EXTENT,
        FRUSTUM_NEAR,
        FRUSTUM_FAR,
    )
}

pub fn update_camera_buffer(queue: &Queue, camera_buf: &Buffer, camera: &OrbitCamera) {
    let vp = (projection() * camera.view()).to_cols_array();
    queue.write_buffer(camera_buf, 0, bytemuck::cast_slice(&[vp]));
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    fn sweep() -> IntroSweep {
        let initial = Vec3::new(
            20.0 * (0.2 * PI).sin(),
            SWEEP_HEIGHT,
            20.0 * (0.2 * PI).cos(),
        );
        IntroSweep::new(initial, Vec3::new(-0.5, 1.2, 0.0))
    }

    #[test]
    fn easing_stays_in_unit_interval() {
        for i in 0..=100 {
            let x = i as f32 / 100.0;
            let e = ease_out_circ(x);
            assert!(e.is_finite());
            assert!((0.0..=1.0).contains(&e), "ease({x}) = {e}");
        }
        assert!(ease_out_circ(0.0).abs() < EPS);
        assert!((ease_out_circ(1.0) - 1.0).abs() < EPS);
    }

    #[test]
    fn handoff_happens_before_easing_settles() {
        let e = ease_out_circ(INTRO_FRAME_CEILING as f32 / INTRO_EASE_WINDOW);
        assert!(e < 1.0);
        assert!(e > 0.99);
    }

    #[test]
    fn timer_is_monotonic_and_saturates() {
        let mut timer = IntroTimer::new();
        assert_eq!(timer.frame(), 0);
        let mut prev = 0;
        for _ in 0..300 {
            timer.tick();
            assert!(timer.frame() == prev + 1 || timer.frame() == prev);
            assert!(timer.frame() <= INTRO_FRAME_CEILING + 1);
            prev = timer.frame();
        }
        assert_eq!(timer.frame(), INTRO_FRAME_CEILING + 1);
    }

    #[test]
    fn phase_is_a_pure_function_of_the_frame() {
        let mut timer = IntroTimer::new();
        for _ in 0..300 {
            timer.tick();
            let expected = if timer.frame() <= INTRO_FRAME_CEILING {
                CameraPhase::Scripted
            } else {
                CameraPhase::Interactive
            };
            assert_eq!(timer.phase(), expected);
        }
        assert_eq!(timer.phase(), CameraPhase::Interactive);
    }

    #[test]
    fn sweep_pins_height_and_preserves_radius() {
        let sweep = sweep();
        let initial_radius = {
            let p = sweep.eye_at(0);
            (p.x * p.x + p.z * p.z).sqrt()
        };
        for frame in [0, 1, 25, 50, 75, 100] {
            let eye = sweep.eye_at(frame);
            assert!((eye.y - SWEEP_HEIGHT).abs() < EPS);
            let radius = (eye.x * eye.x + eye.z * eye.z).sqrt();
            assert!((radius - initial_radius).abs() < 1e-2);
        }
    }

    #[test]
    fn scripted_camera_always_faces_the_target() {
        let sweep = sweep();
        for frame in [0, 10, 40, 80, 100] {
            let cam = OrbitCamera::new(sweep.eye_at(frame), sweep.target());
            let in_view = cam.view().transform_point3(sweep.target());
            // Target sits on the view axis, in front of the camera.
            assert!(in_view.x.abs() < 1e-3, "frame {frame}: {in_view}");
            assert!(in_view.y.abs() < 1e-3, "frame {frame}: {in_view}");
            assert!(in_view.z < 0.0, "frame {frame}: {in_view}");
        }
    }

    #[test]
    fn sweep_never_returns_to_the_unrotated_pose() {
        // ease < 1 inside the scripted window, so the final scripted frame
        // is short of a whole number of turns.
        let sweep = sweep();
        let angle = ease_out_circ(INTRO_FRAME_CEILING as f32 / INTRO_EASE_WINDOW)
            * PI
            * 2.0
            * SWEEP_TURNS;
        let off_full_turn = angle % (2.0 * PI);
        assert!(off_full_turn.abs() > 1e-3);
        let start = sweep.eye_at(0);
        let end = sweep.eye_at(INTRO_FRAME_CEILING);
        assert!((start - end).length() > 1e-3);
    }

    #[test]
    fn drag_inertia_decays() {
        let mut cam = OrbitCamera::new(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO);
        let mut ctl = OrbitController::new();
        // Kill auto-rotate for a clean inertia reading.
        ctl.auto_rotate_speed = 0.0;
        ctl.rotate(100.0, 0.0);

        let dt = 1.0 / 60.0;
        let e0 = cam.eye;
        ctl.update(&mut cam, dt);
        let step1 = (cam.eye - e0).length();
        let e1 = cam.eye;
        ctl.update(&mut cam, dt);
        let step2 = (cam.eye - e1).length();

        assert!(step1 > 0.0);
        assert!(step2 < step1);
    }

    #[test]
    fn orbiting_preserves_distance_to_target() {
        let mut cam = OrbitCamera::new(Vec3::new(3.0, 4.0, 12.0), Vec3::new(-0.5, 1.2, 0.0));
        let mut ctl = OrbitController::new();
        let before = (cam.eye - cam.target).length();
        ctl.rotate(40.0, 25.0);
        for _ in 0..10 {
            ctl.update(&mut cam, 1.0 / 60.0);
        }
        let after = (cam.eye - cam.target).length();
        assert!((before - after).abs() < 1e-3);
    }

    #[test]
    fn scroll_zoom_moves_the_eye_closer() {
        let mut cam = OrbitCamera::new(Vec3::new(0.0, 5.0, 20.0), Vec3::ZERO);
        let mut ctl = OrbitController::new();
        ctl.auto_rotate_speed = 0.0;
        let before = (cam.eye - cam.target).length();
        ctl.zoom(120.0);
        ctl.update(&mut cam, 1.0 / 60.0);
        let after = (cam.eye - cam.target).length();
        assert!(after < before);
    }

    #[test]
    fn projection_is_the_fixed_symmetric_frustum() {
        let proj = projection();
        // Center of the near plane maps to NDC origin.
        let p = proj.project_point3(Vec3::new(0.0, 0.0, -FRUSTUM_NEAR));
        assert!(p.x.abs() < EPS && p.y.abs() < EPS);
        // Frustum edge lands on the NDC edge.
        let edge = proj.project_point3(Vec3::new(FRUSTUM_HALF_EXTENT, 0.0, -1.0));
        assert!((edge.x - 1.0).abs() < EPS);
    }
}
