use ultraviolet::{projection, Mat4, Vec2, Vec3};
use winit::event::VirtualKeyCode;

#[derive(Debug)]
pub struct Camera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub settings: CameraSettings,

    move_speed: f32,
    look_sensitivity: f32,
}

#[derive(Debug)]
pub struct CameraSettings {
    pub z_near: f32,
    pub z_far: f32,
    pub fov: f32,
    pub aspect_ratio: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            z_near: 0.1,
            z_far: 100.0,
            fov: 60.0,
            aspect_ratio: 1.0,
        }
    }
}

impl Camera {
    pub fn new(aspect_ratio: f32) -> Self {
        Self {
            position: Vec3::new(0.0, 2.0, 8.0),
            yaw: 0.0,
            pitch: 0.0,
            settings: CameraSettings {
                aspect_ratio,
                ..Default::default()
            },
            move_speed: 5.0,
            look_sensitivity: 0.002,
        }
    }

    fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.sin() * self.pitch.cos(),
            self.pitch.sin(),
            -self.yaw.cos() * self.pitch.cos(),
        )
    }

    pub fn view_matrix(&self) -> Mat4 {
        let target = self.position + self.forward();
        Mat4::look_at(self.position, target, Vec3::unit_y())
    }

    pub fn projection_matrix(&self) -> Mat4 {
        projection::perspective_vk(
            self.settings.fov.to_radians(),
            self.settings.aspect_ratio,
            self.settings.z_near,
            self.settings.z_far,
        )
    }

    pub fn update_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.settings.aspect_ratio = aspect_ratio;
    }

    pub fn apply_mouse_delta(&mut self, delta: Vec2) {
        self.yaw += delta.x * self.look_sensitivity;
        self.pitch = (self.pitch - delta.y * self.look_sensitivity)
            .clamp(-std::f32::consts::FRAC_PI_2 + 0.01, std::f32::consts::FRAC_PI_2 - 0.01);
    }

    pub fn apply_movement(&mut self, pressed_keys: &[VirtualKeyCode], delta_seconds: f32) {
        let forward = self.forward();
        let right = forward.cross(Vec3::unit_y()).normalized();

        let mut direction = Vec3::zero();
        for key in pressed_keys {
            match key {
                VirtualKeyCode::W => direction += forward,
                VirtualKeyCode::S => direction -= forward,
                VirtualKeyCode::D => direction += right,
                VirtualKeyCode::A => direction -= right,
                VirtualKeyCode::Space => direction += Vec3::unit_y(),
                VirtualKeyCode::LShift => direction -= Vec3::unit_y(),
                _ => {}
            }
        }

        if direction.mag_sq() > 0.0 {
            self.position += direction.normalized() * self.move_speed * delta_seconds;
        }
    }
}
