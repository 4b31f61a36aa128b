/// Camera pose and per-frame projection.
/// Free 6-DoF pose (yaw, pitch, roll); the renderer only ever sees the
/// derived `CameraFrame`.
use glam::{EulerRot, Mat4, Quat, Vec2, Vec3, Vec4};

/// Below this magnitude the vanishing point's homogeneous `w` is replaced.
pub const VANISHING_EPSILON: f32 = 1e-4;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub yaw: f32,   // Rotation around Y axis (radians)
    pub pitch: f32, // Rotation around X axis (radians)
    pub roll: f32,  // Rotation around the view axis (radians)
    pub fov: f32,   // Vertical field of view (radians)
    pub near: f32,
}

impl Camera {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            fov: 70.0f32.to_radians(),
            near: 0.1,
        }
    }

    /// Update camera orientation to look at a specific target point.
    /// Roll is reset; `up` must not be parallel to the view direction.
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let view_matrix = Mat4::look_at_rh(self.position, target, up);
        let rotation_quat = Quat::from_mat4(&view_matrix.inverse());
        let (yaw, pitch, roll) = rotation_quat.to_euler(EulerRot::YXZ);
        self.yaw = yaw;
        self.pitch = pitch;
        self.roll = roll;
    }

    /// Rotation-only view matrix. Translation is applied by callers
    /// subtracting the eye position, which keeps far-away coordinates exact.
    pub fn view_rotation(&self) -> Mat4 {
        Mat4::from_quat(self.rotation_quat().inverse())
    }

    pub fn projection_matrix(&self, aspect_ratio: f32, far: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov, aspect_ratio, self.near, far.max(self.near * 2.0))
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation_quat() * Vec3::NEG_Z
    }

    fn rotation_quat(&self) -> Quat {
        Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(self.pitch) * Quat::from_rotation_z(self.roll)
    }
}

/// Everything the renderer needs from the camera for one frame.
#[derive(Clone, Debug)]
pub struct CameraFrame {
    /// Camera-relative world to clip transform (projection * rotation).
    pub clip: Mat4,
    pub inv_clip: Mat4,
    pub eye: Vec3,
    pub width: f32,
    pub height: f32,
    pub near: f32,
    pub far_clip: f32,
    /// Ascending distances at which rays move to the next coarser level.
    pub lod_distances: Vec<f32>,
    /// Clip-space image of world up, `w` kept away from zero.
    pub up_clip: Vec4,
    /// Screen position of the vertical vanishing point. May lie anywhere,
    /// including far outside the screen.
    pub vanishing_point: Vec2,
    /// True when the zenith is in front of the camera: moving away from the
    /// vanishing point on screen descends in world height.
    pub vp_is_up: bool,
}

impl CameraFrame {
    pub fn compute(camera: &Camera, screen: (u32, u32), far_clip: f32, lod_distances: &[f32]) -> Self {
        let width = screen.0.max(1) as f32;
        let height = screen.1.max(1) as f32;
        let clip = camera.projection_matrix(width / height, far_clip) * camera.view_rotation();
        let inv_clip = clip.inverse();

        let mut up_clip = clip * Vec4::new(0.0, 1.0, 0.0, 0.0);
        if up_clip.w.abs() < VANISHING_EPSILON {
            up_clip.w = if up_clip.w < 0.0 {
                -VANISHING_EPSILON
            } else {
                VANISHING_EPSILON
            };
        }
        let vp_ndc = Vec2::new(up_clip.x / up_clip.w, up_clip.y / up_clip.w);

        let mut frame = Self {
            clip,
            inv_clip,
            eye: camera.position,
            width,
            height,
            near: camera.near,
            far_clip,
            lod_distances: lod_distances.to_vec(),
            up_clip,
            vanishing_point: Vec2::ZERO,
            vp_is_up: up_clip.w > 0.0,
        };
        frame.vanishing_point = frame.ndc_to_screen(vp_ndc);
        frame
    }

    #[inline]
    pub fn ndc_to_screen(&self, ndc: Vec2) -> Vec2 {
        Vec2::new((ndc.x + 1.0) * 0.5 * self.width, (1.0 - ndc.y) * 0.5 * self.height)
    }

    #[inline]
    pub fn screen_to_ndc(&self, screen: Vec2) -> Vec2 {
        Vec2::new(screen.x / self.width * 2.0 - 1.0, 1.0 - screen.y / self.height * 2.0)
    }

    /// Screen position of a world point, `None` in front of the near plane.
    pub fn project(&self, world: Vec3) -> Option<Vec2> {
        let clip = self.clip * (world - self.eye).extend(1.0);
        if clip.w < self.near {
            return None;
        }
        Some(self.ndc_to_screen(Vec2::new(clip.x / clip.w, clip.y / clip.w)))
    }

    /// World-space direction of the line of sight through a screen point.
    pub fn unproject_dir(&self, screen: Vec2) -> Vec3 {
        let ndc = self.screen_to_ndc(screen);
        let p = self.inv_clip * Vec4::new(ndc.x, ndc.y, 0.0, 1.0);
        let dir = p.truncate() / p.w;
        dir.try_normalize().unwrap_or(Vec3::NEG_Z)
    }

    /// Clip-space image of a camera-relative direction `(dx, 0, dz)`.
    #[inline]
    pub fn horizontal_clip(&self, dir: Vec2) -> Vec4 {
        self.clip.col(0) * dir.x + self.clip.col(2) * dir.y
    }

    #[inline]
    pub fn eye_xz(&self) -> Vec2 {
        Vec2::new(self.eye.x, self.eye.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn frame(camera: &Camera) -> CameraFrame {
        CameraFrame::compute(camera, (320, 200), 1000.0, &[64.0, 128.0])
    }

    #[test]
    fn level_camera_puts_vanishing_point_far_above() {
        let camera = Camera::new(Vec3::new(0.0, 10.0, 0.0));
        let frame = frame(&camera);
        assert!(frame.vp_is_up, "horizontal view should be substituted as looking up");
        assert!(frame.vanishing_point.y < -1.0e4, "vp at {:?}", frame.vanishing_point);
        assert!((frame.vanishing_point.x - 160.0).abs() < 1.0);
    }

    #[test]
    fn looking_down_puts_vanishing_point_below_center() {
        let mut camera = Camera::new(Vec3::new(0.0, 10.0, 0.0));
        camera.pitch = -0.5;
        let frame = frame(&camera);
        assert!(!frame.vp_is_up);
        assert!(frame.vanishing_point.y > 100.0);

        camera.pitch = -FRAC_PI_2;
        let frame = super::CameraFrame::compute(&camera, (320, 200), 1000.0, &[]);
        assert!((frame.vanishing_point - Vec2::new(160.0, 100.0)).length() < 0.5);
    }

    #[test]
    fn roll_moves_vanishing_point_sideways() {
        let mut camera = Camera::new(Vec3::ZERO);
        camera.pitch = 0.6;
        camera.roll = FRAC_PI_2;
        let frame = frame(&camera);
        assert!(frame.vp_is_up);
        assert!(
            frame.vanishing_point.x < 0.0 || frame.vanishing_point.x > 320.0,
            "rolled vp should leave the screen sideways, got {:?}",
            frame.vanishing_point
        );
    }

    #[test]
    fn project_and_unproject_agree() {
        let mut camera = Camera::new(Vec3::new(5.0, 20.0, -3.0));
        camera.yaw = 0.7;
        camera.pitch = -0.3;
        camera.roll = 0.2;
        let frame = frame(&camera);
        let target = Vec3::new(30.0, 4.0, -40.0);
        let screen = frame.project(target).expect("target should be in front");
        let dir = frame.unproject_dir(screen);
        let expected = (target - camera.position).normalize();
        assert!(dir.dot(expected) > 0.9999, "dir {dir:?} expected {expected:?}");
    }

    #[test]
    fn look_at_faces_target() {
        let mut camera = Camera::new(Vec3::new(0.0, 10.0, 0.0));
        camera.look_at(Vec3::new(10.0, 0.0, -10.0), Vec3::Y);
        let expected = Vec3::new(10.0, -10.0, -10.0).normalize();
        assert!(camera.forward().dot(expected) > 0.999);
        assert!(camera.roll.abs() < 1e-4);
    }
}
