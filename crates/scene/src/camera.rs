//! Perspective camera over the local tangent frame.
//!
//! Follows map conventions: `pitch` is measured from straight down, `bearing`
//! is clockwise from north, and at the view center one screen pixel covers
//! `meters_per_pixel(lat, zoom)` on the ground.

use foundation::math::mercator::meters_per_pixel;
use foundation::math::{LngLat, LocalFrame, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::picking::Ray;

pub const MIN_ZOOM: f64 = 0.0;
pub const MAX_ZOOM: f64 = 22.0;
pub const MAX_PITCH_DEG: f64 = 85.0;

/// Vertical field of view, `2 * atan(1/3)`.
pub const FOV_Y_DEG: f64 = 36.869_897_645_844_02;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: f64,
    pub pitch: f64,
    #[serde(default)]
    pub bearing: f64,
}

impl ViewState {
    /// Opening view over central Zagreb.
    pub fn initial() -> Self {
        Self {
            latitude: 45.815,
            longitude: 15.9819,
            zoom: 15.0,
            pitch: 60.0,
            bearing: 0.0,
        }
    }

    pub fn center(&self) -> LngLat {
        LngLat::new(self.longitude, self.latitude)
    }

    fn clamped(mut self) -> Self {
        self.zoom = self.zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        self.pitch = self.pitch.clamp(0.0, MAX_PITCH_DEG);
        self.bearing = self.bearing.rem_euclid(360.0);
        self
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::initial()
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera {
    view: ViewState,
    frame: LocalFrame,
    width_px: f64,
    height_px: f64,
    target: Vec3,
    eye: Vec3,
    forward: Vec3,
    right: Vec3,
    up: Vec3,
    distance: f64,
}

impl Camera {
    /// Camera whose local frame is anchored at the view center.
    pub fn from_view(view: ViewState, width_px: f64, height_px: f64) -> Self {
        Self::with_frame(LocalFrame::new(view.center()), view, width_px, height_px)
    }

    /// Camera over an existing frame, so scene geometry stays valid while the view moves.
    pub fn with_frame(frame: LocalFrame, view: ViewState, width_px: f64, height_px: f64) -> Self {
        let mut cam = Self {
            view: view.clamped(),
            frame,
            width_px,
            height_px,
            target: Vec3::ZERO,
            eye: Vec3::ZERO,
            forward: Vec3::ZERO,
            right: Vec3::ZERO,
            up: Vec3::ZERO,
            distance: 0.0,
        };
        cam.rebuild();
        cam
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn frame(&self) -> &LocalFrame {
        &self.frame
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn viewport(&self) -> (f64, f64) {
        (self.width_px, self.height_px)
    }

    pub fn resize(&mut self, width_px: f64, height_px: f64) {
        self.width_px = width_px;
        self.height_px = height_px;
        self.rebuild();
    }

    pub fn set_view(&mut self, view: ViewState) {
        self.view = view.clamped();
        self.rebuild();
    }

    /// Rotates around the view center. Degrees.
    pub fn orbit(&mut self, d_bearing: f64, d_pitch: f64) {
        self.view.bearing += d_bearing;
        self.view.pitch += d_pitch;
        self.set_view(self.view);
    }

    /// Drags the map by a screen delta so ground content follows the pointer.
    pub fn pan(&mut self, dx_px: f64, dy_px: f64) {
        let mpp = self.meters_per_pixel();
        let b = self.view.bearing.to_radians();
        let right = Vec2::new(b.cos(), -b.sin());
        let ahead = Vec2::new(b.sin(), b.cos());
        let dx = -right.x * dx_px * mpp + ahead.x * dy_px * mpp;
        let dy = -right.y * dx_px * mpp + ahead.y * dy_px * mpp;
        let center = self
            .frame
            .to_lng_lat(Vec3::new(self.target.x + dx, self.target.y + dy, 0.0));
        self.view.longitude = center.lng;
        self.view.latitude = center.lat;
        self.set_view(self.view);
    }

    pub fn zoom_by(&mut self, delta: f64) {
        self.view.zoom += delta;
        self.set_view(self.view);
    }

    pub fn meters_per_pixel(&self) -> f64 {
        meters_per_pixel(self.view.latitude, self.view.zoom)
    }

    fn aspect(&self) -> f64 {
        if self.height_px <= 0.0 {
            1.0
        } else {
            (self.width_px / self.height_px).max(1e-6)
        }
    }

    fn rebuild(&mut self) {
        let half_fov = (FOV_Y_DEG * 0.5).to_radians();
        let height = self.height_px.max(1.0);
        self.distance = (height * 0.5) / half_fov.tan() * self.meters_per_pixel();

        let center = self.frame.to_local(self.view.center(), 0.0);
        self.target = Vec3::new(center.x, center.y, 0.0);

        let p = self.view.pitch.to_radians();
        let b = self.view.bearing.to_radians();
        let ahead = Vec3::new(b.sin(), b.cos(), 0.0);
        let offset = ahead * (-p.sin()) + Vec3::new(0.0, 0.0, p.cos());
        self.eye = self.target + offset * self.distance;
        self.forward = -offset;
        self.up = ahead * p.cos() + Vec3::new(0.0, 0.0, p.sin());
        self.right = self.forward.cross(self.up);
    }

    /// Ray through a canvas pixel (origin top-left, y down).
    pub fn screen_ray(&self, x_px: f64, y_px: f64) -> Option<Ray> {
        if self.width_px <= 0.0 || self.height_px <= 0.0 {
            return None;
        }
        let ndc_x = 2.0 * x_px / self.width_px - 1.0;
        let ndc_y = 1.0 - 2.0 * y_px / self.height_px;
        let tan_half = (FOV_Y_DEG * 0.5).to_radians().tan();
        let dir = self.forward
            + self.right * (ndc_x * tan_half * self.aspect())
            + self.up * (ndc_y * tan_half);
        Some(Ray::new(self.eye, dir.normalized()?))
    }

    /// Intersection of `ray` with the ground plane `z = 0`.
    pub fn ground_point(ray: &Ray) -> Option<Vec3> {
        if ray.dir.z > -1e-12 {
            return None;
        }
        let t = -ray.origin.z / ray.dir.z;
        if t < 0.0 {
            return None;
        }
        Some(ray.origin + ray.dir * t)
    }

    /// Column-major view-projection matrix with depth in `[0, 1]`.
    pub fn view_proj(&self) -> [[f32; 4]; 4] {
        let near = (self.distance * 0.01).max(0.5);
        let far = self.distance * 100.0;
        let proj = perspective_rh_z0(FOV_Y_DEG.to_radians(), self.aspect(), near, far);
        let view = look_at_rh(self.eye, self.target, self.up);
        let m = mat4_mul(&proj, &view);
        let mut out = [[0.0f32; 4]; 4];
        for (col, src) in out.iter_mut().zip(m.iter()) {
            for (dst, v) in col.iter_mut().zip(src.iter()) {
                *dst = *v as f32;
            }
        }
        out
    }
}

type Mat4 = [[f64; 4]; 4];

fn mat4_mul(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut c = [[0.0; 4]; 4];
    for col in 0..4 {
        for row in 0..4 {
            c[col][row] = (0..4).map(|k| a[k][row] * b[col][k]).sum();
        }
    }
    c
}

fn perspective_rh_z0(fov_y_rad: f64, aspect: f64, near: f64, far: f64) -> Mat4 {
    let f = 1.0 / (0.5 * fov_y_rad).tan();
    [
        [f / aspect, 0.0, 0.0, 0.0],
        [0.0, f, 0.0, 0.0],
        [0.0, 0.0, far / (near - far), -1.0],
        [0.0, 0.0, near * far / (near - far), 0.0],
    ]
}

fn look_at_rh(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    let f = (target - eye).normalized().unwrap_or(Vec3::new(0.0, 0.0, -1.0));
    let s = f.cross(up).normalized().unwrap_or(Vec3::new(1.0, 0.0, 0.0));
    let u = s.cross(f);
    [
        [s.x, u.x, -f.x, 0.0],
        [s.y, u.y, -f.y, 0.0],
        [s.z, u.z, -f.z, 0.0],
        [-s.dot(eye), -u.dot(eye), f.dot(eye), 1.0],
    ]
}
