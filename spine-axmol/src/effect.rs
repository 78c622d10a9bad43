use crate::Skeleton;
use glam::{Vec2, Vec4};

/// Per-vertex hook run over every vertex a skeleton emits.
///
/// Colors are normalized to `0..=1`, after premultiplication.
pub trait VertexEffect {
    fn begin(&mut self, skeleton: &Skeleton);
    fn transform(&mut self, position: &mut Vec2, uv: &mut Vec2, light: &mut Vec4, dark: &mut Vec4);
    fn end(&mut self);
}

/// Twists vertices around a point near the skeleton origin; strongest at the center, fading out
/// at `radius`.
#[derive(Clone, Debug, PartialEq)]
pub struct SwirlEffect {
    pub center: Vec2,
    pub radius: f32,
    /// Twist in degrees at the center.
    pub angle: f32,
    /// Exponent of the pow-out falloff.
    pub power: i32,
    world: Vec2,
    angle_radians: f32,
}

impl SwirlEffect {
    pub fn new(radius: f32) -> Self {
        Self {
            center: Vec2::ZERO,
            radius,
            angle: 0.0,
            power: 2,
            world: Vec2::ZERO,
            angle_radians: 0.0,
        }
    }

    fn pow_out(&self, a: f32) -> f32 {
        let sign = if self.power % 2 == 0 { -1.0 } else { 1.0 };
        (a - 1.0).powi(self.power) * sign + 1.0
    }
}

impl VertexEffect for SwirlEffect {
    fn begin(&mut self, skeleton: &Skeleton) {
        self.world = Vec2::new(skeleton.x, skeleton.y) + self.center;
        self.angle_radians = self.angle.to_radians();
    }

    fn transform(&mut self, position: &mut Vec2, _uv: &mut Vec2, _light: &mut Vec4, _dark: &mut Vec4) {
        let local = *position - self.world;
        let dist = local.length();
        if dist < self.radius {
            let theta = self.angle_radians * self.pow_out((self.radius - dist) / self.radius);
            *position = Vec2::from_angle(theta).rotate(local) + self.world;
        }
    }

    fn end(&mut self) {}
}
