use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// 2D vector used for entity positions and circle directions
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn length(&self) -> f32 {
        self.length_sq().sqrt()
    }

    #[inline]
    pub fn length_sq(&self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len > 0.0 {
            Self {
                x: self.x / len,
                y: self.y / len,
            }
        } else {
            Self::ZERO
        }
    }

    /// True when a circle of `radius` centred here lies inside the square `[0, side]`
    pub fn circle_within_square(&self, radius: f32, side: f32) -> bool {
        self.x >= radius && self.x <= side - radius && self.y >= radius && self.y <= side - radius
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.0001
    }

    #[test]
    fn test_length() {
        assert!(approx_eq(Vec2::new(3.0, 4.0).length(), 5.0));
        assert!(approx_eq(Vec2::ZERO.length(), 0.0));
    }

    #[test]
    fn test_normalize() {
        let n = Vec2::new(0.0, 7.5).normalize();
        assert!(approx_eq(n.x, 0.0));
        assert!(approx_eq(n.y, 1.0));
        assert_eq!(Vec2::ZERO.normalize(), Vec2::ZERO);
    }

    #[test]
    fn test_ops() {
        let a = Vec2::new(1.0, 2.0);
        let b = Vec2::new(3.0, -1.0);
        assert_eq!(a + b, Vec2::new(4.0, 1.0));
        assert_eq!(a - b, Vec2::new(-2.0, 3.0));
        assert_eq!(a * 2.0, Vec2::new(2.0, 4.0));
    }

    #[test]
    fn test_circle_within_square() {
        let radius = 2.0_f32.sqrt();
        assert!(Vec2::new(500.0, 500.0).circle_within_square(radius, 1000.0));
        assert!(Vec2::new(radius, 1000.0 - radius).circle_within_square(radius, 1000.0));
        assert!(!Vec2::new(1.0, 500.0).circle_within_square(radius, 1000.0));
        assert!(!Vec2::new(500.0, 999.5).circle_within_square(radius, 1000.0));
    }

    #[test]
    fn test_is_finite() {
        assert!(Vec2::new(1.0, 2.0).is_finite());
        assert!(!Vec2::new(f32::NAN, 2.0).is_finite());
    }

    #[test]
    fn test_serde() {
        let v = Vec2::new(1.5, -2.5);
        let json = serde_json::to_string(&v).unwrap();
        let back: Vec2 = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }
}
