use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

/// 2D vector on the arena ground plane (XZ)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub z: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, z: 0.0 };
    pub const ONE: Vec2 = Vec2 { x: 1.0, z: 1.0 };

    #[inline]
    pub fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    /// Unit forward vector for a vehicle rotation.
    ///
    /// Rotation 0 faces +Z; positive rotation turns toward +X.
    #[inline]
    pub fn from_heading(rotation: f32) -> Self {
        Self {
            x: rotation.sin(),
            z: rotation.cos(),
        }
    }

    /// Bearing of this vector under the same convention as
    /// [`from_heading`](Self::from_heading): `atan2(x, z)`.
    #[inline]
    pub fn bearing(&self) -> f32 {
        self.x.atan2(self.z)
    }

    #[inline]
    pub fn length(&self) -> f32 {
        (self.x * self.x + self.z * self.z).sqrt()
    }

    #[inline]
    pub fn length_sq(&self) -> f32 {
        self.x * self.x + self.z * self.z
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len > 0.0 {
            Self {
                x: self.x / len,
                z: self.z / len,
            }
        } else {
            Self::ZERO
        }
    }

    /// Returns normalized vector and original length
    pub fn normalize_with_length(&self) -> (Self, f32) {
        let len = self.length();
        if len > 0.0 {
            (
                Self {
                    x: self.x / len,
                    z: self.z / len,
                },
                len,
            )
        } else {
            (Self::ZERO, 0.0)
        }
    }

    #[inline]
    pub fn dot(&self, other: Vec2) -> f32 {
        self.x * other.x + self.z * other.z
    }

    #[inline]
    pub fn distance_to(&self, other: Vec2) -> f32 {
        (*self - other).length()
    }

    #[inline]
    pub fn distance_sq_to(&self, other: Vec2) -> f32 {
        (*self - other).length_sq()
    }

    pub fn clamp_length(&self, max: f32) -> Self {
        let len = self.length();
        if len > max && len > 0.0 {
            *self * (max / len)
        } else {
            *self
        }
    }

    pub fn lerp(&self, other: Vec2, t: f32) -> Self {
        *self + (other - *self) * t
    }

    /// Check if vector is approximately zero
    pub fn is_zero(&self, epsilon: f32) -> bool {
        self.x.abs() < epsilon && self.z.abs() < epsilon
    }

    /// Check if vector is approximately equal to another
    pub fn approx_eq(&self, other: Vec2, epsilon: f32) -> bool {
        (self.x - other.x).abs() < epsilon && (self.z - other.z).abs() < epsilon
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            z: self.z + rhs.z,
        }
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            z: self.z - rhs.z,
        }
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self {
            x: self.x * rhs,
            z: self.z * rhs,
        }
    }
}

impl Mul<Vec2> for f32 {
    type Output = Vec2;
    fn mul(self, rhs: Vec2) -> Vec2 {
        Vec2 {
            x: self * rhs.x,
            z: self * rhs.z,
        }
    }
}

impl Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self {
            x: -self.x,
            z: -self.z,
        }
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.z += rhs.z;
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.z -= rhs.z;
    }
}

impl MulAssign<f32> for Vec2 {
    fn mul_assign(&mut self, rhs: f32) {
        self.x *= rhs;
        self.z *= rhs;
    }
}

/// 3D position as it travels on the wire. The simulation runs on the XZ
/// plane; Y survives round trips so airborne clients render correctly.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    #[inline]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Ground-plane projection
    #[inline]
    pub fn xz(&self) -> Vec2 {
        Vec2 {
            x: self.x,
            z: self.z,
        }
    }

    #[inline]
    pub fn from_xz(v: Vec2, y: f32) -> Self {
        Self { x: v.x, y, z: v.z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Wrap an angle to `[-PI, PI]`
pub fn normalize_angle(mut angle: f32) -> f32 {
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_new() {
        let v = Vec2::new(3.0, 4.0);
        assert_eq!(v.x, 3.0);
        assert_eq!(v.z, 4.0);
    }

    #[test]
    fn test_length() {
        let v = Vec2::new(3.0, 4.0);
        assert!(approx_eq(v.length(), 5.0));
        assert!(approx_eq(v.length_sq(), 25.0));
    }

    #[test]
    fn test_normalize() {
        let v = Vec2::new(3.0, 4.0);
        let n = v.normalize();
        assert!(approx_eq(n.length(), 1.0));
        assert!(approx_eq(n.x, 0.6));
        assert!(approx_eq(n.z, 0.8));
    }

    #[test]
    fn test_normalize_zero() {
        assert_eq!(Vec2::ZERO.normalize(), Vec2::ZERO);
    }

    #[test]
    fn test_normalize_with_length() {
        let (n, len) = Vec2::new(3.0, 4.0).normalize_with_length();
        assert!(approx_eq(len, 5.0));
        assert!(approx_eq(n.length(), 1.0));
    }

    #[test]
    fn test_dot() {
        let a = Vec2::new(1.0, 2.0);
        let b = Vec2::new(3.0, 4.0);
        assert!(approx_eq(a.dot(b), 11.0));
    }

    #[test]
    fn test_distance() {
        let a = Vec2::ZERO;
        let b = Vec2::new(3.0, 4.0);
        assert!(approx_eq(a.distance_to(b), 5.0));
        assert!(approx_eq(a.distance_sq_to(b), 25.0));
    }

    #[test]
    fn test_clamp_length() {
        let v = Vec2::new(6.0, 8.0); // length = 10
        let clamped = v.clamp_length(5.0);
        assert!(approx_eq(clamped.length(), 5.0));
        assert!(approx_eq(clamped.x, 3.0));
        assert!(approx_eq(clamped.z, 4.0));
    }

    #[test]
    fn test_clamp_length_no_change() {
        let v = Vec2::new(1.0, 1.0);
        assert_eq!(v.clamp_length(5.0), v);
    }

    #[test]
    fn test_lerp() {
        let a = Vec2::ZERO;
        let b = Vec2::new(10.0, 20.0);
        let mid = a.lerp(b, 0.5);
        assert!(approx_eq(mid.x, 5.0));
        assert!(approx_eq(mid.z, 10.0));
    }

    #[test]
    fn test_heading_faces_positive_z_at_zero() {
        let h = Vec2::from_heading(0.0);
        assert!(approx_eq(h.x, 0.0));
        assert!(approx_eq(h.z, 1.0));
    }

    #[test]
    fn test_heading_turns_toward_positive_x() {
        let h = Vec2::from_heading(std::f32::consts::FRAC_PI_2);
        assert!(approx_eq(h.x, 1.0));
        assert!(approx_eq(h.z, 0.0));
    }

    #[test]
    fn test_bearing_roundtrip() {
        for rot in [-2.5f32, -1.0, 0.0, 0.7, 2.0] {
            let bearing = Vec2::from_heading(rot).bearing();
            assert!(
                approx_eq(normalize_angle(bearing - rot), 0.0),
                "rotation {} came back as {}",
                rot,
                bearing
            );
        }
    }

    #[test]
    fn test_operators() {
        let a = Vec2::new(1.0, 2.0);
        let b = Vec2::new(3.0, 4.0);
        assert_eq!(a + b, Vec2::new(4.0, 6.0));
        assert_eq!(b - a, Vec2::new(2.0, 2.0));
        assert_eq!(a * 2.0, Vec2::new(2.0, 4.0));
        assert_eq!(2.0 * a, Vec2::new(2.0, 4.0));
        assert_eq!(-a, Vec2::new(-1.0, -2.0));

        let mut c = a;
        c += b;
        assert_eq!(c, Vec2::new(4.0, 6.0));
        c -= b;
        assert_eq!(c, a);
        c *= 3.0;
        assert_eq!(c, Vec2::new(3.0, 6.0));
    }

    #[test]
    fn test_is_zero() {
        assert!(Vec2::ZERO.is_zero(1e-6));
        assert!(Vec2::new(1e-8, -1e-8).is_zero(1e-6));
        assert!(!Vec2::new(0.1, 0.0).is_zero(1e-6));
    }

    #[test]
    fn test_vec3_xz_projection() {
        let p = Vec3::new(1.0, 5.0, -2.0);
        assert_eq!(p.xz(), Vec2::new(1.0, -2.0));
        let back = Vec3::from_xz(p.xz(), p.y);
        assert_eq!(back, p);
    }

    #[test]
    fn test_vec3_is_finite() {
        assert!(Vec3::new(1.0, 0.0, -3.0).is_finite());
        assert!(!Vec3::new(f32::NAN, 0.0, 0.0).is_finite());
        assert!(!Vec3::new(0.0, f32::INFINITY, 0.0).is_finite());
    }

    #[test]
    fn test_normalize_angle_wraps() {
        use std::f32::consts::PI;
        assert!(approx_eq(normalize_angle(0.0), 0.0));
        assert!(approx_eq(normalize_angle(3.0 * PI), PI));
        assert!(approx_eq(normalize_angle(-3.0 * PI), -PI));
        assert!(approx_eq(normalize_angle(PI + 0.1), -PI + 0.1));
        assert!(approx_eq(normalize_angle(-PI - 0.1), PI - 0.1));
    }

    #[test]
    fn test_approx_eq_vectors() {
        let a = Vec2::new(1.0, 2.0);
        let b = Vec2::new(1.0 + 1e-7, 2.0 - 1e-7);
        assert!(a.approx_eq(b, 1e-5));
        assert!(!a.approx_eq(Vec2::new(1.1, 2.0), 1e-5));
    }
}
