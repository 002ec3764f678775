use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// A position in galactic coordinates, in light-years.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3D {
    pub const ORIGIN: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Point3D) -> f64 {
        self.distance_squared(other).sqrt()
    }

    pub fn distance_squared(&self, other: &Point3D) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    pub fn dot(&self, other: &Point3D) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(&self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn axis(&self, axis: usize) -> f64 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Moves `distance` light-years from `self` toward `target`, stopping at
    /// `target` if it is closer than that.
    pub fn towards(&self, target: &Point3D, distance: f64) -> Point3D {
        let remaining = self.distance(target);
        if remaining <= distance || remaining == 0.0 {
            return *target;
        }
        *self + (*target - *self) * (distance / remaining)
    }

    /// Perpendicular distance from `self` to the infinite line through `a` and `b`.
    ///
    /// A degenerate line (a == b) measures the distance to `a`.
    pub fn distance_to_line(&self, a: &Point3D, b: &Point3D) -> f64 {
        let line = *b - *a;
        let len2 = line.dot(&line);
        if len2 == 0.0 {
            return self.distance(a);
        }
        let t = (*self - *a).dot(&line) / len2;
        let foot = *a + line * t;
        self.distance(&foot)
    }
}

impl From<[f64; 3]> for Point3D {
    fn from(p: [f64; 3]) -> Self {
        Point3D::new(p[0], p[1], p[2])
    }
}

impl From<Point3D> for [f64; 3] {
    fn from(p: Point3D) -> Self {
        [p.x, p.y, p.z]
    }
}

impl Add for Point3D {
    type Output = Point3D;

    fn add(self, rhs: Self) -> Self::Output {
        Point3D::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Point3D {
    type Output = Point3D;

    fn sub(self, rhs: Self) -> Self::Output {
        Point3D::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Point3D {
    type Output = Point3D;

    fn mul(self, rhs: f64) -> Self::Output {
        Point3D::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}
