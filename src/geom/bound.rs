use super::Vec3;

/// An axis-aligned bound in camera space.
///
/// Spec §3 (Scene Primitive): "an axis-aligned bound in camera space".
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bound3 {
    pub min: Vec3<f32>,
    pub max: Vec3<f32>,
}

impl Bound3 {
    pub const EMPTY: Self = Self {
        min: Vec3 { x: f32::INFINITY, y: f32::INFINITY, z: f32::INFINITY },
        max: Vec3 { x: f32::NEG_INFINITY, y: f32::NEG_INFINITY, z: f32::NEG_INFINITY },
    };

    pub fn point(p: Vec3<f32>) -> Self {
        Self { min: p, max: p }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// The union of `self` and `other`.
    ///
    /// Spec §3 (Motion Primitive): "Its bound is the union of per-snapshot
    /// bounds."
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: Vec3::partial_min(self.min, other.min),
            max: Vec3::partial_max(self.max, other.max),
        }
    }

    pub fn grow(&mut self, p: Vec3<f32>) {
        self.min = Vec3::partial_min(self.min, p);
        self.max = Vec3::partial_max(self.max, p);
    }

    pub fn extended(&self, by: f32) -> Self {
        Self {
            min: self.min - Vec3::broadcast(by),
            max: self.max + Vec3::broadcast(by),
        }
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Lies entirely behind `z`, i.e. every point of the bound has a depth
    /// greater than or equal to `z` (used for the §3 discard invariant: a
    /// primitive whose bound lies entirely behind a bucket's max-Z can be
    /// discarded).
    pub fn entirely_behind(&self, z: f32) -> bool {
        self.min.z >= z
    }

    pub fn longest_xy(&self) -> (f32, f32) {
        (
            (self.max.x - self.min.x).max(0.0),
            (self.max.y - self.min.y).max(0.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_covers_both_bounds() {
        let a = Bound3 { min: Vec3::new(0.0, 0.0, 0.0), max: Vec3::new(1.0, 1.0, 1.0) };
        let b = Bound3 { min: Vec3::new(-1.0, 2.0, 0.5), max: Vec3::new(0.5, 3.0, 2.0) };
        let u = a.union(&b);
        assert_eq!(u.min, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(u.max, Vec3::new(1.0, 3.0, 2.0));
    }

    #[test]
    fn entirely_behind_respects_min_z() {
        let b = Bound3 { min: Vec3::new(0.0, 0.0, 1.5), max: Vec3::new(1.0, 1.0, 3.0) };
        assert!(b.entirely_behind(1.5));
        assert!(!b.entirely_behind(1.6));
    }
}
