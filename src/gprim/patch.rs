use super::SplitAxis;
use crate::geom::{Bound3, Vec2, Vec3};

/// A bilinear patch: four camera-space control points in parametric order
/// `(0,0) (1,0) (0,1) (1,1)`.
///
/// This is the simplest concrete realization of the `Dice`/`Split`/`Bound`
/// contract all GPrim kinds reduce to (NURBS, quadrics, and subdivision
/// surfaces are out of scope for this core).
#[derive(Copy, Clone, Debug)]
pub struct Patch {
    pub p00: Vec3<f32>,
    pub p10: Vec3<f32>,
    pub p01: Vec3<f32>,
    pub p11: Vec3<f32>,
}

impl Patch {
    pub fn corners(&self) -> [Vec3<f32>; 4] {
        [self.p00, self.p10, self.p01, self.p11]
    }

    pub fn bound(&self) -> Bound3 {
        let mut b = Bound3::point(self.p00);
        b.grow(self.p10);
        b.grow(self.p01);
        b.grow(self.p11);
        b
    }

    /// Evaluate the patch surface at parametric `(u, v)`.
    pub fn eval(&self, u: f32, v: f32) -> Vec3<f32> {
        let top = self.p00 + (self.p10 - self.p00) * u;
        let bot = self.p01 + (self.p11 - self.p01) * u;
        top + (bot - top) * v
    }

    pub fn raster_extent(&self, raster_of: impl Fn(Vec3<f32>) -> Vec2<f32>) -> (f32, f32) {
        let a = raster_of(self.p00);
        let b = raster_of(self.p10);
        let c = raster_of(self.p01);
        let d = raster_of(self.p11);
        let lu = (a - b).magnitude().max((c - d).magnitude());
        let lv = (a - c).magnitude().max((b - d).magnitude());
        (lu, lv)
    }

    /// Halve the patch along `axis`, each half inheriting exactly the
    /// control points needed to reproduce the parent surface with no crack
    /// at the shared edge (the shared edge's points are literally shared,
    /// not re-evaluated, which is what gives C0 continuity).
    pub fn split(&self, axis: SplitAxis) -> (Patch, Patch) {
        match axis {
            SplitAxis::U => {
                let mid_top = self.eval(0.5, 0.0);
                let mid_bot = self.eval(0.5, 1.0);
                (
                    Patch { p00: self.p00, p10: mid_top, p01: self.p01, p11: mid_bot },
                    Patch { p00: mid_top, p10: self.p10, p01: mid_bot, p11: self.p11 },
                )
            }
            SplitAxis::V => {
                let mid_left = self.eval(0.0, 0.5);
                let mid_right = self.eval(1.0, 0.5);
                (
                    Patch { p00: self.p00, p10: self.p10, p01: mid_left, p11: mid_right },
                    Patch { p00: mid_left, p10: mid_right, p01: self.p01, p11: self.p11 },
                )
            }
        }
    }
}
