//! The Micropolygon (MP): spec §3 — four camera-space corners + per-corner
//! shaded data + depth, plus the geometric tests the hider needs.

use std::collections::HashMap;

use crate::geom::motion::{lerp_time, Motion};
use crate::geom::{Bound3, Vec2, Vec3};
use crate::grid::ShadedPoint;

/// A quad-shaped shaded element. For triangle-degenerate rows (two corners
/// coincide) the point-in-MP test below degrades gracefully to a triangle
/// test since the degenerate edge has zero length.
///
/// Spec §4.3 motion rule: "color/opacity are assumed constant across motion
/// times; only P varies per-time" — so `corners` carries the single shading
/// result (from `t0`) while `motion`, when present, carries the per-time
/// camera-space corner positions the hider lerps between.
#[derive(Clone, Debug)]
pub struct Micropolygon {
    pub corners: [ShadedPoint; 4],
    /// Raster-space projections of the four corners at `time`, same order
    /// as `corners`: `(0,0) (1,0) (0,1) (1,1)`.
    pub raster: [Vec2<f32>; 4],
    pub time: f32,
    /// Per-time camera-space corner positions for a motion MP (spec §3:
    /// "Motion MPs carry per-time positions").
    pub motion: Option<Motion<[Vec3<f32>; 4]>>,
    /// Carried from the parent primitive's attributes; a matte MP is
    /// excluded from the hider's simple-opaque fast path even when fully
    /// opaque, since it still needs its own sample record for holdout
    /// compositing (spec §4.4).
    pub matte: bool,
    /// `Some` when this MP belongs to a CSG solid; `None` for ordinary
    /// geometry. Threaded straight into `SampleRecord` by the hider so
    /// `resolve_csg` can group records by solid.
    pub csg_node_id: Option<u32>,
}

const AREA_EPSILON: f32 = 1.0e-8;

impl Micropolygon {
    /// Signed area of the quad (sum of the two triangles' signed areas),
    /// used for the spec §3 invariant "MPs with |area| <= eps are
    /// discarded".
    pub fn signed_area(&self) -> f32 {
        let [a, b, c, d] = self.raster;
        0.5 * (cross2(b - a, c - a) + cross2(b - d, c - d))
    }

    pub fn is_degenerate(&self) -> bool {
        self.signed_area().abs() <= AREA_EPSILON
    }

    /// Raster-space bounding rectangle (spec §3 invariant: "an MP's
    /// raster-space bounding rectangle is computable and finite").
    pub fn raster_bound(&self) -> (Vec2<f32>, Vec2<f32>) {
        let min = self.raster.iter().fold(Vec2::broadcast(f32::INFINITY), |a, &b| Vec2::partial_min(a, b));
        let max = self.raster.iter().fold(Vec2::broadcast(f32::NEG_INFINITY), |a, &b| Vec2::partial_max(a, b));
        (min, max)
    }

    /// Union of per-time raster bounds for a motion MP (spec §4.4:
    /// "bbox := raster_bound(MP, motion? union over time)").
    pub fn raster_bound_over_time<'a>(mps: impl Iterator<Item = &'a Micropolygon>) -> (Vec2<f32>, Vec2<f32>) {
        mps.fold(
            (Vec2::broadcast(f32::INFINITY), Vec2::broadcast(f32::NEG_INFINITY)),
            |(amin, amax), mp| {
                let (mn, mx) = mp.raster_bound();
                (Vec2::partial_min(amin, mn), Vec2::partial_max(amax, mx))
            },
        )
    }

    /// Point-in-MP test via splitting the quad into two triangles (a,b,c)
    /// and (b,d,c), matching the corner winding used throughout this crate.
    /// Returns the barycentric weights of whichever triangle contains `p`,
    /// tagged by which triangle matched, or `None` if outside both.
    pub fn hit_test(&self, p: Vec2<f32>) -> Option<Hit> {
        hit_test_quad(self.raster, p)
    }

    /// Interpolated camera-space depth at a hit.
    pub fn interpolate_depth(&self, hit: &Hit) -> f32 {
        let z = |i: usize| self.corners[i].p.z;
        match hit.tri {
            Tri::Abc => hit.w.0 * z(0) + hit.w.1 * z(1) + hit.w.2 * z(2),
            Tri::Bdc => hit.w.0 * z(1) + hit.w.1 * z(3) + hit.w.2 * z(2),
        }
    }

    /// Interpolated shaded data (Ci/Oi/N/P) at a hit.
    pub fn interpolate_shaded(&self, hit: &Hit) -> ShadedPoint {
        let idx = match hit.tri {
            Tri::Abc => [0usize, 1, 2],
            Tri::Bdc => [1, 3, 2],
        };
        let (w0, w1, w2) = hit.w;
        let lerp3 = |f: fn(&ShadedPoint) -> Vec3<f32>| {
            f(&self.corners[idx[0]]) * w0 + f(&self.corners[idx[1]]) * w1 + f(&self.corners[idx[2]]) * w2
        };
        let mut vars = HashMap::new();
        for name in self.corners[idx[0]].vars.keys() {
            let a = &self.corners[idx[0]].vars[name];
            let b = &self.corners[idx[1]].vars[name];
            let c = &self.corners[idx[2]].vars[name];
            let lerped = a.iter().zip(b).zip(c).map(|((a, b), c)| a * w0 + b * w1 + c * w2).collect();
            vars.insert(name.clone(), lerped);
        }
        ShadedPoint {
            p: lerp3(|s| s.p),
            n: lerp3(|s| s.n),
            ci: lerp3(|s| s.ci),
            oi: lerp3(|s| s.oi),
            vars,
        }
    }

    pub fn camera_bound(&self) -> Bound3 {
        self.corners.iter().fold(Bound3::EMPTY, |mut b, c| {
            b.grow(c.p);
            b
        })
    }

    pub fn is_moving(&self) -> bool {
        self.motion.is_some()
    }

    /// Spec §4.4's `apply()` fast-path test: "if the primitive is fully
    /// opaque ... and not CSG and not matte" the hider can overwrite the
    /// sample in place instead of inserting it into the CSG/transparency
    /// list.
    pub fn is_simple_opaque(&self) -> bool {
        if self.matte || self.csg_node_id.is_some() {
            return false;
        }
        self.corners.iter().all(|c| c.oi.x >= 1.0 && c.oi.y >= 1.0 && c.oi.z >= 1.0)
    }

    /// Raster-space bound used for routing/clipping (spec §4.4: "bbox :=
    /// raster_bound(MP, motion? union over time)"). For a moving MP this
    /// unions the bound across every motion snapshot time, re-projecting
    /// through `raster_of` rather than trusting the cached `raster` field
    /// (which only holds the `t0` projection).
    pub fn hiding_bound(&self, raster_of: impl Fn(Vec3<f32>) -> Vec2<f32>) -> (Vec2<f32>, Vec2<f32>) {
        let Some(motion) = &self.motion else { return self.raster_bound() };
        let mut min = Vec2::broadcast(f32::INFINITY);
        let mut max = Vec2::broadcast(f32::NEG_INFINITY);
        for &t in motion.times() {
            for p in self.positions_at(t) {
                let r = raster_of(p);
                min = Vec2::partial_min(min, r);
                max = Vec2::partial_max(max, r);
            }
        }
        (min, max)
    }

    /// Interpolated camera-space corner positions at `time` (spec §4.4: "if
    /// MP.motion: positions := lerp(MP[t_i], MP[t_{i+1}], alpha(s.time))").
    /// Falls back to the static corner positions when this MP isn't moving.
    pub fn positions_at(&self, time: f32) -> [Vec3<f32>; 4] {
        match &self.motion {
            None => [self.corners[0].p, self.corners[1].p, self.corners[2].p, self.corners[3].p],
            Some(m) => {
                let (i0, i1, alpha) = m.bracket(time);
                let a = m.snapshots()[i0];
                let b = m.snapshots()[i1];
                [
                    lerp_time(a[0], b[0], alpha),
                    lerp_time(a[1], b[1], alpha),
                    lerp_time(a[2], b[2], alpha),
                    lerp_time(a[3], b[3], alpha),
                ]
            }
        }
    }

    /// Hit-test at an arbitrary sample `time`, re-deriving raster positions
    /// through `raster_of` when the MP is moving rather than trusting the
    /// cached `raster` field (which only holds the `t0` projection).
    pub fn hit_test_at(&self, raster_of: impl Fn(Vec3<f32>) -> Vec2<f32>, time: f32, p: Vec2<f32>) -> Option<(Hit, f32)> {
        if !self.is_moving() {
            let hit = self.hit_test(p)?;
            let z = self.interpolate_depth(&hit);
            return Some((hit, z));
        }
        let positions = self.positions_at(time);
        let raster = [
            raster_of(positions[0]),
            raster_of(positions[1]),
            raster_of(positions[2]),
            raster_of(positions[3]),
        ];
        let hit = hit_test_quad(raster, p)?;
        let z = depth_at_hit(positions, &hit);
        Some((hit, z))
    }

    /// Hit-test against an explicit set of camera-space corner positions
    /// rather than the MP's own motion-interpolated ones. Used by the hider
    /// once depth-of-field has perturbed each corner's (x, y) before
    /// projection, so the lens offset is baked into `positions` by the
    /// caller.
    pub fn hit_test_with_positions(
        &self,
        positions: [Vec3<f32>; 4],
        raster_of: impl Fn(Vec3<f32>) -> Vec2<f32>,
        p: Vec2<f32>,
    ) -> Option<(Hit, f32)> {
        let raster = [
            raster_of(positions[0]),
            raster_of(positions[1]),
            raster_of(positions[2]),
            raster_of(positions[3]),
        ];
        let hit = hit_test_quad(raster, p)?;
        let z = depth_at_hit(positions, &hit);
        Some((hit, z))
    }
}

fn hit_test_quad(raster: [Vec2<f32>; 4], p: Vec2<f32>) -> Option<Hit> {
    let [a, b, c, d] = raster;
    if let Some(w) = barycentric(p, a, b, c) {
        return Some(Hit { tri: Tri::Abc, w });
    }
    if let Some(w) = barycentric(p, b, d, c) {
        return Some(Hit { tri: Tri::Bdc, w });
    }
    None
}

fn depth_at_hit(positions: [Vec3<f32>; 4], hit: &Hit) -> f32 {
    let z = |i: usize| positions[i].z;
    match hit.tri {
        Tri::Abc => hit.w.0 * z(0) + hit.w.1 * z(1) + hit.w.2 * z(2),
        Tri::Bdc => hit.w.0 * z(1) + hit.w.1 * z(3) + hit.w.2 * z(2),
    }
}

#[derive(Copy, Clone, Debug)]
pub enum Tri {
    Abc,
    Bdc,
}

#[derive(Copy, Clone, Debug)]
pub struct Hit {
    pub tri: Tri,
    pub w: (f32, f32, f32),
}

#[inline]
fn cross2(a: Vec2<f32>, b: Vec2<f32>) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Barycentric weights of `p` within triangle `(a, b, c)`, or `None` if `p`
/// lies outside it. Mirrors the edge-function approach in the teacher's
/// `rasterizer/triangles.rs` (`fb_to_weights`), specialized to 2D since the
/// hider only needs raster-space containment, not a full homogeneous
/// rasterizer matrix.
fn barycentric(p: Vec2<f32>, a: Vec2<f32>, b: Vec2<f32>, c: Vec2<f32>) -> Option<(f32, f32, f32)> {
    let area = cross2(b - a, c - a);
    if area.abs() <= AREA_EPSILON {
        return None;
    }
    let inv_area = 1.0 / area;
    let w_a = cross2(b - p, c - p) * inv_area;
    let w_b = cross2(c - p, a - p) * inv_area;
    let w_c = 1.0 - w_a - w_b;
    let in_tri = w_a >= -1e-5 && w_b >= -1e-5 && w_c >= -1e-5;
    if in_tri {
        Some((w_a, w_b, w_c))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_quad() -> Micropolygon {
        Micropolygon {
            corners: [
                ShadedPoint { p: Vec3::new(0.0, 0.0, 1.0), ..Default::default() },
                ShadedPoint { p: Vec3::new(1.0, 0.0, 2.0), ..Default::default() },
                ShadedPoint { p: Vec3::new(0.0, 1.0, 3.0), ..Default::default() },
                ShadedPoint { p: Vec3::new(1.0, 1.0, 4.0), ..Default::default() },
            ],
            raster: [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0), Vec2::new(1.0, 1.0)],
            time: 0.0,
            motion: None,
            matte: false,
            csg_node_id: None,
        }
    }

    #[test]
    fn center_point_hits_and_interpolates_depth() {
        let mp = unit_quad();
        let hit = mp.hit_test(Vec2::new(0.5, 0.5)).expect("center should hit");
        let z = mp.interpolate_depth(&hit);
        // Bilinear depth at the center of a quad with corners 1,2,3,4 is 2.5.
        assert!((z - 2.5).abs() < 1e-3);
    }

    #[test]
    fn outside_point_misses() {
        let mp = unit_quad();
        assert!(mp.hit_test(Vec2::new(2.0, 2.0)).is_none());
    }

    #[test]
    fn degenerate_quad_has_zero_area() {
        let mut mp = unit_quad();
        mp.raster = [Vec2::zero(); 4];
        assert!(mp.is_degenerate());
    }

    #[test]
    fn moving_mp_interpolates_positions_between_snapshots() {
        let mut mp = unit_quad();
        let t0 = [
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
        ];
        let t1 = [
            Vec3::new(2.0, 0.0, 3.0),
            Vec3::new(3.0, 0.0, 3.0),
            Vec3::new(2.0, 1.0, 3.0),
            Vec3::new(3.0, 1.0, 3.0),
        ];
        mp.motion = Some(Motion::new(vec![(0.0, t0), (1.0, t1)]));
        let mid = mp.positions_at(0.5);
        assert!((mid[0].x - 1.0).abs() < 1e-6);
        assert!((mid[0].z - 2.0).abs() < 1e-6);
    }

    #[test]
    fn raster_bound_covers_all_corners() {
        let mp = unit_quad();
        let (min, max) = mp.raster_bound();
        assert_eq!(min, Vec2::new(0.0, 0.0));
        assert_eq!(max, Vec2::new(1.0, 1.0));
    }

    #[test]
    fn fully_opaque_non_matte_non_csg_mp_is_simple_opaque() {
        let mp = unit_quad();
        assert!(mp.is_simple_opaque());
    }

    #[test]
    fn matte_mp_is_never_simple_opaque() {
        let mut mp = unit_quad();
        mp.matte = true;
        assert!(!mp.is_simple_opaque());
    }

    #[test]
    fn csg_mp_is_never_simple_opaque() {
        let mut mp = unit_quad();
        mp.csg_node_id = Some(3);
        assert!(!mp.is_simple_opaque());
    }

    #[test]
    fn partially_transparent_mp_is_not_simple_opaque() {
        let mut mp = unit_quad();
        mp.corners[0].oi = Vec3::new(0.5, 0.5, 0.5);
        assert!(!mp.is_simple_opaque());
    }
}
