//! The Micropolygon Grid (spec §3): a regular `(u+1)x(v+1)` lattice of
//! shading points produced by `Dice`.

use std::collections::HashMap;

use crate::geom::Vec3;
use crate::gprim::Attributes;
use crate::primvar::PrimvarSet;

/// Per-lattice-point shaded data accumulated through the shading pipeline
/// (spec §4.3): position, shaded color/opacity, normal, and depth, plus
/// whatever named primvars (spec §3: "per-sample storage for each
/// primitive variable consumed by shaders") were interpolated onto this
/// point at dice time.
#[derive(Clone, Debug, PartialEq)]
pub struct ShadedPoint {
    pub p: Vec3<f32>,
    pub n: Vec3<f32>,
    pub ci: Vec3<f32>,
    pub oi: Vec3<f32>,
    pub vars: HashMap<String, Vec<f32>>,
}

impl Default for ShadedPoint {
    fn default() -> Self {
        Self {
            p: Vec3::zero(),
            n: Vec3::new(0.0, 0.0, 1.0),
            ci: Vec3::zero(),
            oi: Vec3::broadcast(1.0),
            vars: HashMap::new(),
        }
    }
}

/// A `(u+1) x (v+1)` lattice of shading points.
///
/// Invariant (spec §3): every micropolygon's four corners come from the
/// same shaded grid, so shading stays coherent across a micropolygon.
#[derive(Clone, Debug)]
pub struct Grid {
    pub u: u32,
    pub v: u32,
    pub points: Vec<ShadedPoint>,
    pub attrs: Attributes,
    pub primvars: PrimvarSet,
    pub time: f32,
    /// Set by the shading engine's two-sidedness check (spec §4.3 step 4).
    pub culled: bool,
}

impl Grid {
    pub fn new(u: u32, v: u32, attrs: Attributes, primvars: PrimvarSet, time: f32) -> Self {
        let n = (u as usize + 1) * (v as usize + 1);
        Self { u, v, points: vec![ShadedPoint::default(); n], attrs, primvars, time, culled: false }
    }

    #[inline]
    pub fn index(&self, iu: u32, iv: u32) -> usize {
        (iv * (self.u + 1) + iu) as usize
    }

    #[inline]
    pub fn point(&self, iu: u32, iv: u32) -> &ShadedPoint {
        &self.points[self.index(iu, iv)]
    }

    #[inline]
    pub fn point_mut(&mut self, iu: u32, iv: u32) -> &mut ShadedPoint {
        let idx = self.index(iu, iv);
        &mut self.points[idx]
    }

    /// Number of micropolygons this grid yields (spec §3: "it yields u*v
    /// micropolygons").
    pub fn micropolygon_count(&self) -> (u32, u32) {
        (self.u, self.v)
    }

    /// Iterate the four-corner index quads of every micropolygon in raster
    /// order.
    pub fn quads(&self) -> impl Iterator<Item = [usize; 4]> + '_ {
        (0..self.v).flat_map(move |iv| {
            (0..self.u).map(move |iu| {
                [
                    self.index(iu, iv),
                    self.index(iu + 1, iv),
                    self.index(iu, iv + 1),
                    self.index(iu + 1, iv + 1),
                ]
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lattice_has_u_plus_1_by_v_plus_1_points() {
        let g = Grid::new(2, 3, Attributes::default(), PrimvarSet::new(), 0.0);
        assert_eq!(g.points.len(), 3 * 4);
    }

    #[test]
    fn quads_yields_u_times_v_entries() {
        let g = Grid::new(2, 3, Attributes::default(), PrimvarSet::new(), 0.0);
        assert_eq!(g.quads().count(), 6);
    }

    #[test]
    fn points_default_to_empty_vars() {
        let g = Grid::new(1, 1, Attributes::default(), PrimvarSet::new(), 0.0);
        assert!(g.point(0, 0).vars.is_empty());
    }

    #[test]
    fn point_mut_vars_round_trip() {
        let mut g = Grid::new(1, 1, Attributes::default(), PrimvarSet::new(), 0.0);
        g.point_mut(0, 0).vars.insert("st".to_string(), vec![0.25, 0.75]);
        assert_eq!(g.point(0, 0).vars["st"], vec![0.25, 0.75]);
    }
}
