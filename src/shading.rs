//! The Shading Grid Engine (spec §4.3): evaluates the shader pipeline over
//! a grid, unaware of the shader language itself.

use crate::geom::Vec3;
use crate::gprim::Sides;
use crate::grid::Grid;

/// The opaque shader contract of spec §6: a shader module declares which
/// channels it reads/writes and evaluates SIMD-over-grid fashion.
///
/// The core treats every shader as a black box through this trait; the
/// shader VM/language is out of scope per spec.md §1.
pub trait ShaderModule {
    /// Declared channel names this shader reads from the grid.
    fn uses(&self) -> &[&str];

    /// Evaluate the shader over every point of `grid`, writing its outputs
    /// back into the grid in place. Returns `Err` with a description on a
    /// per-point shader fault; per spec §4.3 failure semantics, a fault at
    /// a single point never aborts the grid — the caller substitutes the
    /// default value for that point and logs a `ShaderEvalFault`.
    fn evaluate(&self, grid: &mut Grid) -> Result<(), ShaderFault>;
}

#[derive(Debug)]
pub struct ShaderFault {
    pub point_index: usize,
    pub reason: String,
}

/// Which optional shader stages are bound to a primitive.
#[derive(Default)]
pub struct ShaderPipeline<'a> {
    pub displacement: Option<&'a dyn ShaderModule>,
    pub surface: Option<&'a dyn ShaderModule>,
    pub atmosphere: Option<&'a dyn ShaderModule>,
}

/// Run the required shading sequence of spec §4.3 over `grid`:
/// displacement -> recompute normals -> surface -> atmosphere -> cull
/// backfaces when one-sided.
///
/// Any point-level fault encountered along the way is reported through
/// `on_fault` (normally forwarding to the crate's `ErrorHandler`) and the
/// grid continues shading with default values at that point, per spec's
/// "never fatal" rule.
pub fn shade(grid: &mut Grid, shaders: &ShaderPipeline, mut on_fault: impl FnMut(&ShaderFault)) {
    if let Some(displacement) = shaders.displacement {
        if let Err(fault) = displacement.evaluate(grid) {
            on_fault(&fault);
        }
        recompute_normals(grid);
    }

    if let Some(surface) = shaders.surface {
        if let Err(fault) = surface.evaluate(grid) {
            on_fault(&fault);
        }
    }

    if let Some(atmosphere) = shaders.atmosphere {
        if let Err(fault) = atmosphere.evaluate(grid) {
            on_fault(&fault);
        }
    }

    if grid.attrs.sides == Sides::One && is_backfacing(grid) {
        grid.culled = true;
    }
}

/// Recompute per-point normals from displaced `P` via finite differences
/// across the lattice (spec §4.3 step 1: "re-compute per-point normals from
/// the displaced P").
pub(crate) fn recompute_normals(grid: &mut Grid) {
    let (u, v) = (grid.u, grid.v);
    for iv in 0..=v {
        for iu in 0..=u {
            let p = grid.point(iu, iv).p;
            let du = if iu < u {
                grid.point(iu + 1, iv).p - p
            } else {
                p - grid.point(iu - 1, iv).p
            };
            let dv = if iv < v {
                grid.point(iu, iv + 1).p - p
            } else {
                p - grid.point(iu, iv - 1).p
            };
            let n = du.cross(dv);
            let n = if n.magnitude_squared() > 0.0 { n.normalized() } else { Vec3::new(0.0, 0.0, 1.0) };
            grid.point_mut(iu, iv).n = n;
        }
    }
}

/// Backfacing test: the grid's average geometric normal points away from
/// the camera (camera space, so "away" means a positive z component, i.e.
/// facing further from the eye at the origin looking down -z).
fn is_backfacing(grid: &Grid) -> bool {
    let avg_n = grid.points.iter().fold(Vec3::zero(), |acc, p| acc + p.n) / grid.points.len().max(1) as f32;
    avg_n.z > 0.0
}
