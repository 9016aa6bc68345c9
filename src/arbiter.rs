//! The Diceable Arbiter: per-primitive screen-space test that decides
//! whether to dice a GPrim to a shading grid or split it into
//! sub-primitives.

use crate::geom::{Vec2, Vec3};
use crate::gprim::{GPrim, Shape, SplitAxis};
use crate::options::OptionSet;

/// The result of the arbiter's decision.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Decision {
    Dice { u: u32, v: u32 },
    Split { axis: SplitAxis },
    ForceUndiceable,
    Discard,
}

const EPSILON: f32 = 1.0e-6;

/// Decide how to proceed with `shape`, applying three ordered rules:
/// discard a degenerate hull, split an oversized one, or dice a
/// shadeable one to a power-of-two grid.
///
/// `raster_of` projects a camera-space point to raster space; it is
/// supplied by the caller (the scheduler/bucket layer) rather than baked
/// into this module, keeping the arbiter's projection math independent of
/// any particular camera/screen transform.
pub fn decide(
    shape: &Shape,
    attrs_shading_rate: f32,
    opts: &OptionSet,
    raster_of: impl Fn(Vec3<f32>) -> Vec2<f32>,
) -> Decision {
    let (lu, lv) = shape.raster_extent(raster_of);

    // Rule 1: degenerate hull.
    if lu * lv < EPSILON {
        return Decision::Discard;
    }

    let r = attrs_shading_rate.max(EPSILON).sqrt();
    let u = lu / r;
    let v = lv / r;

    // Rule 2: undiceable threshold or excessive grid area -> split.
    if lu > opts.undiceable_threshold_px
        || lv > opts.undiceable_threshold_px
        || u * v > opts.max_grid_area as f32
    {
        return Decision::Split { axis: SplitAxis::longer(lu, lv) };
    }

    // Rule 3: round up to the next power of two (prevents cracking between
    // adjacent grids) and dice.
    let u = next_pow2(u.max(1.0).ceil() as u32).max(1);
    let v = next_pow2(v.max(1.0).ceil() as u32).max(1);
    Decision::Dice { u, v }
}

fn next_pow2(n: u32) -> u32 {
    if n <= 1 {
        1
    } else {
        1u32 << (32 - (n - 1).leading_zeros())
    }
}

/// Mark a split child's eye-split count: sub-primitives inherit the
/// parent's count, incremented when the parent's bound crossed the near
/// plane.
pub fn child_eye_split_count(parent: &GPrim, near: f32) -> u32 {
    parent.next_eye_split_count(near)
}
