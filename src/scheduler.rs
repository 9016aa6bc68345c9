//! The Primitive Scheduler (spec §4.1, component A): bucket raster geometry,
//! bind/cull, and the per-bucket drain loop that dices or splits primitives
//! and routes the resulting micropolygons.

use crate::arbiter::{self, Decision};
use crate::bucket::{Bucket, BucketRect};
use crate::error::{report, ErrorHandler, RenderError};
use crate::geom::{Bound3, Vec2, Vec3};
use crate::gprim::GPrim;
use crate::grid::Grid;
use crate::hider;
use crate::micropolygon::Micropolygon;
use crate::options::{DepthOfField, OptionSet};
use crate::shading::{self, ShaderPipeline};

/// A primitive's logical progress through the pipeline, spec §4.1: "the
/// state machine `Scheduled -> Bounded -> {Culled | Diceable?} -> {Diced ->
/// MPs | Split -> children} -> Retired`". The scheduler doesn't store this
/// explicitly per primitive (the call stack *is* the state machine — see
/// `post_primitive`/`process_primitive` below); the enum exists so every
/// transition in this module can be named precisely in its own doc comment.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PrimitiveState {
    Scheduled,
    Bounded,
    Culled,
    Diced,
    Split,
    Retired,
}

/// The frame's raster/bucket layout: resolution, bucket size, and the
/// filter halo each bucket's pixel storage extends by.
#[derive(Copy, Clone, Debug)]
pub struct FrameGeometry {
    pub xres: u32,
    pub yres: u32,
    pub bucket_size: [u32; 2],
    pub halo: [u32; 2],
}

impl FrameGeometry {
    pub fn new(xres: u32, yres: u32, bucket_size: [u32; 2], halo: [u32; 2]) -> Self {
        Self { xres, yres, bucket_size, halo }
    }

    /// Bucket grid dimensions, at least `1x1` even for a degenerate bucket
    /// size.
    pub fn bucket_counts(&self) -> (u32, u32) {
        let nx = ceil_div(self.xres, self.bucket_size[0]).max(1);
        let ny = ceil_div(self.yres, self.bucket_size[1]).max(1);
        (nx, ny)
    }

    pub fn bucket_count(&self) -> usize {
        let (nx, ny) = self.bucket_counts();
        (nx * ny) as usize
    }

    /// Raster-scan linear index of bucket `(bx, by)` — buckets process in
    /// this order (spec §4.1/§5: "buckets process strictly in raster scan
    /// order").
    pub fn raster_scan_index(&self, bx: u32, by: u32) -> usize {
        let (nx, _ny) = self.bucket_counts();
        (by * nx + bx) as usize
    }

    /// The pixel rectangle (clipped to the frame edges) of the bucket at
    /// raster-scan `index`.
    pub fn bucket_rect(&self, index: usize) -> BucketRect {
        let (nx, _ny) = self.bucket_counts();
        let bx = index as u32 % nx;
        let by = index as u32 / nx;
        let x0 = bx * self.bucket_size[0];
        let y0 = by * self.bucket_size[1];
        let x1 = (x0 + self.bucket_size[0]).min(self.xres);
        let y1 = (y0 + self.bucket_size[1]).min(self.yres);
        BucketRect { x0, y0, x1, y1 }
    }

    /// The earliest (in raster-scan order) bucket whose footprint overlaps
    /// `[min, max)` — a primitive's raster bound is axis-aligned, so the
    /// topmost-leftmost overlapping bucket is always the one containing
    /// `min` itself.
    pub fn earliest_bucket_touching(&self, min: Vec2<f32>, max: Vec2<f32>) -> Option<usize> {
        let (nx, ny) = self.bucket_counts();
        if max.x <= 0.0 || max.y <= 0.0 || min.x >= self.xres as f32 || min.y >= self.yres as f32 || min.x >= max.x || min.y >= max.y {
            return None;
        }
        let bx = ((min.x.max(0.0) / self.bucket_size[0].max(1) as f32).floor() as u32).min(nx - 1);
        let by = ((min.y.max(0.0) / self.bucket_size[1].max(1) as f32).floor() as u32).min(ny - 1);
        Some(self.raster_scan_index(bx, by))
    }

    /// Every bucket whose halo-extended storage overlaps `[min, max)` — used
    /// to route a diced MP to all buckets that need it (spec §4.4: MPs
    /// straddling a bucket boundary are staged independently into every
    /// bucket whose halo-extended region they touch).
    pub fn buckets_touching_halo(&self, min: Vec2<f32>, max: Vec2<f32>) -> Vec<usize> {
        let (nx, ny) = self.bucket_counts();
        let bw = self.bucket_size[0].max(1) as f32;
        let bh = self.bucket_size[1].max(1) as f32;
        let hx = self.halo[0] as f32;
        let hy = self.halo[1] as f32;
        if max.x <= -hx || max.y <= -hy {
            return Vec::new();
        }
        let bx0 = (((min.x - hx) / bw).floor().max(0.0) as u32).min(nx - 1);
        let bx1 = (((max.x + hx) / bw).floor().max(0.0) as u32).min(nx - 1);
        let by0 = (((min.y - hy) / bh).floor().max(0.0) as u32).min(ny - 1);
        let by1 = (((max.y + hy) / bh).floor().max(0.0) as u32).min(ny - 1);
        let mut out = Vec::new();
        for by in by0..=by1 {
            for bx in bx0..=bx1 {
                let idx = self.raster_scan_index(bx, by);
                let rect = self.bucket_rect(idx);
                let halo_min = Vec2::new(rect.x0 as f32 - hx, rect.y0 as f32 - hy);
                let halo_max = Vec2::new(rect.x1 as f32 + hx, rect.y1 as f32 + hy);
                if halo_min.x < max.x && halo_max.x > min.x && halo_min.y < max.y && halo_max.y > min.y {
                    out.push(idx);
                }
            }
        }
        out
    }
}

fn ceil_div(a: u32, b: u32) -> u32 {
    let b = b.max(1);
    (a + b - 1) / b
}

/// Camera-space bound projected to its raster-space axis-aligned extent, by
/// projecting all eight corners of `bound` through `raster_of`.
fn bound_raster_extent(bound: &Bound3, raster_of: &impl Fn(Vec3<f32>) -> Vec2<f32>) -> (Vec2<f32>, Vec2<f32>) {
    let mut min = Vec2::broadcast(f32::INFINITY);
    let mut max = Vec2::broadcast(f32::NEG_INFINITY);
    for &x in &[bound.min.x, bound.max.x] {
        for &y in &[bound.min.y, bound.max.y] {
            for &z in &[bound.min.z, bound.max.z] {
                let r = raster_of(Vec3::new(x, y, z));
                min = Vec2::partial_min(min, r);
                max = Vec2::partial_max(max, r);
            }
        }
    }
    (min, max)
}

/// `Scheduled -> Bounded | Culled`: bound `prim` and, unless it's entirely
/// outside the view frustum or off-screen, defer it onto the raster-scan
/// earliest bucket it touches.
pub fn post_primitive(
    geometry: &FrameGeometry,
    buckets: &mut [Bucket],
    prim: GPrim,
    raster_of: impl Fn(Vec3<f32>) -> Vec2<f32>,
    opts: &OptionSet,
) -> PrimitiveState {
    let bound = prim.bound();
    if bound.is_empty() || bound.entirely_behind(opts.far) || bound.max.z < opts.near {
        return PrimitiveState::Culled;
    }
    let (raster_min, raster_max) = bound_raster_extent(&bound, &raster_of);
    match geometry.earliest_bucket_touching(raster_min, raster_max) {
        None => PrimitiveState::Culled,
        Some(idx) => {
            buckets[idx].deferred_primitives.push_back(prim);
            PrimitiveState::Bounded
        }
    }
}

/// Drain every primitive currently deferred on bucket `idx` — dicing or
/// splitting each one, recursively, until the queue empties. Newly-split
/// children that land back on this same bucket are processed within the
/// same call (since splitting re-posts through `post_primitive`, which may
/// push onto `buckets[idx].deferred_primitives` again).
///
/// Does not hide the resulting MPs — see `close_bucket`, which does that
/// once this bucket will receive no further primitives (spec §4.5: filter
/// runs "once per bucket after the bucket's MP queue is empty").
pub fn drain_primitives(
    geometry: &FrameGeometry,
    buckets: &mut [Bucket],
    idx: usize,
    raster_of: impl Fn(Vec3<f32>) -> Vec2<f32> + Copy,
    shaders: &ShaderPipeline,
    opts: &OptionSet,
    errors: &dyn ErrorHandler,
) {
    loop {
        let Some(prim) = buckets[idx].deferred_primitives.pop_front() else { break };
        process_primitive(geometry, buckets, idx, prim, raster_of, shaders, opts, errors);
    }
}

/// Hide every MP forwarded to bucket `idx` and mark it closed (spec §4.5).
pub fn close_bucket(buckets: &mut [Bucket], idx: usize, raster_of: impl Fn(Vec3<f32>) -> Vec2<f32>, dof: &DepthOfField) {
    let mps = std::mem::take(&mut buckets[idx].deferred_mps);
    hider::sample_bucket(&mut buckets[idx], &mps, raster_of, dof);
    buckets[idx].closed = true;
}

fn process_primitive(
    geometry: &FrameGeometry,
    buckets: &mut [Bucket],
    idx: usize,
    prim: GPrim,
    raster_of: impl Fn(Vec3<f32>) -> Vec2<f32> + Copy,
    shaders: &ShaderPipeline,
    opts: &OptionSet,
    errors: &dyn ErrorHandler,
) {
    let shape0 = prim.shape.at_time0();
    match arbiter::decide(shape0, prim.attrs.shading_rate, opts, raster_of) {
        Decision::Discard => {}
        Decision::Split { axis } => {
            if arbiter::child_eye_split_count(&prim, opts.near) > opts.eye_split_limit {
                report(errors, RenderError::EyeSplitOverflow { limit: opts.eye_split_limit });
                return;
            }
            let (a, b) = prim.split(axis, opts.near);
            for child in [a, b] {
                post_primitive(geometry, buckets, child, raster_of, opts);
            }
        }
        Decision::Dice { u, v } => maybe_dice(geometry, buckets, idx, &prim, u, v, raster_of, shaders, opts, errors),
        Decision::ForceUndiceable => maybe_dice(geometry, buckets, idx, &prim, 1, 1, raster_of, shaders, opts, errors),
    }
}

/// Occlusion-cull `prim` against bucket `idx`'s current coverage (spec §4.6
/// / scenario 3) before actually dicing it.
fn maybe_dice(
    geometry: &FrameGeometry,
    buckets: &mut [Bucket],
    idx: usize,
    prim: &GPrim,
    u: u32,
    v: u32,
    raster_of: impl Fn(Vec3<f32>) -> Vec2<f32> + Copy,
    shaders: &ShaderPipeline,
    opts: &OptionSet,
    errors: &dyn ErrorHandler,
) {
    let bound = prim.bound();
    let (raster_min, raster_max) = bound_raster_extent(&bound, &raster_of);
    if hider::bound_is_occluded(&mut buckets[idx], raster_min, raster_max, bound.min.z) {
        return;
    }
    dice_and_route(geometry, buckets, idx, prim, u, v, raster_of, shaders, opts, errors);
}

fn dice_and_route(
    geometry: &FrameGeometry,
    buckets: &mut [Bucket],
    idx: usize,
    prim: &GPrim,
    u: u32,
    v: u32,
    raster_of: impl Fn(Vec3<f32>) -> Vec2<f32>,
    shaders: &ShaderPipeline,
    opts: &OptionSet,
    errors: &dyn ErrorHandler,
) {
    let mut grids = prim.dice_snapshots(u, v);
    // Spec §4.3 motion rule: shaders only ever run at t0; later snapshots
    // contribute interpolated P only, never re-shaded Ci/Oi/N.
    {
        let (_, grid0) = &mut grids[0];
        shading::shade(grid0, shaders, |fault| {
            report(errors, RenderError::ShaderEvalFault { shader: "bound shader".into(), reason: fault.reason.clone() });
        });
    }
    if grids[0].1.culled {
        return;
    }
    let mps = build_micropolygons(&grids, prim.attrs.matte, prim.attrs.csg_node_id, &raster_of);
    route_micropolygons(geometry, buckets, idx, &raster_of, mps);
}

fn build_micropolygons(grids: &[(f32, Grid)], matte: bool, csg_node_id: Option<u32>, raster_of: &impl Fn(Vec3<f32>) -> Vec2<f32>) -> Vec<Micropolygon> {
    let (t0, grid0) = &grids[0];
    let mut out = Vec::with_capacity((grid0.u * grid0.v) as usize);
    for quad in grid0.quads() {
        let corners = [
            grid0.points[quad[0]].clone(),
            grid0.points[quad[1]].clone(),
            grid0.points[quad[2]].clone(),
            grid0.points[quad[3]].clone(),
        ];
        let raster = [
            raster_of(corners[0].p),
            raster_of(corners[1].p),
            raster_of(corners[2].p),
            raster_of(corners[3].p),
        ];
        let motion = if grids.len() > 1 {
            let snapshots: Vec<(f32, [Vec3<f32>; 4])> = grids
                .iter()
                .map(|(t, g)| (*t, [g.points[quad[0]].p, g.points[quad[1]].p, g.points[quad[2]].p, g.points[quad[3]].p]))
                .collect();
            Some(crate::geom::Motion::new(snapshots))
        } else {
            None
        };
        let mp = Micropolygon { corners, raster, time: *t0, motion, matte, csg_node_id };
        if mp.is_degenerate() {
            continue;
        }
        out.push(mp);
    }
    out
}

fn route_micropolygons(geometry: &FrameGeometry, buckets: &mut [Bucket], raster_of: &impl Fn(Vec3<f32>) -> Vec2<f32>, mps: Vec<Micropolygon>) {
    for mp in mps {
        let (min, max) = mp.hiding_bound(raster_of);
        for target in geometry.buckets_touching_halo(min, max) {
            buckets[target].deferred_mps.push(mp.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::StaticOrMotion;
    use crate::gprim::{Attributes, Patch, Shape, Sides};
    use crate::primvar::PrimvarSet;

    fn identity_raster(v: Vec3<f32>) -> Vec2<f32> {
        Vec2::new(v.x, v.y)
    }

    #[test]
    fn bucket_counts_round_up_partial_buckets() {
        let geometry = FrameGeometry::new(20, 10, [8, 8], [0, 0]);
        assert_eq!(geometry.bucket_counts(), (3, 2));
    }

    #[test]
    fn bucket_rect_is_clipped_to_frame_edges() {
        let geometry = FrameGeometry::new(20, 10, [8, 8], [0, 0]);
        let rect = geometry.bucket_rect(2); // rightmost column, bx=2
        assert_eq!(rect, BucketRect { x0: 16, y0: 0, x1: 20, y1: 8 });
    }

    #[test]
    fn earliest_bucket_touching_picks_the_top_left_overlap() {
        let geometry = FrameGeometry::new(16, 16, [8, 8], [0, 0]);
        let idx = geometry.earliest_bucket_touching(Vec2::new(9.0, 1.0), Vec2::new(15.0, 7.0)).unwrap();
        assert_eq!(idx, geometry.raster_scan_index(1, 0));
    }

    #[test]
    fn halo_routing_includes_the_neighbouring_bucket() {
        let geometry = FrameGeometry::new(16, 8, [8, 8], [2, 2]);
        let targets = geometry.buckets_touching_halo(Vec2::new(6.0, 1.0), Vec2::new(9.0, 4.0));
        assert!(targets.contains(&geometry.raster_scan_index(0, 0)));
        assert!(targets.contains(&geometry.raster_scan_index(1, 0)));
    }

    fn flat_patch(attrs: Attributes) -> GPrim {
        GPrim {
            shape: StaticOrMotion::Static(
                0.0,
                Shape::Patch(Patch {
                    p00: Vec3::new(0.0, 0.0, 1.0),
                    p10: Vec3::new(4.0, 0.0, 1.0),
                    p01: Vec3::new(0.0, 4.0, 1.0),
                    p11: Vec3::new(4.0, 4.0, 1.0),
                }),
            ),
            attrs,
            primvars: PrimvarSet::new(),
            eye_split_count: 0,
            shader_binding: None,
        }
    }

    #[test]
    fn posting_a_primitive_entirely_behind_far_is_culled() {
        let geometry = FrameGeometry::new(16, 16, [8, 8], [0, 0]);
        let mut buckets: Vec<Bucket> = (0..geometry.bucket_count())
            .map(|i| Bucket::new(geometry.bucket_rect(i), geometry.halo, |x, y| vec![crate::sample::Sample::new(Vec2::new(x as f32 + 0.5, y as f32 + 0.5), 0.0, 1.0, 0)]))
            .collect();
        let mut opts = OptionSet::default();
        opts.far = 0.5;
        let state = post_primitive(&geometry, &mut buckets, flat_patch(Attributes::default()), identity_raster, &opts);
        assert_eq!(state, PrimitiveState::Culled);
    }

    #[test]
    fn dicing_a_small_patch_routes_mps_to_the_bucket_it_overlaps() {
        let geometry = FrameGeometry::new(16, 8, [8, 8], [0, 0]);
        let mut buckets: Vec<Bucket> = (0..geometry.bucket_count())
            .map(|i| Bucket::new(geometry.bucket_rect(i), geometry.halo, |x, y| vec![crate::sample::Sample::new(Vec2::new(x as f32 + 0.5, y as f32 + 0.5), 0.0, 1.0, 0)]))
            .collect();
        let opts = OptionSet::default();
        let mut attrs = Attributes::default();
        attrs.sides = Sides::Two; // avoid the backface cull for this flat test patch
        let prim = flat_patch(attrs);
        let state = post_primitive(&geometry, &mut buckets, prim, identity_raster, &opts);
        assert_eq!(state, PrimitiveState::Bounded);

        let shaders = ShaderPipeline::default();
        drain_primitives(&geometry, &mut buckets, 0, identity_raster, &shaders, &opts, &crate::error::LogErrorHandler);

        assert!(!buckets[0].deferred_mps.is_empty());
        assert!(buckets[1].deferred_mps.is_empty());
    }
}
