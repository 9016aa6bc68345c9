//! The Hider/Sampler (spec §4.4, component D): sub-pixel sample layout,
//! depth-of-field lens offsetting, and the visibility loop that turns
//! micropolygons into sample records.

use crate::bucket::Bucket;
use crate::geom::{Vec2, Vec3};
use crate::micropolygon::Micropolygon;
use crate::occlusion::OcclusionQuery;
use crate::options::DepthOfField;
use crate::sample::{Sample, SampleData, SampleFlags, SampleRecord};

/// Square-to-disc warp (original source's `CqImagePixel::ProjectToCircle`,
/// reproduced here for the DoF lens offset): scales a unit-square point
/// `(u, v)` in `[-1, 1]^2` by `max(|u|, |v|) / sqrt(u^2 + v^2)` so that the
/// square's boundary maps onto the unit circle's boundary without warping
/// the interior into a tight diamond.
pub fn project_to_disc(u: f32, v: f32) -> Vec2<f32> {
    if u == 0.0 && v == 0.0 {
        return Vec2::zero();
    }
    let r = (u * u + v * v).sqrt();
    let scale = u.abs().max(v.abs()) / r;
    Vec2::new(u * scale, v * scale)
}

/// Thin-lens circle-of-confusion radius at camera-space depth `z`, given the
/// lens parameters in `OptionSet::dof`. Zero when DoF is disabled or the
/// point sits behind the camera.
pub fn circle_of_confusion(dof: &DepthOfField, z: f32) -> f32 {
    if !dof.enabled || z <= 0.0 {
        return 0.0;
    }
    let aperture = dof.focal_length / dof.f_stop.max(1.0e-6);
    let denom = (dof.focal_distance - dof.focal_length).max(1.0e-6);
    (aperture * dof.focal_length * (z - dof.focal_distance).abs() / (z * denom)).max(0.0)
}

/// Build the `Sx*Sy` jittered stratified sub-pixel samples for the pixel at
/// raster coordinate `(x, y)`.
///
/// `jitter(ix, iy, axis)` supplies a deterministic pseudo-random offset in
/// `[0, 1)` for sub-cell `(ix, iy)` and a given axis (0 = horizontal jitter,
/// 1 = vertical jitter, 2 = shutter-time jitter, 3/4 = lens-offset jitter);
/// the layout doesn't need a *specific* PRNG, only a deterministic one, so
/// callers are free to thread any noise source through here (spec §8's
/// filter-idempotence property only requires it be reproducible, not any
/// particular sequence).
pub fn build_pixel_samples(
    x: i64,
    y: i64,
    pixel_samples: [u32; 2],
    shutter: (f32, f32),
    dof: &DepthOfField,
    mut jitter: impl FnMut(u32, u32, u32) -> f32,
) -> Vec<Sample> {
    let (sx, sy) = (pixel_samples[0].max(1), pixel_samples[1].max(1));
    let mut samples = Vec::with_capacity((sx * sy) as usize);
    for iy in 0..sy {
        for ix in 0..sx {
            let subcell_index = iy * sx + ix;
            let jx = jitter(ix, iy, 0);
            let jy = jitter(ix, iy, 1);
            let px = x as f32 + (ix as f32 + jx) / sx as f32;
            let py = y as f32 + (iy as f32 + jy) / sy as f32;
            let jt = jitter(ix, iy, 2);
            let time = shutter.0 + (shutter.1 - shutter.0) * jt;
            let mut sample = Sample::new(Vec2::new(px, py), time, 1.0, subcell_index);
            if dof.enabled {
                let lu = jitter(ix, iy, 3) * 2.0 - 1.0;
                let lv = jitter(ix, iy, 4) * 2.0 - 1.0;
                sample.dof_offset = project_to_disc(lu, lv);
            }
            samples.push(sample);
        }
    }
    samples
}

/// `dofBin -> sample_index` cache (`GetDofOffsetIndex` in the original
/// source): partitions the unit disc into a `bins x bins` grid and records,
/// for each bin, which samples (by index within the layout passed to
/// `build`) have a lens offset landing inside it. Built once per bucket
/// since every pixel shares the same `Sx*Sy` layout.
pub struct DofOffsetIndex {
    bins: u32,
    table: Vec<Vec<u32>>,
}

impl DofOffsetIndex {
    pub fn build(samples: &[Sample], bins: u32) -> Self {
        let bins = bins.max(1);
        let mut table = vec![Vec::new(); (bins * bins) as usize];
        for (i, s) in samples.iter().enumerate() {
            let bx = (((s.dof_offset.x + 1.0) / 2.0 * bins as f32) as u32).min(bins - 1);
            let by = (((s.dof_offset.y + 1.0) / 2.0 * bins as f32) as u32).min(bins - 1);
            table[(by * bins + bx) as usize].push(i as u32);
        }
        Self { bins, table }
    }

    pub fn samples_in_bin(&self, bx: u32, by: u32) -> &[u32] {
        &self.table[(by * self.bins + bx) as usize]
    }

    pub fn bins(&self) -> u32 {
        self.bins
    }
}

/// Run the hider's core loop (spec §4.4) over every MP in `mps`, writing
/// sample-record updates directly into `bucket`'s pixels and updating its
/// occlusion tree as opaque hits register.
pub fn sample_bucket(bucket: &mut Bucket, mps: &[Micropolygon], raster_of: impl Fn(Vec3<f32>) -> Vec2<f32>, dof: &DepthOfField) {
    for mp in mps {
        hide_micropolygon(bucket, mp, &raster_of, dof);
    }
}

fn hide_micropolygon(bucket: &mut Bucket, mp: &Micropolygon, raster_of: &impl Fn(Vec3<f32>) -> Vec2<f32>, dof: &DepthOfField) {
    let (min, max) = mp.hiding_bound(raster_of);
    if !min.x.is_finite() || !min.y.is_finite() {
        return;
    }
    let x0 = min.x.floor() as i64;
    let x1 = max.x.ceil() as i64;
    let y0 = min.y.floor() as i64;
    let y1 = max.y.ceil() as i64;
    if x1 <= x0 || y1 <= y0 {
        return;
    }

    let is_simple_opaque = mp.is_simple_opaque();
    let mut touched_occlusion = false;

    for py in y0..y1 {
        for px in x0..x1 {
            let Some(pixel_index) = bucket.pixel_index(px, py) else { continue };
            let samples_len = bucket.pixels[pixel_index].samples.len();
            for sample_in_pixel in 0..samples_len {
                let lowered_z = {
                    let sample = &mut bucket.pixels[pixel_index].samples[sample_in_pixel];
                    apply_hit(mp, sample, raster_of, dof, is_simple_opaque)
                };
                if let Some(z) = lowered_z {
                    touched_occlusion = true;
                    let global_index = bucket.global_sample_index(pixel_index, sample_in_pixel);
                    bucket.occlusion().update_from_sample(global_index, z);
                }
            }
        }
    }

    if touched_occlusion {
        bucket.occlusion().flush_updates();
    }
}

/// One MP-vs-sample test and record update, spec §4.4's pseudocode body.
/// Returns the new opaque depth if this hit lowered the sample's effective
/// opaque z (the caller uses that to refresh the occlusion tree).
fn apply_hit(
    mp: &Micropolygon,
    sample: &mut Sample,
    raster_of: &impl Fn(Vec3<f32>) -> Vec2<f32>,
    dof: &DepthOfField,
    is_simple_opaque: bool,
) -> Option<f32> {
    let mut positions = mp.positions_at(sample.time);
    if dof.enabled {
        for p in &mut positions {
            let coc = circle_of_confusion(dof, p.z);
            p.x += sample.dof_offset.x * coc;
            p.y += sample.dof_offset.y * coc;
        }
    }
    let (hit, z) = mp.hit_test_with_positions(positions, raster_of, sample.position)?;
    let shaded = mp.interpolate_shaded(&hit);
    let data = SampleData { ci: shaded.ci, oi: shaded.oi, z };

    if is_simple_opaque {
        return sample.apply(data, true).then_some(z);
    }

    let before = sample.effective_opaque_z();
    let mut flags = SampleFlags::VALID;
    if data.oi.x >= 1.0 && data.oi.y >= 1.0 && data.oi.z >= 1.0 {
        flags |= SampleFlags::OCCLUDES;
    }
    if mp.matte {
        flags |= SampleFlags::MATTE;
    }
    sample.insert_record(SampleRecord { data, flags, csg_node_id: mp.csg_node_id });
    let after = sample.effective_opaque_z();
    (after < before).then_some(after)
}

/// An occlusion-cull test for an as-yet-undiced primitive's camera-space
/// bound, used by the scheduler before dicing (spec §4.6 / scenario 3: "a
/// bucket already fully occluded at z0 must not dice a primitive entirely
/// behind z0").
pub fn bound_is_occluded(bucket: &mut Bucket, raster_min: Vec2<f32>, raster_max: Vec2<f32>, z_min: f32) -> bool {
    let query = OcclusionQuery { min: raster_min, max: raster_max, z_min };
    bucket.occlusion().is_occluded(&query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::BucketRect;
    use crate::grid::ShadedPoint;

    fn identity_raster(v: Vec3<f32>) -> Vec2<f32> {
        Vec2::new(v.x, v.y)
    }

    fn white_quad(raster: [Vec2<f32>; 4], z: f32) -> Micropolygon {
        Micropolygon {
            corners: [
                ShadedPoint { p: Vec3::new(raster[0].x, raster[0].y, z), ci: Vec3::broadcast(1.0), oi: Vec3::broadcast(1.0), ..Default::default() },
                ShadedPoint { p: Vec3::new(raster[1].x, raster[1].y, z), ci: Vec3::broadcast(1.0), oi: Vec3::broadcast(1.0), ..Default::default() },
                ShadedPoint { p: Vec3::new(raster[2].x, raster[2].y, z), ci: Vec3::broadcast(1.0), oi: Vec3::broadcast(1.0), ..Default::default() },
                ShadedPoint { p: Vec3::new(raster[3].x, raster[3].y, z), ci: Vec3::broadcast(1.0), oi: Vec3::broadcast(1.0), ..Default::default() },
            ],
            raster,
            time: 0.0,
            motion: None,
            matte: false,
            csg_node_id: None,
        }
    }

    fn make_bucket(n: u32) -> Bucket {
        let rect = BucketRect { x0: 0, y0: 0, x1: n, y1: n };
        Bucket::new(rect, [0, 0], |x, y| vec![Sample::new(Vec2::new(x as f32 + 0.5, y as f32 + 0.5), 0.0, 1.0, 0)])
    }

    #[test]
    fn square_corners_map_onto_the_unit_circle() {
        let d = project_to_disc(1.0, 1.0);
        assert!((d.x * d.x + d.y * d.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn disabled_dof_has_zero_circle_of_confusion() {
        let dof = DepthOfField::default();
        assert_eq!(circle_of_confusion(&dof, 10.0), 0.0);
    }

    #[test]
    fn sample_bucket_fills_every_pixel_covered_by_the_mp() {
        let mut bucket = make_bucket(2);
        let mp = white_quad([Vec2::new(0.0, 0.0), Vec2::new(2.0, 0.0), Vec2::new(0.0, 2.0), Vec2::new(2.0, 2.0)], 1.0);
        sample_bucket(&mut bucket, &[mp], identity_raster, &DepthOfField::default());
        for pixel in &bucket.pixels {
            let resolved = pixel.samples[0].resolved(&crate::csg::CsgForest::empty());
            assert_eq!(resolved.ci, Vec3::broadcast(1.0));
            assert_eq!(resolved.z, 1.0);
        }
    }

    #[test]
    fn opaque_hit_lowers_the_occlusion_trees_max_z() {
        let mut bucket = make_bucket(2);
        let mp = white_quad([Vec2::new(0.0, 0.0), Vec2::new(2.0, 0.0), Vec2::new(0.0, 2.0), Vec2::new(2.0, 2.0)], 1.0);
        sample_bucket(&mut bucket, &[mp], identity_raster, &DepthOfField::default());
        assert!(bound_is_occluded(&mut bucket, Vec2::new(0.0, 0.0), Vec2::new(2.0, 2.0), 1.0));
    }

    #[test]
    fn matte_mp_goes_through_the_list_path_and_sets_the_matte_flag() {
        let mut bucket = make_bucket(1);
        let mut mp = white_quad([Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0), Vec2::new(1.0, 1.0)], 1.0);
        mp.matte = true;
        sample_bucket(&mut bucket, &[mp], identity_raster, &DepthOfField::default());
        let sample = &bucket.pixels[0].samples[0];
        assert!(sample.list.iter().any(|r| r.flags.contains(SampleFlags::MATTE)));
    }
}
