//! Component G's public contract (spec §4.7): `sample(warpQuad, opts) ->
//! [channels]`. This is the piece that actually wires the three building
//! blocks together — `EwaFilter`'s covariance/weight machinery, the
//! `Mipmap` level pyramid, and per-axis `WrapMode` — since none of them
//! call each other on their own.

use crate::geom::Vec2;

use super::ewa::{EwaFilter, EwaOptions, Mat2};
use super::environment::{cube_face_uv, latlong_uv, CubeFace};
use super::mipmap::{Level, Mipmap};
use super::WrapMode;

/// The sample parallelogram a shader hands the sampler: a lookup center in
/// normalized `[0,1]^2` texture space, plus the Jacobian columns `ds`/`dt`
/// — the screen-space derivatives of `(s,t)` — spec §4.7 step 1's `J`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WarpQuad {
    pub center: Vec2<f32>,
    pub ds: Vec2<f32>,
    pub dt: Vec2<f32>,
}

/// Tunables a call site sets once per texture binding, not per sample.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SampleOptions {
    pub ewa: EwaOptions,
    pub blur: Mat2,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    /// spec §4.7 step 4: "optionally sample two adjacent levels and
    /// tri-linearly blend on fractional ℓ".
    pub trilinear: bool,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            ewa: EwaOptions::default(),
            blur: Mat2::diag(0.0, 0.0),
            wrap_s: WrapMode::Clamp,
            wrap_t: WrapMode::Clamp,
            trilinear: true,
        }
    }
}

/// spec §4.7 steps 1-5 end to end: build the base-resolution filter to
/// measure `w_minor`, pick the mipmap level(s) it implies, re-build the
/// filter at each chosen level's own resolution, and accumulate texels
/// through `WrapMode`.
///
/// The filter is rebuilt per level rather than rescaled algebraically from
/// the base one: `EwaFilter::build` folds `base_res` into the covariance
/// before adding `sigma_recon`, so reusing the base-level quadratic form at
/// a coarser level would apply the wrong reconstruction variance for that
/// level's own texel density.
pub fn sample(mipmap: &Mipmap, warp: &WarpQuad, opts: &SampleOptions) -> Vec<f32> {
    let base = mipmap.level(0);
    let channels = base.channels as usize;
    let base_res = (base.width as f32, base.height as f32);
    let base_center = Vec2::new(warp.center.x * base_res.0, warp.center.y * base_res.1);
    let base_filter = EwaFilter::build(warp.ds, warp.dt, opts.blur, base_res, base_center, &opts.ewa);

    let max_level = (mipmap.level_count() - 1) as f32;
    let l = mipmap_level(base_filter.minor_axis_width()).clamp(0.0, max_level);
    let l0 = l.floor() as usize;
    let a = sample_level(mipmap.level(l0), warp, opts, channels);

    let frac = l - l0 as f32;
    if !opts.trilinear || frac <= 0.0 || l0 as f32 >= max_level {
        return a;
    }
    let b = sample_level(mipmap.level(l0 + 1), warp, opts, channels);
    a.iter().zip(&b).map(|(x, y)| x * (1.0 - frac) + y * frac).collect()
}

/// spec §4.7 step 4's level selection, resolved against the testable
/// property of §8 ("as w_minor doubles, selected level ℓ increases by
/// exactly 1"): `EwaFilter::build` already expresses `w_minor` in
/// base-texel units (it scales the covariance by `base_res` before
/// deriving it), so the level whose own texel spacing matches that
/// footprint is `log2(w_minor)`.
fn mipmap_level(w_minor: f32) -> f32 {
    w_minor.max(1.0).log2()
}

fn sample_level(level: &Level, warp: &WarpQuad, opts: &SampleOptions, channels: usize) -> Vec<f32> {
    let res = (level.width as f32, level.height as f32);
    let center = Vec2::new(warp.center.x * res.0, warp.center.y * res.1);
    let filter = EwaFilter::build(warp.ds, warp.dt, opts.blur, res, center, &opts.ewa);
    filter.accumulate(channels, |x, y| {
        let tx = opts.wrap_s.resolve(x, level.width)?;
        let ty = opts.wrap_t.resolve(y, level.height)?;
        Some(level.texel(tx, ty).to_vec())
    })
}

/// Latitude-longitude environment lookup: finite-difference the `(u,v)`
/// mapping at the screen-space neighbours of `dir` (`ddx`/`ddy`, its
/// per-pixel derivatives) to build the warp quad, then sample as usual.
pub fn sample_latlong(
    mipmap: &Mipmap,
    dir: crate::geom::Vec3<f32>,
    ddx: crate::geom::Vec3<f32>,
    ddy: crate::geom::Vec3<f32>,
    opts: &SampleOptions,
) -> Vec<f32> {
    let (u0, v0) = latlong_uv(dir);
    let (u1, v1) = latlong_uv(dir + ddx);
    let (u2, v2) = latlong_uv(dir + ddy);
    let warp = WarpQuad {
        center: Vec2::new(u0, v0),
        ds: Vec2::new(u1 - u0, v1 - v0),
        dt: Vec2::new(u2 - u0, v2 - v0),
    };
    sample(mipmap, &warp, opts)
}

/// 6-face cube environment lookup into a 3x2 atlas mipmap (spec §4.7:
/// "Environment variants share the filter kernel; only the direction->(u,v)
/// transform differs"). The warp's derivatives are taken within the
/// dominant face only — a lookup whose neighbours straddle a face seam
/// isn't filtered across the seam, matching the flat-atlas layout
/// `CubeFace::atlas_cell` describes.
pub fn sample_cube(
    mipmap: &Mipmap,
    dir: crate::geom::Vec3<f32>,
    ddx: crate::geom::Vec3<f32>,
    ddy: crate::geom::Vec3<f32>,
    fov: f32,
    opts: &SampleOptions,
) -> Vec<f32> {
    let (face, u0, v0) = cube_face_uv(dir, fov);
    let (_, u1, v1) = cube_face_uv(dir + ddx, fov);
    let (_, u2, v2) = cube_face_uv(dir + ddy, fov);
    let warp = WarpQuad {
        center: atlas_uv(face, u0, v0),
        ds: atlas_delta(u1 - u0, v1 - v0),
        dt: atlas_delta(u2 - u0, v2 - v0),
    };
    sample(mipmap, &warp, opts)
}

/// Map a face-local `(u, v)` in `[-1, 1]` into the 3x2 atlas's normalized
/// `[0, 1]^2` space.
fn atlas_uv(face: CubeFace, u: f32, v: f32) -> Vec2<f32> {
    let (cx, cy) = face.atlas_cell();
    Vec2::new((cx as f32 + (u * 0.5 + 0.5)) / 3.0, (cy as f32 + (v * 0.5 + 0.5)) / 2.0)
}

/// Scale a face-local `(du, dv)` into the same atlas-normalized units
/// `atlas_uv` produces, without the cell offset.
fn atlas_delta(du: f32, dv: f32) -> Vec2<f32> {
    Vec2::new(du * 0.5 / 3.0, dv * 0.5 / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_level(w: u32, h: u32, value: f32) -> Level {
        Level { width: w, height: h, channels: 1, data: vec![value; (w * h) as usize] }
    }

    fn flat_mipmap(value: f32) -> Mipmap {
        Mipmap::generate(flat_level(16, 16, value))
    }

    #[test]
    fn sampling_a_constant_texture_returns_its_color_anywhere() {
        let mipmap = flat_mipmap(0.6);
        let warp = WarpQuad { center: Vec2::new(0.5, 0.5), ds: Vec2::new(0.01, 0.0), dt: Vec2::new(0.0, 0.01) };
        let out = sample(&mipmap, &warp, &SampleOptions::default());
        assert_eq!(out.len(), 1);
        assert!((out[0] - 0.6).abs() < 1e-4);
    }

    /// spec §8 "Mipmap monotonicity": as `w_minor` doubles, the selected
    /// level increases by exactly 1 at the crossover.
    #[test]
    fn mipmap_level_increases_by_one_when_w_minor_doubles() {
        let w = 4.0_f32;
        let l0 = mipmap_level(w);
        let l1 = mipmap_level(w * 2.0);
        assert!((l1 - l0 - 1.0).abs() < 1e-5);
    }

    #[test]
    fn mipmap_level_is_monotonically_non_decreasing_in_w_minor() {
        let mut prev = mipmap_level(1.0);
        for i in 1..32 {
            let w = 1.0 + i as f32 * 0.5;
            let next = mipmap_level(w);
            assert!(next >= prev);
            prev = next;
        }
    }

    #[test]
    fn a_tight_footprint_resolves_a_local_feature_a_wide_one_averages_away() {
        // A single bright 2x2 block on an otherwise black 16x16 texture:
        // box-filtering folds it into one bright texel of level 1, but by
        // the coarsest (1x1) level it has been averaged into near-black.
        let mut data = vec![0.0f32; 16 * 16];
        for y in 2..4 {
            for x in 2..4 {
                data[y * 16 + x] = 1.0;
            }
        }
        let mipmap = Mipmap::generate(Level { width: 16, height: 16, channels: 1, data });

        // Centered on level 1's bright texel (base block center / 8).
        let tight = WarpQuad { center: Vec2::new(0.1875, 0.1875), ds: Vec2::new(1e-4, 0.0), dt: Vec2::new(0.0, 1e-4) };
        let wide = WarpQuad { center: Vec2::new(0.1875, 0.1875), ds: Vec2::new(8.0, 0.0), dt: Vec2::new(0.0, 8.0) };
        let opts = SampleOptions { trilinear: false, ..SampleOptions::default() };
        let tight_out = sample(&mipmap, &tight, &opts);
        let wide_out = sample(&mipmap, &wide, &opts);
        assert!(wide_out[0] < 0.05);
        assert!(tight_out[0] - wide_out[0] > 0.1);
    }

    #[test]
    fn black_wrap_returns_zero_when_the_whole_footprint_misses_the_texture() {
        let mipmap = flat_mipmap(1.0);
        let opts = SampleOptions { wrap_s: WrapMode::Black, wrap_t: WrapMode::Black, ..SampleOptions::default() };
        // Centered far outside the texture with a tight Jacobian: every
        // texel the filter's footprint could touch is out of range.
        let warp = WarpQuad { center: Vec2::new(50.0, 50.0), ds: Vec2::new(0.01, 0.0), dt: Vec2::new(0.0, 0.01) };
        let out = sample(&mipmap, &warp, &opts);
        assert_eq!(out[0], 0.0);
    }

    #[test]
    fn latlong_forward_direction_samples_the_atlas_center() {
        let mipmap = flat_mipmap(0.3);
        let dir = crate::geom::Vec3::new(1.0, 0.0, 0.0);
        let ddx = crate::geom::Vec3::new(0.0, 0.01, 0.0);
        let ddy = crate::geom::Vec3::new(0.0, 0.0, 0.01);
        let out = sample_latlong(&mipmap, dir, ddx, ddy, &SampleOptions::default());
        assert!((out[0] - 0.3).abs() < 1e-3);
    }

    #[test]
    fn cube_lookup_on_a_flat_atlas_returns_the_flat_color() {
        let mipmap = flat_mipmap(0.9);
        let dir = crate::geom::Vec3::new(1.0, 0.2, -0.1);
        let ddx = crate::geom::Vec3::new(0.0, 0.01, 0.0);
        let ddy = crate::geom::Vec3::new(0.0, 0.0, 0.01);
        let out = sample_cube(&mipmap, dir, ddx, ddy, std::f32::consts::FRAC_PI_2, &SampleOptions::default());
        assert!((out[0] - 0.9).abs() < 1e-3);
    }
}
