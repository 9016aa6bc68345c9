//! The EWA (Elliptically Weighted Average) anisotropic texture filter,
//! spec §4.7. Ported in spirit (not verbatim) from
//! `original_source/libs/tex/filtering/ewafilter.cpp`'s `computeFilter`:
//! build a gaussian covariance from the sample parallelogram's Jacobian,
//! scale to base-texture raster units, add reconstruction variance, clamp
//! eccentricity, then invert to the quadratic form the filter evaluates
//! against.

use crate::geom::Vec2;

/// A plain 2x2 matrix; used here exclusively for symmetric covariance /
/// quadratic-form algebra, so every caller in this module keeps `b == c`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Mat2 {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
}

impl Mat2 {
    pub fn new(a: f32, b: f32, c: f32, d: f32) -> Self {
        Self { a, b, c, d }
    }

    pub fn diag(a: f32, d: f32) -> Self {
        Self { a, b: 0.0, c: 0.0, d }
    }

    pub fn scaled(s: f32) -> Self {
        Self::diag(s, s)
    }

    pub fn mul(&self, o: &Mat2) -> Mat2 {
        Mat2 {
            a: self.a * o.a + self.b * o.c,
            b: self.a * o.b + self.b * o.d,
            c: self.c * o.a + self.d * o.c,
            d: self.c * o.b + self.d * o.d,
        }
    }

    pub fn transpose(&self) -> Mat2 {
        Mat2 { a: self.a, b: self.c, c: self.b, d: self.d }
    }

    pub fn add(&self, o: &Mat2) -> Mat2 {
        Mat2 { a: self.a + o.a, b: self.b + o.b, c: self.c + o.c, d: self.d + o.d }
    }

    pub fn scale(&self, s: f32) -> Mat2 {
        Mat2 { a: self.a * s, b: self.b * s, c: self.c * s, d: self.d * s }
    }

    pub fn det(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    pub fn inverse(&self) -> Mat2 {
        let inv_det = 1.0 / self.det();
        Mat2 { a: self.d * inv_det, b: -self.b * inv_det, c: -self.c * inv_det, d: self.a * inv_det }
    }

    /// Eigenvalues of a *symmetric* matrix (`b == c` assumed), largest first.
    pub fn eigenvalues_symmetric(&self) -> (f32, f32) {
        let tr = self.a + self.d;
        let det = self.det();
        let disc = ((tr * tr / 4.0) - det).max(0.0).sqrt();
        let mid = tr / 2.0;
        (mid + disc, mid - disc)
    }

    /// Rotation angle of the eigenbasis of a symmetric matrix.
    pub fn eigen_rotation_symmetric(&self) -> f32 {
        if self.b.abs() < 1e-12 {
            0.0
        } else {
            0.5 * (2.0 * self.b).atan2(self.a - self.d)
        }
    }

    /// Reconstruct `Rᵀ * diag(eig1, eig2) * R` for a rotation `R` by `theta`.
    pub fn compose_symmetric(eig1: f32, eig2: f32, theta: f32) -> Mat2 {
        let (s, c) = theta.sin_cos();
        Mat2 {
            a: eig1 * c * c + eig2 * s * s,
            b: (eig1 - eig2) * s * c,
            c: (eig1 - eig2) * s * c,
            d: eig1 * s * s + eig2 * c * c,
        }
    }
}

/// Tunables of the filter construction, spec §4.7 step 1-2 defaults.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EwaOptions {
    pub sigma_pre: f32,
    pub sigma_recon: f32,
    pub max_aspect: f32,
    /// `ln(1/C)`, default `C = e^-4` so this is `4.0`.
    pub log_edge_weight: f32,
}

impl Default for EwaOptions {
    fn default() -> Self {
        let sigma = 1.3 / (2.0 * std::f32::consts::PI);
        Self { sigma_pre: sigma, sigma_recon: sigma, max_aspect: 20.0, log_edge_weight: 4.0 }
    }
}

const LUT_SIZE: usize = 20;

/// A constructed EWA filter ready to be evaluated over a raster-space box.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EwaFilter {
    quad_form: Mat2,
    center: Vec2<f32>,
    log_edge_weight: f32,
    minor_axis_width: f32,
    /// Axis-aligned half-extent of the truncated ellipse in each raster
    /// axis, used to bound the integer box the sampler iterates (spec
    /// §4.7 step 5: "iterate the integer raster box containing the
    /// ellipse").
    half_extent: Vec2<f32>,
    lut: [f32; LUT_SIZE],
}

impl EwaFilter {
    /// Build the filter for a sample parallelogram with Jacobian columns
    /// `j_s`, `j_t` (the preimage of an output-pixel box under the warp),
    /// centered at `center` (in base-texture raster units), over a texture
    /// of `base_res = (W, H)`.
    pub fn build(j_s: Vec2<f32>, j_t: Vec2<f32>, blur: Mat2, base_res: (f32, f32), center: Vec2<f32>, opts: &EwaOptions) -> Self {
        let j = Mat2::new(j_s.x, j_t.x, j_s.y, j_t.y);
        let prefilter = j.mul(&j.transpose()).scale(opts.sigma_pre);
        let mut covar = prefilter.add(&blur);

        covar.a *= base_res.0 * base_res.0;
        covar.b *= base_res.0 * base_res.1;
        covar.c *= base_res.0 * base_res.1;
        covar.d *= base_res.1 * base_res.1;
        covar = covar.add(&Mat2::scaled(opts.sigma_recon));

        let (eig1, eig2) = covar.eigenvalues_symmetric();
        let covar = if opts.max_aspect * opts.max_aspect * eig2 < eig1 {
            let theta = covar.eigen_rotation_symmetric();
            let eig2_clamped = eig1 / (opts.max_aspect * opts.max_aspect);
            Mat2::compose_symmetric(eig1, eig2_clamped, theta)
        } else {
            covar
        };
        let (_, eig2_final) = covar.eigenvalues_symmetric();
        let minor_axis_width = (8.0 * eig2_final * opts.log_edge_weight).sqrt();

        let quad_form = covar.inverse().scale(0.5);
        let half_extent = Vec2::new(
            (2.0 * opts.log_edge_weight * covar.a).sqrt(),
            (2.0 * opts.log_edge_weight * covar.d).sqrt(),
        );

        let lut = build_lut(opts.log_edge_weight);

        Self { quad_form, center, log_edge_weight: opts.log_edge_weight, minor_axis_width, half_extent, lut }
    }

    pub fn minor_axis_width(&self) -> f32 {
        self.minor_axis_width
    }

    pub fn center(&self) -> Vec2<f32> {
        self.center
    }

    /// Integer raster box `(x0, y0, x1, y1)` (inclusive) guaranteed to
    /// contain the truncated ellipse.
    pub fn integer_bound(&self) -> (i64, i64, i64, i64) {
        let x0 = (self.center.x - self.half_extent.x).floor() as i64;
        let x1 = (self.center.x + self.half_extent.x).ceil() as i64;
        let y0 = (self.center.y - self.half_extent.y).floor() as i64;
        let y1 = (self.center.y + self.half_extent.y).ceil() as i64;
        (x0, y0, x1, y1)
    }

    /// Filter weight at raster point `p`, or `None` outside the cutoff
    /// (spec §4.7 step 5: "if q <= logEdgeWeight, weight w = exp(-q)").
    pub fn weight_at(&self, p: Vec2<f32>) -> Option<f32> {
        let dx = p.x - self.center.x;
        let dy = p.y - self.center.y;
        let q = self.quad_form.a * dx * dx + (self.quad_form.b + self.quad_form.c) * dx * dy + self.quad_form.d * dy * dy;
        if q > self.log_edge_weight {
            return None;
        }
        Some(self.lut_lookup(q))
    }

    fn lut_lookup(&self, q: f32) -> f32 {
        let t = (q / self.log_edge_weight).clamp(0.0, 1.0) * (LUT_SIZE as f32 - 1.0);
        let i0 = t.floor() as usize;
        let i1 = (i0 + 1).min(LUT_SIZE - 1);
        let frac = t - i0 as f32;
        self.lut[i0] * (1.0 - frac) + self.lut[i1] * frac
    }

    /// Weighted average of `channels`-component texels fetched by
    /// `texel_fetch(x, y) -> Some(values)`; texels the fetch rejects (e.g.
    /// black-wrapped out-of-range) simply don't contribute.
    pub fn accumulate(&self, channels: usize, mut texel_fetch: impl FnMut(i64, i64) -> Option<Vec<f32>>) -> Vec<f32> {
        let (x0, y0, x1, y1) = self.integer_bound();
        let mut sum = vec![0.0f32; channels];
        let mut sum_w = 0.0f32;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let Some(w) = self.weight_at(p) else { continue };
                let Some(texel) = texel_fetch(x, y) else { continue };
                for c in 0..channels {
                    sum[c] += texel[c] * w;
                }
                sum_w += w;
            }
        }
        if sum_w > 0.0 {
            for v in &mut sum {
                *v /= sum_w;
            }
        }
        sum
    }
}

fn build_lut(log_edge_weight: f32) -> [f32; LUT_SIZE] {
    let mut lut = [0.0f32; LUT_SIZE];
    for (i, slot) in lut.iter_mut().enumerate() {
        let q = log_edge_weight * i as f32 / (LUT_SIZE as f32 - 1.0);
        *slot = (-q).exp();
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Spec §8 EWA rotational invariance: with `J = lambda*I` and zero blur,
    /// the filter is a circular gaussian; sampling a rotated warp of the
    /// same magnitude gives the same minor-axis width and weight profile.
    #[test]
    fn isotropic_warp_is_rotation_invariant() {
        let opts = EwaOptions::default();
        let lambda = 2.0;
        let unrotated = EwaFilter::build(
            Vec2::new(lambda, 0.0),
            Vec2::new(0.0, lambda),
            Mat2::diag(0.0, 0.0),
            (64.0, 64.0),
            Vec2::zero(),
            &opts,
        );
        let theta = 0.7_f32;
        let (s, c) = theta.sin_cos();
        let rotated = EwaFilter::build(
            Vec2::new(lambda * c, lambda * s),
            Vec2::new(-lambda * s, lambda * c),
            Mat2::diag(0.0, 0.0),
            (64.0, 64.0),
            Vec2::zero(),
            &opts,
        );
        assert!((unrotated.minor_axis_width() - rotated.minor_axis_width()).abs() < 1e-3);
    }

    /// Spec §8 EWA clamp: `J = diag(1, 50)`, `maxAspect=20` clamps the
    /// eigenvalue ratio to exactly 400.
    #[test]
    fn eccentricity_clamp_hits_the_aspect_limit_exactly() {
        let opts = EwaOptions { max_aspect: 20.0, ..EwaOptions::default() };
        let filter = EwaFilter::build(
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 50.0),
            Mat2::diag(0.0, 0.0),
            (1.0, 1.0),
            Vec2::zero(),
            &opts,
        );
        // minor_axis_width = sqrt(8 * eig2_clamped * logEdgeWeight); recover
        // eig2_clamped and cross-check against eig1 via the exact clamp
        // relation eig1 = maxAspect^2 * eig2_clamped.
        let eig2 = filter.minor_axis_width().powi(2) / (8.0 * opts.log_edge_weight);
        let eig1 = opts.max_aspect * opts.max_aspect * eig2;
        assert!((eig1 / eig2 - 400.0).abs() < 1e-2);
    }

    #[test]
    fn weight_is_one_at_center_and_none_far_outside() {
        let opts = EwaOptions::default();
        let filter = EwaFilter::build(Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0), Mat2::diag(0.0, 0.0), (32.0, 32.0), Vec2::new(10.0, 10.0), &opts);
        assert!((filter.weight_at(Vec2::new(10.0, 10.0)).unwrap() - 1.0).abs() < 1e-3);
        assert!(filter.weight_at(Vec2::new(10000.0, 10000.0)).is_none());
    }
}
