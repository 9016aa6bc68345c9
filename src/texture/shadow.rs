//! Shadow / occlusion sampling (spec §4.7, final paragraph): reuses the EWA
//! filter kernel as the weighting function in a percentage-closer
//! accumulator.

use crate::geom::Vec2;
use crate::texture::ewa::EwaFilter;

/// Surface depth approximated as a plane over the sample parallelogram
/// (spec: "Surface depth is approximated as a plane over the sample
/// parallelogram"), evaluated by first-order Taylor expansion from the
/// filter's center.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SurfacePlane {
    pub center: Vec2<f32>,
    pub depth_at_center: f32,
    pub ddx: f32,
    pub ddy: f32,
}

impl SurfacePlane {
    pub fn depth_at(&self, p: Vec2<f32>) -> f32 {
        self.depth_at_center + self.ddx * (p.x - self.center.x) + self.ddy * (p.y - self.center.y)
    }
}

/// `PCF = sum(w * [depth_map(x) < surfaceDepth(x) - bias]) / sum(w)`.
///
/// `depth_fetch` returns `None` for texels the wrap mode rejects (mirrors
/// `EwaFilter::accumulate`'s texel-fetch contract), in which case that texel
/// contributes to neither sum.
pub fn percentage_closer(
    filter: &EwaFilter,
    surface: &SurfacePlane,
    bias: f32,
    mut depth_fetch: impl FnMut(i64, i64) -> Option<f32>,
) -> f32 {
    let (x0, y0, x1, y1) = filter.integer_bound();
    let mut sum_w = 0.0f32;
    let mut sum_occluded = 0.0f32;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let Some(w) = filter.weight_at(p) else { continue };
            let Some(depth) = depth_fetch(x, y) else { continue };
            if depth < surface.depth_at(p) - bias {
                sum_occluded += w;
            }
            sum_w += w;
        }
    }
    if sum_w > 0.0 {
        sum_occluded / sum_w
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::ewa::{EwaOptions, Mat2};

    #[test]
    fn fully_lit_surface_has_zero_occlusion() {
        let opts = EwaOptions::default();
        let filter = EwaFilter::build(Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0), Mat2::diag(0.0, 0.0), (32.0, 32.0), Vec2::new(10.0, 10.0), &opts);
        let surface = SurfacePlane { center: Vec2::new(10.0, 10.0), depth_at_center: 5.0, ddx: 0.0, ddy: 0.0 };
        // Depth map says the blocker is far behind the surface everywhere.
        let pcf = percentage_closer(&filter, &surface, 0.01, |_, _| Some(100.0));
        assert_eq!(pcf, 0.0);
    }

    #[test]
    fn fully_occluded_surface_has_full_occlusion() {
        let opts = EwaOptions::default();
        let filter = EwaFilter::build(Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0), Mat2::diag(0.0, 0.0), (32.0, 32.0), Vec2::new(10.0, 10.0), &opts);
        let surface = SurfacePlane { center: Vec2::new(10.0, 10.0), depth_at_center: 5.0, ddx: 0.0, ddy: 0.0 };
        // Depth map says the blocker is well in front of the surface.
        let pcf = percentage_closer(&filter, &surface, 0.01, |_, _| Some(0.0));
        assert_eq!(pcf, 1.0);
    }
}
