//! `OptionSet`: the frame-wide, immutable-after-`WorldBegin` configuration
//! contract of spec §6.

use crate::filter::kernel::FilterKernel;
use crate::texture::TextureFormat;

/// Quantization parameters for a single output channel, per spec §4.5 step 6.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Quantize {
    /// Scale applied before rounding. `one == 0.0` means "leave as float".
    pub one: f32,
    pub min: f32,
    pub max: f32,
    pub dither: f32,
}

impl Quantize {
    pub const FLOAT: Self = Self { one: 0.0, min: 0.0, max: 0.0, dither: 0.0 };

    pub const EIGHT_BIT: Self = Self { one: 255.0, min: 0.0, max: 255.0, dither: 0.5 };

    /// Whether this configuration means "leave the channel as a float".
    pub fn is_float(&self) -> bool {
        self.one == 0.0
    }

    /// Quantize a single channel value, with `dither_xi` a pre-sampled noise
    /// value in `[0, 1)` supplied by the caller (kept out of this type so
    /// quantization stays deterministic and testable).
    pub fn apply(&self, c: f32, dither_xi: f32) -> f32 {
        if self.is_float() {
            return c;
        }
        let q = (self.one * c + self.dither * dither_xi).round();
        q.max(self.min).min(self.max)
    }
}

/// An explicit screen window override, see `resolve_screen_window`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScreenWindow {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
}

/// Depth-of-field lens parameters.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct DepthOfField {
    pub enabled: bool,
    pub f_stop: f32,
    pub focal_length: f32,
    pub focal_distance: f32,
}

/// Frame-wide options, frozen once `WorldBegin` is called.
///
/// Mirrors spec §6's field list. Grounded in `original_source/render/ri.cpp`
/// for the handful of defaults (255px undiceable threshold, eye split limit
/// 10, shutter closed == shutter open) that spec.md states only as prose.
#[derive(Clone, Debug)]
pub struct OptionSet {
    pub xres: u32,
    pub yres: u32,
    pub pixel_samples: [u32; 2],
    pub filter: FilterKernel,
    pub filter_width: [f32; 2],
    pub shutter_open: f32,
    pub shutter_close: f32,
    pub dof: DepthOfField,
    pub near: f32,
    pub far: f32,
    pub exposure_gain: f32,
    pub exposure_gamma: f32,
    pub quantize_color: Quantize,
    pub quantize_depth: Quantize,
    pub bucket_size: [u32; 2],
    pub shading_rate: f32,
    pub eye_split_limit: u32,
    pub undiceable_threshold_px: f32,
    pub max_grid_area: u32,
    pub texture_format_default: TextureFormat,
    pub screen_window: Option<ScreenWindow>,
    pub frame_aspect_ratio: Option<f32>,
}

impl Default for OptionSet {
    fn default() -> Self {
        Self {
            xres: 640,
            yres: 480,
            pixel_samples: [4, 4],
            filter: FilterKernel::Gaussian,
            filter_width: [2.0, 2.0],
            shutter_open: 0.0,
            shutter_close: 0.0,
            dof: DepthOfField::default(),
            near: 1.0e-6,
            far: 1.0e38,
            exposure_gain: 1.0,
            exposure_gamma: 1.0,
            quantize_color: Quantize::EIGHT_BIT,
            quantize_depth: Quantize::FLOAT,
            bucket_size: [16, 16],
            shading_rate: 1.0,
            eye_split_limit: 10,
            undiceable_threshold_px: 255.0,
            max_grid_area: 256,
            texture_format_default: TextureFormat::Plain,
            screen_window: None,
            frame_aspect_ratio: None,
        }
    }
}

impl OptionSet {
    /// Resolve the effective screen window, per the §9 clarification of the
    /// original source's ambiguity: an explicit `RiScreenWindow` always wins;
    /// the frame aspect ratio only derives a *default* window when none was
    /// given explicitly.
    pub fn resolve_screen_window(&self) -> ScreenWindow {
        if let Some(w) = self.screen_window {
            return w;
        }
        let aspect = self
            .frame_aspect_ratio
            .unwrap_or(self.xres as f32 / self.yres as f32);
        if aspect >= 1.0 {
            ScreenWindow { left: -aspect, right: aspect, bottom: -1.0, top: 1.0 }
        } else {
            ScreenWindow { left: -1.0, right: 1.0, bottom: -1.0 / aspect, top: 1.0 / aspect }
        }
    }

    /// Filter halo extension into neighbouring buckets, per spec §3
    /// (bucket invariant) and §5's filter-support rectangle.
    pub fn filter_halo(&self) -> [u32; 2] {
        [
            ((self.filter_width[0] - 1.0) / 2.0).ceil().max(0.0) as u32,
            ((self.filter_width[1] - 1.0) / 2.0).ceil().max(0.0) as u32,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_screen_window_wins_over_aspect() {
        let mut opts = OptionSet::default();
        opts.frame_aspect_ratio = Some(2.0);
        opts.screen_window = Some(ScreenWindow { left: -1.0, right: 1.0, bottom: -1.0, top: 1.0 });
        let resolved = opts.resolve_screen_window();
        assert_eq!(resolved.right, 1.0);
    }

    #[test]
    fn quantize_round_trip_within_one_255th() {
        let q = Quantize::EIGHT_BIT;
        for i in 0..=255u32 {
            let c = i as f32 / 255.0;
            let quantized = q.apply(c, 0.0) / 255.0;
            assert!((quantized - c).abs() <= 1.0 / 255.0 + 1e-6);
        }
    }

    #[test]
    fn float_quantize_is_identity() {
        let q = Quantize::FLOAT;
        assert_eq!(q.apply(0.37, 0.9), 0.37);
    }

    #[test]
    fn filter_halo_matches_ceil_formula() {
        let mut opts = OptionSet::default();
        opts.filter_width = [3.0, 3.0];
        assert_eq!(opts.filter_halo(), [1, 1]);
        opts.filter_width = [4.0, 6.0];
        assert_eq!(opts.filter_halo(), [2, 3]);
    }
}
