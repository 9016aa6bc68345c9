//! The Bucket: a rectangular raster tile owning its pixels, its
//! deferred-primitive and deferred-MP queues, its occlusion hierarchy, and
//! its filter-weight cache.

use std::collections::VecDeque;

use crate::filter::weights::WeightCache;
use crate::geom::Vec2;
use crate::gprim::GPrim;
use crate::micropolygon::Micropolygon;
use crate::occlusion::OcclusionTree;
use crate::sample::{Pixel, Sample};

/// A bucket's raster footprint in *pixel* space (not including the filter
/// halo), half-open: `[x0, x1) x [y0, y1)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BucketRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl BucketRect {
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    pub fn intersects_raster(&self, min: Vec2<f32>, max: Vec2<f32>) -> bool {
        (self.x0 as f32) < max.x
            && (self.x1 as f32) > min.x
            && (self.y0 as f32) < max.y
            && (self.y1 as f32) > min.y
    }
}

/// A bucket: pixels (including the filter-halo extension into neighbouring
/// buckets), its work queues, and the lazily-built occlusion tree.
pub struct Bucket {
    pub rect: BucketRect,
    pub halo: [u32; 2],
    /// Width of the halo-extended pixel storage, used to index `pixels`.
    stride: u32,
    pub pixels: Vec<Pixel>,

    pub deferred_primitives: VecDeque<GPrim>,
    pub deferred_mps: Vec<Micropolygon>,

    occlusion: Option<OcclusionTree>,
    pub weights: Option<WeightCache>,

    /// Set once the scheduler determines no future primitive can reach this
    /// bucket: filter/resolve runs once per bucket after its MP queue is
    /// empty and no future primitive can reach it.
    pub closed: bool,
}

impl Bucket {
    /// `pixel_samples(x, y)` builds the jittered sub-pixel sample list for
    /// the halo-extended pixel at raster coordinate `(x, y)` (may lie
    /// outside `rect` itself, within the halo).
    pub fn new(
        rect: BucketRect,
        halo: [u32; 2],
        mut pixel_samples: impl FnMut(i64, i64) -> Vec<Sample>,
    ) -> Self {
        let stride = rect.width() + 2 * halo[0];
        let rows = rect.height() + 2 * halo[1];
        let mut pixels = Vec::with_capacity((stride * rows) as usize);
        for py in 0..rows {
            for px in 0..stride {
                let raster_x = rect.x0 as i64 - halo[0] as i64 + px as i64;
                let raster_y = rect.y0 as i64 - halo[1] as i64 + py as i64;
                pixels.push(Pixel::new(pixel_samples(raster_x, raster_y)));
            }
        }
        Self {
            rect,
            halo,
            stride,
            pixels,
            deferred_primitives: VecDeque::new(),
            deferred_mps: Vec::new(),
            occlusion: None,
            weights: None,
            closed: false,
        }
    }

    /// Index into `pixels` of raster coordinate `(x, y)`, or `None` if it
    /// falls outside this bucket's halo-extended storage.
    pub fn pixel_index(&self, x: i64, y: i64) -> Option<usize> {
        let lx = x - (self.rect.x0 as i64 - self.halo[0] as i64);
        let ly = y - (self.rect.y0 as i64 - self.halo[1] as i64);
        if lx < 0 || ly < 0 || lx as u32 >= self.stride {
            return None;
        }
        let rows = self.rect.height() + 2 * self.halo[1];
        if ly as u32 >= rows {
            return None;
        }
        Some((ly as u32 * self.stride + lx as u32) as usize)
    }

    pub fn pixel(&self, x: i64, y: i64) -> Option<&Pixel> {
        self.pixel_index(x, y).map(|i| &self.pixels[i])
    }

    pub fn pixel_mut(&mut self, x: i64, y: i64) -> Option<&mut Pixel> {
        self.pixel_index(x, y).map(move |i| &mut self.pixels[i])
    }

    /// Every sample's current raster position, in halo-extended storage
    /// order — used to build the occlusion tree lazily.
    fn sample_positions(&self) -> Vec<Vec2<f32>> {
        self.pixels.iter().flat_map(|p| p.samples.iter().map(|s| s.position)).collect()
    }

    /// Lazily built on first access.
    pub fn occlusion(&mut self) -> &mut OcclusionTree {
        if self.occlusion.is_none() {
            let positions = self.sample_positions();
            self.occlusion = Some(OcclusionTree::build(&positions));
        }
        self.occlusion.as_mut().unwrap()
    }

    pub fn occlusion_built(&self) -> Option<&OcclusionTree> {
        self.occlusion.as_ref()
    }

    /// Flat index of sample `sample_in_pixel` within pixel `(x, y)`, in the
    /// same global ordering `sample_positions` produces — needed to route
    /// `updateFromSample` calls to the right occlusion-tree leaf.
    pub fn global_sample_index(&self, pixel_index: usize, sample_in_pixel: usize) -> usize {
        let samples_per_pixel = self.pixels.get(0).map_or(0, |p| p.samples.len());
        pixel_index * samples_per_pixel + sample_in_pixel
    }
}
