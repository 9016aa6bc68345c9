//! The per-bucket filter-weight LUT: pre-tabulated per (pixel-offset,
//! sub-pixel index, sub-cell) tuple for speed, and immutable once built.
//!
//! Since every supported kernel (`FilterKernel`) is separable, the table is
//! stored as two 1-D axis tables rather than one dense 2-D table, and a
//! lookup is their product — the same trick `eval1d`/`weight` already use.

use super::kernel::FilterKernel;

#[derive(Clone, Debug)]
pub struct WeightCache {
    kernel: FilterKernel,
    fw: [f32; 2],
    /// Samples per pixel-unit in each axis table.
    resolution: u32,
    table_x: Vec<f32>,
    table_y: Vec<f32>,
}

impl WeightCache {
    /// `InitialiseFilterValues`: tabulate both axes once. `resolution`
    /// controls sub-cell granularity (samples per pixel); 16 matches a
    /// typical `4x4` pixel-sample grid's sub-cell spacing with headroom.
    pub fn build(kernel: FilterKernel, fw: [f32; 2], resolution: u32) -> Self {
        Self {
            kernel,
            fw,
            resolution,
            table_x: Self::build_axis(kernel, fw[0], resolution),
            table_y: Self::build_axis(kernel, fw[1], resolution),
        }
    }

    fn build_axis(kernel: FilterKernel, width: f32, resolution: u32) -> Vec<f32> {
        let half = width / 2.0;
        let steps = ((width * resolution as f32).ceil() as usize).max(1) + 1;
        (0..steps)
            .map(|i| {
                let x = -half + i as f32 / resolution as f32;
                kernel.eval1d(x, width)
            })
            .collect()
    }

    fn lookup(table: &[f32], x: f32, width: f32, resolution: u32) -> f32 {
        let half = width / 2.0;
        if x.abs() > half {
            return 0.0;
        }
        let idx = ((x + half) * resolution as f32).round() as usize;
        table.get(idx.min(table.len() - 1)).copied().unwrap_or(0.0)
    }

    /// Filter weight at a sample's `(dx, dy)` offset from the pixel center.
    pub fn weight(&self, dx: f32, dy: f32) -> f32 {
        Self::lookup(&self.table_x, dx, self.fw[0], self.resolution)
            * Self::lookup(&self.table_y, dy, self.fw[1], self.resolution)
    }

    pub fn kernel(&self) -> FilterKernel {
        self.kernel
    }

    pub fn filter_width(&self) -> [f32; 2] {
        self.fw
    }
}
