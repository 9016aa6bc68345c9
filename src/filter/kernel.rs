//! Filter kernels for reconstruction: box, triangle, Catmull-Rom, sinc,
//! Gaussian, Mitchell. Each is the standard separable RenderMan
//! pixel-filter formula `F(dx/Fwx, dy/Fwy)`, evaluated per axis and
//! combined as a product.

/// Which reconstruction filter a frame uses (`OptionSet::filter`).
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FilterKernel {
    Box,
    Triangle,
    CatmullRom,
    Sinc,
    Gaussian,
    Mitchell,
}

impl FilterKernel {
    /// Weight for a sample offset `(dx, dy)` from the pixel center, with
    /// filter widths `fw = [Fwx, Fwy]`.
    pub fn weight(&self, dx: f32, dy: f32, fw: [f32; 2]) -> f32 {
        self.eval1d(dx, fw[0]) * self.eval1d(dy, fw[1])
    }

    /// 1-D evaluation at offset `x` (pixels) given filter width `w`
    /// (pixels); zero outside `|x| <= w/2`.
    pub(crate) fn eval1d(&self, x: f32, w: f32) -> f32 {
        let half = w / 2.0;
        if x.abs() > half {
            return 0.0;
        }
        match self {
            FilterKernel::Box => 1.0,
            FilterKernel::Triangle => 1.0 - (x.abs() / half.max(1e-6)),
            FilterKernel::Gaussian => {
                let alpha = 2.0;
                let t = x / half.max(1e-6);
                (-alpha * t * t).exp() - (-alpha).exp()
            }
            FilterKernel::Sinc => sinc_windowed(x, half),
            FilterKernel::CatmullRom => catmull_rom(x, half),
            FilterKernel::Mitchell => mitchell(x, half, 1.0 / 3.0, 1.0 / 3.0),
        }
    }
}

fn sinc(x: f32) -> f32 {
    if x.abs() < 1e-8 {
        1.0
    } else {
        let px = std::f32::consts::PI * x;
        px.sin() / px
    }
}

/// Lanczos-windowed sinc, the usual RenderMan `sinc` filter (window order 3).
fn sinc_windowed(x: f32, half: f32) -> f32 {
    let t = x / half.max(1e-6);
    sinc(t) * sinc(t / 3.0)
}

fn catmull_rom(x: f32, half: f32) -> f32 {
    let t = (x / half.max(1e-6) * 2.0).abs();
    if t < 1.0 {
        (3.0 * t * t * t - 5.0 * t * t + 2.0) / 2.0
    } else if t < 2.0 {
        (-t * t * t + 5.0 * t * t - 8.0 * t + 4.0) / 2.0
    } else {
        0.0
    }
}

/// Mitchell-Netravali filter, B and C default to 1/3 (the RenderMan default).
fn mitchell(x: f32, half: f32, b: f32, c: f32) -> f32 {
    let t = (x / half.max(1e-6) * 2.0).abs();
    let t2 = t * t;
    let t3 = t2 * t;
    let value = if t < 1.0 {
        (12.0 - 9.0 * b - 6.0 * c) * t3 + (-18.0 + 12.0 * b + 6.0 * c) * t2 + (6.0 - 2.0 * b)
    } else if t < 2.0 {
        (-b - 6.0 * c) * t3 + (6.0 * b + 30.0 * c) * t2 + (-12.0 * b - 48.0 * c) * t + (8.0 * b + 24.0 * c)
    } else {
        0.0
    };
    value / 6.0
}
