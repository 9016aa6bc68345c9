//! The frame façade (spec §6): wires `OptionSet`, the bucket grid, the
//! attribute stack, and the shader pipeline into the `BeginFrame /
//! WorldBegin / ... / WorldEnd / EndFrame` driver, and generalizes the
//! teacher's `render_par`/`render_seq` scanline-row cursor
//! (`examples/zesterer-euc/src/pipeline.rs`) into a raster-scan bucket
//! cursor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::attributes::AttributeStack;
use crate::bucket::{Bucket, BucketRect};
use crate::csg::{CsgForest, SolidBuilder, SolidOp};
use crate::error::{report, ErrorHandler, LogErrorHandler, RenderError};
use crate::filter::{apply_exposure, quantize_color, resolve_pixel, ResolvedPixel, WeightCache};
use crate::geom::{StaticOrMotion, Transform, Vec2, Vec3, Vec4};
use crate::gprim::{GPrim, Shape, Sides};
use crate::hider::build_pixel_samples;
use crate::options::{OptionSet, ScreenWindow};
use crate::primvar::PrimvarSet;
use crate::scheduler::{self, FrameGeometry};
use crate::shading::ShaderPipeline;

/// Where a finished bucket's resolved pixels go (spec §6: the core never
/// owns an output image; it hands resolved buckets to a sink). Buckets
/// arrive in raster-scan order from `run_seq`; `run_par` instead sorts its
/// results back into raster-scan order before calling this, so `write_bucket`
/// can rely on in-order delivery either way.
pub trait ImageSink {
    fn write_bucket(&mut self, rect: BucketRect, pixels: &[ResolvedPixel]);
}

enum State {
    Idle,
    Frame { geometry: FrameGeometry, buckets: Vec<Bucket>, world_open: bool, csg: CsgForest },
}

/// The frame driver. Owns the attribute stack, the shader bindings, and
/// (while a frame is open) every bucket's work queues and pixel storage.
pub struct Renderer<'s, S: ImageSink> {
    opts: OptionSet,
    sink: S,
    errors: Box<dyn ErrorHandler>,
    attributes: AttributeStack,
    shaders: ShaderPipeline<'s>,
    projection: Transform,
    state: State,
    solid_builder: SolidBuilder,
}

impl<'s, S: ImageSink> Renderer<'s, S> {
    pub fn new(sink: S) -> Self {
        Self {
            opts: OptionSet::default(),
            sink,
            errors: Box::new(LogErrorHandler),
            attributes: AttributeStack::new(),
            shaders: ShaderPipeline::default(),
            projection: Transform::identity(),
            state: State::Idle,
            solid_builder: SolidBuilder::new(),
        }
    }

    pub fn with_error_handler(mut self, handler: impl ErrorHandler + 'static) -> Self {
        self.errors = Box::new(handler);
        self
    }

    pub fn set_shaders(&mut self, shaders: ShaderPipeline<'s>) {
        self.shaders = shaders;
    }

    pub fn attribute_begin(&mut self) {
        self.attributes.begin();
    }

    pub fn attribute_end(&mut self) {
        self.attributes.end();
    }

    pub fn set_shading_rate(&mut self, v: f32) {
        self.attributes.set_shading_rate(v);
    }

    pub fn set_color(&mut self, c: Vec3<f32>) {
        self.attributes.set_color(c);
    }

    pub fn set_opacity(&mut self, o: Vec3<f32>) {
        self.attributes.set_opacity(o);
    }

    pub fn set_sides(&mut self, sides: Sides) {
        self.attributes.set_sides(sides);
    }

    pub fn set_matte(&mut self, matte: bool) {
        self.attributes.set_matte(matte);
    }

    /// `SolidBegin`: every primitive bound until the matching `solid_end`
    /// becomes a leaf of a new CSG subtree combined under `op`.
    pub fn solid_begin(&mut self, op: SolidOp) {
        self.solid_builder.begin(op);
    }

    /// `SolidEnd`: close the innermost open `SolidBegin` block.
    pub fn solid_end(&mut self) {
        self.solid_builder.end();
    }

    /// `BeginFrame`/`FrameBegin`: freeze `opts`, lay out the bucket grid, and
    /// allocate every bucket's halo-extended pixel storage up front (spec §3:
    /// a bucket's storage, and therefore its sample layout, never changes
    /// once allocated).
    pub fn begin_frame(&mut self, opts: OptionSet, projection: Transform) -> Result<(), RenderError> {
        if matches!(self.state, State::Frame { .. }) {
            report(
                self.errors.as_ref(),
                RenderError::OptionsConflict { reason: "begin_frame called while a frame was already open".into() },
            );
        }

        let halo = opts.filter_halo();
        let geometry = FrameGeometry::new(opts.xres, opts.yres, opts.bucket_size, halo);
        let weights = WeightCache::build(opts.filter, opts.filter_width, 32);

        let mut buckets = Vec::with_capacity(geometry.bucket_count());
        for idx in 0..geometry.bucket_count() {
            let rect = geometry.bucket_rect(idx);
            let pixel_samples = opts.pixel_samples;
            let shutter = (opts.shutter_open, opts.shutter_close);
            let dof = opts.dof;
            let mut bucket = Bucket::new(rect, halo, |x, y| {
                build_pixel_samples(x, y, pixel_samples, shutter, &dof, pixel_jitter(x, y))
            });
            bucket.weights = Some(weights.clone());
            buckets.push(bucket);
        }

        self.projection = projection;
        self.opts = opts;
        self.solid_builder = SolidBuilder::new();
        self.state = State::Frame { geometry, buckets, world_open: false, csg: CsgForest::empty() };
        Ok(())
    }

    /// `WorldBegin`: open the primitive-submission window.
    pub fn world_begin(&mut self) -> Result<(), RenderError> {
        match &mut self.state {
            State::Frame { world_open, .. } => {
                *world_open = true;
                Ok(())
            }
            State::Idle => Err(RenderError::OptionsConflict { reason: "world_begin called before begin_frame".into() }),
        }
    }

    /// Bind and post a surface primitive (spec §4.1 `Scheduled`): builds a
    /// `GPrim` from the current attribute-stack state and defers it onto the
    /// earliest bucket its camera-space bound touches.
    pub fn surface(&mut self, shape: Shape, primvars: PrimvarSet) -> Result<(), RenderError> {
        if !matches!(self.state, State::Frame { world_open: true, .. }) {
            return Err(RenderError::OptionsConflict { reason: "surface called outside a WorldBegin/WorldEnd block".into() });
        }

        let raster_of = self.raster_of();
        let mut attrs = self.attributes.resolve();
        if self.solid_builder.is_open() {
            attrs.csg_node_id = Some(self.solid_builder.bind_leaf());
        }
        let opts = self.opts.clone();
        let prim = GPrim {
            shape: StaticOrMotion::Static(self.opts.shutter_open, shape),
            attrs,
            primvars,
            eye_split_count: 0,
            shader_binding: None,
        };

        if let State::Frame { geometry, buckets, .. } = &mut self.state {
            scheduler::post_primitive(geometry, buckets, prim, raster_of, &opts);
        }
        Ok(())
    }

    /// `WorldEnd`: close primitive submission and run the bucket pipeline
    /// (drain -> close -> resolve -> emit) over every bucket, in raster-scan
    /// order.
    pub fn world_end(&mut self) -> Result<(), RenderError> {
        match &mut self.state {
            State::Frame { world_open, .. } => *world_open = false,
            State::Idle => return Err(RenderError::OptionsConflict { reason: "world_end called before begin_frame".into() }),
        }

        let forest = std::mem::take(&mut self.solid_builder).finish();
        if let State::Frame { csg, .. } = &mut self.state {
            *csg = forest;
        }

        #[cfg(feature = "par")]
        self.run_par();
        #[cfg(not(feature = "par"))]
        self.run_seq();

        Ok(())
    }

    /// `EndFrame`: release the bucket grid, ready for the next `begin_frame`.
    pub fn end_frame(&mut self) {
        self.state = State::Idle;
    }

    fn raster_of(&self) -> impl Fn(Vec3<f32>) -> Vec2<f32> + Copy {
        let projection = self.projection;
        let screen = self.opts.resolve_screen_window();
        let (xres, yres) = (self.opts.xres, self.opts.yres);
        move |p: Vec3<f32>| project(&projection, screen, xres, yres, p)
    }

    /// Sequential driver: each bucket is drained, closed, resolved, and
    /// handed to the sink before the next one starts (the default when the
    /// `par` feature is off, mirroring the teacher's `render_seq`).
    #[cfg_attr(feature = "par", allow(dead_code))]
    fn run_seq(&mut self) {
        let raster_of = self.raster_of();
        let opts = self.opts.clone();
        let State::Frame { geometry, buckets, csg, .. } = &mut self.state else { return };

        for idx in 0..geometry.bucket_count() {
            scheduler::drain_primitives(geometry, buckets, idx, raster_of, &self.shaders, &opts, self.errors.as_ref());
            scheduler::close_bucket(buckets, idx, raster_of, &opts.dof);
            let rect = buckets[idx].rect;
            let pixels = resolve_bucket_pixels(&buckets[idx], &opts, csg);
            self.sink.write_bucket(rect, &pixels);
        }
    }

    /// Parallel driver (spec §5, generalizing the teacher's atomic row
    /// cursor to bucket granularity): primitives are drained sequentially in
    /// raster-scan order first (splits and diced MPs only ever route to a
    /// bucket index greater than or equal to the one currently draining —
    /// see `FrameGeometry::raster_scan_index`'s monotonicity — so by the end
    /// of this pass every bucket's queues are final). Closing, resolving,
    /// and emitting each bucket is then independent per bucket, so worker
    /// threads pull bucket indices from a shared cursor exactly like
    /// `render_par`'s row groups, except each unit of work is a whole bucket
    /// rather than a strip of scanlines.
    #[cfg(feature = "par")]
    fn run_par(&mut self) {
        let raster_of = self.raster_of();
        let opts = self.opts.clone();
        let State::Frame { geometry, buckets, csg, .. } = &mut self.state else { return };

        for idx in 0..geometry.bucket_count() {
            scheduler::drain_primitives(geometry, buckets, idx, raster_of, &self.shaders, &opts, self.errors.as_ref());
        }

        let bucket_count = buckets.len();
        let buckets_ptr = BucketsPtr(buckets.as_mut_ptr());
        let cursor = AtomicUsize::new(0);
        let results = Mutex::new(Vec::with_capacity(bucket_count));
        let threads = num_cpus::get().max(1);
        let csg = &*csg;

        crossbeam_utils::thread::scope(|scope| {
            for _ in 0..threads {
                let cursor = &cursor;
                let results = &results;
                let opts = &opts;
                let raster_of = raster_of;
                scope.spawn(move |_| loop {
                    let idx = cursor.fetch_add(1, Ordering::Relaxed);
                    if idx >= bucket_count {
                        break;
                    }
                    // Safety: the atomic cursor hands each index to exactly
                    // one thread, so this is the only live reference to
                    // `buckets[idx]` for the rest of the frame.
                    let bucket = unsafe { &mut *buckets_ptr.0.add(idx) };
                    scheduler::close_bucket(std::slice::from_mut(bucket), 0, raster_of, &opts.dof);
                    let pixels = resolve_bucket_pixels(bucket, opts, csg);
                    results.lock().unwrap().push((idx, bucket.rect, pixels));
                });
            }
        })
        .expect("a bucket worker thread panicked");

        let mut results = results.into_inner().unwrap();
        results.sort_by_key(|(idx, _, _)| *idx);
        for (_, rect, pixels) in results {
            self.sink.write_bucket(rect, &pixels);
        }
    }
}

#[cfg(feature = "par")]
#[derive(Copy, Clone)]
struct BucketsPtr(*mut Bucket);

#[cfg(feature = "par")]
unsafe impl Send for BucketsPtr {}
#[cfg(feature = "par")]
unsafe impl Sync for BucketsPtr {}

/// Camera-to-raster projection: perspective-divide through `projection`,
/// then map the resulting NDC coordinate from `screen` into `[0, xres) x [0,
/// yres)`, flipping Y since raster space grows downward while NDC grows
/// upward.
fn project(projection: &Transform, screen: ScreenWindow, xres: u32, yres: u32, p: Vec3<f32>) -> Vec2<f32> {
    let clip = *projection * Vec4::new(p.x, p.y, p.z, 1.0);
    let w = if clip.w.abs() > 1.0e-8 { clip.w } else { 1.0e-8 };
    let ndc_x = clip.x / w;
    let ndc_y = clip.y / w;
    let sx = (ndc_x - screen.left) / (screen.right - screen.left) * xres as f32;
    let sy = (1.0 - (ndc_y - screen.bottom) / (screen.top - screen.bottom)) * yres as f32;
    Vec2::new(sx, sy)
}

fn resolve_bucket_pixels(bucket: &Bucket, opts: &OptionSet, csg: &CsgForest) -> Vec<ResolvedPixel> {
    let weights = bucket.weights.as_ref().expect("bucket weight cache initialized at begin_frame");
    let rect = bucket.rect;
    let mut pixels = Vec::with_capacity((rect.width() * rect.height()) as usize);
    for y in rect.y0..rect.y1 {
        for x in rect.x0..rect.x1 {
            let mut resolved = resolve_pixel(bucket, weights, csg, x as i64, y as i64);
            resolved.color = apply_exposure(resolved.color, opts.exposure_gain, opts.exposure_gamma);
            if !opts.quantize_color.is_float() {
                resolved.color = quantize_color(resolved.color, &opts.quantize_color, dither_for(x, y));
            }
            pixels.push(resolved);
        }
    }
    pixels
}

/// `splitmix64`'s finalizer, used as a small deterministic noise source: the
/// hider's `build_pixel_samples`/quantization dithering only need a
/// reproducible jitter sequence (spec §8's filter-idempotence property),
/// never a specific PRNG.
fn hash_noise(mut seed: u64) -> f32 {
    seed ^= seed >> 33;
    seed = seed.wrapping_mul(0xff51afd7ed558ccd);
    seed ^= seed >> 33;
    seed = seed.wrapping_mul(0xc4ceb9fe1a85ec53);
    seed ^= seed >> 33;
    (seed >> 11) as f32 / (1u64 << 53) as f32
}

fn pixel_jitter(x: i64, y: i64) -> impl FnMut(u32, u32, u32) -> f32 {
    move |ix: u32, iy: u32, axis: u32| {
        let seed = (x as u64).wrapping_mul(0x9E3779B97F4A7C15)
            ^ (y as u64).wrapping_mul(0xC2B2AE3D27D4EB4F)
            ^ (ix as u64).wrapping_mul(0x165667B19E3779F9)
            ^ (iy as u64).wrapping_mul(0x27D4EB2F165667C5)
            ^ (axis as u64).wrapping_mul(0x9E3779B1);
        hash_noise(seed)
    }
}

fn dither_for(x: i64, y: i64) -> Vec3<f32> {
    let seed = |channel: u64| {
        (x as u64).wrapping_mul(0xD6E8FEB86659FD93) ^ (y as u64).wrapping_mul(0xA5CB3D39AA7E1A37) ^ (channel.wrapping_mul(0x9E3779B1))
    };
    Vec3::new(hash_noise(seed(0)), hash_noise(seed(1)), hash_noise(seed(2)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gprim::Patch;
    use crate::grid::Grid;
    use crate::shading::{ShaderFault, ShaderModule};

    struct RecordingSink {
        buckets: Vec<(BucketRect, Vec<ResolvedPixel>)>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self { buckets: Vec::new() }
        }
    }

    impl ImageSink for RecordingSink {
        fn write_bucket(&mut self, rect: BucketRect, pixels: &[ResolvedPixel]) {
            self.buckets.push((rect, pixels.to_vec()));
        }
    }

    struct ConstColor(Vec3<f32>);
    impl ShaderModule for ConstColor {
        fn uses(&self) -> &[&str] {
            &["Cs"]
        }
        fn evaluate(&self, grid: &mut Grid) -> Result<(), ShaderFault> {
            for p in &mut grid.points {
                p.ci = self.0;
                p.oi = Vec3::broadcast(1.0);
            }
            Ok(())
        }
    }

    fn flat_patch() -> Shape {
        Shape::Patch(Patch {
            p00: Vec3::new(-1.0, -1.0, 1.0),
            p10: Vec3::new(1.0, -1.0, 1.0),
            p01: Vec3::new(-1.0, 1.0, 1.0),
            p11: Vec3::new(1.0, 1.0, 1.0),
        })
    }

    fn test_options() -> OptionSet {
        let mut opts = OptionSet::default();
        opts.xres = 4;
        opts.yres = 4;
        opts.pixel_samples = [1, 1];
        opts.bucket_size = [16, 16];
        opts
    }

    #[test]
    fn a_full_screen_opaque_patch_resolves_to_its_shaded_color_everywhere() {
        let white = ConstColor(Vec3::broadcast(1.0));
        let shaders = ShaderPipeline { surface: Some(&white), ..Default::default() };

        let mut renderer = Renderer::new(RecordingSink::new());
        renderer.set_shaders(shaders);
        renderer.begin_frame(test_options(), Transform::identity()).unwrap();
        renderer.world_begin().unwrap();
        renderer.set_sides(Sides::Two);
        renderer.surface(flat_patch(), PrimvarSet::new()).unwrap();
        renderer.world_end().unwrap();
        renderer.end_frame();

        assert_eq!(renderer.sink.buckets.len(), 1);
        let (rect, pixels) = &renderer.sink.buckets[0];
        assert_eq!(rect.width() * rect.height(), pixels.len() as u32);
        for pixel in pixels {
            assert!(pixel.coverage > 0.0);
            assert!((pixel.color.x - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn surface_outside_a_world_block_is_rejected() {
        let mut renderer = Renderer::new(RecordingSink::new());
        renderer.begin_frame(test_options(), Transform::identity()).unwrap();
        let err = renderer.surface(flat_patch(), PrimvarSet::new());
        assert!(err.is_err());
    }

    #[test]
    fn world_end_before_begin_frame_is_an_error() {
        let mut renderer = Renderer::new(RecordingSink::new());
        assert!(renderer.world_end().is_err());
    }

    #[test]
    fn an_empty_frame_still_emits_every_bucket_as_fully_transparent() {
        let mut renderer = Renderer::new(RecordingSink::new());
        renderer.begin_frame(test_options(), Transform::identity()).unwrap();
        renderer.world_begin().unwrap();
        renderer.world_end().unwrap();
        renderer.end_frame();

        let (_, pixels) = &renderer.sink.buckets[0];
        assert!(pixels.iter().all(|p| p.coverage == 0.0));
    }

    #[test]
    fn pixel_jitter_is_deterministic_across_calls() {
        let mut a = pixel_jitter(3, 7);
        let mut b = pixel_jitter(3, 7);
        assert_eq!(a(1, 2, 0), b(1, 2, 0));
    }
}
