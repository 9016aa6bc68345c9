//! Camera-space geometry primitives shared across the pipeline: bounds,
//! motion-time interpolation, and the small vector/matrix aliases built on
//! `vek` (the teacher's math dependency, `examples/zesterer-euc/Cargo.toml`).

mod bound;
mod motion;

pub use bound::Bound3;
pub use motion::{lerp_time, Motion, StaticOrMotion};

pub use vek::{Mat4, Vec2, Vec3, Vec4};

/// A camera-space 3x4 affine transform. Aliased rather than hand-rolled,
/// following the teacher's habit of leaning on `vek` for all linear algebra
/// instead of reimplementing it (see `rasterizer/triangles.rs`'s use of
/// `Mat3`/`Vec3` for the barycentric-weight matrix).
pub type Transform = Mat4<f32>;
