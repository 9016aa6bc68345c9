//! The Filter / Resolve component: kernels, the per-bucket weight cache,
//! and the resolve pass itself.

pub mod kernel;
pub mod resolve;
pub mod weights;

pub use kernel::FilterKernel;
pub use resolve::{apply_exposure, quantize_color, resolve_pixel, ResolvedPixel};
pub use weights::WeightCache;
