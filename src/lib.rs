//! A bucket-oriented, REYES-style micropolygon rendering core: primitives are
//! bound to screen-space buckets, diced or split by the diceable arbiter,
//! shaded on a grid, hidden into per-pixel sample records, and finally
//! filtered and resolved bucket by bucket in raster-scan order.
//!
//! This crate is the rendering core only — it owns no window, no file
//! format, and no shading language. Callers supply geometry through
//! [`frame::Renderer`], shaders through [`shading::ShaderModule`], textures
//! through [`texture::TextureSource`], and an output sink through
//! [`frame::ImageSink`].

#![cfg_attr(feature = "nightly", no_std)]
#![cfg_attr(feature = "nightly", feature(alloc))]

#[cfg(feature = "nightly")]
#[macro_use]
extern crate alloc;

pub mod arbiter;
pub mod attributes;
pub mod bucket;
pub mod csg;
pub mod error;
pub mod filter;
pub mod frame;
pub mod geom;
pub mod gprim;
pub mod grid;
pub mod hider;
pub mod kdtree;
pub mod logging;
pub mod micropolygon;
pub mod occlusion;
pub mod options;
pub mod primvar;
pub mod sample;
pub mod scheduler;
pub mod shading;
pub mod texture;

pub use error::{ErrorHandler, LogErrorHandler, RenderError, Severity};
pub use frame::{ImageSink, Renderer};
pub use options::OptionSet;
