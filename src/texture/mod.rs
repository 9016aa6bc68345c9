//! The EWA Texture Sampler (spec §4.7) and its supporting contracts: the
//! `TextureSource` external interface (spec §6), the mipmap pyramid, and
//! the environment/shadow variants that reuse its filter kernel.

pub mod environment;
pub mod ewa;
pub mod mipmap;
pub mod sample;
pub mod shadow;

pub use ewa::{EwaFilter, EwaOptions};
pub use mipmap::{Mipmap, TileCache};
pub use sample::{sample as sample_mipmap, sample_cube, sample_latlong, SampleOptions, WarpQuad};

/// Wrap mode per axis, spec §4.7: "Wrap modes (per axis, independent):
/// black, clamp, periodic."
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WrapMode {
    Black,
    Clamp,
    Periodic,
}

impl WrapMode {
    /// Resolve a possibly out-of-range texel coordinate against an axis of
    /// length `n`. Returns `None` for `Black` when the coordinate would
    /// sample genuinely outside the texture (the caller then contributes
    /// zero for that texel instead of looking it up).
    pub fn resolve(&self, coord: i64, n: u32) -> Option<u32> {
        if n == 0 {
            return None;
        }
        match self {
            WrapMode::Black => {
                if coord < 0 || coord >= n as i64 {
                    None
                } else {
                    Some(coord as u32)
                }
            }
            WrapMode::Clamp => Some(coord.clamp(0, n as i64 - 1) as u32),
            WrapMode::Periodic => Some(coord.rem_euclid(n as i64) as u32),
        }
    }
}

/// Channel storage type a tile may report, spec §6: "channel type in
/// {u8,i8,u16,i16,u32,i32,f16,f32}". This core only ever operates on the
/// decoded `f32` values `TextureSource::tile` hands back; the original
/// on-disk encoding is the `TextureSource` implementor's concern.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChannelType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F16,
    F32,
}

/// `TextureFormat` header field, spec §6.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TextureFormat {
    Plain,
    Cube,
    LatLong,
    Shadow,
}

/// A materialized tile: `width * height * channels` texels in row-major
/// order, already decoded to `f32`.
#[derive(Clone, Debug)]
pub struct Tile {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub data: Vec<f32>,
}

impl Tile {
    pub fn texel(&self, x: u32, y: u32) -> &[f32] {
        let c = self.channels as usize;
        let idx = (y as usize * self.width as usize + x as usize) * c;
        &self.data[idx..idx + c]
    }
}

/// The external texture-file contract, spec §6: `TextureSource(path) ->
/// { width, height, channels, tile(tx,ty,lvl)->bytes, header }`. File I/O
/// itself (TIFF decoding, tiling on disk) is out of scope per spec.md §1;
/// this core only consumes already-decoded tiles through this trait.
pub trait TextureSource {
    fn width(&self, level: u32) -> u32;
    fn height(&self, level: u32) -> u32;
    fn channels(&self) -> u32;
    fn levels(&self) -> u32;
    fn format(&self) -> TextureFormat;

    /// Default tile edge length; spec §6: "Tile size is 64x64 by default."
    fn tile_size(&self) -> u32 {
        64
    }

    /// Fetch the (possibly cached) tile at `(tx, ty)` of mipmap `level`.
    fn tile(&self, tx: u32, ty: u32, level: u32) -> Tile;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn black_wrap_rejects_out_of_range() {
        assert_eq!(WrapMode::Black.resolve(-1, 4), None);
        assert_eq!(WrapMode::Black.resolve(4, 4), None);
        assert_eq!(WrapMode::Black.resolve(2, 4), Some(2));
    }

    #[test]
    fn clamp_wrap_saturates() {
        assert_eq!(WrapMode::Clamp.resolve(-5, 4), Some(0));
        assert_eq!(WrapMode::Clamp.resolve(99, 4), Some(3));
    }

    #[test]
    fn periodic_wrap_repeats() {
        assert_eq!(WrapMode::Periodic.resolve(-1, 4), Some(3));
        assert_eq!(WrapMode::Periodic.resolve(5, 4), Some(1));
    }
}
