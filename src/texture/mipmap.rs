//! The Mipmap Level-Set (spec §3): a power-of-two downsampled image
//! pyramid, generated by repeated box filtering when not supplied
//! pre-generated.

use std::cell::RefCell;

use super::{Tile, TextureFormat, TextureSource};

#[cfg(feature = "par")]
use fxhash::FxHashMap as TileMap;
#[cfg(not(feature = "par"))]
use std::collections::HashMap as TileMap;

/// One level of the pyramid: `width * height * channels` texels.
#[derive(Clone, Debug)]
pub struct Level {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub data: Vec<f32>,
}

impl Level {
    pub fn texel(&self, x: u32, y: u32) -> &[f32] {
        let c = self.channels as usize;
        let idx = (y as usize * self.width as usize + x as usize) * c;
        &self.data[idx..idx + c]
    }
}

/// Spec §3: "For a texture of base size WxH, levels l=0..L have size
/// `max(1, W>>l) x max(1, H>>l)` with level 0 being the base; each level
/// approximates the box-filtered average of the 2x2 block in the level
/// below (or is supplied pre-generated)."
#[derive(Clone, Debug)]
pub struct Mipmap {
    levels: Vec<Level>,
}

impl Mipmap {
    /// Generate a full pyramid from a base level by repeated 2x2 box
    /// filtering, down to a `1x1` level.
    pub fn generate(base: Level) -> Self {
        let mut levels = vec![base];
        loop {
            let prev = levels.last().unwrap();
            if prev.width == 1 && prev.height == 1 {
                break;
            }
            levels.push(downsample(prev));
        }
        Self { levels }
    }

    /// Wrap an already-generated pyramid (spec: "or is supplied
    /// pre-generated"), trusting the caller's level sizes.
    pub fn from_levels(levels: Vec<Level>) -> Self {
        Self { levels }
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, l: usize) -> &Level {
        &self.levels[l.min(self.levels.len() - 1)]
    }

    /// Tri-linearly blend between the two integer levels bracketing
    /// fractional level `l` (spec §4.7 step 4: "optionally sample two
    /// adjacent levels and tri-linearly blend on fractional ℓ").
    pub fn sample_bilinear(&self, l: f32, u: f32, v: f32, channels: usize) -> Vec<f32> {
        let l0 = l.floor().max(0.0) as usize;
        let l1 = (l0 + 1).min(self.levels.len() - 1);
        let frac = (l - l0 as f32).clamp(0.0, 1.0);
        let a = sample_level_bilinear(self.level(l0), u, v, channels);
        if l0 == l1 || frac == 0.0 {
            return a;
        }
        let b = sample_level_bilinear(self.level(l1), u, v, channels);
        a.iter().zip(b.iter()).map(|(x, y)| x * (1.0 - frac) + y * frac).collect()
    }
}

fn sample_level_bilinear(level: &Level, u: f32, v: f32, channels: usize) -> Vec<f32> {
    let fx = (u * level.width as f32 - 0.5).max(0.0);
    let fy = (v * level.height as f32 - 0.5).max(0.0);
    let x0 = (fx.floor() as u32).min(level.width - 1);
    let y0 = (fy.floor() as u32).min(level.height - 1);
    let x1 = (x0 + 1).min(level.width - 1);
    let y1 = (y0 + 1).min(level.height - 1);
    let tx = fx - x0 as f32;
    let ty = fy - y0 as f32;

    let p00 = level.texel(x0, y0);
    let p10 = level.texel(x1, y0);
    let p01 = level.texel(x0, y1);
    let p11 = level.texel(x1, y1);

    (0..channels)
        .map(|c| {
            let top = p00[c] * (1.0 - tx) + p10[c] * tx;
            let bot = p01[c] * (1.0 - tx) + p11[c] * tx;
            top * (1.0 - ty) + bot * ty
        })
        .collect()
}

fn downsample(level: &Level) -> Level {
    let w = (level.width >> 1).max(1);
    let h = (level.height >> 1).max(1);
    let c = level.channels as usize;
    let mut data = vec![0.0f32; w as usize * h as usize * c];
    for y in 0..h {
        for x in 0..w {
            let x0 = (x * 2).min(level.width - 1);
            let y0 = (y * 2).min(level.height - 1);
            let x1 = (x * 2 + 1).min(level.width - 1);
            let y1 = (y * 2 + 1).min(level.height - 1);
            let out_idx = (y as usize * w as usize + x as usize) * c;
            for ch in 0..c {
                let sum = level.texel(x0, y0)[ch] + level.texel(x1, y0)[ch] + level.texel(x0, y1)[ch] + level.texel(x1, y1)[ch];
                data[out_idx + ch] = sum / 4.0;
            }
        }
    }
    Level { width: w, height: h, channels: level.channels, data }
}

/// The Mipmap cache (spec §5): EWA sampling revisits a handful of tiles
/// over and over as it walks a pixel's elliptical footprint, so this wraps
/// a `TextureSource` and memoizes its `tile()` results keyed by
/// `(tx, ty, level)` rather than re-decoding on every lookup.
pub struct TileCache<T: TextureSource> {
    source: T,
    tiles: RefCell<TileMap<(u32, u32, u32), Tile>>,
}

impl<T: TextureSource> TileCache<T> {
    pub fn new(source: T) -> Self {
        Self { source, tiles: RefCell::new(TileMap::default()) }
    }

    pub fn source(&self) -> &T {
        &self.source
    }

    /// Fetch `(tx, ty, level)`, decoding through the wrapped source only on
    /// a cache miss.
    pub fn tile_cached(&self, tx: u32, ty: u32, level: u32) -> Tile {
        if let Some(tile) = self.tiles.borrow().get(&(tx, ty, level)) {
            return tile.clone();
        }
        let tile = self.source.tile(tx, ty, level);
        self.tiles.borrow_mut().insert((tx, ty, level), tile.clone());
        tile
    }

    pub fn len(&self) -> usize {
        self.tiles.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.borrow().is_empty()
    }

    /// Drop every cached tile, e.g. between frames that rebind textures.
    pub fn clear(&self) {
        self.tiles.borrow_mut().clear();
    }
}

impl<T: TextureSource> TextureSource for TileCache<T> {
    fn width(&self, level: u32) -> u32 {
        self.source.width(level)
    }

    fn height(&self, level: u32) -> u32 {
        self.source.height(level)
    }

    fn channels(&self) -> u32 {
        self.source.channels()
    }

    fn levels(&self) -> u32 {
        self.source.levels()
    }

    fn format(&self) -> TextureFormat {
        self.source.format()
    }

    fn tile_size(&self) -> u32 {
        self.source.tile_size()
    }

    fn tile(&self, tx: u32, ty: u32, level: u32) -> Tile {
        self.tile_cached(tx, ty, level)
    }
}
