//! The Hider's per-pixel storage (Image Pixel, Sample Record) and the CSG
//! compositing pass that runs ahead of filter/resolve.

use crate::csg::CsgForest;
use crate::geom::{Vec2, Vec3};

bitflags::bitflags! {
    /// Sample record flags: `data[channels]`, flags
    /// (Occludes|Matte|Valid), and an optional csg-node-id.
    #[derive(Default)]
    pub struct SampleFlags: u8 {
        const OCCLUDES = 0b001;
        const MATTE    = 0b010;
        const VALID    = 0b100;
    }
}

/// Shaded color/opacity/depth carried by both the opaque fast path and the
/// full sample-list path.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SampleData {
    pub ci: Vec3<f32>,
    pub oi: Vec3<f32>,
    pub z: f32,
}

impl SampleData {
    pub const CLEAR: Self = Self { ci: Vec3 { x: 0.0, y: 0.0, z: 0.0 }, oi: Vec3 { x: 0.0, y: 0.0, z: 0.0 }, z: f32::INFINITY };
}

/// A single recorded hit in a sample's list.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SampleRecord {
    pub data: SampleData,
    pub flags: SampleFlags,
    pub csg_node_id: Option<u32>,
}

/// One sub-pixel jittered sample point within a pixel: position,
/// dof-lens-offset, time, detail-level, subcell-index, min-Z, max-Z.
#[derive(Clone, Debug)]
pub struct Sample {
    pub position: Vec2<f32>,
    pub dof_offset: Vec2<f32>,
    pub time: f32,
    pub detail_level: f32,
    pub subcell_index: u32,

    /// Fast-path opaque hit: nearest fully-opaque, non-CSG, non-matte
    /// surface seen so far.
    pub opaque: SampleData,
    /// Depth-ordered (ascending) list of non-trivial hits: anything with
    /// opacity < 1, matte, or CSG participation. Only ever touched when such
    /// a primitive actually intersects this sample.
    pub list: Vec<SampleRecord>,

    pub min_z: f32,
    pub max_z: f32,
}

impl Sample {
    pub fn new(position: Vec2<f32>, time: f32, detail_level: f32, subcell_index: u32) -> Self {
        Self {
            position,
            dof_offset: Vec2::zero(),
            time,
            detail_level,
            subcell_index,
            opaque: SampleData::CLEAR,
            list: Vec::new(),
            min_z: 0.0,
            max_z: f32::INFINITY,
        }
    }

    /// Update either the opaque fast path or insert into the
    /// depth-ordered list, depending on whether the hit is a simple
    /// opaque surface.
    ///
    /// Returns `true` if this hit lowered the sample's current opaque depth
    /// (the caller uses this to lazily refresh the pixel's and the
    /// occlusion tree node's `max_z`).
    pub fn apply(&mut self, data: SampleData, is_simple_opaque: bool) -> bool {
        if is_simple_opaque {
            if data.z < self.opaque.z {
                self.opaque = data;
                return true;
            }
            false
        } else {
            self.insert_record(SampleRecord { data, flags: SampleFlags::VALID, csg_node_id: None });
            false
        }
    }

    /// Insert `record` keeping the list in strict ascending depth order
    /// (spec §3 invariant: "adding a new hit preserves depth order"). After
    /// insertion, truncate everything past the first `Occludes` record —
    /// trailing entries are no longer visible for straight compositing,
    /// though CSG resolution (`resolve_csg`) re-expands the reasoning over
    /// every segment before the truncation is applied, per the §9 bugfix.
    pub fn insert_record(&mut self, record: SampleRecord) {
        let pos = self.list.partition_point(|r| r.data.z <= record.data.z);
        self.list.insert(pos, record);
    }

    /// The effective opaque depth, used by occlusion culling: the nearer of
    /// the opaque fast path and the first `Occludes` entry in the list.
    pub fn effective_opaque_z(&self) -> f32 {
        let list_z = self
            .list
            .iter()
            .find(|r| r.flags.contains(SampleFlags::OCCLUDES))
            .map(|r| r.data.z)
            .unwrap_or(f32::INFINITY);
        self.opaque.z.min(list_z)
    }

    /// Final composited color/opacity/depth for this sample, spec §4.5
    /// step 2: "if `s.list` is non-empty, Porter-Duff-composite the list
    /// (front→back); else use `s.opaqueData`." Ordinary transparency/matte
    /// records (no `csg_node_id`) are composited as-is; any run of records
    /// this frame's CSG forest owns is first reduced to its visible
    /// boolean-solid crossings (`CsgForest::resolve`) before compositing.
    pub fn resolved(&self, forest: &CsgForest) -> SampleData {
        if self.list.is_empty() {
            return self.opaque;
        }
        let segments = forest.resolve(&self.list);
        resolve_csg(&segments, self.opaque)
    }
}

/// Composite a depth-ordered (front-to-back) record list back-to-front with
/// premultiplied Porter-Duff "over": `C_out = C_f + C_b * (1 - a_f)`.
///
/// Spec §9 bugfix: the original source truncates a CSG sample's list at the
/// first `Occludes` record *before* resolving the boolean tree, which
/// silently drops segments a `difference` operation still needs. Here the
/// caller (`resolved`) always runs the CSG forest over the *entire* list
/// first; by the time a list reaches this function it already contains
/// only genuine visible surfaces, so truncating at the first `Occludes`
/// record here is safe — everything behind it is, by construction, already
/// known to be invisible.
fn resolve_csg(list: &[SampleRecord], background: SampleData) -> SampleData {
    let any_occludes = list.iter().any(|r| r.flags.contains(SampleFlags::OCCLUDES));
    let base = if any_occludes { SampleData::CLEAR } else { background };
    list.iter().rev().fold(base, |behind, record| over(record.data, behind))
}

/// Premultiplied Porter-Duff "over": `front` composited over `behind`.
fn over(front: SampleData, behind: SampleData) -> SampleData {
    let one_minus_a = Vec3::broadcast(1.0) - front.oi;
    SampleData {
        ci: front.ci + behind.ci * one_minus_a,
        oi: front.oi + behind.oi * one_minus_a,
        z: front.z.min(behind.z),
    }
}

/// A pixel's `Sx*Sy` jittered sub-pixel samples, spec §3's Image Pixel.
#[derive(Clone, Debug)]
pub struct Pixel {
    pub samples: Vec<Sample>,
}

impl Pixel {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    /// The pixel-wide max-Z used by occlusion culling: the farthest of its
    /// samples' effective opaque depths is irrelevant — occlusion needs the
    /// *nearest* bound that still guarantees full coverage, i.e. the
    /// maximum over samples (a primitive is only safely culled once every
    /// sample in the region is individually occluded).
    pub fn max_opaque_z(&self) -> f32 {
        self.samples.iter().map(Sample::effective_opaque_z).fold(f32::NEG_INFINITY, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(z: f32, ci: f32, oi: f32, occludes: bool) -> SampleRecord {
        SampleRecord {
            data: SampleData { ci: Vec3::broadcast(ci), oi: Vec3::broadcast(oi), z },
            flags: if occludes { SampleFlags::VALID | SampleFlags::OCCLUDES } else { SampleFlags::VALID },
            csg_node_id: None,
        }
    }

    #[test]
    fn insertion_preserves_ascending_depth_order() {
        let mut s = Sample::new(Vec2::zero(), 0.0, 1.0, 0);
        for z in [3.0, 1.0, 4.0, 1.5, 2.0] {
            s.insert_record(rec(z, 0.5, 0.5, false));
        }
        let depths: Vec<f32> = s.list.iter().map(|r| r.data.z).collect();
        let mut sorted = depths.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(depths, sorted);
    }

    /// Spec §8 Porter-Duff invariant / scenario 2: front z=1 opacity 0.5 red
    /// over back z=2 opacity 1.0 green composites to (0.5, 0.5, 0) at alpha
    /// 1.0, depth 1.
    #[test]
    fn semi_transparent_surface_over_opaque_background_matches_porter_duff() {
        let mut s = Sample::new(Vec2::zero(), 0.0, 1.0, 0);
        let front = SampleRecord {
            data: SampleData { ci: Vec3::new(0.5, 0.0, 0.0), oi: Vec3::broadcast(0.5), z: 1.0 },
            flags: SampleFlags::VALID,
            csg_node_id: None,
        };
        let back = SampleRecord {
            data: SampleData { ci: Vec3::new(0.0, 1.0, 0.0), oi: Vec3::broadcast(1.0), z: 2.0 },
            flags: SampleFlags::VALID | SampleFlags::OCCLUDES,
            csg_node_id: None,
        };
        s.insert_record(front);
        s.insert_record(back);
        let out = s.resolved(&CsgForest::empty());
        assert!((out.ci.x - 0.5).abs() < 1e-5);
        assert!((out.ci.y - 0.5).abs() < 1e-5);
        assert!((out.ci.z - 0.0).abs() < 1e-5);
        assert!((out.oi.x - 1.0).abs() < 1e-5);
        assert!((out.z - 1.0).abs() < 1e-5);
    }

    #[test]
    fn occludes_hides_samples_behind_it_from_the_composite() {
        let mut s = Sample::new(Vec2::zero(), 0.0, 1.0, 0);
        s.insert_record(rec(1.0, 1.0, 1.0, true));
        s.insert_record(rec(5.0, 0.0, 1.0, false));
        let out = s.resolved(&CsgForest::empty());
        // The z=5 record sits behind the opaque occluder and must not tint
        // the result.
        assert_eq!(out.ci, Vec3::broadcast(1.0));
    }

    #[test]
    fn opaque_fast_path_keeps_nearest_hit() {
        let mut s = Sample::new(Vec2::zero(), 0.0, 1.0, 0);
        let far = SampleData { ci: Vec3::broadcast(0.2), oi: Vec3::broadcast(1.0), z: 5.0 };
        let near = SampleData { ci: Vec3::broadcast(0.8), oi: Vec3::broadcast(1.0), z: 2.0 };
        assert!(s.apply(far, true));
        assert!(s.apply(near, true));
        assert_eq!(s.opaque.z, 2.0);
        assert_eq!(s.resolved(&CsgForest::empty()), near);
    }
}
