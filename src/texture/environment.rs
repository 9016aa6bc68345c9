//! Environment-map direction -> (u,v) mappings, spec §4.7: "Environment
//! variants share the filter kernel; only the direction->(u,v) transform
//! differs."

use crate::geom::Vec3;

/// `u = (atan2(dy,dx)+pi)/(2*pi)`, `v = acos(dz)/pi`.
pub fn latlong_uv(dir: Vec3<f32>) -> (f32, f32) {
    let u = (dir.y.atan2(dir.x) + std::f32::consts::PI) / (2.0 * std::f32::consts::PI);
    let v = dir.z.clamp(-1.0, 1.0).acos() / std::f32::consts::PI;
    (u, v)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CubeFace {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl CubeFace {
    /// Position of this face within the RI-spec 3x2 atlas layout (column,
    /// row), both in `0..3`/`0..2`.
    pub fn atlas_cell(&self) -> (u32, u32) {
        match self {
            CubeFace::PosX => (0, 0),
            CubeFace::NegX => (1, 0),
            CubeFace::PosY => (2, 0),
            CubeFace::NegY => (0, 1),
            CubeFace::PosZ => (1, 1),
            CubeFace::NegZ => (2, 1),
        }
    }
}

/// Pick the cube face by `argmax(|d|)` and project `dir` onto it, returning
/// local `(u, v)` in `[-1, 1]` scaled by the field of view (spec §4.7:
/// "local u,v = d_other/(d_major * tan(fov/2))").
pub fn cube_face_uv(dir: Vec3<f32>, fov: f32) -> (CubeFace, f32, f32) {
    let (ax, ay, az) = (dir.x.abs(), dir.y.abs(), dir.z.abs());
    let tan_half_fov = (fov / 2.0).tan();

    if ax >= ay && ax >= az {
        let face = if dir.x >= 0.0 { CubeFace::PosX } else { CubeFace::NegX };
        (face, dir.y / (ax * tan_half_fov), dir.z / (ax * tan_half_fov))
    } else if ay >= ax && ay >= az {
        let face = if dir.y >= 0.0 { CubeFace::PosY } else { CubeFace::NegY };
        (face, dir.x / (ay * tan_half_fov), dir.z / (ay * tan_half_fov))
    } else {
        let face = if dir.z >= 0.0 { CubeFace::PosZ } else { CubeFace::NegZ };
        (face, dir.x / (az * tan_half_fov), dir.y / (az * tan_half_fov))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latlong_forward_axis_maps_to_equator_center() {
        let (u, v) = latlong_uv(Vec3::new(1.0, 0.0, 0.0));
        assert!((u - 0.5).abs() < 1e-5);
        assert!((v - 0.5).abs() < 1e-5);
    }

    #[test]
    fn latlong_poles_map_to_v_extremes() {
        let (_, v_top) = latlong_uv(Vec3::new(0.0, 0.0, 1.0));
        let (_, v_bottom) = latlong_uv(Vec3::new(0.0, 0.0, -1.0));
        assert!(v_top < 1e-5);
        assert!((v_bottom - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cube_face_picks_dominant_axis() {
        let (face, _, _) = cube_face_uv(Vec3::new(5.0, 1.0, -1.0), std::f32::consts::FRAC_PI_2);
        assert_eq!(face, CubeFace::PosX);
    }

    #[test]
    fn cube_faces_tile_a_3x2_atlas() {
        let cells: Vec<(u32, u32)> = [
            CubeFace::PosX,
            CubeFace::NegX,
            CubeFace::PosY,
            CubeFace::NegY,
            CubeFace::PosZ,
            CubeFace::NegZ,
        ]
        .iter()
        .map(CubeFace::atlas_cell)
        .collect();
        assert_eq!(cells.len(), 6);
        assert!(cells.iter().all(|&(c, r)| c < 3 && r < 2));
    }
}
