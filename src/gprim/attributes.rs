use crate::geom::Vec3;

/// Two-sidedness of a primitive.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Sides {
    One,
    Two,
}

/// The attribute set attached to a GPrim at bind time: shading rate,
/// default color/opacity, sidedness, matte flag.
///
/// Attribute stacks are persistent trees so `AttributeBegin`/`End` are
/// O(1) frame push/pop; that frame stack lives in `crate::attributes` and
/// hands
/// out cloned, flattened `Attributes` values like this one to each GPrim as
/// it is bound — cloning a flat struct of small Copy fields is cheaper than
/// chasing a parent-pointer chain on every primitive.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Attributes {
    pub shading_rate: f32,
    pub color: Vec3<f32>,
    pub opacity: Vec3<f32>,
    pub sides: Sides,
    pub matte: bool,
    /// Set by the frame façade when a primitive is bound inside an open
    /// `SolidBegin`/`SolidEnd` block (see `crate::csg::SolidBuilder`); `None`
    /// for ordinary geometry outside any CSG tree.
    pub csg_node_id: Option<u32>,
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            shading_rate: 1.0,
            color: Vec3::broadcast(1.0),
            opacity: Vec3::broadcast(1.0),
            sides: Sides::One,
            matte: false,
            csg_node_id: None,
        }
    }
}

impl Attributes {
    pub fn is_fully_opaque(&self) -> bool {
        self.opacity.x >= 1.0 && self.opacity.y >= 1.0 && self.opacity.z >= 1.0
    }
}
