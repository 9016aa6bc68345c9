/// The axis along which a primitive's `Split` divides its parameter
/// space.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SplitAxis {
    U,
    V,
}

impl SplitAxis {
    /// Choose the axis with the longer raster-space extent, per "Split
    /// along the longer axis".
    pub fn longer(lu: f32, lv: f32) -> Self {
        if lu >= lv {
            SplitAxis::U
        } else {
            SplitAxis::V
        }
    }
}
