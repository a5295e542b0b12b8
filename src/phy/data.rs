use crate::data::{Vector, Vector4};
use crate::view::Packed;
use binrw::BinRead;
use num_enum::TryFromPrimitive;

#[derive(Debug, Clone, Copy, BinRead)]
pub struct PhyHeader {
    pub size: i32,
    pub id: i32,
    pub solid_count: i32,
    pub checksum: i32,
}

impl Packed for PhyHeader {
    const SIZE: usize = 16;
}

/// Collision model types a surface can declare. Only compact surfaces are
/// parseable; the others exist so the error can name what it found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(i16)]
pub enum ModelType {
    IvpCompactSurface = 0,
    IvpMopp = 1,
    IvpBall = 2,
    IvpVirtual = 3,
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct SurfaceHeader {
    /// Byte size of everything following this field.
    pub size: i32,
    pub id: i32,
    pub version: i16,
    pub model_type: i16,
}

impl Packed for SurfaceHeader {
    const SIZE: usize = 12;
}

/// Legacy wrapper fields followed by the IVP compact surface. Ledge-tree
/// offsets are relative to the start of `mass_centre`.
#[derive(Debug, Clone, Copy, BinRead)]
pub struct CompactSurfaceHeader {
    pub surface_size: i32,
    pub drag_axis_areas: Vector,
    pub axis_map_size: i32,
    pub mass_centre: Vector4,
    pub rotation_inertia: Vector4,
    pub upper_limit_radius: f32,
    pub packed_byte_size: u32,
    pub offset_ledgetree_root: i32,
    pub dummy: [i32; 3],
}

impl CompactSurfaceHeader {
    /// Wire offset of `mass_centre` inside this header.
    pub const MASS_CENTRE_OFFSET: usize = 20;
}

impl Packed for CompactSurfaceHeader {
    const SIZE: usize = 76;
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct LedgeNode {
    pub right_node_offset: i32,
    pub compact_ledge_offset: i32,
    pub centre: Vector4,
    pub radius: f32,
    pub box_sizes: [u8; 3],
    pub free_0: u8,
}

impl LedgeNode {
    pub fn is_terminal(&self) -> bool {
        self.right_node_offset == 0
    }
}

impl Packed for LedgeNode {
    const SIZE: usize = 32;
}

/// A leaf of the ledge tree: one convex hull over the shared point pool.
#[derive(Debug, Clone, Copy, BinRead)]
pub struct Ledge {
    /// Offset of the hull's point pool, relative to this ledge.
    pub point_offset: i32,
    pub bone_index: i32,
    pub packed: u32,
    pub triangles_count: i16,
    pub reserved: i16,
}

impl Packed for Ledge {
    const SIZE: usize = 16;
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct CompactTriangle {
    pub packed: u32,
    pub edges: [CompactEdge; 3],
}

impl Packed for CompactTriangle {
    const SIZE: usize = 16;
}

/// Packed half-edge; the low 16 bits index the edge's start point.
#[derive(Debug, Clone, Copy, BinRead)]
pub struct CompactEdge(pub u32);

impl CompactEdge {
    pub fn start_point_index(&self) -> u16 {
        (self.0 & 0xffff) as u16
    }
}

impl Packed for CompactEdge {
    const SIZE: usize = 4;
}

/// One convex solid with locally dense vertex indices.
#[derive(Debug, Clone)]
pub struct Solid {
    pub vertices: Vec<Vector4>,
    pub indices: Vec<u16>,
    pub centre_of_mass: Vector,
    pub bone_index: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_read_bytes;

    #[test]
    fn wire_sizes() {
        test_read_bytes::<PhyHeader>();
        test_read_bytes::<SurfaceHeader>();
        test_read_bytes::<CompactSurfaceHeader>();
        test_read_bytes::<LedgeNode>();
        test_read_bytes::<Ledge>();
        test_read_bytes::<CompactTriangle>();
    }

    #[test]
    fn edge_start_point_is_low_word() {
        let edge = CompactEdge(0xdead_0007);
        assert_eq!(7, edge.start_point_index());
    }
}
