use crate::data::Vector;
use crate::view::Packed;
use binrw::BinRead;
use bitflags::bitflags;

#[derive(Debug, Clone, Copy, BinRead)]
pub struct Plane {
    pub normal: Vector,
    pub dist: f32,
    pub plane_type: i32,
}

impl Packed for Plane {
    const SIZE: usize = 20;
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct Edge {
    pub vertices: [u16; 2],
}

impl Packed for Edge {
    const SIZE: usize = 4;
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct Face {
    pub plane_num: u16,
    pub side: u8,
    pub on_node: u8,
    pub first_edge: i32,
    pub num_edges: i16,
    pub tex_info: i16,
    pub disp_info: i16,
    pub surface_fog_volume_id: i16,
    pub styles: [u8; 4],
    pub light_offset: i32,
    pub area: f32,
    pub lightmap_mins: [i32; 2],
    pub lightmap_size: [i32; 2],
    pub original_face: i32,
    pub num_primitives: u16,
    pub first_primitive_id: u16,
    pub smoothing_groups: u32,
}

impl Packed for Face {
    const SIZE: usize = 56;
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct TexInfo {
    /// Projection axes for texture coordinates: two rows of (x, y, z, offset).
    pub texture_vecs: [[f32; 4]; 2],
    pub lightmap_vecs: [[f32; 4]; 2],
    pub flags: SurfaceFlags,
    pub tex_data: i32,
}

impl Packed for TexInfo {
    const SIZE: usize = 72;
}

#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceFlags(u32);

bitflags! {
    impl SurfaceFlags: u32 {
        const LIGHT = 0x1;
        const SKY_2D = 0x2;
        const SKY = 0x4;
        const WARP = 0x8;
        const TRANS = 0x10;
        const NO_PORTAL = 0x20;
        const TRIGGER = 0x40;
        const NO_DRAW = 0x80;
        const HINT = 0x100;
        const SKIP = 0x200;
        const NO_LIGHT = 0x400;
        const BUMPLIGHT = 0x800;
        const NO_SHADOWS = 0x1000;
        const NO_DECALS = 0x2000;
        const NO_CHOP = 0x4000;
        const HITBOX = 0x8000;
    }
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct TexData {
    pub reflectivity: Vector,
    pub name_string_table_id: i32,
    pub width: i32,
    pub height: i32,
    pub view_width: i32,
    pub view_height: i32,
}

impl Packed for TexData {
    const SIZE: usize = 32;
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct BspModel {
    pub mins: Vector,
    pub maxs: Vector,
    pub origin: Vector,
    pub head_node: i32,
    pub first_face: i32,
    pub num_faces: i32,
}

impl Packed for BspModel {
    const SIZE: usize = 48;
}

/// Reference to one edge or corner neighbour of a displacement.
/// `NO_NEIGHBOR` marks an empty slot.
#[derive(Debug, Clone, Copy, BinRead)]
pub struct DispSubNeighbor {
    pub neighbor_index: u16,
    pub neighbor_orientation: u8,
    pub span: u8,
    #[br(pad_after = 1)]
    pub neighbor_span: u8,
}

impl DispSubNeighbor {
    pub const NO_NEIGHBOR: u16 = 0xffff;

    pub fn is_valid(&self) -> bool {
        self.neighbor_index != Self::NO_NEIGHBOR
    }
}

impl Packed for DispSubNeighbor {
    const SIZE: usize = 6;
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct DispNeighbor {
    pub sub_neighbors: [DispSubNeighbor; 2],
}

impl Packed for DispNeighbor {
    const SIZE: usize = 12;
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct DispCornerNeighbors {
    pub neighbors: [u16; 4],
    #[br(pad_after = 1)]
    pub num_neighbors: u8,
}

impl Packed for DispCornerNeighbors {
    const SIZE: usize = 10;
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct DispInfo {
    pub start_position: Vector,
    pub disp_vert_start: i32,
    pub disp_tri_start: i32,
    pub power: i32,
    pub min_tess: i32,
    pub smoothing_angle: f32,
    pub contents: i32,
    #[br(pad_after = 2)]
    pub map_face: u16,
    pub lightmap_alpha_start: i32,
    pub lightmap_sample_position_start: i32,
    pub edge_neighbors: [DispNeighbor; 4],
    pub corner_neighbors: [DispCornerNeighbors; 4],
    pub allowed_verts: [u32; 10],
}

impl DispInfo {
    /// Grid side length for this displacement's power.
    pub fn side(&self) -> usize {
        (1usize << self.power) + 1
    }

    /// Every neighbouring displacement index the engine recorded, edge and
    /// corner neighbours alike. May contain duplicates.
    pub fn neighbor_indices(&self) -> impl Iterator<Item = u16> + '_ {
        let edges = self
            .edge_neighbors
            .iter()
            .flat_map(|neighbor| neighbor.sub_neighbors.iter())
            .filter(|sub| sub.is_valid())
            .map(|sub| sub.neighbor_index);
        let corners = self.corner_neighbors.iter().flat_map(|corner| {
            corner.neighbors[..(corner.num_neighbors as usize).min(4)]
                .iter()
                .copied()
        });
        edges.chain(corners)
    }
}

impl Packed for DispInfo {
    const SIZE: usize = 176;
}

/// Per-corner displacement of the subdivided grid.
#[derive(Debug, Clone, Copy, BinRead)]
pub struct DispVert {
    pub vec: Vector,
    pub dist: f32,
    pub alpha: f32,
}

impl Packed for DispVert {
    const SIZE: usize = 20;
}

/// Header of one model block inside the physics lump.
#[derive(Debug, Clone, Copy, BinRead)]
pub struct PhysModelHeader {
    pub model_index: i32,
    pub data_size: i32,
    pub keydata_size: i32,
    pub solid_count: i32,
}

impl Packed for PhysModelHeader {
    const SIZE: usize = 16;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_read_bytes;

    #[test]
    fn wire_sizes() {
        test_read_bytes::<Plane>();
        test_read_bytes::<Edge>();
        test_read_bytes::<Face>();
        test_read_bytes::<TexInfo>();
        test_read_bytes::<TexData>();
        test_read_bytes::<BspModel>();
        test_read_bytes::<DispSubNeighbor>();
        test_read_bytes::<DispNeighbor>();
        test_read_bytes::<DispCornerNeighbors>();
        test_read_bytes::<DispInfo>();
        test_read_bytes::<DispVert>();
        test_read_bytes::<PhysModelHeader>();
    }
}
