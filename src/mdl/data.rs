use crate::data::{FixedString, Vector, Vector2};
use crate::view::Packed;
use binrw::BinRead;
use bitflags::bitflags;

// ---- MDL ----

/// Prefix of the studio model header, through the body-part table pointers.
/// Offsets inside are absolute from the start of the file.
#[derive(Debug, Clone, BinRead)]
pub struct MdlHeader {
    pub id: i32,
    pub version: i32,
    pub checksum: i32,
    pub name: FixedString<64>,
    pub data_length: i32,
    pub eye_position: Vector,
    pub illum_position: Vector,
    pub hull_min: Vector,
    pub hull_max: Vector,
    pub view_bb_min: Vector,
    pub view_bb_max: Vector,
    pub flags: i32,
    pub bone_count: i32,
    pub bone_offset: i32,
    pub bone_controller_count: i32,
    pub bone_controller_offset: i32,
    pub hitbox_set_count: i32,
    pub hitbox_set_offset: i32,
    pub local_anim_count: i32,
    pub local_anim_offset: i32,
    pub local_seq_count: i32,
    pub local_seq_offset: i32,
    pub activity_list_version: i32,
    pub events_indexed: i32,
    pub texture_count: i32,
    pub texture_offset: i32,
    pub texture_dir_count: i32,
    pub texture_dir_offset: i32,
    pub skin_reference_count: i32,
    pub skin_family_count: i32,
    pub skin_offset: i32,
    pub body_part_count: i32,
    pub body_part_offset: i32,
}

impl MdlHeader {
    pub const FILE_ID: i32 = i32::from_le_bytes(*b"IDST");
    pub const SUPPORTED_VERSIONS: std::ops::RangeInclusive<i32> = 44..=49;
}

impl Packed for MdlHeader {
    const SIZE: usize = 240;
}

/// Texture record; `name_offset` is relative to the record itself.
#[derive(Debug, Clone, Copy, BinRead)]
pub struct MdlTexture {
    pub name_offset: i32,
    pub flags: i32,
    pub used: i32,
    pub unused: i32,
    pub material: i32,
    pub client_material: i32,
    pub unused2: [i32; 10],
}

impl Packed for MdlTexture {
    const SIZE: usize = 64;
}

/// Bone record; name and surface-prop offsets are relative to the record.
#[derive(Debug, Clone, Copy, BinRead)]
pub struct MdlBone {
    pub name_offset: i32,
    pub parent: i32,
    pub bone_controller: [i32; 6],
    pub position: Vector,
    pub quat: [f32; 4],
    pub rotation: Vector,
    pub position_scale: Vector,
    pub rotation_scale: Vector,
    pub pose_to_bone: [f32; 12],
    pub alignment: [f32; 4],
    pub flags: i32,
    pub procedural_rule_type: i32,
    pub procedural_rule_offset: i32,
    pub physics_bone: i32,
    pub surface_prop_offset: i32,
    pub contents: i32,
    pub unused: [i32; 8],
}

impl Packed for MdlBone {
    const SIZE: usize = 216;
}

// ---- VTX ----

#[derive(Debug, Clone, Copy, BinRead)]
pub struct VtxHeader {
    pub version: i32,
    pub vert_cache_size: i32,
    pub max_bones_per_strip: u16,
    pub max_bones_per_tri: u16,
    pub max_bones_per_vert: i32,
    pub checksum: i32,
    pub num_lods: i32,
    pub material_replacement_list_offset: i32,
    pub num_body_parts: i32,
    pub body_part_offset: i32,
}

impl VtxHeader {
    pub const SUPPORTED_VERSION: i32 = 7;
}

impl Packed for VtxHeader {
    const SIZE: usize = 36;
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct VtxBodyPart {
    pub num_models: i32,
    pub model_offset: i32,
}

impl Packed for VtxBodyPart {
    const SIZE: usize = 8;
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct VtxModel {
    pub num_lods: i32,
    pub lod_offset: i32,
}

impl Packed for VtxModel {
    const SIZE: usize = 8;
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct VtxModelLod {
    pub num_meshes: i32,
    pub mesh_offset: i32,
    pub switch_point: f32,
}

impl Packed for VtxModelLod {
    const SIZE: usize = 12;
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct VtxMesh {
    pub num_strip_groups: i32,
    pub strip_group_header_offset: i32,
    pub flags: MeshFlags,
}

impl Packed for VtxMesh {
    const SIZE: usize = 9;
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct VtxStripGroup {
    pub num_verts: i32,
    pub vert_offset: i32,
    pub num_indices: i32,
    pub index_offset: i32,
    pub num_strips: i32,
    pub strip_offset: i32,
    pub flags: StripGroupFlags,
}

impl Packed for VtxStripGroup {
    const SIZE: usize = 25;
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct VtxStrip {
    pub num_indices: i32,
    pub index_offset: i32,
    pub num_verts: i32,
    pub vert_offset: i32,
    pub num_bones: i16,
    pub flags: StripFlags,
    pub num_bone_state_changes: i32,
    pub bone_state_change_offset: i32,
}

impl Packed for VtxStrip {
    const SIZE: usize = 27;
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct VtxVertex {
    pub bone_weight_index: [u8; 3],
    pub num_bones: u8,
    pub orig_mesh_vert_id: u16,
    pub bone_id: [i8; 3],
}

impl Packed for VtxVertex {
    const SIZE: usize = 9;
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct MaterialReplacementList {
    pub replacement_count: i32,
    pub replacement_offset: i32,
}

impl Packed for MaterialReplacementList {
    const SIZE: usize = 8;
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct MaterialReplacementEntry {
    pub material_id: i16,
    pub name_offset: i32,
}

impl Packed for MaterialReplacementEntry {
    const SIZE: usize = 6;
}

#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshFlags(u8);

bitflags! {
    impl MeshFlags: u8 {
        const IS_TEETH = 0x01;
        const IS_EYES = 0x02;
    }
}

#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripGroupFlags(u8);

bitflags! {
    impl StripGroupFlags: u8 {
        const IS_FLEXED = 0x01;
        const IS_HW_SKINNED = 0x02;
        const IS_DELTA_FLEXED = 0x04;
        const SUPPRESS_HW_MORPH = 0x08;
    }
}

#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripFlags(u8);

bitflags! {
    impl StripFlags: u8 {
        const IS_TRILIST = 0x01;
        const IS_TRISTRIP = 0x02;
    }
}

// ---- VVD ----

#[derive(Debug, Clone, Copy, BinRead)]
pub struct VvdHeader {
    pub id: i32,
    pub version: i32,
    pub checksum: i32,
    pub num_lods: i32,
    pub num_lod_vertices: [i32; 8],
    pub num_fixups: i32,
    pub fixup_table_offset: i32,
    pub vertex_data_offset: i32,
    pub tangent_data_offset: i32,
}

impl VvdHeader {
    pub const FILE_ID: i32 = i32::from_le_bytes(*b"IDSV");
    pub const SUPPORTED_VERSION: i32 = 4;
}

impl Packed for VvdHeader {
    const SIZE: usize = 64;
}

#[derive(Debug, Clone, Copy, PartialEq, BinRead)]
pub struct BoneWeights {
    pub weight: [f32; 3],
    pub bone: [i8; 3],
    pub num_bones: u8,
}

impl Packed for BoneWeights {
    const SIZE: usize = 16;
}

#[derive(Debug, Clone, Copy, PartialEq, BinRead)]
pub struct VvdVertex {
    pub bone_weights: BoneWeights,
    pub position: Vector,
    pub normal: Vector,
    pub tex_coord: Vector2,
}

impl Packed for VvdVertex {
    const SIZE: usize = 48;
}

/// Remaps a range of the source vertex pool into the per-LoD output stream.
#[derive(Debug, Clone, Copy, BinRead)]
pub struct Fixup {
    pub lod: i32,
    pub source_vertex_id: i32,
    pub num_vertices: i32,
}

impl Packed for Fixup {
    const SIZE: usize = 12;
}
