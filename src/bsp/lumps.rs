use crate::view::Packed;
use binrw::BinRead;

pub const HEADER_LUMPS: usize = 64;

/// Lump indices of the v19-v21 BSP format.
#[repr(C)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum LumpType {
    Entities,
    Planes,
    TextureData,
    Vertices,
    Visibility,
    Nodes,
    TextureInfo,
    Faces,
    Lighting,
    Occlusion,
    Leaves,
    FaceIds,
    Edges,
    SurfaceEdges,
    Models,
    WorldLights,
    LeafFaces,
    LeafBrushes,
    Brushes,
    BrushSides,
    Areas,
    AreaPortals,
    Unused0,
    Unused1,
    Unused2,
    Unused3,
    DisplacementInfo,
    OriginalFaces,
    PhysDisplacement,
    PhysCollide,
    VertNormals,
    VertNormalIndices,
    DisplacementLightMapAlphas,
    DisplacementVertices,
    DisplacementLightMapSamplePositions,
    GameLump,
    LeafWaterData,
    Primitives,
    PrimVertices,
    PrimIndices,
    PakFile,
    ClipPortalVertices,
    CubeMaps,
    TextureDataStringData,
    TextureDataStringTable,
    Overlays,
    LeafMinimumDistanceToWater,
    FaceMacroTextureInfo,
    DisplacementTris,
    PhysicsCollideSurface,
    WaterOverlays,
    LeafAmbientIndexHdr,
    LeafAmbientIndex,
    LightingHdr,
    WorldLightsHdr,
    LeafAmbientLightingHdr,
    LeafAmbientLighting,
    XZipPakFile,
    FacesHdr,
    MapFlags,
    OverlayFades,
    OverlaySystemLevels,
    PhysLevel,
    DisplacementMultiBlend,
}

static_assertions::const_assert_eq!(LumpType::DisplacementMultiBlend as usize, 63);

/// One entry of the lump directory. A non-zero `four_cc` marks the lump as
/// LZMA-compressed and holds its uncompressed size.
#[derive(Debug, Clone, Copy, BinRead)]
pub struct LumpEntry {
    pub offset: i32,
    pub length: i32,
    pub version: i32,
    pub four_cc: u32,
}

impl LumpEntry {
    pub fn is_compressed(&self) -> bool {
        self.four_cc != 0
    }
}

impl Packed for LumpEntry {
    const SIZE: usize = 16;
}

#[derive(Debug, Clone, BinRead)]
pub struct BspHeader {
    pub ident: u32,
    pub version: i32,
    pub lumps: [LumpEntry; HEADER_LUMPS],
    pub map_revision: i32,
}

impl BspHeader {
    pub const FILE_IDENT: u32 = u32::from_le_bytes(*b"VBSP");
    pub const SUPPORTED_VERSIONS: std::ops::RangeInclusive<i32> = 19..=21;

    pub fn lump(&self, lump: LumpType) -> &LumpEntry {
        &self.lumps[lump as usize]
    }
}

impl Packed for BspHeader {
    const SIZE: usize = 8 + HEADER_LUMPS * LumpEntry::SIZE + 4;
}

// Engine limits for the lumps this crate consumes.
pub const MAX_MAP_PLANES: usize = 65536;
pub const MAX_MAP_VERTS: usize = 65536;
pub const MAX_MAP_EDGES: usize = 256000;
pub const MAX_MAP_SURFEDGES: usize = 512000;
pub const MAX_MAP_FACES: usize = 65536;
pub const MAX_MAP_TEXINFO: usize = 12288;
pub const MAX_MAP_TEXDATA: usize = 2048;
pub const MAX_MAP_TEXDATA_STRING_TABLE: usize = 65536;
pub const MAX_MAP_MODELS: usize = 1024;
pub const MAX_MAP_DISPINFO: usize = 2048;
pub const MAX_MAP_DISP_POWER: usize = 4;
pub const MAX_MAP_DISP_VERTS: usize =
    MAX_MAP_DISPINFO * ((1 << MAX_MAP_DISP_POWER) + 1) * ((1 << MAX_MAP_DISP_POWER) + 1);
