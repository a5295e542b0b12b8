pub mod data;
mod displacement;
pub mod game;
mod lumps;

pub use displacement::TriangulatedDisplacement;
pub use lumps::{BspHeader, LumpEntry, LumpType};

use crate::data::Vector;
use crate::lzma::{self, LzmaCallback};
use crate::phy::data::Solid;
use crate::phy::parse_surfaces;
use crate::view::{OffsetDataView, Packed};
use crate::zip::{self, ZipFileEntry};
use crate::{Error, Result};
use binrw::BinRead;
use data::{
    BspModel, DispInfo, DispVert, Edge, Face, PhysModelHeader, Plane, TexData, TexInfo,
};
use game::{GameLump, GameLumpFlags, StaticProp, StaticPropLump};
use lumps::{
    MAX_MAP_DISPINFO, MAX_MAP_DISP_VERTS, MAX_MAP_EDGES, MAX_MAP_FACES, MAX_MAP_MODELS,
    MAX_MAP_PLANES, MAX_MAP_SURFEDGES, MAX_MAP_TEXDATA, MAX_MAP_TEXDATA_STRING_TABLE,
    MAX_MAP_TEXINFO, MAX_MAP_VERTS,
};
use std::borrow::Cow;

/// One model block of the physics lump: its solids plus the raw key/value
/// text that follows them.
#[derive(Debug, Clone)]
pub struct PhysModel {
    pub model_index: i32,
    pub solids: Vec<Solid>,
    pub text_section: String,
}

/// A parsed BSP file.
///
/// Does not take ownership of the passed data; uncompressed lump content is
/// decoded straight out of the caller's buffer, while decompressed lumps are
/// owned by this struct. Typed lump collections are resolved eagerly by
/// [`Bsp::new`], so accessors never fail after construction.
pub struct Bsp<'a> {
    data: &'a [u8],
    pub header: BspHeader,

    pub vertices: Vec<Vector>,
    pub planes: Vec<Plane>,
    pub edges: Vec<Edge>,
    pub surface_edges: Vec<i32>,
    pub faces: Vec<Face>,

    pub texture_infos: Vec<TexInfo>,
    pub texture_datas: Vec<TexData>,
    pub texture_string_table: Vec<i32>,
    texture_string_data: Cow<'a, [u8]>,

    pub models: Vec<BspModel>,

    pub displacement_infos: Vec<DispInfo>,
    pub displacement_vertices: Vec<DispVert>,

    /// Triangulated displacements, index-parallel with `displacement_infos`.
    /// Use [`Bsp::smooth_neighbouring_displacements`] to smooth normals and
    /// tangents between connected displacements, which mutates this
    /// collection.
    pub displacements: Vec<TriangulatedDisplacement>,

    pub game_lumps: Vec<GameLump>,
    pub static_props: Option<StaticPropLump>,

    pub physics_models: Vec<PhysModel>,

    pakfile: Option<Cow<'a, [u8]>>,
    smoothed: bool,
}

impl<'a> Bsp<'a> {
    pub fn new(data: &'a [u8], lzma_callback: Option<LzmaCallback>) -> Result<Self> {
        let view = OffsetDataView::new(data);
        let header: BspHeader = view.parse_struct(0, "failed to parse BSP header")?;

        if header.ident != BspHeader::FILE_IDENT {
            return Err(Error::InvalidHeader(
                "BSP identifier does not match VBSP".into(),
            ));
        }
        if !BspHeader::SUPPORTED_VERSIONS.contains(&header.version) {
            return Err(Error::UnsupportedVersion(format!(
                "BSP version {} is unsupported",
                header.version
            )));
        }
        if header.map_revision < 0 {
            return Err(Error::InvalidHeader(format!(
                "BSP has a negative map revision ({})",
                header.map_revision
            )));
        }
        for (index, entry) in header.lumps.iter().enumerate() {
            if entry.offset < 0 || entry.length < 0 {
                return Err(Error::InvalidBody(format!(
                    "lump {index} header has a negative offset or length"
                )));
            }
            if entry.offset as i64 + entry.length as i64 > data.len() as i64 {
                return Err(Error::InvalidBody(format!(
                    "lump {index} header has offset + length overrunning the file"
                )));
            }
        }

        tracing::debug!(
            version = header.version,
            map_revision = header.map_revision,
            "BSP header accepted"
        );

        let parser = LumpParser {
            data,
            header: &header,
            callback: lzma_callback,
        };

        let vertices = parser.parse_lump::<Vector>(LumpType::Vertices, MAX_MAP_VERTS)?;
        let planes = parser.parse_lump::<Plane>(LumpType::Planes, MAX_MAP_PLANES)?;
        let edges = parser.parse_lump::<Edge>(LumpType::Edges, MAX_MAP_EDGES)?;
        let surface_edges =
            parser.parse_lump::<i32>(LumpType::SurfaceEdges, MAX_MAP_SURFEDGES)?;
        let faces = parser.parse_lump::<Face>(LumpType::Faces, MAX_MAP_FACES)?;

        let texture_infos = parser.parse_lump::<TexInfo>(LumpType::TextureInfo, MAX_MAP_TEXINFO)?;
        let texture_datas = parser.parse_lump::<TexData>(LumpType::TextureData, MAX_MAP_TEXDATA)?;
        let texture_string_table = parser.parse_lump::<i32>(
            LumpType::TextureDataStringTable,
            MAX_MAP_TEXDATA_STRING_TABLE,
        )?;
        let texture_string_data = parser.lump_bytes(LumpType::TextureDataStringData)?;

        let models = parser.parse_lump::<BspModel>(LumpType::Models, MAX_MAP_MODELS)?;

        let displacement_infos =
            parser.parse_lump::<DispInfo>(LumpType::DisplacementInfo, MAX_MAP_DISPINFO)?;
        let displacement_vertices =
            parser.parse_lump::<DispVert>(LumpType::DisplacementVertices, MAX_MAP_DISP_VERTS)?;

        let displacements = triangulate_displacements(
            &displacement_infos,
            &displacement_vertices,
            &faces,
            &surface_edges,
            &edges,
            &vertices,
            &texture_infos,
        )?;

        let game_lumps = parse_game_lump_headers(data, &header)?;
        let static_props = parse_static_props(data, &game_lumps, lzma_callback)?;

        let physics_models = match parser.lump_bytes(LumpType::PhysCollide)? {
            bytes if bytes.is_empty() => Vec::new(),
            bytes => parse_phys_collide_lump(&bytes)?,
        };

        let pakfile = match parser.lump_bytes(LumpType::PakFile)? {
            bytes if bytes.is_empty() => None,
            bytes => {
                // walk the central directory now so a malformed pakfile
                // fails the construction, without touching entry bodies
                zip::read_file_entries(&bytes)?;
                Some(bytes)
            }
        };

        tracing::debug!(
            vertices = vertices.len(),
            faces = faces.len(),
            displacements = displacements.len(),
            physics_models = physics_models.len(),
            "parsed BSP"
        );

        Ok(Bsp {
            data,
            header,
            vertices,
            planes,
            edges,
            surface_edges,
            faces,
            texture_infos,
            texture_datas,
            texture_string_table,
            texture_string_data,
            models,
            displacement_infos,
            displacement_vertices,
            displacements,
            game_lumps,
            static_props,
            physics_models,
            pakfile,
            smoothed: false,
        })
    }

    /// The caller's buffer this BSP was parsed from.
    pub fn raw_data(&self) -> &'a [u8] {
        self.data
    }

    /// Raw bytes of the embedded pakfile ZIP, decompressed if the lump was
    /// compressed.
    pub fn pakfile(&self) -> Option<&[u8]> {
        self.pakfile.as_deref()
    }

    /// Entries of the embedded pakfile. Entry names and data borrow from
    /// this `Bsp`; bodies are never decompressed here.
    pub fn pakfile_entries(&self) -> Result<Vec<ZipFileEntry<'_>>> {
        match &self.pakfile {
            Some(bytes) => zip::read_file_entries(bytes),
            None => Ok(Vec::new()),
        }
    }

    /// Name of the texture behind a texdata index.
    pub fn texture_name(&self, texdata_index: usize) -> Result<&str> {
        let texdata = self
            .texture_datas
            .get(texdata_index)
            .ok_or(Error::OutOfBoundsAccess("texdata index is out of range"))?;
        let string_offset = usize::try_from(texdata.name_string_table_id)
            .ok()
            .and_then(|id| self.texture_string_table.get(id))
            .ok_or(Error::OutOfBoundsAccess(
                "texdata references a missing string table entry",
            ))?;

        OffsetDataView::new(&self.texture_string_data)
            .parse_string(*string_offset as i64, "texture name is unterminated")
    }

    /// Name of the texture applied to a face, resolved through its texinfo.
    pub fn face_texture_name(&self, face: &Face) -> Result<&str> {
        let tex_info = usize::try_from(face.tex_info)
            .ok()
            .and_then(|index| self.texture_infos.get(index))
            .ok_or(Error::OutOfBoundsAccess("face references a missing texinfo"))?;

        self.texture_name(tex_info.tex_data as usize)
    }

    /// The triangulated displacement of a face, if the face is one.
    pub fn displacement_for_face(&self, face: &Face) -> Option<&TriangulatedDisplacement> {
        usize::try_from(face.disp_info)
            .ok()
            .and_then(|index| self.displacements.get(index))
    }

    /// Model path of a static prop, out of the prop dictionary.
    pub fn static_prop_model_path(&self, prop: &StaticProp) -> Option<&str> {
        self.static_props
            .as_ref()?
            .dictionary
            .get(prop.prop_type as usize)
            .map(|name| &**name)
    }

    /// Smooths normals and tangents between neighbouring displacements.
    /// Runs at most once per `Bsp`: the first call performs the smoothing
    /// and returns `true`, every later call is a no-op returning `false`.
    pub fn smooth_neighbouring_displacements(&mut self) -> bool {
        if self.smoothed {
            return false;
        }

        displacement::smooth_neighbouring_displacements(&mut self.displacements);
        self.smoothed = true;
        true
    }
}

struct LumpParser<'a, 'cb> {
    data: &'a [u8],
    header: &'cb BspHeader,
    callback: Option<LzmaCallback<'cb>>,
}

impl<'a> LumpParser<'a, '_> {
    /// Bytes of a lump: borrowed from the file when stored raw, owned when
    /// the lump had to be decompressed.
    fn lump_bytes(&self, lump: LumpType) -> Result<Cow<'a, [u8]>> {
        let entry = self.header.lump(lump);
        let raw =
            &self.data[entry.offset as usize..entry.offset as usize + entry.length as usize];

        if !entry.is_compressed() {
            return Ok(Cow::Borrowed(raw));
        }

        let decompressed = lzma::decompress_lump(lump, raw, self.callback)?;
        if decompressed.len() != entry.four_cc as usize {
            return Err(Error::InvalidBody(format!(
                "{lump:?} lump fourCC ({}) disagrees with its LZMA header ({})",
                entry.four_cc,
                decompressed.len()
            )));
        }

        Ok(Cow::Owned(decompressed))
    }

    fn parse_lump<T>(&self, lump: LumpType, max_items: usize) -> Result<Vec<T>>
    where
        T: Packed + for<'b> BinRead<Args<'b> = ()>,
    {
        let bytes = self.lump_bytes(lump)?;

        if bytes.len() % T::SIZE != 0 {
            return Err(Error::InvalidBody(format!(
                "{lump:?} lump has length ({}) which is not a multiple of the size of its item type ({})",
                bytes.len(),
                T::SIZE
            )));
        }

        let count = bytes.len() / T::SIZE;
        if count > max_items {
            return Err(Error::InvalidBody(format!(
                "number of {lump:?} lump items ({count}) exceeds source engine maximum ({max_items})"
            )));
        }

        OffsetDataView::new(&bytes).parse_array(0, count, "lump items overran the lump")
    }
}

fn parse_game_lump_headers(data: &[u8], header: &BspHeader) -> Result<Vec<GameLump>> {
    let entry = header.lump(LumpType::GameLump);
    if entry.length == 0 {
        return Ok(Vec::new());
    }

    // game-lump offsets are absolute within the file, so the directory is
    // read in place rather than through the compression-aware lump path
    let view = OffsetDataView::new(data);
    let count: i32 = view.parse_struct(
        entry.offset as i64,
        "game lump is shorter than a single int32 for its entry count",
    )?;
    if count < 0 {
        return Err(Error::InvalidBody(
            "game lump has a negative entry count".into(),
        ));
    }

    view.parse_array(
        entry.offset as i64 + 4,
        count as usize,
        "game lump directory overruns the file",
    )
}

fn parse_static_props(
    data: &[u8],
    game_lumps: &[GameLump],
    callback: Option<LzmaCallback>,
) -> Result<Option<StaticPropLump>> {
    let Some(lump) = game_lumps
        .iter()
        .find(|lump| lump.id == GameLump::STATIC_PROPS_ID)
    else {
        return Ok(None);
    };

    if lump.offset < 0 || lump.length < 0 {
        return Err(Error::InvalidBody(format!(
            "static prop game lump header has a negative offset ({}) or length ({})",
            lump.offset, lump.length
        )));
    }

    let payload: Cow<[u8]> = if lump.flags.contains(GameLumpFlags::COMPRESSED) {
        // a compressed game lump stores its uncompressed size in `length`;
        // the on-disk stream extent comes from the LZMA header instead, so
        // hand the shim everything from `offset` onwards
        if lump.offset as i64 >= data.len() as i64 {
            return Err(Error::OutOfBoundsAccess(
                "static prop game lump offset is outside the file",
            ));
        }
        let decompressed = lzma::decompress_lump(
            LumpType::GameLump,
            &data[lump.offset as usize..],
            callback,
        )?;
        if decompressed.len() != lump.length as usize {
            return Err(Error::InvalidBody(format!(
                "decompressed static prop game lump is {} bytes but its header advertises {}",
                decompressed.len(),
                lump.length
            )));
        }
        Cow::Owned(decompressed)
    } else {
        if lump.offset as i64 + lump.length as i64 > data.len() as i64 {
            return Err(Error::OutOfBoundsAccess(
                "static prop game lump overruns the file",
            ));
        }
        Cow::Borrowed(&data[lump.offset as usize..lump.offset as usize + lump.length as usize])
    };

    game::parse_static_prop_lump(&payload, lump.version).map(Some)
}

fn parse_phys_collide_lump(bytes: &[u8]) -> Result<Vec<PhysModel>> {
    let view = OffsetDataView::new(bytes);

    let mut physics_models = Vec::new();
    let mut offset = 0i64;
    loop {
        let model_header: PhysModelHeader =
            view.parse_struct(offset, "failed to parse physics model header")?;
        if model_header.model_index == -1 {
            break;
        }
        if model_header.data_size < 0
            || model_header.keydata_size < 0
            || model_header.solid_count < 0
        {
            return Err(Error::InvalidBody(format!(
                "physics model {} has negative sizes or solid count",
                model_header.model_index
            )));
        }
        if physics_models.len() >= MAX_MAP_MODELS {
            return Err(Error::InvalidBody(format!(
                "number of physics models exceeds source engine maximum ({MAX_MAP_MODELS})"
            )));
        }

        let solids_bytes = view.bytes(
            offset + PhysModelHeader::SIZE as i64,
            model_header.data_size as usize,
            "physics model data overruns the lump",
        )?;
        let (solids, consumed) = parse_surfaces(solids_bytes, model_header.solid_count as usize)?;
        if consumed > model_header.data_size as usize {
            return Err(Error::InvalidBody(format!(
                "physics model {} surfaces overran their declared size",
                model_header.model_index
            )));
        }

        let text = view.bytes(
            offset + PhysModelHeader::SIZE as i64 + model_header.data_size as i64,
            model_header.keydata_size as usize,
            "physics model key data overruns the lump",
        )?;

        physics_models.push(PhysModel {
            model_index: model_header.model_index,
            solids,
            text_section: String::from_utf8_lossy(text).into_owned(),
        });

        offset += PhysModelHeader::SIZE as i64
            + model_header.data_size as i64
            + model_header.keydata_size as i64;
    }

    tracing::trace!(models = physics_models.len(), "parsed physics lump");

    Ok(physics_models)
}

fn triangulate_displacements(
    displacement_infos: &[DispInfo],
    displacement_vertices: &[DispVert],
    faces: &[Face],
    surface_edges: &[i32],
    edges: &[Edge],
    vertices: &[Vector],
    texture_infos: &[TexInfo],
) -> Result<Vec<TriangulatedDisplacement>> {
    let mut displacements = Vec::with_capacity(displacement_infos.len());

    for info in displacement_infos {
        let face = faces.get(info.map_face as usize).ok_or_else(|| {
            Error::InvalidBody(format!(
                "displacement references face {} of {}",
                info.map_face,
                faces.len()
            ))
        })?;
        if face.num_edges != 4 {
            return Err(Error::InvalidBody(format!(
                "displacement face with {} edges",
                face.num_edges
            )));
        }

        let mut corners = [Vector::default(); 4];
        for (i, corner) in corners.iter_mut().enumerate() {
            let surface_edge = usize::try_from(face.first_edge)
                .ok()
                .and_then(|first| surface_edges.get(first + i))
                .ok_or(Error::OutOfBoundsAccess(
                    "displacement face references missing surface edges",
                ))?;
            let edge = edges
                .get(surface_edge.unsigned_abs() as usize)
                .ok_or(Error::OutOfBoundsAccess(
                    "surface edge references a missing edge",
                ))?;
            let vertex_index = if *surface_edge >= 0 {
                edge.vertices[0]
            } else {
                edge.vertices[1]
            };
            *corner = *vertices
                .get(vertex_index as usize)
                .ok_or(Error::OutOfBoundsAccess("edge references a missing vertex"))?;
        }

        let texture_vecs = usize::try_from(face.tex_info)
            .ok()
            .and_then(|index| texture_infos.get(index))
            .map(|tex_info| tex_info.texture_vecs)
            .ok_or(Error::OutOfBoundsAccess(
                "displacement face references a missing texinfo",
            ))?;

        let side = info.side();
        let vertex_range = usize::try_from(info.disp_vert_start)
            .ok()
            .and_then(|start| displacement_vertices.get(start..start + side * side))
            .ok_or(Error::OutOfBoundsAccess(
                "displacement vertices overrun the displacement vertex lump",
            ))?;

        displacements.push(TriangulatedDisplacement::new(
            info,
            corners,
            texture_vecs,
            vertex_range,
        )?);
    }

    Ok(displacements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lzma::LzmaMetadata;
    use std::cell::Cell;

    struct BspBuilder {
        version: i32,
        lumps: Vec<(LumpType, Vec<u8>, u32)>,
    }

    impl BspBuilder {
        fn new() -> Self {
            BspBuilder {
                version: 20,
                lumps: Vec::new(),
            }
        }

        fn lump(mut self, lump: LumpType, bytes: Vec<u8>) -> Self {
            self.lumps.push((lump, bytes, 0));
            self
        }

        fn compressed_lump(mut self, lump: LumpType, bytes: Vec<u8>, four_cc: u32) -> Self {
            self.lumps.push((lump, bytes, four_cc));
            self
        }

        /// File offset the next added lump will land on.
        fn next_lump_offset(&self) -> usize {
            BspHeader::SIZE + self.lumps.iter().map(|(_, bytes, _)| bytes.len()).sum::<usize>()
        }

        fn build(self) -> Vec<u8> {
            let mut entries = [(0i32, 0i32, 0u32); lumps::HEADER_LUMPS];
            let mut body = Vec::new();

            for (lump, bytes, four_cc) in &self.lumps {
                entries[*lump as usize] = (
                    (BspHeader::SIZE + body.len()) as i32,
                    bytes.len() as i32,
                    *four_cc,
                );
                body.extend_from_slice(bytes);
            }

            let mut file = Vec::with_capacity(BspHeader::SIZE + body.len());
            file.extend_from_slice(&BspHeader::FILE_IDENT.to_le_bytes());
            file.extend_from_slice(&self.version.to_le_bytes());
            for (offset, length, four_cc) in entries {
                file.extend_from_slice(&offset.to_le_bytes());
                file.extend_from_slice(&length.to_le_bytes());
                file.extend_from_slice(&0i32.to_le_bytes());
                file.extend_from_slice(&four_cc.to_le_bytes());
            }
            file.extend_from_slice(&1i32.to_le_bytes()); // map revision
            file.extend_from_slice(&body);
            file
        }
    }

    fn lzma_block(uncompressed_size: u32, stream: &[u8]) -> Vec<u8> {
        let mut block = Vec::new();
        block.extend_from_slice(b"LZMA");
        block.extend_from_slice(&uncompressed_size.to_le_bytes());
        block.extend_from_slice(&(stream.len() as u32).to_le_bytes());
        block.extend_from_slice(&[93, 0, 0, 1, 0]);
        block.extend_from_slice(stream);
        block
    }

    fn plane_bytes(normal: [f32; 3], dist: f32, plane_type: i32) -> Vec<u8> {
        let mut bytes = Vec::new();
        for c in normal {
            bytes.extend_from_slice(&c.to_le_bytes());
        }
        bytes.extend_from_slice(&dist.to_le_bytes());
        bytes.extend_from_slice(&plane_type.to_le_bytes());
        bytes
    }

    #[test]
    fn parses_an_empty_bsp() {
        let file = BspBuilder::new().build();
        let bsp = Bsp::new(&file, None).unwrap();

        assert_eq!(20, bsp.header.version);
        assert_eq!(1, bsp.header.map_revision);
        assert!(bsp.vertices.is_empty());
        assert!(bsp.planes.is_empty());
        assert!(bsp.displacements.is_empty());
        assert!(bsp.physics_models.is_empty());
        assert!(bsp.static_props.is_none());
        assert!(bsp.pakfile().is_none());
        assert!(bsp.pakfile_entries().unwrap().is_empty());
    }

    #[test]
    fn parses_a_single_plane() {
        let file = BspBuilder::new()
            .lump(LumpType::Planes, plane_bytes([1.0, 0.0, 0.0], 5.0, 0))
            .build();

        let bsp = Bsp::new(&file, None).unwrap();

        assert_eq!(1, bsp.planes.len());
        assert_eq!(5.0, bsp.planes[0].dist);
        assert_eq!(1.0, bsp.planes[0].normal.x);
        assert_eq!(0, bsp.planes[0].plane_type);
    }

    #[test]
    fn header_validation() {
        let mut bad_ident = BspBuilder::new().build();
        bad_ident[0] = b'X';
        assert!(matches!(
            Bsp::new(&bad_ident, None),
            Err(Error::InvalidHeader(_))
        ));

        let mut builder = BspBuilder::new();
        builder.version = 22;
        assert!(matches!(
            Bsp::new(&builder.build(), None),
            Err(Error::UnsupportedVersion(_))
        ));

        // lump overrunning the file
        let mut overrun = BspBuilder::new().build();
        let planes_entry = 8 + LumpType::Planes as usize * 16;
        overrun[planes_entry..planes_entry + 4].copy_from_slice(&1036i32.to_le_bytes());
        overrun[planes_entry + 4..planes_entry + 8].copy_from_slice(&100i32.to_le_bytes());
        assert!(matches!(
            Bsp::new(&overrun, None),
            Err(Error::InvalidBody(_))
        ));
    }

    #[test]
    fn rejects_misaligned_and_oversized_lumps() {
        let misaligned = BspBuilder::new()
            .lump(LumpType::Planes, vec![0; 21])
            .build();
        assert!(matches!(
            Bsp::new(&misaligned, None),
            Err(Error::InvalidBody(_))
        ));

        let oversized = BspBuilder::new()
            .lump(LumpType::Models, vec![0; 48 * (MAX_MAP_MODELS + 1)])
            .build();
        assert!(matches!(
            Bsp::new(&oversized, None),
            Err(Error::InvalidBody(_))
        ));
    }

    #[test]
    fn decompresses_a_vertex_lump_once() {
        let mut decompressed = Vec::new();
        for c in [1.0f32, 2.0, 3.0] {
            decompressed.extend_from_slice(&c.to_le_bytes());
        }

        let file = BspBuilder::new()
            .compressed_lump(LumpType::Vertices, lzma_block(12, b"xyz"), 12)
            .build();

        let calls = Cell::new(0u32);
        let callback = |compressed: &[u8], metadata: &LzmaMetadata| {
            calls.set(calls.get() + 1);
            assert_eq!(b"xyz", compressed);
            assert_eq!(12, metadata.uncompressed_size);
            Ok(decompressed.clone())
        };

        let bsp = Bsp::new(&file, Some(&callback)).unwrap();

        assert_eq!(1, bsp.vertices.len());
        assert_eq!(Vector { x: 1.0, y: 2.0, z: 3.0 }, bsp.vertices[0]);
        // two reads of the parsed lump do not trigger further decompression
        assert_eq!(1.0, bsp.vertices[0].x);
        assert_eq!(1, calls.get());
    }

    #[test]
    fn compressed_lump_without_callback_names_the_lump() {
        let vertices = BspBuilder::new()
            .compressed_lump(LumpType::Vertices, lzma_block(12, b"xyz"), 12)
            .build();
        assert!(matches!(
            Bsp::new(&vertices, None),
            Err(Error::MissingDecompressCallback(LumpType::Vertices))
        ));

        let pakfile = BspBuilder::new()
            .compressed_lump(LumpType::PakFile, lzma_block(64, b"zipzip"), 64)
            .build();
        assert!(matches!(
            Bsp::new(&pakfile, None),
            Err(Error::MissingDecompressCallback(LumpType::PakFile))
        ));
    }

    #[test]
    fn four_cc_must_match_the_lzma_header() {
        let file = BspBuilder::new()
            .compressed_lump(LumpType::Vertices, lzma_block(12, b"xyz"), 24)
            .build();

        let callback = |_: &[u8], _: &LzmaMetadata| Ok(vec![0u8; 12]);
        assert!(matches!(
            Bsp::new(&file, Some(&callback)),
            Err(Error::InvalidBody(_))
        ));
    }

    #[test]
    fn resolves_texture_names() {
        let mut texdata = Vec::new();
        texdata.extend_from_slice(&[0; 12]); // reflectivity
        texdata.extend_from_slice(&0i32.to_le_bytes()); // string table id
        texdata.extend_from_slice(&[0; 16]); // dimensions

        let file = BspBuilder::new()
            .lump(LumpType::TextureData, texdata)
            .lump(LumpType::TextureDataStringTable, 0i32.to_le_bytes().to_vec())
            .lump(
                LumpType::TextureDataStringData,
                b"BRICK/BRICKFLOOR001A\0".to_vec(),
            )
            .build();

        let bsp = Bsp::new(&file, None).unwrap();

        assert_eq!("BRICK/BRICKFLOOR001A", bsp.texture_name(0).unwrap());
        assert!(matches!(
            bsp.texture_name(1),
            Err(Error::OutOfBoundsAccess(_))
        ));
    }

    fn game_lump_directory(id: i32, flags: u16, version: u16, offset: i32, length: i32) -> Vec<u8> {
        let mut directory = Vec::new();
        directory.extend_from_slice(&1i32.to_le_bytes());
        directory.extend_from_slice(&id.to_le_bytes());
        directory.extend_from_slice(&flags.to_le_bytes());
        directory.extend_from_slice(&version.to_le_bytes());
        directory.extend_from_slice(&offset.to_le_bytes());
        directory.extend_from_slice(&length.to_le_bytes());
        directory
    }

    #[test]
    fn parses_static_props_out_of_the_game_lump() {
        let payload = game::tests::sprp_payload(6);

        let builder = BspBuilder::new();
        let lump_offset = builder.next_lump_offset();
        let mut content = game_lump_directory(
            GameLump::STATIC_PROPS_ID,
            0,
            6,
            (lump_offset + 20) as i32,
            payload.len() as i32,
        );
        content.extend_from_slice(&payload);

        let file = builder.lump(LumpType::GameLump, content).build();
        let bsp = Bsp::new(&file, None).unwrap();

        assert_eq!(1, bsp.game_lumps.len());
        let props = bsp.static_props.as_ref().unwrap();
        assert_eq!(6, props.props.version());
        assert_eq!(vec![42u16], props.leaves);

        let prop = props.props.get(0).unwrap();
        assert_eq!(
            Some("models/props/barrel.mdl"),
            bsp.static_prop_model_path(&prop)
        );
    }

    #[test]
    fn honours_the_game_lump_compressed_flag() {
        let payload = game::tests::sprp_payload(6);

        let builder = BspBuilder::new();
        let lump_offset = builder.next_lump_offset();
        let block = lzma_block(payload.len() as u32, b"packed");
        let mut content = game_lump_directory(
            GameLump::STATIC_PROPS_ID,
            0x0001,
            6,
            (lump_offset + 20) as i32,
            payload.len() as i32,
        );
        content.extend_from_slice(&block);

        let file = builder.lump(LumpType::GameLump, content).build();

        let calls = Cell::new(0u32);
        let callback = |compressed: &[u8], _: &LzmaMetadata| {
            calls.set(calls.get() + 1);
            assert_eq!(b"packed", compressed);
            Ok(payload.clone())
        };

        let bsp = Bsp::new(&file, Some(&callback)).unwrap();

        assert_eq!(1, calls.get());
        assert_eq!(1, bsp.static_props.as_ref().unwrap().props.len());

        assert!(matches!(
            Bsp::new(&file, None),
            Err(Error::MissingDecompressCallback(LumpType::GameLump))
        ));
    }

    #[test]
    fn parses_the_physics_lump() {
        let surface = crate::phy::surface::tests::single_ledge_surface(
            crate::data::Vector4 { x: 4.0, y: 5.0, z: 6.0, w: 0.0 },
            2,
            &[[7, 7, 3]],
            &(0..8)
                .map(|i| crate::data::Vector4 {
                    x: i as f32,
                    y: 0.0,
                    z: 0.0,
                    w: 0.0,
                })
                .collect::<Vec<_>>(),
        );

        let text = b"solid { }\0";
        let mut content = Vec::new();
        content.extend_from_slice(&0i32.to_le_bytes()); // model index
        content.extend_from_slice(&(surface.len() as i32).to_le_bytes());
        content.extend_from_slice(&(text.len() as i32).to_le_bytes());
        content.extend_from_slice(&1i32.to_le_bytes()); // solid count
        content.extend_from_slice(&surface);
        content.extend_from_slice(text);
        content.extend_from_slice(&(-1i32).to_le_bytes()); // terminator
        content.extend_from_slice(&[0; 12]);

        let file = BspBuilder::new().lump(LumpType::PhysCollide, content).build();
        let bsp = Bsp::new(&file, None).unwrap();

        assert_eq!(1, bsp.physics_models.len());
        let model = &bsp.physics_models[0];
        assert_eq!(0, model.model_index);
        assert_eq!(1, model.solids.len());
        assert_eq!(vec![0, 0, 1], model.solids[0].indices);
        assert_eq!(2, model.solids[0].bone_index);
        assert!(model.text_section.starts_with("solid { }"));
    }

    #[test]
    fn exposes_pakfile_entries_without_decompressing_bodies() {
        // minimal stored zip: local header, one file, central directory, eocd
        let name = b"materials/metal.vmt";
        let body = b"\"LightmappedGeneric\"{}";
        let mut archive = Vec::new();
        archive.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
        archive.extend_from_slice(&[0; 10]);
        archive.extend_from_slice(&0u32.to_le_bytes());
        archive.extend_from_slice(&(body.len() as u32).to_le_bytes());
        archive.extend_from_slice(&(body.len() as u32).to_le_bytes());
        archive.extend_from_slice(&(name.len() as u16).to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes());
        archive.extend_from_slice(name);
        archive.extend_from_slice(body);
        let central_offset = archive.len() as u32;
        archive.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
        archive.extend_from_slice(&[0; 6]);
        archive.extend_from_slice(&0u16.to_le_bytes()); // stored
        archive.extend_from_slice(&[0; 4]);
        archive.extend_from_slice(&0u32.to_le_bytes());
        archive.extend_from_slice(&(body.len() as u32).to_le_bytes());
        archive.extend_from_slice(&(body.len() as u32).to_le_bytes());
        archive.extend_from_slice(&(name.len() as u16).to_le_bytes());
        archive.extend_from_slice(&[0; 12]);
        archive.extend_from_slice(&0u32.to_le_bytes()); // local offset
        archive.extend_from_slice(name);
        let central_size = archive.len() as u32 - central_offset;
        archive.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
        archive.extend_from_slice(&[0; 4]);
        archive.extend_from_slice(&1u16.to_le_bytes());
        archive.extend_from_slice(&1u16.to_le_bytes());
        archive.extend_from_slice(&central_size.to_le_bytes());
        archive.extend_from_slice(&central_offset.to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes());

        let file = BspBuilder::new().lump(LumpType::PakFile, archive).build();
        let bsp = Bsp::new(&file, None).unwrap();

        let entries = bsp.pakfile_entries().unwrap();
        assert_eq!(1, entries.len());
        assert_eq!("materials/metal.vmt", entries[0].file_name);
        assert_eq!(body.as_slice(), entries[0].data);
        assert!(entries[0].lzma_metadata.is_none());
    }

    fn displacement_bsp() -> Vec<u8> {
        // a single square face over four vertices, carrying a power-2
        // displacement
        let corners = [
            [0.0f32, 0.0, 0.0],
            [64.0, 0.0, 0.0],
            [64.0, 64.0, 0.0],
            [0.0, 64.0, 0.0],
        ];
        let mut vertices = Vec::new();
        for corner in corners {
            for c in corner {
                vertices.extend_from_slice(&c.to_le_bytes());
            }
        }

        // edge 0 is unused padding, edges 1..=4 wind around the face
        let mut edges = Vec::new();
        for pair in [[0u16, 0], [0, 1], [1, 2], [2, 3], [3, 0]] {
            edges.extend_from_slice(&pair[0].to_le_bytes());
            edges.extend_from_slice(&pair[1].to_le_bytes());
        }

        let mut surface_edges = Vec::new();
        for se in [1i32, 2, 3, 4] {
            surface_edges.extend_from_slice(&se.to_le_bytes());
        }

        let mut face = Vec::new();
        face.extend_from_slice(&0u16.to_le_bytes()); // plane
        face.push(0);
        face.push(1);
        face.extend_from_slice(&0i32.to_le_bytes()); // first edge
        face.extend_from_slice(&4i16.to_le_bytes()); // num edges
        face.extend_from_slice(&0i16.to_le_bytes()); // texinfo
        face.extend_from_slice(&0i16.to_le_bytes()); // dispinfo
        face.extend_from_slice(&(-1i16).to_le_bytes());
        face.extend_from_slice(&[0; 4]); // styles
        face.extend_from_slice(&(-1i32).to_le_bytes()); // light offset
        face.extend_from_slice(&4096.0f32.to_le_bytes());
        face.extend_from_slice(&[0; 16]); // lightmap mins/size
        face.extend_from_slice(&0i32.to_le_bytes()); // original face
        face.extend_from_slice(&[0; 8]); // primitives, smoothing groups

        let mut texinfo = Vec::new();
        for row in [[1.0f32, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0]] {
            for c in row {
                texinfo.extend_from_slice(&c.to_le_bytes());
            }
        }
        texinfo.extend_from_slice(&[0; 32]); // lightmap vecs
        texinfo.extend_from_slice(&0u32.to_le_bytes()); // flags
        texinfo.extend_from_slice(&0i32.to_le_bytes()); // texdata

        let mut dispinfo = Vec::new();
        dispinfo.extend_from_slice(&[0; 12]); // start position: first corner
        dispinfo.extend_from_slice(&0i32.to_le_bytes()); // vert start
        dispinfo.extend_from_slice(&0i32.to_le_bytes()); // tri start
        dispinfo.extend_from_slice(&2i32.to_le_bytes()); // power
        dispinfo.extend_from_slice(&0i32.to_le_bytes());
        dispinfo.extend_from_slice(&0f32.to_le_bytes());
        dispinfo.extend_from_slice(&0i32.to_le_bytes());
        dispinfo.extend_from_slice(&0u16.to_le_bytes()); // map face
        dispinfo.extend_from_slice(&[0; 2]); // pad
        dispinfo.extend_from_slice(&[0; 8]);
        for _ in 0..8 {
            // edge sub-neighbors, all empty
            dispinfo.extend_from_slice(&0xffffu16.to_le_bytes());
            dispinfo.extend_from_slice(&[0; 4]);
        }
        dispinfo.extend_from_slice(&[0; 40]); // corner neighbors
        dispinfo.extend_from_slice(&[0; 40]); // allowed verts
        assert_eq!(176, dispinfo.len());

        let mut dispverts = Vec::new();
        for i in 0..25 {
            for c in [0.0f32, 0.0, 1.0] {
                dispverts.extend_from_slice(&c.to_le_bytes());
            }
            dispverts.extend_from_slice(&(i as f32).to_le_bytes()); // dist
            dispverts.extend_from_slice(&255.0f32.to_le_bytes()); // alpha
        }

        BspBuilder::new()
            .lump(LumpType::Vertices, vertices)
            .lump(LumpType::Edges, edges)
            .lump(LumpType::SurfaceEdges, surface_edges)
            .lump(LumpType::Faces, face)
            .lump(LumpType::TextureInfo, texinfo)
            .lump(LumpType::DisplacementInfo, dispinfo)
            .lump(LumpType::DisplacementVertices, dispverts)
            .build()
    }

    #[test]
    fn triangulates_displacements_eagerly() {
        let file = displacement_bsp();
        let bsp = Bsp::new(&file, None).unwrap();

        assert_eq!(1, bsp.displacement_infos.len());
        assert_eq!(25, bsp.displacement_vertices.len());
        assert_eq!(1, bsp.displacements.len());

        let displacement = &bsp.displacements[0];
        assert_eq!(25, displacement.positions.len());
        assert_eq!(32, displacement.triangle_count());
        // grid origin sits on the start-position corner, offsets applied
        assert_eq!(Vector::default(), bsp.vertices[0]);
        assert_eq!(0.0, displacement.positions[0].z);
        assert_eq!(7.0, displacement.positions[7].z);
        assert_eq!(255.0, displacement.alphas[0]);

        let face = bsp.faces[0];
        assert!(std::ptr::eq(
            displacement,
            bsp.displacement_for_face(&face).unwrap()
        ));
    }

    #[test]
    fn smoothing_runs_exactly_once() {
        let file = displacement_bsp();
        let mut bsp = Bsp::new(&file, None).unwrap();

        assert!(bsp.smooth_neighbouring_displacements());
        assert!(!bsp.smooth_neighbouring_displacements());
        assert!(!bsp.smooth_neighbouring_displacements());
    }
}
