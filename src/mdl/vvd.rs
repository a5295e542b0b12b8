use super::data::{Fixup, VvdHeader, VvdVertex};
use crate::data::Vector4;
use crate::view::{OffsetDataView, Packed};
use crate::{Error, Result};

const ROOT_LOD: i32 = 0;

/// Parsed .vvd vertex data. Fixups are applied during construction, so
/// `vertices`/`tangents` are the finished root-LoD streams.
pub struct Vvd {
    header: VvdHeader,
    vertices: Vec<VvdVertex>,
    tangents: Vec<Vector4>,
}

impl Vvd {
    pub fn new(data: &[u8], checksum: Option<i32>) -> Result<Self> {
        let view = OffsetDataView::new(data);
        let header: VvdHeader = view.parse_struct(0, "failed to parse VVD header")?;

        if header.id != VvdHeader::FILE_ID {
            return Err(Error::InvalidHeader("VVD header ID does not match IDSV".into()));
        }
        if header.version != VvdHeader::SUPPORTED_VERSION {
            return Err(Error::UnsupportedVersion(format!(
                "VVD version {} is unsupported",
                header.version
            )));
        }
        if let Some(expected) = checksum {
            if header.checksum != expected {
                return Err(Error::InvalidChecksum("VVD checksum does not match".into()));
            }
        }
        if header.num_fixups < 0 || header.num_lod_vertices[ROOT_LOD as usize] < 0 {
            return Err(Error::InvalidBody(
                "VVD header has negative fixup or vertex counts".into(),
            ));
        }

        let num_vertices = header.num_lod_vertices[ROOT_LOD as usize] as usize;
        let size_of_fixups = Fixup::SIZE * header.num_fixups as usize;
        let size_of_vertices = (Vector4::SIZE + VvdVertex::SIZE) * num_vertices;
        if VvdHeader::SIZE + size_of_fixups + size_of_vertices > data.len() {
            return Err(Error::InvalidBody(
                "size of VVD with given number of vertices exceeds data size".into(),
            ));
        }

        let (vertices, tangents) = if header.num_fixups == 0 {
            (
                view.parse_array(
                    header.vertex_data_offset as i64,
                    num_vertices,
                    "failed to parse VVD vertices",
                )?,
                view.parse_array(
                    header.tangent_data_offset as i64,
                    num_vertices,
                    "failed to parse VVD tangents",
                )?,
            )
        } else {
            let fixups: Vec<Fixup> = view.parse_array(
                header.fixup_table_offset as i64,
                header.num_fixups as usize,
                "failed to parse VVD fixups",
            )?;
            let original_vertices: Vec<VvdVertex> = view.parse_array(
                header.vertex_data_offset as i64,
                num_vertices,
                "failed to parse VVD vertices",
            )?;
            let original_tangents: Vec<Vector4> = view.parse_array(
                header.tangent_data_offset as i64,
                num_vertices,
                "failed to parse VVD tangents",
            )?;

            let mut vertices = Vec::with_capacity(num_vertices);
            let mut tangents = Vec::with_capacity(num_vertices);

            for fixup in &fixups {
                if fixup.lod < ROOT_LOD || fixup.num_vertices <= 0 || fixup.source_vertex_id < 0 {
                    continue;
                }

                let source = fixup.source_vertex_id as usize;
                let count = fixup.num_vertices as usize;
                if source + count > num_vertices {
                    return Err(Error::OutOfBoundsAccess(
                        "VVD fixup accesses outside vertex data",
                    ));
                }

                vertices.extend_from_slice(&original_vertices[source..source + count]);
                tangents.extend_from_slice(&original_tangents[source..source + count]);
            }

            (vertices, tangents)
        };

        Ok(Vvd {
            header,
            vertices,
            tangents,
        })
    }

    pub fn checksum(&self) -> i32 {
        self.header.checksum
    }

    pub fn vertices(&self) -> &[VvdVertex] {
        &self.vertices
    }

    pub fn tangents(&self) -> &[Vector4] {
        &self.tangents
    }

    pub fn levels_of_detail(&self) -> i32 {
        self.header.num_lods
    }
}
