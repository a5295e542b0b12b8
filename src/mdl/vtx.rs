use super::data::{
    MaterialReplacementEntry, MaterialReplacementList, MeshFlags, StripFlags, StripGroupFlags,
    VtxBodyPart, VtxHeader, VtxMesh, VtxModel, VtxModelLod, VtxStrip, VtxStripGroup, VtxVertex,
};
use crate::view::{check_bounds, OffsetDataView};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy)]
pub struct Strip {
    pub vertices_count: i32,
    pub vertices_offset: i32,
    pub indices_count: i32,
    pub indices_offset: i32,
    pub flags: StripFlags,
}

#[derive(Debug, Clone)]
pub struct StripGroup {
    pub vertices: Vec<VtxVertex>,
    pub indices: Vec<u16>,
    pub strips: Vec<Strip>,
    pub flags: StripGroupFlags,
}

#[derive(Debug, Clone)]
pub struct Mesh {
    pub strip_groups: Vec<StripGroup>,
    pub flags: MeshFlags,
}

#[derive(Debug, Clone)]
pub struct ModelLod {
    pub meshes: Vec<Mesh>,
    pub switch_point: f32,
}

#[derive(Debug, Clone)]
pub struct Model {
    pub level_of_details: Vec<ModelLod>,
}

#[derive(Debug, Clone)]
pub struct BodyPart {
    pub models: Vec<Model>,
}

#[derive(Debug, Clone)]
pub struct MaterialReplacement {
    pub replacement_id: i16,
    pub replacement_name: String,
}

/// Parsed .vtx triangle-strip data.
pub struct Vtx {
    header: VtxHeader,
    body_parts: Vec<BodyPart>,
    material_replacements_by_lod: Vec<Vec<MaterialReplacement>>,
}

impl Vtx {
    pub fn new(data: &[u8], checksum: Option<i32>) -> Result<Self> {
        let view = OffsetDataView::new(data);
        let header: VtxHeader = view.parse_struct(0, "failed to parse VTX header")?;

        if header.version != VtxHeader::SUPPORTED_VERSION {
            return Err(Error::UnsupportedVersion(format!(
                "VTX version {} is unsupported",
                header.version
            )));
        }
        if let Some(expected) = checksum {
            if header.checksum != expected {
                return Err(Error::InvalidChecksum("VTX checksum does not match".into()));
            }
        }

        let mut body_parts = Vec::with_capacity(header.num_body_parts.max(0) as usize);
        for (body_part, offset) in view.parse_array_with_offsets::<VtxBodyPart>(
            header.body_part_offset as i64,
            header.num_body_parts.max(0) as usize,
            "failed to parse VTX body part array",
        )? {
            body_parts.push(parse_body_part(
                &view.with_absolute_offset(offset)?,
                &body_part,
                header.num_lods,
            )?);
        }

        let mut material_replacements_by_lod = Vec::with_capacity(header.num_lods.max(0) as usize);
        for (list, list_offset) in view.parse_array_with_offsets::<MaterialReplacementList>(
            header.material_replacement_list_offset as i64,
            header.num_lods.max(0) as usize,
            "failed to parse VTX material replacement lists",
        )? {
            let mut replacements = Vec::with_capacity(list.replacement_count.max(0) as usize);

            for (replacement, replacement_offset) in view
                .with_absolute_offset(list_offset)?
                .parse_array_with_offsets::<MaterialReplacementEntry>(
                    list.replacement_offset as i64,
                    list.replacement_count.max(0) as usize,
                    "failed to parse VTX material replacements",
                )?
            {
                replacements.push(MaterialReplacement {
                    replacement_id: replacement.material_id,
                    replacement_name: view
                        .with_absolute_offset(replacement_offset)?
                        .parse_string(
                            replacement.name_offset as i64,
                            "failed to parse VTX material replacement name",
                        )?
                        .to_string(),
                });
            }

            material_replacements_by_lod.push(replacements);
        }

        Ok(Vtx {
            header,
            body_parts,
            material_replacements_by_lod,
        })
    }

    pub fn checksum(&self) -> i32 {
        self.header.checksum
    }

    pub fn body_parts(&self) -> &[BodyPart] {
        &self.body_parts
    }

    pub fn material_replacements(&self, lod: i32) -> Result<&[MaterialReplacement]> {
        check_bounds(
            lod as i64,
            1,
            self.material_replacements_by_lod.len(),
            "level of detail is outside range",
        )?;

        Ok(&self.material_replacements_by_lod[lod as usize])
    }
}

fn parse_body_part(
    data: &OffsetDataView,
    body_part: &VtxBodyPart,
    expected_lods: i32,
) -> Result<BodyPart> {
    let mut models = Vec::with_capacity(body_part.num_models.max(0) as usize);

    for (model, offset) in data.parse_array_with_offsets::<VtxModel>(
        body_part.model_offset as i64,
        body_part.num_models.max(0) as usize,
        "failed to parse VTX model array",
    )? {
        if model.num_lods != expected_lods {
            return Err(Error::InvalidBody(
                "VTX model LoD count does not match header".into(),
            ));
        }

        models.push(parse_model(&data.with_absolute_offset(offset)?, &model)?);
    }

    Ok(BodyPart { models })
}

fn parse_model(data: &OffsetDataView, model: &VtxModel) -> Result<Model> {
    let mut level_of_details = Vec::with_capacity(model.num_lods.max(0) as usize);

    for (lod, offset) in data.parse_array_with_offsets::<VtxModelLod>(
        model.lod_offset as i64,
        model.num_lods.max(0) as usize,
        "failed to parse VTX model LoD array",
    )? {
        level_of_details.push(parse_model_lod(&data.with_absolute_offset(offset)?, &lod)?);
    }

    Ok(Model { level_of_details })
}

fn parse_model_lod(data: &OffsetDataView, lod: &VtxModelLod) -> Result<ModelLod> {
    let mut meshes = Vec::with_capacity(lod.num_meshes.max(0) as usize);

    for (mesh, offset) in data.parse_array_with_offsets::<VtxMesh>(
        lod.mesh_offset as i64,
        lod.num_meshes.max(0) as usize,
        "failed to parse VTX mesh array",
    )? {
        meshes.push(parse_mesh(&data.with_absolute_offset(offset)?, &mesh)?);
    }

    Ok(ModelLod {
        meshes,
        switch_point: lod.switch_point,
    })
}

fn parse_mesh(data: &OffsetDataView, mesh: &VtxMesh) -> Result<Mesh> {
    let mut strip_groups = Vec::with_capacity(mesh.num_strip_groups.max(0) as usize);

    for (strip_group, offset) in data.parse_array_with_offsets::<VtxStripGroup>(
        mesh.strip_group_header_offset as i64,
        mesh.num_strip_groups.max(0) as usize,
        "failed to parse VTX strip group array",
    )? {
        strip_groups.push(parse_strip_group(
            &data.with_absolute_offset(offset)?,
            &strip_group,
        )?);
    }

    Ok(Mesh {
        strip_groups,
        flags: mesh.flags,
    })
}

fn parse_strip_group(data: &OffsetDataView, strip_group: &VtxStripGroup) -> Result<StripGroup> {
    let mut strips = Vec::with_capacity(strip_group.num_strips.max(0) as usize);

    for (strip, _) in data.parse_array_with_offsets::<VtxStrip>(
        strip_group.strip_offset as i64,
        strip_group.num_strips.max(0) as usize,
        "failed to parse VTX strip array",
    )? {
        strip_bounds(
            strip.vert_offset,
            strip.num_verts,
            strip_group.num_verts,
            "VTX strip accesses outside strip group vertex data",
        )?;
        strip_bounds(
            strip.index_offset,
            strip.num_indices,
            strip_group.num_indices,
            "VTX strip accesses outside strip group index data",
        )?;

        strips.push(Strip {
            vertices_count: strip.num_verts,
            vertices_offset: strip.vert_offset,
            indices_count: strip.num_indices,
            indices_offset: strip.index_offset,
            flags: strip.flags,
        });
    }

    let vertices = data.parse_array(
        strip_group.vert_offset as i64,
        strip_group.num_verts.max(0) as usize,
        "failed to parse VTX vertex array",
    )?;
    let indices = data.parse_array(
        strip_group.index_offset as i64,
        strip_group.num_indices.max(0) as usize,
        "failed to parse VTX index array",
    )?;

    Ok(StripGroup {
        vertices,
        indices,
        strips,
        flags: strip_group.flags,
    })
}

/// Bounds check in element counts rather than bytes.
fn strip_bounds(offset: i32, count: i32, range: i32, message: &'static str) -> Result<()> {
    if count < 0 || range < 0 {
        return Err(Error::OutOfBoundsAccess(message));
    }

    check_bounds(offset as i64, count as usize, range as usize, message)
}
