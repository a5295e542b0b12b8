pub mod data;
mod vtx;
mod vvd;

pub use vtx::{BodyPart, MaterialReplacement, Mesh, Model, ModelLod, Strip, StripGroup, Vtx};
pub use vvd::Vvd;

use crate::data::Vector;
use crate::view::OffsetDataView;
use crate::{Error, Result};
use cgmath::Quaternion;
use data::{MdlBone, MdlHeader, MdlTexture};

#[derive(Debug, Clone)]
pub struct Texture {
    pub name: String,
    pub flags: i32,
}

#[derive(Debug, Clone)]
pub struct Bone {
    pub name: String,
    pub parent: i32,
    pub position: Vector,
    pub orientation: Quaternion<f32>,
    pub physics_bone: i32,
    pub surface_prop: Option<String>,
    pub flags: i32,
}

/// Parsed .mdl metadata: header plus material and bone tables. Geometry
/// lives in the companion .vvd/.vtx files.
pub struct Mdl {
    header: MdlHeader,
    textures: Vec<Texture>,
    texture_directories: Vec<String>,
    bones: Vec<Bone>,
}

impl Mdl {
    pub fn new(data: &[u8], checksum: Option<i32>) -> Result<Self> {
        let view = OffsetDataView::new(data);
        let header: MdlHeader = view.parse_struct(0, "failed to parse MDL header")?;

        if header.id != MdlHeader::FILE_ID {
            return Err(Error::InvalidHeader("MDL header ID does not match IDST".into()));
        }
        if !MdlHeader::SUPPORTED_VERSIONS.contains(&header.version) {
            return Err(Error::UnsupportedVersion(format!(
                "MDL version {} is unsupported",
                header.version
            )));
        }
        if let Some(expected) = checksum {
            if header.checksum != expected {
                return Err(Error::InvalidChecksum("MDL checksum does not match".into()));
            }
        }

        let mut textures = Vec::with_capacity(header.texture_count.max(0) as usize);
        for (texture, offset) in view.parse_array_with_offsets::<MdlTexture>(
            header.texture_offset as i64,
            header.texture_count.max(0) as usize,
            "failed to parse MDL texture array",
        )? {
            textures.push(Texture {
                name: view
                    .with_absolute_offset(offset)?
                    .parse_string(texture.name_offset as i64, "failed to parse MDL texture name")?
                    .to_string(),
                flags: texture.flags,
            });
        }

        // cdtexture entries are absolute offsets into the file
        let mut texture_directories =
            Vec::with_capacity(header.texture_dir_count.max(0) as usize);
        for directory_offset in view.parse_array::<i32>(
            header.texture_dir_offset as i64,
            header.texture_dir_count.max(0) as usize,
            "failed to parse MDL texture directory table",
        )? {
            texture_directories.push(
                view.parse_string(
                    directory_offset as i64,
                    "failed to parse MDL texture directory",
                )?
                .to_string(),
            );
        }

        let mut bones = Vec::with_capacity(header.bone_count.max(0) as usize);
        for (bone, offset) in view.parse_array_with_offsets::<MdlBone>(
            header.bone_offset as i64,
            header.bone_count.max(0) as usize,
            "failed to parse MDL bone array",
        )? {
            let bone_view = view.with_absolute_offset(offset)?;
            let surface_prop = if bone.surface_prop_offset == 0 {
                None
            } else {
                Some(
                    bone_view
                        .parse_string(
                            bone.surface_prop_offset as i64,
                            "failed to parse MDL bone surface prop",
                        )?
                        .to_string(),
                )
            };

            bones.push(Bone {
                name: bone_view
                    .parse_string(bone.name_offset as i64, "failed to parse MDL bone name")?
                    .to_string(),
                parent: bone.parent,
                position: bone.position,
                orientation: Quaternion::new(bone.quat[3], bone.quat[0], bone.quat[1], bone.quat[2]),
                physics_bone: bone.physics_bone,
                surface_prop,
                flags: bone.flags,
            });
        }

        tracing::debug!(
            name = %header.name,
            textures = textures.len(),
            bones = bones.len(),
            "parsed MDL"
        );

        Ok(Mdl {
            header,
            textures,
            texture_directories,
            bones,
        })
    }

    pub fn checksum(&self) -> i32 {
        self.header.checksum
    }

    pub fn version(&self) -> i32 {
        self.header.version
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }

    pub fn texture_directories(&self) -> &[String] {
        &self.texture_directories
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }
}
