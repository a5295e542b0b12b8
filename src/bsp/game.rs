use crate::data::{FixedString, Vector};
use crate::view::{OffsetDataView, Packed};
use crate::{Error, Result};
use binrw::BinRead;
use bitflags::bitflags;
use cgmath::{Deg, Quaternion, Rotation3};

/// Directory entry of the game-lump container (lump 35). `offset` is
/// absolute from the start of the BSP file.
#[derive(Debug, Clone, Copy, BinRead)]
pub struct GameLump {
    pub id: i32,
    pub flags: GameLumpFlags,
    pub version: u16,
    pub offset: i32,
    pub length: i32,
}

impl GameLump {
    pub const STATIC_PROPS_ID: i32 = i32::from_be_bytes(*b"sprp");
}

impl Packed for GameLump {
    const SIZE: usize = 16;
}

#[derive(BinRead, Debug, Clone, Copy)]
pub struct GameLumpFlags(u16);

bitflags! {
    impl GameLumpFlags: u16 {
        const COMPRESSED = 0b0000_0000_0000_0001;
    }
}

#[repr(u8)]
#[derive(BinRead, Debug, Copy, Clone, PartialEq, Eq, Default)]
#[br(repr = u8)]
pub enum SolidType {
    #[default]
    None = 0,
    Bsp,
    Bbox,
    Obb,
    ObbYaw,
    Custom,
    Physics,
    Last,
}

#[derive(BinRead, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticPropFlags(u8);

bitflags! {
    impl StaticPropFlags: u8 {
        const FLAG_FADES = 0x1;
        const USE_LIGHTING_ORIGIN = 0x2;
        const NO_DRAW = 0x4;
        const IGNORE_NORMALS = 0x8;
        const NO_SHADOW = 0x10;
        const SCREEN_SPACE_FADE = 0x20;
        const NO_PER_VERTEX_LIGHTING = 0x40;
        const NO_SELF_SHADOWING = 0x80;
    }
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct StaticPropV4 {
    pub origin: Vector,
    pub angles: [f32; 3],
    pub prop_type: u16,
    pub first_leaf: u16,
    pub leaf_count: u16,
    pub solid: SolidType,
    pub flags: StaticPropFlags,
    pub skin: i32,
    pub fade_min_distance: f32,
    pub fade_max_distance: f32,
    pub lighting_origin: Vector,
}

impl Packed for StaticPropV4 {
    const SIZE: usize = 56;
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct StaticPropV5 {
    pub origin: Vector,
    pub angles: [f32; 3],
    pub prop_type: u16,
    pub first_leaf: u16,
    pub leaf_count: u16,
    pub solid: SolidType,
    pub flags: StaticPropFlags,
    pub skin: i32,
    pub fade_min_distance: f32,
    pub fade_max_distance: f32,
    pub lighting_origin: Vector,
    pub forced_fade_scale: f32,
}

impl Packed for StaticPropV5 {
    const SIZE: usize = 60;
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct StaticPropV6 {
    pub origin: Vector,
    pub angles: [f32; 3],
    pub prop_type: u16,
    pub first_leaf: u16,
    pub leaf_count: u16,
    pub solid: SolidType,
    pub flags: StaticPropFlags,
    pub skin: i32,
    pub fade_min_distance: f32,
    pub fade_max_distance: f32,
    pub lighting_origin: Vector,
    pub forced_fade_scale: f32,
    pub min_dx_level: u16,
    pub max_dx_level: u16,
}

impl Packed for StaticPropV6 {
    const SIZE: usize = 64;
}

/// The non-standard Multiplayer-2013 v7 layout: v6 plus extended flags and
/// a lightmap resolution. Other branches' v7 variants are not recognized.
#[derive(Debug, Clone, Copy, BinRead)]
pub struct StaticPropV7Mp2013 {
    pub origin: Vector,
    pub angles: [f32; 3],
    pub prop_type: u16,
    pub first_leaf: u16,
    pub leaf_count: u16,
    pub solid: SolidType,
    pub flags: StaticPropFlags,
    pub skin: i32,
    pub fade_min_distance: f32,
    pub fade_max_distance: f32,
    pub lighting_origin: Vector,
    pub forced_fade_scale: f32,
    pub min_dx_level: u16,
    pub max_dx_level: u16,
    pub flags_ex: u32,
    pub lightmap_resolution: [u16; 2],
}

impl Packed for StaticPropV7Mp2013 {
    const SIZE: usize = 72;
}

static_assertions::const_assert_eq!(StaticPropV4::SIZE + 4, StaticPropV5::SIZE);
static_assertions::const_assert_eq!(StaticPropV5::SIZE + 4, StaticPropV6::SIZE);
static_assertions::const_assert_eq!(StaticPropV6::SIZE + 8, StaticPropV7Mp2013::SIZE);

/// Version-independent view of a static prop. Fields a version does not
/// store keep their defaults (`forced_fade_scale` 1.0, dx levels and
/// lightmap resolution 0).
#[derive(Debug, Clone, Copy)]
pub struct StaticProp {
    pub origin: Vector,
    angles: [f32; 3],
    pub prop_type: u16,
    pub first_leaf: u16,
    pub leaf_count: u16,
    pub solid: SolidType,
    pub flags: StaticPropFlags,
    pub skin: i32,
    pub fade_min_distance: f32,
    pub fade_max_distance: f32,
    pub lighting_origin: Vector,
    pub forced_fade_scale: f32,
    pub min_dx_level: u16,
    pub max_dx_level: u16,
    pub flags_ex: u32,
    pub lightmap_resolution: [u16; 2],
}

impl StaticProp {
    /// Get the rotation of the prop as quaternion
    pub fn rotation(&self) -> Quaternion<f32> {
        // angles are applied in roll, pitch, yaw order
        Quaternion::from_angle_y(Deg(self.angles[1]))
            * Quaternion::from_angle_x(Deg(self.angles[0]))
            * Quaternion::from_angle_z(Deg(self.angles[2]))
    }
}

impl From<StaticPropV4> for StaticProp {
    fn from(from: StaticPropV4) -> Self {
        StaticProp {
            origin: from.origin,
            angles: from.angles,
            prop_type: from.prop_type,
            first_leaf: from.first_leaf,
            leaf_count: from.leaf_count,
            solid: from.solid,
            flags: from.flags,
            skin: from.skin,
            fade_min_distance: from.fade_min_distance,
            fade_max_distance: from.fade_max_distance,
            lighting_origin: from.lighting_origin,
            forced_fade_scale: 1.0,
            min_dx_level: 0,
            max_dx_level: 0,
            flags_ex: 0,
            lightmap_resolution: Default::default(),
        }
    }
}

impl From<StaticPropV5> for StaticProp {
    fn from(from: StaticPropV5) -> Self {
        StaticProp {
            forced_fade_scale: from.forced_fade_scale,
            ..StaticPropV4 {
                origin: from.origin,
                angles: from.angles,
                prop_type: from.prop_type,
                first_leaf: from.first_leaf,
                leaf_count: from.leaf_count,
                solid: from.solid,
                flags: from.flags,
                skin: from.skin,
                fade_min_distance: from.fade_min_distance,
                fade_max_distance: from.fade_max_distance,
                lighting_origin: from.lighting_origin,
            }
            .into()
        }
    }
}

impl From<StaticPropV6> for StaticProp {
    fn from(from: StaticPropV6) -> Self {
        StaticProp {
            min_dx_level: from.min_dx_level,
            max_dx_level: from.max_dx_level,
            ..StaticPropV5 {
                origin: from.origin,
                angles: from.angles,
                prop_type: from.prop_type,
                first_leaf: from.first_leaf,
                leaf_count: from.leaf_count,
                solid: from.solid,
                flags: from.flags,
                skin: from.skin,
                fade_min_distance: from.fade_min_distance,
                fade_max_distance: from.fade_max_distance,
                lighting_origin: from.lighting_origin,
                forced_fade_scale: from.forced_fade_scale,
            }
            .into()
        }
    }
}

impl From<StaticPropV7Mp2013> for StaticProp {
    fn from(from: StaticPropV7Mp2013) -> Self {
        StaticProp {
            flags_ex: from.flags_ex,
            lightmap_resolution: from.lightmap_resolution,
            ..StaticPropV6 {
                origin: from.origin,
                angles: from.angles,
                prop_type: from.prop_type,
                first_leaf: from.first_leaf,
                leaf_count: from.leaf_count,
                solid: from.solid,
                flags: from.flags,
                skin: from.skin,
                fade_min_distance: from.fade_min_distance,
                fade_max_distance: from.fade_max_distance,
                lighting_origin: from.lighting_origin,
                forced_fade_scale: from.forced_fade_scale,
                min_dx_level: from.min_dx_level,
                max_dx_level: from.max_dx_level,
            }
            .into()
        }
    }
}

/// The closed set of static-prop lump layouts, keyed by game-lump version.
#[derive(Debug, Clone)]
pub enum StaticProps {
    V4(Vec<StaticPropV4>),
    V5(Vec<StaticPropV5>),
    V6(Vec<StaticPropV6>),
    V7Mp2013(Vec<StaticPropV7Mp2013>),
}

impl StaticProps {
    pub fn version(&self) -> u16 {
        match self {
            StaticProps::V4(_) => 4,
            StaticProps::V5(_) => 5,
            StaticProps::V6(_) => 6,
            StaticProps::V7Mp2013(_) => 7,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            StaticProps::V4(props) => props.len(),
            StaticProps::V5(props) => props.len(),
            StaticProps::V6(props) => props.len(),
            StaticProps::V7Mp2013(props) => props.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Version-independent copy of the prop at `index`.
    pub fn get(&self, index: usize) -> Option<StaticProp> {
        match self {
            StaticProps::V4(props) => props.get(index).copied().map(StaticProp::from),
            StaticProps::V5(props) => props.get(index).copied().map(StaticProp::from),
            StaticProps::V6(props) => props.get(index).copied().map(StaticProp::from),
            StaticProps::V7Mp2013(props) => props.get(index).copied().map(StaticProp::from),
        }
    }

    pub fn iter(&self) -> StaticPropsIter<'_> {
        StaticPropsIter {
            props: self,
            index: 0,
        }
    }
}

pub struct StaticPropsIter<'a> {
    props: &'a StaticProps,
    index: usize,
}

impl Iterator for StaticPropsIter<'_> {
    type Item = StaticProp;

    fn next(&mut self) -> Option<StaticProp> {
        let prop = self.props.get(self.index)?;
        self.index += 1;
        Some(prop)
    }
}

/// Contents of a parsed `sprp` game lump: model dictionary, leaf table and
/// the per-version prop records, in file order.
pub struct StaticPropLump {
    pub dictionary: Vec<FixedString<128>>,
    pub leaves: Vec<u16>,
    pub props: StaticProps,
}

/// Parses the dictionary, leaves and props of a static-prop game lump whose
/// (possibly already decompressed) payload is `data`.
pub(crate) fn parse_static_prop_lump(data: &[u8], version: u16) -> Result<StaticPropLump> {
    let dictionary_data = OffsetDataView::new(data);

    let num_dictionary_entries: i32 = dictionary_data.parse_struct(
        0,
        "static prop game lump is shorter than a single int32 for the dictionary count",
    )?;
    if num_dictionary_entries < 0 {
        return Err(Error::InvalidBody(
            "static prop game lump has a negative dictionary count".into(),
        ));
    }
    let dictionary: Vec<FixedString<128>> = dictionary_data.parse_array(
        4,
        num_dictionary_entries as usize,
        "static prop game lump dictionary entries overflowed the lump",
    )?;

    let leaf_data = dictionary_data
        .with_relative_offset(4 + num_dictionary_entries as i64 * FixedString::<128>::SIZE as i64)?;
    let num_leaves: i32 = leaf_data.parse_struct(
        0,
        "static prop game lump is shorter than its dictionary plus a single int32 for the leaf count",
    )?;
    if num_leaves < 0 {
        return Err(Error::InvalidBody(
            "static prop game lump has a negative leaf count".into(),
        ));
    }
    let leaves: Vec<u16> = leaf_data.parse_array(
        4,
        num_leaves as usize,
        "static prop game lump leaves overflowed the lump",
    )?;

    let prop_data = leaf_data.with_relative_offset(4 + num_leaves as i64 * 2)?;
    let num_props: i32 = prop_data.parse_struct(
        0,
        "static prop game lump is shorter than its dictionary, leaves, and a single int32 for the prop count",
    )?;
    if num_props < 0 {
        return Err(Error::InvalidBody(
            "static prop game lump has a negative prop count".into(),
        ));
    }

    let overflow = "static prop game lump props overflowed the lump";
    let props = match version {
        4 => StaticProps::V4(prop_data.parse_array(4, num_props as usize, overflow)?),
        5 => StaticProps::V5(prop_data.parse_array(4, num_props as usize, overflow)?),
        6 => StaticProps::V6(prop_data.parse_array(4, num_props as usize, overflow)?),
        7 => StaticProps::V7Mp2013(prop_data.parse_array(4, num_props as usize, overflow)?),
        version => {
            return Err(Error::UnsupportedVersion(format!(
                "static prop game lump version {version} is unsupported"
            )))
        }
    };

    Ok(StaticPropLump {
        dictionary,
        leaves,
        props,
    })
}
