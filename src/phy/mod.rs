pub mod data;
pub(crate) mod surface;

use crate::view::{OffsetDataView, Packed};
use crate::{Error, Result};
use data::{PhyHeader, Solid};
pub use surface::parse_surfaces;

/// Parsed .phy collision model: the solids of every surface plus the
/// key/value text section that closes the file.
pub struct Phy {
    header: PhyHeader,
    solids: Vec<Solid>,
    text_section: String,
}

impl Phy {
    pub fn new(data: &[u8], checksum: Option<i32>) -> Result<Self> {
        let view = OffsetDataView::new(data);
        let header: PhyHeader = view.parse_struct(0, "failed to parse PHY header")?;

        if let Some(expected) = checksum {
            if header.checksum != expected {
                return Err(Error::InvalidChecksum("PHY checksum does not match".into()));
            }
        }

        if header.size < PhyHeader::SIZE as i32 || header.size as usize > data.len() {
            return Err(Error::OutOfBoundsAccess("PHY header size exceeds the file"));
        }

        let surfaces = &data[header.size as usize..];
        let (solids, solid_data_size) =
            parse_surfaces(surfaces, header.solid_count.max(0) as usize)?;
        if solid_data_size > surfaces.len() {
            return Err(Error::InvalidBody(format!(
                "PHY surfaces claim {} bytes but only {} follow the header",
                solid_data_size,
                surfaces.len()
            )));
        }

        tracing::debug!(
            solids = solids.len(),
            surface_bytes = solid_data_size,
            "parsed PHY surfaces"
        );

        let text_section = String::from_utf8_lossy(&surfaces[solid_data_size..]).into_owned();

        Ok(Phy {
            header,
            solids,
            text_section,
        })
    }

    pub fn checksum(&self) -> i32 {
        self.header.checksum
    }

    pub fn solids(&self) -> &[Solid] {
        &self.solids
    }

    /// Raw key/value text trailing the surfaces; not parsed by this crate.
    pub fn text_section(&self) -> &str {
        &self.text_section
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Vector4;

    fn phy_file(checksum: i32, text: &str) -> Vec<u8> {
        let surface = super::surface::tests::single_ledge_surface(
            Vector4::default(),
            0,
            &[[0, 1, 2]],
            &[Vector4::default(); 3],
        );

        let mut file = Vec::new();
        file.extend_from_slice(&(PhyHeader::SIZE as i32).to_le_bytes());
        file.extend_from_slice(&0i32.to_le_bytes()); // id
        file.extend_from_slice(&1i32.to_le_bytes()); // solid count
        file.extend_from_slice(&checksum.to_le_bytes());
        file.extend_from_slice(&surface);
        file.extend_from_slice(text.as_bytes());
        file
    }

    #[test]
    fn parses_solids_and_text() {
        let text = "solid {\n\"index\" \"0\"\n}\n";
        let phy = Phy::new(&phy_file(0x1234_5678, text), None).unwrap();

        assert_eq!(1, phy.solids().len());
        assert_eq!(3, phy.solids()[0].vertices.len());
        assert_eq!(text, phy.text_section());
        assert_eq!(0x1234_5678, phy.checksum());
    }

    #[test]
    fn checksum_gate() {
        let file = phy_file(77, "");

        assert!(Phy::new(&file, Some(77)).is_ok());
        assert!(matches!(
            Phy::new(&file, Some(78)),
            Err(Error::InvalidChecksum(_))
        ));
    }
}
