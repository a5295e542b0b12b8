//! Read-only parsers for the Source engine's map, model, physics and pack
//! file formats: BSP, MDL/VTX/VVD, PHY and VPK, plus the ZIP pakfile
//! embedded in maps.
//!
//! Every parser takes a byte slice the caller keeps alive and validates
//! eagerly at construction; accessors afterwards are pure reads. Parsers
//! allocate only where the format forces it (decompressed lumps,
//! triangulated displacements, fixed-up vertex streams, physics solids).
//! LZMA decompression is delegated to a caller-supplied callback so no
//! compression library is baked into the parse path; pass
//! [`lzma_rs_callback`] to use the bundled `lzma-rs` implementation.
//!
//! ```no_run
//! # fn main() -> vsource::Result<()> {
//! let data = std::fs::read("de_dust2.bsp").expect("read map");
//! let bsp = vsource::Bsp::new(&data, Some(&vsource::lzma_rs_callback))?;
//!
//! for entry in bsp.pakfile_entries()? {
//!     println!("{} ({} bytes)", entry.file_name, entry.data.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod bsp;
pub mod case_map;
pub mod data;
mod error;
pub mod lzma;
pub mod mdl;
pub mod phy;
pub mod view;
pub mod vpk;
pub mod zip;

pub use bsp::{Bsp, LumpType, TriangulatedDisplacement};
pub use case_map::CaseInsensitiveMap;
pub use data::{FixedString, Vector, Vector2, Vector4};
pub use error::{Error, Result, StringError};
pub use lzma::{lzma_rs_callback, LzmaCallback, LzmaMetadata};
pub use mdl::{Mdl, Vtx, Vvd};
pub use phy::Phy;
pub use vpk::Vpk;
