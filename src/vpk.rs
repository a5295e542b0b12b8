use crate::case_map::CaseInsensitiveMap;
use crate::view::{OffsetDataView, Packed};
use crate::{Error, Result};
use binrw::BinRead;
use std::collections::BTreeSet;
use std::path::Path;

/// Archive index marking data stored inline after the directory tree.
pub const ARCHIVE_INDEX_INLINE: u16 = 0x7fff;

#[derive(Debug, Clone, Copy, BinRead)]
struct HeaderV1 {
    signature: u32,
    version: u32,
    _directory_tree_size: u32,
}

impl Packed for HeaderV1 {
    const SIZE: usize = 12;
}

/// The v2 header adds four section sizes after the v1 fields; the directory
/// walk only needs to skip past it.
const HEADER_V2_SIZE: usize = HeaderV1::SIZE + 16;

const FILE_SIGNATURE: u32 = 0x55aa_1234;

#[derive(Debug, Clone, Copy, BinRead)]
struct DirectoryEntry {
    crc: u32,
    preload_data_size: u16,
    archive_index: u16,
    entry_offset: u32,
    entry_size: u32,
    _terminator: u16,
}

impl Packed for DirectoryEntry {
    const SIZE: usize = 18;
}

#[derive(Debug, Clone, Default)]
struct File {
    crc: u32,
    archive_index: u16,
    offset: u32,
    size: u32,
    preload_data: Vec<u8>,
}

/// Subdirectories and files of one listed directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryContents {
    pub directories: BTreeSet<String>,
    pub files: BTreeSet<String>,
}

/// Parsed VPK directory file.
///
/// The three-level extension/directory/filename tree is flattened into
/// case-insensitive maps; preload payloads are copied out of the directory
/// and owned here. File bodies live in sibling archives and are fetched
/// through the callback given to [`Vpk::read_file`].
#[derive(Debug, Clone, Default)]
pub struct Vpk {
    /// By extension, then directory, then filename.
    files: CaseInsensitiveMap<CaseInsensitiveMap<CaseInsensitiveMap<File>>>,
}

impl Vpk {
    pub fn new(data: &[u8]) -> Result<Self> {
        let view = OffsetDataView::new(data);
        let header: HeaderV1 = view.parse_struct(0, "failed to parse base VPK header")?;

        if header.signature != FILE_SIGNATURE {
            return Err(Error::InvalidHeader(
                "VPK signature does not equal 0x55aa1234".into(),
            ));
        }
        if !matches!(header.version, 1 | 2) {
            return Err(Error::UnsupportedVersion(format!(
                "VPK version {} not supported (supported versions are 1 and 2)",
                header.version
            )));
        }

        let mut files: CaseInsensitiveMap<CaseInsensitiveMap<CaseInsensitiveMap<File>>> =
            CaseInsensitiveMap::new();

        let mut offset = if header.version == 1 {
            HeaderV1::SIZE as i64
        } else {
            HEADER_V2_SIZE as i64
        };

        loop {
            let extension = view.parse_string(offset, "failed to parse extension")?;
            offset += extension.len() as i64 + 1;
            if extension.is_empty() {
                break;
            }

            let directories = files.or_default(extension);

            loop {
                let mut directory = view.parse_string(offset, "failed to parse directory")?;
                offset += directory.len() as i64 + 1;
                if directory.is_empty() {
                    break;
                }

                // top-level files are stored under a directory of a single
                // space, since an empty string terminates the section
                if directory == " " {
                    directory = "";
                }

                let file_names = directories.or_default(directory);

                loop {
                    let file_name = view.parse_string(offset, "failed to parse filename")?;
                    offset += file_name.len() as i64 + 1;
                    if file_name.is_empty() {
                        break;
                    }

                    let entry: DirectoryEntry =
                        view.parse_struct(offset, "failed to parse directory entry")?;
                    offset += DirectoryEntry::SIZE as i64;

                    let preload_data = view
                        .bytes(
                            offset,
                            entry.preload_data_size as usize,
                            "failed to parse preload data",
                        )?
                        .to_vec();
                    offset += entry.preload_data_size as i64;

                    file_names.insert(
                        file_name,
                        File {
                            crc: entry.crc,
                            archive_index: entry.archive_index,
                            offset: entry.entry_offset,
                            size: entry.entry_size,
                            preload_data,
                        },
                    );
                }
            }
        }

        tracing::debug!(extensions = files.len(), "parsed VPK directory");

        Ok(Vpk { files })
    }

    /// Preload bytes stored for `path` directly in the directory file.
    pub fn preload_data(&self, path: impl AsRef<Path>) -> Option<&[u8]> {
        self.file_metadata(path.as_ref())
            .map(|file| file.preload_data.as_slice())
    }

    pub fn file_crc(&self, path: impl AsRef<Path>) -> Option<u32> {
        self.file_metadata(path.as_ref()).map(|file| file.crc)
    }

    pub fn file_exists(&self, path: impl AsRef<Path>) -> bool {
        self.file_metadata(path.as_ref()).is_some()
    }

    /// Full content of `path`: the preload bytes followed by the body read
    /// through `read_from_archive(archive_index, offset, size)`. Inline
    /// entries ([`ARCHIVE_INDEX_INLINE`]) are requested through the same
    /// callback. Returns `None` for paths not present in the directory.
    pub fn read_file(
        &self,
        path: impl AsRef<Path>,
        read_from_archive: impl FnOnce(u16, u32, u32) -> Vec<u8>,
    ) -> Option<Vec<u8>> {
        let file = self.file_metadata(path.as_ref())?;
        let archive_data = read_from_archive(file.archive_index, file.offset, file.size);

        let mut file_data = Vec::with_capacity(file.preload_data.len() + archive_data.len());
        file_data.extend_from_slice(&file.preload_data);
        file_data.extend_from_slice(&archive_data);

        Some(file_data)
    }

    /// Lists the immediate subdirectories and files of `path`.
    pub fn list(&self, path: impl AsRef<Path>) -> DirectoryContents {
        let normalised = normalise_directory(path.as_ref());

        let mut contents = DirectoryContents::default();
        for (extension, directories) in self.files.iter() {
            for (directory, file_names) in directories.iter() {
                if let Some(subdirectory) = subdirectory_of(&normalised, directory) {
                    contents.directories.insert(subdirectory.to_string());
                } else if directory.eq_ignore_ascii_case(&normalised) {
                    for (file_name, _) in file_names.iter() {
                        contents.files.insert(format!("{file_name}.{extension}"));
                    }
                }
            }
        }

        contents.directories.remove("");
        contents
    }

    fn file_metadata(&self, path: &Path) -> Option<&File> {
        let extension = path.extension()?.to_str()?;
        let directory = normalise_directory(path.parent().unwrap_or(Path::new("")));
        let file_name = path.file_stem()?.to_str()?;

        self.files
            .get(extension)?
            .get(&directory)?
            .get(file_name)
    }
}

/// Strips the leading and trailing slashes VPK directories never carry.
fn normalise_directory(path: &Path) -> String {
    let mut formatted = path.to_string_lossy().replace('\\', "/");

    if let Some(stripped) = formatted.strip_prefix('/') {
        formatted = stripped.to_string();
    }
    if formatted.ends_with('/') {
        formatted.pop();
    }

    formatted
}

/// The immediate child of `parent` on the way to `child`, if `child` lies
/// strictly underneath it. A plain prefix match is not enough: "foo" must
/// not count as a parent of "foobar".
fn subdirectory_of<'a>(parent: &str, child: &'a str) -> Option<&'a str> {
    if child.is_empty() {
        return None;
    }

    if parent.is_empty() {
        return Some(child.split('/').next().unwrap_or(child));
    }

    if child.len() < parent.len() + 2
        || !child.as_bytes()[..parent.len()].eq_ignore_ascii_case(parent.as_bytes())
        || child.as_bytes()[parent.len()] != b'/'
    {
        return None;
    }

    let rest = child.get(parent.len() + 1..)?;
    Some(rest.split('/').next().unwrap_or(rest))
}
