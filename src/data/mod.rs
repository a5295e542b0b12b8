use crate::error::StringError;
use crate::view::Packed;
use arrayvec::ArrayString;
use binrw::{BinRead, BinResult, Endian};
use std::fmt;
use std::io::{Read, Seek};
use std::ops::Deref;

/// Three-component float vector as stored in every Source format.
#[derive(Debug, Clone, Copy, Default, PartialEq, BinRead)]
pub struct Vector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Packed for Vector {
    const SIZE: usize = 12;
}

impl From<Vector> for cgmath::Vector3<f32> {
    fn from(v: Vector) -> Self {
        cgmath::Vector3::new(v.x, v.y, v.z)
    }
}

impl From<cgmath::Vector3<f32>> for Vector {
    fn from(v: cgmath::Vector3<f32>) -> Self {
        Vector {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, BinRead)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Packed for Vector2 {
    const SIZE: usize = 8;
}

/// Four-component float vector (physics points, vertex tangents).
#[derive(Debug, Clone, Copy, Default, PartialEq, BinRead)]
pub struct Vector4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Packed for Vector4 {
    const SIZE: usize = 16;
}

impl Vector4 {
    pub fn xyz(&self) -> Vector {
        Vector {
            x: self.x,
            y: self.y,
            z: self.z,
        }
    }
}

/// Fixed-capacity NUL-padded string field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedString<const N: usize>(ArrayString<N>);

impl<const N: usize> Packed for FixedString<N> {
    const SIZE: usize = N;
}

impl<const N: usize> BinRead for FixedString<N> {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let pos = reader.stream_position()?;
        let mut raw = [0u8; N];
        reader.read_exact(&mut raw)?;

        let custom = |err: StringError| binrw::Error::Custom {
            err: Box::new(err),
            pos,
        };

        let length = raw
            .iter()
            .position(|&byte| byte == 0)
            .ok_or_else(|| custom(StringError::NotNullTerminated))?;
        let parsed = std::str::from_utf8(&raw[..length])
            .map_err(|e| custom(StringError::NonUtf8(e)))?;

        Ok(FixedString(ArrayString::from(parsed).expect("len < N")))
    }
}

impl<const N: usize> Deref for FixedString<N> {
    type Target = str;

    fn deref(&self) -> &str {
        self.0.as_str()
    }
}

impl<const N: usize> fmt::Display for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl<const N: usize> PartialEq<&str> for FixedString<N> {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_str() == *other
    }
}

/// Decodes a zero-filled buffer of `T::SIZE` bytes and checks the impl
/// consumed exactly that many, catching drift between a `BinRead` impl and
/// its declared wire size.
#[cfg(test)]
pub(crate) fn test_read_bytes<T>()
where
    T: Packed + for<'a> BinRead<Args<'a> = ()>,
{
    use binrw::io::Cursor;
    use binrw::BinReaderExt;

    let zeroes = vec![0u8; T::SIZE];
    let mut cursor = Cursor::new(zeroes.as_slice());
    let _: T = cursor
        .read_le()
        .unwrap_or_else(|e| panic!("failed to decode zeroed {}: {e}", std::any::type_name::<T>()));

    assert_eq!(
        T::SIZE as u64,
        cursor.position(),
        "wire size mismatch for {}",
        std::any::type_name::<T>()
    );
}
