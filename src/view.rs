use crate::{Error, Result};
use binrw::io::Cursor;
use binrw::{BinRead, BinReaderExt};

/// Serialized size of a record as it appears on disk.
///
/// Rust struct layout is not the wire layout (binrw decodes field by field,
/// and several formats carry trailing padding), so every record that passes
/// through [`OffsetDataView`] declares its wire size explicitly. The
/// `test_read_bytes` helper in `data` checks the constant against what the
/// `BinRead` impl actually consumes.
pub trait Packed {
    const SIZE: usize;
}

macro_rules! impl_packed_primitive {
    ($($ty:ty),+) => {
        $(impl Packed for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();
        })+
    };
}

impl_packed_primitive!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// A borrowed byte buffer together with a parse origin.
///
/// All offsets handed to the parse methods are relative to the origin and may
/// be negative. Every access is bounds-checked before any byte is touched and
/// fails with [`Error::OutOfBoundsAccess`] carrying the call-site message.
#[derive(Clone, Copy)]
pub struct OffsetDataView<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> OffsetDataView<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        OffsetDataView { data, offset: 0 }
    }

    /// Rebases the view so `new_offset` becomes the origin. The new origin
    /// must be a valid position inside the buffer.
    pub fn with_absolute_offset(&self, new_offset: usize) -> Result<Self> {
        check_bounds(
            new_offset as i64,
            1,
            self.data.len(),
            "invalid offset passed to with_absolute_offset",
        )?;

        Ok(OffsetDataView {
            data: self.data,
            offset: new_offset,
        })
    }

    /// Rebases the view by a signed offset relative to the current origin.
    pub fn with_relative_offset(&self, new_offset: i64) -> Result<Self> {
        let absolute =
            self.absolute_offset(new_offset, 1, "invalid offset passed to with_relative_offset")?;

        Ok(OffsetDataView {
            data: self.data,
            offset: absolute,
        })
    }

    /// Decodes a single record at `relative_offset` from the origin.
    pub fn parse_struct<T>(&self, relative_offset: i64, error_message: &'static str) -> Result<T>
    where
        T: Packed + for<'b> BinRead<Args<'b> = ()>,
    {
        let absolute = self.absolute_offset(relative_offset, T::SIZE, error_message)?;

        read_le(&self.data[absolute..absolute + T::SIZE])
    }

    /// As [`Self::parse_struct`], additionally returning the record's
    /// absolute offset for formats whose internal offsets are relative to
    /// the record itself.
    pub fn parse_struct_with_offset<T>(
        &self,
        relative_offset: i64,
        error_message: &'static str,
    ) -> Result<(T, usize)>
    where
        T: Packed + for<'b> BinRead<Args<'b> = ()>,
    {
        let absolute = self.absolute_offset(relative_offset, T::SIZE, error_message)?;

        Ok((read_le(&self.data[absolute..absolute + T::SIZE])?, absolute))
    }

    /// Decodes `count` consecutive records. A count of zero yields an empty
    /// vector without any bounds check.
    pub fn parse_array<T>(
        &self,
        relative_offset: i64,
        count: usize,
        error_message: &'static str,
    ) -> Result<Vec<T>>
    where
        T: Packed + for<'b> BinRead<Args<'b> = ()>,
    {
        if count == 0 {
            return Ok(Vec::new());
        }

        let absolute = self.absolute_offset(relative_offset, T::SIZE * count, error_message)?;
        let mut cursor = Cursor::new(&self.data[absolute..absolute + T::SIZE * count]);

        let mut parsed = Vec::with_capacity(count);
        for _ in 0..count {
            parsed.push(cursor.read_le()?);
        }

        Ok(parsed)
    }

    /// As [`Self::parse_array`], pairing each record with its absolute offset.
    pub fn parse_array_with_offsets<T>(
        &self,
        relative_offset: i64,
        count: usize,
        error_message: &'static str,
    ) -> Result<Vec<(T, usize)>>
    where
        T: Packed + for<'b> BinRead<Args<'b> = ()>,
    {
        if count == 0 {
            return Ok(Vec::new());
        }

        let absolute = self.absolute_offset(relative_offset, T::SIZE * count, error_message)?;

        let mut parsed = Vec::with_capacity(count);
        for i in 0..count {
            let element_offset = absolute + T::SIZE * i;
            parsed.push((
                read_le(&self.data[element_offset..element_offset + T::SIZE])?,
                element_offset,
            ));
        }

        Ok(parsed)
    }

    /// Borrows `count` raw bytes. A count of zero yields an empty slice
    /// without any bounds check.
    pub fn bytes(
        &self,
        relative_offset: i64,
        count: usize,
        error_message: &'static str,
    ) -> Result<&'a [u8]> {
        if count == 0 {
            return Ok(&[]);
        }

        let absolute = self.absolute_offset(relative_offset, count, error_message)?;

        Ok(&self.data[absolute..absolute + count])
    }

    /// Scans forward for a NUL terminator and borrows the string before it.
    /// Running off the end of the buffer is an out-of-bounds access.
    pub fn parse_string(
        &self,
        relative_offset: i64,
        error_message: &'static str,
    ) -> Result<&'a str> {
        let absolute = self.absolute_offset(relative_offset, 1, error_message)?;

        let terminator = self.data[absolute..]
            .iter()
            .position(|&byte| byte == 0)
            .ok_or(Error::OutOfBoundsAccess(error_message))?;

        std::str::from_utf8(&self.data[absolute..absolute + terminator])
            .map_err(|e| Error::InvalidBody(format!("{error_message}: {e}")))
    }

    fn absolute_offset(
        &self,
        relative_offset: i64,
        read_size: usize,
        error_message: &'static str,
    ) -> Result<usize> {
        let absolute = self.offset as i64 + relative_offset;
        check_bounds(absolute, read_size, self.data.len(), error_message)?;

        Ok(absolute as usize)
    }
}

pub fn check_bounds(
    offset: i64,
    count: usize,
    range_size: usize,
    error_message: &'static str,
) -> Result<()> {
    if offset < 0 {
        return Err(Error::OutOfBoundsAccess(error_message));
    }

    let offset = offset as usize;
    if offset >= range_size || count > range_size - offset {
        return Err(Error::OutOfBoundsAccess(error_message));
    }

    Ok(())
}

fn read_le<T>(data: &[u8]) -> Result<T>
where
    T: for<'b> BinRead<Args<'b> = ()>,
{
    Cursor::new(data).read_le().map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(data: &[u8]) -> OffsetDataView {
        OffsetDataView::new(data)
    }

    #[test]
    fn reads_at_every_valid_offset() {
        let data = [1u8, 0, 0, 0, 2, 0, 0, 0];

        assert_eq!(1u32, view(&data).parse_struct(0, "start").unwrap());
        assert_eq!(2u32, view(&data).parse_struct(4, "end").unwrap());
    }

    #[test]
    fn rejects_reads_past_either_end() {
        let data = [0u8; 8];

        for offset in [-1i64, 8, 8 - 4 + 1] {
            let result = view(&data).parse_struct::<u32>(offset, "probe");
            assert!(
                matches!(result, Err(Error::OutOfBoundsAccess("probe"))),
                "offset {offset} should be out of bounds"
            );
        }
    }

    #[test]
    fn rejects_array_overrun() {
        let data = [0u8; 8];

        assert!(view(&data).parse_array::<u32>(0, 2, "fits").is_ok());
        assert!(matches!(
            view(&data).parse_array::<u32>(0, 3, "overruns"),
            Err(Error::OutOfBoundsAccess("overruns"))
        ));
        assert!(matches!(
            view(&data).parse_array::<u32>(8, 1, "at end"),
            Err(Error::OutOfBoundsAccess("at end"))
        ));
    }

    #[test]
    fn zero_length_array_skips_bounds_check() {
        let data = [0u8; 4];

        let parsed = view(&data).parse_array::<u32>(1024, 0, "never checked").unwrap();
        assert!(parsed.is_empty());
        assert!(view(&data).bytes(1024, 0, "never checked").unwrap().is_empty());
    }

    #[test]
    fn array_offsets_step_by_wire_size() {
        let data = [7u8, 0, 8, 0, 9, 0];

        let parsed = view(&data)
            .parse_array_with_offsets::<u16>(0, 3, "stride")
            .unwrap();
        assert_eq!(vec![(7, 0), (8, 2), (9, 4)], parsed);
    }

    #[test]
    fn rebasing_applies_to_later_reads() {
        let data = [0u8, 0, 5, 0, 0, 0];

        let rebased = view(&data).with_absolute_offset(2).unwrap();
        assert_eq!(5u32, rebased.parse_struct(0, "rebased").unwrap());

        let back = rebased.with_relative_offset(-2).unwrap();
        assert_eq!(0u16, back.parse_struct(0, "back").unwrap());

        assert!(view(&data).with_absolute_offset(6).is_err());
        assert!(rebased.with_relative_offset(-3).is_err());
    }

    #[test]
    fn string_scan_stops_at_first_nul() {
        let data = b"maps/de_dust\0rest";

        let parsed = view(data).parse_string(0, "name").unwrap();
        assert_eq!("maps/de_dust", parsed);
        assert_eq!(12, parsed.len());
    }

    #[test]
    fn unterminated_string_is_out_of_bounds() {
        let data = b"no terminator";

        assert!(matches!(
            view(data).parse_string(3, "name"),
            Err(Error::OutOfBoundsAccess("name"))
        ));
    }
}
