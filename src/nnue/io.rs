//! Little-endian primitives shared by the network file readers and writers.

use std::io::{self, Read, Write};

macro_rules! read_vec_fn {
    ($name:ident, $ty:ty) => {
        pub(crate) fn $name<R: Read>(reader: &mut R, count: usize) -> io::Result<Vec<$ty>> {
            const SIZE: usize = std::mem::size_of::<$ty>();
            let mut bytes = vec![0u8; count * SIZE];
            reader.read_exact(&mut bytes)?;
            Ok(bytes
                .chunks_exact(SIZE)
                .map(|chunk| {
                    let mut buf = [0u8; SIZE];
                    buf.copy_from_slice(chunk);
                    <$ty>::from_le_bytes(buf)
                })
                .collect())
        }
    };
}

macro_rules! write_slice_fn {
    ($name:ident, $ty:ty) => {
        pub(crate) fn $name<W: Write>(writer: &mut W, values: &[$ty]) -> io::Result<()> {
            let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
            writer.write_all(&bytes)
        }
    };
}

read_vec_fn!(read_i8_vec, i8);
read_vec_fn!(read_i16_vec, i16);
read_vec_fn!(read_i32_vec, i32);
read_vec_fn!(read_f32_vec, f32);

write_slice_fn!(write_i8_slice, i8);
write_slice_fn!(write_i16_slice, i16);
write_slice_fn!(write_i32_slice, i32);
write_slice_fn!(write_f32_slice, f32);

pub(crate) fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_i16<R: Read>(reader: &mut R) -> io::Result<i16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(i16::from_le_bytes(buf))
}

pub(crate) fn write_u32<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Fails with `InvalidData` unless the reader is exhausted.
pub(crate) fn expect_eof<R: Read>(reader: &mut R) -> io::Result<()> {
    let mut trailing = [0u8; 1];
    match reader.read(&mut trailing)? {
        0 => Ok(()),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "trailing bytes after network parameters",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_little_endian_layout() {
        let mut out = Vec::new();
        write_i16_slice(&mut out, &[1, -2]).unwrap();
        write_u32(&mut out, 0x7AF3_2F20).unwrap();
        assert_eq!(out, [1, 0, 0xFE, 0xFF, 0x20, 0x2F, 0xF3, 0x7A]);

        let mut cursor = Cursor::new(out);
        assert_eq!(read_i16_vec(&mut cursor, 2).unwrap(), vec![1, -2]);
        assert_eq!(read_u32(&mut cursor).unwrap(), 0x7AF3_2F20);
        assert!(expect_eof(&mut cursor).is_ok());
    }

    #[test]
    fn test_short_read_is_unexpected_eof() {
        let mut cursor = Cursor::new(vec![0u8; 3]);
        let err = read_i32_vec(&mut cursor, 1).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
