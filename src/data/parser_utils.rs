//! Shared winnow-based parsing utilities used by the pack, geometry, scene and height map parsers.
//!
//! Every VToy format uses the same conventions: little-endian numerics, strings
//! prefixed by a `u32` length that counts a trailing NUL, and row-major 4x4 float
//! matrices.

use thiserror::Error;
use winnow::Parser;
use winnow::binary::{le_f32, le_i32, le_u8, le_u16, le_u32};
use winnow::combinator::repeat;
use winnow::error::{ContextError, ErrMode};
use winnow::token::take;

use crate::game_types::{Color, Matrix4x4, Vec2, Vec3};

/// Common result type for winnow parsers.
pub type WResult<T> = Result<T, ErrMode<ContextError>>;

/// Errors that can occur during shared parsing operations.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected end of data reading {field} at 0x{offset:X}: {detail}")]
    Truncated {
        field: &'static str,
        offset: usize,
        detail: String,
    },
    #[error("seek to 0x{offset:X} is beyond end of data (len 0x{len:X})")]
    SeekOutOfBounds { offset: usize, len: usize },
}

/// Decode string bytes as UTF-8 and drop every NUL.
///
/// On disk the declared length includes a trailing NUL; some files carry extra
/// embedded NULs as well, so all of them are removed rather than just the last.
pub fn decode_string(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.contains('\0') {
        text.replace('\0', "")
    } else {
        text.into_owned()
    }
}

/// Parse exactly `len` bytes as a string.
pub fn parse_fixed_string(input: &mut &[u8], len: usize) -> WResult<String> {
    let bytes: &[u8] = take(len).parse_next(input)?;
    Ok(decode_string(bytes))
}

/// Parse a `u32` length-prefixed string.
pub fn parse_string(input: &mut &[u8]) -> WResult<String> {
    let len = le_u32.parse_next(input)?;
    parse_fixed_string(input, len as usize)
}

/// Parse an `N`-byte magic tag.
pub fn parse_magic<const N: usize>(input: &mut &[u8]) -> WResult<[u8; N]> {
    let bytes: &[u8] = take(N).parse_next(input)?;
    let mut magic = [0u8; N];
    magic.copy_from_slice(bytes);
    Ok(magic)
}

pub fn parse_vec2(input: &mut &[u8]) -> WResult<Vec2> {
    let x = le_f32.parse_next(input)?;
    let y = le_f32.parse_next(input)?;
    Ok(Vec2 { x, y })
}

pub fn parse_vec3(input: &mut &[u8]) -> WResult<Vec3> {
    let x = le_f32.parse_next(input)?;
    let y = le_f32.parse_next(input)?;
    let z = le_f32.parse_next(input)?;
    Ok(Vec3 { x, y, z })
}

/// Parse 16 floats in row-major order.
pub fn parse_matrix(input: &mut &[u8]) -> WResult<Matrix4x4> {
    let mut m = [0f32; 16];
    for value in m.iter_mut() {
        *value = le_f32.parse_next(input)?;
    }
    Ok(Matrix4x4(m))
}

/// Parse an RGBA color stored as four floats.
pub fn parse_color(input: &mut &[u8]) -> WResult<Color> {
    let r = le_f32.parse_next(input)?;
    let g = le_f32.parse_next(input)?;
    let b = le_f32.parse_next(input)?;
    let a = le_f32.parse_next(input)?;
    Ok(Color { r, g, b, a })
}

/// Parse the 8 corners of a bounding box.
pub fn parse_corners(input: &mut &[u8]) -> WResult<[Vec3; 8]> {
    let mut corners = [Vec3::ZERO; 8];
    for corner in corners.iter_mut() {
        *corner = parse_vec3(input)?;
    }
    Ok(corners)
}

/// Clamp an untrusted element count to what the remaining bytes could hold.
///
/// Only used for `Vec::with_capacity`; the actual reads still fail on truncation.
pub fn bounded_capacity(count: u32, remaining: usize, record_size: usize) -> usize {
    (count as usize).min(remaining / record_size.max(1))
}

/// Cursor over a complete file buffer.
///
/// Wraps winnow's `&mut &[u8]` input while remembering the start of the file, so
/// every failed read can report the absolute offset it happened at and
/// table-based formats can seek.
#[derive(Debug, Clone)]
pub struct ByteStream<'a> {
    data: &'a [u8],
    input: &'a [u8],
}

impl<'a> ByteStream<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, input: data }
    }

    /// Absolute offset of the next unread byte.
    pub fn offset(&self) -> usize {
        self.data.len() - self.input.len()
    }

    pub fn remaining(&self) -> usize {
        self.input.len()
    }

    pub fn seek(&mut self, offset: usize) -> Result<(), ParseError> {
        if offset > self.data.len() {
            return Err(ParseError::SeekOutOfBounds {
                offset,
                len: self.data.len(),
            });
        }
        self.input = &self.data[offset..];
        Ok(())
    }

    /// Run a winnow parser at the current position, labelling failures with `field`.
    pub fn read<O, P>(&mut self, field: &'static str, mut parser: P) -> Result<O, ParseError>
    where
        P: Parser<&'a [u8], O, ErrMode<ContextError>>,
    {
        let offset = self.offset();
        parser
            .parse_next(&mut self.input)
            .map_err(|e| ParseError::Truncated {
                field,
                offset,
                detail: format!("{e}"),
            })
    }

    pub fn skip(&mut self, field: &'static str, count: usize) -> Result<(), ParseError> {
        self.bytes(field, count).map(|_| ())
    }

    pub fn bytes(&mut self, field: &'static str, count: usize) -> Result<&'a [u8], ParseError> {
        self.read(field, take(count))
    }

    pub fn u8(&mut self, field: &'static str) -> Result<u8, ParseError> {
        self.read(field, le_u8)
    }

    pub fn u32(&mut self, field: &'static str) -> Result<u32, ParseError> {
        self.read(field, le_u32)
    }

    pub fn i32(&mut self, field: &'static str) -> Result<i32, ParseError> {
        self.read(field, le_i32)
    }

    pub fn f32(&mut self, field: &'static str) -> Result<f32, ParseError> {
        self.read(field, le_f32)
    }

    pub fn string(&mut self, field: &'static str) -> Result<String, ParseError> {
        self.read(field, parse_string)
    }

    pub fn vec3(&mut self, field: &'static str) -> Result<Vec3, ParseError> {
        self.read(field, parse_vec3)
    }

    pub fn matrix(&mut self, field: &'static str) -> Result<Matrix4x4, ParseError> {
        self.read(field, parse_matrix)
    }

    pub fn color(&mut self, field: &'static str) -> Result<Color, ParseError> {
        self.read(field, parse_color)
    }

    pub fn corners(&mut self, field: &'static str) -> Result<[Vec3; 8], ParseError> {
        self.read(field, parse_corners)
    }

    /// Read `count` little-endian `u16` values.
    pub fn u16_array(&mut self, field: &'static str, count: usize) -> Result<Vec<u16>, ParseError> {
        self.read(field, repeat(count, le_u16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_strips_trailing_nul() {
        let data = [4, 0, 0, 0, b'a', b'b', b'c', 0, 0xAA];
        let mut input = &data[..];
        assert_eq!(parse_string(&mut input).unwrap(), "abc");
        assert_eq!(input, &[0xAA]);
    }

    #[test]
    fn string_strips_embedded_nuls() {
        assert_eq!(decode_string(b"te\0x\0t\0"), "text");
        assert_eq!(decode_string(b""), "");
    }

    #[test]
    fn matrix_is_row_major() {
        let data: Vec<u8> = (0..16).flat_map(|i| (i as f32).to_le_bytes()).collect();
        let mut input = &data[..];
        let m = parse_matrix(&mut input).unwrap();
        assert_eq!(m.get(0, 1), 1.0);
        assert_eq!(m.get(1, 0), 4.0);
        assert_eq!(m.get(3, 3), 15.0);
        assert!(input.is_empty());
    }

    #[test]
    fn truncated_read_reports_offset() {
        let data = [1, 0, 0, 0, 2, 0];
        let mut stream = ByteStream::new(&data);
        assert_eq!(stream.u32("first").unwrap(), 1);
        match stream.u32("second") {
            Err(ParseError::Truncated { field, offset, .. }) => {
                assert_eq!(field, "second");
                assert_eq!(offset, 4);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn oversized_string_length_is_an_error() {
        let data = [0xFF, 0xFF, 0xFF, 0x7F, b'a'];
        let mut stream = ByteStream::new(&data);
        assert!(stream.string("name").is_err());
    }

    #[test]
    fn seek_past_end_fails() {
        let data = [0u8; 8];
        let mut stream = ByteStream::new(&data);
        assert!(stream.seek(8).is_ok());
        assert!(matches!(
            stream.seek(9),
            Err(ParseError::SeekOutOfBounds { offset: 9, len: 8 })
        ));
    }

    #[test]
    fn u16_array_reads_little_endian() {
        let data = [1, 0, 2, 1];
        let mut stream = ByteStream::new(&data);
        assert_eq!(stream.u16_array("indices", 2).unwrap(), vec![1, 0x0102]);
    }

    #[test]
    fn capacity_is_bounded_by_remaining_bytes() {
        assert_eq!(bounded_capacity(u32::MAX, 64, 32), 2);
        assert_eq!(bounded_capacity(3, 1024, 32), 3);
    }
}
