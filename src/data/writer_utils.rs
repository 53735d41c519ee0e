//! Little-endian writers mirroring the readers in [`crate::data::parser_utils`].
//!
//! Writers append to a `Vec<u8>`; callers flush the finished buffer to disk in
//! one go, which keeps backpatching free of `Seek` bounds.

use std::ops::{Deref, DerefMut};

use crate::game_types::{Color, Matrix4x4, Vec3};

pub fn write_u8(buf: &mut Vec<u8>, v: u8) {
    buf.push(v);
}

pub fn write_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn write_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn write_f32(buf: &mut Vec<u8>, v: f32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(bytes);
}

pub fn write_zeros(buf: &mut Vec<u8>, n: usize) {
    buf.resize(buf.len() + n, 0);
}

/// Write a length-prefixed string. The stored length is the UTF-8 byte length
/// plus one for the trailing NUL.
pub fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_u32(buf, s.len() as u32 + 1);
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
}

pub fn write_vec3(buf: &mut Vec<u8>, v: Vec3) {
    write_f32(buf, v.x);
    write_f32(buf, v.y);
    write_f32(buf, v.z);
}

pub fn write_matrix(buf: &mut Vec<u8>, m: &Matrix4x4) {
    for value in m.0 {
        write_f32(buf, value);
    }
}

pub fn write_color(buf: &mut Vec<u8>, c: Color) {
    write_f32(buf, c.r);
    write_f32(buf, c.g);
    write_f32(buf, c.b);
    write_f32(buf, c.a);
}

/// Reserves a `u32` size slot and backpatches it when dropped.
///
/// Everything written through the scope (it derefs to the underlying buffer)
/// between creation and drop is counted. Because patching happens in `Drop`,
/// the slot is filled even when the caller bails out early with `?`.
pub struct SizePrefixScope<'a> {
    buf: &'a mut Vec<u8>,
    slot: usize,
}

impl<'a> SizePrefixScope<'a> {
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        let slot = buf.len();
        write_u32(buf, 0);
        Self { buf, slot }
    }

    /// Number of bytes written since the slot.
    pub fn written(&self) -> usize {
        self.buf.len() - self.slot - 4
    }
}

impl Deref for SizePrefixScope<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        self.buf
    }
}

impl DerefMut for SizePrefixScope<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        self.buf
    }
}

impl Drop for SizePrefixScope<'_> {
    fn drop(&mut self) {
        let size = u32::try_from(self.written()).unwrap_or(u32::MAX);
        self.buf[self.slot..self.slot + 4].copy_from_slice(&size.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parser_utils::parse_string;

    #[test]
    fn string_counts_trailing_nul() {
        let mut buf = Vec::new();
        write_string(&mut buf, "abc");
        assert_eq!(buf, [4, 0, 0, 0, b'a', b'b', b'c', 0]);

        let mut input = &buf[..];
        assert_eq!(parse_string(&mut input).unwrap(), "abc");
    }

    #[test]
    fn string_length_counts_bytes_not_chars() {
        let mut buf = Vec::new();
        write_string(&mut buf, "é");
        assert_eq!(&buf[..4], &[3, 0, 0, 0]);
    }

    #[test]
    fn size_prefix_is_patched() {
        let mut buf = vec![0xEE];
        {
            let mut scope = SizePrefixScope::new(&mut buf);
            write_u32(&mut scope, 7);
            write_zeros(&mut scope, 3);
        }
        assert_eq!(buf.len(), 1 + 4 + 7);
        assert_eq!(&buf[1..5], &7u32.to_le_bytes());
    }

    #[test]
    fn size_prefix_is_patched_on_early_return() {
        fn write_then_fail(buf: &mut Vec<u8>, fail: bool) -> Result<(), &'static str> {
            let mut scope = SizePrefixScope::new(buf);
            write_u32(&mut scope, 1);
            if fail {
                return Err("bail");
            }
            write_u32(&mut scope, 2);
            Ok(())
        }

        let mut buf = Vec::new();
        assert!(write_then_fail(&mut buf, true).is_err());
        assert_eq!(buf, [4, 0, 0, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn empty_scope_writes_zero() {
        let mut buf = Vec::new();
        drop(SizePrefixScope::new(&mut buf));
        assert_eq!(buf, [0, 0, 0, 0]);
    }
}
