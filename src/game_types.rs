//! Value types shared by every VToy codec.
//!
//! These are plain-old-data mirrors of what the game stores on the wire: three
//! float vectors, row-major 4x4 matrices and RGBA colors. They carry no format
//! knowledge of their own.

// =============================================================================
// Vector Types
// =============================================================================

/// Texture coordinate pair.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Vec2 {
        Vec2 { x, y }
    }
}

/// Three-component vector in game world space.
/// X = east/west, Y = up/down, Z = north/south.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Vec3 {
        Vec3 { x, y, z }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit-length copy of this vector. A zero vector has no direction and
    /// yields `fallback` instead.
    pub fn normalize_or(self, fallback: Vec3) -> Vec3 {
        let length = self.length();
        if length == 0.0 {
            fallback
        } else {
            self * (1.0 / length)
        }
    }
}

impl std::ops::Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3 {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
        }
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3 {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Vec3;
    fn mul(self, rhs: f32) -> Vec3 {
        Vec3 {
            x: self.x * rhs,
            y: self.y * rhs,
            z: self.z * rhs,
        }
    }
}

// =============================================================================
// Matrix Types
// =============================================================================

/// 4x4 transform stored as 16 floats in row-major order, exactly as on disk.
///
/// Row 3 (`m[12..15]`) holds the translation, matching the row-vector
/// convention the game uses.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Matrix4x4(pub [f32; 16]);

impl Matrix4x4 {
    pub const IDENTITY: Matrix4x4 = Matrix4x4([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    /// Element at `row`, `col` (both zero-based).
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.0[row * 4 + col]
    }

    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.0[12], self.0[13], self.0[14])
    }

    pub fn set_translation(&mut self, position: Vec3) {
        self.0[12] = position.x;
        self.0[13] = position.y;
        self.0[14] = position.z;
    }
}

impl Default for Matrix4x4 {
    fn default() -> Self {
        Matrix4x4::IDENTITY
    }
}

// =============================================================================
// Color Types
// =============================================================================

/// Linear RGBA color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Color {
        Color { r, g, b, a }
    }

    /// Expand a packed `0x00RRGGBB` value. The high byte is ignored and alpha is opaque.
    pub fn from_packed_rgb(packed: u32) -> Color {
        let r = (packed >> 16) & 0xFF;
        let g = (packed >> 8) & 0xFF;
        let b = packed & 0xFF;
        Color::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0)
    }

    /// Pack back into `0x00RRGGBB`, rounding each channel to the nearest 8-bit step.
    pub fn to_packed_rgb(self) -> u32 {
        fn quantize(channel: f32) -> u32 {
            (channel * 255.0).round().clamp(0.0, 255.0) as u32
        }
        (quantize(self.r) << 16) | (quantize(self.g) << 8) | quantize(self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_zero_uses_fallback() {
        let up = Vec3::new(0.0, 0.0, 1.0);
        assert_eq!(Vec3::ZERO.normalize_or(up), up);
        assert_eq!(
            Vec3::new(0.0, 0.0, -5.0).normalize_or(up),
            Vec3::new(0.0, 0.0, -1.0)
        );
    }

    #[test]
    fn packed_fog_color() {
        let color = Color::from_packed_rgb(0x3399CC);
        assert!((color.r - 0.2).abs() <= 1.0 / 255.0);
        assert!((color.g - 0.6).abs() <= 1.0 / 255.0);
        assert!((color.b - 0.8).abs() <= 1.0 / 255.0);
        assert_eq!(color.a, 1.0);
        assert_eq!(color.to_packed_rgb(), 0x3399CC);
    }

    #[test]
    fn packed_color_ignores_high_byte() {
        let color = Color::from_packed_rgb(0xFF10_2030);
        assert_eq!(color.to_packed_rgb(), 0x10_2030);
    }

    #[test]
    fn matrix_translation_is_last_row() {
        let mut m = Matrix4x4::IDENTITY;
        m.set_translation(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(m.get(3, 0), 1.0);
        assert_eq!(m.translation(), Vec3::new(1.0, 2.0, 3.0));
    }
}
