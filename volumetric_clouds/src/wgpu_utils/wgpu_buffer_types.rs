//! Explicitly padded and/or aligned types following wgsl rules.
//! See [wgsl spec on alignment and size](https://www.w3.org/TR/WGSL/#alignment-and-size)
//!
//! This is especially important for cases where [`glam`] isn't explicit about padding and alignment.

use bytemuck::{CheckedBitPattern, Pod, Zeroable};

#[repr(C, align(8))]
#[derive(Clone, Copy, Zeroable, Pod, Debug, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl From<glam::Vec2> for Vec2 {
    #[inline]
    fn from(v: glam::Vec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

impl From<Vec2> for glam::Vec2 {
    #[inline]
    fn from(v: Vec2) -> Self {
        glam::vec2(v.x, v.y)
    }
}

#[repr(C, align(16))]
#[derive(Clone, Copy, Zeroable, Pod)]
pub struct Vec2RowPadded {
    pub x: f32,
    pub y: f32,
    pub padding0: f32,
    pub padding1: f32,
}

impl From<glam::Vec2> for Vec2RowPadded {
    #[inline]
    fn from(v: glam::Vec2) -> Self {
        Self {
            x: v.x,
            y: v.y,
            padding0: 0.0,
            padding1: 0.0,
        }
    }
}

#[repr(C, align(16))]
#[derive(Clone, Copy, Zeroable, Pod)]
pub struct Vec3RowPadded {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub padding: f32,
}

impl From<Vec3RowPadded> for glam::Vec3 {
    #[inline]
    fn from(v: Vec3RowPadded) -> Self {
        glam::vec3(v.x, v.y, v.z)
    }
}

impl From<glam::Vec3> for Vec3RowPadded {
    #[inline]
    fn from(v: glam::Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
            padding: 0.0,
        }
    }
}

impl From<glam::Vec3A> for Vec3RowPadded {
    #[inline]
    fn from(v: glam::Vec3A) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
            padding: 0.0,
        }
    }
}

/// Three floats without trailing padding.
///
/// A wgsl `vec3f` has an alignment of 16 but a size of 12,
/// so the next scalar can be packed into the remaining four bytes of the row.
#[repr(C, align(4))]
#[derive(Clone, Copy, Zeroable, Pod, Debug, PartialEq)]
pub struct Vec3Unpadded {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<glam::Vec3> for Vec3Unpadded {
    #[inline]
    fn from(v: glam::Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<Vec3Unpadded> for glam::Vec3 {
    #[inline]
    fn from(v: Vec3Unpadded) -> Self {
        glam::vec3(v.x, v.y, v.z)
    }
}

#[repr(C, align(16))]
#[derive(Clone, Copy, Zeroable, Pod, Debug, PartialEq)]
pub struct Vec4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl From<glam::Vec4> for Vec4 {
    #[inline]
    fn from(v: glam::Vec4) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
            w: v.w,
        }
    }
}

impl From<Vec4> for glam::Vec4 {
    #[inline]
    fn from(val: Vec4) -> Self {
        glam::vec4(val.x, val.y, val.z, val.w)
    }
}

#[repr(C, align(16))]
#[derive(Clone, Copy, Zeroable, Pod)]
pub struct Mat4 {
    c0: Vec4,
    c1: Vec4,
    c2: Vec4,
    c3: Vec4,
}

impl From<glam::Mat4> for Mat4 {
    #[inline]
    fn from(m: glam::Mat4) -> Self {
        Self {
            c0: m.x_axis.into(),
            c1: m.y_axis.into(),
            c2: m.z_axis.into(),
            c3: m.w_axis.into(),
        }
    }
}

#[repr(C, align(16))]
#[derive(Clone, Copy, Zeroable, Pod)]
pub struct Mat4x3 {
    c0: Vec3RowPadded,
    c1: Vec3RowPadded,
    c2: Vec3RowPadded,
    c3: Vec3RowPadded,
}

impl From<glam::Affine3A> for Mat4x3 {
    #[inline]
    fn from(m: glam::Affine3A) -> Self {
        Self {
            c0: m.matrix3.x_axis.into(),
            c1: m.matrix3.y_axis.into(),
            c2: m.matrix3.z_axis.into(),
            c3: m.translation.into(),
        }
    }
}

/// A `bool` stored as `u32` since wgsl uniforms can't hold booleans.
#[repr(transparent)]
#[derive(Clone, Copy, Zeroable, Pod, Default, Debug, PartialEq, Eq)]
pub struct BoolAsInteger(u32);

impl From<bool> for BoolAsInteger {
    #[inline]
    fn from(value: bool) -> Self {
        Self(value as u32)
    }
}

impl From<BoolAsInteger> for bool {
    #[inline]
    fn from(value: BoolAsInteger) -> Self {
        value.0 != 0
    }
}

impl BoolAsInteger {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// A wrapper around an enum that is always stored as a u32 for consumption in wgsl.
#[derive(Clone, Copy, Zeroable, PartialEq, Eq)]
#[repr(transparent)]
pub struct WgslEnum<T>
where
    T: Copy + Into<u32> + CheckedBitPattern + Zeroable + 'static,
{
    value: u32,
    _marker: std::marker::PhantomData<T>,
}

// Bytemuck doesn't allow deriving Pod if any of the generics parameters are not Pod.
// https://github.com/Lokathor/bytemuck/issues/191
unsafe impl<T: Copy + Into<u32> + CheckedBitPattern + Zeroable + 'static> bytemuck::Pod
    for WgslEnum<T>
{
}

impl<T: Copy + Into<u32> + CheckedBitPattern + Zeroable> WgslEnum<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: value.into(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn set(&mut self, value: T) {
        self.value = value.into();
    }

    /// Returns the wrapped enum.
    ///
    /// Only ever constructed from a valid `T`, so the checked cast can't fail.
    pub fn get(&self) -> T {
        match bytemuck::checked::try_cast(self.value) {
            Ok(value) => value,
            Err(err) => unreachable!("WgslEnum holds invalid value {}: {err}", self.value),
        }
    }

    pub fn as_u32(&self) -> u32 {
        self.value
    }
}

impl<T> std::fmt::Debug for WgslEnum<T>
where
    T: Copy + Into<u32> + CheckedBitPattern + Zeroable + 'static + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.get().fmt(f)
    }
}
