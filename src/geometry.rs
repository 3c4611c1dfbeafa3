// src/geometry.rs
//
// Axis-aligned box primitives for detection/track association.
// Coordinates denote pixel cells, so a box of width w covers the
// inclusive column range [x, x + w - 1].

use crate::error::GeometryError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Rightmost pixel column covered by the box.
    #[inline]
    pub fn x2(&self) -> i32 {
        self.x + self.w - 1
    }

    /// Bottommost pixel row covered by the box.
    #[inline]
    pub fn y2(&self) -> i32 {
        self.y + self.h - 1
    }

    /// Inclusive pixel area, `(x2 - x1 + 1) * (y2 - y1 + 1)`.
    #[inline]
    pub fn area(&self) -> i64 {
        self.w as i64 * self.h as i64
    }

    /// A box smaller than one pixel on either axis is malformed.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.w < 1 || self.h < 1
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + (self.w as f64 - 1.0) * 0.5,
            self.y as f64 + (self.h as f64 - 1.0) * 0.5,
        )
    }
}

/// Inclusive-pixel IoU of two boxes, in `[0, 1]`. Exactly `0.0` when
/// the boxes do not intersect. A malformed input box is a caller bug
/// and fails with `InvalidBox`.
pub fn overlap_ratio(a: BoundingBox, b: BoundingBox) -> Result<f64, GeometryError> {
    if a.is_degenerate() {
        return Err(GeometryError::InvalidBox(a));
    }
    if b.is_degenerate() {
        return Err(GeometryError::InvalidBox(b));
    }

    let ix1 = a.x.max(b.x);
    let iy1 = a.y.max(b.y);
    let ix2 = a.x2().min(b.x2());
    let iy2 = a.y2().min(b.y2());

    let iw = (ix2 - ix1 + 1) as i64;
    let ih = (iy2 - iy1 + 1) as i64;
    if iw <= 0 || ih <= 0 {
        return Ok(0.0);
    }

    let inter = iw * ih;
    let union = a.area() + b.area() - inter;
    Ok(inter as f64 / union as f64)
}

/// True iff `inner` lies strictly inside `outer` on all four sides.
/// Edge-touching does not count as contained.
pub fn contains(outer: BoundingBox, inner: BoundingBox) -> bool {
    inner.x > outer.x && inner.y > outer.y && inner.x2() < outer.x2() && inner.y2() < outer.y2()
}
