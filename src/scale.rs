// Copyright 2023 the Druid Authors
// SPDX-License-Identifier: Apache-2.0

//! Resolution scale related helpers.

use crate::kurbo::{Insets, Point, Rect, Size, Vec2};

/// The PPI assumed when the screen reports a nonsensical physical size.
pub const DEFAULT_PPI: f64 = 96.0;

/// Coordinate scaling between pixels and display points.
///
/// ## Pixels and Display Points
///
/// A pixel (**px**) represents the smallest controllable area of color on the screen.
/// A display point (**dp**) is a resolution independent logical unit.
/// One pixel is equal to one display point when the pixel ratio is `1.0`.
///
/// On X11 the ratio is uniform, so both axes always carry the same factor. The axes are kept
/// separate so that conversions read the same as on every other backend.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Scale {
    /// The scale factor on the x axis.
    x: f64,
    /// The scale factor on the y axis.
    y: f64,
}

/// The `Scalable` trait describes how coordinates should be translated
/// from display points into pixels and vice versa using a [`Scale`].
pub trait Scalable {
    /// Converts the scalable item from display points into pixels.
    fn to_px(&self, scale: Scale) -> Self;

    /// Converts the scalable item from pixels into display points.
    fn to_dp(&self, scale: Scale) -> Self;
}

impl Default for Scale {
    fn default() -> Scale {
        Scale { x: 1.0, y: 1.0 }
    }
}

impl Scale {
    /// Create a new `Scale` based on the specified axis factors.
    pub fn new(x: f64, y: f64) -> Scale {
        Scale { x, y }
    }

    /// Create a uniform `Scale` from a pixel ratio.
    pub fn uniform(ratio: f64) -> Scale {
        Scale { x: ratio, y: ratio }
    }

    /// Picks the pixel ratio closest to the given screen density.
    ///
    /// Densities up to 96 PPI map to `1.0`. From 192 PPI upwards only whole ratios are
    /// used, which avoids sub-pixel rendering on high density screens. In between the ratio
    /// moves in steps of one sixth.
    pub fn from_ppi(ppi: f64) -> Scale {
        let steps = (ppi / 16.0).round();
        let ratio = if steps <= 6.0 {
            1.0
        } else if steps >= 12.0 {
            (steps / 6.0).floor()
        } else {
            steps / 6.0
        };
        Scale::uniform(ratio)
    }

    /// Returns the x axis scale factor.
    #[inline]
    pub fn x(self) -> f64 {
        self.x
    }

    /// Returns the y axis scale factor.
    #[inline]
    pub fn y(self) -> f64 {
        self.y
    }

    /// Converts from pixels into display points, using the x axis scale factor.
    #[inline]
    pub fn px_to_dp_x<T: Into<f64>>(self, x: T) -> f64 {
        x.into() / self.x
    }

    /// Converts from pixels into display points, using the y axis scale factor.
    #[inline]
    pub fn px_to_dp_y<T: Into<f64>>(self, y: T) -> f64 {
        y.into() / self.y
    }
}

/// Physical screen density, falling back to [`DEFAULT_PPI`] when the server reports a
/// width under 24mm (which no real monitor has).
pub fn screen_ppi(width_px: u16, width_mm: u16) -> f64 {
    if width_mm < 24 {
        DEFAULT_PPI
    } else {
        25.4 * f64::from(width_px) / f64::from(width_mm)
    }
}

impl Scalable for Vec2 {
    #[inline]
    fn to_px(&self, scale: Scale) -> Vec2 {
        Vec2::new(self.x * scale.x, self.y * scale.y)
    }

    #[inline]
    fn to_dp(&self, scale: Scale) -> Vec2 {
        Vec2::new(self.x / scale.x, self.y / scale.y)
    }
}

impl Scalable for Point {
    #[inline]
    fn to_px(&self, scale: Scale) -> Point {
        Point::new(self.x * scale.x, self.y * scale.y)
    }

    #[inline]
    fn to_dp(&self, scale: Scale) -> Point {
        Point::new(self.x / scale.x, self.y / scale.y)
    }
}

impl Scalable for Size {
    #[inline]
    fn to_px(&self, scale: Scale) -> Size {
        Size::new(self.width * scale.x, self.height * scale.y)
    }

    #[inline]
    fn to_dp(&self, scale: Scale) -> Size {
        Size::new(self.width / scale.x, self.height / scale.y)
    }
}

impl Scalable for Rect {
    #[inline]
    fn to_px(&self, scale: Scale) -> Rect {
        Rect::new(
            self.x0 * scale.x,
            self.y0 * scale.y,
            self.x1 * scale.x,
            self.y1 * scale.y,
        )
    }

    #[inline]
    fn to_dp(&self, scale: Scale) -> Rect {
        Rect::new(
            self.x0 / scale.x,
            self.y0 / scale.y,
            self.x1 / scale.x,
            self.y1 / scale.y,
        )
    }
}

impl Scalable for Insets {
    #[inline]
    fn to_px(&self, scale: Scale) -> Insets {
        Insets::new(
            self.x0 * scale.x,
            self.y0 * scale.y,
            self.x1 * scale.x,
            self.y1 * scale.y,
        )
    }

    #[inline]
    fn to_dp(&self, scale: Scale) -> Insets {
        Insets::new(
            self.x0 / scale.x,
            self.y0 / scale.y,
            self.x1 / scale.x,
            self.y1 / scale.y,
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn ratio_from_ppi() {
        assert_eq!(Scale::from_ppi(72.0), Scale::uniform(1.0));
        assert_eq!(Scale::from_ppi(96.0), Scale::uniform(1.0));
        // round(120 / 16) = 8 sixths
        assert_eq!(Scale::from_ppi(120.0), Scale::uniform(8.0 / 6.0));
        assert_eq!(Scale::from_ppi(144.0), Scale::uniform(1.5));
        assert_eq!(Scale::from_ppi(192.0), Scale::uniform(2.0));
        // round(200 / 16) = 13, whole steps only
        assert_eq!(Scale::from_ppi(200.0), Scale::uniform(2.0));
        assert_eq!(Scale::from_ppi(288.0), Scale::uniform(3.0));
    }

    #[test]
    fn tiny_physical_size_uses_default_ppi() {
        assert_eq!(screen_ppi(1920, 0), DEFAULT_PPI);
        assert_eq!(screen_ppi(1920, 23), DEFAULT_PPI);
        let ppi = screen_ppi(2540, 254);
        assert!((ppi - 254.0).abs() < 1e-9);
    }
}
