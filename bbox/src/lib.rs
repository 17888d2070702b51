//! Safe bounding box types and functions.
//!
//! Boxes come in two interchangeable forms. [XYXY] stores the corners
//! `(xmin, ymin, xmax, ymax)` and [CxCyWH] stores the center and extent
//! `(cx, cy, w, h)`. Both guarantee non-negative width and height.

mod common;

pub mod into_xyxy;
pub use into_xyxy::*;

pub use transform::*;
mod transform;

pub use rect::*;
pub mod rect;

pub use xyxy::*;
pub mod xyxy;

pub use cxcywh::*;
pub mod cxcywh;

pub use hw::*;
pub mod hw;

pub use element::*;
pub mod element;

pub use into_hw::*;
pub mod into_hw;

pub mod prelude {
    pub use crate::rect::{Rect, RectFloat, RectNum};
}
