use crate::common::*;

/// The scalar type of box coordinates.
pub trait Element: Float {}

impl<T> Element for T where T: Float {}
