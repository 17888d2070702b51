use crate::{element::Element, rect::Rect, XYXY};

/// Unchecked bounding box in corner form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct XYXY_<T> {
    pub x_min: T,
    pub y_min: T,
    pub x_max: T,
    pub y_max: T,
}

impl<T> TryFrom<XYXY_<T>> for XYXY<T>
where
    T: Element,
{
    type Error = anyhow::Error;

    fn try_from(from: XYXY_<T>) -> Result<Self, Self::Error> {
        Self::try_from(&from)
    }
}

impl<T> TryFrom<&XYXY_<T>> for XYXY<T>
where
    T: Element,
{
    type Error = anyhow::Error;

    fn try_from(from: &XYXY_<T>) -> Result<Self, Self::Error> {
        let XYXY_ {
            x_min,
            y_min,
            x_max,
            y_max,
        } = *from;
        Self::try_from_xyxy([x_min, y_min, x_max, y_max])
    }
}

impl<T> From<XYXY<T>> for XYXY_<T> {
    fn from(from: XYXY<T>) -> Self {
        let XYXY {
            x_min,
            y_min,
            x_max,
            y_max,
        } = from;
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }
}
