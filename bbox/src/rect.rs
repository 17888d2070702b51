use super::{CxCyWH, XYXY};
use crate::common::*;

/// The generic rectangle.
pub trait Rect {
    type Type;

    fn x_min(&self) -> Self::Type;
    fn y_min(&self) -> Self::Type;
    fn x_max(&self) -> Self::Type;
    fn y_max(&self) -> Self::Type;
    fn cx(&self) -> Self::Type;
    fn cy(&self) -> Self::Type;
    fn w(&self) -> Self::Type;
    fn h(&self) -> Self::Type;

    fn try_from_xyxy(xyxy: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;

    fn try_from_xywh(xywh: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;

    fn try_from_cxcywh(cxcywh: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;
}

pub trait RectNum: Rect
where
    Self::Type: Num + PartialOrd,
{
    fn from_xyxy(xyxy: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_xyxy(xyxy).unwrap()
    }

    fn from_xywh(xywh: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_xywh(xywh).unwrap()
    }

    fn from_cxcywh(cxcywh: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_cxcywh(cxcywh).unwrap()
    }

    fn xyxy(&self) -> [Self::Type; 4] {
        [self.x_min(), self.y_min(), self.x_max(), self.y_max()]
    }

    fn cxcywh(&self) -> [Self::Type; 4] {
        [self.cx(), self.cy(), self.w(), self.h()]
    }

    fn wh(&self) -> [Self::Type; 2] {
        [self.w(), self.h()]
    }

    fn to_cxcywh(&self) -> CxCyWH<Self::Type> {
        CxCyWH {
            cx: self.cx(),
            cy: self.cy(),
            w: self.w(),
            h: self.h(),
        }
    }

    fn to_xyxy(&self) -> XYXY<Self::Type> {
        XYXY {
            x_min: self.x_min(),
            y_min: self.y_min(),
            x_max: self.x_max(),
            y_max: self.y_max(),
        }
    }

    fn area(&self) -> <Self::Type as Mul<Self::Type>>::Output
    where
        Self::Type: Mul<Self::Type>,
    {
        self.w() * self.h()
    }

    /// Returns true if the box has zero width or zero height.
    fn is_degenerate(&self) -> bool {
        let zero = Self::Type::zero();
        self.w() <= zero || self.h() <= zero
    }
}

pub trait RectFloat: RectNum
where
    Self::Type: Float,
{
    /// Compute the smallest box enclosing both boxes.
    fn closure_with<R>(&self, other: &R) -> XYXY<Self::Type>
    where
        R: Rect<Type = Self::Type>,
    {
        XYXY {
            x_min: self.x_min().min(other.x_min()),
            y_min: self.y_min().min(other.y_min()),
            x_max: self.x_max().max(other.x_max()),
            y_max: self.y_max().max(other.y_max()),
        }
    }

    fn intersect_with<R>(&self, other: &R) -> Option<XYXY<Self::Type>>
    where
        R: Rect<Type = Self::Type>,
    {
        let x_min = self.x_min().max(other.x_min());
        let y_min = self.y_min().max(other.y_min());
        let x_max = self.x_max().min(other.x_max());
        let y_max = self.y_max().min(other.y_max());
        (x_max > x_min && y_max > y_min).then(|| XYXY {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }

    fn intersection_area_with<R>(&self, other: &R) -> Self::Type
    where
        R: Rect<Type = Self::Type>,
    {
        self.intersect_with(other)
            .map(|rect| rect.area())
            .unwrap_or_else(Self::Type::zero)
    }

    /// Intersection over union. Two boxes with an empty union have zero IoU.
    fn iou_with<R>(&self, other: &R) -> Self::Type
    where
        R: Rect<Type = Self::Type>,
    {
        let zero = Self::Type::zero();
        let inter_area = self.intersection_area_with(other);
        let union_area = self.area() + other.area() - inter_area;
        if union_area <= zero {
            return zero;
        }
        inter_area / union_area
    }

    /// Clamp all four corners into `[lower, upper]`.
    fn clamp(&self, lower: Self::Type, upper: Self::Type) -> XYXY<Self::Type> {
        let clip = |value: Self::Type| value.max(lower).min(upper);
        XYXY {
            x_min: clip(self.x_min()),
            y_min: clip(self.y_min()),
            x_max: clip(self.x_max()),
            y_max: clip(self.y_max()),
        }
    }

    /// Clamp all four corners into the unit square.
    fn clamp_unit(&self) -> XYXY<Self::Type> {
        self.clamp(Self::Type::zero(), Self::Type::one())
    }
}

impl<T> RectNum for T
where
    T: Rect,
    T::Type: Num + PartialOrd,
{
}

impl<T> RectFloat for T
where
    T: Rect,
    T::Type: Float,
{
}
