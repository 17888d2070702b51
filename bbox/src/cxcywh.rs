use super::{Rect, XYXY};
use crate::{common::*, Transform};

/// Bounding box in center form `(cx, cy, w, h)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CxCyWH<T> {
    pub(crate) cx: T,
    pub(crate) cy: T,
    pub(crate) w: T,
    pub(crate) h: T,
}

impl<T> CxCyWH<T> {
    pub fn try_cast<V>(self) -> Option<CxCyWH<V>>
    where
        T: ToPrimitive,
        V: NumCast,
    {
        Some(CxCyWH {
            cx: V::from(self.cx)?,
            cy: V::from(self.cy)?,
            w: V::from(self.w)?,
            h: V::from(self.h)?,
        })
    }

    pub fn cast<V>(self) -> CxCyWH<V>
    where
        T: ToPrimitive,
        V: NumCast,
    {
        self.try_cast().unwrap()
    }
}

impl<T> CxCyWH<T>
where
    T: Copy + Num,
{
    pub fn transform(&self, transform: &Transform<T>) -> Self {
        CxCyWH {
            cx: self.cx * transform.sx + transform.tx,
            cy: self.cy * transform.sy + transform.ty,
            w: self.w * transform.sx,
            h: self.h * transform.sy,
        }
    }
}

impl<T> Rect for CxCyWH<T>
where
    T: Copy + Num + PartialOrd,
{
    type Type = T;

    fn x_min(&self) -> Self::Type {
        let two = T::one() + T::one();
        self.cx - self.w / two
    }

    fn y_min(&self) -> Self::Type {
        let two = T::one() + T::one();
        self.cy - self.h / two
    }

    fn x_max(&self) -> Self::Type {
        let two = T::one() + T::one();
        self.cx + self.w / two
    }

    fn y_max(&self) -> Self::Type {
        let two = T::one() + T::one();
        self.cy + self.h / two
    }

    fn cx(&self) -> Self::Type {
        self.cx
    }

    fn cy(&self) -> Self::Type {
        self.cy
    }

    fn w(&self) -> Self::Type {
        self.w
    }

    fn h(&self) -> Self::Type {
        self.h
    }

    fn try_from_xyxy(xyxy: [T; 4]) -> Result<Self> {
        let [x_min, y_min, x_max, y_max] = xyxy;
        let zero = T::zero();
        let two = T::one() + T::one();
        let w = x_max - x_min;
        let h = y_max - y_min;
        ensure!(
            w >= zero && h >= zero,
            "box width and height must be non-negative"
        );

        Ok(Self {
            cx: x_min + w / two,
            cy: y_min + h / two,
            w,
            h,
        })
    }

    fn try_from_xywh(xywh: [T; 4]) -> Result<Self> {
        let [x_min, y_min, w, h] = xywh;
        let zero = T::zero();
        let two = T::one() + T::one();
        ensure!(
            w >= zero && h >= zero,
            "box width and height must be non-negative"
        );

        Ok(Self {
            cx: x_min + w / two,
            cy: y_min + h / two,
            w,
            h,
        })
    }

    fn try_from_cxcywh(cxcywh: [T; 4]) -> Result<Self> {
        let [cx, cy, w, h] = cxcywh;
        let zero = T::zero();
        ensure!(
            w >= zero && h >= zero,
            "box width and height must be non-negative"
        );

        Ok(Self { cx, cy, w, h })
    }
}

impl<T> From<XYXY<T>> for CxCyWH<T>
where
    T: Copy + Num,
{
    fn from(from: XYXY<T>) -> Self {
        Self::from(&from)
    }
}

impl<T> From<&XYXY<T>> for CxCyWH<T>
where
    T: Copy + Num,
{
    fn from(from: &XYXY<T>) -> Self {
        let two = T::one() + T::one();
        let XYXY {
            x_min,
            y_min,
            x_max,
            y_max,
        } = *from;
        let w = x_max - x_min;
        let h = y_max - y_min;
        Self {
            cx: x_min + w / two,
            cy: y_min + h / two,
            w,
            h,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RectNum;
    use approx::assert_abs_diff_eq;

    #[test]
    fn center_corner_round_trip() {
        let orig = CxCyWH::from_cxcywh([0.3f32, 0.7, 0.2, 0.5]);
        let back = CxCyWH::from(XYXY::from(&orig));
        for (lhs, rhs) in orig.cxcywh().into_iter().zip(back.cxcywh()) {
            assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-6);
        }
    }

    #[test]
    fn reject_negative_extent() {
        assert!(CxCyWH::try_from_cxcywh([0.5f32, 0.5, -0.1, 0.2]).is_err());
        assert!(CxCyWH::try_from_xyxy([0.5f32, 0.5, 0.4, 0.6]).is_err());
    }

    #[test]
    fn straddling_box_is_representable() {
        let rect = CxCyWH::from_cxcywh([0.05f32, 0.05, 0.3, 0.3]);
        assert!(rect.x_min() < 0.0 && rect.y_min() < 0.0);
    }
}
