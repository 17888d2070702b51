use super::{CxCyWH, Rect, XYXY};
use crate::{common::*, RectNum, HW};

/// Axis-aligned affine transform: `x' = x * sx + tx`, `y' = y * sy + ty`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Transform<T> {
    pub sx: T,
    pub sy: T,
    pub tx: T,
    pub ty: T,
}

impl<T> Transform<T>
where
    T: Copy + Num + PartialOrd,
{
    /// Build the transform mapping `src` onto `tgt`.
    pub fn try_from_rects<R>(src: &R, tgt: &R) -> Result<Self>
    where
        R: Rect<Type = T>,
    {
        ensure!(
            !src.is_degenerate(),
            "the source rectangle must have positive width and height"
        );

        let sx = tgt.w() / src.w();
        let sy = tgt.h() / src.h();
        let tx = tgt.x_min() - src.x_min() * sx;
        let ty = tgt.y_min() - src.y_min() * sy;

        Ok(Self { sx, sy, tx, ty })
    }

    /// Build the transform stretching a `src_size` canvas onto a `tgt_size` canvas.
    pub fn try_from_sizes_exact(src_size: &HW<T>, tgt_size: &HW<T>) -> Result<Self> {
        let zero = T::zero();
        let src = XYXY::try_from_xywh([zero, zero, src_size.w(), src_size.h()])?;
        let tgt = XYXY::try_from_xywh([zero, zero, tgt_size.w(), tgt_size.h()])?;
        Self::try_from_rects(&src, &tgt)
    }

    /// Build the transform from normalized `[0, 1]` coordinates to a canvas of `size`.
    pub fn try_from_unit_to(size: &HW<T>) -> Result<Self> {
        Self::try_from_sizes_exact(&HW::unit(), size)
    }
}

impl<T> Transform<T>
where
    T: Copy + Num + Neg<Output = T>,
{
    pub fn inverse(&self) -> Self {
        let sx = T::one() / self.sx;
        let sy = T::one() / self.sy;
        let tx = -self.tx / self.sx;
        let ty = -self.ty / self.sy;

        Self { sx, sy, tx, ty }
    }
}

impl<T> Transform<T> {
    pub fn try_cast<V>(self) -> Option<Transform<V>>
    where
        T: ToPrimitive,
        V: NumCast,
    {
        Some(Transform {
            sx: V::from(self.sx)?,
            sy: V::from(self.sy)?,
            tx: V::from(self.tx)?,
            ty: V::from(self.ty)?,
        })
    }

    pub fn cast<V>(self) -> Transform<V>
    where
        T: ToPrimitive,
        V: NumCast,
    {
        self.try_cast().unwrap()
    }
}

impl<T> Mul<&XYXY<T>> for &Transform<T>
where
    T: Copy + Num,
{
    type Output = XYXY<T>;

    fn mul(self, rhs: &XYXY<T>) -> Self::Output {
        rhs.transform(self)
    }
}

impl<T> Mul<&CxCyWH<T>> for &Transform<T>
where
    T: Copy + Num,
{
    type Output = CxCyWH<T>;

    fn mul(self, rhs: &CxCyWH<T>) -> Self::Output {
        rhs.transform(self)
    }
}

impl<T> Mul<&Transform<T>> for &Transform<T>
where
    T: Copy + Num,
{
    type Output = Transform<T>;

    fn mul(self, rhs: &Transform<T>) -> Self::Output {
        Transform {
            sx: self.sx * rhs.sx,
            sy: self.sy * rhs.sy,
            tx: rhs.tx * self.sx + self.tx,
            ty: rhs.ty * self.sy + self.ty,
        }
    }
}
