//! Boxes tagged with a class, with or without a confidence score.

use bbox::{CxCyWH, Rect, RectNum, Transform, XYXY};
use num_traits::Num;
use std::ops::Mul;

/// A box with a class label, e.g. a ground truth object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label<R, C>
where
    R: Rect,
{
    pub rect: R,
    pub class: C,
}

impl<R, C> Label<R, C>
where
    R: Rect,
    R::Type: Num + PartialOrd,
{
    pub fn is_degenerate(&self) -> bool {
        self.rect.is_degenerate()
    }

    pub fn with_score<S>(self, score: S) -> ScoredLabel<R, C, S> {
        let Self { rect, class } = self;
        ScoredLabel { rect, class, score }
    }
}

/// A box with a class label and a confidence score, e.g. a detection.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredLabel<R, C, S>
where
    R: Rect,
{
    pub rect: R,
    pub class: C,
    pub score: S,
}

impl<R, C, S> ScoredLabel<R, C, S>
where
    R: Rect + Clone,
    C: Copy,
{
    pub fn to_label(&self) -> Label<R, C> {
        Label {
            rect: self.rect.clone(),
            class: self.class,
        }
    }
}

impl<'a, T, C> Mul<&'a Label<XYXY<T>, C>> for &'a Transform<T>
where
    T: Copy + Num + PartialOrd,
    C: Copy,
{
    type Output = Label<XYXY<T>, C>;

    fn mul(self, rhs: &'a Label<XYXY<T>, C>) -> Self::Output {
        Label {
            rect: self * &rhs.rect,
            class: rhs.class,
        }
    }
}

impl<'a, T, C> Mul<&'a Label<CxCyWH<T>, C>> for &'a Transform<T>
where
    T: Copy + Num + PartialOrd,
    C: Copy,
{
    type Output = Label<CxCyWH<T>, C>;

    fn mul(self, rhs: &'a Label<CxCyWH<T>, C>) -> Self::Output {
        Label {
            rect: self * &rhs.rect,
            class: rhs.class,
        }
    }
}

impl<'a, T, C, S> Mul<&'a ScoredLabel<XYXY<T>, C, S>> for &'a Transform<T>
where
    T: Copy + Num + PartialOrd,
    C: Copy,
    S: Copy,
{
    type Output = ScoredLabel<XYXY<T>, C, S>;

    fn mul(self, rhs: &'a ScoredLabel<XYXY<T>, C, S>) -> Self::Output {
        ScoredLabel {
            rect: self * &rhs.rect,
            class: rhs.class,
            score: rhs.score,
        }
    }
}
