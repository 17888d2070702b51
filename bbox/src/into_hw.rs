use crate::{common::*, HW};

/// Unchecked size in height and width.
///
/// Built from raw dimensions such as image shapes, then validated into [HW].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HW_<T> {
    pub h: T,
    pub w: T,
}

impl<T> From<HW<T>> for HW_<T>
where
    T: Copy + Num + PartialOrd,
{
    fn from(from: HW<T>) -> Self {
        Self {
            h: from.h(),
            w: from.w(),
        }
    }
}

impl<T> TryFrom<HW_<T>> for HW<T>
where
    T: Copy + Num + PartialOrd + std::fmt::Debug,
{
    type Error = anyhow::Error;

    fn try_from(from: HW_<T>) -> Result<Self, Self::Error> {
        let HW_ { h, w } = from;
        let size = HW::try_from_hw([h, w])
            .map_err(|err| err.context(format!("invalid size {:?}x{:?}", h, w)))?;
        Ok(size)
    }
}
