//! Class indexing shared by target encoding and inference.

use crate::common::*;
use std::ops::Range;

/// Whether the classifier reserves a logit for background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassLayout {
    /// Logit 0 is background, object label `k` lives at logit `k + 1`.
    WithBackground,
    /// Object label `k` lives at logit `k`. Background has no logit.
    NoBackground,
}

/// The classification target of one default box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassTarget {
    Background,
    Object(usize),
}

impl ClassTarget {
    pub fn is_background(&self) -> bool {
        matches!(self, Self::Background)
    }
}

/// The number of classifier logits together with their layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, CopyGetters)]
pub struct ClassSpace {
    /// The number of logits per default box, background included.
    #[get_copy = "pub"]
    class_nums: usize,
    #[get_copy = "pub"]
    layout: ClassLayout,
}

impl ClassSpace {
    pub fn new(class_nums: usize, layout: ClassLayout) -> Result<Self> {
        let min_class_nums = match layout {
            ClassLayout::WithBackground => 2,
            ClassLayout::NoBackground => 1,
        };
        ensure!(
            class_nums >= min_class_nums,
            "class_nums must be at least {} for the {:?} layout, but get {}",
            min_class_nums,
            layout,
            class_nums
        );
        Ok(Self { class_nums, layout })
    }

    /// The number of object classes, background excluded.
    pub fn num_objects(&self) -> usize {
        match self.layout {
            ClassLayout::WithBackground => self.class_nums - 1,
            ClassLayout::NoBackground => self.class_nums,
        }
    }

    pub fn background_logit(&self) -> Option<usize> {
        match self.layout {
            ClassLayout::WithBackground => Some(0),
            ClassLayout::NoBackground => None,
        }
    }

    /// The logit range holding object classes.
    pub fn object_logits(&self) -> Range<usize> {
        match self.layout {
            ClassLayout::WithBackground => 1..self.class_nums,
            ClassLayout::NoBackground => 0..self.class_nums,
        }
    }

    pub fn logit_of(&self, object: usize) -> Result<usize> {
        ensure!(
            object < self.num_objects(),
            "class label {} is out of range, the model has {} object classes",
            object,
            self.num_objects()
        );
        Ok(match self.layout {
            ClassLayout::WithBackground => object + 1,
            ClassLayout::NoBackground => object,
        })
    }

    pub fn object_of(&self, logit: usize) -> Option<usize> {
        self.object_logits()
            .contains(&logit)
            .then(|| logit - self.object_logits().start)
    }

    /// The logit a target trains, `None` for background without a background logit.
    pub fn target_logit(&self, target: ClassTarget) -> Result<Option<usize>> {
        Ok(match target {
            ClassTarget::Background => self.background_logit(),
            ClassTarget::Object(object) => Some(self.logit_of(object)?),
        })
    }
}
