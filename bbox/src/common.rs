pub use anyhow::{ensure, Error, Result};
pub use num_traits::{Float, Num, NumCast, One, ToPrimitive, Zero};
pub use std::ops::{Mul, Neg};
