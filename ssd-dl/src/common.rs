pub use anyhow::{ensure, Context as _, Result};
pub use bbox::{prelude::*, CxCyWH, Transform, HW, HW_, XYXY, XYXY_};
pub use getset::{CopyGetters, Getters};
pub use itertools::izip;
pub use label::{Label, ScoredLabel};
pub use log::{debug, info, warn};
pub use ndarray::{
    s, Array1, Array2, Array3, Array4, ArrayView1, ArrayView2, ArrayView3, ArrayView4, Axis,
};
pub use noisy_float::prelude::*;
pub use once_cell::sync::Lazy;
pub use rayon::prelude::*;
pub use semver::{Version, VersionReq};
pub use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
pub use std::{cmp::Ordering, collections::HashSet, fs, iter, path::Path};
