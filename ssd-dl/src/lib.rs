//! The box algebra of single shot multibox detectors.
//!
//! The crate generates the default box grid, matches ground truth to it,
//! encodes and decodes box offsets, reorders raw network outputs into the
//! grid order and post-processes class scores into detections.

mod common;
pub mod activation;
pub mod class;
pub mod codec;
pub mod config;
pub mod dbox;
pub mod ground_truth;
pub mod image;
pub mod inference;
pub mod matching;
pub mod model;
pub mod predictor;

pub use bbox;
pub use label;
