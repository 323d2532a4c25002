//! Device-facing capture abstractions
//!
//! The core drives hardware exclusively through the traits defined here.

pub mod traits;

pub use traits::{DeviceTrackHandle, DeviceTrackSource, Modality, OutputRef};
