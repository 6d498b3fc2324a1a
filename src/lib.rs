#![allow(clippy::needless_range_loop)]

mod bounding_box;
mod closest_parameter;
mod error;
mod knot;
mod misc;
mod volume;

pub mod prelude {
    pub use crate::bounding_box::*;
    pub use crate::error::{Result as VolumeResult, VolumeError};
    pub use crate::knot::*;
    pub use crate::misc::*;
    pub use crate::volume::*;
}
