pub mod floating_point;
pub mod parametric_direction;

pub use floating_point::*;
pub use parametric_direction::*;
