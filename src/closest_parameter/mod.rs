pub mod volume_closest_parameter_newton;
pub mod volume_closest_parameter_problem;
pub use volume_closest_parameter_newton::*;
pub use volume_closest_parameter_problem::*;
