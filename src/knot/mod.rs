pub mod basis_functions;
pub mod knot_multiplicity;
pub mod knot_style;
pub mod knot_vector;
pub use basis_functions::*;
pub use knot_multiplicity::*;
pub use knot_style::*;
pub use knot_vector::*;
