mod boundary;
mod control_lattice;
mod fit;
mod nurbs_volume;
mod projection;
mod sample_grid;

pub use boundary::*;
pub use control_lattice::*;
pub use fit::*;
pub use nurbs_volume::*;
pub use projection::*;
pub use sample_grid::*;


/// Position of `(i, j, k)` in storage where the last index varies fastest
pub(crate) fn flat_index(shape: [usize; 3], index: [usize; 3]) -> usize {
    (index[0] * shape[1] + index[1]) * shape[2] + index[2]
}
