use crate::misc::FloatingPoint;

/// A distinct knot value together with the number of times it repeats
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KnotMultiplicity<T> {
    knot: T,
    multiplicity: usize,
}

impl<T: FloatingPoint> KnotMultiplicity<T> {
    pub fn new(knot: T, multiplicity: usize) -> Self {
        Self { knot, multiplicity }
    }

    pub fn knot(&self) -> T {
        self.knot
    }

    pub fn multiplicity(&self) -> usize {
        self.multiplicity
    }

    /// Whether the knot repeats often enough to make the basis discontinuous
    /// (`multiplicity >= order`)
    pub fn breaks_continuity(&self, order: usize) -> bool {
        self.multiplicity >= order
    }

    pub(crate) fn increment_multiplicity(&mut self) {
        self.multiplicity += 1;
    }
}
