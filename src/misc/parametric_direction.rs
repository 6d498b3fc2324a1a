use std::fmt;

/// One of the three parametric directions of a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParametricDirection {
    U,
    V,
    W,
}

impl ParametricDirection {
    /// All directions in storage order
    pub const ALL: [ParametricDirection; 3] = [Self::U, Self::V, Self::W];

    /// Axis index (u = 0, v = 1, w = 2)
    pub fn index(&self) -> usize {
        match self {
            Self::U => 0,
            Self::V => 1,
            Self::W => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The two remaining directions in storage order
    pub fn others(&self) -> [ParametricDirection; 2] {
        match self {
            Self::U => [Self::V, Self::W],
            Self::V => [Self::U, Self::W],
            Self::W => [Self::U, Self::V],
        }
    }
}

impl fmt::Display for ParametricDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::U => "u",
            Self::V => "v",
            Self::W => "w",
        };
        f.write_str(name)
    }
}
