use nalgebra::{Point3, Vector3};

use crate::{
    error::{Result, VolumeError},
    misc::{FloatingPoint, ParametricDirection},
};

use super::{nurbs_volume::check_parameter, NurbsVolume};

/// Which end of a parametric direction a boundary sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundarySide {
    /// Parameter 0, first sample
    Start,
    /// Parameter 1, last sample
    End,
}

impl BoundarySide {
    pub fn parameter<T: FloatingPoint>(&self) -> T {
        match self {
            BoundarySide::Start => T::zero(),
            BoundarySide::End => T::one(),
        }
    }

    /// Index of the boundary sample among `count` samples
    pub fn sample_index(&self, count: usize) -> usize {
        match self {
            BoundarySide::Start => 0,
            BoundarySide::End => count - 1,
        }
    }
}

/// Fixed side per direction in u, v, w order, `None` where the parameter varies
pub type BoundaryStencil = [Option<BoundarySide>; 3];

pub const CORNER_COUNT: usize = 8;
pub const EDGE_COUNT: usize = 12;
pub const FACE_COUNT: usize = 6;

const S: Option<BoundarySide> = Some(BoundarySide::Start);
const E: Option<BoundarySide> = Some(BoundarySide::End);

const EDGES: [BoundaryStencil; EDGE_COUNT] = [
    [None, S, S],
    [None, E, S],
    [S, None, S],
    [E, None, S],
    [None, S, E],
    [None, E, E],
    [S, None, E],
    [E, None, E],
    [S, S, None],
    [E, S, None],
    [S, E, None],
    [E, E, None],
];

const FACES: [BoundaryStencil; FACE_COUNT] = [
    [None, None, S],
    [None, None, E],
    [None, S, None],
    [None, E, None],
    [S, None, None],
    [E, None, None],
];

/// Sides of corner `index`: bit 0 selects u, bit 1 v and bit 2 w
///
/// # Example
/// ```
/// use splinevol::prelude::*;
/// use BoundarySide::*;
/// assert_eq!(corner_stencil(0).unwrap(), [Start, Start, Start]);
/// assert_eq!(corner_stencil(6).unwrap(), [Start, End, End]);
/// assert!(corner_stencil(8).is_err());
/// ```
pub fn corner_stencil(index: usize) -> Result<[BoundarySide; 3]> {
    check_index("corner", index, CORNER_COUNT)?;
    Ok([0, 1, 2].map(|bit| {
        if index & (1 << bit) == 0 {
            BoundarySide::Start
        } else {
            BoundarySide::End
        }
    }))
}

/// Fixed sides of edge `index`
///
/// | edge | u | v | w |
/// |------|---|---|---|
/// | 0 | s | 0 | 0 |
/// | 1 | s | 1 | 0 |
/// | 2 | 0 | s | 0 |
/// | 3 | 1 | s | 0 |
/// | 4 | s | 0 | 1 |
/// | 5 | s | 1 | 1 |
/// | 6 | 0 | s | 1 |
/// | 7 | 1 | s | 1 |
/// | 8 | 0 | 0 | s |
/// | 9 | 1 | 0 | s |
/// | 10 | 0 | 1 | s |
/// | 11 | 1 | 1 | s |
pub fn edge_stencil(index: usize) -> Result<BoundaryStencil> {
    check_index("edge", index, EDGE_COUNT)?;
    Ok(EDGES[index])
}

/// Fixed side of face `index`: 0 w = 0, 1 w = 1, 2 v = 0, 3 v = 1, 4 u = 0, 5 u = 1
pub fn face_stencil(index: usize) -> Result<BoundaryStencil> {
    check_index("face", index, FACE_COUNT)?;
    Ok(FACES[index])
}

/// Direction along which edge `index` runs
pub fn edge_direction(index: usize) -> Result<ParametricDirection> {
    let stencil = edge_stencil(index)?;
    Ok(varying(&stencil)[0])
}

/// Corners at `s = 0` and `s = 1` of edge `index`
///
/// # Example
/// ```
/// use splinevol::prelude::*;
/// assert_eq!(edge_corners(0).unwrap(), [0, 1]);
/// assert_eq!(edge_corners(6).unwrap(), [4, 6]);
/// assert_eq!(edge_corners(11).unwrap(), [3, 7]);
/// ```
pub fn edge_corners(index: usize) -> Result<[usize; 2]> {
    let stencil = edge_stencil(index)?;
    Ok([BoundarySide::Start, BoundarySide::End].map(|side| {
        stencil
            .iter()
            .enumerate()
            .filter(|(_, s)| s.unwrap_or(side) == BoundarySide::End)
            .fold(0, |corner, (bit, _)| corner | (1 << bit))
    }))
}

fn check_index(kind: &'static str, index: usize, count: usize) -> Result<()> {
    if index < count {
        Ok(())
    } else {
        Err(VolumeError::InvalidIndex { kind, index, count })
    }
}

/// Varying directions of a stencil in u, v, w order
fn varying(stencil: &BoundaryStencil) -> Vec<ParametricDirection> {
    ParametricDirection::ALL
        .into_iter()
        .filter(|d| stencil[d.index()].is_none())
        .collect()
}

/// Indices of the middle sample, or of the middle pair for even counts
fn middle_indices(count: usize) -> Vec<usize> {
    if count % 2 == 1 {
        vec![count / 2]
    } else {
        vec![count / 2 - 1, count / 2]
    }
}

fn average<T: FloatingPoint>(points: &[Point3<T>]) -> Point3<T> {
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Point3::from(sum / T::from_usize(points.len()).unwrap())
}

impl<T: FloatingPoint> NurbsVolume<T> {
    /// Evaluate the fitted volume at corner `index`
    pub fn try_corner_value(&self, index: usize) -> Result<Point3<T>> {
        let sides = corner_stencil(index)?;
        Ok(self.point(sides.map(|s| s.parameter())))
    }

    /// Sample of the original grid at corner `index`
    pub fn try_original_corner_value(&self, index: usize) -> Result<Point3<T>> {
        let sides = corner_stencil(index)?;
        let samples = self.try_original_data()?.samples();
        let shape = samples.shape();
        Ok(samples[[0, 1, 2].map(|d| sides[d].sample_index(shape[d]))])
    }

    /// Evaluate the fitted volume on edge `index` at relative position `s` in `[0, 1]`
    pub fn try_edge_value(&self, index: usize, s: T) -> Result<Point3<T>> {
        let stencil = edge_stencil(index)?;
        let direction = varying(&stencil)[0];
        let s = check_parameter(direction, s)?;
        Ok(self.point(stencil.map(|side| side.map_or(s, |side| side.parameter()))))
    }

    /// Evaluate the fitted volume halfway along edge `index`
    pub fn try_edge_mid_point(&self, index: usize) -> Result<Point3<T>> {
        self.try_edge_value(index, T::from_f64(0.5).unwrap())
    }

    /// Evaluate the fitted volume on face `index` at relative position `(s, t)`,
    /// `s` along the first varying direction and `t` along the second
    pub fn try_face_value(&self, index: usize, s: T, t: T) -> Result<Point3<T>> {
        let stencil = face_stencil(index)?;
        let dirs = varying(&stencil);
        let mut params = stencil.map(|side| side.map_or(T::zero(), |side| side.parameter()));
        params[dirs[0].index()] = check_parameter(dirs[0], s)?;
        params[dirs[1].index()] = check_parameter(dirs[1], t)?;
        Ok(self.point(params))
    }

    /// Evaluate the fitted volume at the center of face `index`
    pub fn try_face_mid_point(&self, index: usize) -> Result<Point3<T>> {
        let half = T::from_f64(0.5).unwrap();
        self.try_face_value(index, half, half)
    }

    /// Original samples along edge `index`, ordered by increasing `s`
    pub fn try_original_edge_values(&self, index: usize) -> Result<Vec<Point3<T>>> {
        let stencil = edge_stencil(index)?;
        let samples = self.try_original_data()?.samples();
        let shape = samples.shape();
        let direction = varying(&stencil)[0];
        let fixed = direction.others().map(|o| {
            stencil[o.index()]
                .map_or(0, |side| side.sample_index(shape[o.index()]))
        });
        Ok(samples.line(direction, fixed))
    }

    /// Middle original sample of edge `index`, or the average of the middle
    /// pair for an even sample count
    pub fn try_original_edge_mid_point(&self, index: usize) -> Result<Point3<T>> {
        let values = self.try_original_edge_values(index)?;
        let middle: Vec<_> = middle_indices(values.len())
            .into_iter()
            .map(|i| values[i])
            .collect();
        Ok(average(&middle))
    }

    /// Original samples on face `index`
    ///
    /// Rows run over the first varying direction (in u, v, w order), columns
    /// over the second.
    pub fn try_original_face_values(&self, index: usize) -> Result<Vec<Vec<Point3<T>>>> {
        let stencil = face_stencil(index)?;
        let samples = self.try_original_data()?.samples();
        let shape = samples.shape();
        let dirs = varying(&stencil);
        let (first, second) = (dirs[0].index(), dirs[1].index());

        let base = [0, 1, 2].map(|d| stencil[d].map_or(0, |side| side.sample_index(shape[d])));

        Ok((0..shape[first])
            .map(|a| {
                (0..shape[second])
                    .map(|b| {
                        let mut index = base;
                        index[first] = a;
                        index[second] = b;
                        samples[index]
                    })
                    .collect()
            })
            .collect())
    }

    /// Middle original sample of face `index`, averaging the middle pair or
    /// quad for even sample counts
    pub fn try_original_face_mid_point(&self, index: usize) -> Result<Point3<T>> {
        let values = self.try_original_face_values(index)?;
        let rows = middle_indices(values.len());
        let cols = middle_indices(values.first().map_or(0, |r| r.len()));
        let middle: Vec<_> = rows
            .iter()
            .flat_map(|r| cols.iter().map(|c| values[*r][*c]))
            .collect();
        Ok(average(&middle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_edge_runs_between_two_adjacent_corners() {
        for e in 0..EDGE_COUNT {
            let [a, b] = edge_corners(e).unwrap();
            let diff = a ^ b;
            assert_eq!(diff.count_ones(), 1, "edge {e}");
            assert_eq!(diff, 1 << edge_direction(e).unwrap().index());
            assert!(a < b);
        }
        // every corner pair differing in one bit is an edge, once
        let mut pairs: Vec<_> = (0..EDGE_COUNT).map(|e| edge_corners(e).unwrap()).collect();
        pairs.sort();
        pairs.dedup();
        assert_eq!(pairs.len(), EDGE_COUNT);
    }

    #[test]
    fn faces_fix_one_direction() {
        for f in 0..FACE_COUNT {
            let stencil = face_stencil(f).unwrap();
            assert_eq!(stencil.iter().filter(|s| s.is_some()).count(), 1);
        }
        assert_eq!(face_stencil(0).unwrap()[2], Some(BoundarySide::Start));
        assert_eq!(face_stencil(3).unwrap()[1], Some(BoundarySide::End));
        assert_eq!(face_stencil(5).unwrap()[0], Some(BoundarySide::End));
    }

    #[test]
    fn out_of_range_indices() {
        assert_eq!(
            corner_stencil(8),
            Err(VolumeError::InvalidIndex {
                kind: "corner",
                index: 8,
                count: 8
            })
        );
        assert!(edge_stencil(12).is_err());
        assert!(face_stencil(6).is_err());
    }

    #[test]
    fn middle_of_odd_and_even_runs() {
        assert_eq!(middle_indices(7), vec![3]);
        assert_eq!(middle_indices(4), vec![1, 2]);
        assert_eq!(middle_indices(2), vec![0, 1]);
    }
}
