use std::ops::Index;

use nalgebra::{convert, Point3};
use simba::scalar::SupersetOf;

use crate::{
    error::{Result, VolumeError},
    misc::{FloatingPoint, ParametricDirection},
};

use super::flat_index;

/// Rectilinear grid of sampled 3D points a volume is fitted to
///
/// `niu × njv × nkw` samples stored with `k` varying fastest. Every direction
/// holds at least two samples.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SampleGrid<T: FloatingPoint> {
    shape: [usize; 3],
    points: Vec<Point3<T>>,
}

impl<T: FloatingPoint> SampleGrid<T> {
    /// Create a grid from points stored with `k` varying fastest
    pub fn try_new(shape: [usize; 3], points: Vec<Point3<T>>) -> Result<Self> {
        if let Some(dir) = ParametricDirection::ALL
            .iter()
            .find(|d| shape[d.index()] < 2)
        {
            return Err(VolumeError::DegenerateInput(format!(
                "sample grid needs at least 2 samples in {dir}, got {}",
                shape[dir.index()]
            )));
        }
        let expected = shape.iter().product::<usize>();
        if points.len() != expected {
            return Err(VolumeError::InvalidShape(format!(
                "sample grid shape {shape:?} needs {expected} points, got {}",
                points.len()
            )));
        }
        Ok(Self { shape, points })
    }

    /// Create a grid by calling `f(i, j, k)` for every sample
    pub fn try_from_fn<F>(shape: [usize; 3], mut f: F) -> Result<Self>
    where
        F: FnMut(usize, usize, usize) -> Point3<T>,
    {
        let mut points = Vec::with_capacity(shape.iter().product());
        for i in 0..shape[0] {
            for j in 0..shape[1] {
                for k in 0..shape[2] {
                    points.push(f(i, j, k));
                }
            }
        }
        Self::try_new(shape, points)
    }

    /// Create a grid from nested `[i][j][k]` vectors
    pub fn try_from_nested(samples: Vec<Vec<Vec<Point3<T>>>>) -> Result<Self> {
        let ni = samples.len();
        let nj = samples.first().map(|s| s.len()).unwrap_or(0);
        let nk = samples
            .first()
            .and_then(|s| s.first())
            .map(|s| s.len())
            .unwrap_or(0);
        if samples
            .iter()
            .any(|plane| plane.len() != nj || plane.iter().any(|row| row.len() != nk))
        {
            return Err(VolumeError::InvalidShape(
                "nested samples are not rectilinear".to_string(),
            ));
        }
        let points = samples.into_iter().flatten().flatten().collect();
        Self::try_new([ni, nj, nk], points)
    }

    /// Number of samples in u, v and w
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Bounds-checked access to the sample at `(i, j, k)`
    pub fn get(&self, i: usize, j: usize, k: usize) -> Option<&Point3<T>> {
        (i < self.shape[0] && j < self.shape[1] && k < self.shape[2])
            .then(|| &self.points[flat_index(self.shape, [i, j, k])])
    }

    /// Samples with `k` varying fastest
    pub fn as_slice(&self) -> &[Point3<T>] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point3<T>> {
        self.points.iter()
    }

    /// Cast the samples to another floating point type
    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> SampleGrid<F> {
        SampleGrid {
            shape: self.shape,
            points: self
                .points
                .iter()
                .map(|p| Point3::new(convert(p.x), convert(p.y), convert(p.z)))
                .collect(),
        }
    }

    /// Samples along `direction` with the two other indices fixed to `fixed`
    /// (given in u, v, w order of the remaining directions)
    pub fn line(&self, direction: ParametricDirection, fixed: [usize; 2]) -> Vec<Point3<T>> {
        let [a, b] = direction.others();
        (0..self.shape[direction.index()])
            .map(|n| {
                let mut index = [0; 3];
                index[direction.index()] = n;
                index[a.index()] = fixed[0];
                index[b.index()] = fixed[1];
                self.points[flat_index(self.shape, index)]
            })
            .collect()
    }

    /// Every grid line running along `direction`
    pub fn lines(
        &self,
        direction: ParametricDirection,
    ) -> impl Iterator<Item = Vec<Point3<T>>> + '_ {
        let [a, b] = direction.others();
        let (na, nb) = (self.shape[a.index()], self.shape[b.index()]);
        (0..na).flat_map(move |i| (0..nb).map(move |j| self.line(direction, [i, j])))
    }
}

impl<T: FloatingPoint> Index<[usize; 3]> for SampleGrid<T> {
    type Output = Point3<T>;
    fn index(&self, index: [usize; 3]) -> &Self::Output {
        let [i, j, k] = index;
        self.get(i, j, k).unwrap_or_else(|| {
            panic!(
                "sample {index:?} out of grid shape {:?}",
                self.shape
            )
        })
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for SampleGrid<T>
where
    T: FloatingPoint + serde::Deserialize<'de>,
{
    /// Deserialize through [`SampleGrid::try_new`] so the shape is checked
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        #[serde(rename = "SampleGrid")]
        struct Fields<T: FloatingPoint> {
            shape: [usize; 3],
            points: Vec<Point3<T>>,
        }

        let Fields { shape, points } = Fields::<T>::deserialize(deserializer)?;
        Self::try_new(shape, points).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Point3;

    use super::SampleGrid;
    use crate::{error::VolumeError, misc::ParametricDirection};

    fn grid() -> SampleGrid<f64> {
        SampleGrid::try_from_fn([3, 4, 2], |i, j, k| {
            Point3::new(i as f64, j as f64 * 10., k as f64 * 100.)
        })
        .unwrap()
    }

    #[test]
    fn lines_along_each_direction() {
        let grid = grid();
        let line = grid.line(ParametricDirection::V, [2, 1]);
        assert_eq!(line.len(), 4);
        assert_eq!(line[3], Point3::new(2., 30., 100.));
        assert_eq!(grid.lines(ParametricDirection::U).count(), 8);
        assert_eq!(grid.lines(ParametricDirection::W).count(), 12);
        let line = grid.line(ParametricDirection::W, [1, 3]);
        assert_eq!(line, vec![Point3::new(1., 30., 0.), Point3::new(1., 30., 100.)]);
    }

    #[test]
    fn nested_round_trip() {
        let grid = grid();
        let nested: Vec<Vec<Vec<Point3<f64>>>> = (0..3)
            .map(|i| {
                (0..4)
                    .map(|j| (0..2).map(|k| grid[[i, j, k]]).collect())
                    .collect()
            })
            .collect();
        assert_eq!(SampleGrid::try_from_nested(nested).unwrap(), grid);
    }

    #[test]
    fn rejects_thin_or_ragged_grids() {
        assert!(matches!(
            SampleGrid::try_new([1, 3, 3], vec![Point3::<f64>::origin(); 9]),
            Err(VolumeError::DegenerateInput(_))
        ));
        assert!(matches!(
            SampleGrid::try_new([2, 2, 2], vec![Point3::<f64>::origin(); 9]),
            Err(VolumeError::InvalidShape(_))
        ));
        let ragged = vec![
            vec![vec![Point3::<f64>::origin(); 2]; 2],
            vec![vec![Point3::<f64>::origin(); 3]; 2],
        ];
        assert!(matches!(
            SampleGrid::try_from_nested(ragged),
            Err(VolumeError::InvalidShape(_))
        ));
    }
}
