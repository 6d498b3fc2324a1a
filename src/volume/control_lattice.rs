use std::ops::Index;

use nalgebra::{convert, Point3, Vector3};
use simba::scalar::SupersetOf;

use crate::{
    bounding_box::{BoundingBox, BoundingBox3D},
    error::{Result, VolumeError},
    misc::FloatingPoint,
};

use super::flat_index;

/// Control points of a tensor-product volume
///
/// A `nu × nv × nw` grid of 3D points stored with `w` varying fastest.
/// The shape is fixed at construction.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ControlLattice<T: FloatingPoint> {
    shape: [usize; 3],
    points: Vec<Point3<T>>,
}

impl<T: FloatingPoint> ControlLattice<T> {
    /// Create a lattice from points stored with `w` varying fastest
    pub fn try_new(shape: [usize; 3], points: Vec<Point3<T>>) -> Result<Self> {
        if shape.iter().any(|n| *n == 0) {
            return Err(VolumeError::InvalidShape(format!(
                "lattice shape {shape:?} has an empty direction"
            )));
        }
        let expected = shape.iter().product::<usize>();
        if points.len() != expected {
            return Err(VolumeError::InvalidShape(format!(
                "lattice shape {shape:?} needs {expected} points, got {}",
                points.len()
            )));
        }
        Ok(Self { shape, points })
    }

    /// Create a lattice by calling `f(i, j, k)` for every control point
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

    /// Number of control points in u, v and w
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Bounds-checked access to the control point at `(i, j, k)`
    pub fn get(&self, i: usize, j: usize, k: usize) -> Option<&Point3<T>> {
        self.in_bounds(i, j, k)
            .then(|| &self.points[flat_index(self.shape, [i, j, k])])
    }

    /// Bounds-checked mutable access to the control point at `(i, j, k)`
    pub fn get_mut(&mut self, i: usize, j: usize, k: usize) -> Option<&mut Point3<T>> {
        if self.in_bounds(i, j, k) {
            let index = flat_index(self.shape, [i, j, k]);
            Some(&mut self.points[index])
        } else {
            None
        }
    }

    /// Control points with `w` varying fastest
    pub fn as_slice(&self) -> &[Point3<T>] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point3<T>> {
        self.points.iter()
    }

    /// Axis-aligned box enclosing every control point
    pub fn bounding_box(&self) -> BoundingBox3D<T> {
        BoundingBox::new_with_points(self.points.iter().cloned())
            .unwrap_or_else(|| BoundingBox::new(Vector3::zeros(), Vector3::zeros()))
    }

    /// Cast the control points to another floating point type
    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> ControlLattice<F> {
        ControlLattice {
            shape: self.shape,
            points: self
                .points
                .iter()
                .map(|p| Point3::new(convert(p.x), convert(p.y), convert(p.z)))
                .collect(),
        }
    }

    fn in_bounds(&self, i: usize, j: usize, k: usize) -> bool {
        i < self.shape[0] && j < self.shape[1] && k < self.shape[2]
    }
}

impl<T: FloatingPoint> Index<[usize; 3]> for ControlLattice<T> {
    type Output = Point3<T>;
    fn index(&self, index: [usize; 3]) -> &Self::Output {
        let [i, j, k] = index;
        assert!(
            self.in_bounds(i, j, k),
            "control point {index:?} out of lattice shape {:?}",
            self.shape
        );
        &self.points[flat_index(self.shape, index)]
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for ControlLattice<T>
where
    T: FloatingPoint + serde::Deserialize<'de>,
{
    /// Deserialize through [`ControlLattice::try_new`] so the shape is checked
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        #[serde(rename = "ControlLattice")]
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
    use nalgebra::{Point3, Vector3};

    use super::ControlLattice;

    #[test]
    fn indexing_and_bounds() {
        let lattice = ControlLattice::try_from_fn([2, 3, 4], |i, j, k| {
            Point3::new(i as f64, j as f64 * 2., k as f64 - 1.)
        })
        .unwrap();
        assert_eq!(lattice.len(), 24);
        assert_eq!(lattice[[1, 2, 3]], Point3::new(1., 4., 2.));
        assert_eq!(lattice.get(1, 0, 2), Some(&Point3::new(1., 0., 1.)));
        assert!(lattice.get(2, 0, 0).is_none());
        assert!(lattice.get(0, 3, 0).is_none());

        let bb = lattice.bounding_box();
        assert_eq!(bb.min(), &Vector3::new(0., 0., -1.));
        assert_eq!(bb.max(), &Vector3::new(1., 4., 2.));
    }

    #[test]
    fn shape_mismatch() {
        assert!(ControlLattice::try_new([2, 2, 2], vec![Point3::<f64>::origin(); 7]).is_err());
        assert!(ControlLattice::try_new([0, 2, 2], Vec::<Point3<f64>>::new()).is_err());
    }

    #[test]
    fn edit_control_point() {
        let mut lattice =
            ControlLattice::try_new([2, 2, 2], vec![Point3::<f64>::origin(); 8]).unwrap();
        if let Some(p) = lattice.get_mut(1, 1, 0) {
            p.z = 3.;
        }
        assert_eq!(lattice[[1, 1, 0]].z, 3.);
        assert!(lattice.get_mut(1, 2, 0).is_none());
    }
}
