use nalgebra::{allocator::Allocator, Const, DefaultAllocator, DimName, OPoint, OVector};

use crate::misc::FloatingPoint;

/// A struct representing an axis-aligned bounding box in D space.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundingBox<T: FloatingPoint, D: DimName>
where
    DefaultAllocator: Allocator<D>,
{
    min: OVector<T, D>,
    max: OVector<T, D>,
}

/// 3D bounding box alias
pub type BoundingBox3D<T> = BoundingBox<T, Const<3>>;

impl<T: FloatingPoint, D: DimName> BoundingBox<T, D>
where
    DefaultAllocator: Allocator<D>,
{
    /// Create a new bounding box from two opposite corners in any order.
    pub fn new(a: OVector<T, D>, b: OVector<T, D>) -> Self {
        let mut min = a.clone();
        let mut max = a;
        for i in 0..D::dim() {
            if b[i] < min[i] {
                min[i] = b[i];
            }
            if b[i] > max[i] {
                max[i] = b[i];
            }
        }
        BoundingBox { min, max }
    }

    /// Create a new bounding box from point iterator.
    /// Returns `None` for an empty iterator.
    ///
    /// # Examples
    /// ```
    /// use nalgebra::{Point3, Vector3};
    /// use splinevol::prelude::BoundingBox3D;
    ///
    /// let points = vec![Point3::new(0., 1., 2.), Point3::new(-1., 3., 0.5)];
    /// let bb = BoundingBox3D::new_with_points(points).unwrap();
    /// assert_eq!(bb.min(), &Vector3::new(-1., 1., 0.5));
    /// assert_eq!(bb.max(), &Vector3::new(0., 3., 2.));
    /// ```
    pub fn new_with_points<I: IntoIterator<Item = OPoint<T, D>>>(iter: I) -> Option<Self> {
        let mut iter = iter.into_iter();
        let first = iter.next()?.coords;
        let mut min = first.clone();
        let mut max = first;

        for point in iter {
            for i in 0..D::dim() {
                if point[i] < min[i] {
                    min[i] = point[i];
                }
                if point[i] > max[i] {
                    max[i] = point[i];
                }
            }
        }

        Some(Self { min, max })
    }

    pub fn min(&self) -> &OVector<T, D> {
        &self.min
    }

    pub fn max(&self) -> &OVector<T, D> {
        &self.max
    }

    pub fn center(&self) -> OVector<T, D> {
        (&self.min + &self.max) / T::from_usize(2).unwrap()
    }

    pub fn size(&self) -> OVector<T, D> {
        &self.max - &self.min
    }

    /// Check if the point lies inside the box, inflated by `tolerance` on every side.
    pub fn contains(&self, point: &OPoint<T, D>, tolerance: T) -> bool {
        (0..D::dim()).all(|i| {
            point[i] >= self.min[i] - tolerance && point[i] <= self.max[i] + tolerance
        })
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{Point3, Vector3};

    use super::BoundingBox3D;

    #[test]
    fn corners_in_any_order() {
        let bb = BoundingBox3D::new(Vector3::new(1., -1., 2.), Vector3::new(-1., 1., 0.));
        assert_eq!(bb.min(), &Vector3::new(-1., -1., 0.));
        assert_eq!(bb.max(), &Vector3::new(1., 1., 2.));
        assert_eq!(bb.center(), Vector3::new(0., 0., 1.));
        assert_eq!(bb.size(), Vector3::new(2., 2., 2.));
    }

    #[test]
    fn contains_with_tolerance() {
        let bb = BoundingBox3D::new(Vector3::zeros(), Vector3::from_element(1.));
        assert!(bb.contains(&Point3::new(0.5, 0.5, 0.5), 0.));
        assert!(!bb.contains(&Point3::new(1.05, 0.5, 0.5), 0.));
        assert!(bb.contains(&Point3::new(1.05, 0.5, 0.5), 0.1));
        assert!(BoundingBox3D::<f64>::new_with_points(vec![]).is_none());
    }
}
