use nalgebra::{convert, Point3, Vector3};
use simba::scalar::SupersetOf;

use crate::{
    bounding_box::BoundingBox3D,
    error::{Result, VolumeError},
    knot::{BasisFunctions, KnotVector},
    misc::{FloatingPoint, ParametricDirection},
};

use super::{ControlLattice, SampleGrid, VolumeFitOptions};

/// Tensor-product B-spline volume
///
/// The volume maps the parametric cube `[0, 1]^3` to 3D space through three
/// clamped knot vectors and a lattice of control points. Volumes built by
/// fitting also keep the sampled grid they were fitted to, queryable
/// independently from the fitted shape.
///
/// # Example
/// ```
/// use nalgebra::Point3;
/// use splinevol::prelude::*;
///
/// // trilinear unit cube
/// let lattice = ControlLattice::try_from_fn([2, 2, 2], |i, j, k| {
///     Point3::new(i as f64, j as f64, k as f64)
/// })
/// .unwrap();
/// let knots = KnotVector::try_uniform(2, 2).unwrap();
/// let knots = [knots.clone(), knots.clone(), knots];
/// let volume = NurbsVolume::try_new([2, 2, 2], knots, lattice).unwrap();
///
/// let p = volume.try_point_at(0.25, 0.5, 1.).unwrap();
/// assert!((p - Point3::new(0.25, 0.5, 1.)).norm() < 1e-12);
/// assert!(volume.try_point_at(1.5, 0.5, 0.5).is_err());
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NurbsVolume<T: FloatingPoint> {
    control_points: ControlLattice<T>,
    degrees: [usize; 3],
    knots: [KnotVector<T>; 3],
    original: Option<OriginalData<T>>,
}

/// Sampled grid a volume was fitted to, with the sample parameters and the
/// options of the fit
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OriginalData<T: FloatingPoint> {
    samples: SampleGrid<T>,
    parameters: [Vec<T>; 3],
    options: VolumeFitOptions,
}

impl<T: FloatingPoint> OriginalData<T> {
    pub(crate) fn new(
        samples: SampleGrid<T>,
        parameters: [Vec<T>; 3],
        options: VolumeFitOptions,
    ) -> Self {
        Self {
            samples,
            parameters,
            options,
        }
    }

    pub fn samples(&self) -> &SampleGrid<T> {
        &self.samples
    }

    /// Normalized parameters of the samples along `direction`
    pub fn parameters(&self, direction: ParametricDirection) -> &[T] {
        &self.parameters[direction.index()]
    }

    pub fn options(&self) -> &VolumeFitOptions {
        &self.options
    }

    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> OriginalData<F> {
        OriginalData {
            samples: self.samples.cast(),
            parameters: self
                .parameters
                .clone()
                .map(|params| params.into_iter().map(convert).collect()),
            options: self.options.clone(),
        }
    }
}

impl<T: FloatingPoint> NurbsVolume<T> {
    /// Create a volume from explicit knot vectors and control points
    ///
    /// Each knot vector must be clamped for its order, span `[0, 1]` and hold
    /// `control points + order` knots. The volume carries no original data.
    pub fn try_new(
        orders: [usize; 3],
        knots: [KnotVector<T>; 3],
        control_points: ControlLattice<T>,
    ) -> Result<Self> {
        let shape = control_points.shape();
        for direction in ParametricDirection::ALL {
            let d = direction.index();
            let (order, knots) = (orders[d], &knots[d]);
            knots.validate(order)?;
            if knots.len() != shape[d] + order {
                return Err(VolumeError::InvalidShape(format!(
                    "{direction} knot vector has {} knots, {} control points of order {order} need {}",
                    knots.len(),
                    shape[d],
                    shape[d] + order
                )));
            }
            let eps = T::default_epsilon();
            if knots.first().abs() > eps || (knots.last() - T::one()).abs() > eps {
                return Err(VolumeError::DegenerateInput(format!(
                    "{direction} knot vector must span [0, 1]"
                )));
            }
        }
        Ok(Self::new_unchecked(orders, knots, control_points, None))
    }

    pub(crate) fn new_unchecked(
        orders: [usize; 3],
        knots: [KnotVector<T>; 3],
        control_points: ControlLattice<T>,
        original: Option<OriginalData<T>>,
    ) -> Self {
        Self {
            control_points,
            degrees: orders.map(|k| k - 1),
            knots,
            original,
        }
    }

    pub fn knots(&self, direction: ParametricDirection) -> &KnotVector<T> {
        &self.knots[direction.index()]
    }

    pub fn degree(&self, direction: ParametricDirection) -> usize {
        self.degrees[direction.index()]
    }

    /// Spline order (degree + 1)
    pub fn order(&self, direction: ParametricDirection) -> usize {
        self.degrees[direction.index()] + 1
    }

    /// Orders in u, v and w
    pub fn orders(&self) -> [usize; 3] {
        self.degrees.map(|p| p + 1)
    }

    pub fn control_lattice(&self) -> &ControlLattice<T> {
        &self.control_points
    }

    /// The sampled grid the volume was fitted to, if retained
    pub fn original_data(&self) -> Option<&OriginalData<T>> {
        self.original.as_ref()
    }

    pub fn has_original_data(&self) -> bool {
        self.original.is_some()
    }

    pub(crate) fn try_original_data(&self) -> Result<&OriginalData<T>> {
        self.original.as_ref().ok_or(VolumeError::NoOriginalData)
    }

    pub(crate) fn set_fit(
        &mut self,
        knots: [KnotVector<T>; 3],
        degrees: [usize; 3],
        control_points: ControlLattice<T>,
    ) {
        self.knots = knots;
        self.degrees = degrees;
        self.control_points = control_points;
    }

    /// Evaluate the volume at the given parameters
    ///
    /// Fails with [`VolumeError::Domain`] if any parameter lies outside `[0, 1]`.
    pub fn try_point_at(&self, u: T, v: T, w: T) -> Result<Point3<T>> {
        let params = check_parameters([u, v, w])?;
        Ok(self.point(params))
    }

    /// Evaluate at parameters already known to lie inside the domain
    pub(crate) fn point(&self, params: [T; 3]) -> Point3<T> {
        let bases = self.bases(params);
        Point3::from(self.combine(&bases[0], &bases[1], &bases[2]))
    }

    pub(crate) fn bases(&self, params: [T; 3]) -> [BasisFunctions<T>; 3] {
        [0, 1, 2].map(|d| self.knots[d].evaluate_basis(self.degrees[d], params[d]))
    }

    /// Weighted sum over the `order_u × order_v × order_w` control points that
    /// the three bases select
    fn combine(
        &self,
        u: &BasisFunctions<T>,
        v: &BasisFunctions<T>,
        w: &BasisFunctions<T>,
    ) -> Vector3<T> {
        let mut position = Vector3::zeros();
        for (i, bu) in u.iter() {
            let mut plane = Vector3::zeros();
            for (j, bv) in v.iter() {
                let mut row = Vector3::zeros();
                for (k, bw) in w.iter() {
                    row += self.control_points[[i, j, k]].coords * bw;
                }
                plane += row * bv;
            }
            position += plane * bu;
        }
        position
    }

    /// Evaluate the partial derivatives up to total order `derivs`
    ///
    /// Returns a table `s` where `s[k][l][m]` is the derivative taken `k` times
    /// in u, `l` times in v and `m` times in w, for `k + l + m <= derivs`.
    /// Entries beyond the total order are zero.
    pub fn try_derivatives(
        &self,
        u: T,
        v: T,
        w: T,
        derivs: usize,
    ) -> Result<Vec<Vec<Vec<Vector3<T>>>>> {
        let params = check_parameters([u, v, w])?;
        Ok(self.derivatives(params, derivs))
    }

    pub(crate) fn derivatives(
        &self,
        params: [T; 3],
        derivs: usize,
    ) -> Vec<Vec<Vec<Vector3<T>>>> {
        let ders = [0, 1, 2].map(|d| {
            let degree = self.degrees[d];
            let span = self.knots[d].span(degree, params[d]);
            let rows = self.knots[d].derivative_basis_functions(span, params[d], degree, derivs);
            rows.into_iter()
                .map(|values| BasisFunctions::new(span, degree, values))
                .collect::<Vec<_>>()
        });

        let mut skl = vec![vec![vec![Vector3::zeros(); derivs + 1]; derivs + 1]; derivs + 1];
        for k in 0..=derivs {
            for l in 0..=(derivs - k) {
                for m in 0..=(derivs - k - l) {
                    skl[k][l][m] = self.combine(&ders[0][k], &ders[1][l], &ders[2][m]);
                }
            }
        }
        skl
    }

    /// Evaluate a single mixed partial derivative `[du, dv, dw]`
    pub fn try_partial_derivative(
        &self,
        u: T,
        v: T,
        w: T,
        order: [usize; 3],
    ) -> Result<Vector3<T>> {
        let params = check_parameters([u, v, w])?;
        let bases = [0, 1, 2]
            .map(|d| self.knots[d].evaluate_basis_derivative(self.degrees[d], params[d], order[d]));
        Ok(self.combine(&bases[0], &bases[1], &bases[2]))
    }

    /// Evaluate a regular `(divs_u + 1) × (divs_v + 1) × (divs_w + 1)` grid of
    /// points, reusing the basis functions of each parametric line
    pub fn regular_sample_points(
        &self,
        divs_u: usize,
        divs_v: usize,
        divs_w: usize,
    ) -> Vec<Vec<Vec<Point3<T>>>> {
        let bases_u = self.knots[0].regularly_spaced_basis_functions(self.degrees[0], divs_u);
        let bases_v = self.knots[1].regularly_spaced_basis_functions(self.degrees[1], divs_v);
        let bases_w = self.knots[2].regularly_spaced_basis_functions(self.degrees[2], divs_w);

        bases_u
            .iter()
            .map(|bu| {
                bases_v
                    .iter()
                    .map(|bv| {
                        bases_w
                            .iter()
                            .map(|bw| Point3::from(self.combine(bu, bv, bw)))
                            .collect()
                    })
                    .collect()
            })
            .collect()
    }

    /// Axis-aligned box of the control lattice
    ///
    /// Encloses the whole volume by the convex hull property, but is not tight.
    pub fn bounding_box(&self) -> BoundingBox3D<T> {
        self.control_points.bounding_box()
    }

    /// Cast the volume to another floating point type
    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> NurbsVolume<F> {
        NurbsVolume {
            control_points: self.control_points.cast(),
            degrees: self.degrees,
            knots: [0, 1, 2].map(|d| self.knots[d].cast()),
            original: self.original.as_ref().map(|o| o.cast()),
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for NurbsVolume<T>
where
    T: FloatingPoint + serde::Deserialize<'de>,
{
    /// Deserialize with the checks of [`NurbsVolume::try_new`], and retained
    /// sample parameters matching the sample grid
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        #[derive(serde::Deserialize)]
        #[serde(rename = "NurbsVolume")]
        struct Fields<T: FloatingPoint> {
            control_points: ControlLattice<T>,
            degrees: [usize; 3],
            knots: [KnotVector<T>; 3],
            original: Option<OriginalData<T>>,
        }

        let Fields {
            control_points,
            degrees,
            knots,
            original,
        } = Fields::<T>::deserialize(deserializer)?;

        if let Some(original) = &original {
            let shape = original.samples.shape();
            for direction in ParametricDirection::ALL {
                let count = original.parameters(direction).len();
                let samples = shape[direction.index()];
                if count != samples {
                    return Err(D::Error::custom(VolumeError::InvalidShape(format!(
                        "{count} {direction} parameters for {samples} samples"
                    ))));
                }
            }
        }

        let orders = degrees.map(|p| p + 1);
        let mut volume = Self::try_new(orders, knots, control_points).map_err(D::Error::custom)?;
        volume.original = original;
        Ok(volume)
    }
}

/// Reject parameters outside `[0, 1]`, NaN included
pub(crate) fn check_parameter<T: FloatingPoint>(
    direction: ParametricDirection,
    value: T,
) -> Result<T> {
    if value >= T::zero() && value <= T::one() {
        Ok(value)
    } else {
        Err(VolumeError::domain(direction, value))
    }
}

pub(crate) fn check_parameters<T: FloatingPoint>(params: [T; 3]) -> Result<[T; 3]> {
    for direction in ParametricDirection::ALL {
        check_parameter(direction, params[direction.index()])?;
    }
    Ok(params)
}
