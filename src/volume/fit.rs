use nalgebra::{DMatrix, Point3, Vector3};

use crate::{
    error::{Result, VolumeError},
    knot::{KnotStyle, KnotVector},
    misc::{FloatingPoint, ParametricDirection},
};

use super::{flat_index, ControlLattice, NurbsVolume, OriginalData, SampleGrid};

/// Options for fitting a volume to a sample grid
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VolumeFitOptions {
    /// Spline order (degree + 1) in u, v and w.
    pub orders: [usize; 3],
    /// Control points in u, v and w.
    /// `None` places one control point per sample and interpolates the grid.
    pub control_points: Option<[usize; 3]>,
    /// Parameterization of the samples along each grid line.
    pub knot_style: KnotStyle,
    /// Lower control counts above the sample count to the sample count, and
    /// orders above the control count to the control count, instead of failing.
    pub clamp_to_samples: bool,
}

impl Default for VolumeFitOptions {
    fn default() -> Self {
        Self {
            orders: [4, 4, 4],
            control_points: None,
            knot_style: KnotStyle::default(),
            clamp_to_samples: false,
        }
    }
}

impl VolumeFitOptions {
    pub fn with_orders(mut self, orders: [usize; 3]) -> Self {
        self.orders = orders;
        self
    }

    pub fn with_control_points(mut self, control_points: [usize; 3]) -> Self {
        self.control_points = Some(control_points);
        self
    }

    pub fn with_knot_style(mut self, knot_style: KnotStyle) -> Self {
        self.knot_style = knot_style;
        self
    }

    pub fn with_clamp_to_samples(mut self, clamp_to_samples: bool) -> Self {
        self.clamp_to_samples = clamp_to_samples;
        self
    }
}

/// Knots, degrees and control points produced by a fit
struct Fitted<T: FloatingPoint> {
    knots: [KnotVector<T>; 3],
    degrees: [usize; 3],
    control_points: ControlLattice<T>,
}

impl<T: FloatingPoint> NurbsVolume<T> {
    /// Fit a volume to a rectilinear grid of samples
    ///
    /// The fit runs as one least-squares solve per direction over all the
    /// grid slices at once. The samples are retained as original data.
    ///
    /// # Example
    /// ```
    /// use nalgebra::Point3;
    /// use splinevol::prelude::*;
    ///
    /// let samples = SampleGrid::try_from_fn([5, 4, 6], |i, j, k| {
    ///     Point3::new(i as f64, j as f64 * 0.5, k as f64 + 0.1 * i as f64)
    /// })
    /// .unwrap();
    /// let options = VolumeFitOptions::default().with_orders([3, 3, 4]);
    /// let volume = NurbsVolume::try_fit(samples, &options).unwrap();
    ///
    /// let corner = volume.try_corner_value(7).unwrap();
    /// assert!((corner - Point3::new(4., 1.5, 5.4)).norm() < 1e-10);
    /// ```
    pub fn try_fit(samples: SampleGrid<T>, options: &VolumeFitOptions) -> Result<Self> {
        let parameters = parameterize_grid(&samples, options.knot_style)?;
        let fitted = fit(&samples, &parameters, options)?;
        let original = OriginalData::new(samples, parameters, options.clone());
        Ok(Self::new_unchecked(
            fitted.degrees.map(|p| p + 1),
            fitted.knots,
            fitted.control_points,
            Some(original),
        ))
    }

    /// Refit the control lattice from the retained original data
    pub fn recompute(&mut self) -> Result<()> {
        let original = self.try_original_data()?;
        let fitted = fit(
            original.samples(),
            &ParametricDirection::ALL.map(|d| original.parameters(d).to_vec()),
            original.options(),
        )?;
        self.set_fit(fitted.knots, fitted.degrees, fitted.control_points);
        Ok(())
    }

    /// Largest distance between an original sample and the volume evaluated
    /// at the sample's parameters
    ///
    /// Zero up to round-off in the interpolating regime.
    pub fn try_max_fit_deviation(&self) -> Result<T> {
        let original = self.try_original_data()?;
        let [nu, nv, nw] = original.samples().shape();
        let [pu, pv, pw] = ParametricDirection::ALL.map(|d| original.parameters(d));

        let mut deviation = T::zero();
        for i in 0..nu {
            for j in 0..nv {
                for k in 0..nw {
                    let p = self.point([pu[i], pv[j], pw[k]]);
                    let d = (p - original.samples()[[i, j, k]]).norm();
                    if d > deviation {
                        deviation = d;
                    }
                }
            }
        }
        Ok(deviation)
    }
}

/// Average the normalized parameterization of every grid line along each direction
fn parameterize_grid<T: FloatingPoint>(
    samples: &SampleGrid<T>,
    style: KnotStyle,
) -> Result<[Vec<T>; 3]> {
    let mut parameters: [Vec<T>; 3] = Default::default();
    for direction in ParametricDirection::ALL {
        let n = samples.shape()[direction.index()];
        let mut sum = vec![T::zero(); n];
        let mut count = 0usize;
        for line in samples.lines(direction) {
            if let Some(params) = style.parameterize(&line) {
                sum.iter_mut().zip(params).for_each(|(s, p)| *s += p);
                count += 1;
            }
        }
        if count == 0 {
            return Err(VolumeError::DegenerateInput(format!(
                "every sample line along {direction} has zero length"
            )));
        }
        let count = T::from_usize(count).unwrap();
        parameters[direction.index()] = sum.into_iter().map(|s| s / count).collect();
    }
    Ok(parameters)
}

/// Order and control point count for a direction after applying the options
fn resolve_counts(
    direction: ParametricDirection,
    samples: usize,
    options: &VolumeFitOptions,
) -> Result<(usize, usize)> {
    let d = direction.index();
    let mut order = options.orders[d];
    let mut control_points = options.control_points.map_or(samples, |c| c[d]);
    if options.clamp_to_samples {
        control_points = control_points.min(samples);
        order = order.min(control_points);
    }
    if order < 2 {
        return Err(VolumeError::DegenerateInput(format!(
            "spline order in {direction} must be at least 2, got {order}"
        )));
    }
    if control_points > samples || order > control_points.min(samples) {
        return Err(VolumeError::UnderdeterminedFit {
            direction,
            samples,
            control_points,
            order,
        });
    }
    Ok((order, control_points))
}

fn fit<T: FloatingPoint>(
    samples: &SampleGrid<T>,
    parameters: &[Vec<T>; 3],
    options: &VolumeFitOptions,
) -> Result<Fitted<T>> {
    let mut shape = samples.shape();
    let mut data: Vec<Vector3<T>> = samples.iter().map(|p| p.coords).collect();
    let mut knots: [KnotVector<T>; 3] = std::array::from_fn(|_| KnotVector::new(vec![]));
    let mut degrees = [0; 3];

    for direction in ParametricDirection::ALL {
        let d = direction.index();
        let (order, control_points) = resolve_counts(direction, shape[d], options)?;
        let params = &parameters[d];
        let knot_vector = KnotVector::try_from_parameters(params, control_points, order)?;

        let (solved, solved_shape) = fit_direction(
            &data,
            shape,
            direction,
            &knot_vector,
            order - 1,
            params,
            control_points,
        )?;

        #[cfg(feature = "log")]
        log::debug!(
            "fitted {direction}: order {order}, {control_points} control points on {} samples ({})",
            shape[d],
            if control_points == shape[d] {
                "interpolating"
            } else {
                "least squares"
            }
        );

        data = solved;
        shape = solved_shape;
        knots[d] = knot_vector;
        degrees[d] = order - 1;
    }

    let points = data.into_iter().map(Point3::from).collect();
    let control_points = ControlLattice::try_new(shape, points)?;
    Ok(Fitted {
        knots,
        degrees,
        control_points,
    })
}

/// Solve the normal equations of one direction for every slice of the data
///
/// `data` is laid out by `shape`; the result replaces the samples along
/// `direction` by `control_points` coefficients.
fn fit_direction<T: FloatingPoint>(
    data: &[Vector3<T>],
    shape: [usize; 3],
    direction: ParametricDirection,
    knots: &KnotVector<T>,
    degree: usize,
    parameters: &[T],
    control_points: usize,
) -> Result<(Vec<Vector3<T>>, [usize; 3])> {
    let d = direction.index();
    let samples = shape[d];
    let [a, b] = direction.others().map(|o| o.index());
    let slices = shape[a] * shape[b];

    let mut basis = DMatrix::<T>::zeros(samples, control_points);
    for (r, t) in parameters.iter().enumerate() {
        for (c, value) in knots.evaluate_basis(degree, *t).iter() {
            basis[(r, c)] = value;
        }
    }

    let normal = basis.tr_mul(&basis);
    let cholesky = normal
        .cholesky()
        .ok_or(VolumeError::SingularFitMatrix {
            direction,
            pivot_ratio: 0.,
        })?;
    let pivot_ratio = pivot_ratio(cholesky.l_dirty().diagonal().as_slice());
    if pivot_ratio < T::from_f64(1e4).unwrap() * T::default_epsilon() {
        return Err(VolumeError::SingularFitMatrix {
            direction,
            pivot_ratio: pivot_ratio.to_f64_lossy(),
        });
    }

    let slice_index = |r: usize, slice: usize| {
        let mut index = [0; 3];
        index[d] = r;
        index[a] = slice / shape[b];
        index[b] = slice % shape[b];
        index
    };

    let mut rhs = DMatrix::<T>::zeros(samples, 3 * slices);
    for slice in 0..slices {
        for r in 0..samples {
            let p = &data[flat_index(shape, slice_index(r, slice))];
            for c in 0..3 {
                rhs[(r, 3 * slice + c)] = p[c];
            }
        }
    }
    let coefficients = cholesky.solve(&basis.tr_mul(&rhs));

    let mut solved_shape = shape;
    solved_shape[d] = control_points;
    let mut solved = vec![Vector3::zeros(); solved_shape.iter().product()];
    for slice in 0..slices {
        for r in 0..control_points {
            solved[flat_index(solved_shape, slice_index(r, slice))] = Vector3::new(
                coefficients[(r, 3 * slice)],
                coefficients[(r, 3 * slice + 1)],
                coefficients[(r, 3 * slice + 2)],
            );
        }
    }
    Ok((solved, solved_shape))
}

/// Smallest over largest squared Cholesky pivot
fn pivot_ratio<T: FloatingPoint>(diagonal: &[T]) -> T {
    let Some(first) = diagonal.first() else {
        return T::zero();
    };
    let (min, max) = diagonal
        .iter()
        .fold((*first, *first), |(min, max), l| (min.min(*l), max.max(*l)));
    if max <= T::zero() {
        T::zero()
    } else {
        let r = min / max;
        r * r
    }
}
