use std::ops::Index;

use itertools::Itertools;
use nalgebra::convert;
use simba::scalar::SupersetOf;

use crate::{
    error::{Result, VolumeError},
    knot::{BasisFunctions, KnotMultiplicity},
    misc::FloatingPoint,
};

/// Knot vector representation
///
/// Builders take the spline `order` (degree + 1) as the fitting inputs do,
/// evaluation methods take the `degree` of the basis.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KnotVector<T>(Vec<T>);

impl<T: FloatingPoint> KnotVector<T> {
    pub fn new(knots: Vec<T>) -> Self {
        Self(knots)
    }

    /// Create a clamped uniform knot vector on `[0, 1]`
    /// # Example
    /// ```
    /// use splinevol::prelude::KnotVector;
    /// let knots: KnotVector<f64> = KnotVector::try_uniform(5, 3).unwrap();
    /// assert_eq!(knots.to_vec(), vec![0., 0., 0., 1. / 3., 2. / 3., 1., 1., 1.]);
    /// ```
    pub fn try_uniform(control_points: usize, order: usize) -> Result<Self> {
        check_order(control_points, order)?;
        let segments = control_points - order + 1;
        let denom = T::from_usize(segments).unwrap();

        let mut knots = vec![T::zero(); order];
        knots.extend((1..segments).map(|i| T::from_usize(i).unwrap() / denom));
        knots.extend(std::iter::repeat_n(T::one(), order));
        Ok(Self(knots))
    }

    /// Build a clamped knot vector on `[0, 1]` from sample parameters
    ///
    /// The parameters are normalized to `[0, 1]` first. With one control point per
    /// sample the interior knots average `order - 1` consecutive parameters; with
    /// fewer control points than samples the knots blend neighbouring parameters
    /// so that every span holds at least one sample.
    ///
    /// # Example
    /// ```
    /// use splinevol::prelude::KnotVector;
    /// let params = vec![0., 0.25, 0.5, 0.75, 1.];
    /// let knots: KnotVector<f64> = KnotVector::try_from_parameters(&params, 5, 3).unwrap();
    /// assert_eq!(knots.to_vec(), vec![0., 0., 0., 0.375, 0.625, 1., 1., 1.]);
    /// ```
    pub fn try_from_parameters(
        parameters: &[T],
        control_points: usize,
        order: usize,
    ) -> Result<Self> {
        check_order(control_points, order)?;
        let samples = parameters.len();
        if samples < 2 {
            return Err(VolumeError::DegenerateInput(format!(
                "at least 2 sample parameters are required, got {samples}"
            )));
        }
        if control_points > samples {
            return Err(VolumeError::DegenerateInput(format!(
                "{control_points} control points cannot be placed on {samples} samples"
            )));
        }
        if parameters.iter().tuple_windows().any(|(a, b)| b < a) {
            return Err(VolumeError::DegenerateInput(
                "sample parameters must be non-decreasing".to_string(),
            ));
        }

        let first = parameters[0];
        let range = parameters[samples - 1] - first;
        if range <= T::default_epsilon() {
            return Err(VolumeError::DegenerateInput(
                "fewer than 2 distinct sample parameters".to_string(),
            ));
        }
        let params: Vec<T> = parameters.iter().map(|p| (*p - first) / range).collect();

        let degree = order - 1;
        let interior = control_points - order;
        let mut knots = vec![T::zero(); order];

        if control_points == samples {
            let denom = T::from_usize(degree).unwrap();
            for j in 1..=interior {
                let sum = params[j..j + degree]
                    .iter()
                    .fold(T::zero(), |acc, p| acc + *p);
                knots.push(sum / denom);
            }
        } else {
            let denom = control_points - degree;
            let fdenom = T::from_usize(denom).unwrap();
            for j in 1..=interior {
                let jd = j * samples;
                let i = jd / denom;
                let alpha = T::from_usize(jd % denom).unwrap() / fdenom;
                knots.push((T::one() - alpha) * params[i - 1] + alpha * params[i]);
            }
        }

        knots.extend(std::iter::repeat_n(T::one(), order));
        let knots = Self(knots);
        knots.validate(order)?;
        Ok(knots)
    }

    /// Check the clamped knot vector invariants for the given order
    /// - non-decreasing
    /// - first and last knots repeated exactly `order` times
    /// - interior knots repeated at most `order - 1` times
    pub fn validate(&self, order: usize) -> Result<()> {
        if order < 2 {
            return Err(VolumeError::DegenerateInput(format!(
                "spline order must be at least 2, got {order}"
            )));
        }
        if self.len() < 2 * order {
            return Err(VolumeError::DegenerateInput(format!(
                "{} knots cannot form a clamped vector of order {order}",
                self.len()
            )));
        }
        if self.iter().tuple_windows().any(|(a, b)| b < a) {
            return Err(VolumeError::DegenerateInput(
                "knots must be non-decreasing".to_string(),
            ));
        }
        if self.last() - self.first() <= T::default_epsilon() {
            return Err(VolumeError::DegenerateInput(
                "knot vector spans an empty domain".to_string(),
            ));
        }

        let multiplicity = self.multiplicity();
        let start = multiplicity[0].multiplicity();
        let end = multiplicity[multiplicity.len() - 1].multiplicity();
        if start != order || end != order {
            return Err(VolumeError::DegenerateInput(format!(
                "boundary knots must repeat {order} times, got {start} and {end}"
            )));
        }
        let interior = &multiplicity[1..multiplicity.len() - 1];
        if let Some(m) = interior.iter().find(|m| m.breaks_continuity(order)) {
            return Err(VolumeError::DegenerateInput(format!(
                "interior knot {} repeats {} times, at most {} allowed",
                m.knot().to_f64_lossy(),
                m.multiplicity(),
                order - 1
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.0.clone()
    }

    pub fn first(&self) -> T {
        self.0[0]
    }

    pub fn last(&self) -> T {
        self.0[self.0.len() - 1]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }

    /// Number of control points the knot vector supports for a degree
    pub fn control_point_count(&self, degree: usize) -> usize {
        self.0.len() - degree - 1
    }

    /// Get the domain of the knot vector by degree
    pub fn domain(&self, degree: usize) -> (T, T) {
        (self.0[degree], self.0[self.0.len() - 1 - degree])
    }

    /// Check if the parameter lies inside the domain
    pub fn contains(&self, degree: usize, u: T) -> bool {
        let (min, max) = self.domain(degree);
        u >= min && u <= max
    }

    /// Get the multiplicity of each knot
    /// # Example
    /// ```
    /// use splinevol::prelude::KnotVector;
    /// let knots = KnotVector::new(vec![0., 0., 0., 1., 2., 3., 3., 3.]);
    /// let knot_multiplicity = knots.multiplicity();
    /// assert_eq!(knot_multiplicity[0].multiplicity(), 3);
    /// assert_eq!(knot_multiplicity[1].multiplicity(), 1);
    /// assert_eq!(knot_multiplicity[2].multiplicity(), 1);
    /// assert_eq!(knot_multiplicity[3].multiplicity(), 3);
    /// ```
    pub fn multiplicity(&self) -> Vec<KnotMultiplicity<T>> {
        let mut mult = vec![];

        let mut current = KnotMultiplicity::new(self.0[0], 0);
        self.0.iter().for_each(|knot| {
            if (*knot - current.knot()).abs() > T::default_epsilon() {
                mult.push(current);
                current = KnotMultiplicity::new(*knot, 0);
            }
            current.increment_multiplicity();
        });
        mult.push(current);

        mult
    }

    /// Find the knot span index by binary search
    ///
    /// `n` is the index of the last control point. A parameter at the upper end
    /// of the domain resolves to the last non-empty span.
    ///
    /// # Example
    /// ```
    /// use splinevol::prelude::KnotVector;
    /// let knots = KnotVector::new(vec![0., 0., 0., 1., 2., 3., 3., 3.]);
    /// assert_eq!(knots.find_knot_span_index(4, 2, 2.5), 4);
    /// assert_eq!(knots.find_knot_span_index(4, 2, 3.0), 4);
    /// assert_eq!(knots.find_knot_span_index(4, 2, 0.0), 2);
    /// ```
    pub fn find_knot_span_index(&self, n: usize, degree: usize, u: T) -> usize {
        if u > self[n + 1] - T::default_epsilon() {
            return n;
        }

        if u < self[degree] + T::default_epsilon() {
            return degree;
        }

        let mut low = degree;
        let mut high = n + 1;
        let mut mid = (low + high) / 2;
        while u < self[mid] || self[mid + 1] <= u {
            if u < self[mid] {
                high = mid;
            } else {
                low = mid;
            }
            let next = (low + high) / 2;
            if mid == next {
                break;
            }
            mid = next;
        }

        mid
    }

    /// Find the knot span containing `u` for the given degree
    pub fn span(&self, degree: usize, u: T) -> usize {
        let n = self.len() - degree - 2;
        self.find_knot_span_index(n, degree, u)
    }

    /// Compute the non-vanishing basis functions with the triangular recurrence
    pub fn basis_functions(&self, knot_span_index: usize, u: T, degree: usize) -> Vec<T> {
        let mut basis_functions = vec![T::zero(); degree + 1];
        let mut left = vec![T::zero(); degree + 1];
        let mut right = vec![T::zero(); degree + 1];

        basis_functions[0] = T::one();

        for j in 1..=degree {
            left[j] = u - self[knot_span_index + 1 - j];
            right[j] = self[knot_span_index + j] - u;
            let mut saved = T::zero();

            for r in 0..j {
                let temp = ratio(basis_functions[r], right[r + 1] + left[j - r]);
                basis_functions[r] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }

            basis_functions[j] = saved;
        }

        basis_functions
    }

    /// Locate the span of `u` and compute its `degree + 1` non-vanishing basis values
    ///
    /// # Example
    /// ```
    /// use splinevol::prelude::KnotVector;
    /// let knots: KnotVector<f64> = KnotVector::try_uniform(6, 4).unwrap();
    /// let basis = knots.evaluate_basis(3, 0.3);
    /// assert_eq!(basis.values().len(), 4);
    /// assert!((basis.sum() - 1.0).abs() < 1e-12);
    /// ```
    pub fn evaluate_basis(&self, degree: usize, u: T) -> BasisFunctions<T> {
        let span = self.span(degree, u);
        BasisFunctions::new(span, degree, self.basis_functions(span, u, degree))
    }

    /// Compute the `derivative`-th derivative of the non-vanishing basis functions at `u`
    ///
    /// Derivatives above the degree vanish identically.
    pub fn evaluate_basis_derivative(
        &self,
        degree: usize,
        u: T,
        derivative: usize,
    ) -> BasisFunctions<T> {
        let span = self.span(degree, u);
        let mut ders = self.derivative_basis_functions(span, u, degree, derivative);
        BasisFunctions::new(span, degree, ders.swap_remove(derivative))
    }

    /// Compute the non-vanishing basis functions and their derivatives
    /// 2d array of size (derivs + 1, degree + 1), the k-th row holds the k-th derivative
    pub fn derivative_basis_functions(
        &self,
        knot_index: usize,
        u: T,
        degree: usize,
        derivs: usize,
    ) -> Vec<Vec<T>> {
        let p = degree;
        let mut ndu = vec![vec![T::zero(); p + 1]; p + 1];
        let mut left = vec![T::zero(); p + 1];
        let mut right = vec![T::zero(); p + 1];

        ndu[0][0] = T::one();

        for j in 1..=p {
            left[j] = u - self[knot_index + 1 - j];
            right[j] = self[knot_index + j] - u;

            let mut saved = T::zero();
            for r in 0..j {
                // lower triangle
                ndu[j][r] = right[r + 1] + left[j - r];
                let temp = ratio(ndu[r][j - 1], ndu[j][r]);

                // upper triangle
                ndu[r][j] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            ndu[j][j] = saved;
        }

        let mut ders = vec![vec![T::zero(); p + 1]; derivs + 1];
        for j in 0..=p {
            ders[0][j] = ndu[j][p];
        }

        let n = derivs.min(p);
        let mut a = vec![vec![T::zero(); p + 1]; 2];

        for r in 0..=p {
            // alternate rows in array a
            let mut s1 = 0;
            let mut s2 = 1;
            a[0][0] = T::one();

            for k in 1..=n {
                let mut d = T::zero();
                let rk = r as isize - k as isize;
                let pk = p - k;

                if r >= k {
                    a[s2][0] = ratio(a[s1][0], ndu[pk + 1][r - k]);
                    d = a[s2][0] * ndu[r - k][pk];
                }

                let j1 = if rk >= -1 { 1 } else { (-rk) as usize };
                let j2 = if r <= pk + 1 { k - 1 } else { p - r };

                for j in j1..=j2 {
                    let rj = (rk + j as isize) as usize;
                    a[s2][j] = ratio(a[s1][j] - a[s1][j - 1], ndu[pk + 1][rj]);
                    d += a[s2][j] * ndu[rj][pk];
                }

                if r <= pk {
                    a[s2][k] = ratio(-a[s1][k - 1], ndu[pk + 1][r]);
                    d += a[s2][k] * ndu[r][pk];
                }

                ders[k][r] = d;
                std::mem::swap(&mut s1, &mut s2);
            }
        }

        // multiply through by p! / (p - k)!
        let mut factor = p;
        for k in 1..=n {
            let f = T::from_usize(factor).unwrap();
            ders[k].iter_mut().for_each(|v| *v *= f);
            factor *= p - k;
        }

        ders
    }

    /// Compute basis functions at `divs + 1` regularly spaced parameters across the domain
    pub fn regularly_spaced_basis_functions(
        &self,
        degree: usize,
        divs: usize,
    ) -> Vec<BasisFunctions<T>> {
        self.regularly_spaced_parameters(degree, divs)
            .into_iter()
            .map(|u| self.evaluate_basis(degree, u))
            .collect()
    }

    /// `divs + 1` regularly spaced parameters, the last one pinned to the domain end
    pub fn regularly_spaced_parameters(&self, degree: usize, divs: usize) -> Vec<T> {
        let divs = divs.max(1);
        let (start, end) = self.domain(degree);
        let span = (end - start) / T::from_usize(divs).unwrap();
        (0..=divs)
            .map(|i| {
                if i == divs {
                    end
                } else {
                    start + span * T::from_usize(i).unwrap()
                }
            })
            .collect()
    }

    /// Cast the knot vector to another floating point type
    /// # Example
    /// ```
    /// use splinevol::prelude::*;
    /// let knots: KnotVector<f64> = KnotVector::new(vec![0., 0., 0.5, 1., 1.]);
    /// let knots2 = knots.cast::<f32>();
    /// assert_eq!(knots2.last(), 1.0f32);
    /// ```
    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> KnotVector<F> {
        KnotVector::new(self.0.iter().map(|v| convert(*v)).collect())
    }
}

impl<T> Index<usize> for KnotVector<T> {
    type Output = T;
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

/// Division where a zero-width knot interval contributes nothing
fn ratio<T: FloatingPoint>(numerator: T, denominator: T) -> T {
    if denominator == T::zero() {
        T::zero()
    } else {
        numerator / denominator
    }
}

fn check_order(control_points: usize, order: usize) -> Result<()> {
    if order < 2 {
        return Err(VolumeError::DegenerateInput(format!(
            "spline order must be at least 2, got {order}"
        )));
    }
    if control_points < order {
        return Err(VolumeError::DegenerateInput(format!(
            "{control_points} control points cannot carry a clamped spline of order {order}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::KnotVector;
    use crate::error::VolumeError;

    fn sample_parameters(n: usize) -> Vec<f64> {
        // mildly clustered towards the start
        (0..n)
            .map(|i| {
                let t = i as f64 / (n - 1) as f64;
                t * t * 0.4 + t * 0.6
            })
            .collect()
    }

    #[test]
    fn partition_of_unity() {
        for order in 2..=6 {
            for n in order..order + 5 {
                let params = sample_parameters(n + 3);
                let knots = KnotVector::try_from_parameters(&params, n, order).unwrap();
                let degree = order - 1;
                for i in 0..=200 {
                    let u = i as f64 / 200.;
                    let basis = knots.evaluate_basis(degree, u);
                    assert_relative_eq!(basis.sum(), 1.0, epsilon = 1e-10);
                    assert!(basis.values().iter().all(|v| *v >= -1e-14));
                }
            }
        }
    }

    #[test]
    fn upper_boundary_uses_last_span() {
        let knots: KnotVector<f64> = KnotVector::try_uniform(6, 4).unwrap();
        let basis = knots.evaluate_basis(3, 1.0);
        assert_eq!(basis.span(), 5);
        assert_eq!(basis.first_index(), 2);
        assert_relative_eq!(basis.values()[3], 1.0);
        let basis = knots.evaluate_basis(3, 0.0);
        assert_eq!(basis.first_index(), 0);
        assert_relative_eq!(basis.values()[0], 1.0);
    }

    #[test]
    fn linear_basis_is_hat_function() {
        let knots = KnotVector::new(vec![0., 0., 0.5, 1., 1.]);
        let basis = knots.evaluate_basis(1, 0.25);
        assert_eq!(basis.span(), 1);
        assert_relative_eq!(basis.values()[0], 0.5);
        assert_relative_eq!(basis.values()[1], 0.5);
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let params = sample_parameters(9);
        for order in 2..=6 {
            let knots = KnotVector::try_from_parameters(&params, 7, order).unwrap();
            let degree = order - 1;
            let h = 1e-6;
            for u in [0.13, 0.41, 0.77] {
                let span = knots.span(degree, u);
                let ders = knots.derivative_basis_functions(span, u, degree, 2);
                let lo = knots.basis_functions(span, u - h, degree);
                let hi = knots.basis_functions(span, u + h, degree);
                let mid = knots.basis_functions(span, u, degree);
                let h2 = 1e-4;
                let lo2 = knots.basis_functions(span, u - h2, degree);
                let hi2 = knots.basis_functions(span, u + h2, degree);
                for j in 0..=degree {
                    assert_relative_eq!(ders[0][j], mid[j], epsilon = 1e-12);
                    let fd = (hi[j] - lo[j]) / (2. * h);
                    assert_relative_eq!(ders[1][j], fd, epsilon = 1e-5);
                    if degree >= 2 {
                        let fd2 = (hi2[j] - 2. * mid[j] + lo2[j]) / (h2 * h2);
                        assert_relative_eq!(ders[2][j], fd2, epsilon = 1e-2);
                    }
                }
                let d1: f64 = ders[1].iter().sum();
                assert_relative_eq!(d1, 0.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn derivatives_above_degree_vanish() {
        let knots: KnotVector<f64> = KnotVector::try_uniform(5, 3).unwrap();
        let basis = knots.evaluate_basis_derivative(2, 0.6, 3);
        assert!(basis.values().iter().all(|v| *v == 0.0));
        let second = knots.evaluate_basis_derivative(2, 0.6, 2);
        assert_relative_eq!(second.sum(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn least_squares_knots_populate_every_span() {
        let params = sample_parameters(11);
        let knots = KnotVector::try_from_parameters(&params, 7, 4).unwrap();
        assert_eq!(knots.len(), 11);
        knots.validate(4).unwrap();
        let distinct: Vec<f64> = knots.multiplicity().iter().map(|m| m.knot()).collect();
        for w in distinct.windows(2) {
            assert!(params.iter().any(|p| *p >= w[0] && *p <= w[1]));
        }
    }

    #[test]
    fn averaging_knots() {
        let params = vec![0., 0.1, 0.4, 0.6, 1.0];
        let knots = KnotVector::try_from_parameters(&params, 5, 4).unwrap();
        assert_eq!(knots.len(), 9);
        assert_relative_eq!(knots[4], (0.1 + 0.4 + 0.6) / 3.);
    }

    #[test]
    fn parameters_are_normalized() {
        let params = vec![2., 3., 4., 6.];
        let knots = KnotVector::try_from_parameters(&params, 4, 2).unwrap();
        assert_eq!(knots.first(), 0.0);
        assert_eq!(knots.last(), 1.0);
        assert_relative_eq!(knots[2], 0.25);
        assert_relative_eq!(knots[3], 0.5);
    }

    #[test]
    fn degenerate_inputs() {
        let params = vec![0., 0.5, 1.];
        assert!(matches!(
            KnotVector::try_from_parameters(&params, 2, 3),
            Err(VolumeError::DegenerateInput(_))
        ));
        assert!(matches!(
            KnotVector::<f64>::try_from_parameters(&[0.3, 0.3, 0.3], 3, 2),
            Err(VolumeError::DegenerateInput(_))
        ));
        assert!(matches!(
            KnotVector::<f64>::try_from_parameters(&[0.5], 1, 2),
            Err(VolumeError::DegenerateInput(_))
        ));
        assert!(matches!(
            KnotVector::<f64>::try_from_parameters(&[0., 1., 0.5], 3, 2),
            Err(VolumeError::DegenerateInput(_))
        ));
        assert!(matches!(
            KnotVector::<f64>::try_uniform(4, 1),
            Err(VolumeError::DegenerateInput(_))
        ));
    }

    #[test]
    fn validate_rejects_bad_multiplicity() {
        let knots = KnotVector::new(vec![0., 0., 0.5, 0.5, 1., 1.]);
        assert!(knots.validate(2).is_err());
        assert!(knots.validate(3).is_err());
        let knots = KnotVector::new(vec![0., 0., 0., 0.5, 0.5, 1., 1., 1.]);
        assert!(knots.validate(3).is_ok());
    }
}
