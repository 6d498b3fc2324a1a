use itertools::Itertools;
use nalgebra::Point3;

use crate::misc::FloatingPoint;

/// Sample parameterization used to place knots from sampled points
/// https://en.wikipedia.org/wiki/Centripetal_Catmull%E2%80%93Rom_spline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum KnotStyle {
    /// Index spacing
    Uniform,
    /// Cumulative chord length
    #[default]
    Chordal,
    /// Cumulative square root of chord length
    Centripetal,
}

impl KnotStyle {
    /// Normalized cumulative parameters in `[0, 1]` along an ordered run of points
    ///
    /// Returns `None` if the run is shorter than two points or has zero length.
    pub fn parameterize<T: FloatingPoint>(&self, points: &[Point3<T>]) -> Option<Vec<T>> {
        if points.len() < 2 {
            return None;
        }

        let alpha = match self {
            KnotStyle::Uniform => {
                let last = T::from_usize(points.len() - 1).unwrap();
                return Some(
                    (0..points.len())
                        .map(|i| T::from_usize(i).unwrap() / last)
                        .collect(),
                );
            }
            KnotStyle::Chordal => T::one(),
            KnotStyle::Centripetal => T::from_f64(0.5).unwrap(),
        };

        let mut params = vec![T::zero()];
        for (a, b) in points.iter().tuple_windows() {
            let last = params[params.len() - 1];
            params.push(last + (b - a).norm().powf(alpha));
        }

        let total = params[params.len() - 1];
        if total <= T::default_epsilon() {
            return None;
        }
        params.iter_mut().for_each(|p| *p /= total);
        Some(params)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    use super::KnotStyle;

    #[test]
    fn chordal_and_centripetal() {
        let points = vec![
            Point3::new(0., 0., 0.),
            Point3::new(1., 0., 0.),
            Point3::new(1., 4., 0.),
        ];
        let chordal = KnotStyle::Chordal.parameterize(&points).unwrap();
        assert_relative_eq!(chordal[1], 0.2);
        assert_relative_eq!(chordal[2], 1.0);

        let centripetal = KnotStyle::Centripetal.parameterize(&points).unwrap();
        assert_relative_eq!(centripetal[1], 1. / 3.);

        let uniform = KnotStyle::Uniform.parameterize(&points).unwrap();
        assert_relative_eq!(uniform[1], 0.5);
    }

    #[test]
    fn zero_length_run() {
        let points = vec![Point3::new(1., 2., 3.); 4];
        assert!(KnotStyle::Chordal.parameterize(&points).is_none());
        assert!(KnotStyle::Uniform.parameterize(&points).is_some());
        assert!(KnotStyle::Chordal.parameterize(&points[..1]).is_none());
    }
}
