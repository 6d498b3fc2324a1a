use argmin::core::{ArgminFloat, Executor, State, TerminationReason, TerminationStatus};
use nalgebra::{Point3, Vector3};

use crate::{
    closest_parameter::{VolumeClosestParameterNewton, VolumeClosestParameterProblem},
    error::{Result, VolumeError},
    misc::{FloatingPoint, ParametricDirection},
};

use super::NurbsVolume;

/// Hyperparameters for projecting points onto a volume.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProjectionOptions<T: FloatingPoint> {
    /// Distance under which a seed stops immediately, also the step size
    /// under which the Newton iteration is considered converged.
    pub tolerance: T,
    /// Maximum number of Newton iterations per seed.
    pub max_iters: u64,
    /// Divisions of the regular seed grid in u, v and w.
    /// `None` uses control points × degree per direction, at least 4.
    pub seed_divisions: Option<[usize; 3]>,
    /// Maximum number of seeds refined by Newton's method.
    pub max_seeds: usize,
    /// Damping of the Newton step in `(0, 1]`.
    pub gamma: T,
    /// Maximum number of step halvings per iteration.
    pub max_backtracks: usize,
}

impl<T: FloatingPoint> Default for ProjectionOptions<T> {
    fn default() -> Self {
        Self {
            tolerance: T::from_f64(1e-10).unwrap(),
            max_iters: 50,
            seed_divisions: None,
            max_seeds: 8,
            gamma: T::one(),
            max_backtracks: 16,
        }
    }
}

impl<T: FloatingPoint> ProjectionOptions<T> {
    pub fn with_tolerance(mut self, tolerance: T) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iters(mut self, max_iters: u64) -> Self {
        self.max_iters = max_iters;
        self
    }

    pub fn with_seed_divisions(mut self, seed_divisions: [usize; 3]) -> Self {
        self.seed_divisions = Some(seed_divisions);
        self
    }

    pub fn with_max_seeds(mut self, max_seeds: usize) -> Self {
        self.max_seeds = max_seeds;
        self
    }

    pub fn with_gamma(mut self, gamma: T) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_max_backtracks(mut self, max_backtracks: usize) -> Self {
        self.max_backtracks = max_backtracks;
        self
    }
}

/// Converged projection of a point onto a volume
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeProjection<T: FloatingPoint> {
    parameter: Vector3<T>,
    point: Point3<T>,
    distance: T,
    iterations: u64,
}

impl<T: FloatingPoint> VolumeProjection<T> {
    /// Parameters `(u, v, w)` of the closest point
    pub fn parameter(&self) -> &Vector3<T> {
        &self.parameter
    }

    pub fn u(&self) -> T {
        self.parameter.x
    }

    pub fn v(&self) -> T {
        self.parameter.y
    }

    pub fn w(&self) -> T {
        self.parameter.z
    }

    /// The volume evaluated at the parameters
    pub fn point(&self) -> &Point3<T> {
        &self.point
    }

    /// Distance from the query point to [`Self::point`]
    pub fn distance(&self) -> T {
        self.distance
    }

    /// Newton iterations spent by the winning seed
    pub fn iterations(&self) -> u64 {
        self.iterations
    }
}

/// Outcome of refining one seed
struct SeedResult<T> {
    parameter: Vector3<T>,
    distance: T,
    iterations: u64,
    converged: bool,
}

impl<T: FloatingPoint + ArgminFloat> NurbsVolume<T> {
    /// Find the closest parameter in the volume to a given point with default options
    pub fn find_closest_parameter(&self, point: &Point3<T>) -> Result<Vector3<T>> {
        self.try_project(point, &ProjectionOptions::default())
            .map(|p| p.parameter)
    }

    /// Find the closest point in the volume to a given point with default options
    pub fn find_closest_point(&self, point: &Point3<T>) -> Result<Point3<T>> {
        self.try_project(point, &ProjectionOptions::default())
            .map(|p| p.point)
    }

    /// Project a point onto the volume
    ///
    /// The parametric cube is sampled on a regular grid; the closest, mutually
    /// separated grid points seed a bounded damped Newton iteration each, and
    /// the closest converged result wins. Fails with
    /// [`VolumeError::ProjectionDidNotConverge`] if no seed converges.
    ///
    /// # Example
    /// ```
    /// use nalgebra::Point3;
    /// use splinevol::prelude::*;
    ///
    /// let samples = SampleGrid::try_from_fn([4, 4, 4], |i, j, k| {
    ///     let (x, y, z) = (i as f64 / 3., j as f64 / 3., k as f64 / 3.);
    ///     Point3::new(x + 0.1 * y * y, y, z * (1. + 0.2 * x))
    /// })
    /// .unwrap();
    /// let volume = NurbsVolume::try_fit(samples, &VolumeFitOptions::default()).unwrap();
    ///
    /// let target = volume.try_point_at(0.3, 0.6, 0.45).unwrap();
    /// let projection = volume.try_project(&target, &ProjectionOptions::default()).unwrap();
    /// assert!(projection.distance() < 1e-8);
    /// assert!((projection.u() - 0.3).abs() < 1e-6);
    /// ```
    pub fn try_project(
        &self,
        point: &Point3<T>,
        options: &ProjectionOptions<T>,
    ) -> Result<VolumeProjection<T>> {
        let solver = VolumeClosestParameterNewton::new(options.tolerance, options.max_backtracks)
            .with_gamma(options.gamma)
            .map_err(|e| VolumeError::DegenerateInput(e.to_string()))?;

        let seeds = self.projection_seeds(point, options);
        let mut best_distance = seeds.first().map(|(_, d)| *d);
        let mut best: Option<SeedResult<T>> = None;

        for (_index, (seed, _seed_distance)) in seeds.iter().enumerate() {
            #[cfg(feature = "log")]
            log::trace!(
                "projection seed {_index} at {:?}, distance {}",
                seed.as_slice(),
                _seed_distance.to_f64_lossy()
            );

            let Some(result) = self.refine_seed(point, *seed, solver, options) else {
                continue;
            };
            if best_distance.map_or(true, |d| result.distance < d) {
                best_distance = Some(result.distance);
            }
            if !result.converged {
                #[cfg(feature = "log")]
                log::debug!(
                    "projection seed {_index} did not converge after {} iterations (distance {})",
                    result.iterations,
                    result.distance.to_f64_lossy()
                );
                continue;
            }

            let done = result.distance <= options.tolerance;
            if best.as_ref().map_or(true, |b| result.distance < b.distance) {
                best = Some(result);
            }
            if done {
                break;
            }
        }

        let best = best.ok_or(VolumeError::ProjectionDidNotConverge {
            seeds: seeds.len(),
            max_iters: options.max_iters,
            best_distance: best_distance.map_or(f64::NAN, |d| d.to_f64_lossy()),
        })?;
        let parameter = best.parameter;
        let closest = self.point([parameter.x, parameter.y, parameter.z]);
        Ok(VolumeProjection {
            parameter,
            point: closest,
            distance: (closest - point).norm(),
            iterations: best.iterations,
        })
    }

    /// Project every point with the same options
    pub fn try_project_points(
        &self,
        points: &[Point3<T>],
        options: &ProjectionOptions<T>,
    ) -> Result<Vec<VolumeProjection<T>>> {
        points
            .iter()
            .map(|point| self.try_project(point, options))
            .collect()
    }

    /// Closest points of a regular parameter grid, at most `max_seeds` of them
    /// and no two in neighbouring cells
    fn projection_seeds(
        &self,
        point: &Point3<T>,
        options: &ProjectionOptions<T>,
    ) -> Vec<(Vector3<T>, T)> {
        let shape = self.control_lattice().shape();
        let divs = options
            .seed_divisions
            .unwrap_or_else(|| {
                ParametricDirection::ALL.map(|d| (shape[d.index()] * self.degree(d)).max(4))
            })
            .map(|n| n.max(1));

        let params = ParametricDirection::ALL.map(|d| {
            self.knots(d)
                .regularly_spaced_parameters(self.degree(d), divs[d.index()])
        });
        let grid = self.regular_sample_points(divs[0], divs[1], divs[2]);

        let mut candidates = vec![];
        for (i, plane) in grid.iter().enumerate() {
            for (j, row) in plane.iter().enumerate() {
                for (k, p) in row.iter().enumerate() {
                    candidates.push(([i, j, k], (p - point).norm()));
                }
            }
        }
        candidates.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut chosen: Vec<([usize; 3], T)> = vec![];
        for (cell, distance) in candidates {
            if chosen.len() >= options.max_seeds.max(1) {
                break;
            }
            let near = chosen
                .iter()
                .any(|(c, _)| (0..3).all(|d| c[d].abs_diff(cell[d]) <= 1));
            if !near {
                chosen.push((cell, distance));
            }
        }

        chosen
            .into_iter()
            .map(|(cell, distance)| {
                (
                    Vector3::new(params[0][cell[0]], params[1][cell[1]], params[2][cell[2]]),
                    distance,
                )
            })
            .collect()
    }

    /// Run the bounded Newton iteration from one seed
    ///
    /// A solver error yields `None`: the seed counts as not converged.
    fn refine_seed(
        &self,
        point: &Point3<T>,
        seed: Vector3<T>,
        solver: VolumeClosestParameterNewton<T>,
        options: &ProjectionOptions<T>,
    ) -> Option<SeedResult<T>> {
        let problem = VolumeClosestParameterProblem::new(point, self);
        let res = Executor::new(problem, solver)
            .configure(|state| {
                state
                    .param(seed)
                    .max_iters(options.max_iters)
                    .target_cost(options.tolerance)
            })
            .run();

        let res = match res {
            Ok(res) => res,
            Err(_e) => {
                #[cfg(feature = "log")]
                log::debug!("projection seed failed: {_e}");
                return None;
            }
        };

        let state = res.state();
        let parameter = *state.get_param()?;
        let converged = matches!(
            state.get_termination_status(),
            TerminationStatus::Terminated(
                TerminationReason::SolverConverged | TerminationReason::TargetCostReached
            )
        );
        Some(SeedResult {
            parameter,
            distance: state.get_cost(),
            iterations: state.get_iter(),
            converged,
        })
    }
}
