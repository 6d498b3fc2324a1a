use argmin::{argmin_error, argmin_error_closure, core::*, float};
use nalgebra::{Matrix3, Vector3};

use crate::misc::FloatingPoint;

/// Damped Newton's method with an active set for finding the closest parameter in a volume
///
/// The parameter stays inside the unit cube: components resting on a bound with
/// the gradient pointing outward are frozen for the step, and every trial is
/// clamped back into `[0, 1]`. The step is halved until the distance stops
/// increasing. When the full step cannot be shortened into a descent, as on a
/// knot crease of an order 2 direction, the step is retried on fewer components
/// and halved down to the tolerance. A point where none of these trials
/// decreases the distance is a local minimum.
/// Original source: https://argmin-rs.github.io/argmin/argmin/solver/newton/struct.Newton.html
#[derive(Clone, Copy)]
pub struct VolumeClosestParameterNewton<F> {
    /// gamma
    gamma: F,
    /// step and distance tolerance
    tolerance: F,
    /// maximum number of step halvings per iteration
    max_backtracks: usize,
    /// no trial step longer than the tolerance decreased the distance
    stationary: bool,
}

impl<F> VolumeClosestParameterNewton<F>
where
    F: ArgminFloat,
{
    /// Construct a new instance of [`VolumeClosestParameterNewton`]
    pub fn new(tolerance: F, max_backtracks: usize) -> Self {
        VolumeClosestParameterNewton {
            gamma: float!(1.0),
            tolerance,
            max_backtracks,
            stationary: false,
        }
    }

    /// Set step size gamma
    ///
    /// Gamma must be in `(0, 1]` and defaults to `1`.
    pub fn with_gamma(mut self, gamma: F) -> Result<Self, Error> {
        if gamma <= float!(0.0) || gamma > float!(1.0) {
            return Err(argmin_error!(
                InvalidParameter,
                "Newton: gamma must be in  (0, 1]."
            ));
        }
        self.gamma = gamma;
        Ok(self)
    }
}

impl<O, F> Solver<O, IterState<Vector3<F>, Vector3<F>, (), (), (), F>>
    for VolumeClosestParameterNewton<F>
where
    F: FloatingPoint + ArgminFloat,
    O: CostFunction<Param = Vector3<F>, Output = F>
        + Gradient<Param = Vector3<F>, Gradient = Vector3<F>>
        + Hessian<Param = Vector3<F>, Hessian = Vec<Vec<Vec<Vector3<F>>>>>,
{
    const NAME: &'static str = "Volume closest parameter newton method";

    fn init(
        &mut self,
        problem: &mut Problem<O>,
        state: IterState<Vector3<F>, Vector3<F>, (), (), (), F>,
    ) -> Result<(IterState<Vector3<F>, Vector3<F>, (), (), (), F>, Option<KV>), Error> {
        let x0 = state.get_param().ok_or_else(argmin_error_closure!(
            NotInitialized,
            concat!(
                "`Newton` requires an initial parameter vector. ",
                "Please provide an initial guess via `Executor`s `configure` method."
            )
        ))?;
        let cost = problem.cost(x0)?;
        Ok((state.cost(cost), None))
    }

    fn next_iter(
        &mut self,
        problem: &mut Problem<O>,
        state: IterState<Vector3<F>, Vector3<F>, (), (), (), F>,
    ) -> Result<(IterState<Vector3<F>, Vector3<F>, (), (), (), F>, Option<KV>), Error> {
        let param = *state.get_param().ok_or_else(argmin_error_closure!(
            NotInitialized,
            concat!(
                "`Newton` requires an initial parameter vector. ",
                "Please provide an initial guess via `Executor`s `configure` method."
            )
        ))?;

        let dif = problem.gradient(&param)?;
        let distance = dif.norm();

        // halt if point is close enough
        if distance <= self.tolerance {
            return Ok((state.param(param).cost(distance), None));
        }

        let e = problem.hessian(&param)?;
        let jacobian = [
            partial(&e, [1, 0, 0]),
            partial(&e, [0, 1, 0]),
            partial(&e, [0, 0, 1]),
        ];

        let grad = Vector3::from_fn(|a, _| jacobian[a].dot(&dif));
        let free = [0, 1, 2].map(|a| !pushes_outward(param[a], grad[a]));
        let grad = Vector3::from_fn(|a, _| if free[a] { grad[a] } else { F::zero() });

        let gauss_newton = Matrix3::from_fn(|a, b| jacobian[a].dot(&jacobian[b]));
        let hessian = Matrix3::from_fn(|a, b| {
            let mut order = [0; 3];
            order[a] += 1;
            order[b] += 1;
            gauss_newton[(a, b)] + partial(&e, order).dot(&dif)
        });

        let step = descent_step(&hessian, &gauss_newton, &grad, &free, self.gamma);
        let max_trials = self.max_backtracks + 1;
        if let Some((trial, cost)) =
            line_search(problem, &param, step, distance, max_trials, F::zero())?
        {
            return Ok((state.param(trial).cost(cost), None));
        }

        for mask in std::iter::once(free).chain(reduced_masks(&free)) {
            let step = descent_step(&hessian, &gauss_newton, &grad, &mask, self.gamma);
            if let Some((trial, cost)) =
                line_search(problem, &param, step, distance, MAX_HALVINGS, self.tolerance)?
            {
                return Ok((state.param(trial).cost(cost), None));
            }
        }

        self.stationary = true;
        Ok((state.param(param).cost(distance), None))
    }

    fn terminate(
        &mut self,
        state: &IterState<Vector3<F>, Vector3<F>, (), (), (), F>,
    ) -> TerminationStatus {
        if self.stationary {
            return TerminationStatus::Terminated(TerminationReason::SolverConverged);
        }

        if state.iter > state.max_iters {
            return TerminationStatus::Terminated(TerminationReason::MaxItersReached);
        }

        match (state.get_param(), state.get_prev_param()) {
            (Some(current_param), Some(prev_param)) => {
                let delta = (current_param - prev_param).norm();
                if delta < self.tolerance {
                    TerminationStatus::Terminated(TerminationReason::SolverConverged)
                } else {
                    TerminationStatus::NotTerminated
                }
            }
            _ => TerminationStatus::NotTerminated,
        }
    }
}

/// Upper bound on step halvings when searching down to the tolerance
const MAX_HALVINGS: usize = 64;

/// Entry of the derivative table for `[du, dv, dw]`
fn partial<T: FloatingPoint>(table: &[Vec<Vec<Vector3<T>>>], order: [usize; 3]) -> Vector3<T> {
    table[order[0]][order[1]][order[2]]
}

/// The component rests on a bound and descent would leave the domain
fn pushes_outward<T: FloatingPoint>(parameter: T, gradient: T) -> bool {
    (parameter <= T::zero() && gradient > T::zero())
        || (parameter >= T::one() && gradient < T::zero())
}

/// Step over the components in `mask`: full Newton, then Gauss-Newton, then steepest descent
fn descent_step<T: FloatingPoint>(
    hessian: &Matrix3<T>,
    gauss_newton: &Matrix3<T>,
    grad: &Vector3<T>,
    mask: &[bool; 3],
    gamma: T,
) -> Vector3<T> {
    let grad = Vector3::from_fn(|a, _| if mask[a] { grad[a] } else { T::zero() });
    let direction = [hessian, gauss_newton]
        .into_iter()
        .find_map(|h| {
            restrict(*h, mask)
                .cholesky()
                .map(|cholesky| -cholesky.solve(&grad))
        })
        .unwrap_or(-grad);
    direction * gamma
}

/// Halve `step` until the distance does not increase
///
/// Gives up after `max_trials` trials or once the step is shorter than `min_length`.
fn line_search<O, F>(
    problem: &mut Problem<O>,
    param: &Vector3<F>,
    mut step: Vector3<F>,
    distance: F,
    max_trials: usize,
    min_length: F,
) -> Result<Option<(Vector3<F>, F)>, Error>
where
    F: FloatingPoint + ArgminFloat,
    O: CostFunction<Param = Vector3<F>, Output = F>,
{
    for _ in 0..max_trials {
        if step.norm() < min_length {
            break;
        }
        let trial = (param + step).map(constrain);
        let cost = problem.cost(&trial)?;
        if cost <= distance {
            return Ok(Some((trial, cost)));
        }
        step *= float!(0.5);
    }
    Ok(None)
}

/// Non-empty proper subsets of the free components, larger first
fn reduced_masks(free: &[bool; 3]) -> Vec<[bool; 3]> {
    let mut masks: Vec<[bool; 3]> = (1..8u8)
        .map(|bits| [0, 1, 2].map(|a| bits & (1 << a) != 0))
        .filter(|mask| mask != free && (0..3).all(|a| free[a] || !mask[a]))
        .collect();
    masks.sort_by_key(|mask| std::cmp::Reverse(mask.iter().filter(|m| **m).count()));
    masks
}

/// Decouple frozen components so their step solves to zero
fn restrict<T: FloatingPoint>(mut matrix: Matrix3<T>, free: &[bool; 3]) -> Matrix3<T> {
    for a in 0..3 {
        if !free[a] {
            matrix.row_mut(a).fill(T::zero());
            matrix.column_mut(a).fill(T::zero());
            matrix[(a, a)] = T::one();
        }
    }
    matrix
}

fn constrain<T: FloatingPoint>(parameter: T) -> T {
    if parameter < T::zero() {
        T::zero()
    } else if parameter > T::one() {
        T::one()
    } else {
        parameter
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Matrix3;

    use super::{constrain, pushes_outward, reduced_masks, restrict};

    #[test]
    fn frozen_components_do_not_move() {
        let h = Matrix3::new(4., 1., 2., 1., 3., 0.5, 2., 0.5, 5.);
        let restricted = restrict(h, &[true, false, true]);
        assert_eq!(restricted[(1, 1)], 1.);
        assert_eq!(restricted[(0, 1)], 0.);
        assert_eq!(restricted[(1, 2)], 0.);
        assert_eq!(restricted[(0, 2)], 2.);
    }

    #[test]
    fn bounds() {
        assert!(pushes_outward(0., 0.3));
        assert!(!pushes_outward(0., -0.3));
        assert!(pushes_outward(1., -0.3));
        assert!(!pushes_outward(0.5, 0.3));
        assert_eq!(constrain(-0.2), 0.);
        assert_eq!(constrain(1.2), 1.);
        assert_eq!(constrain(0.4), 0.4);
    }

    #[test]
    fn reduced_masks_keep_frozen_components_frozen() {
        let masks = reduced_masks(&[true, true, true]);
        assert_eq!(masks.len(), 6);
        assert!(masks[..3].iter().all(|m| m.iter().filter(|f| **f).count() == 2));
        assert!(masks[3..].iter().all(|m| m.iter().filter(|f| **f).count() == 1));

        let masks = reduced_masks(&[true, false, true]);
        assert_eq!(masks, vec![[true, false, false], [false, false, true]]);

        assert!(reduced_masks(&[false, true, false]).is_empty());
    }
}
