use crate::Real;
use itertools::Itertools;
use log::{debug, info, warn};
use nalgebra::{DVector, DVectorView};
use numeric_literals::replace_float_literals;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// A sizing problem with a single objective and a single linear resource constraint.
///
/// The objective is assumed to decrease as any design variable grows (e.g. compliance),
/// and the constraint is assumed to be linear with positive gradient (e.g. volume).
pub trait DesignProblem<T: Real> {
    fn num_variables(&self) -> usize;

    /// Returns `(objective, constraint)` at `x`.
    fn evaluate(&self, x: DVectorView<T>) -> Result<(T, T), Box<dyn Error + Send + Sync>>;

    /// Returns the gradients `(d objective / dx, d constraint / dx)` at `x`.
    fn evaluate_gradients(
        &self,
        x: DVectorView<T>,
    ) -> Result<(DVector<T>, DVector<T>), Box<dyn Error + Send + Sync>>;
}

impl<T, P> DesignProblem<T> for &P
where
    T: Real,
    P: DesignProblem<T>,
{
    fn num_variables(&self) -> usize {
        P::num_variables(self)
    }

    fn evaluate(&self, x: DVectorView<T>) -> Result<(T, T), Box<dyn Error + Send + Sync>> {
        P::evaluate(self, x)
    }

    fn evaluate_gradients(
        &self,
        x: DVectorView<T>,
    ) -> Result<(DVector<T>, DVector<T>), Box<dyn Error + Send + Sync>> {
        P::evaluate_gradients(self, x)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OptimalityCriteriaSettings<T> {
    pub lower_bound: T,
    pub upper_bound: T,
    /// Exponent applied to the optimality ratio in each update.
    pub damping: T,
    /// Largest relative change of a single variable per iteration.
    pub move_limit: T,
    /// Converged when the largest relative change of any variable drops below this value.
    pub tolerance: T,
    pub max_iterations: Option<usize>,
}

impl<T: Real> Default for OptimalityCriteriaSettings<T> {
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    fn default() -> Self {
        Self {
            lower_bound: 0.01,
            upper_bound: 10.0,
            damping: 0.25,
            move_limit: 0.5,
            tolerance: 1e-8,
            max_iterations: Some(500),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptimizationResult<T: Real> {
    pub solution: DVector<T>,
    pub objective: T,
    pub constraint: T,
    pub iterations: usize,
}

#[derive(Debug)]
pub enum OptimizationError {
    /// The initial guess does not match the problem dimension.
    DimensionMismatch { expected: usize, actual: usize },
    /// Evaluating the problem or its gradients failed.
    EvaluationError(Box<dyn Error + Send + Sync>),
    /// The procedure failed because the maximum number of iterations was reached.
    MaximumIterationsReached(usize),
}

impl Display for OptimizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            OptimizationError::DimensionMismatch { expected, actual } => {
                write!(f, "Initial guess has {} variables, problem has {}.", actual, expected)
            }
            OptimizationError::EvaluationError(err) => {
                write!(f, "Failed to evaluate design problem. Error: {}", err)
            }
            OptimizationError::MaximumIterationsReached(maxit) => {
                write!(f, "Failed to converge within maximum number of iterations ({}).", maxit)
            }
        }
    }
}

impl Error for OptimizationError {}

/// Minimizes the objective of `problem` subject to `constraint(x) = target`
/// and the bounds in `settings`, starting from `x0`.
///
/// Each iteration performs the classic optimality criteria update
/// $$ x_i \leftarrow x_i \left( \frac{-\partial_i f}{\lambda \, \partial_i g} \right)^\eta, $$
/// where the multiplier $\lambda$ is found by bisection such that the linearized constraint
/// is satisfied, and the update is clamped to the bounds and move limits.
pub fn optimize<T, P>(
    problem: P,
    x0: DVector<T>,
    target: T,
    settings: &OptimalityCriteriaSettings<T>,
) -> Result<OptimizationResult<T>, OptimizationError>
where
    T: Real,
    P: DesignProblem<T>,
{
    let n = problem.num_variables();
    if x0.len() != n {
        return Err(OptimizationError::DimensionMismatch {
            expected: n,
            actual: x0.len(),
        });
    }

    let mut x = x0;
    let mut iter = 0;

    loop {
        let (objective, constraint) = problem
            .evaluate(DVectorView::from(&x))
            .map_err(OptimizationError::EvaluationError)?;

        if settings
            .max_iterations
            .map(|max_iter| iter == max_iter)
            .unwrap_or(false)
        {
            warn!(
                "Optimality criteria stopped after {} iterations (objective {}, constraint {})",
                iter, objective, constraint
            );
            return Err(OptimizationError::MaximumIterationsReached(iter));
        }

        let (df, dg) = problem
            .evaluate_gradients(DVectorView::from(&x))
            .map_err(OptimizationError::EvaluationError)?;

        let x_new = update_design(&x, &df, &dg, constraint, target, settings);
        let change = relative_change(&x, &x_new);
        x = x_new;
        iter += 1;
        info!(
            "OC iteration {}: objective = {}, constraint = {}, change = {}",
            iter, objective, constraint, change
        );

        if change <= settings.tolerance {
            let (objective, constraint) = problem
                .evaluate(DVectorView::from(&x))
                .map_err(OptimizationError::EvaluationError)?;
            return Ok(OptimizationResult {
                solution: x,
                objective,
                constraint,
                iterations: iter,
            });
        }
    }
}

/// Computes a single optimality criteria update of `x`.
///
/// The constraint is linearized about `x` with value `g` and gradient `dg`, and the multiplier
/// is chosen so that the linearized constraint of the updated design equals `target`.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn update_design<T: Real>(
    x: &DVector<T>,
    df: &DVector<T>,
    dg: &DVector<T>,
    g: T,
    target: T,
    settings: &OptimalityCriteriaSettings<T>,
) -> DVector<T> {
    assert_eq!(x.len(), df.len());
    assert_eq!(x.len(), dg.len());

    let candidate = |lambda: T| -> DVector<T> {
        DVector::from_fn(x.len(), |i, _| {
            let x_i = x[i];
            // Variables whose increase would not reduce the objective are driven to the lower limit
            let ratio = T::max(-df[i], T::zero()) / (lambda * dg[i]);
            let lower = T::max(settings.lower_bound, x_i * (1.0 - settings.move_limit));
            let upper = T::min(settings.upper_bound, x_i * (1.0 + settings.move_limit));
            (x_i * ratio.powf(settings.damping)).clamp(lower, upper)
        })
    };
    let linearized_constraint = |x_new: &DVector<T>| g + dg.dot(&(x_new - x));

    // Initial guess for the multiplier balances the average sensitivities
    let n = T::from_usize(x.len().max(1)).expect("usize must fit in T");
    let df_mean = df.iter().map(|d| T::max(-*d, T::zero())).fold(T::zero(), |a, b| a + b) / n;
    let dg_mean = dg.iter().fold(T::zero(), |a, b| a + *b) / n;
    let guess = if df_mean > T::zero() && dg_mean > T::zero() {
        df_mean / dg_mean
    } else {
        1.0
    };

    // Larger multipliers shrink the design, so expand the bracket until it encloses the target
    let mut lambda_low = guess;
    let mut lambda_high = guess;
    for _ in 0..64 {
        if linearized_constraint(&candidate(lambda_low)) >= target {
            break;
        }
        lambda_low *= 0.1;
    }
    for _ in 0..64 {
        if linearized_constraint(&candidate(lambda_high)) <= target {
            break;
        }
        lambda_high *= 10.0;
    }

    // Bisect in log space since the multiplier can span many orders of magnitude
    let mut iterations = 0;
    while lambda_high / lambda_low - 1.0 > 1e-14 && iterations < 200 {
        let lambda_mid = (lambda_low * lambda_high).sqrt();
        if linearized_constraint(&candidate(lambda_mid)) > target {
            lambda_low = lambda_mid;
        } else {
            lambda_high = lambda_mid;
        }
        iterations += 1;
    }
    debug!(
        "OC multiplier bisection finished after {} iterations (lambda = {})",
        iterations, lambda_high
    );

    candidate((lambda_low * lambda_high).sqrt())
}

fn relative_change<T: Real>(x_old: &DVector<T>, x_new: &DVector<T>) -> T {
    x_old
        .iter()
        .zip_eq(x_new.iter())
        .map(|(old, new)| (*new - *old).abs() / old.abs())
        .fold(T::zero(), T::max)
}
