use nalgebra::{Matrix2, Matrix6, Matrix6x2, Vector6};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dynamics::PlanarQuadrotor;
use crate::{GainMatrix, InputVector};

/// Errors raised while designing the feedback gain.
///
/// Both variants are fatal to controller construction: the control loop must
/// never run with an unconverged or ill-defined gain.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// The Riccati fixed-point iteration hit the iteration cap before the
    /// update fell below the tolerance.
    #[error("Riccati iteration did not converge after {iterations} iterations (residual {residual:.3e})")]
    NotConverged { iterations: usize, residual: f64 },

    /// The input cost term R + BᵀPB could not be inverted.
    #[error("input cost term R + BᵀPB is singular")]
    SingularInputCost,
}

/// Weighting matrices for the quadratic cost.
///
/// `state_cost` is the diagonal of Q, ordered like the state vector
/// [x, y, θ, ẋ, ẏ, θ̇]; `input_cost` is the full R matrix and must be
/// symmetric positive definite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LqrWeights {
    pub state_cost: Vector6<f64>,
    pub input_cost: Matrix2<f64>,
}

impl Default for LqrWeights {
    fn default() -> Self {
        LqrWeights {
            state_cost: Vector6::new(
                10.0,
                10.0,
                10.0,
                1.0,
                10.0,
                0.25 / (2.0 * std::f64::consts::PI),
            ),
            input_cost: Matrix2::new(0.1, 0.05, 0.05, 0.1),
        }
    }
}

/// Termination settings for the Riccati fixed-point iteration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiccatiOptions {
    /// Iteration stops once the max-abs element of the update is below this.
    pub tolerance: f64,
    /// Hard cap guaranteeing termination.
    pub max_iterations: usize,
}

impl Default for RiccatiOptions {
    fn default() -> Self {
        RiccatiOptions {
            tolerance: 1e-6,
            max_iterations: 100_000,
        }
    }
}

/// Discretizes a continuous-time pair (A, B) with a first-order hold.
///
/// A_d = I + dt·A, B_d = dt·B. Adequate because the control timestep is
/// small relative to the vehicle's time constants.
pub fn discretize(a: &Matrix6<f64>, b: &Matrix6x2<f64>, dt: f64) -> (Matrix6<f64>, Matrix6x2<f64>) {
    (Matrix6::identity() + a * dt, b * dt)
}

/// Solves the discrete-time algebraic Riccati equation by fixed-point
/// iteration from P₀ = Q:
///
/// P ← Q + AᵀPA - AᵀPB(R + BᵀPB)⁻¹BᵀPA
///
/// Iteration stops when the max-abs element of the update falls below
/// `options.tolerance`; hitting `options.max_iterations` first is reported
/// as [`SynthesisError::NotConverged`].
pub fn solve_dare(
    a: &Matrix6<f64>,
    b: &Matrix6x2<f64>,
    q: &Matrix6<f64>,
    r: &Matrix2<f64>,
    options: &RiccatiOptions,
) -> Result<Matrix6<f64>, SynthesisError> {
    let mut p = *q;
    let mut residual = f64::INFINITY;

    for _ in 0..options.max_iterations {
        let bt_p = b.transpose() * p;
        let s = r + bt_p * b;
        let s_inv = s.try_inverse().ok_or(SynthesisError::SingularInputCost)?;

        let p_next = q + a.transpose() * p * a - a.transpose() * p * b * s_inv * bt_p * a;

        residual = (p_next - p).abs().max();
        p = p_next;

        if residual < options.tolerance {
            return Ok(p);
        }
    }

    Err(SynthesisError::NotConverged {
        iterations: options.max_iterations,
        residual,
    })
}

/// Computes the discrete-time LQR gain K = (R + BᵀPB)⁻¹BᵀPA for the
/// discretized pair (A, B).
pub fn dlqr(
    a: &Matrix6<f64>,
    b: &Matrix6x2<f64>,
    q: &Matrix6<f64>,
    r: &Matrix2<f64>,
    options: &RiccatiOptions,
) -> Result<GainMatrix, SynthesisError> {
    let p = solve_dare(a, b, q, r, options)?;

    let bt_p = b.transpose() * p;
    let s = r + bt_p * b;
    let s_inv = s.try_inverse().ok_or(SynthesisError::SingularInputCost)?;

    Ok(s_inv * bt_p * a)
}

/// Static state-feedback controller regulating the vehicle to its goal.
///
/// Holds the gain produced by LQR synthesis around the hover point. The
/// feedback law is
///
/// input = gravity_comp - K·(state - goal)
///
/// Synthesis runs once, before the control loop starts; applying the gain
/// each tick is a single matrix-vector product.
#[derive(Debug, Clone)]
pub struct HoverController {
    gain: GainMatrix,
}

impl HoverController {
    /// Designs the hover gain for `quadrotor` at control timestep `dt`.
    ///
    /// Linearizes the model about its goal, discretizes, and solves the
    /// discrete Riccati equation with the given weights. Fails when the
    /// iteration does not converge within the cap; the returned error must
    /// abort simulation construction.
    pub fn synthesize(
        quadrotor: &PlanarQuadrotor,
        dt: f64,
        weights: &LqrWeights,
        options: &RiccatiOptions,
    ) -> Result<Self, SynthesisError> {
        let (a, b) = quadrotor.linearize();
        let (a_d, b_d) = discretize(&a, &b, dt);
        let q = Matrix6::from_diagonal(&weights.state_cost);

        let gain = dlqr(&a_d, &b_d, &q, &weights.input_cost, options)?;

        Ok(HoverController { gain })
    }

    /// Wraps an externally computed gain.
    pub fn from_gain(gain: GainMatrix) -> Self {
        HoverController { gain }
    }

    pub fn gain(&self) -> &GainMatrix {
        &self.gain
    }

    /// Computes the corrective thrust pair for the current state error.
    pub fn feedback(&self, quadrotor: &PlanarQuadrotor) -> InputVector {
        quadrotor.gravity_comp_input() - self.gain * quadrotor.control_state()
    }

    /// Recomputes the input from the *current* state and goal and stores it
    /// on the model, ready for the next integration step.
    pub fn apply(&self, quadrotor: &mut PlanarQuadrotor) {
        let input = self.feedback(quadrotor);
        quadrotor.set_input(input);
    }
}
