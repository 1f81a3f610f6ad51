//! # Planar Quadrotor
//!
//! Simulation of a planar (2-D) quadrotor stabilized around hover by a
//! discrete-time LQR controller.
//!
//! ## Modules
//!
//! - [`dynamics`]: vehicle state, nonlinear equations of motion,
//!   linearization, forward integration
//! - [`control`]: discrete Riccati solve and hover gain synthesis
//! - [`simulation`]: fixed-timestep control loop driver and trajectory
//!   recording

pub mod control;
pub mod dynamics;
pub mod simulation;

use nalgebra::{Matrix2x6, Vector2, Vector6};

pub use control::{HoverController, LqrWeights, RiccatiOptions, SynthesisError};
pub use dynamics::{DynamicsError, Params, PlanarQuadrotor, State};
pub use simulation::{
    SimConfig, SimHistory, SimStatus, SimStep, SimulationError, Simulator,
};

/// State-space vector type, ordered [x, y, θ, ẋ, ẏ, θ̇]
pub type StateVector = Vector6<f64>;

/// Thrust input vector type (u1, u2)
pub type InputVector = Vector2<f64>;

/// Feedback gain type mapping a state error to an input correction
pub type GainMatrix = Matrix2x6<f64>;

/// Gravity constant [m/s²]
pub const GRAVITY: f64 = 9.81;
