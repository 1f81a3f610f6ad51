//! Control loop driver.
//!
//! Orchestrates the dynamics model and the hover controller at a fixed
//! timestep: consume goal updates, recompute the input from the current
//! state error, integrate, record the trajectory. Wall-clock pacing belongs
//! to the rendering collaborator, not to this loop.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::control::{HoverController, LqrWeights, RiccatiOptions, SynthesisError};
use crate::dynamics::{DynamicsError, Params, PlanarQuadrotor, State};
use crate::InputVector;

/// Errors surfaced by the simulation driver.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("controller synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("dynamics update failed: {0}")]
    Dynamics(#[from] DynamicsError),
}

/// Loop state. `Stopped` is terminal: once entered, stepping is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimStatus {
    Running,
    Stopped,
}

/// Simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Control and integration timestep [s]
    pub dt: f64,
    /// Total simulated duration for `run` [s]
    pub duration: f64,
    /// Goal positions are clamped to ±bound on each axis [m]
    pub position_bound: f64,
    /// State at t = 0
    pub initial_state: State,
    /// Vehicle physical parameters
    pub vehicle: Params,
    /// LQR weighting matrices
    pub weights: LqrWeights,
    /// Riccati iteration termination settings
    pub riccati: RiccatiOptions,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            dt: 0.001,
            duration: 10.0,
            position_bound: 1.0,
            initial_state: State::default(),
            vehicle: Params::default(),
            weights: LqrWeights::default(),
            riccati: RiccatiOptions::default(),
        }
    }
}

/// Record of one completed tick, handed to the rendering collaborator.
#[derive(Debug, Clone, Copy)]
pub struct SimStep {
    /// Simulation time after the tick [s]
    pub time: f64,
    /// Vehicle state after the tick
    pub state: State,
    /// Thrust pair applied during the tick
    pub input: InputVector,
}

/// Recorded flight path, one (x, y) sample per tick plus the initial pose.
#[derive(Debug, Clone, Default)]
pub struct SimHistory {
    /// Time stamps [s]
    pub times: Vec<f64>,
    /// Positions [m]
    pub positions: Vec<Vector2<f64>>,
}

impl SimHistory {
    fn record(&mut self, time: f64, state: &State) {
        self.times.push(time);
        self.positions
            .push(Vector2::new(state.position_x, state.position_y));
    }

    /// X coordinates of the path, for the plotting collaborator.
    pub fn x_coords(&self) -> Vec<f64> {
        self.positions.iter().map(|p| p.x).collect()
    }

    /// Y coordinates of the path, for the plotting collaborator.
    pub fn y_coords(&self) -> Vec<f64> {
        self.positions.iter().map(|p| p.y).collect()
    }

    /// Simulated time covered by the recording.
    pub fn duration(&self) -> f64 {
        if self.times.is_empty() {
            0.0
        } else {
            *self.times.last().unwrap() - self.times[0]
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Fixed-timestep simulation driver.
///
/// Owns the vehicle model and the synthesized controller. Gain synthesis
/// happens in [`new`], so a controller design failure surfaces before the
/// loop can start.
///
/// [`new`]: Simulator::new
pub struct Simulator {
    pub config: SimConfig,
    quadrotor: PlanarQuadrotor,
    controller: HoverController,
    time: f64,
    status: SimStatus,
    history: SimHistory,
}

impl Simulator {
    /// Builds the model from the configuration and synthesizes the hover
    /// gain for its timestep.
    pub fn new(config: SimConfig) -> Result<Self, SimulationError> {
        let quadrotor = PlanarQuadrotor::new(config.initial_state, config.vehicle);
        let controller =
            HoverController::synthesize(&quadrotor, config.dt, &config.weights, &config.riccati)?;

        let mut history = SimHistory::default();
        history.record(0.0, &quadrotor.state());

        Ok(Simulator {
            config,
            quadrotor,
            controller,
            time: 0.0,
            status: SimStatus::Running,
            history,
        })
    }

    /// Restores the initial state, clears the history, and re-enters
    /// `Running`. The synthesized gain is kept; it depends only on the
    /// vehicle parameters and the timestep.
    pub fn reset(&mut self) {
        self.quadrotor.set_state(self.config.initial_state);
        self.quadrotor.set_goal(State::default());
        self.time = 0.0;
        self.status = SimStatus::Running;
        self.history = SimHistory::default();
        self.history.record(0.0, &self.quadrotor.state());
    }

    /// Sets a hover goal at (x, y), clamped to the operating range.
    ///
    /// Clamping is silent and idempotent; out-of-range requests are
    /// corrected, never rejected.
    pub fn set_goal_position(&mut self, x: f64, y: f64) {
        let bound = self.config.position_bound;
        self.quadrotor
            .set_goal(State::hover_at(x.clamp(-bound, bound), y.clamp(-bound, bound)));
    }

    /// Sets a full goal state; position components are clamped to the
    /// operating range.
    pub fn set_goal(&mut self, mut goal: State) {
        let bound = self.config.position_bound;
        goal.position_x = goal.position_x.clamp(-bound, bound);
        goal.position_y = goal.position_y.clamp(-bound, bound);
        self.quadrotor.set_goal(goal);
    }

    /// Advances the simulation by one tick.
    ///
    /// The input is recomputed from the current state and goal before the
    /// integration step; feeding a stale input forward would be a
    /// correctness bug. Returns the step record, or `None` when stopped.
    pub fn step(&mut self) -> Result<Option<SimStep>, SimulationError> {
        if self.status == SimStatus::Stopped {
            return Ok(None);
        }

        self.controller.apply(&mut self.quadrotor);
        self.quadrotor.update(self.config.dt)?;
        self.time += self.config.dt;

        let state = self.quadrotor.state();
        self.history.record(self.time, &state);

        Ok(Some(SimStep {
            time: self.time,
            state,
            input: self.quadrotor.input(),
        }))
    }

    /// Runs until the configured duration elapses or `stop` is requested,
    /// polling `goal_source` once per tick for a new goal position.
    ///
    /// The poll is non-blocking by construction: the closure either returns
    /// a goal update or `None` immediately.
    pub fn run<F>(&mut self, mut goal_source: F) -> Result<&SimHistory, SimulationError>
    where
        F: FnMut(f64, &State) -> Option<(f64, f64)>,
    {
        while self.status == SimStatus::Running && self.time < self.config.duration {
            if let Some((x, y)) = goal_source(self.time, &self.quadrotor.state()) {
                self.set_goal_position(x, y);
            }
            self.step()?;
        }

        self.stop();
        Ok(&self.history)
    }

    /// Requests a halt; takes effect before the next tick.
    pub fn stop(&mut self) {
        self.status = SimStatus::Stopped;
    }

    pub fn status(&self) -> SimStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == SimStatus::Running
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn state(&self) -> State {
        self.quadrotor.state()
    }

    pub fn goal(&self) -> State {
        self.quadrotor.goal()
    }

    pub fn controller(&self) -> &HoverController {
        &self.controller
    }

    pub fn history(&self) -> &SimHistory {
        &self.history
    }
}
