use fast_ode;
use nalgebra::{Matrix6, Matrix6x2, Vector2, Vector6};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{InputVector, StateVector, GRAVITY};

/// Tolerance handed to the ODE solver for a single control timestep.
const ODE_TOLERANCE: f64 = 1e-9;

/// Errors raised while advancing the vehicle state.
#[derive(Debug, Error)]
pub enum DynamicsError {
    /// The solver gave up before reaching the end of the timestep.
    #[error("integration failed before reaching the end of the timestep")]
    IntegrationFailed,
}

/// Represents the complete state of a planar quadrotor.
///
/// The vehicle moves in a vertical plane, so its pose is a 2D position plus
/// a single tilt angle. Velocities mirror the pose components.
///
/// # Fields
///
/// * `position_x`, `position_y` - Position in the world frame (meters)
/// * `angle` - Tilt from the upright attitude (radians, positive counter-clockwise)
/// * `velocity_x`, `velocity_y` - Linear velocities in the world frame (m/s)
/// * `angular_velocity` - Tilt rate (rad/s)
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub position_x: f64,
    pub position_y: f64,
    pub angle: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
    pub angular_velocity: f64,
}

impl State {
    /// A goal pose hovering at the given position, upright and at rest.
    pub fn hover_at(x: f64, y: f64) -> Self {
        State {
            position_x: x,
            position_y: y,
            ..State::default()
        }
    }

    /// Converts the state structure to a fixed-size array.
    ///
    /// Component order is [x, y, angle, vx, vy, angular rate], the order used
    /// by every matrix in the crate.
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.position_x,
            self.position_y,
            self.angle,
            self.velocity_x,
            self.velocity_y,
            self.angular_velocity,
        ]
    }

    /// Creates a state structure from a fixed-size array.
    ///
    /// Inverse of `to_array`, typically used after numerical integration to
    /// convert back from the solver's array format.
    pub fn from_array(arr: &[f64; 6]) -> Self {
        State {
            position_x: arr[0],
            position_y: arr[1],
            angle: arr[2],
            velocity_x: arr[3],
            velocity_y: arr[4],
            angular_velocity: arr[5],
        }
    }

    /// Converts the state to a 6-vector for matrix arithmetic.
    pub fn to_vector(&self) -> StateVector {
        Vector6::from_column_slice(&self.to_array())
    }

    /// Creates a state from a 6-vector.
    pub fn from_vector(v: &StateVector) -> Self {
        State {
            position_x: v[0],
            position_y: v[1],
            angle: v[2],
            velocity_x: v[3],
            velocity_y: v[4],
            angular_velocity: v[5],
        }
    }
}

/// Physical constants and properties of the vehicle.
///
/// # Fields
///
/// * `mass` - Total mass (kg)
/// * `inertia` - Moment of inertia about the body axis (kg⋅m²)
/// * `arm_length` - Half-width between the two rotors (m)
/// * `g` - Gravitational acceleration (m/s²)
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Params {
    pub mass: f64,
    pub inertia: f64,
    pub arm_length: f64,
    pub g: f64,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            mass: 1.0,
            inertia: 0.01,
            arm_length: 0.2,
            g: GRAVITY,
        }
    }
}

/// Ordinary Differential Equation (ODE) system for the planar quadrotor.
///
/// Holds the physical parameters and the thrust pair commanded for the
/// current timestep; the thrusts are held constant while the solver runs.
pub struct PlanarOde {
    pub params: Params,
    pub input: InputVector,
}

impl fast_ode::DifferentialEquation<6> for PlanarOde {
    /// Computes the time derivatives of the state vector.
    ///
    /// Equations of motion for two rotors at distance `arm_length` either
    /// side of the center of mass:
    ///
    /// ẍ = -(u1 + u2)·sin(θ)/m
    /// ÿ = (u1 + u2)·cos(θ)/m - g
    /// θ̈ = ℓ·(u2 - u1)/I
    ///
    /// The first three derivative components are the kinematic rows: the
    /// velocities feed the pose derivatives directly.
    fn ode_dot_y(&self, _t: f64, y: &fast_ode::Coord<6>) -> (fast_ode::Coord<6>, bool) {
        let state = State::from_array(&y.0);
        let dot = vector_field(&self.params, &state, &self.input);

        let mut dot_y = [0.0; 6];
        dot_y.copy_from_slice(dot.as_slice());

        (fast_ode::Coord(dot_y), true)
    }
}

/// Evaluates the nonlinear vector field f(state, input).
fn vector_field(params: &Params, state: &State, input: &InputVector) -> StateVector {
    let thrust = input[0] + input[1];
    let sin_theta = state.angle.sin();
    let cos_theta = state.angle.cos();

    Vector6::new(
        state.velocity_x,
        state.velocity_y,
        state.angular_velocity,
        -thrust * sin_theta / params.mass,
        thrust * cos_theta / params.mass - params.g,
        params.arm_length * (input[1] - input[0]) / params.inertia,
    )
}

/// Planar quadrotor model.
///
/// Owns the vehicle state, the goal pose, and the thrust pair commanded for
/// the current control cycle. The state changes only through [`update`] or
/// [`set_state`]; everything else is read-only.
///
/// [`update`]: PlanarQuadrotor::update
/// [`set_state`]: PlanarQuadrotor::set_state
#[derive(Clone, Copy, Debug)]
pub struct PlanarQuadrotor {
    state: State,
    goal: State,
    input: InputVector,
    params: Params,
}

impl PlanarQuadrotor {
    pub fn new(initial_state: State, params: Params) -> Self {
        PlanarQuadrotor {
            state: initial_state,
            goal: State::default(),
            input: Vector2::zeros(),
            params,
        }
    }

    /// Current state. No side effects; repeated calls return identical values.
    pub fn state(&self) -> State {
        self.state
    }

    pub fn set_state(&mut self, state: State) {
        self.state = state;
    }

    /// Desired state, zero by default (hover at the origin).
    pub fn goal(&self) -> State {
        self.goal
    }

    pub fn set_goal(&mut self, goal: State) {
        self.goal = goal;
    }

    pub fn params(&self) -> Params {
        self.params
    }

    /// Thrust pair commanded for the next integration step.
    pub fn input(&self) -> InputVector {
        self.input
    }

    pub fn set_input(&mut self, input: InputVector) {
        self.input = input;
    }

    /// Deviation of the current state from the goal, the error signal fed to
    /// the feedback controller.
    pub fn control_state(&self) -> StateVector {
        self.state.to_vector() - self.goal.to_vector()
    }

    /// The thrust pair that exactly cancels gravity at zero tilt.
    ///
    /// For a symmetric two-rotor vehicle both rotors carry half the weight,
    /// u1 = u2 = m·g/2. This is the open-loop operating point the system is
    /// linearized about.
    pub fn gravity_comp_input(&self) -> InputVector {
        let half_weight = self.params.mass * self.params.g / 2.0;
        Vector2::new(half_weight, half_weight)
    }

    /// Evaluates the nonlinear equations of motion at an arbitrary state and
    /// input, without touching the stored state.
    pub fn derivative(&self, state: &State, input: &InputVector) -> StateVector {
        vector_field(&self.params, state, input)
    }

    /// Linearizes the dynamics about the hover operating point.
    ///
    /// Returns the Jacobians (A, B) of the equations of motion with respect
    /// to state and input, evaluated at State = Goal and
    /// Input = [`gravity_comp_input`]. The trigonometric terms are evaluated
    /// at the goal angle; for the conventional upright goal (θ = 0) the
    /// matrices reduce to the closed form
    ///
    /// A: kinematic identity coupling plus ∂ẍ/∂θ = -(u1+u2)/m
    /// B: ∂ÿ/∂u = 1/m on both columns, ∂θ̈/∂u1 = -ℓ/I, ∂θ̈/∂u2 = ℓ/I
    ///
    /// [`gravity_comp_input`]: PlanarQuadrotor::gravity_comp_input
    pub fn linearize(&self) -> (Matrix6<f64>, Matrix6x2<f64>) {
        let input = self.gravity_comp_input();
        let thrust = input[0] + input[1];
        let sin_theta = self.goal.angle.sin();
        let cos_theta = self.goal.angle.cos();

        let mut a = Matrix6::zeros();
        a[(0, 3)] = 1.0;
        a[(1, 4)] = 1.0;
        a[(2, 5)] = 1.0;
        a[(3, 2)] = -thrust * cos_theta / self.params.mass;
        a[(4, 2)] = -thrust * sin_theta / self.params.mass;

        let mut b = Matrix6x2::zeros();
        b[(3, 0)] = -sin_theta / self.params.mass;
        b[(3, 1)] = -sin_theta / self.params.mass;
        b[(4, 0)] = cos_theta / self.params.mass;
        b[(4, 1)] = cos_theta / self.params.mass;
        b[(5, 0)] = -self.params.arm_length / self.params.inertia;
        b[(5, 1)] = self.params.arm_length / self.params.inertia;

        (a, b)
    }

    /// Integrates the nonlinear dynamics forward by `dt` under the currently
    /// stored input.
    ///
    /// The thrusts are held constant over the step (zero-order hold) and the
    /// state is advanced by the adaptive solver, then written back.
    pub fn update(&mut self, dt: f64) -> Result<(), DynamicsError> {
        let ode = PlanarOde {
            params: self.params,
            input: self.input,
        };

        let result = fast_ode::solve_ivp(
            &ode,
            (0.0, dt),
            fast_ode::Coord(self.state.to_array()),
            |_, _| true,
            ODE_TOLERANCE,
            ODE_TOLERANCE * 10.0,
        );

        match result {
            fast_ode::IvpResult::FinalTimeReached(final_coord) => {
                self.state = State::from_array(&final_coord.0);
                Ok(())
            }
            _ => Err(DynamicsError::IntegrationFailed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Tests that the gravity-compensated input is an equilibrium.
    ///
    /// At zero tilt with zero velocities and both rotors carrying half the
    /// weight, every component of the state derivative must vanish.
    #[test]
    fn test_hover_equilibrium() {
        let quadrotor = PlanarQuadrotor::new(State::default(), Params::default());
        let input = quadrotor.gravity_comp_input();

        let dot = quadrotor.derivative(&State::default(), &input);

        assert_relative_eq!(dot, Vector6::zeros(), epsilon = 1e-12);
    }

    /// Tests free fall dynamics with no applied thrust.
    ///
    /// Verifies the gravitational acceleration is correctly implemented by
    /// comparing against the analytical drop y = -0.5*g*t².
    #[test]
    fn test_free_fall() {
        let params = Params::default();
        let mut quadrotor = PlanarQuadrotor::new(State::default(), params);
        quadrotor.set_input(Vector2::zeros());

        let t = 1.0;
        quadrotor.update(t).unwrap();

        let expected_y = -0.5 * params.g * t * t;
        let expected_vy = -params.g * t;

        let state = quadrotor.state();
        assert_relative_eq!(state.position_y, expected_y, epsilon = 1e-6);
        assert_relative_eq!(state.velocity_y, expected_vy, epsilon = 1e-6);
        assert_relative_eq!(state.position_x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(state.angle, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_gravity_comp_input() {
        let params = Params {
            mass: 2.5,
            ..Params::default()
        };
        let quadrotor = PlanarQuadrotor::new(State::default(), params);

        let input = quadrotor.gravity_comp_input();

        assert_relative_eq!(input[0], 2.5 * params.g / 2.0, epsilon = 1e-12);
        assert_relative_eq!(input[0], input[1], epsilon = 1e-12);
    }

    /// The Jacobians at the upright goal must match the closed form for any
    /// parameter set.
    #[test]
    fn test_linearize_closed_form() {
        let params = Params {
            mass: 2.5,
            inertia: 0.04,
            arm_length: 0.3,
            g: 9.81,
        };
        let quadrotor = PlanarQuadrotor::new(State::default(), params);

        let (a, b) = quadrotor.linearize();

        let mut a_expected = Matrix6::zeros();
        a_expected[(0, 3)] = 1.0;
        a_expected[(1, 4)] = 1.0;
        a_expected[(2, 5)] = 1.0;
        a_expected[(3, 2)] = -params.g;

        let mut b_expected = Matrix6x2::zeros();
        b_expected[(4, 0)] = 1.0 / params.mass;
        b_expected[(4, 1)] = 1.0 / params.mass;
        b_expected[(5, 0)] = -params.arm_length / params.inertia;
        b_expected[(5, 1)] = params.arm_length / params.inertia;

        assert_relative_eq!(a, a_expected, epsilon = 1e-12);
        assert_relative_eq!(b, b_expected, epsilon = 1e-12);
    }

    /// Cross-checks the analytic Jacobians against central differences of
    /// the nonlinear vector field.
    #[test]
    fn test_linearize_matches_finite_differences() {
        let quadrotor = PlanarQuadrotor::new(State::default(), Params::default());
        let (a, b) = quadrotor.linearize();

        let operating_state = quadrotor.goal();
        let operating_input = quadrotor.gravity_comp_input();
        let h = 1e-6;

        for j in 0..6 {
            let mut plus = operating_state.to_vector();
            let mut minus = operating_state.to_vector();
            plus[j] += h;
            minus[j] -= h;

            let column = (quadrotor.derivative(&State::from_vector(&plus), &operating_input)
                - quadrotor.derivative(&State::from_vector(&minus), &operating_input))
                / (2.0 * h);

            assert_relative_eq!(a.column(j).into_owned(), column, epsilon = 1e-6);
        }

        for j in 0..2 {
            let mut plus = operating_input;
            let mut minus = operating_input;
            plus[j] += h;
            minus[j] -= h;

            let column = (quadrotor.derivative(&operating_state, &plus)
                - quadrotor.derivative(&operating_state, &minus))
                / (2.0 * h);

            assert_relative_eq!(b.column(j).into_owned(), column, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_control_state_is_error_from_goal() {
        let mut quadrotor = PlanarQuadrotor::new(State::hover_at(0.4, -0.2), Params::default());
        quadrotor.set_goal(State::hover_at(1.0, 1.0));

        let error = quadrotor.control_state();

        assert_relative_eq!(error[0], -0.6, epsilon = 1e-12);
        assert_relative_eq!(error[1], -1.2, epsilon = 1e-12);
        assert_relative_eq!(error[2], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_state_accessor_is_idempotent() {
        let quadrotor = PlanarQuadrotor::new(State::hover_at(0.1, 0.2), Params::default());

        assert_eq!(quadrotor.state(), quadrotor.state());
    }
}
