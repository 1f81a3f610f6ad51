use planar_quadrotor::{SimConfig, Simulator, State};

// Regulate a perturbed start back to hover at the origin.
fn main() {
    let config = SimConfig {
        duration: 5.0,
        initial_state: State {
            position_x: 0.4,
            position_y: -0.3,
            angle: 0.1,
            ..State::default()
        },
        ..SimConfig::default()
    };

    let mut sim = match Simulator::new(config) {
        Ok(sim) => sim,
        Err(e) => {
            println!("Controller synthesis failed: {}", e);
            return;
        }
    };

    match sim.run(|_, _| None) {
        Ok(history) => {
            println!(
                "Recorded {} samples over {:.3} s",
                history.len(),
                history.duration()
            );
        }
        Err(e) => {
            println!("Simulation failed: {}", e);
            return;
        }
    }

    let state = sim.state();
    println!(
        "Final position: ({:.5}, {:.5})",
        state.position_x, state.position_y
    );
    println!("Final tilt: {:.5} rad", state.angle);
    println!(
        "Final velocity: ({:.5}, {:.5})",
        state.velocity_x, state.velocity_y
    );
}
