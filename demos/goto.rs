use planar_quadrotor::{SimConfig, Simulator};

// Fly from the origin to a goal placed inside the operating range,
// printing the path as it is flown.
fn main() {
    let mut sim = match Simulator::new(SimConfig::default()) {
        Ok(sim) => sim,
        Err(e) => {
            println!("Controller synthesis failed: {}", e);
            return;
        }
    };

    // A goal update such as a mouse click would deliver; out-of-range
    // requests are clamped to the operating range.
    sim.set_goal_position(0.6, 0.4);

    let mut ticks = 0usize;
    while sim.time() < 6.0 {
        match sim.step() {
            Ok(Some(step)) => {
                ticks += 1;
                if ticks % 100 == 0 {
                    println!(
                        "{:.3} {:.5} {:.5}",
                        step.time, step.state.position_x, step.state.position_y
                    );
                }
            }
            Ok(None) => break,
            Err(e) => {
                println!("Simulation failed: {}", e);
                return;
            }
        }
    }
    sim.stop();

    let state = sim.state();
    println!(
        "Final position: ({:.5}, {:.5}), goal ({:.5}, {:.5})",
        state.position_x,
        state.position_y,
        sim.goal().position_x,
        sim.goal().position_y
    );
}
