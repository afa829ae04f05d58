//! Gravbots entry point
//!
//! Runs a demo match between the built-in bots on the in-process reference
//! substrate: seeded spawn placement, a fixed number of ticks, faults and
//! events logged as they happen.

use std::f32::consts::PI;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use gravbots::config::SimConfig;
use gravbots::sandbox::native::NativeSubstrate;
use gravbots::sim::{Body, Match, Rotor};

const DEMO_TICKS: u64 = 600;
const DEMO_BOTS: [&str; 2] = ["rammer", "orbiter"];

fn main() {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => SimConfig::load(std::path::Path::new(&path)),
        None => SimConfig::default(),
    };
    log::info!("Starting demo match with seed {}", config.seed);

    let mut rng = Pcg32::seed_from_u64(config.seed);
    let mut game = Match::new(config.clone(), NativeSubstrate::with_demo_bots())
        .expect("demo config is valid");

    // Spawn away from the center (where gravity is most violent) and away
    // from the walls
    let center = (config.bounds.min + config.bounds.max) / 2.0;
    let half_extent = (config.bounds.max - config.bounds.min).min_element() / 2.0;
    for name in DEMO_BOTS {
        let pos = center
            + gravbots::polar_to_cartesian(
                rng.random_range(0.3..0.8) * half_extent,
                rng.random_range(-PI..PI),
            );
        let mut body = Body::new(pos);
        body.rot = Rotor::from_angle(rng.random_range(-PI..PI));
        body.old_rot = body.rot;

        let id = game.add_body(body).expect("spawn lies inside the boundary");
        match game.add_pilot(name, name.as_bytes(), id) {
            Ok(bot) => log::info!("{name} flying body {id:?} as {bot:?}"),
            Err(e) => log::error!("bot `{name}` rejected: {e}"),
        }
    }

    for _ in 0..DEMO_TICKS {
        match game.step() {
            Ok(summary) => {
                for event in &summary.events {
                    log::info!("tick {}: {:?}", summary.tick, event);
                }
            }
            Err(e) => {
                log::error!("Match aborted: {e}");
                break;
            }
        }
    }
    game.finish();

    for (index, body) in game.bodies().iter().enumerate() {
        log::info!(
            "body {index}: pos ({:.3}, {:.3}), heading {:.2} rad",
            body.pos.x,
            body.pos.y,
            body.rot.angle()
        );
    }
}
