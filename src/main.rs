//! # Voxel Streamer Demo
//!
//! Walks an observer through a generated world and prints what the streamer did.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- [config.json]
//! ```

use std::process::ExitCode;

use cgmath::Point3;
use voxel_streamer::{ChunkIndex, StreamingConfig, StreamingResult, WorldStreamer};

/// Steps per leg of the walk, in world units.
const STEP: f32 = 4.0;
const STEPS_PER_LEG: usize = 48;

fn load_config() -> StreamingResult<StreamingConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path).map_err(|e| {
                voxel_streamer::StreamingError::InvalidConfig(format!("{}: {}", path, e))
            })?;
            StreamingConfig::from_json_str(&json)
        }
        None => Ok(StreamingConfig::default()),
    }
}

fn run() -> StreamingResult<()> {
    let config = load_config()?;
    let height = config.chunk_dimensions.y as f32 * config.voxel_size / 2.0;
    let mut streamer = WorldStreamer::from_config(config, ChunkIndex::new(0, 0))?;

    // East, then south, then diagonally back north-west.
    let legs = [(1.0, 0.0), (0.0, 1.0), (-1.0, -1.0)];
    let mut observer = Point3::new(0.0, height, 0.0);
    for (dx, dz) in legs {
        for _ in 0..STEPS_PER_LEG {
            observer.x += dx * STEP;
            observer.z += dz * STEP;
            let report = streamer.tick(observer)?;
            if report.shifts > 0 {
                log::info!(
                    "Observer at ({:.0}, {:.0}): window centred on {}, {} stalls",
                    observer.x,
                    observer.z,
                    report.middle_index,
                    report.stalls
                );
            }
        }
    }

    let occupied: usize = streamer
        .loaded_chunks()
        .map(|(_, chunk)| chunk.occupied_count())
        .sum();
    streamer.persist_loaded()?;
    println!("{:#?}", streamer.stats());
    println!("Occupied cells in window: {}", occupied);
    Ok(())
}

fn main() -> ExitCode {
    voxel_streamer::init_logger();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
