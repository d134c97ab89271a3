//! Reel Reshuffle demo
//!
//! Runs one full reshuffle on a 5x3 grid with simulated frame times and
//! prints the run report as JSON.
//!
//! Usage: `reel-reshuffle [settings.json] [seed]`

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_pcg::Pcg32;

use reel_reshuffle::consts::*;
use reel_reshuffle::{
    ColumnOrder, EngineStatus, HookPoint, LoggedPresentation, ReshuffleEngine, ReshuffleSettings,
    RollupMeter, RoundOutcome, VecGrid,
};

const SYMBOLS: &[&str] = &["TEN", "JACK", "QUEEN", "KING", "ACE", "BELL", "WILD"];
const VARIANT: &str = "WILD_TRANSFORMING";

/// Simulated display refresh (uneven on purpose so substeps get exercised)
const FRAME_TIMES: [f32; 4] = [1.0 / 60.0, 1.0 / 58.0, 1.0 / 61.0, 1.0 / 30.0];

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let mut settings = match args.next() {
        Some(path) => match ReshuffleSettings::load(&path) {
            Ok(settings) => settings,
            Err(err) => {
                log::error!("Failed to load settings from {path}: {err}");
                std::process::exit(1);
            }
        },
        None => ReshuffleSettings::default(),
    };
    if let Some(seed) = args.next().and_then(|s| s.parse().ok()) {
        settings.seed = seed;
    }

    let mut rng = Pcg32::seed_from_u64(settings.seed);
    let mut names: Vec<String> = (0..DEFAULT_COLUMNS * DEFAULT_ROWS)
        .map(|i| match i {
            3 | 11 => VARIANT.to_string(),
            _ => SYMBOLS[i % SYMBOLS.len()].to_string(),
        })
        .collect();

    let start: Vec<Vec<String>> = names.chunks(DEFAULT_ROWS).map(<[String]>::to_vec).collect();
    names.shuffle(&mut rng);
    let mut server_columns: Vec<Vec<String>> =
        names.chunks(DEFAULT_ROWS).map(<[String]>::to_vec).collect();
    if settings.server_column_order == ColumnOrder::BottomUp {
        for col in &mut server_columns {
            col.reverse();
        }
    }

    let round = RoundOutcome {
        reshuffled_layout: server_columns,
        win_amount: 120,
        sub_outcomes_displayed: false,
    };

    let mut grid = VecGrid::from_columns(&start);
    let mut meter = RollupMeter::from_settings(&settings);
    let mut fx = LoggedPresentation::new();
    let mut engine = ReshuffleEngine::new(settings);

    if !engine.needs_reshuffle(&round, HookPoint::BeforeOutcomeDisplay) {
        log::info!("Nothing to reshuffle");
        return;
    }
    if let Err(err) = engine.begin(&round, &grid, false) {
        log::error!("Reshuffle rejected: {err}");
        std::process::exit(1);
    }

    let mut accumulator = 0.0;
    let mut frame = 0usize;
    let report = 'frames: loop {
        let dt = FRAME_TIMES[frame % FRAME_TIMES.len()].min(0.1);
        frame += 1;
        accumulator += dt;
        meter.advance(dt);

        let mut substeps = 0;
        while accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            let status = engine.tick(&mut grid, &mut meter, &mut fx, SIM_DT);
            if let EngineStatus::Finished(report) = status {
                break 'frames report;
            }
            accumulator -= SIM_DT;
            substeps += 1;
        }

        if frame > 60 * 120 {
            log::error!("Reshuffle did not settle within two minutes of frames");
            std::process::exit(1);
        }
    };

    log::info!(
        "Settled after {frame} frames; trails spawned {} released {}",
        fx.spawned_trails(),
        fx.released_trails()
    );
    for row in 0..DEFAULT_ROWS {
        let line: Vec<String> = (0..DEFAULT_COLUMNS)
            .map(|col| {
                grid.element(col, row)
                    .map(|e| format!("{:>18}", e.name))
                    .unwrap_or_else(|| format!("{:>18}", "-"))
            })
            .collect();
        println!("{}", line.join(" "));
    }
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(err) => log::error!("Failed to serialize report: {err}"),
    }
}
