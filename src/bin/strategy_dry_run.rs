use anyhow::Result;
use clap::Parser;
use game_planner::{
    configuration::AppConfig,
    context::{Camp, GameContext},
    logging,
    strategy::{build_strategy, SelectionMode, StrategyKind},
};
use std::path::PathBuf;
use tracing::*;

#[derive(Parser, Debug)]
#[command(
    version,
    author = "David M. Weis <dweis7@gmail.com>",
    about = "Print the order a strategy would run its actions in"
)]
struct Args {
    /// path to config
    #[arg(long)]
    config: Option<PathBuf>,

    /// strategy to simulate, defaults to the configured one
    #[arg(long)]
    strategy: Option<StrategyKind>,

    /// camp the poses are mirrored for, defaults to the configured one
    #[arg(long)]
    camp: Option<Camp>,

    /// greedy or lookahead, defaults to the configured one
    #[arg(long)]
    selection: Option<SelectionMode>,

    /// lookahead depth
    #[arg(long)]
    depth: Option<usize>,

    /// stop after this many actions
    #[arg(long, default_value_t = 50)]
    max_actions: usize,

    /// Sets the level of verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbosity: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::setup_tracing(args.verbosity);

    let config = AppConfig::load_config(&args.config)?;
    let kind = args.strategy.unwrap_or(config.planner.strategy_kind);
    let camp = args.camp.unwrap_or(config.game.camp);
    let mut strategy = build_strategy(kind, &config.strategy, camp).with_mode(
        args.selection.unwrap_or(config.strategy.selection),
        args.depth.unwrap_or(config.strategy.goap_depth),
    );
    let mut game = GameContext::new(config.planner.robot_id, &config.game);
    game.camp = camp;
    game.pose_current = game.start_pose(config.obstacles.robot_width);
    game.playing = true;

    info!(
        "Simulating {:?} for {:?} with {:?} selection",
        kind,
        camp,
        strategy.mode()
    );
    let mut step = 0;
    while game.countdown > 0.0 && step < args.max_actions {
        let Some(action) = strategy.get_next_action(&game) else {
            info!("No action left");
            break;
        };
        step += 1;
        let name = action.name.clone();
        let evaluation = action.evaluate(&mut game, &mut strategy);
        let travel_time = if game.average_speed > 0.0 {
            evaluation.distance / game.average_speed
        } else {
            0.0
        };
        game.last_countdown = game.countdown;
        game.countdown -= evaluation.hook_time.as_secs_f64() + travel_time;
        println!(
            "{:>3} {:>7.1}s  score {:>4}  {}",
            step,
            game.countdown.max(0.0),
            game.score,
            name
        );
    }
    println!("Final score {}", game.score);
    Ok(())
}
