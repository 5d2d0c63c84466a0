use anyhow::Result;
use clap::Parser;
use game_planner::{
    configuration, error::ErrorWrapper, logging, planner::Planner, planner::PlannerCommand,
    shared::SharedMemory, transport::start_command_bridge, transport::ZenohEventPublisher,
};
use std::{path::PathBuf, sync::Arc};
use tracing::{error, info};
use zenoh::prelude::r#async::*;

#[derive(Parser, Debug)]
#[command(
    version,
    author = "David M. Weis <dweis7@gmail.com>",
    about = "Game planner"
)]
struct Args {
    /// path to config
    #[arg(long)]
    config: Option<PathBuf>,

    /// overrides the robot id from config
    #[arg(long)]
    robot_id: Option<u8>,

    /// Sets the level of verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbosity: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::setup_tracing(args.verbosity);

    let mut app_config = configuration::AppConfig::load_config(&args.config)?;
    if let Some(robot_id) = args.robot_id {
        app_config.planner.robot_id = robot_id;
    }
    let robot_id = app_config.planner.robot_id;

    // zenoh
    let zenoh_config = app_config.zenoh.get_zenoh_config()?;
    let zenoh_session = zenoh::open(zenoh_config)
        .res()
        .await
        .map_err(ErrorWrapper::ZenohError)?
        .into_arc();

    let shared = Arc::new(SharedMemory::new(
        robot_id,
        app_config.game.avoidance_strategy,
        app_config.avoidance.path_refresh_interval(),
        app_config.game.table.bounds(),
    ));

    let (command_tx, command_rx) = tokio::sync::mpsc::unbounded_channel();
    start_command_bridge(
        zenoh_session.clone(),
        &app_config.zenoh,
        robot_id,
        command_tx.clone(),
    )
    .await?;

    let publisher = Arc::new(ZenohEventPublisher::new(
        zenoh_session,
        &app_config.zenoh,
        robot_id,
    ));
    let planner = Planner::new(app_config, shared, publisher, command_tx.clone());
    let running = tokio::spawn(planner.run(command_rx));

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    if command_tx.send(PlannerCommand::Shutdown).is_err() {
        error!("Planner already stopped");
    }
    running.await?;

    Ok(())
}
