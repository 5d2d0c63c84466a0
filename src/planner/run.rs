use std::{sync::Arc, time::Duration};
use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    time::Instant,
};
use tracing::{error, info, warn};

use super::{Planner, PlannerCommand};
use crate::{avoidance::spawn_avoidance, util::latest_value_channel};

impl Planner {
    /// Start the avoidance worker and forward what it reports into the command funnel.
    pub fn start_avoidance(&mut self) {
        let (reports_tx, mut reports_rx) = unbounded_channel();
        let (paths_tx, paths_rx) = latest_value_channel();
        self.shared
            .properties
            .set_path_refresh_interval(self.config.avoidance.path_refresh_interval());

        let worker = match spawn_avoidance(
            Arc::clone(&self.shared),
            &self.config.avoidance,
            reports_tx,
            paths_tx,
        ) {
            Ok(worker) => worker,
            Err(err) => {
                error!("Failed to start avoidance: {}", err);
                return;
            }
        };
        self.avoidance = Some(worker);

        tokio::spawn({
            let commands = self.commands.clone();
            async move {
                while reports_rx.recv().await.is_some() {
                    if commands.send(PlannerCommand::AvoidanceBlocked).is_err() {
                        break;
                    }
                }
            }
        });
        tokio::spawn({
            let commands = self.commands.clone();
            async move {
                while let Ok(path) = paths_rx.recv().await {
                    if commands.send(PlannerCommand::AvoidancePath(path)).is_err() {
                        break;
                    }
                }
            }
        });
    }

    pub async fn stop_avoidance(&mut self) {
        if let Some(worker) = self.avoidance.take() {
            if let Err(err) = worker.stop().await {
                warn!("Avoidance worker stopped with {}", err);
            }
        }
    }

    pub(super) async fn restart_avoidance(&mut self) {
        self.stop_avoidance().await;
        self.start_avoidance();
    }

    /// Restart a dead worker and hand it the pose order again.
    pub(super) async fn check_avoidance(&mut self) {
        let alive = self
            .avoidance
            .as_ref()
            .map_or(true, |worker| worker.is_alive());
        if alive {
            return;
        }
        error!("Avoidance worker died, restarting");
        self.restart_avoidance().await;
        self.shared.set_pose_order(self.current_pose_order());
    }

    /// Drain commands until shutdown or until every sender is gone.
    pub async fn run(mut self, mut commands: UnboundedReceiver<PlannerCommand>) {
        if self.avoidance.is_none() {
            self.start_avoidance();
        }
        let countdown = tokio::spawn(countdown_ticker(
            self.commands.clone(),
            self.config.planner.countdown_tick(),
        ));
        let supervisor = tokio::spawn(supervisor_ticker(
            self.commands.clone(),
            self.config.planner.supervisor_interval(),
        ));

        info!("Planner running for robot {}", self.game.robot_id);
        while let Some(command) = commands.recv().await {
            if !self.handle(command).await {
                break;
            }
        }

        countdown.abort();
        supervisor.abort();
        self.shared.set_pose_order(None);
        self.stop_avoidance().await;
        info!("Planner stopped");
    }
}

async fn countdown_ticker(commands: UnboundedSender<PlannerCommand>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    let mut last_tick = Instant::now();
    loop {
        interval.tick().await;
        let now = Instant::now();
        let elapsed = now.duration_since(last_tick).as_secs_f64();
        last_tick = now;
        if commands.send(PlannerCommand::CountdownTick(elapsed)).is_err() {
            break;
        }
    }
}

async fn supervisor_ticker(commands: UnboundedSender<PlannerCommand>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        if commands.send(PlannerCommand::CheckAvoidance).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        avoidance::AvoidanceStrategy, configuration::AppConfig, context::TableBounds,
        planner::PlannerEvent, pose::PathPose, shared::SharedMemory,
        transport::ChannelEventPublisher,
    };

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn run_streams_avoidance_paths_and_shuts_down() {
        let mut config = AppConfig::default();
        config.game.avoidance_strategy = AvoidanceStrategy::Disabled;
        config.avoidance.path_refresh_interval_ms = 20;
        config.strategy.actions = vec![serde_json::from_str(
            r#"{"name": "visit", "weight": 1.0, "poses": [{"x": 500.0, "y": 0.0, "O": 0.0}]}"#,
        )
        .unwrap()];
        let shared = Arc::new(SharedMemory::new(
            1,
            AvoidanceStrategy::Disabled,
            Duration::from_millis(20),
            TableBounds::default(),
        ));
        let (event_tx, mut events) = unbounded_channel();
        let (command_tx, command_rx) = unbounded_channel();
        let planner = Planner::new(
            config,
            Arc::clone(&shared),
            Arc::new(ChannelEventPublisher::new(event_tx)),
            command_tx.clone(),
        );
        let running = tokio::spawn(planner.run(command_rx));

        command_tx.send(PlannerCommand::Play).unwrap();
        let path = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match events.recv().await {
                    Some(PlannerEvent::Path(path)) => break path,
                    Some(_) => continue,
                    None => panic!("planner stopped early"),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(path, vec![PathPose::new(500.0, 0.0, 0.0)]);

        command_tx.send(PlannerCommand::Shutdown).unwrap();
        tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .unwrap()
            .unwrap();
        assert!(!shared.properties.exiting());
        assert_eq!(shared.pose_order(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_ticks_carry_monotonic_elapsed_time() {
        let (command_tx, mut command_rx) = unbounded_channel();
        let ticker = tokio::spawn(countdown_ticker(command_tx, Duration::from_millis(500)));

        let mut ticks = vec![];
        while ticks.len() < 4 {
            match command_rx.recv().await {
                Some(PlannerCommand::CountdownTick(elapsed)) => ticks.push(elapsed),
                other => panic!("unexpected {:?}", other),
            }
        }
        ticker.abort();

        assert_eq!(ticks[0], 0.0);
        for elapsed in &ticks[1..] {
            approx::assert_relative_eq!(*elapsed, 0.5, epsilon = 1e-3);
        }
    }
}
