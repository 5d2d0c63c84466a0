//! Pose reaching state machine.
//!
//! The planner owns the current action and pose order. All of its state is
//! mutated from a single task draining [`PlannerCommand`]s, see [`Planner::run`].

mod commands;
mod run;

pub use commands::{PlannerCommand, PlannerEvent};

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::{
    action::{Action, ActionPose, ExecutionContext, HookContext},
    avoidance::{AvoidancePath, AvoidanceStrategy, AvoidanceWorker},
    configuration::AppConfig,
    context::{Camp, GameContext, StartPosition, TableKind},
    obstacle::{Obstacle, Vertex},
    pose::{PathPose, Pose},
    shared::SharedMemory,
    strategy::{build_strategy, Strategy, StrategyKind},
    transport::EventPublisher,
};

pub struct Planner {
    config: AppConfig,
    game: GameContext,
    strategy_kind: StrategyKind,
    strategy: Strategy,
    current_action: Option<Action>,
    current_pose_order: Option<ActionPose>,
    /// pose order last sent to the motion layer, may be an intermediate one
    motion_pose_order: Option<PathPose>,
    avoidance_path: Vec<PathPose>,
    pose_reached: bool,
    blocked_counter: u32,
    shared: Arc<SharedMemory>,
    publisher: Arc<dyn EventPublisher>,
    commands: UnboundedSender<PlannerCommand>,
    avoidance: Option<AvoidanceWorker>,
}

impl Planner {
    pub fn new(
        config: AppConfig,
        shared: Arc<SharedMemory>,
        publisher: Arc<dyn EventPublisher>,
        commands: UnboundedSender<PlannerCommand>,
    ) -> Self {
        let game = GameContext::new(config.planner.robot_id, &config.game);
        let strategy_kind = config.planner.strategy_kind;
        let strategy = build_strategy(strategy_kind, &config.strategy, game.camp);
        shared
            .properties
            .set_avoidance_strategy(config.game.avoidance_strategy);
        shared.properties.set_table(&game.table_bounds());
        Self {
            config,
            game,
            strategy_kind,
            strategy,
            current_action: None,
            current_pose_order: None,
            motion_pose_order: None,
            avoidance_path: vec![],
            pose_reached: true,
            blocked_counter: 0,
            shared,
            publisher,
            commands,
            avoidance: None,
        }
    }

    /// Replace the action pool, mostly for tests and tools.
    pub fn set_strategy_pool(&mut self, strategy: Strategy) {
        self.strategy = strategy;
    }

    pub fn game(&self) -> &GameContext {
        &self.game
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn current_action(&self) -> Option<&Action> {
        self.current_action.as_ref()
    }

    pub fn current_pose_order(&self) -> Option<PathPose> {
        self.current_pose_order.as_ref().map(|pose| pose.pose)
    }

    pub fn pose_reached(&self) -> bool {
        self.pose_reached
    }

    pub fn blocked_counter(&self) -> u32 {
        self.blocked_counter
    }

    async fn publish(&self, event: PlannerEvent) {
        if let Err(err) = self.publisher.publish(event).await {
            warn!("Failed to publish planner event: {:?}", err);
        }
    }

    fn enqueue(&self, command: PlannerCommand) {
        if self.commands.send(command).is_err() {
            error!("Planner command channel closed");
        }
    }

    /// Run synchronous hooks against the planner state.
    fn with_hooks(&mut self, hooks: impl FnOnce(&mut HookContext<'_>)) -> ExecutionContext {
        let mut execution = ExecutionContext::real();
        let mut context = HookContext {
            game: &mut self.game,
            execution: &mut execution,
            strategy: &mut self.strategy,
        };
        hooks(&mut context);
        execution
    }

    /// Apply what the hooks asked for: wait for their sleeps and send their commands.
    async fn settle(&self, mut execution: ExecutionContext) {
        for command in execution.take_actuator_commands() {
            self.publish(PlannerEvent::Actuator(command)).await;
        }
        let delay = execution.take_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    async fn dispatch_pose(&mut self, pose: ActionPose) {
        let execution = self.with_hooks(|context| pose.before_pose(context));
        let order = pose.pose;
        debug!("New pose order {}", order);
        self.blocked_counter = 0;
        self.avoidance_path.clear();
        self.motion_pose_order = None;
        self.current_pose_order = Some(pose);
        self.shared.set_pose_order(Some(order));
        self.settle(execution).await;
    }

    async fn start_action(&mut self, mut action: Action) {
        info!("Starting action {}", action.name);
        let execution = self.with_hooks(|context| action.before_action(context));
        let first_pose = action.pop_pose();
        let name = action.name.clone();
        self.current_action = Some(action);
        self.publish(PlannerEvent::ActionStarted(name)).await;
        self.settle(execution).await;
        match first_pose {
            Some(pose) => self.dispatch_pose(pose).await,
            // nothing to reach, complete it from the command loop
            None => self.enqueue(PlannerCommand::PoseReached),
        }
    }

    async fn finish_action(&mut self, mut action: Action) {
        info!("Action {} done", action.name);
        let execution = self.with_hooks(|context| {
            action.after_action(context);
            context.strategy.amnesty();
        });
        self.publish(PlannerEvent::ActionFinished(action.name.clone()))
            .await;
        self.publish(PlannerEvent::Score(self.game.score)).await;
        self.settle(execution).await;
    }

    fn clear_pose_order(&mut self) {
        self.current_pose_order = None;
        self.motion_pose_order = None;
        self.avoidance_path.clear();
        self.shared.set_pose_order(None);
    }

    /// Move on to the next pose of the current action, or to the next action.
    pub async fn next_pose(&mut self) {
        self.pose_reached = false;
        if let Some(pose) = self.current_action.as_mut().and_then(Action::pop_pose) {
            self.dispatch_pose(pose).await;
            return;
        }
        if let Some(action) = self.current_action.take() {
            // poses drained without a pose reached, finish it before moving on
            self.finish_action(action).await;
        }
        match self.strategy.get_next_action(&self.game) {
            Some(action) => self.start_action(action).await,
            None => {
                info!("No action available");
                self.pose_reached = true;
                self.publish(PlannerEvent::PoseReached).await;
            }
        }
    }

    /// Motion layer reached the pose order.
    pub async fn set_pose_reached(&mut self) {
        if self
            .motion_pose_order
            .is_some_and(|pose_order| pose_order.is_intermediate)
        {
            self.set_intermediate_pose_reached();
            return;
        }

        if let Some(pose) = self.current_pose_order.take() {
            if !self.pose_reached {
                let execution = self.with_hooks(|context| pose.after_pose(context));
                self.settle(execution).await;
            }
        }
        self.clear_pose_order();
        self.shared.invalidate_last_pose();
        self.pose_reached = true;

        if let Some(action) = self.current_action.take() {
            if action.poses.is_empty() {
                self.finish_action(action).await;
            } else {
                self.current_action = Some(action);
            }
        }

        if !self.game.playing {
            return;
        }
        self.next_pose().await;
    }

    /// Motion layer reached an avoidance waypoint.
    pub fn set_intermediate_pose_reached(&mut self) {
        debug!("Intermediate pose reached");
        self.motion_pose_order = None;
        self.shared.invalidate_last_pose();
    }

    /// Interrupt the current action if it allows it.
    pub async fn blocked(&mut self) {
        let Some(action) = &self.current_action else {
            if self.game.playing && self.pose_reached {
                // idle, see if something became eligible
                self.next_pose().await;
            }
            return;
        };
        if !action.interruptable {
            debug!("Action {} is not interruptable", action.name);
            return;
        }
        let Some(mut original) = self.current_action.take() else {
            return;
        };
        info!("Action {} blocked", original.name);

        let replacement = self.strategy.get_next_action(&self.game);
        self.clear_pose_order();
        self.blocked_counter = 0;
        self.pose_reached = false;
        if let Some(replacement) = replacement {
            self.start_action(replacement).await;
        }

        let execution = self.with_hooks(|context| original.recycle(context));
        self.strategy.push(original);
        self.settle(execution).await;

        if self.current_pose_order.is_none() && self.current_action.is_none() {
            self.set_pose_reached().await;
        }
    }

    /// End of game: stop and report the score.
    pub async fn final_action(&mut self) {
        info!("Game over, score {}", self.game.score);
        self.game.playing = false;
        self.shared.set_pose_order(None);
        self.publish(PlannerEvent::Brake).await;
        self.publish(PlannerEvent::GameEnd {
            score: self.game.score,
        })
        .await;
    }

    /// Advance the countdown and fire the thresholds crossed.
    pub async fn tick_countdown(&mut self, elapsed: f64) {
        if !self.game.playing {
            return;
        }
        let previous = self.game.countdown;
        self.game.last_countdown = previous;
        self.game.countdown -= elapsed;

        let force_blocked_at = self.config.planner.force_blocked_at;
        if previous > force_blocked_at && self.game.countdown <= force_blocked_at {
            info!("{} seconds left, forcing blocked", force_blocked_at);
            self.blocked().await;
        }
        if previous > 0.0 && self.game.countdown <= 0.0 {
            self.final_action().await;
        }
    }

    async fn on_avoidance_path(&mut self, path: AvoidancePath) {
        if self.current_pose_order.is_none() {
            debug!("Dropping path without pose order");
            return;
        }
        self.blocked_counter = 0;
        if let Some(pose) = self.current_pose_order.clone() {
            let execution = self.with_hooks(|context| pose.intermediate_pose(context));
            self.settle(execution).await;
        }
        self.avoidance_path = path.path.clone();
        self.motion_pose_order = Some(path.pose_order);
        self.publish(PlannerEvent::PoseOrder(path.pose_order)).await;
        self.publish(PlannerEvent::Path(path.path)).await;
    }

    async fn on_avoidance_blocked(&mut self) {
        self.publish(PlannerEvent::Brake).await;
        self.blocked_counter += 1;
        if self.blocked_counter > self.config.planner.blocked_threshold {
            self.blocked_counter = 0;
            self.blocked().await;
        }
    }

    fn project_obstacles(&self, points: Vec<Vertex>) -> Vec<Obstacle> {
        let table = self.game.table_bounds();
        let config = &self.config.obstacles;
        points
            .into_iter()
            .filter(|point| point.x.is_finite() && point.y.is_finite())
            .filter(|point| table.contains(point))
            .map(|point| {
                Obstacle::circle(
                    point,
                    config.radius,
                    config.bounding_box_radius(),
                    config.vertices(),
                )
            })
            .collect()
    }

    async fn reset(&mut self) {
        info!("Reset");
        self.game.reset();
        self.strategy = build_strategy(
            self.strategy_kind,
            &self.config.strategy,
            self.game.camp,
        );
        self.current_action = None;
        self.clear_pose_order();
        self.pose_reached = true;
        self.blocked_counter = 0;
        self.shared.clear_obstacles();
        self.shared.properties.set_table(&self.game.table_bounds());
        if self.avoidance.is_some() {
            self.restart_avoidance().await;
        }
        self.publish(PlannerEvent::Score(self.game.score)).await;
    }

    async fn set_pose_start(&mut self, pose: PathPose) {
        if let Err(err) = pose.validate() {
            warn!("Rejected pose start: {}", err);
            return;
        }
        self.current_action = None;
        self.clear_pose_order();
        self.pose_reached = true;
        self.game.pose_current = pose.pose;
        self.shared.set_pose_current(&pose.pose);
        self.publish(PlannerEvent::PoseStart(pose)).await;
    }

    /// Place the robot on its selected start area.
    async fn apply_start_position(&mut self) {
        let pose = self.game.start_pose(self.config.obstacles.robot_width);
        self.set_pose_start(pose.into()).await;
    }

    async fn set_camp(&mut self, camp: Camp) {
        if self.game.camp == camp {
            return;
        }
        info!("Camp {:?}", camp);
        self.game.camp = camp;
        self.reset().await;
        self.apply_start_position().await;
    }

    async fn set_table(&mut self, table: TableKind) {
        if self.game.table == table {
            return;
        }
        info!("Table {:?}", table);
        self.game.table = table;
        if !self
            .game
            .start_position
            .is_valid(table, self.game.robot_id)
        {
            warn!(
                "Start position {:?} not available on {:?} table",
                self.game.start_position, table
            );
            self.game.start_position = StartPosition::default();
        }
        self.reset().await;
        self.apply_start_position().await;
    }

    async fn set_start_position(&mut self, start_position: StartPosition) {
        if !start_position.is_valid(self.game.table, self.game.robot_id) {
            warn!(
                "Rejected start position {:?} for robot {}",
                start_position, self.game.robot_id
            );
            return;
        }
        self.game.start_position = start_position;
        self.apply_start_position().await;
    }

    /// Handle one command. Returns false on shutdown.
    pub async fn handle(&mut self, command: PlannerCommand) -> bool {
        match command {
            PlannerCommand::Play => {
                if !self.game.playing {
                    info!("Play");
                    self.game.playing = true;
                    if self.pose_reached {
                        self.next_pose().await;
                    }
                }
            }
            PlannerCommand::Stop => {
                info!("Stop");
                self.game.playing = false;
                self.publish(PlannerEvent::Brake).await;
            }
            PlannerCommand::Next => {
                if !self.game.playing && self.pose_reached {
                    self.next_pose().await;
                }
            }
            PlannerCommand::Reset => self.reset().await,
            PlannerCommand::SetPoseStart(pose) => self.set_pose_start(pose).await,
            PlannerCommand::SetPoseCurrent(pose) => self.set_pose_current(pose),
            PlannerCommand::PoseReached => self.set_pose_reached().await,
            PlannerCommand::IntermediatePoseReached => self.set_intermediate_pose_reached(),
            PlannerCommand::SetDetectorObstacles(points) => {
                let obstacles = self.project_obstacles(points);
                self.shared.set_detector_obstacles(obstacles);
            }
            PlannerCommand::SetMonitorObstacles(obstacles) => {
                self.shared.set_monitor_obstacles(obstacles);
            }
            PlannerCommand::SetAvoidanceStrategy(strategy) => self.set_avoidance_strategy(strategy),
            PlannerCommand::SetStrategy(kind) => {
                info!("Strategy {:?}", kind);
                self.strategy_kind = kind;
                self.reset().await;
            }
            PlannerCommand::SetCamp(camp) => self.set_camp(camp).await,
            PlannerCommand::SetTable(table) => self.set_table(table).await,
            PlannerCommand::SetStartPosition(start_position) => {
                self.set_start_position(start_position).await
            }
            PlannerCommand::SetPathRefreshInterval(interval_ms) => {
                let interval_ms = interval_ms.clamp(100, 2000);
                self.shared
                    .properties
                    .set_path_refresh_interval(std::time::Duration::from_millis(interval_ms));
            }
            PlannerCommand::AvoidancePath(path) => self.on_avoidance_path(path).await,
            PlannerCommand::AvoidanceBlocked => self.on_avoidance_blocked().await,
            PlannerCommand::CountdownTick(elapsed) => self.tick_countdown(elapsed).await,
            PlannerCommand::CheckAvoidance => self.check_avoidance().await,
            PlannerCommand::Shutdown => return false,
        }
        true
    }

    fn set_pose_current(&mut self, pose: Pose) {
        if !pose.is_finite() {
            warn!("Rejected pose current {}", pose);
            return;
        }
        self.game.pose_current = pose;
        self.shared.set_pose_current(&pose);
    }

    fn set_avoidance_strategy(&mut self, strategy: AvoidanceStrategy) {
        info!("Avoidance strategy {:?}", strategy);
        self.game.avoidance_strategy = strategy;
        self.shared.properties.set_avoidance_strategy(strategy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        action::{ActionPose, ScoredAction, WaitAction},
        avoidance::AvoidanceStrategy,
        context::TableBounds,
        transport::ChannelEventPublisher,
    };
    use std::time::Duration;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    struct Harness {
        planner: Planner,
        shared: Arc<SharedMemory>,
        events: UnboundedReceiver<PlannerEvent>,
        commands: UnboundedReceiver<PlannerCommand>,
    }

    fn harness(actions: Vec<Action>) -> Harness {
        let mut config = AppConfig::default();
        config.strategy.can_wait = false;
        let shared = Arc::new(SharedMemory::new(
            1,
            AvoidanceStrategy::Disabled,
            Duration::from_millis(200),
            TableBounds::default(),
        ));
        let (event_tx, events) = unbounded_channel();
        let (command_tx, commands) = unbounded_channel();
        let mut planner = Planner::new(
            config.clone(),
            Arc::clone(&shared),
            Arc::new(ChannelEventPublisher::new(event_tx)),
            command_tx,
        );
        let mut strategy = Strategy::new(vec![], &config.strategy);
        for action in actions {
            strategy.push(action);
        }
        planner.set_strategy_pool(strategy);
        Harness {
            planner,
            shared,
            events,
            commands,
        }
    }

    fn visit(name: &str, weight: f64, poses: &[(f64, f64)]) -> Action {
        Action::new(name, ScoredAction::new(weight, 1))
            .with_poses(poses.iter().map(|(x, y)| PathPose::new(*x, *y, 0.0)))
    }

    fn drain(events: &mut UnboundedReceiver<PlannerEvent>) -> Vec<PlannerEvent> {
        let mut drained = vec![];
        while let Ok(event) = events.try_recv() {
            drained.push(event);
        }
        drained
    }

    #[tokio::test]
    async fn play_dispatches_first_pose_of_best_action() {
        let mut h = harness(vec![
            visit("a", 5.0, &[(100.0, 0.0)]),
            visit("b", 10.0, &[(300.0, 0.0)]),
        ]);
        h.planner.handle(PlannerCommand::Play).await;
        assert_eq!(h.planner.current_action().unwrap().name, "b");
        assert_eq!(
            h.shared.pose_order(),
            Some(PathPose::new(300.0, 0.0, 0.0))
        );
        assert!(!h.planner.pose_reached());
        assert!(drain(&mut h.events).contains(&PlannerEvent::ActionStarted("b".to_owned())));
    }

    #[tokio::test]
    async fn pose_hooks_run_around_pose() {
        let action = Action::new("hooked", ScoredAction::new(1.0, 2)).with_pose(
            ActionPose::new(PathPose::new(100.0, 0.0, 0.0))
                .with_before(|context| context.game.score += 10)
                .with_after(|context| context.game.score += 100),
        );
        let mut h = harness(vec![action]);
        h.planner.handle(PlannerCommand::Play).await;
        assert_eq!(h.planner.game().score, 10);
        h.planner.handle(PlannerCommand::PoseReached).await;
        // after pose hook then action score
        assert_eq!(h.planner.game().score, 112);
        assert!(h.planner.current_action().is_none());
        assert!(h.planner.pose_reached());
        let events = drain(&mut h.events);
        assert!(events.contains(&PlannerEvent::ActionFinished("hooked".to_owned())));
        assert_eq!(events.last(), Some(&PlannerEvent::PoseReached));
    }

    #[tokio::test]
    async fn intermediate_pose_reached_only_invalidates_cache() {
        let mut h = harness(vec![visit("a", 1.0, &[(500.0, 0.0)])]);
        h.planner.handle(PlannerCommand::Play).await;
        let waypoint = PathPose::new(250.0, 200.0, 0.0).intermediate();
        h.planner
            .handle(PlannerCommand::AvoidancePath(AvoidancePath {
                path: vec![waypoint, PathPose::new(500.0, 0.0, 0.0)],
                pose_order: waypoint,
            }))
            .await;
        // reported as plain pose reached while the motion pose order is intermediate
        h.planner.handle(PlannerCommand::PoseReached).await;
        assert_eq!(h.planner.current_action().unwrap().name, "a");
        assert_eq!(
            h.planner.current_pose_order(),
            Some(PathPose::new(500.0, 0.0, 0.0))
        );
        assert!(h.shared.take_last_pose_invalidated());
    }

    #[tokio::test]
    async fn path_resets_blocked_counter() {
        let mut h = harness(vec![visit("a", 1.0, &[(500.0, 0.0)])]);
        h.planner.handle(PlannerCommand::Play).await;
        for _ in 0..3 {
            h.planner.handle(PlannerCommand::AvoidanceBlocked).await;
        }
        assert_eq!(h.planner.blocked_counter(), 3);
        let pose = PathPose::new(500.0, 0.0, 0.0);
        h.planner
            .handle(PlannerCommand::AvoidancePath(AvoidancePath {
                path: vec![pose],
                pose_order: pose,
            }))
            .await;
        assert_eq!(h.planner.blocked_counter(), 0);
        let events = drain(&mut h.events);
        assert_eq!(
            events.iter().filter(|e| **e == PlannerEvent::Brake).count(),
            3
        );
        assert!(events.contains(&PlannerEvent::PoseOrder(pose)));
    }

    #[tokio::test]
    async fn blocked_threshold_recycles_interruptable_action() {
        let mut h = harness(vec![
            visit("main", 10.0, &[(500.0, 0.0)]),
            visit("fallback", 1.0, &[(-500.0, 0.0)]),
        ]);
        h.planner.handle(PlannerCommand::Play).await;
        // the threshold itself is tolerated, the next report interrupts
        for _ in 0..10 {
            h.planner.handle(PlannerCommand::AvoidanceBlocked).await;
        }
        assert_eq!(h.planner.current_action().unwrap().name, "main");
        assert_eq!(h.planner.blocked_counter(), 10);
        h.planner.handle(PlannerCommand::AvoidanceBlocked).await;
        assert_eq!(h.planner.current_action().unwrap().name, "fallback");
        assert_eq!(
            h.shared.pose_order(),
            Some(PathPose::new(-500.0, 0.0, 0.0))
        );
        let recycled: Vec<_> = h.planner.strategy().iter().collect();
        assert_eq!(recycled.len(), 1);
        assert_eq!(recycled[0].name, "main");
        assert!(recycled[0].recycled);
    }

    #[tokio::test]
    async fn non_interruptable_action_ignores_blocked() {
        let mut h = harness(vec![
            visit("stubborn", 10.0, &[(500.0, 0.0)]).with_interruptable(false),
            visit("fallback", 1.0, &[(-500.0, 0.0)]),
        ]);
        h.planner.handle(PlannerCommand::Play).await;
        for _ in 0..25 {
            h.planner.handle(PlannerCommand::AvoidanceBlocked).await;
        }
        assert_eq!(h.planner.current_action().unwrap().name, "stubborn");
        assert_eq!(h.planner.strategy().len(), 1);
    }

    #[tokio::test]
    async fn blocked_without_replacement_idles() {
        let mut h = harness(vec![visit("only", 10.0, &[(500.0, 0.0)])]);
        h.planner.handle(PlannerCommand::Play).await;
        h.planner.blocked().await;
        assert!(h.planner.current_action().is_none());
        assert!(h.planner.current_pose_order().is_none());
        assert!(h.planner.pose_reached());
        assert!(h.planner.strategy().iter().next().unwrap().recycled);
    }

    #[tokio::test(start_paused = true)]
    async fn poseless_wait_action_completes_through_command_loop() {
        let mut h = harness(vec![]);
        let mut strategy = Strategy::default().with_can_wait(true);
        let mut recycled = visit("recycled", 5.0, &[(100.0, 0.0)]);
        recycled.recycled = true;
        strategy.push(recycled);
        h.planner.set_strategy_pool(strategy);

        h.planner.handle(PlannerCommand::Play).await;
        assert_eq!(h.planner.current_action().unwrap().name, WaitAction::NAME);
        let command = h.commands.try_recv().unwrap();
        assert!(matches!(command, PlannerCommand::PoseReached));

        let started = tokio::time::Instant::now();
        h.planner.handle(command).await;
        assert!(started.elapsed() >= Duration::from_secs(2));
        // the wait re-armed the recycled action which is now running
        assert_eq!(h.planner.current_action().unwrap().name, "recycled");
    }

    #[tokio::test]
    async fn countdown_thresholds_fire_once() {
        let mut h = harness(vec![
            visit("main", 10.0, &[(500.0, 0.0)]),
            visit("fallback", 1.0, &[(-500.0, 0.0)]),
        ]);
        h.planner.handle(PlannerCommand::Play).await;
        h.planner.tick_countdown(84.0).await;
        assert_eq!(h.planner.current_action().unwrap().name, "main");
        h.planner.tick_countdown(1.0).await;
        assert_eq!(h.planner.current_action().unwrap().name, "fallback");
        h.planner.tick_countdown(1.0).await;
        assert_eq!(h.planner.current_action().unwrap().name, "fallback");

        h.planner.tick_countdown(14.0).await;
        assert!(!h.planner.game().playing);
        let events = drain(&mut h.events);
        let game_ends = events
            .iter()
            .filter(|e| matches!(e, PlannerEvent::GameEnd { .. }))
            .count();
        assert_eq!(game_ends, 1);
        h.planner.tick_countdown(1.0).await;
        assert!(drain(&mut h.events).is_empty());
    }

    #[tokio::test]
    async fn detector_points_become_obstacles_inside_table() {
        let mut h = harness(vec![]);
        h.planner
            .handle(PlannerCommand::SetDetectorObstacles(vec![
                Vertex::new(0.0, 0.0),
                Vertex::new(5000.0, 0.0),
                Vertex::new(f64::NAN, 0.0),
            ]))
            .await;
        let obstacles = h.shared.obstacles();
        assert_eq!(obstacles.len(), 1);
        assert_eq!(
            obstacles[0].bounding_box.len(),
            AppConfig::default().obstacles.bb_vertices
        );
    }

    #[tokio::test]
    async fn step_mode_next() {
        let mut h = harness(vec![visit("a", 1.0, &[(100.0, 0.0), (200.0, 0.0)])]);
        h.planner.handle(PlannerCommand::Next).await;
        assert_eq!(h.planner.current_pose_order(), Some(PathPose::new(100.0, 0.0, 0.0)));
        // not playing, pose reached does not advance
        h.planner.handle(PlannerCommand::PoseReached).await;
        assert!(h.planner.current_pose_order().is_none());
        h.planner.handle(PlannerCommand::Next).await;
        assert_eq!(h.planner.current_pose_order(), Some(PathPose::new(200.0, 0.0, 0.0)));
    }

    #[tokio::test]
    async fn intermediate_hook_runs_on_each_new_path() {
        let goal = PathPose::new(500.0, 0.0, 0.0);
        let action = Action::new("hooked", ScoredAction::new(1.0, 0)).with_pose(
            ActionPose::new(goal).with_intermediate(|context| context.game.score += 1),
        );
        let mut h = harness(vec![action]);
        h.planner.handle(PlannerCommand::Play).await;
        for _ in 0..2 {
            h.planner.handle(PlannerCommand::AvoidanceBlocked).await;
        }
        for _ in 0..3 {
            h.planner
                .handle(PlannerCommand::AvoidancePath(AvoidancePath {
                    path: vec![goal],
                    pose_order: goal,
                }))
                .await;
        }
        assert_eq!(h.planner.game().score, 3);
        assert_eq!(h.planner.blocked_counter(), 0);
    }

    #[tokio::test]
    async fn camp_change_mirrors_actions_and_start_pose() {
        let mut h = harness(vec![]);
        h.planner.config.strategy.actions = vec![serde_json::from_str(
            r#"{"name": "north", "weight": 1.0, "poses": [{"x": 600.0, "y": 1000.0, "O": 90.0}]}"#,
        )
        .unwrap()];
        h.planner.handle(PlannerCommand::SetCamp(Camp::Blue)).await;
        assert_eq!(h.planner.game().camp, Camp::Blue);

        let expected_start = StartPosition::Bottom.pose(
            Camp::Blue,
            TableKind::Game,
            h.planner.game().robot_length,
            h.planner.config.obstacles.robot_width,
        );
        assert_eq!(h.shared.pose_current(), expected_start);
        assert!(expected_start.y > 0.0);

        h.planner.handle(PlannerCommand::Play).await;
        assert_eq!(
            h.shared.pose_order(),
            Some(PathPose::new(600.0, -1000.0, -90.0))
        );
    }

    #[tokio::test]
    async fn table_change_updates_shared_bounds_and_start_area() {
        let mut h = harness(vec![]);
        h.planner
            .handle(PlannerCommand::SetStartPosition(StartPosition::Opposite))
            .await;
        assert_eq!(h.planner.game().start_position, StartPosition::Opposite);

        h.planner
            .handle(PlannerCommand::SetTable(TableKind::Training))
            .await;
        assert_eq!(h.planner.game().table, TableKind::Training);
        assert_eq!(h.shared.properties.table(), TableKind::Training.bounds());
        // opposite is not on the training table
        assert_eq!(h.planner.game().start_position, StartPosition::Bottom);
        assert!(TableKind::Training
            .bounds()
            .contains(&Vertex::from(&h.shared.pose_current())));
    }

    #[tokio::test]
    async fn start_position_reserved_for_small_robots_is_rejected() {
        let mut h = harness(vec![]);
        h.planner
            .handle(PlannerCommand::SetStartPosition(StartPosition::Pami2))
            .await;
        assert_eq!(h.planner.game().start_position, StartPosition::Bottom);
        assert!(drain(&mut h.events).is_empty());

        h.planner
            .handle(PlannerCommand::SetStartPosition(StartPosition::Top))
            .await;
        let events = drain(&mut h.events);
        assert!(matches!(events.as_slice(), [PlannerEvent::PoseStart(_)]));
    }

    #[tokio::test]
    async fn malformed_pose_start_is_rejected() {
        let mut h = harness(vec![]);
        let pose = PathPose::new(f64::NAN, 0.0, 0.0);
        h.planner.handle(PlannerCommand::SetPoseStart(pose)).await;
        assert!(drain(&mut h.events).is_empty());
        h.planner
            .handle(PlannerCommand::SetPoseStart(PathPose::new(100.0, 100.0, 0.0)))
            .await;
        assert_eq!(h.shared.pose_current(), Pose::new(100.0, 100.0, 0.0));
    }
}
