//! Bridge between zenoh topics and the planner command funnel.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, warn};
use zenoh::{prelude::r#async::*, subscriber::FlumeSubscriber, Session};

use crate::{
    configuration::PlannerZenohConfig,
    error::{ErrorWrapper, PlannerError},
    obstacle::{Obstacle, Vertex},
    planner::{PlannerCommand, PlannerEvent},
    pose::Pose,
};

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: PlannerEvent) -> Result<()>;
}

/// Publishes events as JSON under `<prefix>/<robot_id>/event/<kind>`.
pub struct ZenohEventPublisher {
    session: Arc<Session>,
    topic_prefix: String,
}

impl ZenohEventPublisher {
    pub fn new(session: Arc<Session>, config: &PlannerZenohConfig, robot_id: u8) -> Self {
        Self {
            session,
            topic_prefix: config.topic(robot_id, "event"),
        }
    }
}

#[async_trait]
impl EventPublisher for ZenohEventPublisher {
    async fn publish(&self, event: PlannerEvent) -> Result<()> {
        let payload = serde_json::to_string(&event)?;
        self.session
            .put(format!("{}/{}", self.topic_prefix, event.kind()), payload)
            .res_async()
            .await
            .map_err(ErrorWrapper::ZenohError)?;
        Ok(())
    }
}

/// Forwards events into a channel. Used by the dry run binary and tests.
pub struct ChannelEventPublisher {
    sender: UnboundedSender<PlannerEvent>,
}

impl ChannelEventPublisher {
    pub fn new(sender: UnboundedSender<PlannerEvent>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl EventPublisher for ChannelEventPublisher {
    async fn publish(&self, event: PlannerEvent) -> Result<()> {
        self.sender
            .send(event)
            .map_err(|_| PlannerError::ChannelClosed)?;
        Ok(())
    }
}

/// Inbound topics and how their payload becomes a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inbound {
    Command,
    PoseCurrent,
    PoseReached,
    IntermediatePoseReached,
    /// bare points from the detector
    Obstacles,
    /// full obstacles from the monitor
    MonitorObstacles,
}

impl Inbound {
    const ALL: [Inbound; 6] = [
        Inbound::Command,
        Inbound::PoseCurrent,
        Inbound::PoseReached,
        Inbound::IntermediatePoseReached,
        Inbound::Obstacles,
        Inbound::MonitorObstacles,
    ];

    fn topic(&self) -> &'static str {
        match self {
            Inbound::Command => "command",
            Inbound::PoseCurrent => "pose_current",
            Inbound::PoseReached => "pose_reached",
            Inbound::IntermediatePoseReached => "intermediate_pose_reached",
            Inbound::Obstacles => "obstacles",
            Inbound::MonitorObstacles => "monitor_obstacles",
        }
    }

    fn parse(&self, payload: &str) -> Result<PlannerCommand> {
        Ok(match self {
            Inbound::Command => parse_json(payload)?,
            Inbound::PoseCurrent => PlannerCommand::SetPoseCurrent(parse_json::<Pose>(payload)?),
            Inbound::PoseReached => PlannerCommand::PoseReached,
            Inbound::IntermediatePoseReached => PlannerCommand::IntermediatePoseReached,
            Inbound::Obstacles => {
                PlannerCommand::SetDetectorObstacles(parse_json::<Vec<Vertex>>(payload)?)
            }
            Inbound::MonitorObstacles => {
                PlannerCommand::SetMonitorObstacles(parse_json::<Vec<Obstacle>>(payload)?)
            }
        })
    }
}

fn parse_json<T: DeserializeOwned>(payload: &str) -> Result<T> {
    Ok(serde_json::from_str(payload)?)
}

/// Subscribe to every inbound topic and forward parsed commands.
pub async fn start_command_bridge(
    session: Arc<Session>,
    config: &PlannerZenohConfig,
    robot_id: u8,
    commands: UnboundedSender<PlannerCommand>,
) -> Result<()> {
    for inbound in Inbound::ALL {
        let mut subscriber = session
            .declare_subscriber(config.topic(robot_id, inbound.topic()))
            .res()
            .await
            .map_err(ErrorWrapper::ZenohError)?;

        tokio::spawn({
            let commands = commands.clone();
            async move {
                while let Err(err) = run_listener(&mut subscriber, inbound, &commands).await {
                    error!("{} listener failed with {:?}", inbound.topic(), err);
                    if commands.is_closed() {
                        break;
                    }
                }
            }
        });
    }
    Ok(())
}

async fn run_listener(
    subscriber: &mut FlumeSubscriber<'_>,
    inbound: Inbound,
    commands: &UnboundedSender<PlannerCommand>,
) -> Result<()> {
    loop {
        let sample = subscriber.recv_async().await?;
        let payload: String = sample.value.try_into()?;
        match inbound.parse(&payload) {
            Ok(command) => commands
                .send(command)
                .map_err(|_| PlannerError::ChannelClosed)?,
            Err(err) => warn!("Rejected {} message: {}", inbound.topic(), err),
        }
    }
}
