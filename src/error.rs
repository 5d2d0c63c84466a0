use thiserror::Error;

#[derive(Error, Debug)]
pub enum ErrorWrapper {
    #[error("zenoh error {0:?}")]
    ZenohError(zenoh::Error),
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PlannerError {
    #[error("malformed pose: {0}")]
    MalformedPose(String),
    #[error("malformed obstacle: {0}")]
    MalformedObstacle(String),
    #[error("avoidance worker exited")]
    AvoidanceDied,
    #[error("failed to spawn avoidance worker")]
    AvoidanceSpawn(#[from] std::io::Error),
    #[error("planner command channel closed")]
    ChannelClosed,
    #[error("unknown strategy {0:?}")]
    UnknownStrategy(String),
}
