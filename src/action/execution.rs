use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// hooks drive the robot
    Real,
    /// hooks run on cloned state during lookahead, nothing leaves the process
    Simulated,
}

/// Fire and forget order for an actuator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorCommand {
    pub actuator: String,
    pub command: serde_json::Value,
}

impl ActuatorCommand {
    pub fn new(actuator: &str, command: serde_json::Value) -> Self {
        Self {
            actuator: actuator.to_owned(),
            command,
        }
    }
}

/// Side effects requested by hooks.
///
/// Hooks are synchronous. Sleeps are accumulated and actuator commands queued
/// so the caller decides what they mean: the planner awaits the delay and
/// publishes the commands, the lookahead only counts the delay as game time.
#[derive(Debug)]
pub struct ExecutionContext {
    mode: ExecutionMode,
    delay: Duration,
    virtual_time: Duration,
    actuator_commands: Vec<ActuatorCommand>,
}

impl ExecutionContext {
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            delay: Duration::ZERO,
            virtual_time: Duration::ZERO,
            actuator_commands: vec![],
        }
    }

    pub fn real() -> Self {
        Self::new(ExecutionMode::Real)
    }

    pub fn simulated() -> Self {
        Self::new(ExecutionMode::Simulated)
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn is_simulated(&self) -> bool {
        self.mode == ExecutionMode::Simulated
    }

    pub fn sleep(&mut self, duration: Duration) {
        match self.mode {
            ExecutionMode::Real => self.delay += duration,
            ExecutionMode::Simulated => self.virtual_time += duration,
        }
    }

    pub fn send(&mut self, command: ActuatorCommand) {
        match self.mode {
            ExecutionMode::Real => self.actuator_commands.push(command),
            ExecutionMode::Simulated => trace!("Dropping simulated command {:?}", command),
        }
    }

    /// Delay requested since the last call. Always zero in simulation.
    pub fn take_delay(&mut self) -> Duration {
        std::mem::take(&mut self.delay)
    }

    pub fn take_actuator_commands(&mut self) -> Vec<ActuatorCommand> {
        std::mem::take(&mut self.actuator_commands)
    }

    /// Time slept in simulation.
    pub fn virtual_time(&self) -> Duration {
        self.virtual_time
    }
}
