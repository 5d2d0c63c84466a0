#![doc = include_str!("../README.md")]
pub mod action;
pub mod avoidance;
pub mod configuration;
pub mod context;
pub mod error;
pub mod logging;
pub mod obstacle;
pub mod planner;
pub mod pose;
pub mod shared;
pub mod strategy;
pub mod transport;
pub mod util;
