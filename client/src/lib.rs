pub mod autopilot;
pub mod config;
pub mod connection;
pub mod lifecycle;
pub mod mirror;
pub mod peer;
pub mod physics;
pub mod rods;
pub mod state;
