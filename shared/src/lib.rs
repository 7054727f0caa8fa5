//! Types shared between the foosball relay server and its clients.

pub mod config;
pub mod formation;
pub mod protocol;
pub mod score;
pub mod side;
