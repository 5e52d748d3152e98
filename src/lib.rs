pub mod cohesion;
pub mod color;
pub mod config;
pub mod dataset_cache;
pub mod error;
pub mod export;
pub mod fixtures;
pub mod gameweek;
pub mod pivot;
pub mod players;
pub mod state;
