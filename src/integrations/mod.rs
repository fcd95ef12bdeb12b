pub mod discord;
pub mod stats_api;
pub mod sync;
