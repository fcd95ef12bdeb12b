pub mod bracket;
pub mod db;
pub mod league;
pub mod player;
pub mod settings;
pub mod tournament;
pub mod user;
