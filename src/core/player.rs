use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

/// A player profile mirrored 1:1 from the external match-statistics API,
/// upserted by account id on every sync that sees the player.
#[derive(PartialEq, Eq, Debug, FromRow, Clone, Serialize, Deserialize, Default)]
pub struct Player {
    /// External account id (the upsert key)
    pub account_id: i64,

    /// Display name as reported by the API
    pub persona_name: String,

    /// Small avatar URL
    pub avatar: Option<String>,

    /// Full-size avatar URL
    pub avatar_full: Option<String>,

    /// Public profile URL
    pub profile_url: Option<String>,

    /// Ranking tier, if the player is ranked
    pub rank_tier: Option<i64>,

    /// Leaderboard position, only present for top-ranked players
    pub leaderboard_rank: Option<i64>,
}

/// A synced match, one row per match id.
#[derive(PartialEq, Eq, Debug, FromRow, Clone, Serialize, Deserialize)]
pub struct MatchSummary {
    pub match_id: i64,
    pub league_id: i64,

    /// Unix start time as reported by the API
    pub start_time: i64,
    pub duration_secs: i64,

    /// Which side won ("radiant"/"dire" in the source API's terms)
    pub winning_side: String,
}

/// Per-player line of a synced match.
#[derive(PartialEq, Eq, Debug, FromRow, Clone, Serialize, Deserialize)]
pub struct MatchPlayer {
    pub match_id: i64,
    pub account_id: i64,
    pub side: String,
    pub kills: i64,
    pub deaths: i64,
    pub assists: i64,
}
