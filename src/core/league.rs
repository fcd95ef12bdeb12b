use serde::{Deserialize, Serialize, Serializer};
use sqlx::{prelude::FromRow, types::time, types::Json};

fn serialize_datetime<S>(x: &Option<time::OffsetDateTime>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if let Some(x) = x {
        s.serialize_i64(x.unix_timestamp())
    } else {
        s.serialize_none()
    }
}

/// A tracked league, keyed by the external league id.
#[derive(PartialEq, Eq, Debug, FromRow, Clone, Serialize, Deserialize)]
pub struct League {
    pub id: i64,
    pub name: String,
}

/// Sync bookkeeping for one league. One row per league id; the primary key
/// rejects a second tracker for the same league.
#[derive(PartialEq, Eq, Debug, FromRow, Clone, Serialize)]
pub struct LeagueSyncState {
    pub league_id: i64,

    /// Highest match id already walked in the league history. The next run
    /// resumes after this id.
    pub last_match_id: Option<i64>,

    /// Match ids whose detail fetch failed; retried at the start of the next
    /// run instead of blocking the one that saw them.
    pub failed_match_ids: Json<Vec<i64>>,

    /// Advisory guard against overlapping runs. Not a distributed lock.
    pub is_syncing: bool,

    #[serde(serialize_with = "serialize_datetime")]
    pub last_sync_at: Option<time::OffsetDateTime>,
}

/// League plus its sync state, as shown on the API and in bot replies.
#[derive(Debug, Clone, Serialize)]
pub struct LeagueStatus {
    pub league: League,
    pub sync: LeagueSyncState,
}
