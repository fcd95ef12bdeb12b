use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::player::{MatchPlayer, MatchSummary, Player};

/// One entry of a league's match history listing.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HistoryEntry {
    pub match_id: i64,
    pub start_time: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HistoryPage {
    pub matches: Vec<HistoryEntry>,
}

/// Full match payload. `player_slot` follows the source API's convention:
/// bit 7 set means the player was on the dire side.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MatchDetails {
    pub match_id: i64,
    pub start_time: i64,
    pub duration: i64,
    pub radiant_win: bool,
    pub players: Vec<MatchDetailsPlayer>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MatchDetailsPlayer {
    pub account_id: i64,
    pub player_slot: i64,
    pub kills: i64,
    pub deaths: i64,
    pub assists: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlayerSummary {
    pub account_id: i64,
    pub persona_name: String,
    pub avatar: Option<String>,
    pub avatar_full: Option<String>,
    pub profile_url: Option<String>,
    pub rank_tier: Option<i64>,
    pub leaderboard_rank: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlayerSummaryPage {
    pub players: Vec<PlayerSummary>,
}

fn side_of(player_slot: i64) -> &'static str {
    if player_slot & 0x80 != 0 {
        "dire"
    } else {
        "radiant"
    }
}

impl MatchDetails {
    pub fn summary(&self, league_id: i64) -> MatchSummary {
        MatchSummary {
            match_id: self.match_id,
            league_id,
            start_time: self.start_time,
            duration_secs: self.duration,
            winning_side: if self.radiant_win { "radiant" } else { "dire" }.to_owned(),
        }
    }

    pub fn match_players(&self) -> Vec<MatchPlayer> {
        self.players
            .iter()
            .map(|p| MatchPlayer {
                match_id: self.match_id,
                account_id: p.account_id,
                side: side_of(p.player_slot).to_owned(),
                kills: p.kills,
                deaths: p.deaths,
                assists: p.assists,
            })
            .collect()
    }
}

impl From<PlayerSummary> for Player {
    fn from(summary: PlayerSummary) -> Player {
        Player {
            account_id: summary.account_id,
            persona_name: summary.persona_name,
            avatar: summary.avatar,
            avatar_full: summary.avatar_full,
            profile_url: summary.profile_url,
            rank_tier: summary.rank_tier,
            leaderboard_rank: summary.leaderboard_rank,
        }
    }
}

/// The read side of the external match-statistics API. The sync engine only
/// talks to this trait, so tests can swap in a canned implementation.
#[async_trait]
pub trait MatchApi: Send + Sync {
    /// League history strictly after `after_match_id`, oldest first. An empty
    /// page means the league is fully walked.
    async fn league_history(
        &self,
        league_id: i64,
        after_match_id: Option<i64>,
    ) -> anyhow::Result<Vec<HistoryEntry>>;

    async fn match_details(&self, match_id: i64) -> anyhow::Result<MatchDetails>;

    async fn player_summaries(&self, account_ids: &[i64]) -> anyhow::Result<Vec<PlayerSummary>>;
}

/// HTTP client for the match-statistics API. Non-2xx responses surface as
/// errors; bodies are decoded into the typed structs above.
pub struct StatsApiClient {
    client: reqwest::Client,
    base_url: Url,
    key: Option<String>,
}

impl StatsApiClient {
    pub fn new(base_url: &str, key: Option<String>) -> anyhow::Result<Self> {
        Ok(StatsApiClient {
            client: reqwest::Client::new(),
            base_url: Url::parse(base_url)?,
            key,
        })
    }

    fn endpoint(&self, path: &str) -> anyhow::Result<Url> {
        let mut url = self.base_url.join(path)?;
        if let Some(key) = &self.key {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> anyhow::Result<T> {
        log::debug!("GET {}", url.path());
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl MatchApi for StatsApiClient {
    async fn league_history(
        &self,
        league_id: i64,
        after_match_id: Option<i64>,
    ) -> anyhow::Result<Vec<HistoryEntry>> {
        let mut url = self.endpoint(&format!("league/{}/history", league_id))?;
        if let Some(after) = after_match_id {
            url.query_pairs_mut()
                .append_pair("after_match_id", &after.to_string());
        }
        let page: HistoryPage = self.get_json(url).await?;
        Ok(page.matches)
    }

    async fn match_details(&self, match_id: i64) -> anyhow::Result<MatchDetails> {
        let url = self.endpoint(&format!("match/{}", match_id))?;
        self.get_json(url).await
    }

    async fn player_summaries(&self, account_ids: &[i64]) -> anyhow::Result<Vec<PlayerSummary>> {
        let ids = account_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let mut url = self.endpoint("players")?;
        url.query_pairs_mut().append_pair("account_ids", &ids);
        let page: PlayerSummaryPage = self.get_json(url).await?;
        Ok(page.players)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_slot_encodes_the_side() {
        assert_eq!(side_of(0), "radiant");
        assert_eq!(side_of(2), "radiant");
        assert_eq!(side_of(0x80), "dire");
        assert_eq!(side_of(0x84), "dire");
    }

    #[test]
    fn details_flatten_into_local_rows() {
        let details = MatchDetails {
            match_id: 11,
            start_time: 1700000000,
            duration: 1800,
            radiant_win: false,
            players: vec![
                MatchDetailsPlayer {
                    account_id: 1,
                    player_slot: 0,
                    kills: 5,
                    deaths: 1,
                    assists: 2,
                },
                MatchDetailsPlayer {
                    account_id: 2,
                    player_slot: 0x81,
                    kills: 9,
                    deaths: 0,
                    assists: 7,
                },
            ],
        };
        let summary = details.summary(77);
        assert_eq!(summary.league_id, 77);
        assert_eq!(summary.winning_side, "dire");

        let players = details.match_players();
        assert_eq!(players[0].side, "radiant");
        assert_eq!(players[1].side, "dire");
        assert_eq!(players[1].match_id, 11);
    }

    #[tokio::test]
    async fn history_request_carries_cursor_and_key() {
        let server = httpmock::MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET)
                    .path("/league/42/history")
                    .query_param("key", "sekrit")
                    .query_param("after_match_id", "900");
                then.status(200).json_body(serde_json::json!({
                    "matches": [
                        { "match_id": 901, "start_time": 1700000100 },
                        { "match_id": 902, "start_time": 1700000200 }
                    ]
                }));
            })
            .await;

        let client =
            StatsApiClient::new(&server.base_url(), Some("sekrit".to_string())).unwrap();
        let page = client.league_history(42, Some(900)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].match_id, 901);
    }

    #[tokio::test]
    async fn player_summaries_batch_ids_into_one_query() {
        let server = httpmock::MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET)
                    .path("/players")
                    .query_param("account_ids", "7,8");
                then.status(200).json_body(serde_json::json!({
                    "players": [
                        { "account_id": 7, "persona_name": "seven" },
                        { "account_id": 8, "persona_name": "eight" }
                    ]
                }));
            })
            .await;

        let client = StatsApiClient::new(&server.base_url(), None).unwrap();
        let players = client.player_summaries(&[7, 8]).await.unwrap();

        mock.assert_async().await;
        assert_eq!(players[1].persona_name, "eight");
        assert_eq!(players[0].rank_tier, None);
    }

    #[tokio::test]
    async fn upstream_errors_do_not_decode() {
        let server = httpmock::MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET).path("/match/500");
                then.status(502).body("bad gateway");
            })
            .await;

        let client = StatsApiClient::new(&server.base_url(), None).unwrap();
        assert!(client.match_details(500).await.is_err());
    }
}
