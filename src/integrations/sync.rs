use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::{sync::mpsc::UnboundedReceiver, time};

use crate::{
    core::{db::ProjectDb, league::League, player::Player},
    web::dashboard::{WebActor, WebCommand},
    ActorRef, Rto,
};

use super::stats_api::MatchApi;

pub enum SyncRequest {
    TrackLeague(i64, String, Rto<League>),
    UntrackLeague(i64, Rto<()>),
    SyncLeague(i64, Rto<SyncReport>),
}

pub type SyncActor = ActorRef<SyncRequest>;

/// Outcome of one sync run, also returned on the manual-trigger endpoint.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SyncReport {
    pub league_id: i64,

    /// True when the run was skipped because the advisory flag was held.
    pub skipped: bool,

    pub new_matches: u32,

    /// Previously failed ids that went through this time
    pub recovered: u32,

    pub failed_match_ids: Vec<i64>,
    pub last_match_id: Option<i64>,
}

/// Serializes sync work for all leagues. Sync runs happen inline in the actor
/// loop, so two leagues never sync at once from this process; the `is_syncing`
/// flag additionally guards against triggers from elsewhere.
pub async fn run_sync_actor<Api: MatchApi>(
    api: Arc<Api>,
    db: Arc<ProjectDb>,
    web_actor: WebActor,
    mut rx: UnboundedReceiver<SyncRequest>,
) {
    while let Some(msg) = rx.recv().await {
        match msg {
            SyncRequest::TrackLeague(id, name, rto) => {
                let res = db.add_league(id, &name).await;
                let ok = res.is_ok();
                rto.reply(res);
                if ok {
                    web_actor.send(WebCommand::SendStateUpdate);
                }
            }
            SyncRequest::UntrackLeague(id, rto) => {
                rto.reply(db.delete_league(id).await);
                web_actor.send(WebCommand::SendStateUpdate);
            }
            SyncRequest::SyncLeague(id, rto) => {
                let res = sync_league(api.as_ref(), &db, id).await;
                let ok = res.is_ok();
                rto.reply(res);
                if ok {
                    web_actor.send(WebCommand::SendStateUpdate);
                }
            }
        }
    }
}

/// Fires a sync for every tracked league on a fixed interval. Runs go through
/// the sync actor so manual triggers and scheduled ones cannot interleave.
pub async fn run_sync_scheduler(db: Arc<ProjectDb>, sync_actor: SyncActor, interval_secs: u64) {
    let mut interval = time::interval(Duration::from_secs(interval_secs));
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let leagues = match db.get_leagues().await {
            Ok(leagues) => leagues,
            Err(e) => {
                log::error!("Failed to list leagues for scheduled sync: {}", e);
                continue;
            }
        };
        for league in leagues {
            match crate::send_message!(sync_actor, SyncRequest, SyncLeague, league.id) {
                Ok(report) if report.skipped => {
                    log::warn!("Scheduled sync for league {} skipped, already running", league.id)
                }
                Ok(report) => log::info!(
                    "Synced league {}: {} new, {} recovered, {} failed",
                    league.id,
                    report.new_matches,
                    report.recovered,
                    report.failed_match_ids.len()
                ),
                Err(e) => log::error!("Scheduled sync for league {} failed: {}", league.id, e),
            }
        }
    }
}

/// One resumable sync run for a league. Retries previously failed match ids
/// first, then walks the history forward from the stored cursor. Individual
/// match failures land on the failed list; only a failing history listing
/// aborts the run. The advisory flag is released on every path.
pub async fn sync_league<Api: MatchApi + ?Sized>(
    api: &Api,
    db: &ProjectDb,
    league_id: i64,
) -> anyhow::Result<SyncReport> {
    let state = db.get_sync_state(league_id).await?;
    if !db.try_begin_sync(league_id).await? {
        log::warn!("League {} is already syncing, skipping", league_id);
        return Ok(SyncReport {
            league_id,
            skipped: true,
            ..Default::default()
        });
    }

    let mut report = SyncReport {
        league_id,
        last_match_id: state.last_match_id,
        ..Default::default()
    };

    for &match_id in state.failed_match_ids.0.iter() {
        match fetch_and_store(api, db, league_id, match_id).await {
            Ok(()) => report.recovered += 1,
            Err(e) => {
                log::warn!("Match {} failed again: {}", match_id, e);
                report.failed_match_ids.push(match_id);
            }
        }
    }

    let walk = walk_history(api, db, league_id, &mut report).await;
    match walk {
        Ok(()) => {
            db.complete_sync(league_id, report.last_match_id, &report.failed_match_ids)
                .await?;
            Ok(report)
        }
        Err(e) => {
            log::error!("History walk for league {} failed: {}", league_id, e);
            db.abort_sync(league_id).await?;
            Err(e)
        }
    }
}

async fn walk_history<Api: MatchApi + ?Sized>(
    api: &Api,
    db: &ProjectDb,
    league_id: i64,
    report: &mut SyncReport,
) -> anyhow::Result<()> {
    loop {
        let cursor = report.last_match_id;
        let page = api.league_history(league_id, cursor).await?;
        if page.is_empty() {
            return Ok(());
        }

        let page_max = page.iter().map(|e| e.match_id).max();
        if page_max <= cursor {
            // a misbehaving API that repeats itself must not spin us forever
            log::warn!("League {} history did not advance past {:?}", league_id, cursor);
            return Ok(());
        }

        for entry in &page {
            if Some(entry.match_id) <= cursor {
                continue;
            }
            match fetch_and_store(api, db, league_id, entry.match_id).await {
                Ok(()) => report.new_matches += 1,
                Err(e) => {
                    log::warn!("Failed to sync match {}: {}", entry.match_id, e);
                    report.failed_match_ids.push(entry.match_id);
                }
            }
            // the cursor includes failed ids: they are retried from the
            // failed list, never by paging over them again
            report.last_match_id = report.last_match_id.max(Some(entry.match_id));
        }
    }
}

/// Fetch one match and mirror it locally: the match row, its per-player
/// lines, and the profiles of everyone in it. All-or-nothing per match.
async fn fetch_and_store<Api: MatchApi + ?Sized>(
    api: &Api,
    db: &ProjectDb,
    league_id: i64,
    match_id: i64,
) -> anyhow::Result<()> {
    let details = api.match_details(match_id).await?;
    let account_ids: Vec<i64> = details.players.iter().map(|p| p.account_id).collect();
    let summaries = api.player_summaries(&account_ids).await?;

    db.upsert_match(&details.summary(league_id), &details.match_players())
        .await?;
    for summary in summaries {
        db.upsert_player(&Player::from(summary)).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::integrations::stats_api::{HistoryEntry, MatchDetails, MatchDetailsPlayer, PlayerSummary};

    /// Canned API: a fixed league history plus a set of match ids that fail
    /// their detail fetch until removed from `broken`.
    struct FakeApi {
        history: Vec<i64>,
        broken: Mutex<HashSet<i64>>,
        detail_calls: Mutex<HashMap<i64, u32>>,
    }

    impl FakeApi {
        fn new(history: Vec<i64>, broken: &[i64]) -> FakeApi {
            FakeApi {
                history,
                broken: Mutex::new(broken.iter().copied().collect()),
                detail_calls: Mutex::new(HashMap::new()),
            }
        }

        fn repair(&self, match_id: i64) {
            self.broken.lock().unwrap().remove(&match_id);
        }

        fn detail_calls(&self, match_id: i64) -> u32 {
            *self.detail_calls.lock().unwrap().get(&match_id).unwrap_or(&0)
        }
    }

    #[async_trait]
    impl MatchApi for FakeApi {
        async fn league_history(
            &self,
            _league_id: i64,
            after_match_id: Option<i64>,
        ) -> anyhow::Result<Vec<HistoryEntry>> {
            Ok(self
                .history
                .iter()
                .filter(|&&id| Some(id) > after_match_id)
                .map(|&match_id| HistoryEntry {
                    match_id,
                    start_time: 1700000000 + match_id,
                })
                .collect())
        }

        async fn match_details(&self, match_id: i64) -> anyhow::Result<MatchDetails> {
            *self.detail_calls.lock().unwrap().entry(match_id).or_insert(0) += 1;
            if self.broken.lock().unwrap().contains(&match_id) {
                anyhow::bail!("502 from upstream for match {}", match_id);
            }
            Ok(MatchDetails {
                match_id,
                start_time: 1700000000 + match_id,
                duration: 1900,
                radiant_win: match_id % 2 == 0,
                players: vec![MatchDetailsPlayer {
                    account_id: 100 + match_id,
                    player_slot: 0,
                    kills: 1,
                    deaths: 2,
                    assists: 3,
                }],
            })
        }

        async fn player_summaries(
            &self,
            account_ids: &[i64],
        ) -> anyhow::Result<Vec<PlayerSummary>> {
            Ok(account_ids
                .iter()
                .map(|&account_id| PlayerSummary {
                    account_id,
                    persona_name: format!("player{}", account_id),
                    avatar: None,
                    avatar_full: None,
                    profile_url: None,
                    rank_tier: Some(55),
                    leaderboard_rank: None,
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn first_run_walks_everything_and_sets_the_cursor() {
        let db = ProjectDb::init_in_memory().await.unwrap();
        db.add_league(5, "League").await.unwrap();
        let api = FakeApi::new(vec![10, 11, 12], &[]);

        let report = sync_league(&api, &db, 5).await.unwrap();
        assert!(!report.skipped);
        assert_eq!(report.new_matches, 3);
        assert_eq!(report.last_match_id, Some(12));
        assert!(report.failed_match_ids.is_empty());

        let state = db.get_sync_state(5).await.unwrap();
        assert_eq!(state.last_match_id, Some(12));
        assert!(!state.is_syncing);
        assert!(state.last_sync_at.is_some());
        assert_eq!(db.get_match_count(5).await.unwrap(), 3);
        assert_eq!(db.get_player(110).await.unwrap().persona_name, "player110");
    }

    #[tokio::test]
    async fn rerun_without_new_matches_is_a_no_op() {
        let db = ProjectDb::init_in_memory().await.unwrap();
        db.add_league(5, "League").await.unwrap();
        let api = FakeApi::new(vec![10, 11], &[]);

        sync_league(&api, &db, 5).await.unwrap();
        let report = sync_league(&api, &db, 5).await.unwrap();
        assert_eq!(report.new_matches, 0);
        assert_eq!(report.last_match_id, Some(11));
        assert_eq!(db.get_match_count(5).await.unwrap(), 2);
        // details were fetched once per match, not re-paged on the second run
        assert_eq!(api.detail_calls(10), 1);
        assert_eq!(api.detail_calls(11), 1);
    }

    #[tokio::test]
    async fn failed_matches_are_parked_and_retried_next_run() {
        let db = ProjectDb::init_in_memory().await.unwrap();
        db.add_league(5, "League").await.unwrap();
        let api = FakeApi::new(vec![20, 21, 22], &[21]);

        let report = sync_league(&api, &db, 5).await.unwrap();
        assert_eq!(report.new_matches, 2);
        assert_eq!(report.failed_match_ids, vec![21]);
        // the cursor moved past the failure, so it will not be re-paged
        assert_eq!(report.last_match_id, Some(22));

        // still broken: stays parked
        let report = sync_league(&api, &db, 5).await.unwrap();
        assert_eq!(report.failed_match_ids, vec![21]);
        assert_eq!(report.recovered, 0);

        api.repair(21);
        let report = sync_league(&api, &db, 5).await.unwrap();
        assert_eq!(report.recovered, 1);
        assert!(report.failed_match_ids.is_empty());
        let state = db.get_sync_state(5).await.unwrap();
        assert!(state.failed_match_ids.0.is_empty());
        assert_eq!(db.get_match_count(5).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn held_flag_skips_the_run() {
        let db = ProjectDb::init_in_memory().await.unwrap();
        db.add_league(5, "League").await.unwrap();
        db.try_begin_sync(5).await.unwrap();

        let api = FakeApi::new(vec![1], &[]);
        let report = sync_league(&api, &db, 5).await.unwrap();
        assert!(report.skipped);
        assert_eq!(db.get_match_count(5).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn listing_failure_releases_the_flag() {
        struct BrokenApi;
        #[async_trait]
        impl MatchApi for BrokenApi {
            async fn league_history(
                &self,
                _league_id: i64,
                _after: Option<i64>,
            ) -> anyhow::Result<Vec<HistoryEntry>> {
                anyhow::bail!("upstream down")
            }
            async fn match_details(&self, _match_id: i64) -> anyhow::Result<MatchDetails> {
                unreachable!()
            }
            async fn player_summaries(
                &self,
                _account_ids: &[i64],
            ) -> anyhow::Result<Vec<PlayerSummary>> {
                unreachable!()
            }
        }

        let db = ProjectDb::init_in_memory().await.unwrap();
        db.add_league(5, "League").await.unwrap();
        assert!(sync_league(&BrokenApi, &db, 5).await.is_err());
        let state = db.get_sync_state(5).await.unwrap();
        assert!(!state.is_syncing);
        assert_eq!(state.last_sync_at, None);
    }

    #[tokio::test]
    async fn unknown_league_is_an_error() {
        let db = ProjectDb::init_in_memory().await.unwrap();
        let api = FakeApi::new(vec![], &[]);
        assert!(sync_league(&api, &db, 404).await.is_err());
    }
}
