use anyhow::anyhow;
use std::path::Path;

use sqlx::{
    migrate::MigrateDatabase, prelude::FromRow, sqlite::SqlitePoolOptions, sqlite::Sqlite,
    types::time::OffsetDateTime, types::Json, SqlitePool,
};

use crate::{
    core::{
        bracket::{Bracket, BracketRound, BracketSlot, Game},
        league::{League, LeagueStatus, LeagueSyncState},
        player::{MatchPlayer, MatchSummary, Player},
        tournament::{Team, Tournament},
        user::{LoginRequest, User},
    },
    error::Error,
};

pub struct ProjectDb {
    db: SqlitePool,
}

/// Flat persisted form of a bracket game. Slots are either a team id or a
/// bye marker; both unset means the slot is still waiting on a feeder game.
#[derive(FromRow)]
struct GameRow {
    id: i64,
    bracket: String,
    round: i64,
    idx: i64,
    home_team: Option<i64>,
    home_bye: bool,
    away_team: Option<i64>,
    away_bye: bool,
    winner: Option<i64>,
    winner_to: Option<i64>,
    winner_to_slot: Option<i64>,
    loser_to: Option<i64>,
    loser_to_slot: Option<i64>,
}

fn round_to_db(round: BracketRound) -> (&'static str, i64) {
    match round {
        BracketRound::Winners(r) => ("W", r as i64),
        BracketRound::Losers(r) => ("L", r as i64),
        BracketRound::GrandFinal => ("G", 0),
    }
}

fn round_from_db(bracket: &str, round: i64) -> anyhow::Result<BracketRound> {
    match bracket {
        "W" => Ok(BracketRound::Winners(round as u32)),
        "L" => Ok(BracketRound::Losers(round as u32)),
        "G" => Ok(BracketRound::GrandFinal),
        other => Err(anyhow!("Unknown bracket code {}", other)),
    }
}

fn slot_to_db(slot: BracketSlot) -> (Option<i64>, bool) {
    match slot {
        BracketSlot::Team(t) => (Some(t), false),
        BracketSlot::Bye => (None, true),
        BracketSlot::Empty => (None, false),
    }
}

fn slot_from_db(team: Option<i64>, bye: bool) -> BracketSlot {
    match (team, bye) {
        (Some(t), _) => BracketSlot::Team(t),
        (None, true) => BracketSlot::Bye,
        (None, false) => BracketSlot::Empty,
    }
}

impl GameRow {
    fn into_game(self) -> anyhow::Result<Game> {
        Ok(Game {
            id: self.id,
            round: round_from_db(&self.bracket, self.round)?,
            index: self.idx as u32,
            slots: [
                slot_from_db(self.home_team, self.home_bye),
                slot_from_db(self.away_team, self.away_bye),
            ],
            winner: self.winner,
            winner_to: self.winner_to.zip(self.winner_to_slot.map(|s| s as usize)),
            loser_to: self.loser_to.zip(self.loser_to_slot.map(|s| s as usize)),
        })
    }
}

impl ProjectDb {
    pub async fn init(file: &Path) -> anyhow::Result<Self> {
        let url = format!(
            "sqlite://{}",
            file.to_str().ok_or(anyhow!("Non-utf8 database path"))?
        );
        if !Sqlite::database_exists(&url).await.unwrap_or(false) {
            Sqlite::create_database(&url).await?;
        }

        let db = SqlitePool::connect(&url).await?;
        Self::create_schema(&db).await?;
        Ok(ProjectDb { db })
    }

    /// Single-connection in-memory database, used by tests.
    pub async fn init_in_memory() -> anyhow::Result<Self> {
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::create_schema(&db).await?;
        Ok(ProjectDb { db })
    }

    async fn create_schema(db: &SqlitePool) -> anyhow::Result<()> {
        sqlx::query(
            "create table if not exists users(
                        id integer primary key autoincrement,
                        external_id text unique not null,
                        display_name text not null,
                        avatar_url text,
                        email text,
                        country text,
                        city text,
                        is_admin boolean not null default false
                    );",
        )
        .execute(db)
        .await?;

        sqlx::query(
            "create table if not exists players(
                        account_id integer primary key not null,
                        persona_name text not null,
                        avatar text,
                        avatar_full text,
                        profile_url text,
                        rank_tier integer,
                        leaderboard_rank integer
                    );",
        )
        .execute(db)
        .await?;

        sqlx::query(
            "create table if not exists leagues(
                        id integer primary key not null,
                        name text not null
                    );",
        )
        .execute(db)
        .await?;

        sqlx::query(
            "create table if not exists league_sync(
                        league_id integer primary key not null,
                        last_match_id integer,
                        failed_match_ids text not null,
                        is_syncing boolean not null default false,
                        last_sync_at integer,
                        foreign key(league_id) references leagues(id) on delete cascade
                    );",
        )
        .execute(db)
        .await?;

        sqlx::query(
            "create table if not exists matches(
                        match_id integer primary key not null,
                        league_id integer not null,
                        start_time integer not null,
                        duration_secs integer not null,
                        winning_side text not null,
                        foreign key(league_id) references leagues(id) on delete cascade
                    );",
        )
        .execute(db)
        .await?;

        sqlx::query(
            "create table if not exists match_players(
                        match_id integer not null,
                        account_id integer not null,
                        side text not null,
                        kills integer not null,
                        deaths integer not null,
                        assists integer not null,
                        primary key(match_id, account_id),
                        foreign key(match_id) references matches(match_id) on delete cascade
                    );",
        )
        .execute(db)
        .await?;

        sqlx::query(
            "create table if not exists tournaments(
                        id integer primary key autoincrement,
                        name text not null,
                        created_at integer not null
                    );",
        )
        .execute(db)
        .await?;

        sqlx::query(
            "create table if not exists teams(
                        id integer primary key autoincrement,
                        tournament_id integer not null,
                        name text not null,
                        seed integer not null,
                        foreign key(tournament_id) references tournaments(id) on delete cascade
                    );",
        )
        .execute(db)
        .await?;

        sqlx::query(
            "create table if not exists games(
                        tournament_id integer not null,
                        id integer not null,
                        bracket text not null,
                        round integer not null,
                        idx integer not null,
                        home_team integer,
                        home_bye boolean not null,
                        away_team integer,
                        away_bye boolean not null,
                        winner integer,
                        winner_to integer,
                        winner_to_slot integer,
                        loser_to integer,
                        loser_to_slot integer,
                        primary key(tournament_id, id),
                        foreign key(tournament_id) references tournaments(id) on delete cascade
                    );",
        )
        .execute(db)
        .await?;

        Ok(())
    }

    // -- users --------------------------------------------------------------

    /// Upsert by external account id. Keeps the row id and any previously
    /// captured profile fields when the user logs in again.
    pub async fn upsert_user(&self, login: &LoginRequest, is_admin: bool) -> anyhow::Result<User> {
        sqlx::query(
            "insert into users(external_id, display_name, avatar_url, is_admin)
                values(?, ?, ?, ?)
                on conflict(external_id) do update set
                    display_name = excluded.display_name,
                    avatar_url = excluded.avatar_url,
                    is_admin = excluded.is_admin",
        )
        .bind(&login.external_id)
        .bind(&login.display_name)
        .bind(&login.avatar_url)
        .bind(is_admin)
        .execute(&self.db)
        .await?;

        self.find_user_by_external_id(&login.external_id).await
    }

    pub async fn find_user_by_external_id(&self, external_id: &str) -> anyhow::Result<User> {
        sqlx::query_as("select * from users where external_id = ? limit 1")
            .bind(external_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(anyhow!("No user with external id {}", external_id))
    }

    pub async fn get_user(&self, id: i64) -> anyhow::Result<User> {
        sqlx::query_as("select * from users where id = ? limit 1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(Error::UnknownUser(id).into())
    }

    pub async fn get_users(&self) -> anyhow::Result<Vec<User>> {
        Ok(sqlx::query_as("select * from users order by id")
            .fetch_all(&self.db)
            .await?)
    }

    pub async fn update_user_profile(
        &self,
        id: i64,
        email: Option<&str>,
        country: Option<&str>,
        city: Option<&str>,
    ) -> anyhow::Result<()> {
        let updated = sqlx::query(
            "update users set
                    email = coalesce(?, email),
                    country = coalesce(?, country),
                    city = coalesce(?, city)
                where id = ?",
        )
        .bind(email)
        .bind(country)
        .bind(city)
        .bind(id)
        .execute(&self.db)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(Error::UnknownUser(id).into());
        }
        Ok(())
    }

    pub async fn delete_user(&self, id: i64) -> anyhow::Result<()> {
        Ok(sqlx::query("delete from users where id = ?")
            .bind(id)
            .execute(&self.db)
            .await
            .map(|_| ())?)
    }

    // -- players and matches ------------------------------------------------

    pub async fn upsert_player(&self, player: &Player) -> anyhow::Result<()> {
        Ok(sqlx::query(
            "insert or replace into players(
                    account_id, persona_name, avatar, avatar_full,
                    profile_url, rank_tier, leaderboard_rank
                ) values(?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(player.account_id)
        .bind(&player.persona_name)
        .bind(&player.avatar)
        .bind(&player.avatar_full)
        .bind(&player.profile_url)
        .bind(player.rank_tier)
        .bind(player.leaderboard_rank)
        .execute(&self.db)
        .await
        .map(|_| ())?)
    }

    pub async fn get_player(&self, account_id: i64) -> anyhow::Result<Player> {
        sqlx::query_as("select * from players where account_id = ? limit 1")
            .bind(account_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(anyhow!("No player with account id {}", account_id))
    }

    pub async fn get_player_count(&self) -> anyhow::Result<u32> {
        Ok(sqlx::query_scalar("select count(*) from players")
            .fetch_one(&self.db)
            .await?)
    }

    pub async fn upsert_match(
        &self,
        summary: &MatchSummary,
        players: &[MatchPlayer],
    ) -> anyhow::Result<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query(
            "insert or replace into matches(
                    match_id, league_id, start_time, duration_secs, winning_side
                ) values(?, ?, ?, ?, ?)",
        )
        .bind(summary.match_id)
        .bind(summary.league_id)
        .bind(summary.start_time)
        .bind(summary.duration_secs)
        .bind(&summary.winning_side)
        .execute(&mut *tx)
        .await?;

        sqlx::query("delete from match_players where match_id = ?")
            .bind(summary.match_id)
            .execute(&mut *tx)
            .await?;

        for player in players {
            sqlx::query(
                "insert into match_players(
                        match_id, account_id, side, kills, deaths, assists
                    ) values(?, ?, ?, ?, ?, ?)",
            )
            .bind(player.match_id)
            .bind(player.account_id)
            .bind(&player.side)
            .bind(player.kills)
            .bind(player.deaths)
            .bind(player.assists)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_match(&self, match_id: i64) -> anyhow::Result<MatchSummary> {
        sqlx::query_as("select * from matches where match_id = ? limit 1")
            .bind(match_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(anyhow!("No match {}", match_id))
    }

    pub async fn get_match_players(&self, match_id: i64) -> anyhow::Result<Vec<MatchPlayer>> {
        Ok(
            sqlx::query_as("select * from match_players where match_id = ? order by account_id")
                .bind(match_id)
                .fetch_all(&self.db)
                .await?,
        )
    }

    pub async fn get_match_count(&self, league_id: i64) -> anyhow::Result<u32> {
        Ok(
            sqlx::query_scalar("select count(*) from matches where league_id = ?")
                .bind(league_id)
                .fetch_one(&self.db)
                .await?,
        )
    }

    // -- leagues and sync state ---------------------------------------------

    /// Track a league: creates the league row and its sync state. The sync
    /// state starts with an empty failed list and no last-sync timestamp; a
    /// second tracker for the same league id is rejected by the primary key.
    pub async fn add_league(&self, id: i64, name: &str) -> anyhow::Result<League> {
        let mut tx = self.db.begin().await?;
        sqlx::query("insert into leagues(id, name) values(?, ?)")
            .bind(id)
            .bind(name)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "insert into league_sync(league_id, failed_match_ids, is_syncing)
                values(?, ?, false)",
        )
        .bind(id)
        .bind(Json(Vec::<i64>::new()))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(League {
            id,
            name: name.to_owned(),
        })
    }

    pub async fn get_league(&self, id: i64) -> anyhow::Result<League> {
        sqlx::query_as("select * from leagues where id = ? limit 1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(Error::UnknownLeague(id).into())
    }

    pub async fn get_leagues(&self) -> anyhow::Result<Vec<League>> {
        Ok(sqlx::query_as("select * from leagues order by id")
            .fetch_all(&self.db)
            .await?)
    }

    pub async fn delete_league(&self, id: i64) -> anyhow::Result<()> {
        Ok(sqlx::query("delete from leagues where id = ?")
            .bind(id)
            .execute(&self.db)
            .await
            .map(|_| ())?)
    }

    pub async fn get_sync_state(&self, league_id: i64) -> anyhow::Result<LeagueSyncState> {
        sqlx::query_as("select * from league_sync where league_id = ? limit 1")
            .bind(league_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(Error::UnknownLeague(league_id).into())
    }

    pub async fn get_league_statuses(&self) -> anyhow::Result<Vec<LeagueStatus>> {
        let mut statuses = Vec::new();
        for league in self.get_leagues().await? {
            let sync = self.get_sync_state(league.id).await?;
            statuses.push(LeagueStatus { league, sync });
        }
        Ok(statuses)
    }

    /// Flip the advisory sync flag on, but only if it was off. Returns false
    /// when another run already holds the flag.
    pub async fn try_begin_sync(&self, league_id: i64) -> anyhow::Result<bool> {
        // existence check first so a missing league is an error, not a skip
        self.get_sync_state(league_id).await?;
        let updated = sqlx::query(
            "update league_sync set is_syncing = true
                where league_id = ? and is_syncing = false",
        )
        .bind(league_id)
        .execute(&self.db)
        .await?;
        Ok(updated.rows_affected() == 1)
    }

    /// Persist the outcome of a sync run and release the flag.
    pub async fn complete_sync(
        &self,
        league_id: i64,
        last_match_id: Option<i64>,
        failed_match_ids: &[i64],
    ) -> anyhow::Result<()> {
        Ok(sqlx::query(
            "update league_sync set
                    last_match_id = ?,
                    failed_match_ids = ?,
                    is_syncing = false,
                    last_sync_at = ?
                where league_id = ?",
        )
        .bind(last_match_id)
        .bind(Json(failed_match_ids.to_vec()))
        .bind(OffsetDateTime::now_utc().unix_timestamp())
        .bind(league_id)
        .execute(&self.db)
        .await
        .map(|_| ())?)
    }

    /// Release the flag without touching cursor or failed list, for runs that
    /// died before walking any history.
    pub async fn abort_sync(&self, league_id: i64) -> anyhow::Result<()> {
        Ok(
            sqlx::query("update league_sync set is_syncing = false where league_id = ?")
                .bind(league_id)
                .execute(&self.db)
                .await
                .map(|_| ())?,
        )
    }

    // -- tournaments --------------------------------------------------------

    pub async fn create_tournament(&self, name: &str) -> anyhow::Result<Tournament> {
        let created_at = OffsetDateTime::now_utc();
        let result = sqlx::query("insert into tournaments(name, created_at) values(?, ?)")
            .bind(name)
            .bind(created_at.unix_timestamp())
            .execute(&self.db)
            .await?;
        self.get_tournament(result.last_insert_rowid()).await
    }

    pub async fn get_tournament(&self, id: i64) -> anyhow::Result<Tournament> {
        sqlx::query_as("select * from tournaments where id = ? limit 1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(Error::UnknownTournament(id).into())
    }

    pub async fn get_tournaments(&self) -> anyhow::Result<Vec<Tournament>> {
        Ok(sqlx::query_as("select * from tournaments order by id")
            .fetch_all(&self.db)
            .await?)
    }

    pub async fn delete_tournament(&self, id: i64) -> anyhow::Result<()> {
        Ok(sqlx::query("delete from tournaments where id = ?")
            .bind(id)
            .execute(&self.db)
            .await
            .map(|_| ())?)
    }

    pub async fn add_team(
        &self,
        tournament_id: i64,
        name: &str,
        seed: i64,
    ) -> anyhow::Result<Team> {
        self.get_tournament(tournament_id).await?;
        let result = sqlx::query("insert into teams(tournament_id, name, seed) values(?, ?, ?)")
            .bind(tournament_id)
            .bind(name)
            .bind(seed)
            .execute(&self.db)
            .await?;
        self.get_team(result.last_insert_rowid()).await
    }

    pub async fn get_team(&self, id: i64) -> anyhow::Result<Team> {
        sqlx::query_as("select * from teams where id = ? limit 1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(anyhow!("No team {}", id))
    }

    pub async fn get_teams(&self, tournament_id: i64) -> anyhow::Result<Vec<Team>> {
        Ok(
            sqlx::query_as("select * from teams where tournament_id = ? order by seed, id")
                .bind(tournament_id)
                .fetch_all(&self.db)
                .await?,
        )
    }

    pub async fn set_team_seed(&self, team_id: i64, seed: i64) -> anyhow::Result<()> {
        Ok(sqlx::query("update teams set seed = ? where id = ?")
            .bind(seed)
            .bind(team_id)
            .execute(&self.db)
            .await
            .map(|_| ())?)
    }

    // -- brackets -----------------------------------------------------------

    pub async fn has_bracket(&self, tournament_id: i64) -> anyhow::Result<bool> {
        let games: u32 = sqlx::query_scalar("select count(*) from games where tournament_id = ?")
            .bind(tournament_id)
            .fetch_one(&self.db)
            .await?;
        Ok(games > 0)
    }

    /// Replace the stored bracket for a tournament in one transaction.
    pub async fn save_bracket(&self, tournament_id: i64, bracket: &Bracket) -> anyhow::Result<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query("delete from games where tournament_id = ?")
            .bind(tournament_id)
            .execute(&mut *tx)
            .await?;

        for game in &bracket.games {
            let (code, round) = round_to_db(game.round);
            let (home_team, home_bye) = slot_to_db(game.slots[0]);
            let (away_team, away_bye) = slot_to_db(game.slots[1]);
            sqlx::query(
                "insert into games(
                        tournament_id, id, bracket, round, idx,
                        home_team, home_bye, away_team, away_bye,
                        winner, winner_to, winner_to_slot, loser_to, loser_to_slot
                    ) values(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(tournament_id)
            .bind(game.id)
            .bind(code)
            .bind(round)
            .bind(game.index as i64)
            .bind(home_team)
            .bind(home_bye)
            .bind(away_team)
            .bind(away_bye)
            .bind(game.winner)
            .bind(game.winner_to.map(|(id, _)| id))
            .bind(game.winner_to.map(|(_, slot)| slot as i64))
            .bind(game.loser_to.map(|(id, _)| id))
            .bind(game.loser_to.map(|(_, slot)| slot as i64))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_bracket(&self, tournament_id: i64) -> anyhow::Result<Option<Bracket>> {
        let rows: Vec<GameRow> =
            sqlx::query_as("select * from games where tournament_id = ? order by id")
                .bind(tournament_id)
                .fetch_all(&self.db)
                .await?;
        if rows.is_empty() {
            return Ok(None);
        }
        let games = rows
            .into_iter()
            .map(GameRow::into_game)
            .collect::<anyhow::Result<Vec<Game>>>()?;
        let team_count = self.get_teams(tournament_id).await?.len();
        Ok(Some(Bracket { games, team_count }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login(external_id: &str, name: &str) -> LoginRequest {
        LoginRequest {
            external_id: external_id.to_owned(),
            display_name: name.to_owned(),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn sync_state_starts_empty_and_league_ids_are_unique() {
        let db = ProjectDb::init_in_memory().await.unwrap();
        db.add_league(731, "The Big One").await.unwrap();

        let state = db.get_sync_state(731).await.unwrap();
        assert_eq!(state.last_match_id, None);
        assert!(state.failed_match_ids.0.is_empty());
        assert!(!state.is_syncing);
        assert_eq!(state.last_sync_at, None);

        assert!(db.add_league(731, "Duplicate").await.is_err());
    }

    #[tokio::test]
    async fn sync_flag_is_exclusive_until_released() {
        let db = ProjectDb::init_in_memory().await.unwrap();
        db.add_league(1, "League").await.unwrap();

        assert!(db.try_begin_sync(1).await.unwrap());
        assert!(!db.try_begin_sync(1).await.unwrap());

        db.complete_sync(1, Some(500), &[7, 8]).await.unwrap();
        let state = db.get_sync_state(1).await.unwrap();
        assert!(!state.is_syncing);
        assert_eq!(state.last_match_id, Some(500));
        assert_eq!(state.failed_match_ids.0, vec![7, 8]);
        assert!(state.last_sync_at.is_some());

        assert!(db.try_begin_sync(1).await.unwrap());
        db.abort_sync(1).await.unwrap();
        let state = db.get_sync_state(1).await.unwrap();
        assert!(!state.is_syncing);
        assert_eq!(state.last_match_id, Some(500));

        assert!(db.try_begin_sync(99).await.is_err());
    }

    #[tokio::test]
    async fn user_upsert_keeps_id_and_profile() {
        let db = ProjectDb::init_in_memory().await.unwrap();
        let first = db.upsert_user(&login("7656119", "old name"), false).await.unwrap();
        db.update_user_profile(first.id, Some("a@b.c"), Some("DE"), None)
            .await
            .unwrap();

        let second = db.upsert_user(&login("7656119", "new name"), true).await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.display_name, "new name");
        assert!(second.is_admin);
        assert_eq!(second.email.as_deref(), Some("a@b.c"));
        assert_eq!(second.country.as_deref(), Some("DE"));

        assert_eq!(db.get_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bracket_round_trips_through_storage() {
        let db = ProjectDb::init_in_memory().await.unwrap();
        let tournament = db.create_tournament("Winter Cup").await.unwrap();
        let mut team_ids = Vec::new();
        for (seed, name) in ["alpha", "beta", "gamma", "delta", "epsilon"].iter().enumerate() {
            let team = db
                .add_team(tournament.id, name, seed as i64 + 1)
                .await
                .unwrap();
            team_ids.push(team.id);
        }

        let mut bracket = Bracket::generate(&team_ids).unwrap();
        let opener = bracket
            .games
            .iter()
            .find(|g| g.winner.is_none() && g.slots.iter().all(|s| matches!(s, BracketSlot::Team(_))))
            .unwrap();
        let (game_id, team) = (
            opener.id,
            match opener.slots[0] {
                BracketSlot::Team(t) => t,
                _ => unreachable!(),
            },
        );
        bracket.report_winner(game_id, team).unwrap();

        db.save_bracket(tournament.id, &bracket).await.unwrap();
        let loaded = db.get_bracket(tournament.id).await.unwrap().unwrap();
        assert_eq!(loaded, bracket);

        // saving again replaces rather than duplicates
        db.save_bracket(tournament.id, &bracket).await.unwrap();
        let reloaded = db.get_bracket(tournament.id).await.unwrap().unwrap();
        assert_eq!(reloaded.games.len(), bracket.games.len());
    }

    #[tokio::test]
    async fn match_upsert_is_idempotent() {
        let db = ProjectDb::init_in_memory().await.unwrap();
        db.add_league(2, "League").await.unwrap();
        let summary = MatchSummary {
            match_id: 9000,
            league_id: 2,
            start_time: 1700000000,
            duration_secs: 2400,
            winning_side: "radiant".to_owned(),
        };
        let players = vec![MatchPlayer {
            match_id: 9000,
            account_id: 42,
            side: "radiant".to_owned(),
            kills: 10,
            deaths: 2,
            assists: 14,
        }];

        db.upsert_match(&summary, &players).await.unwrap();
        db.upsert_match(&summary, &players).await.unwrap();

        assert_eq!(db.get_match(9000).await.unwrap(), summary);
        assert_eq!(db.get_match_players(9000).await.unwrap(), players);
        assert_eq!(db.get_match_count(2).await.unwrap(), 1);
    }
}
