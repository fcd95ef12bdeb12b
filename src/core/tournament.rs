use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};
use sqlx::{prelude::FromRow, types::time};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::{
    core::bracket::{Bracket, GameId},
    error::Error,
    web::dashboard::{WebActor, WebCommand},
    ActorRef, Rto,
};

use super::db::ProjectDb;

fn serialize_datetime<S>(x: &time::OffsetDateTime, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_i64(x.unix_timestamp())
}

#[derive(PartialEq, Eq, Debug, FromRow, Clone, Serialize)]
pub struct Tournament {
    pub id: i64,
    pub name: String,

    #[serde(serialize_with = "serialize_datetime")]
    pub created_at: time::OffsetDateTime,
}

/// A team slot in a tournament. `seed` orders teams for bracket generation
/// and is frozen once a bracket exists.
#[derive(PartialEq, Eq, Debug, FromRow, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub tournament_id: i64,
    pub name: String,
    pub seed: i64,
}

pub enum TournamentRequest {
    Create(String, Rto<Tournament>),
    Delete(i64, Rto<()>),
    AddTeam(i64, String, i64, Rto<Team>),
    SetSeed(i64, i64, Rto<()>),
    GenerateBracket(i64, Rto<Bracket>),
    ReportWinner(i64, GameId, i64, Rto<Bracket>),
}

pub type TournamentActor = ActorRef<TournamentRequest>;

/// Serializes all tournament mutations. Every successful change triggers a
/// dashboard state broadcast.
pub async fn run_tournament_actor(
    db: Arc<ProjectDb>,
    web_actor: WebActor,
    mut rx: UnboundedReceiver<TournamentRequest>,
) {
    while let Some(msg) = rx.recv().await {
        let changed = match msg {
            TournamentRequest::Create(name, rto) => {
                let res = db.create_tournament(&name).await;
                let ok = res.is_ok();
                rto.reply(res);
                ok
            }
            TournamentRequest::Delete(id, rto) => {
                let res = db.delete_tournament(id).await;
                let ok = res.is_ok();
                rto.reply(res);
                ok
            }
            TournamentRequest::AddTeam(tournament_id, name, seed, rto) => {
                let res = add_team(&db, tournament_id, &name, seed).await;
                let ok = res.is_ok();
                rto.reply(res);
                ok
            }
            TournamentRequest::SetSeed(team_id, seed, rto) => {
                let res = set_seed(&db, team_id, seed).await;
                let ok = res.is_ok();
                rto.reply(res);
                ok
            }
            TournamentRequest::GenerateBracket(tournament_id, rto) => {
                let res = generate_bracket(&db, tournament_id).await;
                let ok = res.is_ok();
                rto.reply(res);
                ok
            }
            TournamentRequest::ReportWinner(tournament_id, game_id, team_id, rto) => {
                let res = report_winner(&db, tournament_id, game_id, team_id).await;
                let ok = res.is_ok();
                rto.reply(res);
                ok
            }
        };
        if changed {
            web_actor.send(WebCommand::SendStateUpdate);
        }
    }
}

async fn add_team(
    db: &ProjectDb,
    tournament_id: i64,
    name: &str,
    seed: i64,
) -> anyhow::Result<Team> {
    // teams are locked in once a bracket has been generated
    if db.has_bracket(tournament_id).await? {
        return Err(Error::BracketExists(tournament_id).into());
    }
    db.add_team(tournament_id, name, seed).await
}

async fn set_seed(db: &ProjectDb, team_id: i64, seed: i64) -> anyhow::Result<()> {
    let team = db.get_team(team_id).await?;
    if db.has_bracket(team.tournament_id).await? {
        return Err(Error::BracketExists(team.tournament_id).into());
    }
    db.set_team_seed(team_id, seed).await
}

async fn generate_bracket(db: &ProjectDb, tournament_id: i64) -> anyhow::Result<Bracket> {
    let teams = db.get_teams(tournament_id).await?;
    let seeds: Vec<i64> = teams.iter().map(|t| t.id).collect();
    let bracket = Bracket::generate(&seeds)?;
    db.save_bracket(tournament_id, &bracket).await?;
    log::info!(
        "Generated bracket for tournament {} with {} teams ({} games)",
        tournament_id,
        seeds.len(),
        bracket.games.len()
    );
    Ok(bracket)
}

async fn report_winner(
    db: &ProjectDb,
    tournament_id: i64,
    game_id: GameId,
    team_id: i64,
) -> anyhow::Result<Bracket> {
    let mut bracket = db
        .get_bracket(tournament_id)
        .await?
        .ok_or(Error::NoBracket(tournament_id))?;
    bracket.report_winner(game_id, team_id)?;
    db.save_bracket(tournament_id, &bracket).await?;
    Ok(bracket)
}
