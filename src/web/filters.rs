use std::{collections::HashMap, convert::Infallible, sync::Arc};

use warp::{reject::Rejection, Filter};

use crate::{
    core::{
        db::ProjectDb,
        settings::Settings,
        tournament::TournamentRequest,
        user::{LoginRequest, Sessions},
    },
    integrations::sync::SyncRequest,
    send_message, Directory,
};

use super::handlers::{
    delete_user, get_bracket, get_tournament, get_user, login, logout, to_http_none_or_error,
    to_http_output, update_profile, update_user, Id, NewTeam, NewTournament, ProfileUpdate,
    ReportWinnerBody, SetSeedBody, TrackLeagueBody,
};

/// Rejection for requests without a live session cookie. Mapped to 401 in the
/// rejection handler.
#[derive(Debug)]
pub struct SessionRejection;

impl warp::reject::Reject for SessionRejection {}

pub fn with_db(
    db: Arc<ProjectDb>,
) -> impl Filter<Extract = (Arc<ProjectDb>,), Error = Infallible> + Clone {
    warp::any().map(move || db.clone())
}

pub fn with_directory(
    directory: Directory,
) -> impl Filter<Extract = (Directory,), Error = Infallible> + Clone {
    warp::any().map(move || directory.clone())
}

pub fn with_sessions(
    sessions: Sessions,
) -> impl Filter<Extract = (Sessions,), Error = Infallible> + Clone {
    warp::any().map(move || sessions.clone())
}

pub fn with_settings(
    settings: Arc<Settings>,
) -> impl Filter<Extract = (Arc<Settings>,), Error = Infallible> + Clone {
    warp::any().map(move || settings.clone())
}

/// Resolves the session cookie to a user id, rejecting without one.
pub fn require_session(
    sessions: Sessions,
) -> impl Filter<Extract = (i64,), Error = Rejection> + Clone {
    warp::cookie::optional::<String>("session")
        .and(with_sessions(sessions))
        .and_then(async |token: Option<String>, sessions: Sessions| {
            token
                .and_then(|t| sessions.get(&t).map(|entry| *entry))
                .ok_or_else(|| warp::reject::custom(SessionRejection))
        })
}

fn tournament_filters(
    db: Arc<ProjectDb>,
    directory: Directory,
    sessions: Sessions,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let create_tournament = warp::path!("tournament")
        .and(warp::post())
        .and(require_session(sessions.clone()))
        .and(warp::body::json())
        .and(with_directory(directory.clone()))
        .and_then(async |_user: i64, body: NewTournament, directory: Directory| {
            to_http_output(send_message!(
                directory.tournament_actor,
                TournamentRequest,
                Create,
                body.name
            ))
        });

    let read_tournament = warp::path!("tournament")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_db(db.clone()))
        .and_then(get_tournament);

    let delete_tournament = warp::path!("tournament")
        .and(warp::delete())
        .and(require_session(sessions.clone()))
        .and(warp::body::json())
        .and(with_directory(directory.clone()))
        .and_then(async |_user: i64, tournament: Id, directory: Directory| {
            to_http_none_or_error(send_message!(
                directory.tournament_actor,
                TournamentRequest,
                Delete,
                tournament.id
            ))
        });

    let add_team = warp::path!("tournament" / "team")
        .and(warp::post())
        .and(require_session(sessions.clone()))
        .and(warp::body::json())
        .and(with_directory(directory.clone()))
        .and_then(async |_user: i64, body: NewTeam, directory: Directory| {
            to_http_output(send_message!(
                directory.tournament_actor,
                TournamentRequest,
                AddTeam,
                body.tournament_id,
                body.name,
                body.seed
            ))
        });

    let set_seed = warp::path!("tournament" / "seed")
        .and(warp::put())
        .and(require_session(sessions.clone()))
        .and(warp::body::json())
        .and(with_directory(directory.clone()))
        .and_then(async |_user: i64, body: SetSeedBody, directory: Directory| {
            to_http_none_or_error(send_message!(
                directory.tournament_actor,
                TournamentRequest,
                SetSeed,
                body.team_id,
                body.seed
            ))
        });

    let generate_bracket = warp::path!("tournament" / "bracket")
        .and(warp::post())
        .and(require_session(sessions.clone()))
        .and(warp::body::json())
        .and(with_directory(directory.clone()))
        .and_then(async |_user: i64, tournament: Id, directory: Directory| {
            to_http_output(send_message!(
                directory.tournament_actor,
                TournamentRequest,
                GenerateBracket,
                tournament.id
            ))
        });

    let read_bracket = warp::path!("tournament" / "bracket")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_db(db.clone()))
        .and_then(get_bracket);

    let report_winner = warp::path!("game" / "winner")
        .and(warp::post())
        .and(require_session(sessions))
        .and(warp::body::json())
        .and(with_directory(directory))
        .and_then(async |_user: i64, body: ReportWinnerBody, directory: Directory| {
            to_http_output(send_message!(
                directory.tournament_actor,
                TournamentRequest,
                ReportWinner,
                body.tournament_id,
                body.game_id,
                body.team_id
            ))
        });

    create_tournament
        .or(read_tournament)
        .or(delete_tournament)
        .or(add_team)
        .or(set_seed)
        .or(generate_bracket)
        .or(read_bracket)
        .or(report_winner)
}

fn user_filters(
    db: Arc<ProjectDb>,
    sessions: Sessions,
    settings: Arc<Settings>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let read_user = warp::path!("user")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_db(db.clone()))
        .and_then(get_user);

    let edit_user = warp::path!("user")
        .and(warp::put())
        .and(require_session(sessions.clone()))
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and_then(update_user);

    let remove_user = warp::path!("user")
        .and(warp::delete())
        .and(require_session(sessions.clone()))
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and_then(delete_user);

    let auth_login = warp::path!("auth" / "login")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and(with_sessions(sessions.clone()))
        .and(with_settings(settings))
        .and_then(async |request: LoginRequest, db, sessions, settings| {
            login(request, db, sessions, settings).await
        });

    let auth_logout = warp::path!("auth" / "logout")
        .and(warp::post())
        .and(warp::cookie::optional::<String>("session"))
        .and(with_sessions(sessions.clone()))
        .and_then(logout);

    let auth_profile = warp::path!("auth" / "profile")
        .and(warp::put())
        .and(require_session(sessions))
        .and(warp::body::json())
        .and(with_db(db))
        .and_then(async |user: i64, update: ProfileUpdate, db| update_profile(user, update, db).await);

    read_user
        .or(edit_user)
        .or(remove_user)
        .or(auth_login)
        .or(auth_logout)
        .or(auth_profile)
}

fn league_filters(
    db: Arc<ProjectDb>,
    directory: Directory,
    sessions: Sessions,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let track_league = warp::path!("league")
        .and(warp::post())
        .and(require_session(sessions.clone()))
        .and(warp::body::json())
        .and(with_directory(directory.clone()))
        .and_then(async |_user: i64, body: TrackLeagueBody, directory: Directory| {
            to_http_output(send_message!(
                directory.sync_actor,
                SyncRequest,
                TrackLeague,
                body.id,
                body.name
            ))
        });

    let read_leagues = warp::path!("league")
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(async |db: Arc<ProjectDb>| to_http_output(db.get_league_statuses().await));

    let untrack_league = warp::path!("league")
        .and(warp::delete())
        .and(require_session(sessions.clone()))
        .and(warp::body::json())
        .and(with_directory(directory.clone()))
        .and_then(async |_user: i64, league: Id, directory: Directory| {
            to_http_none_or_error(send_message!(
                directory.sync_actor,
                SyncRequest,
                UntrackLeague,
                league.id
            ))
        });

    let trigger_sync = warp::path!("league" / "sync")
        .and(warp::post())
        .and(require_session(sessions))
        .and(warp::body::json())
        .and(with_directory(directory))
        .and_then(async |_user: i64, league: Id, directory: Directory| {
            to_http_output(send_message!(
                directory.sync_actor,
                SyncRequest,
                SyncLeague,
                league.id
            ))
        });

    track_league
        .or(read_leagues)
        .or(untrack_league)
        .or(trigger_sync)
}

pub fn api_filters(
    db: Arc<ProjectDb>,
    directory: Directory,
    sessions: Sessions,
    settings: Arc<Settings>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    warp::path("api").and(
        tournament_filters(db.clone(), directory.clone(), sessions.clone())
            .or(user_filters(db.clone(), sessions.clone(), settings))
            .or(league_filters(db, directory, sessions)),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dashmap::DashMap;

    use super::*;

    #[tokio::test]
    async fn session_filter_accepts_known_tokens_only() {
        let sessions: Sessions = Arc::new(DashMap::new());
        sessions.insert("good-token".to_string(), 17);
        let filter = require_session(sessions);

        let user = warp::test::request()
            .header("cookie", "session=good-token")
            .filter(&filter)
            .await
            .unwrap();
        assert_eq!(user, 17);

        assert!(warp::test::request()
            .header("cookie", "session=stale-token")
            .filter(&filter)
            .await
            .is_err());
        assert!(warp::test::request().filter(&filter).await.is_err());
    }
}
