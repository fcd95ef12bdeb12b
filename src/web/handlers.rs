use std::{collections::HashMap, convert::Infallible, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::json;
use warp::reply::WithStatus;

use crate::{
    core::{
        db::ProjectDb,
        settings::Settings,
        tournament::Tournament,
        user::{new_session_token, LoginRequest, Sessions},
    },
    web::dashboard::TournamentView,
};

/// A Json struct to carry a bare entity id
#[derive(Serialize, Deserialize, Debug)]
pub struct Id {
    pub id: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct NewTournament {
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct NewTeam {
    pub tournament_id: i64,
    pub name: String,
    pub seed: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SetSeedBody {
    pub team_id: i64,
    pub seed: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ReportWinnerBody {
    pub tournament_id: i64,
    pub game_id: i64,
    pub team_id: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TrackLeagueBody {
    pub id: i64,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UserUpdate {
    pub id: i64,
    pub email: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
}

pub fn to_http_none_or_error(result: anyhow::Result<()>) -> Result<WithStatus<String>, Infallible> {
    match result {
        Ok(_) => Ok(warp::reply::with_status(
            "Success".to_string(),
            warp::http::StatusCode::OK,
        )),
        Err(e) => {
            log::warn!("{}", e);
            Ok(warp::reply::with_status(
                e.to_string(),
                warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

pub fn to_http_output<T: Serialize>(
    result: anyhow::Result<T>,
) -> Result<WithStatus<String>, Infallible> {
    match result {
        Ok(data) => Ok(warp::reply::with_status(
            serde_json::to_string::<T>(&data).unwrap(),
            warp::http::StatusCode::OK,
        )),
        Err(e) => {
            log::warn!("{}", e);
            Ok(warp::reply::with_status(
                e.to_string(),
                warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn tournament_view(db: &ProjectDb, id: i64) -> anyhow::Result<TournamentView> {
    Ok(TournamentView {
        tournament: db.get_tournament(id).await?,
        teams: db.get_teams(id).await?,
        bracket: db.get_bracket(id).await?,
    })
}

/// `GET /tournament` lists; `GET /tournament?id=` returns one tournament
/// with its teams and bracket.
pub async fn get_tournament(
    args: HashMap<String, String>,
    db: Arc<ProjectDb>,
) -> Result<impl warp::Reply, Infallible> {
    match args.get("id") {
        Some(raw) => match raw.parse::<i64>() {
            Ok(id) => to_http_output(tournament_view(&db, id).await),
            Err(_) => Ok(warp::reply::with_status(
                "Failed to parse tournament ID".to_string(),
                warp::http::StatusCode::BAD_REQUEST,
            )),
        },
        None => to_http_output::<Vec<Tournament>>(db.get_tournaments().await),
    }
}

pub async fn get_bracket(
    args: HashMap<String, String>,
    db: Arc<ProjectDb>,
) -> Result<WithStatus<String>, Infallible> {
    let Some(id) = args.get("id").and_then(|raw| raw.parse::<i64>().ok()) else {
        return Ok(warp::reply::with_status(
            "Missing or invalid 'id' field".to_string(),
            warp::http::StatusCode::BAD_REQUEST,
        ));
    };
    match db.get_bracket(id).await {
        Ok(Some(bracket)) => to_http_output(Ok(bracket)),
        Ok(None) => Ok(warp::reply::with_status(
            format!("Tournament {} has no bracket yet", id),
            warp::http::StatusCode::NOT_FOUND,
        )),
        Err(e) => to_http_output::<()>(Err(e)),
    }
}

pub async fn get_user(
    args: HashMap<String, String>,
    db: Arc<ProjectDb>,
) -> Result<impl warp::Reply, Infallible> {
    match args.get("id") {
        Some(raw) => match raw.parse::<i64>() {
            Ok(id) => to_http_output(db.get_user(id).await),
            Err(_) => Ok(warp::reply::with_status(
                "Failed to parse user ID".to_string(),
                warp::http::StatusCode::BAD_REQUEST,
            )),
        },
        None => to_http_output(db.get_users().await),
    }
}

/// The social-login callback landing point. The provider already vouched for
/// the account; we mirror the profile, mint a session and set the cookie.
pub async fn login(
    request: LoginRequest,
    db: Arc<ProjectDb>,
    sessions: Sessions,
    settings: Arc<Settings>,
) -> Result<impl warp::Reply, Infallible> {
    let is_admin = settings
        .admin_external_ids
        .as_ref()
        .map(|ids| ids.contains(&request.external_id))
        .unwrap_or(false);

    match db.upsert_user(&request, is_admin).await {
        Ok(user) => {
            let token = new_session_token();
            sessions.insert(token.clone(), user.id);
            log::info!("User {} ({}) logged in", user.id, user.display_name);
            Ok(warp::reply::with_status(
                warp::reply::with_header(
                    warp::reply::json(&json!({ "token": token, "user": user })),
                    "set-cookie",
                    format!("session={}; Path=/; HttpOnly", token),
                ),
                warp::http::StatusCode::OK,
            ))
        }
        Err(e) => {
            log::warn!("Login failed: {}", e);
            Ok(warp::reply::with_status(
                warp::reply::with_header(
                    warp::reply::json(&json!({ "error": e.to_string() })),
                    "set-cookie",
                    "",
                ),
                warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

pub async fn logout(
    token: Option<String>,
    sessions: Sessions,
) -> Result<impl warp::Reply, Infallible> {
    if let Some(token) = token {
        sessions.remove(&token);
    }
    Ok(warp::reply::with_status(
        "Logged out".to_string(),
        warp::http::StatusCode::OK,
    ))
}

pub async fn update_profile(
    user_id: i64,
    update: ProfileUpdate,
    db: Arc<ProjectDb>,
) -> Result<impl warp::Reply, Infallible> {
    to_http_none_or_error(
        db.update_user_profile(
            user_id,
            update.email.as_deref(),
            update.country.as_deref(),
            update.city.as_deref(),
        )
        .await,
    )
}

/// Users may edit their own profile; admins may edit anyone's.
pub async fn update_user(
    caller_id: i64,
    update: UserUpdate,
    db: Arc<ProjectDb>,
) -> Result<WithStatus<String>, Infallible> {
    if caller_id != update.id {
        match db.get_user(caller_id).await {
            Ok(caller) if caller.is_admin => {}
            Ok(_) => {
                return Ok(warp::reply::with_status(
                    "Admin rights required".to_string(),
                    warp::http::StatusCode::FORBIDDEN,
                ))
            }
            Err(e) => return to_http_none_or_error(Err(e)),
        }
    }
    to_http_none_or_error(
        db.update_user_profile(
            update.id,
            update.email.as_deref(),
            update.country.as_deref(),
            update.city.as_deref(),
        )
        .await,
    )
}

/// Deleting users is admin-only; everything else about a user is theirs.
pub async fn delete_user(
    caller_id: i64,
    target: Id,
    db: Arc<ProjectDb>,
) -> Result<WithStatus<String>, Infallible> {
    match db.get_user(caller_id).await {
        Ok(caller) if caller.is_admin => to_http_none_or_error(db.delete_user(target.id).await),
        Ok(_) => Ok(warp::reply::with_status(
            "Admin rights required".to_string(),
            warp::http::StatusCode::FORBIDDEN,
        )),
        Err(e) => {
            log::warn!("{}", e);
            Ok(warp::reply::with_status(
                e.to_string(),
                warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}
