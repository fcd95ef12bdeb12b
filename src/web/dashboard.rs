use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc::UnboundedReceiver};
use tokio_stream::wrappers::BroadcastStream;
use warp::{reject::Rejection, Filter};

use crate::{
    core::{
        bracket::Bracket,
        db::ProjectDb,
        league::LeagueStatus,
        tournament::{Team, Tournament},
        user::Sessions,
    },
    ActorRef,
};

use super::filters::{with_db, with_sessions, SessionRejection};

pub enum WebCommand {
    SendStateUpdate,
}

pub type WebActor = ActorRef<WebCommand>;

/// One tournament as shown on the live endpoint: the record, its teams and
/// the bracket if one has been generated.
#[derive(Serialize, Clone, Debug)]
pub struct TournamentView {
    pub tournament: Tournament,
    pub teams: Vec<Team>,
    pub bracket: Option<Bracket>,
}

/// Full platform state pushed over the WebSocket.
#[derive(Serialize, Clone)]
struct StateUpdate {
    tournaments: Vec<TournamentView>,
    leagues: Vec<LeagueStatus>,
    player_count: u32,
}

async fn assemble_state_update(db: &ProjectDb) -> anyhow::Result<StateUpdate> {
    let mut tournaments = Vec::new();
    for tournament in db.get_tournaments().await? {
        let teams = db.get_teams(tournament.id).await?;
        let bracket = db.get_bracket(tournament.id).await?;
        tournaments.push(TournamentView {
            tournament,
            teams,
            bracket,
        });
    }
    Ok(StateUpdate {
        tournaments,
        leagues: db.get_league_statuses().await?,
        player_count: db.get_player_count().await?,
    })
}

/// Run the live-update websocket for a single client: a full snapshot on
/// connect, then one message per broadcast.
async fn run_state_websocket(
    db: Arc<ProjectDb>,
    socket: warp::ws::WebSocket,
    state_rx: broadcast::Receiver<String>,
) {
    log::debug!("New state websocket connection opened");
    let (mut tx, _) = socket.split();

    match assemble_state_update(&db).await {
        Ok(update) => {
            let payload = match serde_json::to_string(&update) {
                Ok(payload) => payload,
                Err(e) => {
                    log::error!("Failed to serialize initial state: {}", e);
                    return;
                }
            };
            if let Err(e) = tx.send(warp::ws::Message::text(payload)).await {
                log::error!("Failed to send initial state: {}", e);
                return;
            }
        }
        Err(e) => {
            log::error!("Failed to assemble initial state: {}", e);
            return;
        }
    }

    let mut updates = BroadcastStream::new(state_rx);
    while let Some(update) = updates.next().await {
        // a lagged receiver skips ahead to the newest update
        let Ok(update) = update else { continue };
        if let Err(e) = tx.send(warp::ws::Message::text(update)).await {
            log::debug!("State websocket closed: {}", e);
            break;
        }
    }
}

/// Builds the websocket route and the broadcaster task behind it. `rx` is the
/// web actor inbox: every `SendStateUpdate` reassembles the snapshot and fans
/// it out to all connected clients.
pub fn websocket_filters(
    db: Arc<ProjectDb>,
    sessions: Sessions,
    mut rx: UnboundedReceiver<WebCommand>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let (state_tx, _) = broadcast::channel::<String>(64);

    let broadcast_tx = state_tx.clone();
    let broadcast_db = db.clone();
    tokio::spawn(async move {
        while let Some(WebCommand::SendStateUpdate) = rx.recv().await {
            match assemble_state_update(&broadcast_db).await {
                Ok(update) => match serde_json::to_string(&update) {
                    Ok(payload) => {
                        // send only fails when nobody is connected
                        broadcast_tx.send(payload).ok();
                    }
                    Err(e) => log::error!("Failed to serialize state update: {}", e),
                },
                Err(e) => log::error!("Failed to assemble state update: {}", e),
            }
        }
    });

    warp::path!("api" / "ws")
        .and(warp::ws())
        .and(warp::cookie::optional::<String>("session"))
        .and(with_sessions(sessions))
        .and(with_db(db))
        .and_then(
            move |ws: warp::ws::Ws, token: Option<String>, sessions: Sessions, db: Arc<ProjectDb>| {
                let state_tx = state_tx.clone();
                async move {
                    let authed = token
                        .as_ref()
                        .map(|t| sessions.contains_key(t))
                        .unwrap_or(false);
                    if !authed {
                        return Err(warp::reject::custom(SessionRejection));
                    }
                    let state_rx = state_tx.subscribe();
                    Ok::<_, Rejection>(
                        ws.on_upgrade(move |socket| run_state_websocket(db, socket, state_rx)),
                    )
                }
            },
        )
}
