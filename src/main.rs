use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{Parser, Subcommand};
use dashmap::DashMap;
use serde::Deserialize;
use tokio::sync::{
    mpsc::{self, UnboundedSender},
    oneshot,
};

use crate::{
    core::{
        db::ProjectDb,
        settings::Settings,
        tournament::{run_tournament_actor, TournamentActor},
        user::{LoginRequest, Sessions},
    },
    integrations::{
        discord::init_discord,
        stats_api::StatsApiClient,
        sync::{run_sync_actor, run_sync_scheduler, SyncActor},
    },
    web::{dashboard::WebActor, run_http_server},
};

mod core;
mod error;
mod integrations;
mod web;

const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;

/// Reply-to half of a request message. The actor calls `reply` exactly once;
/// a caller that gave up in the meantime is logged and ignored.
pub struct Rto<T> {
    tx: oneshot::Sender<anyhow::Result<T>>,
}

impl<T> Rto<T> {
    pub fn new(tx: oneshot::Sender<anyhow::Result<T>>) -> Rto<T> {
        Rto { tx }
    }

    pub fn reply(self, message: anyhow::Result<T>) {
        if self.tx.send(message).is_err() {
            log::warn!("Failed to reply to request, the caller is gone");
        }
    }
}

/// Cheap cloneable handle to an actor's inbox.
pub struct ActorRef<T> {
    tx: UnboundedSender<T>,
}

impl<T> Clone for ActorRef<T> {
    fn clone(&self) -> Self {
        ActorRef {
            tx: self.tx.clone(),
        }
    }
}

impl<T> ActorRef<T> {
    pub fn new(tx: UnboundedSender<T>) -> ActorRef<T> {
        ActorRef { tx }
    }

    pub fn send(&self, message: T) {
        if self.tx.send(message).is_err() {
            log::error!("Failed to send message, actor channel is closed");
        }
    }
}

/// Send a request to an actor and await the reply.
#[macro_export]
macro_rules! send_message {
    ($actor: expr, $request: ident, $variant: ident $(, $arg: expr)*) => {{
        let (tx, rx) = ::tokio::sync::oneshot::channel();
        $actor.send($request::$variant($($arg,)* $crate::Rto::new(tx)));
        match rx.await {
            Ok(reply) => reply,
            Err(_) => Err(::anyhow::anyhow!("Actor hung up without replying")),
        }
    }};
}

/// Handles to every running actor, passed to anything that issues requests.
#[derive(Clone)]
pub struct Directory {
    pub tournament_actor: TournamentActor,
    pub sync_actor: SyncActor,
    pub web_actor: WebActor,
}

#[derive(Parser, Debug)]
#[command(name = "bracketeer")]
#[command(version = "0.1")]
#[command(about = "Tournament brackets with league match tracking.", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: RunType,
}

#[derive(Subcommand, Debug)]
enum RunType {
    /// Run the full service: web API, league sync scheduler, and the Discord
    /// bot when a token is configured.
    Run { settings_file: PathBuf },

    /// Run without the web API. Useful when only the bot and background sync
    /// should be up.
    Bot { settings_file: PathBuf },

    /// Bulk-import user accounts from a JSON export.
    PopulateUsers {
        settings_file: PathBuf,
        users_file: PathBuf,
    },
}

/// One record of a user export file.
#[derive(Deserialize)]
struct UserImport {
    #[serde(flatten)]
    login: LoginRequest,
    email: Option<String>,
    country: Option<String>,
    city: Option<String>,
}

fn is_admin(settings: &Settings, external_id: &str) -> bool {
    settings
        .admin_external_ids
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .any(|id| id == external_id)
}

async fn populate_users(settings: &Settings, users_file: &Path) -> anyhow::Result<()> {
    let db = ProjectDb::init(Path::new(&settings.db_file)).await?;
    let imports: Vec<UserImport> = serde_json::from_str(&read_to_string(users_file)?)?;
    let total = imports.len();

    for import in imports {
        let admin = is_admin(settings, &import.login.external_id);
        let user = db.upsert_user(&import.login, admin).await?;
        db.update_user_profile(
            user.id,
            import.email.as_deref(),
            import.country.as_deref(),
            import.city.as_deref(),
        )
        .await?;
    }

    log::info!("Imported {} users", total);
    Ok(())
}

async fn run_service(settings: Settings, with_web: bool) -> anyhow::Result<()> {
    let settings = Arc::new(settings);
    let db = Arc::new(ProjectDb::init(Path::new(&settings.db_file)).await?);
    let sessions: Sessions = Arc::new(DashMap::new());

    let (web_tx, web_rx) = mpsc::unbounded_channel();
    let (tournament_tx, tournament_rx) = mpsc::unbounded_channel();
    let (sync_tx, sync_rx) = mpsc::unbounded_channel();

    let directory = Directory {
        tournament_actor: ActorRef::new(tournament_tx),
        sync_actor: ActorRef::new(sync_tx),
        web_actor: ActorRef::new(web_tx),
    };

    let stats_api = Arc::new(StatsApiClient::new(
        &settings.stats_api_url,
        settings.stats_api_key.clone(),
    )?);

    tokio::spawn(run_tournament_actor(
        db.clone(),
        directory.web_actor.clone(),
        tournament_rx,
    ));
    tokio::spawn(run_sync_actor(
        stats_api,
        db.clone(),
        directory.web_actor.clone(),
        sync_rx,
    ));
    tokio::spawn(run_sync_scheduler(
        db.clone(),
        directory.sync_actor.clone(),
        settings
            .sync_interval_seconds
            .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS),
    ));

    if let Some(token) = settings.discord_token.clone() {
        let guild_id = settings.discord_guild_id;
        let bot_db = db.clone();
        let bot_directory = directory.clone();
        tokio::spawn(async move {
            if let Err(e) = init_discord(token, guild_id, bot_db, bot_directory).await {
                log::error!("Discord bot exited: {}", e);
            }
        });
    } else if !with_web {
        anyhow::bail!("Bot mode requires discord_token in the settings file");
    } else {
        log::info!("No Discord token in settings, bot is disabled");
    }

    if with_web {
        run_http_server(db, directory, sessions, settings, web_rx).await
    } else {
        // nothing consumes dashboard updates without the web server
        let mut web_rx = web_rx;
        while web_rx.recv().await.is_some() {}
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    match args.command {
        RunType::Run { settings_file } => {
            let settings = Settings::load(&settings_file)?;
            run_service(settings, true).await
        }
        RunType::Bot { settings_file } => {
            let settings = Settings::load(&settings_file)?;
            run_service(settings, false).await
        }
        RunType::PopulateUsers {
            settings_file,
            users_file,
        } => {
            let settings = Settings::load(&settings_file)?;
            populate_users(&settings, &users_file).await
        }
    }
}
