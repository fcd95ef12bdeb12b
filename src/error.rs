use thiserror::Error;

/// Domain errors. Infrastructure failures (sqlx, reqwest, serde) stay in
/// `anyhow::Error` and are wrapped at the boundary that hits them.
#[derive(Error, Debug)]
pub enum Error {
    #[error("A bracket needs at least two teams, got {0}")]
    NotEnoughTeams(usize),

    #[error("Team {0} appears more than once in the seed list")]
    DuplicateTeam(i64),

    #[error("Unknown game {0}")]
    UnknownGame(i64),

    #[error("Team {0} is not playing in game {1}")]
    TeamNotInGame(i64, i64),

    #[error("Game {0} is still waiting on an earlier result")]
    GameNotReady(i64),

    #[error("Game {0} was decided by a bye and cannot be reported")]
    GameDecidedByBye(i64),

    #[error("Game {0} is locked: a later round already has a result")]
    GameLocked(i64),

    #[error("Unknown tournament {0}")]
    UnknownTournament(i64),

    #[error("Tournament {0} has no bracket yet")]
    NoBracket(i64),

    #[error("Tournament {0} already has a bracket; seeds are locked")]
    BracketExists(i64),

    #[error("Unknown league {0}")]
    UnknownLeague(i64),

    #[error("League {0} is already syncing")]
    SyncInProgress(i64),

    #[error("Unknown user {0}")]
    UnknownUser(i64),

    #[error("Missing or invalid session")]
    Unauthorized,
}
