use std::collections::HashMap;

use crate::{
    core::{
        bracket::{Bracket, BracketSlot},
        tournament::{Team, Tournament},
    },
    integrations::sync::SyncRequest,
    send_message,
};

use super::Context;

async fn find_tournament(ctx: &Context<'_>, name: &str) -> anyhow::Result<Tournament> {
    ctx.data()
        .db
        .get_tournaments()
        .await?
        .into_iter()
        .find(|t| t.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| anyhow::anyhow!("No tournament named '{}'", name))
}

fn team_names(teams: &[Team]) -> HashMap<i64, String> {
    teams.iter().map(|t| (t.id, t.name.clone())).collect()
}

fn slot_label(slot: BracketSlot, names: &HashMap<i64, String>) -> String {
    match slot {
        BracketSlot::Team(id) => names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("team {}", id)),
        BracketSlot::Bye => "bye".to_string(),
        BracketSlot::Empty => "tbd".to_string(),
    }
}

fn format_bracket(bracket: &Bracket, names: &HashMap<i64, String>) -> String {
    let mut lines = Vec::new();
    let mut current_round = None;
    for game in &bracket.games {
        if current_round != Some(game.round) {
            current_round = Some(game.round);
            lines.push(format!("**{}**", game.round));
        }
        let marker = match game.winner {
            Some(winner) => format!(" -> {}", slot_label(BracketSlot::Team(winner), names)),
            None => String::new(),
        };
        lines.push(format!(
            "  {} vs {}{}",
            slot_label(game.slots[0], names),
            slot_label(game.slots[1], names),
            marker
        ));
    }
    lines.join("\n")
}

/// Show current placements for a tournament
#[poise::command(slash_command)]
pub async fn standings(
    ctx: Context<'_>,
    #[description = "Tournament name"] tournament: String,
) -> anyhow::Result<()> {
    let record = find_tournament(&ctx, &tournament).await?;
    let Some(bracket) = ctx.data().db.get_bracket(record.id).await? else {
        ctx.say(format!("{} has no bracket yet", record.name)).await?;
        return Ok(());
    };
    let names = team_names(&ctx.data().db.get_teams(record.id).await?);

    let placements = bracket.placements();
    if placements.is_empty() {
        ctx.say(format!("{} has no results yet", record.name)).await?;
        return Ok(());
    }
    let lines: Vec<String> = placements
        .iter()
        .map(|(team, place)| {
            format!("{}. {}", place, slot_label(BracketSlot::Team(*team), &names))
        })
        .collect();
    ctx.say(format!("**{}**\n{}", record.name, lines.join("\n")))
        .await?;
    Ok(())
}

/// Show the full bracket for a tournament
#[poise::command(slash_command)]
pub async fn bracket(
    ctx: Context<'_>,
    #[description = "Tournament name"] tournament: String,
) -> anyhow::Result<()> {
    let record = find_tournament(&ctx, &tournament).await?;
    let Some(bracket) = ctx.data().db.get_bracket(record.id).await? else {
        ctx.say(format!("{} has no bracket yet", record.name)).await?;
        return Ok(());
    };
    let names = team_names(&ctx.data().db.get_teams(record.id).await?);
    ctx.say(format!(
        "**{}**\n{}",
        record.name,
        format_bracket(&bracket, &names)
    ))
    .await?;
    Ok(())
}

/// List tracked leagues and their sync status
#[poise::command(slash_command)]
pub async fn leagues(ctx: Context<'_>) -> anyhow::Result<()> {
    let statuses = ctx.data().db.get_league_statuses().await?;
    if statuses.is_empty() {
        ctx.say("No leagues are tracked").await?;
        return Ok(());
    }
    let lines: Vec<String> = statuses
        .iter()
        .map(|status| {
            format!(
                "{} ({}): cursor {}, {} failed{}",
                status.league.name,
                status.league.id,
                status
                    .sync
                    .last_match_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "unset".to_string()),
                status.sync.failed_match_ids.0.len(),
                if status.sync.is_syncing { ", syncing now" } else { "" }
            )
        })
        .collect();
    ctx.say(lines.join("\n")).await?;
    Ok(())
}

/// Start tracking a league
#[poise::command(slash_command)]
pub async fn track(
    ctx: Context<'_>,
    #[description = "External league id"] league_id: i64,
    #[description = "League name"] name: String,
) -> anyhow::Result<()> {
    let league = send_message!(
        ctx.data().directory.sync_actor,
        SyncRequest,
        TrackLeague,
        league_id,
        name
    )?;
    ctx.say(format!("Now tracking {} ({})", league.name, league.id))
        .await?;
    Ok(())
}

/// Trigger a sync run for a league
#[poise::command(slash_command)]
pub async fn sync(
    ctx: Context<'_>,
    #[description = "External league id"] league_id: i64,
) -> anyhow::Result<()> {
    // sync runs can take a while against a slow upstream
    ctx.defer().await?;
    let report = send_message!(
        ctx.data().directory.sync_actor,
        SyncRequest,
        SyncLeague,
        league_id
    )?;
    if report.skipped {
        ctx.say(format!("League {} is already syncing", league_id))
            .await?;
    } else {
        ctx.say(format!(
            "League {}: {} new matches, {} recovered, {} failed",
            league_id,
            report.new_matches,
            report.recovered,
            report.failed_match_ids.len()
        ))
        .await?;
    }
    Ok(())
}
