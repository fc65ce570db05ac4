use crate::Context;
use mcwl_backend::sync::SyncOutcome;
use poise::CreateReply;
use poise::command;
use poise::serenity_prelude::{CreateEmbed, CreateEmbedFooter};

pub(crate) type Error = Box<dyn std::error::Error + Send + Sync>;

/// User-facing rendering of a mutation outcome. Remote failures always
/// degrade to a generic try-again message.
fn outcome_message(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Added { player, total } => {
            format!("{player} is now whitelisted. You have {total} name(s) registered.")
        }
        SyncOutcome::Removed { player } => {
            format!("{player} has been removed from the whitelist.")
        }
        SyncOutcome::AlreadyPresent { player } => {
            format!("{player} is already on your whitelist.")
        }
        SyncOutcome::LimitReached { max } => {
            format!("You already registered the maximum of {max} name(s).")
        }
        SyncOutcome::NothingToRemove => "You have no registered names to remove.".to_string(),
        SyncOutcome::NotFound { player } => {
            format!("{player} is not on your whitelist.")
        }
        SyncOutcome::InvalidInput { reason } => format!("That doesn't look right: {reason}"),
        SyncOutcome::AuthFailure => {
            "The whitelist service rejected our credentials. Please tell an admin.".to_string()
        }
        SyncOutcome::RemoteFailure => {
            "The whitelist service is unavailable right now, please try again later.".to_string()
        }
    }
}

/// Register a Minecraft player name on the server whitelist
#[command(slash_command, prefix_command)]
pub async fn bind(
    ctx: Context<'_>,
    #[description = "Minecraft player name"] name: String,
) -> Result<(), Error> {
    let owner = ctx.author().id.to_string();
    let outcome = ctx.data().coordinator.add_player(&owner, &name).await;
    ctx.say(outcome_message(&outcome)).await?;
    Ok(())
}

/// Remove one of your registered names (the most recent if none is given)
#[command(slash_command, prefix_command)]
pub async fn unbind(
    ctx: Context<'_>,
    #[description = "Minecraft player name"] name: Option<String>,
) -> Result<(), Error> {
    let owner = ctx.author().id.to_string();
    let outcome = ctx
        .data()
        .coordinator
        .remove_player(&owner, name.as_deref())
        .await;
    ctx.say(outcome_message(&outcome)).await?;
    Ok(())
}

/// List the names you registered
#[command(slash_command, prefix_command)]
pub async fn mylist(ctx: Context<'_>) -> Result<(), Error> {
    let owner = ctx.author().id.to_string();
    let players = ctx.data().coordinator.players_of(&owner).await;
    let embed = CreateEmbed::default()
        .title("Your whitelisted names")
        .color(0x5865F2);
    let embed = if players.is_empty() {
        embed.description("You haven't registered any names yet.")
    } else {
        let list: String = players
            .iter()
            .map(|p| format!("- {p}"))
            .collect::<Vec<_>>()
            .join("\n");
        embed.description(list).footer(CreateEmbedFooter::new(
            "Names are removed most-recent-first when no name is given.",
        ))
    };
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Find out who registered a player name
#[command(slash_command, prefix_command)]
pub async fn whois(
    ctx: Context<'_>,
    #[description = "Minecraft player name"] name: String,
) -> Result<(), Error> {
    match ctx.data().coordinator.owner_of(&name).await {
        Some(owner) => ctx.say(format!("{name} was registered by <@{owner}>.")).await?,
        None => ctx.say(format!("Nobody registered {name}.")).await?,
    };
    Ok(())
}

/// Show who is online and warm the avatar cache for the status page
#[command(slash_command, prefix_command)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    ctx.defer().await?;

    let status = data.status.java_status().await?;
    let server_name = data
        .config
        .server_name
        .clone()
        .unwrap_or_else(|| "Minecraft server".to_string());

    let embed = CreateEmbed::default().color(0x5865F2);
    let embed = if !status.online {
        embed.title(format!("🔴 {server_name}")).description("Server is offline.")
    } else if status.players.list.is_empty() {
        embed
            .title(format!("🟢 {server_name}"))
            .description("No players online")
            .field("Players", format!("0/{}", status.players.max), true)
    } else {
        let uuids: Vec<String> = status.players.list.iter().map(|p| p.uuid.clone()).collect();
        let available = data
            .avatars
            .lock()
            .await
            .ensure_fresh(&data.fetcher, &uuids)
            .await;
        let player_list: String = status
            .players
            .list
            .iter()
            .zip(&available)
            .map(|(p, has_avatar)| {
                // The unavailable marker means the render service couldn't
                // deliver an avatar this cycle; the name still shows.
                if *has_avatar {
                    format!("- {}", p.name_clean)
                } else {
                    format!("- {} (avatar pending)", p.name_clean)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        embed
            .title(format!("🟢 {server_name}"))
            .field(
                "Online",
                format!("{}/{}", status.players.online, status.players.max),
                true,
            )
            .field("Players", player_list, false)
    };
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show help for the whitelist commands
#[command(slash_command, prefix_command)]
pub async fn help(
    ctx: Context<'_>,
    #[description = "Command to show help for"] command: Option<String>,
) -> Result<(), Error> {
    poise::builtins::help(
        ctx,
        command.as_deref(),
        poise::builtins::HelpConfiguration {
            extra_text_at_bottom: "Register a name with bind; unbind without a name removes your most recent one.",
            ..Default::default()
        },
    )
    .await?;
    Ok(())
}

/// Show server tick rate and a player's play statistics
#[command(slash_command, prefix_command)]
pub async fn stats(
    ctx: Context<'_>,
    #[description = "Minecraft player name"] name: Option<String>,
) -> Result<(), Error> {
    let data = ctx.data();
    ctx.defer().await?;

    let embed = CreateEmbed::default().title("Server statistics").color(0x5865F2);
    let tps = data.status.tps().await?;
    let embed = embed.field("TPS", tps, true);

    let embed = if let Some(name) = name {
        let stats = data.status.play_stats(&name).await?;
        // Keep the skin artifact warm for whoever renders this player next.
        if let Some(uuid) = data
            .status
            .java_status()
            .await
            .ok()
            .and_then(|s| {
                s.players
                    .list
                    .iter()
                    .find(|p| p.name_clean.eq_ignore_ascii_case(&name))
                    .map(|p| p.uuid.clone())
            })
        {
            data.skins
                .lock()
                .await
                .ensure_fresh(&data.fetcher, &[uuid])
                .await;
        }
        embed.field(name, stats, false)
    } else {
        embed
    };
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}
