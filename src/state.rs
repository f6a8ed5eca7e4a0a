use serenity::client::Context;
use serenity::framework::standard::CommandError;
use serenity::model::id::GuildId;

use crate::models::{Queue, QueueRegistry, QueuesManager};

/// Reads a guild's queue without creating one.
pub async fn read_queue<T, F>(ctx: &Context, guild_id: GuildId, f: F) -> Option<T>
where
    F: FnOnce(&Queue) -> T,
{
    let data = ctx.data.read().await;
    let registry = data.get::<QueuesManager>()?;

    registry.get(&guild_id).map(f)
}

/// Mutates a guild's queue, creating an empty one first if needed.
pub async fn write_queue<T, F>(ctx: &Context, guild_id: GuildId, f: F) -> Result<T, CommandError>
where
    F: FnOnce(&mut Queue) -> T,
{
    write_registry(ctx, |registry| f(registry.entry(guild_id))).await
}

pub async fn write_registry<T, F>(ctx: &Context, f: F) -> Result<T, CommandError>
where
    F: FnOnce(&mut QueueRegistry) -> T,
{
    let data = &mut ctx.data.write().await;
    let registry = data
        .get_mut::<QueuesManager>()
        .ok_or(CommandError::from("Queue registry not found"))?;

    Ok(f(registry))
}

pub async fn reset_queue(ctx: &Context, guild_id: GuildId) -> Result<Option<Queue>, CommandError> {
    write_registry(ctx, |registry| registry.reset(guild_id)).await
}
