//! Discord context interface — re-exported from the shared pipeline.
//!
//! `DiscordAppContext` is now an alias for `relay_agent::pipeline::MessageContext`.
//! All channel adapters share the same trait, defined once in `relay-agent` to
//! avoid circular dependencies.

pub use relay_agent::pipeline::MessageContext as DiscordAppContext;
