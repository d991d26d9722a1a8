//! Tool re-export for the Telegram adapter.
//!
//! All tools are shared — implemented once in `relay-agent` and re-exported here
//! following the same thin-wrapper pattern as `relay-discord/src/tools.rs`.

pub use relay_agent::tools::build::build_tools;
