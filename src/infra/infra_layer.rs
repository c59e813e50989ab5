// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "reddit/mod.rs"]
pub mod reddit;

#[path = "slack/mod.rs"]
pub mod slack;
