// Shared library for the two entry points.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (Reddit and Slack HTTP APIs)
// - `config/` = Static configuration, read once at process entry
//
// `main.rs` runs the Slack command loop; `bin/subreddit_mod.rs` runs
// moderation actions from the command line.

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with a stack of mod.rs files that all look the same.
#[path = "config/bot_config.rs"]
pub mod config;
#[path = "core/core_layer.rs"]
pub mod core;
#[path = "infra/infra_layer.rs"]
pub mod infra;
