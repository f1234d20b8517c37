//! Multi-target dotfiles deployer.
//!
//! A source directory holds profile documents in `profiles/` and the files
//! to deploy in `items/`. Deploying a profile resolves its `extends` chain,
//! renders template items against layered variables, decides per file
//! whether it may be written, and applies that plan with hooks around it.
//!
//! The public API is organised into these layers:
//!
//! - **[`config`]**: source layout, profile documents and inheritance
//! - **[`scope`]** and **[`template`]**: variable lookup and rendering
//! - **[`deploy`]**: planning, execution, hooks and the manifest
//! - **[`commands`]**: top-level subcommand orchestration (`deploy`)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod deploy;
pub mod error;
pub mod exec;
pub mod logging;
pub mod operations;
pub mod platform;
pub mod scope;
pub mod template;
