//! Deployment pipeline: expand, render, inspect, plan, execute.
//!
//! [`run`] ties the stages together. Rendering and existing-state
//! inspection are pure reads and may run in parallel; planning and
//! execution always follow output-path order.
pub mod deployment;
pub mod entries;
pub mod executor;
pub mod hooks;
pub mod manifest;
pub mod plan;
pub mod prompt;
pub mod state;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use rayon::prelude::*;

pub use deployment::{Deployment, DeploymentStatus, ItemOutcome, OutcomeStatus};
pub use manifest::ManifestStore;
pub use plan::{Action, DeploymentPlan, SkipReason};

use crate::config::{PunktfSource, ResolvedProfile};
use crate::error::{PunktfError, TemplateError};
use crate::exec::Executor;
use crate::logging::Log;
use crate::operations::FileSystemOps;
use crate::platform::LineEnding;
use crate::scope::{Environment, Scope};
use crate::template::Template;
use entries::DeployEntry;
use hooks::HookRunner;
use plan::{PlanOptions, RenderedItem};
use prompt::MergePrompt;
use state::ExistingState;

/// Collaborators used by a deployment.
pub struct DeployContext {
    /// Filesystem access.
    pub fs: Arc<dyn FileSystemOps>,
    /// Runs hook commands.
    pub executor: Arc<dyn Executor>,
    /// Answers `ask` merge prompts.
    pub prompt: Arc<dyn MergePrompt>,
    /// Progress output and item summary.
    pub log: Arc<dyn Log>,
    /// Set to stop the run between items.
    pub cancel: Arc<AtomicBool>,
}

impl std::fmt::Debug for DeployContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployContext")
            .field("fs", &self.fs)
            .field("executor", &self.executor)
            .field("prompt", &"<dyn MergePrompt>")
            .field("log", &"<dyn Log>")
            .field("cancel", &self.cancel)
            .finish()
    }
}

/// Options for [`run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployOptions {
    /// Report what would happen without changing anything.
    pub dry_run: bool,
    /// Render and inspect entries on the rayon pool.
    pub parallel: bool,
    /// Line ending applied to text content.
    pub line_ending: LineEnding,
    /// `ask` merge mode may prompt.
    pub interactive: bool,
}

/// Deploy `profile` from `source`.
///
/// Template problems abort the run before anything is written. Problems
/// with single entries (unreadable sources, write failures) are reported in
/// the returned [`Deployment`].
///
/// # Errors
///
/// - [`PunktfError::Template`] for syntax errors and unresolved variables
/// - [`PunktfError::Deploy`] for conflicting outputs, unreadable directory
///   items and failing pre-hooks
pub fn run(
    source: &PunktfSource,
    profile: &ResolvedProfile,
    environment: &Environment,
    ctx: &DeployContext,
    manifest: &mut ManifestStore,
    options: DeployOptions,
) -> Result<Deployment, PunktfError> {
    let hook_env = hooks::run_environment(&source.root, profile);
    let mut environment = environment.clone();
    for (key, value) in &hook_env {
        environment.insert(key.as_str(), value.as_str());
    }

    let fs = ctx.fs.as_ref();
    let entries = entries::expand(&profile.items, &source.items, fs)?;
    ctx.log.debug(&format!(
        "{} entries from {} items",
        entries.len(),
        profile.items.len()
    ));

    let existing: BTreeMap<PathBuf, ExistingState> = if options.parallel {
        entries
            .par_iter()
            .map(|e| (e.output.clone(), state::inspect(&e.output, fs, manifest.manifest())))
            .collect()
    } else {
        entries
            .iter()
            .map(|e| (e.output.clone(), state::inspect(&e.output, fs, manifest.manifest())))
            .collect()
    };

    let rendered = prepare(entries, profile, &environment, fs, options.parallel)?;

    if !options.dry_run {
        let pruned = manifest.manifest_mut().prune_missing(fs);
        if pruned > 0 {
            ctx.log.debug(&format!("forgot {pruned} deleted file(s) from the manifest"));
        }
    }

    let plan = plan::plan(
        &profile.name,
        rendered,
        &existing,
        PlanOptions {
            interactive: options.interactive && !options.dry_run,
        },
    )?;

    let hooks = HookRunner {
        executor: ctx.executor.as_ref(),
        log: ctx.log.as_ref(),
        dir: &source.root,
        env: &hook_env,
    };
    let deployment = executor::execute(
        plan,
        profile,
        ctx,
        &hooks,
        manifest,
        executor::ExecutorOptions {
            dry_run: options.dry_run,
            line_ending: options.line_ending,
        },
    )?;
    Ok(deployment)
}

/// Produce the bytes for every entry.
///
/// # Errors
///
/// Returns a [`TemplateError`] if any template fails to parse or render.
pub fn prepare<'a>(
    entries: Vec<DeployEntry<'a>>,
    profile: &ResolvedProfile,
    environment: &Environment,
    fs: &dyn FileSystemOps,
    parallel: bool,
) -> Result<Vec<RenderedItem<'a>>, TemplateError> {
    let render = |entry: DeployEntry<'a>| -> Result<RenderedItem<'a>, TemplateError> {
        let content = render_entry(&entry, profile, environment, fs)?;
        Ok(RenderedItem { entry, content })
    };
    if parallel {
        entries.into_par_iter().map(render).collect()
    } else {
        entries.into_iter().map(render).collect()
    }
}

/// Read and, for templates, render one entry.
///
/// The outer error is fatal for the run; the inner one only fails the entry.
fn render_entry(
    entry: &DeployEntry<'_>,
    profile: &ResolvedProfile,
    environment: &Environment,
    fs: &dyn FileSystemOps,
) -> Result<Result<Vec<u8>, String>, TemplateError> {
    let bytes = match fs.read(&entry.source) {
        Ok(bytes) => bytes,
        Err(e) => {
            return Ok(Err(format!(
                "cannot read {}: {e}",
                entry.source.display()
            )));
        }
    };
    if !entry.is_template() {
        return Ok(Ok(bytes));
    }

    let Ok(text) = String::from_utf8(bytes) else {
        return Ok(Err(format!(
            "{} is not valid UTF-8 (set `template: false` to copy it verbatim)",
            entry.source.display()
        )));
    };
    let scope = Scope::for_item(profile, &entry.item.item.vars, environment);
    let rendered = Template::parse(&text)
        .map_err(|e| e.in_file(&entry.source))?
        .render(&scope)
        .into_content()
        .map_err(|e| e.in_file(&entry.source))?;
    Ok(Ok(rendered.into_bytes()))
}
