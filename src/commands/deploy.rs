//! `punktf deploy`: resolve a profile and deploy it.
use std::io::IsTerminal as _;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context as _, Result};

use crate::cli::{DeployOpts, GlobalOpts};
use crate::config::{self, PunktfSource, TargetOverrides};
use crate::deploy::prompt::{DeclinePrompt, MergePrompt, TerminalPrompt};
use crate::deploy::{self, DeployContext, DeployOptions, ManifestStore};
use crate::exec::SystemExecutor;
use crate::logging::{Log as _, Logger};
use crate::operations::SystemFileSystemOps;
use crate::platform::Os;
use crate::scope::Environment;

/// Run the deploy command.
///
/// # Errors
///
/// Returns an error if the source or profile is invalid, a template fails,
/// a pre-hook fails, or (outside a dry run) any item fails.
pub fn run(
    global: &GlobalOpts,
    opts: &DeployOpts,
    log: &Arc<Logger>,
    cancel: Arc<AtomicBool>,
) -> Result<()> {
    log.info(&format!("punktf {}", super::version()));

    log.stage("Resolving profile");
    let source = PunktfSource::discover(global.source.as_deref())?;
    log.debug(&format!("source: {}", source.root.display()));
    let name = opts
        .profile
        .as_deref()
        .context("no profile given. Pass a profile name or set PUNKTF_PROFILE")?;
    let overrides = TargetOverrides::from_env(opts.target.clone());
    let profile = config::resolve_with(name, &source.loader(), &overrides)?;
    log.info(&format!(
        "profile: {} ({})",
        profile.name,
        profile.chain.join(" -> ")
    ));
    if let Some(target) = &profile.target {
        log.info(&format!("target: {}", target.display()));
    }
    log.debug(&format!("{} variables", profile.vars.len()));
    log.debug(&format!("{} items", profile.items.len()));

    let manifest_path = match &opts.manifest {
        Some(path) => path.clone(),
        None => ManifestStore::default_path()
            .context("cannot determine manifest location. Use --manifest or set PUNKTF_MANIFEST")?,
    };
    log.debug(&format!("manifest: {}", manifest_path.display()));
    let mut manifest = ManifestStore::load(&manifest_path)?;

    let interactive = std::io::stdin().is_terminal();
    let prompt: Arc<dyn MergePrompt> = if interactive {
        Arc::new(TerminalPrompt)
    } else {
        Arc::new(DeclinePrompt)
    };
    let ctx = DeployContext {
        fs: Arc::new(SystemFileSystemOps),
        executor: Arc::new(SystemExecutor),
        prompt,
        log: log.clone(),
        cancel,
    };
    let options = DeployOptions {
        dry_run: opts.dry_run,
        parallel: opts.parallel,
        line_ending: opts.line_endings.resolve(Os::detect()),
        interactive,
    };

    let deployment = deploy::run(
        &source,
        &profile,
        &Environment::capture(),
        &ctx,
        &mut manifest,
        options,
    )?;

    log.print_summary();
    log.debug(&format!(
        "finished in {} ms: {}",
        deployment.duration().num_milliseconds(),
        deployment.status()
    ));

    if !deployment.is_success() && !opts.dry_run {
        anyhow::bail!("deployment {}", deployment.status());
    }
    Ok(())
}
