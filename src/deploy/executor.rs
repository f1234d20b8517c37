//! Deployment executor: apply a plan to the filesystem.
//!
//! Items are processed in plan order. Pre-hook failures abort the run
//! before any item is touched; item failures are recorded and the run
//! continues; post-hooks run even when items failed. Already written files
//! stay in place when the run is cancelled.
use std::io;
use std::sync::atomic::Ordering;

use super::DeployContext;
use super::deployment::{DeployedKind, Deployment, DeploymentBuilder, ItemOutcome, OutcomeStatus};
use super::entries::EntryOrigin;
use super::hooks::{HookRunner, HookStage};
use super::manifest::{ManifestEntry, ManifestStore, digest};
use super::plan::{Action, DeploymentPlan, PlannedItem, SkipReason};
use crate::config::ResolvedProfile;
use crate::error::DeployError;
use crate::logging::{ItemStatus, Log};
use crate::operations::FileSystemOps;
use crate::platform::LineEnding;

/// Options for [`execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// Report what would happen without writing or running hooks.
    pub dry_run: bool,
    /// Line ending applied to text content.
    pub line_ending: LineEnding,
}

/// Apply `plan` and run the hooks of `profile`.
///
/// # Errors
///
/// Returns [`DeployError::HookExecution`] if a pre-hook fails. Every other
/// failure is reported through the returned [`Deployment`].
pub fn execute(
    plan: DeploymentPlan<'_>,
    profile: &ResolvedProfile,
    ctx: &DeployContext,
    hooks: &HookRunner<'_>,
    manifest: &mut ManifestStore,
    options: ExecutorOptions,
) -> Result<Deployment, DeployError> {
    let log = ctx.log.as_ref();
    let mut builder = Deployment::build();

    if !profile.pre_hooks.is_empty() {
        log.stage("Running pre-deployment hooks");
        if options.dry_run {
            hooks.preview(HookStage::Pre, &profile.pre_hooks);
        } else {
            hooks.run(HookStage::Pre, &profile.pre_hooks)?;
        }
    }

    log.stage(&format!("Deploying profile {}", plan.profile));
    for line in plan.to_string().lines() {
        log.debug(&format!("plan: {line}"));
    }

    let mut interrupted = false;
    let mut manifest_failed = false;
    for planned in &plan.items {
        let action = if ctx.cancel.load(Ordering::SeqCst) {
            interrupted = true;
            Action::Skip(SkipReason::Interrupted)
        } else {
            confirm(planned, ctx, options.dry_run)
        };

        let status = match action {
            Action::Write if options.dry_run => {
                log.dry_run(&format!("would write {}", planned.entry.output.display()));
                OutcomeStatus::WouldWrite
            }
            Action::Write => {
                match write_entry(ctx.fs.as_ref(), planned, options.line_ending) {
                    Ok(written) => {
                        track(&mut builder, planned, true);
                        if let Err(e) = remember(&builder, manifest, planned, &written) {
                            log.error(&format!("failed to update manifest: {e}"));
                            manifest_failed = true;
                        }
                        OutcomeStatus::Written
                    }
                    Err(e) => {
                        track(&mut builder, planned, false);
                        OutcomeStatus::Failed(e.to_string())
                    }
                }
            }
            // `confirm` never returns a prompt.
            Action::Prompt => OutcomeStatus::Skipped(SkipReason::NonInteractive),
            Action::Skip(reason) => OutcomeStatus::Skipped(reason),
            Action::Fail(reason) => OutcomeStatus::Failed(reason),
        };

        report(log, planned, &status);
        builder.add_outcome(ItemOutcome {
            output: planned.entry.output.clone(),
            item: planned.entry.item.item.path.clone(),
            profile: planned.entry.item.profile.clone(),
            status,
        });
    }

    let mut post_failure = None;
    if interrupted {
        log.warn("deployment interrupted, skipping post-deployment hooks");
    } else if !profile.post_hooks.is_empty() {
        log.stage("Running post-deployment hooks");
        if options.dry_run {
            hooks.preview(HookStage::Post, &profile.post_hooks);
        } else if let Err(e) = hooks.run(HookStage::Post, &profile.post_hooks) {
            log.error(&e.to_string());
            post_failure = Some(e.to_string());
        }
    }

    let failed = builder
        .outcomes()
        .iter()
        .filter(|o| matches!(o.status, OutcomeStatus::Failed(_)))
        .count();

    Ok(if interrupted {
        builder.failed(DeployError::Interrupted.to_string())
    } else if failed > 0 {
        builder.failed(format!("{failed} item(s) failed"))
    } else if let Some(reason) = post_failure {
        builder.failed(reason)
    } else if manifest_failed {
        builder.failed("manifest could not be saved")
    } else {
        builder.success()
    })
}

/// Resolve a prompt into a write or a skip.
fn confirm(planned: &PlannedItem<'_>, ctx: &DeployContext, dry_run: bool) -> Action {
    if planned.action != Action::Prompt {
        return planned.action.clone();
    }
    if dry_run {
        return Action::Skip(SkipReason::NonInteractive);
    }
    match ctx
        .prompt
        .confirm_overwrite(&planned.entry.output, &planned.entry.source)
    {
        Ok(true) => Action::Write,
        Ok(false) => Action::Skip(SkipReason::Declined),
        Err(e) => Action::Fail(format!("cannot ask for confirmation: {e}")),
    }
}

/// Write one entry and return the bytes that ended up on disk.
fn write_entry(
    fs: &dyn FileSystemOps,
    planned: &PlannedItem<'_>,
    line_ending: LineEnding,
) -> io::Result<Vec<u8>> {
    let output = &planned.entry.output;
    if let Some(parent) = output.parent() {
        fs.create_dir_all(parent)?;
    }

    let content = line_ending.normalize(&planned.content);
    fs.write(output, &content)?;

    let mode = match planned.entry.item.item.mode() {
        Some(mode) => Some(mode),
        None => fs.mode(&planned.entry.source).ok(),
    };
    if let Some(mode) = mode {
        fs.set_mode(output, mode)?;
    }
    Ok(content.into_owned())
}

/// Record the entry (and its directory item) in the deployment record.
fn track(builder: &mut DeploymentBuilder, planned: &PlannedItem<'_>, success: bool) {
    let entry = &planned.entry;
    let item = DeployedKind::Item {
        item: entry.item.item.path.clone(),
        priority: entry.priority(),
    };
    match &entry.origin {
        EntryOrigin::Item => {
            builder.record(entry.output.clone(), item, success);
        }
        EntryOrigin::Child { parent } => {
            if !builder.contains(parent) {
                builder.record(parent.clone(), item, true);
            }
            builder.record(
                entry.output.clone(),
                DeployedKind::Child {
                    parent: parent.clone(),
                },
                success,
            );
        }
    }
}

/// Store a written entry in the manifest and persist it.
fn remember(
    builder: &DeploymentBuilder,
    manifest: &mut ManifestStore,
    planned: &PlannedItem<'_>,
    written: &[u8],
) -> Result<(), DeployError> {
    let entry = &planned.entry;
    let priority = builder
        .get_priority(&entry.output)
        .unwrap_or_else(|| entry.priority());
    manifest.manifest_mut().record(
        entry.output.clone(),
        ManifestEntry {
            profile: entry.item.profile.clone(),
            item: entry.item.item.path.clone(),
            priority,
            digest: digest(written),
            deployed_at: chrono::Utc::now(),
        },
    );
    manifest.save()
}

fn report(log: &dyn Log, planned: &PlannedItem<'_>, status: &OutcomeStatus) {
    let name = planned.entry.output.display().to_string();
    match status {
        OutcomeStatus::Written => {
            log.info(&format!("wrote {name}"));
            log.record_item(&name, ItemStatus::Written, None);
        }
        OutcomeStatus::WouldWrite => log.record_item(&name, ItemStatus::DryRun, None),
        OutcomeStatus::Skipped(reason) => {
            let reason = reason.to_string();
            log.debug(&format!("skipped {name}: {reason}"));
            log.record_item(&name, ItemStatus::Skipped, Some(&reason));
        }
        OutcomeStatus::Failed(reason) => {
            log.error(&format!("{name}: {reason}"));
            log.record_item(&name, ItemStatus::Failed, Some(reason));
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::{Item, MergeMode, ResolvedItem};
    use std::path::Path;
    use crate::deploy::entries::DeployEntry;
    use crate::deploy::prompt::MockMergePrompt;
    use crate::deploy::state::ExistingState;
    use crate::exec::{ExecResult, MockExecutor};
    use crate::logging::MemoryLog;
    use crate::operations::MockFileSystemOps;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    struct Fixture {
        fs: Arc<MockFileSystemOps>,
        log: Arc<MemoryLog>,
        ctx: DeployContext,
        manifest: ManifestStore,
        _tmp: tempfile::TempDir,
    }

    fn fixture(fs: MockFileSystemOps, executor: MockExecutor, prompt: MockMergePrompt) -> Fixture {
        let fs = Arc::new(fs);
        let log = Arc::new(MemoryLog::default());
        let tmp = tempfile::tempdir().unwrap();
        let manifest = ManifestStore::load(tmp.path().join("manifest.json")).unwrap();
        let ctx = DeployContext {
            fs: fs.clone(),
            executor: Arc::new(executor),
            prompt: Arc::new(prompt),
            log: log.clone(),
            cancel: Arc::new(AtomicBool::new(false)),
        };
        Fixture {
            fs,
            log,
            ctx,
            manifest,
            _tmp: tmp,
        }
    }

    fn profile(pre: &[&str], post: &[&str]) -> ResolvedProfile {
        ResolvedProfile {
            name: "base".into(),
            chain: vec!["base".into()],
            vars: Vec::new(),
            target: Some(PathBuf::from("/home/u")),
            pre_hooks: pre.iter().map(ToString::to_string).collect(),
            post_hooks: post.iter().map(ToString::to_string).collect(),
            items: Vec::new(),
        }
    }

    fn resolved(name: &str) -> ResolvedItem {
        ResolvedItem {
            item: Item::new(name),
            output: PathBuf::from("/home/u").join(name),
            profile: "base".into(),
        }
    }

    fn planned<'a>(item: &'a ResolvedItem, action: Action, content: &str) -> PlannedItem<'a> {
        PlannedItem {
            entry: DeployEntry {
                item,
                source: PathBuf::from("/src/items").join(&item.item.path),
                output: item.output.clone(),
                origin: EntryOrigin::Item,
            },
            content: content.as_bytes().to_vec(),
            existing: ExistingState::Absent,
            action,
        }
    }

    fn run(
        f: &mut Fixture,
        plan: DeploymentPlan<'_>,
        profile: &ResolvedProfile,
        dry_run: bool,
    ) -> Result<Deployment, DeployError> {
        let hooks = HookRunner {
            executor: f.ctx.executor.as_ref(),
            log: f.ctx.log.as_ref(),
            dir: Path::new("/src"),
            env: &[],
        };
        execute(
            plan,
            profile,
            &f.ctx,
            &hooks,
            &mut f.manifest,
            ExecutorOptions {
                dry_run,
                line_ending: LineEnding::Lf,
            },
        )
    }

    fn ok_exec() -> ExecResult {
        ExecResult {
            success: true,
            code: Some(0),
            ..ExecResult::default()
        }
    }

    fn source_fs() -> MockFileSystemOps {
        MockFileSystemOps::new()
            .with_file_mode("/src/items/.rc", "x", 0o600)
            .with_dir("/home/u")
    }

    #[test]
    fn writes_file_with_source_mode_and_records_manifest() {
        let mut f = fixture(source_fs(), MockExecutor::new(), MockMergePrompt::new());
        let item = resolved(".rc");
        let plan = DeploymentPlan {
            profile: "base".into(),
            items: vec![planned(&item, Action::Write, "a\r\nb\r\n")],
        };
        let deployment = run(&mut f, plan, &profile(&[], &[]), false).unwrap();

        assert!(deployment.is_success());
        let out = Path::new("/home/u/.rc");
        assert_eq!(f.fs.content(out).unwrap(), b"a\nb\n");
        assert_eq!(f.fs.file_mode(out), Some(0o600));
        let entry = f.manifest.manifest().get(out).unwrap();
        assert_eq!(entry.digest, digest(b"a\nb\n"));
        assert!(ManifestStore::load(f.manifest.path()).unwrap().manifest().get(out).is_some());
    }

    #[test]
    fn permission_override_wins_over_source_mode() {
        let mut f = fixture(source_fs(), MockExecutor::new(), MockMergePrompt::new());
        let mut item = resolved(".rc");
        item.item.permissions = Some("0755".into());
        let plan = DeploymentPlan {
            profile: "base".into(),
            items: vec![planned(&item, Action::Write, "x")],
        };
        run(&mut f, plan, &profile(&[], &[]), false).unwrap();
        assert_eq!(f.fs.file_mode(Path::new("/home/u/.rc")), Some(0o755));
    }

    #[test]
    fn creates_missing_parent_directories() {
        let mut f = fixture(source_fs(), MockExecutor::new(), MockMergePrompt::new());
        let mut item = resolved(".rc");
        item.output = PathBuf::from("/home/u/.config/app/rc");
        let plan = DeploymentPlan {
            profile: "base".into(),
            items: vec![planned(&item, Action::Write, "x")],
        };
        run(&mut f, plan, &profile(&[], &[]), false).unwrap();
        assert!(f.fs.content(Path::new("/home/u/.config/app/rc")).is_some());
    }

    #[test]
    fn dry_run_writes_nothing_and_runs_no_hooks() {
        let mut executor = MockExecutor::new();
        executor.expect_run_shell().never();
        let mut f = fixture(source_fs(), executor, MockMergePrompt::new());
        let item = resolved(".rc");
        let plan = DeploymentPlan {
            profile: "base".into(),
            items: vec![planned(&item, Action::Write, "x")],
        };
        let deployment = run(&mut f, plan, &profile(&["echo pre"], &["echo post"]), true).unwrap();

        assert!(deployment.is_success());
        assert!(f.fs.writes().is_empty());
        assert!(f.manifest.manifest().is_empty());
        assert_eq!(
            deployment.outcomes()[0].status,
            OutcomeStatus::WouldWrite
        );
        assert!(f.log.contains("[dry run] would write /home/u/.rc"));
        assert!(f.log.contains("[dry run] would run pre hook: echo pre"));
    }

    #[test]
    fn pre_hook_failure_aborts_before_items() {
        let mut executor = MockExecutor::new();
        executor.expect_run_shell().times(1).returning(|_, _, _| {
            Ok(ExecResult {
                stderr: "locked".into(),
                success: false,
                code: Some(1),
                ..ExecResult::default()
            })
        });
        let mut f = fixture(source_fs(), executor, MockMergePrompt::new());
        let item = resolved(".rc");
        let plan = DeploymentPlan {
            profile: "base".into(),
            items: vec![planned(&item, Action::Write, "x")],
        };
        let err = run(&mut f, plan, &profile(&["false", "never"], &["post"]), false).unwrap_err();
        assert!(matches!(err, DeployError::HookExecution { stage: HookStage::Pre, .. }));
        assert!(f.fs.writes().is_empty());
    }

    #[test]
    fn post_hooks_run_after_item_failure() {
        let mut executor = MockExecutor::new();
        executor
            .expect_run_shell()
            .withf(|_, cmd, _| cmd == "echo done")
            .times(1)
            .returning(|_, _, _| Ok(ok_exec()));
        let mut f = fixture(source_fs(), executor, MockMergePrompt::new());
        let bad = resolved("bad");
        let good = resolved(".rc");
        let plan = DeploymentPlan {
            profile: "base".into(),
            items: vec![
                planned(&good, Action::Write, "x"),
                planned(&bad, Action::Fail("cannot read source".into()), ""),
            ],
        };
        let deployment = run(&mut f, plan, &profile(&[], &["echo done"]), false).unwrap();

        assert!(!deployment.is_success());
        assert_eq!(deployment.status().to_string(), "failed: 1 item(s) failed");
        assert!(f.fs.content(Path::new("/home/u/.rc")).is_some());
    }

    #[test]
    fn post_hook_failure_fails_run() {
        let mut executor = MockExecutor::new();
        executor.expect_run_shell().returning(|_, _, _| {
            Ok(ExecResult {
                success: false,
                code: Some(2),
                ..ExecResult::default()
            })
        });
        let mut f = fixture(source_fs(), executor, MockMergePrompt::new());
        let plan = DeploymentPlan {
            profile: "base".into(),
            items: Vec::new(),
        };
        let deployment = run(&mut f, plan, &profile(&[], &["exit 2"]), false).unwrap();
        assert!(!deployment.is_success());
        assert!(f.log.contains("post hook `exit 2` failed"));
    }

    #[test]
    fn prompt_answers_are_honoured_per_item() {
        let mut prompt = MockMergePrompt::new();
        prompt
            .expect_confirm_overwrite()
            .returning(|output, _| Ok(output.ends_with(".rc")));
        let fs = source_fs().with_file("/src/items/other", "y");
        let mut f = fixture(fs, MockExecutor::new(), prompt);
        let yes = resolved(".rc");
        let no = resolved("other");
        let plan = DeploymentPlan {
            profile: "base".into(),
            items: vec![
                planned(&yes, Action::Prompt, "x"),
                planned(&no, Action::Prompt, "y"),
            ],
        };
        let deployment = run(&mut f, plan, &profile(&[], &[]), false).unwrap();

        assert_eq!(deployment.outcomes()[0].status, OutcomeStatus::Written);
        assert_eq!(
            deployment.outcomes()[1].status,
            OutcomeStatus::Skipped(SkipReason::Declined)
        );
        assert!(deployment.is_success());
    }

    #[test]
    fn cancellation_skips_remaining_items_and_post_hooks() {
        let mut executor = MockExecutor::new();
        executor.expect_run_shell().never();
        let mut f = fixture(source_fs(), executor, MockMergePrompt::new());
        f.ctx.cancel.store(true, Ordering::SeqCst);
        let item = resolved(".rc");
        let plan = DeploymentPlan {
            profile: "base".into(),
            items: vec![planned(&item, Action::Write, "x")],
        };
        let deployment = run(&mut f, plan, &profile(&[], &["echo post"]), false).unwrap();

        assert_eq!(
            deployment.outcomes()[0].status,
            OutcomeStatus::Skipped(SkipReason::Interrupted)
        );
        assert_eq!(deployment.status().to_string(), "failed: deployment interrupted");
        assert!(f.fs.writes().is_empty());
    }

    #[test]
    fn child_entries_record_directory_priority() {
        let fs = MockFileSystemOps::new()
            .with_file("/src/items/nvim/init.lua", "x")
            .with_dir("/home/u");
        let mut f = fixture(fs, MockExecutor::new(), MockMergePrompt::new());
        let mut dir = resolved("nvim");
        dir.item.priority = 4;
        let mut child = planned(&dir, Action::Write, "x");
        child.entry.source = PathBuf::from("/src/items/nvim/init.lua");
        child.entry.output = PathBuf::from("/home/u/nvim/init.lua");
        child.entry.origin = EntryOrigin::Child {
            parent: PathBuf::from("/home/u/nvim"),
        };
        let plan = DeploymentPlan {
            profile: "base".into(),
            items: vec![child],
        };
        run(&mut f, plan, &profile(&[], &[]), false).unwrap();
        let entry = f
            .manifest
            .manifest()
            .get(Path::new("/home/u/nvim/init.lua"))
            .unwrap();
        assert_eq!(entry.priority, 4);
        assert_eq!(entry.item, PathBuf::from("nvim"));
    }

    #[test]
    fn write_failure_is_item_scoped() {
        // `/home/u/.rc` exists as a directory, so writing it fails.
        let fs = source_fs().with_dir("/home/u/.rc");
        let mut f = fixture(fs, MockExecutor::new(), MockMergePrompt::new());
        let item = resolved(".rc");
        let mut merge = resolved("other");
        merge.item.merge = MergeMode::Keep;
        let plan = DeploymentPlan {
            profile: "base".into(),
            items: vec![
                planned(&item, Action::Write, "x"),
                planned(&merge, Action::Skip(SkipReason::Keep), "y"),
            ],
        };
        let deployment = run(&mut f, plan, &profile(&[], &[]), false).unwrap();
        assert!(matches!(
            deployment.outcomes()[0].status,
            OutcomeStatus::Failed(_)
        ));
        assert_eq!(
            deployment.outcomes()[1].status,
            OutcomeStatus::Skipped(SkipReason::Keep)
        );
        assert_eq!(f.log.items()[0].status, ItemStatus::Failed);
    }
}
