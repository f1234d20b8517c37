//! Deployment planner: decide per entry whether to write it.
//!
//! [`decide`] is the merge-mode/priority decision table for one entry.
//! [`plan`] applies it to every rendered entry in output-path order, which
//! keeps prompts and tie-breaks reproducible however the inputs were
//! produced.
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use super::entries::DeployEntry;
use super::state::ExistingState;
use crate::config::MergeMode;
use crate::error::DeployError;

/// Why an entry is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Merge mode `keep` and something already exists.
    Keep,
    /// A previous run deployed the path with a higher priority.
    LowerPriority {
        /// Priority recorded for the deployed file.
        existing: i64,
        /// Priority of the incoming entry.
        incoming: i64,
    },
    /// Merge mode `ask` without a way to ask.
    NonInteractive,
    /// The user answered no.
    Declined,
    /// The run was cancelled first.
    Interrupted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keep => f.write_str("keep"),
            Self::LowerPriority { existing, incoming } => {
                write!(f, "priority {incoming} < deployed {existing}")
            }
            Self::NonInteractive => f.write_str("not interactive"),
            Self::Declined => f.write_str("declined"),
            Self::Interrupted => f.write_str("interrupted"),
        }
    }
}

/// Planned action for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write the content.
    Write,
    /// Leave the output path alone.
    Skip(SkipReason),
    /// Ask before overwriting.
    Prompt,
    /// The entry cannot be deployed.
    Fail(String),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write => f.write_str("write"),
            Self::Skip(reason) => write!(f, "skip ({reason})"),
            Self::Prompt => f.write_str("ask"),
            Self::Fail(reason) => write!(f, "fail ({reason})"),
        }
    }
}

/// Merge-mode and priority decision table.
///
/// | existing                    | merge               | action       |
/// |-----------------------------|---------------------|--------------|
/// | absent                      | any                 | write        |
/// | foreign                     | overwrite(_all)     | write        |
/// | foreign                     | keep                | skip         |
/// | foreign                     | ask                 | prompt       |
/// | deployed, incoming >= prior | anything but keep   | write        |
/// | deployed, incoming >= prior | keep                | skip         |
/// | deployed, incoming < prior  | any                 | skip         |
#[must_use]
pub const fn decide(existing: ExistingState, merge: MergeMode, priority: i64) -> Action {
    match existing {
        ExistingState::Absent => Action::Write,
        ExistingState::Foreign => match merge {
            MergeMode::Overwrite | MergeMode::OverwriteAll => Action::Write,
            MergeMode::Keep => Action::Skip(SkipReason::Keep),
            MergeMode::Ask => Action::Prompt,
        },
        ExistingState::Deployed { priority: existing } if priority < existing => {
            Action::Skip(SkipReason::LowerPriority {
                existing,
                incoming: priority,
            })
        }
        ExistingState::Deployed { .. } => match merge {
            MergeMode::Keep => Action::Skip(SkipReason::Keep),
            MergeMode::Overwrite | MergeMode::OverwriteAll | MergeMode::Ask => Action::Write,
        },
    }
}

/// An entry together with its bytes, ready for planning.
#[derive(Debug, Clone)]
pub struct RenderedItem<'a> {
    /// Entry being deployed.
    pub entry: DeployEntry<'a>,
    /// Bytes to write, or why they could not be produced.
    pub content: Result<Vec<u8>, String>,
}

/// One planned entry.
#[derive(Debug, Clone)]
pub struct PlannedItem<'a> {
    /// Entry being deployed.
    pub entry: DeployEntry<'a>,
    /// Bytes to write (empty for failed entries).
    pub content: Vec<u8>,
    /// What was at the output path.
    pub existing: ExistingState,
    /// Decision.
    pub action: Action,
}

/// Options that influence planning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanOptions {
    /// A prompt can be shown. Prompts become skips otherwise.
    pub interactive: bool,
}

/// Ordered actions for a whole profile.
#[derive(Debug, Clone)]
pub struct DeploymentPlan<'a> {
    /// Profile being deployed.
    pub profile: String,
    /// Entries in output-path order.
    pub items: Vec<PlannedItem<'a>>,
}

impl DeploymentPlan<'_> {
    /// Number of entries with the given action kind.
    #[must_use]
    pub fn count(&self, pred: impl Fn(&Action) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.action)).count()
    }
}

impl fmt::Display for DeploymentPlan<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, planned) in self.items.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "{:<5} {} ({}: {})",
                planned.action.to_string(),
                planned.entry.output.display(),
                planned.entry.item.profile,
                planned.entry.label()
            )?;
        }
        Ok(())
    }
}

/// Build the plan for `rendered` entries of `profile`.
///
/// `existing` maps output paths to their inspected state; paths missing from
/// the map count as absent. Once an `overwrite_all` entry replaces an
/// existing file, every later prompt in the plan becomes a write.
///
/// # Errors
///
/// Returns [`DeployError::MergeConflict`] if two entries share an output
/// path.
pub fn plan<'a>(
    profile: &str,
    mut rendered: Vec<RenderedItem<'a>>,
    existing: &BTreeMap<PathBuf, ExistingState>,
    options: PlanOptions,
) -> Result<DeploymentPlan<'a>, DeployError> {
    rendered.sort_by(|a, b| a.entry.output.cmp(&b.entry.output));
    for pair in rendered.windows(2) {
        if let [a, b] = pair
            && a.entry.output == b.entry.output
        {
            return Err(DeployError::MergeConflict {
                path: b.entry.output.clone(),
                first: a.entry.label(),
                second: b.entry.label(),
            });
        }
    }

    let mut overwrite_all = false;
    let mut items = Vec::with_capacity(rendered.len());
    for RenderedItem { entry, content } in rendered {
        let state = existing
            .get(&entry.output)
            .copied()
            .unwrap_or(ExistingState::Absent);

        let (content, action) = match content {
            Err(reason) => (Vec::new(), Action::Fail(reason)),
            Ok(content) => {
                let action = match decide(state, entry.merge(), entry.priority()) {
                    Action::Prompt if overwrite_all => Action::Write,
                    Action::Prompt if !options.interactive => {
                        Action::Skip(SkipReason::NonInteractive)
                    }
                    other => other,
                };
                (content, action)
            }
        };

        if action == Action::Write
            && entry.merge() == MergeMode::OverwriteAll
            && state != ExistingState::Absent
        {
            overwrite_all = true;
        }

        items.push(PlannedItem {
            entry,
            content,
            existing: state,
            action,
        });
    }

    Ok(DeploymentPlan {
        profile: profile.to_string(),
        items,
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::{Item, ResolvedItem};
    use crate::deploy::entries::EntryOrigin;

    // -----------------------------------------------------------------------
    // decide
    // -----------------------------------------------------------------------

    const MODES: [MergeMode; 4] = [
        MergeMode::Overwrite,
        MergeMode::OverwriteAll,
        MergeMode::Keep,
        MergeMode::Ask,
    ];

    #[test]
    fn absent_always_writes() {
        for mode in MODES {
            assert_eq!(decide(ExistingState::Absent, mode, -3), Action::Write);
        }
    }

    #[test]
    fn foreign_follows_merge_mode() {
        let foreign = ExistingState::Foreign;
        assert_eq!(decide(foreign, MergeMode::Overwrite, 0), Action::Write);
        assert_eq!(decide(foreign, MergeMode::OverwriteAll, 0), Action::Write);
        assert_eq!(
            decide(foreign, MergeMode::Keep, 0),
            Action::Skip(SkipReason::Keep)
        );
        assert_eq!(decide(foreign, MergeMode::Ask, 0), Action::Prompt);
    }

    #[test]
    fn keep_on_foreign_ignores_priority() {
        for priority in [i64::MIN, 0, i64::MAX] {
            assert_eq!(
                decide(ExistingState::Foreign, MergeMode::Keep, priority),
                Action::Skip(SkipReason::Keep)
            );
        }
    }

    #[test]
    fn higher_or_equal_priority_replaces_deployed() {
        let deployed = ExistingState::Deployed { priority: 2 };
        for mode in [MergeMode::Overwrite, MergeMode::OverwriteAll, MergeMode::Ask] {
            assert_eq!(decide(deployed, mode, 2), Action::Write);
            assert_eq!(decide(deployed, mode, 5), Action::Write);
        }
        assert_eq!(
            decide(deployed, MergeMode::Keep, 5),
            Action::Skip(SkipReason::Keep)
        );
    }

    #[test]
    fn lower_priority_never_replaces_deployed() {
        let deployed = ExistingState::Deployed { priority: 5 };
        for mode in MODES {
            assert_eq!(
                decide(deployed, mode, 1),
                Action::Skip(SkipReason::LowerPriority {
                    existing: 5,
                    incoming: 1
                })
            );
        }
    }

    // -----------------------------------------------------------------------
    // plan
    // -----------------------------------------------------------------------

    fn resolved(path: &str, output: &str, merge: MergeMode) -> ResolvedItem {
        let mut item = Item::new(path);
        item.merge = merge;
        ResolvedItem {
            item,
            output: PathBuf::from(output),
            profile: "base".into(),
        }
    }

    fn rendered(item: &ResolvedItem) -> RenderedItem<'_> {
        RenderedItem {
            entry: DeployEntry {
                item,
                source: PathBuf::from("/src/items").join(&item.item.path),
                output: item.output.clone(),
                origin: EntryOrigin::Item,
            },
            content: Ok(b"content".to_vec()),
        }
    }

    fn actions(plan: &DeploymentPlan<'_>) -> Vec<Action> {
        plan.items.iter().map(|i| i.action.clone()).collect()
    }

    #[test]
    fn plan_is_sorted_by_output() {
        let z = resolved("z", "/home/u/z", MergeMode::Overwrite);
        let a = resolved("a", "/home/u/a", MergeMode::Overwrite);
        let plan = plan(
            "base",
            vec![rendered(&z), rendered(&a)],
            &BTreeMap::new(),
            PlanOptions::default(),
        )
        .unwrap();
        assert_eq!(plan.items[0].entry.output, PathBuf::from("/home/u/a"));
        assert_eq!(plan.items[1].entry.output, PathBuf::from("/home/u/z"));
    }

    #[test]
    fn ask_is_skipped_when_not_interactive() {
        let item = resolved("rc", "/home/u/.rc", MergeMode::Ask);
        let existing = BTreeMap::from([(item.output.clone(), ExistingState::Foreign)]);
        let non_interactive =
            plan("base", vec![rendered(&item)], &existing, PlanOptions::default()).unwrap();
        assert_eq!(
            actions(&non_interactive),
            vec![Action::Skip(SkipReason::NonInteractive)]
        );

        let interactive = plan(
            "base",
            vec![rendered(&item)],
            &existing,
            PlanOptions { interactive: true },
        )
        .unwrap();
        assert_eq!(actions(&interactive), vec![Action::Prompt]);
    }

    #[test]
    fn overwrite_all_suppresses_later_prompts() {
        let all = resolved("a", "/home/u/a", MergeMode::OverwriteAll);
        let ask = resolved("b", "/home/u/b", MergeMode::Ask);
        let existing = BTreeMap::from([
            (all.output.clone(), ExistingState::Foreign),
            (ask.output.clone(), ExistingState::Foreign),
        ]);
        let plan = plan(
            "base",
            vec![rendered(&ask), rendered(&all)],
            &existing,
            PlanOptions { interactive: true },
        )
        .unwrap();
        assert_eq!(actions(&plan), vec![Action::Write, Action::Write]);
    }

    #[test]
    fn overwrite_all_on_absent_path_does_not_suppress_prompts() {
        let all = resolved("a", "/home/u/a", MergeMode::OverwriteAll);
        let ask = resolved("b", "/home/u/b", MergeMode::Ask);
        let existing = BTreeMap::from([(ask.output.clone(), ExistingState::Foreign)]);
        let plan = plan(
            "base",
            vec![rendered(&all), rendered(&ask)],
            &existing,
            PlanOptions { interactive: true },
        )
        .unwrap();
        assert_eq!(actions(&plan), vec![Action::Write, Action::Prompt]);
    }

    #[test]
    fn render_failure_becomes_fail_action() {
        let item = resolved("rc", "/home/u/.rc", MergeMode::Overwrite);
        let mut input = rendered(&item);
        input.content = Err("cannot read source".into());
        let plan = plan("base", vec![input], &BTreeMap::new(), PlanOptions::default()).unwrap();
        assert_eq!(
            actions(&plan),
            vec![Action::Fail("cannot read source".into())]
        );
        assert!(plan.items[0].content.is_empty());
    }

    #[test]
    fn duplicate_outputs_are_a_merge_conflict() {
        let one = resolved("one", "/home/u/.rc", MergeMode::Overwrite);
        let two = resolved("two", "/home/u/.rc", MergeMode::Overwrite);
        let err = plan(
            "base",
            vec![rendered(&one), rendered(&two)],
            &BTreeMap::new(),
            PlanOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DeployError::MergeConflict { .. }));
    }

    #[test]
    fn plan_display_lists_actions() {
        let bashrc = resolved(".bashrc", "/home/u/.bashrc", MergeMode::Overwrite);
        let gitconfig = resolved(".gitconfig", "/home/u/.gitconfig", MergeMode::Keep);
        let vimrc = resolved(".vimrc", "/home/u/.vimrc", MergeMode::Overwrite);
        let zshrc = resolved(".zshrc", "/home/u/.zshrc", MergeMode::Ask);
        let existing = BTreeMap::from([
            (gitconfig.output.clone(), ExistingState::Foreign),
            (vimrc.output.clone(), ExistingState::Deployed { priority: 3 }),
            (zshrc.output.clone(), ExistingState::Foreign),
        ]);
        let plan = plan(
            "base",
            vec![
                rendered(&zshrc),
                rendered(&vimrc),
                rendered(&gitconfig),
                rendered(&bashrc),
            ],
            &existing,
            PlanOptions { interactive: true },
        )
        .unwrap();
        insta::assert_snapshot!(plan.to_string(), @r"
        write /home/u/.bashrc (base: .bashrc)
        skip (keep) /home/u/.gitconfig (base: .gitconfig)
        skip (priority 0 < deployed 3) /home/u/.vimrc (base: .vimrc)
        ask   /home/u/.zshrc (base: .zshrc)
        ");
    }
}
