//! Profile resolution: flatten an `extends` chain into one effective profile.
//!
//! The chain is collected child-first by following `extends`, checked for
//! cycles, then folded root-first so that each descendant overrides its
//! ancestors:
//!
//! - variables override by key (the descendant value takes the ancestor's slot)
//! - hooks concatenate, ancestors first
//! - the target is a scalar override
//! - items override by their resolved output path
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::document::{Item, Profile, Target, Variable};
use super::loader::ProfileLoader;
use crate::error::ProfileError;

/// A profile with its whole `extends` chain applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProfile {
    /// Name of the requested profile.
    pub name: String,
    /// Names along the chain, root ancestor first, requested profile last.
    pub chain: Vec<String>,
    /// Effective variables in first-declaration order.
    pub vars: Vec<Variable>,
    /// Effective deploy directory.
    pub target: Option<PathBuf>,
    /// Pre-deployment hooks, ancestors first.
    pub pre_hooks: Vec<String>,
    /// Post-deployment hooks, ancestors first.
    pub post_hooks: Vec<String>,
    /// Effective items, unique by output path.
    pub items: Vec<ResolvedItem>,
}

/// An item together with the absolute path it deploys to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedItem {
    /// The item as declared.
    pub item: Item,
    /// Absolute output path.
    pub output: PathBuf,
    /// Profile in the chain that declared the item.
    pub profile: String,
}

/// Target directories supplied outside the profile documents.
///
/// The command-line value beats anything in the chain; the environment
/// value is only used if no profile sets a target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetOverrides {
    /// `--target` flag.
    pub cli: Option<PathBuf>,
    /// `PUNKTF_TARGET` environment variable.
    pub env: Option<PathBuf>,
}

impl TargetOverrides {
    /// Read the environment layer from `PUNKTF_TARGET`.
    #[must_use]
    pub fn from_env(cli: Option<PathBuf>) -> Self {
        Self {
            cli,
            env: std::env::var_os("PUNKTF_TARGET")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }
}

/// Resolve `name` without any external target override.
///
/// # Errors
///
/// See [`resolve_with`].
pub fn resolve(name: &str, loader: &dyn ProfileLoader) -> Result<ResolvedProfile, ProfileError> {
    resolve_with(name, loader, &TargetOverrides::default())
}

/// Resolve `name` and its ancestors into a single profile.
///
/// # Errors
///
/// - [`ProfileError::NotFound`] if the profile or an ancestor is missing
/// - [`ProfileError::CyclicInheritance`] if `extends` loops
/// - [`ProfileError::Schema`] if a document is invalid or an item needs a
///   target directory and none is available
pub fn resolve_with(
    name: &str,
    loader: &dyn ProfileLoader,
    overrides: &TargetOverrides,
) -> Result<ResolvedProfile, ProfileError> {
    let chain = collect_chain(name, loader)?;

    let target = overrides
        .cli
        .clone()
        .or_else(|| chain.iter().rev().find_map(|(_, p)| p.target.clone()))
        .or_else(|| overrides.env.clone());

    let mut resolved = ResolvedProfile {
        name: name.to_string(),
        chain: chain.iter().map(|(n, _)| n.clone()).collect(),
        vars: Vec::new(),
        target,
        pre_hooks: Vec::new(),
        post_hooks: Vec::new(),
        items: Vec::new(),
    };

    for (profile_name, profile) in chain {
        for var in profile.vars {
            upsert_var(&mut resolved.vars, var);
        }
        resolved.pre_hooks.extend(profile.pre_hooks);
        resolved.post_hooks.extend(profile.post_hooks);

        for (index, item) in profile.items.into_iter().enumerate() {
            let output = output_path(&item, resolved.target.as_deref()).ok_or_else(|| {
                ProfileError::Schema {
                    profile: profile_name.clone(),
                    field: format!("items[{index}].target"),
                    message: "no target directory given (use --target, a profile `target` or PUNKTF_TARGET)"
                        .to_string(),
                }
            })?;
            let entry = ResolvedItem {
                item,
                output,
                profile: profile_name.clone(),
            };
            if let Some(slot) = resolved.items.iter_mut().find(|i| i.output == entry.output) {
                tracing::debug!(
                    "{} from '{}' overrides '{}'",
                    entry.output.display(),
                    entry.profile,
                    slot.profile
                );
                *slot = entry;
            } else {
                resolved.items.push(entry);
            }
        }
    }

    Ok(resolved)
}

/// Compute where `item` is deployed to.
///
/// Returns `None` if the item is relative to the profile target and no
/// target is set.
#[must_use]
pub fn output_path(item: &Item, target: Option<&Path>) -> Option<PathBuf> {
    match &item.target {
        Some(Target::Path(path)) => Some(path.clone()),
        Some(Target::Alias(alias)) => target.map(|t| t.join(alias)),
        None => target.map(|t| t.join(&item.path)),
    }
}

/// Follow `extends` from `name` and return the chain root-first.
fn collect_chain(
    name: &str,
    loader: &dyn ProfileLoader,
) -> Result<Vec<(String, Profile)>, ProfileError> {
    let mut chain: Vec<(String, Profile)> = Vec::new();
    let mut visited = HashSet::new();
    let mut current = name.to_string();

    loop {
        if !visited.insert(current.clone()) {
            let start = chain.iter().position(|(n, _)| *n == current).unwrap_or(0);
            let mut cycle: Vec<String> = chain.iter().skip(start).map(|(n, _)| n.clone()).collect();
            cycle.push(current);
            return Err(ProfileError::CyclicInheritance { cycle });
        }

        let profile = loader.load(&current)?;
        let parent = profile.extends.clone();
        chain.push((current, profile));

        match parent {
            Some(parent) => current = parent,
            None => break,
        }
    }

    chain.reverse();
    Ok(chain)
}

fn upsert_var(vars: &mut Vec<Variable>, var: Variable) {
    if let Some(existing) = vars.iter_mut().find(|v| v.key == var.key) {
        existing.value = var.value;
    } else {
        vars.push(var);
    }
}
