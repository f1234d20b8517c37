//! Profile document layout and schema validation.
//!
//! A profile is stored as JSON or YAML; both encodings deserialize into the
//! same [`Profile`] structure. Parsing only checks the shape of the document,
//! [`Profile::validate`] enforces the semantic rules (relative item paths,
//! absolute targets, unique variable keys, ...) and reports the offending
//! field path.
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ProfileError;

/// Minimum length for octal permission strings.
const OCTAL_MODE_MIN_LEN: usize = 3;

/// Maximum length for octal permission strings.
const OCTAL_MODE_MAX_LEN: usize = 4;

/// A single profile document as written in `profiles/<name>.<ext>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    /// Name of the profile this one derives from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    /// Profile-level variables.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vars: Vec<Variable>,

    /// Default deploy directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<PathBuf>,

    /// Commands run before any item is deployed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_hooks: Vec<String>,

    /// Commands run after all items were processed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_hooks: Vec<String>,

    /// Files and directories to deploy.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
}

/// A key/value pair available to templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Variable {
    /// Variable name.
    pub key: String,
    /// Variable value.
    pub value: String,
}

impl Variable {
    /// Create a new variable.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One file or directory to deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Item {
    /// Path relative to the `items/` directory of the source root.
    pub path: PathBuf,

    /// Output location; defaults to `path` joined with the profile target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,

    /// Item-level variables, shadowing profile variables.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vars: Vec<Variable>,

    /// Policy for existing output files.
    #[serde(default)]
    pub merge: MergeMode,

    /// Whether the item is rendered through the template engine.
    #[serde(default = "default_template")]
    pub template: bool,

    /// Conflict priority against files deployed by earlier runs.
    #[serde(default)]
    pub priority: i64,

    /// Octal permission override (e.g. `"0600"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,
}

const fn default_template() -> bool {
    true
}

impl Item {
    /// Create an item with default settings.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            target: None,
            vars: Vec::new(),
            merge: MergeMode::default(),
            template: true,
            priority: 0,
            permissions: None,
        }
    }

    /// Parsed permission override, if one is set and valid.
    #[must_use]
    pub fn mode(&self) -> Option<u32> {
        self.permissions.as_deref().and_then(parse_octal_mode)
    }
}

/// Output location of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Target {
    /// Absolute output path.
    Path(PathBuf),
    /// Name joined with the profile's target directory.
    Alias(PathBuf),
}

/// Policy applied when the output path already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Replace existing files.
    #[default]
    Overwrite,
    /// Replace existing files and stop asking for the rest of the run.
    OverwriteAll,
    /// Never touch existing files.
    Keep,
    /// Ask before replacing a foreign file.
    Ask,
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Overwrite => "overwrite",
            Self::OverwriteAll => "overwrite_all",
            Self::Keep => "keep",
            Self::Ask => "ask",
        })
    }
}

/// Supported on-disk encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// `.json`
    Json,
    /// `.yaml`, `.yml`, `.pfp`
    Yaml,
}

impl Encoding {
    /// Pick the encoding from a file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "json" => Some(Self::Json),
            "yaml" | "yml" | "pfp" => Some(Self::Yaml),
            _ => None,
        }
    }
}

impl Profile {
    /// Deserialize and validate a profile document.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Schema`] if the document cannot be decoded or
    /// violates a schema rule.
    pub fn parse(name: &str, content: &str, encoding: Encoding) -> Result<Self, ProfileError> {
        let profile: Self = match encoding {
            Encoding::Json => serde_json::from_str(content).map_err(|e| ProfileError::Schema {
                profile: name.to_string(),
                field: "<document>".to_string(),
                message: e.to_string(),
            })?,
            Encoding::Yaml => serde_yaml::from_str(content).map_err(|e| ProfileError::Schema {
                profile: name.to_string(),
                field: "<document>".to_string(),
                message: e.to_string(),
            })?,
        };
        profile.validate(name)?;
        Ok(profile)
    }

    /// Check the semantic rules of the document.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Schema`] naming the first offending field.
    pub fn validate(&self, name: &str) -> Result<(), ProfileError> {
        let schema = |field: String, message: &str| ProfileError::Schema {
            profile: name.to_string(),
            field,
            message: message.to_string(),
        };

        if let Some(parent) = &self.extends
            && parent.trim().is_empty()
        {
            return Err(schema("extends".into(), "must not be empty"));
        }

        if let Some(target) = &self.target
            && !target.is_absolute()
        {
            return Err(schema("target".into(), "must be an absolute path"));
        }

        validate_vars(&self.vars, "vars").map_err(|(field, msg)| schema(field, msg))?;

        for (stage, hooks) in [("pre_hooks", &self.pre_hooks), ("post_hooks", &self.post_hooks)] {
            for (i, hook) in hooks.iter().enumerate() {
                if hook.trim().is_empty() {
                    return Err(schema(format!("{stage}[{i}]"), "must not be empty"));
                }
            }
        }

        for (i, item) in self.items.iter().enumerate() {
            if !is_plain_relative(&item.path) {
                return Err(schema(
                    format!("items[{i}].path"),
                    "must be a non-empty relative path without `..`",
                ));
            }
            match &item.target {
                Some(Target::Path(path)) if !path.is_absolute() => {
                    return Err(schema(
                        format!("items[{i}].target.value"),
                        "path targets must be absolute",
                    ));
                }
                Some(Target::Alias(alias)) if !is_plain_relative(alias) => {
                    return Err(schema(
                        format!("items[{i}].target.value"),
                        "alias targets must be relative without `..`",
                    ));
                }
                _ => {}
            }
            validate_vars(&item.vars, &format!("items[{i}].vars"))
                .map_err(|(field, msg)| schema(field, msg))?;
            if let Some(perms) = &item.permissions
                && parse_octal_mode(perms).is_none()
            {
                return Err(schema(
                    format!("items[{i}].permissions"),
                    "must be 3 or 4 octal digits",
                ));
            }
        }

        Ok(())
    }
}

/// Returns `true` for characters allowed in variable names.
#[must_use]
pub fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn validate_vars(vars: &[Variable], field: &str) -> Result<(), (String, &'static str)> {
    let mut seen = HashSet::new();
    for (i, var) in vars.iter().enumerate() {
        if var.key.is_empty() || !var.key.chars().all(is_key_char) {
            return Err((
                format!("{field}[{i}].key"),
                "must be non-empty and contain only [A-Za-z0-9_.-]",
            ));
        }
        if !seen.insert(var.key.as_str()) {
            return Err((format!("{field}[{i}].key"), "duplicate key"));
        }
    }
    Ok(())
}

fn is_plain_relative(path: &Path) -> bool {
    !path.as_os_str().is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)))
}

fn parse_octal_mode(s: &str) -> Option<u32> {
    if !(OCTAL_MODE_MIN_LEN..=OCTAL_MODE_MAX_LEN).contains(&s.len()) {
        return None;
    }
    if !s.chars().all(|c| ('0'..='7').contains(&c)) {
        return None;
    }
    u32::from_str_radix(s, 8).ok()
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;

    fn schema_field(err: ProfileError) -> String {
        match err {
            ProfileError::Schema { field, .. } => field,
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn parse_yaml_document_with_defaults() {
        let yaml = r#"
extends: base
vars:
  - key: OS
    value: windows
target: "/home/demo"
items:
  - path: alacritty.yml
    target:
      kind: path
      value: /opt/alacritty.yml
    merge: ask
    priority: 5
  - path: .gitconfig
"#;
        let profile = Profile::parse("win", yaml, Encoding::Yaml).unwrap();
        assert_eq!(profile.extends.as_deref(), Some("base"));
        assert_eq!(profile.vars, vec![Variable::new("OS", "windows")]);
        assert_eq!(profile.items.len(), 2);
        assert_eq!(
            profile.items[0].target,
            Some(Target::Path(PathBuf::from("/opt/alacritty.yml")))
        );
        assert_eq!(profile.items[0].merge, MergeMode::Ask);
        assert_eq!(profile.items[0].priority, 5);
        assert!(profile.items[1].template, "template defaults to true");
        assert_eq!(profile.items[1].merge, MergeMode::Overwrite);
        assert_eq!(profile.items[1].priority, 0);
    }

    #[test]
    fn parse_json_and_yaml_are_equivalent() {
        let json = r#"{"target": "/t", "items": [{"path": "a", "target": {"kind": "alias", "value": "b"}, "merge": "overwrite_all"}]}"#;
        let yaml = "target: /t\nitems:\n  - path: a\n    target: {kind: alias, value: b}\n    merge: overwrite_all\n";
        let from_json = Profile::parse("p", json, Encoding::Json).unwrap();
        let from_yaml = Profile::parse("p", yaml, Encoding::Yaml).unwrap();
        assert_eq!(from_json, from_yaml);
        assert_eq!(from_json.items[0].merge, MergeMode::OverwriteAll);
    }

    #[test]
    fn unknown_field_is_schema_error() {
        let err = Profile::parse("p", "{\"tragets\": \"/x\"}", Encoding::Json).unwrap_err();
        assert_eq!(schema_field(err), "<document>");
    }

    #[test]
    fn invalid_merge_mode_is_schema_error() {
        let yaml = "items:\n  - path: a\n    merge: sometimes\n";
        assert!(matches!(
            Profile::parse("p", yaml, Encoding::Yaml),
            Err(ProfileError::Schema { .. })
        ));
    }

    #[test]
    fn parent_dir_in_item_path_is_rejected() {
        let yaml = "items:\n  - path: ok\n  - path: ../escape\n";
        let err = Profile::parse("p", yaml, Encoding::Yaml).unwrap_err();
        assert_eq!(schema_field(err), "items[1].path");
    }

    #[test]
    fn relative_path_target_is_rejected() {
        let yaml = "items:\n  - path: a\n    target: {kind: path, value: relative/x}\n";
        let err = Profile::parse("p", yaml, Encoding::Yaml).unwrap_err();
        assert_eq!(schema_field(err), "items[0].target.value");
    }

    #[test]
    fn relative_profile_target_is_rejected() {
        let err = Profile::parse("p", "target: home\n", Encoding::Yaml).unwrap_err();
        assert_eq!(schema_field(err), "target");
    }

    #[test]
    fn duplicate_var_key_is_rejected() {
        let yaml = "vars:\n  - {key: A, value: '1'}\n  - {key: A, value: '2'}\n";
        let err = Profile::parse("p", yaml, Encoding::Yaml).unwrap_err();
        assert_eq!(schema_field(err), "vars[1].key");
    }

    #[test]
    fn duplicate_item_var_key_is_rejected() {
        let yaml = "items:\n  - path: a\n    vars:\n      - {key: A, value: '1'}\n      - {key: A, value: '2'}\n";
        let err = Profile::parse("p", yaml, Encoding::Yaml).unwrap_err();
        assert_eq!(schema_field(err), "items[0].vars[1].key");
    }

    #[test]
    fn empty_hook_is_rejected() {
        let yaml = "post_hooks: ['echo ok', '  ']\n";
        let err = Profile::parse("p", yaml, Encoding::Yaml).unwrap_err();
        assert_eq!(schema_field(err), "post_hooks[1]");
    }

    #[test]
    fn permissions_are_parsed_as_octal() {
        let mut item = Item::new("a");
        item.permissions = Some("0600".into());
        assert_eq!(item.mode(), Some(0o600));
        item.permissions = Some("755".into());
        assert_eq!(item.mode(), Some(0o755));
    }

    #[test]
    fn invalid_permissions_are_rejected() {
        let yaml = "items:\n  - path: a\n    permissions: '0899'\n";
        let err = Profile::parse("p", yaml, Encoding::Yaml).unwrap_err();
        assert_eq!(schema_field(err), "items[0].permissions");
    }

    #[test]
    fn encoding_from_extension() {
        assert_eq!(Encoding::from_extension("json"), Some(Encoding::Json));
        assert_eq!(Encoding::from_extension("yml"), Some(Encoding::Yaml));
        assert_eq!(Encoding::from_extension("pfp"), Some(Encoding::Yaml));
        assert_eq!(Encoding::from_extension("toml"), None);
    }
}
