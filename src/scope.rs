//! Layered variable lookup for templates.
//!
//! Three layers are available to a template: the process environment, the
//! resolved profile variables and the variables of the item being rendered.
//! A reference's prefix picks which layers are consulted and in which order:
//!
//! | Prefix | Layers                                   |
//! |--------|------------------------------------------|
//! | none   | item, then profile, then environment     |
//! | `$`    | environment                              |
//! | `#`    | profile                                  |
//! | `&`    | item                                     |
//!
//! Prefixes combine (`{{$#HOME}}` looks in the environment, then the
//! profile) in the order they are written.
use std::collections::BTreeMap;
use std::fmt;

use crate::config::{ResolvedProfile, Variable};

/// One source of variable values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Snapshot of the process environment.
    Environment,
    /// Variables from the resolved profile chain.
    Profile,
    /// Variables declared on the item.
    Item,
}

impl Layer {
    /// Prefix character selecting this layer.
    #[must_use]
    pub const fn prefix(self) -> char {
        match self {
            Self::Environment => '$',
            Self::Profile => '#',
            Self::Item => '&',
        }
    }

    /// Layer selected by a prefix character.
    #[must_use]
    pub const fn from_prefix(c: char) -> Option<Self> {
        match c {
            '$' => Some(Self::Environment),
            '#' => Some(Self::Profile),
            '&' => Some(Self::Item),
            _ => None,
        }
    }
}

/// Ordered list of layers a reference is looked up in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    layers: Vec<Layer>,
    explicit: bool,
}

impl Default for Selector {
    fn default() -> Self {
        Self {
            layers: vec![Layer::Item, Layer::Profile, Layer::Environment],
            explicit: false,
        }
    }
}

impl Selector {
    /// Build a selector from prefix characters (`"$"`, `"#&"`, ...).
    ///
    /// An empty prefix yields the default lookup order. Repeated characters
    /// are ignored after their first occurrence.
    ///
    /// Returns `None` if a character is not a known prefix.
    #[must_use]
    pub fn from_prefixes(prefixes: &str) -> Option<Self> {
        if prefixes.is_empty() {
            return Some(Self::default());
        }
        let mut layers = Vec::with_capacity(3);
        for c in prefixes.chars() {
            let layer = Layer::from_prefix(c)?;
            if !layers.contains(&layer) {
                layers.push(layer);
            }
        }
        Some(Self {
            layers,
            explicit: true,
        })
    }

    /// Layers in lookup order.
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }
}

impl fmt::Display for Selector {
    /// Writes the prefix characters as they would appear in a template.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.explicit {
            for layer in &self.layers {
                write!(f, "{}", layer.prefix())?;
            }
        }
        Ok(())
    }
}

/// Snapshot of environment variables taken once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Capture the current process environment.
    ///
    /// Variables whose name or value is not valid Unicode are skipped.
    #[must_use]
    pub fn capture() -> Self {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    /// Add or replace a variable.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Look up a variable.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Variables visible while rendering one item.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    environment: &'a Environment,
    profile: &'a [Variable],
    item: &'a [Variable],
}

impl<'a> Scope<'a> {
    /// Build the scope for an item of `profile`.
    #[must_use]
    pub fn new(environment: &'a Environment, profile: &'a [Variable], item: &'a [Variable]) -> Self {
        Self {
            environment,
            profile,
            item,
        }
    }

    /// Build the scope for `item_vars` rendered as part of `profile`.
    #[must_use]
    pub fn for_item(
        profile: &'a ResolvedProfile,
        item_vars: &'a [Variable],
        environment: &'a Environment,
    ) -> Self {
        Self::new(environment, &profile.vars, item_vars)
    }

    /// Find `key` in the layers chosen by `selector`.
    #[must_use]
    pub fn lookup(&self, key: &str, selector: &Selector) -> Option<&'a str> {
        selector.layers().iter().find_map(|layer| match layer {
            Layer::Environment => self.environment.get(key),
            Layer::Profile => find(self.profile, key),
            Layer::Item => find(self.item, key),
        })
    }
}

fn find<'v>(vars: &'v [Variable], key: &str) -> Option<&'v str> {
    vars.iter().find(|v| v.key == key).map(|v| v.value.as_str())
}
