//! Template rendering: variable substitution and conditional blocks.
//!
//! Rendering is a pure function of the source text and a [`Scope`]. Missing
//! variables are collected rather than replaced with an empty string, and
//! [`RenderedTemplate::into_content`] turns them into an error so a
//! half-rendered dotfile is never written.
pub mod lexer;
pub mod parser;

use lexer::{CompareOp, Condition};
use parser::Node;

use crate::error::TemplateError;
use crate::scope::Scope;

/// A parsed template, ready to be rendered against any number of scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template<'a> {
    nodes: Vec<Node<'a>>,
}

/// Output of rendering a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedTemplate {
    /// Rendered text.
    pub content: String,
    /// Variable references without a value, in order of first use.
    pub unresolved: Vec<String>,
}

impl RenderedTemplate {
    /// Return the content if every variable resolved.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::UnresolvedVariable`] listing the missing
    /// references.
    pub fn into_content(self) -> Result<String, TemplateError> {
        if self.unresolved.is_empty() {
            Ok(self.content)
        } else {
            Err(TemplateError::UnresolvedVariable {
                file: None,
                names: self.unresolved,
            })
        }
    }
}

impl<'a> Template<'a> {
    /// Parse `source`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Syntax`] for malformed directives.
    pub fn parse(source: &'a str) -> Result<Self, TemplateError> {
        let tokens = lexer::tokenize(source)?;
        Ok(Self {
            nodes: parser::parse(tokens)?,
        })
    }

    /// Render against `scope`.
    ///
    /// References inside branches that are not selected are never looked up.
    #[must_use]
    pub fn render(&self, scope: &Scope<'_>) -> RenderedTemplate {
        let mut out = RenderedTemplate::default();
        render_nodes(&self.nodes, scope, &mut out);
        out
    }
}

/// Parse and render `source` in one step.
///
/// # Errors
///
/// Returns [`TemplateError::Syntax`] for malformed directives. Unresolved
/// variables are reported in [`RenderedTemplate::unresolved`].
pub fn render(source: &str, scope: &Scope<'_>) -> Result<RenderedTemplate, TemplateError> {
    Ok(Template::parse(source)?.render(scope))
}

fn render_nodes(nodes: &[Node<'_>], scope: &Scope<'_>, out: &mut RenderedTemplate) {
    for node in nodes {
        match node {
            Node::Text(text) => out.content.push_str(text),
            Node::Escaped(inner) => {
                out.content.push_str("{{");
                out.content.push_str(inner);
                out.content.push_str("}}");
            }
            Node::Var(var) => match scope.lookup(var.key, &var.selector) {
                Some(value) => out.content.push_str(value),
                None => record_unresolved(out, var.name()),
            },
            Node::If(block) => {
                let selected = block
                    .branches
                    .iter()
                    .find(|(condition, _)| evaluate(condition, scope, out))
                    .map(|(_, body)| body)
                    .or(block.otherwise.as_ref());
                if let Some(body) = selected {
                    render_nodes(body, scope, out);
                }
            }
        }
    }
}

/// Evaluate a condition; an unresolved variable counts as not matching.
fn evaluate(condition: &Condition<'_>, scope: &Scope<'_>, out: &mut RenderedTemplate) -> bool {
    let Some(value) = scope.lookup(condition.var.key, &condition.var.selector) else {
        record_unresolved(out, condition.var.name());
        return false;
    };
    match condition.op {
        CompareOp::Eq => value == condition.literal,
        CompareOp::Ne => value != condition.literal,
    }
}

fn record_unresolved(out: &mut RenderedTemplate, name: String) {
    if !out.unresolved.contains(&name) {
        out.unresolved.push(name);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::Variable;
    use crate::scope::Environment;

    struct Fixture {
        env: Environment,
        profile: Vec<Variable>,
        item: Vec<Variable>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                env: [("HOME", "/home/env"), ("SHELL", "/bin/zsh")].into_iter().collect(),
                profile: vec![Variable::new("OS", "linux"), Variable::new("HOME", "/home/p")],
                item: vec![Variable::new("NAME", "vimrc")],
            }
        }

        fn scope(&self) -> Scope<'_> {
            Scope::new(&self.env, &self.profile, &self.item)
        }

        fn render(&self, source: &str) -> RenderedTemplate {
            render(source, &self.scope()).unwrap()
        }
    }

    #[test]
    fn text_without_directives_is_unchanged() {
        let f = Fixture::new();
        let source = "plain text\n  with } and { braces\n";
        assert_eq!(f.render(source).content, source);
    }

    #[test]
    fn substitutes_variables() {
        let f = Fixture::new();
        assert_eq!(
            f.render("os={{OS}} home={{$HOME}} name={{&NAME}}").content,
            "os=linux home=/home/env name=vimrc"
        );
    }

    #[test]
    fn env_prefix_ignores_profile_and_item() {
        let f = Fixture::new();
        let out = f.render("{{$OS}}{{$NAME}}");
        assert_eq!(out.unresolved, vec!["$OS", "$NAME"]);
    }

    #[test]
    fn item_prefix_ignores_environment() {
        let f = Fixture::new();
        let out = f.render("{{&SHELL}}");
        assert_eq!(out.unresolved, vec!["&SHELL"]);
    }

    #[test]
    fn unresolved_names_are_deduplicated_and_fatal() {
        let f = Fixture::new();
        let out = f.render("{{X}} {{X}} {{Y}}");
        assert_eq!(out.unresolved, vec!["X", "Y"]);
        let err = out.into_content().unwrap_err();
        assert_eq!(err.to_string(), "unresolved variable(s) X, Y in <template>");
    }

    #[test]
    fn else_branch_selected() {
        let f = Fixture::new();
        let out = f.render(r#"{{@if {{OS}} == "windows"}}W{{@else}}N{{@fi}}"#);
        assert_eq!(out.into_content().unwrap(), "N");
    }

    #[test]
    fn elif_branch_selected() {
        let f = Fixture::new();
        let source = "{{@if {{OS}} == \"windows\"}}\nwin\n{{@elif {{OS}} == \"linux\"}}\nlinux\n{{@else}}\nother\n{{@fi}}\nend\n";
        assert_eq!(f.render(source).content, "linux\nend\n");
    }

    #[test]
    fn not_equal_condition() {
        let f = Fixture::new();
        let out = f.render(r#"{{@if {{$SHELL}} != "/bin/bash"}}not bash{{@fi}}"#);
        assert_eq!(out.content, "not bash");
    }

    #[test]
    fn no_branch_matches_without_else() {
        let f = Fixture::new();
        assert_eq!(f.render("a{{@if {{OS}} == \"x\"}}b{{@fi}}c").content, "ac");
    }

    #[test]
    fn unselected_branch_references_are_ignored() {
        let f = Fixture::new();
        let out = f.render(r#"{{@if {{OS}} == "linux"}}ok{{@else}}{{MISSING}}{{@fi}}"#);
        assert!(out.unresolved.is_empty());
        assert_eq!(out.content, "ok");
    }

    #[test]
    fn unresolved_condition_variable_is_reported() {
        let f = Fixture::new();
        let out = f.render(r#"{{@if {{GHOST}} == "x"}}a{{@else}}b{{@fi}}"#);
        assert_eq!(out.unresolved, vec!["GHOST"]);
    }

    #[test]
    fn nested_conditionals() {
        let f = Fixture::new();
        let source = concat!(
            "{{@if {{OS}} == \"linux\"}}\n",
            "  {{@if {{&NAME}} == \"vimrc\"}}\n",
            "set nu\n",
            "  {{@fi}}\n",
            "{{@fi}}\n",
        );
        assert_eq!(f.render(source).content, "set nu\n");
    }

    #[test]
    fn block_after_variable_keeps_line_break() {
        let f = Fixture::new();
        let out = f.render("{{@if {{OS}} == \"x\"}}A{{@else}}{{&NAME}}{{@fi}}\nnext\n");
        assert_eq!(out.into_content().unwrap(), "vimrc\nnext\n");
    }

    #[test]
    fn fi_after_substituted_text_keeps_line_break() {
        let f = Fixture::new();
        let out = f.render("{{@if {{OS}} == \"linux\"}}\nkey={{&NAME}}{{@fi}}\nnext\n");
        assert_eq!(out.into_content().unwrap(), "key=vimrc\nnext\n");
    }

    #[test]
    fn comments_and_escapes() {
        let f = Fixture::new();
        let out = f.render("{{!-- header --}}\nkeep {{{ OS }}} literal\n");
        assert_eq!(out.content, "keep {{ OS }} literal\n");
    }

    #[test]
    fn template_can_be_rendered_twice() {
        let f = Fixture::new();
        let template = Template::parse("{{OS}}").unwrap();
        let other_profile = vec![Variable::new("OS", "windows")];
        let other = Scope::new(&f.env, &other_profile, &f.item);
        assert_eq!(template.render(&f.scope()).content, "linux");
        assert_eq!(template.render(&other).content, "windows");
    }

    #[test]
    fn syntax_error_is_returned_before_rendering() {
        let f = Fixture::new();
        assert!(matches!(
            render(r#"{{@if {{OS}} == "x"}}never closed"#, &f.scope()),
            Err(TemplateError::Syntax { .. })
        ));
    }
}
