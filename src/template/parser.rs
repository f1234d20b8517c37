//! Recursive-descent parser turning tokens into a node tree.
use std::vec::IntoIter;

use super::lexer::{Condition, Token, TokenKind, VarRef};
use crate::error::TemplateError;

const UNTERMINATED: &str = "unterminated @if (missing @fi)";

/// A node of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node<'a> {
    /// Literal text.
    Text(&'a str),
    /// Escaped directive, emitted wrapped in `{{ }}`.
    Escaped(&'a str),
    /// Variable substitution.
    Var(VarRef<'a>),
    /// Conditional block.
    If(IfBlock<'a>),
}

/// `@if` / `@elif` branches plus an optional `@else`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfBlock<'a> {
    /// Conditional branches in source order.
    pub branches: Vec<(Condition<'a>, Vec<Node<'a>>)>,
    /// Body of `@else`, if present.
    pub otherwise: Option<Vec<Node<'a>>>,
}

/// Parse a token stream.
///
/// # Errors
///
/// Returns [`TemplateError::Syntax`] for unterminated `@if` blocks and for
/// `@elif`/`@else`/`@fi` without a matching `@if`.
pub fn parse(tokens: Vec<Token<'_>>) -> Result<Vec<Node<'_>>, TemplateError> {
    let mut parser = Parser {
        tokens: tokens.into_iter(),
    };
    let (nodes, terminator) = parser.parse_nodes()?;
    match terminator {
        None => Ok(nodes),
        Some(token) => Err(syntax(
            token.offset,
            format!("{} without matching @if", describe(&token.kind)),
        )),
    }
}

struct Parser<'a> {
    tokens: IntoIter<Token<'a>>,
}

impl<'a> Parser<'a> {
    /// Collect nodes until a branch terminator or the end of input.
    fn parse_nodes(&mut self) -> Result<(Vec<Node<'a>>, Option<Token<'a>>), TemplateError> {
        let mut nodes = Vec::new();
        while let Some(token) = self.tokens.next() {
            match token.kind {
                TokenKind::Text(text) => nodes.push(Node::Text(text)),
                TokenKind::Escaped(inner) => nodes.push(Node::Escaped(inner)),
                TokenKind::Var(var) => nodes.push(Node::Var(var)),
                TokenKind::Comment => {}
                TokenKind::If(condition) => {
                    nodes.push(Node::If(self.parse_if(condition, token.offset)?));
                }
                TokenKind::Elif(_) | TokenKind::Else | TokenKind::Fi => {
                    return Ok((nodes, Some(token)));
                }
            }
        }
        Ok((nodes, None))
    }

    fn parse_if(
        &mut self,
        condition: Condition<'a>,
        offset: usize,
    ) -> Result<IfBlock<'a>, TemplateError> {
        let mut block = IfBlock {
            branches: Vec::new(),
            otherwise: None,
        };
        let mut condition = condition;

        loop {
            let (body, terminator) = self.parse_nodes()?;
            block.branches.push((condition, body));
            let token = terminator.ok_or_else(|| syntax(offset, UNTERMINATED))?;

            match token.kind {
                TokenKind::Fi => return Ok(block),
                TokenKind::Elif(next) => condition = next,
                TokenKind::Else => {
                    let (body, terminator) = self.parse_nodes()?;
                    block.otherwise = Some(body);
                    return match terminator {
                        Some(Token {
                            kind: TokenKind::Fi,
                            ..
                        }) => Ok(block),
                        Some(other) => Err(syntax(
                            other.offset,
                            format!("{} after @else", describe(&other.kind)),
                        )),
                        None => Err(syntax(offset, UNTERMINATED)),
                    };
                }
                other => {
                    return Err(syntax(
                        token.offset,
                        format!("unexpected {} in @if block", describe(&other)),
                    ));
                }
            }
        }
    }
}

fn describe(kind: &TokenKind<'_>) -> &'static str {
    match kind {
        TokenKind::If(_) => "@if",
        TokenKind::Elif(_) => "@elif",
        TokenKind::Else => "@else",
        TokenKind::Fi => "@fi",
        TokenKind::Text(_) | TokenKind::Escaped(_) | TokenKind::Var(_) | TokenKind::Comment => {
            "text"
        }
    }
}

fn syntax(offset: usize, message: impl Into<String>) -> TemplateError {
    TemplateError::Syntax {
        file: None,
        offset,
        message: message.into(),
    }
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
    use crate::template::lexer::tokenize;

    fn parse_str(source: &str) -> Result<Vec<Node<'_>>, TemplateError> {
        parse(tokenize(source)?)
    }

    #[test]
    fn flat_text_and_vars() {
        let nodes = parse_str("a{{X}}b").unwrap();
        assert_eq!(nodes.len(), 3);
        assert!(matches!(nodes[1], Node::Var(_)));
    }

    #[test]
    fn if_elif_else_branches() {
        let nodes =
            parse_str(r#"{{@if {{A}} == "1"}}one{{@elif {{A}} == "2"}}two{{@else}}other{{@fi}}"#)
                .unwrap();
        let [Node::If(block)] = nodes.as_slice() else {
            panic!("expected a single if block, got {nodes:?}");
        };
        assert_eq!(block.branches.len(), 2);
        assert_eq!(block.branches[1].1, vec![Node::Text("two")]);
        assert_eq!(block.otherwise, Some(vec![Node::Text("other")]));
    }

    #[test]
    fn nested_if_blocks() {
        let nodes = parse_str(
            r#"{{@if {{A}} == "1"}}{{@if {{B}} == "2"}}inner{{@fi}}{{@fi}}"#,
        )
        .unwrap();
        let [Node::If(outer)] = nodes.as_slice() else {
            panic!("expected outer block");
        };
        assert!(matches!(outer.branches[0].1.as_slice(), [Node::If(_)]));
    }

    #[test]
    fn comments_are_dropped() {
        let nodes = parse_str("a{{!-- hidden --}}b").unwrap();
        assert_eq!(nodes, vec![Node::Text("a"), Node::Text("b")]);
    }

    #[test]
    fn unterminated_if_reports_offset_of_if() {
        let err = parse_str(r#"text {{@if {{A}} == "1"}}body"#).unwrap_err();
        assert!(
            matches!(&err, TemplateError::Syntax { offset: 5, message, .. } if message.contains("unterminated")),
            "got {err:?}"
        );
    }

    #[test]
    fn unterminated_else_is_error() {
        assert!(parse_str(r#"{{@if {{A}} == "1"}}a{{@else}}b"#).is_err());
    }

    #[test]
    fn stray_fi_is_error() {
        let err = parse_str("a{{@fi}}").unwrap_err();
        assert!(err.to_string().contains("@fi without matching @if"));
    }

    #[test]
    fn elif_after_else_is_error() {
        let err =
            parse_str(r#"{{@if {{A}} == "1"}}a{{@else}}b{{@elif {{A}} == "2"}}c{{@fi}}"#)
                .unwrap_err();
        assert!(err.to_string().contains("@elif after @else"));
    }

    #[test]
    fn double_else_is_error() {
        assert!(parse_str(r#"{{@if {{A}} == "1"}}a{{@else}}b{{@else}}c{{@fi}}"#).is_err());
    }
}
