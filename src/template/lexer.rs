//! Splits template source into text runs and `{{ ... }}` directives.
//!
//! Recognised directives:
//!
//! ```text
//! {{KEY}} {{$KEY}} {{#&KEY}}         variable reference with optional prefixes
//! {{@if {{KEY}} == "value"}}         conditional (also `!=`)
//! {{@elif {{KEY}} != "value"}}
//! {{@else}}
//! {{@fi}}
//! {{!-- comment --}}                 dropped from the output
//! {{{ literal }}}                    emitted as `{{ literal }}`
//! ```
//!
//! Block directives and comments that share their line only with whitespace
//! and other block directives swallow the whole line, including its line
//! break, so they leave no blank lines behind.
use crate::config::document::is_key_char;
use crate::error::TemplateError;
use crate::scope::Selector;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";
const ESCAPE_OPEN: &str = "{{{";
const ESCAPE_CLOSE: &str = "}}}";
const COMMENT_OPEN: &str = "{{!--";
const COMMENT_CLOSE: &str = "--}}";

/// A variable reference such as `$#HOME`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarRef<'a> {
    /// Layers to look the key up in.
    pub selector: Selector,
    /// Variable name.
    pub key: &'a str,
}

impl VarRef<'_> {
    /// The reference as written, prefixes included.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}{}", self.selector, self.key)
    }
}

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

/// `{{KEY}} == "literal"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition<'a> {
    /// Left-hand variable.
    pub var: VarRef<'a>,
    /// Operator.
    pub op: CompareOp,
    /// Right-hand literal, without quotes.
    pub literal: &'a str,
}

/// Token kinds produced by [`tokenize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind<'a> {
    /// Plain text copied to the output.
    Text(&'a str),
    /// Content of a `{{{ ... }}}` escape.
    Escaped(&'a str),
    /// Variable substitution.
    Var(VarRef<'a>),
    /// `{{@if ...}}`
    If(Condition<'a>),
    /// `{{@elif ...}}`
    Elif(Condition<'a>),
    /// `{{@else}}`
    Else,
    /// `{{@fi}}`
    Fi,
    /// `{{!-- ... --}}`
    Comment,
}

/// A token and the byte offset of its directive in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    /// What was found.
    pub kind: TokenKind<'a>,
    /// Byte offset of the opening `{{` (or of the text run).
    pub offset: usize,
}

struct Span<'a> {
    start: usize,
    end: usize,
    offset: usize,
    kind: TokenKind<'a>,
}

/// Tokenize `source`.
///
/// # Errors
///
/// Returns [`TemplateError::Syntax`] for unclosed or malformed directives.
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, TemplateError> {
    let mut spans: Vec<Span<'_>> = Vec::new();
    let mut pos = 0;

    while let Some(rel) = source.get(pos..).and_then(|rest| rest.find(OPEN)) {
        let start = pos + rel;
        let (kind, end) = lex_directive(source, start)?;
        let (start, end) = if is_block(&kind) {
            standalone_line(source, start, end, &spans)
        } else {
            (start, end)
        };
        spans.push(Span {
            start,
            end,
            offset: pos + rel,
            kind,
        });
        pos = end;
    }

    let mut tokens = Vec::with_capacity(spans.len() * 2 + 1);
    let mut cursor = 0;
    for span in spans {
        if let Some(text) = source.get(cursor..span.start)
            && !text.is_empty()
        {
            tokens.push(Token {
                kind: TokenKind::Text(text),
                offset: cursor,
            });
        }
        tokens.push(Token {
            kind: span.kind,
            offset: span.offset,
        });
        cursor = span.end;
    }
    if let Some(text) = source.get(cursor..)
        && !text.is_empty()
    {
        tokens.push(Token {
            kind: TokenKind::Text(text),
            offset: cursor,
        });
    }

    Ok(tokens)
}

const fn is_block(kind: &TokenKind<'_>) -> bool {
    matches!(
        kind,
        TokenKind::If(_) | TokenKind::Elif(_) | TokenKind::Else | TokenKind::Fi | TokenKind::Comment
    )
}

/// Widen `start..end` to the whole line if nothing but whitespace and
/// other block directives is on it.
///
/// `earlier` holds the spans lexed so far; the widened range never overlaps
/// them.
fn standalone_line(source: &str, start: usize, end: usize, earlier: &[Span<'_>]) -> (usize, usize) {
    let line_start = source
        .get(..start)
        .and_then(|head| head.rfind('\n'))
        .map_or(0, |i| i + 1);

    let mut cursor = line_start;
    for span in earlier.iter().filter(|s| s.end > line_start) {
        if !is_block(&span.kind) || !is_blank(source.get(cursor..span.start.max(cursor))) {
            return (start, end);
        }
        cursor = span.end;
    }
    if !is_blank(source.get(cursor..start)) {
        return (start, end);
    }

    let rest = source.get(end..).unwrap_or_default();
    let newline = rest.find('\n');
    let tail = newline.map_or(Some(rest), |i| rest.get(..i));
    if !is_blank(tail.map(|t| t.trim_end_matches('\r'))) {
        return (start, end);
    }

    (cursor.min(start), end + newline.map_or(rest.len(), |i| i + 1))
}

fn is_blank(text: Option<&str>) -> bool {
    text.is_some_and(|t| t.chars().all(|c| c == ' ' || c == '\t'))
}

fn syntax(offset: usize, message: impl Into<String>) -> TemplateError {
    TemplateError::Syntax {
        file: None,
        offset,
        message: message.into(),
    }
}

/// Lex the directive opening at `start`; returns its kind and end offset.
fn lex_directive(source: &str, start: usize) -> Result<(TokenKind<'_>, usize), TemplateError> {
    let rest = rest_at(source, start);

    if rest.starts_with(ESCAPE_OPEN) {
        let body = start + ESCAPE_OPEN.len();
        let close = find_from(source, body, ESCAPE_CLOSE)
            .ok_or_else(|| syntax(start, "unclosed `{{{` escape"))?;
        let inner = slice(source, body, close, start)?;
        return Ok((TokenKind::Escaped(inner), close + ESCAPE_CLOSE.len()));
    }

    if rest.starts_with(COMMENT_OPEN) {
        let close = find_from(source, start + COMMENT_OPEN.len(), COMMENT_CLOSE)
            .ok_or_else(|| syntax(start, "unclosed comment"))?;
        return Ok((TokenKind::Comment, close + COMMENT_CLOSE.len()));
    }

    let body = skip_ws(source, start + OPEN.len());
    if rest_at(source, body).starts_with('@') {
        return lex_block(source, start, body + 1);
    }

    let close =
        find_from(source, start + OPEN.len(), CLOSE).ok_or_else(|| syntax(start, "unclosed `{{`"))?;
    let var = parse_var(slice(source, start + OPEN.len(), close, start)?, start)?;
    Ok((TokenKind::Var(var), close + CLOSE.len()))
}

/// Lex `@if`, `@elif`, `@else` or `@fi`; `pos` points after the `@`.
fn lex_block(source: &str, start: usize, pos: usize) -> Result<(TokenKind<'_>, usize), TemplateError> {
    let rest = rest_at(source, pos);
    let keyword_len = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    let keyword = slice(source, pos, pos + keyword_len, start)?;
    let after = pos + keyword_len;

    let (kind, pos) = match keyword {
        "if" => {
            let (cond, p) = parse_condition(source, after, start)?;
            (TokenKind::If(cond), p)
        }
        "elif" => {
            let (cond, p) = parse_condition(source, after, start)?;
            (TokenKind::Elif(cond), p)
        }
        "else" => (TokenKind::Else, after),
        "fi" => (TokenKind::Fi, after),
        other => return Err(syntax(start, format!("unknown directive `@{other}`"))),
    };

    let pos = skip_ws(source, pos);
    if !rest_at(source, pos).starts_with(CLOSE) {
        return Err(syntax(start, format!("expected `}}}}` to close `@{keyword}`")));
    }
    Ok((kind, pos + CLOSE.len()))
}

/// Parse `{{KEY}} == "literal"` starting at `pos`.
fn parse_condition(
    source: &str,
    pos: usize,
    start: usize,
) -> Result<(Condition<'_>, usize), TemplateError> {
    let pos = skip_ws(source, pos);
    if !rest_at(source, pos).starts_with(OPEN) {
        return Err(syntax(start, "condition must start with a `{{KEY}}` reference"));
    }
    let close = find_from(source, pos + OPEN.len(), CLOSE)
        .ok_or_else(|| syntax(start, "unclosed variable in condition"))?;
    let var = parse_var(slice(source, pos + OPEN.len(), close, start)?, start)?;

    let pos = skip_ws(source, close + CLOSE.len());
    let op = match rest_at(source, pos) {
        r if r.starts_with("==") => CompareOp::Eq,
        r if r.starts_with("!=") => CompareOp::Ne,
        _ => return Err(syntax(start, "expected `==` or `!=` in condition")),
    };

    let pos = skip_ws(source, pos + 2);
    if !rest_at(source, pos).starts_with('"') {
        return Err(syntax(start, "expected a double-quoted literal in condition"));
    }
    let close_quote = find_from(source, pos + 1, "\"")
        .ok_or_else(|| syntax(start, "unterminated string literal in condition"))?;

    Ok((
        Condition {
            var,
            op,
            literal: slice(source, pos + 1, close_quote, start)?,
        },
        close_quote + 1,
    ))
}

/// `source[pos..]`, or `""` past the end.
fn rest_at(source: &str, pos: usize) -> &str {
    source.get(pos..).unwrap_or_default()
}

/// `source[from..to]`, reported against the directive at `start` if the
/// range is not valid.
fn slice(source: &str, from: usize, to: usize, start: usize) -> Result<&str, TemplateError> {
    source
        .get(from..to)
        .ok_or_else(|| syntax(start, "malformed directive"))
}

fn parse_var(inner: &str, start: usize) -> Result<VarRef<'_>, TemplateError> {
    let inner = inner.trim();
    let prefix_len = inner
        .find(|c: char| !matches!(c, '$' | '#' | '&'))
        .unwrap_or(inner.len());
    let (prefixes, key) = inner.split_at(prefix_len);

    if key.is_empty() || !key.chars().all(is_key_char) {
        return Err(syntax(start, format!("invalid variable reference `{inner}`")));
    }
    let selector = Selector::from_prefixes(prefixes)
        .ok_or_else(|| syntax(start, format!("invalid prefix in `{inner}`")))?;
    Ok(VarRef { selector, key })
}

fn find_from(source: &str, from: usize, needle: &str) -> Option<usize> {
    source.get(from..)?.find(needle).map(|i| from + i)
}

fn skip_ws(source: &str, pos: usize) -> usize {
    source
        .get(pos..)
        .and_then(|rest| rest.find(|c: char| c != ' ' && c != '\t'))
        .map_or(source.len(), |i| pos + i)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind<'_>> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn var(prefixes: &str, key: &'static str) -> VarRef<'static> {
        VarRef {
            selector: Selector::from_prefixes(prefixes).unwrap(),
            key,
        }
    }

    #[test]
    fn plain_text_is_one_token() {
        assert_eq!(kinds("no directives\n"), vec![TokenKind::Text("no directives\n")]);
        assert!(tokenize("").unwrap().is_empty());
    }

    #[test]
    fn variable_with_prefixes_and_whitespace() {
        assert_eq!(
            kinds("a{{ $#HOME }}b"),
            vec![
                TokenKind::Text("a"),
                TokenKind::Var(var("$#", "HOME")),
                TokenKind::Text("b"),
            ]
        );
    }

    #[test]
    fn inline_conditional() {
        let tokens = kinds(r#"{{@if {{OS}} == "windows"}}W{{@else}}N{{@fi}}"#);
        assert_eq!(
            tokens,
            vec![
                TokenKind::If(Condition {
                    var: var("", "OS"),
                    op: CompareOp::Eq,
                    literal: "windows",
                }),
                TokenKind::Text("W"),
                TokenKind::Else,
                TokenKind::Text("N"),
                TokenKind::Fi,
            ]
        );
    }

    #[test]
    fn not_equal_condition() {
        let tokens = kinds(r#"{{@elif {{&SHELL}} != "zsh" }}"#);
        assert_eq!(
            tokens,
            vec![TokenKind::Elif(Condition {
                var: var("&", "SHELL"),
                op: CompareOp::Ne,
                literal: "zsh",
            })]
        );
    }

    #[test]
    fn standalone_block_lines_are_removed() {
        let source = "a\n  {{@if {{X}} == \"1\"}}\nb\n{{@fi}}\nc\n";
        let tokens = kinds(source);
        assert_eq!(tokens[0], TokenKind::Text("a\n"));
        assert!(matches!(tokens[1], TokenKind::If(_)));
        assert_eq!(tokens[2], TokenKind::Text("b\n"));
        assert_eq!(tokens[3], TokenKind::Fi);
        assert_eq!(tokens[4], TokenKind::Text("c\n"));
    }

    #[test]
    fn standalone_line_handles_crlf() {
        let tokens = kinds("{{!-- note --}}\r\nbody\r\n");
        assert_eq!(tokens, vec![TokenKind::Comment, TokenKind::Text("body\r\n")]);
    }

    #[test]
    fn variables_never_swallow_lines() {
        let tokens = kinds("{{A}}\nb");
        assert_eq!(tokens, vec![TokenKind::Var(var("", "A")), TokenKind::Text("\nb")]);
    }

    #[test]
    fn comment_after_variable_keeps_line_break() {
        let tokens = kinds("{{A}}{{!-- note --}}\nb");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Var(var("", "A")),
                TokenKind::Comment,
                TokenKind::Text("\nb"),
            ]
        );
    }

    #[test]
    fn line_of_only_block_directives_is_removed() {
        let tokens = kinds("{{@if {{X}} == \"1\"}}{{@fi}}\nb");
        assert!(matches!(tokens[0], TokenKind::If(_)));
        assert_eq!(tokens[1..], [TokenKind::Fi, TokenKind::Text("b")]);
    }

    #[test]
    fn escape_keeps_braces() {
        assert_eq!(
            kinds("x {{{ not.a.var }}} y"),
            vec![
                TokenKind::Text("x "),
                TokenKind::Escaped(" not.a.var "),
                TokenKind::Text(" y"),
            ]
        );
    }

    #[test]
    fn offsets_point_at_directive() {
        let tokens = tokenize("abc{{X}}").unwrap();
        assert_eq!(tokens[1].offset, 3);
    }

    #[test]
    fn unclosed_variable_is_syntax_error() {
        let err = tokenize("hello {{NAME").unwrap_err();
        assert!(matches!(err, TemplateError::Syntax { offset: 6, .. }), "got {err:?}");
    }

    #[test]
    fn unknown_directive_is_syntax_error() {
        let err = tokenize("{{@for x}}").unwrap_err();
        assert!(err.to_string().contains("unknown directive `@for`"));
    }

    #[test]
    fn malformed_conditions_are_syntax_errors() {
        for source in [
            "{{@if OS == \"x\"}}",
            "{{@if {{OS}} = \"x\"}}",
            "{{@if {{OS}} == x}}",
            "{{@if {{OS}} == \"x}}",
            "{{@else extra}}",
        ] {
            assert!(
                matches!(tokenize(source), Err(TemplateError::Syntax { .. })),
                "{source} should fail"
            );
        }
    }

    #[test]
    fn invalid_key_is_syntax_error() {
        assert!(matches!(tokenize("{{}}"), Err(TemplateError::Syntax { .. })));
        assert!(matches!(tokenize("{{a b}}"), Err(TemplateError::Syntax { .. })));
        assert!(matches!(tokenize("{{$}}"), Err(TemplateError::Syntax { .. })));
    }

    #[test]
    fn var_ref_name_includes_prefixes() {
        assert_eq!(var("$", "HOME").name(), "$HOME");
        assert_eq!(var("", "OS").name(), "OS");
    }
}
