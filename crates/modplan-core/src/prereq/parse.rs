//! Parsing raw catalog rules into [`PrerequisiteRule`]s.
//!
//! Accepted shapes:
//! - absent / empty: no prerequisite;
//! - a structured value: string leaf, array (all of), `{ "and": [...] }`,
//!   `{ "or": [...] }`, `{ "nOf": [n, [...]] }` when `n` is 1 or the full
//!   count;
//! - free text over codes with `and`/`or` (also `&` `,` `+` and `|` `/`)
//!   and parentheses.
//!
//! Anything else becomes [`PrerequisiteRule::Unparsed`] holding the original
//! text. Parsing never fails.

use serde_json::Value;

use super::{PrereqTree, PrerequisiteRule};
use crate::code::{looks_like_code, normalize, strip_qualifier};

/// Marker for input that cannot be turned into a tree.
#[derive(Debug)]
struct Malformed;

/// Parse a raw catalog rule.
pub fn parse(raw: Option<&Value>) -> PrerequisiteRule {
    let Some(value) = raw else {
        return PrerequisiteRule::None;
    };

    match value {
        Value::Null => PrerequisiteRule::None,
        Value::String(text) => parse_text(text),
        other => match tree_from_value(other) {
            Ok(Some(tree)) => PrerequisiteRule::from_tree(tree),
            Ok(None) => PrerequisiteRule::None,
            Err(Malformed) => {
                tracing::warn!(rule = %other, "unparseable structured prerequisite, failing open");
                PrerequisiteRule::Unparsed(other.to_string())
            }
        },
    }
}

/// Parse a free-text rule such as `CS1101S and (CS1231S or MA1100)`.
pub fn parse_text(text: &str) -> PrerequisiteRule {
    if text.trim().is_empty() {
        return PrerequisiteRule::None;
    }

    match tokenize(text).and_then(|tokens| Parser::new(tokens).parse_all()) {
        Ok(tree) => PrerequisiteRule::from_tree(tree),
        Err(Malformed) => {
            tracing::warn!(rule = text, "unparseable prerequisite text, failing open");
            PrerequisiteRule::Unparsed(text.trim().to_owned())
        }
    }
}

fn tree_from_value(value: &Value) -> Result<Option<PrereqTree>, Malformed> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => match parse_text(text) {
            PrerequisiteRule::None => Ok(None),
            PrerequisiteRule::Tree(tree) => Ok(Some(tree)),
            PrerequisiteRule::Unparsed(_) => Err(Malformed),
        },
        Value::Array(items) => Ok(Some(PrereqTree::All(children(items)?))),
        Value::Object(map) => {
            if map.len() != 1 {
                return Err(Malformed);
            }
            if let Some(items) = map.get("and") {
                return Ok(Some(PrereqTree::All(children(as_array(items)?)?)));
            }
            if let Some(items) = map.get("or") {
                return Ok(Some(PrereqTree::Any(children(as_array(items)?)?)));
            }
            if let Some(group) = map.get("nOf") {
                return n_of(group);
            }
            Err(Malformed)
        }
        _ => Err(Malformed),
    }
}

fn as_array(value: &Value) -> Result<&Vec<Value>, Malformed> {
    value.as_array().ok_or(Malformed)
}

fn children(items: &[Value]) -> Result<Vec<PrereqTree>, Malformed> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        if let Some(tree) = tree_from_value(item)? {
            out.push(tree);
        }
    }
    Ok(out)
}

/// `{"nOf": [n, [...]]}` is expressible only as "any" (n = 1) or "all"
/// (n = number of options).
fn n_of(group: &Value) -> Result<Option<PrereqTree>, Malformed> {
    let parts = as_array(group)?;
    let [count, options] = parts.as_slice() else {
        return Err(Malformed);
    };
    let count = count.as_u64().ok_or(Malformed)?;
    let options = children(as_array(options)?)?;
    match count {
        0 => Ok(None),
        1 => Ok(Some(PrereqTree::Any(options))),
        n if usize::try_from(n).ok() == Some(options.len()) => Ok(Some(PrereqTree::All(options))),
        _ => Err(Malformed),
    }
}

// ---------------------------------------------------------------------------
// Free-text tokenizer and recursive-descent parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Code(String),
    And,
    Or,
    Open,
    Close,
}

fn tokenize(text: &str) -> Result<Vec<Token>, Malformed> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '&' | ',' | '+' => {
                chars.next();
                tokens.push(Token::And);
            }
            '|' | '/' => {
                chars.next();
                tokens.push(Token::Or);
            }
            c if c.is_ascii_alphanumeric() => {
                let mut word = String::new();
                while let Some(&w) = chars.peek() {
                    if w.is_ascii_alphanumeric() || w == '%' || w == ':' {
                        word.push(w);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(word_token(&word)?);
            }
            _ => return Err(Malformed),
        }
    }

    Ok(tokens)
}

fn word_token(word: &str) -> Result<Token, Malformed> {
    match word.to_ascii_lowercase().as_str() {
        "and" => return Ok(Token::And),
        "or" => return Ok(Token::Or),
        _ => {}
    }

    let core = strip_qualifier(word);
    let is_leaf = match core.strip_suffix('%') {
        Some(prefix) => {
            prefix.len() >= 2
                && prefix.starts_with(|c: char| c.is_ascii_alphabetic())
                && prefix.chars().all(|c| c.is_ascii_alphanumeric())
        }
        None => looks_like_code(core),
    };

    if is_leaf {
        Ok(Token::Code(normalize(core)))
    } else {
        Err(Malformed)
    }
}

/// Grammar (`and` binds tighter than `or`):
///
/// ```text
/// expr   := term ( OR term )*
/// term   := factor ( AND factor )*
/// factor := CODE | '(' expr ')'
/// ```
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn parse_all(mut self) -> Result<PrereqTree, Malformed> {
        let tree = self.expr()?;
        if self.pos != self.tokens.len() {
            return Err(Malformed);
        }
        Ok(tree)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<PrereqTree, Malformed> {
        let mut terms = vec![self.term()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            terms.push(self.term()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            PrereqTree::Any(terms)
        })
    }

    fn term(&mut self) -> Result<PrereqTree, Malformed> {
        let mut factors = vec![self.factor()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            factors.push(self.factor()?);
        }
        Ok(if factors.len() == 1 {
            factors.remove(0)
        } else {
            PrereqTree::All(factors)
        })
    }

    fn factor(&mut self) -> Result<PrereqTree, Malformed> {
        match self.next() {
            Some(Token::Code(code)) => Ok(PrereqTree::Leaf(code)),
            Some(Token::Open) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err(Malformed),
                }
            }
            _ => Err(Malformed),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn leaf(code: &str) -> PrereqTree {
        PrereqTree::Leaf(code.to_owned())
    }

    #[test]
    fn absent_and_empty_rules_are_none() {
        assert_eq!(parse(None), PrerequisiteRule::None);
        assert_eq!(parse(Some(&Value::Null)), PrerequisiteRule::None);
        assert_eq!(parse_text("   "), PrerequisiteRule::None);
    }

    #[test]
    fn single_code_text() {
        assert_eq!(
            parse_text("cs1101s"),
            PrerequisiteRule::Tree(leaf("CS1101S"))
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let rule = parse_text("CS1010 or CS1101S and CS1231S");
        assert_eq!(
            rule,
            PrerequisiteRule::Tree(PrereqTree::Any(vec![
                leaf("CS1010"),
                PrereqTree::All(vec![leaf("CS1101S"), leaf("CS1231S")]),
            ]))
        );
    }

    #[test]
    fn parentheses_and_symbol_operators() {
        let rule = parse_text("(CS2030S & CS2040S) | CS2103");
        assert_eq!(
            rule,
            PrerequisiteRule::Tree(PrereqTree::Any(vec![
                PrereqTree::All(vec![leaf("CS2030S"), leaf("CS2040S")]),
                leaf("CS2103"),
            ]))
        );
    }

    #[test]
    fn slash_means_or_and_grades_are_dropped() {
        let rule = parse_text("CS1231:D/CS1231S:D");
        assert_eq!(
            rule,
            PrerequisiteRule::Tree(PrereqTree::Any(vec![leaf("CS1231"), leaf("CS1231S")]))
        );
    }

    #[test]
    fn wildcard_leaves_are_kept() {
        assert_eq!(parse_text("MA15%"), PrerequisiteRule::Tree(leaf("MA15%")));
    }

    #[test]
    fn prose_degrades_to_unparsed() {
        let text = "Must have completed 1 of CS1231/CS1231S at a grade of at least D";
        assert_eq!(
            parse_text(text),
            PrerequisiteRule::Unparsed(text.to_owned())
        );
    }

    #[test]
    fn unbalanced_parentheses_degrade_to_unparsed() {
        assert!(matches!(
            parse_text("(CS1101S and CS1231S"),
            PrerequisiteRule::Unparsed(_)
        ));
        assert!(matches!(
            parse_text("CS1101S CS1231S"),
            PrerequisiteRule::Unparsed(_)
        ));
    }

    #[test]
    fn structured_and_or_tree() {
        let raw = json!({"and": ["CS1101S", {"or": ["CS1231S:D", "MA1100"]}]});
        assert_eq!(
            parse(Some(&raw)),
            PrerequisiteRule::Tree(PrereqTree::All(vec![
                leaf("CS1101S"),
                PrereqTree::Any(vec![leaf("CS1231S"), leaf("MA1100")]),
            ]))
        );
    }

    #[test]
    fn structured_array_is_all_of() {
        let raw = json!(["CS2030S", "CS2040S"]);
        assert_eq!(
            parse(Some(&raw)),
            PrerequisiteRule::Tree(PrereqTree::All(vec![leaf("CS2030S"), leaf("CS2040S")]))
        );
    }

    #[test]
    fn n_of_one_is_any() {
        let raw = json!({"nOf": [1, ["MA1521", "MA1102R"]]});
        assert_eq!(
            parse(Some(&raw)),
            PrerequisiteRule::Tree(PrereqTree::Any(vec![leaf("MA1521"), leaf("MA1102R")]))
        );
    }

    #[test]
    fn n_of_partial_count_is_unparsed() {
        let raw = json!({"nOf": [2, ["A1000", "B1000", "C1000"]]});
        assert!(matches!(parse(Some(&raw)), PrerequisiteRule::Unparsed(_)));
    }

    #[test]
    fn unknown_shape_is_unparsed_with_original_text() {
        let raw = json!({"xor": ["A1000"]});
        assert_eq!(
            parse(Some(&raw)),
            PrerequisiteRule::Unparsed(raw.to_string())
        );
    }

    #[test]
    fn empty_structured_groups_are_none() {
        assert_eq!(parse(Some(&json!({"and": []}))), PrerequisiteRule::None);
        assert_eq!(parse(Some(&json!([]))), PrerequisiteRule::None);
    }

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn failing_open_is_logged_as_warning() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(captured.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            parse_text("(CS1101S and CS1231S");
            parse(Some(&json!({"xor": ["A1000"]})));
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output.matches("WARN").count(), 2, "{output}");
        assert!(output.contains("unparseable prerequisite text, failing open"));
        assert!(output.contains("unparseable structured prerequisite, failing open"));
    }
}
