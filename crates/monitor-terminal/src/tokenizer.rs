//! Lexer for the Monitor command language.
//!
//! Rules are tried in a fixed order at each position and the first match
//! wins. Scanning stops at the first position no rule matches; the result
//! then reports how many characters were left over.

use monitor_types::error::MonitorError;
use monitor_types::token::{Token, TokenKind, TokenizationResult};

/// Delimiter of multi-line strings and multi-line captures.
pub const MULTILINE_TERMINATOR: &str = "\"\"\"";

enum Lexed {
    Token(Token, usize),
    Malformed(MonitorError),
}

type Rule = fn(&str) -> Option<Lexed>;

const RULES: &[Rule] = &[
    conditional_colon,
    comment,
    execution,
    variable,
    brace,
    multiline_string,
    multiline_terminator,
    string,
    range,
    path,
    hexadecimal,
    decimal,
    integer,
    boolean,
    equality,
    conditional_question,
    separator,
    literal,
];

/// Tokenize one line of input.
pub fn tokenize(input: &str) -> TokenizationResult {
    let mut tokens = Vec::new();
    let mut pos = 0;

    'scan: while pos < input.len() {
        let rest = &input[pos..];
        let trimmed = rest.trim_start();
        if trimmed.len() != rest.len() {
            pos += rest.len() - trimmed.len();
            continue;
        }
        for rule in RULES {
            match rule(rest) {
                Some(Lexed::Token(token, len)) => {
                    tokens.push(token);
                    pos += len;
                    continue 'scan;
                }
                Some(Lexed::Malformed(error)) => {
                    return TokenizationResult {
                        tokens,
                        unmatched: rest.chars().count(),
                        error: Some(error),
                    };
                }
                None => {}
            }
        }
        return TokenizationResult {
            tokens,
            unmatched: rest.chars().count(),
            error: None,
        };
    }

    TokenizationResult {
        tokens,
        unmatched: 0,
        error: None,
    }
}

fn lexed(kind: TokenKind, raw: &str) -> Option<Lexed> {
    Some(Lexed::Token(Token::new(kind, raw), raw.len()))
}

fn malformed(message: String) -> Option<Lexed> {
    Some(Lexed::Malformed(MonitorError::recoverable(message)))
}

/// Byte length of the leading run of chars satisfying `pred`.
fn run_len(s: &str, pred: impl Fn(char) -> bool) -> usize {
    s.char_indices()
        .find(|(_, c)| !pred(*c))
        .map_or(s.len(), |(i, _)| i)
}

fn sign_len(s: &str) -> usize {
    usize::from(s.starts_with(['+', '-']))
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

fn conditional_colon(s: &str) -> Option<Lexed> {
    s.starts_with(":=")
        .then(|| lexed(TokenKind::ConditionalEquality, ":="))
        .flatten()
}

fn comment(s: &str) -> Option<Lexed> {
    if s.starts_with('#') || s.starts_with(':') {
        let text = s[1..].trim().to_string();
        return lexed(TokenKind::Comment(text), s);
    }
    None
}

fn execution(s: &str) -> Option<Lexed> {
    let body = s.strip_prefix('`')?;
    let end = body.find(['`', '\n'])?;
    if !body[end..].starts_with('`') {
        return None;
    }
    let raw = &s[..end + 2];
    lexed(TokenKind::ExecutionSubstitution(body[..end].to_string()), raw)
}

fn variable(s: &str) -> Option<Lexed> {
    let name = s.strip_prefix('$')?;
    let len = run_len(name, |c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if len == 0 {
        return None;
    }
    lexed(TokenKind::Variable(name[..len].to_string()), &s[..len + 1])
}

fn brace(s: &str) -> Option<Lexed> {
    if s.starts_with('[') {
        lexed(TokenKind::LeftBrace, "[")
    } else if s.starts_with(']') {
        lexed(TokenKind::RightBrace, "]")
    } else {
        None
    }
}

fn multiline_string(s: &str) -> Option<Lexed> {
    let body = s.strip_prefix(MULTILINE_TERMINATOR)?;
    let end = body.find(MULTILINE_TERMINATOR)?;
    let raw = &s[..MULTILINE_TERMINATOR.len() * 2 + end];
    // A block written across lines keeps neither the break after the opening
    // terminator nor the one before the closing terminator.
    let text = &body[..end];
    let text = text
        .strip_prefix("\r\n")
        .or_else(|| text.strip_prefix('\n'))
        .unwrap_or(text);
    let text = text
        .strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text);
    lexed(TokenKind::StringLiteral(text.to_string()), raw)
}

fn multiline_terminator(s: &str) -> Option<Lexed> {
    s.starts_with(MULTILINE_TERMINATOR)
        .then(|| lexed(TokenKind::MultilineTerminator, MULTILINE_TERMINATOR))
        .flatten()
}

fn string(s: &str) -> Option<Lexed> {
    let quote = s.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let mut value = String::new();
    let mut chars = s.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                let (_, escaped) = chars.next()?;
                if escaped != quote && escaped != '\\' {
                    value.push('\\');
                }
                value.push(escaped);
            }
            c if c == quote => return lexed(TokenKind::StringLiteral(value), &s[..i + 1]),
            c => value.push(c),
        }
    }
    None
}

/// Parse a range bound: `0x..` hex or a signed decimal. Returns the value
/// and its byte length.
fn range_number(s: &str) -> Option<(Result<i128, String>, usize)> {
    if let Some(hex) = s.strip_prefix("0x") {
        let len = run_len(hex, |c| c.is_ascii_hexdigit());
        if len == 0 {
            return None;
        }
        let parsed = i128::from_str_radix(&hex[..len], 16).map_err(|e| e.to_string());
        return Some((parsed, len + 2));
    }
    let sign = sign_len(s);
    let digits = run_len(&s[sign..], |c| c.is_ascii_digit());
    if digits == 0 {
        return None;
    }
    let parsed = s[..sign + digits].parse::<i128>().map_err(|e| e.to_string());
    Some((parsed, sign + digits))
}

fn range(s: &str) -> Option<Lexed> {
    let mut pos = s.strip_prefix('<').map(|_| 1)?;
    pos += run_len(&s[pos..], char::is_whitespace);
    let (first, len) = range_number(&s[pos..])?;
    pos += len;
    let ws = run_len(&s[pos..], char::is_whitespace);
    pos += ws;
    let absolute = s[pos..].starts_with(',');
    if absolute {
        pos += 1;
        pos += run_len(&s[pos..], char::is_whitespace);
    } else if ws == 0 {
        return None;
    }
    let (second, len) = range_number(&s[pos..])?;
    pos += len;
    pos += run_len(&s[pos..], char::is_whitespace);
    if !s[pos..].starts_with('>') {
        return None;
    }
    let raw = &s[..pos + 1];

    let (first, second) = match (first, second) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(e), _) | (_, Err(e)) => return malformed(format!("Invalid range bound: {e}")),
    };
    let (start, end) = if absolute {
        (first, second)
    } else {
        if second <= 0 {
            return malformed(format!("Could not create range: size must be positive in {raw}"));
        }
        match first.checked_add(second - 1) {
            Some(end) => (first, end),
            None => return malformed(format!("Could not create range: size overflows in {raw}")),
        }
    };
    if start < 0 || end < start || end > i128::from(u64::MAX) {
        return malformed(format!("Could not create range: invalid bounds in {raw}"));
    }
    lexed(
        TokenKind::Range {
            start: start as u64,
            end: end as u64,
        },
        raw,
    )
}

fn path(s: &str) -> Option<Lexed> {
    let body = s.strip_prefix('@')?;
    let mut len = 0;
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&' ') {
            chars.next();
            len += 2;
        } else if c.is_whitespace() || c == ';' {
            break;
        } else {
            len += c.len_utf8();
        }
    }
    if len == 0 {
        return None;
    }
    let value = body[..len].replace("\\ ", " ");
    lexed(TokenKind::PathLiteral(value), &s[..len + 1])
}

fn hexadecimal(s: &str) -> Option<Lexed> {
    let digits = s.strip_prefix("0x")?;
    let len = run_len(digits, |c| c.is_ascii_hexdigit());
    if len == 0 {
        return None;
    }
    match u64::from_str_radix(&digits[..len], 16) {
        Ok(value) => lexed(TokenKind::Integer(value as i64), &s[..len + 2]),
        Err(e) => malformed(format!("Invalid hexadecimal number {}: {e}", &s[..len + 2])),
    }
}

fn decimal(s: &str) -> Option<Lexed> {
    let sign = sign_len(s);
    let int_len = run_len(&s[sign..], |c| c.is_ascii_digit());
    let after_int = &s[sign + int_len..];
    let frac_start = after_int.strip_prefix('.')?;
    let frac_len = run_len(frac_start, |c| c.is_ascii_digit());
    if int_len == 0 && frac_len == 0 {
        return None;
    }
    let raw = &s[..sign + int_len + 1 + frac_len];
    match raw.parse::<f64>() {
        Ok(value) => lexed(TokenKind::Float(value), raw),
        Err(e) => malformed(format!("Invalid number {raw}: {e}")),
    }
}

fn integer(s: &str) -> Option<Lexed> {
    let sign = sign_len(s);
    let len = run_len(&s[sign..], |c| c.is_ascii_digit());
    if len == 0 {
        return None;
    }
    let raw = &s[..sign + len];
    match raw.parse::<i64>() {
        Ok(value) => lexed(TokenKind::Integer(value), raw),
        Err(e) => malformed(format!("Invalid integer {raw}: {e}")),
    }
}

fn boolean(s: &str) -> Option<Lexed> {
    for (word, value) in [("true", true), ("false", false)] {
        if s.len() >= word.len()
            && s.is_char_boundary(word.len())
            && s[..word.len()].eq_ignore_ascii_case(word)
        {
            return lexed(TokenKind::Boolean(value), &s[..word.len()]);
        }
    }
    None
}

fn equality(s: &str) -> Option<Lexed> {
    s.starts_with('=').then(|| lexed(TokenKind::Equality, "=")).flatten()
}

fn conditional_question(s: &str) -> Option<Lexed> {
    s.starts_with("?=")
        .then(|| lexed(TokenKind::ConditionalEquality, "?="))
        .flatten()
}

fn separator(s: &str) -> Option<Lexed> {
    s.starts_with(';')
        .then(|| lexed(TokenKind::CommandSeparator, ";"))
        .flatten()
}

fn literal(s: &str) -> Option<Lexed> {
    let len = run_len(s, |c| c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | '?'));
    if len == 0 {
        return None;
    }
    lexed(TokenKind::Literal(s[..len].to_string()), &s[..len])
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_types::token::join_raw;
    use proptest::prelude::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let result = tokenize(input);
        assert!(result.is_success(), "failed to tokenize {input:?}: {result:?}");
        result.tokens.into_iter().map(|t| t.kind().clone()).collect()
    }

    #[test]
    fn command_with_arguments() {
        assert_eq!(
            kinds("sysbus WriteDoubleWord 0x1000 42"),
            vec![
                TokenKind::Literal("sysbus".into()),
                TokenKind::Literal("WriteDoubleWord".into()),
                TokenKind::Integer(0x1000),
                TokenKind::Integer(42),
            ]
        );
    }

    #[test]
    fn unbalanced_quotes_leave_one_char() {
        let result = tokenize("'string1\" 'string2\"");
        assert_eq!(result.unmatched, 1);
        assert_eq!(result.tokens.len(), 2);
    }

    #[test]
    fn hex_and_integer_followed_by_literals() {
        assert_eq!(
            kinds("0xgfd 123bcd"),
            vec![
                TokenKind::Integer(0),
                TokenKind::Literal("xgfd".into()),
                TokenKind::Integer(123),
                TokenKind::Literal("bcd".into()),
            ]
        );
    }

    #[test]
    fn reversed_absolute_range_is_malformed() {
        let result = tokenize("<5,-6>");
        assert_eq!(result.unmatched, 6);
        assert!(result.tokens.is_empty());
        assert!(result.error.is_some());
    }

    #[test]
    fn ranges() {
        assert_eq!(
            kinds("<0x1000, 0x1fff> <0x2000 0x100>"),
            vec![
                TokenKind::Range { start: 0x1000, end: 0x1fff },
                TokenKind::Range { start: 0x2000, end: 0x20ff },
            ]
        );
    }

    #[test]
    fn integer_overflow_is_malformed() {
        let result = tokenize("set x 99999999999999999999999");
        assert_eq!(result.tokens.len(), 2);
        assert_eq!(result.unmatched, 23);
        assert!(result.error.is_some());
    }

    #[test]
    fn variables_and_assignment() {
        assert_eq!(
            kinds("$name.sub=5; $x?=true; y := \"s\""),
            vec![
                TokenKind::Variable("name.sub".into()),
                TokenKind::Equality,
                TokenKind::Integer(5),
                TokenKind::CommandSeparator,
                TokenKind::Variable("x".into()),
                TokenKind::ConditionalEquality,
                TokenKind::Boolean(true),
                TokenKind::CommandSeparator,
                TokenKind::Literal("y".into()),
                TokenKind::ConditionalEquality,
                TokenKind::StringLiteral("s".into()),
            ]
        );
    }

    #[test]
    fn question_mark_belongs_to_an_unspaced_literal() {
        assert_eq!(
            kinds("x?=1"),
            vec![
                TokenKind::Literal("x?".into()),
                TokenKind::Equality,
                TokenKind::Integer(1),
            ]
        );
        assert_eq!(
            kinds("x ?= 1"),
            vec![
                TokenKind::Literal("x".into()),
                TokenKind::ConditionalEquality,
                TokenKind::Integer(1),
            ]
        );
    }

    #[test]
    fn comments_consume_rest_of_line() {
        assert_eq!(
            kinds("start # go; now"),
            vec![
                TokenKind::Literal("start".into()),
                TokenKind::Comment("go; now".into()),
            ]
        );
        assert_eq!(kinds(": note"), vec![TokenKind::Comment("note".into())]);
    }

    #[test]
    fn execution_substitution() {
        assert_eq!(
            kinds("echo `sysbus ReadByte 0x10`"),
            vec![
                TokenKind::Literal("echo".into()),
                TokenKind::ExecutionSubstitution("sysbus ReadByte 0x10".into()),
            ]
        );
        assert!(!tokenize("echo `unterminated").is_success());
    }

    #[test]
    fn strings_with_escapes() {
        assert_eq!(
            kinds(r#""a \"quoted\" word" 'it\'s'"#),
            vec![
                TokenKind::StringLiteral("a \"quoted\" word".into()),
                TokenKind::StringLiteral("it's".into()),
            ]
        );
    }

    #[test]
    fn multiline_forms() {
        assert_eq!(
            kinds("set x \"\"\""),
            vec![
                TokenKind::Literal("set".into()),
                TokenKind::Literal("x".into()),
                TokenKind::MultilineTerminator,
            ]
        );
        assert_eq!(
            kinds("\"\"\"line one\nline two\"\"\""),
            vec![TokenKind::StringLiteral("line one\nline two".into())]
        );
        assert_eq!(
            kinds("macro reset \"\"\"\nmach set 0\nsysbus Reset\n\"\"\""),
            vec![
                TokenKind::Literal("macro".into()),
                TokenKind::Literal("reset".into()),
                TokenKind::StringLiteral("mach set 0\nsysbus Reset".into()),
            ]
        );
    }

    #[test]
    fn paths_with_escaped_spaces() {
        assert_eq!(
            kinds("include @scripts/my\\ board.resc; start"),
            vec![
                TokenKind::Literal("include".into()),
                TokenKind::PathLiteral("scripts/my board.resc".into()),
                TokenKind::CommandSeparator,
                TokenKind::Literal("start".into()),
            ]
        );
    }

    #[test]
    fn indexer_syntax() {
        assert_eq!(
            kinds("mem [0x10] 5"),
            vec![
                TokenKind::Literal("mem".into()),
                TokenKind::LeftBrace,
                TokenKind::Integer(0x10),
                TokenKind::RightBrace,
                TokenKind::Integer(5),
            ]
        );
    }

    #[test]
    fn numbers_and_booleans() {
        assert_eq!(
            kinds("-12 +3 4.5 .5 TRUE False"),
            vec![
                TokenKind::Integer(-12),
                TokenKind::Integer(3),
                TokenKind::Float(4.5),
                TokenKind::Float(0.5),
                TokenKind::Boolean(true),
                TokenKind::Boolean(false),
            ]
        );
    }

    #[test]
    fn unknown_character_stops_scanning() {
        let result = tokenize("mach set {");
        assert_eq!(result.tokens.len(), 2);
        assert_eq!(result.unmatched, 1);
        assert!(result.error.is_none());
    }

    #[test]
    fn empty_and_blank_input() {
        assert!(tokenize("").tokens.is_empty());
        assert!(tokenize("   \t ").is_success());
    }

    fn fragment() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z][a-z0-9_.]{0,6}",
            "[0-9]{1,5}",
            "0x[0-9A-F]{1,4}",
            "\\$[a-z]{1,5}",
            "\"[a-z ]{0,5}\"",
            "'[a-z ]{0,5}'",
            "@[a-z/.]{1,8}",
            "`[a-z ]{0,6}`",
            "<[0-9]{1,3},[0-9]{1,3}>",
            Just("=".to_string()),
            Just("?=".to_string()),
            Just(";".to_string()),
            Just("[".to_string()),
            Just("]".to_string()),
            Just("true".to_string()),
            Just("\"\"\"".to_string()),
        ]
    }

    proptest! {
        #[test]
        fn reconstructed_line_retokenizes_identically(
            parts in prop::collection::vec((fragment(), prop::bool::ANY), 0..8)
        ) {
            let line: String = parts
                .iter()
                .map(|(f, spaced)| if *spaced { format!("{f} ") } else { f.clone() })
                .collect();
            let first = tokenize(&line);
            prop_assume!(first.is_success());
            let rebuilt = join_raw(&first.tokens);
            let second = tokenize(&rebuilt);
            prop_assert!(second.is_success());
            prop_assert_eq!(first.tokens, second.tokens);
        }
    }
}
