//! Scoped variable and macro storage.
//!
//! Names are stored fully qualified: `global.<name>` or `<machine>.<name>`.
//! A bare name is qualified with the current machine's scope when one is
//! selected, and with `global` otherwise.

use std::collections::BTreeMap;

use monitor_types::error::{MonitorError, Result};
use monitor_types::token::{Token, TokenKind};

/// Prefix of names visible regardless of the current machine.
pub const GLOBAL_SCOPE: &str = "global";

/// Which store a capture or assignment targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Variable,
    Macro,
}

impl StoreKind {
    pub fn command_name(self) -> &'static str {
        match self {
            Self::Variable => "set",
            Self::Macro => "macro",
        }
    }
}

/// The machine scope in effect plus every scope a name may be qualified by.
#[derive(Debug, Clone, Default)]
pub struct Scopes {
    pub current: Option<String>,
    pub machines: Vec<String>,
}

impl Scopes {
    pub fn global() -> Self {
        Self::default()
    }

    /// Fully-qualified form of `name`.
    pub fn qualify(&self, name: &str) -> String {
        if !self.is_bare(name) {
            return name.to_string();
        }
        let scope = self.current.as_deref().unwrap_or(GLOBAL_SCOPE);
        format!("{scope}.{name}")
    }

    /// A name is bare unless its first dotted segment is a known scope.
    pub fn is_bare(&self, name: &str) -> bool {
        match name.split_once('.') {
            None => true,
            Some((head, _)) => head != GLOBAL_SCOPE && !self.machines.iter().any(|m| m == head),
        }
    }

    /// Names a bare `name` resolves through, most specific first.
    fn candidates(&self, name: &str) -> Vec<String> {
        let mut candidates = vec![name.to_string()];
        if let Some(scope) = &self.current {
            candidates.push(format!("{scope}.{name}"));
        }
        candidates.push(format!("{GLOBAL_SCOPE}.{name}"));
        candidates
    }

    /// Strip the current or global scope from a qualified name, for display.
    pub fn unqualified<'a>(&self, name: &'a str) -> &'a str {
        let Some((head, rest)) = name.split_once('.') else {
            return name;
        };
        if head == GLOBAL_SCOPE || self.current.as_deref() == Some(head) {
            rest
        } else {
            name
        }
    }
}

/// A name → token mapping with scope-aware lookup.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    entries: BTreeMap<String, Token>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under the qualified form of `name`. Returns that form.
    pub fn set(&mut self, name: &str, value: Token, scopes: &Scopes) -> String {
        let qualified = scopes.qualify(name);
        log::debug!("{qualified} = {}", value.raw());
        self.entries.insert(qualified.clone(), value);
        qualified
    }

    pub fn set_qualified(&mut self, qualified: &str, value: Token) {
        self.entries.insert(qualified.to_string(), value);
    }

    pub fn unset(&mut self, qualified: &str) -> Option<Token> {
        self.entries.remove(qualified)
    }

    pub fn get_qualified(&self, qualified: &str) -> Option<&Token> {
        self.entries.get(qualified)
    }

    /// Resolve `name`: exact, then current machine scope, then global.
    pub fn lookup(&self, name: &str, scopes: &Scopes) -> Option<(&str, &Token)> {
        scopes
            .candidates(name)
            .into_iter()
            .find_map(|candidate| self.entries.get_key_value(&candidate))
            .map(|(k, v)| (k.as_str(), v))
    }

    pub fn contains(&self, name: &str, scopes: &Scopes) -> bool {
        self.lookup(name, scopes).is_some()
    }

    /// Replace a variable token by its value, failing when it is unknown.
    /// Any other token is returned unchanged.
    pub fn expand(&self, token: &Token, scopes: &Scopes) -> Result<Token> {
        match token.kind() {
            TokenKind::Variable(name) => self
                .lookup(name, scopes)
                .map(|(_, value)| value.clone())
                .ok_or_else(|| MonitorError::NoSuchVariable(name.clone())),
            _ => Ok(token.clone()),
        }
    }

    /// Expand every variable token, failing on the first unknown one.
    pub fn expand_all(&self, tokens: &[Token], scopes: &Scopes) -> Result<Vec<Token>> {
        tokens.iter().map(|t| self.expand(t, scopes)).collect()
    }

    /// Expand every known variable, keeping unknown ones as they are.
    pub fn expand_known(&self, tokens: &[Token], scopes: &Scopes) -> Vec<Token> {
        tokens
            .iter()
            .map(|t| self.expand(t, scopes).unwrap_or_else(|_| t.clone()))
            .collect()
    }

    /// Qualified names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scopes(current: Option<&str>) -> Scopes {
        Scopes {
            current: current.map(str::to_string),
            machines: vec!["board".into(), "other".into()],
        }
    }

    #[test]
    fn bare_names_take_current_scope() {
        assert_eq!(scopes(None).qualify("x"), "global.x");
        assert_eq!(scopes(Some("board")).qualify("x"), "board.x");
        assert_eq!(scopes(Some("board")).qualify("global.x"), "global.x");
        assert_eq!(scopes(Some("board")).qualify("other.x"), "other.x");
        // First segment is not a scope, so the dotted name is still bare.
        assert_eq!(scopes(None).qualify("sysbus.addr"), "global.sysbus.addr");
    }

    #[test]
    fn lookup_order_is_exact_machine_global() {
        let mut store = VariableStore::new();
        store.set("x", Token::integer(1), &scopes(None));
        store.set("x", Token::integer(2), &scopes(Some("board")));

        let (name, value) = store.lookup("x", &scopes(Some("board"))).unwrap();
        assert_eq!(name, "board.x");
        assert_eq!(value, &Token::integer(2));

        let (name, _) = store.lookup("x", &scopes(Some("other"))).unwrap();
        assert_eq!(name, "global.x");
        let (name, _) = store.lookup("x", &scopes(None)).unwrap();
        assert_eq!(name, "global.x");
        let (name, _) = store.lookup("board.x", &scopes(None)).unwrap();
        assert_eq!(name, "board.x");
    }

    #[test]
    fn strict_and_lenient_expansion() {
        let mut store = VariableStore::new();
        store.set("addr", Token::integer(0x10), &Scopes::global());
        let var = Token::new(TokenKind::Variable("addr".into()), "$addr");
        let missing = Token::new(TokenKind::Variable("nope".into()), "$nope");

        assert_eq!(store.expand(&var, &Scopes::global()).unwrap(), Token::integer(0x10));
        let err = store.expand(&missing, &Scopes::global()).unwrap_err();
        assert!(matches!(err, MonitorError::NoSuchVariable(ref n) if n == "nope"));

        let both = [var.clone(), missing.clone()];
        let err = store.expand_all(&both, &Scopes::global()).unwrap_err();
        assert!(matches!(err, MonitorError::NoSuchVariable(ref n) if n == "nope"));
        assert_eq!(
            store.expand_all(&[var.clone()], &Scopes::global()).unwrap(),
            vec![Token::integer(0x10)]
        );

        let expanded = store.expand_known(&both, &Scopes::global());
        assert_eq!(expanded, vec![Token::integer(0x10), missing]);
    }

    #[test]
    fn unqualified_display_names() {
        let s = scopes(Some("board"));
        assert_eq!(s.unqualified("global.x"), "x");
        assert_eq!(s.unqualified("board.y"), "y");
        assert_eq!(s.unqualified("other.z"), "other.z");
    }

    #[test]
    fn unset_and_clear() {
        let mut store = VariableStore::new();
        let name = store.set("x", Token::integer(1), &Scopes::global());
        assert_eq!(store.len(), 1);
        assert!(store.unset(&name).is_some());
        assert!(store.is_empty());
        store.set("y", Token::integer(1), &Scopes::global());
        store.clear();
        assert!(store.is_empty());
    }
}
