//! `@` mention parsing and the tag list shown as chips above the input.

use crate::types::{MentionKind, TagSet};
use std::fmt;

/// A completed mention such as `@inv:7f3c` or `@po:42`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MentionToken {
    pub kind: MentionKind,
    pub id: String,
}

impl MentionToken {
    pub fn new(kind: MentionKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Parses a serialized token. Unknown prefixes and empty ids yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        [MentionKind::Invoice, MentionKind::PurchaseOrder]
            .into_iter()
            .find_map(|kind| {
                raw.strip_prefix(kind.token_prefix())
                    .filter(|id| !id.is_empty())
                    .map(|id| Self::new(kind, id))
            })
    }
}

impl fmt::Display for MentionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.token_prefix(), self.id)
    }
}

/// Returns the query of the mention being typed at the end of `text`.
pub fn active_mention(text: &str) -> Option<&str> {
    active_mention_at(text, text.len())
}

/// Returns the query of the mention being typed just before `cursor` (a byte
/// offset). Only the last `@` before the cursor is considered, and any
/// whitespace between it and the cursor ends the mention.
pub fn active_mention_at(text: &str, cursor: usize) -> Option<&str> {
    let before = text.get(..cursor)?;
    let at = before.rfind('@')?;
    let query = &before[at + 1..];
    if query.chars().any(char::is_whitespace) {
        None
    } else {
        Some(query)
    }
}

/// Ordered, duplicate-free list of raw tokens attached to the next message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagList {
    tokens: Vec<String>,
}

impl TagList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `token` unless it is already present. Returns whether it was added.
    pub fn add(&mut self, token: impl Into<String>) -> bool {
        let token = token.into();
        if self.contains(&token) {
            return false;
        }
        self.tokens.push(token);
        true
    }

    /// Removes the exact match of `token`. Returns whether anything was removed.
    pub fn remove(&mut self, token: &str) -> bool {
        let before = self.tokens.len();
        self.tokens.retain(|existing| existing != token);
        self.tokens.len() != before
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|existing| existing == token)
    }

    /// Drops every token of `kind` and appends one token per id, in order.
    pub fn replace_kind<'a>(&mut self, kind: MentionKind, ids: impl IntoIterator<Item = &'a str>) {
        let prefix = kind.token_prefix();
        self.tokens.retain(|token| !token.starts_with(prefix));
        for id in ids {
            self.add(MentionToken::new(kind, id).to_string());
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
    }

    /// Splits the tokens into invoice and PO ids. Tokens that do not parse are
    /// skipped.
    pub fn to_tag_set(&self) -> TagSet {
        let mut tags = TagSet::default();
        for token in self.tokens.iter().filter_map(|raw| MentionToken::parse(raw)) {
            tags.insert(token.kind, token.id);
        }
        tags
    }
}

impl<S: Into<String>> FromIterator<S> for TagList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = TagList::new();
        for token in iter {
            list.add(token);
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips() {
        for raw in ["@inv:1", "@po:abc-42", "@inv:@po:x"] {
            let token = MentionToken::parse(raw).unwrap();
            assert_eq!(token.to_string(), raw);
        }
        let token = MentionToken::parse("@po:2").unwrap();
        assert_eq!(token.kind, MentionKind::PurchaseOrder);
        assert_eq!(token.id, "2");
    }

    #[test]
    fn unknown_prefixes_do_not_parse() {
        assert_eq!(MentionToken::parse("@vendor:1"), None);
        assert_eq!(MentionToken::parse("inv:1"), None);
        assert_eq!(MentionToken::parse("@inv:"), None);
    }

    #[test]
    fn mention_is_active_until_whitespace() {
        assert_eq!(active_mention("check @in"), Some("in"));
        assert_eq!(active_mention("check @in "), None);
        assert_eq!(active_mention("check @in\n"), None);
        assert_eq!(active_mention("@"), Some(""));
        assert_eq!(active_mention("no mention here"), None);
    }

    #[test]
    fn only_last_at_counts() {
        assert_eq!(active_mention("@inv:1 and @po"), Some("po"));
        assert_eq!(active_mention("a@b@c"), Some("c"));
    }

    #[test]
    fn cursor_limits_the_search() {
        let text = "see @INV-9 please";
        assert_eq!(active_mention_at(text, 10), Some("INV-9"));
        assert_eq!(active_mention_at(text, text.len()), None);
        assert_eq!(active_mention_at("é@x", 1), None);
        assert_eq!(active_mention_at("abc", 10), None);
    }

    #[test]
    fn add_is_idempotent() {
        let mut list = TagList::new();
        assert!(list.add("@inv:1"));
        assert!(!list.add("@inv:1"));
        assert_eq!(list.tokens(), ["@inv:1"]);
    }

    #[test]
    fn remove_then_add_restores_once() {
        let mut list: TagList = ["@inv:1", "@po:2"].into_iter().collect();
        assert!(list.remove("@inv:1"));
        assert!(!list.remove("@inv:1"));
        list.add("@inv:1");
        assert_eq!(list.tokens(), ["@po:2", "@inv:1"]);
    }

    #[test]
    fn parse_collapses_duplicates_and_drops_unknown() {
        let list = TagList {
            tokens: vec![
                "@inv:1".into(),
                "@po:2".into(),
                "@inv:1".into(),
                "#nope".into(),
            ],
        };
        let tags = list.to_tag_set();
        assert_eq!(tags.invoices, vec!["1"]);
        assert_eq!(tags.pos, vec!["2"]);
    }

    #[test]
    fn replace_kind_keeps_other_kind() {
        let mut list: TagList = ["@inv:1", "@po:2", "@inv:3"].into_iter().collect();
        list.replace_kind(MentionKind::Invoice, ["4", "5"]);
        assert_eq!(list.tokens(), ["@po:2", "@inv:4", "@inv:5"]);
        list.replace_kind(MentionKind::PurchaseOrder, []);
        assert_eq!(list.tokens(), ["@inv:4", "@inv:5"]);
    }
}
