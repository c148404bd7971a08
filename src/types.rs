use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Invoice and purchase-order ids referenced by a message.
///
/// Each kind keeps insertion order without duplicates, and an id lives in at
/// most one of the two lists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet {
    #[serde(default)]
    pub invoices: Vec<String>,
    #[serde(default)]
    pub pos: Vec<String>,
}

impl TagSet {
    /// Inserts `id` under `kind`. Returns `false` when the id is already
    /// tagged under either kind.
    pub fn insert(&mut self, kind: MentionKind, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.contains(&id) {
            return false;
        }
        match kind {
            MentionKind::Invoice => self.invoices.push(id),
            MentionKind::PurchaseOrder => self.pos.push(id),
        }
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.invoices.iter().any(|existing| existing == id)
            || self.pos.iter().any(|existing| existing == id)
    }

    pub fn is_empty(&self) -> bool {
        self.invoices.is_empty() && self.pos.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: TagSet,
    #[serde(default, with = "timestamp")]
    pub created_at: Option<OffsetDateTime>,
    /// Set only on the local placeholder while its reply is still arriving.
    #[serde(skip)]
    pub streaming: bool,
}

impl ChatMessage {
    pub fn user(id: impl Into<String>, content: impl Into<String>, tags: TagSet) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            content: content.into(),
            tags,
            created_at: Some(OffsetDateTime::now_utc()),
            streaming: false,
        }
    }

    pub fn placeholder(id: impl Into<String>, tags: TagSet) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            content: String::new(),
            tags,
            created_at: Some(OffsetDateTime::now_utc()),
            streaming: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, with = "timestamp")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "timestamp")]
    pub updated_at: Option<OffsetDateTime>,
}

impl ChatSummary {
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => "Untitled",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MentionKind {
    #[default]
    #[serde(rename = "invoices")]
    Invoice,
    #[serde(rename = "pos")]
    PurchaseOrder,
}

impl MentionKind {
    /// Value of the `kind` query parameter on the mentions endpoint.
    pub fn as_query(self) -> &'static str {
        match self {
            MentionKind::Invoice => "invoices",
            MentionKind::PurchaseOrder => "pos",
        }
    }

    /// Prefix of a serialized mention token, e.g. `@inv:`.
    pub fn token_prefix(self) -> &'static str {
        match self {
            MentionKind::Invoice => "@inv:",
            MentionKind::PurchaseOrder => "@po:",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MentionKind::Invoice => "Invoices",
            MentionKind::PurchaseOrder => "POs",
        }
    }
}

impl fmt::Display for MentionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MentionMeta {
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub date: Option<String>,
}

/// Typeahead row for the `@` popover. Display only, never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MentionCandidate {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub meta: MentionMeta,
}

impl MentionCandidate {
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }

    /// Secondary line shown under the label: `USD 1200.5 • 2024-03-01`.
    pub fn describe(&self) -> String {
        let currency = self.meta.currency.as_deref().unwrap_or("USD");
        let mut line = currency.to_string();
        if let Some(amount) = self.meta.amount {
            line.push(' ');
            line.push_str(&amount.to_string());
        }
        if let Some(date) = self.meta.date.as_deref().filter(|d| !d.is_empty()) {
            line.push_str(" • ");
            line.push_str(date);
        }
        line
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRef {
    pub id: String,
    #[serde(default)]
    pub invoice_number: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub amount: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderRef {
    pub id: String,
    #[serde(default)]
    pub po_number: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub currency: String,
}

/// Vendor header plus the invoices and POs offered in the selection panel.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorContext {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub invoices: Vec<InvoiceRef>,
    #[serde(default)]
    pub purchase_orders: Vec<PurchaseOrderRef>,
}

impl VendorContext {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "Vendor"
        } else {
            &self.name
        }
    }
}

/// Lenient RFC 3339 (de)serialization: a missing or unparseable timestamp
/// becomes `None` instead of failing the surrounding payload.
mod timestamp {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;
    use time::format_description::well_known::Rfc3339;

    pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value.and_then(|dt| dt.format(&Rfc3339).ok()) {
            Some(formatted) => serializer.serialize_some(&formatted),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.and_then(|s| OffsetDateTime::parse(&s, &Rfc3339).ok()))
    }
}
