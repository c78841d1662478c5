//! Common types used across the platform

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Supported catalog languages
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Italian,
    English,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Italian => "it",
            Language::English => "en",
        }
    }
}

/// Localized text keyed by language code (e.g. "it" -> "Pomodori San Marzano")
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LocalizedText(pub BTreeMap<String, String>);

impl LocalizedText {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build a single-language text
    pub fn from_single(language: Language, text: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(language.code().to_string(), text.into());
        Self(map)
    }

    pub fn with(mut self, language: Language, text: impl Into<String>) -> Self {
        self.0.insert(language.code().to_string(), text.into());
        self
    }

    pub fn get(&self, language: Language) -> Option<&str> {
        self.0.get(language.code()).map(String::as_str)
    }

    /// Resolve text for a language, falling back to Italian, then to any
    /// available translation, then to the empty string.
    pub fn resolve(&self, language: Language) -> &str {
        self.get(language)
            .or_else(|| self.get(Language::Italian))
            .or_else(|| self.0.values().next().map(String::as_str))
            .unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|t| t.trim().is_empty())
    }
}

/// Shipping address snapshot stored on orders
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    pub full_name: String,
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub province: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

impl Pagination {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) as i64 - 1) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page.clamp(1, 100) as i64
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl PaginationMeta {
    pub fn new(pagination: &Pagination, total_items: u64) -> Self {
        let per_page = pagination.per_page.max(1);
        Self {
            page: pagination.page,
            per_page,
            total_items,
            total_pages: total_items.div_ceil(per_page as u64) as u32,
        }
    }
}
