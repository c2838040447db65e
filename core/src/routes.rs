//! Route table of the Smart Dealer webservice and the path matcher.
//!
//! A pattern is a literal path, optionally ending in the `:id` placeholder.
//! A requested path is compiled by replacing its trailing run of digits with
//! the placeholder; it matches an entry when the result equals the entry's
//! pattern exactly (case-sensitive, whole string).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::RouteTableError;
use crate::http::HttpMethod;

/// Placeholder standing for a trailing numeric identifier.
pub const ID_PLACEHOLDER: &str = ":id";

/// One endpoint of the webservice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub pattern: String,
    pub verb: HttpMethod,
    pub description: String,
}

impl RouteEntry {
    fn new(pattern: &str, verb: HttpMethod, description: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            verb,
            description: description.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.trim().is_empty()
    }
}

const STANDARD_ROUTES: &[(&str, HttpMethod, &str)] = &[
    ("/config/affiliates/", HttpMethod::Get, "return branches listing (affiliates)"),
    ("/config/categories/", HttpMethod::Get, "return stock categories (car, truck, motorcycle)"),
    ("/config/affiliate/", HttpMethod::Post, "register new customer/affiliate"),
    ("/parts/", HttpMethod::Get, "returns a parts list"),
    ("/parts/:id", HttpMethod::Get, "returns a parts list (page)"),
    ("/parts/provider/", HttpMethod::Get, "returns the manufacturer list (providers)"),
    ("/parts/order/", HttpMethod::Post, "create or update parts orders"),
    ("/parts/notify/", HttpMethod::Post, "create or update pending parts inventory alerts"),
    ("/parts/order/:id", HttpMethod::Delete, "delete part orders"),
    ("/parts/tires/", HttpMethod::Get, "get stock of tires"),
    ("/connect/channels/", HttpMethod::Get, "list channels available for integration (connect)"),
    ("/connect/contracts/", HttpMethod::Get, "list integration settings by client and channel"),
    ("/connect/contract/", HttpMethod::Post, "set/create new integration settings (contracts)"),
    ("/connect/packs/", HttpMethod::Get, "list packs of stock integration (connect)"),
    ("/connect/pack/:id", HttpMethod::Get, "list all offers of pack"),
    ("/connect/offers/", HttpMethod::Get, "list all related offers"),
    ("/connect/offer/", HttpMethod::Post, "register new offer to publish"),
    ("/connect/offer/:id", HttpMethod::Delete, "delete offer from pack"),
    ("/connect/codes/", HttpMethod::Get, "translate response codes list"),
    ("/connect/contract/:id", HttpMethod::Delete, "remove one contract (integration client settings)"),
];

/// Immutable registry of known endpoints, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// The fixed table of the Smart Dealer webservice.
    pub fn standard() -> Self {
        Self {
            entries: STANDARD_ROUTES
                .iter()
                .map(|(pattern, verb, description)| RouteEntry::new(pattern, *verb, description))
                .collect(),
        }
    }

    /// Load a table from a JSON array of `{pattern, verb, description}`.
    pub fn from_json(json: &str) -> Result<Self, RouteTableError> {
        let entries: Vec<RouteEntry> = serde_json::from_str(json)?;
        let mut seen = HashSet::new();
        for entry in &entries {
            if !entry.is_empty() && !seen.insert(entry.pattern.as_str()) {
                return Err(RouteTableError::DuplicatePattern(entry.pattern.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// All entries, including blank ones a custom table may carry.
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// The non-empty entries in declaration order.
    pub fn methods(&self) -> Vec<&RouteEntry> {
        self.entries.iter().filter(|entry| !entry.is_empty()).collect()
    }

    /// First entry matched by `path`, if any.
    pub fn match_path(&self, path: &str) -> Option<&RouteEntry> {
        let pattern = RequestPattern::compile(path);
        self.methods().into_iter().find(|entry| pattern.matches(entry))
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// A requested path normalized for comparison against route patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPattern {
    normalized: String,
}

impl RequestPattern {
    pub fn compile(path: &str) -> Self {
        let stem = path.trim_end_matches(|c: char| c.is_ascii_digit());
        let normalized = if stem.len() == path.len() {
            path.to_string()
        } else {
            format!("{stem}{ID_PLACEHOLDER}")
        };
        Self { normalized }
    }

    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    pub fn matches(&self, entry: &RouteEntry) -> bool {
        entry.pattern == self.normalized
    }
}
