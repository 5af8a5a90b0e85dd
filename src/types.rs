//! Shared types used across the codebase

use serde::{Deserialize, Serialize};

use crate::filter::Document;

/// The collections exposed over HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Users,
    Houses,
    Tenants,
    Payments,
    Admin,
    Messages,
    Repairs,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Users,
        Collection::Houses,
        Collection::Tenants,
        Collection::Payments,
        Collection::Admin,
        Collection::Messages,
        Collection::Repairs,
    ];

    /// Store collection name, also the URL segment
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Houses => "houses",
            Collection::Tenants => "tenants",
            Collection::Payments => "payments",
            Collection::Admin => "admin",
            Collection::Messages => "messages",
            Collection::Repairs => "repairs",
        }
    }

    pub fn parse(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == segment)
    }

    /// Fields a create request must carry
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Collection::Users => &["username", "firstName", "lastName", "email", "phone"],
            Collection::Houses => &["name", "location"],
            Collection::Tenants => &["firstName", "lastName", "phone", "houseId"],
            Collection::Payments => &["tenantId", "amount"],
            Collection::Admin => &["username", "email"],
            Collection::Messages => &["sender", "recipient", "body"],
            Collection::Repairs => &["houseId", "description"],
        }
    }

    /// Singular noun for response messages
    pub fn noun(&self) -> &'static str {
        match self {
            Collection::Users => "User",
            Collection::Houses => "House",
            Collection::Tenants => "Tenant",
            Collection::Payments => "Payment",
            Collection::Admin => "Admin",
            Collection::Messages => "Message",
            Collection::Repairs => "Repair",
        }
    }

    /// Drop fields that never leave the server
    pub fn redact(&self, mut doc: Document) -> Document {
        if matches!(self, Collection::Users | Collection::Admin) {
            doc.remove("password");
        }
        doc
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
