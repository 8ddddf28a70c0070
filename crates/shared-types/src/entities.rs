//! # Core Domain Entities
//!
//! Defines the store-backed entities of the shop.
//!
//! ## Clusters
//!
//! - **Catalogue**: `Product`
//! - **Checkout**: `Reservation`, `ReservationStatus`, `CartItem`, `LineItem`
//! - **Payments**: `ProcessedPayment`
//! - **Accounts**: `User`, `AdminLevel`, `Session`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel stock value meaning "unlimited"; passed through availability
/// arithmetic verbatim, never subtracted from.
pub const UNLIMITED_STOCK: i64 = -1;

// =============================================================================
// CLUSTER A: CATALOGUE
// =============================================================================

/// A product in the catalogue.
///
/// `unit_price` is in minor currency units (pence, cents). `stock` is a
/// plain integer count, with [`UNLIMITED_STOCK`] meaning no cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Generated identifier (UUID v4).
    pub id: String,
    /// Merchant-assigned SKU, unique across the catalogue.
    pub sku: String,
    /// Display name.
    pub name: String,
    /// Price per unit in minor currency units. Never negative.
    pub unit_price: i64,
    /// Units in stock, or [`UNLIMITED_STOCK`].
    pub stock: i64,
    /// Whether the product is purchasable.
    pub active: bool,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
}

impl Product {
    /// Whether this product has no stock cap.
    pub fn is_unlimited(&self) -> bool {
        self.stock == UNLIMITED_STOCK
    }
}

// =============================================================================
// CLUSTER B: CHECKOUT
// =============================================================================

/// Status of a stock reservation.
///
/// Legal transitions are `Pending -> Confirmed`, `Pending -> Expired` and
/// `Confirmed -> Expired` (refund restock). `Expired` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    /// Held while the buyer is redirected to the provider.
    Pending,
    /// Payment completed; the units are sold.
    Confirmed,
    /// Released back to stock.
    Expired,
}

impl ReservationStatus {
    /// Store representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Expired => "expired",
        }
    }

    /// Parse the store representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A claim on `quantity` units of a product against a provider session,
/// preventing oversell during the redirect-to-provider window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Generated identifier (UUID v4).
    pub id: String,
    /// The reserved product.
    pub product_id: String,
    /// Units held. Always positive.
    pub quantity: i64,
    /// The provider's identifier for the hosted checkout attempt.
    pub provider_session_id: String,
    /// Current lifecycle state.
    pub status: ReservationStatus,
    /// Creation timestamp; drives the stale sweep.
    pub created: DateTime<Utc>,
}

/// One requested item in a checkout cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// SKU of the requested product.
    pub sku: String,
    /// Requested unit count. Must be positive.
    pub quantity: i64,
}

/// A priced line item, as sent to the provider and in the outbound
/// order-completed notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product SKU.
    pub sku: String,
    /// Product display name.
    pub name: String,
    /// Price per unit in minor currency units.
    pub unit_price: i64,
    /// Unit count.
    pub quantity: i64,
}

// =============================================================================
// CLUSTER C: PAYMENTS
// =============================================================================

/// The idempotency claim for a completed payment.
///
/// Primary-key uniqueness on `provider_session_id` IS the claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedPayment {
    /// The claimed provider session.
    pub provider_session_id: String,
    /// When the claim was taken; stale claims are reclaimed.
    pub processed_at: DateTime<Utc>,
}

// =============================================================================
// CLUSTER D: ACCOUNTS
// =============================================================================

/// Administrator privilege level. Exactly one `Owner` exists after setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminLevel {
    /// The account created at setup; may manage other admins.
    Owner,
    /// A secondary administrator.
    Manager,
}

impl AdminLevel {
    /// Store representation (encrypted at rest).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Manager => "manager",
        }
    }

    /// Parse the store representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(Self::Owner),
            "manager" => Some(Self::Manager),
            _ => None,
        }
    }
}

/// An administrator account row.
///
/// The username is stored twice: a deterministic HMAC index for lookup and
/// an encrypted copy for display. The password hash string and admin level
/// are ciphertext under DATA_KEY; `wrapped_data_key` is DATA_KEY wrapped
/// under the KEK derived from this user's password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Generated identifier (UUID v4).
    pub id: String,
    /// HMAC of the username under the process root key; unique.
    pub username_index: String,
    /// Encrypted username.
    pub username_hash: String,
    /// Encrypted PBKDF2 password string.
    pub password_hash: String,
    /// Per-user PBKDF2 salt for KEK derivation (hex, plaintext).
    pub kdf_salt: String,
    /// DATA_KEY wrapped under this user's KEK.
    pub wrapped_data_key: String,
    /// Encrypted [`AdminLevel`] string.
    pub admin_level: String,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
}

/// A login session row.
///
/// The token itself is never stored; lookups hash the presented token
/// first. `wrapped_data_key` is DATA_KEY wrapped under a key derived from
/// the session token, so requests recover DATA_KEY without the KEK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// SHA-256 of the session token (hex).
    pub token_hash: String,
    /// Per-session CSRF token.
    pub csrf_token: String,
    /// Expiry, epoch milliseconds.
    pub expires: i64,
    /// DATA_KEY wrapped under the session-token-derived key.
    pub wrapped_data_key: String,
    /// Owning user id.
    pub user_id: String,
}

impl Session {
    /// Whether this session has passed its expiry.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires <= now_ms
    }
}
