//! Authorization profile model and stores
//!
//! The profile is a row in an external store keyed by the provider's user id.
//! Its enum fields are closed: wire values outside the known set collapse to
//! `Unrecognized`, which the access-tier mapping treats as granting nothing.
//! A field-level surprise therefore degrades that field instead of erroring
//! the whole row.

use serde::{Deserialize, Serialize};

pub mod store;
pub mod sync;

pub use store::{MemoryProfileStore, ProfileStore, RestProfileStore};
pub use sync::ProfileSynchronizer;

/// Portal role assigned to a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Staff,
    Member,
    /// Wire value outside the known set
    #[serde(other)]
    Unrecognized,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Member => "member",
            Role::Unrecognized => "unrecognized",
        }
    }

    /// Parse a role string; `None` for anything outside the known set
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "staff" => Some(Role::Staff),
            "member" => Some(Role::Member),
            _ => None,
        }
    }
}

/// Lifecycle state of a member account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Pending,
    Suspended,
    Deactivated,
    /// Wire value outside the known set
    #[serde(other)]
    Unrecognized,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Pending => "pending",
            AccountStatus::Suspended => "suspended",
            AccountStatus::Deactivated => "deactivated",
            AccountStatus::Unrecognized => "unrecognized",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(AccountStatus::Active),
            "pending" => Some(AccountStatus::Pending),
            "suspended" => Some(AccountStatus::Suspended),
            "deactivated" => Some(AccountStatus::Deactivated),
            _ => None,
        }
    }
}

/// Membership level of the profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileLevel {
    Basic,
    Premium,
    /// Wire value outside the known set
    #[serde(other)]
    Unrecognized,
}

impl ProfileLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileLevel::Basic => "basic",
            ProfileLevel::Premium => "premium",
            ProfileLevel::Unrecognized => "unrecognized",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "basic" => Some(ProfileLevel::Basic),
            "premium" => Some(ProfileLevel::Premium),
            _ => None,
        }
    }
}

/// Standing of the member's dues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Current,
    PastDue,
    Unpaid,
    /// Wire value outside the known set
    #[serde(other)]
    Unrecognized,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Current => "current",
            PaymentStatus::PastDue => "past_due",
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Unrecognized => "unrecognized",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "current" => Some(PaymentStatus::Current),
            "past_due" => Some(PaymentStatus::PastDue),
            "unpaid" => Some(PaymentStatus::Unpaid),
            _ => None,
        }
    }
}

/// Authorization row for one member, fetched from the profile store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationProfile {
    /// Same opaque id as the provider's `Identity::id`
    pub id: String,

    /// Portal role
    pub role: Role,

    /// Account lifecycle state
    pub account_status: AccountStatus,

    /// Chapter or region assignment, when any
    pub region_id: Option<String>,

    /// Membership level
    pub profile_level: ProfileLevel,

    /// Dues standing
    pub payment_status: PaymentStatus,
}

impl AuthorizationProfile {
    /// Build a profile with the defaults a newly provisioned member gets
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            account_status: AccountStatus::Active,
            region_id: None,
            profile_level: ProfileLevel::Basic,
            payment_status: PaymentStatus::Current,
        }
    }

    /// Whether the account is in good lifecycle standing
    pub fn is_active(&self) -> bool {
        self.account_status == AccountStatus::Active
    }
}
