//! Access-tier resolution
//!
//! Pure mapping from an authorization profile to the capability set route
//! guards consume. Anything outside the closed tables resolves to nothing:
//! a missing profile, an unrecognized role or status, or a non-active
//! account all end at the restricted tier rather than a default grant.

use serde::{Deserialize, Serialize};

use crate::profile::{AccountStatus, AuthorizationProfile, PaymentStatus, ProfileLevel, Role};

/// Portal capabilities gated by the access tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewDashboard,
    JoinEvents,
    SubmitContent,
    ViewReports,
    ManageMembers,
    ManageBilling,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ViewDashboard => "view_dashboard",
            Capability::JoinEvents => "join_events",
            Capability::SubmitContent => "submit_content",
            Capability::ViewReports => "view_reports",
            Capability::ManageMembers => "manage_members",
            Capability::ManageBilling => "manage_billing",
        }
    }
}

/// Capabilities available while an account is suspended
const SUSPENDED_RETAINED: &[Capability] = &[Capability::ViewDashboard, Capability::ViewReports];

/// Base capability set for each role
fn base_capabilities(role: Role) -> &'static [Capability] {
    match role {
        Role::Admin => &[
            Capability::ViewDashboard,
            Capability::JoinEvents,
            Capability::SubmitContent,
            Capability::ViewReports,
            Capability::ManageMembers,
            Capability::ManageBilling,
        ],
        Role::Staff => &[
            Capability::ViewDashboard,
            Capability::JoinEvents,
            Capability::SubmitContent,
            Capability::ViewReports,
        ],
        Role::Member => &[Capability::ViewDashboard, Capability::JoinEvents],
        Role::Unrecognized => &[],
    }
}

/// The resolved capability set for one snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTier {
    /// Capabilities the member currently holds
    pub capabilities: Vec<Capability>,
    /// Whether mutating actions are withheld
    pub read_only: bool,
    /// Whether premium surfaces are unlocked
    pub premium_unlocked: bool,
}

impl AccessTier {
    /// The most restrictive tier: no capabilities, nothing unlocked
    pub fn restricted() -> Self {
        Self {
            capabilities: Vec::new(),
            read_only: true,
            premium_unlocked: false,
        }
    }

    /// Check whether a capability is held
    pub fn allows(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Whether this tier grants nothing at all
    pub fn is_restricted(&self) -> bool {
        self.capabilities.is_empty() && !self.premium_unlocked
    }
}

impl Default for AccessTier {
    fn default() -> Self {
        Self::restricted()
    }
}

/// Resolve the access tier for a profile
///
/// Total and stateless: identical input always yields the identical tier,
/// and `None` yields [`AccessTier::restricted`].
pub fn resolve_tier(profile: Option<&AuthorizationProfile>) -> AccessTier {
    let profile = match profile {
        Some(profile) => profile,
        None => return AccessTier::restricted(),
    };

    let base = base_capabilities(profile.role);

    let (capabilities, read_only) = match profile.account_status {
        AccountStatus::Active => (base.to_vec(), false),
        AccountStatus::Suspended => (
            base.iter()
                .copied()
                .filter(|cap| SUSPENDED_RETAINED.contains(cap))
                .collect(),
            true,
        ),
        AccountStatus::Pending | AccountStatus::Deactivated | AccountStatus::Unrecognized => {
            (Vec::new(), true)
        }
    };

    let premium_unlocked = profile.account_status == AccountStatus::Active
        && profile.profile_level == ProfileLevel::Premium
        && profile.payment_status == PaymentStatus::Current;

    AccessTier {
        capabilities,
        read_only,
        premium_unlocked,
    }
}
