//! Collaborator contracts for the ad and billing platforms.
//!
//! # Responsibility
//! - Define the boundary the embedding platform implements; the core never
//!   talks to an ad or billing SDK directly.
//! - Keep gateway failures non-fatal: callers degrade (skip the
//!   interstitial, deny the pin-bonus offer) and core state is unaffected.

use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Product id whose ownership removes ad breaks.
pub const REMOVE_ADS_PRODUCT_ID: &str = "remove_ads";

/// Result of asking the platform to show an interstitial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterstitialShow {
    /// The ad ran and the user dismissed it.
    Dismissed,
    /// Nothing was loaded; the caller proceeds as if dismissed.
    NotReady,
}

/// Result of asking the platform to show a rewarded ad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardedShow {
    /// Completion confirmed; the one reaction is a pin-bonus grant.
    Earned,
    /// Load/show failure or early abandon. No reward.
    Failed,
}

/// Terminal state of a purchase attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseOutcome {
    Success,
    Cancel,
    Failure(String),
}

/// Billing collaborator failure. Never fatal to core state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    Disconnected,
    Service(String),
}

impl Display for BillingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "billing service disconnected"),
            Self::Service(message) => write!(f, "billing service error: {message}"),
        }
    }
}

impl Error for BillingError {}

/// Ad collaborator interface.
///
/// Load calls are fire-and-forget preloads; show calls complete or fail
/// synchronously from the core's point of view.
pub trait AdGateway {
    fn load_interstitial(&mut self);
    fn show_interstitial(&mut self) -> InterstitialShow;
    fn load_rewarded(&mut self);
    /// Whether a rewarded ad is loaded and could be offered right now.
    fn rewarded_ready(&self) -> bool;
    fn show_rewarded(&mut self) -> RewardedShow;
}

/// Billing collaborator interface.
pub trait BillingGateway {
    /// Product ids the user currently owns (fresh purchases and restores).
    fn query_owned_products(&mut self) -> Result<BTreeSet<String>, BillingError>;
    fn purchase(&mut self, product_id: &str) -> PurchaseOutcome;
}
