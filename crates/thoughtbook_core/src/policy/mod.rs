//! Entitlement policy: pin quota, interstitial cadence, purchase state.
//!
//! # Responsibility
//! - Decide whether a pin is allowed and whether a save triggers an
//!   interstitial.
//! - Reconcile purchase/restore events into the durable `ads_removed` flag.
//!
//! # Invariants
//! - Effective pin quota is `FREE_PIN_LIMIT + rewarded_pin_bonus` and is
//!   independent of `ads_removed`.
//! - `ads_removed` is monotonic: once true, reconciliation never clears it.
//! - Every state change is written through to preference storage before the
//!   in-memory state is advanced.

use crate::repo::prefs_repo::{EntitlementSnapshot, PrefsRepository};
use crate::repo::thought_repo::RepoResult;
use log::info;

/// Pins included in the free tier.
pub const FREE_PIN_LIMIT: u32 = 5;

/// An interstitial fires after every Nth new-thought save.
pub const INTERSTITIAL_SAVE_CADENCE: u32 = 5;

/// Verdict for a pin attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinGate {
    Allow,
    Deny,
}

/// Instruction returned to the save flow after the policy is notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveDirective {
    pub show_interstitial: bool,
}

/// Free-tier counters and purchase flag, consulted by the store's caller.
pub struct EntitlementPolicy<P: PrefsRepository> {
    state: EntitlementSnapshot,
    prefs: P,
}

impl<P: PrefsRepository> EntitlementPolicy<P> {
    /// Loads the durable entitlement state at startup.
    pub fn load(prefs: P) -> RepoResult<Self> {
        let state = prefs.load()?;
        info!(
            "event=entitlement_load module=policy status=ok save_count={} rewarded_pin_bonus={} ads_removed={} first_launch={}",
            state.save_count, state.rewarded_pin_bonus, state.ads_removed, state.first_launch
        );
        Ok(Self { state, prefs })
    }

    /// Effective pin quota: free tier plus earned rewarded slots.
    pub fn pin_quota(&self) -> u32 {
        FREE_PIN_LIMIT + self.state.rewarded_pin_bonus
    }

    /// Allows a pin iff the current pinned count is below the quota.
    pub fn can_pin(&self, current_pinned_count: u32) -> PinGate {
        if current_pinned_count < self.pin_quota() {
            PinGate::Allow
        } else {
            PinGate::Deny
        }
    }

    /// Notifies the policy that a thought was saved.
    ///
    /// Edits (`is_new_thought == false`) are a no-op. New saves increment the
    /// durable save counter; the returned directive asks for an interstitial
    /// on every [`INTERSTITIAL_SAVE_CADENCE`]th save unless ads were removed.
    pub fn on_thought_saved(&mut self, is_new_thought: bool) -> RepoResult<SaveDirective> {
        if !is_new_thought {
            return Ok(SaveDirective {
                show_interstitial: false,
            });
        }

        let mut next = self.state.clone();
        next.save_count += 1;
        self.prefs.store(&next)?;
        self.state = next;

        let show_interstitial = !self.state.ads_removed
            && self.state.save_count % INTERSTITIAL_SAVE_CADENCE == 0;
        info!(
            "event=entitlement_save module=policy status=ok save_count={} show_interstitial={}",
            self.state.save_count, show_interstitial
        );
        Ok(SaveDirective { show_interstitial })
    }

    /// Grants one additional pin slot.
    ///
    /// Not idempotent on purpose: callers invoke this exactly once per
    /// confirmed rewarded-ad completion.
    pub fn grant_rewarded_pin_bonus(&mut self) -> RepoResult<()> {
        let mut next = self.state.clone();
        next.rewarded_pin_bonus += 1;
        self.prefs.store(&next)?;
        self.state = next;

        info!(
            "event=entitlement_reward module=policy status=ok rewarded_pin_bonus={}",
            self.state.rewarded_pin_bonus
        );
        Ok(())
    }

    /// Folds a purchase or restore result into the ads-removed flag.
    ///
    /// Monotonic: `reconcile_purchase(false)` after a successful purchase
    /// leaves the flag set.
    pub fn reconcile_purchase(&mut self, owned: bool) -> RepoResult<()> {
        if self.state.ads_removed || !owned {
            return Ok(());
        }

        let mut next = self.state.clone();
        next.ads_removed = true;
        self.prefs.store(&next)?;
        self.state = next;

        info!("event=entitlement_purchase module=policy status=ok ads_removed=true");
        Ok(())
    }

    pub fn ads_removed(&self) -> bool {
        self.state.ads_removed
    }

    pub fn is_first_launch(&self) -> bool {
        self.state.first_launch
    }

    /// Clears the first-launch flag once onboarding has been shown.
    pub fn complete_first_launch(&mut self) -> RepoResult<()> {
        if !self.state.first_launch {
            return Ok(());
        }

        let mut next = self.state.clone();
        next.first_launch = false;
        self.prefs.store(&next)?;
        self.state = next;
        Ok(())
    }

    pub fn snapshot(&self) -> &EntitlementSnapshot {
        &self.state
    }
}
