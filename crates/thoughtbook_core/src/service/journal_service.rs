//! Journal use-case service.
//!
//! # Responsibility
//! - Drive the save flow: persist, notify the policy, run the interstitial
//!   cadence through the ad gateway.
//! - Drive the pin flow state machine:
//!   `Idle -> Evaluating -> {Allowed, Denied, OfferRewardedAd}`.
//! - Sweep owned products into the entitlement state at startup/restore.
//!
//! # Invariants
//! - Unpinning is always allowed; no quota consult on that transition.
//! - Gateway failures never mutate store or entitlement state.

use crate::gateway::{
    AdGateway, BillingGateway, InterstitialShow, PurchaseOutcome, RewardedShow,
    REMOVE_ADS_PRODUCT_ID,
};
use crate::model::thought::{NewThought, Thought, ThoughtId, ThoughtPatch};
use crate::policy::{EntitlementPolicy, PinGate};
use crate::repo::prefs_repo::PrefsRepository;
use crate::repo::thought_repo::RepoError;
use crate::store::ThoughtStore;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for journal use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Target thought does not exist (e.g. deleted concurrently).
    ThoughtNotFound(ThoughtId),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ThoughtNotFound(id) => write!(f, "thought not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::ThoughtNotFound(_) => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::ThoughtNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Observable states of the pin flow machine.
///
/// `Evaluating` is passed through inside [`JournalService::request_pin_toggle`];
/// the other states are returned to the caller. `OfferRewardedAd` waits for
/// [`JournalService::confirm_rewarded_pin`] or
/// [`JournalService::decline_rewarded_pin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinFlowState {
    Idle,
    Evaluating,
    Allowed,
    Denied,
    OfferRewardedAd,
}

/// Result of saving a new thought.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    pub thought: Thought,
    /// Whether the cadence directive fired and an interstitial actually ran.
    pub interstitial_shown: bool,
}

/// Use-case facade wiring store, policy and platform gateways.
pub struct JournalService<P, A, B>
where
    P: PrefsRepository,
    A: AdGateway,
    B: BillingGateway,
{
    store: ThoughtStore,
    policy: EntitlementPolicy<P>,
    ads: A,
    billing: B,
    /// Thought waiting on a rewarded-ad offer, if any.
    pending_pin: Option<ThoughtId>,
}

impl<P, A, B> JournalService<P, A, B>
where
    P: PrefsRepository,
    A: AdGateway,
    B: BillingGateway,
{
    pub fn new(
        store: ThoughtStore,
        policy: EntitlementPolicy<P>,
        ads: A,
        billing: B,
    ) -> Self {
        Self {
            store,
            policy,
            ads,
            billing,
            pending_pin: None,
        }
    }

    /// Saves a new thought and runs the interstitial cadence.
    ///
    /// A directive without a loaded ad degrades silently: the save still
    /// succeeds and the next interstitial is preloaded.
    pub fn save_new(&mut self, draft: &NewThought) -> Result<SaveReceipt, ServiceError> {
        let thought = self.store.create(draft)?;
        let directive = self.policy.on_thought_saved(true)?;

        let mut interstitial_shown = false;
        if directive.show_interstitial {
            match self.ads.show_interstitial() {
                InterstitialShow::Dismissed => interstitial_shown = true,
                InterstitialShow::NotReady => {
                    info!("event=save_flow module=service status=ok detail=interstitial_not_ready");
                }
            }
            self.ads.load_interstitial();
        }

        Ok(SaveReceipt {
            thought,
            interstitial_shown,
        })
    }

    /// Applies an edit. Edits never advance the save counter or trigger ads.
    pub fn save_edit(
        &mut self,
        id: ThoughtId,
        patch: &ThoughtPatch,
    ) -> Result<Thought, ServiceError> {
        let thought = self.store.update(id, patch)?;
        let _ = self.policy.on_thought_saved(false)?;
        Ok(thought)
    }

    /// Entry transition of the pin flow machine.
    ///
    /// Returns `Allowed` (toggle performed), `Denied`, or `OfferRewardedAd`
    /// (the toggle is parked until the offer resolves).
    pub fn request_pin_toggle(&mut self, id: ThoughtId) -> Result<PinFlowState, ServiceError> {
        let thought = self
            .store
            .get_by_id(id)?
            .ok_or(ServiceError::ThoughtNotFound(id))?;

        if thought.pinned {
            // Unpinning is unconditional.
            self.store.update(id, &ThoughtPatch::pin(false))?;
            info!("event=pin_flow module=service status=ok decision=unpinned id={id}");
            return Ok(PinFlowState::Allowed);
        }

        let pinned_count = self.store.pinned_count()?;
        match self.policy.can_pin(pinned_count) {
            PinGate::Allow => {
                self.store.update(id, &ThoughtPatch::pin(true))?;
                info!("event=pin_flow module=service status=ok decision=allowed id={id}");
                Ok(PinFlowState::Allowed)
            }
            PinGate::Deny => {
                if !self.policy.ads_removed() && self.ads.rewarded_ready() {
                    self.pending_pin = Some(id);
                    info!("event=pin_flow module=service status=ok decision=offer_rewarded id={id}");
                    Ok(PinFlowState::OfferRewardedAd)
                } else {
                    info!("event=pin_flow module=service status=ok decision=denied id={id}");
                    Ok(PinFlowState::Denied)
                }
            }
        }
    }

    /// Resolves a pending rewarded-ad offer by showing the ad.
    ///
    /// A confirmed completion grants one pin slot and performs the parked
    /// toggle; anything else denies without touching entitlements.
    pub fn confirm_rewarded_pin(&mut self) -> Result<PinFlowState, ServiceError> {
        let Some(id) = self.pending_pin.take() else {
            return Ok(PinFlowState::Idle);
        };

        let shown = self.ads.show_rewarded();
        self.ads.load_rewarded();

        match shown {
            RewardedShow::Earned => {
                self.policy.grant_rewarded_pin_bonus()?;

                // Re-run the gate: the quota grew by one, but the pinned set
                // may have changed while the offer was pending.
                let pinned_count = self.store.pinned_count()?;
                match self.policy.can_pin(pinned_count) {
                    PinGate::Allow => {
                        self.store.update(id, &ThoughtPatch::pin(true))?;
                        info!(
                            "event=pin_flow module=service status=ok decision=rewarded_allowed id={id}"
                        );
                        Ok(PinFlowState::Allowed)
                    }
                    PinGate::Deny => Ok(PinFlowState::Denied),
                }
            }
            RewardedShow::Failed => {
                info!("event=pin_flow module=service status=ok decision=rewarded_failed id={id}");
                Ok(PinFlowState::Denied)
            }
        }
    }

    /// Abandons a pending rewarded-ad offer.
    pub fn decline_rewarded_pin(&mut self) -> PinFlowState {
        if self.pending_pin.take().is_some() {
            info!("event=pin_flow module=service status=ok decision=offer_declined");
            return PinFlowState::Denied;
        }
        PinFlowState::Idle
    }

    /// Startup/restore sweep: folds owned products into the entitlement
    /// state. Billing failures leave the state untouched.
    pub fn reconcile_owned_products(&mut self) -> Result<bool, ServiceError> {
        match self.billing.query_owned_products() {
            Ok(products) => {
                let owned = products.contains(REMOVE_ADS_PRODUCT_ID);
                self.policy.reconcile_purchase(owned)?;
                info!(
                    "event=billing_reconcile module=service status=ok remove_ads_owned={owned}"
                );
                Ok(owned)
            }
            Err(err) => {
                warn!("event=billing_reconcile module=service status=error error={err}");
                Ok(false)
            }
        }
    }

    /// Runs the ad-removal purchase. Only a terminal `Success` touches the
    /// entitlement state.
    pub fn purchase_ad_removal(&mut self) -> Result<PurchaseOutcome, ServiceError> {
        let outcome = self.billing.purchase(REMOVE_ADS_PRODUCT_ID);
        match &outcome {
            PurchaseOutcome::Success => {
                self.policy.reconcile_purchase(true)?;
                info!("event=billing_purchase module=service status=ok outcome=success");
            }
            PurchaseOutcome::Cancel => {
                info!("event=billing_purchase module=service status=ok outcome=cancel");
            }
            PurchaseOutcome::Failure(message) => {
                warn!("event=billing_purchase module=service status=error error={message}");
            }
        }
        Ok(outcome)
    }

    /// Preloads both ad formats, typically at startup.
    pub fn preload_ads(&mut self) {
        self.ads.load_interstitial();
        self.ads.load_rewarded();
    }

    pub fn is_first_launch(&self) -> bool {
        self.policy.is_first_launch()
    }

    /// Marks onboarding as shown.
    pub fn complete_onboarding(&mut self) -> Result<(), ServiceError> {
        self.policy.complete_first_launch()?;
        Ok(())
    }

    pub fn store(&self) -> &ThoughtStore {
        &self.store
    }

    pub fn policy(&self) -> &EntitlementPolicy<P> {
        &self.policy
    }
}
