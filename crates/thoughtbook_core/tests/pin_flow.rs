use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use thoughtbook_core::db::open_db_in_memory;
use thoughtbook_core::{
    AdGateway, BillingError, BillingGateway, Category, EntitlementPolicy, InterstitialShow,
    JournalService, NewThought, PinFlowState, PurchaseOutcome, RewardedShow, ServiceError,
    SqlitePrefsRepository, ThoughtStore, REMOVE_ADS_PRODUCT_ID,
};

struct FakeAds {
    interstitial_ready: bool,
    rewarded_ready: bool,
    rewarded_result: RewardedShow,
}

impl Default for FakeAds {
    fn default() -> Self {
        Self {
            interstitial_ready: false,
            rewarded_ready: false,
            rewarded_result: RewardedShow::Earned,
        }
    }
}

impl AdGateway for FakeAds {
    fn load_interstitial(&mut self) {
        self.interstitial_ready = true;
    }

    fn show_interstitial(&mut self) -> InterstitialShow {
        if !self.interstitial_ready {
            return InterstitialShow::NotReady;
        }
        self.interstitial_ready = false;
        InterstitialShow::Dismissed
    }

    fn load_rewarded(&mut self) {
        self.rewarded_ready = true;
    }

    fn rewarded_ready(&self) -> bool {
        self.rewarded_ready
    }

    fn show_rewarded(&mut self) -> RewardedShow {
        self.rewarded_ready = false;
        self.rewarded_result
    }
}

#[derive(Default)]
struct FakeBilling {
    owned: BTreeSet<String>,
    query_error: Option<BillingError>,
    purchase_result: Option<PurchaseOutcome>,
}

impl BillingGateway for FakeBilling {
    fn query_owned_products(&mut self) -> Result<BTreeSet<String>, BillingError> {
        match &self.query_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.owned.clone()),
        }
    }

    fn purchase(&mut self, _product_id: &str) -> PurchaseOutcome {
        self.purchase_result
            .clone()
            .unwrap_or(PurchaseOutcome::Success)
    }
}

type Service = JournalService<SqlitePrefsRepository, FakeAds, FakeBilling>;

#[test]
fn interstitial_runs_on_every_fifth_save_when_loaded() {
    let mut service = service(
        FakeAds {
            interstitial_ready: true,
            ..FakeAds::default()
        },
        FakeBilling::default(),
    );

    for save in 1..=5 {
        let receipt = service
            .save_new(&NewThought::new("", format!("entry {save}"), Category::Lesson))
            .unwrap();
        assert_eq!(receipt.interstitial_shown, save == 5);
    }
}

#[test]
fn missing_interstitial_degrades_to_plain_save() {
    let mut service = service(FakeAds::default(), FakeBilling::default());

    for save in 1..=5 {
        let receipt = service
            .save_new(&NewThought::new("", format!("entry {save}"), Category::Lesson))
            .unwrap();
        assert!(!receipt.interstitial_shown);
    }
    assert_eq!(service.policy().snapshot().save_count, 5);
}

#[test]
fn purchase_success_suppresses_future_interstitials() {
    let mut service = service(
        FakeAds {
            interstitial_ready: true,
            ..FakeAds::default()
        },
        FakeBilling::default(),
    );

    let outcome = service.purchase_ad_removal().unwrap();
    assert_eq!(outcome, PurchaseOutcome::Success);
    assert!(service.policy().ads_removed());

    for save in 1..=5 {
        let receipt = service
            .save_new(&NewThought::new("", format!("entry {save}"), Category::Lesson))
            .unwrap();
        assert!(!receipt.interstitial_shown);
    }
}

#[test]
fn edits_do_not_count_as_saves() {
    let mut service = service(FakeAds::default(), FakeBilling::default());

    let receipt = service
        .save_new(&NewThought::new("", "original", Category::Decision))
        .unwrap();
    for _ in 0..6 {
        service
            .save_edit(
                receipt.thought.id,
                &thoughtbook_core::ThoughtPatch {
                    text: Some("edited".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
    }

    assert_eq!(service.policy().snapshot().save_count, 1);
}

#[test]
fn pin_under_quota_is_allowed() {
    let mut service = service(FakeAds::default(), FakeBilling::default());

    let id = save(&mut service, "pin me");
    assert_eq!(service.request_pin_toggle(id).unwrap(), PinFlowState::Allowed);
    assert!(service.store().get_by_id(id).unwrap().unwrap().pinned);
}

#[test]
fn unpin_is_always_allowed_even_at_quota() {
    let mut service = service(FakeAds::default(), FakeBilling::default());

    let pinned = seed_pinned(&mut service, 5);
    assert_eq!(service.store().pinned_count().unwrap(), 5);

    assert_eq!(
        service.request_pin_toggle(pinned[0]).unwrap(),
        PinFlowState::Allowed
    );
    assert_eq!(service.store().pinned_count().unwrap(), 4);
}

#[test]
fn pin_at_quota_without_rewarded_ad_is_denied() {
    let mut service = service(FakeAds::default(), FakeBilling::default());

    seed_pinned(&mut service, 5);
    let extra = save(&mut service, "one too many");

    assert_eq!(service.request_pin_toggle(extra).unwrap(), PinFlowState::Denied);
    assert!(!service.store().get_by_id(extra).unwrap().unwrap().pinned);
}

#[test]
fn pin_at_quota_with_rewarded_ad_offers_it() {
    let mut service = service(
        FakeAds {
            rewarded_ready: true,
            ..FakeAds::default()
        },
        FakeBilling::default(),
    );

    seed_pinned(&mut service, 5);
    let extra = save(&mut service, "one too many");

    assert_eq!(
        service.request_pin_toggle(extra).unwrap(),
        PinFlowState::OfferRewardedAd
    );
    // The toggle is parked until the offer resolves.
    assert!(!service.store().get_by_id(extra).unwrap().unwrap().pinned);
}

#[test]
fn pin_at_quota_with_ads_removed_is_denied_without_offer() {
    let mut service = service(
        FakeAds {
            rewarded_ready: true,
            ..FakeAds::default()
        },
        FakeBilling::default(),
    );

    service.purchase_ad_removal().unwrap();
    seed_pinned(&mut service, 5);
    let extra = save(&mut service, "one too many");

    assert_eq!(service.request_pin_toggle(extra).unwrap(), PinFlowState::Denied);
}

#[test]
fn earned_reward_grants_slot_and_performs_parked_pin() {
    let mut service = service(
        FakeAds {
            rewarded_ready: true,
            ..FakeAds::default()
        },
        FakeBilling::default(),
    );

    seed_pinned(&mut service, 5);
    let extra = save(&mut service, "one too many");

    assert_eq!(
        service.request_pin_toggle(extra).unwrap(),
        PinFlowState::OfferRewardedAd
    );
    assert_eq!(service.confirm_rewarded_pin().unwrap(), PinFlowState::Allowed);

    assert!(service.store().get_by_id(extra).unwrap().unwrap().pinned);
    assert_eq!(service.store().pinned_count().unwrap(), 6);
    assert_eq!(service.policy().snapshot().rewarded_pin_bonus, 1);
}

#[test]
fn failed_reward_denies_and_grants_nothing() {
    let mut service = service(
        FakeAds {
            rewarded_ready: true,
            rewarded_result: RewardedShow::Failed,
            ..FakeAds::default()
        },
        FakeBilling::default(),
    );

    seed_pinned(&mut service, 5);
    let extra = save(&mut service, "one too many");

    service.request_pin_toggle(extra).unwrap();
    assert_eq!(service.confirm_rewarded_pin().unwrap(), PinFlowState::Denied);

    assert_eq!(service.policy().snapshot().rewarded_pin_bonus, 0);
    assert_eq!(service.store().pinned_count().unwrap(), 5);
}

#[test]
fn declining_the_offer_denies_and_clears_it() {
    let mut service = service(
        FakeAds {
            rewarded_ready: true,
            ..FakeAds::default()
        },
        FakeBilling::default(),
    );

    seed_pinned(&mut service, 5);
    let extra = save(&mut service, "one too many");

    service.request_pin_toggle(extra).unwrap();
    assert_eq!(service.decline_rewarded_pin(), PinFlowState::Denied);

    // No offer pending anymore.
    assert_eq!(service.confirm_rewarded_pin().unwrap(), PinFlowState::Idle);
    assert_eq!(service.decline_rewarded_pin(), PinFlowState::Idle);
}

#[test]
fn pin_request_for_unknown_thought_errors() {
    let mut service = service(FakeAds::default(), FakeBilling::default());

    let err = service.request_pin_toggle(999).unwrap_err();
    assert!(matches!(err, ServiceError::ThoughtNotFound(999)));
}

#[test]
fn owned_products_sweep_sets_ads_removed() {
    let mut billing = FakeBilling::default();
    billing.owned.insert(REMOVE_ADS_PRODUCT_ID.to_string());
    let mut service = service(FakeAds::default(), billing);

    assert!(service.reconcile_owned_products().unwrap());
    assert!(service.policy().ads_removed());
}

#[test]
fn billing_failure_leaves_entitlements_untouched() {
    let mut service = service(
        FakeAds::default(),
        FakeBilling {
            query_error: Some(BillingError::Disconnected),
            ..FakeBilling::default()
        },
    );

    assert!(!service.reconcile_owned_products().unwrap());
    assert!(!service.policy().ads_removed());
}

#[test]
fn cancelled_purchase_changes_nothing() {
    let mut service = service(
        FakeAds::default(),
        FakeBilling {
            purchase_result: Some(PurchaseOutcome::Cancel),
            ..FakeBilling::default()
        },
    );

    assert_eq!(service.purchase_ad_removal().unwrap(), PurchaseOutcome::Cancel);
    assert!(!service.policy().ads_removed());
}

#[test]
fn onboarding_flag_completes_through_service() {
    let mut service = service(FakeAds::default(), FakeBilling::default());

    assert!(service.is_first_launch());
    service.complete_onboarding().unwrap();
    assert!(!service.is_first_launch());
}

fn service(ads: FakeAds, billing: FakeBilling) -> Service {
    let conn = Arc::new(Mutex::new(open_db_in_memory().unwrap()));
    let store = ThoughtStore::new(Arc::clone(&conn));
    let policy = EntitlementPolicy::load(SqlitePrefsRepository::new(conn)).unwrap();
    JournalService::new(store, policy, ads, billing)
}

fn save(service: &mut Service, text: &str) -> thoughtbook_core::ThoughtId {
    service
        .save_new(&NewThought::new("", text, Category::Decision))
        .unwrap()
        .thought
        .id
}

fn seed_pinned(service: &mut Service, count: usize) -> Vec<thoughtbook_core::ThoughtId> {
    (0..count)
        .map(|index| {
            let id = save(service, &format!("pinned {index}"));
            assert_eq!(service.request_pin_toggle(id).unwrap(), PinFlowState::Allowed);
            id
        })
        .collect()
}
