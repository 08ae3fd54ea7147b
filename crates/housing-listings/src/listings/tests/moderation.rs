use super::common::*;
use crate::listings::domain::{FlatId, FlatStatus, HouseId, ModeratorId, Role};
use crate::listings::moderation::partitions_to_invalidate;
use crate::listings::service::ListingError;
use crate::listings::store::Entity;
use crate::listings::transition::ModerationOutcome;
use crate::listings::{Flat, ListingCache, ListingService, StatusChange};
use std::sync::Arc;

#[tokio::test]
async fn create_flat_ignores_supplied_status_and_moderator() {
    let (service, store, _) = build_service();
    let house = service.create_house(new_house()).await.expect("house");

    let mut payload = new_flat(house.id);
    payload.status = Some(FlatStatus::Approved);
    payload.moderator_id = Some(ModeratorId(5));

    let flat = service.create_flat(payload).await.expect("flat created");
    assert_eq!(flat.status, FlatStatus::Created);
    assert_eq!(flat.moderator_id, None);

    let stored = store.inner.flat(flat.id).expect("read").expect("present");
    assert_eq!(stored, flat);
}

#[tokio::test]
async fn create_flat_strictly_advances_house_update_time() {
    let (service, store, _) = build_service();
    let house = service.create_house(new_house()).await.expect("house");
    assert!(house.updated_at >= house.created_at);

    let mut previous = house.updated_at;
    for number in 1..=3 {
        let mut payload = new_flat(house.id);
        payload.number = number;
        service.create_flat(payload).await.expect("flat");

        let current = store
            .inner
            .house(house.id)
            .expect("read")
            .expect("present")
            .updated_at;
        assert!(current > previous, "update_at must strictly increase");
        previous = current;
    }
}

#[tokio::test]
async fn create_flat_for_unknown_house_is_not_found() {
    let (service, _, cache) = build_service();

    match service.create_flat(new_flat(HouseId(404))).await {
        Err(ListingError::NotFound(Entity::House(HouseId(404)))) => {}
        other => panic!("expected missing house, got {other:?}"),
    }
    assert!(cache.deleted().is_empty(), "failed writes must not invalidate");
}

#[tokio::test]
async fn create_flat_rejects_malformed_input() {
    let (service, _, _) = build_service();
    let house = service.create_house(new_house()).await.expect("house");

    let mut payload = new_flat(house.id);
    payload.price = -1;

    assert!(matches!(
        service.create_flat(payload).await,
        Err(ListingError::Validation(_))
    ));
}

#[tokio::test]
async fn create_flat_invalidates_only_the_moderator_partition() {
    let (service, _, cache) = build_service();
    let house = service.create_house(new_house()).await.expect("house");

    service.create_flat(new_flat(house.id)).await.expect("flat");

    assert_eq!(cache.deleted(), vec![key(house.id, Role::Moderator)]);
}

#[tokio::test]
async fn claim_reject_approve_scenario() {
    let (service, store, cache) = build_service();
    let house = service.create_house(new_house()).await.expect("house");
    let flat = service.create_flat(new_flat(house.id)).await.expect("flat");

    let claimed = service
        .update_flat(change(&flat, FlatStatus::OnModeration, 7))
        .await
        .expect("claim");
    let receipt = claimed.applied().expect("claim applied");
    assert_eq!(receipt.flat.status, FlatStatus::OnModeration);
    assert_eq!(receipt.flat.moderator_id, Some(ModeratorId(7)));
    assert_eq!(receipt.handled_by, ModeratorId(7));

    cache.clear();
    let contested = service
        .update_flat(change(&flat, FlatStatus::OnModeration, 9))
        .await
        .expect("rejection is not an error");
    match contested {
        ModerationOutcome::Rejected(rejection) => {
            assert_eq!(rejection.flat_id, flat.id);
            assert_eq!(rejection.held_by, Some(ModeratorId(7)));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert!(cache.deleted().is_empty(), "rejections must not invalidate");
    let persisted = store.inner.flat(flat.id).expect("read").expect("present");
    assert_eq!(persisted.status, FlatStatus::OnModeration);
    assert_eq!(persisted.moderator_id, Some(ModeratorId(7)));

    let approved = service
        .update_flat(change(&flat, FlatStatus::Approved, 7))
        .await
        .expect("approve");
    let receipt = approved.applied().expect("approval applied");
    assert_eq!(receipt.flat.status, FlatStatus::Approved);
    assert_eq!(receipt.flat.moderator_id, None);
    assert_eq!(receipt.handled_by, ModeratorId(7));
    assert_eq!(receipt.flat.price, flat.price);
    assert_eq!(receipt.flat.number, flat.number);

    let mut deleted = cache.deleted();
    deleted.sort();
    assert_eq!(
        deleted,
        vec![key(house.id, Role::Client), key(house.id, Role::Moderator)]
    );
}

#[tokio::test]
async fn declining_invalidates_only_the_moderator_partition() {
    let (service, _, cache) = build_service();
    let house = service.create_house(new_house()).await.expect("house");
    let flat = service.create_flat(new_flat(house.id)).await.expect("flat");
    service
        .update_flat(change(&flat, FlatStatus::OnModeration, 3))
        .await
        .expect("claim");

    cache.clear();
    let outcome = service
        .update_flat(change(&flat, FlatStatus::Declined, 3))
        .await
        .expect("decline");

    assert_eq!(
        outcome.applied().expect("applied").flat.status,
        FlatStatus::Declined
    );
    assert_eq!(cache.deleted(), vec![key(house.id, Role::Moderator)]);
}

#[tokio::test]
async fn holder_can_move_the_flat_to_any_status() {
    for target in [
        FlatStatus::Created,
        FlatStatus::OnModeration,
        FlatStatus::Approved,
        FlatStatus::Declined,
    ] {
        let (service, _, _) = build_service();
        let house = service.create_house(new_house()).await.expect("house");
        let flat = service.create_flat(new_flat(house.id)).await.expect("flat");
        service
            .update_flat(change(&flat, FlatStatus::OnModeration, 4))
            .await
            .expect("claim");

        let outcome = service
            .update_flat(change(&flat, target, 4))
            .await
            .expect("transition");
        let receipt = outcome.applied().expect("holder is never rejected");
        assert_eq!(receipt.flat.status, target);
        assert!(receipt.flat.claim_is_consistent());
    }
}

#[tokio::test]
async fn moderator_is_set_only_while_on_moderation() {
    let (service, store, _) = build_service();
    let house = service.create_house(new_house()).await.expect("house");
    let flat = service.create_flat(new_flat(house.id)).await.expect("flat");
    assert!(flat.claim_is_consistent());

    let steps = [
        (FlatStatus::OnModeration, 1),
        (FlatStatus::Declined, 1),
        (FlatStatus::OnModeration, 2),
        (FlatStatus::Approved, 1),
        (FlatStatus::Created, 2),
        (FlatStatus::Approved, 3),
    ];

    for (status, moderator) in steps {
        let outcome = service
            .update_flat(change(&flat, status, moderator))
            .await
            .expect("transition");
        if let Some(receipt) = outcome.applied() {
            assert!(receipt.flat.claim_is_consistent());
        }
        let persisted = store.inner.flat(flat.id).expect("read").expect("present");
        assert!(persisted.claim_is_consistent(), "invariant broken: {persisted:?}");
    }
}

#[tokio::test]
async fn update_unknown_flat_is_not_found() {
    let (service, _, _) = build_service();

    let missing = StatusChange {
        flat_id: FlatId(999),
        status: FlatStatus::Approved,
        moderator_id: ModeratorId(1),
    };

    match service.update_flat(missing).await {
        Err(ListingError::NotFound(Entity::Flat(FlatId(999)))) => {}
        other => panic!("expected missing flat, got {other:?}"),
    }
}

#[tokio::test]
async fn invalidation_failures_do_not_fail_the_write() {
    let (service, store, cache) = build_service();
    let house = service.create_house(new_house()).await.expect("house");
    let flat = service.create_flat(new_flat(house.id)).await.expect("flat");

    cache.clear();
    cache.fail(true);
    let outcome = service
        .update_flat(change(&flat, FlatStatus::Approved, 2))
        .await
        .expect("write survives cache outage");

    assert!(outcome.applied().is_some());
    let mut attempted = cache.deleted();
    attempted.sort();
    assert_eq!(
        attempted,
        vec![key(house.id, Role::Client), key(house.id, Role::Moderator)]
    );
    let persisted = store.inner.flat(flat.id).expect("read").expect("present");
    assert_eq!(persisted.status, FlatStatus::Approved);
}

#[tokio::test]
async fn store_outages_surface_as_errors() {
    let service = ListingService::new(
        Arc::new(UnavailableStore),
        ListingCache::with_default_ttl(Arc::new(RecordingCache::default())),
    );

    assert!(matches!(
        service.create_house(new_house()).await,
        Err(ListingError::StoreUnavailable(_))
    ));
    assert!(matches!(
        service
            .update_flat(StatusChange {
                flat_id: FlatId(1),
                status: FlatStatus::Approved,
                moderator_id: ModeratorId(1),
            })
            .await,
        Err(ListingError::StoreUnavailable(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_admit_exactly_one_moderator() {
    const CONTENDERS: i64 = 16;

    let (service, store, _) = build_service();
    let service = Arc::new(service);
    let house = service.create_house(new_house()).await.expect("house");
    let flat = service.create_flat(new_flat(house.id)).await.expect("flat");

    let mut handles = Vec::new();
    for moderator in 1..=CONTENDERS {
        let service = Arc::clone(&service);
        let flat = flat.clone();
        handles.push(tokio::spawn(async move {
            service
                .update_flat(change(&flat, FlatStatus::OnModeration, moderator))
                .await
                .expect("claim attempt")
        }));
    }

    let mut winners = Vec::new();
    let mut rejected = 0;
    for handle in handles {
        match handle.await.expect("task joins") {
            ModerationOutcome::Applied(receipt) => winners.push(receipt.handled_by),
            ModerationOutcome::Rejected(_) => rejected += 1,
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(rejected, CONTENDERS - 1);
    let persisted = store.inner.flat(flat.id).expect("read").expect("present");
    assert_eq!(persisted.moderator_id, Some(winners[0]));
}

#[test]
fn invalidation_policy_depends_on_resulting_status() {
    let flat = |status| Flat {
        id: FlatId(1),
        house_id: HouseId(100),
        price: 1,
        rooms: 1,
        number: 1,
        status,
        moderator_id: None,
    };

    let approved = partitions_to_invalidate(&flat(FlatStatus::Approved));
    assert_eq!(approved.len(), 2);
    assert!(approved.iter().any(|key| key.role == Role::Client));

    for status in [
        FlatStatus::Created,
        FlatStatus::OnModeration,
        FlatStatus::Declined,
    ] {
        let keys = partitions_to_invalidate(&flat(status));
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].role, Role::Moderator);
    }
}
