mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{TimeDelta, TimeZone, Utc};

use portal_tracks::archive::HeadObject;
use portal_tracks::clock::{Clock, ManualClock};
use portal_tracks::domain::{ArchiveStatus, RestoreTier};
use portal_tracks::error::PortalError;
use portal_tracks::locator::StorageObjectLocator;
use portal_tracks::portal::PresignOptions;

use common::{MockPortal, primary, secondary};

fn locator(portal: MockPortal) -> (StorageObjectLocator<Arc<MockPortal>, Arc<ManualClock>>, Arc<MockPortal>, Arc<ManualClock>) {
    let portal = Arc::new(portal);
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
    ));
    let locator = StorageObjectLocator::with_clock(
        Arc::clone(&portal),
        Arc::clone(&clock),
        Duration::from_secs(60),
        16,
    );
    (locator, portal, clock)
}

#[tokio::test]
async fn presign_cached_within_ttl() {
    let (locator, portal, clock) = locator(MockPortal::new());
    let object = primary("7", "SBJ001/a.bam");

    let first = locator
        .get_presigned_url(&object, &PresignOptions::default())
        .await
        .unwrap();
    clock.advance(TimeDelta::seconds(30));
    let second = locator
        .get_presigned_url(&object, &PresignOptions::default())
        .await
        .unwrap();

    assert_eq!(first.url, second.url);
    assert_eq!(portal.presign_count(), 1);
}

#[tokio::test]
async fn presign_refetched_once_after_ttl() {
    let (locator, portal, clock) = locator(MockPortal::new());
    let object = primary("7", "SBJ001/a.bam");
    let options = PresignOptions::default();

    let first = locator.get_presigned_url(&object, &options).await.unwrap();
    clock.advance(TimeDelta::seconds(60));
    let second = locator.get_presigned_url(&object, &options).await.unwrap();
    let third = locator.get_presigned_url(&object, &options).await.unwrap();

    assert_ne!(first.url, second.url);
    assert_eq!(second.url, third.url);
    assert_eq!(portal.presign_count(), 2);
}

#[tokio::test]
async fn presign_ttl_capped_by_url_expiry() {
    let portal = MockPortal::new();
    *portal.signed_url_suffix.lock().unwrap() = Some("&X-Amz-Expires=10".to_string());
    let (locator, portal, clock) = locator(portal);
    let object = primary("7", "SBJ001/a.bam");
    let options = PresignOptions::default();

    let access = locator.get_presigned_url(&object, &options).await.unwrap();
    assert_eq!(access.ttl, Duration::from_secs(10));

    clock.advance(TimeDelta::seconds(11));
    locator.get_presigned_url(&object, &options).await.unwrap();
    assert_eq!(portal.presign_count(), 2);
}

#[tokio::test]
async fn disposition_is_part_of_the_cache_key() {
    let (locator, portal, _clock) = locator(MockPortal::new());
    let object = secondary("fil.1", "analysis/a.vcf.gz");

    locator
        .get_presigned_url(&object, &PresignOptions::default())
        .await
        .unwrap();
    locator
        .get_presigned_url(&object, &PresignOptions::attachment())
        .await
        .unwrap();

    assert_eq!(portal.presign_count(), 2);
}

#[tokio::test]
async fn presign_error_is_surfaced_and_not_cached() {
    let portal = MockPortal::new();
    portal.fail_presign("9");
    let (locator, portal, _clock) = locator(portal);
    let object = primary("9", "SBJ001/a.bam");

    let err = locator
        .get_presigned_url(&object, &PresignOptions::default())
        .await
        .unwrap_err();
    assert_matches!(err, PortalError::PresignFailed { reason, .. } if reason == "AccessDenied");
    assert_eq!(locator.cached_entries(), 0);

    let _ = locator
        .get_presigned_url(&object, &PresignOptions::default())
        .await;
    assert_eq!(portal.presign_count(), 2);
}

#[tokio::test]
async fn failed_refresh_keeps_earlier_entry_for_other_objects() {
    let (locator, portal, _clock) = locator(MockPortal::new());
    let good = primary("1", "SBJ001/a.bam");
    let bad = primary("2", "SBJ001/b.bam");
    portal.fail_presign("2");

    let cached = locator
        .get_presigned_url(&good, &PresignOptions::default())
        .await
        .unwrap();
    assert!(
        locator
            .get_presigned_url(&bad, &PresignOptions::default())
            .await
            .is_err()
    );
    let again = locator
        .get_presigned_url(&good, &PresignOptions::default())
        .await
        .unwrap();
    assert_eq!(cached, again);
    assert_eq!(portal.presign_count_for("1"), 1);
}

#[tokio::test]
async fn invalidated_context_skips_cache_write() {
    let (locator, portal, _clock) = locator(MockPortal::new());
    let object = primary("3", "SBJ001/c.bam");
    let options = PresignOptions::default();

    let (access, ()) = tokio::join!(locator.get_presigned_url(&object, &options), async {
        locator.invalidate_context();
    });
    assert!(access.is_ok());
    assert_eq!(locator.cached_entries(), 0);

    locator.get_presigned_url(&object, &options).await.unwrap();
    assert_eq!(locator.cached_entries(), 1);
    assert_eq!(portal.presign_count(), 2);
}

#[tokio::test]
async fn status_is_classified() {
    let portal = MockPortal::new()
        .with_head("1", HeadObject::with_storage_class("DEEP_ARCHIVE"))
        .with_head(
            "2",
            HeadObject::with_storage_class("DEEP_ARCHIVE").restore(r#"ongoing-request="true""#),
        );
    let (locator, _portal, _clock) = locator(portal);

    assert_eq!(
        locator.get_status(&primary("1", "a.bam")).await.unwrap(),
        ArchiveStatus::Archived
    );
    assert_eq!(
        locator.get_status(&primary("2", "b.bam")).await.unwrap(),
        ArchiveStatus::Restoring
    );
    assert_eq!(
        locator.get_status(&primary("3", "c.bam")).await.unwrap(),
        ArchiveStatus::Available
    );
}

#[tokio::test]
async fn status_failure_is_unavailable() {
    let portal = MockPortal::new();
    portal.fail_status("4");
    let (locator, _portal, _clock) = locator(portal);

    let err = locator.get_status(&primary("4", "d.bam")).await.unwrap_err();
    assert_matches!(err, PortalError::StatusUnavailable { .. });
}

#[tokio::test]
async fn restore_is_sent_for_primary_objects() {
    let (locator, portal, _clock) = locator(MockPortal::new());
    let outcome = locator
        .request_restore(&primary("5", "e.bam"), 7, RestoreTier::Bulk)
        .await
        .unwrap();
    assert_eq!(outcome.days, 7);
    assert_eq!(outcome.tier, RestoreTier::Bulk);
    assert_eq!(*portal.restores.lock().unwrap(), vec![("5".to_string(), 7)]);
}

#[tokio::test]
async fn restore_rejections() {
    let (locator, portal, _clock) = locator(MockPortal::new());

    let err = locator
        .request_restore(&secondary("fil.1", "a.bam"), 7, RestoreTier::Bulk)
        .await
        .unwrap_err();
    assert_matches!(err, PortalError::RestoreRejected { .. });

    let err = locator
        .request_restore(&primary("5", "e.bam"), 0, RestoreTier::Standard)
        .await
        .unwrap_err();
    assert_matches!(err, PortalError::RestoreRejected { .. });
    assert!(portal.restores.lock().unwrap().is_empty());

    *portal.restore_error.lock().unwrap() = Some("RestoreAlreadyInProgress".to_string());
    let err = locator
        .request_restore(&primary("5", "e.bam"), 3, RestoreTier::Standard)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        PortalError::RestoreRejected { reason, .. } if reason == "RestoreAlreadyInProgress"
    );
}

#[tokio::test]
async fn cached_url_expires_with_its_signature_not_the_response() {
    let portal = MockPortal::new();
    *portal.signed_url_suffix.lock().unwrap() = Some("&X-Amz-Expires=10".to_string());
    let (locator, portal, clock) = locator(portal);
    portal.delay_presign(Arc::clone(&clock), TimeDelta::seconds(4));
    let object = primary("7", "SBJ001/a.bam");
    let options = PresignOptions::default();
    let start = clock.now();

    let first = locator.get_presigned_url(&object, &options).await.unwrap();
    assert_eq!(first.issued_at, start);
    assert_eq!(first.expires_at(), start + TimeDelta::seconds(10));

    clock.advance(TimeDelta::seconds(5));
    let cached = locator.get_presigned_url(&object, &options).await.unwrap();
    assert_eq!(cached.url, first.url);
    assert_eq!(portal.presign_count(), 1);

    clock.advance(TimeDelta::seconds(1));
    let refreshed = locator.get_presigned_url(&object, &options).await.unwrap();
    assert_ne!(refreshed.url, first.url);
    assert_eq!(portal.presign_count(), 2);
}

#[tokio::test]
async fn url_dead_on_arrival_is_returned_but_not_cached() {
    let portal = MockPortal::new();
    *portal.signed_url_suffix.lock().unwrap() = Some("&X-Amz-Expires=3".to_string());
    let (locator, portal, clock) = locator(portal);
    portal.delay_presign(Arc::clone(&clock), TimeDelta::seconds(4));
    let object = primary("7", "SBJ001/a.bam");

    let access = locator
        .get_presigned_url(&object, &PresignOptions::default())
        .await
        .unwrap();
    assert!(!access.is_fresh(clock.now()));
    assert_eq!(locator.cached_entries(), 0);
}

#[tokio::test]
async fn signing_time_in_url_bounds_the_entry() {
    let portal = MockPortal::new();
    // Signed two seconds before the locator's clock start.
    *portal.signed_url_suffix.lock().unwrap() =
        Some("&X-Amz-Date=20240301T085958Z&X-Amz-Expires=10".to_string());
    let (locator, portal, clock) = locator(portal);
    let object = primary("7", "SBJ001/a.bam");
    let options = PresignOptions::default();

    let access = locator.get_presigned_url(&object, &options).await.unwrap();
    assert_eq!(
        access.issued_at,
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 59, 58).unwrap()
    );

    clock.advance(TimeDelta::seconds(8));
    locator.get_presigned_url(&object, &options).await.unwrap();
    assert_eq!(portal.presign_count(), 2);
}
