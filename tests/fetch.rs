// tests/fetch.rs

//! Bundle fetch, verification and promotion against a mock release host.

mod common;

use common::{
    BUNDLE_NAME, MockHost, MockPackage, TAG_NEW, TAG_OLD, test_config, test_session,
};
use cpbundle::bundle::{ArchiveStore, BundleFetcher, BundleVerifier};
use cpbundle::{BundleRelease, BundleSession, Error, ReleaseHost, Result, UpdateOutcome};
use indicatif::ProgressBar;
use std::io::Write;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};
use std::thread;
use tempfile::TempDir;

fn release_packages(version: &str) -> Vec<MockPackage> {
    vec![
        MockPackage::file("neopixel", version),
        MockPackage::dir("adafruit_display_text", version),
    ]
}

#[test]
fn test_fetch_latest_from_empty_cache() {
    let cache = TempDir::new().unwrap();
    let config = test_config(cache.path());
    let host = MockHost::new();
    host.publish(TAG_OLD, release_packages("1.0.0"));
    let session = test_session(&config, host.clone());

    let outcome = session.update_bundle().unwrap();
    let UpdateOutcome::Updated {
        release,
        previous,
        report,
    } = outcome
    else {
        panic!("expected an update");
    };

    assert_eq!(release.tag, TAG_OLD);
    assert_eq!(previous, None);
    assert!(report.is_complete());
    assert_eq!(report.extracted.len(), 2);
    assert!(release.manifest_path().is_file());
    assert!(release.lib_dir("py").join("neopixel.py").is_file());
    assert!(release.lib_dir("9.x-mpy").join("neopixel.mpy").is_file());
    assert!(
        release
            .lib_dir("9.x-mpy")
            .join("adafruit_display_text/__init__.mpy")
            .is_file()
    );
    assert_eq!(session.current().unwrap().tag, TAG_OLD);

    // No temp downloads left behind
    let leftovers: Vec<_> = std::fs::read_dir(&release.dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_already_current_skips_download() {
    let cache = TempDir::new().unwrap();
    let config = test_config(cache.path());
    let host = MockHost::new();
    host.publish(TAG_OLD, release_packages("1.0.0"));
    let session = test_session(&config, host.clone());

    session.update_bundle().unwrap();
    let requests = host.archive_requests();

    let outcome = session.update_bundle().unwrap();
    assert!(matches!(outcome, UpdateOutcome::AlreadyCurrent(ref r) if r.tag == TAG_OLD));
    assert_eq!(host.archive_requests(), requests);
}

#[test]
fn test_newer_tag_is_promoted_and_old_tag_retired() {
    let cache = TempDir::new().unwrap();
    let config = test_config(cache.path());
    let host = MockHost::new();
    host.publish(TAG_OLD, release_packages("1.0.0"));
    let session = test_session(&config, host.clone());
    session.update_bundle().unwrap();

    host.publish(TAG_NEW, release_packages("1.1.0"));
    let outcome = session.update_bundle().unwrap();
    session.wait_for_cleanup();

    match outcome {
        UpdateOutcome::Updated {
            release, previous, ..
        } => {
            assert_eq!(release.tag, TAG_NEW);
            assert_eq!(previous.as_deref(), Some(TAG_OLD));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(session.store().list_cached_tags().unwrap(), vec![TAG_NEW]);

    let catalog = session.bundle_catalog("py").unwrap();
    assert_eq!(catalog["neopixel"].version, "1.1.0");
}

#[test]
fn test_partial_fetch_fails_verification_and_keeps_previous() {
    let cache = TempDir::new().unwrap();
    let config = test_config(cache.path());
    let host = MockHost::new();
    host.publish(TAG_OLD, release_packages("1.0.0"));
    let session = test_session(&config, host.clone());
    session.update_bundle().unwrap();

    host.publish(TAG_NEW, release_packages("1.1.0"));
    host.fail_suffix(TAG_NEW, "9.x-mpy");

    let err = session.update_bundle().unwrap_err();
    assert!(matches!(err, Error::Verification(_)), "got {err}");
    assert!(err.is_retryable());
    assert_eq!(session.current().unwrap().tag, TAG_OLD);
    assert_eq!(
        session.bundle_catalog("py").unwrap()["neopixel"].version,
        "1.0.0"
    );

    // The healthy variant was still extracted next to the failed one
    let partial = BundleRelease::new(TAG_NEW, session.store().tag_dir(TAG_NEW), BUNDLE_NAME);
    assert!(partial.lib_dir("py").join("neopixel.py").is_file());
    assert!(!partial.lib_dir("9.x-mpy").exists());

    // The next update retries the incomplete tag
    host.heal();
    let outcome = session.update_bundle().unwrap();
    session.wait_for_cleanup();
    assert_eq!(outcome.release().tag, TAG_NEW);
    assert_eq!(session.store().list_cached_tags().unwrap(), vec![TAG_NEW]);
}

#[test]
fn test_failed_variant_is_reported_beside_extracted_ones() {
    let cache = TempDir::new().unwrap();
    let config = test_config(cache.path());
    let host = MockHost::new();
    host.publish(TAG_NEW, release_packages("1.1.0"));
    host.fail_suffix(TAG_NEW, "9.x-mpy");

    let fetcher = BundleFetcher::new(
        host.clone(),
        ArchiveStore::with_dir_trash(cache.path()),
        BUNDLE_NAME,
        config.suffixes.clone(),
    );
    let report = fetcher.fetch_release(TAG_NEW).unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.extracted, vec![("py".to_string(), 2)]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "9.x-mpy");
    assert!(report.failed[0].1.contains("connection reset"));
    assert!(report.release.manifest_path().is_file());
    assert!(report.release.lib_dir("py").join("neopixel.py").is_file());
}

#[test]
fn test_manifest_failure_fails_fetch() {
    let cache = TempDir::new().unwrap();
    let config = test_config(cache.path());
    let host = MockHost::new();
    host.publish(TAG_OLD, release_packages("1.0.0"));
    let session = test_session(&config, host.clone());
    session.update_bundle().unwrap();

    host.publish(TAG_NEW, release_packages("1.1.0"));
    host.fail_manifest(TAG_NEW);

    let err = session.update_bundle().unwrap_err();
    assert!(matches!(err, Error::Network(_)), "got {err}");
    assert_eq!(session.current().unwrap().tag, TAG_OLD);

    // Both variants landed, but without a manifest the tag is unusable
    let partial = BundleRelease::new(TAG_NEW, session.store().tag_dir(TAG_NEW), BUNDLE_NAME);
    assert!(partial.lib_dir("py").join("neopixel.py").is_file());
    assert!(partial.lib_dir("9.x-mpy").join("neopixel.mpy").is_file());
    assert!(!partial.manifest_path().exists());

    let verifier = BundleVerifier::new(
        ArchiveStore::with_dir_trash(cache.path()),
        BUNDLE_NAME,
        config.suffixes.clone(),
    );
    assert!(!verifier.verify(TAG_NEW));
}

#[test]
fn test_restart_ignores_incomplete_newer_tag() {
    let cache = TempDir::new().unwrap();
    let config = test_config(cache.path());
    let host = MockHost::new();
    host.publish(TAG_OLD, release_packages("1.0.0"));
    host.publish(TAG_NEW, release_packages("1.1.0"));
    host.fail_suffix(TAG_NEW, "py");

    let session = test_session(&config, host.clone());
    session.update_to(TAG_OLD).unwrap();
    assert!(session.update_bundle().is_err());
    drop(session);

    let restarted = test_session(&config, host);
    let release = restarted.load_cached().unwrap().unwrap();
    restarted.wait_for_cleanup();
    assert_eq!(release.tag, TAG_OLD);
    assert_eq!(restarted.store().list_cached_tags().unwrap(), vec![TAG_OLD]);
}

#[test]
fn test_update_to_rejects_malformed_tag() {
    let cache = TempDir::new().unwrap();
    let config = test_config(cache.path());
    let session = test_session(&config, MockHost::new());

    assert!(matches!(
        session.update_to("latest"),
        Err(Error::Resolution(_))
    ));
    assert!(session.current().is_none());
}

#[test]
fn test_unpublished_tag_reports_network_error() {
    let cache = TempDir::new().unwrap();
    let config = test_config(cache.path());
    let session = test_session(&config, MockHost::new());

    assert!(session.update_to(TAG_NEW).is_err());
    assert!(session.current().is_none());

    let verifier = BundleVerifier::new(
        ArchiveStore::with_dir_trash(cache.path()),
        BUNDLE_NAME,
        config.suffixes.clone(),
    );
    assert!(!verifier.verify(TAG_NEW));
}

/// Call a [`GatedHost`] parks in
#[derive(Debug, Clone, PartialEq)]
enum Gate {
    LatestTag,
    Archive(&'static str),
}

/// Host that blocks at one call until released by the test
struct GatedHost {
    inner: Arc<MockHost>,
    gate: Gate,
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl GatedHost {
    /// Returns the host with its `entered` receiver and `release` sender
    fn new(inner: Arc<MockHost>, gate: Gate) -> (Arc<Self>, Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = channel();
        let (release_tx, release_rx) = channel();
        let host = Arc::new(Self {
            inner,
            gate,
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        (host, entered_rx, release_tx)
    }

    fn pass(&self, at: Gate) {
        if self.gate == at {
            self.entered.lock().unwrap().send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
        }
    }
}

impl ReleaseHost for GatedHost {
    fn latest_tag(&self) -> Result<String> {
        self.pass(Gate::LatestTag);
        self.inner.latest_tag()
    }

    fn fetch_archive(
        &self,
        tag: &str,
        suffix: &str,
        out: &mut dyn Write,
        progress: Option<&ProgressBar>,
    ) -> Result<u64> {
        if matches!(self.gate, Gate::Archive(gated) if gated == suffix) {
            self.pass(self.gate.clone());
        }
        self.inner.fetch_archive(tag, suffix, out, progress)
    }

    fn fetch_manifest(&self, tag: &str) -> Result<Vec<u8>> {
        self.inner.fetch_manifest(tag)
    }
}

#[test]
fn test_concurrent_update_is_busy() {
    let cache = TempDir::new().unwrap();
    let config = test_config(cache.path());
    let inner = MockHost::new();
    inner.publish(TAG_OLD, release_packages("1.0.0"));

    let (host, entered, release) = GatedHost::new(inner, Gate::LatestTag);
    let session = BundleSession::new(
        &config,
        host,
        ArchiveStore::with_dir_trash(&config.cache_root()),
    );

    thread::scope(|s| {
        let first = s.spawn(|| session.update_bundle());

        entered.recv().unwrap();
        assert!(matches!(session.update_bundle(), Err(Error::Busy)));
        release.send(()).unwrap();

        let outcome = first.join().unwrap().unwrap();
        assert_eq!(outcome.release().tag, TAG_OLD);
    });

    assert_eq!(session.current().unwrap().tag, TAG_OLD);
}

#[test]
fn test_second_session_keeps_in_flight_tag() {
    let cache = TempDir::new().unwrap();
    let config = test_config(cache.path());
    let inner = MockHost::new();
    inner.publish(TAG_OLD, release_packages("1.0.0"));
    test_session(&config, inner.clone()).update_bundle().unwrap();
    inner.publish(TAG_NEW, release_packages("1.1.0"));

    let (host, entered, release) = GatedHost::new(inner.clone(), Gate::Archive("py"));
    let fetching = BundleSession::new(
        &config,
        host,
        ArchiveStore::with_dir_trash(&config.cache_root()),
    );
    assert_eq!(fetching.load_cached().unwrap().unwrap().tag, TAG_OLD);

    thread::scope(|s| {
        let first = s.spawn(|| fetching.update_bundle());
        entered.recv().unwrap();

        // A second session opening the same cache mid-fetch
        let other = test_session(&config, inner.clone());
        assert_eq!(other.load_cached().unwrap().unwrap().tag, TAG_OLD);
        other.wait_for_cleanup();
        assert!(other.store().tag_dir(TAG_NEW).is_dir());
        assert!(matches!(other.update_bundle(), Err(Error::Busy)));
        drop(other);

        release.send(()).unwrap();
        let outcome = first.join().unwrap().unwrap();
        assert!(matches!(
            outcome,
            UpdateOutcome::Updated { ref release, .. } if release.tag == TAG_NEW
        ));
    });

    fetching.wait_for_cleanup();
    assert_eq!(
        fetching.store().list_cached_tags().unwrap(),
        vec![TAG_NEW]
    );
}
