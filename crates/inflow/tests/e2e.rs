//! End-to-end handler executions against local sink directories.

mod common;

use std::sync::Arc;

use common::builders::{FailingBroker, MarkerSuite, RecordingHarvester, RecordingNotifier};
use common::harness::{registry_with_harvester, TestHarness};

use inflow::{
    Disposition, ErrorKind, HandlerContext, HandlerParams, HookError, Hooks, LocalBroker,
    PluginRegistry, PublishActions, StorageBroker,
};

const COMPLIANT_NC: &[u8] = b"CDF\x01 well formed measurement data";
const NONCOMPLIANT_NC: &[u8] = b"CDF\x01 NONCOMPLIANT measurement data";

fn registry_with_suite_and_harvester(
    harvester: Arc<RecordingHarvester>,
) -> Arc<PluginRegistry> {
    let mut registry = PluginRegistry::new();
    registry
        .register_harvester("recording", &[".*"], harvester)
        .unwrap();
    registry
        .register_check_suite(MarkerSuite::new("cf", b"NONCOMPLIANT"))
        .unwrap();
    Arc::new(registry)
}

fn compliance_params() -> HandlerParams {
    let mut params = HandlerParams::default();
    params.check_suites = vec!["cf".to_string()];
    params
}

#[test]
fn test_single_netcdf_compliance_passes() {
    let harness = TestHarness::new();
    let input = harness.write_input("good.nc", COMPLIANT_NC);
    let harvester = RecordingHarvester::new();
    let notifier = RecordingNotifier::new();

    let mut handler = harness
        .runner(&input, registry_with_suite_and_harvester(harvester.clone()))
        .with_params(compliance_params())
        .with_notifier(notifier.clone());
    let outcome = handler.execute().unwrap();

    assert_eq!(outcome.disposition, Disposition::Success);
    assert_eq!(outcome.summary.files.len(), 1);

    let file = &outcome.summary.files[0];
    assert_eq!(file.check, "passed");
    assert!(file.archived && file.harvested && file.stored);

    harness.assert_stored("good.nc");
    harness.assert_archived("good.nc");
    assert_eq!(harvester.calls(), vec!["ingest:good.nc"]);

    let summaries = notifier.summaries();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].disposition, Disposition::Success);
}

#[test]
fn test_zip_with_one_check_failure_fails_fast() {
    let harness = TestHarness::new();
    let input = harness.write_zip(
        "pair.zip",
        &[("a.nc", COMPLIANT_NC), ("b.nc", NONCOMPLIANT_NC)],
    );
    let harvester = RecordingHarvester::new();
    let notifier = RecordingNotifier::new();

    let mut handler = harness
        .runner(&input, registry_with_suite_and_harvester(harvester.clone()))
        .with_params(compliance_params())
        .with_notifier(notifier.clone());
    let outcome = handler.execute().unwrap();

    assert_eq!(outcome.disposition, Disposition::CheckFailed);
    assert_eq!(outcome.error.as_ref().unwrap().0, ErrorKind::CheckFailure);

    // No publish action ran for either file.
    harness.assert_not_stored("a.nc");
    harness.assert_not_stored("b.nc");
    assert!(harvester.calls().is_empty());
    for file in &outcome.summary.files {
        assert!(!file.archived && !file.harvested && !file.stored);
    }

    // The failing file's diagnostics reach the notification.
    let summaries = notifier.summaries();
    let bad = summaries[0]
        .files
        .iter()
        .find(|f| f.name == "b.nc")
        .unwrap();
    assert_eq!(bad.check, "failed");
    assert!(bad.check_log.iter().any(|l| l.contains("cf")));
}

#[test]
fn test_store_failure_after_harvest_is_compensated() {
    let harness = TestHarness::new();
    let input = harness.write_input("a.nc", COMPLIANT_NC);
    let harvester = RecordingHarvester::new();

    let store = Arc::new(FailingBroker::new(
        Box::new(LocalBroker::new(&harness.store_dir)),
        &["a.nc"],
    ));
    let sinks = harness.sinks_with_store(store);

    let mut handler = harness
        .runner_with_sinks(
            &input,
            registry_with_harvester(harvester.clone()),
            sinks,
        );
    let outcome = handler.execute().unwrap();

    assert_eq!(outcome.disposition, Disposition::Failed);
    assert_eq!(outcome.error.as_ref().unwrap().0, ErrorKind::SinkPermanent);

    let file = &outcome.summary.files[0];
    assert!(file.archived);
    assert!(!file.stored);
    assert!(!file.harvested);

    // The compensating deletion was submitted to the harvester.
    assert_eq!(harvester.calls(), vec!["ingest:a.nc", "remove:a.nc"]);
    harness.assert_archived("a.nc");
    harness.assert_not_stored("a.nc");
}

#[test]
fn test_manifest_with_filter_regex() {
    let harness = TestHarness::new();
    harness.write_input("keep.csv", b"a,b\n1,2\n");
    harness.write_input("skip.csv", b"c,d\n3,4\n");
    let manifest = harness.write_manifest("batch.manifest", &["keep.csv", "skip.csv"]);
    let notifier = RecordingNotifier::new();

    let mut params = HandlerParams::default();
    params.default_publish = Some(PublishActions::upload_only());
    params.resolve.exclude = Some(regex::Regex::new("^skip").unwrap());

    let mut handler = harness
        .runner(&manifest, Arc::new(PluginRegistry::new()))
        .with_params(params)
        .with_notifier(notifier.clone());
    let outcome = handler.execute().unwrap();

    assert_eq!(outcome.disposition, Disposition::Success);
    assert_eq!(outcome.summary.files.len(), 1);
    assert_eq!(outcome.summary.files[0].name, "keep.csv");

    harness.assert_stored("keep.csv");
    harness.assert_not_stored("skip.csv");

    // The excluded file does not appear in the notification summary.
    let summaries = notifier.summaries();
    assert!(summaries[0].files.iter().all(|f| f.name != "skip.csv"));
}

#[test]
fn test_late_deletion_replace() {
    let harness = TestHarness::new();
    let input = harness.write_input("a_v2.nc", COMPLIANT_NC);

    // The superseded artifact is already published.
    let store = harness.store_broker();
    let old = harness.write_input("a_v1.nc", b"CDF\x01 old content");
    store.put(&old, "IMOS/a_v1.nc").unwrap();

    let hooks = Hooks::new().with_process(|ctx: &mut HandlerContext| {
        for file in ctx.files.iter_mut() {
            file.set_late_deletion(true);
            file.set_dest_path("IMOS/a_v2.nc")
                .map_err(|e| HookError::new(e.to_string()))?;
            file.set_replaces_path("IMOS/a_v1.nc");
            file.set_publish(PublishActions {
                upload: true,
                delete: true,
                ..PublishActions::default()
            })
            .map_err(|e| HookError::new(e.to_string()))?;
        }
        Ok(())
    });

    let mut handler = harness
        .runner(&input, Arc::new(PluginRegistry::new()))
        .with_hooks(hooks);
    let outcome = handler.execute().unwrap();

    assert_eq!(outcome.disposition, Disposition::Success);
    assert!(outcome.summary.files[0].stored);

    // New content is at the destination, the superseded artifact is gone.
    assert_eq!(harness.read_store("IMOS/a_v2.nc"), COMPLIANT_NC);
    harness.assert_not_stored("IMOS/a_v1.nc");
    assert!(store.exists("IMOS/a_v2.nc").unwrap());
}

#[test]
fn test_process_hook_failure() {
    let harness = TestHarness::new();
    let input = harness.write_input("good.nc", COMPLIANT_NC);
    let harvester = RecordingHarvester::new();
    let notifier = RecordingNotifier::new();

    let hooks = Hooks::new()
        .with_process(|_ctx: &mut HandlerContext| Err(HookError::new("handler bug")));
    let mut handler = harness
        .runner(&input, registry_with_harvester(harvester.clone()))
        .with_hooks(hooks)
        .with_notifier(notifier.clone());
    let outcome = handler.execute().unwrap();

    assert_eq!(outcome.disposition, Disposition::Failed);
    assert_eq!(
        outcome.error.as_ref().unwrap().0,
        ErrorKind::HandlerHookError
    );

    // Publish never ran; notification did.
    assert!(harvester.calls().is_empty());
    harness.assert_not_stored("good.nc");
    assert_eq!(notifier.summaries().len(), 1);
}

#[test]
fn test_manifest_with_missing_entry_is_resolve_failure() {
    let harness = TestHarness::new();
    let manifest = harness.write_manifest("batch.manifest", &["nothere.csv"]);
    let notifier = RecordingNotifier::new();

    let mut handler = harness
        .runner(&manifest, Arc::new(PluginRegistry::new()))
        .with_notifier(notifier.clone());
    let outcome = handler.execute().unwrap();

    assert_eq!(outcome.disposition, Disposition::Failed);
    assert_eq!(outcome.error.as_ref().unwrap().0, ErrorKind::ResolveFailure);
    assert_eq!(notifier.summaries().len(), 1);
}

#[test]
fn test_delete_manifest_end_to_end() {
    let harness = TestHarness::new();

    // Two artifacts already published and harvested in some earlier run.
    let seed = harness.write_input("seed.nc", COMPLIANT_NC);
    let store = harness.store_broker();
    store.put(&seed, "IMOS/old_a.nc").unwrap();
    store.put(&seed, "IMOS/old_b.nc").unwrap();

    let input = harness.write_input("retire.delete_manifest", b"IMOS/old_a.nc\nIMOS/old_b.nc\n");
    let harvester = RecordingHarvester::new();

    let mut params = HandlerParams::default();
    params.resolve.allow_delete_manifests = true;

    let mut handler = harness
        .runner(&input, registry_with_harvester(harvester.clone()))
        .with_params(params);
    let outcome = handler.execute().unwrap();

    assert_eq!(outcome.disposition, Disposition::Success);
    assert_eq!(outcome.summary.files.len(), 2);
    assert!(outcome.summary.files.iter().all(|f| f.is_deletion));

    assert_eq!(
        harvester.calls(),
        vec!["remove:IMOS/old_a.nc", "remove:IMOS/old_b.nc"]
    );
    assert!(!store.exists("IMOS/old_a.nc").unwrap());
    assert!(!store.exists("IMOS/old_b.nc").unwrap());
}
