//! Advertiser role integration tests
//!
//! Exercise the advertiser procedure against a scripted host: the
//! per-cycle teardown order (stop, delete identity, disable) holds for
//! every cycle, and any failing step ends the run at that step.

mod common;

use blecycle::{Advertiser, StatusCode, TestError};
use common::{shared, test_config, ScriptedHost};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn completes_all_cycles_in_order() {
    let (host, dyn_host) = shared(ScriptedHost::new());
    let config = test_config(10);

    Advertiser::new(dyn_host, config).run().await.unwrap();

    let ops = host.ops();
    assert_eq!(ops.len(), 70);
    for (i, cycle) in ops.chunks(7).enumerate() {
        let id = i + 1;
        assert_eq!(
            cycle,
            [
                "enable".to_string(),
                "identity_current".to_string(),
                "identity_create".to_string(),
                // flags-only payload: one AD structure
                format!("adv_start:{}:1", id),
                "adv_stop".to_string(),
                format!("identity_delete:{}", id),
                "disable".to_string(),
            ]
        );
    }
}

#[tokio::test]
async fn identity_is_deleted_before_disable_every_cycle() {
    let (host, dyn_host) = shared(ScriptedHost::new());
    let config = test_config(5);

    Advertiser::new(dyn_host, config).run().await.unwrap();

    for cycle in host.ops().chunks(7) {
        let delete = cycle.iter().position(|op| op.starts_with("identity_delete"));
        let disable = cycle.iter().position(|op| op == "disable");
        assert!(delete.unwrap() < disable.unwrap());
    }
}

#[tokio::test]
async fn identity_create_failure_aborts_the_whole_run() {
    let (host, dyn_host) = shared(ScriptedHost::failing(
        "identity_create",
        StatusCode::NoMemory,
    ));
    let config = test_config(10);

    let err = Advertiser::new(dyn_host, config).run().await.unwrap_err();
    assert_eq!(err, TestError::Fail("ID create failed (err -12)".to_string()));
    assert_eq!(host.ops(), ["enable", "identity_current", "identity_create"]);
}

#[tokio::test]
async fn adv_start_failure_aborts_the_whole_run() {
    let (host, dyn_host) = shared(ScriptedHost::failing("adv_start", StatusCode::Invalid));
    let config = test_config(10);

    let err = Advertiser::new(dyn_host, config).run().await.unwrap_err();
    assert_eq!(
        err,
        TestError::Fail("Advertising failed to start (err -22)".to_string())
    );
    // the run ended before stop/delete/disable
    assert!(!host.ops().iter().any(|op| op == "adv_stop"));
}

#[tokio::test]
async fn adv_stop_failure_aborts_the_whole_run() {
    let (host, dyn_host) = shared(ScriptedHost::failing("adv_stop", StatusCode::Already));
    let config = test_config(10);

    let err = Advertiser::new(dyn_host, config).run().await.unwrap_err();
    assert_eq!(
        err,
        TestError::Fail("Advertising failed to stop (err -120)".to_string())
    );
    assert!(!host.ops().iter().any(|op| op.starts_with("identity_delete")));
}

#[tokio::test]
async fn identity_delete_failure_aborts_the_whole_run() {
    let (host, dyn_host) = shared(ScriptedHost::failing("identity_delete", StatusCode::Busy));
    let config = test_config(10);

    let err = Advertiser::new(dyn_host, config).run().await.unwrap_err();
    assert_eq!(err, TestError::Fail("ID delete failed (err -16)".to_string()));
    // the failing delete ends the run before disable
    assert!(!host.ops().iter().any(|op| op == "disable"));
}
