use crate::{
    Acquisition, ControlPaths, ExclusivityToken, InstanceCoordinator, Launch, LaunchRequest,
    ProtocolTimeouts, SignalKind,
};

use crate::tests::scratch_paths;

use std::time::Duration;

/// Short windows so protocol tests finish quickly.
fn brisk_timeouts() -> ProtocolTimeouts {
    ProtocolTimeouts {
        close: Duration::from_secs(5),
        replace: Duration::from_secs(2),
        probe_interval: Duration::from_millis(50),
    }
}

fn coordinator(paths: &ControlPaths) -> InstanceCoordinator {
    InstanceCoordinator::with_timeouts(paths.clone(), brisk_timeouts())
}

/// WHAT: Second default launch hands off a listen request and never owns
/// WHY: Exactly one process may run the dictation session per machine
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_running_owner_when_second_default_launch_then_listen_handed_off() {
    // Given: A first process that became the owner
    let paths = scratch_paths();
    let first = coordinator(&paths).launch(LaunchRequest::Default).await.unwrap();
    let Launch::Primary { control, mut signals, .. } = first else {
        unreachable!("first launch must become primary");
    };

    // When: A second process launches with no flags
    let second = coordinator(&paths)
        .launch(LaunchRequest::Default)
        .await
        .unwrap();

    // Then: The second hands off, the owner receives Listen, ownership holds
    assert!(matches!(second, Launch::HandedOff));
    let delivered = tokio::time::timeout(Duration::from_secs(2), signals.recv())
        .await
        .unwrap();
    assert_eq!(delivered, Some(SignalKind::Listen));
    assert!(matches!(
        ExclusivityToken::try_acquire(&paths).await.unwrap(),
        Acquisition::Held { .. }
    ));

    control.shutdown().await;
}

/// WHAT: A submit launch delivers Submit and exits without owning
/// WHY: Submit-only invocations must never start a second session
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_running_owner_when_submit_launch_then_submit_delivered() {
    // Given: A running owner
    let paths = scratch_paths();
    let Launch::Primary { control, mut signals, .. } =
        coordinator(&paths).launch(LaunchRequest::Default).await.unwrap()
    else {
        unreachable!("first launch must become primary");
    };

    // When: A second process launches with the submit request
    let outcome = coordinator(&paths)
        .launch(LaunchRequest::Submit)
        .await
        .unwrap();

    // Then: Submit is delivered and the second process handed off
    assert!(matches!(outcome, Launch::HandedOff));
    let delivered = tokio::time::timeout(Duration::from_secs(2), signals.recv())
        .await
        .unwrap();
    assert_eq!(delivered, Some(SignalKind::Submit));

    control.shutdown().await;
}

/// WHAT: Close delivers Exit and returns once the owner releases the token
/// WHY: The close protocol waits for the old owner instead of guessing
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_running_owner_when_close_launch_then_owner_signaled_and_token_released() {
    // Given: A running owner
    let paths = scratch_paths();
    let Launch::Primary { control, mut signals, .. } =
        coordinator(&paths).launch(LaunchRequest::Default).await.unwrap()
    else {
        unreachable!("first launch must become primary");
    };

    // When: A closer launches while the owner listens for Exit
    let closer_paths = paths.clone();
    let closer = tokio::spawn(async move {
        coordinator(&closer_paths).launch(LaunchRequest::Close).await
    });

    let delivered = tokio::time::timeout(Duration::from_secs(2), signals.recv())
        .await
        .unwrap();
    assert_eq!(delivered, Some(SignalKind::Exit));
    control.shutdown().await;

    // Then: The closer completes as handed off and nothing holds the token
    let outcome = closer.await.unwrap().unwrap();
    assert!(matches!(outcome, Launch::HandedOff));
    assert!(matches!(
        ExclusivityToken::try_acquire(&paths).await.unwrap(),
        Acquisition::Owned { .. }
    ));
}

/// WHAT: Close with no running instance is a no-op hand-off
/// WHY: Closing nothing must not start a session or leave a lock behind
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_no_owner_when_close_launch_then_noop() {
    // Given: No running instance
    let paths = scratch_paths();

    // When: Launching with the close request
    let outcome = coordinator(&paths)
        .launch(LaunchRequest::Close)
        .await
        .unwrap();

    // Then: The request resolves as handed off and no lock remains
    assert!(matches!(outcome, Launch::HandedOff));
    assert!(!paths.lock_path().exists());
}

/// WHAT: Replace-existing takes over after the old owner exits
/// WHY: The user asked for this process to own the session
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_running_owner_when_replace_launch_then_takeover_succeeds() {
    // Given: A running owner
    let paths = scratch_paths();
    let Launch::Primary { control, mut signals, .. } =
        coordinator(&paths).launch(LaunchRequest::Default).await.unwrap()
    else {
        unreachable!("first launch must become primary");
    };

    // When: A replacer launches and the owner obeys the Exit signal
    let replacer_paths = paths.clone();
    let replacer = tokio::spawn(async move {
        coordinator(&replacer_paths)
            .launch(LaunchRequest::ReplaceExisting)
            .await
    });

    let delivered = tokio::time::timeout(Duration::from_secs(2), signals.recv())
        .await
        .unwrap();
    assert_eq!(delivered, Some(SignalKind::Exit));
    control.shutdown().await;

    // Then: The replacer becomes the new owner without listen-on-start
    let outcome = replacer.await.unwrap().unwrap();
    let Launch::Primary { control, listen_on_start, .. } = outcome else {
        unreachable!("replacer must become primary");
    };
    assert!(!listen_on_start);
    control.shutdown().await;
}

/// WHAT: A launch over a dead owner's lock becomes primary by reclaiming
/// WHY: A crashed owner must not require manual lock cleanup
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_dead_owner_lock_when_default_launch_then_primary_reclaimed() {
    // Given: A stale lock pointing at a closed port
    let paths = scratch_paths();
    std::fs::create_dir_all(paths.lock_path().parent().unwrap()).unwrap();
    let dead_port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    std::fs::write(
        paths.lock_path(),
        format!("{{\"pid\":4294967294,\"port\":{dead_port}}}"),
    )
    .unwrap();

    // When: Launching with no flags
    let outcome = coordinator(&paths)
        .launch(LaunchRequest::Default)
        .await
        .unwrap();

    // Then: This process owns the session and reports the reclaim
    let Launch::Primary { control, reclaimed, .. } = outcome else {
        unreachable!("launch over a dead lock must become primary");
    };
    assert!(reclaimed);
    control.shutdown().await;
}

/// WHAT: A fresh listen launch becomes primary with listen-on-start set
/// WHY: The dictation cycle the user asked for must begin after startup
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_no_owner_when_listen_launch_then_primary_with_listen_on_start() {
    // Given: No running instance
    let paths = scratch_paths();

    // When: Launching with the listen request
    let outcome = coordinator(&paths)
        .launch(LaunchRequest::Listen)
        .await
        .unwrap();

    // Then: This process owns the session and will listen right away
    let Launch::Primary { control, listen_on_start, .. } = outcome else {
        unreachable!("listen launch with no owner must become primary");
    };
    assert!(listen_on_start);
    control.shutdown().await;
}
