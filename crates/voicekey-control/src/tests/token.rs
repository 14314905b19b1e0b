use crate::{Acquisition, ExclusivityToken, tests::scratch_paths};

/// WHAT: First acquisition attempt takes the token
/// WHY: A fresh control directory has no owner to defer to
#[tokio::test]
async fn given_no_owner_when_acquiring_then_token_is_owned() {
    // Given: An empty control directory
    let paths = scratch_paths();

    // When: Acquiring the token
    let acquisition = ExclusivityToken::try_acquire(&paths).await;

    // Then: This process owns it, with nothing reclaimed
    assert!(matches!(
        acquisition,
        Ok(Acquisition::Owned {
            reclaimed: false,
            ..
        })
    ));
    assert!(paths.lock_path().exists());
}

/// WHAT: Release removes the lock file and allows reacquisition
/// WHY: Clean shutdown must leave nothing for the next launch to fight over
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_released_token_when_reacquiring_then_owned_again() {
    // Given: A token that was acquired and then released
    let paths = scratch_paths();
    let mut token = match ExclusivityToken::try_acquire(&paths).await.unwrap() {
        Acquisition::Owned { token, .. } => token,
        Acquisition::Held { .. } => unreachable!("fresh directory cannot be held"),
    };
    token.release();

    // When: Acquiring again
    let second = ExclusivityToken::try_acquire(&paths).await.unwrap();

    // Then: The lock file is gone in between and the token is owned again
    assert!(matches!(second, Acquisition::Owned { .. }));
}

/// WHAT: A lock whose recorded port no longer answers is reclaimed
/// WHY: A crashed owner must not block every future launch
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_dead_owner_lock_when_acquiring_then_reclaimed() {
    // Given: A lock file pointing at a port nobody listens on
    let paths = scratch_paths();
    std::fs::create_dir_all(paths.lock_path().parent().unwrap()).unwrap();
    let dead_port = {
        // Bind and immediately drop to find a port that is currently closed.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    std::fs::write(
        paths.lock_path(),
        format!("{{\"pid\":4294967294,\"port\":{dead_port}}}"),
    )
    .unwrap();

    // When: Acquiring the token
    let acquisition = ExclusivityToken::try_acquire(&paths).await.unwrap();

    // Then: The stale lock is reclaimed as a successful acquisition
    assert!(matches!(acquisition, Acquisition::Owned { reclaimed: true, .. }));
}

/// WHAT: A garbage lock file is treated as stale and reclaimed
/// WHY: A holder that died mid-write must not wedge acquisition forever
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_corrupt_lock_when_acquiring_then_reclaimed() {
    // Given: A lock file with unparseable contents
    let paths = scratch_paths();
    std::fs::create_dir_all(paths.lock_path().parent().unwrap()).unwrap();
    std::fs::write(paths.lock_path(), b"not a record").unwrap();

    // When: Acquiring the token
    let acquisition = ExclusivityToken::try_acquire(&paths).await.unwrap();

    // Then: The corrupt lock is reclaimed
    assert!(matches!(acquisition, Acquisition::Owned { reclaimed: true, .. }));
}

/// WHAT: A lock with the startup placeholder port reads as held
/// WHY: An owner that has not bound its listener yet is alive, not dead
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_placeholder_port_when_acquiring_then_held() {
    // Given: A lock file whose port is still the pre-bind placeholder
    let paths = scratch_paths();
    std::fs::create_dir_all(paths.lock_path().parent().unwrap()).unwrap();
    std::fs::write(paths.lock_path(), b"{\"pid\":1,\"port\":0}").unwrap();

    // When: Acquiring the token
    let acquisition = ExclusivityToken::try_acquire(&paths).await.unwrap();

    // Then: The token reads as held by the starting owner
    assert!(matches!(acquisition, Acquisition::Held { port: 0 }));
}

/// WHAT: Dropping an owned token releases the lock file
/// WHY: The token must be released even when shutdown never runs
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_owned_token_when_dropped_then_lock_removed() {
    // Given: An owned token
    let paths = scratch_paths();
    let acquisition = ExclusivityToken::try_acquire(&paths).await.unwrap();
    assert!(paths.lock_path().exists());

    // When: The token is dropped without an explicit release
    drop(acquisition);

    // Then: The lock file is gone
    assert!(!paths.lock_path().exists());
}
