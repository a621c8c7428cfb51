// tests/integration/correlation_test.rs

//! Request/response correlation over a live connection, against both the
//! real service and a hand-driven peer that answers out of order.

use super::test_helpers::*;
use accountd::AccountError;
use accountd::client::{AccountClient, AccountEvent};
use accountd::core::protocol::{ClientRequest, ServerCodec, ServerResponse};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixStream;
use tokio_util::codec::Framed;

#[tokio::test]
async fn test_service_exposes_its_surface_id() {
    let ctx = TestContext::new().await;
    assert_eq!(
        ctx.client.expose_window_surface_id().await.unwrap(),
        SERVICE_SURFACE_ID
    );
    assert_eq!(ctx.client.pending_requests(), 0);
}

#[tokio::test]
async fn test_concurrent_requests_from_one_client_all_resolve() {
    // The first helper run fails, the rest succeed.
    let ctx = TestContext::with_runner(|_| ScriptedRunner::exiting(1)).await;

    let (bob, carol, dave) = tokio::join!(
        ctx.client.request_user_deletion(BOB_UID, ROOT_UID, CLIENT_WINDOW_ID),
        ctx.client.request_user_deletion(CAROL_UID, ROOT_UID, CLIENT_WINDOW_ID),
        ctx.client.request_user_deletion(DAVE_UID, ROOT_UID, CLIENT_WINDOW_ID),
    );

    let results = [bob, carol, dave];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
    assert!(
        results
            .iter()
            .any(|r| *r == Err(AccountError::OperationFailed))
    );
    assert_eq!(ctx.runner.calls().len(), 3);
    assert_eq!(ctx.client.pending_requests(), 0);
    // Root needs no prompt.
    assert!(ctx.desktop.prompt_descriptions().is_empty());
}

#[tokio::test]
async fn test_unsendable_ids_fail_without_prompting() {
    let ctx = TestContext::new().await;

    // Ids above i32::MAX are refused by the client before anything is sent.
    let result = ctx
        .client
        .request_password_change(u32::MAX, ALICE_UID, CLIENT_WINDOW_ID)
        .await;
    assert!(matches!(result, Err(AccountError::InvalidRequest(_))));
    assert!(ctx.desktop.prompt_descriptions().is_empty());
}

#[tokio::test]
async fn test_prompt_that_cannot_open_is_a_failure() {
    let ctx = TestContext::new().await;
    ctx.desktop.script.lock().fail_prompt_open = true;

    let result = ctx
        .client
        .request_password_change(BOB_UID, ALICE_UID, CLIENT_WINDOW_ID)
        .await;

    assert_eq!(result, Err(AccountError::OperationFailed));
    assert_eq!(
        ctx.desktop.message_texts(),
        vec!["Desktop error: window server unavailable".to_string()]
    );
    // The placeholder is torn down on the failure path too.
    let script = ctx.desktop.script.lock();
    assert_eq!(script.placeholders_created, script.placeholders_destroyed);
}

#[tokio::test]
async fn test_failure_reply_still_publishes_response_event() {
    let ctx = TestContext::new().await;
    let mut events = ctx.client.subscribe();

    let result = ctx
        .client
        .request_user_deletion(BOB_UID, ALICE_UID, CLIENT_WINDOW_ID)
        .await;

    assert_eq!(result, Err(AccountError::OperationFailed));
    assert_eq!(events.recv().await.unwrap(), AccountEvent::Response);
    assert!(events.try_recv().is_err());
}

/// A client connected to a peer the test drives frame by frame.
fn client_with_peer() -> (
    AccountClient,
    Arc<RecordingClientDesktop>,
    Framed<UnixStream, ServerCodec>,
) {
    init_tracing();
    let (server_end, client_end) = UnixStream::pair().unwrap();
    let desktop = Arc::new(RecordingClientDesktop::default());
    let client = AccountClient::from_stream(client_end, desktop.clone());
    (client, desktop, Framed::new(server_end, ServerCodec::new()))
}

#[tokio::test]
async fn test_out_of_order_responses_reach_their_callers() {
    let (client, desktop, mut peer) = client_with_peer();

    let peer_task = tokio::spawn(async move {
        let mut pending = Vec::new();
        while pending.len() < 2 {
            match peer.next().await.unwrap().unwrap() {
                ClientRequest::ExposeWindowSurfaceId => peer
                    .send(ServerResponse::WindowSurfaceId {
                        window_surface_id: SERVICE_SURFACE_ID,
                    })
                    .await
                    .unwrap(),
                ClientRequest::RequestUserDeletion {
                    promise_id,
                    target_user_id,
                    ..
                } => pending.push((promise_id, target_user_id)),
                other => panic!("unexpected request {other:?}"),
            }
        }
        // Answer newest first; only Bob's deletion succeeds.
        for (promise_id, target_user_id) in pending.into_iter().rev() {
            peer.send(ServerResponse::UserDeleted {
                promise_id,
                success: target_user_id == BOB_UID as i32,
            })
            .await
            .unwrap();
        }
        peer
    });

    let (bob, carol) = tokio::join!(
        client.request_user_deletion(BOB_UID, ALICE_UID, 3),
        client.request_user_deletion(CAROL_UID, ALICE_UID, 4),
    );
    let _peer = peer_task.await.unwrap();

    assert_eq!(bob, Ok(()));
    assert_eq!(carol, Err(AccountError::OperationFailed));
    let calls = desktop.calls();
    assert!(calls.contains(&ClientDesktopCall::Focus(3)));
    assert!(calls.contains(&ClientDesktopCall::Focus(4)));
    assert!(calls.contains(&ClientDesktopCall::RemoveStealing(SERVICE_SURFACE_ID, 3)));
    assert!(calls.contains(&ClientDesktopCall::RemoveStealing(SERVICE_SURFACE_ID, 4)));
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn test_closed_connection_fails_pending_requests() {
    let (client, desktop, mut peer) = client_with_peer();

    let peer_task = tokio::spawn(async move {
        loop {
            match peer.next().await {
                Some(Ok(ClientRequest::ExposeWindowSurfaceId)) => peer
                    .send(ServerResponse::WindowSurfaceId {
                        window_surface_id: SERVICE_SURFACE_ID,
                    })
                    .await
                    .unwrap(),
                // Hang up with the request unanswered.
                Some(Ok(_)) | Some(Err(_)) | None => return,
            }
        }
    });

    let result = client
        .request_password_change(BOB_UID, ALICE_UID, CLIENT_WINDOW_ID)
        .await;
    peer_task.await.unwrap();

    assert_eq!(result, Err(AccountError::ConnectionClosed));
    assert_eq!(client.pending_requests(), 0);
    // Stealing is revoked even though no response arrived.
    assert_eq!(
        desktop.calls().last(),
        Some(&ClientDesktopCall::RemoveStealing(
            SERVICE_SURFACE_ID,
            CLIENT_WINDOW_ID
        ))
    );
    assert_eq!(
        client.expose_window_surface_id().await,
        Err(AccountError::ConnectionClosed)
    );
}

#[tokio::test]
async fn test_unsolicited_response_tears_down_the_connection() {
    let (client, _desktop, mut peer) = client_with_peer();

    peer.send(ServerResponse::UserDeleted {
        promise_id: 99,
        success: true,
    })
    .await
    .unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        client.request_user_deletion(BOB_UID, ALICE_UID, CLIENT_WINDOW_ID),
    )
    .await
    .expect("the client should give up once its reader has stopped");

    assert!(matches!(result, Err(AccountError::ProtocolDesync(_))));
    assert!(matches!(
        client.expose_window_surface_id().await,
        Err(AccountError::ProtocolDesync(_))
    ));
    drop(peer);
}

#[tokio::test]
async fn test_reply_to_wrong_promise_fails_pending_request_with_desync() {
    let (client, desktop, mut peer) = client_with_peer();

    let peer_task = tokio::spawn(async move {
        while let Some(Ok(request)) = peer.next().await {
            match request {
                ClientRequest::ExposeWindowSurfaceId => peer
                    .send(ServerResponse::WindowSurfaceId {
                        window_surface_id: SERVICE_SURFACE_ID,
                    })
                    .await
                    .unwrap(),
                ClientRequest::RequestUserDeletion { promise_id, .. } => {
                    assert_eq!(promise_id, 0);
                    peer.send(ServerResponse::UserDeleted {
                        promise_id: 1000,
                        success: true,
                    })
                    .await
                    .unwrap();
                }
                other => panic!("unexpected request {other:?}"),
            }
        }
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        client.request_user_deletion(BOB_UID, ALICE_UID, CLIENT_WINDOW_ID),
    )
    .await
    .expect("a desync must not leave the caller waiting");

    assert!(
        matches!(result, Err(AccountError::ProtocolDesync(ref msg)) if msg.contains("1000")),
        "got {result:?}"
    );
    assert_eq!(client.pending_requests(), 0);
    assert_eq!(
        desktop.calls().last(),
        Some(&ClientDesktopCall::RemoveStealing(
            SERVICE_SURFACE_ID,
            CLIENT_WINDOW_ID
        ))
    );
    assert!(matches!(
        client
            .request_password_change(BOB_UID, ALICE_UID, CLIENT_WINDOW_ID)
            .await,
        Err(AccountError::ProtocolDesync(_))
    ));

    drop(client);
    let _ = peer_task.await;
}
