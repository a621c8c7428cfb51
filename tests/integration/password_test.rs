// tests/integration/password_test.rs

//! End-to-end password changes: client request, escalation prompt, password
//! dialog, store, reply.

use super::fixtures::{NEW_PASSWORD, choice_dialog, set_password_dialog};
use super::test_helpers::*;
use accountd::AccountError;
use accountd::core::account::PasswordState;
use accountd::core::auth::{SecretString, verify_password_state};
use accountd::core::desktop::{MessageKind, PasswordChoice, PasswordDialogEvent, PromptEvent};

#[tokio::test]
async fn test_self_service_password_change_succeeds() {
    let ctx = TestContext::new().await;
    ctx.desktop.script_secret(ALICE_PASSWORD);
    ctx.desktop
        .script_password_dialog(set_password_dialog(NEW_PASSWORD));

    let result = ctx
        .client
        .request_password_change(ALICE_UID, ALICE_UID, CLIENT_WINDOW_ID)
        .await;
    assert_eq!(result, Ok(()));

    let alice = ctx.db.account(ALICE_UID);
    assert!(verify_password_state(
        alice.password_state(),
        &SecretString::from(NEW_PASSWORD)
    ));
    assert_eq!(
        ctx.desktop.prompt_descriptions(),
        vec![
            "To update password for user \"alice\", please authenticate by entering password for user \"alice\"."
                .to_string()
        ]
    );
    assert_eq!(
        ctx.desktop.messages(),
        vec![(
            MessageKind::Information,
            "User password updated successfully.".to_string()
        )]
    );
    assert_eq!(ctx.client.pending_requests(), 0);
}

#[tokio::test]
async fn test_dialogs_are_anchored_to_the_requesting_window() {
    let ctx = TestContext::new().await;
    ctx.desktop.script_secret(ALICE_PASSWORD);
    ctx.desktop
        .script_password_dialog(choice_dialog(PasswordChoice::LoginDisabled));

    ctx.client
        .request_password_change(BOB_UID, ALICE_UID, CLIENT_WINDOW_ID)
        .await
        .unwrap();

    let script = ctx.desktop.script.lock();
    assert_eq!(script.placeholders_created.len(), 1);
    let placeholder = script.placeholders_created[0];
    assert_eq!(
        script.parented,
        vec![(CLIENT_SURFACE_ID, CLIENT_WINDOW_ID, placeholder)]
    );
    assert_eq!(script.placeholders_destroyed, vec![placeholder]);
    assert_eq!(script.prompt_options[0].parent, Some(placeholder));
    drop(script);

    let calls = ctx.client_desktop.calls();
    let add = calls
        .iter()
        .position(|c| *c == ClientDesktopCall::AddStealing(SERVICE_SURFACE_ID, CLIENT_WINDOW_ID))
        .expect("window stealing granted");
    let remove = calls
        .iter()
        .position(|c| {
            *c == ClientDesktopCall::RemoveStealing(SERVICE_SURFACE_ID, CLIENT_WINDOW_ID)
        })
        .expect("window stealing revoked");
    assert!(add < remove);
    assert!(calls.contains(&ClientDesktopCall::Focus(CLIENT_WINDOW_ID)));
}

#[tokio::test]
async fn test_wrong_secret_reprompts_then_succeeds() {
    let ctx = TestContext::new().await;
    ctx.desktop.script_prompt(vec![
        PromptEvent::Submit("not-it".into()),
        PromptEvent::Submit(ALICE_PASSWORD.into()),
    ]);
    ctx.desktop
        .script_password_dialog(choice_dialog(PasswordChoice::LoginDisabled));

    let result = ctx
        .client
        .request_password_change(ALICE_UID, ALICE_UID, CLIENT_WINDOW_ID)
        .await;
    assert_eq!(result, Ok(()));

    let texts = ctx.desktop.message_texts();
    assert_eq!(texts[0], "Incorrect or disabled password.");
    assert_eq!(ctx.desktop.script.lock().selected_secret, 1);
    assert!(ctx.db.account(ALICE_UID).password_state().is_disabled());
}

#[tokio::test]
async fn test_cancelled_prompt_fails_with_one_message() {
    let ctx = TestContext::new().await;
    ctx.desktop.script_prompt(vec![PromptEvent::Cancel]);
    let shadow_before = ctx.db.read(&ctx.db.shadow_path);

    let result = ctx
        .client
        .request_password_change(ALICE_UID, ALICE_UID, CLIENT_WINDOW_ID)
        .await;

    assert_eq!(result, Err(AccountError::OperationFailed));
    assert_eq!(ctx.desktop.messages().len(), 1);
    assert_eq!(ctx.desktop.script.lock().dialogs_closed, 0);
    assert_eq!(ctx.db.read(&ctx.db.shadow_path), shadow_before);
}

#[tokio::test]
async fn test_disabled_acting_account_cannot_authorize() {
    let ctx = TestContext::new().await;
    ctx.desktop.script_prompt(vec![
        PromptEvent::Submit("anything".into()),
        PromptEvent::Submit(ALICE_PASSWORD.into()),
        PromptEvent::Cancel,
    ]);

    let result = ctx
        .client
        .request_password_change(BOB_UID, CAROL_UID, CLIENT_WINDOW_ID)
        .await;

    assert_eq!(result, Err(AccountError::OperationFailed));
    let texts = ctx.desktop.message_texts();
    assert_eq!(
        texts.iter()
            .filter(|t| *t == "Incorrect or disabled password.")
            .count(),
        2
    );
}

#[tokio::test]
async fn test_cancelled_password_dialog_replies_failure() {
    let ctx = TestContext::new().await;
    ctx.desktop.script_secret(ALICE_PASSWORD);
    ctx.desktop
        .script_password_dialog(vec![PasswordDialogEvent::Cancel]);

    let result = ctx
        .client
        .request_password_change(ALICE_UID, ALICE_UID, CLIENT_WINDOW_ID)
        .await;

    assert_eq!(result, Err(AccountError::OperationFailed));
    assert_eq!(ctx.desktop.message_texts(), vec!["Operation cancelled".to_string()]);
    assert_eq!(ctx.desktop.script.lock().dialogs_closed, 1);
}

#[tokio::test]
async fn test_no_password_choice_requires_confirmation() {
    let ctx = TestContext::new().await;
    ctx.desktop.script_secret(ALICE_PASSWORD);
    ctx.desktop.script_confirm(false);
    ctx.desktop.script_confirm(true);
    ctx.desktop.script_password_dialog(vec![
        PasswordDialogEvent::Select(PasswordChoice::NoPasswordRequired),
        PasswordDialogEvent::Submit {
            password: "".into(),
            confirm: "".into(),
        },
        PasswordDialogEvent::Submit {
            password: "".into(),
            confirm: "".into(),
        },
    ]);

    ctx.client
        .request_password_change(CAROL_UID, ALICE_UID, CLIENT_WINDOW_ID)
        .await
        .unwrap();

    assert_eq!(
        *ctx.db.account(CAROL_UID).password_state(),
        PasswordState::NoPassword
    );
    assert!(ctx.db.read(&ctx.db.shadow_path).contains("\ncarol::"));
}

#[tokio::test]
async fn test_root_acting_account_skips_the_prompt() {
    let ctx = TestContext::new().await;
    ctx.desktop
        .script_password_dialog(choice_dialog(PasswordChoice::LoginDisabled));

    ctx.client
        .request_password_change(BOB_UID, ROOT_UID, CLIENT_WINDOW_ID)
        .await
        .unwrap();

    assert!(ctx.desktop.prompt_descriptions().is_empty());
    assert!(ctx.db.account(BOB_UID).password_state().is_disabled());
}

#[tokio::test]
async fn test_unknown_target_fails_without_prompting() {
    let ctx = TestContext::new().await;

    let result = ctx
        .client
        .request_password_change(4242, ALICE_UID, CLIENT_WINDOW_ID)
        .await;

    assert_eq!(result, Err(AccountError::OperationFailed));
    assert!(ctx.desktop.prompt_descriptions().is_empty());
    assert_eq!(
        ctx.desktop.message_texts(),
        vec!["No account with user id 4242".to_string()]
    );
}
