// tests/integration/settings_test.rs

use super::test_helpers::*;
use accountd::AccountError;
use accountd::client::Settings;
use accountd::core::account::Gecos;

fn settings(primary_group: u32, groups: Vec<u32>) -> Settings {
    Settings {
        shell: "/bin/zsh".to_string(),
        gecos: Gecos {
            full_name: "Bob Builder".to_string(),
            office_tel: "555-0100".to_string(),
            ..Gecos::default()
        },
        groups,
        primary_group,
    }
}

#[tokio::test]
async fn test_primary_group_is_not_doubled_into_member_lists() {
    let ctx = TestContext::new().await;
    ctx.desktop.script_secret(ALICE_PASSWORD);

    ctx.client
        .request_settings_change(BOB_UID, ALICE_UID, &settings(5, vec![5, 7]), CLIENT_WINDOW_ID)
        .await
        .unwrap();

    let bob = ctx.db.account(BOB_UID);
    assert_eq!(bob.gid(), 5);
    assert_eq!(bob.shell(), "/bin/zsh");
    assert_eq!(bob.gecos(), "Bob Builder,,555-0100,,");
    assert!(!ctx.db.group(5).has_member("bob"));
    assert!(ctx.db.group(7).has_member("bob"));
    // Previously held, not resubmitted.
    assert!(!ctx.db.group(100).has_member("bob"));
    // Other members are untouched.
    assert_eq!(ctx.db.group(100).members().to_vec(), vec!["alice", "carol"]);
    assert_eq!(
        ctx.desktop.prompt_descriptions(),
        vec![
            "To update user \"bob\", please authenticate by entering password for user \"alice\"."
                .to_string()
        ]
    );
}

#[tokio::test]
async fn test_unsendable_group_id_is_rejected_before_prompting() {
    let ctx = TestContext::new().await;
    let group_before = ctx.db.read(&ctx.db.group_path);

    // Group ids above i32::MAX cannot be sent and are rejected client-side.
    let result = ctx
        .client
        .request_settings_change(
            BOB_UID,
            ALICE_UID,
            &settings(u32::MAX, vec![]),
            CLIENT_WINDOW_ID,
        )
        .await;

    assert!(matches!(result, Err(AccountError::InvalidRequest(_))));
    assert!(ctx.desktop.prompt_descriptions().is_empty());
    assert_eq!(ctx.db.read(&ctx.db.group_path), group_before);
}

#[tokio::test]
async fn test_store_failure_is_reported_and_service_keeps_serving() {
    let ctx = TestContext::new().await;
    ctx.desktop.script_secret(ALICE_PASSWORD);
    // Listed as a valid shell, but ':' cannot be written to the passwd file.
    let mut shells = ctx.db.read(&ctx.db.shells_path);
    shells.push_str("/bin/evil:shell\n");
    std::fs::write(&ctx.db.shells_path, shells).unwrap();
    let mut bad = settings(1001, vec![]);
    bad.shell = "/bin/evil:shell".to_string();

    let result = ctx
        .client
        .request_settings_change(BOB_UID, ALICE_UID, &bad, CLIENT_WINDOW_ID)
        .await;
    assert_eq!(result, Err(AccountError::OperationFailed));
    assert_eq!(ctx.desktop.messages().len(), 1);
    assert!(ctx.desktop.message_texts()[0].starts_with("Failed to write account database"));

    ctx.desktop.script_secret(ALICE_PASSWORD);
    ctx.client
        .request_settings_change(BOB_UID, ALICE_UID, &settings(1001, vec![7]), CLIENT_WINDOW_ID)
        .await
        .unwrap();
    assert!(ctx.db.group(7).has_member("bob"));
}

#[tokio::test]
async fn test_unlisted_shell_is_rejected_without_writing() {
    let ctx = TestContext::new().await;
    ctx.desktop.script_secret(ALICE_PASSWORD);
    let passwd_before = ctx.db.read(&ctx.db.passwd_path);
    let group_before = ctx.db.read(&ctx.db.group_path);
    let mut update = settings(1001, vec![7]);
    update.shell = "/usr/bin/nologin-backdoor".to_string();

    let result = ctx
        .client
        .request_settings_change(BOB_UID, ALICE_UID, &update, CLIENT_WINDOW_ID)
        .await;

    assert_eq!(result, Err(AccountError::OperationFailed));
    assert_eq!(
        ctx.desktop.message_texts(),
        vec!["\"/usr/bin/nologin-backdoor\" is not a valid login shell.".to_string()]
    );
    assert_eq!(ctx.db.read(&ctx.db.passwd_path), passwd_before);
    assert_eq!(ctx.db.read(&ctx.db.group_path), group_before);
}
