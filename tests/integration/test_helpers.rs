// tests/integration/test_helpers.rs

//! Test helpers and utilities for integration tests
//!
//! Provides a scratch account database, a desktop and a helper runner that
//! replay scripted user input, and a connected client/service pair.

#![allow(dead_code)]

use accountd::client::{AccountClient, ClientDesktop};
use accountd::config::Config;
use accountd::connection::ConnectionHandler;
use accountd::core::AccountError;
use accountd::core::account::{Account, AccountStore, FileStore, Group};
use accountd::core::auth::SecretString;
use accountd::core::desktop::{
    Desktop, EnabledInputs, FormField, MessageKind, PasswordChoice, PasswordDialogEvent,
    PasswordDialogSurface, PromptEvent, PromptOptions, PromptSurface, Rect, SurfaceId, WindowId,
    WizardEvent, WizardPage, WizardSurface,
};
use accountd::core::executor::{Executor, HelperRunner, HelperStatus};
use accountd::server::{ServerState, SessionInfo};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tempfile::TempDir;
use tokio::net::UnixStream;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

pub const ROOT_UID: u32 = 0;
pub const ALICE_UID: u32 = 1000;
pub const BOB_UID: u32 = 1001;
pub const CAROL_UID: u32 = 1002;
pub const DAVE_UID: u32 = 1003;

/// Alice's password. Bob needs none, Carol's login is disabled, and Dave has
/// no shadow entry at all.
pub const ALICE_PASSWORD: &str = "wonderland";

pub const SERVICE_SURFACE_ID: SurfaceId = 77;
pub const CLIENT_SURFACE_ID: SurfaceId = 11;
pub const CLIENT_WINDOW_ID: WindowId = 3;

const PASSWD: &str = "\
root:x:0:0:root,,,,:/root:/bin/sh
alice:x:1000:1000:Alice Liddell,,,,:/home/alice:/bin/Shell
bob:x:1001:1001:Bob,,,,:/home/bob:/bin/sh
carol:x:1002:1002::/home/carol:/bin/sh
dave:x:1003:1003::/home/dave:/bin/sh
";

const GROUP: &str = "\
root:x:0:
wheel:x:1:alice
audio:x:5:bob
video:x:7:
users:x:100:alice,bob,carol
alice:x:1000:
bob:x:1001:
";

const SHELLS: &str = "\
# /etc/shells
/bin/sh

/bin/Shell
/bin/zsh
";

/// Alice's hash is computed once per test binary; Argon2 is slow in debug
/// builds.
fn alice_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| {
        let mut account = Account::new(ALICE_UID, ALICE_UID, "alice");
        account
            .set_password(&SecretString::from(ALICE_PASSWORD))
            .expect("hashing the fixture password");
        match account.password_state() {
            accountd::core::account::PasswordState::Hashed(hash) => hash.clone(),
            other => panic!("unexpected state {other:?}"),
        }
    })
    .clone()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .with_test_writer()
        .try_init();
}

/// passwd/shadow/group/shells files in a temporary directory.
pub struct TestDatabase {
    pub dir: TempDir,
    pub passwd_path: PathBuf,
    pub shadow_path: PathBuf,
    pub group_path: PathBuf,
    pub shells_path: PathBuf,
}

impl TestDatabase {
    pub fn new() -> Self {
        let shadow = format!(
            "root:!:19000:0:99999:7:::\nalice:{}:19000:0:99999:7:::\nbob::19000:0:99999:7:::\ncarol:!:19000:0:99999:7:::\n",
            alice_hash()
        );
        Self::with_contents(PASSWD, &shadow, GROUP)
    }

    pub fn with_contents(passwd: &str, shadow: &str, group: &str) -> Self {
        let dir = tempfile::tempdir().expect("creating temp dir");
        let passwd_path = dir.path().join("passwd");
        let shadow_path = dir.path().join("shadow");
        let group_path = dir.path().join("group");
        let shells_path = dir.path().join("shells");
        std::fs::write(&passwd_path, passwd).expect("writing passwd");
        std::fs::write(&shadow_path, shadow).expect("writing shadow");
        std::fs::write(&group_path, group).expect("writing group");
        std::fs::write(&shells_path, SHELLS).expect("writing shells");
        Self {
            dir,
            passwd_path,
            shadow_path,
            group_path,
            shells_path,
        }
    }

    pub fn store(&self) -> Arc<FileStore> {
        Arc::new(FileStore::new(
            &self.passwd_path,
            &self.shadow_path,
            &self.group_path,
        ))
    }

    pub fn account(&self, uid: u32) -> Account {
        self.store().account_by_id(uid).expect("fixture account")
    }

    pub fn group(&self, gid: u32) -> Group {
        self.store()
            .all_groups()
            .expect("reading groups")
            .into_iter()
            .find(|g| g.id() == gid)
            .expect("fixture group")
    }

    pub fn read(&self, path: &Path) -> String {
        std::fs::read_to_string(path).expect("reading database file")
    }

    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.store.passwd_path = self.passwd_path.clone();
        config.store.shadow_path = self.shadow_path.clone();
        config.store.group_path = self.group_path.clone();
        config.store.shells_path = self.shells_path.clone();
        config.socket_path = self.dir.path().join("accounts.sock");
        config.auth.failure_delay_ms = 0;
        config
    }

    pub fn executor(&self, desktop: Arc<ScriptedDesktop>, runner: Arc<ScriptedRunner>) -> Executor {
        let config = self.config();
        Executor::new(
            self.store(),
            desktop,
            runner,
            config.helpers,
            config.accounts,
            config.store.shells_path,
        )
    }
}

/// Everything the scripted desktop was asked to do, and the input it still
/// has to give.
#[derive(Default)]
pub struct DesktopScript {
    pub prompts: VecDeque<Vec<PromptEvent>>,
    pub password_dialogs: VecDeque<Vec<PasswordDialogEvent>>,
    pub wizards: VecDeque<Vec<WizardEvent>>,
    pub confirm_answers: VecDeque<bool>,
    pub fail_prompt_open: bool,

    pub messages: Vec<(MessageKind, String)>,
    pub prompt_options: Vec<PromptOptions>,
    pub prompts_closed: usize,
    pub selected_secret: usize,
    pub dialog_choices: Vec<(PasswordChoice, EnabledInputs)>,
    pub dialogs_closed: usize,
    pub focused: Vec<FormField>,
    pub wizard_pages: Vec<WizardPage>,
    pub wizard_choices: Vec<(PasswordChoice, EnabledInputs)>,
    pub placeholders_created: Vec<WindowId>,
    pub placeholders_destroyed: Vec<WindowId>,
    pub parented: Vec<(SurfaceId, WindowId, WindowId)>,
    next_window: WindowId,
}

/// A `Desktop` that replays scripted events and records every call.
/// A surface whose script runs out reports that its window was closed.
#[derive(Default, Clone)]
pub struct ScriptedDesktop {
    pub script: Arc<Mutex<DesktopScript>>,
}

impl ScriptedDesktop {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script_prompt(&self, events: Vec<PromptEvent>) {
        self.script.lock().prompts.push_back(events);
    }

    /// Scripts a prompt that receives `secret` on the first try.
    pub fn script_secret(&self, secret: &str) {
        self.script_prompt(vec![PromptEvent::Submit(secret.into())]);
    }

    pub fn script_password_dialog(&self, events: Vec<PasswordDialogEvent>) {
        self.script.lock().password_dialogs.push_back(events);
    }

    pub fn script_wizard(&self, events: Vec<WizardEvent>) {
        self.script.lock().wizards.push_back(events);
    }

    pub fn script_confirm(&self, answer: bool) {
        self.script.lock().confirm_answers.push_back(answer);
    }

    pub fn messages(&self) -> Vec<(MessageKind, String)> {
        self.script.lock().messages.clone()
    }

    pub fn message_texts(&self) -> Vec<String> {
        self.messages().into_iter().map(|(_, text)| text).collect()
    }

    pub fn prompt_descriptions(&self) -> Vec<String> {
        self.script
            .lock()
            .prompt_options
            .iter()
            .map(|o| o.description.clone())
            .collect()
    }
}

#[async_trait]
impl Desktop for ScriptedDesktop {
    fn surface_id(&self) -> SurfaceId {
        SERVICE_SURFACE_ID
    }

    fn window_rect(&self, _surface: SurfaceId, _window: WindowId) -> Result<Rect, AccountError> {
        Ok(Rect {
            x: 10,
            y: 20,
            width: 400,
            height: 300,
        })
    }

    fn create_placeholder_window(&self, _rect: Rect) -> Result<WindowId, AccountError> {
        let mut script = self.script.lock();
        script.next_window += 1;
        let id = 500 + script.next_window;
        script.placeholders_created.push(id);
        Ok(id)
    }

    fn set_window_parent(
        &self,
        surface: SurfaceId,
        parent: WindowId,
        child: WindowId,
    ) -> Result<(), AccountError> {
        self.script.lock().parented.push((surface, parent, child));
        Ok(())
    }

    fn destroy_window(&self, window: WindowId) {
        self.script.lock().placeholders_destroyed.push(window);
    }

    async fn show_message(&self, _parent: Option<WindowId>, kind: MessageKind, text: &str) {
        self.script.lock().messages.push((kind, text.to_string()));
    }

    async fn confirm(&self, _parent: Option<WindowId>, _text: &str) -> bool {
        self.script.lock().confirm_answers.pop_front().unwrap_or(false)
    }

    fn open_escalation_prompt(
        &self,
        options: &PromptOptions,
    ) -> Result<Box<dyn PromptSurface>, AccountError> {
        let mut script = self.script.lock();
        if script.fail_prompt_open {
            return Err(AccountError::Desktop("window server unavailable".into()));
        }
        script.prompt_options.push(options.clone());
        let events = script.prompts.pop_front().unwrap_or_default();
        Ok(Box::new(ScriptedPrompt {
            events: events.into(),
            script: self.script.clone(),
        }))
    }

    fn open_password_dialog(
        &self,
        _parent: Option<WindowId>,
        _target: &Account,
    ) -> Result<Box<dyn PasswordDialogSurface>, AccountError> {
        let events = self
            .script
            .lock()
            .password_dialogs
            .pop_front()
            .unwrap_or_default();
        Ok(Box::new(ScriptedPasswordDialog {
            events: events.into(),
            script: self.script.clone(),
        }))
    }

    fn open_add_user_wizard(
        &self,
        _parent: Option<WindowId>,
    ) -> Result<Box<dyn WizardSurface>, AccountError> {
        let events = self.script.lock().wizards.pop_front().unwrap_or_default();
        Ok(Box::new(ScriptedWizard {
            events: events.into(),
            script: self.script.clone(),
        }))
    }
}

struct ScriptedPrompt {
    events: VecDeque<PromptEvent>,
    script: Arc<Mutex<DesktopScript>>,
}

#[async_trait]
impl PromptSurface for ScriptedPrompt {
    async fn next_event(&mut self) -> PromptEvent {
        self.events.pop_front().unwrap_or(PromptEvent::Closed)
    }

    fn select_secret(&mut self) {
        self.script.lock().selected_secret += 1;
    }

    fn close(&mut self) {
        self.script.lock().prompts_closed += 1;
    }
}

struct ScriptedPasswordDialog {
    events: VecDeque<PasswordDialogEvent>,
    script: Arc<Mutex<DesktopScript>>,
}

#[async_trait]
impl PasswordDialogSurface for ScriptedPasswordDialog {
    async fn next_event(&mut self) -> PasswordDialogEvent {
        self.events.pop_front().unwrap_or(PasswordDialogEvent::Closed)
    }

    fn set_choice(&mut self, choice: PasswordChoice, inputs: EnabledInputs) {
        self.script.lock().dialog_choices.push((choice, inputs));
    }

    fn focus(&mut self, field: FormField) {
        self.script.lock().focused.push(field);
    }

    fn close(&mut self) {
        self.script.lock().dialogs_closed += 1;
    }
}

struct ScriptedWizard {
    events: VecDeque<WizardEvent>,
    script: Arc<Mutex<DesktopScript>>,
}

#[async_trait]
impl WizardSurface for ScriptedWizard {
    async fn next_event(&mut self) -> WizardEvent {
        self.events.pop_front().unwrap_or(WizardEvent::Closed)
    }

    fn show_page(&mut self, page: WizardPage) {
        self.script.lock().wizard_pages.push(page);
    }

    fn set_choice(&mut self, choice: PasswordChoice, inputs: EnabledInputs) {
        self.script.lock().wizard_choices.push((choice, inputs));
    }

    fn focus(&mut self, field: FormField) {
        self.script.lock().focused.push(field);
    }

    fn close(&mut self) {}
}

/// A helper runner that reports scripted exit codes instead of spawning.
///
/// With `passwd_path` set, a successful run appends a passwd entry for its
/// argument, standing in for what `useradd` would do.
#[derive(Default)]
pub struct ScriptedRunner {
    pub exit_codes: Mutex<VecDeque<i32>>,
    pub spawn_fails: bool,
    pub calls: Mutex<Vec<(PathBuf, String)>>,
    pub passwd_path: Option<PathBuf>,
    pub new_uid: u32,
}

impl ScriptedRunner {
    pub fn exiting(code: i32) -> Arc<Self> {
        let runner = Self::default();
        runner.exit_codes.lock().push_back(code);
        Arc::new(runner)
    }

    pub fn failing_spawn() -> Arc<Self> {
        Arc::new(Self {
            spawn_fails: true,
            ..Self::default()
        })
    }

    pub fn useradd_into(db: &TestDatabase, new_uid: u32) -> Arc<Self> {
        Arc::new(Self {
            passwd_path: Some(db.passwd_path.clone()),
            new_uid,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<(PathBuf, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl HelperRunner for ScriptedRunner {
    async fn run(&self, program: &Path, argument: &str) -> Result<HelperStatus, AccountError> {
        self.calls
            .lock()
            .push((program.to_path_buf(), argument.to_string()));
        if self.spawn_fails {
            return Err(AccountError::HelperSpawn {
                program: program.display().to_string(),
                reason: "No such file or directory".into(),
            });
        }
        let code = self.exit_codes.lock().pop_front().unwrap_or(0);
        if code == 0
            && let Some(passwd_path) = &self.passwd_path
        {
            let mut passwd = std::fs::read_to_string(passwd_path)?;
            passwd.push_str(&format!(
                "{argument}:x:{uid}:{uid}::/home/{argument}:/bin/sh\n",
                uid = self.new_uid
            ));
            std::fs::write(passwd_path, passwd)?;
        }
        Ok(HelperStatus::exited(code))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientDesktopCall {
    AddStealing(SurfaceId, WindowId),
    RemoveStealing(SurfaceId, WindowId),
    Focus(WindowId),
}

/// A `ClientDesktop` that records what it was asked to do.
#[derive(Default)]
pub struct RecordingClientDesktop {
    pub calls: Mutex<Vec<ClientDesktopCall>>,
}

impl RecordingClientDesktop {
    pub fn calls(&self) -> Vec<ClientDesktopCall> {
        self.calls.lock().clone()
    }
}

impl ClientDesktop for RecordingClientDesktop {
    fn surface_id(&self) -> SurfaceId {
        CLIENT_SURFACE_ID
    }

    fn add_window_stealing(&self, service_surface: SurfaceId, window: WindowId) {
        self.calls
            .lock()
            .push(ClientDesktopCall::AddStealing(service_surface, window));
    }

    fn remove_window_stealing(&self, service_surface: SurfaceId, window: WindowId) {
        self.calls
            .lock()
            .push(ClientDesktopCall::RemoveStealing(service_surface, window));
    }

    fn focus_window(&self, window: WindowId) {
        self.calls.lock().push(ClientDesktopCall::Focus(window));
    }
}

/// A running service (dispatcher plus one session) connected to a client
/// over a socket pair.
pub struct TestContext {
    pub db: TestDatabase,
    pub desktop: Arc<ScriptedDesktop>,
    pub runner: Arc<ScriptedRunner>,
    pub client_desktop: Arc<RecordingClientDesktop>,
    pub client: AccountClient,
    pub state: Arc<ServerState>,
    pub shutdown_tx: broadcast::Sender<()>,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_runner(|_| ScriptedRunner::exiting(0)).await
    }

    pub async fn with_runner(make_runner: impl FnOnce(&TestDatabase) -> Arc<ScriptedRunner>) -> Self {
        init_tracing();
        let db = TestDatabase::new();
        let desktop = ScriptedDesktop::new();
        let runner = make_runner(&db);
        let client_desktop = Arc::new(RecordingClientDesktop::default());

        let init = ServerState::initialize(
            db.config(),
            desktop.clone(),
            db.store(),
            runner.clone(),
        );
        let (shutdown_tx, _) = broadcast::channel(1);
        tokio::spawn(
            init.dispatcher
                .run(init.dispatch_rx, shutdown_tx.subscribe()),
        );

        let (server_end, client_end) = UnixStream::pair().expect("creating socket pair");
        let session_id = 1;
        init.state
            .sessions
            .insert(session_id, SessionInfo::new(session_id));
        let handler = ConnectionHandler::new(
            server_end,
            init.state.clone(),
            session_id,
            shutdown_tx.subscribe(),
        );
        tokio::spawn(handler.run());

        let client = AccountClient::from_stream(client_end, client_desktop.clone());

        Self {
            db,
            desktop,
            runner,
            client_desktop,
            client,
            state: init.state,
            shutdown_tx,
        }
    }
}
