//! Test Helper Utilities
//!
//! Temp-file databases plus scripted stand-ins for the content-detail service
//! and the generation backend.

#![allow(dead_code)]

use async_trait::async_trait;
use redraft_common::config::TomlConfig;
use redraft_common::db::init_database;
use redraft_common::events::EventBus;
use redraft_gen::models::{StagedContent, Task};
use redraft_gen::services::{
    serialize_variants, ChatMessage, ContentFetcher, FetchError, GenerationError,
    GenerationHandler, ParsedVariant, SourceContent, SubmissionItem, TextGenerator,
};
use redraft_gen::AppState;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

pub const OWNER: &str = "owner-1";
pub const VALID_REFERENCE: &str = "https://www.xiaohongshu.com/explore/64f0c2a1";

/// Create temporary test database with the schema applied
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("test_redraft.db");
    let pool = init_database(&db_path, &Default::default())
        .await
        .expect("init_database");
    (temp_dir, pool)
}

/// Pipeline tuned for tests: no jitter, small pool
pub fn test_config() -> TomlConfig {
    let mut config = TomlConfig::default();
    config.pipeline.jitter_max_ms = 0;
    config.pipeline.max_concurrent_items = 2;
    config.database.max_lock_wait_ms = 2000;
    config
}

pub struct TestEnv {
    pub _temp_dir: TempDir,
    pub pool: SqlitePool,
    pub state: AppState,
    pub generator: Arc<FakeGenerator>,
    pub fetcher: Arc<FakeFetcher>,
}

pub async fn setup(generator: FakeGenerator, fetcher: FakeFetcher) -> TestEnv {
    setup_with_config(generator, fetcher, test_config()).await
}

pub async fn setup_with_config(
    generator: FakeGenerator,
    fetcher: FakeFetcher,
    config: TomlConfig,
) -> TestEnv {
    let (temp_dir, pool) = create_test_db().await;
    let generator = Arc::new(generator);
    let fetcher = Arc::new(fetcher);

    let state = AppState::new(
        pool.clone(),
        EventBus::new(256),
        &config,
        generator.clone(),
        fetcher.clone(),
    )
    .expect("app state");

    TestEnv {
        _temp_dir: temp_dir,
        pool,
        state,
        generator,
        fetcher,
    }
}

/// Two well-formed versions in the canonical format
pub fn two_versions(prefix: &str) -> String {
    serialize_variants(&[
        ParsedVariant::new(format!("{} title one", prefix), format!("{} body one", prefix)),
        ParsedVariant::new(format!("{} title two", prefix), format!("{} body two", prefix)),
    ])
}

pub fn submission_item(source_id: &str, reference: Option<&str>, title: &str) -> SubmissionItem {
    SubmissionItem {
        reference: reference.map(str::to_string),
        staged: StagedContent {
            source_id: source_id.to_string(),
            title: Some(title.to_string()),
            body: Some(format!("{} staged body", title)),
            tags: vec!["daily".to_string()],
        },
    }
}

pub fn note_config() -> redraft_gen::models::TaskConfig {
    redraft_gen::models::TaskConfig {
        content_type: "note".to_string(),
        ..Default::default()
    }
}

/// Poll until the task reaches a terminal status
pub async fn wait_for_terminal(pool: &SqlitePool, task_id: Uuid) -> Task {
    for _ in 0..200 {
        let task = redraft_gen::db::tasks::load_task(pool, task_id)
            .await
            .expect("load task")
            .expect("task exists");
        if task.status.is_terminal() {
            return task;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("task {} did not reach a terminal status", task_id);
}

/// Scripted generator behavior
#[derive(Debug, Clone)]
pub enum Script {
    /// Stream the text in small chunks, then complete
    Text(String),
    /// Fail before streaming
    Transport(String),
    /// Stream a prefix, then break
    StreamError { partial: String, message: String },
    Panic,
}

/// Generator that picks a script by substring of the user prompt
pub struct FakeGenerator {
    default: Script,
    rules: Vec<(String, Script)>,
    delay: Duration,
    calls: AtomicUsize,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl FakeGenerator {
    pub fn new(default: Script) -> Self {
        Self {
            default,
            rules: Vec::new(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Default: two versions for every item
    pub fn two_versions() -> Self {
        Self::new(Script::Text(two_versions("Fresh")))
    }

    pub fn with_rule(mut self, needle: &str, script: Script) -> Self {
        self.rules.push((needle.to_string(), script));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        handler: &dyn GenerationHandler,
    ) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(messages.to_vec());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let user = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        let script = self
            .rules
            .iter()
            .find(|(needle, _)| user.contains(needle.as_str()))
            .map(|(_, script)| script.clone())
            .unwrap_or_else(|| self.default.clone());

        match script {
            Script::Text(text) => {
                let chars: Vec<char> = text.chars().collect();
                for chunk in chars.chunks(7) {
                    let fragment: String = chunk.iter().collect();
                    handler.on_chunk(&fragment).await;
                }
                handler.on_complete(&text).await;
                Ok(text)
            }
            Script::Transport(message) => Err(GenerationError::Transport(message)),
            Script::StreamError { partial, message } => {
                handler.on_chunk(&partial).await;
                handler.on_error(&message).await;
                Err(GenerationError::Stream(message))
            }
            Script::Panic => panic!("scripted generator panic"),
        }
    }
}

/// Fetcher answering from a reference → content map; unknown references fail
#[derive(Default)]
pub struct FakeFetcher {
    documents: HashMap<String, SourceContent>,
    calls: AtomicUsize,
    credentials: Mutex<Vec<String>>,
}

impl FakeFetcher {
    /// Every fetch fails, so items fall back to staged content
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, reference: &str, title: &str, body: &str) -> Self {
        self.documents.insert(
            reference.to_string(),
            SourceContent {
                title: title.to_string(),
                body: body.to_string(),
                tags: vec!["fetched".to_string()],
            },
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn credentials_seen(&self) -> Vec<String> {
        self.credentials.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentFetcher for FakeFetcher {
    async fn fetch_detail(&self, reference: &str, credential: &str) -> Result<SourceContent, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.credentials.lock().unwrap().push(credential.to_string());

        self.documents
            .get(reference)
            .cloned()
            .ok_or_else(|| FetchError::NotAvailable(reference.to_string()))
    }
}
