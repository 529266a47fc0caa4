//! Scripted in-memory browser shared by the engine tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, Once};

use mirror_core::{PollPolicy, Role, ThreadSummary, Turn};
use mirror_engine::{
    AssistantSnapshot, BrowserSession, EngineConfig, SessionError, SessionErrorKind,
    SessionFactory,
};

pub const HOME: &str = "https://chat.example.com/";

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

pub fn thread_url(id: &str) -> String {
    format!("https://chat.example.com/c/{id}")
}

/// Engine settings without any waiting.
pub fn test_config(cache_dir: &Path) -> EngineConfig {
    let mut config = EngineConfig::default_with_cache(cache_dir.to_path_buf());
    config.home_url = HOME.to_string();
    config.page_settle = PollPolicy::page_settle().immediate();
    config.response = PollPolicy::response().immediate();
    config.thread_list = PollPolicy::thread_list().immediate();
    config.thread_list.max_ticks = 3;
    config.submit_settle_ms = 0;
    config.restart_delay_ms = 0;
    config.queue_poll_ms = 10;
    config
}

/// A failure injected into the next calls of one browser operation.
#[derive(Debug, Clone)]
pub struct Injected {
    pub op: &'static str,
    /// Successful calls to let through before failing.
    pub skip: usize,
    pub error: SessionError,
}

/// What the fake browser shows and what was done to it.
#[derive(Debug, Default)]
pub struct World {
    pub url: String,
    /// Rendered transcript per page url.
    pub pages: HashMap<String, Vec<Turn>>,
    pub index: Vec<ThreadSummary>,
    /// Number of thread index reads that come back empty first.
    pub empty_index_reads: usize,
    /// Scripted results of `turn_count`; the page length afterwards.
    pub turn_counts: VecDeque<usize>,
    /// Successive texts of a streamed answer; the last one is final.
    pub answer_frames: VecDeque<String>,
    /// Url the page moves to once a prompt is submitted.
    pub redirect_after_submit: Option<String>,
    pub streaming: bool,
    pub injected: Vec<Injected>,
    pub open_failures: usize,

    pub opened: usize,
    pub closed: usize,
    pub gotos: Vec<String>,
    pub reloads: usize,
    pub scrolls: usize,
    pub prompts: Vec<String>,
}

impl World {
    pub fn page(&self) -> Vec<Turn> {
        self.pages.get(&self.url).cloned().unwrap_or_default()
    }

    pub fn show(&mut self, url: &str, turns: Vec<Turn>) {
        self.pages.insert(url.to_string(), turns);
    }

    pub fn inject(&mut self, op: &'static str, skip: usize, error: SessionError) {
        self.injected.push(Injected { op, skip, error });
    }

    fn check(&mut self, op: &'static str) -> Result<(), SessionError> {
        let Some(pos) = self.injected.iter().position(|i| i.op == op) else {
            return Ok(());
        };
        if self.injected[pos].skip > 0 {
            self.injected[pos].skip -= 1;
            return Ok(());
        }
        Err(self.injected.remove(pos).error)
    }
}

#[derive(Clone, Default)]
pub struct FakeBrowser {
    world: Arc<Mutex<World>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap()
    }

    /// A session already showing `url`, bypassing the factory.
    pub fn session_at(&self, url: &str) -> FakeSession {
        self.world().url = url.to_string();
        FakeSession {
            world: self.world.clone(),
        }
    }
}

impl SessionFactory for FakeBrowser {
    type Session = FakeSession;

    fn open(&mut self, config: &EngineConfig) -> Result<FakeSession, SessionError> {
        let mut world = self.world();
        if world.open_failures > 0 {
            world.open_failures -= 1;
            return Err(SessionError::new(SessionErrorKind::Launch, "no browser"));
        }
        world.opened += 1;
        world.url = config.home_url.clone();
        world.streaming = false;
        drop(world);
        Ok(FakeSession {
            world: self.world.clone(),
        })
    }
}

pub struct FakeSession {
    world: Arc<Mutex<World>>,
}

impl FakeSession {
    fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap()
    }
}

impl BrowserSession for FakeSession {
    fn goto(&mut self, url: &str) -> Result<(), SessionError> {
        let mut world = self.world();
        world.check("goto")?;
        world.url = url.to_string();
        world.gotos.push(url.to_string());
        Ok(())
    }

    fn reload(&mut self) -> Result<(), SessionError> {
        let mut world = self.world();
        world.check("reload")?;
        world.reloads += 1;
        Ok(())
    }

    fn current_url(&mut self) -> Result<String, SessionError> {
        let mut world = self.world();
        world.check("current_url")?;
        Ok(world.url.clone())
    }

    fn scroll_to_bottom(&mut self) -> Result<(), SessionError> {
        let mut world = self.world();
        world.check("scroll_to_bottom")?;
        world.scrolls += 1;
        Ok(())
    }

    fn turn_count(&mut self) -> Result<usize, SessionError> {
        let mut world = self.world();
        world.check("turn_count")?;
        Ok(match world.turn_counts.pop_front() {
            Some(count) => count,
            None => world.page().len(),
        })
    }

    fn last_assistant(&mut self) -> Result<AssistantSnapshot, SessionError> {
        let mut world = self.world();
        world.check("last_assistant")?;
        let page = world.page();
        let count = page.iter().filter(|t| t.role == Role::Assistant).count();
        if world.streaming {
            let text = if world.answer_frames.len() > 1 {
                world.answer_frames.pop_front()
            } else {
                world.answer_frames.front().cloned()
            };
            return Ok(AssistantSnapshot {
                count,
                last_text: text,
            });
        }
        let last_text = page
            .iter()
            .rev()
            .find(|t| t.role == Role::Assistant)
            .map(|t| t.text.clone());
        Ok(AssistantSnapshot { count, last_text })
    }

    fn fill_prompt(&mut self, text: &str) -> Result<(), SessionError> {
        let mut world = self.world();
        world.check("fill_prompt")?;
        world.prompts.push(text.to_string());
        Ok(())
    }

    fn submit_prompt(&mut self) -> Result<(), SessionError> {
        let mut world = self.world();
        world.check("submit_prompt")?;
        let prompt = world.prompts.last().cloned().unwrap_or_default();
        let answer = world.answer_frames.back().cloned().unwrap_or_default();
        let mut page = world.page();
        page.push(Turn::user(prompt));
        page.push(Turn::assistant(answer));
        if let Some(next) = world.redirect_after_submit.take() {
            world.url = next;
        }
        let url = world.url.clone();
        world.pages.insert(url, page);
        world.streaming = true;
        Ok(())
    }

    fn thread_index(&mut self, limit: usize) -> Result<Vec<ThreadSummary>, SessionError> {
        let mut world = self.world();
        world.check("thread_index")?;
        if world.empty_index_reads > 0 {
            world.empty_index_reads -= 1;
            return Ok(Vec::new());
        }
        Ok(world.index.iter().take(limit).cloned().collect())
    }

    fn evaluate(&mut self, _script: &str) -> Result<serde_json::Value, SessionError> {
        let mut world = self.world();
        world.check("evaluate")?;
        Ok(serde_json::to_value(world.page()).unwrap())
    }

    fn close(&mut self) -> Result<(), SessionError> {
        let mut world = self.world();
        world.closed += 1;
        world.streaming = false;
        Ok(())
    }
}
