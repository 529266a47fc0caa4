//! Executes queued commands against one live browser session.
use engine_logging::{engine_debug, engine_info, engine_trace, engine_warn};
use mirror_core::{
    advance, normalize_text, reconcile, Command, DispatchState, Signal, Stability,
    StreamAccumulator, SyncKind, ThreadId, Turn,
};

use crate::cache::CacheStore;
use crate::emit::Emitter;
use crate::extract::TranscriptExtractor;
use crate::poll::{await_stability, pause, poll_until, Polled, StopFlag};
use crate::queue::{CommandQueue, Next, Pending};
use crate::{sample_failure, BrowserSession, EngineConfig, SampleError, SessionError};

/// How a thread sync treats what is already on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Replay the cache, then show only the turns it was missing.
    Cached,
    /// Rebuild the display from the page, skipping the cache replay.
    Forced,
}

/// Whether the dispatch loop goes on after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// A session-fatal error that ended the dispatch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub error: SessionError,
    /// The command that was running, when it is safe to run it again.
    pub interrupted: Option<Pending>,
}

impl Fault {
    pub(crate) fn bare(error: SessionError) -> Self {
        Self {
            error,
            interrupted: None,
        }
    }
}

pub struct Dispatcher<'a> {
    config: &'a EngineConfig,
    cache: &'a CacheStore,
    emitter: &'a Emitter,
    extractor: &'a dyn TranscriptExtractor,
    stop: &'a StopFlag,
    state: DispatchState,
    current: ThreadId,
    /// Set once a prompt left the page; such a command is never replayed.
    submitted: bool,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        config: &'a EngineConfig,
        cache: &'a CacheStore,
        emitter: &'a Emitter,
        extractor: &'a dyn TranscriptExtractor,
        stop: &'a StopFlag,
    ) -> Self {
        Self {
            config,
            cache,
            emitter,
            extractor,
            stop,
            state: DispatchState::Idle,
            current: ThreadId::New,
            submitted: false,
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn current_thread(&self) -> &ThreadId {
        &self.current
    }

    pub fn signal(&mut self, signal: Signal) {
        let next = advance(self.state, signal);
        if next != self.state {
            engine_trace!("dispatcher {:?} -> {:?} on {:?}", self.state, next, signal);
        }
        self.state = next;
    }

    /// Marks the session as lost, unless that already happened.
    pub fn session_lost(&mut self) {
        self.signal(Signal::SessionLost);
    }

    /// Back to idle on a fresh session that shows no thread yet.
    pub fn session_restored(&mut self) {
        self.signal(Signal::SessionRestored);
        self.current = ThreadId::New;
    }

    /// First work on a new session: the thread index, then whatever thread
    /// the browser opened on.
    pub fn startup(&mut self, session: &mut dyn BrowserSession) -> Result<(), SessionError> {
        self.fetch_thread_list(session)?;
        let url = match session.current_url() {
            Ok(url) => url,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                self.emitter
                    .system_warning(format!("System error: could not read the page url ({err})."));
                return Ok(());
            }
        };
        self.sync_thread(session, &url, SyncMode::Cached)
    }

    /// Pulls commands until a stop, a closed queue or a session-fatal error.
    pub fn run(
        &mut self,
        session: &mut dyn BrowserSession,
        queue: &mut CommandQueue,
    ) -> Result<(), Fault> {
        loop {
            if self.stop.is_raised() {
                self.signal(Signal::Stop);
                return Ok(());
            }
            let pending = match queue.next(self.config.queue_poll()) {
                Next::Ready(pending) => pending,
                Next::Empty => continue,
                Next::Closed => {
                    engine_info!("Command queue closed, stopping");
                    self.signal(Signal::Stop);
                    return Ok(());
                }
            };
            match self.execute(session, &pending.command) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => return Ok(()),
                Err(error) => {
                    let interrupted = if self.submitted { None } else { Some(pending) };
                    return Err(Fault { error, interrupted });
                }
            }
        }
    }

    /// Runs one command. Only session-fatal errors come back as `Err`; every
    /// other failure is reported as a system line and the loop goes on.
    pub fn execute(
        &mut self,
        session: &mut dyn BrowserSession,
        command: &Command,
    ) -> Result<Flow, SessionError> {
        if !command.is_actionable() {
            engine_debug!("Ignoring {} without payload", command.label());
            return Ok(Flow::Continue);
        }
        if *command == Command::Stop {
            self.signal(Signal::Stop);
            return Ok(Flow::Stop);
        }

        engine_debug!("Executing {}", command.label());
        self.submitted = false;
        self.signal(Signal::Begin);
        let result = match command {
            Command::Navigate { url } => self.navigate(session, url),
            Command::Send { text } => self.send(session, text),
            Command::ReloadSimple { url } => self.reload(session, url),
            Command::ReloadAndInvalidate { url } => self.reload_and_invalidate(session, url),
            Command::ClearAllCache => self.clear_all_cache(session),
            Command::FetchThreadList => self.fetch_thread_list(session),
            Command::Stop => Ok(()),
        };
        match result {
            Ok(()) => {
                self.signal(Signal::Finished);
                Ok(Flow::Continue)
            }
            Err(err) if err.is_fatal() => {
                engine_warn!("{} aborted: {}", command.label(), err);
                self.signal(Signal::SessionLost);
                Err(err)
            }
            Err(err) => {
                self.emitter
                    .system_warning(format!("System error (in loop): {err}"));
                self.signal(Signal::Finished);
                Ok(Flow::Continue)
            }
        }
    }

    fn navigate(&mut self, session: &mut dyn BrowserSession, url: &str) -> Result<(), SessionError> {
        self.emitter
            .system_line(format!("System: navigating to {url}"));
        session.goto(url)?;
        self.sync_thread(session, url, SyncMode::Cached)
    }

    fn reload(&mut self, session: &mut dyn BrowserSession, url: &str) -> Result<(), SessionError> {
        self.emitter.system_line(format!("System: reloading {url}"));
        let target = ThreadId::from_url(url);
        let showing = match session.current_url() {
            Ok(current) => Some(ThreadId::from_url(&current)),
            Err(err) if err.is_fatal() => return Err(err),
            Err(_) => None,
        };
        if showing.as_ref() == Some(&target) {
            session.reload()?;
        } else {
            session.goto(url)?;
        }
        self.sync_thread(session, url, SyncMode::Forced)
    }

    fn reload_and_invalidate(
        &mut self,
        session: &mut dyn BrowserSession,
        url: &str,
    ) -> Result<(), SessionError> {
        let thread = ThreadId::from_url(url);
        match self.cache.remove(&thread) {
            Ok(true) => self
                .emitter
                .system_line(format!("System: dropped the cache of {thread}.")),
            Ok(false) => engine_debug!("No cache entry for {}", thread),
            Err(err) => self
                .emitter
                .system_warning(format!("System error: could not drop the cache of {thread} ({err}).")),
        }
        self.reload(session, url)
    }

    fn clear_all_cache(&mut self, session: &mut dyn BrowserSession) -> Result<(), SessionError> {
        let removed = self.cache.clear();
        self.emitter
            .system_line(format!("System: cache cleared, {removed} entries deleted."));
        self.fetch_thread_list(session)
    }

    /// Polls the thread index until it renders and publishes it.
    pub fn fetch_thread_list(&mut self, session: &mut dyn BrowserSession) -> Result<(), SessionError> {
        let emitter = self.emitter;
        let limit = self.config.thread_list_limit;
        emitter.system_line("System: syncing the thread list");
        let polled = poll_until(&self.config.thread_list, self.stop, || {
            match session.thread_index(limit) {
                Ok(threads) if !threads.is_empty() => Ok(Some(threads)),
                Ok(_) => {
                    emitter.system_append(".");
                    Ok(None)
                }
                Err(err) => {
                    emitter.system_append(".");
                    Err(sample_failure(err))
                }
            }
        })?;
        match polled {
            Polled::Ready(threads) => {
                emitter.system_append(" done\n");
                let count = threads.len();
                emitter.thread_list(threads);
                emitter.system_line(format!("System: synced {count} threads."));
            }
            Polled::Exhausted => {
                emitter.system_append("\n");
                emitter.system_warning(format!(
                    "System error: thread list unavailable after {} attempts.",
                    self.config.thread_list.max_ticks
                ));
            }
            Polled::Cancelled => emitter.system_append("\n"),
        }
        Ok(())
    }

    /// Brings the display and the cache of the thread behind `url` in line
    /// with the page.
    pub fn sync_thread(
        &mut self,
        session: &mut dyn BrowserSession,
        url: &str,
        mode: SyncMode,
    ) -> Result<(), SessionError> {
        let thread = ThreadId::from_url(url);
        self.current = thread.clone();
        let cached = self.load_cache(&thread);

        if mode == SyncMode::Cached && !cached.is_empty() {
            self.emitter.system_line("System: replaying the local cache.");
            self.emitter.history(&cached);
        }
        if !thread.is_new() {
            self.settle_page(session)?;
        }

        self.emitter.system_line("System: extracting the conversation...");
        let Some(observed) = self.observe(session)? else {
            return Ok(());
        };
        let outcome = reconcile(&cached, &observed);
        match mode {
            SyncMode::Cached => match outcome.kind {
                SyncKind::Full if !outcome.to_emit.is_empty() => {
                    self.emitter.history(&outcome.to_emit);
                }
                SyncKind::Append => {
                    self.emitter.system_line(format!(
                        "System: {} new turns since the last visit.",
                        outcome.to_emit.len()
                    ));
                    self.emitter.turns(&outcome.to_emit);
                }
                SyncKind::Full | SyncKind::UpToDate => {}
            },
            SyncMode::Forced => self.emitter.turns(&observed),
        }
        if outcome.cache_changed() {
            self.store_cache(&thread, &outcome.new_cache);
        }
        self.emitter.system_line(format!("System: {thread} synced."));
        Ok(())
    }

    /// Waits until the number of rendered turns stops changing, scrolling
    /// whenever it grows so lazily mounted turns appear.
    fn settle_page(&mut self, session: &mut dyn BrowserSession) -> Result<(), SessionError> {
        let emitter = self.emitter;
        emitter.system_line("System: waiting for the page to render (scrolling to load every turn)...");
        scroll(session)?;

        let mut last_count = None;
        let outcome = await_stability(&self.config.page_settle, self.stop, || {
            let count = session.turn_count().map_err(sample_failure)?;
            if count == 0 {
                emitter.system_append(".");
                return Err(SampleError::transient("no turns rendered yet"));
            }
            emitter.system_append(format!(" [detected:{count}]"));
            if last_count != Some(count) {
                last_count = Some(count);
                scroll(session)?;
            }
            Ok(count)
        })?;
        match outcome {
            Stability::Converged { .. } => emitter.system_append(" stable\n"),
            Stability::TimedOut => {
                emitter.system_append(" timeout\n");
                emitter.system_warning(
                    "System warning: the page did not settle in time, continuing with what is rendered.",
                );
            }
            Stability::Cancelled => emitter.system_append("\n"),
        }
        Ok(())
    }

    /// Submits `text` and follows the answer as a stream.
    fn send(&mut self, session: &mut dyn BrowserSession, text: &str) -> Result<(), SessionError> {
        let emitter = self.emitter;
        emitter.system_line("System: sending the message...");
        emitter.user_turn(text);

        let baseline = session.last_assistant()?.count;
        session.fill_prompt(text)?;
        pause(self.config.submit_settle());
        session.submit_prompt()?;
        self.submitted = true;
        self.signal(Signal::StreamOpened);

        emitter.system_line("System: waiting for the answer");
        emitter.stream_start();
        let mut shown = StreamAccumulator::new();
        let outcome = await_stability(&self.config.response, self.stop, || {
            let snapshot = session.last_assistant().map_err(sample_failure)?;
            if snapshot.count <= baseline {
                return Err(SampleError::transient("answer not started"));
            }
            let text = normalize_text(snapshot.last_text.as_deref().unwrap_or_default());
            if text.is_empty() {
                return Err(SampleError::transient("answer still empty"));
            }
            if let Some(delta) = shown.advance(&text) {
                emitter.stream_chunk(delta);
            }
            Ok(text)
        })?;

        match outcome {
            Stability::Converged { tick } => {
                emitter.stream_end();
                engine_debug!("Answer settled after {} ticks", tick);
                emitter.system_line("System: answer complete, refreshing the cache...");
                self.persist_after_send(session)
            }
            Stability::TimedOut => {
                emitter.system_warning(
                    "System warning: the answer did not settle in time and may be incomplete.",
                );
                Ok(())
            }
            Stability::Cancelled => Ok(()),
        }
    }

    /// Re-reads the page after an answer and stores it. Nothing is emitted:
    /// both turns were already shown. A new thread gets its id here, once the
    /// remote has assigned one.
    fn persist_after_send(&mut self, session: &mut dyn BrowserSession) -> Result<(), SessionError> {
        match session.current_url() {
            Ok(url) => {
                let thread = ThreadId::from_url(&url);
                if !thread.is_new() && thread != self.current {
                    self.emitter
                        .system_line(format!("System: now following {thread}."));
                    self.current = thread;
                }
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => engine_warn!("Could not read the page url after sending: {}", err),
        }
        if self.current.is_new() {
            return Ok(());
        }

        let thread = self.current.clone();
        let cached = self.load_cache(&thread);
        let Some(observed) = self.observe(session)? else {
            return Ok(());
        };
        let outcome = reconcile(&cached, &observed);
        if outcome.cache_changed() {
            self.store_cache(&thread, &outcome.new_cache);
        }
        Ok(())
    }

    /// Extracts the page. A non-fatal failure counts as no new data.
    fn observe(&self, session: &mut dyn BrowserSession) -> Result<Option<Vec<Turn>>, SessionError> {
        match self.extractor.extract(session) {
            Ok(turns) => Ok(Some(turns)),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                self.emitter
                    .system_warning(format!("System error: extraction failed ({err})."));
                Ok(None)
            }
        }
    }

    fn load_cache(&self, thread: &ThreadId) -> Vec<Turn> {
        match self.cache.load(thread) {
            Ok(turns) => turns,
            Err(err) => {
                self.emitter.system_warning(format!(
                    "System warning: ignoring the unreadable cache of {thread} ({err})."
                ));
                Vec::new()
            }
        }
    }

    fn store_cache(&self, thread: &ThreadId, turns: &[Turn]) {
        if let Err(err) = self.cache.save(thread, turns) {
            self.emitter
                .system_warning(format!("System error: failed to write the cache of {thread} ({err})."));
        }
    }
}

/// Scrolls the page; only a lost session is an error here.
fn scroll(session: &mut dyn BrowserSession) -> Result<(), SessionError> {
    match session.scroll_to_bottom() {
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            engine_trace!("scroll failed: {}", err);
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}
