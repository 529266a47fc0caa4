//! Chromium driver for [`BrowserSession`] over the DevTools protocol.
//!
//! The engine is synchronous; each session owns a small tokio runtime and
//! blocks on the CDP futures, so a browser call never overlaps another one.
use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::InsertTextParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::StreamExt;
use mirror_core::ThreadSummary;
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;

use crate::{
    AssistantSnapshot, BrowserSession, EngineConfig, SessionError, SessionErrorKind,
    SessionFactory,
};

const PROMPT_SELECTOR: &str = "#prompt-textarea";

const TURN_COUNT_SCRIPT: &str =
    r#"document.querySelectorAll('article[data-testid^="conversation-turn"]').length"#;

const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight); true";

const ASSISTANT_SCRIPT: &str = r#"(() => {
  const nodes = document.querySelectorAll('[data-message-author-role="assistant"]');
  const last = nodes.length ? nodes[nodes.length - 1] : null;
  return { count: nodes.length, text: last ? last.innerText : null };
})()"#;

fn thread_index_script(limit: usize) -> String {
    format!(
        r#"(() => Array.from(document.querySelectorAll('nav a[href^="/c/"]'))
  .slice(0, {limit})
  .map((a) => ({{ title: a.innerText, url: a.href }})))()"#
    )
}

/// Launch settings of the Chromium driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Explicit browser executable; searched on the PATH when absent.
    pub executable: Option<PathBuf>,
    /// Persistent profile, so logins survive restarts.
    pub user_data_dir: PathBuf,
    pub headless: bool,
    /// Per-request CDP timeout (navigation included).
    pub timeout_ms: u64,
    pub args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            user_data_dir: PathBuf::from("session"),
            headless: false,
            timeout_ms: 300_000,
            args: vec![
                "--disable-blink-features=AutomationControlled".to_string(),
                "--no-sandbox".to_string(),
            ],
        }
    }
}

/// [`SessionFactory`] that launches a fresh Chromium per session.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    settings: BrowserSettings,
}

impl ChromiumLauncher {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

impl SessionFactory for ChromiumLauncher {
    type Session = ChromiumSession;

    fn open(&mut self, config: &EngineConfig) -> Result<ChromiumSession, SessionError> {
        ChromiumSession::launch(&self.settings, &config.home_url)
    }
}

pub struct ChromiumSession {
    runtime: Runtime,
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumSession {
    pub fn launch(settings: &BrowserSettings, home_url: &str) -> Result<Self, SessionError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|err| launch_error(format!("failed to start runtime: {err}")))?;
        let config = build_config(settings)?;

        let (browser, page, handler) = runtime.block_on(async {
            let (mut browser, mut handler) = Browser::launch(config)
                .await
                .map_err(|err| launch_error(format!("failed to launch chromium: {err}")))?;
            let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

            let existing = browser
                .pages()
                .await
                .map_err(|err| launch_error(format!("failed to list pages: {err}")))?;
            let page = match existing.into_iter().next() {
                Some(page) => page,
                None => browser
                    .new_page("about:blank")
                    .await
                    .map_err(|err| launch_error(format!("failed to open page: {err}")))?,
            };
            if let Err(err) = page.goto(home_url).await {
                let _ = browser.close().await;
                return Err(launch_error(format!("failed to open {home_url}: {err}")));
            }
            Ok::<_, SessionError>((browser, page, handler))
        })?;

        engine_info!("Chromium session opened at {}", home_url);
        Ok(Self {
            runtime,
            browser,
            page,
            handler,
        })
    }

    fn eval<T: serde::de::DeserializeOwned>(&mut self, script: &str) -> Result<T, SessionError> {
        let page = &self.page;
        let result = self
            .runtime
            .block_on(page.evaluate(script))
            .map_err(|err| SessionError::from_driver(SessionErrorKind::Script, err.to_string()))?;
        result.into_value::<T>().map_err(|err| {
            SessionError::new(
                SessionErrorKind::Script,
                format!("unexpected script result: {err}"),
            )
        })
    }
}

impl BrowserSession for ChromiumSession {
    fn goto(&mut self, url: &str) -> Result<(), SessionError> {
        let page = &self.page;
        self.runtime
            .block_on(page.goto(url))
            .map(|_| ())
            .map_err(|err| SessionError::from_driver(SessionErrorKind::Navigation, err.to_string()))
    }

    fn reload(&mut self) -> Result<(), SessionError> {
        let page = &self.page;
        self.runtime
            .block_on(page.reload())
            .map(|_| ())
            .map_err(|err| SessionError::from_driver(SessionErrorKind::Navigation, err.to_string()))
    }

    fn current_url(&mut self) -> Result<String, SessionError> {
        let page = &self.page;
        let url = self
            .runtime
            .block_on(page.url())
            .map_err(|err| SessionError::from_driver(SessionErrorKind::Script, err.to_string()))?;
        Ok(url.unwrap_or_default())
    }

    fn scroll_to_bottom(&mut self) -> Result<(), SessionError> {
        self.eval::<bool>(SCROLL_SCRIPT).map(|_| ())
    }

    fn turn_count(&mut self) -> Result<usize, SessionError> {
        self.eval::<usize>(TURN_COUNT_SCRIPT)
    }

    fn last_assistant(&mut self) -> Result<AssistantSnapshot, SessionError> {
        #[derive(Deserialize)]
        struct Raw {
            count: usize,
            text: Option<String>,
        }
        let raw: Raw = self.eval(ASSISTANT_SCRIPT)?;
        Ok(AssistantSnapshot {
            count: raw.count,
            last_text: raw.text,
        })
    }

    fn fill_prompt(&mut self, text: &str) -> Result<(), SessionError> {
        let page = &self.page;
        self.runtime
            .block_on(async {
                let prompt = page.find_element(PROMPT_SELECTOR).await?;
                prompt.click().await?;
                page.execute(InsertTextParams::new(text)).await?;
                Ok::<_, chromiumoxide::error::CdpError>(())
            })
            .map_err(|err| SessionError::from_driver(SessionErrorKind::Input, err.to_string()))
    }

    fn submit_prompt(&mut self) -> Result<(), SessionError> {
        let page = &self.page;
        self.runtime
            .block_on(async {
                let prompt = page.find_element(PROMPT_SELECTOR).await?;
                prompt.press_key("Enter").await?;
                Ok::<_, chromiumoxide::error::CdpError>(())
            })
            .map_err(|err| SessionError::from_driver(SessionErrorKind::Input, err.to_string()))
    }

    fn thread_index(&mut self, limit: usize) -> Result<Vec<ThreadSummary>, SessionError> {
        #[derive(Deserialize)]
        struct Raw {
            title: String,
            url: String,
        }
        let raw: Vec<Raw> = self.eval(&thread_index_script(limit))?;
        Ok(raw
            .into_iter()
            .map(|entry| ThreadSummary::new(&entry.title, entry.url))
            .collect())
    }

    fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, SessionError> {
        let page = &self.page;
        let result = self
            .runtime
            .block_on(page.evaluate(script))
            .map_err(|err| SessionError::from_driver(SessionErrorKind::Script, err.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    fn close(&mut self) -> Result<(), SessionError> {
        let browser = &mut self.browser;
        let outcome = self.runtime.block_on(async {
            browser.close().await?;
            let _ = browser.wait().await;
            Ok::<_, chromiumoxide::error::CdpError>(())
        });
        self.handler.abort();
        match outcome {
            Ok(()) => {
                engine_debug!("Chromium session closed");
                Ok(())
            }
            Err(err) => {
                engine_warn!("Chromium did not close cleanly: {}", err);
                Err(SessionError::from_driver(SessionErrorKind::Lost, err.to_string()))
            }
        }
    }
}

fn build_config(settings: &BrowserSettings) -> Result<BrowserConfig, SessionError> {
    let mut builder = BrowserConfig::builder()
        .user_data_dir(&settings.user_data_dir)
        .request_timeout(Duration::from_millis(settings.timeout_ms))
        .viewport(None::<Viewport>)
        .args(settings.args.clone());
    if !settings.headless {
        builder = builder.with_head();
    }
    if let Some(executable) = &settings.executable {
        builder = builder.chrome_executable(executable);
    }
    builder
        .build()
        .map_err(|err| launch_error(format!("failed to configure chromium: {err}")))
}

fn launch_error(message: String) -> SessionError {
    SessionError::new(SessionErrorKind::Launch, message)
}
