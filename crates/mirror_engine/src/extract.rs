use mirror_core::{Role, Turn};
use serde::Deserialize;

use crate::{BrowserSession, SessionError, SessionErrorKind};

/// Turns a live page into its ordered list of turns. May fail at any time.
pub trait TranscriptExtractor: Send {
    fn extract(&self, session: &mut dyn BrowserSession) -> Result<Vec<Turn>, SessionError>;
}

impl<F> TranscriptExtractor for F
where
    F: Fn(&mut dyn BrowserSession) -> Result<Vec<Turn>, SessionError> + Send,
{
    fn extract(&self, session: &mut dyn BrowserSession) -> Result<Vec<Turn>, SessionError> {
        self(session)
    }
}

/// Extracts turns by running a DOM script that returns `[{role, text}]`.
///
/// The default script reads the conversation articles, keeps code blocks
/// verbatim as fenced blocks (with their language label) and prefixes list
/// items so their numbering survives `innerText`.
#[derive(Debug, Clone)]
pub struct DomTranscriptExtractor {
    script: String,
}

#[derive(Debug, Deserialize)]
struct RawTurn {
    #[serde(default)]
    role: String,
    #[serde(default)]
    text: String,
}

impl DomTranscriptExtractor {
    pub fn new() -> Self {
        Self::with_script(TRANSCRIPT_SCRIPT)
    }

    pub fn with_script(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

impl Default for DomTranscriptExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptExtractor for DomTranscriptExtractor {
    fn extract(&self, session: &mut dyn BrowserSession) -> Result<Vec<Turn>, SessionError> {
        let value = session.evaluate(&self.script)?;
        parse_turns(value)
    }
}

/// Converts a script result into normalized turns.
pub fn parse_turns(value: serde_json::Value) -> Result<Vec<Turn>, SessionError> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    let raw: Vec<RawTurn> = serde_json::from_value(value).map_err(|err| {
        SessionError::new(
            SessionErrorKind::Script,
            format!("transcript script returned unexpected data: {err}"),
        )
    })?;
    Ok(raw
        .into_iter()
        .map(|turn| Turn::new(Role::from_author(&turn.role), turn.text))
        .collect())
}

const TRANSCRIPT_SCRIPT: &str = r##"(() => {
  const articles = document.querySelectorAll('article[data-testid^="conversation-turn"]');
  const stage = document.createElement('div');
  stage.style.position = 'absolute';
  stage.style.left = '-9999px';
  stage.style.width = '1000px';
  stage.style.whiteSpace = 'pre-wrap';
  document.body.appendChild(stage);

  const codeBlock = (pre) => {
    let lang = '';
    const code = pre.querySelector('code');
    if (code && code.className) {
      const m = code.className.match(/language-([a-zA-Z0-9_\-]+)/);
      if (m) lang = m[1].toLowerCase();
    }
    let text = (pre.innerText || pre.textContent || '').replace(/^(Copy code)\s*/i, '');
    if (lang) {
      text = text.replace(new RegExp('^' + lang + '\\s*', 'i'), '');
    }
    return '\n```' + lang + '\n' + text.trim() + '\n```\n';
  };

  const staged = Array.from(articles).map((article) => {
    const roleEl = article.querySelector('[data-message-author-role]');
    const role = roleEl ? roleEl.getAttribute('data-message-author-role') : 'unknown';
    const codes = Array.from(article.querySelectorAll('pre')).map(codeBlock);
    const clone = (roleEl || article).cloneNode(true);
    clone.querySelectorAll('pre').forEach((pre, idx) => {
      const marker = document.createElement('div');
      marker.innerText = '___CODE_BLOCK_' + idx + '___';
      pre.replaceWith(marker);
    });
    clone.querySelectorAll('ol').forEach((ol) => {
      let n = 1;
      Array.from(ol.children).forEach((li) => {
        if (li.tagName === 'LI') {
          const p = li.querySelector('p');
          (p || li).prepend(document.createTextNode(n + '. '));
          n++;
        }
      });
    });
    clone.querySelectorAll('ul').forEach((ul) => {
      Array.from(ul.children).forEach((li) => {
        if (li.tagName === 'LI') {
          const p = li.querySelector('p');
          (p || li).prepend(document.createTextNode('- '));
        }
      });
    });
    const wrapper = document.createElement('div');
    wrapper.appendChild(clone);
    stage.appendChild(wrapper);
    return { role, wrapper, codes };
  });

  const turns = staged.map(({ role, wrapper, codes }) => {
    let text = wrapper.innerText;
    codes.forEach((code, idx) => {
      text = text.replace('___CODE_BLOCK_' + idx + '___', code);
    });
    return { role, text };
  });
  document.body.removeChild(stage);
  return turns;
})()"##;
