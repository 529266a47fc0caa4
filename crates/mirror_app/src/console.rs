//! Line-oriented operator surface: parses typed input into commands and
//! renders engine events. The transcript goes to one writer, the system log
//! to another.
use std::io::{self, Write};

use mirror_core::{Command, CommandParseError, Event, Role};

pub(crate) const HELP: &str = "\
commands:
  :nav <url>       open a thread and sync it
  :reload <url>    reload and rebuild the transcript
  :reload! <url>   drop the thread cache, then reload
  :threads         refresh the thread list
  :clear           delete every cached thread
  :quit            stop the engine
  {\"kind\": ...}    raw JSON command
anything else is sent as a message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Input {
    Command(Command),
    Help,
    Empty,
    Unknown(String),
}

pub(crate) fn parse_line(line: &str) -> Result<Input, CommandParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Empty);
    }
    if line.starts_with('{') {
        return Command::from_json(line).map(Input::Command);
    }
    let Some(directive) = line.strip_prefix(':') else {
        return Ok(Input::Command(Command::Send {
            text: line.to_string(),
        }));
    };

    let (word, arg) = match directive.split_once(char::is_whitespace) {
        Some((word, arg)) => (word, arg.trim().to_string()),
        None => (directive, String::new()),
    };
    let input = match word {
        "nav" => Input::Command(Command::Navigate { url: arg }),
        "reload" => Input::Command(Command::ReloadSimple { url: arg }),
        "reload!" => Input::Command(Command::ReloadAndInvalidate { url: arg }),
        "threads" => Input::Command(Command::FetchThreadList),
        "clear" => Input::Command(Command::ClearAllCache),
        "quit" | "q" => Input::Command(Command::Stop),
        "help" | "h" => Input::Help,
        other => Input::Unknown(other.to_string()),
    };
    Ok(input)
}

pub(crate) fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "User",
        Role::Assistant => "AI",
        Role::System => "System",
        Role::Unknown => "Unknown",
    }
}

pub(crate) struct Renderer<T: Write, S: Write> {
    transcript: T,
    system: S,
    /// Whether the last system line is still open for appended text.
    system_open: bool,
}

impl<T: Write, S: Write> Renderer<T, S> {
    pub fn new(transcript: T, system: S) -> Self {
        Self {
            transcript,
            system,
            system_open: false,
        }
    }

    pub fn render(&mut self, event: &Event) -> io::Result<()> {
        match event {
            Event::TranscriptAppend {
                role: Role::System,
                text,
            } => writeln!(self.transcript, "{text}")?,
            Event::TranscriptAppend { role, text } => {
                writeln!(self.transcript, "{}: {text}\n", role_label(*role))?
            }
            Event::StreamStart { role } => write!(self.transcript, "{}: ", role_label(*role))?,
            Event::StreamChunk { text } => write!(self.transcript, "{text}")?,
            Event::SystemLine { text } => {
                self.close_system_line()?;
                write!(self.system, "{text}")?;
                self.system_open = true;
            }
            Event::SystemAppend { text } => {
                write!(self.system, "{text}")?;
                self.system_open = !text.ends_with('\n');
            }
            Event::ThreadList { threads } => {
                self.close_system_line()?;
                writeln!(self.system, "Threads:")?;
                for (n, thread) in threads.iter().enumerate() {
                    writeln!(self.system, "  {:>2}. {}  {}", n + 1, thread.title, thread.url)?;
                }
            }
        }
        self.transcript.flush()?;
        self.system.flush()
    }

    /// Ends an open system line; used at shutdown too.
    pub fn close_system_line(&mut self) -> io::Result<()> {
        if self.system_open {
            writeln!(self.system)?;
            self.system_open = false;
        }
        Ok(())
    }

    #[cfg(test)]
    fn into_parts(self) -> (T, S) {
        (self.transcript, self.system)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_core::{ThreadSummary, Turn};
    use pretty_assertions::assert_eq;

    fn render_all(events: &[Event]) -> (String, String) {
        let mut renderer = Renderer::new(Vec::new(), Vec::new());
        for event in events {
            renderer.render(event).unwrap();
        }
        renderer.close_system_line().unwrap();
        let (transcript, system) = renderer.into_parts();
        (
            String::from_utf8(transcript).unwrap(),
            String::from_utf8(system).unwrap(),
        )
    }

    #[test]
    fn directives_map_to_commands() {
        let url = "https://chatgpt.com/c/abc";
        assert_eq!(
            parse_line(&format!(":nav {url}")).unwrap(),
            Input::Command(Command::Navigate { url: url.into() })
        );
        assert_eq!(
            parse_line(&format!(":reload {url}")).unwrap(),
            Input::Command(Command::ReloadSimple { url: url.into() })
        );
        assert_eq!(
            parse_line(&format!(":reload!   {url} ")).unwrap(),
            Input::Command(Command::ReloadAndInvalidate { url: url.into() })
        );
        assert_eq!(
            parse_line(":threads").unwrap(),
            Input::Command(Command::FetchThreadList)
        );
        assert_eq!(parse_line(":clear").unwrap(), Input::Command(Command::ClearAllCache));
        assert_eq!(parse_line(":quit").unwrap(), Input::Command(Command::Stop));
        assert_eq!(parse_line(":help").unwrap(), Input::Help);
        assert_eq!(parse_line(":bogus").unwrap(), Input::Unknown("bogus".into()));
    }

    #[test]
    fn plain_text_is_sent_and_blank_lines_are_skipped() {
        assert_eq!(
            parse_line("  how are you?  ").unwrap(),
            Input::Command(Command::Send {
                text: "how are you?".into()
            })
        );
        assert_eq!(parse_line("   ").unwrap(), Input::Empty);
    }

    #[test]
    fn json_lines_are_parsed_as_commands() {
        assert_eq!(
            parse_line(r#"{"kind": "SEND", "text": "hi"}"#).unwrap(),
            Input::Command(Command::Send { text: "hi".into() })
        );
        assert!(parse_line(r#"{"kind": "FLY"}"#).is_err());
    }

    #[test]
    fn transcript_uses_role_labels_and_streams_inline() {
        let (transcript, _) = render_all(&[
            Event::turn(&Turn::user("hello")),
            Event::StreamStart {
                role: Role::Assistant,
            },
            Event::chunk("Hi"),
            Event::chunk(" there"),
            Event::chunk("\n\n"),
            Event::turn(&Turn::new(Role::Unknown, "?")),
        ]);
        assert_eq!(transcript, "User: hello\n\nAI: Hi there\n\nUnknown: ?\n\n");
    }

    #[test]
    fn system_appends_continue_the_current_line() {
        let (_, system) = render_all(&[
            Event::line("System: waiting"),
            Event::append("."),
            Event::append(" stable\n"),
            Event::line("System: synced."),
            Event::ThreadList {
                threads: vec![ThreadSummary::new("Chat", "https://chatgpt.com/c/a")],
            },
        ]);
        assert_eq!(
            system,
            "System: waiting. stable\nSystem: synced.\nThreads:\n   1. Chat  https://chatgpt.com/c/a\n"
        );
    }
}
