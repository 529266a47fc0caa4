use engine_logging::{engine_debug, engine_info};
use thiserror::Error;

use crate::cache::CacheStore;
use crate::dispatch::{Dispatcher, Fault};
use crate::emit::Emitter;
use crate::extract::TranscriptExtractor;
use crate::poll::{wait_unless_stopped, StopFlag};
use crate::queue::CommandQueue;
use crate::{BrowserSession, EngineConfig, SessionError, SessionErrorKind, SessionFactory};

/// How often an interrupted command may be run again after a restart.
const MAX_REPLAYS: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SupervisorError {
    #[error("gave up after {restarts} restarts; last failure: {last}")]
    RestartsExhausted { restarts: u32, last: SessionError },
    #[error("engine thread panicked")]
    Panicked,
}

/// Summary of a supervisor run that ended on a stop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorReport {
    /// Sessions rebuilt after a failure.
    pub restarts: u32,
}

/// Owns the browser lifecycle: opens a session, runs the dispatcher on it
/// and rebuilds it after a fatal failure, until stopped.
pub struct Supervisor<F: SessionFactory> {
    config: EngineConfig,
    factory: F,
    extractor: Box<dyn TranscriptExtractor>,
    emitter: Emitter,
    stop: StopFlag,
    queue: CommandQueue,
}

impl<F: SessionFactory> Supervisor<F> {
    pub fn new(
        config: EngineConfig,
        factory: F,
        extractor: Box<dyn TranscriptExtractor>,
        emitter: Emitter,
        stop: StopFlag,
        queue: CommandQueue,
    ) -> Self {
        Self {
            config,
            factory,
            extractor,
            emitter,
            stop,
            queue,
        }
    }

    pub fn run(self) -> Result<SupervisorReport, SupervisorError> {
        let Supervisor {
            config,
            mut factory,
            extractor,
            emitter,
            stop,
            mut queue,
        } = self;
        let cache = CacheStore::new(config.cache_dir.clone());
        let mut dispatcher =
            Dispatcher::new(&config, &cache, &emitter, extractor.as_ref(), &stop);
        let mut report = SupervisorReport::default();

        loop {
            if stop.is_raised() {
                return Ok(report);
            }
            emitter.system_line("System: starting the browser...");
            let fault = match factory.open(&config) {
                Ok(mut session) => {
                    emitter.system_line("System: browser ready.");
                    match serve(&mut dispatcher, &mut session, &mut queue) {
                        Ok(()) => {
                            emitter.system_line("System: shutting down, waiting for the browser to exit...");
                            if let Err(err) = session.close() {
                                engine_debug!("Close after stop failed: {}", err);
                            }
                            engine_info!("Supervisor stopped after {} restarts", report.restarts);
                            return Ok(report);
                        }
                        Err(fault) => {
                            if let Err(err) = session.close() {
                                engine_debug!("Close of the lost session failed: {}", err);
                            }
                            fault
                        }
                    }
                }
                Err(err) => Fault::bare(err),
            };

            dispatcher.session_lost();
            if stop.is_raised() {
                return Ok(report);
            }
            emitter.system_warning(match fault.error.kind {
                SessionErrorKind::Launch => {
                    format!("[Warning] Could not start the browser ({}).", fault.error)
                }
                _ => format!("[Warning] Lost connection to the browser ({}).", fault.error),
            });
            if let Some(pending) = fault.interrupted {
                if pending.attempts < MAX_REPLAYS {
                    emitter.system_line(format!(
                        "System: {} will be retried after the restart.",
                        pending.command.label()
                    ));
                    queue.push_front(pending.retry());
                } else {
                    emitter.system_warning(format!(
                        "System error: dropping {} after repeated failures.",
                        pending.command.label()
                    ));
                }
            }

            report.restarts += 1;
            if let Some(max) = config.max_restarts {
                if report.restarts > max {
                    emitter.system_warning(format!(
                        "System error: giving up after {max} restarts."
                    ));
                    return Err(SupervisorError::RestartsExhausted {
                        restarts: max,
                        last: fault.error,
                    });
                }
            }
            emitter.system_line(format!(
                "System: restarting the browser in {} ms...",
                config.restart_delay_ms
            ));
            if !wait_unless_stopped(config.restart_delay(), &stop) {
                return Ok(report);
            }
            dispatcher.session_restored();
        }
    }
}

fn serve(
    dispatcher: &mut Dispatcher<'_>,
    session: &mut dyn BrowserSession,
    queue: &mut CommandQueue,
) -> Result<(), Fault> {
    dispatcher.startup(session).map_err(Fault::bare)?;
    dispatcher.run(session, queue)
}
