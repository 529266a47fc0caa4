use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use mirror_core::{Command, Event};

use crate::emit::{ChannelEventSink, Emitter};
use crate::extract::TranscriptExtractor;
use crate::poll::StopFlag;
use crate::queue::{command_channel, CommandSender};
use crate::supervisor::{Supervisor, SupervisorError, SupervisorReport};
use crate::{EngineConfig, SessionFactory};

/// Runs the supervisor on its own thread. Commands go in through a FIFO
/// queue, events come out over an unbounded channel.
pub struct EngineHandle {
    commands: CommandSender,
    events: mpsc::Receiver<Event>,
    stop: StopFlag,
    worker: thread::JoinHandle<Result<SupervisorReport, SupervisorError>>,
}

impl EngineHandle {
    pub fn spawn<F, X>(config: EngineConfig, factory: F, extractor: X) -> Self
    where
        F: SessionFactory + 'static,
        X: TranscriptExtractor + 'static,
    {
        let (commands, queue) = command_channel();
        let (event_tx, events) = mpsc::channel();
        let stop = StopFlag::new();
        let emitter = Emitter::new(Arc::new(ChannelEventSink::new(event_tx)));
        let supervisor = Supervisor::new(
            config,
            factory,
            Box::new(extractor),
            emitter,
            stop.clone(),
            queue,
        );

        let worker = thread::spawn(move || supervisor.run());

        Self {
            commands,
            events,
            stop,
            worker,
        }
    }

    /// A producer handle for other threads.
    pub fn sender(&self) -> CommandSender {
        self.commands.clone()
    }

    pub fn send(&self, command: Command) {
        let _ = self.commands.send(command);
    }

    pub fn try_recv(&self) -> Option<Event> {
        self.events.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Event, mpsc::RecvTimeoutError> {
        self.events.recv_timeout(timeout)
    }

    /// Iterates over events until the engine is gone.
    pub fn events(&self) -> mpsc::Iter<'_, Event> {
        self.events.iter()
    }

    /// Asks the engine to finish: polls end early and the queue is not
    /// drained any further.
    pub fn stop(&self) {
        self.stop.raise();
        let _ = self.commands.send(Command::Stop);
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Waits for the engine thread.
    pub fn join(self) -> Result<SupervisorReport, SupervisorError> {
        let Self { worker, .. } = self;
        worker.join().map_err(|_| SupervisorError::Panicked)?
    }
}
