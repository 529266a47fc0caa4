use std::collections::VecDeque;
use std::sync::mpsc;
use std::time::Duration;

use mirror_core::Command;

/// A command pulled from the queue, with the number of times it was already
/// interrupted by a lost session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pending {
    pub command: Command,
    pub attempts: u32,
}

impl Pending {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            attempts: 0,
        }
    }

    pub fn retry(self) -> Self {
        Self {
            attempts: self.attempts + 1,
            ..self
        }
    }
}

/// Producer side; cheap to clone and never blocks.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<Command>,
}

impl CommandSender {
    /// Enqueues `command`; returns false once the engine is gone.
    pub fn send(&self, command: Command) -> bool {
        self.tx.send(command).is_ok()
    }
}

/// Result of one receive attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    Ready(Pending),
    /// Nothing arrived within the timeout.
    Empty,
    /// Every producer is gone and nothing is left.
    Closed,
}

/// Consumer side. Lives outside the browser session so it survives restarts.
#[derive(Debug)]
pub struct CommandQueue {
    rx: mpsc::Receiver<Command>,
    replay: VecDeque<Pending>,
}

pub fn command_channel() -> (CommandSender, CommandQueue) {
    let (tx, rx) = mpsc::channel();
    (
        CommandSender { tx },
        CommandQueue {
            rx,
            replay: VecDeque::new(),
        },
    )
}

impl CommandQueue {
    /// Next command in FIFO order, replayed commands first. Blocks for at
    /// most `timeout`.
    pub fn next(&mut self, timeout: Duration) -> Next {
        if let Some(pending) = self.replay.pop_front() {
            return Next::Ready(pending);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(command) => Next::Ready(Pending::new(command)),
            Err(mpsc::RecvTimeoutError::Timeout) => Next::Empty,
            Err(mpsc::RecvTimeoutError::Disconnected) => Next::Closed,
        }
    }

    /// Puts an interrupted command back at the head of the queue.
    pub fn push_front(&mut self, pending: Pending) {
        self.replay.push_front(pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replayed_commands_come_before_queued_ones() {
        let (tx, mut queue) = command_channel();
        tx.send(Command::FetchThreadList);
        tx.send(Command::Stop);

        let first = match queue.next(Duration::ZERO) {
            Next::Ready(pending) => pending,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(first.command, Command::FetchThreadList);
        queue.push_front(first.retry());

        assert_eq!(
            queue.next(Duration::ZERO),
            Next::Ready(Pending {
                command: Command::FetchThreadList,
                attempts: 1
            })
        );
        assert_eq!(queue.next(Duration::ZERO), Next::Ready(Pending::new(Command::Stop)));
        assert_eq!(queue.next(Duration::ZERO), Next::Empty);
    }

    #[test]
    fn dropped_producers_close_the_queue() {
        let (tx, mut queue) = command_channel();
        drop(tx);
        assert_eq!(queue.next(Duration::from_millis(10)), Next::Closed);
    }
}
