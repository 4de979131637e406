//
// Copyright 2024 kwm-signaling Contributors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! A single dedicated thread draining a queue of boxed closures against one
//! `State`, with a delayed-task heap for timers. This is the "explicit
//! cooperative scheduler" the engine's concurrency model requires: every
//! mutation of engine state happens as a task run on this one thread, so
//! two handlers can never race with each other even though they may be
//! triggered from different OS threads (the transport's socket reader, a
//! timer, the application calling a public method).

use std::{
    cmp::Ordering,
    collections::BinaryHeap,
    sync::{
        atomic::{AtomicBool, Ordering as AtomicOrdering},
        mpsc::{channel, RecvTimeoutError, Sender},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

type BoxedTaskFn<State> = Box<dyn FnOnce(&mut State) + Send>;

struct Task<State> {
    run: BoxedTaskFn<State>,
    deadline: Option<Instant>,
}

impl<State> Task<State> {
    fn immediate(run: BoxedTaskFn<State>) -> Self {
        Self {
            run,
            deadline: None,
        }
    }

    fn delayed(run: BoxedTaskFn<State>, delay: Duration) -> Self {
        Self {
            run,
            deadline: Some(Instant::now() + delay),
        }
    }

    fn as_immediate(self) -> Self {
        Self {
            run: self.run,
            deadline: None,
        }
    }

    fn is_delayed(&self) -> bool {
        self.deadline.is_some()
    }

    fn timeout(&self) -> Duration {
        match self.deadline {
            None => Duration::from_secs(0),
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
        }
    }
}

impl<State> Ord for Task<State> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the earliest deadline on top.
        self.deadline.cmp(&other.deadline).reverse()
    }
}

impl<State> PartialOrd for Task<State> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<State> PartialEq for Task<State> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline
    }
}

impl<State> Eq for Task<State> {}

/// A handle to the single logical thread owning `State`. Cloneable; every
/// clone posts onto the same queue.
pub struct Actor<State> {
    sender: Sender<Task<State>>,
    stopped: Arc<AtomicBool>,
}

impl<State> Clone for Actor<State> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            stopped: self.stopped.clone(),
        }
    }
}

impl<State: 'static> Actor<State> {
    /// Spawns the worker thread and returns a handle plus its join handle.
    /// `gen_state` is run on the worker thread itself, so it may capture a
    /// clone of the returned `Actor` to hand back to itself (e.g. to
    /// schedule its own first timer).
    pub fn new(
        gen_state: impl FnOnce(Actor<State>) -> State + Send + 'static,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = channel::<Task<State>>();
        let stopped = Arc::new(AtomicBool::new(false));

        let actor = Self {
            sender,
            stopped: stopped.clone(),
        };
        let actor_for_state = actor.clone();

        let join_handle = thread::spawn(move || {
            let mut state = gen_state(actor_for_state);
            let mut delayed_tasks = BinaryHeap::<Task<State>>::new();
            loop {
                if stopped.load(AtomicOrdering::Relaxed) {
                    break;
                }
                let received_task = match delayed_tasks.peek() {
                    None => match receiver.recv() {
                        Ok(task) => task,
                        Err(_) => break,
                    },
                    Some(delayed) => match receiver.recv_timeout(delayed.timeout()) {
                        Ok(task) => task,
                        Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => delayed_tasks.pop().unwrap().as_immediate(),
                    },
                };
                if stopped.load(AtomicOrdering::Relaxed) {
                    break;
                }
                if received_task.is_delayed() {
                    delayed_tasks.push(received_task);
                } else {
                    (received_task.run)(&mut state);
                }
            }
        });

        (actor, join_handle)
    }

    /// Runs `run` on the worker thread as soon as it drains the queue.
    pub fn send(&self, run: impl FnOnce(&mut State) + Send + 'static) {
        let _ = self.sender.send(Task::immediate(Box::new(run)));
    }

    /// Runs `run` on the worker thread no earlier than `delay` from now.
    /// Timer cancellation is the caller's job: stash a generation counter
    /// or token in `State` alongside whatever the timer guards, and have
    /// `run` check it's still current before acting.
    pub fn send_delayed(&self, delay: Duration, run: impl FnOnce(&mut State) + Send + 'static) {
        let _ = self.sender.send(Task::delayed(Box::new(run), delay));
    }

    /// Stops the worker thread after its current task (if any) finishes.
    /// Does not drain pending tasks.
    pub fn stop(&self) {
        self.stopped.store(true, AtomicOrdering::Relaxed);
        // Kick the loop in case it's blocked in recv().
        let _ = self.sender.send(Task::immediate(Box::new(|_state| {})));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn runs_immediate_tasks_in_order() {
        let (tx, rx) = mpsc::channel::<u32>();
        let (actor, _join) = Actor::new(move |_self_handle| tx);
        let (done_tx, done_rx) = mpsc::channel::<()>();
        actor.send(move |tx: &mut mpsc::Sender<u32>| {
            tx.send(1).unwrap();
        });
        actor.send(move |tx: &mut mpsc::Sender<u32>| {
            tx.send(2).unwrap();
        });
        actor.send(move |_tx| {
            done_tx.send(()).unwrap();
        });
        done_rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(rx.recv().unwrap(), 1);
        assert_eq!(rx.recv().unwrap(), 2);
    }

    #[test]
    fn delayed_task_runs_after_immediate_ones() {
        let (tx, rx) = mpsc::channel::<&'static str>();
        let (actor, _join) = Actor::new(move |_| tx);
        actor.send_delayed(Duration::from_millis(20), |tx: &mut mpsc::Sender<&'static str>| {
            tx.send("late").unwrap();
        });
        actor.send(|tx: &mut mpsc::Sender<&'static str>| {
            tx.send("early").unwrap();
        });
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "early");
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "late");
    }
}
