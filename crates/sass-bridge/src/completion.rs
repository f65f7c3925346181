/*
 * completion.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Completion handles for extension functions and importers.
 */

//! Completion handles for extension functions and importers.
//!
//! A user callback can produce its result in two ways: by returning it, or
//! by calling [`Done::resolve`] on the handle it was given, possibly later and
//! from another thread. Which of the two the bridge is prepared to wait for
//! depends on the entry point in use:
//!
//! - [`CompletionMode::Immediate`] (synchronous compiles): the result must be
//!   available when the callback returns.
//! - [`CompletionMode::Signalled`] (asynchronous compiles): if the callback
//!   returns nothing, the bridge waits for the handle to be resolved.
//!
//! A returned value always settles the call, even when the handle was also
//! resolved while the callback ran. Otherwise the first resolution wins.
//! Anything reported after the call settled is dropped with a warning;
//! nothing is ever merged.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;
use tracing::warn;

/// How a callback's result is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    /// Only a returned value (or a resolution made before returning) counts.
    Immediate,
    /// A missing return value means "wait for the completion handle".
    Signalled,
}

/// Completion handle passed to user callbacks.
///
/// Cloning yields another handle to the same slot. Dropping every handle
/// without resolving is treated as "never completes".
pub struct Done<T> {
    sender: Arc<Mutex<Option<oneshot::Sender<T>>>>,
    label: Arc<str>,
}

impl<T> Clone for Done<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
            label: Arc::clone(&self.label),
        }
    }
}

impl<T> std::fmt::Debug for Done<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Done")
            .field("label", &self.label)
            .field("settled", &self.is_settled())
            .finish()
    }
}

impl<T> Done<T> {
    /// Report the result. Returns `false` if a result was already reported.
    pub fn resolve(&self, value: T) -> bool {
        match self.take_sender() {
            Some(sender) => {
                // The receiver may be gone if the call already settled through
                // a return value; that case is covered by take_sender above.
                let _ = sender.send(value);
                true
            }
            None => {
                warn!(callback = %self.label, "completion reported twice; ignoring the later report");
                false
            }
        }
    }

    pub fn is_settled(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn take_sender(&self) -> Option<oneshot::Sender<T>> {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// One pending callback invocation: the handle given to the callback and the
/// receiving end the bridge settles from.
pub(crate) struct Pending<T> {
    done: Done<T>,
    receiver: oneshot::Receiver<T>,
}

/// Outcome of a single callback invocation.
#[derive(Debug, PartialEq)]
pub(crate) enum Settled<T> {
    Value(T),
    /// No return value and no resolution ever arrived.
    Nothing,
}

impl<T> Pending<T> {
    pub(crate) fn new(label: &str) -> Self {
        let (sender, receiver) = oneshot::channel();
        Self {
            done: Done {
                sender: Arc::new(Mutex::new(Some(sender))),
                label: Arc::from(label),
            },
            receiver,
        }
    }

    pub(crate) fn handle(&self) -> Done<T> {
        self.done.clone()
    }

    /// Settle without waiting.
    pub(crate) fn settle_now(self, returned: Option<T>) -> Settled<T> {
        match self.settle_returned(returned) {
            Ok(settled) => settled,
            Err(_) => Settled::Nothing,
        }
    }

    /// Settle, waiting on the handle if the callback returned nothing.
    pub(crate) async fn settle(self, returned: Option<T>) -> Settled<T> {
        match self.settle_returned(returned) {
            Ok(settled) => settled,
            Err(receiver) => match receiver.await {
                Ok(value) => Settled::Value(value),
                Err(_) => Settled::Nothing,
            },
        }
    }

    pub(crate) async fn settle_with(self, mode: CompletionMode, returned: Option<T>) -> Settled<T> {
        match mode {
            CompletionMode::Immediate => self.settle_now(returned),
            CompletionMode::Signalled => self.settle(returned).await,
        }
    }

    /// Resolve what can be resolved without waiting. `Err` hands back the
    /// receiver when the result is still outstanding; our own handle has
    /// been dropped by then, so the receiver closes once the callback drops
    /// its copies.
    fn settle_returned(self, returned: Option<T>) -> Result<Settled<T>, oneshot::Receiver<T>> {
        let Pending { done, mut receiver } = self;
        match returned {
            Some(value) => {
                if done.take_sender().is_none() {
                    warn!(
                        callback = %done.label,
                        "callback returned a value after reporting completion; using the returned value"
                    );
                }
                Ok(Settled::Value(value))
            }
            None => match receiver.try_recv() {
                Ok(value) => Ok(Settled::Value(value)),
                Err(oneshot::error::TryRecvError::Closed) => Ok(Settled::Nothing),
                Err(oneshot::error::TryRecvError::Empty) => {
                    drop(done);
                    Err(receiver)
                }
            },
        }
    }
}
