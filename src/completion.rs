//! Completion events and their normalization.
//!
//! Every operation accepted by a backend produces exactly one [`RawEvent`], either
//! from the radio stack's flash event handler or synthesized by the manager once a
//! blocking operation returns. [`Completions::complete`] turns it into an
//! [`Outcome`], settles the pending count and hands the outcome to the
//! [`CompletionHandler`] the application registered.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::error::Failure;

/// Opaque caller data carried from a request to its completion, never interpreted here
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(pub usize);

/// The kind of operation that completed
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Write,
    Erase,
}

impl OpKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OpKind::Write => "write",
            OpKind::Erase => "erase",
        }
    }
}

/// Backend native result code, using the radio stack's error numbering
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawStatus(pub u32);

impl RawStatus {
    pub const SUCCESS: RawStatus = RawStatus(0x00);
    pub const INTERNAL: RawStatus = RawStatus(0x03);
    pub const DATA_SIZE: RawStatus = RawStatus(0x0C);
    pub const TIMEOUT: RawStatus = RawStatus(0x0D);
    pub const BUSY: RawStatus = RawStatus(0x11);

    /// Map to a backend independent status. Unknown codes are treated as hardware faults.
    pub fn normalize(self) -> Result<(), Failure> {
        match self {
            Self::SUCCESS => Ok(()),
            Self::TIMEOUT | Self::BUSY => Err(Failure::Busy),
            Self::DATA_SIZE => Err(Failure::PartialCompletion),
            _ => Err(Failure::HardwareFault),
        }
    }
}

/// A completion as reported by a backend
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: OpKind,
    pub addr: u32,
    /// Bytes for a write, pages for an erase
    pub len: u32,
    pub status: RawStatus,
    pub token: Option<Token>,
}

/// A completion after normalization
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub kind: OpKind,
    pub addr: u32,
    pub len: u32,
    pub status: Result<(), Failure>,
    pub token: Option<Token>,
}

impl From<RawEvent> for Outcome {
    fn from(event: RawEvent) -> Self {
        Outcome {
            kind: event.kind,
            addr: event.addr,
            len: event.len,
            status: event.status.normalize(),
            token: event.token,
        }
    }
}

/// Whether a handler took ownership of an outcome
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Consumed,
    /// Nobody was waiting for this token, the outcome is dropped
    Unclaimed,
}

/// Application side consumer of completions.
///
/// Called from the radio stack's event context with the mediated backend, so
/// implementations must not block.
pub trait CompletionHandler {
    fn on_complete(&self, outcome: &Outcome) -> Delivery;
}

impl<T: CompletionHandler + ?Sized> CompletionHandler for &T {
    fn on_complete(&self, outcome: &Outcome) -> Delivery {
        T::on_complete(self, outcome)
    }
}

/// Handler that claims nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl CompletionHandler for Discard {
    fn on_complete(&self, _outcome: &Outcome) -> Delivery {
        Delivery::Unclaimed
    }
}

/// The completion path shared between the submitting context and the backend's event context.
///
/// Owns the pending operation count. Only an accepted request moves it up and
/// only [`Self::complete`] moves it down.
pub struct Completions<H> {
    pending: AtomicU32,
    handler: H,
}

impl<H: CompletionHandler> Completions<H> {
    pub const fn new(handler: H) -> Self {
        Self {
            pending: AtomicU32::new(0),
            handler,
        }
    }

    /// Operations accepted by a backend that have not completed yet
    pub fn pending(&self) -> u32 {
        self.pending.load(Ordering::Acquire)
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Count an operation about to be handed to a backend.
    ///
    /// Done before the hand-off since the completion may arrive before the
    /// backend call returns.
    pub(crate) fn reserve(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    /// Take back a [`Self::reserve`] for an operation the backend rejected.
    pub(crate) fn withdraw(&self) {
        let _ = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Entry point for the backend's completion callback, once per accepted operation.
    pub fn complete(&self, event: RawEvent) -> Delivery {
        let outcome = Outcome::from(event);

        let _pending = match self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(previous) => previous - 1,
            Err(_) => {
                #[cfg(feature = "defmt")]
                defmt::warn!(
                    "Flash {} completion at {=u32:#x} without a pending operation",
                    outcome.kind.as_str(),
                    outcome.addr
                );
                0
            }
        };

        match outcome.status {
            Ok(()) => {
                #[cfg(feature = "defmt")]
                defmt::debug!(
                    "Flash {} success: addr={=u32:#x}, pending {=u32}",
                    outcome.kind.as_str(),
                    outcome.addr,
                    _pending
                );
            }
            Err(_failure) => {
                #[cfg(feature = "defmt")]
                defmt::debug!(
                    "Flash {} failed ({:?}, raw {=u32:#x}): addr={=u32:#x}, len={=u32:#x}, pending {=u32}",
                    outcome.kind.as_str(),
                    _failure,
                    event.status.0,
                    outcome.addr,
                    outcome.len,
                    _pending
                );
            }
        }

        let delivery = self.handler.on_complete(&outcome);
        if delivery == Delivery::Unclaimed {
            #[cfg(feature = "defmt")]
            defmt::debug!("Dropping unclaimed flash outcome, token {:?}", outcome.token);
        }
        delivery
    }
}

impl<H: CompletionHandler + Default> Default for Completions<H> {
    fn default() -> Self {
        Self::new(H::default())
    }
}
