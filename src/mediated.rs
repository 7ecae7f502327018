//! Flash access through a co-resident radio stack.
//!
//! While the radio stack owns the flash controller, writes and erases are queued in
//! it and executed in timeslots between radio events. The stack reports each one
//! from its flash event handler, which must call
//! [`Completions::complete`](crate::completion::Completions::complete) with the event.

use crate::{
    backend::{Backend, Submitted},
    check_erase, check_read, check_write,
    completion::Token,
    error::Error,
    window::StorageWindow,
    WORD_SIZE,
};

/// Errors returned by the radio stack when it refuses a request
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediatorError {
    /// The operation queue is full
    QueueFull,
    /// The stack cannot take requests right now
    Busy,
    InvalidAddress,
    InvalidLength,
    /// No source data
    Null,
}

impl From<MediatorError> for Error {
    fn from(e: MediatorError) -> Self {
        match e {
            MediatorError::QueueFull | MediatorError::Busy => Error::OutOfResources,
            MediatorError::InvalidAddress => Error::InvalidAddress,
            MediatorError::InvalidLength => Error::InvalidLength,
            MediatorError::Null => Error::NullSource,
        }
    }
}

/// Flash interface of the radio stack.
///
/// `write` must take its own copy of `data` before returning, the caller's buffer
/// is not kept alive until the operation completes.
pub trait Mediator {
    /// Erase unit in bytes
    const PAGE_SIZE: u32 = crate::PAGE_SIZE;

    /// Queue a write of `data` at `addr`
    fn write(&mut self, addr: u32, data: &[u8], token: Option<Token>) -> Result<(), MediatorError>;

    /// Queue an erase of `num_pages` starting at `page_addr`
    fn erase(
        &mut self,
        page_addr: u32,
        num_pages: u32,
        token: Option<Token>,
    ) -> Result<(), MediatorError>;

    /// Read flash, the stack does not arbitrate reads
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), MediatorError>;
}

/// Stand-in for a manager built without a radio stack, it can never be selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoMediator {}

impl Mediator for NoMediator {
    fn write(
        &mut self,
        _addr: u32,
        _data: &[u8],
        _token: Option<Token>,
    ) -> Result<(), MediatorError> {
        match *self {}
    }

    fn erase(
        &mut self,
        _page_addr: u32,
        _num_pages: u32,
        _token: Option<Token>,
    ) -> Result<(), MediatorError> {
        match *self {}
    }

    fn read(&mut self, _addr: u32, _buf: &mut [u8]) -> Result<(), MediatorError> {
        match *self {}
    }
}

/// Backend queueing every write and erase in the radio stack
pub struct Mediated<M> {
    mediator: M,
}

impl<M: Mediator> Mediated<M> {
    pub fn new(mediator: M) -> Self {
        Self { mediator }
    }

    pub fn mediator(&self) -> &M {
        &self.mediator
    }

    pub fn release(self) -> M {
        self.mediator
    }
}

impl<M: Mediator> Backend for Mediated<M> {
    fn init(&mut self, window: &StorageWindow) -> Result<(), Error> {
        if !window.is_aligned(M::PAGE_SIZE) {
            return Err(Error::BackendInit);
        }
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8], token: Option<Token>) -> Result<Submitted, Error> {
        check_write(addr, data, WORD_SIZE)?;
        self.mediator.write(addr, data, token)?;
        Ok(Submitted::Queued)
    }

    fn erase(
        &mut self,
        page_addr: u32,
        num_pages: u32,
        token: Option<Token>,
    ) -> Result<Submitted, Error> {
        check_erase(page_addr, num_pages, M::PAGE_SIZE)?;
        self.mediator.erase(page_addr, num_pages, token)?;
        Ok(Submitted::Queued)
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Error> {
        check_read(buf)?;
        self.mediator.read(addr, buf)?;
        Ok(())
    }

    fn page_size(&self) -> u32 {
        M::PAGE_SIZE
    }
}
