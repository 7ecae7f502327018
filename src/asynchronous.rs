use core::sync::atomic::{AtomicU8, Ordering};

use crate::{
    completion::{CompletionHandler, Delivery, Outcome, Token},
    error::{Error, Failure},
    manager::AppFlash,
    mediated::Mediator,
    PAGE_SIZE, WORD_SIZE,
};
use embassy_futures::yield_now;
use embedded_storage::nor_flash::{
    NorFlash as BlockingNorFlash, NorFlashError, NorFlashErrorKind,
};
use embedded_storage_async::nor_flash::{ErrorType, NorFlash, ReadNorFlash};

const FREE: u8 = 0;
const WAITING: u8 = 1;
const DONE_OK: u8 = 2;
const DONE_HARDWARE_FAULT: u8 = 3;
const DONE_BUSY: u8 = 4;
const DONE_PARTIAL: u8 = 5;
/// The waiter went away before its completion arrived
const ABANDONED: u8 = 6;

fn encode(status: Result<(), Failure>) -> u8 {
    match status {
        Ok(()) => DONE_OK,
        Err(Failure::HardwareFault) => DONE_HARDWARE_FAULT,
        Err(Failure::Busy) => DONE_BUSY,
        Err(Failure::PartialCompletion) => DONE_PARTIAL,
    }
}

fn decode(state: u8) -> Option<Result<(), Failure>> {
    match state {
        DONE_OK => Some(Ok(())),
        DONE_HARDWARE_FAULT => Some(Err(Failure::HardwareFault)),
        DONE_BUSY => Some(Err(Failure::Busy)),
        DONE_PARTIAL => Some(Err(Failure::PartialCompletion)),
        _ => None,
    }
}

/// `N` completion slots, indexed by [`Token`].
///
/// A slot is claimed before submitting, filled by the completion and freed by
/// [`Self::take`]. Completions for tokens that are not waiting are left unclaimed.
/// A slot given up with [`Self::abandon`] is freed by its completion instead.
pub struct Slots<const N: usize> {
    states: [AtomicU8; N],
}

impl<const N: usize> Slots<N> {
    pub const fn new() -> Self {
        Self {
            states: [const { AtomicU8::new(FREE) }; N],
        }
    }

    /// Reserve a free slot, its token is the one to submit with
    pub fn claim(&self) -> Option<Token> {
        self.states
            .iter()
            .position(|s| {
                s.compare_exchange(FREE, WAITING, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            })
            .map(Token)
    }

    /// Give back a slot whose request was rejected
    pub fn release(&self, token: Token) {
        if let Some(state) = self.states.get(token.0) {
            let _ = state.compare_exchange(WAITING, FREE, Ordering::AcqRel, Ordering::Acquire);
        }
    }

    /// Stop waiting on an accepted request.
    ///
    /// Frees the slot now if the completion already arrived, otherwise once it does.
    pub fn abandon(&self, token: Token) {
        let Some(state) = self.states.get(token.0) else {
            return;
        };
        if state
            .compare_exchange(WAITING, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            state.store(FREE, Ordering::Release);
        }
    }

    /// The result for `token` if it completed, freeing the slot
    pub fn take(&self, token: Token) -> Option<Result<(), Failure>> {
        let state = self.states.get(token.0)?;
        let status = decode(state.load(Ordering::Acquire))?;
        state.store(FREE, Ordering::Release);
        Some(status)
    }
}

impl<const N: usize> Default for Slots<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> CompletionHandler for Slots<N> {
    fn on_complete(&self, outcome: &Outcome) -> Delivery {
        let Some(state) = outcome.token.and_then(|t| self.states.get(t.0)) else {
            return Delivery::Unclaimed;
        };
        match state.compare_exchange(
            WAITING,
            encode(outcome.status),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Delivery::Consumed,
            Err(_) => {
                let _ =
                    state.compare_exchange(ABANDONED, FREE, Ordering::AcqRel, Ordering::Acquire);
                Delivery::Unclaimed
            }
        }
    }
}

/// Abandons its slot when dropped before the completion was taken
struct Waiter<'s, const N: usize> {
    slots: &'s Slots<N>,
    token: Token,
    done: bool,
}

impl<const N: usize> Waiter<'_, N> {
    async fn wait(mut self) -> Result<(), Failure> {
        loop {
            if let Some(status) = self.slots.take(self.token) {
                self.done = true;
                return status;
            }
            yield_now().await;
        }
    }
}

impl<const N: usize> Drop for Waiter<'_, N> {
    fn drop(&mut self) {
        if !self.done {
            self.slots.abandon(self.token);
        }
    }
}

/// Errors of [`AsyncAppFlash`]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Offset, length or buffer not aligned to the program or erase unit
    NotAligned,

    /// Range outside of the storage window
    OutOfBounds,

    /// Rejected by the manager or failed on completion
    Flash(Error),
}

impl From<Error> for StorageError {
    fn from(e: Error) -> Self {
        StorageError::Flash(e)
    }
}

impl NorFlashError for StorageError {
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            StorageError::NotAligned => NorFlashErrorKind::NotAligned,
            StorageError::OutOfBounds => NorFlashErrorKind::OutOfBounds,
            StorageError::Flash(e) => e.kind(),
        }
    }
}

/// The storage window as an `embedded-storage-async` flash.
///
/// Offsets are relative to the start of the window. Each write or erase is
/// submitted with a claimed slot and awaited until its completion arrives, so
/// this works the same on both backends.
pub struct AsyncAppFlash<'a, 'c, F, M, const N: usize> {
    flash: &'a mut AppFlash<'c, F, M, Slots<N>>,
}

impl<'a, 'c, F, M, const N: usize> AsyncAppFlash<'a, 'c, F, M, N>
where
    F: BlockingNorFlash,
    M: Mediator,
{
    /// Wrap an initialized manager
    pub fn new(flash: &'a mut AppFlash<'c, F, M, Slots<N>>) -> Self {
        Self { flash }
    }

    fn absolute(&self, offset: u32, len: usize) -> Result<u32, StorageError> {
        let window = self.flash.window();
        let len = u32::try_from(len).map_err(|_| StorageError::OutOfBounds)?;
        match offset.checked_add(len) {
            Some(end) if end <= window.len() => Ok(window.start() + offset),
            _ => Err(StorageError::OutOfBounds),
        }
    }

    async fn submit(
        &mut self,
        op: impl FnOnce(&mut AppFlash<'c, F, M, Slots<N>>, Token) -> Result<(), Error>,
    ) -> Result<(), StorageError> {
        let slots = self.flash.completions().handler();
        let token = slots.claim().ok_or(Error::OutOfResources)?;
        if let Err(e) = op(&mut *self.flash, token) {
            slots.release(token);
            return Err(e.into());
        }

        let waiter = Waiter {
            slots,
            token,
            done: false,
        };
        waiter.wait().await.map_err(|f| Error::Failed(f).into())
    }
}

impl<'a, 'c, F, M, const N: usize> ErrorType for AsyncAppFlash<'a, 'c, F, M, N> {
    type Error = StorageError;
}

impl<'a, 'c, F, M, const N: usize> ReadNorFlash for AsyncAppFlash<'a, 'c, F, M, N>
where
    F: BlockingNorFlash,
    M: Mediator,
{
    const READ_SIZE: usize = 1;

    async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let addr = self.absolute(offset, bytes.len())?;
        if bytes.is_empty() {
            return Ok(());
        }
        Ok(self.flash.read(addr, bytes)?)
    }

    fn capacity(&self) -> usize {
        self.flash.window().len() as usize
    }
}

impl<'a, 'c, F, M, const N: usize> NorFlash for AsyncAppFlash<'a, 'c, F, M, N>
where
    F: BlockingNorFlash,
    M: Mediator,
{
    const WRITE_SIZE: usize = WORD_SIZE as usize;

    /// Nominal erase unit, erases are split by the page size of the selected backend
    const ERASE_SIZE: usize = PAGE_SIZE as usize;

    async fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if from > to {
            return Err(StorageError::OutOfBounds);
        }
        let page_addr = self.absolute(from, (to - from) as usize)?;
        let page = self.flash.page_size()?;
        if from % page != 0 || to % page != 0 {
            return Err(StorageError::NotAligned);
        }
        if from == to {
            return Ok(());
        }
        let num_pages = (to - from) / page;
        self.submit(|flash, token| flash.erase(page_addr, num_pages, Some(token)))
            .await
    }

    async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let addr = self.absolute(offset, bytes.len())?;
        let unit = WORD_SIZE as usize;
        if offset as usize % unit != 0
            || bytes.len() % unit != 0
            || bytes.as_ptr() as usize % unit != 0
        {
            return Err(StorageError::NotAligned);
        }
        if bytes.is_empty() {
            return Ok(());
        }
        self.submit(|flash, token| flash.store(addr, bytes, Some(token)))
            .await
    }
}
