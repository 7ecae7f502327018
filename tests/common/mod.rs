#![allow(dead_code)]

use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use app_flash::{
    completion::{CompletionHandler, Completions, Delivery, OpKind, Outcome, RawEvent, RawStatus},
    mediated::{Mediator, MediatorError},
    Token, PAGE_SIZE,
};
use embedded_storage::nor_flash::{
    check_erase, check_read, check_write, ErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash,
};

/// 512kB of flash mapped from address 0, like the nRF52832
pub const FLASH_SIZE: usize = 0x80000;

#[repr(C, align(4))]
pub struct Aligned<const N: usize>(pub [u8; N]);

/// Flash in RAM with NOR semantics, programming can only clear bits
pub struct RamFlash {
    pub mem: Vec<u8>,
    /// Fail the next program or erase with a controller fault
    pub fail_next: bool,
}

impl RamFlash {
    pub fn new() -> Self {
        Self {
            mem: vec![0xFF; FLASH_SIZE],
            fail_next: false,
        }
    }
}

impl ErrorType for RamFlash {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for RamFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        check_read(self, offset, bytes.len())?;
        let start = offset as usize;
        bytes.copy_from_slice(&self.mem[start..start + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.mem.len()
    }
}

impl NorFlash for RamFlash {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = PAGE_SIZE as usize;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        check_erase(self, from, to)?;
        if core::mem::take(&mut self.fail_next) {
            return Err(NorFlashErrorKind::Other);
        }
        self.mem[from as usize..to as usize].fill(0xFF);
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        check_write(self, offset, bytes.len())?;
        if core::mem::take(&mut self.fail_next) {
            return Err(NorFlashErrorKind::Other);
        }
        let start = offset as usize;
        for (cell, b) in self.mem[start..start + bytes.len()].iter_mut().zip(bytes) {
            *cell &= *b;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Write {
        addr: u32,
        data: Vec<u8>,
        token: Option<Token>,
    },
    Erase {
        addr: u32,
        pages: u32,
        token: Option<Token>,
    },
}

impl Request {
    pub fn event(&self, status: RawStatus) -> RawEvent {
        match self {
            Request::Write { addr, data, token } => RawEvent {
                kind: OpKind::Write,
                addr: *addr,
                len: data.len() as u32,
                status,
                token: *token,
            },
            Request::Erase { addr, pages, token } => RawEvent {
                kind: OpKind::Erase,
                addr: *addr,
                len: *pages,
                status,
                token: *token,
            },
        }
    }
}

pub struct StackState {
    pub queue: VecDeque<Request>,
    pub mem: Vec<u8>,
    pub capacity: usize,
}

/// Radio stack stand-in that queues requests until the test runs them
#[derive(Clone)]
pub struct QueueMediator {
    pub state: Rc<RefCell<StackState>>,
}

impl QueueMediator {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Rc::new(RefCell::new(StackState {
                queue: VecDeque::new(),
                mem: vec![0xFF; FLASH_SIZE],
                capacity,
            })),
        }
    }

    pub fn queued(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Execute the oldest request, returning its completion event
    pub fn run_oldest(&self) -> Option<RawEvent> {
        let req = self.state.borrow_mut().queue.pop_front()?;
        Some(self.apply(req))
    }

    /// Execute the newest request, returning its completion event
    pub fn run_newest(&self) -> Option<RawEvent> {
        let req = self.state.borrow_mut().queue.pop_back()?;
        Some(self.apply(req))
    }

    fn apply(&self, req: Request) -> RawEvent {
        let mut state = self.state.borrow_mut();
        match &req {
            Request::Write { addr, data, .. } => {
                let start = *addr as usize;
                for (cell, b) in state.mem[start..start + data.len()].iter_mut().zip(data) {
                    *cell &= *b;
                }
            }
            Request::Erase { addr, pages, .. } => {
                let start = *addr as usize;
                let end = start + (*pages * PAGE_SIZE) as usize;
                state.mem[start..end].fill(0xFF);
            }
        }
        req.event(RawStatus::SUCCESS)
    }
}

impl Mediator for QueueMediator {
    fn write(&mut self, addr: u32, data: &[u8], token: Option<Token>) -> Result<(), MediatorError> {
        let mut state = self.state.borrow_mut();
        if state.queue.len() >= state.capacity {
            return Err(MediatorError::QueueFull);
        }
        state.queue.push_back(Request::Write {
            addr,
            data: data.to_vec(),
            token,
        });
        Ok(())
    }

    fn erase(
        &mut self,
        page_addr: u32,
        num_pages: u32,
        token: Option<Token>,
    ) -> Result<(), MediatorError> {
        let mut state = self.state.borrow_mut();
        if state.queue.len() >= state.capacity {
            return Err(MediatorError::QueueFull);
        }
        state.queue.push_back(Request::Erase {
            addr: page_addr,
            pages: num_pages,
            token,
        });
        Ok(())
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), MediatorError> {
        let state = self.state.borrow();
        let start = addr as usize;
        buf.copy_from_slice(&state.mem[start..start + buf.len()]);
        Ok(())
    }
}

/// Radio stack stand-in that executes every request right away and reports it
/// from inside the call, like an event firing before the submit returns.
pub struct EagerMediator<'c, H> {
    pub inner: QueueMediator,
    pub completions: &'c Completions<H>,
    pub status: RawStatus,
}

impl<'c, H: CompletionHandler> EagerMediator<'c, H> {
    pub fn new(completions: &'c Completions<H>) -> Self {
        Self {
            inner: QueueMediator::new(8),
            completions,
            status: RawStatus::SUCCESS,
        }
    }

    fn flush(&mut self) {
        while let Some(mut event) = self.inner.run_oldest() {
            event.status = self.status;
            self.completions.complete(event);
        }
    }
}

impl<'c, H: CompletionHandler> Mediator for EagerMediator<'c, H> {
    fn write(&mut self, addr: u32, data: &[u8], token: Option<Token>) -> Result<(), MediatorError> {
        self.inner.write(addr, data, token)?;
        self.flush();
        Ok(())
    }

    fn erase(
        &mut self,
        page_addr: u32,
        num_pages: u32,
        token: Option<Token>,
    ) -> Result<(), MediatorError> {
        self.inner.erase(page_addr, num_pages, token)?;
        self.flush();
        Ok(())
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), MediatorError> {
        self.inner.read(addr, buf)
    }
}

/// Handler recording every outcome, claiming only the tokens it was told about
#[derive(Default)]
pub struct Recorder {
    pub seen: RefCell<Vec<Outcome>>,
    pub claimed: RefCell<Vec<Token>>,
}

impl Recorder {
    pub fn claim(&self, token: Token) {
        self.claimed.borrow_mut().push(token);
    }

    pub fn outcomes(&self) -> Vec<Outcome> {
        self.seen.borrow().clone()
    }
}

impl CompletionHandler for Recorder {
    fn on_complete(&self, outcome: &Outcome) -> Delivery {
        self.seen.borrow_mut().push(*outcome);
        match outcome.token {
            Some(t) if self.claimed.borrow().contains(&t) => Delivery::Consumed,
            _ => Delivery::Unclaimed,
        }
    }
}
