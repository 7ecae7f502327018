#![no_std]
//! Application data storage in on-chip flash, for devices that may or may not run a radio stack.
//!
//! Requests go through [`manager::AppFlash`], which forwards them to one of two backends:
//! * [`blocking::Direct`], any [embedded-storage](https://github.com/rust-embedded-community/embedded-storage)
//!   `NorFlash` driver for the flash controller, used while the radio stack is not running.
//! * [`mediated::Mediated`], a queue in the radio stack that serializes flash access
//!   with the radio and reports completions from its event handler. It is attached
//!   with [`manager::AppFlash::with_mediator`] and only selected with the `mediated`
//!   feature enabled.
//!
//! Both report completion through [`completion::Completions`], so application code has
//! a single path for outcomes. [`asynchronous::AsyncAppFlash`] builds an
//! `embedded-storage-async` flash on top of it.

pub mod asynchronous;
pub mod backend;
pub mod blocking;
pub mod completion;
pub mod error;
pub mod manager;
pub mod mediated;
pub mod window;

pub use completion::{CompletionHandler, Completions, Delivery, OpKind, Outcome, Token};
pub use error::{Error, Failure};
pub use manager::{AppFlash, Selection};
pub use window::StorageWindow;

/// Program unit of the flash controller
pub const WORD_SIZE: u32 = 4;
/// Erase unit of the flash controller
pub const PAGE_SIZE: u32 = 0x1000;

pub const APP_DATA_START: u32 = 0x70000;
pub const APP_DATA_END: u32 = 0x78000;

pub(crate) fn check_write(addr: u32, data: &[u8], unit: u32) -> Result<(), Error> {
    if data.is_empty() {
        return Err(Error::InvalidLength);
    }
    if addr % unit != 0 || data.as_ptr() as usize % WORD_SIZE as usize != 0 {
        return Err(Error::InvalidAddress);
    }
    if data.len() as u32 % unit != 0 {
        return Err(Error::InvalidLength);
    }
    Ok(())
}

pub(crate) fn check_erase(page_addr: u32, num_pages: u32, page_size: u32) -> Result<u32, Error> {
    if num_pages == 0 {
        return Err(Error::InvalidLength);
    }
    if page_addr % page_size != 0 {
        return Err(Error::InvalidAddress);
    }
    let len = num_pages
        .checked_mul(page_size)
        .ok_or(Error::InvalidAddress)?;
    page_addr.checked_add(len).ok_or(Error::InvalidAddress)
}

pub(crate) fn check_read(buf: &[u8]) -> Result<(), Error> {
    if buf.is_empty() {
        return Err(Error::InvalidLength);
    }
    Ok(())
}
