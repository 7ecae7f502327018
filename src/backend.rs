use crate::{
    completion::{RawStatus, Token},
    error::Error,
    window::StorageWindow,
};

/// How a backend handled an accepted write or erase
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submitted {
    /// Queued, the completion event arrives later through [`crate::completion::Completions::complete`]
    Queued,
    /// Already executed, with the raw result of the operation
    Completed(RawStatus),
}

/// The read, write and erase capability over the storage window.
///
/// `Err` from `write` or `erase` means the request was rejected and no completion
/// will follow for it.
pub trait Backend {
    /// Bind to the storage window, rejecting it with [`Error::BackendInit`] if unusable
    fn init(&mut self, window: &StorageWindow) -> Result<(), Error>;

    /// Program `data` at `addr`
    fn write(&mut self, addr: u32, data: &[u8], token: Option<Token>) -> Result<Submitted, Error>;

    /// Erase `num_pages` pages starting at `page_addr`
    fn erase(&mut self, page_addr: u32, num_pages: u32, token: Option<Token>)
        -> Result<Submitted, Error>;

    /// Copy flash contents into `buf`, always blocking
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Error>;

    /// Erase unit in bytes
    fn page_size(&self) -> u32;
}
