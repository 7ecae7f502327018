use crate::{
    backend::{Backend, Submitted},
    check_erase, check_read, check_write,
    completion::{RawStatus, Token},
    error::{Error, Failure},
    window::StorageWindow,
    WORD_SIZE,
};
use embedded_storage::nor_flash::{NorFlash, NorFlashError, NorFlashErrorKind};

/// Backend driving the flash controller directly. Every operation blocks until the controller is done.
///
/// Addresses are passed unchanged to the driver, which is expected to map its
/// offsets 1:1 onto the memory mapped flash, as the nRF NVMC driver does.
pub struct Direct<F> {
    flash: F,
}

impl<F: NorFlash> Direct<F> {
    pub fn new(flash: F) -> Self {
        Self { flash }
    }

    /// Give back the underlying driver
    pub fn release(self) -> F {
        self.flash
    }

    pub fn flash(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Program unit, at least a word
    const fn write_unit() -> u32 {
        let size = F::WRITE_SIZE as u32;
        if size > WORD_SIZE {
            size
        } else {
            WORD_SIZE
        }
    }

    fn status<E: NorFlashError>(res: Result<(), E>) -> Result<Submitted, Error> {
        match res {
            Ok(()) => Ok(Submitted::Completed(RawStatus::SUCCESS)),
            Err(e) => match e.kind() {
                NorFlashErrorKind::NotAligned | NorFlashErrorKind::OutOfBounds => {
                    Err(Error::InvalidAddress)
                }
                _ => Ok(Submitted::Completed(RawStatus::INTERNAL)),
            },
        }
    }
}

impl<F: NorFlash> Backend for Direct<F> {
    fn init(&mut self, window: &StorageWindow) -> Result<(), Error> {
        let page = F::ERASE_SIZE as u32;
        if !window.is_aligned(page) || window.end() as usize > self.flash.capacity() {
            return Err(Error::BackendInit);
        }
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8], _token: Option<Token>) -> Result<Submitted, Error> {
        check_write(addr, data, Self::write_unit())?;
        Self::status(self.flash.write(addr, data))
    }

    fn erase(
        &mut self,
        page_addr: u32,
        num_pages: u32,
        _token: Option<Token>,
    ) -> Result<Submitted, Error> {
        let to = check_erase(page_addr, num_pages, self.page_size())?;
        Self::status(self.flash.erase(page_addr, to))
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Error> {
        check_read(buf)?;
        self.flash.read(addr, buf).map_err(|e| match e.kind() {
            NorFlashErrorKind::NotAligned | NorFlashErrorKind::OutOfBounds => Error::InvalidAddress,
            _ => Error::Failed(Failure::HardwareFault),
        })
    }

    fn page_size(&self) -> u32 {
        F::ERASE_SIZE as u32
    }
}
