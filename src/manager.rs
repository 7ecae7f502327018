use crate::{
    backend::{Backend, Submitted},
    blocking::Direct,
    completion::{CompletionHandler, Completions, OpKind, RawEvent, Token},
    error::Error,
    mediated::{Mediated, Mediator, NoMediator},
    window::StorageWindow,
};
use embedded_storage::nor_flash::NorFlash;

/// The backend chosen at initialization
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Direct,
    Mediated,
}

/// Flash operation manager for the application data window.
///
/// Holds the direct backend, and the radio stack backend once one is attached
/// with [`Self::with_mediator`], and forwards every request to the one selected by
/// [`Self::init`]. The only state shared with the completion path is the
/// [`Completions`] it was built with, which the radio stack's event handler
/// references as well.
pub struct AppFlash<'c, F, M, H> {
    window: StorageWindow,
    completions: &'c Completions<H>,
    direct: Direct<F>,
    mediated: Option<Mediated<M>>,
    selection: Option<Selection>,
}

impl<'c, F, H> AppFlash<'c, F, NoMediator, H>
where
    F: NorFlash,
    H: CompletionHandler,
{
    /// Create an uninitialized manager driving `flash` directly, see [`Self::init`]
    pub fn new(window: StorageWindow, completions: &'c Completions<H>, flash: F) -> Self {
        Self {
            window,
            completions,
            direct: Direct::new(flash),
            mediated: None,
            selection: None,
        }
    }

    /// Attach the radio stack flash interface.
    ///
    /// It is only selected by [`Self::init`] when the `mediated` feature is enabled.
    pub fn with_mediator<M: Mediator>(self, mediator: M) -> AppFlash<'c, F, M, H> {
        AppFlash {
            window: self.window,
            completions: self.completions,
            direct: self.direct,
            mediated: Some(Mediated::new(mediator)),
            selection: self.selection,
        }
    }
}

impl<'c, F, M, H> AppFlash<'c, F, M, H>
where
    F: NorFlash,
    M: Mediator,
    H: CompletionHandler,
{
    /// Select and bind the backend.
    ///
    /// The radio stack backend is used when `mediation_active` is set, meaning its
    /// interrupts are running, a mediator is attached and the `mediated` feature is
    /// enabled. Otherwise the flash controller is driven directly.
    pub fn init(&mut self, mediation_active: bool) -> Result<(), Error> {
        if self.selection.is_some() {
            #[cfg(feature = "defmt")]
            defmt::warn!("Flash already initialized");
            return Err(Error::InvalidState);
        }

        let selection = self.choose(mediation_active);
        #[cfg(feature = "defmt")]
        defmt::debug!("Initializing {} flash backend", selection);

        let window = self.window;
        self.backend_for(selection)?.init(&window)?;
        self.selection = Some(selection);
        Ok(())
    }

    /// Undo [`Self::init`]. Refused while operations are still pending.
    pub fn deinit(&mut self) -> Result<(), Error> {
        if self.selection.is_none() || self.pending() > 0 {
            return Err(Error::InvalidState);
        }
        self.selection = None;
        Ok(())
    }

    /// Write `data` to flash at `dest`.
    ///
    /// With the radio stack backend this only queues the write, `data` may be
    /// reused right away but flash is not written until the completion arrives.
    /// With the direct backend the write and its completion are done on return.
    pub fn store(&mut self, dest: u32, data: &[u8], token: Option<Token>) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        defmt::debug!(
            "store(addr={=u32:#x}, len={=usize} bytes), queue usage: {=u32}",
            dest,
            data.len(),
            self.pending()
        );

        let len = u32::try_from(data.len()).map_err(|_| Error::InvalidLength)?;
        let res = self.submit(OpKind::Write, dest, len, token, |backend| {
            backend.write(dest, data, token)
        });
        if let Err(_e) = res {
            #[cfg(feature = "defmt")]
            defmt::warn!("store() failed with {:?}", _e);
        }
        res
    }

    /// Erase `num_pages` flash pages from `page_addr`
    pub fn erase(
        &mut self,
        page_addr: u32,
        num_pages: u32,
        token: Option<Token>,
    ) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        defmt::debug!(
            "erase(addr={=u32:#x}, len={=u32} pages), queue usage: {=u32}",
            page_addr,
            num_pages,
            self.pending()
        );

        let res = self.submit(OpKind::Erase, page_addr, num_pages, token, |backend| {
            backend.erase(page_addr, num_pages, token)
        });
        if let Err(_e) = res {
            #[cfg(feature = "defmt")]
            defmt::warn!("erase() failed with {:?}", _e);
        }
        res
    }

    /// Read flash at `src` into `buf`. Always blocking and never reported as a completion.
    pub fn read(&mut self, src: u32, buf: &mut [u8]) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        defmt::debug!(
            "read(addr={=u32:#x}, len={=usize} bytes), queue usage: {=u32}",
            src,
            buf.len(),
            self.pending()
        );

        let len = u32::try_from(buf.len()).map_err(|_| Error::InvalidLength)?;
        let window = self.window;
        let backend = self.backend()?;
        if !window.contains(src, len) {
            return Err(Error::InvalidAddress);
        }
        backend.read(src, buf)
    }

    /// Operations accepted but not completed yet
    pub fn pending(&self) -> u32 {
        self.completions.pending()
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn window(&self) -> &StorageWindow {
        &self.window
    }

    pub fn completions(&self) -> &'c Completions<H> {
        self.completions
    }

    /// The attached radio stack interface
    pub fn mediator(&self) -> Option<&M> {
        self.mediated.as_ref().map(Mediated::mediator)
    }

    /// Erase unit of the selected backend
    pub fn page_size(&mut self) -> Result<u32, Error> {
        Ok(self.backend()?.page_size())
    }

    fn backend(&mut self) -> Result<&mut dyn Backend, Error> {
        let selection = self.selection.ok_or(Error::InvalidState)?;
        self.backend_for(selection)
    }

    fn choose(&self, mediation_active: bool) -> Selection {
        if mediation_active && cfg!(feature = "mediated") && self.mediated.is_some() {
            Selection::Mediated
        } else {
            Selection::Direct
        }
    }

    fn backend_for(&mut self, selection: Selection) -> Result<&mut dyn Backend, Error> {
        match selection {
            Selection::Direct => Ok(&mut self.direct as &mut dyn Backend),
            Selection::Mediated => match &mut self.mediated {
                Some(mediated) => Ok(mediated as &mut dyn Backend),
                None => Err(Error::InvalidState),
            },
        }
    }

    fn submit(
        &mut self,
        kind: OpKind,
        addr: u32,
        len: u32,
        token: Option<Token>,
        op: impl FnOnce(&mut dyn Backend) -> Result<Submitted, Error>,
    ) -> Result<(), Error> {
        let completions = self.completions;
        let window = self.window;
        let backend = self.backend()?;

        let span = match kind {
            OpKind::Write => len,
            OpKind::Erase => len
                .checked_mul(backend.page_size())
                .ok_or(Error::InvalidAddress)?,
        };
        if !window.contains(addr, span) {
            return Err(Error::InvalidAddress);
        }

        completions.reserve();
        let submitted = match op(backend) {
            Ok(submitted) => submitted,
            Err(e) => {
                completions.withdraw();
                return Err(e);
            }
        };

        if let Submitted::Completed(status) = submitted {
            completions.complete(RawEvent {
                kind,
                addr,
                len,
                status,
                token,
            });
        }
        Ok(())
    }
}
