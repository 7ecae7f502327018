/// Errors reported when a request is submitted
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Not initialized, initialized twice, or torn down with work in flight
    InvalidState,

    /// Address not aligned or outside of the storage window
    InvalidAddress,

    /// Zero length, or a length that is not a multiple of the program unit
    InvalidLength,

    /// The backend was handed no source data
    NullSource,

    /// The backend submission queue is full
    OutOfResources,

    /// The backend rejected the storage window
    BackendInit,

    /// The operation was accepted but completed with a failure
    Failed(Failure),
}

/// Failures reported when an accepted operation completes
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// The flash controller or the runtime reported an internal fault
    HardwareFault,

    /// The runtime could not get a timeslot for the operation
    Busy,

    /// Less data than requested was processed
    PartialCompletion,
}

impl From<Failure> for Error {
    fn from(f: Failure) -> Self {
        Error::Failed(f)
    }
}

mod es {
    use super::*;
    use embedded_storage::nor_flash::{NorFlashError, NorFlashErrorKind};

    impl From<NorFlashErrorKind> for Error {
        fn from(e: NorFlashErrorKind) -> Self {
            match e {
                NorFlashErrorKind::NotAligned | NorFlashErrorKind::OutOfBounds => {
                    Error::InvalidAddress
                }
                _ => Error::Failed(Failure::HardwareFault),
            }
        }
    }

    impl NorFlashError for Error {
        fn kind(&self) -> NorFlashErrorKind {
            match self {
                Error::InvalidAddress => NorFlashErrorKind::OutOfBounds,
                _ => NorFlashErrorKind::Other,
            }
        }
    }
}
