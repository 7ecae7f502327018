use core::ops::Range;

use crate::{APP_DATA_END, APP_DATA_START};

/// The flash range this crate is allowed to touch, `[start, end)`
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageWindow {
    start: u32,
    end: u32,
}

impl StorageWindow {
    /// Application data window, from the end of the new firmware image to the end of application flash
    pub const APP_DATA: StorageWindow = StorageWindow {
        start: APP_DATA_START,
        end: APP_DATA_END,
    };

    /// Returns `None` if the window would be empty.
    pub const fn new(start: u32, end: u32) -> Option<Self> {
        if start >= end {
            return None;
        }
        Some(Self { start, end })
    }

    pub const fn start(&self) -> u32 {
        self.start
    }

    pub const fn end(&self) -> u32 {
        self.end
    }

    /// Size of the window in bytes
    pub const fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn range(&self) -> Range<u32> {
        self.start..self.end
    }

    /// Check that `[addr, addr + len)` lies fully inside the window.
    /// A zero length range is contained if `addr` itself is.
    pub fn contains(&self, addr: u32, len: u32) -> bool {
        let Some(last) = addr.checked_add(len) else {
            return false;
        };
        addr >= self.start && addr < self.end && last <= self.end
    }

    /// Both bounds fall on a multiple of `unit`
    pub fn is_aligned(&self, unit: u32) -> bool {
        unit != 0 && self.start % unit == 0 && self.end % unit == 0
    }
}

impl Default for StorageWindow {
    fn default() -> Self {
        Self::APP_DATA
    }
}

#[cfg(feature = "linker-window")]
mod linker {
    use super::StorageWindow;

    extern "C" {
        static _app_data_start: u32;
        static _app_data_end: u32;
    }

    impl StorageWindow {
        /// The window placed by the linker script between `_app_data_start` and `_app_data_end`
        pub fn from_linker() -> Option<Self> {
            let (start, end) = unsafe {
                (
                    core::ptr::addr_of!(_app_data_start) as u32,
                    core::ptr::addr_of!(_app_data_end) as u32,
                )
            };
            Self::new(start, end)
        }
    }
}
