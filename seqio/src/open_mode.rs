//! Open-mode flags for devices

use bitflags::bitflags;

bitflags! {
    /// How a [`Device`](crate::Device) is opened.
    ///
    /// An empty set means "not open".
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OpenMode: u32 {
        /// The device can be read from
        const READ_ONLY = 0x0001;
        /// The device can be written to
        const WRITE_ONLY = 0x0002;
        /// Both directions
        const READ_WRITE = Self::READ_ONLY.bits() | Self::WRITE_ONLY.bits();
        /// Writes go to the end; the logical position starts at `size()`
        const APPEND = 0x0004;
        /// Existing content is discarded on open
        const TRUNCATE = 0x0008;
        /// `"\r\n"` is read back as `"\n"`
        const TEXT = 0x0010;
        /// Bypass the internal read buffer
        const UNBUFFERED = 0x0020;
        /// Fail if the target already exists
        const NEW_ONLY = 0x0040;
        /// Fail if the target does not exist
        const EXISTING_ONLY = 0x0080;
    }
}

impl OpenMode {
    /// The "closed" mode
    pub const NOT_OPEN: Self = Self::empty();

    #[must_use]
    pub fn is_readable(self) -> bool {
        self.contains(Self::READ_ONLY)
    }

    #[must_use]
    pub fn is_writable(self) -> bool {
        self.contains(Self::WRITE_ONLY)
    }

    #[must_use]
    pub fn is_text(self) -> bool {
        self.contains(Self::TEXT)
    }
}
