//! Closed enumeration of protocol message types (component C4).
//!
//! Mirrors `original_source/server/src/pkg.h`'s `enum PkgType` and the
//! `Pkg*(pkg)` predicate macros from both sides' `pkg.defs.h`.

/// One of the nine operation codes carried in a frame's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Ack = 0x00,
    Nack = 0x01,
    Ls = 0x0A,
    Download = 0x0B,
    Show = 0x10,
    Descriptor = 0x11,
    Data = 0x12,
    End = 0x1E,
    Error = 0x1F,
}

impl MessageType {
    /// Recovers a `MessageType` from the raw 5-bit wire code, if it names
    /// one of the nine known operations.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x00 => Self::Ack,
            0x01 => Self::Nack,
            0x0A => Self::Ls,
            0x0B => Self::Download,
            0x10 => Self::Show,
            0x11 => Self::Descriptor,
            0x12 => Self::Data,
            0x1E => Self::End,
            0x1F => Self::Error,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_ack(self) -> bool {
        matches!(self, Self::Ack)
    }

    pub fn is_nack(self) -> bool {
        matches!(self, Self::Nack)
    }

    pub fn is_data(self) -> bool {
        matches!(self, Self::Data)
    }

    pub fn is_show(self) -> bool {
        matches!(self, Self::Show)
    }

    pub fn is_descriptor(self) -> bool {
        matches!(self, Self::Descriptor)
    }

    pub fn is_end(self) -> bool {
        matches!(self, Self::End)
    }

    pub fn is_error(self) -> bool {
        matches!(self, Self::Error)
    }

    pub fn is_download(self) -> bool {
        matches!(self, Self::Download)
    }

    pub fn is_ls(self) -> bool {
        matches!(self, Self::Ls)
    }

    /// A request-like message: one the responder's accept loop treats as
    /// a session-opener. Everything else is noise to the dispatcher.
    pub fn is_session_opener(self) -> bool {
        self.is_ls() || self.is_download()
    }
}
