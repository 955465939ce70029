//! Error taxonomy shared by the pumps, the remuxer and the engine traits.
//!
//! Engines report status through [`Error`]: `Again` and `Eof` are control-flow
//! signals that the pumps consume internally, every other variant is a genuine
//! failure that propagates to the caller.

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd"
))]
const EAGAIN: i32 = 35;
#[cfg(not(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd"
)))]
const EAGAIN: i32 = 11;
const EIO: i32 = 5;
const ENOMEM: i32 = 12;
const EINVAL: i32 = 22;

const fn fferrtag(a: u8, b: u8, c: u8, d: u8) -> i32 {
    -((a as i32) | ((b as i32) << 8) | ((c as i32) << 16) | ((d as i32) << 24))
}

/// `AVERROR_EOF`
pub const AVERROR_EOF: i32 = fferrtag(b'E', b'O', b'F', b' ');
/// `AVERROR_EXIT`
pub const AVERROR_EXIT: i32 = fferrtag(b'E', b'X', b'I', b'T');
/// `AVERROR_INVALIDDATA`
pub const AVERROR_INVALIDDATA: i32 = fferrtag(b'I', b'N', b'D', b'A');
/// `AVERROR_PATCHWELCOME`
pub const AVERROR_PATCHWELCOME: i32 = fferrtag(b'P', b'A', b'W', b'E');
/// `AVERROR(EAGAIN)`
pub const AVERROR_EAGAIN: i32 = -EAGAIN;
/// `AVERROR(EINVAL)`
pub const AVERROR_EINVAL: i32 = -EINVAL;
/// `AVERROR(ENOMEM)`
pub const AVERROR_ENOMEM: i32 = -ENOMEM;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Output is not available in the current state, or input is not accepted
    /// until pending output has been read.
    #[error("resource temporarily unavailable")]
    Again,
    /// The engine has been fully drained after a flush.
    #[error("end of stream")]
    Eof,
    /// Engine not opened, wrong direction, flush sent twice and similar misuse.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Allocation failure or a full internal queue.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    /// Malformed bitstream or unsupported feature.
    #[error("codec error: {0}")]
    Codec(String),
    /// A blocking operation was aborted through the interrupt callback.
    #[error("immediate exit requested")]
    Exit,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Any native error code without a dedicated variant.
    #[error("ffmpeg error code {code}")]
    Other { code: i32 },
}

/// Coarse classification of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    WouldBlock,
    EndOfStream,
    InvalidArgument,
    ResourceExhausted,
    Codec,
    Interrupted,
    Io,
}

impl Error {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::ResourceExhausted(message.into())
    }

    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Again => ErrorKind::WouldBlock,
            Self::Eof => ErrorKind::EndOfStream,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            Self::Codec(_) | Self::Other { .. } => ErrorKind::Codec,
            Self::Exit => ErrorKind::Interrupted,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    pub fn is_again(&self) -> bool {
        matches!(self, Self::Again)
    }

    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }

    /// `Again` and `Eof` steer the send/receive loop and are never failures.
    pub fn is_control_flow(&self) -> bool {
        self.is_again() || self.is_eof()
    }

    /// Maps a negative native error code onto the taxonomy.
    pub fn from_code(code: i32) -> Self {
        match code {
            AVERROR_EAGAIN => Self::Again,
            AVERROR_EOF => Self::Eof,
            AVERROR_EXIT => Self::Exit,
            AVERROR_EINVAL => Self::invalid_argument("invalid argument"),
            AVERROR_ENOMEM => Self::resource_exhausted("cannot allocate memory"),
            AVERROR_INVALIDDATA => Self::codec("invalid data found when processing input"),
            AVERROR_PATCHWELCOME => Self::codec("not yet implemented in ffmpeg"),
            c if c == -EIO => Self::Io(std::io::Error::from(std::io::ErrorKind::Other)),
            code => Self::Other { code },
        }
    }

    /// Native error code for this error, the inverse of [`Error::from_code`]
    /// for the variants that have one.
    pub fn code(&self) -> i32 {
        match self {
            Self::Again => AVERROR_EAGAIN,
            Self::Eof => AVERROR_EOF,
            Self::Exit => AVERROR_EXIT,
            Self::InvalidArgument(_) => AVERROR_EINVAL,
            Self::ResourceExhausted(_) => AVERROR_ENOMEM,
            Self::Codec(_) => AVERROR_INVALIDDATA,
            Self::Io(_) => -EIO,
            Self::Other { code } => *code,
        }
    }
}

/// Converts a native return value (`< 0` is an error) into a `Result`.
pub fn check(code: i32) -> Result<i32> {
    if code < 0 {
        Err(Error::from_code(code))
    } else {
        Ok(code)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_values_match_native() {
        assert_eq!(AVERROR_EOF, -541478725);
        assert_eq!(AVERROR_EXIT, -1414092869);
        assert_eq!(AVERROR_INVALIDDATA, -1094995529);
    }

    #[test]
    fn from_code_classifies() {
        assert_eq!(Error::from_code(AVERROR_EAGAIN).kind(), ErrorKind::WouldBlock);
        assert_eq!(Error::from_code(AVERROR_EOF).kind(), ErrorKind::EndOfStream);
        assert_eq!(Error::from_code(AVERROR_EXIT).kind(), ErrorKind::Interrupted);
        assert_eq!(
            Error::from_code(AVERROR_EINVAL).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            Error::from_code(AVERROR_ENOMEM).kind(),
            ErrorKind::ResourceExhausted
        );
        assert_eq!(Error::from_code(AVERROR_INVALIDDATA).kind(), ErrorKind::Codec);
        assert!(matches!(Error::from_code(-9999), Error::Other { code: -9999 }));
    }

    #[test]
    fn code_round_trips_for_dedicated_variants() {
        for code in [
            AVERROR_EAGAIN,
            AVERROR_EOF,
            AVERROR_EXIT,
            AVERROR_EINVAL,
            AVERROR_ENOMEM,
            AVERROR_INVALIDDATA,
            -4242,
        ] {
            assert_eq!(Error::from_code(code).code(), code);
        }
    }

    #[test]
    fn control_flow() {
        assert!(Error::Again.is_control_flow());
        assert!(Error::Eof.is_control_flow());
        assert!(!Error::codec("bad").is_control_flow());
        assert!(!Error::Exit.is_control_flow());
    }

    #[test]
    fn check_passes_non_negative() {
        assert_eq!(check(3).unwrap(), 3);
        assert!(check(AVERROR_EOF).unwrap_err().is_eof());
    }

    #[test]
    fn display() {
        assert_eq!(Error::codec("bad nal").to_string(), "codec error: bad nal");
        assert_eq!(Error::Eof.to_string(), "end of stream");
    }
}
