

pub type Result<T> = std::result::Result<T, Error>;
pub type UnitResult = Result<()>;

pub use std::io::Error as IoError;
pub use std::io::Result as IoResult;


/// The four error kinds a vidpak reader, writer or codec call can produce.
#[derive(Debug)]
pub enum Error {
    /// Wrong magic, unknown version, truncated header, or a malformed FSE block.
    Malformed(String),

    /// The requested frame index is past the end of the stream.
    /// Distinct from `Io`, because it is an expected condition while polling
    /// an endless-mode reader, not an I/O failure.
    FrameNotPresent {
        requested: u64,
        frame_count: Option<u64>,
    },

    /// Underlying filesystem error, or an error forwarded from the I/O worker thread.
    Io(IoError),

    /// Operating on a closed handle, invalid geometry, a negative/out-of-range
    /// index, or a wrong-shaped frame buffer.
    Usage(String),
}

impl Error {
    pub fn malformed(message: impl Into<String>) -> Self {
        Error::Malformed(message.into())
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Error::Usage(message.into())
    }

    pub fn frame_not_present(requested: u64, frame_count: Option<u64>) -> Self {
        Error::FrameNotPresent { requested, frame_count }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Malformed(message) => write!(formatter, "malformed vidpak data: {}", message),
            Error::FrameNotPresent { requested, frame_count } => match frame_count {
                Some(count) => write!(formatter, "frame {} not present (stream has {} frames)", requested, count),
                None => write!(formatter, "frame {} not present (stream still open)", requested),
            },
            Error::Io(io_error) => write!(formatter, "io error: {}", io_error),
            Error::Usage(message) => write!(formatter, "usage error: {}", message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(io_error) => Some(io_error),
            _ => None,
        }
    }
}

/// Enable using the `?` operator on io::Result.
impl From<IoError> for Error {
    fn from(error: IoError) -> Self {
        Error::Io(error)
    }
}

#[inline]
pub fn usize_to_u64(value: usize) -> u64 {
    value as u64
}

#[inline]
pub fn u64_to_usize(value: u64) -> usize {
    debug_assert!(value <= usize::MAX as u64, "u64 value does not fit into usize on this platform");
    value as usize
}
