#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The magic prefix matched neither byte order; this is not a Nortek file.
    #[error("unrecognized format: {0}")]
    UnrecognizedFormat(String),

    /// A well-framed record failed its checksum while enforcement was enabled.
    #[error("checksum mismatch at offset {offset}: computed {computed:#06x}, read {expected:#06x}")]
    ChecksumMismatch {
        expected: u16,
        computed: u16,
        offset: u64,
    },

    /// Not enough bytes remain to finish the current read.
    #[error("truncated stream")]
    TruncatedStream,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
