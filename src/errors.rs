use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    // Construction errors
    #[error("A bar must have a positive total, got {0}")]
    InvalidTotal(u64),

    // Mutation errors
    #[error("This bar has been ended and is now immutable")]
    Immutable,

    #[error("Percentage [{0}] must be in the range [0, 100]")]
    PercentageOutOfRange(f64),

    #[error("Slot index [{index}] is being updated with more than it can hold [{value} > {max}]")]
    ValueOutOfRange { index: usize, value: f64, max: u64 },

    #[error("Slot index [{index}] is being updated with [{value}] which is less than 0")]
    NegativeValue { index: usize, value: f64 },

    #[error("Total [{total}] must not be lower than the already completed value [{completed}]")]
    TotalBelowCompleted { total: u64, completed: f64 },

    #[error("Slot index [{0}] has no slot reference")]
    NoSlot(usize),

    // Output errors
    #[error("Can't draw or print bar interrupts with piped output")]
    NotATerminal,

    // Stream errors
    #[error(
        "Stage size [{size}] must not be greater than the slot's capacity [{max}], consider using infinite slots"
    )]
    SizeExceedsCapacity { size: u64, max: u64 },

    #[error("No slots left to stream into")]
    StreamExhausted,

    #[error("The bar being used has been ended")]
    BarEnded,

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Converts into an I/O error so it can travel through a stage's read/write channel
    pub fn into_io(self) -> std::io::Error {
        match self {
            Error::Io(err) => err,
            err => std::io::Error::other(err),
        }
    }
}
