use thiserror::Error;

use zifvm::ZmError;

pub type IFtResult<T> = Result<T, IFtError>;

/// An Interactive Fiction terminal client Error.
#[derive(Error, Debug)]
pub enum IFtError {
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Z-machine error: {0}")]
    ZM(#[from] ZmError),
    #[error("Standard input closed while the story was waiting for a command")]
    EndOfInput,
}
