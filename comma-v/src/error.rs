use std::{num::ParseIntError, str::Utf8Error};

use nom::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid RCS date {0:?}")]
    InvalidDate(Vec<u8>),

    #[error("contains can only be invoked on a branch, with a commit")]
    NotBranch,

    #[error("parse error of kind {kind:?} at location {location:?}")]
    ParseError { location: Vec<u8>, kind: ErrorKind },

    #[error(transparent)]
    ParseInt(#[from] ParseIntError),

    #[error(transparent)]
    ParseUtf8(#[from] Utf8Error),
}
