use crate::{document_map, marshal, store, translator, usererror::UserError, write};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    #[error("document map error: {0}")]
    DocumentMap(#[from] document_map::Error),
    #[error("translator error: {0}")]
    Translator(#[from] translator::Error),
    #[error("write error: {0}")]
    Write(#[from] write::Error),
    #[error("conversion error: {0}")]
    Marshal(#[from] marshal::Error),
    #[error("store error: {0}")]
    Store(#[from] store::Error),
}

impl UserError for Error {
    fn code(&self) -> u32 {
        match self {
            Error::DocumentMap(e) => e.code(),
            Error::Translator(e) => e.code(),
            Error::Write(e) => e.code(),
            Error::Marshal(e) => e.code(),
            Error::Store(e) => e.code(),
        }
    }

    fn user_message(&self) -> Option<String> {
        match self {
            Error::DocumentMap(e) => e.user_message(),
            Error::Translator(e) => e.user_message(),
            Error::Write(e) => e.user_message(),
            Error::Marshal(e) => e.user_message(),
            Error::Store(e) => e.user_message(),
        }
    }

    fn technical_message(&self) -> String {
        self.to_string()
    }
}
