//! Errors raised by behaviors.

#[derive(thiserror::Error, Debug)]
pub enum HandlerError {
    #[error("{selector} expects {expected} argument(s), got {given}")]
    MissingArgument {
        selector: String,
        expected: usize,
        given: usize,
    },

    #[error("{selector}: invalid argument: {message}")]
    InvalidArgument { selector: String, message: String },

    #[error("Codec error: {0}")]
    Codec(#[from] trash_doc_codec::Error),

    #[error("Instance error: {0}")]
    Instance(#[from] trash_instance_store::Error),

    #[error("An error occurred while encoding a result: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{message}")]
    Failed { message: String },
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed {
            message: message.into(),
        }
    }
}
