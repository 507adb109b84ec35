use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Subscribe error: {0}")]
    Subscribe(String),

    #[error("Send error: {0}")]
    Send(String),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("Config error: {0}")]
    Config(String),
}

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Empty reply for command: {0}")]
    EmptyReply(String),
}

pub type Result<T> = std::result::Result<T, BotError>;
