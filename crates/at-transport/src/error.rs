use thiserror::Error;

pub type Result<T, E = TransportError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("port not found: {0}")]
    PortNotFound(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("command not acknowledged: {0}")]
    NotAcknowledged(String),
    #[error("invalid reply: {0}")]
    InvalidReply(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_acknowledged_names_command() {
        let err = TransportError::NotAcknowledged("AT+GATTCLEAR".to_string());
        assert_eq!(err.to_string(), "command not acknowledged: AT+GATTCLEAR");
    }
}
