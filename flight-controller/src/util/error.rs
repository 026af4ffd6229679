use core::fmt;
use std::fmt::{Display, Formatter};

use shared_definitions::telemetry::SchemaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Sensor,
    Motor,
    Telemetry,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match self {
            ErrorKind::Config => "config",
            ErrorKind::Sensor => "sensor",
            ErrorKind::Motor => "motor",
            ErrorKind::Telemetry => "telemetry",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        AppError {
            kind,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn sensor(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Sensor, message)
    }

    pub fn motor(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Motor, message)
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Telemetry, message)
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

impl std::error::Error for AppError {}

impl From<SchemaError> for AppError {
    fn from(error: SchemaError) -> Self {
        AppError::telemetry(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        AppError::telemetry(error.to_string())
    }
}
