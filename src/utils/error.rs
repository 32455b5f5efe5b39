use std::fmt;

use crate::{
    config::ConfigError,
    override_editor::{io::IoError, mirror::MirrorError},
    override_types::ModelError,
};

#[derive(Debug)]
pub enum OverrideError {
    Io(IoError),
    Model(ModelError),
    Mirror(MirrorError),
    Config(ConfigError),
}

impl fmt::Display for OverrideError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverrideError::Io(err) => write!(f, "{err}"),
            OverrideError::Model(err) => write!(f, "{err}"),
            OverrideError::Mirror(err) => write!(f, "{err}"),
            OverrideError::Config(err) => write!(f, "{err}"),
        }
    }
}

impl From<IoError> for OverrideError {
    fn from(value: IoError) -> Self {
        OverrideError::Io(value)
    }
}

impl From<ModelError> for OverrideError {
    fn from(value: ModelError) -> Self {
        OverrideError::Model(value)
    }
}

impl From<MirrorError> for OverrideError {
    fn from(value: MirrorError) -> Self {
        OverrideError::Mirror(value)
    }
}

impl From<ConfigError> for OverrideError {
    fn from(value: ConfigError) -> Self {
        OverrideError::Config(value)
    }
}

impl std::error::Error for OverrideError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OverrideError::Io(err) => Some(err),
            OverrideError::Model(err) => Some(err),
            OverrideError::Mirror(err) => Some(err),
            OverrideError::Config(err) => Some(err),
        }
    }
}
