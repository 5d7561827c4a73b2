use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server is not running")]
    NotRunning,
    #[error("max clients reached")]
    MaxClientsReached,
    #[error("command '{0}' is not in the allow-list")]
    CommandNotAllowed(String),
    #[error("client '{0}' is not connected")]
    ClientNotConnected(String),
    #[error("device '{0}' is not registered")]
    DeviceNotRegistered(String),
    #[error("client '{0}' is not permitted to command device '{1}'")]
    NotPermitted(String, String),
    #[error(transparent)]
    Device(#[from] hydrogen_device::DeviceError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file '{path}': {source}")]
    Io { path: String, source: std::io::Error },
    #[error("parsing TOML: {0}")]
    Parse(String),
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}
