use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Variable {name} inválida: '{value}'")]
    Invalid { name: &'static str, value: String },
    #[error("Error de configuración: {0}")]
    Other(String),
}
