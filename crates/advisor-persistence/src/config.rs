//! Carga de configuración de conexión desde variables de entorno.
//! Usa convención `DATABASE_URL` y parámetros opcionales de pool.

use std::env;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

use crate::error::PersistenceError;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn from_env() -> Result<Self, PersistenceError> {
        // asegura que .env se haya cargado
        Lazy::force(&DOTENV_LOADED);
        let url = env::var("DATABASE_URL").map_err(|_| PersistenceError::Config("DATABASE_URL no definido".into()))?;
        Self::from_parts(url,
                         env::var("DATABASE_MIN_CONNECTIONS").ok(),
                         env::var("DATABASE_MAX_CONNECTIONS").ok())
    }

    /// Valida y normaliza los tamaños de pool (mínimo 1, `min <= max`).
    pub fn from_parts(url: String, min: Option<String>, max: Option<String>) -> Result<Self, PersistenceError> {
        let parse = |name: &str, raw: Option<String>, default: u32| -> Result<u32, PersistenceError> {
            match raw {
                None => Ok(default),
                Some(v) => v.trim()
                            .parse()
                            .map_err(|_| PersistenceError::Config(format!("{name} inválido: '{v}'"))),
            }
        };
        let max_connections = parse("DATABASE_MAX_CONNECTIONS", max, 16)?.max(1);
        let min_connections = parse("DATABASE_MIN_CONNECTIONS", min, 2)?.max(1).min(max_connections);
        Ok(Self { url,
                  min_connections,
                  max_connections })
    }
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_sizes_are_clamped() {
        let cfg = DbConfig::from_parts("postgres://x".into(), Some("20".into()), Some("4".into())).unwrap();
        assert_eq!((cfg.min_connections, cfg.max_connections), (4, 4));
        let cfg = DbConfig::from_parts("postgres://x".into(), Some("0".into()), None).unwrap();
        assert_eq!((cfg.min_connections, cfg.max_connections), (1, 16));
    }

    #[test]
    fn garbage_sizes_are_rejected() {
        let err = DbConfig::from_parts("postgres://x".into(), None, Some("many".into())).unwrap_err();
        assert!(matches!(err, PersistenceError::Config(msg) if msg.contains("DATABASE_MAX_CONNECTIONS")));
    }
}
