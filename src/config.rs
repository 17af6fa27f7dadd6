//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) una sola vez y expone `AppConfig`.
use std::net::SocketAddr;
use std::time::Duration;

use once_cell::sync::Lazy;

use crate::errors::ConfigError;

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenvy::dotenv();
});

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_STEP_DEADLINE_SECS: u64 = 60;
const DEFAULT_STALL_TIMEOUT_SECS: u64 = 900;
const DEFAULT_WATCHDOG_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Dirección de escucha del servidor HTTP.
    pub bind: SocketAddr,
    /// Tiempo máximo por paso; `None` si `ADVISORFLOW_STEP_DEADLINE_SECS=0`.
    pub step_deadline: Option<Duration>,
    /// Inactividad tras la cual el watchdog marca `failed` un run en `running`.
    pub stall_timeout: Duration,
    pub watchdog_interval: Duration,
    /// Con `DATABASE_URL` se usa Postgres; sin ella, el backend en memoria.
    pub database_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Construye la configuración a partir de una función de búsqueda de
    /// variables (permite testear sin tocar el entorno del proceso).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
        where F: Fn(&str) -> Option<String>
    {
        let bind_raw = lookup("ADVISORFLOW_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw.parse()
                           .map_err(|_| ConfigError::Invalid { name: "ADVISORFLOW_BIND",
                                                               value: bind_raw.clone() })?;
        let deadline = secs(&lookup, "ADVISORFLOW_STEP_DEADLINE_SECS", DEFAULT_STEP_DEADLINE_SECS)?;
        let stall = secs(&lookup, "ADVISORFLOW_STALL_TIMEOUT_SECS", DEFAULT_STALL_TIMEOUT_SECS)?;
        let interval = secs(&lookup, "ADVISORFLOW_WATCHDOG_INTERVAL_SECS", DEFAULT_WATCHDOG_INTERVAL_SECS)?;
        if stall == 0 || interval == 0 {
            return Err(ConfigError::Other("stall timeout and watchdog interval must be positive".into()));
        }
        // un run sano toca `last_updated` al menos una vez por paso
        if deadline > 0 && stall <= deadline {
            return Err(ConfigError::Other(format!("stall timeout ({stall}s) must exceed the step deadline ({deadline}s)")));
        }
        Ok(Self { bind,
                  step_deadline: (deadline > 0).then(|| Duration::from_secs(deadline)),
                  stall_timeout: Duration::from_secs(stall),
                  watchdog_interval: Duration::from_secs(interval),
                  database_url: lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) })
    }
}

fn secs<F>(lookup: &F, name: &'static str, default: u64) -> Result<u64, ConfigError>
    where F: Fn(&str) -> Option<String>
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim()
                        .parse()
                        .map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}
