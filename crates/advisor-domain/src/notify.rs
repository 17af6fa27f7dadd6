// notify.rs
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Mensaje para el canal de notificaciones del usuario (toasts).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info,
               message: message.into() }
    }
    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error,
               message: message.into() }
    }
}

/// Canal fire-and-forget: no devuelve nada y no puede fallar hacia el
/// llamador.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Notifier que guarda los avisos recibidos, para tests y para exponerlos en
/// una respuesta.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<Notice> {
        self.notices.lock().ok().and_then(|n| n.last().cloned())
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }
}
