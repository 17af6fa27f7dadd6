use advisor_domain::{Notice, NoticeLevel, Notifier};
use log::{error, info};

/// Envía los avisos al log con el target `advisor::notice`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => info!(target: "advisor::notice", "{}", notice.message),
            NoticeLevel::Error => error!(target: "advisor::notice", "{}", notice.message),
        }
    }
}
