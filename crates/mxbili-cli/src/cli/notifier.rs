use mxbili_core::notify::{LogNotifier, Notice, Notifier};

/// Shows notices on the terminal running `mxbili serve` and logs them.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, notice: Notice) {
        eprintln!("mxbili: {}", notice);
        LogNotifier.notify(notice);
    }
}
