use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Notifications the engine emits while it works.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Log { text: String, is_error: bool },
    OverallRange(u64),
    OverallValue(u64),
    OverallLabel(String),
    ItemRange(u64),
    ItemValue(u64),
    ItemLabel(String),
    Clear,
    ProcessingFinished,
}

/// Fire-and-forget event channel. Implementations must not block the caller
/// and must tolerate nobody listening.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);

    fn log(&self, text: &str) {
        self.emit(ProgressEvent::Log {
            text: text.to_string(),
            is_error: false,
        });
    }

    fn log_error(&self, text: &str) {
        self.emit(ProgressEvent::Log {
            text: text.to_string(),
            is_error: true,
        });
    }

    fn overall_range(&self, total: u64) {
        self.emit(ProgressEvent::OverallRange(total));
    }

    fn overall_value(&self, value: u64) {
        self.emit(ProgressEvent::OverallValue(value));
    }

    fn overall_label(&self, label: &str) {
        self.emit(ProgressEvent::OverallLabel(label.to_string()));
    }

    fn item_range(&self, total: u64) {
        self.emit(ProgressEvent::ItemRange(total));
    }

    fn item_value(&self, value: u64) {
        self.emit(ProgressEvent::ItemValue(value));
    }

    fn item_label(&self, label: &str) {
        self.emit(ProgressEvent::ItemLabel(label.to_string()));
    }

    fn clear(&self) {
        self.emit(ProgressEvent::Clear);
    }

    fn processing_finished(&self) {
        self.emit(ProgressEvent::ProcessingFinished);
    }
}

/// Forwards events over an unbounded channel to whatever renders them.
#[derive(Clone)]
pub struct ChannelSink {
    sender: UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) {
        // A closed receiver only means nobody is watching anymore.
        let _ = self.sender.send(event);
    }
}

/// Discards every event.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Keeps every event in memory.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn error_logs(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Log {
                    text,
                    is_error: true,
                } => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Terminal renderer: an overall bar and a per-item bar, with log events
/// printed above them. `silent` hides the bars.
///
/// The item bar shows only its label until an item range arrives; stations
/// have a label, archive downloads also have a byte count.
pub struct ProgressReporter {
    multi: Option<MultiProgress>,
    overall: ProgressBar,
    item: ProgressBar,
    item_counts_bytes: AtomicBool,
}

fn item_label_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{msg:30}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn item_bytes_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg:30} [{bar:40.green/white}] {bytes}/{total_bytes}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

impl ProgressReporter {
    pub fn new(silent: bool) -> Self {
        if silent {
            return Self {
                multi: None,
                overall: ProgressBar::hidden(),
                item: ProgressBar::hidden(),
                item_counts_bytes: AtomicBool::new(false),
            };
        }

        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(0));
        overall.set_style(
            ProgressStyle::default_bar()
                .template("{msg:30} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        let item = multi.add(ProgressBar::new(0));
        item.set_style(item_label_style());

        Self {
            multi: Some(multi),
            overall,
            item,
            item_counts_bytes: AtomicBool::new(false),
        }
    }

    pub fn handle(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Log { text, is_error } => {
                let line = if is_error {
                    format!("error: {}", text)
                } else {
                    text
                };
                self.println(&line);
            }
            ProgressEvent::OverallRange(total) => self.overall.set_length(total),
            ProgressEvent::OverallValue(value) => self.overall.set_position(value),
            ProgressEvent::OverallLabel(label) => self.overall.set_message(label),
            ProgressEvent::ItemRange(total) => {
                self.set_item_counts_bytes(total > 0);
                self.item.set_length(total);
            }
            ProgressEvent::ItemValue(value) => self.item.set_position(value),
            ProgressEvent::ItemLabel(label) => self.item.set_message(label),
            ProgressEvent::Clear => {
                self.overall.reset();
                self.overall.set_length(0);
                self.overall.set_message("");
                self.item.reset();
                self.item.set_length(0);
                self.item.set_message("");
                self.set_item_counts_bytes(false);
            }
            ProgressEvent::ProcessingFinished => {
                self.overall.finish();
                self.item.finish_and_clear();
            }
        }
    }

    fn set_item_counts_bytes(&self, counts_bytes: bool) {
        if self.item_counts_bytes.swap(counts_bytes, Ordering::Relaxed) != counts_bytes {
            self.item.set_style(if counts_bytes {
                item_bytes_style()
            } else {
                item_label_style()
            });
        }
    }

    /// Render events until every sender is gone.
    pub async fn run(self, mut receiver: UnboundedReceiver<ProgressEvent>) {
        while let Some(event) = receiver.recv().await {
            self.handle(event);
        }
        self.overall.finish_and_clear();
        self.item.finish_and_clear();
    }

    /// Log lines are printed even when the bars are hidden.
    pub fn println(&self, message: &str) {
        match &self.multi {
            Some(multi) => {
                if multi.println(message).is_err() {
                    eprintln!("{}", message);
                }
            }
            None => println!("{}", message),
        }
    }
}
