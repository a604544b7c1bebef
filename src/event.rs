use crate::nav::{TabId, TabTransition};
use crate::notifications::Notification;
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::mpsc;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for redraws and query polling
  Tick,
  /// Auto-refresh timer fired for a tab
  Refresh(TabId),
  /// The router switched tabs
  TabChanged(TabTransition),
  /// A notice raised outside the key handling path
  Notify(Notification),
}

pub type EventSender = mpsc::UnboundedSender<Event>;

/// Merges terminal input, a tick timer and internally sent events
pub struct EventHandler {
  tx: EventSender,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    let input_tx = tx.clone();
    tokio::spawn(async move {
      loop {
        let ready = tokio::task::block_in_place(|| event::poll(tick_rate).unwrap_or(false));
        let next = if ready {
          match event::read() {
            Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => Some(Event::Key(key)),
            _ => None,
          }
        } else {
          Some(Event::Tick)
        };

        if let Some(evt) = next {
          if input_tx.send(evt).is_err() {
            break;
          }
        }
      }
    });

    Self { tx, rx }
  }

  /// Handle for timers and tasks that feed the loop
  pub fn sender(&self) -> EventSender {
    self.tx.clone()
  }

  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
