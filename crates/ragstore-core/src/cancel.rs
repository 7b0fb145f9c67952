//! Caller-supplied cancellation and deadline signal.
//!
//! Every store operation takes a [`Cancel`]. Reads race the engine call
//! against it; writes only consult it before a round trip is issued, since a
//! batch already handed to the engine cannot be recalled.

use std::{future::Future, time::Duration};

use tokio::{
  sync::watch,
  time::{Instant, sleep_until},
};

use crate::{Error, Result};

/// A cloneable cancellation signal with an optional deadline.
///
/// The default value never fires.
#[derive(Debug, Clone, Default)]
pub struct Cancel {
  signal:   Option<watch::Receiver<bool>>,
  deadline: Option<Instant>,
}

/// Fires every [`Cancel`] cloned from the one returned alongside it.
#[derive(Debug)]
pub struct CancelHandle {
  tx: watch::Sender<bool>,
}

impl CancelHandle {
  pub fn cancel(&self) { self.tx.send_replace(true); }
}

impl Cancel {
  /// A signal that never fires.
  pub fn never() -> Self { Self::default() }

  /// A signal fired explicitly through the returned handle.
  pub fn pair() -> (CancelHandle, Self) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, Self { signal: Some(rx), deadline: None })
  }

  /// Add a deadline. The earlier of two deadlines wins.
  pub fn with_deadline(mut self, deadline: Instant) -> Self {
    self.deadline = Some(match self.deadline {
      Some(existing) => existing.min(deadline),
      None => deadline,
    });
    self
  }

  pub fn with_timeout(self, timeout: Duration) -> Self {
    self.with_deadline(Instant::now() + timeout)
  }

  pub fn deadline(&self) -> Option<Instant> { self.deadline }

  pub fn is_cancelled(&self) -> bool {
    let signalled = self.signal.as_ref().is_some_and(|rx| *rx.borrow());
    let expired = self.deadline.is_some_and(|d| Instant::now() >= d);
    signalled || expired
  }

  /// `Err(Cancelled)` if the signal has already fired.
  pub fn check(&self) -> Result<()> {
    if self.is_cancelled() { Err(Error::Cancelled) } else { Ok(()) }
  }

  /// Resolves once the signal fires or the deadline passes.
  pub async fn cancelled(&self) {
    let signal = async {
      match &self.signal {
        Some(rx) => {
          let mut rx = rx.clone();
          let fired = rx.wait_for(|cancelled| *cancelled).await.is_ok();
          // A dropped handle can no longer fire.
          if !fired {
            std::future::pending::<()>().await;
          }
        }
        None => std::future::pending::<()>().await,
      }
    };
    let deadline = async {
      match self.deadline {
        Some(d) => sleep_until(d).await,
        None => std::future::pending::<()>().await,
      }
    };
    tokio::select! {
      () = signal => {}
      () = deadline => {}
    }
  }

  /// Run `fut` unless the signal fires first, in which case `fut` is dropped.
  ///
  /// Only suitable for futures whose abandonment has no side effect, i.e.
  /// reads.
  pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output> {
    self.check()?;
    tokio::select! {
      biased;
      () = self.cancelled() => Err(Error::Cancelled),
      out = fut => Ok(out),
    }
  }
}
