//! The outbound notification collaborator.

use std::future::Future;

use crate::matching::MatchRecord;

/// Delivers "new trials match your profile" messages.
pub trait Notifier: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Send a notification listing `matches`. `Ok(false)` means the provider
  /// declined the message; errors are transport failures.
  fn send_match_notification(
    &self,
    email: &str,
    name: &str,
    matches: &[MatchRecord],
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send;
}
