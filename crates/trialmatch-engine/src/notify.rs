//! Match notification text and a log-only [`Notifier`].

use std::{convert::Infallible, fmt::Write as _};

use tracing::info;
use trialmatch_core::{matching::MatchRecord, notify::Notifier, trial::study_url};

pub const MATCH_EMAIL_SUBJECT: &str = "New Clinical Trials Matched to Your Profile";

/// A composed plain-text email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchEmail {
  pub subject: String,
  pub body:    String,
}

/// Compose the "new trials match your profile" email for `name`.
pub fn compose_match_email(name: &str, matches: &[MatchRecord]) -> MatchEmail {
  let mut body = format!(
    "Dear {name},\n\nWe've found new clinical trials that match your profile:\n\n"
  );
  for record in matches {
    let _ = writeln!(body, "- Trial {}", record.nct_id);
    let _ = writeln!(body, "  {}", study_url(&record.nct_id));
    body.push('\n');
  }
  body.push_str("Log in to your account for more details about these trials.\n\n");
  body.push_str("Best regards,\nClinical Trial Eligibility Screener Team");

  MatchEmail { subject: MATCH_EMAIL_SUBJECT.to_owned(), body }
}

/// Writes each composed email to the log instead of delivering it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
  type Error = Infallible;

  async fn send_match_notification(
    &self,
    email: &str,
    name: &str,
    matches: &[MatchRecord],
  ) -> Result<bool, Infallible> {
    let message = compose_match_email(name, matches);
    info!(
      to = email,
      subject = %message.subject,
      matches = matches.len(),
      body = %message.body,
      "match notification"
    );
    Ok(true)
  }
}
