//! Passphrase confirmation.
//!
//! The proctor types a passphrase; its BLAKE3 digest is compared with the
//! configured hex digest. Closed input or a missing digest yields a
//! [`ConfirmationError`], which the supervisor treats as a denial.

use std::io::Write;

use async_trait::async_trait;
use proctor_supervisor::{ConfirmationAuthority, ConfirmationError, ConfirmationRequest};
use proctor_types::{ConfirmationOutcome, TerminationTrigger};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct PassphraseAuthority<R = BufReader<Stdin>> {
    digest: Option<String>,
    input: Mutex<R>,
}

impl PassphraseAuthority {
    pub fn stdin(digest: Option<String>) -> Self {
        Self::new(digest, BufReader::new(tokio::io::stdin()))
    }
}

impl<R> PassphraseAuthority<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(digest: Option<String>, input: R) -> Self {
        Self {
            digest: digest.map(|d| d.to_ascii_lowercase()),
            input: Mutex::new(input),
        }
    }

    fn matches(&self, digest: &str, passphrase: &str) -> bool {
        blake3::hash(passphrase.as_bytes()).to_hex().as_str() == digest
    }
}

#[async_trait]
impl<R> ConfirmationAuthority for PassphraseAuthority<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn request_confirmation(
        &self,
        request: &ConfirmationRequest,
    ) -> Result<ConfirmationOutcome, ConfirmationError> {
        let Some(digest) = self.digest.as_deref() else {
            return Err(ConfirmationError::Unavailable(
                "no passphrase digest configured".into(),
            ));
        };

        let reason = match request.trigger {
            TerminationTrigger::ThresholdReached => format!(
                "Warning limit reached ({}/{})",
                request.violation_count, request.max_violations
            ),
            TerminationTrigger::OperatorRequest => "End of test requested".to_string(),
        };
        print!("{}. Enter proctor passphrase to end the test: ", reason);
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        let read = self
            .input
            .lock()
            .await
            .read_line(&mut line)
            .await
            .map_err(|e| ConfirmationError::Unavailable(e.to_string()))?;
        if read == 0 {
            return Err(ConfirmationError::Cancelled);
        }

        if self.matches(digest, line.trim_end_matches(['\r', '\n'])) {
            info!(session_id = %request.session_id, "Termination approved");
            Ok(ConfirmationOutcome::Accepted)
        } else {
            warn!(session_id = %request.session_id, "Incorrect passphrase");
            Ok(ConfirmationOutcome::Denied)
        }
    }
}
