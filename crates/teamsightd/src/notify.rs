use std::time::Duration;
use teamsight_core::Notifier;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Sends `GET <url>?color=<team>` on every arrival.
///
/// With no URL configured every call is a no-op.
pub struct HttpNotifier {
    client: reqwest::Client,
    url: Option<String>,
}

impl HttpNotifier {
    pub fn new(url: Option<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, url })
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }
}

impl Notifier for HttpNotifier {
    type Error = NotifyError;

    async fn notify(&self, team: &str) -> Result<(), NotifyError> {
        let Some(url) = &self.url else {
            return Ok(());
        };

        let body = self
            .client
            .get(url)
            .query(&[("color", team)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        tracing::debug!(team, response = %body, "arrival notification sent");
        Ok(())
    }
}
