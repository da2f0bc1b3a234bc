//! Delete messages by id list or search query
//!
//! A request is resolved into an ordered list of message ids, then each id is
//! deleted on its own. Failures on individual messages are recorded in the
//! [`DeleteReport`] and never abort the batch; only an invalid request or a
//! failed resolution search surface as [`DeleteError`].

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::client::MailProvider;
use crate::error::DeleteError;
use crate::models::{DeleteReport, DeleteRequest, DeleteTarget, MessageOutcome};

/// Settings that apply to every request an operation executes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteConfig {
    /// Force simulation regardless of what the request asks for
    pub dry_run: bool,
    /// Minimum pause between two provider delete calls
    pub throttle: Duration,
}

impl Default for DeleteConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            throttle: Duration::from_millis(200),
        }
    }
}

pub struct DeleteOperation<P> {
    provider: P,
    config: DeleteConfig,
}

impl<P> DeleteOperation<P>
where
    P: MailProvider,
{
    pub fn new(provider: P, config: DeleteConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &DeleteConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub async fn execute(&self, request: &DeleteRequest) -> Result<DeleteReport, DeleteError> {
        let simulate = request.simulate || self.config.dry_run;
        let ids = self.resolve(request).await?;

        if ids.is_empty() {
            info!("No messages matched the delete request");
            return Ok(DeleteReport::from_outcomes(Vec::new(), simulate));
        }

        info!(
            "Deleting {} messages{}",
            ids.len(),
            if simulate { " (simulated)" } else { "" }
        );

        let mut outcomes = Vec::with_capacity(ids.len());
        let mut called_provider = false;

        for id in ids {
            if simulate {
                debug!("Would delete message {}", id);
                outcomes.push(MessageOutcome::simulated(id));
                continue;
            }

            if called_provider && !self.config.throttle.is_zero() {
                tokio::time::sleep(self.config.throttle).await;
            }
            called_provider = true;

            match self.provider.delete_message(&id).await {
                Ok(()) => outcomes.push(MessageOutcome::deleted(id)),
                Err(e) => {
                    warn!("Failed to delete message {}: {}", id, e);
                    outcomes.push(MessageOutcome::failed(id, e.to_string()));
                }
            }
        }

        let report = DeleteReport::from_outcomes(outcomes, simulate);
        info!(
            "Delete finished: {} deleted, {} simulated, {} failed",
            report.deleted_count,
            report.simulated_count,
            report.error_count()
        );
        Ok(report)
    }

    async fn resolve(&self, request: &DeleteRequest) -> Result<Vec<String>, DeleteError> {
        match request.target() {
            None => Err(DeleteError::Validation("missing target".to_string())),
            Some(DeleteTarget::Ids(ids)) => Ok(ids.to_vec()),
            Some(DeleteTarget::Query(_)) if request.limit == 0 => Err(DeleteError::Validation(
                "limit must be at least 1 for a query".to_string(),
            )),
            Some(DeleteTarget::Query(query)) => {
                let mut ids = self
                    .provider
                    .search(query, request.limit)
                    .await
                    .map_err(DeleteError::Resolution)?;
                ids.truncate(request.limit);
                debug!("Query {:?} resolved to {} messages", query, ids.len());
                Ok(ids)
            }
        }
    }
}
