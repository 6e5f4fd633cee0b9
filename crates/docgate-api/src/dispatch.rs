use docgate_common::error::{ErrorKind, GatewayError, Result};
use docgate_storage::DocumentStore;
use http::StatusCode;
use tracing::{debug, error};

use crate::action::{Action, DirectoryActionRequest};
use crate::normalize::{self, ActionOutcome, ActionResponse};
use crate::validate::validate;

/// Runs one directory action and shapes the result for the wire.
pub async fn handle(
    documents: &DocumentStore,
    request: &DirectoryActionRequest,
) -> (StatusCode, ActionResponse) {
    match dispatch(documents, request).await {
        Ok(outcome) => normalize::success(&outcome),
        Err(err) => {
            log_failure(&request.action, &err);
            normalize::failure(&err)
        }
    }
}

pub async fn dispatch(
    documents: &DocumentStore,
    request: &DirectoryActionRequest,
) -> Result<ActionOutcome> {
    let action: Action = request.action.parse()?;
    validate(action, request)?;

    let keys = documents.keys();
    let dir = keys.directory(&request.path)?;
    debug!(%action, path = %dir, "dispatching directory action");

    match action {
        Action::Read => documents
            .list(&dir, request.show_hidden_items)
            .await
            .map(ActionOutcome::Listing),
        Action::Search => documents
            .search(
                &dir,
                &request.search_string,
                request.case_sensitive,
                request.show_hidden_items,
            )
            .await
            .map(ActionOutcome::Listing),
        Action::Create => documents
            .create_directory(&dir, &request.name)
            .await
            .map(|entry| ActionOutcome::Files(vec![entry])),
        Action::Delete => documents
            .delete(&dir, &request.names)
            .await
            .map(ActionOutcome::Files),
        Action::Rename => documents
            .rename(&dir, &request.name, &request.new_name)
            .await
            .map(|entry| ActionOutcome::Files(vec![entry])),
        Action::Copy => {
            let target = keys.directory(&request.target_path)?;
            documents
                .copy(&dir, &request.names, &target, &request.rename_files)
                .await
                .map(ActionOutcome::Transfer)
        }
        Action::Move => {
            let target = keys.directory(&request.target_path)?;
            documents
                .move_items(&dir, &request.names, &target, &request.rename_files)
                .await
                .map(ActionOutcome::Transfer)
        }
        Action::Details => documents
            .details(&dir, &request.names)
            .await
            .map(ActionOutcome::Details),
    }
}

/// Request problems stay at debug level; backend causes are logged in full
/// because callers only ever see a generic message.
pub fn log_failure(operation: &str, err: &GatewayError) {
    match err.kind() {
        ErrorKind::Validation | ErrorKind::NotFound => {
            debug!(operation, error = %err, "request rejected");
        }
        ErrorKind::Backend => {
            error!(operation, error = %err, "backend operation failed");
        }
    }
}
