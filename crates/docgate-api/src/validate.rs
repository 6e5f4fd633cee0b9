use docgate_common::error::{GatewayError, Result};
use docgate_common::key::{split_path, validate_name};

use crate::action::{Action, DirectoryActionRequest};

/// Checks a request before any backend call is made.
pub fn validate(action: Action, request: &DirectoryActionRequest) -> Result<()> {
    let needs_names = matches!(action, Action::Delete | Action::Copy | Action::Move);

    if matches!(action, Action::Delete | Action::Rename)
        && request.path.is_empty()
        && request.target_path.is_empty()
    {
        return Err(GatewayError::RootProtection);
    }
    if action == Action::Delete && request.path.is_empty() {
        return Err(GatewayError::MissingField("path"));
    }
    if needs_names && request.names.is_empty() {
        return Err(GatewayError::MissingField("names"));
    }
    if matches!(action, Action::Copy | Action::Move) && request.target_path.is_empty() {
        return Err(GatewayError::MissingField("targetPath"));
    }
    if matches!(action, Action::Create | Action::Rename) && request.name.is_empty() {
        return Err(GatewayError::MissingField("name"));
    }
    if action == Action::Rename && request.new_name.is_empty() {
        return Err(GatewayError::MissingField("newName"));
    }

    split_path(&request.path)?;
    split_path(&request.target_path)?;
    if !request.name.is_empty() {
        validate_name(&request.name)?;
    }
    if !request.new_name.is_empty() {
        validate_name(&request.new_name)?;
    }
    if needs_names || action == Action::Details {
        for name in &request.names {
            validate_name(name)?;
        }
    }
    Ok(())
}
