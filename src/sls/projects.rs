//! SLS Projects
//!
//! Describe, tag and poll Log Service projects.

use super::client::{
    ApiAction, ApiRequest, SlsClient, GET_PROJECT, LIST_TAG_RESOURCES, TAG_RESOURCES,
    UNTAG_RESOURCES,
};
use super::error::{SlsError, PROJECT_NOT_EXIST};
use super::retry::{retry, READ_TIMEOUT};
use super::tags::{is_ignored_tag, TagDiff, Tags};
use backon::BackoffBuilder;
use serde_json::{json, Value};
use std::time::Duration;

/// Resource type used by the tag endpoints
pub const RESOURCE_TYPE_PROJECT: &str = "PROJECT";

/// Project information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub project_name: String,
    pub description: String,
    pub status: String,
    pub owner: String,
    pub region: String,
    pub create_time: String,
    pub last_modify_time: String,
    pub resource_group_id: String,
    pub data_redundancy_type: String,
}

impl From<&Value> for Project {
    fn from(value: &Value) -> Self {
        let text = |key: &str| field_value(value, key);
        let or_dash = |s: String| if s.is_empty() { "-".to_string() } else { s };

        Self {
            project_name: or_dash(text("projectName")),
            description: or_dash(text("description")),
            status: or_dash(text("status")),
            owner: or_dash(text("owner")),
            region: or_dash(text("region")),
            create_time: or_dash(text("createTime")),
            last_modify_time: or_dash(text("lastModifyTime")),
            resource_group_id: or_dash(text("resourceGroupId")),
            data_redundancy_type: or_dash(text("dataRedundancyType")),
        }
    }
}

/// One poll of a project's state
#[derive(Debug, Clone, PartialEq)]
pub struct StateRefresh {
    /// `None` when the project does not exist
    pub object: Option<Value>,
    pub status: String,
}

/// Look up a value by dot path (`status`, `$.quota.shard`, `items.0.name`).
/// Returns `None` when the path is missing or ends at null.
pub fn field_lookup<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    let mut current = item;

    for part in path.split('.').filter(|p| !p.is_empty() && *p != "$") {
        current = match part.parse::<usize>() {
            Ok(idx) => current.get(idx)?,
            Err(_) => current.get(part)?,
        };
    }

    (!current.is_null()).then_some(current)
}

/// Read a value by dot path and render it as text.
/// Missing and null values render as an empty string.
pub fn field_value(item: &Value, path: &str) -> String {
    match field_lookup(item, path) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Run one action under the retry loop and log the exchange
async fn call(
    client: &SlsClient,
    id: &str,
    action: ApiAction,
    request: &ApiRequest,
    timeout: Duration,
) -> Result<Value, SlsError> {
    let response = retry(timeout, client.retry, move || client.execute(id, action, request)).await?;
    tracing::debug!(
        "{} {} request={:?} response={}",
        action.name,
        action.path,
        request,
        response
    );
    Ok(response)
}

/// Map the project-not-exist code to a not-found error and wrap the rest
fn classify_read(err: SlsError, id: &str, action: ApiAction) -> SlsError {
    if err.is_expected(&[PROJECT_NOT_EXIST]) {
        SlsError::not_found("Project", id)
    } else {
        err.operation(id, action.path)
    }
}

/// Fetch the current state of a project
pub async fn describe_project(client: &SlsClient, id: &str) -> Result<Value, SlsError> {
    let request = ApiRequest::new();

    call(client, id, GET_PROJECT, &request, READ_TIMEOUT)
        .await
        .map_err(|e| classify_read(e, id, GET_PROJECT))
}

/// Fetch one page of tag resources attached to a project
pub async fn describe_list_tag_resources(
    client: &SlsClient,
    id: &str,
    next_token: Option<&str>,
) -> Result<Value, SlsError> {
    let resource_ids = serde_json::to_string(&[id])?;
    let mut request = ApiRequest::new()
        .with_query("resourceType", RESOURCE_TYPE_PROJECT)
        .with_query("resourceId", &resource_ids);
    if let Some(token) = next_token {
        request = request.with_query("nextToken", token);
    }

    call(client, id, LIST_TAG_RESOURCES, &request, READ_TIMEOUT)
        .await
        .map_err(|e| classify_read(e, id, LIST_TAG_RESOURCES))
}

/// List all user tags on a project (auto-paginate).
/// System-managed keys (see [`is_ignored_tag`]) are left out.
pub async fn list_project_tags(client: &SlsClient, id: &str) -> Result<Tags, SlsError> {
    let mut tags = Tags::new();
    let mut next_token: Option<String> = None;

    loop {
        let page = describe_list_tag_resources(client, id, next_token.as_deref()).await?;

        for entry in page
            .get("tagResources")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
        {
            let key = field_value(entry, "tagKey");
            if key.is_empty() || is_ignored_tag(&key) {
                continue;
            }
            tags.insert(key, field_value(entry, "tagValue"));
        }

        next_token = page
            .get("nextToken")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
        if next_token.is_none() {
            break;
        }
    }

    Ok(tags)
}

/// Move a project's tags from `old` to `new`.
/// Removed keys are detached first, then the desired set is attached.
/// Nothing is sent when the two sets are equal.
pub async fn set_resource_tags(
    client: &SlsClient,
    id: &str,
    old: &Tags,
    new: &Tags,
    timeout: Duration,
) -> Result<(), SlsError> {
    let diff = TagDiff::between(old, new);
    if diff.is_empty() {
        return Ok(());
    }

    if !diff.removed.is_empty() {
        tracing::info!("Untagging project {}: {:?}", id, diff.removed);
        let request = ApiRequest::new().with_body(json!({
            "resourceId": [id],
            "resourceType": RESOURCE_TYPE_PROJECT,
            "tags": diff.removed,
        }));
        call(client, id, UNTAG_RESOURCES, &request, timeout)
            .await
            .map_err(|e| e.operation(id, UNTAG_RESOURCES.path))?;
    }

    if !diff.added.is_empty() {
        tracing::info!("Tagging project {} with {} tags", id, diff.added.len());
        let tags: Vec<Value> = diff
            .added
            .iter()
            .map(|(key, value)| json!({ "key": key, "value": value }))
            .collect();
        let request = ApiRequest::new().with_body(json!({
            "resourceId": [id],
            "resourceType": RESOURCE_TYPE_PROJECT,
            "tags": tags,
        }));
        call(client, id, TAG_RESOURCES, &request, timeout)
            .await
            .map_err(|e| e.operation(id, TAG_RESOURCES.path))?;
    }

    Ok(())
}

/// Poll a project once and read `field` as its status.
/// A missing project is reported as no object and an empty status.
/// Fail states are only matched when the project has a value at `field`;
/// a missing or null field never counts as a failure.
pub async fn project_state_refresh(
    client: &SlsClient,
    id: &str,
    field: &str,
    fail_states: &[String],
) -> Result<StateRefresh, SlsError> {
    let object = match describe_project(client, id).await {
        Ok(object) => object,
        Err(e) if e.is_not_found() => {
            return Ok(StateRefresh {
                object: None,
                status: String::new(),
            })
        }
        Err(e) => return Err(e),
    };

    let status = field_value(&object, field);
    if field_lookup(&object, field).is_some() && fail_states.iter().any(|s| *s == status) {
        return Err(SlsError::FailedToReachTargetStatus(status));
    }

    Ok(StateRefresh {
        object: Some(object),
        status,
    })
}

/// Poll until `field` reaches one of `targets`.
/// With no targets, waits for the project to disappear and returns `None`.
/// Polls are spaced by the client's retry policy, bounded by `timeout`.
pub async fn wait_for_project_state(
    client: &SlsClient,
    id: &str,
    field: &str,
    targets: &[String],
    fail_states: &[String],
    timeout: Duration,
) -> Result<Option<Value>, SlsError> {
    let mut waits = client.retry.until(timeout).build();

    loop {
        let state = project_state_refresh(client, id, field, fail_states).await?;
        let reached = match &state.object {
            None => targets.is_empty(),
            Some(_) => targets.iter().any(|t| *t == state.status),
        };
        if reached {
            return Ok(state.object);
        }

        let Some(delay) = waits.next() else {
            return Err(SlsError::Timeout {
                elapsed: waits.elapsed(),
                last: Box::new(SlsError::FailedToReachTargetStatus(state.status)),
            });
        };

        tracing::debug!(
            "Project {} status '{}', waiting {:?} for {:?}",
            id,
            state.status,
            delay,
            targets
        );
        tokio::time::sleep(delay).await;
    }
}
