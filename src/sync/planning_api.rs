use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::planning::event::{format_wire_datetime, parse_wire_datetime};
use crate::planning::{
    Association, Event, EventDraft, EventPatch, Invitation, InvitationStatus, InviteTarget,
    DEFAULT_COLOR,
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Request rejected: {0}")]
    Rejected(String),
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl ApiError {
    /// Transport-level failures are eligible for the optimistic local
    /// fallback; anything the server actually answered is not.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::HttpError(_))
    }
}

/// Server-assigned fields returned by event creation.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedEvent {
    pub id: i64,
    pub color: String,
}

/// An invitation together with the association it points at, as the server
/// denormalizes it on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct InvitationRecord {
    pub invitation: Invitation,
    pub association: Association,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlanningApi {
    async fn list_events(&self) -> Result<Vec<Event>, ApiError>;

    async fn create_event(&self, draft: &EventDraft) -> Result<CreatedEvent, ApiError>;

    async fn update_event(&self, event_id: i64, patch: &EventPatch) -> Result<(), ApiError>;

    async fn delete_event(&self, event_id: i64) -> Result<(), ApiError>;

    async fn list_invitations(&self, event_id: i64) -> Result<Vec<InvitationRecord>, ApiError>;

    async fn add_invitation(
        &self,
        event_id: i64,
        target: &InviteTarget,
    ) -> Result<InvitationRecord, ApiError>;

    async fn delete_invitation(&self, invitation_id: i64) -> Result<(), ApiError>;

    async fn list_associations(&self) -> Result<Vec<Association>, ApiError>;

    async fn create_association<'a>(
        &self,
        name: &str,
        description: Option<&'a str>,
    ) -> Result<i64, ApiError>;

    async fn edit_association<'a>(
        &self,
        association_id: i64,
        name: &str,
        description: Option<&'a str>,
    ) -> Result<(), ApiError>;

    async fn delete_association(&self, association_id: i64) -> Result<(), ApiError>;
}

// --- wire types ---

#[derive(Debug, Serialize, Deserialize)]
struct EventPayload {
    title: String,
    #[serde(rename = "startDateTime")]
    start_date_time: String,
    #[serde(rename = "endDateTime")]
    end_date_time: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Ack {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateEventResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    event_id: Option<i64>,
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    id: i64,
    title: String,
    #[serde(rename = "startDateTime")]
    start_date_time: String,
    #[serde(rename = "endDateTime")]
    end_date_time: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventListResponse {
    #[serde(default)]
    events: Vec<WireEvent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireAssociation {
    id: i64,
    name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssociationListResponse {
    #[allow(dead_code)]
    success: bool,
    #[serde(default)]
    associations: Vec<WireAssociation>,
}

#[derive(Debug, Deserialize)]
struct WireInvitation {
    id: i64,
    status: Option<bool>,
    association: WireAssociation,
}

#[derive(Debug, Deserialize)]
struct InvitationListResponse {
    #[allow(dead_code)]
    success: bool,
    #[serde(default)]
    invitations: Vec<WireInvitation>,
}

#[derive(Debug, Deserialize)]
struct AddInvitationResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    invitation: Option<WireInvitation>,
}

#[derive(Debug, Serialize)]
struct InvitationPayload {
    #[serde(rename = "associationId", skip_serializing_if = "Option::is_none")]
    association_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

#[derive(Debug, Serialize)]
struct AssociationPayload {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateAssociationResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    association_id: Option<i64>,
}

fn event_from_wire(wire: WireEvent) -> Result<Event, ApiError> {
    let start = parse_wire_datetime(&wire.start_date_time)
        .map_err(|e| ApiError::ParseError(e.to_string()))?;
    let end = parse_wire_datetime(&wire.end_date_time)
        .map_err(|e| ApiError::ParseError(e.to_string()))?;

    Ok(Event {
        id: wire.id,
        title: wire.title,
        description: wire.description,
        start,
        end,
        color: wire.color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
    })
}

fn association_from_wire(wire: WireAssociation) -> Association {
    Association {
        id: wire.id,
        name: wire.name,
        email: wire.email,
        description: wire.description,
    }
}

fn invitation_from_wire(wire: WireInvitation, event_id: i64) -> InvitationRecord {
    let association = association_from_wire(wire.association);
    InvitationRecord {
        invitation: Invitation {
            id: wire.id,
            event_id,
            association_id: association.id,
            status: InvitationStatus::from_wire(wire.status),
        },
        association,
    }
}

fn payload_from_draft(draft: &EventDraft) -> EventPayload {
    EventPayload {
        title: draft.title.clone(),
        start_date_time: format_wire_datetime(&draft.start),
        end_date_time: format_wire_datetime(&draft.end),
        description: draft.description.clone(),
    }
}

fn payload_from_patch(patch: &EventPatch) -> EventPayload {
    EventPayload {
        title: patch.title.clone(),
        start_date_time: format_wire_datetime(&patch.start),
        end_date_time: format_wire_datetime(&patch.end),
        description: patch.description.clone(),
    }
}

fn payload_from_target(target: &InviteTarget) -> InvitationPayload {
    match target {
        InviteTarget::Association(id) => InvitationPayload {
            association_id: Some(*id),
            email: None,
        },
        InviteTarget::Email(email) => InvitationPayload {
            association_id: None,
            email: Some(email.clone()),
        },
    }
}

/// Client for the planning JSON API.
pub struct HttpPlanningClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpPlanningClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Maps a non-2xx answer to the error taxonomy, salvaging the server's
    /// message from the body when there is one.
    async fn reject(response: reqwest::Response, context: &str) -> ApiError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Ack>(&body)
            .ok()
            .and_then(|ack| ack.message)
            .unwrap_or(body);

        tracing::error!("{} failed. Status: {}, message: {}", context, status, message);

        match status.as_u16() {
            400 => ApiError::InvalidInput(message),
            404 => ApiError::NotFound(message),
            409 => ApiError::Conflict(message),
            _ => ApiError::Rejected(format!("Status {}: {}", status, message)),
        }
    }
}

#[async_trait]
impl PlanningApi for HttpPlanningClient {
    async fn list_events(&self) -> Result<Vec<Event>, ApiError> {
        let url = self.url("/events");

        tracing::info!("Fetching event list");

        let response = self.client.post(&url).send().await?;
        if !response.status().is_success() {
            return Err(Self::reject(response, "List events").await);
        }

        let list: EventListResponse = response.json().await?;
        let events: Vec<Event> = list
            .events
            .into_iter()
            .filter_map(|wire| event_from_wire(wire).ok())
            .collect();

        tracing::info!("Fetched {} events", events.len());
        Ok(events)
    }

    async fn create_event(&self, draft: &EventDraft) -> Result<CreatedEvent, ApiError> {
        let url = self.url("/event/create");
        let payload = payload_from_draft(draft);

        tracing::info!("Creating event '{}' at {}", draft.title, draft.start);

        let response = self.client.post(&url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(Self::reject(response, "Create event").await);
        }

        let created: CreateEventResponse = response.json().await?;
        if !created.success {
            return Err(ApiError::Rejected(
                created.message.unwrap_or_else(|| "Create event refused".to_string()),
            ));
        }

        let id = created
            .event_id
            .ok_or_else(|| ApiError::ParseError("Missing event_id".to_string()))?;

        tracing::info!("Event created with id {}", id);
        Ok(CreatedEvent {
            id,
            color: created.color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
        })
    }

    async fn update_event(&self, event_id: i64, patch: &EventPatch) -> Result<(), ApiError> {
        let url = self.url(&format!("/event/update/{}", event_id));
        let payload = payload_from_patch(patch);

        tracing::info!("Updating event {}: '{}'", event_id, patch.title);

        let response = self.client.put(&url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(Self::reject(response, "Update event").await);
        }

        let ack: Ack = response.json().await?;
        if !ack.success {
            return Err(ApiError::Rejected(
                ack.message.unwrap_or_else(|| "Update event refused".to_string()),
            ));
        }
        Ok(())
    }

    async fn delete_event(&self, event_id: i64) -> Result<(), ApiError> {
        let url = self.url(&format!("/event/delete/{}", event_id));

        tracing::info!("Deleting event {}", event_id);

        let response = self.client.delete(&url).send().await?;
        if !response.status().is_success() {
            return Err(Self::reject(response, "Delete event").await);
        }
        Ok(())
    }

    async fn list_invitations(&self, event_id: i64) -> Result<Vec<InvitationRecord>, ApiError> {
        let url = self.url(&format!("/event/{}/invitations", event_id));

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Self::reject(response, "List invitations").await);
        }

        let list: InvitationListResponse = response.json().await?;
        Ok(list
            .invitations
            .into_iter()
            .map(|wire| invitation_from_wire(wire, event_id))
            .collect())
    }

    async fn add_invitation(
        &self,
        event_id: i64,
        target: &InviteTarget,
    ) -> Result<InvitationRecord, ApiError> {
        let url = self.url(&format!("/event/{}/invitation/add", event_id));
        let payload = payload_from_target(target);

        tracing::info!("Adding invitation to event {}", event_id);

        let response = self.client.post(&url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(Self::reject(response, "Add invitation").await);
        }

        let added: AddInvitationResponse = response.json().await?;
        if !added.success {
            return Err(ApiError::Rejected(
                added.message.unwrap_or_else(|| "Add invitation refused".to_string()),
            ));
        }

        let wire = added
            .invitation
            .ok_or_else(|| ApiError::ParseError("Missing invitation".to_string()))?;
        Ok(invitation_from_wire(wire, event_id))
    }

    async fn delete_invitation(&self, invitation_id: i64) -> Result<(), ApiError> {
        let url = self.url(&format!("/event/invitation/{}/delete", invitation_id));

        tracing::info!("Deleting invitation {}", invitation_id);

        let response = self.client.delete(&url).send().await?;
        if !response.status().is_success() {
            return Err(Self::reject(response, "Delete invitation").await);
        }
        Ok(())
    }

    async fn list_associations(&self) -> Result<Vec<Association>, ApiError> {
        let url = self.url("/associations/available");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Self::reject(response, "List associations").await);
        }

        let list: AssociationListResponse = response.json().await?;
        Ok(list
            .associations
            .into_iter()
            .map(association_from_wire)
            .collect())
    }

    async fn create_association<'a>(
        &self,
        name: &str,
        description: Option<&'a str>,
    ) -> Result<i64, ApiError> {
        let url = self.url("/association/create");
        let payload = AssociationPayload {
            name: name.to_string(),
            description: description.map(str::to_string),
        };

        tracing::info!("Creating association '{}'", name);

        let response = self.client.post(&url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(Self::reject(response, "Create association").await);
        }

        let created: CreateAssociationResponse = response.json().await?;
        if !created.success {
            return Err(ApiError::Rejected(
                created
                    .message
                    .unwrap_or_else(|| "Create association refused".to_string()),
            ));
        }

        created
            .association_id
            .ok_or_else(|| ApiError::ParseError("Missing association_id".to_string()))
    }

    async fn edit_association<'a>(
        &self,
        association_id: i64,
        name: &str,
        description: Option<&'a str>,
    ) -> Result<(), ApiError> {
        let url = self.url(&format!("/association/{}/edit", association_id));
        let payload = AssociationPayload {
            name: name.to_string(),
            description: description.map(str::to_string),
        };

        tracing::info!("Editing association {}", association_id);

        let response = self.client.patch(&url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(Self::reject(response, "Edit association").await);
        }
        Ok(())
    }

    async fn delete_association(&self, association_id: i64) -> Result<(), ApiError> {
        let url = self.url(&format!("/association/{}/delete", association_id));

        tracing::info!("Deleting association {}", association_id);

        let response = self.client.delete(&url).send().await?;
        if !response.status().is_success() {
            return Err(Self::reject(response, "Delete association").await);
        }
        Ok(())
    }
}
