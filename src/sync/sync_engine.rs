use thiserror::Error;

use crate::app::{InvitationView, PlannerState};
use crate::planning::{EventDraft, EventPatch, Invitation, InviteTarget, PlanningError};
use crate::storage::config::{Config, ConsistencyPolicy};
use crate::sync::inflight::{ActionKey, InFlightRegistry, InFlightToken};
use crate::sync::planning_api::{ApiError, PlanningApi};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
    #[error("Planning error: {0}")]
    Planning(#[from] PlanningError),
    #[error("Action already in flight: {0:?}")]
    InFlight(ActionKey),
}

/// Whether a mutation reached the server or only the local mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Synced,
    LocalOnly,
}

/// Drives every user action: network call first, then the local mirror is
/// updated from the server-confirmed payload. When the server cannot be
/// reached the configured consistency policy decides between applying the
/// mutation locally anyway and failing with the state untouched.
pub struct SyncEngine<A: PlanningApi> {
    state: PlannerState,
    api: A,
    config: Config,
    in_flight: InFlightRegistry,
}

impl<A: PlanningApi> SyncEngine<A> {
    pub fn new(config: Config, api: A) -> Self {
        let state = PlannerState::new().with_color_strategy(config.ui.color_strategy);
        Self {
            state,
            api,
            config,
            in_flight: InFlightRegistry::new(),
        }
    }

    /// Shares a registry with other engines or views so double-submits are
    /// suppressed across all of them.
    pub fn with_registry(mut self, registry: InFlightRegistry) -> Self {
        self.in_flight = registry;
        self
    }

    pub fn state(&self) -> &PlannerState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut PlannerState {
        &mut self.state
    }

    pub fn in_flight(&self) -> &InFlightRegistry {
        &self.in_flight
    }

    fn begin(&self, key: ActionKey) -> Result<InFlightToken, SyncError> {
        self.in_flight
            .begin(key.clone())
            .ok_or(SyncError::InFlight(key))
    }

    fn applies_locally(&self, error: &ApiError) -> bool {
        self.config.sync.consistency == ConsistencyPolicy::OptimisticLocal
            && error.is_transport()
    }

    /// Replaces the mirror with the server's event and association lists.
    pub async fn refresh(&mut self) -> Result<(), SyncError> {
        let events = self.api.list_events().await?;
        let associations = self.api.list_associations().await?;

        tracing::info!(
            "Refreshed {} events, {} associations",
            events.len(),
            associations.len()
        );
        self.state.replace_all(events, associations, Vec::new());
        Ok(())
    }

    // --- events ---

    pub async fn create_event(
        &mut self,
        draft: EventDraft,
    ) -> Result<(i64, ApplyOutcome), SyncError> {
        let _token = self.begin(ActionKey::CreateEvent)?;

        match self.api.create_event(&draft).await {
            Ok(created) => {
                let id = created.id;
                self.state.add_event(id, draft.with_color(created.color));
                Ok((id, ApplyOutcome::Synced))
            }
            Err(error) if self.applies_locally(&error) => {
                tracing::warn!("Create event unreachable ({}); keeping it local", error);
                let id = self.state.add_local_event(draft).id;
                Ok((id, ApplyOutcome::LocalOnly))
            }
            Err(error) => Err(error.into()),
        }
    }

    pub async fn update_event(
        &mut self,
        event_id: i64,
        patch: EventPatch,
    ) -> Result<ApplyOutcome, SyncError> {
        let _token = self.begin(ActionKey::UpdateEvent(event_id))?;

        match self.api.update_event(event_id, &patch).await {
            Ok(()) => {
                self.state.update_event(event_id, &patch);
                Ok(ApplyOutcome::Synced)
            }
            Err(error) if self.applies_locally(&error) => {
                tracing::warn!(
                    "Update event {} unreachable ({}); keeping it local",
                    event_id,
                    error
                );
                self.state.update_event(event_id, &patch);
                Ok(ApplyOutcome::LocalOnly)
            }
            Err(error) => Err(error.into()),
        }
    }

    pub async fn delete_event(&mut self, event_id: i64) -> Result<ApplyOutcome, SyncError> {
        let _token = self.begin(ActionKey::DeleteEvent(event_id))?;

        match self.api.delete_event(event_id).await {
            Ok(()) => {
                self.state.remove_event(event_id);
                Ok(ApplyOutcome::Synced)
            }
            Err(error) if self.applies_locally(&error) => {
                tracing::warn!(
                    "Delete event {} unreachable ({}); removing locally",
                    event_id,
                    error
                );
                self.state.remove_event(event_id);
                Ok(ApplyOutcome::LocalOnly)
            }
            Err(error) => Err(error.into()),
        }
    }

    // --- invitations ---

    pub async fn add_invitation(
        &mut self,
        event_id: i64,
        target: InviteTarget,
    ) -> Result<(Invitation, ApplyOutcome), SyncError> {
        let _token = self.begin(ActionKey::AddInvitation(event_id))?;

        // Duplicates and unresolvable targets are caught against the mirror
        // before anything is written anywhere.
        self.state.check_invitation(event_id, &target)?;

        match self.api.add_invitation(event_id, &target).await {
            Ok(record) => {
                self.state.upsert_association(record.association);
                self.state.upsert_invitation(record.invitation.clone());
                Ok((record.invitation, ApplyOutcome::Synced))
            }
            Err(error) if self.applies_locally(&error) => {
                tracing::warn!(
                    "Add invitation to event {} unreachable ({}); keeping it local",
                    event_id,
                    error
                );
                let invitation = self.state.add_invitation(event_id, target)?;
                Ok((invitation, ApplyOutcome::LocalOnly))
            }
            Err(error) => Err(error.into()),
        }
    }

    pub async fn delete_invitation(
        &mut self,
        invitation_id: i64,
    ) -> Result<ApplyOutcome, SyncError> {
        let _token = self.begin(ActionKey::DeleteInvitation(invitation_id))?;

        if !self
            .state
            .invitations()
            .iter()
            .any(|i| i.id == invitation_id)
        {
            return Err(
                PlanningError::NotFound(format!("Invitation {}", invitation_id)).into(),
            );
        }

        match self.api.delete_invitation(invitation_id).await {
            Ok(()) => {
                self.state.delete_invitation(invitation_id)?;
                Ok(ApplyOutcome::Synced)
            }
            Err(error) if self.applies_locally(&error) => {
                tracing::warn!(
                    "Delete invitation {} unreachable ({}); removing locally",
                    invitation_id,
                    error
                );
                self.state.delete_invitation(invitation_id)?;
                Ok(ApplyOutcome::LocalOnly)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Fetches an event's invitations and mirrors them; falls back to the
    /// mirror when the server is unreachable.
    pub async fn load_invitations(
        &mut self,
        event_id: i64,
    ) -> Result<Vec<InvitationView>, SyncError> {
        match self.api.list_invitations(event_id).await {
            Ok(records) => {
                let entries = records
                    .into_iter()
                    .map(|r| (r.invitation, r.association))
                    .collect();
                self.state.replace_event_invitations(event_id, entries);
            }
            Err(error) if error.is_transport() => {
                tracing::warn!(
                    "List invitations for event {} unreachable ({}); serving the mirror",
                    event_id,
                    error
                );
            }
            Err(error) => return Err(error.into()),
        }
        Ok(self.state.invitations_for_event(event_id))
    }

    // --- associations ---

    pub async fn create_association(
        &mut self,
        name: &str,
        description: Option<&str>,
    ) -> Result<(i64, ApplyOutcome), SyncError> {
        let _token = self.begin(ActionKey::CreateAssociation)?;

        match self.api.create_association(name, description).await {
            Ok(id) => {
                self.state.upsert_association(crate::planning::Association {
                    id,
                    name: name.to_string(),
                    email: None,
                    description: description.map(str::to_string),
                });
                Ok((id, ApplyOutcome::Synced))
            }
            Err(error) if self.applies_locally(&error) => {
                tracing::warn!(
                    "Create association unreachable ({}); keeping it local",
                    error
                );
                let id = self.state.add_local_association(name, description).id;
                Ok((id, ApplyOutcome::LocalOnly))
            }
            Err(error) => Err(error.into()),
        }
    }

    pub async fn edit_association(
        &mut self,
        association_id: i64,
        name: &str,
        description: Option<&str>,
    ) -> Result<ApplyOutcome, SyncError> {
        let _token = self.begin(ActionKey::EditAssociation(association_id))?;

        match self
            .api
            .edit_association(association_id, name, description)
            .await
        {
            Ok(()) => {
                self.state
                    .update_association(association_id, name, description);
                Ok(ApplyOutcome::Synced)
            }
            Err(error) if self.applies_locally(&error) => {
                tracing::warn!(
                    "Edit association {} unreachable ({}); keeping it local",
                    association_id,
                    error
                );
                self.state
                    .update_association(association_id, name, description);
                Ok(ApplyOutcome::LocalOnly)
            }
            Err(error) => Err(error.into()),
        }
    }

    pub async fn delete_association(
        &mut self,
        association_id: i64,
    ) -> Result<ApplyOutcome, SyncError> {
        let _token = self.begin(ActionKey::DeleteAssociation(association_id))?;

        match self.api.delete_association(association_id).await {
            Ok(()) => {
                self.state.remove_association(association_id);
                Ok(ApplyOutcome::Synced)
            }
            Err(error) if self.applies_locally(&error) => {
                tracing::warn!(
                    "Delete association {} unreachable ({}); removing locally",
                    association_id,
                    error
                );
                self.state.remove_association(association_id);
                Ok(ApplyOutcome::LocalOnly)
            }
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planning::{Association, ColorStrategy, Event, InvitationStatus};
    use crate::storage::config::{ServerConfig, SyncConfig, UiConfig};
    use crate::sync::planning_api::{CreatedEvent, InvitationRecord, MockPlanningApi};
    use chrono::NaiveDate;
    use mockall::predicate::eq;

    fn config(consistency: ConsistencyPolicy) -> Config {
        Config {
            server: ServerConfig {
                base_url: "http://localhost:8000".to_string(),
            },
            sync: SyncConfig {
                consistency,
                offline_mode: false,
            },
            ui: UiConfig {
                date_format: "%Y-%m-%d".to_string(),
                color_strategy: ColorStrategy::RoundRobin,
            },
        }
    }

    fn draft() -> EventDraft {
        let start = NaiveDate::from_ymd_opt(2025, 11, 5)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        EventDraft::new("Meeting", start, start + chrono::Duration::hours(1))
    }

    fn event(id: i64, title: &str) -> Event {
        let start = NaiveDate::from_ymd_opt(2025, 11, 5)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        Event {
            id,
            title: title.to_string(),
            description: None,
            start,
            end: start + chrono::Duration::hours(1),
            color: "#8B5CF6".to_string(),
        }
    }

    /// A real transport error: nothing listens on port 1.
    async fn transport_error() -> ApiError {
        let error = reqwest::Client::new()
            .get("http://127.0.0.1:1/")
            .send()
            .await
            .expect_err("connection should be refused");
        ApiError::HttpError(error)
    }

    #[tokio::test]
    async fn create_event_applies_server_id_and_color() {
        let mut api = MockPlanningApi::new();
        api.expect_create_event().times(1).returning(|_| {
            Ok(CreatedEvent {
                id: 42,
                color: "#10B981".to_string(),
            })
        });

        let mut engine = SyncEngine::new(config(ConsistencyPolicy::OptimisticLocal), api);
        let (id, outcome) = engine.create_event(draft()).await.unwrap();

        assert_eq!(id, 42);
        assert_eq!(outcome, ApplyOutcome::Synced);
        let stored = engine.state().find_event(42).unwrap();
        assert_eq!(stored.color, "#10B981");
    }

    #[tokio::test]
    async fn optimistic_policy_keeps_the_event_locally_on_transport_failure() {
        let error = transport_error().await;
        let mut api = MockPlanningApi::new();
        api.expect_create_event()
            .times(1)
            .return_once(move |_| Err(error));

        let mut engine = SyncEngine::new(config(ConsistencyPolicy::OptimisticLocal), api);
        let (id, outcome) = engine.create_event(draft()).await.unwrap();

        assert_eq!(outcome, ApplyOutcome::LocalOnly);
        assert!(id < 0);
        let stored = engine.state().find_event(id).unwrap();
        assert!(stored.is_local_only());
        assert!(!stored.color.is_empty());
    }

    #[tokio::test]
    async fn strict_policy_propagates_transport_failures_untouched() {
        let error = transport_error().await;
        let mut api = MockPlanningApi::new();
        api.expect_create_event()
            .times(1)
            .return_once(move |_| Err(error));

        let mut engine = SyncEngine::new(config(ConsistencyPolicy::StrictServer), api);
        let result = engine.create_event(draft()).await;

        assert!(matches!(result, Err(SyncError::Api(e)) if e.is_transport()));
        assert!(engine.state().events().is_empty());
    }

    #[tokio::test]
    async fn server_rejections_never_fall_back_to_local_state() {
        let mut api = MockPlanningApi::new();
        api.expect_create_event()
            .times(1)
            .returning(|_| Err(ApiError::InvalidInput("title is required".to_string())));

        let mut engine = SyncEngine::new(config(ConsistencyPolicy::OptimisticLocal), api);
        let result = engine.create_event(draft()).await;

        assert!(matches!(result, Err(SyncError::Api(ApiError::InvalidInput(_)))));
        assert!(engine.state().events().is_empty());
    }

    #[tokio::test]
    async fn duplicate_invitation_conflicts_without_touching_the_server() {
        let mut api = MockPlanningApi::new();
        api.expect_add_invitation()
            .with(eq(1), eq(InviteTarget::Association(5)))
            .times(1)
            .returning(|_, _| {
                Ok(InvitationRecord {
                    invitation: Invitation::pending(31, 1, 5),
                    association: Association::new(5, "Chess Club"),
                })
            });

        let mut engine = SyncEngine::new(config(ConsistencyPolicy::OptimisticLocal), api);
        engine.state_mut().add_event(1, draft());
        engine
            .state_mut()
            .add_association(Association::new(5, "Chess Club"));

        let (first, outcome) = engine
            .add_invitation(1, InviteTarget::Association(5))
            .await
            .unwrap();
        assert_eq!(first.id, 31);
        assert_eq!(outcome, ApplyOutcome::Synced);

        let second = engine.add_invitation(1, InviteTarget::Association(5)).await;
        assert!(matches!(
            second,
            Err(SyncError::Planning(PlanningError::Conflict(_)))
        ));
        assert_eq!(engine.state().invitations_for_event(1).len(), 1);
    }

    #[tokio::test]
    async fn offline_email_invitations_reuse_the_auto_created_association() {
        let mut api = MockPlanningApi::new();
        let mut errors = Vec::new();
        errors.push(transport_error().await);
        errors.push(transport_error().await);
        api.expect_add_invitation()
            .times(2)
            .returning(move |_, _| Err(errors.pop().expect("one error per call")));

        let mut engine = SyncEngine::new(config(ConsistencyPolicy::OptimisticLocal), api);
        engine.state_mut().add_event(1, draft());
        engine.state_mut().add_event(2, draft());

        let (first, outcome) = engine
            .add_invitation(1, InviteTarget::Email("contact@asso.fr".to_string()))
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::LocalOnly);

        let (second, _) = engine
            .add_invitation(2, InviteTarget::Email("contact@asso.fr".to_string()))
            .await
            .unwrap();

        assert_eq!(engine.state().associations().len(), 1);
        assert_eq!(first.association_id, second.association_id);
        assert_eq!(first.status, InvitationStatus::Pending);
    }

    #[tokio::test]
    async fn delete_invitation_requires_a_known_id() {
        let mut api = MockPlanningApi::new();
        api.expect_delete_invitation().never();

        let mut engine = SyncEngine::new(config(ConsistencyPolicy::OptimisticLocal), api);
        let result = engine.delete_invitation(9).await;

        assert!(matches!(
            result,
            Err(SyncError::Planning(PlanningError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn a_pending_action_blocks_its_double_submit() {
        let mut api = MockPlanningApi::new();
        api.expect_create_event().never();

        let registry = InFlightRegistry::new();
        let _held = registry.begin(ActionKey::CreateEvent).unwrap();

        let mut engine = SyncEngine::new(config(ConsistencyPolicy::OptimisticLocal), api)
            .with_registry(registry);
        let result = engine.create_event(draft()).await;

        assert!(matches!(
            result,
            Err(SyncError::InFlight(ActionKey::CreateEvent))
        ));
    }

    #[tokio::test]
    async fn actions_release_their_key_on_completion() {
        let mut api = MockPlanningApi::new();
        api.expect_delete_event()
            .with(eq(4))
            .times(2)
            .returning(|_| Ok(()));

        let mut engine = SyncEngine::new(config(ConsistencyPolicy::OptimisticLocal), api);
        engine.state_mut().add_event(4, draft());

        engine.delete_event(4).await.unwrap();
        // The same action can run again once the first call finished.
        engine.delete_event(4).await.unwrap();
    }

    #[tokio::test]
    async fn refresh_replaces_the_mirror() {
        let mut api = MockPlanningApi::new();
        api.expect_list_events()
            .times(1)
            .returning(|| Ok(vec![event(1, "Meeting"), event(2, "Workshop")]));
        api.expect_list_associations()
            .times(1)
            .returning(|| Ok(vec![Association::new(5, "Chess Club")]));

        let mut engine = SyncEngine::new(config(ConsistencyPolicy::OptimisticLocal), api);
        engine.state_mut().add_local_event(draft());

        engine.refresh().await.unwrap();

        assert_eq!(engine.state().events().len(), 2);
        assert_eq!(engine.state().associations().len(), 1);
        assert!(engine.state().find_event(-1).is_none());
    }

    #[tokio::test]
    async fn load_invitations_serves_the_mirror_when_unreachable() {
        let error = transport_error().await;
        let mut api = MockPlanningApi::new();
        api.expect_list_invitations()
            .with(eq(1))
            .times(1)
            .return_once(move |_| Err(error));

        let mut engine = SyncEngine::new(config(ConsistencyPolicy::OptimisticLocal), api);
        engine.state_mut().add_event(1, draft());
        engine
            .state_mut()
            .add_association(Association::new(5, "Chess Club"));
        engine
            .state_mut()
            .add_invitation(1, InviteTarget::Association(5))
            .unwrap();

        let views = engine.load_invitations(1).await.unwrap();

        assert_eq!(views.len(), 1);
        assert_eq!(views[0].association_name, "Chess Club");
    }

    #[tokio::test]
    async fn update_event_mirrors_the_patch_after_server_ack() {
        let mut api = MockPlanningApi::new();
        api.expect_update_event()
            .with(eq(1), mockall::predicate::always())
            .times(1)
            .returning(|_, _| Ok(()));

        let mut engine = SyncEngine::new(config(ConsistencyPolicy::OptimisticLocal), api);
        engine.state_mut().add_event(1, draft());

        let patch = EventPatch {
            title: "Moved".to_string(),
            description: None,
            start: draft().start,
            end: draft().end,
        };
        let outcome = engine.update_event(1, patch).await.unwrap();

        assert_eq!(outcome, ApplyOutcome::Synced);
        assert_eq!(engine.state().find_event(1).unwrap().title, "Moved");
    }
}
