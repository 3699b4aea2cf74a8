use chrono::{Datelike, Local, Months, NaiveDate};

use crate::planning::{
    Association, ColorPicker, ColorStrategy, Event, EventDraft, EventPatch, Invitation,
    InvitationStatus, InviteTarget, PlanningError,
};

/// Denormalized invitation row for display and picker filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct InvitationView {
    pub id: i64,
    pub status: InvitationStatus,
    pub association_id: i64,
    pub association_name: String,
}

/// Outcome of the pure pre-insert checks for an invitation: the target
/// resolved to an existing association, or an association still to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedInvite {
    Existing(i64),
    AutoCreate(String),
}

/// In-memory mirror of the planning data for one session: the event store,
/// the association list and the invitation manager, owned by whoever drives
/// the UI and passed by reference to rendering and sync code.
pub struct PlannerState {
    pub viewed_month: NaiveDate,
    events: Vec<Event>,
    associations: Vec<Association>,
    invitations: Vec<Invitation>,
    color_picker: ColorPicker,
    local_id_seq: i64,
}

impl PlannerState {
    pub fn new() -> Self {
        let today = Local::now().date_naive();
        Self {
            viewed_month: first_of_month(today),
            events: Vec::new(),
            associations: Vec::new(),
            invitations: Vec::new(),
            color_picker: ColorPicker::default(),
            local_id_seq: 0,
        }
    }

    pub fn with_color_strategy(mut self, strategy: ColorStrategy) -> Self {
        self.color_picker = ColorPicker::new(strategy);
        self
    }

    /// Drops all mirrored records. Called when navigating away from the
    /// planning view or before re-hydrating from the server or the cache.
    pub fn reset(&mut self) {
        self.events.clear();
        self.associations.clear();
        self.invitations.clear();
        self.local_id_seq = 0;
    }

    /// Replaces the whole mirror in one step (server refresh, cache load).
    pub fn replace_all(
        &mut self,
        events: Vec<Event>,
        associations: Vec<Association>,
        invitations: Vec<Invitation>,
    ) {
        self.reset();
        self.events = events;
        self.associations = associations;
        self.invitations = invitations;
    }

    fn next_local_id(&mut self) -> i64 {
        self.local_id_seq -= 1;
        self.local_id_seq
    }

    // --- events ---

    /// Stores an event under the given id, assigning a palette color when
    /// the draft carries none, and returns the stored record.
    pub fn add_event(&mut self, id: i64, draft: EventDraft) -> &Event {
        let color = match draft.color {
            Some(color) => color,
            None => self.color_picker.pick(id),
        };
        self.events.push(Event {
            id,
            title: draft.title,
            description: draft.description,
            start: draft.start,
            end: draft.end,
            color,
        });
        self.events.last().expect("event just pushed")
    }

    /// Stores an event that never reached the server, under a provisional
    /// negative id.
    pub fn add_local_event(&mut self, draft: EventDraft) -> &Event {
        let id = self.next_local_id();
        self.add_event(id, draft)
    }

    /// Replaces title, time range and description in place. Silent no-op
    /// when the id is unknown.
    pub fn update_event(&mut self, id: i64, patch: &EventPatch) {
        if let Some(event) = self.events.iter_mut().find(|e| e.id == id) {
            patch.apply_to(event);
        }
    }

    /// Filters the event out by id, along with its invitations. No-op when
    /// absent.
    pub fn remove_event(&mut self, id: i64) {
        self.events.retain(|e| e.id != id);
        self.invitations.retain(|i| i.event_id != id);
    }

    pub fn find_event(&self, id: i64) -> Option<&Event> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn events_on_day(&self, date: NaiveDate) -> Vec<&Event> {
        self.events.iter().filter(|e| e.starts_on(date)).collect()
    }

    pub fn has_events_on_day(&self, date: NaiveDate) -> bool {
        self.events.iter().any(|e| e.starts_on(date))
    }

    // --- associations ---

    pub fn add_association(&mut self, association: Association) -> &Association {
        self.associations.push(association);
        self.associations.last().expect("association just pushed")
    }

    /// Stores an association that never reached the server, under a
    /// provisional negative id.
    pub fn add_local_association(
        &mut self,
        name: &str,
        description: Option<&str>,
    ) -> &Association {
        let id = self.next_local_id();
        self.associations.push(Association {
            id,
            name: name.to_string(),
            email: None,
            description: description.map(str::to_string),
        });
        self.associations.last().expect("association just pushed")
    }

    /// Inserts or replaces by id; used when applying server payloads.
    pub fn upsert_association(&mut self, association: Association) {
        match self.associations.iter_mut().find(|a| a.id == association.id) {
            Some(existing) => *existing = association,
            None => self.associations.push(association),
        }
    }

    pub fn update_association(&mut self, id: i64, name: &str, description: Option<&str>) {
        if let Some(association) = self.associations.iter_mut().find(|a| a.id == id) {
            association.name = name.to_string();
            association.description = description.map(str::to_string);
        }
    }

    /// Removes the association and any invitations pointing at it.
    pub fn remove_association(&mut self, id: i64) {
        self.associations.retain(|a| a.id != id);
        self.invitations.retain(|i| i.association_id != id);
    }

    pub fn find_association(&self, id: i64) -> Option<&Association> {
        self.associations.iter().find(|a| a.id == id)
    }

    /// Exact name lookup; email invitations resolve through the name column.
    pub fn association_named(&self, name: &str) -> Option<&Association> {
        self.associations.iter().find(|a| a.name == name)
    }

    pub fn associations(&self) -> &[Association] {
        &self.associations
    }

    /// Associations not yet invited to the event, for picker lists.
    pub fn available_associations(&self, event_id: i64) -> Vec<&Association> {
        self.associations
            .iter()
            .filter(|a| !self.is_invited(event_id, a.id))
            .collect()
    }

    // --- invitations ---

    fn is_invited(&self, event_id: i64, association_id: i64) -> bool {
        self.invitations
            .iter()
            .any(|i| i.event_id == event_id && i.association_id == association_id)
    }

    /// Pure pre-insert checks: the event must exist, an association target
    /// must resolve, and the (event, association) pair must be free. Never
    /// mutates, so a failed add leaves no partial state behind.
    pub fn check_invitation(
        &self,
        event_id: i64,
        target: &InviteTarget,
    ) -> Result<ResolvedInvite, PlanningError> {
        if self.find_event(event_id).is_none() {
            return Err(PlanningError::NotFound(format!("Event {}", event_id)));
        }

        let resolved = match target {
            InviteTarget::Association(association_id) => {
                if self.find_association(*association_id).is_none() {
                    return Err(PlanningError::NotFound(format!(
                        "Association {}",
                        association_id
                    )));
                }
                ResolvedInvite::Existing(*association_id)
            }
            InviteTarget::Email(email) => match self.association_named(email) {
                Some(association) => ResolvedInvite::Existing(association.id),
                None => ResolvedInvite::AutoCreate(email.clone()),
            },
        };

        if let ResolvedInvite::Existing(association_id) = &resolved {
            if self.is_invited(event_id, *association_id) {
                return Err(PlanningError::Conflict(format!(
                    "Association {} is already invited to event {}",
                    association_id, event_id
                )));
            }
        }

        Ok(resolved)
    }

    /// Creates a pending invitation, auto-creating the association when the
    /// email matched no existing name. Provisional ids are used for records
    /// the server has not confirmed.
    pub fn add_invitation(
        &mut self,
        event_id: i64,
        target: InviteTarget,
    ) -> Result<Invitation, PlanningError> {
        let resolved = self.check_invitation(event_id, &target)?;

        let association_id = match resolved {
            ResolvedInvite::Existing(id) => id,
            ResolvedInvite::AutoCreate(email) => {
                let id = self.next_local_id();
                self.associations.push(Association::auto_created(id, &email));
                id
            }
        };

        let invitation = Invitation::pending(self.next_local_id(), event_id, association_id);
        self.invitations.push(invitation.clone());
        Ok(invitation)
    }

    /// Inserts or replaces a server-confirmed invitation by id.
    pub fn upsert_invitation(&mut self, invitation: Invitation) {
        match self.invitations.iter_mut().find(|i| i.id == invitation.id) {
            Some(existing) => *existing = invitation,
            None => self.invitations.push(invitation),
        }
    }

    pub fn delete_invitation(&mut self, id: i64) -> Result<Invitation, PlanningError> {
        let position = self
            .invitations
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| PlanningError::NotFound(format!("Invitation {}", id)))?;
        Ok(self.invitations.remove(position))
    }

    /// Replaces the mirrored invitations of one event with a server listing.
    pub fn replace_event_invitations(
        &mut self,
        event_id: i64,
        entries: Vec<(Invitation, Association)>,
    ) {
        self.invitations.retain(|i| i.event_id != event_id);
        for (invitation, association) in entries {
            self.upsert_association(association);
            self.invitations.push(invitation);
        }
    }

    pub fn invitations(&self) -> &[Invitation] {
        &self.invitations
    }

    pub fn invitations_for_event(&self, event_id: i64) -> Vec<InvitationView> {
        self.invitations
            .iter()
            .filter(|i| i.event_id == event_id)
            .map(|i| InvitationView {
                id: i.id,
                status: i.status,
                association_id: i.association_id,
                association_name: self
                    .find_association(i.association_id)
                    .map(|a| a.name.clone())
                    .unwrap_or_default(),
            })
            .collect()
    }

    // --- month navigation ---

    pub fn previous_month(&mut self) {
        if let Some(date) = self.viewed_month.checked_sub_months(Months::new(1)) {
            self.viewed_month = date;
        }
    }

    pub fn next_month(&mut self) {
        if let Some(date) = self.viewed_month.checked_add_months(Months::new(1)) {
            self.viewed_month = date;
        }
    }
}

impl Default for PlannerState {
    fn default() -> Self {
        Self::new()
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}
