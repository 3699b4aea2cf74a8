use rusqlite::{Connection, Result as SqliteResult};
use thiserror::Error;

use crate::app::PlannerState;
use crate::planning::{Association, Event, Invitation};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Offline mirror of the three planning tables. Rows hold the full record
/// as JSON next to the columns the loaders scan on; invariants stay
/// enforced in `PlannerState`, never here.
pub struct Cache {
    conn: Connection,
}

impl Cache {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn initialize(&self) -> Result<(), CacheError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY,
                data TEXT NOT NULL,
                start_date TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS associations (
                id INTEGER PRIMARY KEY,
                data TEXT NOT NULL,
                name TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS invitations (
                id INTEGER PRIMARY KEY,
                data TEXT NOT NULL,
                event_id INTEGER NOT NULL,
                association_id INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    pub fn store_event(&self, event: &Event) -> Result<(), CacheError> {
        let data = serde_json::to_string(event)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO events (id, data, start_date) VALUES (?1, ?2, ?3)",
            rusqlite::params![event.id, &data, event.start.date().to_string()],
        )?;
        Ok(())
    }

    pub fn load_event(&self, id: i64) -> Result<Option<Event>, CacheError> {
        let mut stmt = self.conn.prepare("SELECT data FROM events WHERE id = ?1")?;
        let mut rows = stmt.query([id])?;

        if let Some(row) = rows.next()? {
            let data: String = row.get(0)?;
            let event: Event = serde_json::from_str(&data)?;
            Ok(Some(event))
        } else {
            Ok(None)
        }
    }

    pub fn delete_event(&self, id: i64) -> Result<(), CacheError> {
        self.conn
            .execute("DELETE FROM events WHERE id = ?1", [id])?;
        Ok(())
    }

    pub fn store_association(&self, association: &Association) -> Result<(), CacheError> {
        let data = serde_json::to_string(association)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO associations (id, data, name) VALUES (?1, ?2, ?3)",
            rusqlite::params![association.id, &data, &association.name],
        )?;
        Ok(())
    }

    pub fn store_invitation(&self, invitation: &Invitation) -> Result<(), CacheError> {
        let data = serde_json::to_string(invitation)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO invitations (id, data, event_id, association_id)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                invitation.id,
                &data,
                invitation.event_id,
                invitation.association_id,
            ],
        )?;
        Ok(())
    }

    pub fn delete_invitation(&self, id: i64) -> Result<(), CacheError> {
        self.conn
            .execute("DELETE FROM invitations WHERE id = ?1", [id])?;
        Ok(())
    }

    /// Replaces the whole snapshot with the current planner state.
    pub fn store_snapshot(&self, state: &PlannerState) -> Result<(), CacheError> {
        self.conn.execute("DELETE FROM events", [])?;
        self.conn.execute("DELETE FROM associations", [])?;
        self.conn.execute("DELETE FROM invitations", [])?;

        for event in state.events() {
            self.store_event(event)?;
        }
        for association in state.associations() {
            self.store_association(association)?;
        }
        for invitation in state.invitations() {
            self.store_invitation(invitation)?;
        }
        Ok(())
    }

    /// Hydrates the planner state from the last stored snapshot.
    pub fn load_snapshot(&self, state: &mut PlannerState) -> Result<(), CacheError> {
        let events = self.load_all::<Event>("events")?;
        let associations = self.load_all::<Association>("associations")?;
        let invitations = self.load_all::<Invitation>("invitations")?;

        state.replace_all(events, associations, invitations);
        Ok(())
    }

    fn load_all<T: serde::de::DeserializeOwned>(&self, table: &str) -> Result<Vec<T>, CacheError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT data FROM {} ORDER BY rowid", table))?;
        let mut rows = stmt.query([])?;

        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let data: String = row.get(0)?;
            records.push(serde_json::from_str(&data)?);
        }
        Ok(records)
    }

    pub fn table_exists(&self, table_name: &str) -> bool {
        let result: SqliteResult<i32> = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [table_name],
            |row| row.get(0),
        );
        result.unwrap_or(0) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planning::{EventDraft, InviteTarget};
    use chrono::NaiveDate;

    fn create_test_cache() -> Cache {
        let conn = Connection::open_in_memory().unwrap();
        let cache = Cache::new(conn);
        cache.initialize().unwrap();
        cache
    }

    fn create_test_event(id: i64, title: &str) -> Event {
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

    #[test]
    fn creates_database_schema() {
        let conn = Connection::open_in_memory().unwrap();
        let cache = Cache::new(conn);

        cache.initialize().unwrap();

        assert!(cache.table_exists("events"));
        assert!(cache.table_exists("associations"));
        assert!(cache.table_exists("invitations"));
    }

    #[test]
    fn stores_event_in_cache() {
        let cache = create_test_cache();
        let event = create_test_event(1, "Meeting");

        cache.store_event(&event).unwrap();

        let loaded = cache.load_event(event.id).unwrap();
        assert_eq!(loaded, Some(event));
    }

    #[test]
    fn loads_nonexistent_event_returns_none() {
        let cache = create_test_cache();

        let loaded = cache.load_event(99).unwrap();

        assert_eq!(loaded, None);
    }

    #[test]
    fn updates_existing_event() {
        let cache = create_test_cache();
        let mut event = create_test_event(1, "Original");
        cache.store_event(&event).unwrap();

        event.title = "Updated".to_string();
        cache.store_event(&event).unwrap();

        let loaded = cache.load_event(event.id).unwrap().unwrap();
        assert_eq!(loaded.title, "Updated");
    }

    #[test]
    fn deletes_event_from_cache() {
        let cache = create_test_cache();
        let event = create_test_event(1, "To Delete");
        cache.store_event(&event).unwrap();

        cache.delete_event(event.id).unwrap();

        let loaded = cache.load_event(event.id).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn snapshot_round_trips_through_the_cache() {
        let cache = create_test_cache();

        let mut state = PlannerState::new();
        let start = NaiveDate::from_ymd_opt(2025, 11, 5)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        state.add_event(
            1,
            EventDraft::new("Meeting", start, start + chrono::Duration::hours(1)),
        );
        state
            .add_invitation(1, InviteTarget::Email("contact@asso.fr".to_string()))
            .unwrap();
        cache.store_snapshot(&state).unwrap();

        let mut restored = PlannerState::new();
        cache.load_snapshot(&mut restored).unwrap();

        assert_eq!(restored.events(), state.events());
        assert_eq!(restored.associations(), state.associations());
        assert_eq!(restored.invitations(), state.invitations());
    }

    #[test]
    fn store_snapshot_replaces_previous_contents() {
        let cache = create_test_cache();

        let mut state = PlannerState::new();
        state.add_event(
            1,
            EventDraft::new(
                "First",
                NaiveDate::from_ymd_opt(2025, 11, 5)
                    .unwrap()
                    .and_hms_opt(9, 0, 0)
                    .unwrap(),
                NaiveDate::from_ymd_opt(2025, 11, 5)
                    .unwrap()
                    .and_hms_opt(10, 0, 0)
                    .unwrap(),
            ),
        );
        cache.store_snapshot(&state).unwrap();

        state.remove_event(1);
        cache.store_snapshot(&state).unwrap();

        let mut restored = PlannerState::new();
        cache.load_snapshot(&mut restored).unwrap();
        assert!(restored.events().is_empty());
    }
}
