//! The task collection: identity, persistence and every mutation

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{Result, StorageError, TaskError};
use crate::storage::Storage;
use crate::task::{Stats, Status, Task, TaskFields};

/// Key the task list lives under unless configured otherwise
pub const DEFAULT_STORAGE_KEY: &str = "tasks";

/// What `open` did with persisted data it could not use
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// The stored bytes were copied to `backup` and the store started empty
    BackedUp { backup: String, reason: String },
    /// The data could not be set aside either, so every write is refused
    ReadOnly { reason: String },
}

impl Recovery {
    /// One-line description for the user
    pub fn message(&self) -> String {
        match self {
            Self::BackedUp { backup, reason } => {
                format!("Saved tasks were unreadable ({reason}); kept a copy as {backup}")
            }
            Self::ReadOnly { reason } => {
                format!("Saved tasks could not be loaded ({reason}); changes will not be saved")
            }
        }
    }
}

pub struct TaskStore {
    tasks: Vec<Task>,
    next_id: u64,
    storage: Box<dyn Storage>,
    key: String,
    recovery: Option<Recovery>,
}

impl TaskStore {
    /// Load the persisted list under `key`, starting empty if it is missing or unreadable.
    ///
    /// Unreadable data is copied to a timestamped `<key>.corrupt-*` entry before
    /// anything can overwrite it. If that copy fails the store stays read-only.
    pub fn open(mut storage: Box<dyn Storage>, key: impl Into<String>) -> Self {
        let key = key.into();

        let reason = match storage.get(&key) {
            Ok(Some(raw)) => match decode(&raw) {
                Ok((tasks, next_id)) => {
                    info!(count = tasks.len(), next_id, "task store opened");
                    return Self {
                        tasks,
                        next_id,
                        storage,
                        key,
                        recovery: None,
                    };
                }
                Err(reason) => {
                    warn!(key = %key, %reason, "persisted tasks are unreadable, starting empty");
                    Some(reason)
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(key = %key, error = %err, "could not read persisted tasks, starting empty");
                Some(err.to_string())
            }
        };

        let recovery = reason.map(|reason| set_aside(storage.as_mut(), &key, reason));
        info!(count = 0, next_id = 1, "task store opened");

        Self {
            tasks: Vec::new(),
            next_id: 1,
            storage,
            key,
            recovery,
        }
    }

    pub fn create(&mut self, fields: TaskFields, status: Status) -> Result<Task> {
        let title = validate_title(&fields.title)?;
        let following = self.next_id.checked_add(1).ok_or(TaskError::IdsExhausted)?;
        let task = Task {
            id: self.next_id,
            title,
            description: fields.description,
            category: fields.category,
            priority: fields.priority,
            status,
            created_at: Utc::now(),
        };

        let mut working = self.tasks.clone();
        working.push(task.clone());
        self.commit(working)?;
        self.next_id = following;

        debug!(id = task.id, status = %task.status, "task created");
        Ok(task)
    }

    /// Replace the editable fields of task `id`, and its status when one is given.
    pub fn update(&mut self, id: u64, fields: TaskFields, status: Option<Status>) -> Result<Task> {
        let title = validate_title(&fields.title)?;
        let mut working = self.tasks.clone();
        let task = find_mut(&mut working, id)?;

        task.title = title;
        task.description = fields.description;
        task.category = fields.category;
        task.priority = fields.priority;
        if let Some(status) = status {
            task.status = status;
        }
        let updated = task.clone();

        self.commit(working)?;
        debug!(id, "task updated");
        Ok(updated)
    }

    pub fn move_to(&mut self, id: u64, status: Status) -> Result<Task> {
        let mut working = self.tasks.clone();
        let task = find_mut(&mut working, id)?;
        task.status = status;
        let moved = task.clone();

        self.commit(working)?;
        debug!(id, status = %status, "task moved");
        Ok(moved)
    }

    /// Remove task `id`. Returns false, without writing, when there was nothing to remove.
    pub fn delete(&mut self, id: u64) -> Result<bool> {
        if !self.tasks.iter().any(|t| t.id == id) {
            return Ok(false);
        }
        let working: Vec<Task> = self.tasks.iter().filter(|t| t.id != id).cloned().collect();
        self.commit(working)?;
        debug!(id, "task deleted");
        Ok(true)
    }

    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Tasks grouped by status, newest first within each column
    pub fn list(&self) -> Board<'_> {
        let mut columns: [Vec<&Task>; 4] = Default::default();
        for task in &self.tasks {
            columns[task.status.index()].push(task);
        }
        for column in &mut columns {
            column.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        }
        Board { columns }
    }

    pub fn stats(&self) -> Stats {
        let mut stats = Stats::default();
        for task in &self.tasks {
            stats.record(task.status);
        }
        stats
    }

    /// Tasks in insertion order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Set when `open` found persisted data it could not load
    pub fn recovery(&self) -> Option<&Recovery> {
        self.recovery.as_ref()
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.recovery, Some(Recovery::ReadOnly { .. }))
    }

    #[cfg(test)]
    pub(crate) fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// Persist `working` and only then make it the in-memory state.
    fn commit(&mut self, working: Vec<Task>) -> Result<()> {
        if let Some(Recovery::ReadOnly { reason }) = &self.recovery {
            return Err(TaskError::ReadOnly {
                reason: reason.clone(),
            });
        }
        let encoded = serde_json::to_string_pretty(&working).map_err(StorageError::from)?;
        if let Err(err) = self.storage.set(&self.key, &encoded) {
            warn!(key = %self.key, error = %err, "failed to persist tasks");
            return Err(err.into());
        }
        self.tasks = working;
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(TaskError::validation("title", "Task title cannot be empty!"));
    }
    Ok(trimmed.to_string())
}

fn find_mut(tasks: &mut [Task], id: u64) -> Result<&mut Task> {
    tasks
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or(TaskError::NotFound { id })
}

/// Copy unreadable data under `key` to a fresh backup entry, then clear `key`.
fn set_aside(storage: &mut dyn Storage, key: &str, reason: String) -> Recovery {
    let backup = format!("{key}.corrupt-{}", Utc::now().format("%Y%m%dT%H%M%S%3f"));
    if let Err(err) = storage.copy(key, &backup) {
        warn!(key = %backup, error = %err, "could not preserve unreadable tasks, refusing writes");
        return Recovery::ReadOnly { reason };
    }
    // The copy is safe, so a later open should not back the same bytes up again
    if let Err(err) = storage.remove(key) {
        warn!(key = %key, error = %err, "could not clear unreadable tasks");
    }
    warn!(key = %backup, "unreadable tasks preserved");
    Recovery::BackedUp { backup, reason }
}

/// Parse persisted tasks, rejecting data that breaks the collection invariants.
///
/// Also returns the next id to hand out.
fn decode(raw: &str) -> std::result::Result<(Vec<Task>, u64), String> {
    let tasks: Vec<Task> = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    let mut seen = HashSet::new();
    for task in &tasks {
        if task.id == 0 {
            return Err("task id 0 is not allowed".to_string());
        }
        if !seen.insert(task.id) {
            return Err(format!("duplicate task id {}", task.id));
        }
        if task.title.trim().is_empty() {
            return Err(format!("task {} has an empty title", task.id));
        }
    }
    let next_id = match tasks.iter().map(|t| t.id).max() {
        None => 1,
        Some(max) => max
            .checked_add(1)
            .ok_or_else(|| format!("task id {max} leaves no id to assign"))?,
    };
    Ok((tasks, next_id))
}

/// Read-only, presentation-ordered view of the store
#[derive(Debug)]
pub struct Board<'a> {
    columns: [Vec<&'a Task>; 4],
}

impl<'a> Board<'a> {
    pub fn column(&self, status: Status) -> &[&'a Task] {
        &self.columns[status.index()]
    }

    /// Columns in board order, paired with their status
    pub fn iter(&self) -> impl Iterator<Item = (Status, &[&'a Task])> + '_ {
        Status::ALL
            .into_iter()
            .map(move |status| (status, self.column(status)))
    }

    /// Every task, column by column
    pub fn tasks(&self) -> impl Iterator<Item = &'a Task> + '_ {
        self.columns.iter().flat_map(|column| column.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::task::Priority;
    use chrono::{Duration, TimeZone};

    fn empty_store() -> TaskStore {
        TaskStore::open(Box::new(MemoryStorage::new()), DEFAULT_STORAGE_KEY)
    }

    fn fields(title: &str) -> TaskFields {
        TaskFields::new(title, "", "work", Priority::Medium)
    }

    fn persisted(store: &TaskStore) -> Vec<Task> {
        let raw = store.storage().get(DEFAULT_STORAGE_KEY).unwrap().unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    fn stored_task(id: u64, status: &str, created_at: &str) -> String {
        format!(
            r#"{{"id":{id},"title":"task {id}","description":"","category":"",
                "priority":"low","status":"{status}","createdAt":"{created_at}"}}"#
        )
    }

    #[test]
    fn test_create_assigns_sequential_ids() {
        let mut store = empty_store();
        let first = store.create(fields("one"), Status::Todo).unwrap();
        let second = store.create(fields("two"), Status::Review).unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(second.status, Status::Review);
        assert_eq!(store.next_id(), 3);
        assert!(store.list().column(Status::Review).iter().any(|t| t.id == 2));
    }

    #[test]
    fn test_create_trims_title_and_persists() {
        let mut store = empty_store();
        let task = store.create(fields("  Buy milk \n"), Status::Todo).unwrap();
        assert_eq!(task.title, "Buy milk");
        assert_eq!(persisted(&store), vec![task]);
    }

    #[test]
    fn test_next_id_follows_max_persisted_id() {
        let raw = format!(
            "[{},{}]",
            stored_task(4, "todo", "2024-01-01T00:00:00Z"),
            stored_task(9, "done", "2024-01-02T00:00:00Z")
        );
        let storage = MemoryStorage::new().with_entry(DEFAULT_STORAGE_KEY, raw);
        let mut store = TaskStore::open(Box::new(storage), DEFAULT_STORAGE_KEY);
        assert_eq!(store.len(), 2);

        let task = store.create(fields("next"), Status::Todo).unwrap();
        assert_eq!(task.id, 10);
    }

    #[test]
    fn test_ids_are_not_reused_after_delete() {
        let mut store = empty_store();
        store.create(fields("one"), Status::Todo).unwrap();
        let two = store.create(fields("two"), Status::Todo).unwrap();
        assert!(store.delete(two.id).unwrap());

        let three = store.create(fields("three"), Status::Todo).unwrap();
        assert_eq!(three.id, 3);
    }

    #[test]
    fn test_blank_title_is_rejected() {
        let mut store = empty_store();
        let task = store.create(fields("keep"), Status::Todo).unwrap();

        for title in ["", "   ", "\t\n"] {
            let err = store.create(fields(title), Status::Todo).unwrap_err();
            assert!(matches!(err, TaskError::Validation { field: "title", .. }));
            let err = store.update(task.id, fields(title), None).unwrap_err();
            assert!(matches!(err, TaskError::Validation { .. }));
        }

        assert_eq!(store.tasks(), &[task.clone()]);
        assert_eq!(persisted(&store), vec![task]);
        assert_eq!(store.next_id(), 2);
    }

    #[test]
    fn test_update_keeps_identity() {
        let mut store = empty_store();
        let original = store.create(fields("draft"), Status::Todo).unwrap();

        let edited = TaskFields::new("final", "details", "home", Priority::High);
        let updated = store.update(original.id, edited, Some(Status::Done)).unwrap();

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.created_at, original.created_at);
        assert_eq!(updated.title, "final");
        assert_eq!(updated.description, "details");
        assert_eq!(updated.category, "home");
        assert_eq!(updated.priority, Priority::High);
        assert_eq!(updated.status, Status::Done);
        assert_eq!(persisted(&store), vec![updated]);
    }

    #[test]
    fn test_update_without_status_leaves_status() {
        let mut store = empty_store();
        let task = store.create(fields("a"), Status::Review).unwrap();
        let updated = store.update(task.id, fields("b"), None).unwrap();
        assert_eq!(updated.status, Status::Review);
    }

    #[test]
    fn test_update_missing_task_is_not_found() {
        let mut store = empty_store();
        let err = store.update(42, fields("x"), None).unwrap_err();
        assert!(err.is_not_found());
        assert!(store.storage().get(DEFAULT_STORAGE_KEY).unwrap().is_none());
    }

    #[test]
    fn test_move_changes_only_status() {
        let mut store = empty_store();
        let task = store
            .create(TaskFields::new("t", "d", "c", Priority::Low), Status::Todo)
            .unwrap();

        let moved = store.move_to(task.id, Status::InProgress).unwrap();
        assert_eq!(
            moved,
            Task {
                status: Status::InProgress,
                ..task
            }
        );
        assert!(store.move_to(99, Status::Done).unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_missing_is_a_noop() {
        let mut store = empty_store();
        let task = store.create(fields("only"), Status::Todo).unwrap();
        let before = store.tasks().to_vec();

        assert!(!store.delete(task.id + 1).unwrap());
        assert_eq!(store.tasks(), before.as_slice());

        assert!(store.delete(task.id).unwrap());
        assert!(store.list().tasks().all(|t| t.id != task.id));
        assert!(persisted(&store).is_empty());
    }

    #[test]
    fn test_list_groups_newest_first() {
        let raw = format!(
            "[{},{},{},{}]",
            stored_task(1, "todo", "2024-01-01T00:00:00Z"),
            stored_task(2, "done", "2024-01-03T00:00:00Z"),
            stored_task(3, "todo", "2024-01-05T00:00:00Z"),
            stored_task(4, "todo", "2024-01-02T00:00:00Z")
        );
        let storage = MemoryStorage::new().with_entry(DEFAULT_STORAGE_KEY, raw);
        let store = TaskStore::open(Box::new(storage), DEFAULT_STORAGE_KEY);

        let board = store.list();
        let todo: Vec<u64> = board.column(Status::Todo).iter().map(|t| t.id).collect();
        assert_eq!(todo, vec![3, 4, 1]);
        assert_eq!(board.column(Status::Done).len(), 1);
        assert!(board.column(Status::Review).is_empty());
        assert_eq!(board.len(), 4);

        // stored order is untouched
        let stored: Vec<u64> = store.tasks().iter().map(|t| t.id).collect();
        assert_eq!(stored, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_list_breaks_timestamp_ties_by_id() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        let tasks: Vec<Task> = (1..=3)
            .map(|id| Task {
                id,
                title: format!("t{id}"),
                description: String::new(),
                category: String::new(),
                priority: Priority::Low,
                status: Status::Todo,
                created_at: if id == 1 { at - Duration::hours(1) } else { at },
            })
            .collect();
        let storage = MemoryStorage::new()
            .with_entry(DEFAULT_STORAGE_KEY, serde_json::to_string(&tasks).unwrap());
        let store = TaskStore::open(Box::new(storage), DEFAULT_STORAGE_KEY);

        let order: Vec<u64> = store.list().column(Status::Todo).iter().map(|t| t.id).collect();
        assert_eq!(order, vec![3, 2, 1]);
    }

    #[test]
    fn test_stats_sum_to_total() {
        let mut store = empty_store();
        let a = store.create(fields("a"), Status::Todo).unwrap();
        let b = store.create(fields("b"), Status::Todo).unwrap();
        store.create(fields("c"), Status::Review).unwrap();
        store.move_to(a.id, Status::Done).unwrap();
        store.delete(b.id).unwrap();
        store.update(a.id, fields("a2"), Some(Status::InProgress)).unwrap();

        let stats = store.stats();
        assert_eq!(stats.total, store.list().len());
        assert_eq!(
            stats.todo + stats.in_progress + stats.review + stats.done,
            stats.total
        );
        assert_eq!(stats.in_progress, 1);
        assert_eq!(stats.review, 1);
        assert_eq!(stats.todo, 0);
    }

    #[test]
    fn test_failed_write_leaves_memory_unchanged() {
        let raw = format!("[{}]", stored_task(1, "todo", "2024-01-01T00:00:00Z"));
        let storage = MemoryStorage::failing().with_entry(DEFAULT_STORAGE_KEY, raw);
        let mut store = TaskStore::open(Box::new(storage), DEFAULT_STORAGE_KEY);
        let before = store.tasks().to_vec();

        assert!(matches!(
            store.create(fields("new"), Status::Todo),
            Err(TaskError::Storage(_))
        ));
        assert!(matches!(
            store.move_to(1, Status::Done),
            Err(TaskError::Storage(_))
        ));
        assert!(matches!(store.delete(1), Err(TaskError::Storage(_))));

        assert_eq!(store.tasks(), before.as_slice());
        assert_eq!(store.next_id(), 2);
    }

    fn backup_key(store: &TaskStore) -> String {
        match store.recovery() {
            Some(Recovery::BackedUp { backup, .. }) => backup.clone(),
            other => panic!("expected a backup, got {other:?}"),
        }
    }

    #[test]
    fn test_unreadable_data_starts_empty_and_is_preserved() {
        for raw in [
            "not json".to_string(),
            r#"[{"id":1}]"#.to_string(),
            format!(
                "[{},{}]",
                stored_task(1, "todo", "2024-01-01T00:00:00Z"),
                stored_task(1, "done", "2024-01-02T00:00:00Z")
            ),
        ] {
            let storage = MemoryStorage::new().with_entry(DEFAULT_STORAGE_KEY, raw.clone());
            let store = TaskStore::open(Box::new(storage), DEFAULT_STORAGE_KEY);
            assert!(store.is_empty());
            assert_eq!(store.next_id(), 1);
            assert!(!store.is_read_only());

            let backup = backup_key(&store);
            assert!(backup.starts_with("tasks.corrupt-"));
            assert_eq!(
                store.storage().get(&backup).unwrap().as_deref(),
                Some(raw.as_str())
            );
            assert!(store.storage().get(DEFAULT_STORAGE_KEY).unwrap().is_none());
        }
    }

    #[test]
    fn test_writes_after_recovery_keep_the_backup() {
        let storage = MemoryStorage::new().with_entry(DEFAULT_STORAGE_KEY, "not json");
        let mut store = TaskStore::open(Box::new(storage), DEFAULT_STORAGE_KEY);
        let backup = backup_key(&store);

        let task = store.create(fields("fresh"), Status::Todo).unwrap();
        assert_eq!(task.id, 1);
        assert_eq!(persisted(&store), vec![task]);
        assert_eq!(
            store.storage().get(&backup).unwrap().as_deref(),
            Some("not json")
        );
    }

    #[test]
    fn test_unreadable_storage_refuses_writes() {
        let storage = MemoryStorage::unreadable().with_entry(DEFAULT_STORAGE_KEY, "[]");
        let mut store = TaskStore::open(Box::new(storage), DEFAULT_STORAGE_KEY);
        assert!(store.is_empty());
        assert!(store.is_read_only());
        assert!(store.recovery().unwrap().message().contains("will not be saved"));

        let err = store.create(fields("new"), Status::Todo).unwrap_err();
        assert!(matches!(err, TaskError::ReadOnly { .. }));
        assert!(store.is_empty());
        assert_eq!(store.next_id(), 1);
    }

    #[test]
    fn test_bad_data_that_cannot_be_backed_up_is_left_alone() {
        let storage = MemoryStorage::failing().with_entry(DEFAULT_STORAGE_KEY, "not json");
        let mut store = TaskStore::open(Box::new(storage), DEFAULT_STORAGE_KEY);
        assert!(store.is_read_only());
        assert!(matches!(
            store.create(fields("new"), Status::Todo),
            Err(TaskError::ReadOnly { .. })
        ));
        assert_eq!(
            store.storage().get(DEFAULT_STORAGE_KEY).unwrap().as_deref(),
            Some("not json")
        );
    }

    #[test]
    fn test_largest_possible_id_is_unreadable() {
        let raw = format!("[{}]", stored_task(u64::MAX, "todo", "2024-01-01T00:00:00Z"));
        let storage = MemoryStorage::new().with_entry(DEFAULT_STORAGE_KEY, raw.clone());
        let store = TaskStore::open(Box::new(storage), DEFAULT_STORAGE_KEY);

        assert!(store.is_empty());
        assert_eq!(store.next_id(), 1);
        let backup = backup_key(&store);
        assert_eq!(store.storage().get(&backup).unwrap(), Some(raw));
    }

    #[test]
    fn test_create_fails_once_ids_run_out() {
        let raw = format!(
            "[{}]",
            stored_task(u64::MAX - 1, "todo", "2024-01-01T00:00:00Z")
        );
        let storage = MemoryStorage::new().with_entry(DEFAULT_STORAGE_KEY, raw);
        let mut store = TaskStore::open(Box::new(storage), DEFAULT_STORAGE_KEY);
        assert_eq!(store.len(), 1);
        assert_eq!(store.next_id(), u64::MAX);
        let before = persisted(&store);

        let err = store.create(fields("one too many"), Status::Todo).unwrap_err();
        assert!(matches!(err, TaskError::IdsExhausted));
        assert_eq!(store.len(), 1);
        assert_eq!(store.next_id(), u64::MAX);
        assert_eq!(persisted(&store), before);

        // existing tasks can still be changed
        assert!(store.move_to(u64::MAX - 1, Status::Done).is_ok());
    }

    #[test]
    fn test_round_trip_preserves_order_and_fields() {
        let mut store = empty_store();
        store
            .create(TaskFields::new("b", "desc", "x", Priority::High), Status::Done)
            .unwrap();
        store.create(fields("a"), Status::Todo).unwrap();
        let raw = store.storage().get(DEFAULT_STORAGE_KEY).unwrap().unwrap();

        let reopened = TaskStore::open(
            Box::new(MemoryStorage::new().with_entry(DEFAULT_STORAGE_KEY, raw)),
            DEFAULT_STORAGE_KEY,
        );
        assert_eq!(reopened.tasks(), store.tasks());
        assert_eq!(reopened.next_id(), store.next_id());
    }
}
