//! Board state and key handling, kept apart from drawing so it can be tested
//! without a terminal.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::debug;

use crate::error::TaskError;
use crate::notification::Notifier;
use crate::task::{Priority, Status, Task, TaskFields};
use crate::task_store::TaskStore;

/// Which form field has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Description,
    Category,
    Priority,
    Status,
}

/// The create/edit form. `editing` is `None` for a new task.
#[derive(Debug, Clone)]
pub struct TaskForm {
    pub editing: Option<u64>,
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: Priority,
    pub status: Status,
    pub focus: FormField,
}

impl TaskForm {
    pub fn create() -> Self {
        Self {
            editing: None,
            title: String::new(),
            description: String::new(),
            category: String::new(),
            priority: Priority::default(),
            status: Status::Todo,
            focus: FormField::Title,
        }
    }

    pub fn edit(task: &Task) -> Self {
        Self {
            editing: Some(task.id),
            title: task.title.clone(),
            description: task.description.clone(),
            category: task.category.clone(),
            priority: task.priority,
            status: task.status,
            focus: FormField::Title,
        }
    }

    /// Fields in tab order; status is only editable on existing tasks
    pub fn fields(&self) -> &'static [FormField] {
        const CREATE: &[FormField] = &[
            FormField::Title,
            FormField::Description,
            FormField::Category,
            FormField::Priority,
        ];
        const EDIT: &[FormField] = &[
            FormField::Title,
            FormField::Description,
            FormField::Category,
            FormField::Priority,
            FormField::Status,
        ];
        if self.editing.is_some() {
            EDIT
        } else {
            CREATE
        }
    }

    fn focus_offset(&mut self, offset: isize) {
        let fields = self.fields();
        let current = fields.iter().position(|f| *f == self.focus).unwrap_or(0) as isize;
        let len = fields.len() as isize;
        self.focus = fields[(current + offset).rem_euclid(len) as usize];
    }

    fn text_mut(&mut self) -> Option<&mut String> {
        match self.focus {
            FormField::Title => Some(&mut self.title),
            FormField::Description => Some(&mut self.description),
            FormField::Category => Some(&mut self.category),
            FormField::Priority | FormField::Status => None,
        }
    }

    fn cycle(&mut self, forward: bool) {
        match self.focus {
            FormField::Priority => {
                self.priority = if forward {
                    self.priority.next()
                } else {
                    self.priority.prev()
                };
            }
            FormField::Status => {
                let index = self.status.index() as isize + if forward { 1 } else { -1 };
                let len = Status::ALL.len() as isize;
                self.status = Status::ALL[index.rem_euclid(len) as usize];
            }
            _ => {}
        }
    }

    pub fn task_fields(&self) -> TaskFields {
        TaskFields::new(
            self.title.clone(),
            self.description.clone(),
            self.category.clone(),
            self.priority,
        )
    }
}

#[derive(Debug, Clone)]
pub enum Mode {
    Board,
    Form(TaskForm),
    /// A card has been picked up and is hovering over `target`
    Dragging { id: u64, target: Status },
    ConfirmDelete { id: u64, title: String },
}

pub struct App<'a> {
    pub store: &'a mut TaskStore,
    pub column: Status,
    pub row: usize,
    pub mode: Mode,
    pub notifier: Notifier,
    pub confirm_delete: bool,
    pub should_quit: bool,
}

impl<'a> App<'a> {
    pub fn new(store: &'a mut TaskStore, mut notifier: Notifier) -> Self {
        if let Some(recovery) = store.recovery() {
            notifier.error(recovery.message());
        }
        Self {
            store,
            column: Status::Todo,
            row: 0,
            mode: Mode::Board,
            notifier,
            confirm_delete: true,
            should_quit: false,
        }
    }

    pub fn with_confirm_delete(mut self, confirm: bool) -> Self {
        self.confirm_delete = confirm;
        self
    }

    pub fn selected_task(&self) -> Option<&Task> {
        self.store.list().column(self.column).get(self.row).copied()
    }

    /// Advance timers between events
    pub fn tick(&mut self) {
        self.notifier.tick();
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        match self.mode {
            Mode::Board => self.handle_board_key(key),
            Mode::Form(_) => self.handle_form_key(key),
            Mode::Dragging { .. } => self.handle_drag_key(key),
            Mode::ConfirmDelete { .. } => self.handle_confirm_key(key),
        }
    }

    fn handle_board_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Left | KeyCode::Char('h') => self.select_column(self.column.prev()),
            KeyCode::Right | KeyCode::Char('l') => self.select_column(self.column.next()),
            KeyCode::Up | KeyCode::Char('k') => self.row = self.row.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                self.row += 1;
                self.clamp_row();
            }
            KeyCode::Char('a') => self.mode = Mode::Form(TaskForm::create()),
            KeyCode::Char('e') | KeyCode::Enter => self.open_edit_form(),
            KeyCode::Char(' ') => self.start_drag(),
            KeyCode::Char('<') => self.shift_selected(self.column.prev()),
            KeyCode::Char('>') => self.shift_selected(self.column.next()),
            KeyCode::Char('d') | KeyCode::Delete => self.request_delete(),
            _ => {}
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Board;
                return;
            }
            KeyCode::Enter => {
                self.submit_form();
                return;
            }
            _ => {}
        }

        let Mode::Form(form) = &mut self.mode else {
            return;
        };
        match key.code {
            KeyCode::Tab | KeyCode::Down => form.focus_offset(1),
            KeyCode::BackTab | KeyCode::Up => form.focus_offset(-1),
            KeyCode::Left => form.cycle(false),
            KeyCode::Right => form.cycle(true),
            KeyCode::Backspace => {
                if let Some(text) = form.text_mut() {
                    text.pop();
                }
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                if let Some(text) = form.text_mut() {
                    text.push(c);
                } else if c == ' ' {
                    form.cycle(true);
                }
            }
            _ => {}
        }
    }

    fn handle_drag_key(&mut self, key: KeyEvent) {
        let Mode::Dragging { id, target } = self.mode.clone() else {
            return;
        };
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => {
                self.mode = Mode::Dragging {
                    id,
                    target: target.prev(),
                }
            }
            KeyCode::Right | KeyCode::Char('l') => {
                self.mode = Mode::Dragging {
                    id,
                    target: target.next(),
                }
            }
            KeyCode::Char(' ') | KeyCode::Enter => {
                self.mode = Mode::Board;
                self.drop_on(id, target);
            }
            KeyCode::Esc => self.mode = Mode::Board,
            _ => {}
        }
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) {
        let Mode::ConfirmDelete { id, .. } = self.mode.clone() else {
            return;
        };
        self.mode = Mode::Board;
        if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
            self.delete(id);
        }
    }

    fn select_column(&mut self, status: Status) {
        self.column = status;
        self.clamp_row();
    }

    fn clamp_row(&mut self) {
        let len = self.store.list().column(self.column).len();
        self.row = self.row.min(len.saturating_sub(1));
    }

    /// Put the cursor on task `id`, wherever it now sits
    fn select_task(&mut self, id: u64) {
        let found = self.store.list().iter().find_map(|(status, tasks)| {
            tasks
                .iter()
                .position(|t| t.id == id)
                .map(|row| (status, row))
        });
        if let Some((status, row)) = found {
            self.column = status;
            self.row = row;
        } else {
            self.clamp_row();
        }
    }

    fn open_edit_form(&mut self) {
        if let Some(task) = self.selected_task() {
            self.mode = Mode::Form(TaskForm::edit(task));
        }
    }

    fn submit_form(&mut self) {
        let Mode::Form(form) = &self.mode else {
            return;
        };
        let form = form.clone();
        let result = match form.editing {
            Some(id) => self
                .store
                .update(id, form.task_fields(), Some(form.status))
                .map(|task| (task, "Task updated successfully!")),
            None => self
                .store
                .create(form.task_fields(), Status::Todo)
                .map(|task| (task, "Task added successfully!")),
        };

        match result {
            Ok((task, message)) => {
                self.mode = Mode::Board;
                self.select_task(task.id);
                self.notifier.success(message);
            }
            // Validation keeps the form open so the user can fix the title
            Err(err @ TaskError::Validation { .. }) => self.report(err),
            Err(err) => {
                self.mode = Mode::Board;
                self.report(err);
            }
        }
    }

    fn start_drag(&mut self) {
        if let Some(task) = self.selected_task() {
            debug!(id = task.id, "drag started");
            self.mode = Mode::Dragging {
                id: task.id,
                target: task.status,
            };
        }
    }

    fn shift_selected(&mut self, target: Status) {
        if let Some(id) = self.selected_task().map(|t| t.id) {
            self.drop_on(id, target);
        }
    }

    fn drop_on(&mut self, id: u64, target: Status) {
        if self.store.get(id).is_some_and(|t| t.status == target) {
            return;
        }
        match self.store.move_to(id, target) {
            Ok(task) => {
                self.select_task(task.id);
                self.notifier
                    .info(format!("Task moved to {}!", target.label()));
            }
            Err(err) => self.report(err),
        }
    }

    fn request_delete(&mut self) {
        let Some((id, title)) = self.selected_task().map(|t| (t.id, t.title.clone())) else {
            return;
        };
        if self.confirm_delete {
            self.mode = Mode::ConfirmDelete { id, title };
        } else {
            self.delete(id);
        }
    }

    fn delete(&mut self, id: u64) {
        match self.store.delete(id) {
            Ok(true) => self.notifier.info("Task deleted successfully!"),
            Ok(false) => {}
            Err(err) => self.report(err),
        }
        self.clamp_row();
    }

    fn report(&mut self, err: TaskError) {
        match err {
            TaskError::Validation { message, .. } => self.notifier.error(message),
            TaskError::NotFound { id } => {
                debug!(id, "task vanished before the action completed");
                self.clamp_row();
            }
            TaskError::Storage(err) => {
                self.notifier.error(format!("Could not save tasks: {err}"))
            }
            other => self.notifier.error(other.to_string()),
        }
    }
}
