use crate::app::{App, FormField, Mode, TaskForm};
use crate::notification::Severity;
use crate::task::{Priority, Status, Task};
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;

pub fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| render(f, app))?;

        // Poll so notifications can expire between key presses
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }
        app.tick();

        if app.should_quit {
            return Ok(());
        }
    }
}

pub fn render(f: &mut Frame, app: &App) {
    let [header, board, footer] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(5),
        Constraint::Length(1),
    ])
    .areas(f.area());

    render_header(f, app, header);
    render_board(f, app, board);
    render_footer(f, app, footer);

    match &app.mode {
        Mode::Form(form) => render_form(f, form),
        Mode::ConfirmDelete { title, .. } => render_confirm(f, title),
        Mode::Board | Mode::Dragging { .. } => {}
    }

    if let Some(notification) = app.notifier.current() {
        render_notification(f, &notification.message, notification.severity);
    }
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let stats = app.store.stats();
    let mut spans = vec![
        Span::styled(" Total ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            stats.total.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ];
    for status in Status::ALL {
        spans.push(Span::styled(
            format!("   {} ", status.label()),
            Style::default().fg(Color::DarkGray),
        ));
        spans.push(Span::styled(
            stats.count(status).to_string(),
            Style::default()
                .fg(status_color(status))
                .add_modifier(Modifier::BOLD),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .title(" Task Board ")
            .borders(Borders::ALL),
    );
    f.render_widget(header, area);
}

fn render_board(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![Constraint::Percentage(25); Status::ALL.len()])
        .split(area);

    let drop_target = match app.mode {
        Mode::Dragging { target, .. } => Some(target),
        _ => None,
    };
    let dragged = match app.mode {
        Mode::Dragging { id, .. } => Some(id),
        _ => None,
    };

    let board = app.store.list();
    for (i, (status, tasks)) in board.iter().enumerate() {
        let border_style = if drop_target == Some(status) {
            Style::default().fg(Color::Yellow)
        } else if drop_target.is_none() && app.column == status {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };
        let block = Block::default()
            .title(format!(" {} ({}) ", status.label(), tasks.len()))
            .borders(Borders::ALL)
            .border_style(border_style);

        if tasks.is_empty() {
            let empty = Paragraph::new(status.empty_text())
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center)
                .block(block);
            f.render_widget(empty, chunks[i]);
            continue;
        }

        let items: Vec<ListItem> = tasks
            .iter()
            .map(|t| task_card(t, dragged == Some(t.id)))
            .collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

        let mut state = ListState::default();
        if app.column == status && drop_target.is_none() {
            state.select(Some(app.row));
        }
        f.render_stateful_widget(list, chunks[i], &mut state);
    }
}

fn task_card(task: &Task, dragging: bool) -> ListItem<'static> {
    let title_style = if dragging {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD | Modifier::ITALIC)
    } else {
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
    };
    let description_style = if task.description.trim().is_empty() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };

    let mut header = vec![
        Span::raw(format!("[#{}] ", task.id)),
        Span::styled(task.title.clone(), title_style),
    ];
    if !task.category.is_empty() {
        header.push(Span::styled(
            format!("  {}", task.category),
            Style::default().fg(Color::Magenta),
        ));
    }

    ListItem::new(vec![
        Line::from(header),
        Line::from(Span::styled(
            task.display_description().to_string(),
            description_style,
        )),
        Line::from(vec![
            Span::styled(
                task.priority.label(),
                Style::default().fg(priority_color(task.priority)),
            ),
            Span::styled(
                format!("  {}", task.created_on()),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        Line::from(""),
    ])
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let hint = match app.mode {
        Mode::Board => {
            "a add  e edit  space pick up  </> move  d delete  ←→↑↓ select  q quit"
        }
        Mode::Dragging { .. } => "←→ choose column  space/enter drop  esc cancel",
        Mode::Form(_) => "tab next field  ←→ change  enter save  esc cancel",
        Mode::ConfirmDelete { .. } => "y delete  any other key cancel",
    };
    f.render_widget(
        Paragraph::new(hint).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}

fn render_form(f: &mut Frame, form: &TaskForm) {
    let fields = form.fields();
    let area = centered(f.area(), 60, fields.len() as u16 + 4);
    f.render_widget(Clear, area);

    let title = if form.editing.is_some() {
        " Edit Task "
    } else {
        " New Task "
    };
    let block = Block::default()
        .title(title)
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let mut lines = vec![Line::from("")];
    for field in fields {
        let (label, value) = match field {
            FormField::Title => ("Title", form.title.clone()),
            FormField::Description => ("Description", form.description.clone()),
            FormField::Category => ("Category", form.category.clone()),
            FormField::Priority => ("Priority", format!("‹ {} ›", form.priority.label())),
            FormField::Status => ("Status", format!("‹ {} ›", form.status.label())),
        };
        let focused = form.focus == *field;
        let mut spans = vec![
            Span::styled(
                format!("{} {:<12}", if focused { "›" } else { " " }, label),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled(value, Style::default().fg(Color::White)),
        ];
        if focused && !matches!(field, FormField::Priority | FormField::Status) {
            spans.push(Span::styled("█", Style::default().fg(Color::Cyan)));
        }
        lines.push(Line::from(spans));
    }

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_confirm(f: &mut Frame, title: &str) {
    let area = centered(f.area(), 50, 6);
    f.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from("Are you sure you want to delete this task?"),
        Line::from(Span::styled(
            title.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
    ];
    let dialog = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .title(" Delete ")
            .title_alignment(Alignment::Center)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red)),
    );
    f.render_widget(dialog, area);
}

fn render_notification(f: &mut Frame, message: &str, severity: Severity) {
    let area = f.area();
    let text = format!("{} {}", severity.icon(), message);
    let width = (text.chars().count() as u16 + 4).min(area.width.saturating_sub(2));
    let height = 3;
    if area.height < height + 2 {
        return;
    }
    let rect = Rect::new(
        area.width.saturating_sub(width) / 2,
        area.height - height - 1,
        width,
        height,
    );
    f.render_widget(Clear, rect);

    let color = match severity {
        Severity::Info => Color::Blue,
        Severity::Success => Color::Green,
        Severity::Error => Color::Red,
    };
    let toast = Paragraph::new(text)
        .alignment(Alignment::Center)
        .style(Style::default().add_modifier(Modifier::BOLD))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        );
    f.render_widget(toast, rect);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height);
    Rect::new(
        area.x + area.width.saturating_sub(width) / 2,
        area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    )
}

fn status_color(status: Status) -> Color {
    match status {
        Status::Todo => Color::Blue,
        Status::InProgress => Color::Yellow,
        Status::Review => Color::Magenta,
        Status::Done => Color::Green,
    }
}

fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::Low => Color::Green,
        Priority::Medium => Color::Yellow,
        Priority::High => Color::Red,
    }
}
