use std::io::{Stdout, stdout};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};

use crate::app::{App, InputMode};
use crate::view::{Notice, TodoView};

pub fn run(mut app: App, tick_rate: Duration) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut last_tick = Instant::now();
    let res = loop {
        app.poll();
        if let Err(e) = terminal.draw(|f| draw(f, &app)) {
            break Err(e.into());
        }

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        match poll_key(timeout) {
            Ok(Some(code)) if handle_key(&mut app, code) => break Ok(()),
            Ok(_) => {}
            Err(e) => break Err(e),
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    };

    cleanup_terminal(&mut terminal)?;
    res
}

fn poll_key(timeout: Duration) -> Result<Option<KeyCode>> {
    if event::poll(timeout)?
        && let Event::Key(key) = event::read()?
        && key.kind == KeyEventKind::Press
    {
        return Ok(Some(key.code));
    }
    Ok(None)
}

/// Returns true when the user asked to quit.
fn handle_key(app: &mut App, code: KeyCode) -> bool {
    match app.mode {
        InputMode::Normal => match code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('j') | KeyCode::Down => app.select_next(),
            KeyCode::Char('k') | KeyCode::Up => app.select_previous(),
            KeyCode::Char('a') | KeyCode::Char('n') => app.start_editing(),
            KeyCode::Enter | KeyCode::Char(' ') => app.toggle_selected(),
            KeyCode::Char('d') | KeyCode::Delete => app.delete_selected(),
            KeyCode::Char('r') => app.reload(),
            _ => {}
        },
        InputMode::Editing => match code {
            KeyCode::Esc => app.cancel_editing(),
            KeyCode::Enter => app.add_todo(),
            KeyCode::Backspace => app.pop_char(),
            KeyCode::Char(c) => app.push_char(c),
            _ => {}
        },
    }
    false
}

fn draw(f: &mut ratatui::Frame, app: &App) {
    let size = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(size);

    f.render_widget(render_header(app.view()), chunks[0]);

    let mut list_state = ListState::default();
    if !app.view().todos().is_empty() {
        list_state.select(Some(app.selected));
    }
    let list = render_list(app.view(), app.selected);
    f.render_stateful_widget(list, chunks[1], &mut list_state);

    f.render_widget(render_footer(app), chunks[2]);
}

fn render_header(view: &TodoView) -> Paragraph<'static> {
    let total = view.todos().len();
    let done = view.todos().iter().filter(|t| t.completed).count();
    let summary = format!("Open: {} / All: {}", total.saturating_sub(done), total);
    let mut spans = vec![
        Span::styled("tasklist", Style::default().fg(Color::Cyan)),
        Span::raw("  |  "),
        Span::styled(summary, Style::default().fg(Color::Yellow)),
    ];
    if view.is_loading() {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            "⏳ Loading...",
            Style::default().fg(Color::Magenta),
        ));
    }
    if view.is_adding() {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled("⏳ Adding...", Style::default().fg(Color::Magenta)));
    }
    Paragraph::new(Line::from(spans))
        .block(Block::default().title("Overview").borders(Borders::ALL))
        .wrap(Wrap { trim: true })
}

fn render_list(view: &TodoView, selected: usize) -> List<'_> {
    let items: Vec<ListItem> = view
        .todos()
        .iter()
        .enumerate()
        .map(|(idx, todo)| {
            let symbol = if view.is_in_flight(todo.id) {
                "⏳"
            } else if todo.completed {
                "✔"
            } else {
                "•"
            };
            let mut line = vec![Span::raw(format!(" {symbol} {}", todo.task))];
            if todo.completed {
                line.push(Span::styled("  done", Style::default().fg(Color::Green)));
            }

            let style = if idx == selected {
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD | Modifier::REVERSED)
            } else if todo.completed {
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::CROSSED_OUT)
            } else {
                Style::default()
            };

            ListItem::new(Line::from(line)).style(style)
        })
        .collect();

    List::new(items)
        .block(
            Block::default()
                .title("Todos (j/k move ; a/n add ; Space/Enter toggle ; d delete ; r reload)")
                .borders(Borders::ALL),
        )
        .highlight_symbol("➤ ")
}

fn render_footer(app: &App) -> Paragraph<'_> {
    match app.mode {
        InputMode::Normal => {
            let (msg, style) = match &app.status {
                Some(Notice::Failure(msg)) => (msg.as_str(), Style::default().fg(Color::Red)),
                Some(Notice::Success(msg)) => (msg.as_str(), Style::default().fg(Color::Green)),
                Some(notice) => (notice.text(), Style::default()),
                None => ("q quit ; a add ; r reload", Style::default()),
            };
            Paragraph::new(Span::styled(msg, style))
                .block(Block::default().title("Normal").borders(Borders::ALL))
        }
        InputMode::Editing => {
            let line = Line::from(vec![
                Span::raw("New task: "),
                Span::styled(app.view().draft(), Style::default().fg(Color::Yellow)),
                Span::raw("█"),
            ]);
            Paragraph::new(line).block(
                Block::default()
                    .title("Input (Enter to add / Esc to cancel)")
                    .borders(Borders::ALL),
            )
        }
    }
}

fn cleanup_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
