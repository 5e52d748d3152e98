use std::fs::{self, OpenOptions};
use std::io;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table};
use tracing_subscriber::EnvFilter;

use fixture_dash::color::{CellColor, Rgb, cell_color};
use fixture_dash::config::{
    NEXT5_INTENSITY, STRENGTH_INTENSITY, app_cache_dir, difficulty_palette, strength_palette,
};
use fixture_dash::export::ExportFormat;
use fixture_dash::pivot::FixtureGrid;
use fixture_dash::players::{PlayerGrid, StrengthMetric, soi_bar, soi_tier};
use fixture_dash::state::{AppState, Screen};

struct App {
    state: AppState,
    should_quit: bool,
}

impl App {
    fn new() -> Self {
        Self {
            state: AppState::new(),
            should_quit: false,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        let state = &mut self.state;
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Tab => state.cycle_screen(),
            KeyCode::Char('c') => state.cycle_competition(),
            KeyCode::Char('p') => state.cycle_position(),
            KeyCode::Char('P') => state.toggle_cohesion_position(),
            KeyCode::Char('m') => state.toggle_metric(),
            KeyCode::Char(',') => state.shift_gw_start(-1),
            KeyCode::Char('.') => state.shift_gw_start(1),
            KeyCode::Char('<') => state.shift_gw_end(-1),
            KeyCode::Char('>') => state.shift_gw_end(1),
            KeyCode::Char('t') => state.cycle_team(true),
            KeyCode::Char('T') => state.cycle_team(false),
            KeyCode::Char('+') | KeyCode::Char('=') => state.adjust_min_both_play(true),
            KeyCode::Char('-') => state.adjust_min_both_play(false),
            KeyCode::Char('j') | KeyCode::Down => state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => state.select_prev(),
            KeyCode::Char('h') | KeyCode::Left => state.select_col_prev(),
            KeyCode::Char('l') | KeyCode::Right => state.select_col_next(),
            KeyCode::Char('f') => state.toggle_restrict_to_partners(),
            KeyCode::Char('e') => state.export_and_log(ExportFormat::Csv),
            KeyCode::Char('x') => state.export_and_log(ExportFormat::Xlsx),
            KeyCode::Char('r') => state.reload(),
            KeyCode::Char('?') => state.help_overlay = !state.help_overlay,
            KeyCode::Esc => state.help_overlay = false,
            _ => {}
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let Some(dir) = app_cache_dir() else {
        return;
    };
    if fs::create_dir_all(&dir).is_err() {
        return;
    }
    let Ok(file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("fixture_dash.log"))
    else {
        return;
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
}

fn main() -> io::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_tracing();

    let mut app = App::new();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            app.on_key(key);
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(4),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(&app.state))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    let state = &app.state;
    if let Some(err) = &state.load_error {
        let msg = Paragraph::new(err.as_str()).style(Style::default().fg(Color::Red));
        frame.render_widget(msg, chunks[1]);
    } else {
        match state.screen {
            Screen::Fixtures => render_fixtures(frame, chunks[1], state),
            Screen::Players => render_players(frame, chunks[1], state),
            Screen::Cohesion => render_cohesion(frame, chunks[1], state),
        }
    }

    let console = Paragraph::new(console_text(state))
        .block(Block::default().title("Console").borders(Borders::TOP))
        .style(Style::default().fg(Color::Gray));
    frame.render_widget(console, chunks[2]);

    let footer = Paragraph::new(footer_text(state));
    frame.render_widget(footer, chunks[3]);

    if state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(state: &AppState) -> String {
    let gws = state.selected_gameweeks();
    let range = match (gws.first(), gws.last()) {
        (Some(a), Some(b)) => format!("GW {a}-{b}"),
        _ => "GW -".to_string(),
    };
    let line1 = format!(
        "FIXTURE DASH | {} | {} | {} | {} | {}",
        state.screen.label(),
        state.current_competition().unwrap_or("-"),
        state.current_position().unwrap_or("-"),
        state.metric.label(),
        range
    );
    let line2 = match state.screen {
        Screen::Fixtures => String::new(),
        Screen::Players => format!(
            "Restrict to partners: {}",
            if state.restrict_to_partners { "on" } else { "off" }
        ),
        Screen::Cohesion => format!(
            "Team: {} | Positions: {} | Min both play: {:.0}%",
            state.primary_team().unwrap_or("-"),
            state.cohesion_positions.join(", "),
            state.min_both_play
        ),
    };
    let line3 = state
        .load_error
        .clone()
        .or_else(|| state.status.clone())
        .unwrap_or_default();
    format!("{line1}\n{line2}\n{line3}")
}

fn footer_text(state: &AppState) -> String {
    match state.screen {
        Screen::Fixtures => {
            let opp = state
                .selected_opponent()
                .map(|o| format!("vs {o} | "))
                .unwrap_or_default();
            format!("{opp}Tab Screen | c Comp | p Pos | m Metric | ,/. </> Range | h/l Cell | e/x Export | ? Help | q Quit")
        }
        Screen::Players => {
            "Tab Screen | c Comp | p Pos | f Partners only | j/k Move | e/x Export | ? Help | q Quit".to_string()
        }
        Screen::Cohesion => {
            "Tab Screen | t/T Team | P Pos set | +/- Min both play | j/k Partner | e/x Export | ? Help | q Quit".to_string()
        }
    }
}

fn to_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

fn cell_style(color: CellColor) -> Style {
    Style::default()
        .bg(to_color(color.background))
        .fg(to_color(color.foreground))
}

fn render_empty(frame: &mut Frame, area: Rect, state: &AppState, fallback: &str) {
    let text = state.empty_message.as_deref().unwrap_or(fallback);
    let empty = Paragraph::new(text).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(empty, area);
}

fn visible_range(selected: usize, total: usize, visible: usize) -> (usize, usize) {
    if total == 0 {
        return (0, 0);
    }
    if total <= visible {
        return (0, total);
    }

    let mut start = selected.saturating_sub(visible / 2);
    if start + visible > total {
        start = total - visible;
    }
    (start, start + visible)
}

fn selected_row_style(selected: bool) -> Style {
    if selected {
        Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED)
    } else {
        Style::default()
    }
}

fn render_fixtures(frame: &mut Frame, area: Rect, state: &AppState) {
    let Some(grid) = state.fixture_grid.as_ref() else {
        render_empty(frame, area, state, "No fixtures loaded");
        return;
    };
    render_fixture_grid(frame, area, state, grid);
}

fn render_fixture_grid(frame: &mut Frame, area: Rect, state: &AppState, grid: &FixtureGrid) {
    let palette = difficulty_palette();
    let center = state.config.difficulty_center;
    let intensity = state.config.color_opacity;

    let mut widths = vec![Constraint::Length(5), Constraint::Length(22)];
    widths.extend(grid.headers.iter().map(|_| Constraint::Length(11)));

    let mut header_cells = vec![Cell::from("Rank"), Cell::from("Team")];
    header_cells.extend(grid.headers.iter().map(|h| Cell::from(h.clone())));
    let header = Row::new(header_cells).style(Style::default().add_modifier(Modifier::BOLD));

    let visible = area.height.saturating_sub(1) as usize;
    let (start, end) = visible_range(state.selected, grid.rows.len(), visible);
    let rows: Vec<Row> = grid.rows[start..end]
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let selected_row = start + i == state.selected;
            let mut cells = vec![
                Cell::from(row.rank.label.clone()).style(selected_row_style(selected_row)),
                Cell::from(row.team.clone()).style(selected_row_style(selected_row)),
            ];
            cells.extend(row.cells.iter().enumerate().map(|(col, cell)| {
                let mut style = cell_style(cell_color(cell.value, center, &palette, intensity));
                if selected_row && col == state.selected_col {
                    style = style.add_modifier(Modifier::REVERSED);
                }
                Cell::from(cell.label.clone()).style(style)
            }));
            Row::new(cells)
        })
        .collect();

    let table = Table::new(rows, widths).header(header).column_spacing(1);
    frame.render_widget(table, area);
}

fn render_players(frame: &mut Frame, area: Rect, state: &AppState) {
    let Some(grid) = state.player_grid.as_ref() else {
        render_empty(frame, area, state, "No player data");
        return;
    };
    if grid.rows.is_empty() {
        render_empty(frame, area, state, "No players match the current filters");
        return;
    }
    render_player_grid(frame, area, state, grid);
}

fn render_player_grid(frame: &mut Frame, area: Rect, state: &AppState, grid: &PlayerGrid) {
    let palette = strength_palette();
    let center = state.config.strength_center;

    let mut widths = vec![Constraint::Length(22), Constraint::Length(18)];
    widths.extend(StrengthMetric::ALL.iter().map(|_| Constraint::Length(10)));
    widths.push(Constraint::Min(26));

    let header = Row::new(PlayerGrid::headers().into_iter().map(Cell::from))
        .style(Style::default().add_modifier(Modifier::BOLD));

    let visible = area.height.saturating_sub(1) as usize;
    let (start, end) = visible_range(state.selected, grid.rows.len(), visible);
    let rows: Vec<Row> = grid.rows[start..end]
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let selected = start + i == state.selected;
            let mut cells = vec![
                Cell::from(row.name.clone()).style(selected_row_style(selected)),
                Cell::from(row.club.clone()).style(selected_row_style(selected)),
            ];
            cells.extend(row.metrics.iter().map(|m| {
                let intensity = if m.metric == StrengthMetric::Next5Diff {
                    NEXT5_INTENSITY
                } else {
                    STRENGTH_INTENSITY
                };
                let color = cell_color(m.strength, center, &palette, intensity);
                Cell::from(m.display_text()).style(cell_style(color))
            }));
            let tier = soi_tier(row.soi).color();
            cells.push(Cell::from(soi_bar(row.soi)).style(Style::default().fg(to_color(tier))));
            Row::new(cells)
        })
        .collect();

    let table = Table::new(rows, widths).header(header).column_spacing(1);
    frame.render_widget(table, area);
}

fn render_cohesion(frame: &mut Frame, area: Rect, state: &AppState) {
    if state.cohesion_rows.is_empty() {
        render_empty(frame, area, state, "No cohesion partners for the current filters");
        return;
    }
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let widths = [
        Constraint::Length(5),
        Constraint::Length(22),
        Constraint::Length(18),
        Constraint::Length(12),
        Constraint::Length(12),
        Constraint::Length(15),
        Constraint::Length(15),
    ];
    let header = Row::new(fixture_dash::cohesion::COHESION_HEADERS.map(Cell::from))
        .style(Style::default().add_modifier(Modifier::BOLD));
    let visible = sections[0].height.saturating_sub(1) as usize;
    let (start, end) = visible_range(state.selected, state.cohesion_rows.len(), visible);
    let rows: Vec<Row> = state.cohesion_rows[start..end]
        .iter()
        .enumerate()
        .map(|(i, row)| {
            Row::new(row.cells().into_iter().map(Cell::from))
                .style(selected_row_style(start + i == state.selected))
        })
        .collect();
    frame.render_widget(
        Table::new(rows, widths).header(header).column_spacing(1),
        sections[0],
    );

    render_matchup(frame, sections[1], state);
}

fn render_matchup(frame: &mut Frame, area: Rect, state: &AppState) {
    let palette = difficulty_palette();
    let center = state.config.difficulty_center;
    let intensity = state.config.color_opacity;
    let partner = state
        .cohesion
        .get(state.selected)
        .map(|c| c.partner.as_str())
        .unwrap_or("-");
    let primary = state.primary_team().unwrap_or("-");

    let widths = [
        Constraint::Length(6),
        Constraint::Length(22),
        Constraint::Length(8),
        Constraint::Length(22),
        Constraint::Length(8),
        Constraint::Length(6),
        Constraint::Min(18),
    ];
    let header = Row::new(vec![
        Cell::from("GW"),
        Cell::from(format!("{primary} opp")),
        Cell::from("Diff"),
        Cell::from(format!("{partner} opp")),
        Cell::from("Diff"),
        Cell::from("Home"),
        Cell::from("Pick"),
    ])
    .style(Style::default().add_modifier(Modifier::BOLD));

    let fmt_diff = |v: Option<f64>| v.map(|d| format!("{d:.1}")).unwrap_or_else(|| "-".to_string());
    let rows: Vec<Row> = state
        .matchup
        .iter()
        .map(|m| {
            Row::new(vec![
                Cell::from(m.gameweek.to_string()),
                Cell::from(format!("{} ({})", m.primary.opponent, m.primary.location)),
                Cell::from(fmt_diff(m.primary.difficulty))
                    .style(cell_style(cell_color(m.primary.difficulty, center, &palette, intensity))),
                Cell::from(format!("{} ({})", m.partner.opponent, m.partner.location)),
                Cell::from(fmt_diff(m.partner.difficulty))
                    .style(cell_style(cell_color(m.partner.difficulty, center, &palette, intensity))),
                Cell::from(if m.both_home { "yes" } else { "" }),
                Cell::from(m.best_choice.clone()),
            ])
        })
        .collect();

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(Block::default().title("Matchup detail").borders(Borders::TOP));
    frame.render_widget(table, area);
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No messages yet".to_string();
    }
    state
        .logs
        .iter()
        .rev()
        .take(3)
        .cloned()
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 70, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Fixture Dash - Help",
        "",
        "Global:",
        "  Tab          Cycle screen",
        "  c            Competition",
        "  p            Position",
        "  m            Mean / median difficulty",
        "  , / .        Move gameweek range start",
        "  < / >        Move gameweek range end",
        "  j/k or ↑/↓   Move selection",
        "  e / x        Export CSV / XLSX",
        "  r            Reload data files",
        "  ?            Toggle help",
        "  q            Quit",
        "",
        "Fixtures:",
        "  h/l or ←/→   Select gameweek cell",
        "",
        "Players:",
        "  f            Only cohesion partners",
        "",
        "Cohesion:",
        "  t / T        Next / previous team",
        "  P            Toggle position in set",
        "  + / -        Min both-play %",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
