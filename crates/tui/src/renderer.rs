//! Interactive terminal explorer.
//!
//! Render commands are produced for a viewport of one unit per column and
//! two units per row (terminal cells are about twice as tall as wide), then
//! rasterised by hit-testing the centre of every cell.

use std::collections::HashMap;
use std::io::stdout;
use std::time::Duration;

use anyhow::Result;
use callwheel_core::model::{Session, SessionEvent};
use callwheel_core::views::hit_test;
use callwheel_protocol::{Point, RenderCommand, ThemeToken, Viewport};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph, Wrap},
};
use tracing::{debug, info, warn};

/// Viewport units per terminal row.
const ROW_UNITS: f64 = 2.0;

/// Cutoffs offered by the `c` key.
const CUTOFFS: [f64; 4] = [0.0, 0.001, 0.01, 0.05];

fn theme_to_color(token: ThemeToken) -> Color {
    match token {
        ThemeToken::Slice0 => Color::Rgb(49, 130, 189),
        ThemeToken::Slice1 => Color::Rgb(107, 174, 214),
        ThemeToken::Slice2 => Color::Rgb(230, 85, 13),
        ThemeToken::Slice3 => Color::Rgb(253, 141, 60),
        ThemeToken::Slice4 => Color::Rgb(49, 163, 84),
        ThemeToken::Slice5 => Color::Rgb(116, 196, 118),
        ThemeToken::Slice6 => Color::Rgb(117, 107, 177),
        ThemeToken::Slice7 => Color::Rgb(158, 154, 200),
        ThemeToken::HoverHighlight => Color::Magenta,
        ThemeToken::Background => Color::Black,
        ThemeToken::Border => Color::DarkGray,
        ThemeToken::Link => Color::LightRed,
        ThemeToken::TextPrimary => Color::White,
        ThemeToken::TextSecondary => Color::Gray,
        ThemeToken::ErrorBanner => Color::Red,
    }
}

/// One rasterised diagram.
#[derive(Debug, Default)]
struct Canvas {
    cols: u16,
    rows: u16,
    commands: Vec<RenderCommand>,
    /// Node under the centre of each cell, row-major.
    cells: Vec<Option<usize>>,
    colors: HashMap<usize, ThemeToken>,
}

impl Canvas {
    fn draw(session: &Session, cols: u16, rows: u16) -> Self {
        let viewport = Viewport::new(f64::from(cols), f64::from(rows) * ROW_UNITS);
        let commands = session.render(&viewport);
        let cells = rasterize(&commands, cols, rows);
        let colors = commands
            .iter()
            .filter_map(|cmd| match cmd {
                RenderCommand::DrawRect {
                    color,
                    node: Some(node),
                    ..
                }
                | RenderCommand::DrawArc {
                    color,
                    node: Some(node),
                    ..
                } => Some((*node, *color)),
                _ => None,
            })
            .collect();
        Self {
            cols,
            rows,
            commands,
            cells,
            colors,
        }
    }

    fn node_at(&self, col: u16, row: u16) -> Option<usize> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        self.cells[usize::from(row) * usize::from(self.cols) + usize::from(col)]
    }

    /// Drawn nodes in paint order.
    fn nodes(&self) -> Vec<usize> {
        self.commands.iter().filter_map(RenderCommand::node).collect()
    }

    fn paint(&self, area: Rect, buf: &mut Buffer, selected: Option<usize>) {
        for row in 0..self.rows.min(area.height) {
            for col in 0..self.cols.min(area.width) {
                let Some(node) = self.node_at(col, row) else {
                    continue;
                };
                let token = self.colors.get(&node).copied().unwrap_or(ThemeToken::Border);
                let cell = &mut buf[(area.x + col, area.y + row)];
                cell.set_char(' ').set_bg(theme_to_color(token));
                if selected == Some(node) {
                    cell.set_char('░').set_fg(Color::White);
                }
            }
        }

        for cmd in &self.commands {
            match cmd {
                RenderCommand::DrawLine {
                    from, to, color, ..
                } => {
                    for (col, row) in line_cells(*from, *to) {
                        if col < area.width && row < area.height {
                            buf[(area.x + col, area.y + row)]
                                .set_char('·')
                                .set_fg(theme_to_color(*color));
                        }
                    }
                }
                RenderCommand::DrawRect {
                    rect,
                    label: Some(label),
                    ..
                } => {
                    let col = rect.x.max(0.0) as u16;
                    let row = (rect.y / ROW_UNITS).max(0.0) as u16;
                    let width = (rect.w as usize).saturating_sub(1);
                    if rect.h < ROW_UNITS || width < 3 || row >= area.height || col >= area.width {
                        continue;
                    }
                    let available = usize::from(area.width - col).min(width);
                    let text = Style::default().fg(Color::White).add_modifier(Modifier::BOLD);
                    for (i, ch) in label.chars().take(available).enumerate() {
                        buf[(area.x + col + i as u16, area.y + row)]
                            .set_char(ch)
                            .set_style(text);
                    }
                }
                _ => {}
            }
        }
    }
}

/// The node under the centre of every cell of a `cols` × `rows` grid.
fn rasterize(commands: &[RenderCommand], cols: u16, rows: u16) -> Vec<Option<usize>> {
    let mut cells = Vec::with_capacity(usize::from(cols) * usize::from(rows));
    for row in 0..rows {
        for col in 0..cols {
            let point = Point::new(
                f64::from(col) + 0.5,
                (f64::from(row) + 0.5) * ROW_UNITS,
            );
            cells.push(hit_test(commands, point));
        }
    }
    cells
}

/// Cells crossed by a segment given in viewport units.
fn line_cells(from: Point, to: Point) -> Vec<(u16, u16)> {
    let (x0, y0) = (from.x, from.y / ROW_UNITS);
    let (x1, y1) = (to.x, to.y / ROW_UNITS);
    let steps = (x1 - x0).abs().max((y1 - y0).abs()).ceil().max(1.0) as usize;
    let mut cells: Vec<(u16, u16)> = (0..=steps)
        .filter_map(|i| {
            let t = i as f64 / steps as f64;
            let x = x0 + (x1 - x0) * t;
            let y = y0 + (y1 - y0) * t;
            (x >= 0.0 && y >= 0.0).then_some((x as u16, y as u16))
        })
        .collect();
    cells.dedup();
    cells
}

struct App {
    session: Session,
    canvas: Option<Canvas>,
    selected: Option<usize>,
    /// Navigation or settings problem from the last key press.
    notice: Option<String>,
    quit: bool,
}

impl App {
    fn new(session: Session) -> Self {
        Self {
            session,
            canvas: None,
            selected: None,
            notice: None,
            quit: false,
        }
    }

    fn invalidate(&mut self) {
        self.canvas = None;
    }

    fn settle(&mut self, result: Result<Option<SessionEvent>, callwheel_core::SessionError>) {
        match result {
            Ok(event) => {
                self.notice = None;
                if let Some(event) = event {
                    self.applied(&event);
                }
            }
            Err(e) => {
                warn!(error = %e, "action rejected");
                self.notice = Some(e.to_string());
            }
        }
        self.invalidate();
    }

    fn applied(&mut self, event: &SessionEvent) {
        debug!(?event, "session event");
        if matches!(event, SessionEvent::Displayed { .. }) {
            self.selected = None;
            self.session.hover(None);
        }
    }

    fn poll(&mut self) {
        if let Some(event) = self.session.poll() {
            self.applied(&event);
            self.invalidate();
        }
    }

    fn select(&mut self, node: Option<usize>) {
        self.selected = node;
        self.session.hover(node);
        self.invalidate();
    }

    /// Move the selection `step` places through the drawn nodes.
    fn cycle(&mut self, step: isize) {
        let Some(nodes) = self.canvas.as_ref().map(Canvas::nodes) else {
            return;
        };
        if nodes.is_empty() {
            return;
        }
        let len = nodes.len() as isize;
        let next = match self.selected.and_then(|s| nodes.iter().position(|&n| n == s)) {
            Some(at) => (at as isize + step).rem_euclid(len),
            None if step < 0 => len - 1,
            None => 0,
        };
        self.select(Some(nodes[next as usize]));
    }

    fn select_parent(&mut self) {
        let parent = self
            .selected
            .and_then(|s| self.session.flat().and_then(|t| t.get(s)))
            .and_then(|n| n.parent);
        if parent.is_some() {
            self.select(parent);
        }
    }

    fn select_child(&mut self) {
        let drawn = self.canvas.as_ref().map(Canvas::nodes).unwrap_or_default();
        let child = match self.selected {
            Some(s) => self
                .session
                .flat()
                .and_then(|t| t.get(s))
                .and_then(|n| n.children.iter().copied().find(|c| drawn.contains(c))),
            None => drawn.first().copied(),
        };
        if child.is_some() {
            self.select(child);
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.quit = true,
            KeyCode::Esc => {
                if self.session.error().is_some() || self.notice.is_some() {
                    self.session.dismiss_error();
                    self.notice = None;
                } else {
                    self.quit = true;
                }
            }
            KeyCode::Char('r') => {
                let result = self.session.reset();
                self.settle(result);
            }
            KeyCode::Char('s') => {
                let next = self.session.settings().style.next();
                let result = self.session.set_style(next.as_str());
                self.settle(result);
            }
            KeyCode::Char('+' | '=') => {
                let depth = self.session.settings().depth.saturating_add(1);
                let result = self.session.set_depth(depth);
                self.settle(result);
            }
            KeyCode::Char('-') => {
                let depth = self.session.settings().depth.saturating_sub(1).max(1);
                let result = self.session.set_depth(depth);
                self.settle(result);
            }
            KeyCode::Char('c') => {
                let current = self.session.settings().cutoff;
                let at = CUTOFFS.iter().position(|&c| c >= current).unwrap_or(0);
                let next = CUTOFFS[(at + 1) % CUTOFFS.len()];
                let result = self.session.set_cutoff(next);
                self.settle(result);
            }
            KeyCode::Tab | KeyCode::Right => self.cycle(1),
            KeyCode::BackTab | KeyCode::Left => self.cycle(-1),
            KeyCode::Up => self.select_parent(),
            KeyCode::Down => self.select_child(),
            KeyCode::Enter => {
                if let Some(node) = self.selected {
                    let result = self.session.click(node);
                    self.settle(result);
                }
            }
            KeyCode::Backspace | KeyCode::Char('u') => {
                let result = self.session.click(0);
                self.settle(result);
            }
            _ => {}
        }
    }

    fn on_mouse(&mut self, mouse: MouseEvent, diagram: Rect) {
        let inside = mouse.column >= diagram.x
            && mouse.row >= diagram.y
            && mouse.column < diagram.x + diagram.width
            && mouse.row < diagram.y + diagram.height;
        let node = if inside {
            self.canvas
                .as_ref()
                .and_then(|c| c.node_at(mouse.column - diagram.x, mouse.row - diagram.y))
        } else {
            None
        };
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(node) = node {
                    let result = self.session.click(node);
                    self.settle(result);
                }
            }
            MouseEventKind::Moved if node != self.session.hovered() => {
                self.session.hover(node);
                self.invalidate();
            }
            _ => {}
        }
    }

    fn header(&self) -> Line<'static> {
        let settings = self.session.settings();
        let root = self
            .session
            .flat()
            .and_then(|t| t.root())
            .map(|r| r.display_name.to_string())
            .unwrap_or_default();
        let loading = if self.session.is_loading() { " | building…" } else { "" };
        Line::from(format!(
            " callwheel: {root} | {} depth {} cutoff {}{loading} | s style  +/- depth  c cutoff  r reset  q quit ",
            settings.style, settings.depth, settings.cutoff,
        ))
    }

    fn status(&self) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        let stack: Vec<String> = self
            .session
            .stack()
            .listing()
            .into_iter()
            .map(|(i, name)| format!("{i}: {name}"))
            .collect();
        lines.push(Line::from(format!("stack  {}", stack.join("  ‹  "))));

        let focus = self.session.hovered().or(self.selected);
        if let Some(info) = focus.and_then(|n| self.session.info(n)) {
            let location = info
                .location
                .map(|l| format!("  {}{}:{}", l.directory, l.file, l.line))
                .unwrap_or_default();
            lines.push(Line::from(format!(
                "{}  {:.3}s  {:.1}%{location}",
                info.display_name, info.cumulative, info.cumulative_percent,
            )));
        }

        if let Some(message) = self.session.error().or(self.notice.as_deref()) {
            let banner = Style::default()
                .fg(Color::White)
                .bg(theme_to_color(ThemeToken::ErrorBanner));
            lines.push(Line::styled(
                format!("error: {message}  (Esc to dismiss)"),
                banner,
            ));
        }
        lines
    }

    fn draw(&mut self, frame: &mut Frame<'_>) -> Rect {
        let [header, diagram, status] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(4),
        ])
        .areas(frame.area());

        frame.render_widget(
            Paragraph::new(self.header())
                .style(Style::default().fg(Color::White).bg(Color::DarkGray)),
            header,
        );

        let stale = self
            .canvas
            .as_ref()
            .is_none_or(|c| c.cols != diagram.width || c.rows != diagram.height);
        if stale {
            self.canvas = Some(Canvas::draw(&self.session, diagram.width, diagram.height));
        }
        frame.render_widget(
            Block::default().style(Style::default().bg(Color::Black)),
            diagram,
        );
        if let Some(canvas) = &self.canvas {
            canvas.paint(diagram, frame.buffer_mut(), self.selected);
        }

        frame.render_widget(
            Paragraph::new(self.status())
                .block(Block::default().borders(Borders::TOP))
                .wrap(Wrap { trim: true }),
            status,
        );
        diagram
    }
}

pub fn run(mut session: Session) -> Result<()> {
    if session.flat().is_none() {
        session.load()?;
    }

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(session);
    let result = event_loop(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    info!("explorer closed");
    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    let mut diagram = Rect::default();
    while !app.quit {
        app.poll();
        terminal.draw(|frame| diagram = app.draw(frame))?;

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => app.on_key(key),
                Event::Mouse(mouse) => app.on_mouse(mouse, diagram),
                Event::Resize(..) => app.invalidate(),
                _ => {}
            }
        }
    }
    Ok(())
}
