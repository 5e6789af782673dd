//! Dashboard event loop and the key bindings that drive it.
//!
//! Keys:
//! - `/`: edit the search term (`Esc` or `Enter` to leave)
//! - `d`: filter by entry date, typed as `YYYY-MM-DD` (`Enter` applies,
//!   an empty date clears the filter, `Esc` cancels)
//! - `↑`/`↓` or `k`/`j`: move the selection
//! - `Enter`: open the detail pane for the selected trip
//! - `e`: end the selected trip
//! - `r`: refresh now
//! - `Esc`: close the detail pane
//! - `q`: quit

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::macros::format_description;
use time::Date;
use tokio::sync::broadcast::error::TryRecvError;
use tripwatch::{
    ChartSource, DashboardHandle, DashboardState, Notice, RouteBuilder, SyncConfig, SyncEngine,
    TimeFormatter, Trip, TripDetail, TripId, TripService,
};

use crate::ui;

const TICK: Duration = Duration::from_millis(100);

/// How long a notice stays in the status line
const FLASH_TTL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Browse,
    Search,
    Date,
}

/// What a key press asks of the engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Quit,
    Refresh,
    Search(String),
    SetDate(Option<Date>),
    EndTrip(TripId),
}

#[derive(Clone, Debug)]
pub struct Flash {
    pub text: String,
    pub is_error: bool,
    at: Instant,
}

impl Flash {
    fn is_live(&self) -> bool {
        self.at.elapsed() < FLASH_TTL
    }
}

/// Everything the renderer reads. The dashboard state is only ever
/// replaced wholesale with the engine's latest snapshot.
pub struct App {
    pub state: DashboardState,
    pub chart_source: ChartSource,
    pub mode: Mode,
    pub search: String,
    /// Date being typed in [`Mode::Date`]
    pub date_input: String,
    pub selected: usize,
    detail: Option<TripId>,
    flash: Option<Flash>,
    routes: RouteBuilder,
}

impl App {
    pub fn new(state: DashboardState, chart_source: ChartSource) -> Self {
        Self {
            search: state.term().to_string(),
            state,
            chart_source,
            mode: Mode::Browse,
            date_input: String::new(),
            selected: 0,
            detail: None,
            flash: None,
            routes: RouteBuilder::new(),
        }
    }

    /// Take the engine's latest snapshot
    pub fn sync(&mut self, state: DashboardState) {
        self.state = state;
        let rows = self.state.filtered().len();
        self.selected = self.selected.min(rows.saturating_sub(1));
        if let Some(id) = &self.detail {
            if self.state.trip(id).is_none() {
                self.detail = None;
            }
        }
    }

    pub fn selected_trip(&self) -> Option<&Trip> {
        self.state.filtered().get(self.selected)
    }

    /// Detail of the open trip, composed from the current snapshot
    pub fn detail(&self) -> Option<TripDetail> {
        let trip = self.state.trip(self.detail.as_ref()?)?;
        Some(TripDetail::compose(
            trip,
            self.state.drivers(),
            self.state.formatter(),
            &self.routes,
        ))
    }

    pub fn flash(&self) -> Option<&Flash> {
        self.flash.as_ref().filter(|f| f.is_live())
    }

    pub fn on_notice(&mut self, notice: Notice) {
        let is_error = !matches!(notice, Notice::TripEnded { .. });
        self.show(notice.to_string(), is_error);
    }

    fn show(&mut self, text: String, is_error: bool) {
        self.flash = Some(Flash {
            text,
            is_error,
            at: Instant::now(),
        });
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Option<Action> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Action::Quit);
        }

        match self.mode {
            Mode::Search => self.on_search_key(key),
            Mode::Date => self.on_date_key(key),
            Mode::Browse => self.on_browse_key(key),
        }
    }

    fn on_search_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Esc | KeyCode::Enter => {
                self.mode = Mode::Browse;
                None
            }
            KeyCode::Backspace => {
                self.search.pop();
                self.selected = 0;
                Some(Action::Search(self.search.clone()))
            }
            KeyCode::Char(c) => {
                self.search.push(c);
                self.selected = 0;
                Some(Action::Search(self.search.clone()))
            }
            _ => None,
        }
    }

    fn on_date_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Browse;
                None
            }
            KeyCode::Enter => {
                let input = self.date_input.trim();
                if input.is_empty() {
                    self.mode = Mode::Browse;
                    self.selected = 0;
                    return Some(Action::SetDate(None));
                }
                match Date::parse(input, format_description!("[year]-[month]-[day]")) {
                    Ok(date) => {
                        self.mode = Mode::Browse;
                        self.selected = 0;
                        Some(Action::SetDate(Some(date)))
                    }
                    Err(_) => {
                        let text = format!("Not a date: {input} (expected YYYY-MM-DD)");
                        self.show(text, true);
                        None
                    }
                }
            }
            KeyCode::Backspace => {
                self.date_input.pop();
                None
            }
            KeyCode::Char(c) if c.is_ascii_digit() || c == '-' => {
                self.date_input.push(c);
                None
            }
            _ => None,
        }
    }

    fn on_browse_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('/') => {
                self.mode = Mode::Search;
                self.search = self.state.term().to_string();
                None
            }
            KeyCode::Char('d') => {
                self.mode = Mode::Date;
                self.date_input = self.state.date().map(|d| d.to_string()).unwrap_or_default();
                None
            }
            KeyCode::Char('r') => Some(Action::Refresh),
            KeyCode::Char('e') => {
                let id = match &self.detail {
                    Some(id) => id.clone(),
                    None => self.selected_trip()?.id.clone(),
                };
                Some(Action::EndTrip(id))
            }
            KeyCode::Enter => {
                self.detail = self.selected_trip().map(|t| t.id.clone());
                None
            }
            KeyCode::Esc => {
                self.detail = None;
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let last = self.state.filtered().len().saturating_sub(1);
                self.selected = (self.selected + 1).min(last);
                None
            }
            _ => None,
        }
    }

    pub fn detail_open(&self) -> bool {
        self.detail.is_some()
    }
}

pub async fn run(
    service: Arc<dyn TripService>,
    config: SyncConfig,
    fmt: TimeFormatter,
) -> anyhow::Result<()> {
    let chart_source = config.chart_source;
    let dashboard = SyncEngine::new(service, config).with_formatter(fmt).spawn();
    tracing::info!("🚗 Dashboard started");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = event_loop(&mut terminal, &dashboard, chart_source);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    dashboard.shutdown().await;
    tracing::info!("👋 Dashboard stopped");
    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    dashboard: &DashboardHandle,
    chart_source: ChartSource,
) -> anyhow::Result<()> {
    let mut app = App::new(dashboard.snapshot(), chart_source);
    let mut state = dashboard.subscribe();
    let mut notices = dashboard.notices();

    loop {
        match state.has_changed() {
            Ok(true) => app.sync(state.borrow_and_update().clone()),
            Ok(false) => {}
            Err(_) => return Ok(()),
        }
        loop {
            match notices.try_recv() {
                Ok(notice) => app.on_notice(notice),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "status line fell behind on notices");
                }
                Err(_) => break,
            }
        }

        terminal.draw(|f| ui::draw(f, &app))?;

        // Blocks this worker for at most one tick; the engine runs elsewhere
        if !event::poll(TICK)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match app.on_key(key) {
            Some(Action::Quit) => return Ok(()),
            Some(Action::Refresh) => dashboard.refresh(),
            Some(Action::Search(term)) => dashboard.set_term(term),
            Some(Action::SetDate(date)) => dashboard.set_date(date),
            Some(Action::EndTrip(id)) => {
                tracing::info!(trip_id = %id, "ending trip");
                dashboard.end_trip(id);
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};
    use tripwatch::{DashboardEvent, Timestamp, TripQuery, TripStatus};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn trip(id: &str, vehicle: &str) -> Trip {
        let mut t = Trip::new(id, "d1", vehicle);
        t.status = TripStatus::Ongoing;
        t.entry_time = Some(Timestamp(datetime!(2024-10-19 09:15:00 UTC)));
        t
    }

    fn loaded(trips: Vec<Trip>) -> DashboardState {
        DashboardState::new(TimeFormatter::utc(), TripQuery::default())
            .apply(DashboardEvent::SnapshotLoaded { seq: 1, trips })
    }

    fn app() -> App {
        App::new(
            loaded(vec![trip("t1", "KA01"), trip("t2", "KA02"), trip("t3", "KA03")]),
            ChartSource::Filtered,
        )
    }

    #[test]
    fn typing_in_search_emits_the_whole_term() {
        let mut app = app();
        assert_eq!(app.on_key(key(KeyCode::Char('/'))), None);
        assert_eq!(app.mode, Mode::Search);

        assert_eq!(app.on_key(key(KeyCode::Char('k'))), Some(Action::Search("k".into())));
        assert_eq!(app.on_key(key(KeyCode::Char('a'))), Some(Action::Search("ka".into())));
        assert_eq!(app.on_key(key(KeyCode::Backspace)), Some(Action::Search("k".into())));

        // `q` is text while searching
        assert_eq!(app.on_key(key(KeyCode::Char('q'))), Some(Action::Search("kq".into())));

        assert_eq!(app.on_key(key(KeyCode::Esc)), None);
        assert_eq!(app.mode, Mode::Browse);
        assert_eq!(app.on_key(key(KeyCode::Char('q'))), Some(Action::Quit));
    }

    #[test]
    fn selection_stays_within_the_filtered_view() {
        let mut app = app();
        app.on_key(key(KeyCode::Up));
        assert_eq!(app.selected, 0);
        for _ in 0..10 {
            app.on_key(key(KeyCode::Down));
        }
        assert_eq!(app.selected, 2);

        app.sync(loaded(vec![trip("t1", "KA01")]));
        assert_eq!(app.selected, 0);
        assert_eq!(app.selected_trip().map(|t| t.id.as_str()), Some("t1"));
    }

    #[test]
    fn end_trip_targets_the_open_detail_or_the_selection() {
        let mut app = app();
        app.on_key(key(KeyCode::Down));
        assert_eq!(app.on_key(key(KeyCode::Char('e'))), Some(Action::EndTrip("t2".into())));

        app.on_key(key(KeyCode::Enter));
        assert!(app.detail_open());
        app.on_key(key(KeyCode::Up));
        assert_eq!(app.on_key(key(KeyCode::Char('e'))), Some(Action::EndTrip("t2".into())));

        app.on_key(key(KeyCode::Esc));
        assert!(!app.detail_open());
    }

    #[test]
    fn end_trip_needs_a_row() {
        let mut app = App::new(loaded(Vec::new()), ChartSource::All);
        assert_eq!(app.on_key(key(KeyCode::Char('e'))), None);
        app.on_key(key(KeyCode::Enter));
        assert!(!app.detail_open());
    }

    #[test]
    fn detail_follows_snapshots_and_closes_when_the_trip_vanishes() {
        let mut app = app();
        app.on_key(key(KeyCode::Enter));
        let detail = app.detail().unwrap();
        assert_eq!(detail.id.as_str(), "t1");
        assert_eq!(detail.driver_name, "Unknown Driver");

        app.sync(loaded(vec![trip("t9", "KA09")]));
        assert!(app.detail().is_none());
        assert!(!app.detail_open());
    }

    #[test]
    fn notices_flash_in_the_status_line() {
        let mut app = app();
        assert!(app.flash().is_none());

        app.on_notice(Notice::TripEnded { id: "t1".into() });
        let flash = app.flash().unwrap();
        assert!(!flash.is_error);
        assert!(flash.text.contains("t1"));

        app.on_notice(Notice::RefreshFailed {
            message: "boom".into(),
        });
        assert!(app.flash().unwrap().is_error);
    }

    fn type_date(app: &mut App, text: &str) {
        for c in text.chars() {
            app.on_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn date_mode_applies_clears_and_cancels() {
        let mut app = app();
        assert_eq!(app.on_key(key(KeyCode::Char('d'))), None);
        assert_eq!(app.mode, Mode::Date);

        // Letters are not part of a date
        type_date(&mut app, "2024-1x0-19");
        assert_eq!(app.date_input, "2024-10-19");
        assert_eq!(
            app.on_key(key(KeyCode::Enter)),
            Some(Action::SetDate(Some(date!(2024-10-19))))
        );
        assert_eq!(app.mode, Mode::Browse);

        // Reopening starts from the active filter
        let filtered = app.state.clone().apply(DashboardEvent::QueryChanged(
            TripQuery::default().with_date(Some(date!(2024-10-19))),
        ));
        app.sync(filtered);
        app.on_key(key(KeyCode::Char('d')));
        assert_eq!(app.date_input, "2024-10-19");
        for _ in 0..10 {
            app.on_key(key(KeyCode::Backspace));
        }
        assert_eq!(app.on_key(key(KeyCode::Enter)), Some(Action::SetDate(None)));

        app.on_key(key(KeyCode::Char('d')));
        type_date(&mut app, "2024-01-01");
        assert_eq!(app.on_key(key(KeyCode::Esc)), None);
        assert_eq!(app.mode, Mode::Browse);
    }

    #[test]
    fn malformed_date_stays_in_date_mode() {
        let mut app = app();
        app.on_key(key(KeyCode::Char('d')));
        type_date(&mut app, "2024-13-40");
        assert_eq!(app.on_key(key(KeyCode::Enter)), None);
        assert_eq!(app.mode, Mode::Date);
        let flash = app.flash().unwrap();
        assert!(flash.is_error);
        assert!(flash.text.contains("YYYY-MM-DD"));
    }

    #[test]
    fn ctrl_c_quits_from_any_mode() {
        let mut app = app();
        app.on_key(key(KeyCode::Char('/')));
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(app.on_key(ctrl_c), Some(Action::Quit));
    }
}
