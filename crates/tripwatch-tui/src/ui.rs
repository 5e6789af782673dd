//! Rendering. Every frame is drawn from the `App` alone.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Line as CanvasLine, Points},
        Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table, TableState,
    },
    Frame,
};
use tripwatch::route::{MarkerKind, RouteColor};
use tripwatch::{StatusTone, SyncPhase, TripDetail, TripStatus};

use crate::app::{App, Mode};

const LOADING: &str = "Loading trips…";

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // Header
            Constraint::Length(12), // Traffic chart
            Constraint::Min(8),     // Trips (and detail)
            Constraint::Length(1),  // Status line
        ])
        .split(f.size());

    draw_header(f, chunks[0], app);
    draw_chart(f, chunks[1], app);

    match app.detail() {
        Some(detail) => {
            let body = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
                .split(chunks[2]);
            draw_trips(f, body[0], app);
            draw_detail(f, body[1], &detail);
        }
        None => draw_trips(f, chunks[2], app),
    }

    draw_status_line(f, chunks[3], app);
}

fn tone_color(tone: StatusTone) -> Color {
    match tone {
        StatusTone::Success => Color::Green,
        StatusTone::Danger => Color::Red,
        StatusTone::Warning => Color::Yellow,
    }
}

fn route_color(color: RouteColor) -> Color {
    match color {
        RouteColor::Blue => Color::Blue,
        RouteColor::Green => Color::Green,
        RouteColor::Red => Color::Red,
    }
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let state = &app.state;
    let phase = match state.phase() {
        SyncPhase::Fetching => Span::styled("⟳ syncing", Style::default().fg(Color::Cyan)),
        SyncPhase::Idle => Span::styled("● live", Style::default().fg(Color::Green)),
        SyncPhase::Stopped => Span::styled("■ stopped", Style::default().fg(Color::DarkGray)),
    };

    let mut spans = vec![
        Span::styled("Tripwatch", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        phase,
        Span::raw(format!(
            "  {} trips, {} shown",
            state.trips().len(),
            state.filtered().len()
        )),
    ];
    if !state.term().is_empty() {
        spans.push(Span::raw(format!("  filter: \"{}\"", state.term())));
    }
    if let Some(date) = state.date() {
        spans.push(Span::raw(format!("  date: {date}")));
    }
    if let Some(error) = state.last_error() {
        spans.push(Span::styled(
            format!("  last refresh failed: {error}"),
            Style::default().fg(Color::Red),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn draw_chart(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Trips by hour ");

    if app.state.loading() {
        f.render_widget(Paragraph::new(LOADING).block(block), area);
        return;
    }

    let buckets = app.state.chart(app.chart_source);
    let points: Vec<(TripStatus, Vec<(f64, f64)>)> = TripStatus::ALL
        .iter()
        .map(|status| {
            let series = buckets
                .series(*status)
                .iter()
                .map(|slot| (f64::from(slot.hour), f64::from(slot.count)))
                .collect();
            (*status, series)
        })
        .collect();

    let datasets: Vec<Dataset> = points
        .iter()
        .map(|(status, data)| {
            Dataset::default()
                .name(format!("{} Trips", status.label()))
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(tone_color(status.tone())))
                .data(data)
        })
        .collect();

    let peak = f64::from(buckets.peak().max(1));
    let chart = Chart::new(datasets)
        .block(block)
        .hidden_legend_constraints((Constraint::Ratio(1, 3), Constraint::Ratio(1, 1)))
        .x_axis(
            Axis::default()
                .bounds([0.0, 23.0])
                .labels(["0h", "6h", "12h", "18h", "23h"].into_iter().map(Span::raw).collect()),
        )
        .y_axis(
            Axis::default()
                .bounds([0.0, peak])
                .labels(vec![Span::raw("0"), Span::raw(format!("{peak}"))]),
        );
    f.render_widget(chart, area);
}

fn draw_trips(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default().borders(Borders::ALL).title(" Trips ");

    if app.state.loading() {
        f.render_widget(Paragraph::new(LOADING).block(block), area);
        return;
    }

    let rows: Vec<Row> = app
        .state
        .rows()
        .into_iter()
        .map(|row| {
            Row::new(vec![
                Cell::from(row.driver_name),
                Cell::from(row.vehicle_id),
                Cell::from(row.status.label()).style(Style::default().fg(tone_color(row.tone))),
                Cell::from(row.started),
                Cell::from(row.ended),
                Cell::from(row.duration),
            ])
        })
        .collect();

    if rows.is_empty() {
        f.render_widget(Paragraph::new("No trips match").block(block), area);
        return;
    }

    let widths = [
        Constraint::Length(16),
        Constraint::Length(12),
        Constraint::Length(10),
        Constraint::Length(12),
        Constraint::Length(12),
        Constraint::Min(8),
    ];
    let header = Row::new(vec!["Driver", "Vehicle", "Status", "Start", "End", "Duration"])
        .style(Style::default().add_modifier(Modifier::BOLD));
    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("▶ ");

    let mut state = TableState::default();
    state.select(Some(app.selected));
    f.render_stateful_widget(table, area, &mut state);
}

fn draw_detail(f: &mut Frame, area: Rect, detail: &TripDetail) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(9), Constraint::Min(5)])
        .split(area);

    let field = |name: &'static str, value: String| {
        Line::from(vec![
            Span::styled(format!("{name:<11}"), Style::default().fg(Color::DarkGray)),
            Span::raw(value),
        ])
    };
    let lines = vec![
        field("Driver", detail.driver_name.clone()),
        field("Vehicle", detail.vehicle_id.clone()),
        Line::from(vec![
            Span::styled(format!("{:<11}", "Status"), Style::default().fg(Color::DarkGray)),
            Span::styled(
                detail.status.label(),
                Style::default().fg(tone_color(detail.status.tone())),
            ),
        ]),
        field("Started", format!("{} {}", detail.started.date, detail.started.time)),
        field("Ended", format!("{} {}", detail.ended.date, detail.ended.time)),
        field("Duration", detail.duration.clone()),
        field("Last speed", detail.last_speed_label()),
    ];
    let attributes = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" Trip {} ", detail.id)),
    );
    f.render_widget(attributes, chunks[0]);

    draw_route(f, chunks[1], detail);
}

fn draw_route(f: &mut Frame, area: Rect, detail: &TripDetail) {
    let block = Block::default().borders(Borders::ALL).title(" Route ");
    let route = &detail.route;

    let Some(bounds) = route.bounds().map(|b| b.padded(0.1)) else {
        f.render_widget(Paragraph::new("No GPS samples yet").block(block), area);
        return;
    };

    let trail: Vec<(f64, f64)> = route
        .markers
        .iter()
        .filter(|m| m.kind == MarkerKind::Trail)
        .map(|m| (m.position.lng, m.position.lat))
        .collect();
    let current = route.current_position().map(|c| [(c.lng, c.lat)]);
    let path = route.routed.as_ref().or(route.path.as_ref());

    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .x_bounds([bounds.min_lng, bounds.max_lng])
        .y_bounds([bounds.min_lat, bounds.max_lat])
        .paint(|ctx| {
            if let Some(path) = path {
                for pair in path.points.windows(2) {
                    ctx.draw(&CanvasLine {
                        x1: pair[0].lng,
                        y1: pair[0].lat,
                        x2: pair[1].lng,
                        y2: pair[1].lat,
                        color: route_color(path.color),
                    });
                }
            }
            ctx.layer();
            ctx.draw(&Points {
                coords: &trail,
                color: route_color(RouteColor::Blue),
            });
            if let Some(current) = &current {
                ctx.draw(&Points {
                    coords: current,
                    color: route_color(RouteColor::Green),
                });
            }
        });
    f.render_widget(canvas, area);
}

fn draw_status_line(f: &mut Frame, area: Rect, app: &App) {
    let flash = app.flash();
    let line = if app.mode == Mode::Search {
        Line::from(vec![
            Span::styled("Search: ", Style::default().fg(Color::Cyan)),
            Span::raw(format!("{}█", app.search)),
        ])
    } else if app.mode == Mode::Date && flash.is_none() {
        Line::from(vec![
            Span::styled("Date (YYYY-MM-DD, empty clears): ", Style::default().fg(Color::Cyan)),
            Span::raw(format!("{}█", app.date_input)),
        ])
    } else if let Some(flash) = flash {
        let color = if flash.is_error { Color::Red } else { Color::Green };
        Line::from(Span::styled(flash.text.clone(), Style::default().fg(color)))
    } else if app.detail_open() {
        Line::from("e end trip  esc close  r refresh  q quit")
    } else {
        Line::from("/ search  d date  ↑↓ select  enter details  e end trip  r refresh  q quit")
    };
    f.render_widget(Paragraph::new(line), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::{backend::TestBackend, Terminal};
    use time::macros::datetime;
    use tripwatch::{
        ChartSource, Coordinate, DashboardEvent, DashboardState, Driver, Notice, TimeFormatter,
        Timestamp, Trip, TripQuery,
    };

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn fleet() -> DashboardState {
        let mut moving = Trip::new("trip-1", "drv-1", "KA01AB1234");
        moving.status = TripStatus::Ongoing;
        moving.entry_time = Some(Timestamp(datetime!(2024-10-19 09:15:00 UTC)));
        moving.locations = vec![
            Coordinate::new(12.9716, 77.5946),
            Coordinate::new(12.9750, 77.6000),
            Coordinate::new(12.9800, 77.6100),
        ];
        moving.speed = vec![32.0, 41.5];

        let mut parked = Trip::new("trip-2", "drv-404", "KA02CD5678");
        parked.status = TripStatus::Idle;

        DashboardState::new(TimeFormatter::utc(), TripQuery::default())
            .apply(DashboardEvent::DriversLoaded {
                seq: 1,
                drivers: vec![Driver::new("drv-1", "Asha Rao")],
            })
            .apply(DashboardEvent::SnapshotLoaded {
                seq: 1,
                trips: vec![moving, parked],
            })
    }

    #[test]
    fn first_load_shows_the_placeholder() {
        let app = App::new(DashboardState::default(), ChartSource::Filtered);
        let screen = render(&app);
        assert!(screen.contains(LOADING));
    }

    #[test]
    fn table_lists_trips_with_resolved_drivers() {
        let app = App::new(fleet(), ChartSource::All);
        let screen = render(&app);
        assert!(!screen.contains(LOADING));
        assert!(screen.contains("Asha Rao"));
        assert!(screen.contains("Unknown Driver"));
        assert!(screen.contains("Processing"));
        assert!(screen.contains("9:15:00 AM"));
        assert!(screen.contains("Trips by hour"));
    }

    #[test]
    fn detail_pane_shows_attributes_and_route() {
        let mut app = App::new(fleet(), ChartSource::All);
        app.on_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
        let screen = render(&app);
        assert!(screen.contains("Trip trip-1"));
        assert!(screen.contains("41.5 km/h"));
        assert!(screen.contains("Route"));
        assert!(!screen.contains("No GPS samples yet"));
    }

    #[test]
    fn status_line_shows_search_then_notices() {
        let mut app = App::new(fleet(), ChartSource::All);
        app.on_key(KeyEvent::new(KeyCode::Char('/'), KeyModifiers::NONE));
        app.on_key(KeyEvent::new(KeyCode::Char('k'), KeyModifiers::NONE));
        assert!(render(&app).contains("Search: k"));

        app.on_key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
        app.on_notice(Notice::EndTripFailed {
            id: "trip-2".into(),
            message: "Trip is already completed".into(),
        });
        assert!(render(&app).contains("Could not end trip trip-2"));
    }

    #[test]
    fn date_filter_shows_while_typing_and_in_the_header() {
        let mut app = App::new(fleet(), ChartSource::All);
        app.on_key(KeyEvent::new(KeyCode::Char('d'), KeyModifiers::NONE));
        for c in "2024-10".chars() {
            app.on_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
        }
        assert!(render(&app).contains("Date (YYYY-MM-DD, empty clears): 2024-10"));

        app.state = app.state.clone().apply(DashboardEvent::QueryChanged(
            TripQuery::default().with_date(Some(time::macros::date!(2024-10-19))),
        ));
        let screen = render(&app);
        assert!(screen.contains("date: 2024-10-19"));
        assert!(screen.contains("1 shown"));
    }
}
