use std::time::Duration;

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Bar, BarChart, BarGroup, Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use crate::domain::AppConfig;
use crate::model::Model;
use crate::screen::dashboard::Editing;
use crate::screen::insert::{BACK_BUTTON, FIELDS, SUBMIT_BUTTON};
use crate::screen::login::LoginFocus;
use crate::screen::{DashboardScreen, InsertScreen, Load, LoginScreen, Screen};
use crate::view::{CHARTS, ChartBar};

pub const CMDLINE_HEIGH: u16 = 1;
pub const CHART_HEIGHT: u16 = 12;
pub const INPUT_HEIGHT: u16 = 3;
pub const AVERAGES_MAX_HEIGHT: u16 = 8;
pub const COLUMN_WIDTH_MARGIN: usize = 2;
pub const LABEL_WIDTH: usize = 26;
const STATUS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct TableUI {
    max_column_width: usize,
    backend: String,
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect::new(
        area.x + (area.width - w) / 2,
        area.y + (area.height - h) / 2,
        w,
        h,
    )
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::new().add_modifier(Modifier::REVERSED)
    } else {
        Style::new()
    }
}

fn button(label: &str, focused: bool) -> Span<'static> {
    Span::styled(format!("[ {label} ]"), focus_style(focused).bold())
}

fn message_line(message: &Option<String>) -> Line<'static> {
    match message {
        Some(m) => Line::from(m.clone()).red(),
        None => Line::default(),
    }
}

fn bar_text(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

impl TableUI {
    pub fn new(cfg: &AppConfig) -> Self {
        Self {
            max_column_width: cfg.max_column_width,
            backend: cfg
                .backend_url
                .host_str()
                .unwrap_or("?")
                .to_string(),
        }
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let area = frame.area();
        let chunks = Layout::vertical([Constraint::Min(0), Constraint::Length(CMDLINE_HEIGH)])
            .split(area);

        match model.screen() {
            Screen::Login(s) => self.draw_login(s, frame, chunks[0]),
            Screen::Dashboard(s) => self.draw_dashboard(s, frame, chunks[0]),
            Screen::Insert(s) => self.draw_insert(s, frame, chunks[0]),
        }
        self.draw_status_line(model, frame, chunks[1]);

        if model.show_popup() {
            self.draw_popup(model.popup_message(), frame, area);
        }
    }

    fn draw_login(&self, screen: &LoginScreen, frame: &mut Frame, area: Rect) {
        let form = centered(area, 50, 11);
        let block = Block::bordered()
            .title(Line::from(" Login ".bold()).centered())
            .border_set(border::THICK);
        let inner = block.inner(form);

        let field = |label: &str, value: String, focused: bool| {
            Line::from(vec![
                Span::raw(format!("{label:<10}")),
                Span::styled(format!("{value:<28}"), focus_style(focused).underlined()),
            ])
        };
        let mut lines = vec![
            Line::default(),
            field(
                "Username",
                screen.username.display(),
                screen.focus == LoginFocus::Username,
            ),
            Line::default(),
            field(
                "Password",
                screen.password.display(),
                screen.focus == LoginFocus::Password,
            ),
            Line::default(),
            Line::from(vec![
                button("Login", screen.focus == LoginFocus::Login),
                Span::raw("  "),
                button("Sign in", screen.focus == LoginFocus::SignIn),
            ]),
            Line::default(),
        ];
        if screen.pending {
            lines.push(Line::from("Waiting for the server ...").yellow());
        } else {
            lines.push(message_line(&screen.message));
        }

        frame.render_widget(
            Paragraph::new(Text::from(lines)).block(block).wrap(Wrap { trim: true }),
            form,
        );

        let input = match screen.focus {
            LoginFocus::Username => Some((&screen.username, 1)),
            LoginFocus::Password => Some((&screen.password, 3)),
            _ => None,
        };
        if let Some((input, row)) = input {
            frame.set_cursor_position(Position::new(
                inner.x + 10 + input.curser_pos() as u16,
                inner.y + row,
            ));
        }
    }

    fn draw_dashboard(&self, screen: &DashboardScreen, frame: &mut Frame, area: Rect) {
        let averages_height = match &screen.aggregates {
            Load::Ready(rows) => (rows.len() as u16 + 3).clamp(4, AVERAGES_MAX_HEIGHT),
            _ => 3,
        };
        let chunks = Layout::vertical([
            Constraint::Length(CHART_HEIGHT),
            Constraint::Length(INPUT_HEIGHT),
            Constraint::Min(5),
            Constraint::Length(averages_height),
        ])
        .split(area);

        self.draw_charts(screen, frame, chunks[0]);
        self.draw_inputs(screen, frame, chunks[1]);
        self.draw_table(screen, frame, chunks[2]);
        self.draw_averages(screen, frame, chunks[3]);
    }

    fn draw_charts(&self, screen: &DashboardScreen, frame: &mut Frame, area: Rect) {
        let areas = Layout::horizontal(vec![Constraint::Ratio(1, CHARTS.len() as u32); CHARTS.len()])
            .split(area);
        for (chart, area) in CHARTS.iter().zip(areas.iter()) {
            let block = Block::bordered().title(format!(" {} ", chart.title));
            match &screen.records {
                Load::Ready(_) => {
                    let series = screen.chart(chart.field);
                    frame.render_widget(Self::bar_chart(&series, *area).block(block), *area);
                }
                Load::Pending => {
                    frame.render_widget(Paragraph::new("Loading ...").block(block), *area)
                }
                Load::Failed(_) => frame.render_widget(block, *area),
            }
        }
    }

    fn bar_chart<'a>(series: &[ChartBar], area: Rect) -> BarChart<'a> {
        let n = series.len().max(1) as u16;
        let bar_width = (area.width.saturating_sub(2) / n).saturating_sub(1).clamp(1, 9);
        let bars: Vec<Bar> = series
            .iter()
            .map(|b| {
                Bar::default()
                    .value(b.value.map(|v| v.max(0.0).round() as u64).unwrap_or(0))
                    .text_value(b.value.map(bar_text).unwrap_or_default())
                    .label(Line::from(b.label.clone()))
            })
            .collect();
        BarChart::default()
            .bar_width(bar_width)
            .bar_gap(1)
            .bar_style(Style::new().cyan())
            .data(BarGroup::default().bars(&bars))
    }

    fn draw_inputs(&self, screen: &DashboardScreen, frame: &mut Frame, area: Rect) {
        let areas = Layout::horizontal([Constraint::Percentage(70), Constraint::Percentage(30)])
            .split(area);
        let editing = screen.editing;

        let input_block = |title: &'static str, active: bool| {
            let block = Block::bordered().title(title);
            if active {
                block.border_style(Style::new().yellow())
            } else {
                block
            }
        };

        let filter_text = if editing == Some(Editing::Filter) {
            screen.filter_input.display()
        } else {
            screen.params.filter.clone()
        };
        frame.render_widget(
            Paragraph::new(filter_text)
                .block(input_block(" Filter (/) ", editing == Some(Editing::Filter))),
            areas[0],
        );
        frame.render_widget(
            Paragraph::new(screen.limit_input.display())
                .block(input_block(" Top Records (n) ", editing == Some(Editing::Limit))),
            areas[1],
        );

        let cursor = match editing {
            Some(Editing::Filter) => Some((areas[0], screen.filter_input.curser_pos())),
            Some(Editing::Limit) => Some((areas[1], screen.limit_input.curser_pos())),
            None => None,
        };
        if let Some((rect, pos)) = cursor {
            frame.set_cursor_position(Position::new(rect.x + 1 + pos as u16, rect.y + 1));
        }
    }

    fn column_width(&self, name: &str, rows: &[&crate::record::Record]) -> u16 {
        let widest = rows
            .iter()
            .map(|r| r.cell(name).chars().count())
            .max()
            .unwrap_or(0);
        let width = widest.max(name.chars().count() + COLUMN_WIDTH_MARGIN);
        width.min(self.max_column_width) as u16
    }

    fn draw_table(&self, screen: &DashboardScreen, frame: &mut Frame, area: Rect) {
        let records = match &screen.records {
            Load::Ready(records) => records,
            Load::Pending => {
                frame.render_widget(
                    Paragraph::new("Loading ...").block(Block::bordered().title(" Students ")),
                    area,
                );
                return;
            }
            Load::Failed(message) => {
                frame.render_widget(
                    Paragraph::new(Line::from(message.clone()).red())
                        .block(Block::bordered().title(" Students ")),
                    area,
                );
                return;
            }
        };

        let view = screen.view();
        let sort = &screen.params.sort;
        let header = Row::new(screen.columns.iter().enumerate().map(|(idx, name)| {
            let marker = if *name == sort.field {
                format!(" {}", sort.direction.marker())
            } else {
                String::new()
            };
            let style = if idx == screen.curser_column {
                Style::new().bold().yellow().underlined()
            } else {
                Style::new().bold()
            };
            Cell::from(format!("{name}{marker}")).style(style)
        }));
        let widths: Vec<Constraint> = screen
            .columns
            .iter()
            .map(|name| Constraint::Length(self.column_width(name, &view)))
            .collect();
        let rows = view.iter().map(|record| {
            Row::new(screen.columns.iter().map(|name| Cell::from(record.cell(name))))
        });

        let title = format!(" Students ({} of {}) ", view.len(), records.len());
        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::bordered().title(title))
            .column_spacing(1)
            .row_highlight_style(Style::new().add_modifier(Modifier::REVERSED));
        let mut state = TableState::default().with_selected(if view.is_empty() {
            None
        } else {
            Some(screen.curser_row)
        });
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_averages(&self, screen: &DashboardScreen, frame: &mut Frame, area: Rect) {
        let block = Block::bordered().title(" Average Scores ");
        match &screen.aggregates {
            Load::Ready(rows) => {
                let rows = rows.iter().map(|r| Row::new(vec![Cell::from(r.to_json())]));
                frame.render_widget(
                    Table::new(rows, [Constraint::Percentage(100)]).block(block),
                    area,
                );
            }
            Load::Pending => frame.render_widget(Paragraph::new("Loading ...").block(block), area),
            Load::Failed(message) => frame.render_widget(
                Paragraph::new(Line::from(message.clone()).red()).block(block),
                area,
            ),
        }
    }

    fn draw_insert(&self, screen: &InsertScreen, frame: &mut Frame, area: Rect) {
        let form = centered(area, 80, FIELDS.len() as u16 + 8);
        let block = Block::bordered()
            .title(Line::from(" Student Data Entry ".bold()).centered())
            .border_set(border::THICK);
        let inner = block.inner(form);

        let mut lines = vec![Line::default()];
        for (idx, (spec, value)) in FIELDS.iter().zip(screen.values.iter()).enumerate() {
            lines.push(Line::from(vec![
                Span::raw(format!("{:<width$}", spec.label, width = LABEL_WIDTH)),
                Span::styled(value.display(spec), focus_style(screen.focus == idx)),
            ]));
        }
        lines.push(Line::default());
        lines.push(Line::from(vec![
            button("Submit", screen.focus == SUBMIT_BUTTON),
            Span::raw("  "),
            button("Back to Dashboard", screen.focus == BACK_BUTTON),
        ]));
        lines.push(Line::default());
        if screen.pending {
            lines.push(Line::from("Waiting for the server ...").yellow());
        } else {
            lines.push(message_line(&screen.message));
        }

        frame.render_widget(Paragraph::new(Text::from(lines)).block(block), form);

        if let Some(crate::screen::insert::FieldValue::Text(input)) = screen.values.get(screen.focus) {
            frame.set_cursor_position(Position::new(
                inner.x + LABEL_WIDTH as u16 + input.curser_pos() as u16,
                inner.y + 1 + screen.focus as u16,
            ));
        }
    }

    fn draw_status_line(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let recent = model.last_status_message_update().elapsed() < STATUS_MESSAGE_TIMEOUT;
        let left = if recent {
            model.status_message().to_string()
        } else {
            match model.screen() {
                Screen::Login(_) => "Tab next · Enter activate · Esc quit · F1 help".to_string(),
                Screen::Dashboard(_) => {
                    "s sort · / filter · n top · i insert · b login · ? help · q quit".to_string()
                }
                Screen::Insert(_) => "Tab next · ←→ change · Enter submit · Esc back".to_string(),
            }
        };
        let right = format!("{:?} @ {}", model.screen().route(), self.backend);
        let chunks = Layout::horizontal([
            Constraint::Min(0),
            Constraint::Length(right.chars().count() as u16 + 1),
        ])
        .split(area);
        frame.render_widget(Paragraph::new(left).dark_gray(), chunks[0]);
        frame.render_widget(Paragraph::new(right).right_aligned().blue(), chunks[1]);
    }

    fn draw_popup(&self, message: &str, frame: &mut Frame, area: Rect) {
        let height = message.lines().count() as u16 + 2;
        let popup = centered(area, 60, height);
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(message)
                .style(Style::new().fg(Color::White))
                .block(
                    Block::bordered()
                        .title(Line::from(" Help ".bold()).centered())
                        .title_bottom(Line::from(" <Esc> close ").centered())
                        .border_set(border::THICK),
                ),
            popup,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Message, Reply, Route};
    use crate::record::Record;
    use ratatui::{Terminal, backend::TestBackend};

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|line| line.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render(model: &Model) -> String {
        let cfg = AppConfig::new("http://localhost:3000").unwrap();
        let mut ui = TableUI::new(&cfg);
        let mut terminal = Terminal::new(TestBackend::new(140, 50)).unwrap();
        terminal.draw(|f| ui.draw(model, f)).unwrap();
        buffer_text(&terminal)
    }

    #[test]
    fn renders_login_form() {
        let model = Model::init();
        let text = render(&model);
        assert!(text.contains("Login"));
        assert!(text.contains("Username"));
        assert!(text.contains("[ Sign in ]"));
    }

    #[test]
    fn renders_dashboard_with_sort_marker_and_averages() {
        let mut model = Model::init();
        model.navigate(Route::Dashboard);
        let ticket = model.ticket();
        let records = vec![
            Record::new().with("StudentID", 1).with("DVRTID", 90),
            Record::new().with("StudentID", 2).with("DVRTID", 70),
        ];
        model.update(Message::Reply(ticket, Reply::Records(Ok(records))));
        model.update(Message::Reply(
            ticket,
            Reply::Aggregates(Ok(vec![Record::new().with("avg", 80)])),
        ));
        let text = render(&model);
        assert!(text.contains("StudentID ▲"));
        assert!(text.contains("Students (2 of 2)"));
        assert!(text.contains(r#"{"avg":80}"#));
        assert!(text.contains("DVRT Score"));
    }

    #[test]
    fn renders_loading_and_errors() {
        let mut model = Model::init();
        model.navigate(Route::Dashboard);
        let ticket = model.ticket();
        assert!(render(&model).contains("Loading ..."));
        model.update(Message::Reply(
            ticket,
            Reply::Records(Err(crate::gateway::GatewayError::Network("x".into()))),
        ));
        assert!(render(&model).contains("Error fetching data"));
    }

    #[test]
    fn renders_insert_form_and_help() {
        let mut model = Model::init();
        model.navigate(Route::Insert);
        let text = render(&model);
        assert!(text.contains("Student Data Entry"));
        assert!(text.contains("Primary terminal leaver"));
        model.update(Message::Help);
        assert!(render(&model).contains("Help"));
    }
}
