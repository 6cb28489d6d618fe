use tracing::{debug, trace, warn};

use crate::domain::{Effect, Message, Reply, Request, Route};
use crate::gateway::GatewayError;
use crate::inputter::Inputter;
use crate::record::Record;
use crate::screen::Load;
use crate::view::{self, ChartBar, ID_FIELD, SortSpec, ViewParams, parse_limit};

const PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Editing {
    Filter,
    Limit,
}

pub struct DashboardScreen {
    pub records: Load<Vec<Record>>,
    pub aggregates: Load<Vec<Record>>,
    pub columns: Vec<String>,
    pub params: ViewParams,
    pub rows: Vec<usize>, // Indices into the loaded records, in display order
    pub filter_input: Inputter,
    pub limit_input: Inputter,
    pub editing: Option<Editing>,
    pub curser_row: usize,
    pub curser_column: usize,
}

fn fetch_error_message(err: &GatewayError) -> String {
    match err {
        GatewayError::Format(_) => String::from("Unexpected data format"),
        _ => String::from("Error fetching data"),
    }
}

impl DashboardScreen {
    pub fn open() -> (Self, Vec<Effect>) {
        let params = ViewParams::new(SortSpec::ascending(ID_FIELD));
        let screen = Self {
            records: Load::Pending,
            aggregates: Load::Pending,
            columns: Vec::new(),
            limit_input: Inputter::with_value(&params.limit.to_string()),
            filter_input: Inputter::default(),
            params,
            rows: Vec::new(),
            editing: None,
            curser_row: 0,
            curser_column: 0,
        };
        let effects = vec![
            Effect::Request(Request::FetchRecords),
            Effect::Request(Request::FetchAggregates),
        ];
        (screen, effects)
    }

    /// The rows currently on display.
    pub fn view(&self) -> Vec<&Record> {
        match &self.records {
            Load::Ready(records) => self.rows.iter().map(|&idx| &records[idx]).collect(),
            _ => Vec::new(),
        }
    }

    pub fn selected(&self) -> Option<&Record> {
        self.view().get(self.curser_row).copied()
    }

    pub fn chart(&self, field: &str) -> Vec<ChartBar> {
        view::chart_series(&self.view(), field)
    }

    fn refresh(&mut self) {
        self.rows = match &self.records {
            Load::Ready(records) => view::project_indices(records, &self.params),
            _ => Vec::new(),
        };
        self.curser_row = self.curser_row.min(self.rows.len().saturating_sub(1));
    }

    pub fn update(&mut self, message: Message) -> Vec<Effect> {
        if let Some(editing) = self.editing {
            if let Message::RawKey(key) = message {
                self.edit(editing, key);
            }
            return Vec::new();
        }

        match message {
            Message::MoveUp => self.move_row(-1),
            Message::MoveDown => self.move_row(1),
            Message::MovePageUp => self.move_row(-(PAGE_SIZE as isize)),
            Message::MovePageDown => self.move_row(PAGE_SIZE as isize),
            Message::MoveBeginning => self.curser_row = 0,
            Message::MoveEnd => self.curser_row = self.rows.len().saturating_sub(1),
            Message::MoveLeft => self.curser_column = self.curser_column.saturating_sub(1),
            Message::MoveRight => {
                if self.curser_column + 1 < self.columns.len() {
                    self.curser_column += 1;
                }
            }
            Message::Sort | Message::Enter => self.sort_current_column(),
            Message::Filter => {
                self.editing = Some(Editing::Filter);
                self.filter_input.set(&self.params.filter);
            }
            Message::TopRecords => {
                self.editing = Some(Editing::Limit);
                self.limit_input.set(&self.params.limit.to_string());
            }
            Message::CopyRow => {
                if let Some(record) = self.selected() {
                    return vec![Effect::Copy(view::csv_row(record, &self.columns))];
                }
            }
            Message::Reload => return vec![Effect::Navigate(Route::Dashboard)],
            Message::GoInsert => return vec![Effect::Navigate(Route::Insert)],
            Message::GoLogin => return vec![Effect::Navigate(Route::Login)],
            _ => (),
        }
        Vec::new()
    }

    fn move_row(&mut self, step: isize) {
        let last = self.rows.len().saturating_sub(1);
        self.curser_row = self.curser_row.saturating_add_signed(step).min(last);
    }

    fn sort_current_column(&mut self) {
        if let Some(field) = self.columns.get(self.curser_column) {
            self.params.sort = self.params.sort.select(field);
            debug!("Sort by {:?}", self.params.sort);
            self.refresh();
        }
    }

    // Filter and limit apply while typing.
    fn edit(&mut self, editing: Editing, key: ratatui::crossterm::event::KeyEvent) {
        match editing {
            Editing::Filter => {
                let result = self.filter_input.read(key);
                self.params.filter = result.input;
                if result.finished {
                    self.editing = None;
                }
            }
            Editing::Limit => {
                let result = self.limit_input.read(key);
                self.params.limit = parse_limit(&result.input);
                if result.finished {
                    self.editing = None;
                    self.limit_input.set(&self.params.limit.to_string());
                }
            }
        }
        self.refresh();
    }

    pub fn on_reply(&mut self, reply: Reply) -> Vec<Effect> {
        match reply {
            Reply::Records(Ok(records)) => {
                debug!("Loaded {} records", records.len());
                self.columns = view::columns(&records);
                self.curser_column = self
                    .columns
                    .iter()
                    .position(|c| *c == self.params.sort.field)
                    .unwrap_or(0);
                self.records = Load::Ready(records);
                self.refresh();
            }
            Reply::Records(Err(e)) => {
                warn!("Fetching records failed: {e}");
                self.records = Load::Failed(fetch_error_message(&e));
                self.refresh();
            }
            Reply::Aggregates(Ok(aggregates)) => {
                debug!("Loaded {} aggregate rows", aggregates.len());
                self.aggregates = Load::Ready(aggregates);
            }
            Reply::Aggregates(Err(e)) => {
                warn!("Fetching aggregates failed: {e}");
                self.aggregates = Load::Failed(fetch_error_message(&e));
            }
            other => trace!("Dashboard ignores {other:?}"),
        }
        Vec::new()
    }
}
