use ratatui::crossterm::event::{KeyCode, KeyEvent};
use serde_json::Number;
use tracing::{error, info, warn};

use crate::domain::{Effect, Message, Reply, Request, Route};
use crate::gateway::GatewayError;
use crate::inputter::Inputter;
use crate::record::{Record, Scalar};
use crate::screen::cycle;

pub enum Widget {
    Choice(&'static [(i64, &'static str)]),
    Number,
    Flag { off: i64, on: i64 },
}

pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub widget: Widget,
    pub default: i64,
}

const SEX: &[(i64, &str)] = &[(1, "Male"), (2, "Female")];

const EDUCATION: &[(i64, &str)] = &[
    (1, "Primary terminal leaver"),
    (2, "Junior cycle incomplete: vocational school"),
    (3, "Junior cycle incomplete: secondary school"),
    (4, "Junior cycle terminal leaver: vocational school"),
    (5, "Junior cycle terminal leaver: secondary school"),
    (6, "Senior cycle incomplete: vocational school"),
    (7, "Senior cycle incomplete: secondary school"),
    (8, "Senior cycle terminal leaver: vocational school"),
    (9, "Senior cycle terminal leaver: secondary school"),
    (10, "3rd level incomplete"),
    (11, "3rd level complete"),
];

const SCHOOL_TYPE: &[(i64, &str)] = &[(1, "Secondary"), (2, "Vocational"), (9, "Primary terminal leaver")];

// Not shown in the form, the backend assigns ids.
const STUDENT_ID: &str = "StudentID";

pub const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        key: "SexID",
        label: "Sex",
        widget: Widget::Choice(SEX),
        default: 1,
    },
    FieldSpec {
        key: "DVRTID",
        label: "DVRT Score",
        widget: Widget::Number,
        default: 0,
    },
    FieldSpec {
        key: "EducationID",
        label: "Education Level",
        widget: Widget::Choice(EDUCATION),
        default: 1,
    },
    FieldSpec {
        key: "CertID",
        label: "Leaving Certificate",
        widget: Widget::Flag { off: 1, on: 2 },
        default: 1,
    },
    FieldSpec {
        key: "FathersPrestigeScore",
        label: "Father's Prestige Score",
        widget: Widget::Number,
        default: 0,
    },
    FieldSpec {
        key: "SchoolTypeID",
        label: "School Type",
        widget: Widget::Choice(SCHOOL_TYPE),
        default: 1,
    },
];

pub const SUBMIT_BUTTON: usize = FIELDS.len();
pub const BACK_BUTTON: usize = FIELDS.len() + 1;
const FOCUS_COUNT: usize = FIELDS.len() + 2;

#[derive(Debug, Clone)]
pub enum FieldValue {
    Choice(usize),
    Text(Inputter),
    Flag(bool),
}

impl FieldValue {
    fn default_for(spec: &FieldSpec) -> Self {
        match spec.widget {
            Widget::Choice(options) => FieldValue::Choice(
                options
                    .iter()
                    .position(|(code, _)| *code == spec.default)
                    .unwrap_or(0),
            ),
            Widget::Number => FieldValue::Text(Inputter::with_value(&spec.default.to_string())),
            Widget::Flag { on, .. } => FieldValue::Flag(spec.default == on),
        }
    }

    fn to_scalar(&self, spec: &FieldSpec) -> Scalar {
        match (self, &spec.widget) {
            (FieldValue::Choice(idx), Widget::Choice(options)) => options
                .get(*idx)
                .map(|(code, _)| Scalar::from(*code))
                .unwrap_or(Scalar::from(spec.default)),
            (FieldValue::Flag(checked), Widget::Flag { off, on }) => {
                Scalar::from(if *checked { *on } else { *off })
            }
            (FieldValue::Text(input), _) => coerce(input.value()),
            _ => Scalar::from(spec.default),
        }
    }

    /// Text shown next to the label.
    pub fn display(&self, spec: &FieldSpec) -> String {
        match (self, &spec.widget) {
            (FieldValue::Choice(idx), Widget::Choice(options)) => options
                .get(*idx)
                .map(|(_, label)| format!("◀ {label} ▶"))
                .unwrap_or_default(),
            (FieldValue::Flag(checked), _) => {
                String::from(if *checked { "[x]" } else { "[ ]" })
            }
            (FieldValue::Text(input), _) => input.display(),
            _ => String::new(),
        }
    }
}

/// Numbers typed into text fields are sent as numbers, anything else as text.
fn coerce(text: &str) -> Scalar {
    let trimmed = text.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Scalar::from(n);
    }
    match trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
        Some(n) => Scalar::Number(n),
        None => Scalar::Text(text.to_string()),
    }
}

pub struct InsertScreen {
    pub values: Vec<FieldValue>,
    pub focus: usize,
    pub message: Option<String>,
    pub pending: bool,
}

impl InsertScreen {
    pub fn new() -> Self {
        Self {
            values: Self::defaults(),
            focus: 0,
            message: None,
            pending: false,
        }
    }

    fn defaults() -> Vec<FieldValue> {
        FIELDS.iter().map(FieldValue::default_for).collect()
    }

    /// The record the form would submit right now.
    pub fn record(&self) -> Record {
        let mut record = Record::new().with(STUDENT_ID, 0);
        for (spec, value) in FIELDS.iter().zip(self.values.iter()) {
            record.insert(spec.key, value.to_scalar(spec));
        }
        record
    }

    pub fn update(&mut self, message: Message) -> Vec<Effect> {
        match message {
            Message::RawKey(key) => self.key(key),
            _ => Vec::new(),
        }
    }

    fn key(&mut self, key: KeyEvent) -> Vec<Effect> {
        match key.code {
            KeyCode::Tab | KeyCode::Down => self.focus = cycle(self.focus, FOCUS_COUNT, true),
            KeyCode::BackTab | KeyCode::Up => self.focus = cycle(self.focus, FOCUS_COUNT, false),
            KeyCode::Esc => return vec![Effect::Navigate(Route::Dashboard)],
            KeyCode::Enter if self.focus == BACK_BUTTON => {
                return vec![Effect::Navigate(Route::Dashboard)];
            }
            KeyCode::Enter => return self.submit(),
            _ => self.edit_field(key),
        }
        Vec::new()
    }

    fn edit_field(&mut self, key: KeyEvent) {
        let Some(spec) = FIELDS.get(self.focus) else {
            return;
        };
        let value = &mut self.values[self.focus];
        match (value, &spec.widget) {
            (FieldValue::Choice(idx), Widget::Choice(options)) => match key.code {
                KeyCode::Left => *idx = cycle(*idx, options.len(), false),
                KeyCode::Right | KeyCode::Char(' ') => *idx = cycle(*idx, options.len(), true),
                _ => {}
            },
            (FieldValue::Flag(checked), _) => {
                if key.code == KeyCode::Char(' ') {
                    *checked = !*checked;
                }
            }
            (FieldValue::Text(input), _) => {
                input.read(key);
            }
            _ => {}
        }
    }

    fn submit(&mut self) -> Vec<Effect> {
        let record = self.record();
        info!("Submitting {}", record.to_json());
        self.pending = true;
        self.message = Some(String::from("Submitting ..."));
        vec![Effect::Request(Request::Submit(record))]
    }

    pub fn on_reply(&mut self, reply: Reply) -> Vec<Effect> {
        self.pending = false;
        match reply {
            Reply::Submitted(Ok(result)) => {
                info!("Data inserted successfully: {result}");
                self.values = Self::defaults();
                self.message = Some(String::from("Data inserted successfully"));
            }
            Reply::Submitted(Err(GatewayError::Status { status, message })) => {
                warn!("Error inserting data ({status}): {message}");
                self.message = Some(format!("Error inserting data: {message}"));
            }
            Reply::Submitted(Err(e)) => {
                error!("Error sending data: {e}");
                self.message = Some(format!("Error sending data: {e}"));
            }
            other => warn!("Insert screen ignores {other:?}"),
        }
        Vec::new()
    }
}

impl Default for InsertScreen {
    fn default() -> Self {
        Self::new()
    }
}
