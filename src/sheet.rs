use chrono::{Datelike, Duration, NaiveDate};

/// Day zero of spreadsheet serial dates (1900 date system).
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

const MIN_YEAR: i32 = 1000;

/// Serial number of 9999-12-31, the last date spreadsheets can hold.
const SERIAL_MAX: f64 = 2_958_465.0;

// Day-first before ISO. `%y` goes first since `%Y` reads `10` as the year 10;
// chrono pivots it at 69, so `01.05.10` is 2010 and `01.05.75` is 1975.
const DATE_FORMATS: [&str; 8] = [
    "%d.%m.%y",
    "%d/%m/%y",
    "%d.%m.%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// Spreadsheet truthiness: non-zero numbers, `true`, dates and any
    /// non-blank text other than `0`/`false`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Cell::Empty => false,
            Cell::Bool(value) => *value,
            Cell::Number(value) => *value != 0.0 && !value.is_nan(),
            Cell::Date(_) => true,
            Cell::Text(text) => {
                let text = text.trim();
                !(text.is_empty() || text == "0" || text.eq_ignore_ascii_case("false"))
            }
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Cell::Number(value) => whole_number(*value),
            Cell::Text(text) => {
                let text = text.trim();
                text.parse::<i64>()
                    .ok()
                    .or_else(|| text.parse::<f64>().ok().and_then(whole_number))
            }
            _ => None,
        }
    }

    /// Display text of a non-blank cell. Whole numbers print without a
    /// fractional part so postal codes stay `96047`, not `96047.0`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(text) => {
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            Cell::Number(value) => Some(match whole_number(*value) {
                Some(whole) => whole.to_string(),
                None => value.to_string(),
            }),
            Cell::Bool(value) => Some(value.to_string()),
            Cell::Date(date) => Some(date.format("%d.%m.%Y").to_string()),
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(date) => Some(*date),
            Cell::Number(serial) => from_serial(*serial),
            Cell::Text(text) => parse_date(text),
            _ => None,
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Number(value as f64)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Cell::Date(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn header(&self) -> Option<&[Cell]> {
        self.rows.first().map(Vec::as_slice)
    }

    pub fn data_rows(&self) -> impl Iterator<Item = (usize, &[Cell])> {
        self.rows
            .iter()
            .enumerate()
            .skip(1)
            .map(|(index, row)| (index + 1, row.as_slice()))
    }
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    // "2010-05-01 00:00:00" and "2010-05-01T00:00:00" carry a time part.
    let date_part = text
        .split(|c: char| c == ' ' || c == 'T')
        .next()
        .unwrap_or(text);

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
        .filter(|date| date.year() >= MIN_YEAR)
}

fn from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=SERIAL_MAX).contains(&serial) {
        return None;
    }
    let (year, month, day) = SERIAL_EPOCH;
    let epoch = NaiveDate::from_ymd_opt(year, month, day)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

fn whole_number(value: f64) -> Option<i64> {
    (value.is_finite() && value.fract() == 0.0).then_some(value as i64)
}
