#[cfg(feature = "xlsx")]
use calamine::Data;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use tabled::Tabled;

/// One raw spreadsheet value, as seen at the ingestion boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Blank text counts as empty, same as a missing cell.
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Number(_) => false,
            Cell::Text(s) => s.trim().is_empty(),
        }
    }

    /// Trimmed text of the cell; numbers use their shortest decimal form.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Number(n) => Some(n.to_string()),
            Cell::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    None
                } else {
                    Some(s.to_string())
                }
            }
        }
    }
}

#[cfg(feature = "xlsx")]
impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::String(s) if s.is_empty() => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            // Excel dates are day serials; keep the raw number.
            Data::DateTime(dt) => Cell::Number(dt.as_f64()),
            other => Cell::Text(other.to_string()),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }
}

/// One tab of a decoded workbook, anchored at A1.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetGrid {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateCode {
    pub week: u32,
    pub day: u32,
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bays {
    pub count: f64,
    /// Set when any fog chemical was used, regardless of the bay count.
    pub is_full: bool,
}

/// A validated spreadsheet row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    pub spray_chemicals: [Option<String>; 3],
    pub fog_chemicals: [Option<String>; 3],
    pub date: DateCode,
    pub bays: Bays,
    pub price: f64,
    pub monthly_budget: f64,
    pub month: String,
}

impl ApplicationRecord {
    pub fn has_spray(&self) -> bool {
        self.spray_chemicals.iter().any(Option::is_some)
    }

    pub fn has_fog(&self) -> bool {
        self.fog_chemicals.iter().any(Option::is_some)
    }

    /// Spray then fog chemicals, skipping unused slots.
    pub fn chemicals(&self) -> impl Iterator<Item = &str> {
        self.spray_chemicals
            .iter()
            .chain(self.fog_chemicals.iter())
            .filter_map(|c| c.as_deref())
    }
}

/// Parsed workbook: month (tab name) to its records, in tab order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthlyData {
    months: Vec<(String, Vec<ApplicationRecord>)>,
}

impl MonthlyData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a month, or replaces its records in place if it already exists.
    pub fn insert(&mut self, month: String, records: Vec<ApplicationRecord>) {
        match self.months.iter_mut().find(|(m, _)| *m == month) {
            Some(entry) => entry.1 = records,
            None => self.months.push((month, records)),
        }
    }

    pub fn get(&self, month: &str) -> Option<&[ApplicationRecord]> {
        self.months
            .iter()
            .find(|(m, _)| m == month)
            .map(|(_, records)| records.as_slice())
    }

    pub fn contains(&self, month: &str) -> bool {
        self.get(month).is_some()
    }

    pub fn months(&self) -> impl Iterator<Item = &str> {
        self.months.iter().map(|(m, _)| m.as_str())
    }

    pub fn first_month(&self) -> Option<&str> {
        self.months.first().map(|(m, _)| m.as_str())
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn total_records(&self) -> usize {
        self.months.iter().map(|(_, r)| r.len()).sum()
    }
}

// Serialized as a JSON object; key order follows tab order.
impl Serialize for MonthlyData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.months.iter().map(|(m, r)| (m, r)))
    }
}

impl<'de> Deserialize<'de> for MonthlyData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(MonthlyDataVisitor)
    }
}

struct MonthlyDataVisitor;

impl<'de> Visitor<'de> for MonthlyDataVisitor {
    type Value = MonthlyData;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of month name to applications")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut data = MonthlyData::new();
        while let Some((month, records)) = access.next_entry::<String, Vec<ApplicationRecord>>()? {
            data.insert(month, records);
        }
        Ok(data)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalUsage {
    pub spray_count: usize,
    pub fog_count: usize,
    pub total_bays: f64,
    pub full_range_applications: usize,
}

impl TotalUsage {
    pub fn total_applications(&self) -> usize {
        self.spray_count + self.fog_count
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthSpending {
    pub month: String,
    pub spent: f64,
    pub budget: f64,
}

impl MonthSpending {
    pub fn remaining(&self) -> f64 {
        self.budget - self.spent
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChemicalUsage {
    pub chemical: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaTreated {
    pub square_meters: f64,
    pub acres: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BudgetStatus {
    OnTrack,
    Low,
    OverBudget,
}

impl fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BudgetStatus::OnTrack => "On track",
            BudgetStatus::Low => "Low",
            BudgetStatus::OverBudget => "Over budget",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ApplicationMethod {
    Spray,
    Fog,
    SprayAndFog,
    None,
}

impl ApplicationMethod {
    pub fn of(record: &ApplicationRecord) -> Self {
        match (record.has_spray(), record.has_fog()) {
            (true, true) => ApplicationMethod::SprayAndFog,
            (true, false) => ApplicationMethod::Spray,
            (false, true) => ApplicationMethod::Fog,
            (false, false) => ApplicationMethod::None,
        }
    }
}

impl fmt::Display for ApplicationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ApplicationMethod::Spray => "Spray",
            ApplicationMethod::Fog => "Fog",
            ApplicationMethod::SprayAndFog => "Spray & Fog",
            ApplicationMethod::None => "N/A",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ApplicationRow {
    #[serde(rename = "Date")]
    #[tabled(rename = "Date")]
    pub date: String,
    #[serde(rename = "Chemicals")]
    #[tabled(rename = "Chemicals")]
    pub chemicals: String,
    #[serde(rename = "Method")]
    #[tabled(rename = "Method")]
    pub method: String,
    #[serde(rename = "Bays")]
    #[tabled(rename = "Bays")]
    pub bays: String,
    #[serde(rename = "Price")]
    #[tabled(rename = "Price")]
    pub price: String,
}

impl From<&ApplicationRecord> for ApplicationRow {
    fn from(r: &ApplicationRecord) -> Self {
        ApplicationRow {
            date: r.date.formatted.clone(),
            chemicals: r.chemicals().collect::<Vec<_>>().join(", "),
            method: ApplicationMethod::of(r).to_string(),
            bays: r.bays.count.to_string(),
            price: format!("${:.2}", r.price),
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ChemicalRow {
    #[serde(rename = "Chemical")]
    #[tabled(rename = "Chemical")]
    pub chemical: String,
    #[serde(rename = "UsageCount")]
    #[tabled(rename = "Usage Count")]
    pub count: usize,
}

impl From<&ChemicalUsage> for ChemicalRow {
    fn from(c: &ChemicalUsage) -> Self {
        ChemicalRow {
            chemical: c.chemical.clone(),
            count: c.count,
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct SpendingRow {
    #[serde(rename = "Month")]
    #[tabled(rename = "Month")]
    pub month: String,
    #[serde(rename = "Spent")]
    #[tabled(rename = "Spent")]
    pub spent: String,
    #[serde(rename = "Budget")]
    #[tabled(rename = "Budget")]
    pub budget: String,
    #[serde(rename = "Remaining")]
    #[tabled(rename = "Remaining")]
    pub remaining: String,
}
