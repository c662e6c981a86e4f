use crate::types::{
    ApplicationRecord, ApplicationRow, AreaTreated, BudgetStatus, ChemicalUsage, MonthSpending,
    TotalUsage,
};
use crate::util::round2;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::HashMap;

pub const SQUARE_METERS_PER_BAY: f64 = 480.0;
pub const ACRES_PER_SQUARE_METER: f64 = 0.000247105;
pub const APPLICATIONS_PER_PAGE: usize = 5;

/// Remaining budget below this share of the budget is flagged as low.
const LOW_BUDGET_SHARE: f64 = 0.15;

/// Which chemical slots to look at when ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Spray,
    Fog,
}

/// Count applications by method.
///
/// Only rows with a spray chemical add their bays to `total_bays`; fog-only
/// rows are counted in `fog_count` but not in the bay total.
pub fn calculate_total_usage(records: &[ApplicationRecord]) -> TotalUsage {
    records.iter().fold(TotalUsage::default(), |mut acc, r| {
        let has_spray = r.has_spray();
        if has_spray {
            acc.spray_count += 1;
            acc.total_bays += r.bays.count;
        }
        if r.has_fog() {
            acc.fog_count += 1;
        }
        if r.bays.is_full {
            acc.full_range_applications += 1;
        }
        acc
    })
}

/// Spend per month, in order of first appearance.
///
/// The budget of a month is taken from the first record seen for it; later
/// records of the same month only add to `spent`.
pub fn calculate_monthly_spending(records: &[ApplicationRecord]) -> Vec<MonthSpending> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut rows: Vec<MonthSpending> = Vec::new();
    for r in records {
        let i = *index.entry(r.month.as_str()).or_insert_with(|| {
            rows.push(MonthSpending {
                month: r.month.clone(),
                spent: 0.0,
                budget: r.monthly_budget,
            });
            rows.len() - 1
        });
        rows[i].spent += r.price;
    }
    for row in &mut rows {
        row.spent = round2(row.spent);
        row.budget = round2(row.budget);
    }
    rows
}

/// All chemicals, spray and fog, by number of uses.
///
/// Ties keep the order in which the chemicals first appear.
pub fn most_used_chemicals(records: &[ApplicationRecord]) -> Vec<ChemicalUsage> {
    rank(records.iter().flat_map(|r| r.chemicals()))
}

/// Like [`most_used_chemicals`], restricted to one method's slots.
pub fn chemical_usage(records: &[ApplicationRecord], method: Method) -> Vec<ChemicalUsage> {
    rank(records.iter().flat_map(|r| {
        let slots = match method {
            Method::Spray => &r.spray_chemicals,
            Method::Fog => &r.fog_chemicals,
        };
        slots.iter().filter_map(|c| c.as_deref())
    }))
}

fn rank<'a>(chemicals: impl Iterator<Item = &'a str>) -> Vec<ChemicalUsage> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<ChemicalUsage> = Vec::new();
    for chemical in chemicals {
        let i = *index.entry(chemical).or_insert_with(|| {
            counts.push(ChemicalUsage {
                chemical: chemical.to_string(),
                count: 0,
            });
            counts.len() - 1
        });
        counts[i].count += 1;
    }
    // stable: equal counts stay in first-seen order
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

pub fn area_treated(usage: &TotalUsage) -> AreaTreated {
    let square_meters = usage.total_bays * SQUARE_METERS_PER_BAY;
    AreaTreated {
        square_meters,
        acres: square_meters * ACRES_PER_SQUARE_METER,
    }
}

pub fn total_spent(records: &[ApplicationRecord]) -> f64 {
    records.iter().map(|r| r.price).sum()
}

pub fn average_price_per_area(records: &[ApplicationRecord], area: &AreaTreated) -> f64 {
    if area.acres > 0.0 {
        total_spent(records) / area.acres
    } else {
        0.0
    }
}

pub fn average_price_per_bay(records: &[ApplicationRecord], usage: &TotalUsage) -> f64 {
    if usage.total_bays > 0.0 {
        total_spent(records) / usage.total_bays
    } else {
        0.0
    }
}

pub fn budget_status(spending: &MonthSpending) -> BudgetStatus {
    let remaining = spending.remaining();
    if remaining < 0.0 {
        BudgetStatus::OverBudget
    } else if spending.budget > 0.0 && remaining / spending.budget < LOW_BUDGET_SHARE {
        BudgetStatus::Low
    } else {
        BudgetStatus::OnTrack
    }
}

/// Newest first: week descending, then day descending.
pub fn recent_applications(records: &[ApplicationRecord]) -> Vec<&ApplicationRecord> {
    let mut sorted: Vec<&ApplicationRecord> = records.iter().collect();
    sorted.sort_by(|a, b| {
        b.date
            .week
            .cmp(&a.date.week)
            .then_with(|| b.date.day.cmp(&a.date.day))
    });
    sorted
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    pub index: usize,
    pub total_pages: usize,
}

/// Zero-based page `index` of `items`; out-of-range indexes clamp to the
/// last page.
pub fn page<T>(items: &[T], index: usize, per_page: usize) -> Page<'_, T> {
    let per_page = per_page.max(1);
    let total_pages = items.len().div_ceil(per_page).max(1);
    let index = index.min(total_pages - 1);
    let start = (index * per_page).min(items.len());
    let end = (start + per_page).min(items.len());
    Page {
        items: &items[start..end],
        index,
        total_pages,
    }
}

/// Every projection the dashboard shows for one list of records.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetrics {
    pub total_usage: TotalUsage,
    pub monthly_spending: Vec<MonthSpending>,
    pub most_used_chemicals: Vec<ChemicalUsage>,
    pub spray_chemicals: Vec<ChemicalUsage>,
    pub fog_chemicals: Vec<ChemicalUsage>,
    pub area_treated: AreaTreated,
    pub average_price_per_area: f64,
    pub average_price_per_bay: f64,
}

impl DerivedMetrics {
    pub fn from_records(records: &[ApplicationRecord]) -> Self {
        let total_usage = calculate_total_usage(records);
        let area = area_treated(&total_usage);
        DerivedMetrics {
            monthly_spending: calculate_monthly_spending(records),
            most_used_chemicals: most_used_chemicals(records),
            spray_chemicals: chemical_usage(records, Method::Spray),
            fog_chemicals: chemical_usage(records, Method::Fog),
            average_price_per_area: average_price_per_area(records, &area),
            average_price_per_bay: average_price_per_bay(records, &total_usage),
            area_treated: area,
            total_usage,
        }
    }

    /// The first spending entry, or a zeroed "No Data" placeholder.
    pub fn leading_month(&self) -> MonthSpending {
        self.monthly_spending.first().cloned().unwrap_or(MonthSpending {
            month: "No Data".to_string(),
            spent: 0.0,
            budget: 0.0,
        })
    }
}

/// Payload of an exported month report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub generated: DateTime<Local>,
    pub month: Option<String>,
    pub total_applications: usize,
    pub total_usage: TotalUsage,
    pub area_treated: AreaTreated,
    pub budget: f64,
    pub spent: f64,
    pub remaining: f64,
    pub budget_status: BudgetStatus,
    pub average_price_per_bay: f64,
    pub average_price_per_area: f64,
    pub top_chemicals: Vec<ChemicalUsage>,
    pub recent_applications: Vec<ApplicationRow>,
}

pub fn build_summary(month: Option<&str>, records: &[ApplicationRecord]) -> ReportSummary {
    let metrics = DerivedMetrics::from_records(records);
    let leading = metrics.leading_month();
    ReportSummary {
        generated: Local::now(),
        month: month.map(str::to_string),
        total_applications: metrics.total_usage.total_applications(),
        total_usage: metrics.total_usage,
        area_treated: metrics.area_treated,
        budget: leading.budget,
        spent: leading.spent,
        remaining: round2(leading.remaining()),
        budget_status: budget_status(&leading),
        average_price_per_bay: metrics.average_price_per_bay,
        average_price_per_area: metrics.average_price_per_area,
        top_chemicals: metrics.most_used_chemicals.iter().take(3).cloned().collect(),
        recent_applications: recent_applications(records)
            .into_iter()
            .take(APPLICATIONS_PER_PAGE)
            .map(ApplicationRow::from)
            .collect(),
    }
}
