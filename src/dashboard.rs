use crate::error::{LoadError, StoreError};
use crate::loader::{load_workbook, LoadReport};
use crate::reports::DerivedMetrics;
use crate::store::{restore_snapshot, save_snapshot, SnapshotStore};
use crate::types::{ApplicationRecord, MonthlyData};
use log::{info, warn};
use std::path::Path;

/// Session state: the last good mapping and the month being looked at.
#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    data: MonthlyData,
    selected_month: Option<String>,
}

/// What the presentation layer renders for one selection.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub month: Option<String>,
    pub records: Vec<ApplicationRecord>,
    pub metrics: DerivedMetrics,
}

/// A workbook that parsed and is now the current data.
#[derive(Debug)]
pub struct Loaded {
    pub report: LoadReport,
    /// Set when the new data could not be written to the snapshot store.
    pub save_error: Option<StoreError>,
}

/// Resolve the selection against `data` and compute its metrics.
///
/// A selection that is missing or no longer present falls back to the first
/// month; an empty mapping gives no month and empty metrics.
pub fn derive(data: &MonthlyData, selected: Option<&str>) -> DashboardView {
    let month = selected
        .filter(|m| data.contains(m))
        .or_else(|| data.first_month());
    let records = month
        .and_then(|m| data.get(m))
        .map(<[ApplicationRecord]>::to_vec)
        .unwrap_or_default();
    let metrics = DerivedMetrics::from_records(&records);
    DashboardView {
        month: month.map(str::to_string),
        records,
        metrics,
    }
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the saved snapshot, if any. A snapshot that cannot be read
    /// is logged and ignored.
    pub fn restore(store: &dyn SnapshotStore) -> Self {
        let mut dashboard = Dashboard::new();
        match restore_snapshot(store) {
            Ok(Some(data)) => {
                info!("restored snapshot with {} month(s)", data.len());
                dashboard.replace_data(data);
            }
            Ok(None) => {}
            Err(e) => warn!("ignoring saved snapshot: {}", e),
        }
        dashboard
    }

    /// Parse `bytes` and, only if every sheet is valid, make the result the
    /// current data and persist it. On error nothing changes.
    pub fn load(
        &mut self,
        bytes: &[u8],
        store: &mut dyn SnapshotStore,
    ) -> Result<Loaded, LoadError> {
        let (data, report) = load_workbook(bytes)?;
        let save_error = self.replace_and_save(data, store).err();
        if let Some(e) = &save_error {
            warn!("snapshot not saved: {}", e);
        }
        info!(
            "loaded {} application(s) across {} month(s)",
            report.records,
            self.data.len()
        );
        Ok(Loaded { report, save_error })
    }

    /// Read the whole file, then [`Dashboard::load`] it.
    pub fn load_file(
        &mut self,
        path: impl AsRef<Path>,
        store: &mut dyn SnapshotStore,
    ) -> Result<Loaded, LoadError> {
        let bytes = std::fs::read(path.as_ref())?;
        log::debug!("read {} bytes from {}", bytes.len(), path.as_ref().display());
        self.load(&bytes, store)
    }

    /// Swap in a freshly parsed mapping and select its first month.
    pub fn replace_data(&mut self, data: MonthlyData) {
        self.selected_month = data.first_month().map(str::to_string);
        self.data = data;
    }

    /// Like [`Dashboard::replace_data`], then persist the new mapping.
    /// The in-memory state is updated even if saving fails.
    pub fn replace_and_save(
        &mut self,
        data: MonthlyData,
        store: &mut dyn SnapshotStore,
    ) -> Result<(), StoreError> {
        self.replace_data(data);
        save_snapshot(store, &self.data)
    }

    /// Returns `false` and keeps the current selection if `month` is unknown.
    pub fn select_month(&mut self, month: &str) -> bool {
        if !self.data.contains(month) {
            return false;
        }
        self.selected_month = Some(month.to_string());
        true
    }

    pub fn selected_month(&self) -> Option<&str> {
        self.selected_month.as_deref()
    }

    pub fn available_months(&self) -> Vec<&str> {
        self.data.months().collect()
    }

    pub fn data(&self) -> &MonthlyData {
        &self.data
    }

    pub fn view(&self) -> DashboardView {
        derive(&self.data, self.selected_month())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, SNAPSHOT_KEY};
    use crate::types::{Bays, DateCode};
    #[cfg(feature = "xlsx")]
    use rust_xlsxwriter::Workbook;

    fn record(month: &str, chemical: &str, price: f64) -> ApplicationRecord {
        ApplicationRecord {
            spray_chemicals: [Some(chemical.to_string()), None, None],
            fog_chemicals: [None, None, None],
            date: DateCode {
                week: 2,
                day: 2,
                formatted: "Week 2, Day 2".to_string(),
            },
            bays: Bays {
                count: 1.0,
                is_full: false,
            },
            price,
            monthly_budget: 100.0,
            month: month.to_string(),
        }
    }

    fn two_months() -> MonthlyData {
        let mut data = MonthlyData::new();
        data.insert("May".into(), vec![record("May", "A", 10.0)]);
        data.insert("June".into(), vec![record("June", "B", 20.0), record("June", "B", 5.0)]);
        data
    }

    #[test]
    fn new_data_selects_first_month() {
        let mut dashboard = Dashboard::new();
        assert_eq!(dashboard.selected_month(), None);
        dashboard.replace_data(two_months());
        assert_eq!(dashboard.selected_month(), Some("May"));
        assert_eq!(dashboard.available_months(), vec!["May", "June"]);
    }

    #[test]
    fn selecting_unknown_month_is_rejected() {
        let mut dashboard = Dashboard::new();
        dashboard.replace_data(two_months());
        assert!(dashboard.select_month("June"));
        assert!(!dashboard.select_month("December"));
        assert_eq!(dashboard.selected_month(), Some("June"));
    }

    #[test]
    fn empty_mapping_clears_selection() {
        let mut dashboard = Dashboard::new();
        dashboard.replace_data(two_months());
        dashboard.replace_data(MonthlyData::new());
        assert_eq!(dashboard.selected_month(), None);
        let view = dashboard.view();
        assert_eq!(view.month, None);
        assert!(view.records.is_empty());
        assert_eq!(view.metrics, DerivedMetrics::from_records(&[]));
    }

    #[test]
    fn view_follows_selection() {
        let mut dashboard = Dashboard::new();
        dashboard.replace_data(two_months());
        dashboard.select_month("June");
        let view = dashboard.view();
        assert_eq!(view.month.as_deref(), Some("June"));
        assert_eq!(view.records.len(), 2);
        assert_eq!(view.metrics.monthly_spending[0].spent, 25.0);
        assert_eq!(view.metrics.most_used_chemicals[0].count, 2);
    }

    #[test]
    fn derive_falls_back_to_first_month() {
        let data = two_months();
        assert_eq!(derive(&data, Some("Nope")).month.as_deref(), Some("May"));
        assert_eq!(derive(&data, None).month.as_deref(), Some("May"));
        assert_eq!(derive(&MonthlyData::new(), Some("May")).month, None);
    }

    #[test]
    fn restore_picks_up_saved_data() {
        let mut store = MemoryStore::new();
        let mut first = Dashboard::new();
        first.replace_and_save(two_months(), &mut store).unwrap();

        let second = Dashboard::restore(&store);
        assert_eq!(second.data(), &two_months());
        assert_eq!(second.selected_month(), Some("May"));
    }

    #[test]
    fn corrupt_snapshot_starts_empty() {
        let mut store = MemoryStore::new();
        store.set(SNAPSHOT_KEY, "not json").unwrap();
        let dashboard = Dashboard::restore(&store);
        assert!(dashboard.data().is_empty());
        assert_eq!(dashboard.selected_month(), None);
    }

    // Writes nothing, so a save attempt always fails.
    #[cfg(feature = "xlsx")]
    struct BrokenStore;

    #[cfg(feature = "xlsx")]
    impl SnapshotStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
        }
    }

    #[test]
    fn failed_load_keeps_current_data() {
        let mut store = MemoryStore::new();
        let mut dashboard = Dashboard::new();
        dashboard.replace_and_save(two_months(), &mut store).unwrap();
        dashboard.select_month("June");

        let err = dashboard.load(b"not a workbook", &mut store).unwrap_err();
        assert!(matches!(err, LoadError::UnrecognizedFormat(_)));
        assert_eq!(dashboard.data(), &two_months());
        assert_eq!(dashboard.selected_month(), Some("June"));
        assert_eq!(restore_snapshot(&store).unwrap(), Some(two_months()));
    }

    #[test]
    fn missing_file_keeps_current_data() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MemoryStore::new();
        let mut dashboard = Dashboard::new();
        dashboard.replace_data(two_months());

        let err = dashboard
            .load_file(dir.path().join("missing.xlsx"), &mut store)
            .unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
        assert_eq!(dashboard.data(), &two_months());
    }

    #[cfg(feature = "xlsx")]
    fn workbook_bytes(rows: &[(&str, &str)]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet().set_name("August").unwrap();
        for (col, title) in ["S1", "S2", "S3", "F1", "F2", "F3", "Date", "Bays", "Price", "Budget"]
            .into_iter()
            .enumerate()
        {
            sheet.write_string(0, col as u16, title).unwrap();
        }
        for (i, (chemical, date)) in rows.iter().enumerate() {
            let row = i as u32 + 1;
            sheet.write_string(row, 0, *chemical).unwrap();
            sheet.write_string(row, 6, *date).unwrap();
            sheet.write_number(row, 7, 2.0).unwrap();
            sheet.write_number(row, 8, 15.0).unwrap();
            sheet.write_number(row, 9, 300.0).unwrap();
        }
        workbook.save_to_buffer().unwrap()
    }

    #[cfg(feature = "xlsx")]
    #[test]
    fn invalid_workbook_does_not_replace_good_data() {
        let mut store = MemoryStore::new();
        let mut dashboard = Dashboard::new();
        let good = workbook_bytes(&[("Bifenthrin", "32-1"), ("Malathion", "33-2")]);
        let loaded = dashboard.load(&good, &mut store).unwrap();
        assert_eq!(loaded.report.records, 2);
        assert!(loaded.save_error.is_none());
        let before = dashboard.data().clone();
        assert_eq!(dashboard.selected_month(), Some("August"));

        let bad = workbook_bytes(&[("Bifenthrin", "32-1"), ("Malathion", "week 33")]);
        let err = dashboard.load(&bad, &mut store).unwrap_err();
        assert_eq!(err.location(), Some(("August", 3)));
        assert_eq!(dashboard.data(), &before);
        assert_eq!(dashboard.selected_month(), Some("August"));
        assert_eq!(restore_snapshot(&store).unwrap(), Some(before));
    }

    #[cfg(feature = "xlsx")]
    #[test]
    fn save_failure_still_applies_loaded_data() {
        let mut dashboard = Dashboard::new();
        dashboard.replace_data(two_months());
        let bytes = workbook_bytes(&[("Pyrethrin", "10-4")]);
        let loaded = dashboard.load(&bytes, &mut BrokenStore).unwrap();
        assert!(matches!(loaded.save_error, Some(StoreError::Io(_))));
        assert_eq!(dashboard.available_months(), vec!["August"]);
        assert_eq!(dashboard.selected_month(), Some("August"));
    }
}
