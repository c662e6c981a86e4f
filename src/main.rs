// Entry point and interactive menu.
//
// - Option [1] loads a workbook, validates every sheet and saves a snapshot.
// - Option [2] picks the month the dashboard shows.
// - Option [3] prints the dashboard figures for that month.
// - Option [4] exports the month report as JSON and CSV.
mod dashboard;
mod error;
mod loader;
mod output;
mod reports;
mod store;
mod types;
mod util;

use clap::Parser;
use dashboard::Dashboard;
use log::debug;
use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use store::FileStore;
use types::{ApplicationRow, ChemicalRow, SpendingRow};

#[derive(Parser, Debug)]
#[command(version, about = "Summarise pesticide spray and fog applications from a workbook")]
struct Args {
    /// Workbook loaded by option [1] when no path is typed
    #[arg(short, long, default_value = "spray_applications.xlsx")]
    file: PathBuf,

    /// Directory holding the saved snapshot
    #[arg(long, default_value = ".spray_report")]
    data_dir: PathBuf,

    /// Directory exported reports are written to
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Start empty instead of restoring the last snapshot
    #[arg(long)]
    no_restore: bool,
}

// Loaded data lives for the whole session so reports can be regenerated
// without re-reading the workbook.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState::default()));

#[derive(Default)]
struct AppState {
    dashboard: Dashboard,
}

fn state() -> MutexGuard<'static, AppState> {
    APP_STATE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Print `prompt` and read one trimmed line. `None` on end of input.
fn read_line(prompt: &str) -> Option<String> {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Ask whether to go back to the menu after exporting a report.
fn prompt_back_to_menu() -> bool {
    loop {
        let Some(resp) = read_line("Back to Menu (Y/N): ") else {
            return false;
        };
        match resp.to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Handle option [1]: load and validate a workbook.
///
/// A workbook that fails to load leaves the previously loaded months in place.
fn handle_load(args: &Args) {
    let typed = read_line(&format!("Workbook path [{}]: ", args.file.display())).unwrap_or_default();
    let path = if typed.is_empty() {
        args.file.clone()
    } else {
        PathBuf::from(typed)
    };

    let mut store = FileStore::new(&args.data_dir);
    let mut state = state();
    match state.dashboard.load_file(&path, &mut store) {
        Ok(loaded) => {
            let report = loaded.report;
            println!(
                "Processing workbook... ({} months, {} rows, {} applications loaded)",
                util::format_int(report.sheets),
                util::format_int(report.data_rows),
                util::format_int(report.records)
            );
            if report.blank_rows > 0 {
                println!(
                    "Note: {} blank rows skipped.",
                    util::format_int(report.blank_rows)
                );
            }
            if let Some(e) = loaded.save_error {
                eprintln!("Warning: could not save snapshot: {}", e);
            }
            if let Some(month) = state.dashboard.selected_month() {
                println!("Showing {}.", month);
            }
            println!();
        }
        Err(e) => {
            eprintln!("Failed to load file: {}", e);
            if let Some((sheet, row)) = e.location() {
                eprintln!("Fix sheet {:?} row {} and load the file again.", sheet, row);
            }
            eprintln!();
        }
    }
}

/// Handle option [2]: choose the month to show, by number or by name.
fn handle_select_month() {
    let mut state = state();
    if state.dashboard.data().is_empty() {
        println!("Error: No data loaded. Please load a workbook first (option 1).\n");
        return;
    }
    let months: Vec<String> = state
        .dashboard
        .available_months()
        .into_iter()
        .map(str::to_string)
        .collect();
    for (i, month) in months.iter().enumerate() {
        let marker = if state.dashboard.selected_month() == Some(month.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{}[{}] {}", marker, i + 1, month);
    }
    let Some(choice) = read_line("Enter choice: ") else {
        return;
    };
    let month = choice
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| months.get(i).cloned())
        .unwrap_or(choice);
    if state.dashboard.select_month(&month) {
        println!("Showing {}.\n", month);
    } else {
        println!("Unknown month: {}\n", month);
    }
}

/// Handle option [3]: print the figures for the selected month.
fn handle_show_dashboard() {
    let view = state().dashboard.view();
    let Some(month) = view.month.as_deref() else {
        println!("Error: No data loaded. Please load a workbook first (option 1).\n");
        return;
    };
    let m = &view.metrics;
    let leading = m.leading_month();

    println!("Spray Application Dashboard: {}\n", month);
    println!(
        "Total Applications: {} ({} sprays, {} fogs)",
        m.total_usage.total_applications(),
        m.total_usage.spray_count,
        m.total_usage.fog_count
    );
    println!(
        "Total Bays Treated: {} ({} full range applications)",
        util::format_number(m.total_usage.total_bays, 0),
        m.total_usage.full_range_applications
    );
    println!(
        "Total Area Treated: {} acres ({} m²)",
        util::format_number(m.area_treated.acres, 2),
        util::format_number(m.area_treated.square_meters, 0)
    );
    println!(
        "Budget: {}  Spent: {}  Remaining: {} ({})",
        util::format_money(leading.budget),
        util::format_money(leading.spent),
        util::format_money(leading.remaining()),
        reports::budget_status(&leading)
    );
    println!(
        "Average Price per Bay: {}  per Acre: {}\n",
        util::format_money(m.average_price_per_bay),
        util::format_money(m.average_price_per_area)
    );

    println!("Monthly Spending vs Budget");
    let spending: Vec<SpendingRow> = m
        .monthly_spending
        .iter()
        .map(|s| SpendingRow {
            month: s.month.clone(),
            spent: util::format_money(s.spent),
            budget: util::format_money(s.budget),
            remaining: util::format_money(s.remaining()),
        })
        .collect();
    output::preview_table_rows(&spending, spending.len());

    println!("Most Used Chemicals");
    let top: Vec<ChemicalRow> = m.most_used_chemicals.iter().map(ChemicalRow::from).collect();
    output::preview_table_rows(&top, 3);

    println!("Spray Chemical Usage");
    let spray: Vec<ChemicalRow> = m.spray_chemicals.iter().map(ChemicalRow::from).collect();
    output::preview_table_rows(&spray, spray.len());

    println!("Fog Chemical Usage");
    let fog: Vec<ChemicalRow> = m.fog_chemicals.iter().map(ChemicalRow::from).collect();
    output::preview_table_rows(&fog, fog.len());

    let recent: Vec<ApplicationRow> = reports::recent_applications(&view.records)
        .into_iter()
        .map(ApplicationRow::from)
        .collect();
    let page = reports::page(&recent, 0, reports::APPLICATIONS_PER_PAGE);
    println!("Recent Applications");
    output::preview_table_rows(page.items, page.items.len());
    println!("Page {} of {}\n", page.index + 1, page.total_pages);
}

/// Handle option [4]: export the selected month's report.
fn handle_export(out_dir: &Path) {
    let view = state().dashboard.view();
    if view.month.is_none() {
        println!("Error: No data loaded. Please load a workbook first (option 1).\n");
        return;
    }
    println!("Generating report...");
    match output::export_report(out_dir, view.month.as_deref(), &view.records) {
        Ok((json_path, csv_path)) => {
            println!("Summary saved to {}", json_path.display());
            println!("Applications saved to {}\n", csv_path.display());
            let rows: Vec<ApplicationRow> = reports::recent_applications(&view.records)
                .into_iter()
                .map(ApplicationRow::from)
                .collect();
            output::preview_table_rows(&rows, reports::APPLICATIONS_PER_PAGE);
        }
        Err(e) => eprintln!("Write error: {}\n", e),
    }
}

fn main() {
    pretty_env_logger::init();
    let args = Args::parse();
    debug!("{:?}", args);

    if !args.no_restore {
        let store = FileStore::new(&args.data_dir);
        state().dashboard = Dashboard::restore(&store);
    }

    loop {
        println!("Spray Application Dashboard");
        println!("[1] Load workbook");
        println!("[2] Select month");
        println!("[3] Show dashboard");
        println!("[4] Export report");
        println!("[5] Exit\n");
        let Some(choice) = read_line("Enter choice: ") else {
            break;
        };
        match choice.as_str() {
            "1" => handle_load(&args),
            "2" => handle_select_month(),
            "3" => {
                println!();
                handle_show_dashboard();
            }
            "4" => {
                println!();
                handle_export(&args.out_dir);
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "5" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 1 to 5.\n"),
        }
    }
}
