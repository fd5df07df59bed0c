// Entry point and high-level CLI flow.
//
// - `report` runs one full pass over the housing table and writes the
//   dashboard tables.
// - `geocode` fills in coordinates for a CSV of addresses.
// - Without a subcommand, an interactive menu loads the table once and lets
//   the user regenerate reports (or force a refresh) as often as they like.
mod aggregate;
mod config;
mod dashboard;
mod error;
mod geocode;
mod goals;
mod loader;
mod output;
mod reports;
mod source;
mod trend;
mod types;
mod util;

use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use config::{
    DashboardConfig, Goals, DEFAULT_CACHE_TTL_SECS, DEFAULT_OWNER_GOAL, DEFAULT_RENTAL_GOAL,
    DEFAULT_SOURCE, DEFAULT_TARGET_YEAR,
};
use dashboard::Dashboard;
use error::DashboardError;
use geocode::{NominatimGeocoder, DEFAULT_ADDRESS_COLUMN, NOMINATIM_URL, RETRY_DELAY};
use goals::PerYearRate;
use loader::LoadReport;
use source::{DataSource, Fetcher, TableCache};
use types::ProjectRecord;

#[derive(Debug, Parser)]
#[command(
    name = "housing_progress",
    about = "Progress of municipal housing development toward unit goals"
)]
struct Cli {
    /// CSV file path or http(s) URL of the housing table.
    #[arg(long, default_value = DEFAULT_SOURCE)]
    source: String,

    #[arg(long, default_value_t = DEFAULT_RENTAL_GOAL)]
    rental_goal: f64,

    #[arg(long, default_value_t = DEFAULT_OWNER_GOAL)]
    owner_goal: f64,

    #[arg(long, default_value_t = DEFAULT_TARGET_YEAR)]
    target_year: i32,

    /// Defaults to the current calendar year.
    #[arg(long)]
    current_year: Option<i32>,

    /// How long a loaded table is reused before it is fetched again.
    #[arg(long, default_value_t = DEFAULT_CACHE_TTL_SECS)]
    cache_ttl_secs: u64,

    /// Directory the report files are written to.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one full pass and write all reports.
    Report,
    /// Geocode the address column of a CSV file.
    Geocode {
        input_csv: PathBuf,
        output_csv: PathBuf,
        #[arg(long, default_value = DEFAULT_ADDRESS_COLUMN)]
        address_column: String,
        #[arg(long, default_value = NOMINATIM_URL)]
        geocoder_url: String,
    },
}

impl Cli {
    fn dashboard_config(&self) -> DashboardConfig {
        DashboardConfig {
            source: DataSource::parse(&self.source),
            goals: Goals {
                rental: self.rental_goal,
                owner: self.owner_goal,
            },
            target_year: self.target_year,
            current_year: self
                .current_year
                .unwrap_or_else(config::current_calendar_year),
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            out_dir: self.out_dir.clone(),
        }
    }
}

/// Interactive session state: the table cache and whatever was loaded
/// from it last.
struct Session {
    config: DashboardConfig,
    cache: TableCache,
    fetcher: Fetcher,
    data: Option<(Vec<ProjectRecord>, LoadReport)>,
}

impl Session {
    fn new(config: DashboardConfig) -> Self {
        let cache = TableCache::new(config.cache_ttl);
        Session {
            config,
            cache,
            fetcher: Fetcher::default(),
            data: None,
        }
    }

    /// Handle option [1]: load and normalize the housing table.
    fn handle_load(&mut self) {
        let loaded = self
            .cache
            .get_or_fetch(&self.config.source, &self.fetcher)
            .and_then(loader::load_and_clean);
        match loaded {
            Ok((records, load_report)) => {
                println!(
                    "Processing dataset... ({} projects loaded, {} without a move-in year)",
                    util::format_int(records.len()),
                    util::format_int(load_report.rows_without_year)
                );
                if load_report.parse_errors > 0 {
                    println!(
                        "Note: {} rows skipped due to parse errors.",
                        util::format_int(load_report.parse_errors)
                    );
                }
                println!(
                    "Info: {} projects have map coordinates.",
                    util::format_int(load_report.rows_with_coords)
                );
                if load_report.mismatched_totals > 0 {
                    println!(
                        "Info: {} rows list a total that differs from their unit breakdown.",
                        util::format_int(load_report.mismatched_totals)
                    );
                }
                println!();
                self.data = Some((records, load_report));
            }
            Err(e) => {
                log::error!("Load failed: {}", e);
                eprintln!("Failed to load data: {}\n", e);
            }
        }
    }

    /// Handle option [3]: drop the cached table and load it again.
    fn handle_refresh(&mut self) {
        self.cache.invalidate();
        self.data = None;
        self.handle_load();
    }

    /// Handle option [2]: build the dashboard from the loaded records.
    fn handle_generate_reports(&self) {
        let Some((records, load_report)) = &self.data else {
            println!("Error: No data loaded. Please load the data first (option 1).\n");
            return;
        };
        let result = Dashboard::from_records(records.clone(), load_report.clone(), &self.config)
            .and_then(|d| render(&d, &self.config));
        if let Err(e) = result {
            log::error!("Report generation failed: {}", e);
            eprintln!("Could not generate reports: {}\n", e);
        }
    }
}

/// Write every report and print previews. The report files are staged and
/// only renamed into place once all of them were written, so a failed pass
/// leaves no partial set behind.
fn render(d: &Dashboard, config: &DashboardConfig) -> Result<(), DashboardError> {
    std::fs::create_dir_all(&config.out_dir)
        .map_err(|e| DashboardError::io(&config.out_dir, e))?;
    let target = config.target_year;

    let r1 = reports::generate_year_progress(&d.buckets, &d.projections, config);
    let r2 = reports::generate_goal_deficits(&d.goals);
    let r3 = reports::generate_markers(&d.records);
    let r4 = reports::generate_status_breakdown(&d.records);
    let summary = reports::generate_summary(
        &d.records,
        &d.load_report,
        &d.buckets,
        &d.projections,
        &d.goals,
        config,
    );

    let file1 = config.out_dir.join("report1_yearly_progress.csv");
    let file2 = config.out_dir.join("report2_goal_deficits.csv");
    let file3 = config.out_dir.join("report3_project_locations.csv");
    let file4 = config.out_dir.join("report4_status_breakdown.csv");
    let summary_file = config.out_dir.join("summary.json");

    let mut staged = output::StagedOutput::new();
    staged.csv(&file1, &r1)?;
    staged.csv(&file2, &r2)?;
    staged.csv(&file3, &r3)?;
    staged.csv(&file4, &r4)?;
    staged.json(&summary_file, &summary)?;
    staged.commit()?;

    println!("Generating reports...");
    println!("Outputs saved to individual files...\n");

    println!("Report 1: Housing Progress by Year");
    println!("(Cumulative units, goal line and trend projection to {})\n", target);
    output::preview_table_rows(&r1, r1.len());
    println!("(Full table exported to {})\n", file1.display());

    println!("Report 2: Housing Goal Deficit Analysis\n");
    output::preview_table_rows(&r2, r2.len());
    println!("(Full table exported to {})\n", file2.display());

    println!("Report 3: Development Locations");
    println!("(blue = rental-dominant, green = owner-dominant, purple = mixed)\n");
    output::preview_table_rows(&r3, 5);
    println!("(Full table exported to {})\n", file3.display());

    println!("Report 4: Projects by Status\n");
    output::preview_table_rows(&r4, r4.len());
    println!("(Full table exported to {})\n", file4.display());
    println!("(Summary exported to {})\n", summary_file.display());

    match (d.goals.rental.per_year_rate, d.goals.owner.per_year_rate) {
        (PerYearRate::Needed(rental), PerYearRate::Needed(owner)) => {
            println!("To meet the {} goals, approximately:", target);
            println!("- {} new rental units per year", util::format_truncated(rental));
            println!("- {} new owner units per year", util::format_truncated(owner));
            println!(
                "are needed for the next {} years.\n",
                target - config.current_year
            );
        }
        _ => println!("The {} goal horizon has passed.\n", target),
    }
    Ok(())
}

/// Read a single line of input after printing the common "Enter choice:" prompt.
fn read_choice() -> Option<String> {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Returns `true` if the user chose to go back to the menu.
fn prompt_back_to_menu() -> bool {
    loop {
        print!("Back to Report Selection (Y/N): ");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        match io::stdin().read_line(&mut buf) {
            Ok(0) | Err(_) => return false,
            Ok(_) => {}
        }
        match buf.trim().to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn run_interactive(config: DashboardConfig) {
    let mut session = Session::new(config);
    loop {
        println!("Housing Progress Dashboard");
        println!("[1] Load the data");
        println!("[2] Generate Reports");
        println!("[3] Refresh data\n");
        let Some(choice) = read_choice() else {
            println!("Exiting the program.");
            break;
        };
        match choice.as_str() {
            "1" => session.handle_load(),
            "2" => {
                println!();
                session.handle_generate_reports();
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "3" => session.handle_refresh(),
            _ => println!("Invalid choice. Please enter 1, 2 or 3.\n"),
        }
    }
}

fn run_report(config: &DashboardConfig) -> Result<(), DashboardError> {
    let mut cache = TableCache::new(config.cache_ttl);
    let text = cache.get_or_fetch(&config.source, &Fetcher::default())?;
    let dashboard = Dashboard::from_csv(text, config)?;
    render(&dashboard, config)
}

fn main() -> ExitCode {
    pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let config = cli.dashboard_config();

    let result = match &cli.command {
        None => {
            run_interactive(config);
            Ok(())
        }
        Some(Command::Report) => run_report(&config),
        Some(Command::Geocode {
            input_csv,
            output_csv,
            address_column,
            geocoder_url,
        }) => NominatimGeocoder::new(geocoder_url).and_then(|mut geocoder| {
            geocode::batch_geocode(
                input_csv,
                output_csv,
                address_column,
                &mut geocoder,
                RETRY_DELAY,
            )
            .map(|_| ())
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
