//! Daily collection entry point.
//!
//! With no arguments, collects yesterday's data for every plant and
//! folds it into the master table. An explicit date or date range, a
//! plant code and a unit range can be supplied for backfills.

use std::path::Path;
use std::process;

use chrono::Local;

use pvcollect_service::collect::{self, StdDelay};
use pvcollect_service::config::{self, CollectorConfig};
use pvcollect_service::ingest::koenergy::KoenergyClient;
use pvcollect_service::logging::{self, Component, LogLevel};
use pvcollect_service::merge;
use pvcollect_service::model::FetchFilters;

const DEFAULT_CONFIG_PATH: &str = "./koenergy.toml";

fn print_usage() {
    eprintln!("Usage: pvcollect_service [OPTIONS]");
    eprintln!();
    eprintln!("  --date DATE      collect a single day (YYYYMMDD, YYYY-MM-DD or YYYY/MM/DD);");
    eprintln!("                   defaults to yesterday");
    eprintln!("  --start DATE     range start for a backfill (requires --end)");
    eprintln!("  --end DATE       range end for a backfill");
    eprintln!("  --org CODE       plant org code, e.g. 84S1 (default: all plants)");
    eprintln!("  --hoki-s UNIT    first unit of the unit range (default: all)");
    eprintln!("  --hoki-e UNIT    last unit of the unit range (default: all)");
    eprintln!("  --config PATH    config file (default: {})", DEFAULT_CONFIG_PATH);
    eprintln!("  --skip-merge     persist artifacts without touching the master table");
}

fn main() {
    dotenv::dotenv().ok();
    logging::init_logger(LogLevel::Info, None);

    if let Err(e) = run() {
        logging::error(Component::System, None, &e.to_string());
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut date_arg: Option<String> = None;
    let mut start_arg: Option<String> = None;
    let mut end_arg: Option<String> = None;
    let mut config_path: Option<String> = None;
    let mut filters = FetchFilters::all();
    let mut skip_merge = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut take = |name: &str| {
            args.next()
                .ok_or_else(|| format!("{} requires a value", name))
        };
        match arg.as_str() {
            "--date" => date_arg = Some(take("--date")?),
            "--start" => start_arg = Some(take("--start")?),
            "--end" => end_arg = Some(take("--end")?),
            "--org" => filters.org_no = Some(take("--org")?),
            "--hoki-s" => filters.hoki_s = Some(take("--hoki-s")?),
            "--hoki-e" => filters.hoki_e = Some(take("--hoki-e")?),
            "--config" => config_path = Some(take("--config")?),
            "--skip-merge" => skip_merge = true,
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other => {
                print_usage();
                return Err(format!("unknown argument: {}", other).into());
            }
        }
    }

    let mut cfg = match &config_path {
        Some(path) => CollectorConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            CollectorConfig::load(DEFAULT_CONFIG_PATH)?
        }
        None => CollectorConfig::default(),
    };
    cfg.apply_env_overrides();

    let (start, end) = match (&start_arg, &end_arg) {
        (Some(s), Some(e)) => {
            let start = config::parse_compact_date(&config::normalize_target_date(s)?)?;
            let end = config::parse_compact_date(&config::normalize_target_date(e)?)?;
            (start, end)
        }
        (None, None) => {
            let target =
                config::resolve_target_date(date_arg.as_deref(), Local::now().date_naive())?;
            (target, target)
        }
        _ => return Err("--start and --end must be given together".into()),
    };

    logging::info(
        Component::System,
        None,
        &format!("collecting {}~{} (tag: {})", start, end, collect::file_tag(&filters)),
    );

    let mut client = KoenergyClient::new(&cfg)?;
    let mut delay = StdDelay;
    let summary = collect::run_collection(&cfg, &filters, start, end, &mut client, &mut delay)?;

    let report_path = collect::write_report(&cfg, &summary)?;
    logging::info(
        Component::System,
        None,
        &format!("run report written to {}", report_path.display()),
    );

    if skip_merge {
        logging::info(Component::System, None, "merge skipped on request");
        return Ok(());
    }

    let master = cfg.master_path();
    for artifact in summary.artifact_paths() {
        let outcome = merge::merge_files(Path::new(artifact), &master)?;
        logging::info(
            Component::System,
            Some(artifact),
            &format!(
                "folded into {}: {} added, {} skipped",
                master.display(),
                outcome.added,
                outcome.skipped
            ),
        );
    }

    Ok(())
}
