//! Sort a `key:value` text file that may not fit in memory.

use clap::{Arg, ArgAction, ArgMatches, Command};
use env_logger::Env;
use std::process;

use kv_sort::{
    config::{SortConfig, SortConfigBuilder, DEFAULT_BATCH_SIZE, DEFAULT_MERGE_FAN_IN},
    error::SortResult,
    logging::log_sort_summary,
    sort, EXIT_SUCCESS,
};

fn main() {
    let matches = build_cli().get_matches();
    init_logging(&matches);

    match run(&matches) {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("kvsort: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn run(matches: &ArgMatches) -> SortResult<i32> {
    let config = parse_config_from_matches(matches)?;
    let stats = sort(&config)?;
    log_sort_summary(&stats, &config.output);
    Ok(EXIT_SUCCESS)
}

fn build_cli() -> Command {
    Command::new("kvsort")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Sort a key:value file larger than memory")
        .long_about("Sort lines of the form <key>:<value> by their unsigned 64-bit key.\n\nThe input is split into sorted runs written next to OUTPUT as OUTPUT.temp0, OUTPUT.temp1, ... and merged into OUTPUT, in several passes when there are more runs than --fan-in. OUTPUT must not be the same file as INPUT. Records with equal keys keep their input order. Lines without ':' or with a non-numeric key are skipped with a warning.")
        .arg(Arg::new("input")
            .help("File to sort")
            .required(true)
            .value_name("INPUT"))
        .arg(Arg::new("output")
            .help("File to write the sorted records to")
            .required(true)
            .value_name("OUTPUT"))
        .arg(Arg::new("batch-size")
            .short('b')
            .long("batch-size")
            .help(format!("Records held in memory per run [default: {DEFAULT_BATCH_SIZE}]"))
            .value_name("N"))
        .arg(Arg::new("buffer-size")
            .short('S')
            .long("buffer-size")
            .help("Use SIZE for each read and write buffer")
            .long_help("Use SIZE for each read and write buffer. SIZE may be followed by K, M or G (powers of 1024). Minimum 1K, default 1M.")
            .value_name("SIZE"))
        .arg(Arg::new("fan-in")
            .long("fan-in")
            .help(format!("Merge at most N runs at once [default: {DEFAULT_MERGE_FAN_IN}]"))
            .value_name("N"))
        .arg(Arg::new("verbose")
            .short('v')
            .long("verbose")
            .help("Log run spills and phase changes")
            .action(ArgAction::SetTrue)
            .conflicts_with("quiet"))
        .arg(Arg::new("quiet")
            .short('q')
            .long("quiet")
            .help("Only log errors")
            .action(ArgAction::SetTrue))
}

fn init_logging(matches: &ArgMatches) {
    let level = if matches.get_flag("verbose") {
        "debug"
    } else if matches.get_flag("quiet") {
        "error"
    } else {
        "info"
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();
}

/// Parse configuration from command line matches
fn parse_config_from_matches(matches: &ArgMatches) -> SortResult<SortConfig> {
    let input = matches
        .get_one::<String>("input")
        .cloned()
        .unwrap_or_default();
    let output = matches
        .get_one::<String>("output")
        .cloned()
        .unwrap_or_default();

    let mut config = SortConfigBuilder::new()
        .input(input)
        .output(output)
        .build()?;

    if let Some(batch_str) = matches.get_one::<String>("batch-size") {
        config.set_batch_size_from_string(batch_str)?;
    }

    if let Some(buffer_str) = matches.get_one::<String>("buffer-size") {
        config.set_buffer_size_from_string(buffer_str)?;
    }

    if let Some(fan_in_str) = matches.get_one::<String>("fan-in") {
        config.set_merge_fan_in_from_string(fan_in_str)?;
    }

    // Validate the final configuration
    config.validate()?;

    Ok(config)
}
