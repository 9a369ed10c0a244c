//! Generate a random `key:value` file to feed to `kvsort`.

use clap::{value_parser, Arg, ArgMatches, Command};
use env_logger::Env;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use kv_sort::{
    config::DEFAULT_BUFFER_SIZE,
    error::{SortContext, SortError, SortResult},
    generate::write_dataset,
    logging::{format_count, format_duration},
    EXIT_SUCCESS,
};

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let matches = build_cli().get_matches();
    match run(&matches) {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("kvgen: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn build_cli() -> Command {
    Command::new("kvgen")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Write LINES random <key>:<value> records")
        .arg(Arg::new("lines")
            .help("Number of records to generate")
            .required(true)
            .value_name("LINES")
            .value_parser(value_parser!(u64)))
        .arg(Arg::new("output")
            .short('o')
            .long("output")
            .help("File to write")
            .value_name("FILE")
            .default_value("gen_data.txt"))
        .arg(Arg::new("seed")
            .long("seed")
            .help("Seed for reproducible data")
            .value_name("N")
            .value_parser(value_parser!(u64)))
}

fn run(matches: &ArgMatches) -> SortResult<i32> {
    let lines = matches.get_one::<u64>("lines").copied().unwrap_or_default();
    if lines == 0 {
        return Err(SortError::invalid_argument("LINES must be a positive number"));
    }

    let output = matches
        .get_one::<String>("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("gen_data.txt"));

    let mut rng = match matches.get_one::<u64>("seed") {
        Some(&seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let started = Instant::now();
    let file = File::create(&output).output_context(&output)?;
    let mut writer = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file);
    write_dataset(&mut writer, &mut rng, lines).write_context(&output)?;

    info!(
        "Wrote {} records to {} in {}",
        format_count(lines),
        output.display(),
        format_duration(started.elapsed())
    );
    Ok(EXIT_SUCCESS)
}
