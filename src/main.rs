use clap::{Arg, Command as ClapCommand, ArgAction};
use std::process;
use log::{error, LevelFilter};

use ttdump::compression::CompressionFactory;
use ttdump::utils::logger::Logger;
use ttdump::commands::{CommandFactory, TtdumpCommandFactory};

fn main() {
    let matches = ClapCommand::new("ttdump_to_tiff")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Convert a tifftools dump output to a tiff file")
        .long_about(
            "Convert a tifftools dump output to a tiff file. Pixel data is replaced \
             with placeholder bytes. For minimal size, run \"tifftools -y <path> --dedup\" \
             afterwards.",
        )
        .arg(
            Arg::new("source")
                .help("Source tifftools dump filename")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("out")
                .help("Output image filename")
                .required(true)
                .index(2),
        )
        .arg(
            Arg::new("compression")
                .long("compression")
                .help("Placeholder compression. If trying to recreate an ImageJ file, use \"none\"")
                .value_name("NAME")
                .value_parser(CompressionFactory::available_names().to_vec())
                .default_value("packbits"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log verbosity (repeat for more)")
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .help("Append a record of each pipeline stage to this file")
                .value_name("FILE")
                .required(false),
        )
        .arg(
            Arg::new("progress")
                .long("progress")
                .help("Show progress bars while writing")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let level = match matches.get_count("verbose") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let logger = match matches.get_one::<String>("log-file") {
        Some(path) => match Logger::new(path) {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error opening log file {}: {}", path, e);
                process::exit(1);
            }
        },
        None => Logger::disabled(),
    };

    let factory = TtdumpCommandFactory::new();

    let command_result = factory.create_command(&matches, &logger);
    match command_result {
        Ok(command) => {
            if let Err(e) = command.execute() {
                error!("Command execution error: {}", e);
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        Err(e) => {
            error!("Failed to create command: {}", e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
}
