use std::process;

use structopt::StructOpt;

use scallop_asm::cli;

fn setup_logger(verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[{}] {}: {}", record.level(), record.target(), message))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .expect("logger can only be initialized once");
}

fn main() {
    let opt = cli::Cli::from_args();
    setup_logger(opt.verbose);

    if let Err(err) = cli::run(opt) {
        log::error!("{:#}", err);
        process::exit(1);
    }
}
