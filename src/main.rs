use clap::Parser;
use log::info;

use ledisasm::cli::Cli;
use ledisasm::core::driver::Driver;
use ledisasm::loader::Loader;
use ledisasm::printer;

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level_filter())
        .init();

    if let Err(err) = run(&cli) {
        eprintln!("ledisasm: {}", err);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> ledisasm::error::Result<()> {
    let input = cli
        .input
        .to_str()
        .ok_or_else(|| ledisasm::error::Error::MalformedContainer("input path is not valid UTF-8".into()))?;

    let loaded = Loader::load(input)?;
    let mut driver = Driver::new(&loaded.image, &loaded.fixups);
    driver.run(loaded.entry_address)?;

    info!("{} guess(es) to investigate", driver.guess_count());

    let listing = printer::print(&loaded.image, &loaded.fixups, driver.regions(), driver.labels());

    match &cli.output {
        Some(path) => std::fs::write(path, listing).map_err(|source| ledisasm::error::Error::Io {
            path: path.display().to_string(),
            source,
        })?,
        None => print!("{}", listing),
    }

    Ok(())
}
