use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt;

/// Installs the stderr subscriber: `WARN` by default, `INFO` with
/// `--verbose`, `DEBUG` with `--debug`.
pub fn init(verbose: bool, debug: bool) -> Result<()> {
    let _ = fmt()
        .with_writer(std::io::stderr)
        .with_max_level(max_level(verbose, debug))
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init();
    Ok(())
}

fn max_level(verbose: bool, debug: bool) -> Level {
    if debug {
        Level::DEBUG
    } else if verbose {
        Level::INFO
    } else {
        Level::WARN
    }
}
