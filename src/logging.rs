use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber, writing to stderr so stdout stays clean
/// for command output.
///
/// `RUST_LOG` wins when set. Otherwise see [`default_directives`].
pub fn init(verbose: bool, quiet: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let fallback = default_directives(verbose, quiet);
    let filter_layer = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(fallback))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .compact();

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// `info`, `debug` for this crate when verbose, `warn` when quiet so
/// per-mod events stay off stderr
pub fn default_directives(verbose: bool, quiet: bool) -> &'static str {
    if quiet {
        "warn"
    } else if verbose {
        "info,mmm=debug"
    } else {
        "info"
    }
}
