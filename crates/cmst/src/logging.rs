use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

use crate::args::GlobalArgs;

/// Install the stderr subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level follows `-q` and `-v`.
pub fn init(args: &GlobalArgs) {
    let level = match (args.quiet, args.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}
