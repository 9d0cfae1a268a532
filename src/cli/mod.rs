//! CLI command definitions and process setup.

pub mod args;

use patchpilot::constants::ENV_LOG;
use patchpilot::env::Env;
use tracing_subscriber::EnvFilter;

/// Filter directive for the log subscriber.
///
/// `PATCHPILOT_LOG` wins, then `RUST_LOG`. Without either, the level
/// follows the `-v` count starting from `warn`.
pub fn log_filter(verbose: u8, env: &Env) -> String {
    if let Some(directive) = env.first_of(&[ENV_LOG, "RUST_LOG"]) {
        return directive;
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
    .to_string()
}

/// Install the global subscriber. Logs go to stderr so stdout carries only
/// the rendered report.
pub fn init_tracing(verbose: u8, env: &Env) {
    let directive = log_filter(verbose, env);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        let env = Env::mock(Vec::<(&str, &str)>::new());
        assert_eq!(log_filter(0, &env), "warn");
        assert_eq!(log_filter(1, &env), "info");
        assert_eq!(log_filter(2, &env), "debug");
        assert_eq!(log_filter(5, &env), "trace");
    }

    #[test]
    fn env_directive_overrides_flags() {
        let env = Env::mock([("RUST_LOG", "info"), (ENV_LOG, "patchpilot=debug")]);
        assert_eq!(log_filter(0, &env), "patchpilot=debug");
        let env = Env::mock([("RUST_LOG", "error")]);
        assert_eq!(log_filter(2, &env), "error");
    }
}
