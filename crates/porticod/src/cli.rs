//! Command-line surface of the daemon.

use std::path::PathBuf;

use clap::Parser;

/// Command-line arguments accepted by `porticod`.
///
/// The configuration path may also be supplied through the
/// `PORTICO_CONFIG` environment variable; the flag wins when both are set.
/// With neither, the daemon runs on built-in defaults and an empty plugin
/// server list.
#[derive(Debug, Parser)]
#[command(name = "porticod", about = "Portico gateway daemon", version)]
pub struct DaemonArgs {
    /// Path to the gateway configuration document.
    #[arg(long, value_name = "PATH")]
    pub config_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::DaemonArgs;

    #[test]
    fn config_path_is_optional() {
        let args = DaemonArgs::parse_from(["porticod"]);
        assert!(args.config_path.is_none());
    }

    #[test]
    fn config_path_flag_is_parsed() {
        let args = DaemonArgs::parse_from(["porticod", "--config-path", "/etc/portico.toml"]);
        assert_eq!(
            args.config_path.as_deref(),
            Some(std::path::Path::new("/etc/portico.toml"))
        );
    }
}
