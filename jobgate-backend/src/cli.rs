use clap::Parser;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(
    name = "jobgate-backend",
    version,
    about = "HTTP front for queued automation jobs"
)]
pub struct CliArgs {
    /// Path to configuration file (.toml, .yaml, .yml or .json).
    #[arg(short = 'c', long = "config-path", env = "JOBGATE_CONFIG_PATH")]
    pub config_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_flag_forms() {
        let args = CliArgs::try_parse_from(["jobgate-backend", "-c", "a.toml"]).unwrap();
        assert_eq!(args.config_path.as_deref(), Some("a.toml"));

        let args =
            CliArgs::try_parse_from(["jobgate-backend", "--config-path=b.yaml"]).unwrap();
        assert_eq!(args.config_path.as_deref(), Some("b.yaml"));
    }

    #[test]
    fn unknown_flags_are_rejected() {
        assert!(CliArgs::try_parse_from(["jobgate-backend", "--bogus"]).is_err());
    }
}
