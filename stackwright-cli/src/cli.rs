//! Command-line definitions.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "stackwright")]
#[command(about = "Converge cloud stacks with rendered templates", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Credential profile
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Provider region
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Parameter as name:value (repeatable)
    #[arg(long = "parameter", global = true, value_name = "NAME:VALUE")]
    pub parameters: Vec<String>,

    /// YAML or JSON file of parameter values
    #[arg(long, global = true)]
    pub parameter_file: Option<PathBuf>,

    /// Section of the parameter file merged over its top level
    #[arg(long, global = true, requires = "parameter_file")]
    pub parameter_environment: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create or update a stack
    Converge(ConvergeArgs),

    /// Print a stack's status, parameters and outputs
    Describe {
        /// Stack name
        stack: String,
    },

    /// Print a stack's events
    Tail {
        /// Stack name
        stack: String,

        /// Keep printing until the stack settles
        #[arg(short, long)]
        follow: bool,

        /// Number of existing events to print first
        #[arg(short, long, default_value_t = 10)]
        number: usize,
    },

    /// Render a template to stdout
    Generate {
        /// Template file (.json, .yaml or .yml)
        template: PathBuf,

        /// Print compact JSON
        #[arg(long)]
        minified: bool,
    },

    /// Delete a stack
    Delete {
        /// Stack name
        stack: String,

        /// Return without waiting for the deletion to finish
        #[arg(long)]
        no_follow: bool,
    },

    /// Estimate the monthly cost of a template
    Estimate {
        /// Upload location for large templates (s3://bucket/prefix)
        #[arg(long)]
        s3_path: Option<String>,

        /// Template file followed by optional name=value parameters
        #[arg(required = true, num_args = 1..)]
        args: Vec<String>,
    },
}

#[derive(Debug, Clone, Args)]
pub struct ConvergeArgs {
    /// Template file; defaults to <stack>.json, <stack>.yaml or <stack>.yml
    #[arg(short, long)]
    pub template: Option<PathBuf>,

    /// Action when creation fails (DO_NOTHING, ROLLBACK or DELETE)
    #[arg(long)]
    pub on_failure: Option<String>,

    /// Creation timeout in minutes
    #[arg(long)]
    pub timeout: Option<u32>,

    /// Notification topic ARNs
    #[arg(long, value_delimiter = ',')]
    pub notification_arns: Vec<String>,

    /// Stack policy [file|url|json]
    #[arg(short = 's', long)]
    pub stack_policy: Option<String>,

    /// Temporary stack policy during an update [file|url|json]
    #[arg(short = 'u', long)]
    pub stack_policy_during_update: Option<String>,

    /// Service role the provider assumes
    #[arg(long)]
    pub role_arn: Option<String>,

    /// Create a change-set with this name instead of updating
    #[arg(long)]
    pub change: Option<String>,

    /// Description of the change-set
    #[arg(long, requires = "change")]
    pub change_description: Option<String>,

    /// Upload location for large templates (s3://bucket/prefix)
    #[arg(long)]
    pub s3_path: Option<String>,

    /// Upload the template even when it fits inline
    #[arg(long, requires = "s3_path")]
    pub force_s3: bool,

    /// Return without waiting for the stack to settle
    #[arg(long)]
    pub no_follow: bool,

    /// Number of existing events to print before following
    #[arg(short, long, default_value_t = 0)]
    pub number: usize,

    /// Stack name followed by optional name=value parameters
    #[arg(required = true, num_args = 1..)]
    pub args: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_converge_args() {
        let cli = Cli::try_parse_from([
            "stackwright",
            "--profile",
            "ops",
            "converge",
            "-t",
            "web.yaml",
            "--change",
            "review",
            "web",
            "Size=large",
        ])
        .unwrap();

        assert_eq!(cli.global.profile.as_deref(), Some("ops"));
        let Commands::Converge(args) = cli.command else {
            panic!("expected converge");
        };
        assert_eq!(args.template, Some(PathBuf::from("web.yaml")));
        assert_eq!(args.change.as_deref(), Some("review"));
        assert_eq!(args.args, vec!["web".to_string(), "Size=large".to_string()]);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "stackwright",
            "tail",
            "web",
            "-f",
            "--parameter",
            "A:1",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.global.parameters, vec!["A:1".to_string()]);
        assert_eq!(cli.global.log_format, LogFormat::Json);
        assert!(matches!(cli.command, Commands::Tail { follow: true, number: 10, .. }));
    }

    #[test]
    fn test_flags_after_stack_name() {
        let cli = Cli::try_parse_from(["stackwright", "converge", "web", "--no-follow", "A=1"]).unwrap();
        let Commands::Converge(args) = cli.command else {
            panic!("expected converge");
        };
        assert!(args.no_follow);
        assert_eq!(args.args, vec!["web".to_string(), "A=1".to_string()]);
    }

    #[test]
    fn test_force_s3_requires_path() {
        assert!(Cli::try_parse_from(["stackwright", "converge", "--force-s3", "web"]).is_err());
    }

    #[test]
    fn test_estimate_takes_upload_location() {
        let cli = Cli::try_parse_from([
            "stackwright",
            "estimate",
            "--s3-path",
            "s3://deploy/cfn",
            "web.yaml",
            "Size=large",
        ])
        .unwrap();
        let Commands::Estimate { s3_path, args } = cli.command else {
            panic!("expected estimate");
        };
        assert_eq!(s3_path.as_deref(), Some("s3://deploy/cfn"));
        assert_eq!(args, vec!["web.yaml".to_string(), "Size=large".to_string()]);
    }

    #[test]
    fn test_notification_arns_split() {
        let cli = Cli::try_parse_from([
            "stackwright",
            "converge",
            "--notification-arns",
            "arn:a,arn:b",
            "web",
        ])
        .unwrap();
        let Commands::Converge(args) = cli.command else {
            panic!("expected converge");
        };
        assert_eq!(args.notification_arns, vec!["arn:a".to_string(), "arn:b".to_string()]);
    }
}
