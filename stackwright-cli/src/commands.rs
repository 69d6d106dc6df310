//! Command handlers.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use stackwright::cancellation::CancellationToken;
use stackwright::config::EngineConfig;
use stackwright::converge::{ChangeSetOptions, ConvergeOptions, Orchestrator, UploadLocation};
use stackwright::credentials::{CredentialManager, SessionCache};
use stackwright::diagnostics::{DiagnosticSink, TracingSink};
use stackwright::document::StackDocument;
use stackwright::parameters::ParameterInputs;
use stackwright::provider::aws::{sdk_config, CloudFormationProvider, S3ObjectStore, StsRoleAssumer};
use stackwright::provider::{OnFailure, StackPolicy, StackProvider};
use stackwright::state::RemoteStateCache;
use stackwright::tail::{EventTailer, TailOptions, TailOutcome};

use crate::cli::{Commands, ConvergeArgs, GlobalArgs};
use crate::output::{format_event, is_failed_status};
use crate::prompt::TerminalMfaPrompt;

const TEMPLATE_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// Runs one command to completion.
pub async fn run(command: Commands, global: &GlobalArgs, cancel: &CancellationToken) -> Result<()> {
    match command {
        Commands::Generate { template, minified } => generate(&template, minified),
        Commands::Converge(args) => Engine::connect(global).await?.converge(args, global, cancel).await,
        Commands::Describe { stack } => Engine::connect(global).await?.describe(&stack).await,
        Commands::Tail { stack, follow, number } => {
            let mut options = TailOptions::new(number);
            if follow {
                options = options.following();
            }
            Engine::connect(global).await?.tail(&stack, &options, cancel).await
        }
        Commands::Delete { stack, no_follow } => {
            Engine::connect(global).await?.delete(&stack, !no_follow, cancel).await
        }
        Commands::Estimate { s3_path, args } => {
            Engine::connect(global).await?.estimate(args, s3_path.as_deref(), global).await
        }
    }
}

fn generate(template: &Path, minified: bool) -> Result<()> {
    let document = StackDocument::from_path(template)?;
    document.validate_structure()?;
    if minified {
        println!("{}", document.body());
    } else {
        println!("{}", document.to_pretty()?);
    }
    Ok(())
}

/// Live provider wiring for commands that talk to the remote API.
struct Engine {
    orchestrator: Orchestrator,
    tailer: EventTailer,
    config: EngineConfig,
}

impl Engine {
    async fn connect(global: &GlobalArgs) -> Result<Self> {
        let mut config = EngineConfig::from_env();
        if let Some(profile) = &global.profile {
            config = config.with_profile(profile.clone());
        }
        if let Some(region) = &global.region {
            config = config.with_region(region.clone());
        }
        debug!(profile = %config.profile, region = ?config.region, "Connecting");

        let sink: Arc<dyn DiagnosticSink> = Arc::new(TracingSink);
        let credentials = CredentialManager::new(
            config.credentials_file.clone(),
            SessionCache::new(config.session_cache_dir.clone()),
            Arc::new(StsRoleAssumer::new(config.region.clone())),
            Arc::new(TerminalMfaPrompt::new(config.profile.clone())),
            sink.clone(),
        );
        let session = credentials.credentials_for(&config.profile).await?;
        let sdk = sdk_config(&session, config.region.as_deref()).await;

        let provider: Arc<dyn StackProvider> = Arc::new(CloudFormationProvider::new(&sdk));
        let cache = Arc::new(RemoteStateCache::new(provider.clone(), sink.clone()));
        let orchestrator = Orchestrator::new(provider.clone(), cache, sink.clone(), config.clone())
            .with_object_store(Arc::new(S3ObjectStore::new(&sdk)));
        let tailer = EventTailer::new(provider, sink);

        Ok(Self {
            orchestrator,
            tailer,
            config,
        })
    }

    async fn converge(&self, args: ConvergeArgs, global: &GlobalArgs, cancel: &CancellationToken) -> Result<()> {
        let (inputs, rest) = collect_inputs(global, args.args.clone())?;
        let stack = single_positional(rest, "stack name")?;
        let template = find_template(Path::new("."), &stack, args.template.clone())?;
        let document = StackDocument::from_path(&template)?;
        let options = converge_options(&args)?;

        let outcome = self
            .orchestrator
            .converge(&stack, &document, inputs.values(), &options)
            .await?;

        if !outcome.is_in_progress() || args.no_follow {
            println!("Stack {stack} {}", outcome.verb());
            return Ok(());
        }
        let tail = TailOptions::new(args.number)
            .following()
            .with_backoff(self.config.poll.clone());
        self.follow(&stack, &tail, cancel).await
    }

    async fn describe(&self, stack: &str) -> Result<()> {
        let description = self.orchestrator.describe(stack).await?;
        println!("{}", serde_json::to_string_pretty(&description)?);
        Ok(())
    }

    async fn tail(&self, stack: &str, options: &TailOptions, cancel: &CancellationToken) -> Result<()> {
        let options = options.clone().with_backoff(self.config.poll.clone());
        self.follow(stack, &options, cancel).await
    }

    async fn delete(&self, stack: &str, follow: bool, cancel: &CancellationToken) -> Result<()> {
        self.orchestrator.delete(stack).await?;
        if !follow {
            println!("Deletion of stack {stack} requested");
            return Ok(());
        }
        let options = TailOptions::new(0)
            .following()
            .with_backoff(self.config.poll.clone());
        match self.follow(stack, &options, cancel).await {
            Err(e) if is_not_found(&e) => {
                println!("Stack {stack} deleted");
                Ok(())
            }
            other => other,
        }
    }

    async fn estimate(&self, args: Vec<String>, s3_path: Option<&str>, global: &GlobalArgs) -> Result<()> {
        let (inputs, rest) = collect_inputs(global, args)?;
        let template = PathBuf::from(single_positional(rest, "template")?);
        let document = StackDocument::from_path(&template)?;
        let location = s3_path.map(str::parse::<UploadLocation>).transpose()?;
        let url = self.orchestrator.estimate(&document, inputs.values(), location).await?;
        println!("{url}");
        Ok(())
    }

    async fn follow(&self, stack: &str, options: &TailOptions, cancel: &CancellationToken) -> Result<()> {
        let outcome = self
            .tailer
            .tail(stack, options, cancel, |event| println!("{}", format_event(event)))
            .await?;
        match outcome {
            TailOutcome::Settled { status } if is_failed_status(&status) => {
                bail!("Stack {stack} settled in {status}")
            }
            TailOutcome::Settled { status } => info!(stack = %stack, status = %status, "Stack settled"),
            TailOutcome::StackGone => println!("Stack {stack} deleted"),
            TailOutcome::Cancelled => bail!("{} while following stack {stack}", cancel_reason(cancel)),
            TailOutcome::Snapshot => {}
        }
        Ok(())
    }
}

fn cancel_reason(cancel: &CancellationToken) -> String {
    cancel.reason().unwrap_or_else(|| "Cancelled".to_string())
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<stackwright::errors::StackwrightError>()
        .is_some_and(stackwright::errors::StackwrightError::is_not_found)
}

/// Merges parameter sources in precedence order and returns the remaining
/// positional arguments.
fn collect_inputs(global: &GlobalArgs, args: Vec<String>) -> Result<(ParameterInputs, Vec<String>)> {
    let mut inputs = ParameterInputs::new();
    if let Some(path) = &global.parameter_file {
        inputs.merge_file(path, global.parameter_environment.as_deref())?;
    }
    for flag in &global.parameters {
        inputs.merge_flag(flag)?;
    }
    let rest = inputs.extract_assignments(args);
    Ok((inputs, rest))
}

fn single_positional(mut rest: Vec<String>, what: &str) -> Result<String> {
    match rest.len() {
        1 => Ok(rest.remove(0)),
        0 => bail!("Missing {what}"),
        _ => bail!("Expected one {what}, got: {}", rest.join(" ")),
    }
}

/// Returns `explicit`, or the first of `<stack>.json`, `<stack>.yaml` and
/// `<stack>.yml` found in `dir`.
fn find_template(dir: &Path, stack: &str, explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    TEMPLATE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{stack}.{ext}")))
        .find(|path| path.is_file())
        .with_context(|| {
            format!("No template given and none of {stack}.json, {stack}.yaml or {stack}.yml exists")
        })
}

fn converge_options(args: &ConvergeArgs) -> Result<ConvergeOptions> {
    let mut options = args
        .notification_arns
        .iter()
        .fold(ConvergeOptions::new(), |options, arn| options.with_notification_arn(arn.clone()));

    if let Some(name) = &args.change {
        let mut change_set = ChangeSetOptions::new(name.clone());
        if let Some(description) = &args.change_description {
            change_set = change_set.with_description(description.clone());
        }
        options = options.with_change_set(change_set);
    }
    if let Some(raw) = &args.stack_policy {
        options = options.with_stack_policy(StackPolicy::detect(raw)?);
    }
    if let Some(raw) = &args.stack_policy_during_update {
        options = options.with_stack_policy_during_update(StackPolicy::detect(raw)?);
    }
    if let Some(raw) = &args.on_failure {
        options = options.with_on_failure(raw.parse::<OnFailure>()?);
    }
    if let Some(minutes) = args.timeout {
        options = options.with_timeout_minutes(minutes);
    }
    if let Some(role) = &args.role_arn {
        options = options.with_role_arn(role.clone());
    }
    if let Some(path) = &args.s3_path {
        options = options.with_upload_location(path.parse::<UploadLocation>()?);
    }
    Ok(options.with_force_upload(args.force_s3))
}
