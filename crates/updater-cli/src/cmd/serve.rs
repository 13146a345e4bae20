use anyhow::Context;
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use updater_core::config::UpdateConfig;
use updater_core::executor::ProcessRunner;
use updater_core::github::{GithubClient, DEFAULT_ENDPOINT};
use updater_core::workspace::{GitClient, DEFAULT_GIT_BASE_URL};
use updater_core::Pipeline;
use updater_server::AppState;

#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(long, env = "CONFIG_UPDATER_PORT", default_value = "8888")]
    pub port: u16,

    /// File holding the webhook HMAC secret
    #[arg(long, env = "CONFIG_UPDATER_HMAC_SECRET_FILE")]
    pub hmac_secret_file: PathBuf,

    /// File holding the GitHub OAuth token (anonymous access when omitted)
    #[arg(long, env = "CONFIG_UPDATER_GITHUB_TOKEN_FILE")]
    pub github_token_file: Option<PathBuf>,

    /// GitHub API base URL
    #[arg(
        long,
        env = "CONFIG_UPDATER_GITHUB_ENDPOINT",
        default_value = DEFAULT_ENDPOINT
    )]
    pub github_endpoint: String,

    /// Base URL repositories are cloned from
    #[arg(
        long,
        env = "CONFIG_UPDATER_GIT_BASE_URL",
        default_value = DEFAULT_GIT_BASE_URL
    )]
    pub git_base_url: String,

    /// Name the bot identifies itself with towards GitHub
    #[arg(
        long,
        env = "CONFIG_UPDATER_BOT_NAME",
        default_value = "config-updater"
    )]
    pub bot_name: String,
}

fn read_secret(path: &Path) -> anyhow::Result<String> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read secret file {}", path.display()))?;
    Ok(raw.trim_end().to_string())
}

pub fn run(config_path: &Path, args: ServeArgs) -> anyhow::Result<()> {
    let config = UpdateConfig::load(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    for w in config.validate() {
        tracing::warn!(level = ?w.level, "{}", w.message);
    }
    if config.has_errors() {
        anyhow::bail!("refusing to start: {} has errors", config_path.display());
    }

    let hmac_secret = read_secret(&args.hmac_secret_file)?;
    if hmac_secret.is_empty() {
        anyhow::bail!(
            "HMAC secret file {} is empty",
            args.hmac_secret_file.display()
        );
    }
    let token = args
        .github_token_file
        .as_deref()
        .map(read_secret)
        .transpose()?
        .filter(|t| !t.is_empty());

    // The blocking HTTP client must be built outside the async runtime.
    let github = GithubClient::new(&args.github_endpoint, token.clone(), &args.bot_name)
        .context("failed to build GitHub client")?;
    let scm = GitClient::new(&args.git_base_url, token);
    let runner = ProcessRunner::new(config.task_timeout());

    tracing::info!(
        targets = config.targets.len(),
        matchers = config.matchers.len(),
        "loaded update configuration"
    );

    let pipeline = Pipeline::new(
        Arc::new(config),
        Arc::new(github),
        Arc::new(scm),
        Arc::new(runner),
    );
    let state = AppState::new(pipeline, hmac_secret.into_bytes());

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(updater_server::serve(state, args.port))
}
