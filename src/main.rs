//! gt - Gas Town 命令行
//!
//! - `gt daemon`：运行生命周期守护进程，直到 Ctrl+C / SIGTERM
//! - `gt status`：输出 town 状态（文本树或 `--json`）
//! - `gt lifecycle <action> --from <identity>`：向存储投递一条生命周期请求

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use gastown::config::{load_config, AppConfig};
use gastown::core::ShutdownManager;
use gastown::lifecycle::{DaemonConfig, LifecycleAction, LifecycleDaemon};
use gastown::session::TmuxSessions;
use gastown::status::{render_status, RenderOptions, StatusAggregator};
use gastown::store::{open_read_only_or_empty, Message, MessageStore, SqliteMessageStore};
use gastown::town::{find_town_root, load_town_config_or_default, FsRigDiscovery};

/// Gas Town 控制面
#[derive(Parser)]
#[command(name = "gt", version, about, long_about = None)]
struct Cli {
    /// 配置文件路径（覆盖 config/gt.toml 查找）
    #[arg(short, long, global = true, env = "GT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// 以 JSON 行输出日志
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行生命周期守护进程
    Daemon,

    /// 显示 town 状态
    #[command(alias = "stat")]
    Status {
        /// 输出 JSON
        #[arg(long)]
        json: bool,

        /// 关闭颜色
        #[arg(long)]
        no_color: bool,
    },

    /// 投递生命周期请求
    Lifecycle {
        #[arg(value_enum)]
        action: ActionArg,

        /// 请求方身份（如 mayor、gastown-witness）
        #[arg(long)]
        from: String,

        /// 收件人（守护进程配置了 inbox 时需要）
        #[arg(long)]
        to: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ActionArg {
    Cycle,
    Restart,
    Shutdown,
}

impl From<ActionArg> for LifecycleAction {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Cycle => LifecycleAction::Cycle,
            ActionArg::Restart => LifecycleAction::Restart,
            ActionArg::Shutdown => LifecycleAction::Shutdown,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    gastown::observability::init(cli.json_logs);

    let config = load_config(cli.config).context("Failed to load configuration")?;
    let root = town_root(&config)?;

    match cli.command {
        Commands::Daemon => run_daemon(&config, &root).await,
        Commands::Status { json, no_color } => {
            let options = if json {
                RenderOptions::json()
            } else {
                RenderOptions::text(!no_color && std::io::stdout().is_terminal())
            };
            run_status(&config, &root, options).await
        }
        Commands::Lifecycle { action, from, to } => {
            post_request(&config, &root, action.into(), &from, to).await
        }
    }
}

/// 配置中的 town.root 优先，否则从当前目录向上查找；找不到是致命错误
fn town_root(config: &AppConfig) -> anyhow::Result<PathBuf> {
    if let Some(root) = &config.town.root {
        return Ok(root.clone());
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(find_town_root(&cwd)?)
}

fn open_store(config: &AppConfig, root: &Path) -> anyhow::Result<Arc<SqliteMessageStore>> {
    let path = config.store.resolve(root);
    let store = SqliteMessageStore::open(&path)
        .with_context(|| format!("Failed to open store at {}", path.display()))?;
    Ok(Arc::new(store))
}

fn sessions(config: &AppConfig, root: &Path) -> Arc<TmuxSessions> {
    Arc::new(
        TmuxSessions::new(config.sessions.tmux_binary.clone())
            .with_start_command(config.sessions.start_command.clone())
            .with_workdir(root),
    )
}

async fn run_daemon(config: &AppConfig, root: &Path) -> anyhow::Result<()> {
    let store = open_store(config, root)?;
    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();

    tracing::info!(town = %root.display(), "starting lifecycle daemon");
    let mut daemon = LifecycleDaemon::new(
        store,
        sessions(config, root),
        DaemonConfig::from(&config.daemon),
    );
    daemon.run(shutdown.token()).await;
    Ok(())
}

async fn run_status(config: &AppConfig, root: &Path, options: RenderOptions) -> anyhow::Result<()> {
    let store = open_read_only_or_empty(&config.store.resolve(root));
    let town = load_town_config_or_default(root);
    let aggregator = StatusAggregator::new(
        store,
        sessions(config, root),
        Arc::new(FsRigDiscovery::from_root(root)),
    );

    let status = aggregator
        .collect(&town, root)
        .await
        .context("Failed to collect town status")?;
    print!("{}", render_status(&status, options)?);
    Ok(())
}

async fn post_request(
    config: &AppConfig,
    root: &Path,
    action: LifecycleAction,
    from: &str,
    to: Option<String>,
) -> anyhow::Result<()> {
    let store = open_store(config, root)?;
    let mut message = Message::new(from, format!("LIFECYCLE: {from} requesting {action}"))
        .with_type("lifecycle");
    if let Some(to) = to.or_else(|| config.daemon.inbox.clone()) {
        message = message.with_to(to);
    }

    let message = store
        .append_message(message)
        .await
        .context("Failed to post lifecycle request")?;
    println!("posted {} (#{}): {}", message.id, message.seq, message.subject);
    Ok(())
}
