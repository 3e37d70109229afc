use clap::{Parser, Subcommand};
use docnav::api::Api;
use docnav::config::{self, DocnavConfig};
use docnav::doc_store::DocStore;
use docnav::nav_store::NavStore;
use docnav::{output, server, vcs};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn version_string() -> &'static str {
    let on_tag = env!("DOCNAV_ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("DOCNAV_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "docnav")]
#[command(about = "Navigation and document editing API for documentation sites")]
#[command(long_about = "\
Navigation and document editing API for documentation sites

Serves /api/<resource>/<action>/<args...> over one content root. Every
write keeps a timestamped backup of what it replaced and, when the root is
a git repository, is committed with the editor's name.

Content structure:

  site/
  ├── docnav.toml                  # Optional config (see gen-config)
  ├── nav/
  │   ├── main.json                # Canonical menu, {\"sidemenu\": [...]}
  │   └── api.json                 # Other menus, bare [...] arrays
  ├── docs/                        # Editable documents (.md .html .txt)
  │   └── guide.md
  └── examples/

API resources:
  Nav         get list save delete addItem updateItem removeItem
              history version compare
  Doc         get list save delete history version compare
  Diagnostic  git

Run 'docnav gen-config' to generate a documented docnav.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Content root
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Config file (default: <root>/docnav.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the editing API over HTTP
    Serve {
        /// Listen address, overriding [server] bind
        #[arg(long)]
        bind: Option<String>,
    },
    /// Validate config and content, and report version control status
    Check,
    /// Print a stock docnav.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    init_tracing();
    let mut config = load_config(&cli.root, cli.config.as_deref())?;
    let vcs = vcs::detect(&cli.root, &config.vcs);

    match cli.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            let addr = config.server.socket_addr()?;
            let api = Arc::new(Api::new(&cli.root, &config, vcs));
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(server::serve(api, addr, &config.vcs.default_author))?;
        }
        Command::Check => {
            println!("==> Checking {}", cli.root.display());
            output::print_config_summary(&config);

            println!();
            println!("Navigation");
            let navs = NavStore::new(&cli.root, &config, vcs.clone());
            for summary in navs.list()? {
                let file = navs.get(&summary.name)?;
                output::print_nav_tree(&file.name, &file.path, &file.content);
            }

            println!();
            let docs = DocStore::new(&cli.root, &config, vcs.clone());
            output::print_doc_list(&docs.list(None)?);

            println!();
            output::print_vcs_status(&vcs.status());
            println!("==> Content is valid");
        }
        Command::GenConfig => {}
    }

    Ok(())
}

fn load_config(root: &Path, explicit: Option<&Path>) -> Result<DocnavConfig, config::ConfigError> {
    match explicit {
        Some(path) => config::load_config_file(path),
        None => config::load_config(root),
    }
}

/// Log to stderr, filtered by `RUST_LOG`.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=info,axum=info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
