use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use pactkit::store::{EndpointStore, JsonFileStore};
use pactkit::{assemble, LocalEngine, MockServer, MockServerConfig, TlsConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pactkit", version, about = "Pact contracts and mock servers from endpoint definitions")]
struct Args {
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the contract document for a set of endpoints
    Contract {
        /// JSON file with persisted endpoint definitions
        #[arg(short, long)]
        endpoints: PathBuf,
        /// YAML configuration file
        #[arg(short, long, env = "PACTKIT_CONFIG")]
        config: Option<PathBuf>,
        #[arg(long)]
        pretty: bool,
    },
    /// Serve a set of endpoints until Ctrl-C
    Serve {
        /// JSON file with persisted endpoint definitions
        #[arg(short, long)]
        endpoints: PathBuf,
        /// YAML configuration file
        #[arg(short, long, env = "PACTKIT_CONFIG")]
        config: Option<PathBuf>,
        /// Port to bind (allocated when omitted)
        #[arg(short, long)]
        port: Option<u16>,
        /// Serve plain HTTP instead of HTTPS
        #[arg(long)]
        plain: bool,
        /// Certificate (PEM) for HTTPS
        #[arg(long, requires = "key")]
        cert: Option<String>,
        /// Private key (PEM) for HTTPS
        #[arg(long, requires = "cert")]
        key: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<MockServerConfig> {
    match path {
        Some(path) => MockServerConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(MockServerConfig::default()),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    match args.command {
        Command::Contract {
            endpoints,
            config,
            pretty,
        } => {
            let config = load_config(config.as_ref())?;
            let endpoints = JsonFileStore::new(endpoints).load()?;
            let contract = assemble(&endpoints, &config.contract);
            let text = if pretty {
                contract.to_json_pretty()?
            } else {
                contract.to_json()?
            };
            println!("{text}");
        }
        Command::Serve {
            endpoints,
            config,
            port,
            plain,
            cert,
            key,
        } => {
            let mut config = load_config(config.as_ref())?;
            if plain {
                config.tls = false;
            }
            if let (Some(cert_path), Some(key_path)) = (cert, key) {
                config.tls_files = Some(TlsConfig {
                    cert_path,
                    key_path,
                });
            }
            config.validate_for_local_engine()?;

            let store = JsonFileStore::new(endpoints);
            let endpoints = store.load()?;
            for endpoint in &endpoints {
                info!("Mocking {}", endpoint);
            }

            let engine = LocalEngine::from_config(&config)?;
            let server = MockServer::new(engine, config);
            let handle = server.start(port, &endpoints)?;
            println!("{}", handle.base_url);

            let signal_runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            signal_runtime.block_on(tokio::signal::ctrl_c())?;

            info!("Shutting down");
            server.stop(handle.port);
        }
    }
    Ok(())
}
