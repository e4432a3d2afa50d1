use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use tunsetup::config::{CONFIG_FILE_NAME, ClientConfig, ServerConfig};
use tunsetup::platform::dry_run::DryRun;
use tunsetup::platform::{CommandRunner, NetworkControl, SystemCommandRunner, get_platform};
use tunsetup::{ClientSetup, Config, PostHandshakeHook, ServerSetup};

#[derive(Parser)]
#[command(name = "tunsetup")]
#[command(about = "Host network setup for point-to-point tunnels")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ./tunsetup.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Client side: run once the tunnel handshake has completed
    ///
    /// Pins the server to the current gateway, configures the tunnel
    /// interface and routes all other traffic through the tunnel.
    Client {
        /// Server transport address (host:port)
        #[arg(long)]
        server_addr: Option<String>,
        /// Tunnel interface name
        #[arg(short, long)]
        interface: Option<String>,
        /// Local tunnel address (a.b.c.d/n)
        #[arg(long)]
        tunnel_cidr: Option<String>,
        /// Server tunnel address, used as peer and gateway
        #[arg(short, long)]
        gateway: Option<String>,
        /// Log the changes instead of applying them
        #[arg(long)]
        dry_run: bool,
    },
    /// Server side: run before accepting tunnel connections
    ///
    /// Configures the tunnel interface and NATs tunnel clients out through
    /// the host's internet-facing link.
    Server {
        /// Tunnel interface name
        #[arg(short, long)]
        interface: Option<String>,
        /// Local tunnel address (a.b.c.d/n)
        #[arg(long)]
        tunnel_cidr: Option<String>,
        /// Log the changes instead of applying them
        #[arg(long)]
        dry_run: bool,
    },
    /// Generate a sample config file
    Init,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr, RUST_LOG wins over --verbose
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Client {
            server_addr,
            interface,
            tunnel_cidr,
            gateway,
            dry_run,
        } => {
            let config = Config::discover(cli.config.as_deref())?;
            let base = config.client.clone().unwrap_or_else(|| ClientConfig {
                server_addr: String::new(),
                interface: "tun0".to_string(),
                tunnel_cidr: String::new(),
                gateway: String::new(),
            });
            let client = ClientConfig {
                server_addr: server_addr.unwrap_or(base.server_addr),
                interface: interface.unwrap_or(base.interface),
                tunnel_cidr: tunnel_cidr.unwrap_or(base.tunnel_cidr),
                gateway: gateway.unwrap_or(base.gateway),
            };
            client.check()?;
            check_privileges(dry_run);

            let net = network(dry_run)?;
            let hook = ClientSetup::new(net.as_ref(), &config.setup, &client);
            if let Err(e) = hook.on_handshake_complete() {
                error!("Client setup failed: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Server {
            interface,
            tunnel_cidr,
            dry_run,
        } => {
            let config = Config::discover(cli.config.as_deref())?;
            let base = config.server.clone().unwrap_or_else(|| ServerConfig {
                interface: "tun0".to_string(),
                tunnel_cidr: String::new(),
            });
            let server = ServerConfig {
                interface: interface.unwrap_or(base.interface),
                tunnel_cidr: tunnel_cidr.unwrap_or(base.tunnel_cidr),
            };
            server.check()?;
            check_privileges(dry_run);

            let net = network(dry_run)?;
            let runner = runner(dry_run);
            let setup = ServerSetup::new(net.as_ref(), runner.as_ref(), &config.setup, &server);
            if let Err(e) = setup.run() {
                error!("Server setup failed: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Init => {
            info!("Generating default config...");
            let config = Config::template();
            let path = cli.config.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
            config.save(&path)?;
            println!("Created default config: {}", path.display());
        }
    }

    Ok(())
}

fn network(dry_run: bool) -> Result<Box<dyn NetworkControl>, Box<dyn std::error::Error>> {
    let net = get_platform()?;
    if dry_run {
        Ok(Box::new(DryRun(net)))
    } else {
        Ok(net)
    }
}

fn runner(dry_run: bool) -> Box<dyn CommandRunner> {
    let runner: Box<dyn CommandRunner> = Box::new(SystemCommandRunner::new());
    if dry_run {
        Box::new(DryRun(runner))
    } else {
        runner
    }
}

fn check_privileges(dry_run: bool) {
    #[cfg(unix)]
    {
        if !dry_run && !nix::unistd::geteuid().is_root() {
            warn!("Not running as root; route, link and firewall changes will likely fail");
        }
    }
    #[cfg(not(unix))]
    {
        let _ = dry_run;
    }
}
