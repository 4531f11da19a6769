use clap::Parser;
use color_eyre::eyre;
use poem::{listener::TcpListener, Server};
use resconv::{app, config::Config, convert::Converter};
use std::net::IpAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Resume converter web service")]
struct CliArg {
    /// Port to listen on, overrides PORT
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind, overrides HOST
    #[arg(long)]
    address: Option<IpAddr>,
}

#[tokio::main]
async fn main() -> Result<(), eyre::Error> {
    // Lets get pretty error reports
    color_eyre::install()?;

    // Use async-friendly logging for Poem
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("resconv=info,poem=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Read the configs from Env Variable and then fall back to the .env file.
    let arg = CliArg::parse();
    let mut config = Config::from_env()?;
    if let Some(port) = arg.port {
        config.port = port;
    }
    if let Some(address) = arg.address {
        config.address = address;
    }

    // Find LibreOffice before taking any traffic
    let converter = Converter::locate(&config)?;

    // Lets run our service
    let addr = config.socket_addr();
    info!("Listening on http://{}", addr);
    Server::new(TcpListener::bind(addr))
        .run(app(converter, &config))
        .await?;

    Ok(())
}
