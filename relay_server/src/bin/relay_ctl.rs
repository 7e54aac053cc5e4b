use relay_control::ControlClient;
use serde::Serialize;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(rename_all = "kebab")]
struct Opts {
    /// Address of the relay's control server
    #[structopt(short, long, default_value = "127.0.0.1:6660")]
    address: String,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// List all relay connections
    List,
    /// Show a single relay connection
    Status { name: String },
    /// Disconnect a relay connection and remove it from the registry
    Disconnect { name: String },
    /// Show control server statistics
    Stats,
    /// Check that the control server is answering
    Ping,
}

fn print_json(value: &impl Serialize) -> Result<(), anyhow::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let opts = Opts::from_args();

    let mut client = ControlClient::connect(&opts.address).await?;

    match opts.command {
        Command::List => {
            for conn in client.list_connections().await? {
                println!(
                    "{} ({}:{}) {}",
                    conn.name,
                    conn.host,
                    conn.port,
                    if conn.connected { "Connected" } else { "Disconnected" }
                );
            }
        }
        Command::Status { name } => print_json(&client.connection_status(&name).await?)?,
        Command::Disconnect { name } => {
            let status = client.disconnect_connection(&name).await?;
            println!("Disconnected {} (status {})", name, status);
        }
        Command::Stats => print_json(&client.statistics().await?)?,
        Command::Ping => println!("{}", client.ping().await?),
    }

    Ok(())
}
