use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(rename_all = "kebab")]
struct Opts {
    /// Server config file location
    #[structopt(short, long)]
    server_conf: PathBuf,
}

pub fn main() -> Result<(), anyhow::Error> {
    let opts = Opts::from_args();

    relay_server::run::run_server(opts.server_conf)
}
