use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ffmpeg_pump::{Rnd, Rounding, TimeBase};
use tokio_util::sync::CancellationToken;

mod check;
mod config;
mod serve;

#[derive(Parser, Debug)]
#[command(name = "lite-av", version)]
struct Cli {
    /// JSON config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rescale a timestamp from one time base to another.
    Rescale(RescaleArgs),
    /// Serve a file over HTTP to any number of clients.
    Serve(ServeArgs),
    /// Copy the audio, video and subtitle streams of a file into another.
    #[cfg(feature = "ffmpeg")]
    Remux(RemuxArgs),
    /// Run the decode, encode and remux loops against in-memory engines.
    SelfCheck,
}

#[derive(Parser, Debug)]
struct RescaleArgs {
    #[arg(allow_hyphen_values = true)]
    value: i64,

    /// Source time base, `num/den`.
    from: TimeBase,

    /// Target time base, `num/den`.
    to: TimeBase,

    /// zero, inf, down, up or near-inf.
    #[arg(long)]
    rounding: Option<Rounding>,

    /// Return i64::MIN and i64::MAX unchanged.
    #[arg(long, default_value_t = false)]
    pass_min_max: bool,
}

#[derive(Parser, Debug)]
struct ServeArgs {
    input: PathBuf,

    /// Overrides the configured listen address.
    #[arg(long)]
    listen: Option<std::net::SocketAddr>,
}

#[cfg(feature = "ffmpeg")]
#[derive(Parser, Debug)]
struct RemuxArgs {
    input: PathBuf,
    output: PathBuf,
}

fn init_logging(level: log::LevelFilter) {
    let mut builder = env_logger::Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none() {
        builder
            .filter_level(level)
            .filter_module("ffmpeg_pump", level);
    }
    builder.init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = match config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {:#}", e);
            std::process::exit(1);
        }
    };
    init_logging(config.log_level);

    if let Err(e) = run(cli.cmd).await {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Rescale(args) => {
            println!("{}", cmd_rescale(&args));
            Ok(())
        }
        Command::Serve(args) => cmd_serve(args).await,
        #[cfg(feature = "ffmpeg")]
        Command::Remux(args) => cmd_remux(args).await,
        Command::SelfCheck => check::run(),
    }
}

fn cmd_rescale(args: &RescaleArgs) -> i64 {
    let rounding = args.rounding.unwrap_or(config::config().rounding);
    let mut rnd = Rnd::new(rounding);
    if args.pass_min_max {
        rnd = rnd.pass_min_max();
    }
    ffmpeg_pump::rescale_q_rnd(args.value, args.from, args.to, rnd)
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let served = serve::Served::new(args.input)?;
    let listen = args.listen.unwrap_or(config::config().listen);

    let cancel = CancellationToken::new();
    let mut server = tokio::spawn(serve::run(served, listen, cancel.clone()));

    tokio::select! {
        result = &mut server => return result?,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
        }
    }
    server.await?
}

#[cfg(feature = "ffmpeg")]
async fn cmd_remux(args: RemuxArgs) -> anyhow::Result<()> {
    ffmpeg_pump::ffmpeg::init()?;
    let stats = tokio::task::spawn_blocking(move || {
        ffmpeg_pump::ffmpeg::remux_file(&args.input, &args.output)
    })
    .await??;
    log::info!(
        "remux done: {} packets read, {} written, {} dropped",
        stats.read,
        stats.written,
        stats.dropped
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rescale(argv: &[&str]) -> i64 {
        let cli = Cli::try_parse_from(argv.iter().copied()).unwrap();
        match cli.cmd {
            Command::Rescale(args) => cmd_rescale(&args),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rescale_command() {
        assert_eq!(rescale(&["lite-av", "rescale", "3", "1/1", "1/2"]), 6);
        assert_eq!(
            rescale(&["lite-av", "rescale", "100", "1/25", "1/1", "--rounding", "down"]),
            4
        );
        assert_eq!(rescale(&["lite-av", "rescale", "1000", "90000", "1/1000"]), 11);
        assert_eq!(rescale(&["lite-av", "rescale", "-7", "1/2", "1/1", "--rounding", "up"]), -3);
    }

    #[test]
    fn rescale_pass_min_max() {
        let min = i64::MIN.to_string();
        assert_eq!(
            rescale(&["lite-av", "rescale", &min, "1/1", "1/2", "--pass-min-max"]),
            i64::MIN
        );
    }

    #[test]
    fn bad_time_base_is_a_usage_error() {
        assert!(Cli::try_parse_from(["lite-av", "rescale", "1", "0/1", "1/2"]).is_err());
        assert!(Cli::try_parse_from(["lite-av", "rescale", "1", "1/1", "x"]).is_err());
    }
}
