use std::path::PathBuf;

use access_log_ingest::config::IngestConfig;
use access_log_ingest::db::Database;
use access_log_ingest::ingest::Pipeline;
use access_log_ingest::logger;
use access_log_ingest::logs::LogFormat;
use anyhow::Context;
use structopt::clap::ErrorKind;
use structopt::StructOpt;
use tokio::sync::watch;

/// Ingest Nginx access logs from stdin into SQLite for querying.
#[derive(Debug, StructOpt)]
#[structopt(name = "ingest_logs")]
struct Opt {
    /// COMBINED for the default Nginx log format, VCOMBINED for the one
    /// with a "<vhost>: " prefix
    #[structopt(long = "format", possible_values = &LogFormat::VARIANTS)]
    format: LogFormat,

    /// SQLite database file, created if it doesn't exist
    #[structopt(parse(from_os_str))]
    database: PathBuf,
}

fn parse_args() -> Opt {
    match Opt::from_iter_safe(std::env::args_os()) {
        Ok(opt) => opt,
        Err(err) if matches!(err.kind, ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed) => {
            err.exit()
        }
        Err(err) => {
            eprintln!("{}", err.message);
            std::process::exit(-1);
        }
    }
}

/// The first ctrl+c lets the current run finish cleanly, also while
/// waiting for input. The second one doesn't wait.
fn stop_on_ctrl_c() -> watch::Receiver<bool> {
    let (stop, stopped) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        log::info!("received ctrl+c signal, finishing up");
        stop.send_replace(true);

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
    stopped
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let opt = parse_args();

    // the logger level comes from the environment, log the outcome later
    let dotenv = dotenv::dotenv();
    let config = IngestConfig::try_from_env().context("load configuration")?;
    logger::init(config.log_level).context("initialize logger")?;

    match dotenv {
        Ok(path) => log::info!("loaded .env from {}", path.display()),
        Err(err) => log::debug!("couldn't load .env file: {:?}", err),
    };

    let mut pipeline = Pipeline::from_config(opt.format, &config)
        .context("set up ingestion")?
        .with_stop(stop_on_ctrl_c());

    let mut db = Database::open(&opt.database).await?;
    log::info!("opened {}", opt.database.display());

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let result = pipeline.run(stdin, &mut db).await;
    db.close().await;

    let stats = result.context("ingest logs")?;
    log::info!("finished {}. {}", opt.database.display(), stats);
    Ok(())
}
