use std::process::exit;
use std::sync::Arc;

use clap::Parser;
use log::error;

use dnsweep::config::Options;
use dnsweep::initialization::init_logger_with;
use dnsweep::runner::Runner;

#[tokio::main]
async fn main() {
    let options = Options::parse();

    if let Err(e) = init_logger_with(
        options.log_level.into(),
        options.log_format,
        options.no_color,
    ) {
        eprintln!("{e}");
        exit(1);
    }

    let runner = match Runner::new(options.clone()) {
        Ok(runner) => Arc::new(runner),
        Err(e) => {
            error!("{e}");
            exit(1);
        }
    };

    // SIGINT persists the scan cursor so the run can be resumed
    {
        let runner = Arc::clone(&runner);
        let stream = options.stream;
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                if !stream {
                    if let Err(e) = runner.save_resume() {
                        error!("failed to save resume file: {e}");
                    }
                }
                exit(1);
            }
        });
    }

    if let Err(e) = runner.run().await {
        error!("{e:#}");
        exit(1);
    }
}
