use std::io;

use anyhow::{Context, Result};
use clap::Parser;

use eudcc_reader::cli::{Cli, Output};
use eudcc_reader::{eudcc, logger, present};

fn main() -> Result<()> {
    logger::setup_logger();
    let cli = Cli::parse();

    let payload = cli
        .source()?
        .acquire()
        .context("unable to acquire the qr code payload")?;
    log::info!("decoding payload: {}", payload.trim_end());

    let decoded = eudcc::decode(&payload)?;

    let stdout = io::stdout();
    let out = stdout.lock();
    match cli.output {
        Output::Json => present::present(&decoded.payload, out)?,
        Output::Certificate => present::present_certificate(&decoded.certificate()?, out)?,
    }

    Ok(())
}
