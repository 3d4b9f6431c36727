#![allow(clippy::doc_markdown)]
#![doc = include_str!("../README.md")]

mod api;
mod cli;
mod core;
mod prelude;
mod profile;
mod quantity;
mod store;
mod tables;

use clap::{Parser, crate_version};

use crate::{
    cli::{Args, Command, plan, replay, reset, watch},
    prelude::*,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().without_time().compact().with_writer(std::io::stderr).init();
    info!(version = crate_version!(), "starting…");

    match Args::parse().command {
        Command::Replay(args) => replay(&args).await?,
        Command::Watch(args) => watch(&args).await?,
        Command::Plan(args) => plan(&args).await?,
        Command::Reset(args) => reset(&args).await?,
    }

    info!("done!");
    Ok(())
}
