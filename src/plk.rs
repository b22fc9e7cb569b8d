extern crate clap;
use clap::*;

mod cmd_plk;

fn main() -> anyhow::Result<()> {
    init_logging();

    let app = Command::new("plk")
        .version(crate_version!())
        .author(crate_authors!())
        .about("`plk` - Phylogenetic Likelihood Kernel")
        .propagate_version(true)
        .arg_required_else_help(true)
        .color(ColorChoice::Auto)
        .subcommand(cmd_plk::gamma::make_subcommand())
        .subcommand(cmd_plk::models::make_subcommand())
        .subcommand(cmd_plk::pmatrix::make_subcommand())
        .subcommand(cmd_plk::calibrate::make_subcommand())
        .subcommand(cmd_plk::loglik::make_subcommand())
        .after_help(
            r###"Subcommand groups:

* Model parts:
    * gamma   - Discrete gamma category rates
    * models  - Built-in amino acid models
    * pmatrix - Transition probability matrices

* Likelihood:
    * calibrate - Five-taxon protein benchmark
    * loglik    - Log-likelihood of an alignment on a tree

Log verbosity follows RUST_LOG (default: warn), written to stderr.

"###,
        );

    match app.get_matches().subcommand() {
        Some(("gamma", sub_matches)) => cmd_plk::gamma::execute(sub_matches),
        Some(("models", sub_matches)) => cmd_plk::models::execute(sub_matches),
        Some(("pmatrix", sub_matches)) => cmd_plk::pmatrix::execute(sub_matches),
        Some(("calibrate", sub_matches)) => cmd_plk::calibrate::execute(sub_matches),
        Some(("loglik", sub_matches)) => cmd_plk::loglik::execute(sub_matches),
        _ => unreachable!(),
    }?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}
