use clap::*;
use plk::libs::models::ProteinModel;
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("models")
        .about("List built-in amino acid models")
        .after_help(
            r###"
Prints one line per empirical amino acid model: name<TAB>frequency sum<TAB>reference.

Notes:
* Names are case-insensitive wherever a model is selected with -m
* Frequencies are used as published; a sum off by more than 1e-10 is reported as a warning

Examples:
1. List models:
   plk models

"###,
        )
        .arg(
            Arg::new("outfile")
                .long("outfile")
                .short('o')
                .num_args(1)
                .default_value("stdout")
                .help("Output filename. [stdout] for screen"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    let mut writer = intspan::writer(args.get_one::<String>("outfile").unwrap());

    for model in ProteinModel::ALL {
        let sum: f64 = model.frequencies().iter().sum();
        writer.write_fmt(format_args!(
            "{}\t{:.6}\t{}\n",
            model.name(),
            sum,
            model.reference()
        ))?;
    }

    Ok(())
}
