use clap::*;
use plk::libs::gamma::{compute_gamma_categories_with, GammaMode};
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("gamma")
        .about("Discrete gamma rate categories")
        .after_help(
            r###"
Splits the gamma distribution with shape alpha and mean 1 into categories of equal probability
and prints the representative rate of each, one per line: index<TAB>rate.

Notes:
* Rates are the conditional means of each category, or the medians with --median
* Either way they are rescaled to have a mean of exactly 1
* Smaller alpha means stronger rate heterogeneity

Examples:
1. Four categories with alpha = 1:
   plk gamma -a 1 -c 4

2. Median rates:
   plk gamma -a 0.5 -c 8 --median

"###,
        )
        .arg(
            Arg::new("alpha")
                .long("alpha")
                .short('a')
                .num_args(1)
                .default_value("1.0")
                .value_parser(value_parser!(f64))
                .help("Shape parameter"),
        )
        .arg(
            Arg::new("cats")
                .long("cats")
                .short('c')
                .num_args(1)
                .default_value("4")
                .value_parser(value_parser!(usize))
                .help("Number of categories"),
        )
        .arg(
            Arg::new("median")
                .long("median")
                .action(ArgAction::SetTrue)
                .help("Use category medians instead of means"),
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
    let alpha = *args.get_one::<f64>("alpha").unwrap();
    let cats = *args.get_one::<usize>("cats").unwrap();
    let mode = if args.get_flag("median") {
        GammaMode::Median
    } else {
        GammaMode::Mean
    };
    let mut writer = intspan::writer(args.get_one::<String>("outfile").unwrap());

    let rates = compute_gamma_categories_with(alpha, cats, mode)?;
    for (i, rate) in rates.iter().enumerate() {
        writer.write_fmt(format_args!("{}\t{:.6}\n", i, rate))?;
    }

    Ok(())
}
