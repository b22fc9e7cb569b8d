use clap::*;
use plk::libs::calibration;
use plk::libs::models::{EmpiricalModel, ProteinModel};
use rayon::prelude::*;
use std::fmt::Write as _;
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("calibrate")
        .about("Five-taxon amino acid benchmark")
        .after_help(
            r###"
Evaluates the log-likelihood of a fixed five-taxon, 113-site protein alignment under each selected
model, with discrete gamma rates (alpha = 1, 4 categories) and branch lengths 0.1, 0.2, 1, 1.

Notes:
* Models are evaluated in parallel, one partition each; output keeps the requested order
* --dat reads a model in PAML format (19 rows of exchangeabilities, then 20 frequencies)
  and labels it with the file stem; -m and --dat may be combined
* --verbose also prints every P-matrix, tip and CLV, and frequency warnings
* Results are deterministic, suitable for comparing builds and platforms

Examples:
1. All built-in models:
   plk calibrate

2. WAG and JTT only:
   plk calibrate -m wag -m jtt

3. WAG against a model file:
   plk calibrate -m wag --dat mtREV24.dat

4. Full dump with 3 decimals:
   plk calibrate -m lg --verbose -p 3

"###,
        )
        .arg(
            Arg::new("model")
                .long("model")
                .short('m')
                .num_args(1)
                .action(ArgAction::Append)
                .value_parser(value_parser!(ProteinModel))
                .help("Model to evaluate, may be repeated. Default: all"),
        )
        .arg(
            Arg::new("dat")
                .long("dat")
                .num_args(1)
                .action(ArgAction::Append)
                .help("Model file in PAML format, may be repeated"),
        )
        .arg(
            Arg::new("precision")
                .long("precision")
                .short('p')
                .num_args(1)
                .default_value("5")
                .value_parser(value_parser!(usize))
                .help("Decimal places of the --verbose dump"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Print matrices and CLVs"),
        )
        .arg(
            Arg::new("no_scaling")
                .long("no-scaling")
                .action(ArgAction::SetTrue)
                .help("Disable CLV rescaling"),
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
    let mut models: Vec<EmpiricalModel> = args
        .get_many::<ProteinModel>("model")
        .map(|values| values.map(|&m| m.into()).collect())
        .unwrap_or_default();
    if let Some(files) = args.get_many::<String>("dat") {
        for infile in files {
            models.push(crate::cmd_plk::read_dat(infile)?);
        }
    }
    if models.is_empty() {
        models = ProteinModel::ALL.into_iter().map(Into::into).collect();
    }
    let precision = *args.get_one::<usize>("precision").unwrap();
    let verbose = args.get_flag("verbose");
    let scaling = !args.get_flag("no_scaling");
    let mut writer = intspan::writer(args.get_one::<String>("outfile").unwrap());

    let reports = models
        .par_iter()
        .map(|model| evaluate(model, scaling, verbose, precision))
        .collect::<anyhow::Result<Vec<String>>>()?;

    for report in reports {
        writer.write_all(report.as_bytes())?;
    }

    Ok(())
}

fn evaluate(
    model: &EmpiricalModel,
    scaling: bool,
    verbose: bool,
    precision: usize,
) -> anyhow::Result<String> {
    let mut partition = calibration::partition(scaling)?;
    let lnl = calibration::log_likelihood(&mut partition, model)?;

    let mut out = String::new();
    if verbose {
        writeln!(out, "Model {}", model.name)?;
        for diagnostic in partition.take_diagnostics() {
            writeln!(out, " WARNING: {}", diagnostic)?;
        }
        for (slot, length) in calibration::BRANCH_LENGTHS.iter().enumerate() {
            writeln!(out, "P-matrix for branch length {:.6}", length)?;
            writeln!(out, "{}", partition.show_pmatrix(slot, precision)?)?;
        }
        let buffers = partition.dims().tips + 3;
        for buffer in 0..buffers {
            let label = if buffer < partition.dims().tips {
                "Tip"
            } else {
                "CLV"
            };
            writeln!(
                out,
                "{} {}: {}",
                label,
                buffer,
                partition.show_clv(buffer, precision + 1)?
            )?;
        }
    }
    writeln!(out, "Log-L ({}): {:.12}", model.name, lnl)?;

    Ok(out)
}
