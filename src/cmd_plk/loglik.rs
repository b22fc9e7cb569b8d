use clap::*;
use plk::libs::gamma::compute_gamma_categories;
use plk::libs::maps::StateMap;
use plk::libs::models::{EmpiricalModel, ProteinModel};
use plk::libs::newick::TreePlan;
use plk::libs::partition::{Attributes, Dimensions, Partition};
use plk::libs::patterns;
use std::io::{Read, Write};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("loglik")
        .about("Log-likelihood of an alignment on a tree")
        .after_help(
            r###"
Computes the log-likelihood of an aligned FASTA file on a Newick tree with fixed branch lengths.

Notes:
* Leaf names must match the FASTA names exactly; every sequence must be in the tree
* Rooted trees (binary root) and unrooted trees (ternary root) are accepted
* Identical alignment columns are merged and weighted before evaluation
* Protein data use a built-in model (-m) or a PAML model file (--dat)
* --dna uses Jukes-Cantor with IUPAC codes
* Gaps and unknown characters (-, ?, N, X) match any state
* Without --alpha all sites evolve at rate 1

Output: model<TAB>patterns<TAB>log-likelihood

Examples:
1. WAG on a protein alignment:
   plk loglik tree.nwk aln.fa -m wag

2. DNA with gamma rates:
   plk loglik tree.nwk aln.fa --dna -a 0.5 -c 4

"###,
        )
        .arg(
            Arg::new("tree")
                .required(true)
                .index(1)
                .help("Newick tree file. [stdin] for standard input"),
        )
        .arg(
            Arg::new("alignment")
                .required(true)
                .index(2)
                .help("Aligned FASTA file"),
        )
        .arg(
            Arg::new("dat")
                .long("dat")
                .num_args(1)
                .help("Model file in PAML format, replaces --model"),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .short('m')
                .num_args(1)
                .default_value("WAG")
                .value_parser(value_parser!(ProteinModel))
                .help("Amino acid model, see `plk models`"),
        )
        .arg(
            Arg::new("dna")
                .long("dna")
                .action(ArgAction::SetTrue)
                .help("Nucleotide data under Jukes-Cantor"),
        )
        .arg(
            Arg::new("alpha")
                .long("alpha")
                .short('a')
                .num_args(1)
                .value_parser(value_parser!(f64))
                .help("Gamma shape parameter"),
        )
        .arg(
            Arg::new("cats")
                .long("cats")
                .short('c')
                .num_args(1)
                .default_value("4")
                .value_parser(value_parser!(usize))
                .help("Number of gamma categories"),
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
    //----------------------------
    // Args
    //----------------------------
    let dna = args.get_flag("dna");
    let model: EmpiricalModel = match args.get_one::<String>("dat") {
        Some(infile) => crate::cmd_plk::read_dat(infile)?,
        None => (*args.get_one::<ProteinModel>("model").unwrap()).into(),
    };
    let rates = match args.get_one::<f64>("alpha") {
        Some(&alpha) => compute_gamma_categories(alpha, *args.get_one::<usize>("cats").unwrap())?,
        None => vec![1.0],
    };
    let mut writer = intspan::writer(args.get_one::<String>("outfile").unwrap());

    //----------------------------
    // Input
    //----------------------------
    let mut newick = String::new();
    intspan::reader(args.get_one::<String>("tree").unwrap()).read_to_string(&mut newick)?;

    let mut names: Vec<String> = vec![];
    let mut seqs: Vec<Vec<u8>> = vec![];
    let reader = intspan::reader(args.get_one::<String>("alignment").unwrap());
    let mut fa_in = noodles_fasta::io::Reader::new(reader);
    for result in fa_in.records() {
        let record = result?;
        names.push(String::from_utf8(record.name().into())?);
        seqs.push(record.sequence().as_ref().to_vec());
    }
    if names.is_empty() {
        return Err(anyhow::anyhow!("no sequences in the alignment"));
    }

    let plan = TreePlan::from_newick(&newick, &names)?;
    let patterns = patterns::compress(&seqs)?;

    //----------------------------
    // Partition
    //----------------------------
    let (states, map) = if dna {
        (4, StateMap::nt())
    } else {
        (20, StateMap::aa())
    };
    let dims = Dimensions {
        tips: plan.tips,
        clv_buffers: plan.clv_buffers,
        states,
        sites: patterns.len(),
        rate_matrices: 1,
        prob_matrices: plan.prob_matrices(),
        rate_cats: rates.len(),
    };
    let mut partition = Partition::new(dims, Attributes::default())?;

    // Jukes-Cantor is the default model of a fresh partition
    if !dna {
        partition.set_subst_params(0, &model.exchangeabilities)?;
        partition.set_frequencies(0, &model.frequencies)?;
    }
    partition.set_category_rates(&rates)?;
    partition.set_pattern_weights(&patterns.weights)?;
    for (tip, seq) in patterns.sequences.iter().enumerate() {
        partition.set_tip_states(tip, &map, seq)?;
    }

    partition.update_prob_matrices(0, &plan.slots(), &plan.branch_lengths)?;
    partition.update_partials(&plan.operations)?;
    let edge = plan.edge;
    let lnl = partition.compute_edge_log_likelihood(
        edge.left,
        edge.right,
        edge.left_matrix,
        edge.right_matrix,
    )?;

    //----------------------------
    // Output
    //----------------------------
    let label = if dna { "JC69" } else { model.name.as_str() };
    writer.write_fmt(format_args!("{}\t{}\t{:.6}\n", label, patterns.len(), lnl))?;

    Ok(())
}
