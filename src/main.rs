use std::path::PathBuf;
use std::time::Instant;

use jseqio::reader::*;
use jseqio::writer::*;
use jseqio::record::*;
use clap::{Arg, Command};
use clap_complete::{generate, Shell};

use log::{debug, info};

use greedy_dbg::assemble;
use greedy_dbg::dbg::{Dbg, Error};

fn run(
    read_groups: &[Vec<Vec<u8>>],
    seqs_out: &mut impl SeqRecordWriter,
    k: usize,
    max_contigs: usize,
) -> Result<(), Error> {
    info!("Building de Bruijn graph (k = {})", k);
    let build_start = Instant::now();
    let mut graph = Dbg::new(k, read_groups)?;
    info!("Graph construction took {:.2?}", build_start.elapsed());
    debug!("Occurrence count histogram: {:?}", graph.count_histogram());

    let assembly_start = Instant::now();
    let contigs = assemble(&mut graph, max_contigs);
    info!(
        "Assembled {} contig(s) in {:.2?}",
        contigs.len(),
        assembly_start.elapsed()
    );

    let lengths: Vec<usize> = contigs.iter().map(|c| c.len()).collect();
    info!("N50: {}", n50(&lengths));

    info!("Writing output");
    for (i, contig) in contigs.iter().enumerate() {
        let head = format!("contig_{}", i);
        let rec = RefRecord { head: head.as_bytes(), seq: contig, qual: None }.to_owned();
        seqs_out.write_owned_record(&rec).unwrap();
    }

    Ok(())
}

// Largest L such that contigs of length >= L hold at least half of the
// total assembled bases. Zero for an empty assembly.
fn n50(lengths: &[usize]) -> usize {
    let total: usize = lengths.iter().sum();
    let mut sorted = lengths.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));

    let mut cumulative = 0;
    for len in sorted {
        cumulative += len;
        if 2 * cumulative >= total {
            return len;
        }
    }
    0
}

fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }

    env_logger::init();

    let mut cli = Command::new("greedy-dbg")
        .about("Assembles reads into contigs by repeatedly extracting the longest path from a de Bruijn graph.")
        .arg(Arg::new("reads")
            .help("Input FASTA or FASTQ file, possibly gzipped. Repeat the flag to give every read set its own file")
            .long("reads")
            .short('r')
            .required_unless_present("completions")
            .action(clap::ArgAction::Append)
            .value_parser(clap::value_parser!(PathBuf))
        )
        .arg(Arg::new("output")
            .help("Output FASTA or FASTQ file for the contigs, possibly gzipped")
            .long("output")
            .short('o')
            .required_unless_present("completions")
            .value_parser(clap::value_parser!(PathBuf))
        )
        .arg(Arg::new("k")
            .help("k-mer length")
            .short('k')
            .required_unless_present("completions")
            .value_parser(clap::value_parser!(usize))
        )
        .arg(Arg::new("max-contigs")
            .help("Maximum number of contigs to extract")
            .long("max-contigs")
            .short('m')
            .default_value("20")
            .value_parser(clap::value_parser!(usize))
        )
        .arg(Arg::new("completions")
            .help("Print shell completions to stdout and exit")
            .long("completions")
            .value_parser(clap::value_parser!(Shell))
        );

    let cli_matches = cli.clone().get_matches();

    if let Some(shell) = cli_matches.get_one::<Shell>("completions") {
        generate(*shell, &mut cli, "greedy-dbg", &mut std::io::stdout());
        return;
    }

    let infiles: Vec<&PathBuf> = cli_matches.get_many("reads").unwrap().collect();
    let outfile: &PathBuf = cli_matches.get_one("output").unwrap();
    let k: usize = *cli_matches.get_one("k").unwrap();
    let max_contigs: usize = *cli_matches.get_one("max-contigs").unwrap();

    info!("Reading sequences into memory");
    let mut read_groups = Vec::<Vec<Vec<u8>>>::new();
    for infile in infiles {
        let reader = DynamicFastXReader::from_file(infile).unwrap();
        let db = reader.into_db().unwrap();
        let group: Vec<Vec<u8>> = (0..db.sequence_count()).map(|i| db.get(i).seq.to_vec()).collect();
        info!("{}: {} reads", infile.display(), group.len());
        read_groups.push(group);
    }

    let mut writer = DynamicFastXWriter::new_to_file(outfile).unwrap();

    if let Err(e) = run(&read_groups, &mut writer, k, max_contigs) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    #[test]
    fn writes_one_record_per_contig() {
        // "ATCCGTAA" yields one chain per strand, so the output must hold
        // exactly two labeled contig records.
        let k = 3;
        let groups = vec![vec![b"ATCCGTAA".to_vec()]];

        let out_buf = Vec::<u8>::new();
        let mut writer = FastXWriter::new(out_buf, jseqio::FileType::FASTA);

        run(&groups, &mut writer, k, 20).unwrap();
        let out_buf = writer.into_inner().unwrap(); // Get back the out buffer

        let br = BufReader::new(std::io::Cursor::new(out_buf));
        let reader = DynamicFastXReader::new(br).unwrap();
        let out_db = reader.into_db().unwrap();

        assert_eq!(out_db.sequence_count(), 2);
        assert_eq!(out_db.get(0).head, b"contig_0");
        assert_eq!(out_db.get(0).seq, b"ATCCGTA");
        assert_eq!(out_db.get(1).head, b"contig_1");
        assert_eq!(out_db.get(1).seq, b"TTACGGA");
    }

    #[test]
    fn empty_graph_writes_nothing() {
        // k equal to the read length leaves no window pairs at all
        let groups = vec![vec![b"ACGT".to_vec()]];

        let out_buf = Vec::<u8>::new();
        let mut writer = FastXWriter::new(out_buf, jseqio::FileType::FASTA);

        run(&groups, &mut writer, 4, 20).unwrap();
        let out_buf = writer.into_inner().unwrap();
        assert!(out_buf.is_empty());
    }

    #[test]
    fn configuration_errors_abort_the_run() {
        let groups = vec![vec![b"ACGT".to_vec()]];
        let out_buf = Vec::<u8>::new();
        let mut writer = FastXWriter::new(out_buf, jseqio::FileType::FASTA);

        assert_eq!(
            run(&groups, &mut writer, 5, 20).err(),
            Some(Error::KTooLarge { k: 5, read_len: 4 })
        );
    }

    #[test]
    fn n50_covers_half_the_assembly() {
        assert_eq!(n50(&[]), 0);
        assert_eq!(n50(&[7]), 7);
        assert_eq!(n50(&[5, 4, 3]), 4);
        assert_eq!(n50(&[10, 1, 1, 1]), 10);
    }
}
