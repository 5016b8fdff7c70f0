#![warn(clippy::uninlined_format_args)]

use std::{
    borrow::Cow,
    collections::BTreeMap,
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    num::NonZeroUsize,
    path::{Path, PathBuf},
    process,
    time::Duration,
};

use clap::{Args, Parser, Subcommand};
use paperassign_domain::{
    AssignmentAudit, AssignmentInstance, AssignmentPolicy, ConflictSets, DEFAULT_MAX_LAST_MINUTE,
    NoBidPolicy, PaperId, ReviewerId, ScoreInputs, ScoreMatrix, ScoreWeights,
};
use paperassign_infrastructure::{
    LoadError, open_table, read_assignment, read_author_countries, read_bids,
    read_declared_conflicts, read_papers, read_reviewers, read_scores, read_topics,
    write_assignment, write_scores,
};
use paperassign_optimizer::{AssignmentEngine, SolveOptions};
use tracing::info;
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Cow<'static, str>>;

#[derive(Parser, Debug)]
#[command(name = "paperassign")]
#[command(about = "Reviewer-to-paper assignment for conference program committees")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Solve for an assignment and write it as `reviewer,paper` rows
    Run {
        #[command(flatten)]
        tables: InstanceTables,
        #[command(flatten)]
        policy: PolicyArgs,
        #[command(flatten)]
        solver: SolverArgs,
        /// Destination file; stdout when omitted
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Build a score table from topics, bids and declared conflicts
    Score {
        #[arg(long, env = "PAPERASSIGN_REVIEWER_TOPICS")]
        reviewer_topics: PathBuf,
        #[arg(long, env = "PAPERASSIGN_PAPER_TOPICS")]
        paper_topics: PathBuf,
        #[arg(long, env = "PAPERASSIGN_BIDS")]
        bids: PathBuf,
        #[arg(long, env = "PAPERASSIGN_DECLARED_CONFLICTS")]
        declared_conflicts: Option<PathBuf>,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Re-check an assignment file and print its statistics
    Audit {
        #[command(flatten)]
        tables: InstanceTables,
        #[command(flatten)]
        policy: PolicyArgs,
        /// Headerless `reviewer,paper` file to check
        #[arg(long)]
        assignment: PathBuf,
        /// Report violations without failing
        #[arg(long)]
        no_strict: bool,
    },
}

#[derive(Args, Debug)]
struct InstanceTables {
    /// `id,country,min,max,last`
    #[arg(long, env = "PAPERASSIGN_REVIEWERS")]
    reviewers: PathBuf,
    /// `id`
    #[arg(long, env = "PAPERASSIGN_PAPERS")]
    papers: PathBuf,
    /// `reviewer,paper,score`
    #[arg(long, env = "PAPERASSIGN_SCORES")]
    scores: PathBuf,
    /// `paper,country`
    #[arg(long, env = "PAPERASSIGN_AUTHOR_COUNTRIES")]
    author_countries: Option<PathBuf>,
    /// `reviewer,paper` conflicts declared by reviewers
    #[arg(long, env = "PAPERASSIGN_DECLARED_CONFLICTS")]
    declared_conflicts: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PolicyArgs {
    /// Reviewers required on every paper
    #[arg(long, env = "PAPERASSIGN_ASSIGN_NUM")]
    assign_num: u32,
    #[arg(long, env = "PAPERASSIGN_DEFAULT_MIN")]
    default_min: u32,
    #[arg(long, env = "PAPERASSIGN_DEFAULT_MAX")]
    default_max: u32,
    /// Reviewers sharing a country with the authors allowed per paper
    #[arg(long, env = "PAPERASSIGN_COUNTRY_COI_MAX")]
    country_coi_max: u32,
    /// Reviewers from any one country allowed per paper
    #[arg(long, env = "PAPERASSIGN_MOST_FREQ_COUNTRY")]
    most_freq_country: Option<u32>,
    /// Last-minute reviewers allowed per paper
    #[arg(long, env = "PAPERASSIGN_MAX_LAST_MINUTE", default_value_t = DEFAULT_MAX_LAST_MINUTE)]
    max_last_minute: u32,
    /// Tiers as `minBid:maxNoBid,...`
    #[arg(long, env = "PAPERASSIGN_MAX_NO_BID")]
    max_no_bid: Option<NoBidPolicy>,
}

impl PolicyArgs {
    fn to_policy(&self) -> AssignmentPolicy {
        let mut policy = AssignmentPolicy::new(
            self.assign_num,
            self.default_min,
            self.default_max,
            self.country_coi_max,
        )
        .with_max_last_minute(self.max_last_minute);
        if let Some(cap) = self.most_freq_country {
            policy = policy.with_most_freq_country(cap);
        }
        if let Some(no_bid) = &self.max_no_bid {
            policy = policy.with_no_bid(no_bid.clone());
        }
        policy
    }
}

#[derive(Args, Debug)]
struct SolverArgs {
    /// Wall-clock limit in seconds
    #[arg(long, env = "PAPERASSIGN_TIME_LIMIT", default_value_t = 3600)]
    time_limit: u64,
    /// Solver threads; all available cores when omitted
    #[arg(long, env = "PAPERASSIGN_THREADS")]
    threads: Option<NonZeroUsize>,
    /// Relative MIP gap at which the solver may stop early
    #[arg(long, env = "PAPERASSIGN_MIP_GAP")]
    mip_gap: Option<f64>,
    /// Forward the solver's own log to stdout
    #[arg(long)]
    solver_log: bool,
}

impl SolverArgs {
    fn to_options(&self) -> SolveOptions {
        let mut options = SolveOptions::default()
            .with_time_limit(Duration::from_secs(self.time_limit))
            .with_verbose(self.solver_log);
        if let Some(threads) = self.threads {
            options = options.with_threads(threads);
        }
        if let Some(gap) = self.mip_gap {
            options = options.with_mip_rel_gap(gap);
        }
        options
    }
}

fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Command::Run {
            tables,
            policy,
            solver,
            output,
        } => {
            let instance = load_instance(&tables, policy.to_policy())?;
            let engine = AssignmentEngine::new(solver.to_options());
            let outcome = engine.assign(&instance).map_err(|err| err.to_string())?;
            info!(
                "{} pairs, objective {}, status {:?}",
                outcome.assignment.len(),
                outcome.objective,
                outcome.status
            );
            write_assignment(create_output(output.as_deref())?, &outcome.assignment)
                .map_err(|err| err.to_string())?;
            Ok(())
        }
        Command::Score {
            reviewer_topics,
            paper_topics,
            bids,
            declared_conflicts,
            output,
        } => {
            let reviewer_topics = load(&reviewer_topics, |table| read_topics(table, ReviewerId))?;
            let paper_topics = load(&paper_topics, |table| read_topics(table, PaperId))?;
            let bids = load(&bids, read_bids)?;
            let declared_conflicts = match declared_conflicts {
                Some(path) => load(&path, read_declared_conflicts)?,
                None => Vec::new(),
            };

            let scores = ScoreMatrix::prepare(
                &ScoreInputs {
                    reviewer_topics: &reviewer_topics,
                    paper_topics: &paper_topics,
                    bids: &bids,
                    declared_conflicts: &declared_conflicts,
                },
                &ScoreWeights::default(),
            )
            .map_err(|err| err.to_string())?;
            info!("Prepared {} scored pairs", scores.len());
            write_scores(create_output(output.as_deref())?, &scores)
                .map_err(|err| err.to_string())?;
            Ok(())
        }
        Command::Audit {
            tables,
            policy,
            assignment,
            no_strict,
        } => {
            let instance = load_instance(&tables, policy.to_policy())?;
            let assignment = load(&assignment, read_assignment)?;
            let audit = AssignmentAudit::run(&instance, &assignment);

            for violation in &audit.violations {
                println!("violation: {violation}");
            }
            for (name, value) in audit.statistics() {
                println!("{name}: {value}");
            }

            if !audit.is_compliant() && !no_strict {
                return Err(format!("{} violations found", audit.violations.len()).into());
            }
            Ok(())
        }
    }
}

fn load_instance(
    tables: &InstanceTables,
    policy: AssignmentPolicy,
) -> CliResult<AssignmentInstance> {
    let reviewers = load(&tables.reviewers, read_reviewers)?;
    let papers = load(&tables.papers, read_papers)?;
    let scores = load(&tables.scores, read_scores)?;
    let author_countries = match &tables.author_countries {
        Some(path) => load(path, read_author_countries)?,
        None => BTreeMap::new(),
    };
    let declared = match &tables.declared_conflicts {
        Some(path) => load(path, read_declared_conflicts)?,
        None => Vec::new(),
    };

    let conflicts = ConflictSets::derive(&reviewers, &author_countries).with_declared(declared);
    info!(
        "Loaded {} reviewers, {} papers, {} scored pairs",
        reviewers.len(),
        papers.len(),
        scores.len()
    );
    AssignmentInstance::try_new(reviewers, papers, scores, conflicts, policy)
        .map_err(|err| format!("Invalid configuration: {err}").into())
}

fn load<T>(
    path: &Path,
    read: impl FnOnce(BufReader<File>) -> Result<T, LoadError>,
) -> CliResult<T> {
    open_table(path).and_then(read).map_err(|err| match err {
        LoadError::Open { .. } => err.to_string().into(),
        _ => format!("Failed to read '{}': {err}", path.display()).into(),
    })
}

fn create_output(path: Option<&Path>) -> CliResult<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .map_err(|err| format!("Failed to create '{}': {err}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(io::stdout().lock())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args.iter().copied()).expect("valid arguments")
    }

    const RUN_ARGS: [&str; 14] = [
        "paperassign",
        "run",
        "--reviewers",
        "pc.csv",
        "--papers",
        "papers.csv",
        "--scores",
        "scores.csv",
        "--assign-num",
        "3",
        "--default-min",
        "2",
        "--default-max",
        "6",
    ];

    fn run_with(extra: &[&str]) -> Cli {
        let mut args = RUN_ARGS.to_vec();
        args.extend_from_slice(&["--country-coi-max", "1"]);
        args.extend_from_slice(extra);
        parse(&args)
    }

    #[test]
    fn run_flags_map_onto_policy() {
        let Command::Run { policy, .. } = run_with(&[
            "--most-freq-country",
            "2",
            "--max-no-bid",
            "5:1,10:0",
        ])
        .command
        else {
            panic!("expected run");
        };

        let policy = policy.to_policy();
        assert_eq!(policy.reviewers_per_paper, 3);
        assert_eq!(policy.default_min_load, 2);
        assert_eq!(policy.default_max_load, 6);
        assert_eq!(policy.country_coi_max, 1);
        assert_eq!(policy.most_freq_country, Some(2));
        assert_eq!(policy.no_bid_cap(12), Some(0));
        assert_eq!(policy.no_bid_cap(7), Some(1));
        assert_eq!(policy.no_bid_cap(2), None);
    }

    #[test]
    fn optional_classes_default_off() {
        let Command::Run { policy, .. } = run_with(&[]).command else {
            panic!("expected run");
        };
        let policy = policy.to_policy();
        assert_eq!(policy.most_freq_country, None);
        assert!(policy.no_bid.is_none());
    }

    #[rstest]
    #[case::defaults(&[], Duration::from_secs(3600), None, None)]
    #[case::explicit(
        &["--time-limit", "90", "--threads", "4", "--mip-gap", "0.01"],
        Duration::from_secs(90),
        NonZeroUsize::new(4),
        Some(0.01)
    )]
    fn solver_flags_map_onto_options(
        #[case] extra: &[&str],
        #[case] time_limit: Duration,
        #[case] threads: Option<NonZeroUsize>,
        #[case] mip_gap: Option<f64>,
    ) {
        let Command::Run { solver, .. } = run_with(extra).command else {
            panic!("expected run");
        };
        let options = solver.to_options();
        assert_eq!(options.time_limit, time_limit);
        assert_eq!(options.mip_rel_gap, mip_gap);
        if let Some(threads) = threads {
            assert_eq!(options.threads, threads);
        }
    }

    #[test]
    fn audit_accepts_declared_conflicts_table() {
        let mut args = RUN_ARGS.to_vec();
        args[1] = "audit";
        args.extend_from_slice(&[
            "--country-coi-max",
            "1",
            "--assignment",
            "out.csv",
            "--declared-conflicts",
            "conflict.csv",
        ]);

        let Command::Audit { tables, .. } = parse(&args).command else {
            panic!("expected audit");
        };
        assert_eq!(
            tables.declared_conflicts.as_deref(),
            Some(Path::new("conflict.csv"))
        );
    }

    #[rstest]
    #[case::malformed_tiers(&["--max-no-bid", "5-1"])]
    #[case::zero_threads(&["--threads", "0"])]
    fn rejects_bad_flag_values(#[case] extra: &[&str]) {
        let mut args = RUN_ARGS.to_vec();
        args.extend_from_slice(&["--country-coi-max", "1"]);
        args.extend_from_slice(extra);
        assert!(Cli::try_parse_from(args).is_err());
    }
}
