use narwhal::{
    EdgeDefault, FileExporter, FileFormat, FileImporter, LayoutDriver, LayoutOptions, LayoutResult,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Json(serde_json::Error),
    Layout(narwhal::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
            CliError::Layout(err) => write!(f, "{err}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<narwhal::Error> for CliError {
    fn from(value: narwhal::Error) -> Self {
        Self::Layout(value)
    }
}

#[derive(Debug, Default)]
struct Args {
    import: Option<PathBuf>,
    export: Option<PathBuf>,
    config: Option<PathBuf>,
    iterations: Option<usize>,
    label_iterations: Option<usize>,
    scaling_ratio: Option<f64>,
    gravity: Option<f64>,
    no_label_adjust: bool,
    seed: Option<u64>,
    threads: Option<usize>,
    undirected: bool,
    verbosity: u8,
}

fn usage() -> &'static str {
    "narwhal-cli\n\
\n\
USAGE:\n\
  narwhal-cli [options] <import-path> <export-path>\n\
\n\
OPTIONS:\n\
  --config <path>            JSON layout options (camelCase, partial files allowed)\n\
  --iterations <n>           ForceAtlas2 iteration cap (default 200)\n\
  --label-iterations <n>     label-overlap iteration cap (default 200)\n\
  --scaling-ratio <k>        absolute repulsion scale (default 1.5 * node count)\n\
  --gravity <g>              absolute gravity (default node count)\n\
  --no-label-adjust          skip label-overlap removal\n\
  --seed <n>                 seed for placing nodes without a position\n\
  --threads <n>              worker threads for the force computation\n\
  --undirected               treat edges without an explicit direction as undirected\n\
  -v, --verbose              log progress to stderr (repeat for debug output)\n\
  -h, --help                 show this message\n\
\n\
NOTES:\n\
  - Formats are picked from the file extension: .json, .graphml or .xml.\n\
  - NARWHAL_LOG overrides the log filter when no -v flag is given.\n\
"
}

fn next_value<'a, T: std::str::FromStr>(
    it: &mut impl Iterator<Item = &'a String>,
) -> Result<T, CliError> {
    let Some(raw) = it.next() else {
        return Err(CliError::Usage(usage()));
    };
    raw.parse::<T>().map_err(|_| CliError::Usage(usage()))
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();
    let mut positionals: Vec<PathBuf> = Vec::new();

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "--config" => args.config = Some(next_value::<PathBuf>(&mut it)?),
            "--iterations" => args.iterations = Some(next_value(&mut it)?),
            "--label-iterations" => args.label_iterations = Some(next_value(&mut it)?),
            "--scaling-ratio" => args.scaling_ratio = Some(next_value(&mut it)?),
            "--gravity" => args.gravity = Some(next_value(&mut it)?),
            "--no-label-adjust" => args.no_label_adjust = true,
            "--seed" => args.seed = Some(next_value(&mut it)?),
            "--threads" => {
                let threads: usize = next_value(&mut it)?;
                if threads == 0 {
                    return Err(CliError::Usage(usage()));
                }
                args.threads = Some(threads);
            }
            "--undirected" => args.undirected = true,
            "--verbose" => args.verbosity = args.verbosity.saturating_add(1),
            // -v, -vv, -vvv ...
            cluster if cluster.len() > 1 && cluster[1..].bytes().all(|b| b == b'v') => {
                let count = u8::try_from(cluster.len() - 1).unwrap_or(u8::MAX);
                args.verbosity = args.verbosity.saturating_add(count);
            }
            "--" => positionals.extend(it.by_ref().map(PathBuf::from)),
            other if other.starts_with('-') => return Err(CliError::Usage(usage())),
            path => positionals.push(PathBuf::from(path)),
        }
    }

    let mut positionals = positionals.into_iter();
    let (Some(import), Some(export), None) =
        (positionals.next(), positionals.next(), positionals.next())
    else {
        return Err(CliError::Usage(usage()));
    };
    args.import = Some(import);
    args.export = Some(export);
    Ok(args)
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => tracing_subscriber::EnvFilter::try_from_env("NARWHAL_LOG")
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        1 => tracing_subscriber::EnvFilter::new("info"),
        _ => tracing_subscriber::EnvFilter::new("debug"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_options(args: &Args) -> Result<LayoutOptions, CliError> {
    let mut options = match &args.config {
        Some(path) => serde_json::from_str::<LayoutOptions>(&std::fs::read_to_string(path)?)?,
        None => LayoutOptions::default(),
    };

    let fa2 = &mut options.forceatlas2;
    if let Some(n) = args.iterations {
        fa2.max_iterations = n;
    }
    if let Some(k) = args.scaling_ratio {
        fa2.scaling_ratio = Some(k);
    }
    if let Some(g) = args.gravity {
        fa2.gravity = Some(g);
    }
    if let Some(seed) = args.seed {
        fa2.random_seed = seed;
    }
    if args.threads.is_some() {
        fa2.threads = args.threads;
    }

    let labels = &mut options.label_adjust;
    if let Some(n) = args.label_iterations {
        labels.max_iterations = n;
    }
    if args.no_label_adjust {
        labels.enabled = false;
    }

    options.validate()?;
    Ok(options)
}

fn summary(result: &LayoutResult) -> String {
    let stats = &result.forceatlas2;
    let mut line = format!(
        "layout: {} nodes, {} edges, {} iterations ({})",
        result.graph.node_count(),
        result.graph.edge_count(),
        stats.iterations,
        if stats.converged_early {
            "converged"
        } else {
            "stopped at cap"
        }
    );
    if let Some(labels) = &result.label_adjust {
        line.push_str(&format!(
            ", label overlaps {} -> {} in {} iterations",
            labels.overlaps_before, labels.overlaps_after, labels.iterations
        ));
    }
    line
}

/// Rejects unknown extensions up front so a bad export path fails before the layout runs.
fn check_formats(import: &Path, export: &Path) -> Result<(), CliError> {
    if FileFormat::from_path(import).is_none() {
        return Err(narwhal::Error::Import {
            path: import.to_path_buf(),
            message: "unsupported format".to_string(),
        }
        .into());
    }
    if FileFormat::from_path(export).is_none() {
        return Err(narwhal::Error::Export {
            path: export.to_path_buf(),
            message: "unsupported format".to_string(),
        }
        .into());
    }
    Ok(())
}

fn run(args: Args) -> Result<(), CliError> {
    let (Some(import), Some(export)) = (args.import.as_deref(), args.export.as_deref()) else {
        return Err(CliError::Usage(usage()));
    };
    check_formats(import, export)?;
    let options = load_options(&args)?;

    let edge_default = if args.undirected {
        EdgeDefault::Undirected
    } else {
        EdgeDefault::Directed
    };
    let driver = LayoutDriver::new(FileImporter::new(edge_default), FileExporter, options);
    let result = driver.run(import, export)?;

    println!("{}", summary(&result));
    println!("export: {}", export.display());
    Ok(())
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    init_tracing(args.verbosity);
    tracing::debug!(version = narwhal::VERSION, "narwhal-cli starting");

    if let Err(err) = run(args) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{CliError, check_formats, parse_args};
    use std::path::{Path, PathBuf};

    fn argv(list: &[&str]) -> Vec<String> {
        std::iter::once("narwhal-cli")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn two_positionals_are_required() {
        assert!(matches!(parse_args(&argv(&[])), Err(CliError::Usage(_))));
        assert!(matches!(
            parse_args(&argv(&["in.json"])),
            Err(CliError::Usage(_))
        ));
        assert!(matches!(
            parse_args(&argv(&["a.json", "b.json", "c.json"])),
            Err(CliError::Usage(_))
        ));
    }

    #[test]
    fn flags_and_positionals_mix() {
        let args = parse_args(&argv(&[
            "--iterations",
            "50",
            "in.graphml",
            "-vv",
            "--undirected",
            "out.json",
            "--scaling-ratio",
            "2.5",
        ]))
        .unwrap();
        assert_eq!(args.import, Some(PathBuf::from("in.graphml")));
        assert_eq!(args.export, Some(PathBuf::from("out.json")));
        assert_eq!(args.iterations, Some(50));
        assert_eq!(args.scaling_ratio, Some(2.5));
        assert!(args.undirected);
        assert_eq!(args.verbosity, 2);
    }

    #[test]
    fn bad_flag_values_are_usage_errors() {
        for bad in [
            &["--iterations", "many", "a.json", "b.json"][..],
            &["--threads", "0", "a.json", "b.json"][..],
            &["--unknown", "a.json", "b.json"][..],
            &["a.json", "b.json", "--seed"][..],
        ] {
            assert!(matches!(parse_args(&argv(bad)), Err(CliError::Usage(_))));
        }
    }

    #[test]
    fn repeated_v_flags_raise_verbosity() {
        let args = parse_args(&argv(&["-vvv", "a.json", "b.json"])).unwrap();
        assert_eq!(args.verbosity, 3);
        let args = parse_args(&argv(&["-v", "--verbose", "-vv", "a.json", "b.json"])).unwrap();
        assert_eq!(args.verbosity, 4);
        assert!(matches!(
            parse_args(&argv(&["-vx", "a.json", "b.json"])),
            Err(CliError::Usage(_))
        ));
    }

    #[test]
    fn unknown_extensions_are_caught_before_any_io() {
        assert!(check_formats(Path::new("in.json"), Path::new("out.graphml")).is_ok());
        assert!(matches!(
            check_formats(Path::new("in.json"), Path::new("out.svg")),
            Err(CliError::Layout(narwhal::Error::Export { .. }))
        ));
        assert!(matches!(
            check_formats(Path::new("in.dot"), Path::new("out.json")),
            Err(CliError::Layout(narwhal::Error::Import { .. }))
        ));
    }
}
