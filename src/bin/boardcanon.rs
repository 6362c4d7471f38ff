use std::collections::BTreeMap;
use std::fs;
use std::io::Read;

use boardcanon::config::{
    BoardCanonConfig, ConfigOverrides, NormalizerOverrides, StorageOverrides,
};
use boardcanon::{brand, BoardCanon, ScrapedBoard, SpecRecord, Store};

fn parse_arg(flag: &str) -> Option<String> {
    let mut args = std::env::args();
    while let Some(arg) = args.next() {
        if arg == flag {
            return args.next();
        }
    }
    None
}

fn has_flag(flag: &str) -> bool {
    std::env::args().any(|arg| arg == flag)
}

fn print_help() {
    eprintln!(
        r#"boardcanon - snowboard identity resolution

USAGE:
    boardcanon [OPTIONS] --input <FILE>
    boardcanon [OPTIONS] --specs <FILE> --db <DIR>
    boardcanon [OPTIONS] --trace <TITLE> [--brand <BRAND>]

OPTIONS:
    -i, --input <FILE>      JSON array of scraped boards ("-" for stdin)
        --specs <FILE>      JSON array of spec records to ingest by source priority
        --db <DIR>          Persist to the RocksDB catalog at DIR
        --label <NAME>      Search run label [default: cli]
        --sources           Include per-field sources and disagreements in output
        --trace <TITLE>     Print every normalization step for one title
    -b, --brand <BRAND>     Brand for --trace
    -r, --rules <FILE>      Extra rule table (TOML or JSON) merged over built-in rules
        --keep-profile      Keep profile designators (Camber, Rocker) in model names
        --repair            Repair the database before opening
    -c, --config <FILE>     Path to config file (TOML)
    -h, --help              Print help

ENVIRONMENT:
    BOARDCANON_CONFIG                   Path to config file
    BOARDCANON_STORAGE__PATH            Catalog directory
    BOARDCANON_NORMALIZER__RULES_PATH   Extra rule table
    RUST_LOG                            Log filter (e.g. boardcanon=debug)
"#
    );
}

fn read_input(path: &str) -> anyhow::Result<String> {
    if path == "-" {
        let mut raw = String::new();
        std::io::stdin().read_to_string(&mut raw)?;
        Ok(raw)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn main() -> anyhow::Result<()> {
    if has_flag("-h") || has_flag("--help") {
        print_help();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Build CLI overrides
    let mut overrides = ConfigOverrides::default();
    let mut normalizer_overrides = NormalizerOverrides::default();
    let mut storage_overrides = StorageOverrides::default();

    if let Some(rules) = parse_arg("--rules").or_else(|| parse_arg("-r")) {
        normalizer_overrides.rules_path = Some(rules.into());
    }
    if has_flag("--keep-profile") {
        normalizer_overrides.keep_profile = Some(true);
    }
    if let Some(db) = parse_arg("--db") {
        storage_overrides.path = Some(db.into());
    }
    if has_flag("--repair") {
        storage_overrides.repair = Some(true);
    }

    if normalizer_overrides.rules_path.is_some() || normalizer_overrides.keep_profile.is_some() {
        overrides.normalizer = Some(normalizer_overrides);
    }
    let persist =
        storage_overrides.path.is_some() || std::env::var("BOARDCANON_STORAGE__PATH").is_ok();
    if storage_overrides.path.is_some() || storage_overrides.repair.is_some() {
        overrides.storage = Some(storage_overrides);
    }

    // Load config: CLI > Env > File > Defaults
    let config_path = parse_arg("--config")
        .or_else(|| parse_arg("-c"))
        .or_else(|| std::env::var("BOARDCANON_CONFIG").ok());
    let config = BoardCanonConfig::load(config_path.as_deref(), overrides)?;

    let mut canon = if persist {
        BoardCanon::open(config)?
    } else {
        BoardCanon::with_store(config, Store::new())?
    };

    if let Some(title) = parse_arg("--trace") {
        let brand = parse_arg("--brand")
            .or_else(|| parse_arg("-b"))
            .map(|raw| brand::canonicalize(&raw));
        let normalizer = canon.normalizer();
        let trace = normalizer.normalize_traced(&title, brand.as_ref(), normalizer.defaults());
        println!("{}", serde_json::to_string_pretty(&trace)?);
        return Ok(());
    }

    if let Some(path) = parse_arg("--specs") {
        let records: Vec<SpecRecord> = serde_json::from_str(&read_input(&path)?)?;
        let report = canon.ingest(&records)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let Some(path) = parse_arg("--input").or_else(|| parse_arg("-i")) else {
        print_help();
        anyhow::bail!("missing --input");
    };
    let records: Vec<ScrapedBoard> = serde_json::from_str(&read_input(&path)?)?;
    let groups = canon.identify_boards(&records);

    if persist {
        let label = parse_arg("--label").unwrap_or_else(|| "cli".to_string());
        let run = boardcanon::SearchRun::new(&label);
        let report = canon.commit_run(&run, &groups)?;
        eprintln!(
            "Committed run {} ({}): {} boards, {} listings",
            run.id, run.label, report.boards, report.listings
        );
    }

    if has_flag("--sources") {
        println!("{}", serde_json::to_string_pretty(&groups)?);
    } else {
        let boards: BTreeMap<_, _> = groups
            .into_iter()
            .map(|(key, group)| (key, group.board))
            .collect();
        println!("{}", serde_json::to_string_pretty(&boards)?);
    }

    Ok(())
}
