use anyhow::Context;
use cabinet_lib::{CompressionLevel, Config, FormEvent, FormState, Outcome};
use clap::Parser;
use std::{collections::HashMap, env, fs};
use tracing_subscriber::EnvFilter;

mod naming;
mod process;

#[derive(Parser, Debug)]
#[command(author, version, about = "Create Microsoft Cabinet archives from a folder", long_about = None)]
pub struct Cli {
    /// Source directory to archive (can be defined via config/env)
    #[arg()]
    pub source: Option<String>,

    /// Directory the archive is written into
    #[arg(short, long)]
    pub target: Option<String>,

    /// Archive name; ".cab" is appended when missing. Supports %date%, %time%, %datetime%, %pwd%...
    #[arg(short, long)]
    pub name: Option<String>,

    /// Configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Include subfolders
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    pub recursive: bool,

    /// Compression [none|fast|max]
    #[arg(long)]
    pub compression: Option<String>,

    /// Patterns to skip, relative to the source (can be specified multiple times)
    #[arg(short = 's', long)]
    pub skip: Vec<String>,

    /// Delete the archive again if packing fails
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub remove_partial: bool,

    /// Dry run (just list files and parameters)
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    pub dry: bool,

    /// Generate YAML config to stdout
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub generate_yaml_config: bool,

    /// Debug logging
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    pub verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Step 1: Read environment
    let env_config = read_env()?;

    // Step 2: Read config file (if exists)
    let mut file_config = Config::default();
    if let Some(path) = cli.config.clone().or(env_config.config.clone()) {
        file_config = read_config_file(&path)?;
    }

    // Step 3: Merge configs: env < file < CLI
    let mut merged = merge_configs(env_config, file_config, cli_to_config(&cli)?);

    // Apply defaults for optional parameters
    if merged.compression.is_none() {
        merged.compression = Some(CompressionLevel::default());
    }
    if merged.recursive.is_none() {
        merged.recursive = Some(false);
    }

    if cli.generate_yaml_config {
        let yaml = serde_yaml::to_string(&merged)?;
        println!("{yaml}");
        return Ok(());
    }

    // Drive the same form state a windowed front end would
    let form = form_from_config(&merged);
    if !form.can_start() {
        eprintln!(
            "Error: source (argument, config:source or CABINET_SOURCE), target (--target, config:target or CABINET_TARGET) and name (--name, config:name or CABINET_NAME) are required"
        );
        std::process::exit(2);
    }

    let request = match form.to_request() {
        Ok(request) => request,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(3);
        }
    };

    if merged.dry.unwrap_or(false) {
        return process::dry_run(&merged, &request);
    }

    let outcome = process::run_within_tokio(&merged, request)?;
    process::report(&outcome);

    match outcome {
        Outcome::Success(_) => Ok(()),
        Outcome::SetupFailure(_) => std::process::exit(4),
        Outcome::PackFailure(_) => std::process::exit(5),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn form_from_config(config: &Config) -> FormState {
    let name = config
        .name
        .as_deref()
        .map(naming::expand_archive_name)
        .unwrap_or_default();

    FormState::default()
        .apply(FormEvent::SourceChosen(config.source.clone().unwrap_or_default()))
        .apply(FormEvent::TargetChosen(config.target.clone().unwrap_or_default()))
        .apply(FormEvent::NameEdited(name))
        .apply(FormEvent::IncludeSubfolders(config.recursive.unwrap_or(false)))
}

fn parse_flag(v: &str) -> bool {
    v == "true" || v == "1" || v.eq_ignore_ascii_case("yes")
}

/// Reads environment variables prefixed with CABINET_
fn read_env() -> anyhow::Result<Config> {
    let vars: HashMap<String, String> = env::vars().collect();
    read_env_from(&vars)
}

fn read_env_from(vars: &HashMap<String, String>) -> anyhow::Result<Config> {
    let mut cfg = Config::default();

    macro_rules! get_env {
        ($key:expr) => {
            vars.get(&format!("CABINET_{}", $key)).cloned()
        };
    }

    cfg.source = get_env!("SOURCE");
    cfg.target = get_env!("TARGET");
    cfg.name = get_env!("NAME");
    cfg.config = get_env!("CONFIG");
    cfg.recursive = get_env!("RECURSIVE").map(|v| parse_flag(&v));
    cfg.compression = get_env!("COMPRESSION")
        .map(|v| v.parse::<CompressionLevel>())
        .transpose()
        .context("CABINET_COMPRESSION")?;
    cfg.skip = get_env!("SKIP").map(|v| {
        v.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    });
    cfg.dry = get_env!("DRY").map(|v| parse_flag(&v));
    cfg.remove_partial = get_env!("REMOVE_PARTIAL").map(|v| parse_flag(&v));
    Ok(cfg)
}

/// Reads YAML or JSON config from file
fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading config file {path}"))?;
    let lower = path.to_lowercase();
    let cfg = if lower.ends_with(".json") {
        serde_json::from_str(&content).with_context(|| format!("parsing {path}"))?
    } else {
        serde_yaml::from_str(&content).with_context(|| format!("parsing {path}"))?
    };
    Ok(cfg)
}

/// Converts CLI struct into Config; unset switches stay `None` so they don't mask file/env values
fn cli_to_config(cli: &Cli) -> anyhow::Result<Config> {
    Ok(Config {
        source: cli.source.clone(),
        target: cli.target.clone(),
        name: cli.name.clone(),
        config: cli.config.clone(),
        recursive: cli.recursive.then_some(true),
        compression: cli
            .compression
            .as_deref()
            .map(str::parse::<CompressionLevel>)
            .transpose()
            .context("--compression")?,
        skip: if cli.skip.is_empty() {
            None
        } else {
            Some(cli.skip.clone())
        },
        dry: cli.dry.then_some(true),
        remove_partial: cli.remove_partial.then_some(true),
    })
}

/// Merge configs by priority: env < file < cli
fn merge_configs(env: Config, file: Config, cli: Config) -> Config {
    fn pick<T: Clone>(env: Option<T>, file: Option<T>, cli: Option<T>) -> Option<T> {
        cli.or(file).or(env)
    }

    Config {
        source: pick(env.source, file.source, cli.source),
        target: pick(env.target, file.target, cli.target),
        name: pick(env.name, file.name, cli.name),
        config: pick(env.config, file.config, cli.config),
        recursive: pick(env.recursive, file.recursive, cli.recursive),
        compression: pick(env.compression, file.compression, cli.compression),
        skip: pick(env.skip, file.skip, cli.skip),
        dry: pick(env.dry, file.dry, cli.dry),
        remove_partial: pick(env.remove_partial, file.remove_partial, cli.remove_partial),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn cli_wins_over_file_and_env() {
        let env = Config {
            source: Some("/env".into()),
            target: Some("/env-out".into()),
            dry: Some(true),
            ..Default::default()
        };
        let file = Config {
            source: Some("/file".into()),
            compression: Some(CompressionLevel::None),
            ..Default::default()
        };
        let cli = Config {
            source: Some("/cli".into()),
            ..Default::default()
        };

        let merged = merge_configs(env, file, cli);
        assert_eq!(merged.source.as_deref(), Some("/cli"));
        assert_eq!(merged.target.as_deref(), Some("/env-out"));
        assert_eq!(merged.compression, Some(CompressionLevel::None));
        assert_eq!(merged.dry, Some(true));
    }

    #[test]
    fn unset_cli_switches_do_not_override() {
        let cli = Cli::parse_from(["cabinet", "/src"]);
        let config = cli_to_config(&cli).unwrap();
        assert_eq!(config.recursive, None);
        assert_eq!(config.dry, None);
        assert_eq!(config.source.as_deref(), Some("/src"));

        let cli = Cli::parse_from(["cabinet", "-r", "--compression", "FAST", "-s", "*.tmp"]);
        let config = cli_to_config(&cli).unwrap();
        assert_eq!(config.recursive, Some(true));
        assert_eq!(config.compression, Some(CompressionLevel::Fast));
        assert_eq!(config.skip, Some(vec!["*.tmp".to_string()]));
    }

    #[test]
    fn bad_compression_is_an_error() {
        let cli = Cli::parse_from(["cabinet", "--compression", "ultra"]);
        assert!(cli_to_config(&cli).is_err());
    }

    #[test]
    fn env_values_are_parsed() {
        let vars: HashMap<String, String> = [
            ("CABINET_SOURCE", "/a"),
            ("CABINET_RECURSIVE", "yes"),
            ("CABINET_SKIP", "*.log, ,tmp/*"),
            ("CABINET_COMPRESSION", "none"),
            ("UNRELATED", "x"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let cfg = read_env_from(&vars).unwrap();
        assert_eq!(cfg.source.as_deref(), Some("/a"));
        assert_eq!(cfg.recursive, Some(true));
        assert_eq!(cfg.skip, Some(vec!["*.log".to_string(), "tmp/*".to_string()]));
        assert_eq!(cfg.compression, Some(CompressionLevel::None));
        assert_eq!(cfg.target, None);
    }

    #[test]
    fn reads_yaml_and_json_files() {
        let dir = tempfile::TempDir::new().unwrap();

        let yaml = dir.path().join("cabinet.yaml");
        let mut f = fs::File::create(&yaml).unwrap();
        writeln!(f, "source: /a\nrecursive: true\ncompression: fast").unwrap();
        let cfg = read_config_file(yaml.to_str().unwrap()).unwrap();
        assert_eq!(cfg.source.as_deref(), Some("/a"));
        assert_eq!(cfg.recursive, Some(true));
        assert_eq!(cfg.compression, Some(CompressionLevel::Fast));

        let json = dir.path().join("cabinet.json");
        fs::write(&json, r#"{"target": "/out", "name": "backup"}"#).unwrap();
        let cfg = read_config_file(json.to_str().unwrap()).unwrap();
        assert_eq!(cfg.target.as_deref(), Some("/out"));
        assert_eq!(cfg.name.as_deref(), Some("backup"));
    }

    #[test]
    fn form_requires_all_inputs() {
        let config = Config {
            source: Some("/a".into()),
            target: Some("/out".into()),
            ..Default::default()
        };
        assert!(!form_from_config(&config).can_start());

        let config = Config {
            name: Some("archive".into()),
            ..config
        };
        let form = form_from_config(&config);
        assert!(form.can_start());
        assert_eq!(form.archive_name, "archive.cab");
    }
}
