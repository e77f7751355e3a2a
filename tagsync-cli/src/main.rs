use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use colored::Colorize;
use log::{LevelFilter, debug};
use serde::Deserialize;

use tagsync_core::{
    KeyValue, LabelSet, Reconciliation, ReservedKeys, TagChange, TagConfig, Tagger, reconcile,
    to_label_set, update_tags,
};
use tagsync_provider_awscc::{AwsccTagger, S3BucketTagger, normalize_region, reserved_keys_for};

#[derive(Parser)]
#[command(name = "tagsync")]
#[command(about = "Reconcile cloud resource tags with their declared state", long_about = None)]
struct Cli {
    /// Path to a tagsync config file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the changes between two tag files
    Diff {
        /// Tag file with the current tags
        old: PathBuf,
        /// Tag file with the desired tags
        new: PathBuf,
    },
    /// Show the tags currently attached to a resource
    Show {
        #[command(flatten)]
        target: Target,
    },
    /// Reconcile a resource's tags with a tag file
    Apply {
        #[command(flatten)]
        target: Target,

        /// Tag file with the desired tags
        new: PathBuf,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
    /// Print shell completions
    Completions {
        shell: Shell,
    },
}

#[derive(clap::Args)]
struct Target {
    /// Tagging API to use
    #[arg(long, value_enum, default_value_t = ProviderKind::Cloudcontrol)]
    provider: ProviderKind,

    /// Resource address: TYPE|IDENTIFIER for cloudcontrol, bucket name for s3
    #[arg(long)]
    resource: String,

    /// AWS region
    #[arg(long, default_value = "us-east-1")]
    region: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ProviderKind {
    Cloudcontrol,
    S3,
}

/// A tag file: either a JSON object or a `[{"Key", "Value"}]` array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TagFile {
    Map(BTreeMap<String, String>),
    List(Vec<KeyValue>),
}

impl TagFile {
    fn into_label_set(self) -> LabelSet {
        match self {
            TagFile::Map(map) => map.into(),
            TagFile::List(pairs) => LabelSet::from_pairs(pairs),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let result = match cli.command {
        Commands::Diff { old, new } => run_diff(cli.config.as_deref(), &old, &new),
        Commands::Show { target } => run_show(&target).await,
        Commands::Apply {
            target,
            new,
            auto_approve,
        } => run_apply(cli.config.as_deref(), &target, &new, auto_approve).await,
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "tagsync", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

fn init_logger(verbose: u8) {
    env_logger::Builder::new()
        .filter_level(log_level(verbose))
        .parse_default_env()
        .init();
}

fn parse_tag_file(content: &str) -> Result<LabelSet, String> {
    let file: TagFile = serde_json::from_str(content)
        .map_err(|_| "expected a JSON object or a [{\"Key\", \"Value\"}] array".to_string())?;
    Ok(file.into_label_set())
}

fn load_tag_file(path: &Path) -> Result<LabelSet, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    parse_tag_file(&content).map_err(|e| format!("Invalid tag file {}: {}", path.display(), e))
}

fn load_config(path: Option<&Path>) -> Result<TagConfig, String> {
    match path {
        Some(path) => TagConfig::load(path).map_err(|e| e.to_string()),
        None => Ok(TagConfig::default()),
    }
}

/// Reserved keys for a resource: the config's patterns win over the
/// per-service preset
fn reserved_keys(
    config_path: Option<&Path>,
    config: &TagConfig,
    target: Option<&Target>,
) -> Result<ReservedKeys, String> {
    match target {
        Some(target) if config_path.is_none() && target.provider == ProviderKind::Cloudcontrol => {
            Ok(reserved_keys_for(&target.resource))
        }
        _ => config.reserved_keys().map_err(|e| e.to_string()),
    }
}

fn run_diff(config_path: Option<&Path>, old: &Path, new: &Path) -> Result<(), String> {
    let config = load_config(config_path)?;
    let reserved = reserved_keys(config_path, &config, None)?;

    let old = to_label_set(&load_tag_file(old)?, &reserved);
    let new = load_tag_file(new)?;
    let (old, new) = config.prepare(&old, &new);

    let reconciliation = reconcile(&old, &new, &reserved);
    print_reconciliation(&reconciliation, &old);
    Ok(())
}

async fn get_tagger(target: &Target) -> Box<dyn Tagger> {
    let region = normalize_region(&target.region);
    debug!("Using {:?} tagger in {}", target.provider, region);
    match target.provider {
        ProviderKind::Cloudcontrol => Box::new(AwsccTagger::new(&region).await),
        ProviderKind::S3 => Box::new(S3BucketTagger::new(&region).await),
    }
}

async fn run_show(target: &Target) -> Result<(), String> {
    let tagger = get_tagger(target).await;
    let tags = tagger
        .list_tags(&target.resource)
        .await
        .map_err(|e| e.to_string())?;

    print_tags(&target.resource, &tags);
    Ok(())
}

async fn run_apply(
    config_path: Option<&Path>,
    target: &Target,
    new: &Path,
    auto_approve: bool,
) -> Result<(), String> {
    let config = load_config(config_path)?;
    let reserved = reserved_keys(config_path, &config, Some(target))?;
    let new = load_tag_file(new)?;

    let tagger = get_tagger(target).await;
    let current = tagger
        .list_tags(&target.resource)
        .await
        .map_err(|e| e.to_string())?;
    let (old, new) = config.prepare(&reserved.filter(&current), &new);

    let reconciliation = reconcile(&old, &new, &reserved);
    print_reconciliation(&reconciliation, &old);
    if reconciliation.is_empty() {
        return Ok(());
    }

    if !auto_approve && !confirm()? {
        println!();
        println!("{}", "Apply cancelled.".yellow());
        return Ok(());
    }

    println!("{}", "Applying changes...".cyan().bold());
    let applied = update_tags(&tagger, &target.resource, &old, &new, &reserved)
        .await
        .map_err(|e| {
            if e.is_partial() {
                format!("{} (resource is partially updated)", e)
            } else {
                e.to_string()
            }
        })?;

    println!("  {} {}", "✓".green(), applied.summary());
    println!();
    print_tags(&target.resource, &applied.apply_to(&old));
    Ok(())
}

fn confirm() -> Result<bool, String> {
    println!("{}", "Do you want to apply these changes?".yellow().bold());
    println!("  {}", "Only 'yes' will be accepted to approve.".yellow());
    print!("\n  Enter a value: ");
    std::io::Write::flush(&mut std::io::stdout()).map_err(|e| e.to_string())?;

    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .map_err(|e| e.to_string())?;
    Ok(input.trim() == "yes")
}

fn format_change(change: &TagChange) -> String {
    match change {
        TagChange::Add { key, value } => {
            format!("{} {} = {}", "+".green().bold(), key, value.green())
        }
        TagChange::Update { key, from, to } => format!(
            "{} {}: {} → {}",
            "~".yellow().bold(),
            key,
            from.red(),
            to.green()
        ),
        TagChange::Remove { key, value } => {
            format!("{} {} = {}", "-".red().bold(), key, value.red())
        }
    }
}

fn print_reconciliation(reconciliation: &Reconciliation, old: &LabelSet) {
    if reconciliation.is_empty() {
        println!("{}", "No changes. Tags are up-to-date.".green());
        return;
    }

    println!("{}", "Tag Changes:".cyan().bold());
    println!();
    for change in reconciliation.changes(old) {
        println!("  {}", format_change(&change));
    }
    println!();
    println!("{}", reconciliation.summary());
    println!();
}

fn print_tags(resource: &str, tags: &LabelSet) {
    println!("{}", resource.cyan().bold());
    if tags.is_empty() {
        println!("  {}", "(no tags)".dimmed());
        return;
    }
    for (key, value) in tags {
        println!("  {}: {}", key, value);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn parse_tag_file_as_map() {
        let tags = parse_tag_file(r#"{"Name": "web", "Environment": "prod"}"#).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags.get("Name"), Some("web"));
    }

    #[test]
    fn parse_tag_file_as_list() {
        let tags = parse_tag_file(
            r#"[{"Key": "Name", "Value": "web"}, {"Key": "Name", "Value": "api"}]"#,
        )
        .unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("Name"), Some("api"));
    }

    #[test]
    fn parse_tag_file_rejects_other_shapes() {
        assert!(parse_tag_file(r#"["Name"]"#).is_err());
        assert!(parse_tag_file(r#"{"Count": 3}"#).is_err());
        assert!(parse_tag_file("not json").is_err());
    }

    #[test]
    fn load_tag_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2]").unwrap();

        let err = load_tag_file(file.path()).unwrap_err();
        assert!(err.starts_with("Invalid tag file"));
        assert!(err.contains(&file.path().display().to_string()));
    }

    #[test]
    fn verbosity_maps_to_log_level() {
        assert_eq!(log_level(0), LevelFilter::Warn);
        assert_eq!(log_level(1), LevelFilter::Info);
        assert_eq!(log_level(2), LevelFilter::Debug);
        assert_eq!(log_level(5), LevelFilter::Debug);
    }

    #[test]
    fn cloudcontrol_uses_service_preset_without_config() {
        let target = Target {
            provider: ProviderKind::Cloudcontrol,
            resource: "AWS::RDS::DBInstance|db-1".to_string(),
            region: "us-east-1".to_string(),
        };

        let reserved = reserved_keys(None, &TagConfig::default(), Some(&target)).unwrap();
        assert!(reserved.is_reserved("rds:owner"));

        let from_config = reserved_keys(
            Some(Path::new("tagsync.json")),
            &TagConfig::default(),
            Some(&target),
        )
        .unwrap();
        assert!(!from_config.is_reserved("rds:owner"));
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn format_change_markers() {
        colored::control::set_override(false);
        let add = TagChange::Add {
            key: "Name".to_string(),
            value: "web".to_string(),
        };
        let remove = TagChange::Remove {
            key: "Old".to_string(),
            value: "x".to_string(),
        };

        assert_eq!(format_change(&add), "+ Name = web");
        assert_eq!(format_change(&remove), "- Old = x");
    }
}
