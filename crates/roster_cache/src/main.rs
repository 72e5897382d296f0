//! sysgroup CLI
//!
//! Cost center dump → roster snapshot (MessagePack+LZ4)
//! Metadata records (JSON Lines) → system groups per archived path

#[cfg(feature = "cli")]
use anyhow::{Context, Result};
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::{Path, PathBuf};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "sysgroup")]
#[command(about = "Resolve archived metadata records to cluster system groups", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Build a roster snapshot from the cost center dump
    Roster {
        /// Cost center dump (JSON array)
        #[arg(long)]
        dump: PathBuf,

        /// Curated `cost center<TAB>groups` overrides
        #[arg(long)]
        special_cases: Option<PathBuf>,

        /// Listing of every group on the cluster, one per line
        #[arg(long)]
        groups: Option<PathBuf>,

        /// Output MsgPack+LZ4 file path
        #[arg(long)]
        out: PathBuf,

        /// Schema version (e.g., "v1")
        #[arg(long, default_value = "v1")]
        schema_version: String,

        /// Verify snapshot after building
        #[arg(long, default_value = "false")]
        verify: bool,

        /// Output metadata JSON file
        #[arg(long)]
        metadata: Option<PathBuf>,
    },

    /// Resolve system groups for metadata records
    Resolve {
        /// Roster snapshot built by `sysgroup roster`
        #[arg(long)]
        roster: PathBuf,

        /// Metadata records (JSON Lines)
        #[arg(long)]
        records: PathBuf,

        /// Resolver config (YAML); defaults to SYSGROUP_CONFIG_PATH or config/sysgroup.yaml
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write a JSON report of every outcome
        #[arg(long)]
        report: Option<PathBuf>,

        /// Write records with `system_groups` added (JSON Lines)
        #[arg(long)]
        annotate: Option<PathBuf>,

        /// Resolve on all cores (loads every record first)
        #[arg(long, default_value = "false")]
        parallel: bool,

        /// Only print the summary
        #[arg(long, default_value = "false")]
        quiet: bool,
    },
}

#[cfg(feature = "cli")]
fn main() -> Result<()> {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Roster {
            dump,
            special_cases,
            groups,
            out,
            schema_version,
            verify,
            metadata,
        } => {
            println!("🔨 Building roster snapshot...");
            println!("   Dump:   {}", dump.display());
            if let Some(path) = &special_cases {
                println!("   Special cases: {}", path.display());
            }
            if let Some(path) = &groups {
                println!("   Groups: {}", path.display());
            }
            println!("   Output: {}", out.display());
            println!("   Schema: {}", schema_version);

            let (meta, stats) = roster_cache::build_roster_cache(
                &dump,
                special_cases.as_deref(),
                groups.as_deref(),
                &out,
                &schema_version,
            )?;

            print_metadata(&meta);
            print_roster_stats(&stats);

            if verify {
                verify_cache_integrity(&out, &meta.checksum)?;
            }

            if let Some(metadata_path) = metadata {
                save_metadata(&metadata_path, &meta)?;
            }
        }

        Commands::Resolve {
            roster,
            records,
            config,
            report,
            annotate,
            parallel,
            quiet,
        } => {
            let config = match &config {
                Some(path) => sysgroup_core::ResolverConfig::load(path),
                None => sysgroup_core::ResolverConfig::load_default(),
            }
            .context("Failed to load resolver config")?;

            let snapshot = roster_cache::load_roster_cache(&roster)?;
            let (roster, _) = snapshot.to_roster(&config.exceptions)?;
            eprintln!(
                "📇 Roster: {} entries (schema {})",
                roster.len(),
                snapshot.schema_version
            );

            let resolver = sysgroup_core::GroupResolver::new(&roster, &config);
            let mut pass =
                roster_cache::ResolutionPass::new(resolver).keep_reports(report.is_some());
            if let Some(path) = &annotate {
                let file = std::fs::File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                pass = pass.annotate_to(std::io::BufWriter::new(file));
            }

            let lines = roster_cache::read_records(&records, &config.index_key)?;
            let print = |r: &sysgroup_core::ResolutionReport| {
                if !quiet {
                    println!("{}", r);
                }
            };
            if parallel {
                pass.run_parallel(lines, print)?;
            } else {
                pass.run(lines, print)?;
            }

            print_summary(&pass.summary);

            if let Some(path) = &report {
                pass.write_report(path)?;
                println!("\n📄 Report saved to: {}", path.display());
            }
            if let Some(path) = &annotate {
                println!("📄 Annotated records saved to: {}", path.display());
            }
        }
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn print_metadata(meta: &roster_cache::CacheMetadata) {
    println!("\n✅ Roster snapshot built successfully!");
    println!("   Entries:         {}", meta.entries);
    println!(
        "   Original size:   {} bytes ({})",
        meta.original_size,
        roster_cache::human_bytes(meta.original_size)
    );
    println!(
        "   Compressed size: {} bytes ({})",
        meta.compressed_size,
        roster_cache::human_bytes(meta.compressed_size)
    );
    println!("   Compression:     {:.1}%", meta.compression_ratio * 100.0);
    println!("   Checksum:        {}", meta.checksum);
    println!("   Created:         {}", meta.created_at);
}

#[cfg(feature = "cli")]
fn print_roster_stats(stats: &sysgroup_core::RosterBuildStats) {
    println!("\n📊 Cost center mapping");
    println!("   Total entries:   {}", stats.total);
    println!("   Derived groups:  {}", stats.derived);
    println!("   No group (DNF):  {}", stats.skipped_no_groups);
    println!("   Unknown groups:  {}", stats.unknown_groups);
    if !stats.ambiguous.is_empty() {
        println!("   ⚠️  Ambiguous keys: {}", stats.ambiguous.len());
    }
}

#[cfg(feature = "cli")]
fn print_summary(summary: &sysgroup_core::ReportSummary) {
    println!("\n📊 Resolution summary");
    println!("   Records:         {}", summary.total);
    println!("   Resolved:        {}", summary.resolved());
    println!("     direct fields: {}", summary.direct_fields);
    println!("     special path:  {}", summary.special_path);
    println!("     path search:   {}", summary.path_search);
    println!("   No group found:  {}", summary.no_group_found);
    println!("   No query found:  {}", summary.no_usable_query);
    println!("   Malformed:       {}", summary.malformed);
}

#[cfg(feature = "cli")]
fn verify_cache_integrity(cache_path: &Path, checksum: &str) -> Result<()> {
    println!("\n🔍 Verifying snapshot integrity...");
    let is_valid = roster_cache::verify_cache(cache_path, checksum)?;

    if is_valid {
        println!("✅ Snapshot verification passed");
        Ok(())
    } else {
        anyhow::bail!("❌ Snapshot verification failed - checksum mismatch!")
    }
}

#[cfg(feature = "cli")]
fn save_metadata(path: &Path, meta: &roster_cache::CacheMetadata) -> Result<()> {
    let metadata_json = serde_json::to_string_pretty(meta)?;
    std::fs::write(path, metadata_json)
        .with_context(|| format!("Failed to write metadata: {}", path.display()))?;
    println!("\n📄 Metadata saved to: {}", path.display());
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("sysgroup CLI is not available. Enable the 'cli' feature to use it.");
    std::process::exit(1);
}
