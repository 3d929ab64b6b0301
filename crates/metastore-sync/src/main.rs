//! metastore-sync CLI
//!
//! Command-line tool for copying and merging metastore tables between
//! catalogs. Catalogs are JSON snapshot files; the target snapshot is
//! rewritten after every mutating command, including failed ones, so
//! partially applied changes are kept.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use metastore_sync::memory::DEFAULT_WAREHOUSE;
use metastore_sync::prelude::*;

/// Copy and merge Hive-style metastore tables into versioned branches.
#[derive(Parser)]
#[command(name = "metastore-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Source catalog snapshot.
    #[arg(short, long, env = "METASTORE_SOURCE")]
    source: PathBuf,

    /// Target catalog snapshot (created if missing).
    #[arg(short, long, env = "METASTORE_TARGET")]
    target: PathBuf,

    /// Root replacing `dbfs:/` in source locations.
    #[arg(long, env = "METASTORE_DBFS_ROOT", default_value = "")]
    dbfs_root: String,

    /// Warehouse root for target databases without a location.
    #[arg(long, env = "METASTORE_WAREHOUSE", default_value = DEFAULT_WAREHOUSE)]
    warehouse: String,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Source and target table names.
#[derive(Args)]
struct TableArgs {
    /// Source database.
    #[arg(long)]
    from_db: String,

    /// Source table.
    #[arg(long)]
    from_table: String,

    /// Target database (defaults to the source database).
    #[arg(long)]
    to_db: Option<String>,

    /// Target table (defaults to the source table).
    #[arg(long)]
    to_table: Option<String>,
}

impl TableArgs {
    fn target(&self) -> (String, String) {
        (
            self.to_db.clone().unwrap_or_else(|| self.from_db.clone()),
            self.to_table
                .clone()
                .unwrap_or_else(|| self.from_table.clone()),
        )
    }
}

/// Database and table selection for bulk commands.
#[derive(Args)]
struct BulkArgs {
    /// Pattern selecting source databases (`*` wildcard, `|` alternatives).
    #[arg(long, default_value = "*")]
    schema_filter: String,

    /// Pattern selecting tables in each database.
    #[arg(long, default_value = "*")]
    table_filter: String,

    /// Log failing tables and keep going.
    #[arg(long)]
    continue_on_error: bool,

    /// Repair Spark placeholder locations.
    #[arg(long)]
    fix_spark_placeholder: bool,
}

impl BulkArgs {
    fn options(&self) -> BulkOptions {
        BulkOptions::new()
            .schema_filter(&self.schema_filter)
            .table_filter(&self.table_filter)
            .continue_on_error(self.continue_on_error)
            .fix_spark_placeholder(self.fix_spark_placeholder)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Copy or merge one table onto a branch.
    Copy {
        #[command(flatten)]
        table: TableArgs,

        /// Destination branch.
        #[arg(long)]
        to_branch: String,

        /// Serde name to set on the target.
        #[arg(long, default_value = "")]
        serde: String,

        /// Copy only the partition with these values.
        #[arg(short, long, value_delimiter = ',')]
        partition: Vec<String>,

        /// Repair Spark placeholder locations.
        #[arg(long)]
        fix_spark_placeholder: bool,
    },

    /// Copy a database definition onto a branch.
    CopyDb {
        /// Source database.
        #[arg(long)]
        from_db: String,

        /// Target database (defaults to the source database).
        #[arg(long)]
        to_db: Option<String>,

        /// Destination branch.
        #[arg(long)]
        to_branch: String,
    },

    /// Copy or merge every matching table onto a branch.
    CopyAll {
        #[command(flatten)]
        bulk: BulkArgs,

        /// Destination branch.
        #[arg(long)]
        to_branch: String,
    },

    /// Register every matching table at its imported repository location.
    ImportAll {
        #[command(flatten)]
        bulk: BulkArgs,

        /// Destination repository.
        #[arg(long)]
        repository: String,

        /// Destination branch.
        #[arg(long)]
        to_branch: String,
    },

    /// Print the column and partition differences between two tables.
    Diff {
        #[command(flatten)]
        table: TableArgs,
    },

    /// Export a table to a symlink catalog.
    CreateSymlink {
        #[command(flatten)]
        table: TableArgs,

        /// Root under which symlink manifests are written.
        #[arg(long)]
        location_prefix: String,

        /// Repair Spark placeholder locations.
        #[arg(long)]
        fix_spark_placeholder: bool,
    },
}

fn print_report(report: &BulkReport) {
    println!(
        "Synced {} table(s) across {} database(s).",
        report.tables_synced.len(),
        report.databases.len()
    );
    if !report.failures.is_empty() {
        println!("\nFailed tables:");
        println!("{:-<60}", "");
        for failure in &report.failures {
            println!(" [!] {}: {}", failure.table, failure.error);
        }
        println!();
    }
}

async fn save(target: &MemoryCatalog, path: &Path) -> anyhow::Result<()> {
    target.save(path).await?;
    info!("Target catalog written to {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    let source = MemoryCatalog::load(&cli.source).await?;
    let target = MemoryCatalog::load(&cli.target)
        .await?
        .with_warehouse(&cli.warehouse);
    let reconciler = Reconciler::new(&source, &target).with_cancellation(cancel.clone());

    match cli.command {
        Commands::Copy {
            table,
            to_branch,
            serde,
            partition,
            fix_spark_placeholder,
        } => {
            let (to_db, to_table) = table.target();
            let options = TransformOptions::new(to_db, to_table)
                .serde(serde)
                .fix_spark_placeholder(fix_spark_placeholder);
            let transformer = BranchLocation::new(to_branch).with_dbfs_root(&cli.dbfs_root);
            let partition = (!partition.is_empty()).then_some(partition.as_slice());
            let result = reconciler
                .copy_or_merge(
                    &table.from_db,
                    &table.from_table,
                    partition,
                    &options,
                    &transformer,
                )
                .await;
            save(&target, &cli.target).await?;
            result?;
        }

        Commands::CopyDb {
            from_db,
            to_db,
            to_branch,
        } => {
            let to_db = to_db.unwrap_or_else(|| from_db.clone());
            let transformer = BranchLocation::new(to_branch).with_dbfs_root(&cli.dbfs_root);
            let result = reconciler.copy_db(&from_db, &to_db, &transformer).await;
            save(&target, &cli.target).await?;
            result?;
        }

        Commands::CopyAll { bulk, to_branch } => {
            let driver = BulkDriver::new(&source, &target, bulk.options())
                .with_cancellation(cancel.clone());
            let report = driver.copy_or_merge_all(&to_branch, &cli.dbfs_root).await;
            save(&target, &cli.target).await?;
            print_report(&report?);
        }

        Commands::ImportAll {
            bulk,
            repository,
            to_branch,
        } => {
            let driver = BulkDriver::new(&source, &target, bulk.options())
                .with_cancellation(cancel.clone());
            let report = driver
                .import_all(&repository, &to_branch, &cli.dbfs_root)
                .await;
            save(&target, &cli.target).await?;
            print_report(&report?);
        }

        Commands::Diff { table } => {
            let (to_db, to_table) = table.target();
            let diff = get_diff(
                &source,
                &target,
                &table.from_db,
                &table.from_table,
                &to_db,
                &to_table,
                &cancel,
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&diff)?);
        }

        Commands::CreateSymlink {
            table,
            location_prefix,
            fix_spark_placeholder,
        } => {
            let (to_db, to_table) = table.target();
            let result = reconciler
                .copy_or_merge_to_symlink(
                    &table.from_db,
                    &table.from_table,
                    &to_db,
                    &to_table,
                    &location_prefix,
                    fix_spark_placeholder,
                )
                .await;
            save(&target, &cli.target).await?;
            result?;
        }
    }

    Ok(())
}
