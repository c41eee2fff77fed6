use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::download::DownloadOptions;
use crate::commands::local::LocalStep;
use crate::commands::record::{NodeOptions, RecordAction, RecordOptions};
use crate::commands::upload::UploadOptions;
use crate::commands::{self, CommandReport, GlobalOptions};

#[derive(Debug, Parser)]
#[command(
    name = "nodesite",
    version,
    about = "Store a directory as chunked nodes of a ledger record and restore it"
)]
struct Cli {
    /// Print the command report as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Ledger API endpoint (overrides NODESITE_ENDPOINT).
    #[arg(long, global = true, value_name = "URL")]
    endpoint: Option<String>,

    /// Contract account holding the records (overrides NODESITE_CONTRACT).
    #[arg(long, global = true)]
    contract: Option<String>,

    /// Working area for intermediate artifacts (overrides NODESITE_WORK_DIR).
    #[arg(long, global = true, value_name = "DIR")]
    work_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct AuthArgs {
    /// Account that signs mutating calls.
    #[arg(long)]
    account: Option<String>,

    /// Permission of the signing account.
    #[arg(long)]
    permission: Option<String>,
}

#[derive(Debug, Args)]
struct TargetArgs {
    /// Record name.
    #[arg(long)]
    record: String,

    /// Record owner; defaults to the configured account.
    #[arg(long)]
    owner: Option<String>,

    #[command(flatten)]
    auth: AuthArgs,
}

impl TargetArgs {
    fn options(&self) -> RecordOptions {
        RecordOptions {
            record: self.record.clone(),
            owner: self.owner.clone(),
            account: self.auth.account.clone(),
            permission: self.auth.permission.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Pack, compress, split and upload a file or directory into an empty record.
    Upload {
        #[arg(long)]
        record: String,
        #[arg(long, value_name = "PATH")]
        input: PathBuf,
        #[command(flatten)]
        auth: AuthArgs,
        /// Maximum bytes per node (1024..=1048576).
        #[arg(long, value_name = "BYTES")]
        chunk_size: Option<u64>,
    },
    /// Fetch every node of a record and unpack it into a directory.
    Download {
        #[arg(long)]
        record: String,
        #[arg(long, value_name = "DIR")]
        output: PathBuf,
        #[arg(long)]
        account: Option<String>,
    },
    /// Show a record's metadata.
    Meta(TargetArgs),
    /// Save one node's payload to a file.
    Node {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long)]
        index: u64,
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },
    /// Delete the topmost node.
    Pop(TargetArgs),
    /// Delete every node, keeping the record.
    Reset(TargetArgs),
    /// Delete the record.
    Remove(TargetArgs),
    /// Mark the record published.
    Publish(TargetArgs),
    /// Clear the published flag.
    Unpublish(TargetArgs),
    /// Make the record immutable.
    Freeze(TargetArgs),
    /// Archive a file or directory.
    Pack {
        source: PathBuf,
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
    },
    /// Extract an archive into a directory.
    Unpack { archive: PathBuf, target: PathBuf },
    /// Brotli-compress a file to `<file>.br`.
    Compress { path: PathBuf },
    /// Decompress a `.br` file.
    Decompress { path: PathBuf },
    /// Split a file into `SPLIT_<name>.<index>` chunks.
    Split {
        path: PathBuf,
        #[arg(long, value_name = "BYTES")]
        chunk_size: Option<u64>,
    },
    /// Rejoin `<prefix>.0, <prefix>.1, ...` into `JOIN_<name>`.
    Join { prefix: PathBuf },
    /// Show resolved paths and configuration.
    Status,
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!(
        "{}: {}",
        report.command,
        if report.ok { "ok" } else { "failed" }
    );
    for detail in &report.details {
        println!("  {detail}");
    }
    for issue in &report.issues {
        println!("  ! {issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let globals = GlobalOptions {
        endpoint: cli.endpoint,
        contract: cli.contract,
        work_dir: cli.work_dir,
    };

    let report = match cli.command {
        Command::Upload {
            record,
            input,
            auth,
            chunk_size,
        } => commands::upload::run(
            &globals,
            &UploadOptions {
                record,
                input,
                account: auth.account,
                permission: auth.permission,
                chunk_size,
            },
        )?,
        Command::Download {
            record,
            output,
            account,
        } => commands::download::run(
            &globals,
            &DownloadOptions {
                record,
                output,
                account,
            },
        )?,
        Command::Meta(target) => commands::record::run_meta(&globals, &target.options())?,
        Command::Node { target, index, out } => commands::record::run_node(
            &globals,
            &NodeOptions {
                target: target.options(),
                index,
                out,
            },
        )?,
        Command::Pop(target) => {
            commands::record::run_action(&globals, &target.options(), RecordAction::Pop)?
        }
        Command::Reset(target) => {
            commands::record::run_action(&globals, &target.options(), RecordAction::Reset)?
        }
        Command::Remove(target) => {
            commands::record::run_action(&globals, &target.options(), RecordAction::Remove)?
        }
        Command::Publish(target) => {
            commands::record::run_action(&globals, &target.options(), RecordAction::Publish)?
        }
        Command::Unpublish(target) => {
            commands::record::run_action(&globals, &target.options(), RecordAction::Unpublish)?
        }
        Command::Freeze(target) => {
            commands::record::run_action(&globals, &target.options(), RecordAction::Freeze)?
        }
        Command::Pack { source, out_dir } => {
            commands::local::run(&globals, &LocalStep::Pack { source, out_dir })?
        }
        Command::Unpack { archive, target } => {
            commands::local::run(&globals, &LocalStep::Unpack { archive, target })?
        }
        Command::Compress { path } => commands::local::run(&globals, &LocalStep::Compress { path })?,
        Command::Decompress { path } => {
            commands::local::run(&globals, &LocalStep::Decompress { path })?
        }
        Command::Split { path, chunk_size } => {
            commands::local::run(&globals, &LocalStep::Split { path, chunk_size })?
        }
        Command::Join { prefix } => commands::local::run(&globals, &LocalStep::Join { prefix })?,
        Command::Status => commands::status::run(&globals)?,
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        anyhow::bail!("{} reported {} issue(s)", report.command, report.issues.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
