use anyhow::Result;
use std::path::PathBuf;

use crate::commands::{CommandReport, GlobalOptions, load_session};
use crate::site::config::ConfigOverrides;
use crate::site::{archive, chunk, compress};

/// One pipeline stage run by hand on local paths.
#[derive(Debug, Clone)]
pub enum LocalStep {
    Pack {
        source: PathBuf,
        out_dir: Option<PathBuf>,
    },
    Unpack {
        archive: PathBuf,
        target: PathBuf,
    },
    Compress {
        path: PathBuf,
    },
    Decompress {
        path: PathBuf,
    },
    Split {
        path: PathBuf,
        chunk_size: Option<u64>,
    },
    Join {
        prefix: PathBuf,
    },
}

impl LocalStep {
    fn label(&self) -> &'static str {
        match self {
            LocalStep::Pack { .. } => "pack",
            LocalStep::Unpack { .. } => "unpack",
            LocalStep::Compress { .. } => "compress",
            LocalStep::Decompress { .. } => "decompress",
            LocalStep::Split { .. } => "split",
            LocalStep::Join { .. } => "join",
        }
    }
}

pub fn run(globals: &GlobalOptions, step: &LocalStep) -> Result<CommandReport> {
    let chunk_size = match step {
        LocalStep::Split { chunk_size, .. } => *chunk_size,
        _ => None,
    };
    let session = load_session(
        globals,
        ConfigOverrides {
            chunk_size,
            ..ConfigOverrides::default()
        },
    )?;
    let mut report = CommandReport::new(step.label());

    match step {
        LocalStep::Pack { source, out_dir } => {
            let out_dir = match out_dir {
                Some(dir) => dir.clone(),
                None => {
                    session.area.ensure()?;
                    session.area.root().to_path_buf()
                }
            };
            let archive_path = archive::pack(source, &out_dir)?;
            report.detail(format!("archive={}", archive_path.display()));
        }
        LocalStep::Unpack { archive, target } => {
            archive::unpack(archive, target)?;
            report.detail(format!("target={}", target.display()));
        }
        LocalStep::Compress { path } => {
            let out = compress::compress(path, session.config.transfer.brotli_quality)?;
            report.detail(format!("compressed={}", out.display()));
        }
        LocalStep::Decompress { path } => {
            let out = compress::decompress(path)?;
            report.detail(format!("decompressed={}", out.display()));
        }
        LocalStep::Split { path, .. } => {
            let out = chunk::split(path, session.config.transfer.chunk_size)?;
            report.detail(format!("prefix={}", out.prefix.display()));
            report.detail(format!("chunks={}", chunk::probe_chunks(&out.prefix)));
            report.detail(format!("bytes={}", out.bytes));
        }
        LocalStep::Join { prefix } => {
            let out = chunk::join(prefix)?;
            report.detail(format!("joined={}", out.display()));
        }
    }

    Ok(report)
}
