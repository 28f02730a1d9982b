use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use sweepr_common::network::host::HostResult;
use tracing::info;

pub trait ResultExporter {
    fn export(&self, hosts: &[HostResult]) -> anyhow::Result<()>;
}

/// Writes the host list as a pretty-printed JSON array.
pub struct JsonExporter {
    path: PathBuf,
}

impl JsonExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ResultExporter for JsonExporter {
    fn export(&self, hosts: &[HostResult]) -> anyhow::Result<()> {
        let file = File::create(&self.path)
            .with_context(|| format!("creating {}", self.path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, hosts).context("serializing scan results")?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        info!("wrote {} host(s) to {}", hosts.len(), self.path.display());
        Ok(())
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
