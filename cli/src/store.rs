//! One JSON snapshot file per deal under a data directory

use anyhow::{bail, Context, Result};
use salesbrain::{DealEngine, EngineConfig, GraphSnapshot};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub struct JsonDealStore {
    dir: PathBuf,
}

impl JsonDealStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        JsonDealStore { dir: dir.into() }
    }

    /// File for `deal`; the id must name a file directly inside the data directory
    fn path(&self, deal: &str) -> Result<PathBuf> {
        let trimmed = deal.trim();
        if trimmed.is_empty()
            || trimmed.contains(['/', '\\', '\0'])
            || trimmed.contains("..")
        {
            bail!("invalid deal id '{}'", deal);
        }
        Ok(self.dir.join(format!("{}.json", deal)))
    }

    /// Deal names, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut deals = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("reading {}", self.dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    deals.push(stem.to_string());
                }
            }
        }
        deals.sort();
        Ok(deals)
    }

    pub fn exists(&self, deal: &str) -> Result<bool> {
        Ok(self.path(deal)?.exists())
    }

    pub fn load(&self, deal: &str, config: Arc<EngineConfig>) -> Result<DealEngine> {
        let path = self.path(deal)?;
        if !path.exists() {
            bail!("deal '{}' not found in {}", deal, self.dir.display());
        }
        load_file(&path, config)
    }

    pub fn save(&self, deal: &DealEngine) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self.path(deal.id().as_str())?;
        let json = deal.export().to_json()?;
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        debug!(path = %path.display(), "deal saved");
        Ok(path)
    }
}

/// Read a snapshot file and rebuild the deal through import validation
pub fn load_file(path: &Path, config: Arc<EngineConfig>) -> Result<DealEngine> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let snapshot = GraphSnapshot::from_json(&text)
        .with_context(|| format!("parsing {}", path.display()))?;
    let deal = DealEngine::import(&snapshot, config)
        .with_context(|| format!("importing {}", path.display()))?;
    Ok(deal)
}
