use clap::Parser;
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::info;

static NUM_CPUS: LazyLock<usize> = LazyLock::new(|| {
    let n = num_cpus::get();
    let num = if n > 16 { 16 } else { n };
    info!(num, "Detecting CPU cores");
    num
});

/// Run options, parsed from the command line
///
/// Example invocation
///   mkv-episode-tagger -d ./Friends/Season1 -c ./season1.json -j 4
#[derive(Debug, Clone, Parser)]
#[command(
    version,
    about = "Fix titles, track names, languages and default flags of MKV episodes",
    override_usage = "mkv-episode-tagger -d [directory] -c [config file]"
)]
pub struct Config {
    /// Directory to look for files
    #[arg(short, long)]
    pub directory: PathBuf,

    /// Configuration file (JSON)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Maximum number of mkvmerge/mkvpropedit processes running at once
    #[arg(short, long, default_value_t = default_jobs())]
    pub jobs: usize,

    /// mkvmerge executable used to read metadata
    #[arg(long, default_value_t = default_mkvmerge())]
    pub mkvmerge: String,

    /// mkvpropedit executable used to write metadata
    #[arg(long, default_value_t = default_mkvpropedit())]
    pub mkvpropedit: String,
}

impl Config {
    /// Validate the options clap cannot check on its own
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.jobs == 0 {
            return Err(anyhow::anyhow!("--jobs must be at least 1"));
        }
        if self.mkvmerge.is_empty() {
            return Err(anyhow::anyhow!("--mkvmerge cannot be empty"));
        }
        if self.mkvpropedit.is_empty() {
            return Err(anyhow::anyhow!("--mkvpropedit cannot be empty"));
        }
        Ok(())
    }
}

// Default value functions
fn default_jobs() -> usize {
    *NUM_CPUS
}

fn default_mkvmerge() -> String {
    "mkvmerge".to_string()
}

fn default_mkvpropedit() -> String {
    "mkvpropedit".to_string()
}
