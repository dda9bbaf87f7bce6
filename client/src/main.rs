use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use common::{
    chunk::{plan_parts, DEFAULT_PART_SIZE},
    data::ROOT_PARENT_ID,
    hash::{content_hash, pre_hash, proof_code_v1},
    CheckNameMode, FileDetails, NegotiationError, NegotiatorConfig, NextStep,
    UploadCreateOutcome, UploadIntent, UploadNegotiator,
};
use log::{debug, info};
use std::{fs, path::Path, time::Duration};
use tokio::task::spawn_blocking;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Negotiate a file or folder create with the drive service", long_about = None)]
struct Args {
    /// Local file to describe, or the folder name with --folder.
    pub path: String,

    #[arg(long)]
    pub drive_id: String,

    #[arg(long, default_value = ROOT_PARENT_ID)]
    pub parent_id: String,

    /// Name to create; defaults to the last component of PATH.
    #[arg(long)]
    pub name: Option<String>,

    /// auto_rename, refuse or ignore. auto_rename when omitted.
    #[arg(long)]
    pub check_name_mode: Option<CheckNameMode>,

    #[arg(long)]
    pub folder: bool,

    #[arg(long, default_value_t = DEFAULT_PART_SIZE)]
    pub part_size: u64,

    /// Only send the pre-hash; skip full hashing and the proof code.
    #[arg(long)]
    pub no_proof: bool,

    /// Print the outcome as JSON.
    #[arg(long)]
    pub json: bool,

    #[arg(long, env = "DRIVEUP_BASE_URL", default_value = common::config::OPENAPI_URL)]
    pub base_url: String,

    #[arg(long, env = "DRIVEUP_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,

    /// Request timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    #[arg(short, long)]
    pub verbose: bool,
}

struct FileSummary {
    size: u64,
    created: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
    pre_hash: String,
    proof: Option<(String, String)>,
}

fn summarize_file(fp: &Path, access_token: &str, with_proof: bool) -> Result<FileSummary> {
    let metadata = fs::metadata(fp)?;
    if !metadata.is_file() {
        bail!("{} is not a regular file", fp.display());
    }
    let size = metadata.len();
    let pre_hash = pre_hash(fs::File::open(fp)?)?;
    let proof = if with_proof {
        let hash = content_hash(fs::File::open(fp)?)?;
        let proof_code = proof_code_v1(access_token, fs::File::open(fp)?, size)?;
        Some((hash, proof_code))
    } else {
        None
    };
    Ok(FileSummary {
        size,
        created: metadata.created().ok().map(DateTime::<Utc>::from),
        modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        pre_hash,
        proof,
    })
}

fn entry_name(args: &Args) -> Result<String> {
    if let Some(name) = &args.name {
        return Ok(name.clone());
    }
    Path::new(&args.path)
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("cannot derive a name from {:?}, pass --name", args.path))
}

async fn build_intent(args: &Args) -> Result<UploadIntent> {
    let name = entry_name(args)?;
    let intent = if args.folder {
        UploadIntent::folder(args.drive_id.clone(), name)?
    } else {
        let path = args.path.clone();
        let token = args.access_token.clone();
        let with_proof = !args.no_proof;
        let summary =
            spawn_blocking(move || summarize_file(Path::new(&path), &token, with_proof)).await??;
        debug!("{} is {} bytes, pre-hash {}", args.path, summary.size, summary.pre_hash);

        let parts = plan_parts(summary.size, args.part_size)?;
        let mut details = FileDetails::new(summary.size, parts)
            .with_pre_hash(summary.pre_hash)
            .with_local_times(summary.created, summary.modified);
        if let Some((content_hash, proof_code)) = summary.proof {
            details = details.with_content_proof(content_hash, proof_code);
        }
        UploadIntent::file(args.drive_id.clone(), name, details)?
    };
    let mut intent = intent.with_parent(args.parent_id.clone());
    if let Some(mode) = args.check_name_mode {
        intent = intent.with_check_name_mode(mode);
    }
    Ok(intent)
}

fn report(outcome: &UploadCreateOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }
    println!("Entry ID: {}", outcome.entry_id);
    if outcome.already_exists {
        println!("An entry with this name already existed.");
    }
    match outcome.next_step() {
        NextStep::Done if outcome.rapid_upload_accepted => {
            println!("Rapid upload accepted, nothing to transfer.")
        }
        NextStep::Done if outcome.already_exists => {
            println!("Existing entry kept, nothing to transfer.")
        }
        NextStep::Done => println!("Created, nothing to transfer."),
        NextStep::TransferChunks(targets) => {
            if let Some(id) = &outcome.upload_session_id {
                println!("Upload ID: {id}");
            }
            println!("{} chunk(s) to transfer:", targets.len());
            for t in targets {
                println!("  part {}: {}", t.part_number, t.upload_url);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let mut config =
        NegotiatorConfig::new(args.access_token.clone()).with_base_url(args.base_url.clone());
    if let Some(secs) = args.timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    let negotiator = UploadNegotiator::from_config(&config)?;

    let intent = build_intent(&args).await?;
    info!(
        "creating {} {:?} under {}",
        if intent.is_folder() { "folder" } else { "file" },
        intent.name(),
        intent.parent_id()
    );
    match negotiator.create_upload(&intent).await {
        Ok(outcome) => report(&outcome, args.json),
        Err(NegotiationError::Service { code, message }) => {
            bail!("service rejected the create ({code}): {message}")
        }
        Err(e) => Err(e.into()),
    }
}
