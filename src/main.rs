use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use trackfile::crypto::{derive_key, Aes256GcmCipher, Blake3Mac};
use trackfile::essence::adapter_by_name;
use trackfile::metadata::SetBody;
use trackfile::storage::{FsStorage, OverwritePolicy};
use trackfile::{
    EncryptionContext, EssenceAdapter, FrameOptions, FrameStatus, Rational, ReadContext, TrackFileReader,
    TrackFileWriter, WriterConfig, WriterInfo,
};

#[derive(Parser)]
#[command(name = "trackfile", about = "Wrap, unwrap and inspect MXF track files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wrap frame files, one frame per file, into a track file
    Wrap {
        #[arg(short, long)]
        output: PathBuf,
        /// Essence kind: prores, mga-sadm
        #[arg(short, long, default_value = "prores")]
        essence: String,
        /// Edit rate as "24" or "24000/1001"
        #[arg(short = 'r', long, default_value = "24")]
        edit_rate: Rational,
        /// Writer configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Key alignment grid, overrides the config file
        #[arg(long)]
        kag: Option<u32>,
        /// Frames per body partition, overrides the config file
        #[arg(long)]
        partition_frames: Option<u32>,
        /// Encrypt with AES-256-GCM (Argon2id key derivation)
        #[arg(short, long)]
        password: Option<String>,
        /// Add a MIC to every encrypted frame
        #[arg(long, requires = "password")]
        hmac: bool,
        /// Replace an existing output file
        #[arg(short, long)]
        force: bool,
        /// Per-frame metadata files, paired with the inputs in order
        #[arg(long, num_args = 1..)]
        meta: Vec<PathBuf>,
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
    },
    /// Write every frame of a track file to its own file
    Unwrap {
        input: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Dump writer info, partitions, header metadata and index
    Info {
        input: PathBuf,
    },
    /// Read every frame and check its integrity
    Verify {
        input: PathBuf,
        #[arg(short, long)]
        password: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {

        // ── Wrap ─────────────────────────────────────────────────────────────
        Commands::Wrap {
            output, essence, edit_rate, config, kag, partition_frames, password, hmac, force, meta, input,
        } => {
            let adapter = adapter_named(&essence)?;
            let mut cfg = match config {
                Some(path) => WriterConfig::from_json_file(path)?,
                None => WriterConfig::default(),
            };
            if let Some(k) = kag {
                cfg.kag_size = k;
            }
            if partition_frames.is_some() {
                cfg.partition_frames = partition_frames;
            }
            if !meta.is_empty() && meta.len() != input.len() {
                return Err(format!("{} metadata files for {} frames", meta.len(), input.len()).into());
            }

            let mut info = WriterInfo::default();
            let crypto = match &password {
                Some(pwd) => {
                    let key_id = Uuid::new_v4();
                    info = info.encrypted(key_id, hmac);
                    Some(encryption_for(pwd, &key_id, hmac)?)
                }
                None => None,
            };

            let overwrite = if force { OverwritePolicy::Truncate } else { OverwritePolicy::Refuse };
            let storage = FsStorage::cwd().with_overwrite(overwrite);
            let mut w = TrackFileWriter::new();
            w.open_write(&storage, &path_name(&output), info, adapter, edit_rate, cfg, crypto)?;
            for (i, path) in input.iter().enumerate() {
                let frame = std::fs::read(path)?;
                match meta.get(i) {
                    Some(m) => {
                        let m = std::fs::read(m)?;
                        w.write_frame_with(&frame, FrameOptions::with_metadata(&m))?;
                    }
                    None => w.write_frame(&frame)?,
                }
            }
            w.finalize()?;
            println!("Wrapped {} frame(s) into {}", input.len(), output.display());
        }

        // ── Unwrap ───────────────────────────────────────────────────────────
        Commands::Unwrap { input, output_dir, password } => {
            let mut r = open_reader(&input)?;
            let crypto = reader_crypto(&r, password.as_deref())?;
            let ctx = crypto.as_ref().map(ReadContext::from_crypto).unwrap_or_default();
            let has_meta = r.adapter().metadata_element().is_some();
            std::fs::create_dir_all(&output_dir)?;
            let count = r.frame_count()?;
            for n in 0..count {
                let frame = r.read_frame(n, ctx)?;
                if frame.status == FrameStatus::EncryptedNoKey {
                    eprintln!("frame {n}: encrypted, writing ciphertext");
                }
                std::fs::write(output_dir.join(format!("frame_{n:06}.bin")), &frame.data)?;
                if has_meta {
                    match r.read_meta_frame(n) {
                        Ok(m) => std::fs::write(output_dir.join(format!("meta_{n:06}.bin")), m)?,
                        Err(e) if e.is_format() => eprintln!("frame {n}: no metadata ({e})"),
                        Err(e) => return Err(e.into()),
                    }
                }
            }
            println!("Unwrapped {count} frame(s) to {}", output_dir.display());
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let r = open_reader(&input)?;
            let info = r.writer_info()?;
            println!("── Track file ───────────────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  Edit rate      {}", r.edit_rate()?);
            println!("  Frames         {}", r.frame_count()?);
            println!("  Writer info    {}", serde_json::to_string_pretty(info)?);
            println!("  Partitions ({}):", r.partitions()?.len());
            for p in r.partitions()? {
                println!(
                    "    {:<7} at {:>12}  {:?}  body offset {:>12}  index {} B  KAG {}",
                    format!("{:?}", p.kind), p.this_partition, p.status, p.body_offset,
                    p.index_byte_count, p.kag_size
                );
            }
            let md = r.header_metadata()?;
            println!("  Header metadata ({} sets):", md.len());
            for set in md.iter() {
                println!("    {:<24} {}  {}", set.kind_name(), set.instance(), set.set_label());
            }
            let index = r.index()?;
            println!("  Index segments ({}):", index.segments().len());
            for s in index.segments() {
                let kind = if s.is_cbr() {
                    format!("CBR {} B/unit", s.edit_unit_byte_count)
                } else {
                    format!("{} entries", s.entries.len())
                };
                println!("    start {:>8}  duration {:>8}  {kind}", s.start, s.duration);
            }
        }

        // ── Verify ───────────────────────────────────────────────────────────
        Commands::Verify { input, password } => {
            let mut r = open_reader(&input)?;
            let crypto = reader_crypto(&r, password.as_deref())?;
            let ctx = crypto.as_ref().map(ReadContext::from_crypto).unwrap_or_default();
            let count = r.frame_count()?;
            let mut hasher = blake3::Hasher::new();
            for n in 0..count {
                let frame = r.read_frame(n, ctx)?;
                hasher.update(&frame.data);
            }
            println!("OK  {count} frame(s)  blake3 {}", hex::encode(&hasher.finalize().as_bytes()[..8]));
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn adapter_named(name: &str) -> Result<Arc<dyn EssenceAdapter>, Box<dyn std::error::Error>> {
    adapter_by_name(name)
        .map(Arc::from)
        .ok_or_else(|| format!("unknown essence kind '{name}'").into())
}

fn path_name(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Try each built-in adapter until one accepts the file's descriptor.
fn open_reader(path: &Path) -> Result<TrackFileReader, Box<dyn std::error::Error>> {
    let storage = Arc::new(FsStorage::cwd());
    let mut last = None;
    for name in ["prores", "mga-sadm"] {
        let mut r = TrackFileReader::new(storage.clone(), adapter_named(name)?);
        match r.open_read(&path_name(path)) {
            Ok(()) => return Ok(r),
            Err(e) if e.is_format() => last = Some(e),
            Err(e) => return Err(e.into()),
        }
    }
    Err(last.map_or_else(|| "no essence adapter matched".into(), Into::into))
}

fn encryption_for(password: &str, key_id: &Uuid, hmac: bool) -> Result<EncryptionContext, Box<dyn std::error::Error>> {
    let key = derive_key(password, key_id.as_bytes())?;
    let ctx = EncryptionContext::new(Arc::new(Aes256GcmCipher::new(&key)));
    Ok(if hmac { ctx.with_mac(Arc::new(Blake3Mac::derived_from(&key))) } else { ctx })
}

fn reader_crypto(
    r: &TrackFileReader,
    password: Option<&str>,
) -> Result<Option<EncryptionContext>, Box<dyn std::error::Error>> {
    let info = r.writer_info()?;
    match password {
        Some(pwd) if info.encrypted_essence => {
            Ok(Some(encryption_for(pwd, &info.cryptographic_key_id, info.uses_hmac)?))
        }
        Some(_) => {
            eprintln!("file is not encrypted; ignoring password");
            Ok(None)
        }
        None => Ok(None),
    }
}
