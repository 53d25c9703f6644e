#![forbid(unsafe_code)]

//! Command-line front end for the merge backend.
//!
//! `info` lists the formats the backend offers for a URL, `merge` downloads
//! one video-only and one audio-only format merged into a single file,
//! `download` saves one format untouched, and `config` persists backend
//! settings into the `.env` file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use newtube_merge::config::{
    BACKEND_KEY, ClientSettings, DEFAULT_ENV_PATH, MergeSource, OUTPUT_DIR_KEY, SOURCE_KEY,
    SettingsOverrides, TIMEOUT_KEY, parse_backend_url, resolve_client_settings, upsert_env_value,
};
use newtube_merge::details::DownloadOrigin;
use newtube_merge::display::{
    describe_audio_format, describe_selection, describe_video_format, format_count,
    format_duration, format_file_size,
};
use newtube_merge::download::FileSink;
use newtube_merge::session::Session;
use newtube_merge::{BackendClient, TrackKind, VideoMetadata};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "merge_video", version, about = "Fetch and merge YouTube formats through a merge backend")]
struct Cli {
    /// Env file holding NEWTUBE_MERGE_* settings.
    #[arg(long, global = true, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Backend base URL, e.g. http://localhost:5000.
    #[arg(long, global = true, value_name = "URL")]
    backend: Option<String>,

    /// Request timeout in seconds.
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show title, stats and the available formats for a URL.
    Info {
        url: String,
    },
    /// Merge one video format with one audio format and save the result.
    Merge(MergeArgs),
    /// Save a single video-only or audio-only format as-is.
    Download(DownloadArgs),
    /// Persist settings to the env file.
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct MergeArgs {
    url: String,

    /// Format id of the video-only stream.
    #[arg(long, value_name = "FORMAT_ID")]
    video: String,

    /// Format id of the audio-only stream.
    #[arg(long, value_name = "FORMAT_ID")]
    audio: String,

    /// Directory the merged file is saved into.
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// How formats are referenced in the merge request: watch or direct.
    #[arg(long, value_name = "MODE")]
    source: Option<MergeSource>,
}

#[derive(Debug, Args)]
struct DownloadArgs {
    url: String,

    /// Format id from either list shown by `info`.
    #[arg(long, value_name = "FORMAT_ID")]
    format: String,

    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
}

// `--backend` and `--timeout` come from the global options and are written
// to the env file instead of applied to a single run.
#[derive(Debug, Args)]
struct ConfigArgs {
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    #[arg(long, value_name = "MODE")]
    source: Option<MergeSource>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let env_path = cli
        .env_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_PATH));

    match cli.command {
        Command::Info { url } => {
            let settings = settings_for(&env_path, cli.backend, cli.timeout, None, None)?;
            run_info(&settings, &url)
        }
        Command::Merge(args) => {
            let settings = settings_for(
                &env_path,
                cli.backend,
                cli.timeout,
                args.output_dir.clone(),
                args.source,
            )?;
            run_merge(&settings, &args)
        }
        Command::Download(args) => {
            let settings = settings_for(
                &env_path,
                cli.backend,
                cli.timeout,
                args.output_dir.clone(),
                None,
            )?;
            run_download(&settings, &args)
        }
        Command::Config(args) => run_config(&env_path, cli.backend, cli.timeout, args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("newtube_merge=info,merge_video=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn settings_for(
    env_path: &Path,
    backend: Option<String>,
    timeout_secs: Option<u64>,
    output_dir: Option<PathBuf>,
    merge_source: Option<MergeSource>,
) -> Result<ClientSettings> {
    resolve_client_settings(SettingsOverrides {
        backend_url: backend,
        output_dir,
        timeout_secs,
        merge_source,
        env_path: Some(env_path.to_path_buf()),
    })
}

fn client_for(settings: &ClientSettings) -> BackendClient {
    BackendClient::new(settings.backend_url.clone(), settings.timeout)
}

fn run_info(settings: &ClientSettings, url: &str) -> Result<()> {
    let client = client_for(settings);
    let mut session = Session::new(settings.merge_source);
    session.input_mut().set_url(url);
    let details = session
        .submit(&client)
        .map_err(|err| anyhow::anyhow!(err.user_message()))?;
    print_metadata(details.video());
    Ok(())
}

fn run_merge(settings: &ClientSettings, args: &MergeArgs) -> Result<()> {
    let client = client_for(settings);
    let mut session = Session::new(settings.merge_source);
    session.input_mut().set_url(args.url.as_str());
    let details = session
        .submit(&client)
        .map_err(|err| anyhow::anyhow!(err.user_message()))?;

    details
        .select_video(&args.video)
        .with_context(|| format!("run `merge_video info {}` to list formats", args.url))?;
    details
        .select_audio(&args.audio)
        .with_context(|| format!("run `merge_video info {}` to list formats", args.url))?;

    println!("===================================");
    println!("{}", details.video().display_title());
    println!("===================================");
    for line in describe_selection(details.selection()) {
        println!("{line}");
    }
    println!();
    println!("Merging via {} ...", client.base_url());

    let mut sink = FileSink::new(&settings.output_dir);
    let saved = details
        .merge(&client, &mut sink)
        .map_err(|err| anyhow::anyhow!(err.user_message()))?;

    println!();
    println!("Merge successful!");
    println!("Saved: {}", saved.path.display());
    println!("Size: {}", format_file_size(Some(saved.bytes)));
    if let DownloadOrigin::Link {
        url,
        reported_size_mb,
    } = &saved.origin
    {
        println!("Source: {url}");
        if let Some(size) = reported_size_mb {
            println!("Reported size: {size:.2} MB");
        }
    }
    Ok(())
}

fn run_download(settings: &ClientSettings, args: &DownloadArgs) -> Result<()> {
    let client = client_for(settings);
    let mut session = Session::new(settings.merge_source);
    session.input_mut().set_url(args.url.as_str());
    let details = session
        .submit(&client)
        .map_err(|err| anyhow::anyhow!(err.user_message()))?;

    let kind = track_for_format(details.video(), &args.format).with_context(|| {
        format!(
            "no format with id {:?}; run `merge_video info {}` to list formats",
            args.format, args.url
        )
    })?;
    if let Some(format) = details.video().find_format(kind, &args.format) {
        let description = match kind {
            TrackKind::Video => describe_video_format(format),
            TrackKind::Audio => describe_audio_format(format),
        };
        println!("Downloading {} format {}: {description}", kind.label(), format.format_id);
    }

    let mut sink = FileSink::new(&settings.output_dir);
    let saved = details
        .download_format(kind, &args.format, &client, &mut sink)
        .map_err(|err| anyhow::anyhow!(err.user_message()))?;
    println!("Saved: {}", saved.path.display());
    println!("Size: {}", format_file_size(Some(saved.bytes)));
    Ok(())
}

/// Which list a format id belongs to; video-only formats are checked first.
fn track_for_format(video: &VideoMetadata, format_id: &str) -> Option<TrackKind> {
    [TrackKind::Video, TrackKind::Audio]
        .into_iter()
        .find(|kind| video.find_format(*kind, format_id).is_some())
}

fn run_config(
    env_path: &Path,
    backend: Option<String>,
    timeout: Option<u64>,
    args: ConfigArgs,
) -> Result<()> {
    let mut updates: Vec<(&str, String)> = Vec::new();
    if let Some(raw) = backend {
        let url = parse_backend_url(&raw)?;
        updates.push((BACKEND_KEY, url.as_str().trim_end_matches('/').to_string()));
    }
    if let Some(dir) = args.output_dir {
        updates.push((OUTPUT_DIR_KEY, dir.to_string_lossy().into_owned()));
    }
    if let Some(secs) = timeout {
        if secs == 0 {
            bail!("timeout must be at least one second");
        }
        updates.push((TIMEOUT_KEY, secs.to_string()));
    }
    if let Some(source) = args.source {
        updates.push((SOURCE_KEY, source.to_string()));
    }

    for (key, value) in &updates {
        upsert_env_value(env_path, key, value)?;
        println!("{key}={value}");
    }
    if updates.is_empty() {
        let settings = settings_for(env_path, None, None, None, None)?;
        println!("{BACKEND_KEY}={}", settings.backend_url);
        println!("{OUTPUT_DIR_KEY}={}", settings.output_dir.display());
        println!("{TIMEOUT_KEY}={}", settings.timeout.as_secs());
        println!("{SOURCE_KEY}={}", settings.merge_source);
    } else {
        println!("Saved to {}", env_path.display());
    }
    Ok(())
}

fn print_metadata(video: &VideoMetadata) {
    println!("===================================");
    println!("{}", video.display_title());
    println!("===================================");
    if let Some(id) = video.video_id() {
        println!("Video ID: {id}");
    }
    println!("Duration: {}", format_duration(video.duration));
    if let Some(views) = video.view_count {
        println!("Views: {}", format_count(views));
    }
    if video.filesize_approx.is_some() {
        println!(
            "Approximate Size: {}",
            format_file_size(video.filesize_approx)
        );
    }
    if let Some(thumbnail) = video.thumbnail.as_deref() {
        println!("Thumbnail: {thumbnail}");
    }

    for kind in [TrackKind::Video, TrackKind::Audio] {
        let formats = video.formats(kind);
        println!();
        match kind {
            TrackKind::Video => println!("Video Formats ({}):", formats.len()),
            TrackKind::Audio => println!("Audio Formats ({}):", formats.len()),
        }
        if formats.is_empty() {
            println!("  (none)");
        }
        for format in formats {
            let description = match kind {
                TrackKind::Video => describe_video_format(format),
                TrackKind::Audio => describe_audio_format(format),
            };
            println!("  [{:>6}] {description}", format.format_id);
            if !format.url.trim().is_empty() {
                println!("           {}", format.url.trim());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_merge_command() {
        let cli = Cli::try_parse_from([
            "merge_video",
            "--backend",
            "http://localhost:9000",
            "merge",
            "https://youtu.be/dQw4w9WgXcQ",
            "--video",
            "137",
            "--audio",
            "140",
            "--source",
            "direct",
        ])
        .unwrap();
        assert_eq!(cli.backend.as_deref(), Some("http://localhost:9000"));
        let Command::Merge(args) = cli.command else {
            panic!("expected merge command");
        };
        assert_eq!(args.video, "137");
        assert_eq!(args.audio, "140");
        assert_eq!(args.source, Some(MergeSource::DirectUrl));
    }

    #[test]
    fn parses_download_command() {
        let cli = Cli::try_parse_from([
            "merge_video",
            "download",
            "https://youtu.be/dQw4w9WgXcQ",
            "--format",
            "140",
            "--output-dir",
            "/tmp/out",
        ])
        .unwrap();
        let Command::Download(args) = cli.command else {
            panic!("expected download command");
        };
        assert_eq!(args.format, "140");
        assert_eq!(args.output_dir, Some(PathBuf::from("/tmp/out")));
        assert!(Cli::try_parse_from(["merge_video", "download", "https://youtu.be/x"]).is_err());
    }

    #[test]
    fn format_ids_resolve_to_their_track() {
        let video = VideoMetadata {
            video_only_formats: vec![newtube_merge::FormatVariant {
                format_id: "137".into(),
                ..Default::default()
            }],
            audio_only_formats: vec![newtube_merge::FormatVariant {
                format_id: "140".into(),
                ..Default::default()
            }],
            ..VideoMetadata::default()
        };
        assert_eq!(track_for_format(&video, "137"), Some(TrackKind::Video));
        assert_eq!(track_for_format(&video, " 140"), Some(TrackKind::Audio));
        assert_eq!(track_for_format(&video, "999"), None);
    }

    #[test]
    fn merge_requires_both_formats() {
        assert!(
            Cli::try_parse_from(["merge_video", "merge", "https://youtu.be/x", "--video", "137"])
                .is_err()
        );
    }

    #[test]
    fn config_accepts_global_backend() {
        let cli = Cli::try_parse_from([
            "merge_video",
            "config",
            "--backend",
            "http://media-box:5000",
            "--source",
            "watch",
        ])
        .unwrap();
        assert_eq!(cli.backend.as_deref(), Some("http://media-box:5000"));
        let Command::Config(args) = cli.command else {
            panic!("expected config command");
        };
        assert_eq!(args.source, Some(MergeSource::WatchPage));
    }

    #[test]
    fn config_writes_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let env_path = dir.path().join(".env");
        run_config(
            &env_path,
            Some("http://media-box:5000/".into()),
            Some(120),
            ConfigArgs {
                output_dir: Some(PathBuf::from("/srv/merged")),
                source: Some(MergeSource::DirectUrl),
            },
        )
        .unwrap();

        let settings = settings_for(&env_path, None, None, None, None).unwrap();
        assert_eq!(settings.backend_url.as_str(), "http://media-box:5000/");
        assert_eq!(settings.output_dir, PathBuf::from("/srv/merged"));
        assert_eq!(settings.timeout.as_secs(), 120);
        assert_eq!(settings.merge_source, MergeSource::DirectUrl);
    }

    #[test]
    fn config_rejects_bad_backend() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_config(
            &dir.path().join(".env"),
            Some("gopher://old".into()),
            None,
            ConfigArgs {
                output_dir: None,
                source: None,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }
}
