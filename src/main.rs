use std::path::PathBuf;

use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};
use tracing_subscriber::EnvFilter;

use bdfs::{cli, config, error, pan::OverwritePolicy};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Authorize this device with Baidu Netdisk
    Auth(AuthOptions),

    /// Refresh the stored access token
    Refresh,

    /// List a remote directory
    Ls(LsOptions),

    /// Upload a local file
    Upload(UploadOptions),

    /// Download a remote file
    Download(DownloadOptions),

    /// Remove remote files or directories
    Rm(RmOptions),

    /// Move a remote file or directory into another directory
    Mv(MvOptions),

    /// Rename a remote file or directory in place
    Rename(RenameOptions),

    /// Copy a remote file or directory
    Cp(CpOptions),

    /// Create a remote directory
    Mkdir(MkdirOptions),

    /// Show metadata of a remote file or directory
    Info(InfoOptions),

    /// Show storage usage
    Quota,

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct AuthOptions {
    /// Run the device authorization even if a valid token is stored
    #[clap(long)]
    force: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct LsOptions {
    /// Remote directory
    #[clap(default_value = "/")]
    path: String,

    /// Walk the whole subtree
    #[clap(short, long)]
    recursive: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct UploadOptions {
    /// Local file
    local: PathBuf,

    /// Remote path; a trailing '/' uploads into that directory
    remote: String,

    /// What to do when the remote path exists
    #[clap(long, value_enum, default_value_t = OverwritePolicy::Overwrite)]
    on_conflict: OverwritePolicy,

    /// Attempts per slice on network failures
    #[clap(long, default_value_t = 3)]
    retries: u32,

    /// Send the whole-file MD5 so identical content can be skipped
    #[clap(long)]
    content_md5: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct DownloadOptions {
    /// Remote file
    remote: String,

    /// Local file or directory (default: current directory)
    local: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct RmOptions {
    /// Remote paths to remove
    #[clap(required = true)]
    paths: Vec<String>,

    /// Do not ask for confirmation
    #[clap(short = 'y', long = "force")]
    yes: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct MvOptions {
    /// Remote source path
    source: String,

    /// Remote destination directory
    dest: String,

    /// Do not ask for confirmation
    #[clap(short = 'y', long = "force")]
    yes: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct RenameOptions {
    /// Remote source path
    source: String,

    /// New name, without directory
    newname: String,

    /// Do not ask for confirmation
    #[clap(short = 'y', long = "force")]
    yes: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct CpOptions {
    /// Remote source path
    source: String,

    /// Destination path; a trailing '/' copies into that directory
    dest: String,
}

#[derive(Parser, Debug, Clone)]
pub struct MkdirOptions {
    /// Remote directory to create
    path: String,
}

#[derive(Parser, Debug, Clone)]
pub struct InfoOptions {
    /// Remote path
    path: String,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Auth(opt) => cli::auth(opt.force).await,
        Command::Refresh => cli::refresh().await,
        Command::Ls(opt) => cli::list(opt.path, opt.recursive).await,
        Command::Upload(opt) => {
            cli::upload(
                opt.local,
                opt.remote,
                opt.on_conflict,
                opt.retries,
                opt.content_md5,
            )
            .await
        }
        Command::Download(opt) => cli::download(opt.remote, opt.local).await,
        Command::Rm(opt) => cli::remove(opt.paths, opt.yes).await,
        Command::Mv(opt) => cli::move_to(opt.source, opt.dest, opt.yes).await,
        Command::Rename(opt) => cli::rename(opt.source, opt.newname, opt.yes).await,
        Command::Cp(opt) => cli::copy(opt.source, opt.dest).await,
        Command::Mkdir(opt) => cli::mkdir(opt.path).await,
        Command::Info(opt) => cli::info(opt.path).await,
        Command::Quota => cli::quota().await,
        Command::Completions(opt) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(opt.shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("{}", e);
    }
}
