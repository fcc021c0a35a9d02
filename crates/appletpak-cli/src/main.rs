//! appletpak - build, sign and publish applet packages

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod exit_codes;
mod util;

use commands::build::BuildOptions;

#[derive(Parser)]
#[command(name = "appletpak")]
#[command(version)]
#[command(about = "Build, sign and publish applet packages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Repository configuration file (default: <config dir>/appletpak/repositories.yaml)
    #[arg(long, global = true, env = "APPLETPAK_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a source tree into a package
    Build {
        /// Source directory or manifest file
        #[arg(default_value = ".")]
        source: PathBuf,

        /// Override the manifest version
        #[arg(long = "version", value_name = "VERSION")]
        version: Option<String>,

        /// Output file (default: <source>/<id>-<version>.pak)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Sign the package
        #[arg(long)]
        sign: bool,

        /// Signing certificate and private key, PEM (default: ~/.appletpak/signing.pem)
        #[arg(long, requires = "sign")]
        cert: Option<PathBuf>,

        /// Embed the public certificate in the package
        #[arg(long, requires = "sign")]
        embed_cert: bool,

        /// Install the package into the local cache
        #[arg(long)]
        install: bool,

        /// Publish the package to the configured repositories
        #[arg(long)]
        publish: bool,

        /// Publish to this repository only
        #[arg(long, requires = "publish")]
        server: Option<String>,

        /// Keep sources as written instead of minifying them
        #[arg(long)]
        no_optimize: bool,
    },

    /// Generate a signing certificate
    Keygen {
        /// Output directory (default: ~/.appletpak)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Certificate subject
        #[arg(long, default_value = "CN=appletpak")]
        subject: String,

        /// RSA key size in bits
        #[arg(long, default_value_t = appletpak_core::signing::DEFAULT_KEY_BITS)]
        bits: usize,

        /// Overwrite existing certificates
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    let result = match cli.command {
        Commands::Build {
            source,
            version,
            output,
            sign,
            cert,
            embed_cert,
            install,
            publish,
            server,
            no_optimize,
        } => {
            let options = BuildOptions {
                source,
                version,
                output,
                sign,
                certificate: cert,
                embed_certificate: embed_cert,
                install,
                publish,
                server,
                optimize: !no_optimize,
                config: cli.config,
            };
            commands::build::run(&options).await
        }

        Commands::Keygen {
            output,
            subject,
            bits,
            force,
        } => commands::keygen::run(output.as_deref(), &subject, bits, force),
    };

    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
    std::process::exit(exit_codes::SUCCESS);
}
