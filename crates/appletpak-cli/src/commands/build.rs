//! Build command - compile, sign, install and publish a package

use appletpak_core::{Manifest, ManifestCompiler, Package, Signer, SigningCertificate};
use appletpak_repo::{RepositoryConfig, RepositoryManager};
use console::style;
use std::path::{Path, PathBuf};

use super::keygen::CERTIFICATE_FILE;
use crate::error::{CliError, Result};
use crate::util::{default_key_dir, format_size, package_file_name, short_hash};

/// Everything `appletpak build` was asked to do
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub source: PathBuf,
    pub version: Option<String>,
    pub output: Option<PathBuf>,
    pub sign: bool,
    pub certificate: Option<PathBuf>,
    pub embed_certificate: bool,
    pub install: bool,
    pub publish: bool,
    pub server: Option<String>,
    pub optimize: bool,
    /// Repository configuration file, the user's one when `None`
    pub config: Option<PathBuf>,
}

pub async fn run(options: &BuildOptions) -> Result<()> {
    let compiler = ManifestCompiler::default()
        .optimize(options.optimize)
        .version(options.version.as_deref());
    let manifest = compiler
        .compile_manifest(&options.source)
        .map_err(CliError::build)?;

    println!(
        "{} {} v{}",
        style("Building").cyan().bold(),
        manifest.id,
        manifest.version
    );
    println!(
        "  {} {} asset(s)",
        style("Compiled").green().bold(),
        manifest.assets.len()
    );

    let package = if options.sign {
        sign(&manifest, options)?
    } else {
        println!(
            "  {} package is not signed and will be rejected by strict consumers",
            style("Warning").yellow().bold()
        );
        Package::seal(&manifest).map_err(CliError::build)?
    };

    let info = package.info();
    let output_path = match &options.output {
        Some(p) => p.clone(),
        None => package_file_name(&source_dir(&options.source), &info),
    };
    package.save(&output_path).map_err(CliError::build)?;

    let size = std::fs::metadata(&output_path)?.len();
    println!(
        "  {} {}",
        style("Created").green().bold(),
        output_path.display()
    );
    println!("  {} {}", style("Size").dim(), format_size(size));
    println!(
        "  {} sha256:{}",
        style("Hash").dim(),
        short_hash(&info.hash, 16)
    );

    if !options.install && !options.publish {
        return Ok(());
    }

    let manager = open_manager(options.config.as_deref())?;

    if options.install {
        let installed = manager
            .install_cache(&package)
            .await
            .map_err(CliError::repository)?;
        println!(
            "  {} {} v{} into the local cache",
            style("Installed").green().bold(),
            installed.id,
            installed.version
        );
    }

    if options.publish {
        let published = manager
            .publish(options.server.as_deref(), &package)
            .await
            .map_err(CliError::repository)?;
        let targets: Vec<&str> = match options.server.as_deref() {
            Some(server) => vec![server],
            None => manager.locations(),
        };
        for (target, info) in targets.iter().zip(&published) {
            println!(
                "  {} {} v{} to {}",
                style("Published").green().bold(),
                info.id,
                info.version,
                target
            );
        }
    }

    Ok(())
}

fn sign(manifest: &Manifest, options: &BuildOptions) -> Result<Package> {
    let cert_path = options
        .certificate
        .clone()
        .unwrap_or_else(|| default_key_dir().join(CERTIFICATE_FILE));

    let certificate = SigningCertificate::load(&cert_path).map_err(|e| CliError::Signing {
        message: format!("cannot load certificate {}: {}", cert_path.display(), e),
        help: Some("Generate one with `appletpak keygen` or pass --cert".to_string()),
    })?;

    let package = Signer::new(options.embed_certificate)
        .sign(manifest, &certificate)
        .map_err(CliError::signing)?;

    println!(
        "  {} {} ({})",
        style("Signed").green().bold(),
        certificate.subject(),
        short_hash(&certificate.thumbprint(), 16)
    );
    Ok(package)
}

/// The directory a build writes its default output into
fn source_dir(source: &Path) -> PathBuf {
    if source.is_file() {
        source
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    } else {
        source.to_path_buf()
    }
}

fn open_manager(config: Option<&Path>) -> Result<RepositoryManager> {
    match config {
        Some(path) => RepositoryConfig::load_or_init_at(path).map(RepositoryManager::new),
        None => RepositoryManager::from_user_config(),
    }
    .map_err(CliError::repository)
}
