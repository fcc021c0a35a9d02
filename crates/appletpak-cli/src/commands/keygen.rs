//! Keygen command - generate a signing certificate

use appletpak_core::SigningCertificate;
use console::style;
use std::path::Path;

use crate::error::{CliError, Result};
use crate::util::default_key_dir;

/// Certificate with its private key, used by `build --sign`
pub const CERTIFICATE_FILE: &str = "signing.pem";

/// Public certificate, safe to hand to package consumers
pub const PUBLIC_CERTIFICATE_FILE: &str = "signing.crt";

pub fn run(output_dir: Option<&Path>, subject: &str, bits: usize, force: bool) -> Result<()> {
    let key_dir = output_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(default_key_dir);

    let private_path = key_dir.join(CERTIFICATE_FILE);
    let public_path = key_dir.join(PUBLIC_CERTIFICATE_FILE);

    if !force && (private_path.exists() || public_path.exists()) {
        return Err(CliError::input(format!(
            "Certificates already exist at {}. Use --force to overwrite.",
            key_dir.display()
        )));
    }

    std::fs::create_dir_all(&key_dir)?;

    println!("{}", style("Generating signing certificate...").cyan().bold());
    println!();

    let certificate = SigningCertificate::generate_with_bits(subject, bits)
        .map_err(CliError::signing)?;
    certificate
        .save(&private_path)
        .map_err(|e| CliError::internal(e.to_string()))?;
    certificate
        .public_only()
        .save(&public_path)
        .map_err(|e| CliError::internal(e.to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&private_path)?.permissions();
        perms.set_mode(0o600);
        std::fs::set_permissions(&private_path, perms)?;
    }

    println!("  {} {}", style("Certificate").green().bold(), private_path.display());
    println!("  {} {}", style("Public").green().bold(), public_path.display());
    println!("  {} {}", style("Thumbprint").dim(), certificate.thumbprint());
    println!();
    println!("{}:", style("To sign a package").bold());
    println!("  appletpak build --sign --cert {}", private_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_keygen_writes_both_halves() {
        let temp = TempDir::new().unwrap();
        run(Some(temp.path()), "CN=tester", 1024, false).unwrap();

        let private = SigningCertificate::load(&temp.path().join(CERTIFICATE_FILE)).unwrap();
        let public = SigningCertificate::load(&temp.path().join(PUBLIC_CERTIFICATE_FILE)).unwrap();
        assert!(private.has_private_key());
        assert!(!public.has_private_key());
        assert_eq!(private.thumbprint(), public.thumbprint());
        assert_eq!(private.subject(), "CN=tester");
    }

    #[test]
    fn test_keygen_refuses_overwrite() {
        let temp = TempDir::new().unwrap();
        run(Some(temp.path()), "CN=first", 1024, false).unwrap();
        let first = SigningCertificate::load(&temp.path().join(CERTIFICATE_FILE)).unwrap();

        let err = run(Some(temp.path()), "CN=second", 1024, false).unwrap_err();
        assert!(matches!(err, CliError::Input { .. }));

        run(Some(temp.path()), "CN=second", 1024, true).unwrap();
        let second = SigningCertificate::load(&temp.path().join(CERTIFICATE_FILE)).unwrap();
        assert_ne!(first.thumbprint(), second.thumbprint());
    }
}
