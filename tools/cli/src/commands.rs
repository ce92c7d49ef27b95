//! One-shot subcommands.
//!
//! Passwords are read by the caller; every command here takes them already
//! entered so the flows can be driven from tests.

use anyhow::{Context, Result};
use rand::rngs::OsRng;
use std::io::Write;
use std::path::Path;
use tokio::io::AsyncBufRead;
use tracing::info;

use crate::output;
use crate::shell::Shell;
use strongroom_common::VaultPath;
use strongroom_crypto::KdfParams;
use strongroom_vault::{lifecycle, NewPassword, VaultSession};

/// Argon2id preset for a `--strength` value.
pub fn kdf_for(strength: &str) -> Result<KdfParams> {
    KdfParams::from_preset(strength).with_context(|| {
        format!(
            "Invalid strength '{}'. Use: interactive, moderate, or sensitive",
            strength
        )
    })
}

async fn open(path: &Path, password: &str) -> Result<VaultSession> {
    lifecycle::open_vault(path, password, Box::new(OsRng))
        .await
        .context("Failed to open vault")
}

/// Create a new vault.
pub async fn create(
    path: &Path,
    password: &str,
    confirmation: &str,
    kdf: &KdfParams,
    out: &mut impl Write,
) -> Result<()> {
    let password = NewPassword::confirm(password, confirmation)?;

    info!("Creating new vault at {}", path.display());
    let config = lifecycle::create_vault(path, &password, kdf, &mut OsRng)
        .await
        .context("Failed to create vault")?;

    writeln!(out, "Vault created successfully!")?;
    writeln!(out, "  Location: {}", path.display())?;
    writeln!(out, "  Format: {}", config.format)?;
    writeln!(out, "  Cipher: {}", config.cipher_combo)?;
    Ok(())
}

/// List a directory inside the vault.
pub async fn list(path: &Path, password: &str, inner: &str, out: &mut impl Write) -> Result<()> {
    let session = open(path, password).await?;
    let dir = VaultPath::parse(inner);

    let entries = session.list(&dir).context("Failed to list directory")?;
    output::print_table(out, &dir.to_string(), &entries)?;
    Ok(())
}

/// Unlock the vault and run the interactive shell over `input`.
pub async fn unlock<R, W>(path: &Path, password: &str, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let session = open(path, password).await?;
    Shell::new(session).run(input, out).await?;
    Ok(())
}

/// Copy a local file into a vault directory.
pub async fn upload(
    path: &Path,
    password: &str,
    local: &Path,
    dest: &str,
    out: &mut impl Write,
) -> Result<()> {
    let mut session = open(path, password).await?;

    let target = session
        .upload_local(local, &VaultPath::parse(dest))
        .await
        .context("Failed to upload file")?;

    writeln!(out, "Uploaded: {} -> {}", local.display(), target)?;
    Ok(())
}

/// Copy a vault file out to the local filesystem.
pub async fn download(
    path: &Path,
    password: &str,
    vault_file: &str,
    output_path: &Path,
    out: &mut impl Write,
) -> Result<()> {
    let session = open(path, password).await?;
    let source = VaultPath::parse(vault_file);

    let size = session
        .download(&source, output_path)
        .await
        .context("Failed to download file")?;

    writeln!(
        out,
        "Downloaded: {} -> {} ({})",
        source,
        output_path.display(),
        output::format_size(size)
    )?;
    Ok(())
}

/// Create a directory chain in the vault.
pub async fn mkdir(path: &Path, password: &str, dir: &str, out: &mut impl Write) -> Result<()> {
    let mut session = open(path, password).await?;
    let dir = VaultPath::parse(dir);

    session
        .mkdir(&dir)
        .await
        .context("Failed to create directory")?;

    writeln!(out, "Created directory: {}", dir)?;
    Ok(())
}

/// Delete a file or directory from the vault.
pub async fn delete(
    path: &Path,
    password: &str,
    target: &str,
    recursive: bool,
    out: &mut impl Write,
) -> Result<()> {
    let mut session = open(path, password).await?;
    let target = VaultPath::parse(target);

    session
        .delete(&target, recursive)
        .await
        .context("Failed to delete")?;

    writeln!(out, "Deleted: {}", target)?;
    Ok(())
}

/// Show vault metadata without unlocking.
pub async fn info(path: &Path, out: &mut impl Write) -> Result<()> {
    let meta = lifecycle::inspect_vault(path)
        .await
        .context("Failed to inspect vault")?;
    output::print_metadata(out, &meta)?;
    Ok(())
}

/// Re-wrap the vault key under a new password.
pub async fn change_password(
    path: &Path,
    old: &str,
    new: &str,
    confirmation: &str,
    out: &mut impl Write,
) -> Result<()> {
    let new = NewPassword::confirm(new, confirmation)?;

    lifecycle::change_password(path, old, &new, &mut OsRng)
        .await
        .context("Failed to change password")?;

    writeln!(out, "Password changed successfully!")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strongroom_common::Error;
    use tempfile::TempDir;

    const PASSWORD: &str = "longpassword1";

    fn fast_kdf() -> KdfParams {
        KdfParams {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    async fn created(temp: &TempDir) -> std::path::PathBuf {
        let dir = temp.path().join("v1");
        create(&dir, PASSWORD, PASSWORD, &fast_kdf(), &mut Vec::new())
            .await
            .unwrap();
        dir
    }

    fn root_cause(err: &anyhow::Error) -> Option<&Error> {
        err.chain().find_map(|e| e.downcast_ref::<Error>())
    }

    #[test]
    fn test_kdf_presets() {
        assert_eq!(kdf_for("moderate").unwrap(), KdfParams::moderate());
        assert!(kdf_for("extreme").is_err());
    }

    #[tokio::test]
    async fn test_password_gate_runs_before_create() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("v");

        let err = create(&dir, "longpassword1", "longpassword2", &fast_kdf(), &mut Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(root_cause(&err), Some(Error::PasswordMismatch)));

        let err = create(&dir, "short", "short", &fast_kdf(), &mut Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(root_cause(&err), Some(Error::WeakPassword { .. })));

        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_password_gate_runs_before_change() {
        let temp = TempDir::new().unwrap();
        let dir = created(&temp).await;
        let keyfile = strongroom_vault::KeyFile::path(&dir);
        let before = std::fs::read(&keyfile).unwrap();

        let err = change_password(&dir, PASSWORD, "newpassword1", "newpassword2", &mut Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(root_cause(&err), Some(Error::PasswordMismatch)));
        let err = change_password(&dir, PASSWORD, "tiny", "tiny", &mut Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(root_cause(&err), Some(Error::WeakPassword { .. })));

        assert_eq!(std::fs::read(&keyfile).unwrap(), before);
    }

    #[tokio::test]
    async fn test_create_then_open() {
        let temp = TempDir::new().unwrap();
        let dir = created(&temp).await;

        let mut out = Vec::new();
        list(&dir, PASSWORD, "/", &mut out).await.unwrap();
        assert!(String::from_utf8(out).unwrap().contains("NAME"));

        let err = list(&dir, "wrong", "/", &mut Vec::new()).await.unwrap_err();
        assert!(matches!(root_cause(&err), Some(Error::WrongPassword)));
    }

    #[tokio::test]
    async fn test_non_empty_directory_rejected() {
        let temp = TempDir::new().unwrap();
        let existing = temp.path().join("keep.txt");
        std::fs::write(&existing, "keep").unwrap();

        let err = create(temp.path(), PASSWORD, PASSWORD, &fast_kdf(), &mut Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(root_cause(&err), Some(Error::DirectoryNotEmpty(_))));
        assert_eq!(std::fs::read_to_string(&existing).unwrap(), "keep");
    }

    #[tokio::test]
    async fn test_upload_download_delete() {
        let temp = TempDir::new().unwrap();
        let dir = created(&temp).await;
        let local = temp.path().join("photo.jpg");
        let restored = temp.path().join("restored.jpg");
        std::fs::write(&local, [1u8, 2, 3]).unwrap();

        upload(&dir, PASSWORD, &local, "/pics/2024", &mut Vec::new())
            .await
            .unwrap();
        download(
            &dir,
            PASSWORD,
            "/pics/2024/photo.jpg",
            &restored,
            &mut Vec::new(),
        )
        .await
        .unwrap();
        assert_eq!(std::fs::read(&restored).unwrap(), vec![1u8, 2, 3]);

        let err = delete(&dir, PASSWORD, "/pics", false, &mut Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(root_cause(&err), Some(Error::DirectoryNotEmpty(_))));

        delete(&dir, PASSWORD, "/pics", true, &mut Vec::new())
            .await
            .unwrap();
        let err = list(&dir, PASSWORD, "/pics", &mut Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(root_cause(&err), Some(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_mkdir_and_info() {
        let temp = TempDir::new().unwrap();
        let dir = created(&temp).await;

        let mut out = Vec::new();
        mkdir(&dir, PASSWORD, "a/b", &mut out).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Created directory: /a/b\n");

        let mut out = Vec::new();
        info(&dir, &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Status: VALID"));
        assert!(text.contains("Cipher: XCHACHA20_POLY1305"));

        let mut out = Vec::new();
        info(temp.path(), &mut out).await.unwrap();
        assert!(String::from_utf8(out).unwrap().contains("Status: INVALID"));
    }

    #[tokio::test]
    async fn test_unlock_runs_shell() {
        let temp = TempDir::new().unwrap();
        let dir = created(&temp).await;
        let input: &[u8] = b"mkdir notes\nls\nquit\n";

        let mut out = Vec::new();
        unlock(&dir, PASSWORD, input, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("[DIR] notes"));
        assert!(text.contains("Goodbye!"));
    }
}
