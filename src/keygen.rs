use std::fs;
use std::io::Write;
use std::path::Path;

use crate::errors::*;
use crate::key_types::{pem, KeyMaterial};

/// A fresh signing key, both halves as PEM.
pub struct GeneratedKeys {
    pub private_pem: String,
    pub public_pem: String,
}

impl GeneratedKeys {
    pub fn generate() -> Result<Self> {
        let pkcs8 = KeyMaterial::generate_pkcs8()?;
        let keys = KeyMaterial::from_pkcs8(&pkcs8)?;

        Ok(GeneratedKeys {
            private_pem: pem::encode(pem::PRIVATE_KEY_LABEL, &pkcs8),
            public_pem: keys.public_key().pem().to_string(),
        })
    }

    /// Write the public half where the server will look for it. An existing
    /// file is only replaced when `force` is set.
    pub fn publish(&self, path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            bail!(
                "{} already exists, pass --force to replace it",
                path.display()
            );
        }

        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .chain_err(|| format!("creating {}", dir.display()))?;
            }
        }

        fs::write(path, &self.public_pem).chain_err(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// The private key as a single line, ready to paste into an environment
    /// variable.
    pub fn private_env_line(&self) -> String {
        format!(
            "PRIVATE_SIGNATURE_KEY=\"{}\"",
            self.private_pem.trim_end().replace('\n', "\\n")
        )
    }
}

/// `timestamper keygen`: publish the public key, print the private key.
pub fn run(public_out: &Path, force: bool) -> Result<()> {
    let keys = GeneratedKeys::generate()?;
    keys.publish(public_out, force)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", keys.private_env_line())?;

    eprintln!("Public key written to {}", public_out.display());
    eprintln!("Keep the line above secret. Set it in the server's environment;");
    eprintln!("the server refuses to start without it.");
    Ok(())
}
