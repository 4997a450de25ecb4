// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Temporary copies of the Terraform module under test.
//!
//! Every scenario works on its own copy so that parallel `terraform init` and
//! `terraform apply` runs never share `.terraform/` or state files.

use crate::constants::{TERRAFORM_LOCK_FILE, TERRAFORM_VERSION_FILE};
use crate::errors::{HarnessError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// A module copied into a temporary directory.
///
/// The directory is deleted on drop unless [`TempModule::keep`] was called.
#[derive(Debug)]
pub struct TempModule {
    root: Option<TempDir>,
    kept_root: Option<PathBuf>,
    terraform_dir: PathBuf,
}

impl TempModule {
    /// Directory to run Terraform in.
    #[must_use]
    pub fn terraform_dir(&self) -> &Path {
        &self.terraform_dir
    }

    /// Root of the temporary copy.
    #[must_use]
    pub fn root(&self) -> &Path {
        match (&self.root, &self.kept_root) {
            (Some(dir), _) => dir.path(),
            (None, Some(path)) => path,
            (None, None) => &self.terraform_dir,
        }
    }

    /// Leave the copy on disk after the handle is dropped.
    pub fn keep(&mut self) {
        if let Some(dir) = self.root.take() {
            let path = dir.keep();
            info!(path = %path.display(), "Keeping temporary module copy");
            self.kept_root = Some(path);
        }
    }
}

/// Copy `root` into a new temporary directory and return a handle whose
/// [`TempModule::terraform_dir`] is `<tmp>/<relative>`.
///
/// Hidden entries, Terraform state and `*.tfvars` files are not copied. The
/// provider lock file and `.terraform-version` are. Symlinks are followed.
///
/// # Errors
///
/// Returns [`HarnessError::ModuleNotFound`] if `root` is not a directory, or
/// [`HarnessError::Io`] if copying fails.
pub fn copy_terraform_folder_to_temp(root: &Path, relative: &Path) -> Result<TempModule> {
    if !root.is_dir() {
        return Err(HarnessError::ModuleNotFound(root.to_path_buf()));
    }

    let tmp = tempfile::Builder::new()
        .prefix("tfkube-")
        .tempdir()
        .map_err(|e| HarnessError::io(std::env::temp_dir(), e))?;

    let copied = copy_dir_filtered(root, tmp.path())?;
    let terraform_dir = tmp.path().join(relative);

    info!(
        source = %root.display(),
        dest = %terraform_dir.display(),
        files = copied,
        "Copied Terraform module to temporary folder"
    );

    Ok(TempModule {
        root: Some(tmp),
        kept_root: None,
        terraform_dir,
    })
}

/// Whether a directory entry should be left out of the copy.
#[must_use]
pub fn should_skip(name: &str, is_dir: bool) -> bool {
    if (name == TERRAFORM_LOCK_FILE || name == TERRAFORM_VERSION_FILE) && !is_dir {
        return false;
    }
    if name.starts_with('.') {
        return true;
    }
    if is_dir {
        return false;
    }
    name == "terraform.tfstate"
        || name == "terraform.tfstate.backup"
        || name.ends_with(".tfstate")
        || name.ends_with(".tfvars")
        || name.ends_with(".tfvars.json")
}

fn copy_dir_filtered(src: &Path, dest: &Path) -> Result<usize> {
    fs::create_dir_all(dest).map_err(|e| HarnessError::io(dest, e))?;

    let mut copied = 0;
    let entries = fs::read_dir(src).map_err(|e| HarnessError::io(src, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| HarnessError::io(src, e))?;
        let path = entry.path();
        // Resolve symlinks so linked directories are copied as directories
        let file_type = fs::metadata(&path)
            .map_err(|e| HarnessError::io(&path, e))?
            .file_type();
        let name = entry.file_name().to_string_lossy().to_string();

        if should_skip(&name, file_type.is_dir()) {
            debug!(path = %path.display(), "Skipping");
            continue;
        }

        let target = dest.join(&name);
        if file_type.is_dir() {
            copied += copy_dir_filtered(&path, &target)?;
        } else {
            fs::copy(&path, &target).map_err(|e| HarnessError::io(&path, e))?;
            copied += 1;
        }
    }

    Ok(copied)
}

#[cfg(test)]
#[path = "test_structure_tests.rs"]
mod test_structure_tests;
