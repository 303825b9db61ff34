//! Write a sample configuration file

use std::path::PathBuf;

use dwh_etl::warehouse::config::sample_config;

use crate::error::CliError;

/// Init command arguments
#[derive(Debug, Clone)]
pub struct InitArgs {
    /// Where to write the configuration
    pub config: PathBuf,
    /// Overwrite an existing file
    pub force: bool,
}

pub fn handle_init(args: &InitArgs) -> Result<(), CliError> {
    if args.config.exists() && !args.force {
        return Err(CliError::FileExists(args.config.clone()));
    }

    if let Some(parent) = args.config.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| CliError::FileWriteError(parent.to_path_buf(), e.to_string()))?;
    }

    std::fs::write(&args.config, sample_config())
        .map_err(|e| CliError::FileWriteError(args.config.clone(), e.to_string()))?;

    println!("Created {}", args.config.display());
    println!("Edit the [S3] paths, then run 'dwh-etl run'.");
    Ok(())
}
