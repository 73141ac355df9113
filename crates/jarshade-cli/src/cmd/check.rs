//! `jarshade check` - validate configuration and resolve every target
//! without writing anything.

use anyhow::{Result, bail};
use jarshade_core::TargetBuild;
use jarshade_core::pipeline::load_remap_table;
use jarshade_schema::CONFIG_FILE;
use jarshade_schema::profile::ProjectConfig;
use std::path::Path;

/// Load, validate, and resolve all targets; report findings per target.
pub fn check(project_dir: &Path) -> Result<()> {
    let config = ProjectConfig::load(&project_dir.join(CONFIG_FILE))?;
    println!(
        "{} v{}: {} target(s)",
        config.project.name,
        config.project.version,
        config.targets.len()
    );

    let mut problems = 0usize;
    for target in &config.targets {
        println!("target `{}` ({})", target.name, target.family);

        let build = TargetBuild::new(
            config.project.clone(),
            project_dir.to_path_buf(),
            target.clone(),
        );
        match build.resolve() {
            Ok(deps) => {
                for dep in &deps {
                    println!("  {} [{}] {}", dep.name, dep.scope, dep.path.display());
                }
            }
            Err(failure) => {
                problems += 1;
                println!("  error: {}", failure.source);
            }
        }

        if let Some(remap) = &target.remap {
            match load_remap_table(remap, project_dir) {
                Ok(table) => println!(
                    "  mappings: {} classes, {} members",
                    table.class_count(),
                    table.member_count()
                ),
                Err(e) => {
                    problems += 1;
                    println!("  error: {e}");
                }
            }
        }

        if target.retention.is_empty() {
            println!("  warning: no retention spec, archive will carry every class");
        }
    }

    if problems > 0 {
        bail!("{problems} problem(s) found");
    }
    println!("ok");
    Ok(())
}
