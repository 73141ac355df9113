//! `jarshade build` - compose archives for the selected targets.
//!
//! Targets are independent by construction, so each one runs on its own
//! blocking task; `--jobs` caps the concurrency. Results are reported in
//! declaration order regardless of completion order, and sibling targets
//! run to completion when one fails.

use anyhow::{Context, Result, bail};
use comfy_table::{Table, presets};
use jarshade_core::{BuildOutcome, TargetBuild, TargetFailure};
use jarshade_schema::CONFIG_FILE;
use jarshade_schema::profile::{ProjectConfig, TargetProfile};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct TargetReport {
    target: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    classes_loaded: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    classes_kept: Option<usize>,
}

impl TargetReport {
    fn from_result(name: &str, result: &Result<BuildOutcome, TargetFailure>) -> Self {
        match result {
            Ok(outcome) => Self {
                target: name.to_string(),
                status: "ok",
                stage: None,
                error: None,
                artifact: Some(outcome.artifact.display().to_string()),
                size_bytes: Some(outcome.size_bytes),
                digest: Some(outcome.digest.to_string()),
                classes_loaded: Some(outcome.classes_loaded),
                classes_kept: Some(outcome.classes_kept),
            },
            Err(failure) => Self {
                target: name.to_string(),
                status: "failed",
                stage: Some(failure.stage.to_string()),
                error: Some(failure.source.to_string()),
                artifact: None,
                size_bytes: None,
                digest: None,
                classes_loaded: None,
                classes_kept: None,
            },
        }
    }
}

/// Build the selected targets (all declared targets when `filter` is empty).
pub async fn build(
    project_dir: &Path,
    filter: &[String],
    jobs: Option<usize>,
    json: bool,
    dry_run: bool,
) -> Result<()> {
    let config = ProjectConfig::load(&project_dir.join(CONFIG_FILE))?;
    let selected = select(&config, filter)?;

    if dry_run {
        for target in &selected {
            print_plan(&config, project_dir, target)?;
        }
        return Ok(());
    }

    let limit = jobs.unwrap_or_else(num_cpus::get).max(1);
    let semaphore = Arc::new(tokio::sync::Semaphore::new(limit));
    let mut set = tokio::task::JoinSet::new();

    for (idx, target) in selected.iter().enumerate() {
        let build = TargetBuild::new(
            config.project.clone(),
            project_dir.to_path_buf(),
            target.clone(),
        );
        let semaphore = Arc::clone(&semaphore);
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            let result = tokio::task::spawn_blocking(move || build.run()).await?;
            anyhow::Ok((idx, result))
        });
    }

    let mut results: Vec<Option<Result<BuildOutcome, TargetFailure>>> =
        selected.iter().map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        let (idx, result) = joined.context("build task panicked")??;
        results[idx] = Some(result);
    }

    let mut reports = Vec::with_capacity(selected.len());
    let mut failed = 0usize;
    for (target, result) in selected.iter().zip(&results) {
        let result = result
            .as_ref()
            .with_context(|| format!("no result for target `{}`", target.name))?;
        if let Err(failure) = result {
            failed += 1;
            eprintln!("{failure}");
        }
        reports.push(TargetReport::from_result(&target.name, result));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_summary(&reports);
    }

    if failed > 0 {
        bail!("{failed} of {} targets failed", selected.len());
    }
    Ok(())
}

fn select(config: &ProjectConfig, filter: &[String]) -> Result<Vec<TargetProfile>> {
    if filter.is_empty() {
        return Ok(config.targets.clone());
    }
    filter
        .iter()
        .map(|name| {
            config
                .target(name)
                .cloned()
                .with_context(|| format!("unknown target `{name}`"))
        })
        .collect()
}

fn print_plan(config: &ProjectConfig, project_dir: &Path, target: &TargetProfile) -> Result<()> {
    let build = TargetBuild::new(
        config.project.clone(),
        project_dir.to_path_buf(),
        target.clone(),
    );
    let deps = build.resolve()?;

    println!("target `{}` ({})", target.name, target.family);
    println!("  artifact: {}", build.artifact_path().display());
    for dep in &deps {
        println!("  {} [{}] {}", dep.name, dep.scope, dep.path.display());
    }
    if !target.relocations.is_empty() {
        println!("  relocations: {}", target.relocations.len());
    }
    if let Some(remap) = &target.remap {
        println!("  remap: {}", remap.mappings.display());
    }
    if !target.retention.is_empty() {
        println!("  minimize: yes");
    }
    Ok(())
}

fn print_summary(reports: &[TargetReport]) {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_header(vec!["Target", "Status", "Classes", "Size", "Digest"]);
    for report in reports {
        let classes = match (report.classes_kept, report.classes_loaded) {
            (Some(kept), Some(loaded)) => format!("{kept}/{loaded}"),
            _ => String::new(),
        };
        let status = match &report.stage {
            Some(stage) => format!("failed ({stage})"),
            None => report.status.to_string(),
        };
        table.add_row(vec![
            report.target.clone(),
            status,
            classes,
            report.size_bytes.map(format_size).unwrap_or_default(),
            report
                .digest
                .as_deref()
                .map(|d| d.chars().take(12).collect::<String>())
                .unwrap_or_default(),
        ]);
    }
    println!("{table}");
}

fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}
