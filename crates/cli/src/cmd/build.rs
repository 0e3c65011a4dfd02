//! `build-wp-*`: assemble site trees or package a module

use tracing::info;
use wpcd_core::config::CONFIG_FILE;
use wpcd_core::{Assembler, BuildConfig, HttpFetcher, Job, JobKind, ModuleBuilder, Result, SystemRunner};
use wpcd_platform::Settings;

use crate::output::{print_stat, print_success};

pub fn run(job: &Job, settings: &Settings) -> Result<()> {
  match job.kind {
    JobKind::Site => build_site(settings),
    _ => build_module(job, settings),
  }
}

fn build_site(settings: &Settings) -> Result<()> {
  let config = BuildConfig::load(&settings.work_dir.join(CONFIG_FILE))?;
  let fetcher = HttpFetcher::new();
  let assembler = Assembler::new(&settings.work_dir, &settings.cache_dir, &fetcher, &SystemRunner);
  let report = assembler.assemble(&config)?;

  print_success(&format!(
    "Assembled {} build(s) in {}",
    report.builds,
    assembler.build_root().display()
  ));
  print_stat("Cores", &report.cores.to_string());
  print_stat("Themes", &report.themes.to_string());
  print_stat("Plugins", &report.plugins.to_string());
  print_stat("Autoloaders", &report.autoloaders.to_string());
  Ok(())
}

fn build_module(job: &Job, settings: &Settings) -> Result<()> {
  info!(kind = %job.kind, name = %job.name, "packaging module");
  let builder = ModuleBuilder::new(&settings.work_dir, &settings.artefact_dir, &job.name, &SystemRunner);
  let archive = builder.build()?;
  print_success(&format!("Packaged {} {} into {}", job.kind, job.name, archive.display()));
  Ok(())
}
