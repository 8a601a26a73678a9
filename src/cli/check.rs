use std::path::Path;

use anyhow::Result;

use clusterbench::config::HarnessConfig;
use clusterbench::dataset::{DatasetDescriptor, Source};
use clusterbench::sweep::Mode;

fn check_root(root: &Path) -> bool {
    match std::fs::read_dir(root) {
        Ok(entries) => {
            println!("  {:<24}OK ({} entries)", "dataset root", entries.count());
            true
        }
        Err(e) => {
            println!("  {:<24}UNREADABLE ({})", "dataset root", e);
            false
        }
    }
}

// COMPARE MODE: AN UNRESOLVED DATASET IS A WARNING (IT WILL BE SKIPPED).
// SCALE MODE: IT IS A FAILURE (THE SWEEP WOULD ABORT).
fn check_datasets(cfg: &HarnessConfig) -> bool {
    let mut ok = true;
    let mut resolved = 0;
    for reference in &cfg.datasets {
        match DatasetDescriptor::resolve(&cfg.dataset_root, reference) {
            Some((d, src)) => {
                resolved += 1;
                let via = match src {
                    Source::Name => "name",
                    Source::Header => "header",
                };
                let exists = if d.path.exists() { "" } else { "  (FILE NOT FOUND)" };
                println!("  {:<32}OK {} via {}{}", reference, d.shape(), via, exists);
            }
            None if cfg.mode == Mode::Scale => {
                println!("  {:<32}UNRESOLVED -- SCALE SWEEP WOULD ABORT", reference);
                ok = false;
            }
            None => {
                println!("  {:<32}UNRESOLVED -- WILL BE SKIPPED", reference);
            }
        }
    }
    if resolved == 0 {
        println!("  NO DATASET RESOLVED");
        ok = false;
    }
    ok
}

pub fn run_check(cfg: &HarnessConfig) -> Result<()> {
    println!("CLUSTERBENCH CONFIGURATION CHECK");
    println!();

    let mut ok = true;

    println!("BACKEND:");
    match cfg.backend.validate() {
        Ok(path) => println!("  {:<24}OK ({})", cfg.backend.name, path.display()),
        Err(e) => {
            println!("  {:<24}{}", cfg.backend.name, e.to_string().to_uppercase());
            ok = false;
        }
    }
    println!("  {:<24}{}", "args", cfg.backend.args.join(" "));
    println!();

    println!("DATASETS:");
    if !check_root(&cfg.dataset_root) {
        ok = false;
    }
    if !check_datasets(cfg) {
        ok = false;
    }
    println!();

    if cfg.mode == Mode::Scale {
        println!("SWEEP:");
        println!("  {:<24}{:?}", cfg.param_label, cfg.params);
        println!();
    }

    if ok {
        println!("ALL CHECKS PASSED");
    } else {
        println!("SOME CHECKS FAILED");
        std::process::exit(1);
    }

    Ok(())
}
