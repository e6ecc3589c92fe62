use console::style;
use elif_migrator::{Decision, RunDecider, UnitInfo};
use inquire::{Confirm, Select};

const APPLY: &str = "Apply";
const SKIP: &str = "Skip";
const ABORT: &str = "Abort the run";

/// Terminal decider asking before every migration
#[derive(Debug, Default)]
pub struct PromptDecider {
    apply_all: bool,
}

impl PromptDecider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunDecider for PromptDecider {
    fn should_apply(&mut self, unit: &UnitInfo) -> Decision {
        if self.apply_all {
            return Decision::Apply;
        }

        println!();
        println!(
            "{} {}",
            style(unit.version.as_str()).cyan().bold(),
            style(&unit.description).bold()
        );
        if !unit.author.is_empty() {
            println!("  {} {}", style("author:").dim(), unit.author);
        }
        println!("  {} {}", style("source:").dim(), unit.source_path);

        let options = vec![APPLY, "Apply this and all remaining", SKIP, ABORT];
        match Select::new("What should happen with this migration?", options).prompt() {
            Ok(APPLY) => Decision::Apply,
            Ok(SKIP) => Decision::Skip,
            Ok(ABORT) => Decision::Abort,
            Ok(_) => {
                self.apply_all = true;
                Decision::Apply
            }
            Err(e) => {
                tracing::warn!("Prompt failed, aborting run: {}", e);
                Decision::Abort
            }
        }
    }

    fn should_continue_after_error(&mut self, unit: &UnitInfo, errors: &[String]) -> bool {
        println!("{} Migration {} reported errors:", style("✗").red(), unit.version);
        for error in errors {
            println!("    {}", style(error).red());
        }

        Confirm::new("Continue with the remaining migrations?")
            .with_default(false)
            .prompt()
            .unwrap_or_else(|e| {
                tracing::warn!("Prompt failed, stopping run: {}", e);
                false
            })
    }
}
