//! Command-driven lockdown.
//!
//! Kiosk entry and exit are external commands; process termination runs the
//! configured kill program once per pattern (`pkill -i <pattern>` by default).

use async_trait::async_trait;
use proctor_supervisor::{Lockdown, LockdownError, LockdownConfig};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::ProcessConfig;

pub struct CommandLockdown {
    enter_command: Option<Vec<String>>,
    exit_command: Option<Vec<String>>,
    kill_program: String,
    dry_run: bool,
}

impl CommandLockdown {
    pub fn new(lockdown: &LockdownConfig, processes: &ProcessConfig) -> Self {
        Self {
            enter_command: lockdown.enter_command.clone(),
            exit_command: lockdown.exit_command.clone(),
            kill_program: processes.kill_program.clone(),
            dry_run: processes.dry_run,
        }
    }

    /// Run a command, returning its exit status code.
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<Option<i32>> {
        if self.dry_run {
            info!(program, ?args, "Dry run, command not executed");
            return Ok(Some(0));
        }
        let status = Command::new(program).args(args).status().await?;
        debug!(program, ?args, code = ?status.code(), "Command finished");
        Ok(status.code())
    }

    async fn run_configured(
        &self,
        command: &Option<Vec<String>>,
        wrap: fn(String) -> LockdownError,
    ) -> Result<(), LockdownError> {
        let Some((program, args)) = command.as_deref().and_then(|c| c.split_first()) else {
            debug!("No lockdown command configured");
            return Ok(());
        };

        match self.run(program, args).await {
            Ok(Some(0)) => Ok(()),
            Ok(code) => Err(wrap(format!("{} exited with {:?}", program, code))),
            Err(e) => Err(wrap(format!("{}: {}", program, e))),
        }
    }
}

#[async_trait]
impl Lockdown for CommandLockdown {
    async fn enter_lockdown(&self) -> Result<(), LockdownError> {
        self.run_configured(&self.enter_command, LockdownError::Enter)
            .await?;
        info!("Lockdown entered");
        Ok(())
    }

    async fn exit_lockdown(&self) -> Result<(), LockdownError> {
        self.run_configured(&self.exit_command, LockdownError::Exit)
            .await?;
        info!("Lockdown exited");
        Ok(())
    }

    async fn terminate_external_processes(
        &self,
        name_patterns: &[String],
    ) -> Result<usize, LockdownError> {
        let mut matched = 0;
        let mut failures = Vec::new();

        for pattern in name_patterns {
            let args = ["-i".to_string(), pattern.clone()];
            match self.run(&self.kill_program, &args).await {
                // pkill: 0 = matched, 1 = nothing matched
                Ok(Some(0)) => matched += 1,
                Ok(Some(1)) => debug!(pattern = %pattern, "No matching processes"),
                Ok(code) => failures.push(format!("{}: exit {:?}", pattern, code)),
                Err(e) => failures.push(format!("{}: {}", pattern, e)),
            }
        }

        if failures.is_empty() {
            Ok(matched)
        } else {
            warn!(?failures, "Some process patterns could not be terminated");
            Err(LockdownError::ProcessTermination(failures.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lockdown(enter: Option<Vec<&str>>, dry_run: bool) -> CommandLockdown {
        CommandLockdown::new(
            &LockdownConfig {
                enter_command: enter.map(|c| c.into_iter().map(String::from).collect()),
                ..Default::default()
            },
            &ProcessConfig {
                kill_program: "proctor-no-such-kill-program".into(),
                dry_run,
            },
        )
    }

    #[tokio::test]
    async fn unconfigured_commands_succeed() {
        let lockdown = lockdown(None, false);
        assert!(lockdown.enter_lockdown().await.is_ok());
        assert!(lockdown.exit_lockdown().await.is_ok());
    }

    #[tokio::test]
    async fn dry_run_counts_every_pattern() {
        let lockdown = lockdown(None, true);
        let patterns = vec!["chrome".to_string(), "firefox".to_string()];
        assert_eq!(lockdown.terminate_external_processes(&patterns).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn missing_program_is_an_error() {
        let lockdown = lockdown(Some(vec!["proctor-no-such-kiosk"]), false);
        assert!(matches!(
            lockdown.enter_lockdown().await,
            Err(LockdownError::Enter(_))
        ));

        let err = lockdown
            .terminate_external_processes(&["chrome".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, LockdownError::ProcessTermination(_)));
    }
}
