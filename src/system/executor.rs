// src/system/executor.rs

use crate::models::ResolvedStep;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command as StdCommand, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command could not be parsed: {0}")]
    CommandParse(String),
    #[error("Command '{0}' could not be executed: {1}")]
    CommandFailed(String, std::io::Error),
    #[error("Command '{0}' exited with a non-zero status.")]
    NonZeroExitStatus(String),
    #[error("Malformed env entry '{0}': expected \"KEY=VALUE\".")]
    MalformedEnv(String),
    #[error("env_script not found: {0}")]
    EnvScriptNotFound(String),
}

/// Runs one resolved step to completion with inherited stdio.
///
/// A relative `cwd` is anchored at the workspace root. Env entries are
/// applied in declared order, so a later duplicate overrides an earlier one.
/// When `env_script` is set the command runs through the platform shell with
/// the script sourced first.
pub fn execute_step(step: &ResolvedStep, workspace_root: &Path) -> Result<(), ExecutionError> {
    let command_line = step.command.trim();
    if command_line.is_empty() {
        // An empty command is a success, not an error.
        return Ok(());
    }

    let env = parse_env_entries(&step.env)?;
    let cwd = match step.cwd.as_deref() {
        Some(dir) => {
            let path = PathBuf::from(dir);
            if path.is_absolute() {
                path
            } else {
                workspace_root.join(path)
            }
        }
        None => workspace_root.to_path_buf(),
    };
    let cwd = dunce::simplified(&cwd).to_path_buf();

    let mut command = match step.env_script.as_deref() {
        Some(script) => sourcing_command(script, command_line)?,
        None => direct_command(command_line)?,
    };
    command
        .current_dir(&cwd)
        .envs(env)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    let status = match command.status() {
        Ok(status) => status,
        Err(e) if e.kind() == ErrorKind::NotFound && cfg!(target_os = "windows") => {
            // Windows built-ins like `echo` only exist inside cmd.exe.
            log::debug!("Command not found, retrying through cmd /C: {command_line}");
            StdCommand::new("cmd")
                .arg("/C")
                .arg(command_line)
                .current_dir(&cwd)
                .envs(parse_env_entries(&step.env)?)
                .status()
                .map_err(|e| ExecutionError::CommandFailed(command_line.to_string(), e))?
        }
        Err(e) => return Err(ExecutionError::CommandFailed(command_line.to_string(), e)),
    };

    if status.success() {
        Ok(())
    } else {
        Err(ExecutionError::NonZeroExitStatus(command_line.to_string()))
    }
}

/// Splits ordered `KEY=VALUE` entries. Duplicates are kept; the caller
/// applies them in order so the last one wins.
pub fn parse_env_entries(entries: &[String]) -> Result<Vec<(String, String)>, ExecutionError> {
    entries
        .iter()
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .ok_or_else(|| ExecutionError::MalformedEnv(entry.clone()))
        })
        .collect()
}

fn direct_command(command_line: &str) -> Result<StdCommand, ExecutionError> {
    let parts = shlex::split(command_line)
        .ok_or_else(|| ExecutionError::CommandParse(command_line.to_string()))?;
    let Some((program, args)) = parts.split_first() else {
        return Err(ExecutionError::CommandParse(command_line.to_string()));
    };
    let mut command = StdCommand::new(program);
    command.args(args);
    Ok(command)
}

/// Builds a shell invocation that sources `script` before running the
/// command. A script without an extension gets the platform default.
fn sourcing_command(script: &str, command_line: &str) -> Result<StdCommand, ExecutionError> {
    let mut script_path = PathBuf::from(script);
    if script_path.extension().is_none() {
        let with_ext = if cfg!(target_os = "windows") {
            "bat"
        } else {
            "sh"
        };
        script_path.set_extension(with_ext);
    }
    if !script_path.is_file() {
        return Err(ExecutionError::EnvScriptNotFound(
            script_path.display().to_string(),
        ));
    }

    let mut command;
    if cfg!(target_os = "windows") {
        command = StdCommand::new("cmd");
        command.arg("/C").arg(format!(
            "call \"{}\" >nul 2>&1 && {}",
            script_path.display(),
            command_line
        ));
    } else {
        command = StdCommand::new("sh");
        command.arg("-c").arg(format!(
            ". \"{}\" >/dev/null 2>&1 && {}",
            script_path.display(),
            command_line
        ));
    }
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(command: &str) -> ResolvedStep {
        ResolvedStep {
            command: command.to_string(),
            cwd: None,
            env_script: None,
            env: Vec::new(),
        }
    }

    #[test]
    fn test_parse_env_entries_in_order() {
        let parsed = parse_env_entries(&[
            "FOO=bar".to_string(),
            "BAZ=qux=extra".to_string(),
        ])
        .unwrap();
        assert_eq!(
            parsed,
            vec![
                ("FOO".to_string(), "bar".to_string()),
                ("BAZ".to_string(), "qux=extra".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_env_keeps_duplicates() {
        let parsed =
            parse_env_entries(&["A=1".to_string(), "A=2".to_string()]).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1], ("A".to_string(), "2".to_string()));
    }

    #[test]
    fn test_parse_env_missing_equals_is_an_error() {
        let err = parse_env_entries(&["NO_EQUALS".to_string()]).unwrap_err();
        assert!(matches!(err, ExecutionError::MalformedEnv(entry) if entry == "NO_EQUALS"));
    }

    #[test]
    fn test_parse_env_empty_value_is_fine() {
        let parsed = parse_env_entries(&["KEY=".to_string()]).unwrap();
        assert_eq!(parsed[0], ("KEY".to_string(), String::new()));
    }

    #[test]
    fn test_empty_command_is_a_noop_success() {
        let result = execute_step(&step("   "), Path::new("/"));
        assert!(result.is_ok());
    }

    #[test]
    fn test_missing_env_script_is_an_error() {
        let mut broken = step("echo hi");
        broken.env_script = Some("/no/such/script.sh".to_string());
        assert!(matches!(
            execute_step(&broken, Path::new("/")),
            Err(ExecutionError::EnvScriptNotFound(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_command_runs() {
        let result = execute_step(&step("true"), Path::new("/"));
        assert!(result.is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_command_reports_status() {
        let result = execute_step(&step("false"), Path::new("/"));
        assert!(matches!(
            result,
            Err(ExecutionError::NonZeroExitStatus(cmd)) if cmd == "false"
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_env_script_is_sourced_before_the_command() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("env.sh");
        std::fs::write(&script, "export FLAVOR=sourced\n").unwrap();
        let mut sourced = step("test \"$FLAVOR\" = sourced");
        sourced.env_script = Some(script.display().to_string());
        assert!(execute_step(&sourced, dir.path()).is_ok());
    }
}
