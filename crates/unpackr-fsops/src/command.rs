//! Post-process command execution.
//!
//! # Design
//! - The template is split on whitespace into argv before rendering, so a
//!   rendered value containing spaces stays a single argument. Whitespace inside
//!   `{{ }}` or `{% %}` does not split.
//! - Rendering is strict: an unknown variable fails the stage instead of
//!   expanding to an empty string.
//! - No shell is involved; the first argument is the program.

use std::path::Path;
use std::process::{Command, Stdio};

use minijinja::{Environment, UndefinedBehavior, context};
use tracing::debug;

use crate::error::{FsOpsError, FsOpsResult};

/// Values exposed to the command template.
#[derive(Debug, Clone, Copy)]
pub struct CommandContext<'a> {
    /// First archive volume, exposed as `name`.
    pub name: &'a Path,
    /// Base name of the release directory, exposed as `base`.
    pub base: &'a str,
    /// Release directory, exposed as `dir`; also the working directory.
    pub dir: &'a Path,
}

/// Output of a successful command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Rendered argv.
    pub argv: Vec<String>,
    /// Captured standard output.
    pub stdout: String,
}

/// Split `template` and render every argument against `context`.
///
/// # Errors
///
/// Returns [`FsOpsError::Template`] when an argument fails to render.
pub fn render_args(template: &str, context: &CommandContext<'_>) -> FsOpsResult<Vec<String>> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    let values = context! {
        name => context.name.display().to_string(),
        base => context.base,
        dir => context.dir.display().to_string(),
    };

    split_template(template)
        .into_iter()
        .map(|argument| {
            env.render_str(&argument, &values)
                .map_err(|source| FsOpsError::Template {
                    template: template.to_string(),
                    source,
                })
        })
        .collect()
}

/// Render `template` and run it in `context.dir`, capturing its output.
///
/// # Errors
///
/// Returns an error when rendering fails, the program cannot be spawned, or it
/// exits unsuccessfully. The last two carry the captured standard error.
pub fn run_post_command(template: &str, context: &CommandContext<'_>) -> FsOpsResult<CommandOutput> {
    let argv = render_args(template, context)?;
    let Some((program, arguments)) = argv.split_first() else {
        return Err(FsOpsError::InvalidInput {
            field: "post_command",
            reason: "empty",
            value: None,
        });
    };

    debug!(program = %program, args = ?arguments, dir = %context.dir.display(), "running post command");
    let output = Command::new(program)
        .args(arguments)
        .current_dir(context.dir)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| FsOpsError::Command {
            program: program.clone(),
            status: None,
            stderr: source.to_string(),
        })?;

    if !output.status.success() {
        return Err(FsOpsError::Command {
            program: program.clone(),
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        argv,
    })
}

fn split_template(template: &str) -> Vec<String> {
    let mut arguments = Vec::new();
    let mut current = String::new();
    let mut depth = 0_usize;
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        match (ch, chars.peek().copied()) {
            ('{', Some(next @ ('{' | '%'))) => {
                depth += 1;
                current.push(ch);
                current.push(next);
                chars.next();
            }
            (close @ ('}' | '%'), Some('}')) if depth > 0 => {
                depth -= 1;
                current.push(close);
                current.push('}');
                chars.next();
            }
            (ch, _) if ch.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    arguments.push(std::mem::take(&mut current));
                }
            }
            (ch, _) => current.push(ch),
        }
    }
    if !current.is_empty() {
        arguments.push(current);
    }
    arguments
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use unpackr_test_support::fixtures::temp_dir;

    type TestResult<T> = anyhow::Result<T>;

    #[test]
    fn split_keeps_expressions_together() {
        assert_eq!(
            split_template("  mv {{ name }}   {{ dir ~ '/done' }} "),
            vec!["mv", "{{ name }}", "{{ dir ~ '/done' }}"]
        );
        assert_eq!(
            split_template("echo {% if base %}{{ base }}{% endif %}"),
            vec!["echo", "{% if base %}{{ base }}{% endif %}"]
        );
        assert!(split_template("   ").is_empty());
    }

    #[test]
    fn placeholders_render_per_argument() -> TestResult<()> {
        let context = CommandContext {
            name: Path::new("/dl/My Show/show.rar"),
            base: "My Show",
            dir: Path::new("/dl/My Show"),
        };
        let argv = render_args("notify {{ base }} {{ name }} {{ dir }}", &context)?;
        assert_eq!(
            argv,
            vec!["notify", "My Show", "/dl/My Show/show.rar", "/dl/My Show"]
        );
        Ok(())
    }

    #[test]
    fn unknown_placeholder_is_a_template_error() {
        let context = CommandContext {
            name: Path::new("/dl/a.rar"),
            base: "dl",
            dir: Path::new("/dl"),
        };
        assert!(matches!(
            render_args("echo {{ missing }}", &context),
            Err(FsOpsError::Template { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn command_runs_in_release_directory() -> TestResult<()> {
        let temp = temp_dir("unpackr-fsops-")?;
        fs::write(temp.path().join("record.sh"), "printf '%s' \"$1\" > recorded.txt\n")?;
        let context = CommandContext {
            name: &temp.path().join("release.rar"),
            base: "release",
            dir: temp.path(),
        };
        let output = run_post_command("sh record.sh {{ base }}", &context)?;
        assert_eq!(output.argv, vec!["sh", "record.sh", "release"]);
        assert_eq!(fs::read_to_string(temp.path().join("recorded.txt"))?, "release");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_reports_stderr() -> TestResult<()> {
        let temp = temp_dir("unpackr-fsops-")?;
        fs::write(temp.path().join("fail.sh"), "echo oops >&2\nexit 3\n")?;
        let context = CommandContext {
            name: &temp.path().join("release.rar"),
            base: "release",
            dir: temp.path(),
        };
        let error = run_post_command("sh fail.sh", &context)
            .err()
            .ok_or_else(|| anyhow::anyhow!("command should fail"))?;
        assert!(matches!(
            &error,
            FsOpsError::Command { program, status: Some(3), stderr }
                if program == "sh" && stderr == "oops"
        ));
        assert_eq!(error.to_string(), "sh: oops");
        Ok(())
    }

    #[test]
    fn missing_program_is_a_command_error() -> TestResult<()> {
        let temp = temp_dir("unpackr-fsops-")?;
        let context = CommandContext {
            name: &temp.path().join("release.rar"),
            base: "release",
            dir: temp.path(),
        };
        assert!(matches!(
            run_post_command("unpackr-no-such-program-xyz", &context),
            Err(FsOpsError::Command { status: None, .. })
        ));
        Ok(())
    }
}
