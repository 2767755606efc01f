//! Process relaunch planning.
//!
//! Packaged builds complicate "restart yourself": the portable Windows
//! build and the FUSE-mounted AppImage both run from temporarily extracted
//! executables, so the path to start again must come from the packaging
//! environment variables, not from the running process's own path.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Environment variable holding the AppImage path when running from one.
pub const APPIMAGE_ENV: &str = "APPIMAGE";
/// Environment variable holding the portable executable path on Windows.
pub const PORTABLE_EXECUTABLE_ENV: &str = "PORTABLE_EXECUTABLE_FILE";
/// Exit code override used by the dev workflow instead of respawning.
pub const DEV_RELAUNCH_EXIT_CODE_ENV: &str = "FREETUBE_RELAUNCH_EXIT_CODE";

/// How to start the replacement process before this one quits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelaunchPlan {
    /// Spawn an executable with the original launch arguments.
    Spawn {
        exec_path: PathBuf,
        args: Vec<String>,
    },
    /// AppImages cannot re-exec the extracted binary (FUSE); the image
    /// itself is spawned instead, without arguments.
    SpawnImage { image_path: PathBuf },
    /// Dev workflow: exit with a code the outer tooling watches for.
    DevExit { code: i32 },
}

/// Decide how a relaunch must happen, given the packaging environment and
/// the original launch arguments.
pub fn plan<E>(env: E, current_exe: &Path, argv: &[String], dev_mode: bool) -> RelaunchPlan
where
    E: Fn(&str) -> Option<String>,
{
    if dev_mode {
        let code = env(DEV_RELAUNCH_EXIT_CODE_ENV)
            .and_then(|value| value.parse().ok())
            .unwrap_or(0);
        return RelaunchPlan::DevExit { code };
    }

    if let Some(image) = env(APPIMAGE_ENV) {
        return RelaunchPlan::SpawnImage {
            image_path: PathBuf::from(image),
        };
    }

    let exec_path = env(PORTABLE_EXECUTABLE_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| current_exe.to_path_buf());

    RelaunchPlan::Spawn {
        exec_path,
        args: argv.iter().skip(1).cloned().collect(),
    }
}

/// Start the replacement process, detached. The caller quits afterwards;
/// a `DevExit` plan is the caller's responsibility.
pub fn execute(plan: &RelaunchPlan) -> io::Result<()> {
    match plan {
        RelaunchPlan::Spawn { exec_path, args } => {
            Command::new(exec_path)
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()?;
            Ok(())
        }
        RelaunchPlan::SpawnImage { image_path } => {
            Command::new(image_path)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()?;
            Ok(())
        }
        RelaunchPlan::DevExit { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn argv() -> Vec<String> {
        vec!["exe".to_string(), "--flag".to_string()]
    }

    #[test]
    fn test_plain_build_respawns_current_exe_with_original_args() {
        let plan = plan(no_env, Path::new("/usr/bin/freetube"), &argv(), false);
        assert_eq!(
            plan,
            RelaunchPlan::Spawn {
                exec_path: PathBuf::from("/usr/bin/freetube"),
                args: vec!["--flag".to_string()],
            }
        );
    }

    #[test]
    fn test_portable_build_uses_env_path() {
        let env = |name: &str| {
            (name == PORTABLE_EXECUTABLE_ENV).then(|| "C:\\apps\\FreeTube.exe".to_string())
        };
        let plan = plan(env, Path::new("C:\\temp\\extracted.exe"), &argv(), false);
        assert_eq!(
            plan,
            RelaunchPlan::Spawn {
                exec_path: PathBuf::from("C:\\apps\\FreeTube.exe"),
                args: vec!["--flag".to_string()],
            }
        );
    }

    #[test]
    fn test_appimage_spawns_the_image_itself() {
        let env =
            |name: &str| (name == APPIMAGE_ENV).then(|| "/home/u/FreeTube.AppImage".to_string());
        let plan = plan(env, Path::new("/tmp/.mount/app"), &argv(), false);
        assert_eq!(
            plan,
            RelaunchPlan::SpawnImage {
                image_path: PathBuf::from("/home/u/FreeTube.AppImage"),
            }
        );
    }

    #[test]
    fn test_dev_mode_exits_with_configured_code() {
        let env =
            |name: &str| (name == DEV_RELAUNCH_EXIT_CODE_ENV).then(|| "69".to_string());
        let plan = plan(env, Path::new("/usr/bin/freetube"), &argv(), true);
        assert_eq!(plan, RelaunchPlan::DevExit { code: 69 });
    }
}
