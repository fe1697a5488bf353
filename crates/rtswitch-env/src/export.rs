use std::fmt::Write as _;
use std::str::FromStr;

use rtswitch_backend::RuntimeFamily;
use rtswitch_platform::{EnvStore, EnvStoreError, Scope};

use crate::path_list::PathList;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellType {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[derive(Debug, thiserror::Error)]
#[error("unsupported shell '{input}' (expected bash, zsh, fish or powershell)")]
pub struct UnknownShell {
    pub input: String,
}

impl ShellType {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ShellType::Bash => "bash",
            ShellType::Zsh => "zsh",
            ShellType::Fish => "fish",
            ShellType::PowerShell => "powershell",
        }
    }

    /// Guess from `$SHELL`, falling back to `PowerShell` on Windows and
    /// bash elsewhere.
    #[must_use]
    pub fn detect() -> Self {
        std::env::var("SHELL")
            .ok()
            .and_then(|shell| {
                let name = shell.rsplit(['/', '\\']).next()?.to_string();
                name.trim_end_matches(".exe").parse().ok()
            })
            .unwrap_or(if cfg!(windows) {
                ShellType::PowerShell
            } else {
                ShellType::Bash
            })
    }
}

impl FromStr for ShellType {
    type Err = UnknownShell;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bash" | "sh" => Ok(ShellType::Bash),
            "zsh" => Ok(ShellType::Zsh),
            "fish" => Ok(ShellType::Fish),
            "powershell" | "pwsh" => Ok(ShellType::PowerShell),
            _ => Err(UnknownShell {
                input: s.to_string(),
            }),
        }
    }
}

fn posix_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn fish_quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', r"\\").replace('\'', r"\'"))
}

fn powershell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Render the user-scope `PATH` and home variables as a snippet that puts
/// them in front of the shell's inherited environment.
pub fn shell_export(store: &dyn EnvStore, shell: ShellType) -> Result<String, EnvStoreError> {
    let path = store
        .read_expanded(Scope::User, "PATH")?
        .map(|value| PathList::parse(&value))
        .unwrap_or_default();

    let mut homes = Vec::new();
    for name in RuntimeFamily::ALL
        .iter()
        .filter_map(|family| family.home_variable())
    {
        if let Some(value) = store.read_expanded(Scope::User, name)? {
            homes.push((name, value));
        }
    }

    let mut out = String::new();
    match shell {
        ShellType::Bash | ShellType::Zsh => {
            if !path.is_empty() {
                let _ = writeln!(
                    out,
                    "export PATH={}:\"$PATH\"",
                    posix_quote(&path.entries().join(":"))
                );
            }
            for (name, value) in &homes {
                let _ = writeln!(out, "export {name}={}", posix_quote(value));
            }
        }
        ShellType::Fish => {
            if !path.is_empty() {
                let entries: Vec<String> =
                    path.entries().iter().map(|e| fish_quote(e)).collect();
                let _ = writeln!(out, "set -gx PATH {} $PATH", entries.join(" "));
            }
            for (name, value) in &homes {
                let _ = writeln!(out, "set -gx {name} {}", fish_quote(value));
            }
        }
        ShellType::PowerShell => {
            if !path.is_empty() {
                let sep = if cfg!(windows) { ";" } else { ":" };
                let _ = writeln!(
                    out,
                    "$env:PATH = {} + [IO.Path]::PathSeparator + $env:PATH",
                    powershell_quote(&path.entries().join(sep))
                );
            }
            for (name, value) in &homes {
                let _ = writeln!(out, "$env:{name} = {}", powershell_quote(value));
            }
        }
    }

    Ok(out)
}
