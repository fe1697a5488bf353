use std::ffi::OsStr;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

pub trait HideWindow {
    fn hide_window(&mut self) -> &mut Self;
}

impl HideWindow for tokio::process::Command {
    #[cfg(windows)]
    fn hide_window(&mut self) -> &mut Self {
        self.creation_flags(CREATE_NO_WINDOW)
    }

    #[cfg(not(windows))]
    fn hide_window(&mut self) -> &mut Self {
        self
    }
}

/// Command with no console window and colour output suppressed, so captured
/// output stays parseable.
pub fn quiet_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.env("NO_COLOR", "1");
    cmd.env("TERM", "dumb");
    cmd.hide_window();
    cmd
}

#[cfg(test)]
mod tests {
    use super::{HideWindow, quiet_command};

    #[test]
    fn tokio_command_hide_window_is_chainable() {
        let mut cmd = tokio::process::Command::new("echo");
        let before = &raw mut cmd;
        let after = std::ptr::from_mut(cmd.hide_window());
        assert_eq!(before, after);
    }

    #[test]
    fn quiet_command_disables_colour() {
        let cmd = quiet_command("scoop");
        let envs: Vec<_> = cmd
            .as_std()
            .get_envs()
            .filter_map(|(key, value)| Some((key.to_str()?, value?.to_str()?)))
            .collect();

        assert!(envs.contains(&("NO_COLOR", "1")));
        assert!(envs.contains(&("TERM", "dumb")));
    }
}
