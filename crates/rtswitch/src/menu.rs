use std::io::{self, BufRead, Write};

/// Numbered prompts over a line-oriented console.
pub struct Menu<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Menu<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn say(&mut self, text: impl AsRef<str>) -> io::Result<()> {
        writeln!(self.output, "{}", text.as_ref())
    }

    pub fn say_all<I, S>(&mut self, lines: I) -> io::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.say(line)?;
        }
        Ok(())
    }

    /// `None` at end of input.
    fn read_line(&mut self) -> io::Result<Option<String>> {
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Show `options` numbered from 1 with `exit_label` as 0. Returns the
    /// chosen index, or `None` for 0 and end of input.
    pub fn choose(
        &mut self,
        title: &str,
        options: &[String],
        exit_label: &str,
    ) -> io::Result<Option<usize>> {
        writeln!(self.output)?;
        writeln!(self.output, "{title}")?;
        for (index, option) in options.iter().enumerate() {
            writeln!(self.output, "  {}. {option}", index + 1)?;
        }
        writeln!(self.output, "  0. {exit_label}")?;

        loop {
            write!(self.output, "> ")?;
            let Some(answer) = self.read_line()? else {
                return Ok(None);
            };
            match answer.parse::<usize>() {
                Ok(0) => return Ok(None),
                Ok(choice) if choice <= options.len() => return Ok(Some(choice - 1)),
                _ => writeln!(
                    self.output,
                    "Enter a number between 0 and {}",
                    options.len()
                )?,
            }
        }
    }

    /// Free-text answer; `None` when empty or at end of input.
    pub fn prompt(&mut self, label: &str) -> io::Result<Option<String>> {
        write!(self.output, "{label}: ")?;
        Ok(self.read_line()?.filter(|answer| !answer.is_empty()))
    }

    pub fn confirm(&mut self, question: &str) -> io::Result<bool> {
        write!(self.output, "{question} [y/N] ")?;
        Ok(self
            .read_line()?
            .is_some_and(|answer| matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes")))
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.output
    }
}
