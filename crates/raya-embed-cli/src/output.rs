//! Colored report output for `raya-embed` commands.
//!
//! Respects `NO_COLOR` and the `--color` flag.

use std::io;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Resolve a `ColorChoice` from the `--color` flag.
///
/// `NO_COLOR` wins over the flag; without either, color follows the TTY.
pub fn resolve_color_choice(flag: Option<&str>) -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        return ColorChoice::Never;
    }
    match flag {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

/// Report writer; stdout in the binary, a buffer in tests
pub struct StyledOutput<W = StandardStream> {
    out: W,
}

impl StyledOutput {
    pub fn stdout(choice: ColorChoice) -> Self {
        Self::new(StandardStream::stdout(choice))
    }
}

impl<W: WriteColor> StyledOutput<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[allow(dead_code)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn styled(&mut self, text: &str, spec: &ColorSpec) -> io::Result<()> {
        self.out.set_color(spec)?;
        write!(self.out, "{}", text)?;
        self.out.reset()
    }

    fn colored(&mut self, text: &str, color: Option<Color>, bold: bool) -> io::Result<()> {
        let mut spec = ColorSpec::new();
        spec.set_fg(color).set_bold(bold);
        self.styled(text, &spec)
    }

    /// A module identity
    pub fn identity(&mut self, text: &str) -> io::Result<()> {
        self.colored(text, None, true)
    }

    /// A resource name
    pub fn resource(&mut self, text: &str) -> io::Result<()> {
        self.colored(text, Some(Color::Cyan), false)
    }

    /// Secondary detail: sizes, flags, targets
    pub fn detail(&mut self, text: &str) -> io::Result<()> {
        let mut spec = ColorSpec::new();
        spec.set_dimmed(true);
        self.styled(text, &spec)
    }

    pub fn success(&mut self, text: &str) -> io::Result<()> {
        self.colored(text, Some(Color::Green), true)
    }

    pub fn warning(&mut self, text: &str) -> io::Result<()> {
        self.colored(text, Some(Color::Yellow), true)
    }

    pub fn plain(&mut self, text: &str) -> io::Result<()> {
        write!(self.out, "{}", text)
    }

    pub fn newline(&mut self) -> io::Result<()> {
        writeln!(self.out)
    }

    /// `label` padded to a column, then `value`
    pub fn field(&mut self, label: &str, value: &str) -> io::Result<()> {
        self.detail(&format!("  {:<8}", label))?;
        self.plain(value)?;
        self.newline()
    }
}
