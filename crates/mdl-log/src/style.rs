//! Minimal ANSI styling, toggled off by `--no-color`.
//!
//! Deliberately hand-rolled rather than pulled from a terminal-styling
//! crate: raw escape codes are enough for five named colors.

#[derive(Debug, Clone, Copy)]
pub struct Style {
    enabled: bool,
}

impl Style {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    fn wrap(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    pub fn green(&self, text: &str) -> String {
        self.wrap("32", text)
    }

    pub fn red(&self, text: &str) -> String {
        self.wrap("31", text)
    }

    pub fn yellow(&self, text: &str) -> String {
        self.wrap("33", text)
    }

    pub fn dim(&self, text: &str) -> String {
        self.wrap("2", text)
    }

    pub fn bold(&self, text: &str) -> String {
        self.wrap("1", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_style_passes_text_through() {
        let style = Style::new(false);
        assert_eq!(style.green("ok"), "ok");
    }

    #[test]
    fn enabled_style_wraps_in_escape_codes() {
        let style = Style::new(true);
        assert_eq!(style.green("ok"), "\x1b[32mok\x1b[0m");
    }
}
