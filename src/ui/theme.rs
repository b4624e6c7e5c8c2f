//! Terminal styles, resolved once per process

use crate::loss::LossClass;
use owo_colors::Style;
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct Theme {
    pub header: Style,
    pub success: Style,
    pub error: Style,
    pub warn: Style,
    pub info: Style,
    pub dim: Style,
    pub muted: Style,
    /// Severity styles, indexed L0..=L4
    loss: [Style; 5],
}

impl Theme {
    /// Color only for a terminal, and never when `NO_COLOR` is set
    pub fn detect() -> Self {
        if std::env::var_os("NO_COLOR").is_some() || !console::Term::stdout().is_term() {
            return Self::plain();
        }
        Self::colored()
    }

    pub fn colored() -> Self {
        Self {
            header: Style::new().cyan().bold(),
            success: Style::new().green().bold(),
            error: Style::new().red().bold(),
            warn: Style::new().yellow().bold(),
            info: Style::new().magenta(),
            dim: Style::new().white().dimmed(),
            muted: Style::new().bright_black(),
            loss: [
                Style::new().green().bold(),
                Style::new().green(),
                Style::new().yellow(),
                Style::new().yellow().bold(),
                Style::new().red().bold(),
            ],
        }
    }

    pub fn plain() -> Self {
        Self {
            header: Style::new(),
            success: Style::new(),
            error: Style::new(),
            warn: Style::new(),
            info: Style::new(),
            dim: Style::new(),
            muted: Style::new(),
            loss: std::array::from_fn(|_| Style::new()),
        }
    }

    /// Style for a loss class, brighter warning as fidelity drops
    pub fn loss(&self, class: LossClass) -> &Style {
        let index = match class {
            LossClass::L0 => 0,
            LossClass::L1 => 1,
            LossClass::L2 => 2,
            LossClass::L3 => 3,
            LossClass::L4 => 4,
        };
        &self.loss[index]
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use owo_colors::OwoColorize;

    #[test]
    fn test_plain_loss_styles_add_no_escapes() {
        let plain = Theme::plain();
        for class in LossClass::all() {
            let rendered = class.as_str().style(plain.loss(*class).clone()).to_string();
            assert_eq!(rendered, class.as_str());
        }
    }

    #[test]
    fn test_colored_loss_styles_differ_by_severity() {
        let colored = Theme::colored();
        let render = |class: LossClass| "x".style(colored.loss(class).clone()).to_string();
        assert!(render(LossClass::L0).contains("\u{1b}["));
        assert_ne!(render(LossClass::L1), render(LossClass::L4));
        assert_ne!(render(LossClass::L2), render(LossClass::L3));
    }
}
