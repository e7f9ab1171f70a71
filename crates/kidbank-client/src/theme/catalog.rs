//! Built-in themes.

use kidbank_core::ThemeColors;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeCategory {
    Cool,
    Warm,
    Fun,
    Calm,
}

impl ThemeCategory {
    pub const ALL: [ThemeCategory; 4] = [
        ThemeCategory::Cool,
        ThemeCategory::Warm,
        ThemeCategory::Fun,
        ThemeCategory::Calm,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ThemeCategory::Cool => "Cool",
            ThemeCategory::Warm => "Warm",
            ThemeCategory::Fun => "Fun",
            ThemeCategory::Calm => "Calm",
        }
    }
}

impl fmt::Display for ThemeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A theme shipped with the app. Only the four signature colours differ
/// from the default palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinTheme {
    pub id: &'static str,
    pub name: &'static str,
    pub category: ThemeCategory,
    pub primary: &'static str,
    pub secondary: &'static str,
    pub background: &'static str,
    pub accent: &'static str,
}

impl BuiltinTheme {
    pub fn colors(&self) -> ThemeColors {
        ThemeColors {
            primary: self.primary.to_string(),
            secondary: self.secondary.to_string(),
            background: self.background.to_string(),
            accent: self.accent.to_string(),
            ..ThemeColors::default()
        }
    }
}

const fn theme(
    id: &'static str,
    name: &'static str,
    category: ThemeCategory,
    [primary, secondary, background, accent]: [&'static str; 4],
) -> BuiltinTheme {
    BuiltinTheme {
        id,
        name,
        category,
        primary,
        secondary,
        background,
        accent,
    }
}

pub const THEMES: [BuiltinTheme; 9] = [
    theme("default", "Friendly Blue", ThemeCategory::Cool, ["#4a90d9", "#a29bfe", "#f0f4f8", "#00cec9"]),
    theme("ocean-blue", "Ocean Blue", ThemeCategory::Cool, ["#0984e3", "#00cec9", "#e8f4f8", "#00cec9"]),
    theme("forest-green", "Forest Adventure", ThemeCategory::Cool, ["#00b894", "#81c784", "#e8f5e9", "#26de81"]),
    theme("sunset-orange", "Sunset Glow", ThemeCategory::Warm, ["#e17055", "#fdcb6e", "#fff3e0", "#ff9f43"]),
    theme("berry-pink", "Berry Blast", ThemeCategory::Warm, ["#e84393", "#a29bfe", "#fce4ec", "#ff7675"]),
    theme("space-adventure", "Space Adventure", ThemeCategory::Fun, ["#6c5ce7", "#00cec9", "#1e1e2e", "#00cec9"]),
    theme("rainbow-party", "Rainbow Party", ThemeCategory::Fun, ["#ff6b6b", "#feca57", "#f8f9fa", "#48dbfb"]),
    theme("lavender-dreams", "Lavender Dreams", ThemeCategory::Calm, ["#9b59b6", "#ce93d8", "#f3e5f5", "#ab47bc"]),
    theme("mint-fresh", "Mint Fresh", ThemeCategory::Calm, ["#26a69a", "#4db6ac", "#e0f2f1", "#4db6ac"]),
];

pub fn find(id: &str) -> Option<&'static BuiltinTheme> {
    THEMES.iter().find(|theme| theme.id == id)
}

pub fn in_category(category: ThemeCategory) -> impl Iterator<Item = &'static BuiltinTheme> {
    THEMES.iter().filter(move |theme| theme.category == category)
}
