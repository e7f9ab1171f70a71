//! # Theme Service
//!
//! Resolves theme ids to palettes, keeps `currentTheme` in the store and
//! remembers the parent's choice on this device.
//!
//! ```text
//! apply(id)            ── palette + store.currentTheme + preference file
//! apply_temporary(id)  ── palette + store.currentTheme        (kid mode)
//! load_saved()         ── apply(preference or configured default)
//! ```
//!
//! Custom theme ids (`custom-…`) are resolved against the kids in the store.

pub mod catalog;
pub mod preference;

pub use catalog::{BuiltinTheme, ThemeCategory, THEMES};
pub use preference::{FilePreferences, MemoryPreferences, PreferenceStore};

use chrono::Utc;
use kidbank_core::validation::{validate_color, validate_theme_name, ValidationResult};
use kidbank_core::{CustomTheme, ThemeColors, DEFAULT_THEME_ID};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::store::Store;

/// Prefix of every custom theme id.
pub const CUSTOM_THEME_PREFIX: &str = "custom-";

// =============================================================================
// Colour Helpers
// =============================================================================

fn parse_hex(color: &str) -> Option<(i32, i32, i32)> {
    let hex = color.trim().trim_start_matches('#');
    let hex = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect::<String>(),
        6 => hex.to_string(),
        _ => return None,
    };
    let num = u32::from_str_radix(&hex, 16).ok()?;
    Some((
        (num >> 16 & 0xff) as i32,
        (num >> 8 & 0xff) as i32,
        (num & 0xff) as i32,
    ))
}

/// Shifts every channel by `percent` of full scale. Negative darkens.
/// Unparseable input is returned unchanged.
pub fn lighten(color: &str, percent: f64) -> String {
    let Some((r, g, b)) = parse_hex(color) else {
        return color.to_string();
    };
    let amount = (2.55 * percent).round() as i32;
    let shift = |channel: i32| (channel + amount).clamp(0, 255);
    format!("#{:02x}{:02x}{:02x}", shift(r), shift(g), shift(b))
}

pub fn darken(color: &str, percent: f64) -> String {
    lighten(color, -percent)
}

pub fn is_dark(color: &str) -> bool {
    parse_hex(color).is_some_and(|(r, g, b)| {
        let luminance = (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64) / 255.0;
        luminance < 0.5
    })
}

/// Readable text colour on `background`.
pub fn contrast_color(background: &str) -> &'static str {
    if is_dark(background) {
        "#ffffff"
    } else {
        "#2d3436"
    }
}

// =============================================================================
// Colour Slots
// =============================================================================

/// Names of the editable colours of a palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSlot {
    Primary,
    Secondary,
    Background,
    Surface,
    Text,
    TextSecondary,
    Accent,
    Success,
    Warning,
    Error,
}

impl ColorSlot {
    pub const ALL: [ColorSlot; 10] = [
        ColorSlot::Primary,
        ColorSlot::Secondary,
        ColorSlot::Background,
        ColorSlot::Surface,
        ColorSlot::Text,
        ColorSlot::TextSecondary,
        ColorSlot::Accent,
        ColorSlot::Success,
        ColorSlot::Warning,
        ColorSlot::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ColorSlot::Primary => "primary",
            ColorSlot::Secondary => "secondary",
            ColorSlot::Background => "background",
            ColorSlot::Surface => "surface",
            ColorSlot::Text => "text",
            ColorSlot::TextSecondary => "textSecondary",
            ColorSlot::Accent => "accent",
            ColorSlot::Success => "success",
            ColorSlot::Warning => "warning",
            ColorSlot::Error => "error",
        }
    }

    pub fn get(self, colors: &ThemeColors) -> &str {
        match self {
            ColorSlot::Primary => &colors.primary,
            ColorSlot::Secondary => &colors.secondary,
            ColorSlot::Background => &colors.background,
            ColorSlot::Surface => &colors.surface,
            ColorSlot::Text => &colors.text,
            ColorSlot::TextSecondary => &colors.text_secondary,
            ColorSlot::Accent => &colors.accent,
            ColorSlot::Success => &colors.success,
            ColorSlot::Warning => &colors.warning,
            ColorSlot::Error => &colors.error,
        }
    }

    pub fn set(self, colors: &mut ThemeColors, value: String) {
        let slot = match self {
            ColorSlot::Primary => &mut colors.primary,
            ColorSlot::Secondary => &mut colors.secondary,
            ColorSlot::Background => &mut colors.background,
            ColorSlot::Surface => &mut colors.surface,
            ColorSlot::Text => &mut colors.text,
            ColorSlot::TextSecondary => &mut colors.text_secondary,
            ColorSlot::Accent => &mut colors.accent,
            ColorSlot::Success => &mut colors.success,
            ColorSlot::Warning => &mut colors.warning,
            ColorSlot::Error => &mut colors.error,
        };
        *slot = value;
    }
}

impl fmt::Display for ColorSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColorSlot::ALL
            .into_iter()
            .find(|slot| slot.as_str() == s)
            .ok_or_else(|| format!("Unknown colour: {s}"))
    }
}

// =============================================================================
// Palette
// =============================================================================

/// The colours currently on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub id: String,
    pub name: String,
    pub colors: ThemeColors,
    pub primary_light: String,
    pub primary_dark: String,
}

impl Palette {
    fn new(id: &str, name: &str, colors: ThemeColors) -> Self {
        Palette {
            id: id.to_string(),
            name: name.to_string(),
            primary_light: lighten(&colors.primary, 20.0),
            primary_dark: darken(&colors.primary, 15.0),
            colors,
        }
    }

    pub fn text_on_primary(&self) -> &'static str {
        contrast_color(&self.colors.primary)
    }
}

impl Default for Palette {
    fn default() -> Self {
        Palette::new(DEFAULT_THEME_ID, "Friendly Blue", ThemeColors::default())
    }
}

// =============================================================================
// Theme Service
// =============================================================================

struct ThemeInner {
    store: Store,
    preferences: Rc<dyn PreferenceStore>,
    default_theme: String,
    palette: RefCell<Palette>,
}

#[derive(Clone)]
pub struct ThemeService {
    inner: Rc<ThemeInner>,
}

impl ThemeService {
    pub fn new(
        store: Store,
        preferences: Rc<dyn PreferenceStore>,
        default_theme: impl Into<String>,
    ) -> Self {
        ThemeService {
            inner: Rc::new(ThemeInner {
                store,
                preferences,
                default_theme: default_theme.into(),
                palette: RefCell::new(Palette::default()),
            }),
        }
    }

    /// Applies a theme and remembers it on this device.
    pub fn apply(&self, theme_id: &str) {
        self.apply_temporary(theme_id);
        if let Err(e) = self.inner.preferences.set_theme(theme_id) {
            warn!(theme = theme_id, error = %e, "Could not save theme preference");
        }
    }

    /// Applies a theme for this session only.
    pub fn apply_temporary(&self, theme_id: &str) {
        let palette = self.resolve(theme_id).unwrap_or_else(|| {
            warn!(theme = theme_id, "Unknown theme, showing default colours");
            Palette::default()
        });
        debug!(theme = theme_id, name = %palette.name, "Applying theme");
        *self.inner.palette.borrow_mut() = palette;
        self.inner.store.set_theme(theme_id);
    }

    /// Puts raw colours on screen without touching `currentTheme`.
    pub fn apply_custom(&self, colors: &ThemeColors) {
        let current = self.inner.store.current_theme();
        *self.inner.palette.borrow_mut() = Palette::new(&current, "Custom", colors.clone());
    }

    /// Restores the saved theme, or the configured default.
    pub fn load_saved(&self) {
        let theme_id = self
            .inner
            .preferences
            .theme()
            .unwrap_or_else(|| self.inner.default_theme.clone());
        self.apply(&theme_id);
    }

    pub fn reset(&self) {
        self.apply(DEFAULT_THEME_ID);
    }

    pub fn current_theme(&self) -> String {
        self.inner.store.current_theme()
    }

    pub fn palette(&self) -> Palette {
        self.inner.palette.borrow().clone()
    }

    /// Built-in theme, or a custom theme of a kid known to the store.
    pub fn resolve(&self, theme_id: &str) -> Option<Palette> {
        if let Some(theme) = catalog::find(theme_id) {
            return Some(Palette::new(theme.id, theme.name, theme.colors()));
        }
        if !theme_id.starts_with(CUSTOM_THEME_PREFIX) {
            return None;
        }
        self.inner.store.read(|state| {
            state
                .current_kid
                .iter()
                .chain(state.kids.iter())
                .find_map(|kid| kid.custom_theme(theme_id))
                .map(|theme| Palette::new(&theme.id, &theme.name, theme.colors.clone()))
        })
    }

    /// Validates a designed theme and gives it a fresh id.
    pub fn create_custom_theme(&self, name: &str, colors: &ThemeColors) -> ValidationResult<CustomTheme> {
        let name = validate_theme_name(name)?;
        let mut checked = ThemeColors::default();
        for slot in ColorSlot::ALL {
            let value = slot.get(colors);
            if !value.trim().is_empty() {
                slot.set(&mut checked, validate_color(value)?);
            }
        }
        Ok(CustomTheme {
            id: format!("{CUSTOM_THEME_PREFIX}{}", Uuid::new_v4()),
            name,
            colors: checked,
            created_at: Utc::now(),
        })
    }
}

impl fmt::Debug for ThemeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThemeService")
            .field("palette", &*self.inner.palette.borrow())
            .finish()
    }
}
