//! Categories and Assembly Order
//!
//! The assembly order lives in one table. Adding a category means adding a
//! variant and a table row; the orchestrator just walks `ASSEMBLY_ORDER`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Variables,
    Mixins,
    Normalize,
    Animations,
    Fonts,
    Structure,
    Icons,
    Mobile,
    Screen,
    Queries,
    Print,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Variables,
        Category::Mixins,
        Category::Normalize,
        Category::Animations,
        Category::Fonts,
        Category::Structure,
        Category::Icons,
        Category::Mobile,
        Category::Screen,
        Category::Queries,
        Category::Print,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Variables => "variables",
            Category::Mixins => "mixins",
            Category::Normalize => "normalize",
            Category::Animations => "animations",
            Category::Fonts => "fonts",
            Category::Structure => "structure",
            Category::Icons => "icons",
            Category::Mobile => "mobile",
            Category::Screen => "screen",
            Category::Queries => "queries",
            Category::Print => "print",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category: {s}"))
    }
}

/// Conditional block enclosing an appended category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaWrap {
    None,
    /// Below the breakpoint.
    MaxWidth,
    /// At or above the breakpoint.
    MinWidth,
    Print,
}

impl MediaWrap {
    /// Opening query text, or `None` for unwrapped categories.
    pub fn opener(&self, breakpoint_variable: &str) -> Option<String> {
        match self {
            MediaWrap::None => None,
            MediaWrap::MaxWidth => Some(format!("@media(max-width: @{breakpoint_variable} - 1px){{ ")),
            MediaWrap::MinWidth => Some(format!("@media(min-width: @{breakpoint_variable}){{ ")),
            MediaWrap::Print => Some("@media print { ".to_string()),
        }
    }
}

/// How a category's fragments enter the merge buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "placement", content = "wrap", rename_all = "kebab-case")]
pub enum Placement {
    /// Staged as a mixin, rendered right after the variables.
    Mixin,
    /// Staged as a plain file, rendered after the mixins.
    Staged,
    /// Appended to the tail in table order, optionally media-wrapped.
    Appended(MediaWrap),
}

pub const ASSEMBLY_ORDER: &[(Category, Placement)] = &[
    (Category::Mixins, Placement::Mixin),
    (Category::Normalize, Placement::Staged),
    (Category::Animations, Placement::Staged),
    (Category::Fonts, Placement::Staged),
    (Category::Structure, Placement::Appended(MediaWrap::None)),
    (Category::Icons, Placement::Appended(MediaWrap::None)),
    (Category::Mobile, Placement::Appended(MediaWrap::MaxWidth)),
    (Category::Screen, Placement::Appended(MediaWrap::MinWidth)),
    (Category::Queries, Placement::Appended(MediaWrap::None)),
    (Category::Print, Placement::Appended(MediaWrap::Print)),
];

pub fn placement_of(category: Category) -> Option<Placement> {
    ASSEMBLY_ORDER
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, p)| *p)
}
