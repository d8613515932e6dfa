use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Semantic text color. Persisted by name; the literal color is resolved per theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorTag {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    Pink,
    Gray,
}

impl ColorTag {
    pub const ALL: [ColorTag; 8] = [
        ColorTag::Red,
        ColorTag::Orange,
        ColorTag::Yellow,
        ColorTag::Green,
        ColorTag::Blue,
        ColorTag::Purple,
        ColorTag::Pink,
        ColorTag::Gray,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ColorTag::Red => "red",
            ColorTag::Orange => "orange",
            ColorTag::Yellow => "yellow",
            ColorTag::Green => "green",
            ColorTag::Blue => "blue",
            ColorTag::Purple => "purple",
            ColorTag::Pink => "pink",
            ColorTag::Gray => "gray",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|tag| tag.name().eq_ignore_ascii_case(name))
            .or_else(|| name.eq_ignore_ascii_case("grey").then_some(ColorTag::Gray))
    }

    pub fn light(self) -> &'static str {
        match self {
            ColorTag::Red => "#e03e3e",
            ColorTag::Orange => "#d9730d",
            ColorTag::Yellow => "#dfab01",
            ColorTag::Green => "#0f7b6c",
            ColorTag::Blue => "#0b6e99",
            ColorTag::Purple => "#6940a5",
            ColorTag::Pink => "#ad1a72",
            ColorTag::Gray => "#9b9a97",
        }
    }

    pub fn dark(self) -> &'static str {
        match self {
            ColorTag::Red => "#ff7369",
            ColorTag::Orange => "#ffa344",
            ColorTag::Yellow => "#ffdc49",
            ColorTag::Green => "#4dab9a",
            ColorTag::Blue => "#529cca",
            ColorTag::Purple => "#9a6dd7",
            ColorTag::Pink => "#e255a1",
            ColorTag::Gray => "#979a9b",
        }
    }

    pub fn resolve(self, theme: Theme) -> &'static str {
        match theme {
            Theme::Light => self.light(),
            Theme::Dark => self.dark(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_and_accept_grey() {
        for tag in ColorTag::ALL {
            assert_eq!(ColorTag::from_name(tag.name()), Some(tag));
        }
        assert_eq!(ColorTag::from_name(" BLUE "), Some(ColorTag::Blue));
        assert_eq!(ColorTag::from_name("grey"), Some(ColorTag::Gray));
        assert_eq!(ColorTag::from_name("#ff0000"), None);
    }

    #[test]
    fn every_tag_resolves_differently_per_theme() {
        for tag in ColorTag::ALL {
            assert_ne!(tag.resolve(Theme::Light), tag.resolve(Theme::Dark));
            assert!(tag.resolve(Theme::Dark).starts_with('#'));
        }
    }
}
