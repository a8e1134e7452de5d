use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
///
/// The serialized form of every variant is its string literal, so values
/// round-trip unchanged through the key-value store.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }

            pub fn all() -> &'static [$name] {
                &[$(Self::$variant),+]
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Gender {
    Male => "Male",
    Female => "Female",
    Other => "Other",
    PreferNotToSay => "Prefer not to say",
});

str_enum!(TimeOfDay {
    Morning => "Morning",
    Afternoon => "Afternoon",
    Evening => "Evening",
    Night => "Night",
});

str_enum!(MealLabel {
    Breakfast => "Breakfast",
    Lunch => "Lunch",
    Dinner => "Dinner",
});

str_enum!(AlertSeverity {
    Low => "low",
    Medium => "medium",
    High => "high",
});

str_enum!(AdherenceStatus {
    Taken => "taken",
    Skipped => "skipped",
    Missed => "missed",
});

str_enum!(ChatRole {
    User => "user",
    Model => "model",
});

str_enum!(GuideFormat {
    Summary => "summary",
    Detailed => "detailed",
});

impl AlertSeverity {
    /// Case-insensitive parse for model output ("High", "HIGH", " high ").
    pub fn parse_lenient(s: &str) -> Option<Self> {
        s.trim().to_lowercase().parse().ok()
    }

    /// Ordering weight: higher is more urgent.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }
}
