use serde::{Deserialize, Serialize};
use serde_json::Value;

macro_rules! status_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl From<$name> for Value {
            fn from(status: $name) -> Value {
                Value::String(status.as_str().to_string())
            }
        }
    };
}

status_enum!(MemberStatus {
    Pending => "pending",
    Active => "active",
});

status_enum!(EventStatus {
    Upcoming => "upcoming",
    Ongoing => "ongoing",
    Completed => "completed",
});

status_enum!(ScholarshipStatus {
    Open => "open",
    Closed => "closed",
});

status_enum!(ApplicationStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

status_enum!(
    /// `new` until someone opens it.
    MessageStatus {
        New => "new",
        Read => "read",
        Replied => "replied",
    }
);

const SEPARATOR: char = ';';
const ESCAPE: char = '\\';

/// Scholarship requirements, persisted as one `;`-separated string.
/// Items are trimmed and blank items dropped, so that
/// `Requirements::parse(&r.join()) == r` for every list built with `new`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Requirements(Vec<String>);

impl Requirements {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            items
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    pub fn items(&self) -> &[String] {
        &self.0
    }

    pub fn join(&self) -> String {
        let mut out = String::new();
        for (i, item) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(SEPARATOR);
            }
            for c in item.chars() {
                if c == SEPARATOR || c == ESCAPE {
                    out.push(ESCAPE);
                }
                out.push(c);
            }
        }
        out
    }

    pub fn parse(stored: &str) -> Self {
        let mut items = Vec::new();
        let mut current = String::new();
        let mut chars = stored.chars();
        while let Some(c) = chars.next() {
            match c {
                ESCAPE => current.extend(chars.next()),
                SEPARATOR => items.push(std::mem::take(&mut current)),
                _ => current.push(c),
            }
        }
        items.push(current);
        Self::new(items)
    }
}

impl From<Vec<String>> for Requirements {
    fn from(items: Vec<String>) -> Self {
        Self::new(items)
    }
}

impl From<Requirements> for Vec<String> {
    fn from(requirements: Requirements) -> Self {
        requirements.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_serialize_lowercase() {
        assert_eq!(
            serde_json::to_value(ApplicationStatus::Approved).unwrap(),
            Value::from(ApplicationStatus::Approved)
        );
        assert_eq!(
            serde_json::from_str::<EventStatus>("\"ongoing\"").unwrap(),
            EventStatus::Ongoing
        );
        assert!(serde_json::from_str::<MemberStatus>("\"banned\"").is_err());
        assert_eq!(MessageStatus::ALL.len(), 3);
    }

    #[test]
    fn requirements_round_trip() {
        let cases = [
            vec![],
            vec!["Malaysian citizen"],
            vec!["CGPA >= 3.5", "Family income < RM4000"],
            vec!["a;b", "back\\slash", "trailing\\"],
            vec!["尊孔校友子女", "需附推荐信"],
        ];
        for case in cases {
            let requirements = Requirements::new(case);
            assert_eq!(Requirements::parse(&requirements.join()), requirements);
        }
    }

    #[test]
    fn reads_plain_semicolon_lists() {
        let parsed = Requirements::parse("one; two ;;three");
        assert_eq!(parsed.items(), ["one", "two", "three"]);
        assert!(Requirements::parse("").items().is_empty());
    }
}
