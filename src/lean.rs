//! Role leans and their dominant / submissive categories.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// The named role one party holds toward the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RoleLean {
    #[default]
    None,
    Owner,
    Mistress,
    Master,
    Submissive,
    Pet,
    Slave,
    AbsoluteSlave,
}

/// The two disjoint groups non-`None` leans fall into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeanCategory {
    Dominant,
    Submissive,
}

impl RoleLean {
    pub const ALL: [RoleLean; 7] = [
        RoleLean::Owner,
        RoleLean::Mistress,
        RoleLean::Master,
        RoleLean::Submissive,
        RoleLean::Pet,
        RoleLean::Slave,
        RoleLean::AbsoluteSlave,
    ];

    /// Category of this lean, `None` for [`RoleLean::None`].
    pub fn category(self) -> Option<LeanCategory> {
        match self {
            RoleLean::None => None,
            RoleLean::Owner | RoleLean::Mistress | RoleLean::Master => {
                Some(LeanCategory::Dominant)
            }
            RoleLean::Submissive | RoleLean::Pet | RoleLean::Slave | RoleLean::AbsoluteSlave => {
                Some(LeanCategory::Submissive)
            }
        }
    }

    pub fn is_none(self) -> bool {
        self == RoleLean::None
    }

    /// Parse a lean from message text.
    ///
    /// Matching ignores case, spaces, `-` and `_`. Anything unrecognized is
    /// [`RoleLean::None`]; untrusted input never fails to parse.
    pub fn from_lean_str(text: &str) -> RoleLean {
        let normalized: String = text
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "owner" => RoleLean::Owner,
            "mistress" => RoleLean::Mistress,
            "master" => RoleLean::Master,
            "submissive" => RoleLean::Submissive,
            "pet" => RoleLean::Pet,
            "slave" => RoleLean::Slave,
            "absoluteslave" => RoleLean::AbsoluteSlave,
            _ => RoleLean::None,
        }
    }
}

impl Display for RoleLean {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lean = match self {
            RoleLean::None => "None",
            RoleLean::Owner => "Owner",
            RoleLean::Mistress => "Mistress",
            RoleLean::Master => "Master",
            RoleLean::Submissive => "Submissive",
            RoleLean::Pet => "Pet",
            RoleLean::Slave => "Slave",
            RoleLean::AbsoluteSlave => "Absolute-Slave",
        };
        write!(f, "{lean}")
    }
}
