//! Team label inference from classified shirt colors.

use crate::types::ColorName;

pub const TEAM_UCLA: &str = "ucla";
pub const TEAM_USC: &str = "usc";
pub const TEAM_UNKNOWN: &str = "unknown";

/// Fold classified colors (most dominant first) into a team label.
///
/// Blue always wins and overwrites an earlier label. Red sets "usc" unless
/// "ucla" is already established. Anything else only fills an empty label
/// with "unknown". An empty input yields "unknown".
pub fn infer_team<I>(colors: I) -> &'static str
where
    I: IntoIterator<Item = ColorName>,
{
    let team = colors.into_iter().fold("", |team, color| match color {
        ColorName::Blue => TEAM_UCLA,
        ColorName::Red if team != TEAM_UCLA => TEAM_USC,
        _ if team.is_empty() => TEAM_UNKNOWN,
        _ => team,
    });

    if team.is_empty() {
        TEAM_UNKNOWN
    } else {
        team
    }
}
